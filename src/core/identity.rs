use std::fmt;

use serde::Deserialize;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::models::MovieRecord;

/// How a run decides that two records are the same film. A run uses exactly one scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyScheme {
    TitleYear,
    #[default]
    Url,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey(String);

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fold a title for comparison: compatibility-decompose, drop combining marks,
/// recompose, lowercase and trim. "Amélie" and "Amelie" fold to the same text.
pub fn normalize_title(title: &str) -> String {
    let folded: String = title
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .nfkc()
        .collect();
    folded.to_lowercase().trim().to_string()
}

/// Build a key from raw parts. `None` when the scheme's inputs are missing.
pub fn key_from_parts(
    scheme: KeyScheme,
    title: &str,
    year: &str,
    url: Option<&str>,
) -> Option<IdentityKey> {
    match scheme {
        KeyScheme::Url => {
            let url = url?.trim();
            if url.is_empty() {
                None
            } else {
                Some(IdentityKey(url.to_string()))
            }
        }
        KeyScheme::TitleYear => {
            let title = normalize_title(title);
            if title.is_empty() {
                return None;
            }
            Some(IdentityKey(format!("{}|{}", title, year.trim())))
        }
    }
}

pub fn identity_key(record: &MovieRecord, scheme: KeyScheme) -> Option<IdentityKey> {
    key_from_parts(
        scheme,
        &record.title,
        &record.year,
        record.source_url.as_deref(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accented_titles_fold_to_ascii() {
        let a = MovieRecord::new("Amélie", "2001");
        let b = MovieRecord::new("AMELIE ", "2001");
        assert_eq!(
            identity_key(&a, KeyScheme::TitleYear),
            identity_key(&b, KeyScheme::TitleYear)
        );
    }

    #[test]
    fn compatibility_forms_fold() {
        // Full-width letters and ligatures.
        assert_eq!(normalize_title("Ｓｅｖｅｎ"), "seven");
        assert_eq!(normalize_title("ﬁght club"), "fight club");
        assert_eq!(normalize_title("Nausicaä"), "nausicaa");
    }

    #[test]
    fn year_separates_remakes() {
        let a = MovieRecord::new("Suspiria", "1977");
        let b = MovieRecord::new("Suspiria", "2018");
        assert_ne!(
            identity_key(&a, KeyScheme::TitleYear),
            identity_key(&b, KeyScheme::TitleYear)
        );
    }

    #[test]
    fn url_scheme_ignores_title() {
        let a = MovieRecord::new("Suspiria", "1977").with_url("https://letterboxd.com/film/suspiria/");
        let b = MovieRecord::new("Suspiria", "1977");
        assert_eq!(
            identity_key(&a, KeyScheme::Url).map(|k| k.to_string()),
            Some("https://letterboxd.com/film/suspiria/".to_string())
        );
        assert_eq!(identity_key(&b, KeyScheme::Url), None);
    }
}
