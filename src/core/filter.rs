use serde::Deserialize;

use crate::core::tmdb::TmdbDetails;
use crate::models::MovieRecord;

/// Eligibility rules applied to freshly scraped films. Whitelisted films skip them.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Criteria {
    pub min_rating_count: u64,
    pub min_runtime: u32,
    pub filter_keywords: Vec<String>,
    pub filter_genres: Vec<String>,
}

impl Default for Criteria {
    fn default() -> Self {
        Self {
            min_rating_count: 1000,
            min_runtime: 40,
            filter_keywords: [
                "concert film",
                "miniseries",
                "live performance",
                "filmed theater",
                "live theater",
                "stand-up comedy",
                "edited from tv series",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
            filter_genres: vec!["Documentary".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    /// No ratings at all; goes to the zero reviews sheet.
    ZeroReviews,
    /// `permanent` rejections are also written to the blacklist.
    Reject { reason: String, permanent: bool },
}

impl Verdict {
    fn soft(reason: impl Into<String>) -> Self {
        Verdict::Reject {
            reason: reason.into(),
            permanent: false,
        }
    }

    fn permanent(reason: impl Into<String>) -> Self {
        Verdict::Reject {
            reason: reason.into(),
            permanent: true,
        }
    }

    pub fn is_accept(&self) -> bool {
        matches!(self, Verdict::Accept)
    }
}

/// Filter entries found in `found`, compared case-insensitively, in filter order.
fn matches<'a>(filters: &'a [String], found: &[String]) -> Vec<&'a str> {
    filters
        .iter()
        .filter(|f| found.iter().any(|v| v.trim().eq_ignore_ascii_case(f.trim())))
        .map(String::as_str)
        .collect()
}

impl Criteria {
    /// Checks that need only the Letterboxd page.
    pub fn screen(&self, record: &MovieRecord) -> Verdict {
        if record.rating_count == 0 {
            return Verdict::ZeroReviews;
        }
        if record.rating_count < self.min_rating_count {
            return Verdict::soft(format!("Insufficient ratings (< {})", self.min_rating_count));
        }
        if record.year_number().is_none() {
            return Verdict::soft("Missing release year");
        }
        if !record.tmdb_id.as_deref().is_some_and(|id| !id.trim().is_empty()) {
            return Verdict::soft("Missing TMDB ID");
        }
        let Some(runtime) = record.runtime_minutes else {
            return Verdict::soft("Missing runtime");
        };
        if runtime < self.min_runtime {
            return Verdict::permanent(format!("Short runtime of {runtime} minutes"));
        }
        Verdict::Accept
    }

    /// Checks against TMDB keywords and genres.
    pub fn screen_tmdb(&self, details: &TmdbDetails) -> Verdict {
        let keywords = matches(&self.filter_keywords, &details.keywords);
        if !keywords.is_empty() {
            return Verdict::permanent(format!("due to being a {}.", keywords.join(", ")));
        }
        let genres = matches(&self.filter_genres, &details.genres);
        if !genres.is_empty() {
            return Verdict::permanent(format!("due to being a {}.", genres.join(", ")));
        }
        Verdict::Accept
    }

    /// Full evaluation. `tmdb` is `None` when the TMDB lookup failed.
    pub fn evaluate(&self, record: &MovieRecord, tmdb: Option<&TmdbDetails>) -> Verdict {
        let verdict = self.screen(record);
        if !verdict.is_accept() {
            return verdict;
        }
        match tmdb {
            Some(details) => self.screen_tmdb(details),
            None => Verdict::soft("Failed TMDB data fetch"),
        }
    }
}
