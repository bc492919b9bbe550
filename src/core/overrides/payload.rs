use indexmap::IndexSet;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::models::{MovieRecord, MpaaRating};

/// Text fields written by older runs sometimes hold numbers (`"Year": 1995`).
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// And numeric fields sometimes hold text (`"Runtime": "112"`).
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_u64().or_else(|| n.as_f64().map(|f| f as u64)),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// The JSON stored in a whitelist row's `Information` column, with every
/// field optional. Key names follow the sheet format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialMovie {
    #[serde(rename = "Title", default, deserialize_with = "lenient_text")]
    pub title: Option<String>,
    #[serde(rename = "Year", default, deserialize_with = "lenient_text")]
    pub year: Option<String>,
    #[serde(rename = "tmdbID", default, deserialize_with = "lenient_text")]
    pub tmdb_id: Option<String>,
    #[serde(rename = "MPAA", default, deserialize_with = "lenient_text")]
    pub mpaa: Option<String>,
    #[serde(rename = "Runtime", default, deserialize_with = "lenient_number")]
    pub runtime: Option<u64>,
    #[serde(rename = "RatingCount", default, deserialize_with = "lenient_number")]
    pub rating_count: Option<u64>,
    #[serde(rename = "Languages", default)]
    pub languages: Option<Vec<String>>,
    #[serde(rename = "Countries", default)]
    pub countries: Option<Vec<String>>,
    #[serde(rename = "Decade", default, deserialize_with = "lenient_number")]
    pub decade: Option<u64>,
    #[serde(rename = "Directors", default)]
    pub directors: Option<Vec<String>>,
    #[serde(rename = "Genres", default)]
    pub genres: Option<Vec<String>>,
    #[serde(rename = "Studios", default)]
    pub studios: Option<Vec<String>>,
    #[serde(rename = "Actors", default)]
    pub actors: Option<Vec<String>>,
    #[serde(rename = "Keywords", default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
    #[serde(rename = "Link", default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

fn filled_list(list: &Option<Vec<String>>) -> bool {
    list.as_ref()
        .is_some_and(|l| l.iter().any(|v| !v.trim().is_empty()))
}

fn filled_text(text: &Option<String>) -> bool {
    text.as_ref().is_some_and(|t| !t.trim().is_empty())
}

fn to_set(list: Option<Vec<String>>) -> IndexSet<String> {
    list.unwrap_or_default().into_iter().collect()
}

impl PartialMovie {
    /// Names of the required fields that are absent, empty or zero.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let checks = [
            ("Title", filled_text(&self.title)),
            ("Year", filled_text(&self.year)),
            ("Runtime", self.runtime.is_some_and(|r| r > 0)),
            ("RatingCount", self.rating_count.is_some_and(|r| r > 0)),
            ("Languages", filled_list(&self.languages)),
            ("Countries", filled_list(&self.countries)),
            ("Directors", filled_list(&self.directors)),
            ("Genres", filled_list(&self.genres)),
            ("Studios", filled_list(&self.studios)),
            ("Actors", filled_list(&self.actors)),
        ];
        checks
            .into_iter()
            .filter(|(_, ok)| !ok)
            .map(|(name, _)| name)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    pub fn from_record(record: &MovieRecord) -> Self {
        let list = |set: &IndexSet<String>| Some(set.iter().cloned().collect::<Vec<_>>());
        Self {
            title: Some(record.title.clone()),
            year: Some(record.year.clone()).filter(|y| !y.is_empty()),
            tmdb_id: record.tmdb_id.clone(),
            mpaa: record.mpaa_rating.map(|r| r.as_str().to_string()),
            runtime: record.runtime_minutes.map(u64::from),
            rating_count: Some(record.rating_count),
            languages: list(&record.languages),
            countries: list(&record.countries),
            decade: record.decade().and_then(|d| u64::try_from(d).ok()),
            directors: Some(record.directors.clone()),
            genres: list(&record.genres),
            studios: list(&record.studios),
            actors: Some(record.actors.clone()),
            keywords: Some(record.keywords.iter().cloned().collect()).filter(|k: &Vec<String>| !k.is_empty()),
            link: record.source_url.clone(),
        }
    }

    /// Build a record from whatever fields are present; `link` is used when
    /// the payload does not carry its own.
    pub fn to_record(&self, link: Option<&str>) -> MovieRecord {
        let clone = self.clone();
        MovieRecord {
            title: clone.title.unwrap_or_default(),
            year: clone.year.unwrap_or_default(),
            source_url: clone.link.or_else(|| link.map(str::to_string)),
            tmdb_id: clone.tmdb_id,
            runtime_minutes: clone.runtime.and_then(|r| u32::try_from(r).ok()),
            rating_count: clone.rating_count.unwrap_or(0),
            mpaa_rating: clone.mpaa.as_deref().and_then(MpaaRating::from_certification),
            genres: to_set(clone.genres),
            keywords: to_set(clone.keywords),
            directors: clone.directors.unwrap_or_default(),
            actors: clone.actors.unwrap_or_default(),
            studios: to_set(clone.studios),
            languages: to_set(clone.languages),
            countries: to_set(clone.countries),
        }
    }

    pub fn to_json(&self) -> String {
        // Serialising a plain struct of strings and numbers cannot fail.
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// What a whitelist row's `Information` cell holds.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Complete(MovieRecord),
    Partial(PartialMovie),
    Empty,
}

impl Payload {
    /// Parse an `Information` cell. Blank text, `{}` and malformed JSON all
    /// come back as [`Payload::Empty`].
    pub fn parse(raw: &str, link: Option<&str>) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            return Payload::Empty;
        }
        // Only a JSON object counts. Serde would map an array onto the
        // fields positionally.
        let value = match serde_json::from_str::<Value>(raw) {
            Ok(value @ Value::Object(_)) => value,
            _ => return Payload::Empty,
        };
        let Ok(partial) = serde_json::from_value::<PartialMovie>(value) else {
            return Payload::Empty;
        };
        if partial == PartialMovie::default() {
            return Payload::Empty;
        }
        if partial.is_complete() {
            Payload::Complete(partial.to_record(link))
        } else {
            Payload::Partial(partial)
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Payload::Complete(_))
    }

    #[cfg(test)]
    pub fn record(&self) -> Option<&MovieRecord> {
        match self {
            Payload::Complete(record) => Some(record),
            _ => None,
        }
    }
}
