use std::fmt;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MpaaRating {
    #[serde(rename = "G")]
    G,
    #[serde(rename = "PG")]
    Pg,
    #[serde(rename = "PG-13")]
    Pg13,
    #[serde(rename = "R")]
    R,
    #[serde(rename = "NC-17")]
    Nc17,
    #[serde(rename = "NR")]
    NotRated,
}

impl MpaaRating {
    /// Ratings that get their own bucket; NR is recorded but never bucketed.
    pub const BUCKETED: [MpaaRating; 5] = [
        MpaaRating::G,
        MpaaRating::Pg,
        MpaaRating::Pg13,
        MpaaRating::R,
        MpaaRating::Nc17,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MpaaRating::G => "G",
            MpaaRating::Pg => "PG",
            MpaaRating::Pg13 => "PG-13",
            MpaaRating::R => "R",
            MpaaRating::Nc17 => "NC-17",
            MpaaRating::NotRated => "NR",
        }
    }

    /// Map a USA certification label, including the historical ones, to a rating.
    pub fn from_certification(label: &str) -> Option<Self> {
        match label.trim().to_ascii_uppercase().as_str() {
            "G" => Some(MpaaRating::G),
            "PG" | "M" | "GP" => Some(MpaaRating::Pg),
            "PG-13" => Some(MpaaRating::Pg13),
            "R" => Some(MpaaRating::R),
            "NC-17" | "X" => Some(MpaaRating::Nc17),
            "NR" | "NOT RATED" | "UNRATED" => Some(MpaaRating::NotRated),
            _ => None,
        }
    }

    pub fn is_rated(&self) -> bool {
        !matches!(self, MpaaRating::NotRated)
    }
}

impl fmt::Display for MpaaRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A film as scraped from Letterboxd (or restored from a whitelist payload).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MovieRecord {
    pub title: String,
    /// Four digit release year, kept as text the way the sheets store it.
    pub year: String,
    pub source_url: Option<String>,
    pub tmdb_id: Option<String>,
    pub runtime_minutes: Option<u32>,
    pub rating_count: u64,
    pub mpaa_rating: Option<MpaaRating>,
    pub genres: IndexSet<String>,
    pub keywords: IndexSet<String>,
    pub directors: Vec<String>,
    pub actors: Vec<String>,
    pub studios: IndexSet<String>,
    pub languages: IndexSet<String>,
    pub countries: IndexSet<String>,
}

impl MovieRecord {
    pub fn new(title: impl Into<String>, year: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            year: year.into(),
            ..Default::default()
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    pub fn year_number(&self) -> Option<i32> {
        self.year.trim().parse::<i32>().ok()
    }

    pub fn decade(&self) -> Option<i32> {
        self.year_number().map(|y| (y / 10) * 10)
    }

    pub fn display_name(&self) -> String {
        if self.year.is_empty() {
            self.title.clone()
        } else {
            format!("{} ({})", self.title, self.year)
        }
    }
}
