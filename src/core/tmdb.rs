use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{error, warn};

use crate::utils::Error;

pub const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3";

/// What the eligibility filter needs from TMDB.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TmdbDetails {
    pub keywords: Vec<String>,
    pub genres: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct MovieResource {
    #[serde(default)]
    genres: Vec<NamedResource>,
    #[serde(default)]
    keywords: KeywordsResource,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct KeywordsResource {
    #[serde(default)]
    keywords: Vec<NamedResource>,
}

#[derive(Debug, Clone, Deserialize)]
struct NamedResource {
    name: String,
}

#[derive(Debug, Clone)]
pub struct TmdbClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl TmdbClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn fetch_movie(&self, tmdb_id: &str) -> Result<Option<MovieResource>, Error> {
        let resp = self
            .client
            .get(self.api_url(&format!("movie/{tmdb_id}")))
            .header("Accept", "application/json")
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("append_to_response", "keywords"),
            ])
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            error!(target: "letterboxd_buckets::tmdb", "TMDB rejected the request. Check your API key.");
            return Ok(None);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(target: "letterboxd_buckets::tmdb", %tmdb_id, %status, body = %body, "TMDB request failed");
            return Ok(None);
        }

        Ok(Some(resp.json::<MovieResource>().await?))
    }

    /// Keyword and genre names for a film. `None` on any failure, including
    /// an invalid API key, which is logged rather than raised.
    pub async fn details(&self, tmdb_id: &str) -> Option<TmdbDetails> {
        match self.fetch_movie(tmdb_id).await {
            Ok(movie) => movie.map(|m| TmdbDetails {
                keywords: m.keywords.keywords.into_iter().map(|k| k.name).collect(),
                genres: m.genres.into_iter().map(|g| g.name).collect(),
            }),
            Err(e) => {
                warn!(target: "letterboxd_buckets::tmdb", %tmdb_id, error = %e, "TMDB lookup failed");
                None
            }
        }
    }
}
