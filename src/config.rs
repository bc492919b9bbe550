use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use crate::core::catalog::CapTable;
use crate::core::filter::Criteria;
use crate::core::identity::KeyScheme;
use crate::utils::BoxdResult;

impl Config {
    pub fn init() -> Result<Self, config::ConfigError> {
        // get config toml path from env, with default
        let config_path =
            std::env::var("BOXD_CONFIG_PATH").unwrap_or_else(|_| String::from("./config.toml"));
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            // Add in config toml; every key has a default so the file is optional
            .add_source(config::File::with_name(config_path).required(false))
            // Add in settings from the environment (with a prefix of BOXD)
            .add_source(config::Environment::with_prefix("BOXD").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

// ================================================================================================
// Models
// ================================================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logs: LogsConfig,
    pub paths: PathsConfig,
    pub scrape: ScrapeConfig,
    pub criteria: Criteria,
    pub caps: CapsConfig,
    pub report: ReportConfig,
    pub tmdb: TmdbConfig,
    pub github: GithubConfig,
}

// ===============================================================================
// Logs
// ===============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogsConfig {
    pub level: String,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ===============================================================================
// Paths
// ===============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// CSV, stats and log outputs
    pub output_dir: PathBuf,
    pub whitelist: PathBuf,
    pub blacklist: PathBuf,
    pub zero_reviews: PathBuf,
    /// `KEY=VALUE` file holding TMDB_API_KEY and GITHUB_API_KEY
    pub credentials: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("Outputs"),
            whitelist: PathBuf::from("whitelist.xlsx"),
            blacklist: PathBuf::from("blacklist.xlsx"),
            zero_reviews: PathBuf::from("Zero_Reviews.xlsx"),
            credentials: PathBuf::from("credentials.txt"),
        }
    }
}

// ===============================================================================
// Scrape
// ===============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    pub origin: String,
    /// Paginated listing to walk, e.g. films by popularity
    pub list_url: String,
    /// Run name used in logs, ceilings and decision logs
    pub list_name: String,
    pub key_scheme: KeyScheme,
    pub workers: usize,
    pub page_retries: u32,
    pub film_retries: u32,
    pub retry_delay_ms: u64,
    /// Pause between listing pages
    pub page_delay_ms: u64,
    pub max_pages: u32,
    /// Zero-review films are only skipped from this page on
    pub zero_reviews_from_page: u32,
    pub zero_reviews_recheck: f64,
    /// Chance that a complete whitelist payload is blanked for re-validation
    pub audit_probability: f64,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            origin: "https://letterboxd.com".to_string(),
            list_url: "https://letterboxd.com/films/by/popular/".to_string(),
            list_name: "Popular 5000".to_string(),
            key_scheme: KeyScheme::Url,
            workers: 5,
            page_retries: 20,
            film_retries: 3,
            retry_delay_ms: 2000,
            page_delay_ms: 1000,
            max_pages: 1000,
            zero_reviews_from_page: 31,
            zero_reviews_recheck: 0.1,
            audit_probability: 0.02,
        }
    }
}

// ===============================================================================
// Caps
// ===============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CapsConfig {
    pub main: usize,
    pub mpaa: usize,
    pub runtime: usize,
    pub continent: usize,
    /// Per-bucket caps keyed by bucket name ("G", "Africa", "240_Minutes_or_Greater")
    pub overrides: HashMap<String, usize>,
}

impl Default for CapsConfig {
    fn default() -> Self {
        Self {
            main: 5000,
            mpaa: 250,
            runtime: 250,
            continent: 250,
            overrides: [
                ("G", 200),
                ("NC-17", 25),
                ("180_Minutes_or_Greater", 75),
                ("240_Minutes_or_Greater", 5),
                ("Africa", 20),
                ("Oceania", 150),
                ("South America", 100),
            ]
            .into_iter()
            .map(|(name, cap)| (name.to_string(), cap))
            .collect(),
        }
    }
}

impl CapsConfig {
    pub fn table(&self) -> CapTable {
        CapTable {
            main: self.main,
            mpaa: self.mpaa,
            runtime: self.runtime,
            continent: self.continent,
            overrides: self.overrides.clone(),
        }
    }
}

// ===============================================================================
// Report
// ===============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Letterboxd import takes at most this many rows per file
    pub chunk_size: usize,
    pub include_link: bool,
    pub main_stem: String,
    /// `{count}` is replaced with the number of films
    pub main_title: String,
    /// `{count}` and `{name}` are replaced
    pub group_title: String,
    pub ceilings_file: String,
    pub unmapped_file: String,
    pub approved_log: String,
    pub denied_log: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1900,
            include_link: true,
            main_stem: "popular_filtered_movie_titles".to_string(),
            main_title: "The Top {count} Most Popular Narrative Feature Films on Letterboxd.".to_string(),
            group_title: "The Top {count} Most Popular {name} Films".to_string(),
            ceilings_file: "Output_Ceilings.txt".to_string(),
            unmapped_file: "unknown_countries.txt".to_string(),
            approved_log: "unfiltered_approved.csv".to_string(),
            denied_log: "unfiltered_denied.csv".to_string(),
        }
    }
}

// ===============================================================================
// TMDB / GitHub
// ===============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TmdbConfig {
    pub base_url: String,
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            base_url: crate::core::tmdb::DEFAULT_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    pub api_url: String,
    /// `owner/name`
    pub repo: String,
    pub branch: Option<String>,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: crate::core::github::DEFAULT_API_URL.to_string(),
            repo: "bigbadraj/Letterboxd-List-JSONs".to_string(),
            branch: None,
        }
    }
}

// ===============================================================================
// Credentials
// ===============================================================================

/// API keys from the credentials file. They are read into this struct only
/// and never exported to the process environment.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub tmdb_api_key: String,
    pub github_api_key: String,
}

impl Credentials {
    /// Missing file is not an error: the keys stay empty and a warning is logged.
    pub fn load(path: &Path) -> BoxdResult<Self> {
        let iter = match dotenvy::from_path_iter(path) {
            Ok(iter) => iter,
            Err(e) if e.not_found() => {
                warn!(path = %path.display(), "credentials file not found");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        let mut creds = Self::default();
        for item in iter {
            let (key, value) = item?;
            match key.trim() {
                "TMDB_API_KEY" => creds.tmdb_api_key = value.trim().to_string(),
                "GITHUB_API_KEY" => creds.github_api_key = value.trim().to_string(),
                _ => {}
            }
        }
        Ok(creds)
    }
}
