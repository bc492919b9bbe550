use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use tracing::Level;

use crate::config::Config;
use crate::core::letterboxd::LetterboxdClient;
use crate::utils::BoxdResult;

pub fn init_logging(config: &Config) {
    tracing_subscriber::fmt()
        .with_max_level(Level::from_str(&config.logs.level).unwrap_or(Level::INFO))
        .init();
}

pub fn ensure_output_dir(config: &Config) -> Result<(), String> {
    let output_dir = config.paths.output_dir.as_path();
    if output_dir.exists() {
        if !output_dir.is_dir() {
            return Err(format!(
                "Configured output_dir '{}' exists but is not a directory",
                output_dir.display()
            ));
        }
        return Ok(());
    }

    std::fs::create_dir_all(output_dir).map_err(|e| {
        format!(
            "Failed to create configured output_dir '{}': {}",
            output_dir.display(),
            e
        )
    })?;
    tracing::info!("Created output_dir directory: '{}'", output_dir.display());
    Ok(())
}

/// Client for listing pages. Film pages use [`film_client`] with fewer retries.
pub fn listing_client(config: &Config) -> BoxdResult<LetterboxdClient> {
    LetterboxdClient::new(
        config.scrape.origin.clone(),
        config.scrape.page_retries,
        Duration::from_millis(config.scrape.retry_delay_ms),
    )
}

pub fn film_client(config: &Config) -> BoxdResult<LetterboxdClient> {
    LetterboxdClient::new(
        config.scrape.origin.clone(),
        config.scrape.film_retries,
        Duration::from_millis(config.scrape.retry_delay_ms),
    )
}

/// Fill `{count}` and `{name}` in a report title template.
pub fn fill_title(template: &str, count: usize, name: &str) -> String {
    template
        .replace("{count}", &count.to_string())
        .replace("{name}", name)
}

pub fn output_path(config: &Config, file: impl AsRef<Path>) -> std::path::PathBuf {
    config.paths.output_dir.join(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_title_replaces_both_placeholders() {
        assert_eq!(
            fill_title("The Top {count} Most Popular {name} Films", 250, "PG-13"),
            "The Top 250 Most Popular PG-13 Films"
        );
        assert_eq!(fill_title("No placeholders", 3, "x"), "No placeholders");
    }

    #[test]
    fn output_dir_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.paths.output_dir = dir.path().join("nested").join("out");

        ensure_output_dir(&config).unwrap();
        assert!(config.paths.output_dir.is_dir());
        assert_eq!(
            output_path(&config, "stats.txt"),
            config.paths.output_dir.join("stats.txt")
        );
    }

    #[test]
    fn output_dir_that_is_a_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("taken");
        std::fs::write(&file, "x").unwrap();
        let mut config = Config::default();
        config.paths.output_dir = file;

        assert!(ensure_output_dir(&config).is_err());
    }
}
