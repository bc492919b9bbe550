use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{error, info, warn};

use crate::app::common::{film_client, listing_client, output_path};
use crate::config::{Config, Credentials};
use crate::core::github::GithubClient;
use crate::core::letterboxd::{absolute_url, parse_film_id, parse_film_page, LetterboxdClient, ListingEntry};
use crate::core::pool::fan_out;
use crate::utils::text::format_elapsed;
use crate::utils::{BoxdResult, Error};

/// One film as stored in the JSON mirror.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MirrorEntry {
    #[serde(rename = "ListNumber", skip_serializing_if = "Option::is_none")]
    pub list_number: Option<u32>,
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Year")]
    pub year: String,
    #[serde(rename = "ID")]
    pub id: String,
}

/// `film_titles_{slug}.json` for a list URL.
pub fn default_file_name(list_url: &str) -> String {
    let slug = list_url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    format!("film_titles_{slug}.json")
}

/// Ranked lists come out in list order, unranked ones in listing order.
pub fn order_entries(mut entries: Vec<(usize, MirrorEntry)>) -> Vec<MirrorEntry> {
    if entries.iter().any(|(_, e)| e.list_number.is_some()) {
        entries.sort_by_key(|(pos, e)| (e.list_number.unwrap_or(u32::MAX), *pos));
    } else {
        entries.sort_by_key(|(pos, _)| *pos);
    }
    entries.into_iter().map(|(_, e)| e).collect()
}

pub fn to_json(entries: &[MirrorEntry]) -> BoxdResult<String> {
    Ok(serde_json::to_string_pretty(entries)?)
}

async fn fetch_entry(films: &LetterboxdClient, entry: ListingEntry) -> Option<MirrorEntry> {
    let html = match films.fetch_html(&entry.url).await {
        Ok(html) => html,
        Err(e) => {
            warn!(target: "letterboxd_buckets::mirror", url = %entry.url, error = %e, "Film page failed");
            return None;
        }
    };
    let record = parse_film_page(&html, &entry.url);
    Some(MirrorEntry {
        list_number: entry.list_number,
        title: record.title,
        year: record.year,
        id: parse_film_id(&html).unwrap_or_else(|| "Unknown".to_string()),
    })
}

/// Every film of a list, in output order.
pub async fn collect(config: &Config, list_url: &str) -> BoxdResult<Vec<MirrorEntry>> {
    let listing = listing_client(config)?;
    let films = Arc::new(film_client(config)?);
    let list_url = absolute_url(listing.origin(), list_url);

    let mut found = Vec::new();
    let mut position = 0;
    for page in 1..=config.scrape.max_pages {
        let url = LetterboxdClient::page_url(&list_url, page);
        let listing_page = match listing.fetch_listing(&url).await {
            Ok(p) => p,
            Err(e) => {
                error!(target: "letterboxd_buckets::mirror", %url, error = %e, "Giving up on listing page");
                break;
            }
        };
        info!(target: "letterboxd_buckets::mirror", page, films = listing_page.entries.len(), "Mirroring page");

        let jobs: Vec<(usize, ListingEntry)> = listing_page
            .entries
            .into_iter()
            .enumerate()
            .map(|(i, entry)| (position + i, entry))
            .collect();
        position += jobs.len();
        let films = Arc::clone(&films);
        let mut rx = fan_out(jobs, config.scrape.workers, move |(pos, entry): (usize, ListingEntry)| {
            let films = Arc::clone(&films);
            async move { fetch_entry(&films, entry).await.map(|e| (pos, e)) }
        });
        let mut page_entries = Vec::new();
        while let Some(out) = rx.recv().await {
            if let Some(entry) = out {
                page_entries.push(entry);
            }
        }
        found.extend(page_entries);

        if !listing_page.has_next {
            break;
        }
        tokio::time::sleep(Duration::from_millis(config.scrape.page_delay_ms)).await;
    }

    Ok(order_entries(found))
}

/// Scrape a list and push it as JSON. With `push` off the JSON is only
/// written under the output directory.
pub async fn run(
    config: &Config,
    credentials: &Credentials,
    list_url: &str,
    file_name: Option<&str>,
    push: bool,
) -> BoxdResult<usize> {
    let started = Instant::now();
    let file_name = file_name
        .map(str::to_string)
        .unwrap_or_else(|| default_file_name(list_url));

    let entries = collect(config, list_url).await?;
    let json = to_json(&entries)?;

    if push {
        if credentials.github_api_key.is_empty() {
            return Err(Error::Other("GITHUB_API_KEY is not set".to_string()));
        }
        let github = GithubClient::new(
            config.github.api_url.clone(),
            config.github.repo.clone(),
            config.github.branch.clone(),
            credentials.github_api_key.clone(),
        );
        let outcome = github.put_file(&file_name, &json).await?;
        println!("Saved {} films to GitHub: {file_name} ({outcome:?})", entries.len());
    } else {
        let path = output_path(config, &file_name);
        std::fs::create_dir_all(&config.paths.output_dir)?;
        std::fs::write(&path, &json)?;
        println!("Saved {} films to {}", entries.len(), path.display());
    }
    println!("Total time elapsed: {}", format_elapsed(started.elapsed()));
    Ok(entries.len())
}
