use tracing::info;

use crate::app::common::film_client;
use crate::config::Config;
use crate::core::heal::{self, DetailSource, Healed};
use crate::core::identity::{identity_key, key_from_parts, IdentityKey, KeyScheme};
use crate::core::letterboxd::absolute_url;
use crate::core::overrides::{Blacklist, Payload, Whitelist};
use crate::models::MovieRecord;
use crate::utils::{BoxdResult, Error};

/// Where a film stands against the override sheets.
#[derive(Debug, Clone, PartialEq)]
pub enum Standing {
    Whitelisted(Healed),
    Blacklisted(String),
    Unlisted,
}

/// The film's key, plus the page record when building the key needed one.
async fn key_for_url(
    scheme: KeyScheme,
    url: &str,
    source: &dyn DetailSource,
) -> BoxdResult<(IdentityKey, Option<MovieRecord>)> {
    let (key, fetched) = match scheme {
        KeyScheme::Url => (key_from_parts(scheme, "", "", Some(url)), None),
        // Title and year only come from the page itself.
        KeyScheme::TitleYear => {
            let mut record = source.fetch_detail(url).await?;
            if record.source_url.is_none() {
                record.source_url = Some(url.to_string());
            }
            (identity_key(&record, scheme), Some(record))
        }
    };
    let key = key.ok_or_else(|| Error::Other(format!("no identity for {url}")))?;
    Ok((key, fetched))
}

/// Look a film up on both sheets. An incomplete whitelist payload is
/// re-scraped and stored on the way.
pub async fn standing(
    whitelist: &mut Whitelist,
    blacklist: &Blacklist,
    scheme: KeyScheme,
    url: &str,
    source: &dyn DetailSource,
) -> BoxdResult<Standing> {
    let (key, fetched) = key_for_url(scheme, url, source).await?;

    if let Some(payload) = whitelist.payload(&key) {
        match &payload {
            Payload::Complete(_) => info!(target: "letterboxd_buckets::check", %key, "Whitelist payload is complete"),
            Payload::Partial(partial) => info!(target: "letterboxd_buckets::check", %key, missing = ?partial.missing_fields(), "Whitelist payload is incomplete"),
            Payload::Empty => info!(target: "letterboxd_buckets::check", %key, "Whitelist payload is empty"),
        }
        // The page was already fetched for the key, so store it directly.
        if let Some(record) = fetched.filter(|_| !payload.is_complete()) {
            whitelist.store(&record)?;
            info!(target: "letterboxd_buckets::check", film = %record.display_name(), "Updated whitelist data");
            return Ok(Standing::Whitelisted(Healed::Refreshed(record)));
        }
        if let Some(healed) = heal::validate_and_refresh(whitelist, &key, source).await? {
            return Ok(Standing::Whitelisted(healed));
        }
    }

    if let Some(reason) = blacklist.reason(&key) {
        return Ok(Standing::Blacklisted(reason.to_string()));
    }
    Ok(Standing::Unlisted)
}

pub async fn run(config: &Config, url: &str) -> BoxdResult<Standing> {
    let scheme = config.scrape.key_scheme;
    let client = film_client(config)?;
    let url = absolute_url(client.origin(), url);

    let mut whitelist = Whitelist::load(&config.paths.whitelist, scheme)?;
    let blacklist = Blacklist::load(&config.paths.blacklist, scheme)?;
    let standing = standing(&mut whitelist, &blacklist, scheme, &url, &client).await?;

    println!("Film: {url}");
    match &standing {
        Standing::Whitelisted(Healed::Cached(record)) => {
            println!("  Whitelisted: {}", record.display_name());
        }
        Standing::Whitelisted(Healed::Refreshed(record)) => {
            println!("  Whitelisted: {} (data refreshed)", record.display_name());
        }
        Standing::Blacklisted(reason) => println!("  Blacklisted: {reason}"),
        Standing::Unlisted => println!("  Not on the whitelist or the blacklist"),
    }
    Ok(standing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::overrides::OverrideRow;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedSource {
        record: MovieRecord,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DetailSource for FixedSource {
        async fn fetch_detail(&self, _url: &str) -> BoxdResult<MovieRecord> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.record.clone())
        }
    }

    fn full_record(url: &str) -> MovieRecord {
        let mut record = MovieRecord::new("Thief", "1981").with_url(url);
        record.tmdb_id = Some("11524".into());
        record.runtime_minutes = Some(123);
        record.rating_count = 40_000;
        record.languages.insert("English".into());
        record.countries.insert("USA".into());
        record.directors.push("Michael Mann".into());
        record.genres.insert("Crime".into());
        record.studios.insert("United Artists".into());
        record.actors.push("James Caan".into());
        record
    }

    #[tokio::test]
    async fn incomplete_whitelist_entry_is_healed() {
        let dir = tempfile::tempdir().unwrap();
        let url = "https://letterboxd.com/film/thief/";
        let mut whitelist = Whitelist::load(dir.path().join("w.xlsx"), KeyScheme::Url).unwrap();
        whitelist.store(&MovieRecord::new("Thief", "1981").with_url(url)).unwrap();
        let blacklist = Blacklist::load(dir.path().join("b.xlsx"), KeyScheme::Url).unwrap();
        let source = FixedSource {
            record: full_record(url),
            calls: AtomicUsize::new(0),
        };

        let first = standing(&mut whitelist, &blacklist, KeyScheme::Url, url, &source).await.unwrap();
        assert!(matches!(first, Standing::Whitelisted(Healed::Refreshed(_))));

        let second = standing(&mut whitelist, &blacklist, KeyScheme::Url, url, &source).await.unwrap();
        assert!(matches!(second, Standing::Whitelisted(Healed::Cached(_))));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn blacklisted_and_unlisted_films() {
        let dir = tempfile::tempdir().unwrap();
        let mut whitelist = Whitelist::load(dir.path().join("w.xlsx"), KeyScheme::TitleYear).unwrap();
        let mut blacklist = Blacklist::load(dir.path().join("b.xlsx"), KeyScheme::TitleYear).unwrap();
        blacklist
            .record(OverrideRow {
                title: "Thief".into(),
                year: "1981".into(),
                value: "Short runtime of 9 minutes".into(),
                link: None,
            })
            .unwrap();
        let source = FixedSource {
            record: full_record("https://letterboxd.com/film/thief/"),
            calls: AtomicUsize::new(0),
        };

        let found = standing(&mut whitelist, &blacklist, KeyScheme::TitleYear, "https://letterboxd.com/film/thief/", &source)
            .await
            .unwrap();
        assert_eq!(found, Standing::Blacklisted("Short runtime of 9 minutes".into()));

        let empty = Blacklist::load(dir.path().join("empty.xlsx"), KeyScheme::TitleYear).unwrap();
        let found = standing(&mut whitelist, &empty, KeyScheme::TitleYear, "https://letterboxd.com/film/thief/", &source)
            .await
            .unwrap();
        assert_eq!(found, Standing::Unlisted);
    }

    #[tokio::test]
    async fn title_year_lookup_fetches_the_page_once() {
        let dir = tempfile::tempdir().unwrap();
        let url = "https://letterboxd.com/film/thief/";
        let mut whitelist = Whitelist::load(dir.path().join("w.xlsx"), KeyScheme::TitleYear).unwrap();
        whitelist.store(&MovieRecord::new("Thief", "1981").with_url(url)).unwrap();
        let blacklist = Blacklist::load(dir.path().join("b.xlsx"), KeyScheme::TitleYear).unwrap();
        let source = FixedSource {
            record: full_record(url),
            calls: AtomicUsize::new(0),
        };

        let found = standing(&mut whitelist, &blacklist, KeyScheme::TitleYear, url, &source).await.unwrap();
        assert!(matches!(found, Standing::Whitelisted(Healed::Refreshed(_))));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        let key = identity_key(&full_record(url), KeyScheme::TitleYear).unwrap();
        assert!(whitelist.payload(&key).is_some_and(|p| p.is_complete()));
    }
}
