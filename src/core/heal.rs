use async_trait::async_trait;
use rand::Rng;
use tracing::{info, warn};

use crate::core::identity::IdentityKey;
use crate::core::overrides::{Payload, Whitelist};
use crate::models::MovieRecord;
use crate::utils::{BoxdResult, Error};

/// Something that can produce a full record for a film page. The scraper
/// implements it over HTTP; tests implement it in memory.
#[async_trait]
pub trait DetailSource: Send + Sync {
    async fn fetch_detail(&self, url: &str) -> BoxdResult<MovieRecord>;
}

/// Outcome of [`validate_and_refresh`].
#[derive(Debug, Clone, PartialEq)]
pub enum Healed {
    /// The cached payload was complete and used as-is.
    Cached(MovieRecord),
    /// The payload was incomplete; this record was fetched and stored over it.
    Refreshed(MovieRecord),
}

impl Healed {
    pub fn into_record(self) -> MovieRecord {
        match self {
            Healed::Cached(record) | Healed::Refreshed(record) => record,
        }
    }
}

/// Resolve a whitelisted film to a usable record. A complete payload is
/// returned without any network call; anything else is re-scraped through
/// `source` and the fresh record overwrites the stored payload.
///
/// Returns `Ok(None)` when `key` is not on the whitelist.
pub async fn validate_and_refresh(
    whitelist: &mut Whitelist,
    key: &IdentityKey,
    source: &dyn DetailSource,
) -> BoxdResult<Option<Healed>> {
    let Some(payload) = whitelist.payload(key) else {
        return Ok(None);
    };
    if let Payload::Complete(record) = payload {
        return Ok(Some(Healed::Cached(record)));
    }

    if let Payload::Partial(partial) = &payload {
        info!(target: "letterboxd_buckets::heal", %key, missing = ?partial.missing_fields(), "Incomplete whitelist payload, re-scraping");
    } else {
        info!(target: "letterboxd_buckets::heal", %key, "Empty whitelist payload, re-scraping");
    }

    let url = whitelist
        .row(key)
        .and_then(|row| row.link.clone())
        .ok_or_else(|| Error::Other(format!("whitelist entry {key} has no link to re-scrape")))?;

    let mut fresh = source.fetch_detail(&url).await?;
    if fresh.source_url.is_none() {
        fresh.source_url = Some(url);
    }
    whitelist.store(&fresh)?;
    info!(target: "letterboxd_buckets::heal", film = %fresh.display_name(), "Updated whitelist data");
    Ok(Some(Healed::Refreshed(fresh)))
}

/// With probability `p`, blank a complete payload so it is re-validated on
/// the next run. Returns whether an audit was scheduled.
pub fn maybe_schedule_audit<R: Rng + ?Sized>(
    whitelist: &mut Whitelist,
    key: &IdentityKey,
    rng: &mut R,
    p: f64,
) -> BoxdResult<bool> {
    if !whitelist.payload(key).is_some_and(|payload| payload.is_complete()) {
        return Ok(false);
    }
    if !rng.random_bool(p.clamp(0.0, 1.0)) {
        return Ok(false);
    }
    if !whitelist.clear(key)? {
        warn!(target: "letterboxd_buckets::heal", %key, "Audit requested for a film that vanished from the whitelist");
        return Ok(false);
    }
    info!(target: "letterboxd_buckets::heal", %key, "Random data audit scheduled");
    Ok(true)
}
