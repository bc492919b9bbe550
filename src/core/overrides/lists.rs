use std::path::Path;

use rand::Rng;
use tracing::{debug, info};

use super::payload::{PartialMovie, Payload};
use super::sheet::{OverrideRow, OverrideSheet, SheetKind, Upsert};
use crate::core::identity::{IdentityKey, KeyScheme};
use crate::models::MovieRecord;
use crate::utils::BoxdResult;

/// Films forced into the lists, each with a cached metadata payload.
#[derive(Debug)]
pub struct Whitelist {
    sheet: OverrideSheet,
}

impl Whitelist {
    pub fn load(path: impl AsRef<Path>, scheme: KeyScheme) -> BoxdResult<Self> {
        Ok(Self {
            sheet: OverrideSheet::load(path, SheetKind::Whitelist, scheme)?,
        })
    }

    #[cfg(test)]
    pub fn key_for(&self, record: &MovieRecord) -> Option<IdentityKey> {
        crate::core::identity::identity_key(record, self.sheet.scheme())
    }

    pub fn is_listed(&self, key: &IdentityKey) -> bool {
        self.sheet.is_listed(key)
    }

    /// The cached payload for `key`, or `None` when the film is not listed.
    /// Never touches the network; repairing an incomplete payload is
    /// [`crate::core::heal::validate_and_refresh`]'s job.
    pub fn payload(&self, key: &IdentityKey) -> Option<Payload> {
        self.sheet
            .get(key)
            .map(|row| Payload::parse(&row.value, row.link.as_deref()))
    }

    /// The row as stored, for display.
    pub fn row(&self, key: &IdentityKey) -> Option<&OverrideRow> {
        self.sheet.get(key)
    }

    /// Store `record` as the payload of its row, inserting the row if needed.
    pub fn store(&mut self, record: &MovieRecord) -> BoxdResult<Upsert> {
        let outcome = self.sheet.upsert(OverrideRow {
            title: record.title.clone(),
            year: record.year.clone(),
            value: PartialMovie::from_record(record).to_json(),
            link: record.source_url.clone(),
        })?;
        debug!(target: "letterboxd_buckets::overrides", film = %record.display_name(), ?outcome, "Whitelist payload stored");
        Ok(outcome)
    }

    /// Blank the payload of a listed film so the next run re-validates it.
    pub fn clear(&mut self, key: &IdentityKey) -> BoxdResult<bool> {
        let Some(row) = self.sheet.get(key).cloned() else {
            return Ok(false);
        };
        self.sheet.upsert(OverrideRow {
            value: "{}".to_string(),
            ..row
        })?;
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.sheet.len()
    }
}

/// Films permanently rejected, each with the reason.
#[derive(Debug)]
pub struct Blacklist {
    sheet: OverrideSheet,
}

impl Blacklist {
    pub fn load(path: impl AsRef<Path>, scheme: KeyScheme) -> BoxdResult<Self> {
        Ok(Self {
            sheet: OverrideSheet::load(path, SheetKind::Blacklist, scheme)?,
        })
    }

    #[cfg(test)]
    pub fn key_for(&self, record: &MovieRecord) -> Option<IdentityKey> {
        crate::core::identity::identity_key(record, self.sheet.scheme())
    }

    pub fn reason(&self, key: &IdentityKey) -> Option<&str> {
        self.sheet.get(key).map(|row| row.value.as_str())
    }

    /// Add a rejection. A film already on the list keeps its first reason;
    /// returns whether a row was written.
    pub fn record(&mut self, row: OverrideRow) -> BoxdResult<bool> {
        match self.sheet.key_of(&row) {
            Some(key) if !self.sheet.is_listed(&key) => {
                info!(target: "letterboxd_buckets::overrides", title = %row.title, year = %row.year, reason = %row.value, "Added to blacklist");
                Ok(self.sheet.upsert(row)? == Upsert::Inserted)
            }
            _ => Ok(false),
        }
    }

    pub fn len(&self) -> usize {
        self.sheet.len()
    }
}

/// Films seen with no ratings at all, skipped on deep listing pages.
#[derive(Debug)]
pub struct ZeroReviews {
    sheet: OverrideSheet,
}

impl ZeroReviews {
    pub fn load(path: impl AsRef<Path>, scheme: KeyScheme) -> BoxdResult<Self> {
        Ok(Self {
            sheet: OverrideSheet::load(path, SheetKind::ZeroReviews, scheme)?,
        })
    }

    #[cfg(test)]
    pub fn key_for(&self, record: &MovieRecord) -> Option<IdentityKey> {
        crate::core::identity::identity_key(record, self.sheet.scheme())
    }

    pub fn record(&mut self, record: &MovieRecord) -> BoxdResult<bool> {
        let row = OverrideRow {
            title: record.title.clone(),
            year: record.year.clone(),
            value: String::new(),
            link: record.source_url.clone(),
        };
        match self.sheet.key_of(&row) {
            Some(key) if !self.sheet.is_listed(&key) => {
                Ok(self.sheet.upsert(row)? == Upsert::Inserted)
            }
            _ => Ok(false),
        }
    }

    /// Whether `key` is listed. A listed film is dropped from the sheet with
    /// probability `recheck_p` so it gets looked at again next time, but this
    /// call still reports it as listed.
    pub fn check<R: Rng + ?Sized>(
        &mut self,
        key: &IdentityKey,
        rng: &mut R,
        recheck_p: f64,
    ) -> BoxdResult<bool> {
        if !self.sheet.is_listed(key) {
            return Ok(false);
        }
        if rng.random_bool(recheck_p.clamp(0.0, 1.0)) {
            self.sheet.remove(key)?;
            info!(target: "letterboxd_buckets::overrides", %key, "Removed from zero reviews list");
        }
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.sheet.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn heat() -> MovieRecord {
        let mut m = MovieRecord::new("Heat", "1995").with_url("https://letterboxd.com/film/heat-1995/");
        m.tmdb_id = Some("949".into());
        m.runtime_minutes = Some(170);
        m.rating_count = 412_000;
        m.languages = ["English".to_string()].into_iter().collect();
        m.countries = ["USA".to_string()].into_iter().collect();
        m.directors = vec!["Michael Mann".into()];
        m.genres = ["Crime".to_string()].into_iter().collect();
        m.studios = ["Regency Enterprises".to_string()].into_iter().collect();
        m.actors = vec!["Al Pacino".into()];
        m
    }

    #[test]
    fn whitelist_store_then_clear() {
        let dir = tempfile::tempdir().unwrap();
        let mut whitelist = Whitelist::load(dir.path().join("whitelist.xlsx"), KeyScheme::Url).unwrap();
        let record = heat();
        let key = whitelist.key_for(&record).unwrap();

        assert!(whitelist.payload(&key).is_none());
        assert_eq!(whitelist.store(&record).unwrap(), Upsert::Inserted);
        assert_eq!(whitelist.payload(&key), Some(Payload::Complete(record)));

        assert!(whitelist.clear(&key).unwrap());
        assert!(whitelist.is_listed(&key));
        assert_eq!(whitelist.payload(&key), Some(Payload::Empty));
    }

    #[test]
    fn blacklist_keeps_first_reason() {
        let dir = tempfile::tempdir().unwrap();
        let mut blacklist = Blacklist::load(dir.path().join("blacklist.xlsx"), KeyScheme::Url).unwrap();
        let row = |reason: &str| OverrideRow {
            title: "Cats".into(),
            year: "2019".into(),
            value: reason.into(),
            link: Some("https://letterboxd.com/film/cats-2019/".into()),
        };

        assert!(blacklist.record(row("Insufficient runtime")).unwrap());
        assert!(!blacklist.record(row("Something else")).unwrap());
        let key = blacklist.key_for(&MovieRecord::new("Cats", "2019").with_url("https://letterboxd.com/film/cats-2019/")).unwrap();
        assert_eq!(blacklist.reason(&key), Some("Insufficient runtime"));
        assert_eq!(blacklist.len(), 1);
    }

    #[test]
    fn zero_reviews_recheck_removes_but_reports_listed() {
        let dir = tempfile::tempdir().unwrap();
        let mut zero = ZeroReviews::load(dir.path().join("zero.xlsx"), KeyScheme::Url).unwrap();
        let film = MovieRecord::new("Obscure", "2011").with_url("https://letterboxd.com/film/obscure/");
        let key = zero.key_for(&film).unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        assert!(zero.record(&film).unwrap());
        assert!(!zero.record(&film).unwrap());
        assert!(zero.check(&key, &mut rng, 0.0).unwrap());
        assert_eq!(zero.len(), 1);
        assert!(zero.check(&key, &mut rng, 1.0).unwrap());
        assert_eq!(zero.len(), 0);
        assert!(!zero.check(&key, &mut rng, 1.0).unwrap());
    }
}
