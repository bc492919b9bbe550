use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, error, info, warn};

use crate::app::common::{fill_title, film_client, listing_client, output_path};
use crate::config::{Config, Credentials};
use crate::core::catalog::{BucketGroup, Catalog};
use crate::core::filter::{Criteria, Verdict};
use crate::core::heal::{self, Healed};
use crate::core::identity::{key_from_parts, IdentityKey};
use crate::core::letterboxd::{LetterboxdClient, ListingEntry};
use crate::core::overrides::{Blacklist, OverrideRow, Whitelist, ZeroReviews};
use crate::core::pool::fan_out;
use crate::core::report::{self, bucket_stem, Decision};
use crate::core::tmdb::{TmdbClient, TmdbDetails};
use crate::models::MovieRecord;
use crate::utils::text::format_elapsed;
use crate::utils::{BoxdResult, Error};

/// Counters for one run, printed at the end.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub pages: u32,
    pub seen: usize,
    pub duplicates: usize,
    pub accepted: usize,
    pub whitelisted: usize,
    pub refreshed: usize,
    pub audits: usize,
    pub rejected: usize,
    pub blacklisted: usize,
    pub zero_reviews: usize,
    pub written: Vec<PathBuf>,
}

/// A listing entry that needs its film page scraped.
struct Candidate {
    entry: ListingEntry,
    key: IdentityKey,
}

/// What a worker brings back for the consumer to judge.
struct Fetched {
    candidate: Candidate,
    record: BoxdResult<MovieRecord>,
    tmdb: Option<TmdbDetails>,
}

/// One scraping run over a paginated listing.
///
/// Workers only fetch. Everything that mutates state (override sheets, the
/// catalog, decision logs) happens on the task driving [`Scraper::run`].
pub struct Scraper<'a> {
    config: &'a Config,
    listing: LetterboxdClient,
    films: Arc<LetterboxdClient>,
    tmdb: Arc<TmdbClient>,
    criteria: Arc<Criteria>,
    whitelist: Whitelist,
    blacklist: Blacklist,
    zero_reviews: ZeroReviews,
    catalog: Catalog,
    seen: HashSet<IdentityKey>,
    approved: Vec<Decision>,
    denied: Vec<Decision>,
    rng: StdRng,
    summary: RunSummary,
}

impl<'a> Scraper<'a> {
    pub fn new(config: &'a Config, credentials: &Credentials) -> BoxdResult<Self> {
        let scheme = config.scrape.key_scheme;
        if credentials.tmdb_api_key.is_empty() {
            warn!(target: "letterboxd_buckets::scrape", "No TMDB API key configured, fresh films will fail the TMDB check");
        }

        Ok(Self {
            config,
            listing: listing_client(config)?,
            films: Arc::new(film_client(config)?),
            tmdb: Arc::new(TmdbClient::new(
                config.tmdb.base_url.clone(),
                credentials.tmdb_api_key.clone(),
            )),
            criteria: Arc::new(config.criteria.clone()),
            whitelist: Whitelist::load(&config.paths.whitelist, scheme)?,
            blacklist: Blacklist::load(&config.paths.blacklist, scheme)?,
            zero_reviews: ZeroReviews::load(&config.paths.zero_reviews, scheme)?,
            catalog: Catalog::new(&config.scrape.list_name, &config.caps.table(), scheme),
            seen: HashSet::new(),
            approved: Vec::new(),
            denied: Vec::new(),
            rng: StdRng::from_os_rng(),
            summary: RunSummary::default(),
        })
    }

    /// Replace the random source used for audits and zero-review rechecks.
    #[cfg(test)]
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[cfg(test)]
    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    pub fn into_summary(self) -> RunSummary {
        self.summary
    }

    /// Walk the listing until the main list is full, the page limit is hit or
    /// there is no next page.
    pub async fn run(&mut self) -> BoxdResult<()> {
        let config = self.config;
        let scrape = &config.scrape;
        info!(
            target: "letterboxd_buckets::scrape",
            list = %scrape.list_name,
            whitelist = self.whitelist.len(),
            blacklist = self.blacklist.len(),
            zero_reviews = self.zero_reviews.len(),
            "Starting scrape"
        );

        for page in 1..=scrape.max_pages {
            if self.catalog.main().is_full() {
                info!(target: "letterboxd_buckets::scrape", limit = self.catalog.main().cap(), "Main list is full, stopping");
                break;
            }

            let url = LetterboxdClient::page_url(&scrape.list_url, page);
            let listing = match self.listing.fetch_listing(&url).await {
                Ok(listing) => listing,
                Err(e) => {
                    error!(target: "letterboxd_buckets::scrape", %url, error = %e, "Giving up on listing page");
                    break;
                }
            };
            self.summary.pages = page;
            info!(target: "letterboxd_buckets::scrape", page, films = listing.entries.len(), accepted = self.catalog.accepted(), "Scraping page");

            let mut candidates = Vec::new();
            for entry in listing.entries {
                if let Some(candidate) = self.triage(entry, page).await? {
                    candidates.push(candidate);
                }
            }
            self.fetch_and_judge(candidates).await?;

            if !listing.has_next {
                info!(target: "letterboxd_buckets::scrape", page, "No next page");
                break;
            }
            tokio::time::sleep(Duration::from_millis(scrape.page_delay_ms)).await;
        }
        Ok(())
    }

    /// Settle everything that can be settled without a film page. Returns the
    /// entry when it still has to be scraped.
    async fn triage(&mut self, entry: ListingEntry, page: u32) -> BoxdResult<Option<Candidate>> {
        let scrape = &self.config.scrape;
        let year = entry.year.clone().unwrap_or_default();
        let Some(key) = key_from_parts(scrape.key_scheme, &entry.title, &year, Some(&entry.url)) else {
            debug!(target: "letterboxd_buckets::scrape", url = %entry.url, "Listing entry has no usable identity");
            return Ok(None);
        };

        self.summary.seen += 1;
        if !self.seen.insert(key.clone()) {
            self.summary.duplicates += 1;
            return Ok(None);
        }

        if page >= scrape.zero_reviews_from_page
            && self
                .zero_reviews
                .check(&key, &mut self.rng, scrape.zero_reviews_recheck)?
        {
            debug!(target: "letterboxd_buckets::scrape", film = %entry.title, "On the zero reviews list");
            self.summary.zero_reviews += 1;
            return Ok(None);
        }

        if let Some(reason) = self.blacklist.reason(&key) {
            debug!(target: "letterboxd_buckets::scrape", film = %entry.title, reason, "Blacklisted");
            self.summary.blacklisted += 1;
            return Ok(None);
        }

        if self.whitelist.is_listed(&key) {
            self.take_whitelisted(&entry, &key).await?;
            return Ok(None);
        }

        Ok(Some(Candidate { entry, key }))
    }

    /// Whitelisted films skip the filter. Their cached payload is used when
    /// complete, otherwise the film page is re-scraped into the sheet.
    async fn take_whitelisted(&mut self, entry: &ListingEntry, key: &IdentityKey) -> BoxdResult<()> {
        let healed = match heal::validate_and_refresh(&mut self.whitelist, key, &*self.films).await {
            Ok(Some(healed)) => healed,
            Ok(None) => return Ok(()),
            Err(e @ (Error::HttpRequestError(_) | Error::Other(_))) => {
                warn!(target: "letterboxd_buckets::scrape", film = %entry.title, error = %e, "Could not refresh whitelist data");
                self.deny(
                    &entry.title,
                    entry.year.as_deref().unwrap_or(""),
                    Some(&entry.url),
                    format!("Error collecting data: {e}"),
                );
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        self.summary.whitelisted += 1;
        if matches!(healed, Healed::Refreshed(_)) {
            self.summary.refreshed += 1;
        }
        self.accept(healed.into_record());

        if heal::maybe_schedule_audit(
                &mut self.whitelist,
                key,
                &mut self.rng,
                self.config.scrape.audit_probability,
            )?
        {
            self.summary.audits += 1;
        }
        Ok(())
    }

    async fn fetch_and_judge(&mut self, candidates: Vec<Candidate>) -> BoxdResult<()> {
        if candidates.is_empty() {
            return Ok(());
        }

        let films = Arc::clone(&self.films);
        let tmdb = Arc::clone(&self.tmdb);
        let criteria = Arc::clone(&self.criteria);
        let mut rx = fan_out(candidates, self.config.scrape.workers, move |candidate: Candidate| {
            let films = Arc::clone(&films);
            let tmdb = Arc::clone(&tmdb);
            let criteria = Arc::clone(&criteria);
            async move { fetch_candidate(candidate, &films, &tmdb, &criteria).await }
        });

        while let Some(fetched) = rx.recv().await {
            self.judge(fetched)?;
        }
        Ok(())
    }

    fn judge(&mut self, fetched: Fetched) -> BoxdResult<()> {
        let Fetched {
            candidate,
            record,
            tmdb,
        } = fetched;

        let mut record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!(target: "letterboxd_buckets::scrape", url = %candidate.entry.url, error = %e, "Film page failed");
                self.deny(
                    &candidate.entry.title,
                    candidate.entry.year.as_deref().unwrap_or(""),
                    Some(&candidate.entry.url),
                    format!("Error collecting data: {e}"),
                );
                return Ok(());
            }
        };

        match self.criteria.evaluate(&record, tmdb.as_ref()) {
            Verdict::Accept => {
                if let Some(details) = tmdb {
                    record.keywords.extend(details.keywords);
                }
                self.accept(record);
            }
            Verdict::ZeroReviews => {
                self.zero_reviews.record(&record)?;
                self.deny(
                    &record.title,
                    &record.year,
                    record.source_url.as_deref(),
                    "Zero reviews".to_string(),
                );
            }
            Verdict::Reject { reason, permanent } => {
                if permanent {
                    self.blacklist.record(OverrideRow {
                        title: record.title.clone(),
                        year: record.year.clone(),
                        value: reason.clone(),
                        link: record.source_url.clone(),
                    })?;
                }
                debug!(target: "letterboxd_buckets::scrape", key = %candidate.key, %reason, "Filtered");
                self.deny(&record.title, &record.year, record.source_url.as_deref(), reason);
            }
        }
        Ok(())
    }

    fn accept(&mut self, record: MovieRecord) {
        let placement = self.catalog.apply(&record);
        if placement.main {
            info!(target: "letterboxd_buckets::scrape", film = %record.display_name(), extra = ?placement.extra, "Approved");
        } else {
            info!(target: "letterboxd_buckets::scrape", film = %record.display_name(), "Approved, but the main list is already full");
        }
        self.summary.accepted += 1;
        self.approved.push(Decision {
            title: record.title,
            year: record.year,
            url: record.source_url,
            reason: None,
        });
    }

    fn deny(&mut self, title: &str, year: &str, url: Option<&str>, reason: String) {
        info!(target: "letterboxd_buckets::scrape", film = %title, year = %year, %reason, "Rejected");
        self.summary.rejected += 1;
        self.denied.push(Decision {
            title: title.to_string(),
            year: year.to_string(),
            url: url.map(str::to_string),
            reason: Some(reason),
        });
    }

    /// Import CSV and stats for every non-empty bucket, then the ceilings,
    /// unmapped countries and decision logs.
    pub fn write_outputs(&mut self) -> BoxdResult<()> {
        let config = self.config;
        let report_config = &config.report;
        let dir = config.paths.output_dir.as_path();
        let today = Local::now().date_naive();

        for (group, bucket) in self.catalog.buckets() {
            if bucket.is_empty() {
                debug!(target: "letterboxd_buckets::scrape", bucket = %bucket.name(), "Empty bucket, nothing to write");
                continue;
            }
            let (stem, heading) = match group {
                BucketGroup::Main => (
                    report_config.main_stem.clone(),
                    fill_title(&report_config.main_title, bucket.len(), bucket.name()),
                ),
                _ => (
                    bucket_stem(bucket.name()),
                    fill_title(
                        &report_config.group_title,
                        bucket.len(),
                        &bucket.name().replace('_', " "),
                    ),
                ),
            };

            let files = report::write_import_csv(
                bucket,
                dir,
                &stem,
                report_config.chunk_size,
                report_config.include_link,
            )?;
            report::write_stats(&dir.join(format!("{stem}_stats.txt")), bucket, &heading, today)?;
            self.summary.written.extend(files);
        }

        report::append_ceilings(
            &output_path(config, &report_config.ceilings_file),
            &config.scrape.list_name,
            &self.catalog.buckets(),
            Local::now().naive_local(),
        )?;
        report::write_unmapped_countries(
            &output_path(config, &report_config.unmapped_file),
            self.catalog.unmapped_countries(),
        )?;
        report::append_decisions(
            &output_path(config, &report_config.approved_log),
            &self.approved,
            &config.scrape.list_name,
        )?;
        report::append_decisions(
            &output_path(config, &report_config.denied_log),
            &self.denied,
            &config.scrape.list_name,
        )?;
        Ok(())
    }
}

async fn fetch_candidate(
    candidate: Candidate,
    films: &LetterboxdClient,
    tmdb: &TmdbClient,
    criteria: &Criteria,
) -> Fetched {
    let record = films
        .fetch_film(&candidate.entry.url)
        .await
        .map(|mut record| {
            if record.year.trim().is_empty() {
                if let Some(year) = &candidate.entry.year {
                    record.year = year.clone();
                }
            }
            record
        });

    // TMDB is only worth asking once the page-level checks pass.
    let details = match &record {
        Ok(record) if criteria.screen(record).is_accept() => match record.tmdb_id.as_deref() {
            Some(id) => tmdb.details(id).await,
            None => None,
        },
        _ => None,
    };

    Fetched {
        candidate,
        record,
        tmdb: details,
    }
}

/// Full scrape: walk the listing, write every output, print the summary.
pub async fn run(config: &Config, credentials: &Credentials) -> BoxdResult<RunSummary> {
    let started = Instant::now();
    let mut scraper = Scraper::new(config, credentials)?;
    scraper.run().await?;
    scraper.write_outputs()?;

    let main_len = scraper.catalog().main().len();
    let summary = scraper.into_summary();
    print_summary(config, &summary, main_len, started.elapsed());
    Ok(summary)
}

fn print_summary(config: &Config, summary: &RunSummary, main_len: usize, elapsed: Duration) {
    println!("{}", "=".repeat(50));
    println!("{} finished", config.scrape.list_name);
    println!("  Pages scraped: {}", summary.pages);
    println!("  Films seen: {} ({} duplicates)", summary.seen, summary.duplicates);
    println!(
        "  Approved: {} ({} whitelisted, {} refreshed, {} audits scheduled)",
        summary.accepted, summary.whitelisted, summary.refreshed, summary.audits
    );
    println!("  Main list: {}/{}", main_len, config.caps.main);
    println!(
        "  Rejected: {} | Blacklisted skips: {} | Zero review skips: {}",
        summary.rejected, summary.blacklisted, summary.zero_reviews
    );
    println!("  Files written: {}", summary.written.len());
    println!("  Total execution time: {}", format_elapsed(elapsed));
    println!("{}", "=".repeat(50));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identity::KeyScheme;
    use crate::core::overrides::Payload;
    use std::path::Path;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn film_html(display: &str, tmdb_id: u32, runtime: u32, ratings: u64) -> String {
        format!(
            r#"<html><head><meta property="og:title" content="{display}">
            <script type="application/ld+json">{{"aggregateRating":{{"ratingCount":{ratings}}}}}</script></head>
            <body data-tmdb-id="{tmdb_id}">
            <span class="creatorlist"><a class="contributor" href="/director/d/"><span class="prettify">Michael Mann</span></a></span>
            <div id="tab-cast"><div class="text-sluglist"><a class="text-slug tooltip" href="/actor/a/">Tom Cruise</a></div></div>
            <div id="tab-genres"><div class="text-sluglist"><a class="text-slug" href="/films/genre/crime/">Crime</a></div></div>
            <div id="tab-details">
              <div class="text-sluglist"><a class="text-slug" href="/studio/dreamworks/">DreamWorks</a></div>
              <div class="text-sluglist"><a class="text-slug" href="/films/country/usa/">USA</a></div>
              <div class="text-sluglist"><a class="text-slug" href="/films/language/english/">English</a></div>
            </div>
            <div class="release-country"><span class="name">USA</span>
              <span class="release-certification-badge"><span class="label">R</span></span></div>
            <p class="text-link text-footer">{runtime}&nbsp;mins</p>
            </body></html>"#
        )
    }

    fn listing_html(slugs: &[(&str, &str)]) -> String {
        let items: String = slugs
            .iter()
            .map(|(slug, display)| {
                format!(
                    r#"<li class="posteritem"><div data-item-full-display-name="{display}"></div>
                    <a href="/film/{slug}/">{display}</a></li>"#
                )
            })
            .collect();
        format!("<html><body><ul>{items}</ul></body></html>")
    }

    async fn mount_page(server: &MockServer, at: &str, body: String) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    async fn mount_tmdb(server: &MockServer, id: u32, genre: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/movie/{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "genres": [{"name": genre}],
                "keywords": {"keywords": []}
            })))
            .mount(server)
            .await;
    }

    fn test_config(server: &MockServer, dir: &Path) -> Config {
        let mut config = Config::default();
        config.scrape.origin = server.uri();
        config.scrape.list_url = format!("{}/films/by/popular/", server.uri());
        config.scrape.workers = 2;
        config.scrape.page_retries = 1;
        config.scrape.film_retries = 1;
        config.scrape.retry_delay_ms = 1;
        config.scrape.page_delay_ms = 0;
        config.scrape.audit_probability = 0.0;
        config.tmdb.base_url = server.uri();
        config.paths.output_dir = dir.join("out");
        config.paths.whitelist = dir.join("whitelist.xlsx");
        config.paths.blacklist = dir.join("blacklist.xlsx");
        config.paths.zero_reviews = dir.join("zero.xlsx");
        config.caps.main = 10;
        config
    }

    fn credentials() -> Credentials {
        Credentials {
            tmdb_api_key: "key".into(),
            github_api_key: String::new(),
        }
    }

    #[tokio::test]
    async fn full_run_sorts_films_into_lists_and_sheets() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&server, dir.path());

        mount_page(
            &server,
            "/films/by/popular/",
            listing_html(&[
                ("heat", "Heat (1995)"),
                ("shorty", "Shorty (2010)"),
                ("docu", "Docu (2015)"),
                ("obscure", "Obscure (2019)"),
                ("collateral", "Collateral (2004)"),
                ("heat", "Heat (1995)"),
            ]),
        )
        .await;
        mount_page(&server, "/film/heat/", film_html("Heat (1995)", 949, 170, 400_000)).await;
        mount_page(&server, "/film/shorty/", film_html("Shorty (2010)", 7, 12, 5_000)).await;
        mount_page(&server, "/film/docu/", film_html("Docu (2015)", 8, 95, 5_000)).await;
        mount_page(&server, "/film/obscure/", film_html("Obscure (2019)", 9, 95, 40)).await;
        mount_page(&server, "/film/collateral/", film_html("Collateral (2004)", 1538, 120, 300_000)).await;
        mount_tmdb(&server, 949, "Crime").await;
        mount_tmdb(&server, 8, "Documentary").await;

        // Whitelisted with no runtime cached, so it has to be re-scraped.
        let collateral_url = format!("{}/film/collateral/", server.uri());
        {
            let mut whitelist = Whitelist::load(&config.paths.whitelist, KeyScheme::Url).unwrap();
            let mut partial = MovieRecord::new("Collateral", "2004").with_url(&collateral_url);
            partial.tmdb_id = Some("1538".into());
            whitelist.store(&partial).unwrap();
        }

        let summary = run(&config, &credentials()).await.unwrap();
        assert_eq!(summary.pages, 1);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(summary.accepted, 2);
        assert_eq!(summary.whitelisted, 1);
        assert_eq!(summary.refreshed, 1);
        assert_eq!(summary.rejected, 3);

        let main = report::read_import_csv(&config.paths.output_dir.join("popular_filtered_movie_titles.csv")).unwrap();
        let mut titles: Vec<_> = main.iter().map(|r| r.title.as_str()).collect();
        titles.sort_unstable();
        assert_eq!(titles, vec!["Collateral", "Heat"]);
        assert!(config.paths.output_dir.join("r.csv").exists());
        assert!(config.paths.output_dir.join("north_america_stats.txt").exists());
        assert!(config.paths.output_dir.join("Output_Ceilings.txt").exists());

        let blacklist = Blacklist::load(&config.paths.blacklist, KeyScheme::Url).unwrap();
        let shorty = key_from_parts(KeyScheme::Url, "", "", Some(&format!("{}/film/shorty/", server.uri()))).unwrap();
        assert_eq!(blacklist.reason(&shorty), Some("Short runtime of 12 minutes"));
        let docu = key_from_parts(KeyScheme::Url, "", "", Some(&format!("{}/film/docu/", server.uri()))).unwrap();
        assert_eq!(blacklist.reason(&docu), Some("due to being a Documentary."));
        let obscure = key_from_parts(KeyScheme::Url, "", "", Some(&format!("{}/film/obscure/", server.uri()))).unwrap();
        assert_eq!(blacklist.reason(&obscure), None);

        let whitelist = Whitelist::load(&config.paths.whitelist, KeyScheme::Url).unwrap();
        let collateral = key_from_parts(KeyScheme::Url, "", "", Some(&collateral_url)).unwrap();
        match whitelist.payload(&collateral) {
            Some(Payload::Complete(record)) => assert_eq!(record.runtime_minutes, Some(120)),
            other => panic!("expected a complete payload, got {other:?}"),
        }

        let denied = std::fs::read_to_string(config.paths.output_dir.join("unfiltered_denied.csv")).unwrap();
        assert!(denied.contains("Insufficient ratings (< 1000)"));
    }

    #[tokio::test]
    async fn blacklisted_and_zero_review_films_are_never_fetched() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(&server, dir.path());
        config.scrape.zero_reviews_from_page = 1;
        config.scrape.zero_reviews_recheck = 0.0;

        mount_page(
            &server,
            "/films/by/popular/",
            listing_html(&[("banned", "Banned (2001)"), ("silent", "Silent (2002)")]),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/film/banned/"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/film/silent/"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        {
            let mut blacklist = Blacklist::load(&config.paths.blacklist, KeyScheme::Url).unwrap();
            blacklist
                .record(OverrideRow {
                    title: "Banned".into(),
                    year: "2001".into(),
                    value: "Short runtime of 3 minutes".into(),
                    link: Some(format!("{}/film/banned/", server.uri())),
                })
                .unwrap();
            let mut zero = ZeroReviews::load(&config.paths.zero_reviews, KeyScheme::Url).unwrap();
            zero.record(&MovieRecord::new("Silent", "2002").with_url(format!("{}/film/silent/", server.uri())))
                .unwrap();
        }

        let credentials = credentials();
        let mut scraper = Scraper::new(&config, &credentials)
            .unwrap()
            .with_rng(StdRng::seed_from_u64(7));
        scraper.run().await.unwrap();

        let summary = scraper.summary();
        assert_eq!(summary.blacklisted, 1);
        assert_eq!(summary.zero_reviews, 1);
        assert_eq!(summary.accepted, 0);
        assert!(scraper.catalog().main().is_empty());
    }

    #[tokio::test]
    async fn freshly_refreshed_whitelist_entry_can_be_audited() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(&server, dir.path());
        config.scrape.audit_probability = 1.0;

        mount_page(&server, "/films/by/popular/", listing_html(&[("collateral", "Collateral (2004)")])).await;
        mount_page(&server, "/film/collateral/", film_html("Collateral (2004)", 1538, 120, 300_000)).await;

        let collateral_url = format!("{}/film/collateral/", server.uri());
        {
            let mut whitelist = Whitelist::load(&config.paths.whitelist, KeyScheme::Url).unwrap();
            whitelist
                .store(&MovieRecord::new("Collateral", "2004").with_url(&collateral_url))
                .unwrap();
        }

        let credentials = credentials();
        let mut scraper = Scraper::new(&config, &credentials)
            .unwrap()
            .with_rng(StdRng::seed_from_u64(3));
        scraper.run().await.unwrap();

        let summary = scraper.summary();
        assert_eq!(summary.whitelisted, 1);
        assert_eq!(summary.refreshed, 1);
        assert_eq!(summary.audits, 1);
        assert_eq!(scraper.catalog().main().len(), 1);

        let whitelist = Whitelist::load(&config.paths.whitelist, KeyScheme::Url).unwrap();
        let collateral = key_from_parts(KeyScheme::Url, "", "", Some(&collateral_url)).unwrap();
        assert_eq!(whitelist.payload(&collateral), Some(Payload::Empty));
    }
}
