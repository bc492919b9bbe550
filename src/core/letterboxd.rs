use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{header, StatusCode};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use crate::core::heal::DetailSource;
use crate::models::{MovieRecord, MpaaRating};
use crate::utils::text::squash_whitespace;
use crate::utils::{BoxdResult, Error};

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

static RATING_COUNT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"ratingCount"\s*:\s*(\d+)"#).unwrap());
static TMDB_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"data-tmdb-id="(\d+)""#).unwrap());
static RUNTIME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*min(?:s)?").unwrap());
static TITLE_YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.*)\((\d{4})\)\s*$").unwrap());

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap()
}

static POSTER_ITEM: Lazy<Selector> = Lazy::new(|| selector("li.posteritem, li.poster-container"));
static FILM_LINK: Lazy<Selector> = Lazy::new(|| selector(r#"a[href*="/film/"]"#));
static ITEM_DATA: Lazy<Selector> = Lazy::new(|| {
    selector("[data-item-full-display-name], [data-item-name], [data-target-link], [data-item-link]")
});
static LIST_NUMBER: Lazy<Selector> = Lazy::new(|| selector("p.list-number"));
static NEXT_PAGE: Lazy<Selector> = Lazy::new(|| selector("a.next"));

static OG_TITLE: Lazy<Selector> = Lazy::new(|| selector(r#"meta[property="og:title"]"#));
static FILM_ID: Lazy<Selector> = Lazy::new(|| selector("[data-film-id]"));
static RUNTIME_FOOTER: Lazy<Selector> = Lazy::new(|| selector("p.text-link.text-footer"));
static DIRECTORS: Lazy<Selector> = Lazy::new(|| selector("span.creatorlist a.contributor span.prettify"));
static ACTORS: Lazy<Selector> = Lazy::new(|| selector("#tab-cast .text-sluglist a.text-slug.tooltip"));
static GENRES: Lazy<Selector> =
    Lazy::new(|| selector(r#"#tab-genres .text-sluglist a.text-slug[href*="/films/genre/"]"#));
static STUDIOS: Lazy<Selector> =
    Lazy::new(|| selector(r#"#tab-details .text-sluglist a.text-slug[href*="/studio/"]"#));
static LANGUAGES: Lazy<Selector> =
    Lazy::new(|| selector(r#"#tab-details .text-sluglist a.text-slug[href*="/films/language/"]"#));
static COUNTRIES: Lazy<Selector> =
    Lazy::new(|| selector(r#"#tab-details .text-sluglist a.text-slug[href*="/films/country/"]"#));
static RELEASE_COUNTRY: Lazy<Selector> = Lazy::new(|| selector(".release-country"));
static RELEASE_COUNTRY_NAME: Lazy<Selector> = Lazy::new(|| selector(".name"));
static CERTIFICATION: Lazy<Selector> = Lazy::new(|| selector(".release-certification-badge .label"));

/// One film on a listing page.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingEntry {
    pub title: String,
    pub year: Option<String>,
    pub url: String,
    /// Position on a ranked list.
    pub list_number: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingPage {
    pub entries: Vec<ListingEntry>,
    pub has_next: bool,
}

fn text_of(el: ElementRef<'_>) -> String {
    squash_whitespace(&el.text().collect::<String>())
}

/// Split "Heat (1995)" into ("Heat", Some("1995")).
pub fn split_title_year(display: &str) -> (String, Option<String>) {
    let display = display.trim();
    match TITLE_YEAR_RE.captures(display) {
        Some(caps) => (caps[1].trim().to_string(), Some(caps[2].to_string())),
        None => (display.to_string(), None),
    }
}

/// Make a Letterboxd href absolute.
pub fn absolute_url(origin: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else {
        format!("{}/{}", origin.trim_end_matches('/'), href.trim_start_matches('/'))
    }
}

/// Title from a film slug, used when the page gives nothing better.
fn title_from_url(url: &str) -> Option<String> {
    let slug = url.split("/film/").nth(1)?.trim_end_matches('/');
    if slug.is_empty() {
        return None;
    }
    let words: Vec<String> = slug
        .split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect();
    Some(words.join(" "))
}

pub fn parse_listing(html: &str, origin: &str) -> ListingPage {
    let doc = Html::parse_document(html);
    let mut entries = Vec::new();

    for item in doc.select(&POSTER_ITEM) {
        // Item data sits on the <li> itself or on the poster component inside it.
        let data_el = if item.value().attr("data-item-name").is_some()
            || item.value().attr("data-item-full-display-name").is_some()
        {
            Some(item)
        } else {
            item.select(&ITEM_DATA).next()
        };
        let attr = |name: &str| {
            data_el
                .and_then(|el| el.value().attr(name))
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let href = item
            .select(&FILM_LINK)
            .next()
            .and_then(|a| a.value().attr("href"))
            .or_else(|| attr("data-target-link"))
            .or_else(|| attr("data-item-link"));
        let Some(href) = href else {
            debug!(target: "letterboxd_buckets::letterboxd", "Listing item without a film link");
            continue;
        };
        let url = absolute_url(origin, href);

        let display = attr("data-item-full-display-name")
            .or_else(|| attr("data-item-name"))
            .map(str::to_string)
            .or_else(|| title_from_url(&url));
        let Some(display) = display else {
            continue;
        };
        let (title, year) = split_title_year(&display);

        let list_number = item
            .select(&LIST_NUMBER)
            .next()
            .and_then(|p| text_of(p).replace(',', "").parse().ok());

        entries.push(ListingEntry {
            title,
            year,
            url,
            list_number,
        });
    }

    ListingPage {
        entries,
        has_next: doc.select(&NEXT_PAGE).next().is_some(),
    }
}

/// First rated USA certification. A film with only unrated USA releases is
/// `NotRated`; a film with no USA release at all has no rating.
pub fn parse_mpaa(doc: &Html) -> Option<MpaaRating> {
    let usa: Vec<MpaaRating> = doc
        .select(&RELEASE_COUNTRY)
        .filter(|country| {
            country
                .select(&RELEASE_COUNTRY_NAME)
                .next()
                .is_some_and(|name| text_of(name) == "USA")
        })
        .filter_map(|country| country.select(&CERTIFICATION).next())
        .filter_map(|label| MpaaRating::from_certification(&text_of(label)))
        .collect();

    usa.iter()
        .copied()
        .find(MpaaRating::is_rated)
        .or_else(|| usa.first().copied())
}

fn texts(doc: &Html, sel: &Selector) -> Vec<String> {
    doc.select(sel)
        .map(text_of)
        .filter(|t| !t.is_empty() && !t.contains('…') && !t.contains("Show All"))
        .collect()
}

/// Everything a film page tells us. Missing pieces stay empty; the
/// eligibility filter decides what to do about them.
pub fn parse_film_page(html: &str, url: &str) -> MovieRecord {
    let doc = Html::parse_document(html);

    let og = doc
        .select(&OG_TITLE)
        .next()
        .and_then(|m| m.value().attr("content"))
        .map(str::to_string)
        .or_else(|| title_from_url(url))
        .unwrap_or_default();
    let (title, year) = split_title_year(&og);

    let mut record = MovieRecord::new(title, year.unwrap_or_default()).with_url(url);
    record.rating_count = RATING_COUNT_RE
        .captures(html)
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(0);
    record.tmdb_id = TMDB_ID_RE.captures(html).map(|c| c[1].to_string());
    record.runtime_minutes = doc
        .select(&RUNTIME_FOOTER)
        .next()
        .map(text_of)
        .and_then(|t| RUNTIME_RE.captures(&t).and_then(|c| c[1].parse().ok()));
    record.mpaa_rating = parse_mpaa(&doc);

    record.directors = texts(&doc, &DIRECTORS);
    record.actors = texts(&doc, &ACTORS);
    record.genres = texts(&doc, &GENRES).into_iter().collect();
    record.studios = texts(&doc, &STUDIOS).into_iter().collect();
    record.languages = texts(&doc, &LANGUAGES).into_iter().collect();
    record.countries = texts(&doc, &COUNTRIES).into_iter().collect();
    record
}

/// Letterboxd's internal film id, as mirrored to JSON.
pub fn parse_film_id(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    doc.select(&FILM_ID)
        .next()
        .and_then(|el| el.value().attr("data-film-id"))
        .map(str::to_string)
}

#[derive(Debug, Clone)]
pub struct LetterboxdClient {
    origin: String,
    retries: u32,
    retry_delay: Duration,
    client: reqwest::Client,
}

impl LetterboxdClient {
    pub fn new(origin: String, retries: u32, retry_delay: Duration) -> BoxdResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            origin: origin.trim_end_matches('/').to_string(),
            retries: retries.max(1),
            retry_delay,
            client,
        })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// `{list}page/{n}/`; page 1 is the list URL itself.
    pub fn page_url(list_url: &str, page: u32) -> String {
        let base = if list_url.ends_with('/') {
            list_url.to_string()
        } else {
            format!("{list_url}/")
        };
        if page <= 1 {
            base
        } else {
            format!("{base}page/{page}/")
        }
    }

    /// GET a page, retrying transport errors, 429 and 5xx a fixed number of
    /// times with a fixed pause. Other HTTP errors fail at once.
    pub async fn fetch_html(&self, url: &str) -> BoxdResult<String> {
        let mut last_error = None;
        for attempt in 1..=self.retries {
            let result = self
                .client
                .get(url)
                .header(header::ACCEPT, "text/html")
                .send()
                .await;

            match result {
                Ok(resp) if resp.status().is_success() => return Ok(resp.text().await?),
                Ok(resp) => {
                    let status = resp.status();
                    if status != StatusCode::TOO_MANY_REQUESTS && !status.is_server_error() {
                        return Err(Error::Other(format!("Letterboxd request failed: HTTP {status} url={url}")));
                    }
                    warn!(target: "letterboxd_buckets::letterboxd", %url, %status, attempt, retries = self.retries, "Retrying page");
                    last_error = Some(Error::Other(format!("Letterboxd request failed: HTTP {status} url={url}")));
                }
                Err(e) => {
                    warn!(target: "letterboxd_buckets::letterboxd", %url, error = %e, attempt, retries = self.retries, "Retrying page");
                    last_error = Some(e.into());
                }
            }
            if attempt < self.retries {
                tokio::time::sleep(self.retry_delay).await;
            }
        }
        Err(last_error.unwrap_or_else(|| Error::Other(format!("no attempt made for {url}"))))
    }

    pub async fn fetch_listing(&self, url: &str) -> BoxdResult<ListingPage> {
        let html = self.fetch_html(url).await?;
        Ok(parse_listing(&html, &self.origin))
    }

    pub async fn fetch_film(&self, url: &str) -> BoxdResult<MovieRecord> {
        let html = self.fetch_html(url).await?;
        Ok(parse_film_page(&html, url))
    }
}

#[async_trait]
impl DetailSource for LetterboxdClient {
    async fn fetch_detail(&self, url: &str) -> BoxdResult<MovieRecord> {
        self.fetch_film(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LISTING: &str = r#"
    <html><body><ul class="poster-list">
      <li class="posteritem">
        <div class="react-component" data-item-name="Heat" data-item-full-display-name="Heat (1995)"
             data-target-link="/film/heat-1995/"></div>
        <a href="/film/heat-1995/">Heat</a>
        <p class="list-number">1</p>
      </li>
      <li class="posteritem" data-item-name="Amélie">
        <a href="https://letterboxd.com/film/amelie/">Amélie</a>
      </li>
      <li class="posteritem"><div data-target-link="/film/the-thing/"></div></li>
      <li class="posteritem"><span>no link here</span></li>
    </ul>
    <a class="next" href="/films/by/popular/page/2/">Older</a>
    </body></html>"#;

    const FILM: &str = r#"
    <html><head>
      <meta property="og:title" content="Heat (1995)">
      <script type="application/ld+json">{"aggregateRating":{"ratingCount":412345}}</script>
    </head>
    <body data-tmdb-id="949">
      <div class="film-poster" data-film-id="51342"></div>
      <span class="creatorlist"><a class="contributor" href="/director/michael-mann/"><span class="prettify">Michael  Mann</span></a></span>
      <div id="tab-cast"><div class="text-sluglist">
        <a class="text-slug tooltip" href="/actor/al-pacino/">Al Pacino</a>
        <a class="text-slug tooltip" href="/actor/robert-de-niro/">Robert De Niro</a>
        <a class="text-slug" href="/actor/x/">Show All…</a>
      </div></div>
      <div id="tab-genres"><div class="text-sluglist">
        <a class="text-slug" href="/films/genre/crime/">Crime</a>
        <a class="text-slug" href="/films/genre/drama/">Drama</a>
        <a class="text-slug" href="/films/theme/heists/">Heists</a>
      </div></div>
      <div id="tab-details">
        <div class="text-sluglist"><a class="text-slug" href="/studio/regency-enterprises/">Regency Enterprises</a></div>
        <div class="text-sluglist"><a class="text-slug" href="/films/country/usa/">USA</a></div>
        <div class="text-sluglist"><p>
          <a class="text-slug" href="/films/language/english/">English</a>
          <a class="text-slug" href="/films/language/spanish/">Spanish</a>
        </p></div>
      </div>
      <div class="release-country-list">
        <div class="release-country"><span class="name">France</span>
          <span class="release-certification-badge"><span class="label">12</span></span></div>
        <div class="release-country"><span class="name">USA</span>
          <span class="release-certification-badge"><span class="label">NR</span></span></div>
        <div class="release-country"><span class="name">USA</span>
          <span class="release-certification-badge"><span class="label">R</span></span></div>
      </div>
      <p class="text-link text-footer">170&nbsp;mins &nbsp; More at IMDb TMDB</p>
    </body></html>"#;

    #[test]
    fn listing_entries_and_pagination() {
        let page = parse_listing(LISTING, "https://letterboxd.com");
        assert!(page.has_next);
        assert_eq!(page.entries.len(), 3);

        assert_eq!(
            page.entries[0],
            ListingEntry {
                title: "Heat".into(),
                year: Some("1995".into()),
                url: "https://letterboxd.com/film/heat-1995/".into(),
                list_number: Some(1),
            }
        );
        assert_eq!(page.entries[1].title, "Amélie");
        assert_eq!(page.entries[1].year, None);
        assert_eq!(page.entries[2].title, "The Thing");
        assert_eq!(page.entries[2].url, "https://letterboxd.com/film/the-thing/");
    }

    #[test]
    fn film_page_fields() {
        let url = "https://letterboxd.com/film/heat-1995/";
        let record = parse_film_page(FILM, url);
        assert_eq!(record.title, "Heat");
        assert_eq!(record.year, "1995");
        assert_eq!(record.source_url.as_deref(), Some(url));
        assert_eq!(record.tmdb_id.as_deref(), Some("949"));
        assert_eq!(record.rating_count, 412_345);
        assert_eq!(record.runtime_minutes, Some(170));
        assert_eq!(record.mpaa_rating, Some(MpaaRating::R));
        assert_eq!(record.directors, vec!["Michael Mann"]);
        assert_eq!(record.actors, vec!["Al Pacino", "Robert De Niro"]);
        assert_eq!(record.genres.iter().collect::<Vec<_>>(), vec!["Crime", "Drama"]);
        assert_eq!(record.studios.iter().collect::<Vec<_>>(), vec!["Regency Enterprises"]);
        assert_eq!(record.countries.iter().collect::<Vec<_>>(), vec!["USA"]);
        assert_eq!(record.languages.iter().collect::<Vec<_>>(), vec!["English", "Spanish"]);
        assert_eq!(parse_film_id(FILM).as_deref(), Some("51342"));
    }

    #[test]
    fn bare_page_yields_empty_fields() {
        let record = parse_film_page("<html><body></body></html>", "https://letterboxd.com/film/the-thing/");
        assert_eq!(record.title, "The Thing");
        assert_eq!(record.year, "");
        assert_eq!(record.rating_count, 0);
        assert_eq!(record.runtime_minutes, None);
        assert_eq!(record.mpaa_rating, None);
        assert!(record.directors.is_empty());
    }

    #[test]
    fn only_unrated_usa_release_is_nr() {
        let html = r#"<div class="release-country"><span class="name">USA</span>
            <span class="release-certification-badge"><span class="label">NR</span></span></div>"#;
        assert_eq!(parse_mpaa(&Html::parse_document(html)), Some(MpaaRating::NotRated));
    }

    #[test]
    fn page_urls() {
        assert_eq!(
            LetterboxdClient::page_url("https://letterboxd.com/films/by/popular", 1),
            "https://letterboxd.com/films/by/popular/"
        );
        assert_eq!(
            LetterboxdClient::page_url("https://letterboxd.com/films/by/popular/", 3),
            "https://letterboxd.com/films/by/popular/page/3/"
        );
    }

    #[tokio::test]
    async fn fetch_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/film/heat-1995/"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/film/heat-1995/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(FILM))
            .mount(&server)
            .await;

        let client = LetterboxdClient::new(server.uri(), 3, Duration::from_millis(1)).unwrap();
        let record = client
            .fetch_film(&format!("{}/film/heat-1995/", server.uri()))
            .await
            .unwrap();
        assert_eq!(record.title, "Heat");
    }

    #[tokio::test]
    async fn fetch_gives_up_on_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let client = LetterboxdClient::new(server.uri(), 5, Duration::from_millis(1)).unwrap();
        assert!(client.fetch_html(&format!("{}/film/missing/", server.uri())).await.is_err());
    }
}
