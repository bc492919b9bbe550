use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Local;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::utils::Error;

pub const DEFAULT_API_URL: &str = "https://api.github.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Push {
    Created,
    Updated,
}

#[derive(Debug, Deserialize)]
struct ContentResource {
    sha: String,
}

#[derive(Debug, Serialize)]
struct PutContent<'a> {
    message: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<&'a str>,
}

/// Whole-file writes to one repository through the contents API.
#[derive(Debug, Clone)]
pub struct GithubClient {
    api_url: String,
    repo: String,
    branch: Option<String>,
    token: String,
    client: reqwest::Client,
}

impl GithubClient {
    /// `repo` is `owner/name`.
    pub fn new(api_url: String, repo: String, branch: Option<String>, token: String) -> Self {
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            repo: repo.trim_matches('/').to_string(),
            branch,
            token,
            client: reqwest::Client::new(),
        }
    }

    fn contents_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/contents/{}",
            self.api_url,
            self.repo,
            path.trim_start_matches('/')
        )
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", env!("CARGO_PKG_NAME"))
            .bearer_auth(&self.token)
    }

    async fn current_sha(&self, path: &str) -> Result<Option<String>, Error> {
        let mut req = self.request(reqwest::Method::GET, self.contents_url(path));
        if let Some(branch) = &self.branch {
            req = req.query(&[("ref", branch.as_str())]);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Other(format!(
                "GitHub API request failed: HTTP {status} body={body}"
            )));
        }
        Ok(Some(resp.json::<ContentResource>().await?.sha))
    }

    /// Create `path` or replace its whole content.
    pub async fn put_file(&self, path: &str, content: &str) -> Result<Push, Error> {
        let sha = self.current_sha(path).await?;
        let name = path.rsplit('/').next().unwrap_or(path);
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let (message, outcome) = match sha {
            Some(_) => (format!("Updated {name} - {stamp}"), Push::Updated),
            None => (format!("Added {name} - {stamp}"), Push::Created),
        };

        let body = PutContent {
            message,
            content: STANDARD.encode(content.as_bytes()),
            sha,
            branch: self.branch.as_deref(),
        };
        let resp = self
            .request(reqwest::Method::PUT, self.contents_url(path))
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Other(format!(
                "GitHub API request failed: HTTP {status} body={body}"
            )));
        }

        info!(target: "letterboxd_buckets::github", repo = %self.repo, path = %path, ?outcome, "File pushed");
        Ok(outcome)
    }
}
