//! NewsAPI headline source.
//!
//! One GET per run against either `/v2/everything` (search) or
//! `/v2/top-headlines` (country). Titles are returned in document order.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::NewsConfig;
use crate::error::HeadlineError;

/// The single selection mode used for a fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadlineQuery {
    /// Free-text search term.
    Search(String),
    /// Two-letter ISO country code.
    Country(String),
}

impl HeadlineQuery {
    fn path(&self) -> &'static str {
        match self {
            Self::Search(_) => "/v2/everything",
            Self::Country(_) => "/v2/top-headlines",
        }
    }

    fn param(&self) -> (&'static str, &str) {
        match self {
            Self::Search(q) => ("q", q.as_str()),
            Self::Country(cc) => ("country", cc.as_str()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Article {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[allow(dead_code)]
    pub description: Option<String>,
    #[allow(dead_code)]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NewsApiResponse {
    #[serde(default)]
    articles: Vec<Article>,
}

/// Error body NewsAPI sends alongside 4xx/5xx statuses.
#[derive(Debug, Deserialize)]
struct NewsApiError {
    code: Option<String>,
    message: Option<String>,
}

fn null_as_empty<'de, D>(de: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(de)?.unwrap_or_default())
}

/// Decode a NewsAPI article list into its titles.
pub fn parse_headlines(body: &str) -> Result<Vec<String>, HeadlineError> {
    let response: NewsApiResponse = serde_json::from_str(body)?;
    Ok(response.articles.into_iter().map(|a| a.title).collect())
}

pub struct NewsClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl NewsClient {
    pub fn new(config: &NewsConfig, api_key: String) -> Result<Self, HeadlineError> {
        // NewsAPI refuses requests without a User-Agent.
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Fetch the current headline titles for `query`.
    pub async fn fetch_headlines(&self, query: &HeadlineQuery) -> Result<Vec<String>, HeadlineError> {
        let url = format!("{}{}", self.base_url, query.path());
        let (name, value) = query.param();
        debug!("GET {url} ({name}={value})");

        let resp = self
            .client
            .get(&url)
            .query(&[(name, value), ("apiKey", self.api_key.as_str())])
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            let message = match serde_json::from_str::<NewsApiError>(&body) {
                Ok(NewsApiError { code, message }) => format!(
                    "{}{}",
                    code.map(|c| format!("[{c}] ")).unwrap_or_default(),
                    message.unwrap_or_default()
                ),
                Err(_) => body.chars().take(200).collect(),
            };
            return Err(HeadlineError::Status { status, message });
        }

        let titles = parse_headlines(&body)?;
        info!("Fetched {} headlines", titles.len());
        Ok(titles)
    }
}
