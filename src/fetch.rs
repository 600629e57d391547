//! Page retrieval for the monthly-returns pipeline
//!
//! Pages are slow and sometimes only reachable through a pass-through proxy, which
//! answers 408/504 when the target takes too long and 500 when the target is a 404.
//! Only timeouts are retried.

use reqwest::{Client, StatusCode, Url};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::FetchConfig;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("invalid request URL: {0}")]
    InvalidUrl(String),
    #[error("timed out after {attempts} attempts")]
    Timeout { attempts: u32 },
    #[error("page not found, check the username and its capitalization")]
    NotFound,
    #[error("server answered {0}")]
    Status(StatusCode),
    #[error("proxy returned an error page instead of the target")]
    ProxyErrorPage,
    #[error("connection failed")]
    ConnectionFailed(#[from] reqwest::Error),
}

/// HTTP client carrying the configured user agent and per-request timeout
pub fn http_client(config: &FetchConfig) -> Result<Client, FetchError> {
    Ok(Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(config.timeout())
        .build()?)
}

/// The URL actually requested: the target itself, or the proxy with the target and a
/// cache-busting timestamp in its query
///
/// A `url` or `timestamp` already present in the proxy's query is replaced, so both
/// `https://api.allorigins.win/raw` and `https://api.allorigins.win/raw?url=` work.
pub fn request_url(target: &str, proxy: Option<&str>, timestamp_ms: i64) -> Result<Url, FetchError> {
    let Some(proxy) = proxy else {
        return Url::parse(target).map_err(invalid_url);
    };
    let mut url = Url::parse(proxy).map_err(invalid_url)?;
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(name, _)| name != "url" && name != "timestamp")
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair("url", target)
        .append_pair("timestamp", &timestamp_ms.to_string());
    Ok(url)
}

fn invalid_url(e: impl std::fmt::Display) -> FetchError {
    FetchError::InvalidUrl(e.to_string())
}

/// A short body mentioning an error is the proxy talking, not the target page
pub fn looks_like_proxy_error(body: &str) -> bool {
    body.len() < 500 && body.to_lowercase().contains("error")
}

#[derive(Debug)]
enum Attempt {
    Done(String),
    TimedOut,
}

/// What a status says before the body is read: `None` to go on reading, a timeout to retry,
/// or an error that ends the fetch
fn status_outcome(status: StatusCode, proxied: bool) -> Result<Option<Attempt>, FetchError> {
    match status {
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => Ok(Some(Attempt::TimedOut)),
        StatusCode::NOT_FOUND => Err(FetchError::NotFound),
        // the proxy turns a missing target into a 500
        StatusCode::INTERNAL_SERVER_ERROR if proxied => Err(FetchError::NotFound),
        status if !status.is_success() => Err(FetchError::Status(status)),
        _ => Ok(None),
    }
}

pub struct PageFetcher {
    client: Client,
    config: FetchConfig,
}

impl PageFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        Ok(Self {
            client: http_client(config)?,
            config: config.clone(),
        })
    }

    /// Text of `target`, fetched through `proxy` when one is given
    pub async fn fetch_page(&self, target: &str, proxy: Option<&str>) -> Result<String, FetchError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let url = request_url(target, proxy, chrono::Utc::now().timestamp_millis())?;
            debug!("requesting {url} (attempt {attempts})");
            match self.attempt(url, proxy.is_some()).await? {
                Attempt::Done(body) => return Ok(body),
                Attempt::TimedOut if attempts <= self.config.max_retries => {
                    warn!(
                        "timeout fetching {target}, retrying ({attempts}/{})",
                        self.config.max_retries
                    );
                    tokio::time::sleep(self.config.retry_delay()).await;
                }
                Attempt::TimedOut => return Err(FetchError::Timeout { attempts }),
            }
        }
    }

    async fn attempt(&self, url: Url, proxied: bool) -> Result<Attempt, FetchError> {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return Ok(Attempt::TimedOut),
            Err(e) => return Err(e.into()),
        };
        if let Some(outcome) = status_outcome(response.status(), proxied)? {
            return Ok(outcome);
        }
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) if e.is_timeout() => return Ok(Attempt::TimedOut),
            Err(e) => return Err(e.into()),
        };
        if looks_like_proxy_error(&body) {
            return Err(FetchError::ProxyErrorPage);
        }
        Ok(Attempt::Done(body))
    }
}
