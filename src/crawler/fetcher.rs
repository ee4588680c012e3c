//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - GET requests to fetch page content
//! - Retry logic for transient failures
//! - Error classification into `FetchError`

use crate::config::{Config, UserAgentConfig};
use crate::FetchError;
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use std::time::Duration;

/// A fetched page body
#[derive(Debug, Clone)]
pub struct PageBody {
    /// Final URL after redirects; relative links resolve against this
    pub final_url: String,

    /// HTTP status code of the final response
    pub status: u16,

    pub body: String,
}

/// Retrieves page bodies by URL
///
/// Implementations must be shareable across worker tasks.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<PageBody, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Total request timeout
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &UserAgentConfig, timeout: Duration) -> Result<Client, reqwest::Error> {
    // Format: CrawlerName/Version (+ContactURL; ContactEmail)
    let user_agent = format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    );

    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// `Fetcher` backed by `reqwest`
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | HTTP 4xx | Immediate → `FetchError::Http` |
/// | HTTP 5xx | Retry up to `retries` times |
/// | Timeout | Retry up to `retries` times |
/// | Connection / other network error | Retry up to `retries` times |
/// | Redirect chain > 10 | `FetchError::Network` |
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    retries: u32,
    retry_delay: Duration,
}

impl HttpFetcher {
    pub fn new(client: Client, retries: u32, retry_delay: Duration) -> Self {
        Self {
            client,
            retries,
            retry_delay,
        }
    }

    /// Builds a fetcher from the `[crawler]` and `[user-agent]` sections
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let client = build_http_client(
            &config.user_agent,
            Duration::from_secs(config.crawler.request_timeout_secs),
        )?;

        Ok(Self::new(
            client,
            config.crawler.retries,
            Duration::from_millis(config.crawler.retry_delay_ms),
        ))
    }

    async fn fetch_once(&self, url: &str) -> Result<PageBody, FetchError> {
        let response = self.client.get(url).send().await.map_err(classify_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
            });
        }

        let final_url = response.url().to_string();
        let body = response.text().await.map_err(classify_error)?;

        Ok(PageBody {
            final_url,
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<PageBody, FetchError> {
        let mut attempt = 0;

        loop {
            match self.fetch_once(url).await {
                Ok(page) => return Ok(page),
                Err(e) if e.is_transient() && attempt < self.retries => {
                    attempt += 1;
                    tracing::debug!(
                        "Retrying {} ({}/{}) after {}",
                        url,
                        attempt,
                        self.retries,
                        e
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Maps a transport error onto a `FetchError` kind
fn classify_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else if let Some(status) = e.status() {
        FetchError::Http {
            status: status.as_u16(),
        }
    } else if e.is_connect() {
        FetchError::Network("Connection refused".to_string())
    } else {
        FetchError::Network(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_config() -> UserAgentConfig {
        UserAgentConfig {
            crawler_name: "TestCrawler".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/about".to_string(),
            contact_email: "admin@example.com".to_string(),
        }
    }

    fn test_fetcher(retries: u32) -> HttpFetcher {
        let client = build_http_client(&create_test_config(), Duration::from_secs(5)).unwrap();
        HttpFetcher::new(client, retries, Duration::from_millis(10))
    }

    #[test]
    fn test_build_http_client() {
        let config = create_test_config();
        let client = build_http_client(&config, Duration::from_secs(30));
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/list.html"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let url = format!("{}/list.html", server.uri());
        let page = test_fetcher(0).fetch(&url).await.unwrap();
        assert_eq!(page.final_url, url);
        assert_eq!(page.status, 200);
        assert_eq!(page.body, "<html></html>");
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone.html"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/gone.html", server.uri());
        let err = test_fetcher(3).fetch(&url).await.unwrap_err();
        assert_eq!(err, FetchError::Http { status: 404 });
    }

    #[tokio::test]
    async fn test_server_error_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky.html"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let url = format!("{}/flaky.html", server.uri());
        let err = test_fetcher(2).fetch(&url).await.unwrap_err();
        assert_eq!(err.status_code(), Some(503));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        // Port 9 (discard) is closed on test machines
        let err = test_fetcher(0)
            .fetch("http://127.0.0.1:9/")
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Network(_)));
    }
}
