//! Outbound HTTP with fixed headers and a courtesy delay before every call.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, info, Instrument};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    /// Sleep before each request so the source does not rate-limit us.
    pub delay: Duration,
    pub user_agent: Option<String>,
    pub headers: Vec<(String, String)>,
    pub global_concurrency: usize,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout: Duration::from_secs(20),
            delay: Duration::ZERO,
            user_agent: None,
            headers: Vec::new(),
            global_concurrency: 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchedResponse {
    pub status: StatusCode,
    pub final_url: String,
    pub body: Vec<u8>,
}

impl FetchedResponse {
    pub fn is_ok(&self) -> bool {
        self.status == StatusCode::OK
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },
    #[error("building http client: {0}")]
    BuildClient(#[source] reqwest::Error),
}

#[derive(Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
    base_url: String,
    delay: Duration,
    global_limit: Arc<Semaphore>,
}

impl HttpFetcher {
    pub fn new(config: HttpClientConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| FetchError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            let header_value =
                HeaderValue::from_str(value).map_err(|e| FetchError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            headers.insert(header_name, header_value);
        }

        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout)
            .default_headers(headers);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let client = builder.build().map_err(FetchError::BuildClient)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            delay: config.delay,
            global_limit: Arc::new(Semaphore::new(config.global_concurrency.max(1))),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET `base_url + path`. Any status is returned to the caller; only
    /// transport failures are errors here.
    pub async fn get(
        &self,
        run_id: Uuid,
        source: &str,
        path: &str,
    ) -> Result<FetchedResponse, FetchError> {
        let url = self.url_for(path);
        let span = tracing::info_span!("http_fetch", %run_id, source, url = %url);
        self.get_inner(url).instrument(span).await
    }

    async fn get_inner(&self, url: String) -> Result<FetchedResponse, FetchError> {
        let _permit = self
            .global_limit
            .acquire()
            .await
            .expect("semaphore not closed");

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        info!(method = "GET", "sending request");
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = resp.status();
        let final_url = resp.url().to_string();
        let body = resp
            .bytes()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.clone(),
                source,
            })?
            .to_vec();
        debug!(status = status.as_u16(), bytes = body.len(), "received response");

        Ok(FetchedResponse {
            status,
            final_url,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::GET, MockServer};

    fn fetcher(base_url: String, headers: Vec<(String, String)>) -> HttpFetcher {
        HttpFetcher::new(HttpClientConfig {
            base_url,
            timeout: Duration::from_secs(5),
            user_agent: Some("bursa-test".to_string()),
            headers,
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn get_sends_fixed_headers_and_returns_body() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/list")
                .header("user-agent", "bursa-test")
                .header("x-source", "feed");
            then.status(200).body("{\"ok\":true}");
        });

        let http = fetcher(
            server.base_url(),
            vec![("X-Source".to_string(), "feed".to_string())],
        );
        let resp = http.get(Uuid::new_v4(), "test", "/api/list").await.unwrap();

        mock.assert();
        assert!(resp.is_ok());
        assert_eq!(resp.text(), "{\"ok\":true}");
    }

    #[tokio::test]
    async fn non_200_status_is_returned_not_raised() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/missing");
            then.status(404).body("nope");
        });

        let http = fetcher(server.base_url(), Vec::new());
        let resp = http.get(Uuid::new_v4(), "test", "/missing").await.unwrap();

        assert_eq!(resp.status, StatusCode::NOT_FOUND);
        assert!(!resp.is_ok());
    }

    #[test]
    fn invalid_header_is_rejected() {
        let err = HttpFetcher::new(HttpClientConfig {
            headers: vec![("bad header".to_string(), "x".to_string())],
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, FetchError::InvalidHeader { .. }));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let http = fetcher("http://example.test/".to_string(), Vec::new());
        assert_eq!(http.url_for("/a?b=1"), "http://example.test/a?b=1");
    }
}
