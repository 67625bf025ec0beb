//! HTTP transport abstraction for testability

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, trace};
use url::Url;

use crate::collect::config::ClientConfig;

/// Transport-level failure (connection, timeout, non-success status)
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Request(String),
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },
    #[error("Failed to read response: {0}")]
    Body(String),
}

/// Trait for synchronous HTTP GET operations.
///
/// `ServiceHandle` only needs a GET returning the body bytes; injecting the
/// client lets tests serve canned JSON without a network.
pub trait HttpClient: Send + Sync {
    /// Performs an HTTP GET request and returns the response body.
    fn get(&self, url: &Url) -> Result<Vec<u8>, TransportError>;
}

/// Real HTTP client implementation using reqwest.
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Creates a client with the timeout and user agent of `config`.
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        Self::build(config.timeout, &config.user_agent)
    }

    /// Creates a client with a custom timeout.
    pub fn with_timeout(timeout_secs: u64) -> Result<Self, TransportError> {
        let config = ClientConfig::default();
        Self::build(Duration::from_secs(timeout_secs), &config.user_agent)
    }

    fn build(timeout: Duration, user_agent: &str) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| TransportError::Request(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &Url) -> Result<Vec<u8>, TransportError> {
        debug!(url = %redact_token(url), "GET");

        let response = self
            .client
            .get(url.clone())
            .send()
            .map_err(|e| TransportError::Request(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                url: redact_token(url),
            });
        }

        let body = response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| TransportError::Body(e.without_url().to_string()))?;

        trace!(bytes = body.len(), "response received");
        Ok(body)
    }
}

/// Render a URL for logs and error messages with any `token` value masked
pub fn redact_token(url: &Url) -> String {
    if !url.query_pairs().any(|(k, _)| k == "token") {
        return url.to_string();
    }

    let mut redacted = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == "token" { "***".to_string() } else { v.into_owned() };
            (k.into_owned(), v)
        })
        .collect();
    redacted.query_pairs_mut().clear().extend_pairs(pairs);
    redacted.to_string()
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Mock HTTP client serving canned responses keyed by URL path.
    ///
    /// When several responses are registered for one path they are served in
    /// order; the last one is repeated.
    #[derive(Default)]
    pub struct MockHttpClient {
        responses: Mutex<HashMap<String, Vec<Result<Vec<u8>, TransportError>>>>,
        requests: Mutex<Vec<Url>>,
    }

    impl MockHttpClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_json(self, path: &str, body: serde_json::Value) -> Self {
            self.push(path, Ok(body.to_string().into_bytes()));
            self
        }

        pub fn with_error(self, path: &str, err: TransportError) -> Self {
            self.push(path, Err(err));
            self
        }

        fn push(&self, path: &str, response: Result<Vec<u8>, TransportError>) {
            self.responses
                .lock()
                .unwrap()
                .entry(path.to_string())
                .or_default()
                .push(response);
        }

        pub fn requests(&self) -> Vec<Url> {
            self.requests.lock().unwrap().clone()
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        pub fn requests_to(&self, path: &str) -> Vec<Url> {
            self.requests()
                .into_iter()
                .filter(|u| u.path() == path)
                .collect()
        }
    }

    impl HttpClient for MockHttpClient {
        fn get(&self, url: &Url) -> Result<Vec<u8>, TransportError> {
            self.requests.lock().unwrap().push(url.clone());
            let mut responses = self.responses.lock().unwrap();
            match responses.get_mut(url.path()) {
                Some(queue) if queue.len() > 1 => queue.remove(0),
                Some(queue) if !queue.is_empty() => queue[0].clone(),
                _ => Err(TransportError::Status {
                    status: 404,
                    url: url.to_string(),
                }),
            }
        }
    }

    /// Look up one query parameter of a recorded request
    pub fn query_param(url: &Url, key: &str) -> Option<String> {
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    #[test]
    fn test_mock_client_serves_in_order() {
        let mock = MockHttpClient::new()
            .with_json("/a", serde_json::json!({"n": 1}))
            .with_json("/a", serde_json::json!({"n": 2}));
        let url = Url::parse("https://example.com/a").unwrap();

        assert_eq!(mock.get(&url).unwrap(), br#"{"n":1}"#.to_vec());
        assert_eq!(mock.get(&url).unwrap(), br#"{"n":2}"#.to_vec());
        assert_eq!(mock.get(&url).unwrap(), br#"{"n":2}"#.to_vec());
        assert_eq!(mock.request_count(), 3);
    }

    #[test]
    fn test_mock_client_unknown_path() {
        let mock = MockHttpClient::new();
        let url = Url::parse("https://example.com/missing").unwrap();
        assert!(matches!(
            mock.get(&url),
            Err(TransportError::Status { status: 404, .. })
        ));
    }

    #[test]
    fn test_redact_token() {
        let url = Url::parse("https://example.com/FeatureServer?f=json&token=secret").unwrap();
        let shown = redact_token(&url);
        assert!(!shown.contains("secret"));
        assert!(shown.contains("f=json"));
    }

    #[test]
    fn test_redact_without_token_is_unchanged() {
        let url = Url::parse("https://example.com/FeatureServer?f=json").unwrap();
        assert_eq!(redact_token(&url), url.to_string());
    }

    #[test]
    fn test_reqwest_client_builds() {
        assert!(ReqwestClient::new(&ClientConfig::default()).is_ok());
        assert!(ReqwestClient::with_timeout(5).is_ok());
    }
}
