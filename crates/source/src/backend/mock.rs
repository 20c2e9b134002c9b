//! In-memory data source for testing.

use crate::backend::DataSource;
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

/// In-memory data source for testing.
///
/// Responses are canned JSON bodies keyed by request path. Every call is
/// recorded (path and requested TTL) so tests can assert what was fetched,
/// and just as importantly what was not. Unknown paths answer HTTP 404.
///
/// # Examples
///
/// ```
/// use paddock_source::backend::{DataSource, MockSource};
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let source = MockSource::with_responses([
///     ("/data/league/get?league_id=1", r#"{"league_id":1}"#),
/// ]);
/// let body = source.get("/data/league/get?league_id=1", Duration::from_secs(60)).await.unwrap();
/// assert_eq!(body, br#"{"league_id":1}"#);
/// assert_eq!(source.count("/data/league/").await, 1);
/// # Ok(())
/// # }
/// ```
pub struct MockSource {
    responses: RwLock<HashMap<String, Vec<u8>>>,
    requests: RwLock<Vec<(String, Duration)>>,
}

impl MockSource {
    /// Create a mock source pre-populated with responses.
    pub fn with_responses(responses: impl IntoIterator<Item = (impl Into<String>, impl Into<Vec<u8>>)>) -> Self {
        let responses = responses.into_iter().map(|(path, body)| (path.into(), body.into())).collect();
        Self {
            responses: RwLock::new(responses),
            requests: RwLock::new(Vec::new()),
        }
    }

    /// Add or replace the canned response for `path`.
    pub async fn insert(&self, path: impl Into<String>, body: impl Into<Vec<u8>>) {
        self.responses.write().await.insert(path.into(), body.into());
    }

    /// Drop the canned response for `path`, so requests for it fail.
    pub async fn remove(&self, path: &str) -> Option<Vec<u8>> {
        self.responses.write().await.remove(path)
    }

    /// Every request made so far, in order.
    pub async fn requests(&self) -> Vec<(String, Duration)> {
        self.requests.read().await.clone()
    }

    /// Number of requests made so far whose path starts with `prefix`.
    pub async fn count(&self, prefix: &str) -> usize {
        self.requests.read().await.iter().filter(|(path, _)| path.starts_with(prefix)).count()
    }

    /// Forget recorded requests (responses are kept).
    pub async fn reset(&self) {
        self.requests.write().await.clear();
    }
}
impl Default for MockSource {
    fn default() -> Self {
        let responses: [(&str, &str); 0] = [];
        Self::with_responses(responses)
    }
}

#[async_trait]
impl DataSource for MockSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn get(&self, path: &str, ttl: Duration) -> Result<Vec<u8>> {
        self.requests.write().await.push((path.to_string(), ttl));
        match self.responses.read().await.get(path) {
            Some(body) => Ok(body.clone()),
            None => exn::bail!(ErrorKind::Status {
                path: path.to_string(),
                status: 404,
            }),
        }
    }
}
