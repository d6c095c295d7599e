//! Client configuration.

use remodel_model::{DEFAULT_LIMIT, ResponseKeys};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings shared by every resource of one client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL every schema endpoint is appended to (e.g. `https://api.example.com/v1`).
    pub base_url: String,
    /// Key names of paginated collection responses.
    pub response_keys: ResponseKeys,
    /// Deadline of a single request, in milliseconds.
    pub timeout_ms: u64,
    /// Page size used when paging a collection that was never queried.
    pub page_limit: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            response_keys: ResponseKeys::default(),
            timeout_ms: 20_000,
            page_limit: DEFAULT_LIMIT,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
