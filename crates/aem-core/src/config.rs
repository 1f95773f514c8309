//! Connection settings for an AEM instance.

use serde::{Deserialize, Serialize};

/// AEM connection configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Instance URL, e.g. `http://localhost:4502`
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            base_url: std::env::var("AEM_URL")
                .unwrap_or_else(|_| "http://localhost:4502".to_string()),
            username: std::env::var("AEM_USERNAME").unwrap_or_else(|_| "admin".to_string()),
            password: std::env::var("AEM_PASSWORD").unwrap_or_else(|_| "admin".to_string()),
            timeout_secs: std::env::var("AEM_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(300),
        }
    }
}

impl ClientConfig {
    /// Create config for a specific instance with default credentials
    pub fn new(base_url: &str) -> Self {
        ClientConfig {
            base_url: base_url.to_string(),
            username: "admin".to_string(),
            password: "admin".to_string(),
            timeout_secs: 300,
        }
    }

    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.username = username.to_string();
        self.password = password.to_string();
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Base URL without a trailing slash
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}
