//! HTTP configuration types.
//!
//! `HttpConfig` carries the explicit timeouts every outbound call must have.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Default timeout for one image upload
pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);
/// Default timeout for one inference call, including a full stream
pub const DEFAULT_INFERENCE_TIMEOUT: Duration = Duration::from_secs(120);
/// Default TCP/TLS connect timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Whole-request timeout (headers and body)
    #[serde(with = "duration_serde")]
    pub timeout: Duration,
    /// Connection timeout
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,
    /// Custom headers
    pub headers: HashMap<String, String>,
    /// User agent
    pub user_agent: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_INFERENCE_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            headers: HashMap::new(),
            user_agent: Some(concat!("medexplain/", env!("CARGO_PKG_VERSION")).to_string()),
        }
    }
}

impl HttpConfig {
    /// Defaults tuned for the image host.
    pub fn for_upload() -> Self {
        Self {
            timeout: DEFAULT_UPLOAD_TIMEOUT,
            ..Self::default()
        }
    }

    /// Whole-request timeout. Zero is rejected when the client is built.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// TCP and TLS connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Extra header sent on every request.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

// Durations travel as whole milliseconds
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
