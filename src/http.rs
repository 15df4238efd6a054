//! HTTP client builder utilities
//!
//! Both outbound clients (image host and inference provider) are built here so
//! that neither can be constructed without an explicit timeout.

use crate::error::PipelineError;
use crate::types::HttpConfig;

/// Build a `reqwest::Client` from `HttpConfig`.
pub fn build_http_client_from_config(
    config: &HttpConfig,
) -> Result<reqwest::Client, PipelineError> {
    if config.timeout.is_zero() {
        return Err(PipelineError::Config(
            "HTTP timeout must be greater than zero".to_string(),
        ));
    }

    let mut builder = reqwest::Client::builder()
        .timeout(config.timeout)
        .connect_timeout(config.connect_timeout);

    if let Some(user_agent) = &config.user_agent {
        builder = builder.user_agent(user_agent);
    }

    if !config.headers.is_empty() {
        let mut headers = reqwest::header::HeaderMap::new();
        for (k, v) in &config.headers {
            let name = reqwest::header::HeaderName::from_bytes(k.as_bytes()).map_err(|e| {
                PipelineError::Config(format!("Invalid header name '{k}': {e}"))
            })?;
            let value = reqwest::header::HeaderValue::from_str(v).map_err(|e| {
                PipelineError::Config(format!("Invalid header value for '{k}': {e}"))
            })?;
            headers.insert(name, value);
        }
        builder = builder.default_headers(headers);
    }

    builder
        .build()
        .map_err(|e| PipelineError::Config(format!("Failed to create HTTP client: {e}")))
}

/// Describe a reqwest failure without the request URL, which may carry an API key.
pub(crate) fn describe_reqwest_error(err: reqwest::Error) -> String {
    let err = err.without_url();
    if err.is_timeout() {
        format!("request timed out: {err}")
    } else if err.is_connect() {
        format!("connection failed: {err}")
    } else {
        err.to_string()
    }
}
