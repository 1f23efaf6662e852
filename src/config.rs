//! Process-level configuration read from the environment.

use std::time::Duration;

use anyhow::{Context, Result};
use url::Url;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: Url,
    pub request_timeout: Duration,
    pub debug: bool,
}

impl BackendConfig {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url =
            Url::parse(base_url).with_context(|| format!("invalid backend url '{base_url}'"))?;
        Ok(Self {
            base_url,
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            debug: false,
        })
    }

    /// Reads `SENTINEL_API_URL`, `SENTINEL_REQUEST_TIMEOUT_MS` and `SENTINEL_DEBUG`.
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var("SENTINEL_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let mut config = Self::new(base_url.trim())?;

        if let Ok(raw) = std::env::var("SENTINEL_REQUEST_TIMEOUT_MS") {
            let millis: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("SENTINEL_REQUEST_TIMEOUT_MS is not a number: '{raw}'"))?;
            config.request_timeout = Duration::from_millis(millis.max(1));
        }

        config.debug = std::env::var("SENTINEL_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(config)
    }

    /// Joins an absolute API path onto the base url, keeping any base path prefix.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        base.join(path.trim_start_matches('/'))
            .with_context(|| format!("cannot build endpoint for '{path}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_endpoints_onto_base() {
        let config = BackendConfig::new("http://rig.local:8000").unwrap();
        assert_eq!(
            config.endpoint("/api/state").unwrap().as_str(),
            "http://rig.local:8000/api/state"
        );

        let prefixed = BackendConfig::new("https://gateway.test/sentinel").unwrap();
        assert_eq!(
            prefixed.endpoint("/api/history").unwrap().as_str(),
            "https://gateway.test/sentinel/api/history"
        );
    }

    #[test]
    fn rejects_garbage_url() {
        assert!(BackendConfig::new("not a url").is_err());
    }
}
