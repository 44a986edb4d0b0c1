//! Engine configuration.
//!
//! Defaults match the editor's interactive feel: saves settle after 400ms of
//! quiet, previews after one second.

use std::time::Duration;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base URL of the workspace API, without trailing slash
    pub api_base_url: String,
    /// Path of the compile endpoint, relative to `api_base_url`
    pub compile_path: String,
    /// Quiet window before an edited file is written remotely
    pub save_debounce: Duration,
    /// Quiet window before an automatic compile fires
    pub compile_debounce: Duration,
    /// Per-request timeout for the HTTP client
    pub request_timeout: Duration,
    /// Compile automatically after edits (manual compile always works)
    pub auto_compile: bool,
    /// Engine event channel capacity
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080/api/v1".to_string(),
            compile_path: "/compile".to_string(),
            save_debounce: Duration::from_millis(400),
            compile_debounce: Duration::from_millis(1000),
            request_timeout: Duration::from_secs(30),
            auto_compile: true,
            event_capacity: 256,
        }
    }
}

impl EngineConfig {
    /// Create config for testing (short windows).
    pub fn for_testing() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:0".to_string(),
            save_debounce: Duration::from_millis(40),
            compile_debounce: Duration::from_millis(100),
            request_timeout: Duration::from_secs(5),
            ..Self::default()
        }
    }

    /// Defaults overridden by `TEXLER_*` environment variables.
    ///
    /// Malformed values are ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("TEXLER_API_URL") {
            config.api_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(path) = lookup("TEXLER_COMPILE_PATH") {
            config.compile_path = path;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "TEXLER_SAVE_DEBOUNCE_MS") {
            config.save_debounce = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "TEXLER_COMPILE_DEBOUNCE_MS") {
            config.compile_debounce = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "TEXLER_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(auto) = parse_var::<bool>(&lookup, "TEXLER_AUTO_COMPILE") {
            config.auto_compile = auto;
        }

        config
    }

    /// Full URL of an API path.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base_url, path.trim_start_matches('/'))
    }

    pub fn compile_url(&self) -> String {
        self.url(&self.compile_path)
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("Ignoring malformed {key}={raw:?}");
            None
        }
    }
}
