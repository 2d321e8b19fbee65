//! Client configuration.

use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000/api";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_CREDENTIALS_PATH: &str = ".todo-session.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Root of the service, e.g. `http://host:5000/api`.
    pub base_url: String,
    /// Upper bound on a single request.
    pub timeout: Duration,
    /// Where the session record is persisted.
    pub credentials_path: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            credentials_path: PathBuf::from(DEFAULT_CREDENTIALS_PATH),
        }
    }
}

impl ClientConfig {
    /// Reads `TODO_API_URL`, `TODO_HTTP_TIMEOUT_SECS` and
    /// `TODO_CREDENTIALS_PATH`, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let timeout = match lookup("TODO_HTTP_TIMEOUT_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    warn!(value = %raw, "invalid TODO_HTTP_TIMEOUT_SECS, using default");
                    defaults.timeout
                }
            },
            None => defaults.timeout,
        };

        Self {
            base_url: lookup("TODO_API_URL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.base_url),
            timeout,
            credentials_path: lookup("TODO_CREDENTIALS_PATH")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.credentials_path),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> ClientConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ClientConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(config(&[]), ClientConfig::default());
    }

    #[test]
    fn reads_overrides() {
        let c = config(&[
            ("TODO_API_URL", "http://10.0.0.2:5000/api"),
            ("TODO_HTTP_TIMEOUT_SECS", "3"),
            ("TODO_CREDENTIALS_PATH", "/tmp/session.json"),
        ]);
        assert_eq!(c.base_url, "http://10.0.0.2:5000/api");
        assert_eq!(c.timeout, Duration::from_secs(3));
        assert_eq!(c.credentials_path, PathBuf::from("/tmp/session.json"));
    }

    #[test]
    fn bad_timeout_falls_back() {
        assert_eq!(config(&[("TODO_HTTP_TIMEOUT_SECS", "soon")]).timeout, DEFAULT_TIMEOUT);
        assert_eq!(config(&[("TODO_HTTP_TIMEOUT_SECS", "0")]).timeout, DEFAULT_TIMEOUT);
    }
}
