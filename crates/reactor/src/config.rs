//! The `oracle.json` configuration file.
//!
//! A missing or malformed file degrades to defaults with a warning; the
//! reactor must come up regardless. Keys the reactor itself does not know
//! are warned about once and handed through to adapters untouched.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

const DEFAULT_SIGN_INTERVAL: Duration = Duration::from_millis(100);
const DEFAULT_MAX_GOSSIP_VOTE_AGE: usize = 2;

/// Reactor configuration, loaded from `oracle.json`.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// Period of the signer tick.
    pub sign_interval: Duration,
    /// Unsigned-vote retention width, in distinct block times.
    pub max_gossip_vote_age: usize,
    /// Adapter-specific sections, passed through to the job executor.
    pub adapters: Arc<serde_json::Map<String, serde_json::Value>>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            sign_interval: DEFAULT_SIGN_INTERVAL,
            max_gossip_vote_age: DEFAULT_MAX_GOSSIP_VOTE_AGE,
            adapters: Arc::new(serde_json::Map::new()),
        }
    }
}

impl OracleConfig {
    /// Load from `path`, degrading to defaults on any failure.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "error opening oracle.json, using defaults");
                return Self::default();
            }
        };
        Self::parse(&raw)
    }

    /// Parse the config document, degrading to defaults on malformed JSON.
    pub fn parse(raw: &str) -> Self {
        let mut doc: serde_json::Map<String, serde_json::Value> = match serde_json::from_str(raw) {
            Ok(doc) => doc,
            Err(err) => {
                warn!(error = %err, "error parsing oracle.json, using defaults");
                return Self::default();
            }
        };

        let mut config = Self::default();

        if let Some(value) = doc.remove("sign_interval") {
            match value.as_u64() {
                Some(ms) if ms > 0 => config.sign_interval = Duration::from_millis(ms),
                _ => warn!(?value, "ignoring invalid sign_interval"),
            }
        }
        if let Some(value) = doc.remove("max_gossip_vote_age") {
            match value.as_u64() {
                Some(age) if age > 0 => config.max_gossip_vote_age = age as usize,
                _ => warn!(?value, "ignoring invalid max_gossip_vote_age"),
            }
        }

        if !doc.is_empty() {
            let keys: Vec<&String> = doc.keys().collect();
            warn!(?keys, "unrecognized oracle.json keys, passing through to adapters");
        }
        config.adapters = Arc::new(doc);
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = OracleConfig::default();
        assert_eq!(config.sign_interval, Duration::from_millis(100));
        assert_eq!(config.max_gossip_vote_age, 2);
        assert!(config.adapters.is_empty());
    }

    #[test]
    fn known_keys_parsed() {
        let config = OracleConfig::parse(r#"{"sign_interval": 250, "max_gossip_vote_age": 4}"#);
        assert_eq!(config.sign_interval, Duration::from_millis(250));
        assert_eq!(config.max_gossip_vote_age, 4);
    }

    #[test]
    fn unknown_keys_become_adapter_sections() {
        let config = OracleConfig::parse(
            r#"{"sign_interval": 250, "http_fetcher": {"timeout_ms": 2000}}"#,
        );
        assert_eq!(config.sign_interval, Duration::from_millis(250));
        assert_eq!(
            config.adapters["http_fetcher"]["timeout_ms"],
            serde_json::json!(2000)
        );
    }

    #[test]
    fn malformed_document_degrades_to_defaults() {
        let config = OracleConfig::parse("{not json");
        assert_eq!(config.sign_interval, Duration::from_millis(100));
        assert_eq!(config.max_gossip_vote_age, 2);
    }

    #[test]
    fn invalid_values_ignored() {
        let config = OracleConfig::parse(r#"{"sign_interval": "fast", "max_gossip_vote_age": 0}"#);
        assert_eq!(config.sign_interval, Duration::from_millis(100));
        assert_eq!(config.max_gossip_vote_age, 2);
    }

    #[test]
    fn missing_file_degrades_to_defaults() {
        let config = OracleConfig::load("/nonexistent/oracle.json");
        assert_eq!(config.sign_interval, Duration::from_millis(100));
    }
}
