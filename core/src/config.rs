use std::env;

/// Default relay set used when EXODUS_RELAYS is not configured.
const DEFAULT_RELAYS: &str = "wss://relay.damus.io,wss://nos.lol,wss://relay.primal.net";

/// Default content-addressed media host.
const DEFAULT_MEDIA_HOST: &str = "https://blossom.primal.net";

const DEFAULT_PUBLISH_QUORUM: usize = 1;
const DEFAULT_WORKERS: usize = 3;

/// Configuration for one migration run.
///
/// Read once at startup; passed by reference into every component via the
/// run context, never consulted through globals.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Relay endpoints events are fanned out to.
    pub relays: Vec<String>,
    /// Base URL of the content-addressed media host.
    pub media_host: String,
    /// Optional authenticated proxy used to fetch source media bytes.
    pub media_proxy: Option<String>,
    /// Optional cache-import endpoint for read-after-write visibility.
    pub cache_import_url: Option<String>,
    /// Minimum number of relay acks for a publish to count as successful.
    pub publish_quorum: usize,
    /// Fixed size of the task worker pool.
    pub workers: usize,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            relays: parse_relay_list(DEFAULT_RELAYS),
            media_host: DEFAULT_MEDIA_HOST.to_string(),
            media_proxy: None,
            cache_import_url: None,
            publish_quorum: DEFAULT_PUBLISH_QUORUM,
            workers: DEFAULT_WORKERS,
        }
    }
}

impl MigrationConfig {
    /// Build configuration from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let relays = env::var("EXODUS_RELAYS")
            .map(|s| parse_relay_list(&s))
            .ok()
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| parse_relay_list(DEFAULT_RELAYS));

        let media_host = env::var("EXODUS_MEDIA_HOST")
            .ok()
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_MEDIA_HOST.to_string());

        Self {
            relays,
            media_host,
            media_proxy: env::var("EXODUS_MEDIA_PROXY").ok().filter(|s| !s.is_empty()),
            cache_import_url: env::var("EXODUS_CACHE_IMPORT_URL")
                .ok()
                .filter(|s| !s.is_empty()),
            publish_quorum: parse_or_default("EXODUS_PUBLISH_QUORUM", DEFAULT_PUBLISH_QUORUM),
            workers: parse_or_default("EXODUS_WORKERS", DEFAULT_WORKERS).max(1),
        }
    }
}

/// Split a comma-separated relay list, trimming entries and dropping blanks.
pub fn parse_relay_list(relays: &str) -> Vec<String> {
    relays
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_or_default(var: &str, default: usize) -> usize {
    env::var(var)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MigrationConfig::default();
        assert_eq!(config.relays.len(), 3);
        assert_eq!(config.publish_quorum, 1);
        assert_eq!(config.workers, 3);
        assert!(config.media_proxy.is_none());
    }

    #[test]
    fn test_parse_relay_list_trims_and_filters() {
        let relays = parse_relay_list(" wss://a.example , ,wss://b.example,");
        assert_eq!(relays, vec!["wss://a.example", "wss://b.example"]);
    }

    #[test]
    fn test_parse_relay_list_empty_input() {
        assert!(parse_relay_list("").is_empty());
        assert!(parse_relay_list(" , ,").is_empty());
    }
}
