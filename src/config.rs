use std::time::Duration;

// ============================================================================
// Startup Configuration
// ============================================================================
//
// One explicitly configured store endpoint, read once at startup. A wrong
// endpoint fails at connect time instead of being probed around.
//
// ============================================================================

const DEFAULT_STORE_NODE: &str = "127.0.0.1:9042";
const DEFAULT_KEYSPACE: &str = "order_dispatch";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 2_000;

#[derive(Debug, Clone)]
pub struct Config {
    /// Address of the single store node to contact.
    pub store_node: String,
    pub keyspace: String,
    /// Upper bound for every store request.
    pub request_timeout: Duration,
    /// When set, side-effect failures surface as PartialSuccess instead
    /// of being logged and swallowed.
    pub strict_side_effects: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let timeout_ms = lookup("ORDER_DISPATCH_TIMEOUT_MS")
            .and_then(|value| value.parse().ok())
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS);

        Self {
            store_node: lookup("ORDER_DISPATCH_STORE_NODE")
                .unwrap_or_else(|| DEFAULT_STORE_NODE.to_string()),
            keyspace: lookup("ORDER_DISPATCH_KEYSPACE")
                .unwrap_or_else(|| DEFAULT_KEYSPACE.to_string()),
            request_timeout: Duration::from_millis(timeout_ms),
            strict_side_effects: lookup("ORDER_DISPATCH_STRICT_SIDE_EFFECTS")
                .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_nothing_is_set() {
        let config = Config::from_lookup(|_| None);

        assert_eq!(config.store_node, DEFAULT_STORE_NODE);
        assert_eq!(config.keyspace, DEFAULT_KEYSPACE);
        assert_eq!(config.request_timeout, Duration::from_millis(2_000));
        assert!(!config.strict_side_effects);
    }

    #[test]
    fn test_values_come_from_environment() {
        let config = Config::from_lookup(|key| match key {
            "ORDER_DISPATCH_STORE_NODE" => Some("10.0.0.5:9042".to_string()),
            "ORDER_DISPATCH_KEYSPACE" => Some("orders_prod".to_string()),
            "ORDER_DISPATCH_TIMEOUT_MS" => Some("500".to_string()),
            "ORDER_DISPATCH_STRICT_SIDE_EFFECTS" => Some("true".to_string()),
            _ => None,
        });

        assert_eq!(config.store_node, "10.0.0.5:9042");
        assert_eq!(config.keyspace, "orders_prod");
        assert_eq!(config.request_timeout, Duration::from_millis(500));
        assert!(config.strict_side_effects);
    }

    #[test]
    fn test_unparseable_timeout_falls_back_to_default() {
        let config = Config::from_lookup(|key| {
            (key == "ORDER_DISPATCH_TIMEOUT_MS").then(|| "soon".to_string())
        });
        assert_eq!(config.request_timeout, Duration::from_millis(2_000));
    }
}
