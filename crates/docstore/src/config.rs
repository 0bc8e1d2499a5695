//! Connection settings for the document store.

use std::time::Duration;

/// Environment variable holding the connection string.
pub const ENV_URI: &str = "MONGODB_URI";
/// Environment variable holding the logical database name.
pub const ENV_DATABASE: &str = "MONGODB_DATABASE";
/// Environment variable holding the server-selection timeout in milliseconds.
pub const ENV_TIMEOUT_MS: &str = "MONGODB_TIMEOUT_MS";

/// Where and how to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// URI-style connection string, e.g. `mongodb://localhost:27017`.
    pub uri: String,
    /// Logical database the returned handle is scoped to.
    pub database: String,
    /// Reported to the server in the handshake.
    pub app_name: Option<String>,
    /// Upper bound on how long the client waits for a usable server.
    /// `None` keeps the driver default (30 s).
    pub server_selection_timeout: Option<Duration>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017".to_string(),
            database: "docstore".to_string(),
            app_name: None,
            server_selection_timeout: None,
        }
    }
}

impl StoreConfig {
    pub fn new(uri: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            database: database.into(),
            ..Self::default()
        }
    }

    /// Build a config from `MONGODB_URI`, `MONGODB_DATABASE` and
    /// `MONGODB_TIMEOUT_MS`, falling back to [`StoreConfig::default`] for
    /// anything unset. An unparsable timeout is ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            uri: lookup(ENV_URI).unwrap_or(defaults.uri),
            database: lookup(ENV_DATABASE).unwrap_or(defaults.database),
            app_name: defaults.app_name,
            server_selection_timeout: lookup(ENV_TIMEOUT_MS)
                .and_then(|raw| raw.trim().parse::<u64>().ok())
                .map(Duration::from_millis),
        }
    }

    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    pub fn with_server_selection_timeout(mut self, timeout: Duration) -> Self {
        self.server_selection_timeout = Some(timeout);
        self
    }
}
