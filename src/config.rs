// ============================================================================
// Engine Configuration
// ============================================================================
//
// Resolution order, last wins:
// 1. built-in defaults
// 2. environment (CATCARE_DATABASE_URL, CATCARE_MAX_CONNECTIONS, RUST_LOG)
// 3. command line flags, applied by the binary
//
// ============================================================================

pub const DEFAULT_DATABASE_URL: &str = "sqlite://catcare.db";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_LOG_FILTER: &str = "info,catcare=debug";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {name} value `{value}`: {reason}")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup("CATCARE_DATABASE_URL") {
            config.database_url = value;
        }

        if let Some(value) = lookup("CATCARE_MAX_CONNECTIONS") {
            let parsed: u32 = value.parse().map_err(|e: std::num::ParseIntError| ConfigError::InvalidValue {
                name: "CATCARE_MAX_CONNECTIONS",
                value: value.clone(),
                reason: e.to_string(),
            })?;
            if parsed == 0 {
                return Err(ConfigError::InvalidValue {
                    name: "CATCARE_MAX_CONNECTIONS",
                    value,
                    reason: "must be at least 1".to_string(),
                });
            }
            config.max_connections = parsed;
        }

        if let Some(value) = lookup("RUST_LOG") {
            config.log_filter = value;
        }

        Ok(config)
    }

    /// Point the store at a plain file path, as given on the command line.
    pub fn with_database_path(mut self, path: &str) -> Self {
        self.database_url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite://{path}")
        };
        self
    }
}
