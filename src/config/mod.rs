use std::env;
use std::str::FromStr;

/// Which persistence backend the registry and queue run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    /// In-process store; state is lost on restart. Local development only.
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(ConfigError::Invalid {
                key: "STORE_BACKEND",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub frontend_url: String,
    pub classifier_enabled: bool,
    pub classifier_api_url: Option<String>,
    pub classifier_api_key: Option<String>,
    pub classifier_timeout_secs: u64,
    /// Interval for republishing the active pattern set; 0 disables the refresher.
    pub active_set_refresh_secs: u64,
    /// Upper bound on compiled regex size, in bytes.
    pub regex_size_limit: usize,
    pub tls_cert_path: Option<String>,
    pub tls_key_path: Option<String>,
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_or<T: FromStr>(key: &str, default: T) -> T {
    optional(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let store_backend = match optional("STORE_BACKEND") {
            Some(v) => v.parse()?,
            None => StoreBackend::Postgres,
        };
        let database_url = optional("DATABASE_URL");
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        Ok(Self {
            store_backend,
            database_url,
            database_max_connections: parsed_or("DATABASE_MAX_CONNECTIONS", 10),
            host: optional("BACKEND_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parsed_or("BACKEND_PORT", 3000),
            jwt_secret: optional("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?,
            frontend_url: optional("FRONTEND_URL")
                .unwrap_or_else(|| "https://localhost:5173".to_string()),
            classifier_enabled: parsed_or("CLASSIFIER_ENABLED", false),
            classifier_api_url: optional("CLASSIFIER_API_URL"),
            classifier_api_key: optional("CLASSIFIER_API_KEY"),
            classifier_timeout_secs: parsed_or("CLASSIFIER_TIMEOUT_SECS", 5),
            active_set_refresh_secs: parsed_or("ACTIVE_SET_REFRESH_SECS", 30),
            regex_size_limit: parsed_or("REGEX_SIZE_LIMIT", 1 << 20),
            tls_cert_path: optional("TLS_CERT_PATH"),
            tls_key_path: optional("TLS_KEY_PATH"),
        })
    }

    /// Configuration for tests and tooling: memory store, no classifier, no refresher.
    pub fn for_memory(jwt_secret: &str) -> Self {
        Self {
            store_backend: StoreBackend::Memory,
            database_url: None,
            database_max_connections: 1,
            host: "127.0.0.1".to_string(),
            port: 0,
            jwt_secret: jwt_secret.to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            classifier_enabled: false,
            classifier_api_url: None,
            classifier_api_key: None,
            classifier_timeout_secs: 5,
            active_set_refresh_secs: 0,
            regex_size_limit: 1 << 20,
            tls_cert_path: None,
            tls_key_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_backend_parses_case_insensitively() {
        assert_eq!("Postgres".parse::<StoreBackend>().unwrap(), StoreBackend::Postgres);
        assert_eq!(" memory ".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert!("sqlite".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn memory_config_disables_refresher() {
        let config = AppConfig::for_memory("secret");
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.active_set_refresh_secs, 0);
        assert!(!config.classifier_enabled);
    }
}
