//! Environment-sourced service configuration.

use std::env;

/// Configuration for the execution service, resolved from environment
/// variables with documented defaults. `.env` is loaded first (never
/// overwriting an already-set environment variable), then the process
/// environment is read.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub timeout_seconds_card: u64,
    pub timeout_seconds_transform: u64,
    pub max_memory_mb_card: u64,
    pub max_memory_mb_transform: u64,
    pub bind_host: String,
    pub bind_port: u16,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            timeout_seconds_card: 10,
            timeout_seconds_transform: 300,
            max_memory_mb_card: 2048,
            max_memory_mb_transform: 4096,
            bind_host: "0.0.0.0".to_string(),
            bind_port: 8001,
        }
    }
}

impl ServiceConfig {
    /// Load from the environment, falling back to the documented defaults
    /// for any key that is absent or fails to parse.
    pub fn from_env() -> ServiceConfig {
        let defaults = ServiceConfig::default();
        ServiceConfig {
            timeout_seconds_card: env_u64("TIMEOUT_SECONDS_CARD", defaults.timeout_seconds_card),
            timeout_seconds_transform: env_u64(
                "TIMEOUT_SECONDS_TRANSFORM",
                defaults.timeout_seconds_transform,
            ),
            max_memory_mb_card: env_u64("MAX_MEMORY_MB_CARD", defaults.max_memory_mb_card),
            max_memory_mb_transform: env_u64(
                "MAX_MEMORY_MB_TRANSFORM",
                defaults.max_memory_mb_transform,
            ),
            bind_host: env::var("BIND_HOST").unwrap_or(defaults.bind_host),
            bind_port: env::var("BIND_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.bind_port),
        }
    }

    pub fn card_memory_bytes(&self) -> u64 {
        self.max_memory_mb_card * 1024 * 1024
    }

    pub fn transform_memory_bytes(&self) -> u64 {
        self.max_memory_mb_transform * 1024 * 1024
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.bind_port)
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = ServiceConfig::default();
        assert_eq!(config.timeout_seconds_card, 10);
        assert_eq!(config.timeout_seconds_transform, 300);
        assert_eq!(config.max_memory_mb_card, 2048);
        assert_eq!(config.max_memory_mb_transform, 4096);
        assert_eq!(config.bind_port, 8001);
    }

    #[test]
    fn memory_helpers_convert_mb_to_bytes() {
        let config = ServiceConfig::default();
        assert_eq!(config.card_memory_bytes(), 2048 * 1024 * 1024);
        assert_eq!(config.transform_memory_bytes(), 4096 * 1024 * 1024);
    }

    #[test]
    fn bind_addr_combines_host_and_port() {
        let config = ServiceConfig { bind_host: "127.0.0.1".into(), bind_port: 9000, ..ServiceConfig::default() };
        assert_eq!(config.bind_addr(), "127.0.0.1:9000");
    }
}
