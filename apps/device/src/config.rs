//! Device configuration from the environment.

use std::path::PathBuf;

use rankboard_core::social::{RateLimit, RateLimitConfig};

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceConfig {
    /// Shared store endpoint; `None` keeps the device offline.
    pub backend_url: Option<String>,
    pub db_path: PathBuf,
    pub limits: RateLimitConfig,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            backend_url: None,
            db_path: default_db_path(),
            limits: RateLimitConfig::default(),
        }
    }
}

fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rankboard")
        .join("rankboard.db")
}

impl DeviceConfig {
    /// Read `RANKBOARD_*` variables, loading `.env` first when present.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = RateLimitConfig::default();
        let limit = |key: &str, fallback: RateLimit| -> anyhow::Result<RateLimit> {
            match lookup(key) {
                Some(raw) => {
                    let count = raw.trim().parse::<u32>().map_err(|e| {
                        anyhow::anyhow!("{} must be a non-negative integer: {}", key, e)
                    })?;
                    Ok(RateLimit { count, ..fallback })
                }
                None => Ok(fallback),
            }
        };

        Ok(Self {
            backend_url: lookup("RANKBOARD_BACKEND_URL").filter(|u| !u.trim().is_empty()),
            db_path: lookup("RANKBOARD_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(default_db_path),
            limits: RateLimitConfig {
                friend_requests: limit(
                    "RANKBOARD_LIMIT_FRIEND_REQUESTS",
                    defaults.friend_requests,
                )?,
                reports: limit("RANKBOARD_LIMIT_REPORTS", defaults.reports)?,
                boards: limit("RANKBOARD_LIMIT_BOARDS", defaults.boards)?,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<DeviceConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DeviceConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_are_offline() {
        let config = config(&[]).unwrap();
        assert_eq!(config.backend_url, None);
        assert!(config.db_path.ends_with("rankboard/rankboard.db"));
        assert_eq!(config.limits, RateLimitConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("RANKBOARD_BACKEND_URL", "http://localhost:3000"),
            ("RANKBOARD_DB_PATH", "/tmp/rb.db"),
            ("RANKBOARD_LIMIT_BOARDS", "5"),
        ])
        .unwrap();
        assert_eq!(config.backend_url.as_deref(), Some("http://localhost:3000"));
        assert_eq!(config.db_path, PathBuf::from("/tmp/rb.db"));
        assert_eq!(config.limits.boards.count, 5);
        assert_eq!(config.limits.reports.count, 10);
    }

    #[test]
    fn test_bad_limit_is_rejected() {
        assert!(config(&[("RANKBOARD_LIMIT_REPORTS", "many")]).is_err());
    }
}
