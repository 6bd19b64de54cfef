//! Effective sidecar configuration.
//!
//! Values come from the environment at startup and can be overridden per
//! workspace; overrides are persisted in the workspace `settings` table.

use rusqlite::Connection;
use serde::Serialize;
use serde_json::json;
use std::time::Duration;

use crate::db;

pub const DEFAULT_API_ORIGIN: &str = "http://localhost:5000";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

pub const ENV_API_ORIGIN: &str = "REGISTRYD_API_ORIGIN";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "REGISTRYD_HTTP_TIMEOUT_SECS";

const SETTING_API_ORIGIN: &str = "api.origin";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Backend origin, also used as the static-asset origin for photos.
    pub api_origin: String,
    pub http_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_origin: DEFAULT_API_ORIGIN.to_string(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Config::default();
        if let Some(origin) = lookup(ENV_API_ORIGIN) {
            if let Some(origin) = normalize_origin(&origin) {
                cfg.api_origin = origin;
            }
        }
        if let Some(secs) = lookup(ENV_HTTP_TIMEOUT_SECS) {
            match secs.trim().parse::<u64>() {
                Ok(n) if n > 0 => cfg.http_timeout_secs = n,
                _ => tracing::warn!(value = %secs, "ignoring invalid {}", ENV_HTTP_TIMEOUT_SECS),
            }
        }
        cfg
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn api_url(&self, path: &str) -> String {
        format!("{}/api/{}", self.api_origin, path.trim_start_matches('/'))
    }

    /// Applies the workspace's stored overrides on top of `self`.
    pub fn with_workspace_overrides(mut self, conn: &Connection) -> anyhow::Result<Self> {
        if let Some(v) = db::settings_get_json(conn, SETTING_API_ORIGIN)? {
            if let Some(origin) = v.as_str().and_then(normalize_origin) {
                self.api_origin = origin;
            }
        }
        Ok(self)
    }

    pub fn store_api_origin(conn: &Connection, origin: &str) -> anyhow::Result<Option<String>> {
        let Some(origin) = normalize_origin(origin) else {
            return Ok(None);
        };
        db::settings_set_json(conn, SETTING_API_ORIGIN, &json!(origin))?;
        Ok(Some(origin))
    }
}

/// Trims whitespace and trailing slashes; rejects anything that is not http(s).
pub fn normalize_origin(raw: &str) -> Option<String> {
    let t = raw.trim().trim_end_matches('/');
    if t.starts_with("http://") || t.starts_with("https://") {
        Some(t.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn env_overrides_defaults() {
        let env: HashMap<&str, &str> = [
            (ENV_API_ORIGIN, "https://registry.example.org/"),
            (ENV_HTTP_TIMEOUT_SECS, "5"),
        ]
        .into_iter()
        .collect();
        let cfg = Config::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.api_origin, "https://registry.example.org");
        assert_eq!(cfg.http_timeout_secs, 5);
        assert_eq!(
            cfg.api_url("/schools"),
            "https://registry.example.org/api/schools"
        );
    }

    #[test]
    fn invalid_env_values_fall_back() {
        let env: HashMap<&str, &str> = [
            (ENV_API_ORIGIN, "localhost:5000"),
            (ENV_HTTP_TIMEOUT_SECS, "zero"),
        ]
        .into_iter()
        .collect();
        let cfg = Config::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg, Config::default());
    }
}
