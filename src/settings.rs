//! Runtime settings from environment variables.

use crate::error::ConfigError;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_DATABASE_URL: &str = "postgres://localhost/f1db";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 60 * 60;
const DEFAULT_BODY_LIMIT_BYTES: usize = 1024 * 1024;

#[derive(Clone, Debug)]
pub struct Settings {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub max_connections: u32,
    pub session_ttl: Duration,
    /// Add `Secure` to session cookies (serve over HTTPS).
    pub cookie_secure: bool,
    /// JSON catalog to use instead of the built-in one.
    pub catalog_path: Option<PathBuf>,
    /// Create missing tables at startup.
    pub auto_migrate: bool,
    /// Seed or reset this admin account at startup when both are set.
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    pub body_limit_bytes: usize,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Ok(Settings {
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.into()),
            bind_addr: parse_or(&get, "BIND_ADDR", SocketAddr::from_str(DEFAULT_BIND_ADDR).ok())?,
            max_connections: parse_or(&get, "DATABASE_MAX_CONNECTIONS", Some(DEFAULT_MAX_CONNECTIONS))?,
            session_ttl: Duration::from_secs(parse_or(&get, "SESSION_TTL_SECS", Some(DEFAULT_SESSION_TTL_SECS))?),
            cookie_secure: parse_bool(&get, "COOKIE_SECURE", false)?,
            catalog_path: get("CATALOG_PATH").map(PathBuf::from),
            auto_migrate: parse_bool(&get, "AUTO_MIGRATE", true)?,
            admin_username: get("ADMIN_USERNAME"),
            admin_password: get("ADMIN_PASSWORD"),
            body_limit_bytes: parse_or(&get, "BODY_LIMIT_BYTES", Some(DEFAULT_BODY_LIMIT_BYTES))?,
        })
    }

    /// Admin account to seed, when both username and password are configured.
    pub fn admin_seed(&self) -> Option<(&str, &str)> {
        match (&self.admin_username, &self.admin_password) {
            (Some(u), Some(p)) => Some((u.as_str(), p.as_str())),
            _ => None,
        }
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: Option<T>) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| ConfigError::Validation(format!("{}: {}", key, e))),
        None => default.ok_or_else(|| ConfigError::Validation(format!("{} is required", key))),
    }
}

fn parse_bool<G>(get: &G, key: &str, default: bool) -> Result<bool, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key).map(|v| v.to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => Err(ConfigError::Validation(format!("{}: not a boolean: {}", key, v))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Settings::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(s.bind_addr.port(), 5000);
        assert_eq!(s.session_ttl, Duration::from_secs(86_400));
        assert!(s.auto_migrate);
        assert!(!s.cookie_secure);
        assert!(s.catalog_path.is_none());
        assert!(s.admin_seed().is_none());
    }

    #[test]
    fn overrides_and_errors() {
        let s = settings(&[
            ("BIND_ADDR", "127.0.0.1:8080"),
            ("SESSION_TTL_SECS", "60"),
            ("AUTO_MIGRATE", "false"),
            ("ADMIN_USERNAME", "root"),
            ("ADMIN_PASSWORD", "secret"),
            ("CATALOG_PATH", " "),
        ])
        .unwrap();
        assert_eq!(s.bind_addr.port(), 8080);
        assert_eq!(s.session_ttl, Duration::from_secs(60));
        assert!(!s.auto_migrate);
        assert_eq!(s.admin_seed(), Some(("root", "secret")));
        assert!(s.catalog_path.is_none());

        assert!(settings(&[("DATABASE_MAX_CONNECTIONS", "many")]).is_err());
        assert!(settings(&[("COOKIE_SECURE", "maybe")]).is_err());
    }
}
