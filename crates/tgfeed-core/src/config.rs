use std::{env, path::PathBuf, time::Duration};

use crate::{errors::Error, Result};

/// Typed configuration for the feed service.
///
/// Everything comes from the environment (optionally seeded from `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub telegram_bot_token: String,
    pub telegram_scratch_chat_id: i64,

    // HTTP
    pub host: String,
    pub port: u16,
    pub readme_path: PathBuf,

    // Cache
    pub cache_ttl: Duration,
    pub cache_evict_interval: Duration,

    // Scan
    pub scan: ScanConfig,
    pub scan_queue_depth: usize,
}

/// Limits for the forward scan loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScanConfig {
    /// Upper bound on probed ids, guards against runaway scans.
    pub max_id: u64,
    /// Consecutive empty ids that end a scan.
    pub empty_run_limit: u32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_id: 1_000_000,
            empty_run_limit: 5,
        }
    }
}

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(8 * 60 * 60);

impl Config {
    pub fn load() -> Result<Self> {
        // Existing variables win over `.env`.
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).and_then(non_empty);

        let telegram_bot_token = get("TELEGRAM_BOT_TOKEN").ok_or_else(|| {
            Error::Config("TELEGRAM_BOT_TOKEN environment variable is required".to_string())
        })?;

        let scratch_raw = get("TELEGRAM_SCRATCH_CHAT_ID").ok_or_else(|| {
            Error::Config("TELEGRAM_SCRATCH_CHAT_ID environment variable is required".to_string())
        })?;
        let telegram_scratch_chat_id = scratch_raw.trim().parse::<i64>().map_err(|_| {
            Error::Config(format!(
                "TELEGRAM_SCRATCH_CHAT_ID must be a numeric chat id, got {scratch_raw:?}"
            ))
        })?;

        let host = get("HOST").unwrap_or_else(|| "localhost".to_string());
        let port = parse_or(get("PORT"), "PORT", 3000u16)?;
        let readme_path = PathBuf::from(get("README_PATH").unwrap_or_else(|| "README.md".into()));

        let cache_ttl = Duration::from_secs(parse_or(
            get("CACHE_TTL_SECS"),
            "CACHE_TTL_SECS",
            DEFAULT_CACHE_TTL.as_secs(),
        )?);
        let cache_evict_interval = Duration::from_secs(
            parse_or(
                get("CACHE_EVICT_INTERVAL_SECS"),
                "CACHE_EVICT_INTERVAL_SECS",
                600u64,
            )?
            .max(1),
        );

        let defaults = ScanConfig::default();
        let scan = ScanConfig {
            max_id: parse_or(get("SCAN_MAX_ID"), "SCAN_MAX_ID", defaults.max_id)?,
            empty_run_limit: parse_or(
                get("SCAN_EMPTY_RUN_LIMIT"),
                "SCAN_EMPTY_RUN_LIMIT",
                defaults.empty_run_limit,
            )?
            .max(1),
        };
        let scan_queue_depth =
            parse_or(get("SCAN_QUEUE_DEPTH"), "SCAN_QUEUE_DEPTH", 64usize)?.max(1);

        Ok(Self {
            telegram_bot_token,
            telegram_scratch_chat_id,
            host,
            port,
            readme_path,
            cache_ttl,
            cache_evict_interval,
            scan,
            scan_queue_depth,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, key: &str, default: T) -> Result<T> {
    match raw {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse::<T>()
            .map_err(|_| Error::Config(format!("{key} has an invalid value: {v:?}"))),
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_apply_when_only_required_vars_set() {
        let cfg = Config::from_lookup(lookup(&[
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
            ("TELEGRAM_SCRATCH_CHAT_ID", "-100200300"),
        ]))
        .unwrap();

        assert_eq!(cfg.telegram_scratch_chat_id, -100200300);
        assert_eq!(cfg.bind_addr(), "localhost:3000");
        assert_eq!(cfg.cache_ttl, Duration::from_secs(28_800));
        assert_eq!(cfg.scan, ScanConfig::default());
        assert_eq!(cfg.readme_path, PathBuf::from("README.md"));
    }

    #[test]
    fn missing_token_is_config_error() {
        let err = Config::from_lookup(lookup(&[("TELEGRAM_SCRATCH_CHAT_ID", "1")])).unwrap_err();
        assert!(matches!(err, Error::Config(m) if m.contains("TELEGRAM_BOT_TOKEN")));
    }

    #[test]
    fn blank_token_counts_as_missing() {
        let err = Config::from_lookup(lookup(&[
            ("TELEGRAM_BOT_TOKEN", "   "),
            ("TELEGRAM_SCRATCH_CHAT_ID", "1"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn non_numeric_scratch_chat_is_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("TELEGRAM_SCRATCH_CHAT_ID", "@me"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(m) if m.contains("numeric")));
    }

    #[test]
    fn overrides_are_parsed_and_clamped() {
        let cfg = Config::from_lookup(lookup(&[
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("TELEGRAM_SCRATCH_CHAT_ID", "42"),
            ("HOST", "0.0.0.0"),
            ("PORT", "8080"),
            ("CACHE_TTL_SECS", "60"),
            ("SCAN_MAX_ID", "500"),
            ("SCAN_EMPTY_RUN_LIMIT", "0"),
        ]))
        .unwrap();

        assert_eq!(cfg.bind_addr(), "0.0.0.0:8080");
        assert_eq!(cfg.cache_ttl, Duration::from_secs(60));
        assert_eq!(cfg.scan.max_id, 500);
        assert_eq!(cfg.scan.empty_run_limit, 1);
    }

    #[test]
    fn bad_port_is_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("TELEGRAM_SCRATCH_CHAT_ID", "42"),
            ("PORT", "http"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(m) if m.contains("PORT")));
    }
}
