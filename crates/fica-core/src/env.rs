//! Environment variable helpers
//!
//! Used by `PoolConfig::from_env()` and the command-line tools.
//!
//! ```ignore
//! use fica_core::env::{env_get, env_get_bool, env_get_list};
//!
//! let workers: usize = env_get("FICA_NUM_WORKERS", 4);
//! let bind = env_get_bool("FICA_BIND", false);
//! let cores: Option<Vec<usize>> = env_get_list("FICA_CORES");
//! ```

use std::str::FromStr;

/// Parse `key` as `T`, or return `default` when unset or unparsable
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    env_get_opt(key).unwrap_or(default)
}

/// Parse `key` as `T`; `None` when unset or unparsable
#[inline]
pub fn env_get_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Boolean flag.
///
/// "1", "true", "yes", "on" (any case) are true, anything else set is
/// false, unset is `default`.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => matches!(
            val.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => default,
    }
}

/// Comma-separated list such as `FICA_CORES=0,2,4`.
///
/// `None` when unset, empty, or when any element fails to parse.
pub fn env_get_list<T>(key: &str) -> Option<Vec<T>>
where
    T: FromStr,
{
    let raw = std::env::var(key).ok()?;
    parse_list(&raw)
}

fn parse_list<T: FromStr>(raw: &str) -> Option<Vec<T>> {
    let list: Option<Vec<T>> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().ok())
        .collect();
    list.filter(|l| !l.is_empty())
}
