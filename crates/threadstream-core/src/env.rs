//! Environment variable utilities
//!
//! Typed lookups with defaults, used by `StreamConfig::from_env()` and the
//! logging setup.
//!
//! # Usage
//!
//! ```ignore
//! use threadstream_core::env::{env_get, env_get_bool, env_get_size};
//!
//! let retries: u32 = env_get("TS_FLUSH_RETRIES", 10);
//! let sync = env_get_bool("TS_SYNC", true);
//! let capacity = env_get_size("TS_BUFFER_SIZE", 4 * 1024 * 1024); // "4M", "512K", "65536"
//! ```

use std::str::FromStr;

/// Get environment variable parsed as type T, or return default
///
/// Unset and unparsable values both fall back to `default`.
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    env_get_opt(key).unwrap_or(default)
}

/// Get environment variable as optional value
#[inline]
pub fn env_get_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Get environment variable as boolean
///
/// "1", "true", "yes", "on" (case-insensitive) are true, anything else set
/// is false, unset returns the default.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => parse_bool(&val),
        Err(_) => default,
    }
}

/// Boolean spelling shared by every flag variable
#[inline]
pub fn parse_bool(val: &str) -> bool {
    matches!(val.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Get environment variable as a byte size, or return default
///
/// Accepts a plain number or one with a `K`, `M` or `G` suffix (binary
/// multiples, optional trailing `B`/`iB`).
pub fn env_get_size(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| parse_size(&v))
        .unwrap_or(default)
}

/// Parse "4M", "512k", "1GiB", "65536"
pub fn parse_size(s: &str) -> Option<usize> {
    let s = s.trim();
    let upper = s.to_ascii_uppercase();
    let trimmed = upper
        .strip_suffix("IB")
        .or_else(|| upper.strip_suffix('B'))
        .unwrap_or(&upper);

    let (digits, shift) = match trimmed.chars().last()? {
        'K' => (&trimmed[..trimmed.len() - 1], 10),
        'M' => (&trimmed[..trimmed.len() - 1], 20),
        'G' => (&trimmed[..trimmed.len() - 1], 30),
        _ => (trimmed, 0),
    };

    let n: usize = digits.trim().parse().ok()?;
    n.checked_mul(1usize << shift)
}

/// Get environment variable as string, or return default
#[inline]
pub fn env_get_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Check if environment variable is set (regardless of value)
#[inline]
pub fn env_is_set(key: &str) -> bool {
    std::env::var(key).is_ok()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_get_default() {
        let val: u32 = env_get("__TS_TEST_UNSET_VAR__", 42);
        assert_eq!(val, 42);
        assert!(!env_is_set("__TS_TEST_UNSET_VAR__"));
        assert_eq!(env_get_str("__TS_TEST_UNSET_VAR__", "thread-stream"), "thread-stream");
    }

    #[test]
    fn test_env_get_with_set_var() {
        std::env::set_var("__TS_TEST_RETRIES__", " 7 ");
        let val: u32 = env_get("__TS_TEST_RETRIES__", 10);
        assert_eq!(val, 7);
        std::env::remove_var("__TS_TEST_RETRIES__");
    }

    #[test]
    fn test_env_get_invalid_parse() {
        std::env::set_var("__TS_TEST_INVALID__", "ten");
        let val: u64 = env_get("__TS_TEST_INVALID__", 1000);
        assert_eq!(val, 1000);
        std::env::remove_var("__TS_TEST_INVALID__");
    }

    #[test]
    fn test_parse_bool() {
        for yes in ["1", "true", "TRUE", "yes", "on"] {
            assert!(parse_bool(yes), "{}", yes);
        }
        for no in ["0", "false", "off", "garbage", ""] {
            assert!(!parse_bool(no), "{}", no);
        }
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("65536"), Some(65536));
        assert_eq!(parse_size("128K"), Some(128 * 1024));
        assert_eq!(parse_size("4m"), Some(4 * 1024 * 1024));
        assert_eq!(parse_size("1GiB"), Some(1 << 30));
        assert_eq!(parse_size("512kb"), Some(512 * 1024));
        assert_eq!(parse_size("lots"), None);
        assert_eq!(parse_size(""), None);
    }

    #[test]
    fn test_env_get_size() {
        std::env::set_var("__TS_TEST_SIZE__", "2M");
        assert_eq!(env_get_size("__TS_TEST_SIZE__", 10), 2 * 1024 * 1024);
        std::env::set_var("__TS_TEST_SIZE__", "bogus");
        assert_eq!(env_get_size("__TS_TEST_SIZE__", 10), 10);
        std::env::remove_var("__TS_TEST_SIZE__");
    }
}
