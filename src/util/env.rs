//! Environment helpers: centralized dotenv loading and ergonomic getters.
//! Call `init_env()` once early in each binary (or rely on lazy Once).
use std::str::FromStr;
use std::sync::Once;
use tracing::info;

static INIT: Once = Once::new();

/// Keys echoed by `bootstrap_cli` so a run log records the effective setup.
const LOGGED_KEYS: &[&str] = &[
    "TOYS_API_URL",
    "TOYS_PAGE_SIZE",
    "TOYS_PAGE_DELAY_MS",
    "TOYS_IMAGE_DIR",
    "TOYS_DB_PATH",
];

/// Load .env exactly once. Safe to call many times.
pub fn init_env() {
    INIT.call_once(|| {
        let _ = dotenv::dotenv();
    });
}

/// Common bootstrap for CLI binaries: load the environment and log the
/// catalog-related settings that are explicitly set.
pub fn bootstrap_cli(bin_name: &str) {
    init_env();
    let snapshot: Vec<(&str, String)> = LOGGED_KEYS
        .iter()
        .filter_map(|&k| env_opt(k).map(|v| (k, v)))
        .collect();
    info!(
        target = "bootstrap",
        bin = bin_name,
        overrides = ?snapshot,
        "environment loaded"
    );
}

/// Get optional env var (None if unset or empty).
pub fn env_opt(key: &str) -> Option<String> {
    init_env();
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Get parsed value with default fallback.
pub fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    init_env();
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}

/// SQLite database file (TOYS_DB_PATH, default `toys.db`).
pub fn db_path() -> String {
    env_opt("TOYS_DB_PATH").unwrap_or_else(|| "toys.db".to_string())
}

/// Directory that holds downloaded toy images (TOYS_IMAGE_DIR, default `toy_images`).
pub fn image_dir() -> String {
    env_opt("TOYS_IMAGE_DIR").unwrap_or_else(|| "toy_images".to_string())
}

/// Prefix for product links shown next to search results.
pub fn link_base() -> String {
    env_opt("TOYS_LINK_BASE")
        .map(|v| v.trim_end_matches('/').to_string())
        .unwrap_or_else(|| "https://www.theelefant.ai/toy".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_falls_back_on_garbage() {
        std::env::set_var("TOYS_TEST_PARSE_GARBAGE", "twelve");
        assert_eq!(env_parse("TOYS_TEST_PARSE_GARBAGE", 12u32), 12);
        std::env::set_var("TOYS_TEST_PARSE_GARBAGE", " 24 ");
        assert_eq!(env_parse("TOYS_TEST_PARSE_GARBAGE", 12u32), 24);
    }

    #[test]
    fn blank_values_are_unset() {
        std::env::set_var("TOYS_TEST_BLANK", "   ");
        assert!(env_opt("TOYS_TEST_BLANK").is_none());
    }
}
