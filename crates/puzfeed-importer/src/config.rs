//! Importer configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the importer can start with zero
//! configuration for local development.

use std::path::PathBuf;
use std::time::Duration;

/// Importer configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImporterConfig {
    /// Root of all application data (database, puzzle tree).
    /// Env: `DATA_PATH`
    /// Default: `./data`
    pub data_path: PathBuf,

    /// Root of the per-source puzzle folders, always `{data_path}/puzzles`.
    pub puzzles_path: PathBuf,

    /// SQLite database file.
    /// Env: `PUZFEED_DB_PATH`
    /// Default: `{data_path}/puzfeed.db`
    pub database_path: PathBuf,

    /// Delay between passes when running as a worker.
    /// Env: `IMPORTER_SCAN_INTERVAL` (seconds)
    /// Default: 15 seconds
    pub scan_interval: Duration,

    /// Highest `-N` suffix tried before giving up on a filename.
    /// Env: `IMPORTER_MAX_SUFFIX`
    /// Default: `1000`
    pub max_collision_suffix: u32,
}

impl Default for ImporterConfig {
    fn default() -> Self {
        Self::for_data_path(PathBuf::from("./data"))
    }
}

impl ImporterConfig {
    /// Defaults rooted at an explicit data path.
    pub fn for_data_path(data_path: PathBuf) -> Self {
        Self {
            puzzles_path: data_path.join("puzzles"),
            database_path: data_path.join("puzfeed.db"),
            data_path,
            scan_interval: Duration::from_secs(15),
            max_collision_suffix: 1000,
        }
    }

    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = match lookup("DATA_PATH") {
            Some(path) if !path.is_empty() => Self::for_data_path(PathBuf::from(path)),
            _ => Self::default(),
        };

        if let Some(path) = lookup("PUZFEED_DB_PATH") {
            if !path.is_empty() {
                config.database_path = PathBuf::from(path);
            }
        }

        if let Some(val) = lookup("IMPORTER_SCAN_INTERVAL") {
            match val.parse::<u64>() {
                Ok(secs) if secs > 0 => config.scan_interval = Duration::from_secs(secs),
                _ => tracing::warn!(value = %val, "Invalid IMPORTER_SCAN_INTERVAL, using default"),
            }
        }

        if let Some(val) = lookup("IMPORTER_MAX_SUFFIX") {
            match val.parse::<u32>() {
                Ok(n) if n > 0 => config.max_collision_suffix = n,
                _ => tracing::warn!(value = %val, "Invalid IMPORTER_MAX_SUFFIX, using default"),
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_map(vars: &[(&str, &str)]) -> ImporterConfig {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ImporterConfig::from_vars(|key| map.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = ImporterConfig::default();
        assert_eq!(config.puzzles_path, PathBuf::from("./data/puzzles"));
        assert_eq!(config.database_path, PathBuf::from("./data/puzfeed.db"));
        assert_eq!(config.scan_interval, Duration::from_secs(15));
    }

    #[test]
    fn test_data_path_moves_derived_paths() {
        let config = from_map(&[("DATA_PATH", "/srv/puzfeed")]);
        assert_eq!(config.puzzles_path, PathBuf::from("/srv/puzfeed/puzzles"));
        assert_eq!(config.database_path, PathBuf::from("/srv/puzfeed/puzfeed.db"));
    }

    #[test]
    fn test_explicit_database_path_wins() {
        let config = from_map(&[("DATA_PATH", "/srv"), ("PUZFEED_DB_PATH", "/var/db/p.db")]);
        assert_eq!(config.database_path, PathBuf::from("/var/db/p.db"));
    }

    #[test]
    fn test_invalid_numbers_fall_back() {
        let config = from_map(&[("IMPORTER_SCAN_INTERVAL", "soon"), ("IMPORTER_MAX_SUFFIX", "0")]);
        assert_eq!(config.scan_interval, Duration::from_secs(15));
        assert_eq!(config.max_collision_suffix, 1000);

        let config = from_map(&[("IMPORTER_SCAN_INTERVAL", "60"), ("IMPORTER_MAX_SUFFIX", "5")]);
        assert_eq!(config.scan_interval, Duration::from_secs(60));
        assert_eq!(config.max_collision_suffix, 5);
    }
}
