use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{
    COMPILE_TIMEOUT_ENV, DEFAULT_EDITION, DEFAULT_RUSTC, EDITION_ENV, RUSTC_ENV, WORK_DIR_ENV,
};

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub rustc_path: PathBuf,
    /// Where materialized sources and in-memory libraries are written.
    /// Nothing in it is ever cleaned up.
    pub work_dir: PathBuf,
    pub edition: String,
    pub compile_timeout: Option<Duration>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?}")]
    InvalidValue { var: String, value: String },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rustc_path: DEFAULT_RUSTC.into(),
            work_dir: std::env::temp_dir().join("dyncode"),
            edition: DEFAULT_EDITION.to_string(),
            compile_timeout: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(rustc) = lookup(RUSTC_ENV) {
            config.rustc_path = rustc.into();
        }
        if let Some(work_dir) = lookup(WORK_DIR_ENV) {
            config.work_dir = work_dir.into();
        }
        if let Some(edition) = lookup(EDITION_ENV) {
            config.edition = edition;
        }
        if let Some(timeout) = lookup(COMPILE_TIMEOUT_ENV) {
            let ms = timeout
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidValue {
                    var: COMPILE_TIMEOUT_ENV.to_string(),
                    value: timeout.clone(),
                })?;
            config.compile_timeout = Some(Duration::from_millis(ms));
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| vars.get(var).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.rustc_path, PathBuf::from("rustc"));
        assert_eq!(config.compile_timeout, None);
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            (RUSTC_ENV, "/opt/rust/bin/rustc"),
            (WORK_DIR_ENV, "/var/tmp/dyncode"),
            (EDITION_ENV, "2024"),
            (COMPILE_TIMEOUT_ENV, "1500"),
        ]))
        .unwrap();

        assert_eq!(config.rustc_path, PathBuf::from("/opt/rust/bin/rustc"));
        assert_eq!(config.work_dir, PathBuf::from("/var/tmp/dyncode"));
        assert_eq!(config.edition, "2024");
        assert_eq!(config.compile_timeout, Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_invalid_timeout() {
        let result = Config::from_lookup(lookup_from(&[(COMPILE_TIMEOUT_ENV, "soon")]));

        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }
}
