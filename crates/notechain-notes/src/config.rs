use serde::{Deserialize, Serialize};

/// Environment variable overriding [`NotesConfig::max_updates`].
pub const ENV_MAX_UPDATES: &str = "NOTECHAIN_MAX_UPDATES";
/// Environment variable overriding [`NotesConfig::ref_cache_enabled`].
pub const ENV_REF_CACHE: &str = "NOTECHAIN_REF_CACHE";
/// Environment variable overriding [`NotesConfig::state_cache_capacity`].
pub const ENV_STATE_CACHE_CAPACITY: &str = "NOTECHAIN_STATE_CACHE_CAPACITY";
/// Environment variable overriding [`NotesConfig::note_cache_capacity`].
pub const ENV_NOTE_CACHE_CAPACITY: &str = "NOTECHAIN_NOTE_CACHE_CAPACITY";
/// Environment variable overriding [`NotesConfig::max_retries`].
pub const ENV_MAX_RETRIES: &str = "NOTECHAIN_MAX_RETRIES";

/// Errors from loading or validating configuration.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid TOML: {0}")]
    Toml(String),

    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Configuration for loading and writing change notes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotesConfig {
    /// Ceiling on the number of commits in one change's chain. Once reached,
    /// only abandon and submit are accepted.
    pub max_updates: usize,
    /// Whether ref lookups are memoized for the lifetime of a unit of work.
    /// When disabled every lookup goes to the store.
    pub ref_cache_enabled: bool,
    /// Maximum number of materialized states kept in memory.
    pub state_cache_capacity: usize,
    /// Maximum number of decoded revision notes kept in memory.
    pub note_cache_capacity: usize,
    /// Number of times a write is retried after losing a ref-update race.
    pub max_retries: usize,
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self {
            max_updates: 1000,
            ref_cache_enabled: true,
            state_cache_capacity: 1024,
            note_cache_capacity: 4096,
            max_retries: 3,
        }
    }
}

impl NotesConfig {
    /// Parse a TOML document. Missing keys take their default values.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s).map_err(|e| ConfigError::Toml(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read overrides from the process environment.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup function, keyed by the
    /// `NOTECHAIN_*` variable names.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_MAX_UPDATES) {
            self.max_updates = parse_usize(ENV_MAX_UPDATES, &v)?;
        }
        if let Some(v) = lookup(ENV_REF_CACHE) {
            self.ref_cache_enabled = parse_bool(ENV_REF_CACHE, &v)?;
        }
        if let Some(v) = lookup(ENV_STATE_CACHE_CAPACITY) {
            self.state_cache_capacity = parse_usize(ENV_STATE_CACHE_CAPACITY, &v)?;
        }
        if let Some(v) = lookup(ENV_NOTE_CACHE_CAPACITY) {
            self.note_cache_capacity = parse_usize(ENV_NOTE_CACHE_CAPACITY, &v)?;
        }
        if let Some(v) = lookup(ENV_MAX_RETRIES) {
            self.max_retries = parse_usize(ENV_MAX_RETRIES, &v)?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_updates == 0 {
            return Err(ConfigError::Zero("max_updates"));
        }
        if self.state_cache_capacity == 0 {
            return Err(ConfigError::Zero("state_cache_capacity"));
        }
        if self.note_cache_capacity == 0 {
            return Err(ConfigError::Zero("note_cache_capacity"));
        }
        Ok(())
    }
}

fn parse_usize(key: &'static str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config() {
        let c = NotesConfig::default();
        assert_eq!(c.max_updates, 1000);
        assert!(c.ref_cache_enabled);
        assert_eq!(c.state_cache_capacity, 1024);
        assert_eq!(c.note_cache_capacity, 4096);
        assert_eq!(c.max_retries, 3);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn toml_with_partial_keys() {
        let c = NotesConfig::from_toml_str("max_updates = 3\nref_cache_enabled = false\n").unwrap();
        assert_eq!(c.max_updates, 3);
        assert!(!c.ref_cache_enabled);
        assert_eq!(c.max_retries, 3);
    }

    #[test]
    fn toml_rejects_zero_ceiling() {
        assert_eq!(
            NotesConfig::from_toml_str("max_updates = 0"),
            Err(ConfigError::Zero("max_updates"))
        );
    }

    #[test]
    fn toml_rejects_bad_types() {
        assert!(matches!(
            NotesConfig::from_toml_str("max_updates = \"lots\""),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn env_overrides_apply() {
        let c = NotesConfig::default()
            .apply_overrides(env(&[
                (ENV_MAX_UPDATES, "50"),
                (ENV_REF_CACHE, "off"),
                (ENV_MAX_RETRIES, "0"),
            ]))
            .unwrap();
        assert_eq!(c.max_updates, 50);
        assert!(!c.ref_cache_enabled);
        assert_eq!(c.max_retries, 0);
        assert_eq!(c.state_cache_capacity, 1024);
    }

    #[test]
    fn env_rejects_garbage() {
        let err = NotesConfig::default()
            .apply_overrides(env(&[(ENV_REF_CACHE, "maybe")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: ENV_REF_CACHE,
                value: "maybe".into()
            }
        );
    }
}
