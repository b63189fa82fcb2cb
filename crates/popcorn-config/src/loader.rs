//! Layered settings loading: defaults, then the YAML file, then environment overrides.

use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};
use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};
use crate::model::Settings;
use crate::validate::validate;

/// Environment variable naming the settings file.
pub const CONFIG_PATH_ENV: &str = "POPCORN_CONFIG";

/// Prefix of environment overrides, e.g. `POPCORN_LOADER__MAX_PREPARE_RETRIES=5`.
pub const ENV_PREFIX: &str = "POPCORN_";

const SECTION_SEPARATOR: &str = "__";

/// Builds [`Settings`] from layered sources.
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    path: Option<PathBuf>,
    env: Vec<(String, String)>,
}

impl ConfigLoader {
    /// Loader reading the file named by `POPCORN_CONFIG` and the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        let env: Vec<(String, String)> = std::env::vars().collect();
        let path = env
            .iter()
            .find(|(key, _)| key == CONFIG_PATH_ENV)
            .map(|(_, value)| PathBuf::from(value));
        Self { path, env }
    }

    /// Read settings from the given file instead.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Replace the environment the overrides are taken from.
    #[must_use]
    pub fn with_env<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env = vars
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        self
    }

    /// Load, merge and validate the settings.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or decoded, when an override names an
    /// unknown field, or when validation rejects the result.
    pub fn load(&self) -> ConfigResult<Settings> {
        let mut document = serde_yaml::to_value(Settings::default()).map_err(|source| {
            ConfigError::Malformed {
                path: None,
                source,
            }
        })?;

        if let Some(path) = &self.path {
            let file = read_document(path)?;
            merge(&mut document, file);
            info!(path = %path.display(), "loaded settings file");
        }

        self.apply_env_overrides(&mut document)?;

        let settings: Settings =
            serde_yaml::from_value(document).map_err(|source| ConfigError::Malformed {
                path: self.path.clone(),
                source,
            })?;
        validate(&settings)?;
        Ok(settings)
    }

    fn apply_env_overrides(&self, document: &mut Value) -> ConfigResult<()> {
        for (key, raw) in &self.env {
            let Some(path) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let segments: Vec<String> = path
                .split(SECTION_SEPARATOR)
                .map(str::to_ascii_lowercase)
                .collect();
            // POPCORN_CONFIG and friends carry no section
            if segments.len() < 2 {
                continue;
            }

            let slot = lookup_mut(document, &segments)
                .ok_or_else(|| ConfigError::UnknownField { key: key.clone() })?;
            *slot = convert_env_value(raw);
            debug!(key = %key, "applied environment override");
        }
        Ok(())
    }
}

fn read_document(path: &Path) -> ConfigResult<Value> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        operation: "config.read",
        path: path.to_path_buf(),
        source,
    })?;
    if raw.trim().is_empty() {
        return Ok(Value::Mapping(Mapping::new()));
    }
    serde_yaml::from_str(&raw).map_err(|source| ConfigError::Malformed {
        path: Some(path.to_path_buf()),
        source,
    })
}

fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base), Value::Mapping(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn lookup_mut<'a>(document: &'a mut Value, segments: &[String]) -> Option<&'a mut Value> {
    segments.iter().try_fold(document, |current, segment| {
        current
            .as_mapping_mut()?
            .get_mut(Value::String(segment.clone()))
    })
}

fn convert_env_value(raw: &str) -> Value {
    serde_yaml::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
