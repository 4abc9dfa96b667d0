//! Loads `~/.lintel/config.toml` into validated settings.
//!
//! Every section is optional. Validation runs while deserializing, so a file
//! that parses is a file whose settings are usable.

use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use lintel_types::{LintSettings, LinterSettings, LookupSettings, ResolverSettings};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LogConfig {
    /// `tracing` filter directive, e.g. "lintel_linter=debug". `RUST_LOG`
    /// takes precedence.
    pub filter: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LintelConfig {
    pub linter: Option<LinterSettings>,
    pub lookup: Option<LookupSettings>,
    pub resolver: Option<ResolverSettings>,
    pub log: Option<LogConfig>,
}

impl LintelConfig {
    /// Load the user config. `Ok(None)` when there is no file.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(None),
        }
    }

    /// Load from an explicit path. `Ok(None)` when the file does not exist.
    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        match toml::from_str(&expand_env_vars(&content)) {
            Ok(config) => Ok(Some(config)),
            Err(err) => {
                tracing::warn!("Failed to parse config at {}: {err}", path.display());
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    #[must_use]
    pub fn log_filter(&self) -> Option<&str> {
        self.log.as_ref().and_then(|log| log.filter.as_deref())
    }

    /// Settings for a lint session, defaults filling any missing section.
    #[must_use]
    pub fn into_settings(self) -> LintSettings {
        LintSettings {
            linter: self.linter.unwrap_or_default(),
            lookup: self.lookup.unwrap_or_default(),
            resolver: self.resolver.unwrap_or_default(),
        }
    }
}

fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".lintel").join("config.toml"))
}

/// Replace `${VAR}` with the variable's value (empty when unset).
///
/// An unclosed `${` is kept verbatim.
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let var = &after[..end];
        if !var.is_empty() {
            out.push_str(&env::var(var).unwrap_or_default());
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}
