//! Error types shared by the boomerang crates that aren't specific to
//! storage or dispatch.

use std::io;

use thiserror::Error;

/// Errors that can occur while loading or parsing the application config.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No config file was found at any of the searched locations.
    #[error("no configuration file found; tried: {0}")]
    NotFound(String),

    /// The config file could not be read.
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    /// The config file contents are not valid TOML, or fail a field constraint.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ConfigError {
    /// Returns `true` if the error indicates the config is simply absent,
    /// as opposed to present-but-broken.
    #[must_use]
    pub const fn is_missing(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
