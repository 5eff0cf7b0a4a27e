use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse session file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid session: {0}")]
    Invalid(String),
}
