//! Error types for annoscan

use thiserror::Error;

use crate::provider::ProviderError;

/// Result type alias using annoscan's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal errors surfaced to the caller of a scan.
///
/// Malformed annotation lines are logged and dropped. Decode failures
/// belong to a single
/// [`decode`](crate::annotation::Annotation::decode) call.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Failed to resolve package {package}: {source}")]
    Resolution {
        package: String,
        #[source]
        source: ProviderError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

impl Error {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub(crate) fn resolution(package: impl Into<String>, source: ProviderError) -> Self {
        Self::Resolution {
            package: package.into(),
            source,
        }
    }
}
