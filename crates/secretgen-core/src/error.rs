//! Error types for secretgen-core

use thiserror::Error;

/// Result type alias using secretgen-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Configuration errors. All of them are fatal and abort a run before any
/// secret is generated.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Secret name that cannot be mapped onto the secrets directory
    #[error("Invalid secret name '{name}': {reason}")]
    InvalidSecretName { name: String, reason: String },

    /// More than one generation strategy on a single secret
    #[error("Secret '{secret}' selects more than one generation strategy: {strategies}")]
    ConflictingGeneration { secret: String, strategies: String },

    /// A mount references a host that has no public keys
    #[error("Unknown host in secret mount: mount={mount} secret={secret} host={host}")]
    UnknownMountHost {
        mount: String,
        secret: String,
        host: String,
    },
}

impl Error {
    /// Create a config not found error
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    /// Create an invalid secret name error
    pub fn invalid_secret_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSecretName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create an unknown mount host error
    pub fn unknown_mount_host(
        mount: impl Into<String>,
        secret: impl Into<String>,
        host: impl Into<String>,
    ) -> Self {
        Self::UnknownMountHost {
            mount: mount.into(),
            secret: secret.into(),
            host: host.into(),
        }
    }
}
