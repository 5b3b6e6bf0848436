//! On-disk layout of encrypted secrets and entropy records
//!
//! ```text
//! <root>/data/<secret-name>.age      secret ciphertext, generator + mounted hosts
//! <root>/entropy/<secret-name>.age   recorded entropy, generator only
//! ```
//!
//! Secret names may contain `/` to form a hierarchy. Parent directories are
//! created on demand by the writer.

use crate::error::{Error, Result};
use camino::Utf8PathBuf;

/// Default secrets directory, relative to the working directory
pub const DEFAULT_SECRETS_DIR: &str = "secrets";

/// Subdirectory holding secret ciphertext
pub const DATA_DIR: &str = "data";

/// Subdirectory holding entropy records
pub const ENTROPY_DIR: &str = "entropy";

/// Extension of every encrypted file
pub const FILE_EXTENSION: &str = "age";

/// Maps secret names onto paths below a secrets directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretsLayout {
    root: Utf8PathBuf,
}

impl SecretsLayout {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of the ciphertext for `secret_name`
    pub fn data_path(&self, secret_name: &str) -> Utf8PathBuf {
        self.root
            .join(DATA_DIR)
            .join(format!("{secret_name}.{FILE_EXTENSION}"))
    }

    /// Path of the entropy record for `secret_name`
    pub fn entropy_path(&self, secret_name: &str) -> Utf8PathBuf {
        self.root
            .join(ENTROPY_DIR)
            .join(format!("{secret_name}.{FILE_EXTENSION}"))
    }
}

impl Default for SecretsLayout {
    fn default() -> Self {
        Self::new(DEFAULT_SECRETS_DIR)
    }
}

/// Check that a secret name stays inside the secrets directory
pub fn validate_secret_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_secret_name(name, "name is empty"));
    }
    if name.contains('\\') || name.contains('\0') {
        return Err(Error::invalid_secret_name(
            name,
            "name contains a backslash or NUL byte",
        ));
    }
    if name.starts_with('/') {
        return Err(Error::invalid_secret_name(name, "name is an absolute path"));
    }

    for component in name.split('/') {
        match component {
            "" => {
                return Err(Error::invalid_secret_name(
                    name,
                    "name contains an empty path component",
                ))
            }
            "." | ".." => {
                return Err(Error::invalid_secret_name(
                    name,
                    "name contains a relative path component",
                ))
            }
            _ => {}
        }
    }

    Ok(())
}
