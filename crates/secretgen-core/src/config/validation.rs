//! Upfront configuration checks

use crate::error::{Error, Result};
use crate::layout::validate_secret_name;
use crate::types::Config;
use tracing::warn;

impl Config {
    /// Validate references between hosts, secrets and mounts.
    ///
    /// Secret names must map onto the secrets directory and every mount must
    /// point at a host with public keys. Mounts of unknown secrets are ignored
    /// with a warning.
    pub fn validate(&self) -> Result<()> {
        for name in self.secrets.keys() {
            validate_secret_name(name)?;
        }

        for (mount_name, mount) in &self.secret_mounts {
            if !self.public_keys.contains_key(&mount.host) {
                return Err(Error::unknown_mount_host(
                    mount_name,
                    &mount.secret,
                    &mount.host,
                ));
            }

            if !self.secrets.contains_key(&mount.secret) {
                warn!(
                    mount = %mount_name,
                    secret = %mount.secret,
                    "Ignoring mount of unknown secret"
                );
            }
        }

        Ok(())
    }
}
