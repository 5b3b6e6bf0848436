//! In-memory cache of secret plaintext
//!
//! Populated as secrets are generated or first read. Cache misses fall back to
//! decrypting the secret's ciphertext with the generator identities.

use crate::envelope;
use crate::error::StoreError;
use crate::keys::GeneratorKeys;
use secretgen_core::SecretsLayout;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;
use zeroize::Zeroizing;

/// Shared handle to a secret's plaintext
pub type SecretBytes = Arc<Zeroizing<Vec<u8>>>;

pub struct SecretStore {
    layout: SecretsLayout,
    keys: Arc<GeneratorKeys>,
    entries: Mutex<HashMap<String, SecretBytes>>,
}

impl SecretStore {
    pub fn new(layout: SecretsLayout, keys: Arc<GeneratorKeys>) -> Self {
        Self {
            layout,
            keys,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Plaintext of `name`, from cache or disk
    pub async fn load_secret(&self, name: &str) -> Result<SecretBytes, StoreError> {
        if let Some(cached) = self.entries.lock().await.get(name) {
            return Ok(Arc::clone(cached));
        }

        let path = self.layout.data_path(name);
        let ciphertext = tokio::fs::read(&path).await.map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound {
                    name: name.to_string(),
                    path: path.to_string(),
                }
            } else {
                StoreError::Io {
                    path: path.to_string(),
                    source,
                }
            }
        })?;

        let plaintext = envelope::decrypt(&ciphertext, self.keys.identities()).map_err(|source| {
            StoreError::DecryptFailed {
                name: name.to_string(),
                source,
            }
        })?;
        debug!(secret = %name, "Loaded secret from {}", path);

        let mut entries = self.entries.lock().await;
        let entry = entries
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(plaintext));
        Ok(Arc::clone(entry))
    }

    /// Record freshly generated plaintext, replacing any cached value
    pub async fn store_secret(&self, name: &str, plaintext: Zeroizing<Vec<u8>>) {
        self.entries
            .lock()
            .await
            .insert(name.to_string(), Arc::new(plaintext));
    }

    #[cfg(test)]
    pub async fn contains(&self, name: &str) -> bool {
        self.entries.lock().await.contains_key(name)
    }
}
