//! Generator identity and host recipient parsing

use crate::error::KeyError;
use camino::Utf8Path;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A recipient that files can be encrypted to
pub type Recipient = Arc<dyn age::Recipient + Send + Sync>;

/// The generator's own age identities and the recipients derived from them
pub struct GeneratorKeys {
    identities: Vec<age::x25519::Identity>,
    recipients: Vec<Recipient>,
}

impl GeneratorKeys {
    /// Read identities from an age identity file
    pub fn from_identity_file(path: &Utf8Path) -> Result<Self, KeyError> {
        let content = std::fs::read_to_string(path).map_err(|source| KeyError::ReadIdentity {
            path: path.to_string(),
            source,
        })?;

        let keys = Self::parse(&content, path.as_str())?;
        debug!(
            "Loaded {} generator identities from {}",
            keys.identities.len(),
            path
        );
        Ok(keys)
    }

    /// Parse identity file content. Blank lines and `#` comments are skipped.
    pub fn parse(content: &str, origin: &str) -> Result<Self, KeyError> {
        let identities = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .enumerate()
            .map(|(index, line)| {
                line.parse::<age::x25519::Identity>()
                    .map_err(|reason| KeyError::InvalidIdentity {
                        path: origin.to_string(),
                        index,
                        reason: reason.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if identities.is_empty() {
            return Err(KeyError::NoIdentities {
                path: origin.to_string(),
            });
        }

        Ok(Self::new(identities))
    }

    pub fn new(identities: Vec<age::x25519::Identity>) -> Self {
        let recipients = identities
            .iter()
            .map(|identity| Arc::new(identity.to_public()) as Recipient)
            .collect();

        Self {
            identities,
            recipients,
        }
    }

    pub fn identities(&self) -> &[age::x25519::Identity] {
        &self.identities
    }

    /// Public counterparts of the identities, in identity file order
    pub fn recipients(&self) -> &[Recipient] {
        &self.recipients
    }
}

impl fmt::Debug for GeneratorKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorKeys")
            .field("identities", &format_args!("[{} redacted]", self.identities.len()))
            .finish()
    }
}

/// Parsed public keys of every configured host
#[derive(Default)]
pub struct RecipientTable {
    hosts: BTreeMap<String, Vec<Recipient>>,
}

impl RecipientTable {
    pub fn parse(public_keys: &BTreeMap<String, Vec<String>>) -> Result<Self, KeyError> {
        let mut hosts = BTreeMap::new();

        for (host, keys) in public_keys {
            let recipients = keys
                .iter()
                .map(|key| {
                    parse_public_key(key).map_err(|reason| KeyError::InvalidPublicKey {
                        host: host.clone(),
                        reason,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            hosts.insert(host.clone(), recipients);
        }

        Ok(Self { hosts })
    }

    pub fn get(&self, host: &str) -> Option<&[Recipient]> {
        self.hosts.get(host).map(Vec::as_slice)
    }
}

/// Parse an age X25519 recipient (`age1...`) or an SSH public key
pub fn parse_public_key(key: &str) -> Result<Recipient, String> {
    let key = key.trim();

    if key.starts_with("age1") {
        key.parse::<age::x25519::Recipient>()
            .map(|r| Arc::new(r) as Recipient)
            .map_err(|e| e.to_string())
    } else {
        key.parse::<age::ssh::Recipient>()
            .map(|r| Arc::new(r) as Recipient)
            .map_err(|e| format!("not an age or SSH public key ({e:?})"))
    }
}
