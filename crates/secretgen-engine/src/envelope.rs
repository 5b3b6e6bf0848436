//! age encryption of secret and entropy files
//!
//! Files are written through a streaming encryptor so generator output never
//! lands on disk in plaintext.

use crate::error::EnvelopeError;
use crate::keys::Recipient;
use camino::Utf8Path;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use zeroize::Zeroizing;

/// Encrypting writer bound to a file path
pub struct EnvelopeWriter {
    inner: age::stream::StreamWriter<File>,
}

impl EnvelopeWriter {
    /// Create (or truncate) `path` and encrypt everything written to it for
    /// `recipients`. Missing parent directories are created.
    pub fn create(path: &Utf8Path, recipients: &[Recipient]) -> Result<Self, EnvelopeError> {
        let encryptor = age::Encryptor::with_recipients(
            recipients.iter().map(|r| &**r as &dyn age::Recipient),
        )
        .map_err(|e| EnvelopeError::Encrypt(e.to_string()))?;

        if let Some(parent) = path.parent() {
            create_private_dir(parent)?;
        }

        let file = open_private_file(path)?;
        let inner = encryptor.wrap_output(file)?;

        Ok(Self { inner })
    }

    /// Write the final chunk and flush the file to disk
    pub fn finish(self) -> Result<(), EnvelopeError> {
        let file = self.inner.finish()?;
        file.sync_all()?;
        Ok(())
    }
}

impl Write for EnvelopeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Decrypt an age file with any of `identities`
pub fn decrypt(
    ciphertext: &[u8],
    identities: &[age::x25519::Identity],
) -> Result<Zeroizing<Vec<u8>>, EnvelopeError> {
    let decryptor = age::Decryptor::new(ciphertext).map_err(map_decrypt_error)?;
    let mut reader = decryptor
        .decrypt(identities.iter().map(|i| i as &dyn age::Identity))
        .map_err(map_decrypt_error)?;

    let mut plaintext = Zeroizing::new(Vec::new());
    reader
        .read_to_end(&mut plaintext)
        .map_err(|e| EnvelopeError::Decrypt(e.to_string()))?;
    Ok(plaintext)
}

fn map_decrypt_error(err: age::DecryptError) -> EnvelopeError {
    match err {
        age::DecryptError::NoMatchingKeys => EnvelopeError::NoMatchingIdentity,
        other => EnvelopeError::Decrypt(other.to_string()),
    }
}

#[cfg(unix)]
fn create_private_dir(path: &Utf8Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new()
        .recursive(true)
        .mode(0o770)
        .create(path)
}

#[cfg(not(unix))]
fn create_private_dir(path: &Utf8Path) -> io::Result<()> {
    fs::create_dir_all(path)
}

#[cfg(unix)]
fn open_private_file(path: &Utf8Path) -> io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o660)
        .open(path)
}

#[cfg(not(unix))]
fn open_private_file(path: &Utf8Path) -> io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}
