//! Temporary secrets directories with real age identities

#![allow(dead_code)]

use age::secrecy::ExposeSecret;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use secretgen_core::{Config, SecretsLayout};
use secretgen_engine::{envelope, GeneratorKeys, RunError, RunSummary};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Default hosts created by `Testbed::new`
pub const TEST_HOSTS: &[&str] = &["alpha", "bravo", "charlie", "delta"];

pub struct Testbed {
    /// Keeps the directory alive for the duration of the test
    temp_dir: TempDir,
    root: Utf8PathBuf,
    identity_path: Utf8PathBuf,
    generator: age::x25519::Identity,
    hosts: BTreeMap<String, age::x25519::Identity>,
}

impl Testbed {
    pub fn new() -> Result<Self> {
        Self::with_hosts(TEST_HOSTS)
    }

    pub fn with_hosts(hosts: &[&str]) -> Result<Self> {
        let temp_dir = TempDir::new().context("Failed to create temp directory")?;
        let root = Utf8PathBuf::from_path_buf(temp_dir.path().to_path_buf())
            .map_err(|p| anyhow::anyhow!("non UTF-8 temp path {}", p.display()))?;

        let generator = age::x25519::Identity::generate();
        let identity_path = root.join("identity.txt");
        std::fs::write(
            &identity_path,
            format!(
                "# public key: {}\n{}\n",
                generator.to_public(),
                generator.to_string().expose_secret()
            ),
        )
        .context("Failed to write identity file")?;

        let hosts = hosts
            .iter()
            .map(|name| (name.to_string(), age::x25519::Identity::generate()))
            .collect();

        Ok(Self {
            temp_dir,
            root,
            identity_path,
            generator,
            hosts,
        })
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn identity_path(&self) -> &Utf8Path {
        &self.identity_path
    }

    pub fn layout(&self) -> SecretsLayout {
        SecretsLayout::new(self.root.join("secrets"))
    }

    pub fn host_names(&self) -> Vec<String> {
        self.hosts.keys().cloned().collect()
    }

    /// `publicKeys` section listing every host
    pub fn public_keys(&self) -> Value {
        let keys: Map<String, Value> = self
            .hosts
            .iter()
            .map(|(name, identity)| (name.clone(), json!([identity.to_public().to_string()])))
            .collect();
        Value::Object(keys)
    }

    /// Full config from a `secrets` section and a `secretMounts` section
    pub fn config(&self, secrets: Value, mounts: Value) -> Result<Config> {
        let config = json!({
            "publicKeys": self.public_keys(),
            "secrets": secrets,
            "secretMounts": mounts,
        });
        Ok(serde_json::from_value(config)?)
    }

    /// Config that mounts every secret on `hosts_per_secret` hosts, rotating
    /// through the host list
    pub fn config_with_mounts(&self, secrets: Value, hosts_per_secret: usize) -> Result<Config> {
        let hosts = self.host_names();
        let mut mounts = Map::new();

        if let Value::Object(secret_map) = &secrets {
            for (index, name) in secret_map.keys().enumerate() {
                for offset in 0..hosts_per_secret.min(hosts.len()) {
                    let host = &hosts[(index + offset) % hosts.len()];
                    mounts.insert(
                        format!("{name}@{host}"),
                        json!({ "host": host, "secret": name }),
                    );
                }
            }
        }

        self.config(secrets, Value::Object(mounts))
    }

    pub async fn run(&self, config: &Config) -> Result<RunSummary, RunError> {
        self.run_with_cancel(config, &CancellationToken::new()).await
    }

    pub async fn run_with_cancel(
        &self,
        config: &Config,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, RunError> {
        secretgen_engine::run(config.clone(), &self.identity_path, self.layout(), cancel).await
    }

    pub fn data_path(&self, name: &str) -> Utf8PathBuf {
        self.layout().data_path(name)
    }

    pub fn entropy_path(&self, name: &str) -> Utf8PathBuf {
        self.layout().entropy_path(name)
    }

    /// Raw ciphertext of a secret
    pub fn ciphertext(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.data_path(name);
        std::fs::read(&path).with_context(|| format!("Failed to read {path}"))
    }

    /// Secret plaintext, decrypted with the generator identity
    pub fn read_secret(&self, name: &str) -> Result<Vec<u8>> {
        let plaintext = envelope::decrypt(&self.ciphertext(name)?, &[self.generator.clone()])?;
        Ok(plaintext.to_vec())
    }

    pub fn read_secret_string(&self, name: &str) -> Result<String> {
        Ok(String::from_utf8(self.read_secret(name)?)?)
    }

    /// Secret plaintext, decrypted with a host identity
    pub fn read_secret_as(&self, host: &str, name: &str) -> Result<Vec<u8>> {
        let identity = self
            .hosts
            .get(host)
            .with_context(|| format!("Unknown test host {host}"))?;
        let plaintext = envelope::decrypt(&self.ciphertext(name)?, &[identity.clone()])?;
        Ok(plaintext.to_vec())
    }

    /// Recorded entropy, decrypted with the generator identity
    pub fn read_entropy(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.entropy_path(name);
        let ciphertext = std::fs::read(&path).with_context(|| format!("Failed to read {path}"))?;
        Ok(envelope::decrypt(&ciphertext, &[self.generator.clone()])?.to_vec())
    }

    /// Place a secret on disk the way an operator would
    pub fn write_secret(&self, name: &str, plaintext: &[u8]) -> Result<()> {
        let keys = GeneratorKeys::new(vec![self.generator.clone()]);
        let mut writer = envelope::EnvelopeWriter::create(&self.data_path(name), keys.recipients())?;
        writer.write_all(plaintext)?;
        writer.finish()?;
        Ok(())
    }

    pub fn remove_secret(&self, name: &str) -> Result<()> {
        std::fs::remove_file(self.data_path(name))?;
        Ok(())
    }

    pub fn remove_entropy(&self, name: &str) -> Result<()> {
        std::fs::remove_file(self.entropy_path(name))?;
        Ok(())
    }
}
