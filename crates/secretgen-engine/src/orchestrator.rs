//! Concurrent generation of every configured secret
//!
//! Each generated secret runs as its own task. Tasks coordinate only through
//! the completion map and the secret store: a secret that reads another one
//! waits for it to be final. The first failure cancels every other task.

use crate::completion::CompletionMap;
use crate::entropy::Entropy;
use crate::envelope::{self, EnvelopeWriter};
use crate::error::{EnvelopeError, GenerateError, RunError, SecretFailure, StoreError};
use crate::functions::FunctionSet;
use crate::generators::{
    Generator, JsonGenerator, RandomGenerator, ScriptGenerator, TeeWriter, TemplateGenerator,
};
use crate::keys::{GeneratorKeys, Recipient, RecipientTable};
use crate::store::SecretStore;
use camino::{Utf8Path, Utf8PathBuf};
use secretgen_core::{Config, GenerationParams, SecretsLayout};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use zeroize::Zeroizing;

/// What happened to one secret during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretOutcome {
    /// Managed outside the generator and left alone
    External,
    /// Existing ciphertext was still valid
    Unchanged,
    /// Ciphertext (and entropy record) rewritten
    Generated,
}

/// Secret names grouped by outcome, each list sorted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub generated: Vec<String>,
    pub unchanged: Vec<String>,
    pub external: Vec<String>,
}

impl RunSummary {
    fn record(&mut self, name: String, outcome: SecretOutcome) {
        match outcome {
            SecretOutcome::External => self.external.push(name),
            SecretOutcome::Unchanged => self.unchanged.push(name),
            SecretOutcome::Generated => self.generated.push(name),
        }
    }

    fn sort(&mut self) {
        self.generated.sort();
        self.unchanged.sort();
        self.external.sort();
    }
}

/// Generates the secrets of one configuration
pub struct Orchestrator {
    config: Arc<Config>,
    layout: SecretsLayout,
    keys: Arc<GeneratorKeys>,
    hosts: Arc<RecipientTable>,
}

/// State of a single run
struct Engine {
    config: Arc<Config>,
    layout: SecretsLayout,
    keys: Arc<GeneratorKeys>,
    hosts: Arc<RecipientTable>,
    store: Arc<SecretStore>,
    completion: Arc<CompletionMap>,
    json: JsonGenerator,
    random: RandomGenerator,
    script: ScriptGenerator,
    template: TemplateGenerator,
}

impl Orchestrator {
    /// Validate `config` and parse every host key. Fails before any file is
    /// touched.
    pub fn new(
        config: Config,
        keys: GeneratorKeys,
        layout: SecretsLayout,
    ) -> Result<Self, RunError> {
        config.validate()?;
        let hosts = RecipientTable::parse(&config.public_keys)?;

        Ok(Self {
            config: Arc::new(config),
            layout,
            keys: Arc::new(keys),
            hosts: Arc::new(hosts),
        })
    }

    /// Empty store and unfired completion signals for a new run
    fn engine(&self) -> Engine {
        let store = Arc::new(SecretStore::new(
            self.layout.clone(),
            Arc::clone(&self.keys),
        ));
        let completion = Arc::new(CompletionMap::new(self.config.secrets.keys().cloned()));
        let functions = FunctionSet::new(Arc::clone(&completion), Arc::clone(&store));

        Engine {
            config: Arc::clone(&self.config),
            layout: self.layout.clone(),
            keys: Arc::clone(&self.keys),
            hosts: Arc::clone(&self.hosts),
            store,
            completion,
            json: JsonGenerator::new(functions.clone()),
            random: RandomGenerator,
            script: ScriptGenerator,
            template: TemplateGenerator::new(functions),
        }
    }

    /// Bring every secret up to date
    ///
    /// Cancelling `cancel` stops all in-flight generation. Failures of every
    /// secret are collected, with failures caused only by cancellation listed
    /// last. Each call reads the secrets directory afresh.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<RunSummary, RunError> {
        let engine = Arc::new(self.engine());
        let run_cancel = cancel.child_token();
        let mut summary = RunSummary::default();

        // external secrets are final before any generator can wait on them
        for (name, secret) in &engine.config.secrets {
            if secret.generation.is_none() {
                engine.completion.mark_complete(name);
                summary.record(name.clone(), SecretOutcome::External);
            }
        }

        let mut units = JoinSet::new();
        let mut task_names = HashMap::new();
        for (name, secret) in &engine.config.secrets {
            if secret.generation.is_none() {
                continue;
            }

            let unit_engine = Arc::clone(&engine);
            let unit_cancel = run_cancel.clone();
            let unit_name = name.clone();
            let handle =
                units.spawn(async move { unit_engine.process(&unit_name, &unit_cancel).await });
            task_names.insert(handle.id(), name.clone());
        }

        let mut failures = Vec::new();
        while let Some(joined) = units.join_next_with_id().await {
            let (id, result) = match joined {
                Ok((id, result)) => (id, result),
                Err(join_error) => (
                    join_error.id(),
                    Err(GenerateError::TaskFailed(join_error.to_string())),
                ),
            };
            let name = task_names.remove(&id).unwrap_or_default();

            match result {
                Ok(outcome) => summary.record(name, outcome),
                Err(err) => {
                    if !err.is_cancellation() {
                        error!(secret = %name, "Generation failed: {}", err);
                        run_cancel.cancel();
                    }
                    failures.push(SecretFailure {
                        secret: name,
                        error: err,
                    });
                }
            }
        }

        if failures.is_empty() {
            summary.sort();
            info!(
                generated = summary.generated.len(),
                unchanged = summary.unchanged.len(),
                external = summary.external.len(),
                "Secrets are up to date"
            );
            return Ok(summary);
        }

        if cancel.is_cancelled() && failures.iter().all(|f| f.error.is_cancellation()) {
            return Err(RunError::Cancelled);
        }

        failures.sort_by(|a, b| {
            a.error
                .is_cancellation()
                .cmp(&b.error.is_cancellation())
                .then_with(|| a.secret.cmp(&b.secret))
        });
        Err(RunError::Generation { failures })
    }
}

impl Engine {
    async fn process(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<SecretOutcome, GenerateError> {
        let Some(params) = self
            .config
            .secrets
            .get(name)
            .and_then(|secret| secret.generation.as_ref())
        else {
            self.completion.mark_complete(name);
            return Ok(SecretOutcome::External);
        };

        match params {
            GenerationParams::Json(params) => self.process_with(name, &self.json, params, cancel).await,
            GenerationParams::Random(params) => {
                self.process_with(name, &self.random, params, cancel).await
            }
            GenerationParams::Script(params) => {
                self.process_with(name, &self.script, params, cancel).await
            }
            GenerationParams::Template(params) => {
                self.process_with(name, &self.template, params, cancel).await
            }
        }
    }

    async fn process_with<G: Generator>(
        &self,
        name: &str,
        generator: &G,
        params: &G::Params,
        cancel: &CancellationToken,
    ) -> Result<SecretOutcome, GenerateError> {
        let changed = if generator.is_deterministic() {
            self.replay_changed(name, generator, params, cancel).await?
        } else {
            !self.ciphertext_exists(name).await?
        };

        if !changed {
            debug!(secret = %name, "Secret is unchanged");
            self.completion.mark_complete(name);
            return Ok(SecretOutcome::Unchanged);
        }

        let recipients = self.recipients_for(name)?;
        info!(
            secret = %name,
            strategy = generator.name(),
            recipients = recipients.len(),
            "Generating secret"
        );

        let plaintext = match self
            .write_secret(name, generator, params, &recipients, cancel)
            .await
        {
            Ok(plaintext) => plaintext,
            Err(err) => {
                self.discard_partial(name, generator.is_deterministic())
                    .await;
                return Err(err);
            }
        };

        self.store.store_secret(name, plaintext).await;
        self.completion.mark_complete(name);
        Ok(SecretOutcome::Generated)
    }

    /// Replay the recorded entropy and compare with the stored plaintext.
    /// Any replay failure counts as a change. Existing ciphertext that no
    /// generator identity can open is an error.
    async fn replay_changed<G: Generator>(
        &self,
        name: &str,
        generator: &G,
        params: &G::Params,
        cancel: &CancellationToken,
    ) -> Result<bool, GenerateError> {
        let Some(recorded) = self.read_entropy_record(name).await? else {
            return Ok(true);
        };

        let mut entropy = Entropy::replay(recorded);
        let mut trial = Zeroizing::new(Vec::new());
        match generator
            .generate(cancel, &mut entropy, params, &mut *trial)
            .await
        {
            Ok(()) => {}
            Err(GenerateError::Cancelled) => return Err(GenerateError::Cancelled),
            Err(err) => {
                debug!(secret = %name, "Replay failed, regenerating: {}", err);
                return Ok(true);
            }
        }

        match self.store.load_secret(name).await {
            Ok(existing) => Ok(existing.as_slice() != trial.as_slice()),
            Err(
                err @ StoreError::DecryptFailed {
                    source: EnvelopeError::NoMatchingIdentity,
                    ..
                },
            ) => Err(err.into()),
            Err(err) => {
                debug!(secret = %name, "No usable existing secret, regenerating: {}", err);
                Ok(true)
            }
        }
    }

    /// Decrypted entropy record. A missing record is empty; an unreadable one
    /// is `None`.
    async fn read_entropy_record(
        &self,
        name: &str,
    ) -> Result<Option<Zeroizing<Vec<u8>>>, GenerateError> {
        let path = self.layout.entropy_path(name);

        let ciphertext = match tokio::fs::read(&path).await {
            Ok(ciphertext) => ciphertext,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Some(Zeroizing::new(Vec::new())))
            }
            Err(source) => {
                return Err(GenerateError::EntropyRecord {
                    path: path.to_string(),
                    source: EnvelopeError::Io(source),
                })
            }
        };

        match envelope::decrypt(&ciphertext, self.keys.identities()) {
            Ok(recorded) => Ok(Some(recorded)),
            Err(EnvelopeError::NoMatchingIdentity) => Err(GenerateError::EntropyRecord {
                path: path.to_string(),
                source: EnvelopeError::NoMatchingIdentity,
            }),
            Err(err) => {
                warn!(secret = %name, "Discarding unreadable entropy record {}: {}", path, err);
                Ok(None)
            }
        }
    }

    async fn ciphertext_exists(&self, name: &str) -> Result<bool, GenerateError> {
        let path = self.layout.data_path(name);
        tokio::fs::try_exists(&path)
            .await
            .map_err(|source| GenerateError::Io {
                path: path.to_string(),
                source,
            })
    }

    /// Generator recipients followed by the keys of every host mounting `name`
    fn recipients_for(&self, name: &str) -> Result<Vec<Recipient>, GenerateError> {
        let mut recipients = self.keys.recipients().to_vec();

        for (mount_name, mount) in self.config.mounts_for(name) {
            let host_keys =
                self.hosts
                    .get(&mount.host)
                    .ok_or_else(|| GenerateError::UnknownMountHost {
                        mount: mount_name.to_string(),
                        host: mount.host.clone(),
                    })?;
            recipients.extend(host_keys.iter().cloned());
        }

        Ok(recipients)
    }

    async fn write_secret<G: Generator>(
        &self,
        name: &str,
        generator: &G,
        params: &G::Params,
        recipients: &[Recipient],
        cancel: &CancellationToken,
    ) -> Result<Zeroizing<Vec<u8>>, GenerateError> {
        let mut entropy = if generator.is_deterministic() {
            let path = self.layout.entropy_path(name);
            let recorder = EnvelopeWriter::create(&path, self.keys.recipients())
                .map_err(|source| write_error(&path, source))?;
            Entropy::record(recorder)
        } else {
            Entropy::unavailable()
        };

        let data_path = self.layout.data_path(name);
        let mut sink = EnvelopeWriter::create(&data_path, recipients)
            .map_err(|source| write_error(&data_path, source))?;

        let mut plaintext = Zeroizing::new(Vec::new());
        {
            let mut tee = TeeWriter::new(&mut sink, &mut *plaintext);
            generator
                .generate(cancel, &mut entropy, params, &mut tee)
                .await?;
        }

        sink.finish()
            .map_err(|source| write_error(&data_path, source))?;
        entropy
            .finish()
            .map_err(|source| write_error(&self.layout.entropy_path(name), source))?;

        Ok(plaintext)
    }

    /// Remove files left behind by a failed generation
    async fn discard_partial(&self, name: &str, deterministic: bool) {
        let mut paths = vec![self.layout.data_path(name)];
        if deterministic {
            paths.push(self.layout.entropy_path(name));
        }

        for path in paths {
            remove_if_present(&path).await;
        }
    }
}

fn write_error(path: &Utf8Path, source: EnvelopeError) -> GenerateError {
    GenerateError::Write {
        path: path.to_string(),
        source,
    }
}

async fn remove_if_present(path: &Utf8PathBuf) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed partial file {}", path),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!("Failed to remove partial file {}: {}", path, err),
    }
}

/// Load the generator identity and run `config` to completion
pub async fn run(
    config: Config,
    identity_path: &Utf8Path,
    layout: SecretsLayout,
    cancel: &CancellationToken,
) -> Result<RunSummary, RunError> {
    let keys = GeneratorKeys::from_identity_file(identity_path)?;
    Orchestrator::new(config, keys, layout)?.run(cancel).await
}
