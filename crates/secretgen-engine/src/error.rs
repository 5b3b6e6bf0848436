//! Error types for the generation engine
//!
//! Setup failures (`KeyError`, configuration errors) abort a run before any
//! secret is touched. `GenerateError` is scoped to a single secret and is
//! reported as part of `RunError::Generation`.

use crate::printf::FormatError;
use std::io;
use thiserror::Error;

/// Failure of the age envelope primitive
#[derive(Error, Debug)]
pub enum EnvelopeError {
    /// None of the supplied identities can open the file
    #[error("no identity matches any recipient of the file")]
    NoMatchingIdentity,

    #[error("failed to set up encryption: {0}")]
    Encrypt(String),

    #[error("failed to decrypt: {0}")]
    Decrypt(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Failure while parsing the generator identity or host public keys
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Failed to read identity file {path}: {source}")]
    ReadIdentity {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Identity file {path} contains no identities")]
    NoIdentities { path: String },

    #[error(
        "Identity number {index} in {path} is not an X25519 age identity (other identity types are not supported): {reason}"
    )]
    InvalidIdentity {
        path: String,
        index: usize,
        reason: String,
    },

    #[error("Invalid public key for host {host}: {reason}")]
    InvalidPublicKey { host: String, reason: String },
}

/// Failure while loading a secret's plaintext
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("secret {name} does not exist ({path} not found)")]
    NotFound { name: String, path: String },

    #[error("failed to decrypt secret {name}: {source}")]
    DecryptFailed {
        name: String,
        #[source]
        source: EnvelopeError,
    },

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Failure scoped to the generation of one secret
#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("empty charset for secret generation")]
    EmptyCharset,

    #[error("unknown charset: {name}")]
    UnknownCharset { name: String },

    #[error("function does not exist: {name}")]
    FunctionNotFound { name: String },

    #[error("malformed function call: {reason}")]
    MalformedCall { reason: &'static str },

    #[error("function argument is missing in call to {function}: {argument}")]
    ArgumentMissing {
        function: &'static str,
        argument: &'static str,
    },

    #[error(
        "argument {argument} has wrong type in call to {function}: wanted {expected}, got {actual}"
    )]
    ArgumentTypeMismatch {
        function: &'static str,
        argument: &'static str,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("invalid argument {argument} in call to {function}: {reason}")]
    InvalidArgument {
        function: &'static str,
        argument: &'static str,
        reason: String,
    },

    #[error("format error: {0}")]
    Format(#[from] FormatError),

    #[error("hashing failed: {0}")]
    Hash(String),

    #[error("secret {name} is not valid UTF-8")]
    SecretNotUtf8 { name: String },

    #[error("generation cancelled")]
    Cancelled,

    /// The replayed entropy record ran out before generation finished
    #[error("recorded entropy exhausted")]
    EntropyExhausted,

    #[error("entropy source failed: {0}")]
    Entropy(#[source] io::Error),

    #[error("failed to launch program {program}: {source}")]
    ProgramLaunch {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("program {program} failed: {status}")]
    ProgramFailed { program: String, status: String },

    #[error("template error: {message}")]
    Template { message: String },

    /// Tera evaluates keyword arguments in no fixed order
    #[error("more than one argument of {call} draws entropy; compute them in separate set statements")]
    AmbiguousEntropyOrder { call: String },

    #[error("failed to serialize output: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write output: {0}")]
    Output(#[source] io::Error),

    #[error("unknown host in secret mount: mount={mount} host={host}")]
    UnknownMountHost { mount: String, host: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to read entropy record {path}: {source}")]
    EntropyRecord {
        path: String,
        #[source]
        source: EnvelopeError,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: EnvelopeError,
    },

    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("generation task failed: {0}")]
    TaskFailed(String),
}

impl GenerateError {
    /// Map a failed entropy read. Running off the end of a replayed record
    /// becomes `EntropyExhausted`.
    pub fn from_entropy(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Self::EntropyExhausted
        } else {
            Self::Entropy(err)
        }
    }

    /// Whether this error only reflects the run-wide cancellation
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// A failed secret, annotated with its name
#[derive(Error, Debug)]
#[error("while generating secret {secret}: {error}")]
pub struct SecretFailure {
    pub secret: String,
    #[source]
    pub error: GenerateError,
}

/// Outcome of a whole run that did not succeed
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] secretgen_core::Error),

    #[error(transparent)]
    Keys(#[from] KeyError),

    #[error("{}", format_failures(failures))]
    Generation { failures: Vec<SecretFailure> },

    #[error("generation cancelled")]
    Cancelled,
}

impl RunError {
    /// The first failure that is not merely a consequence of cancellation
    pub fn primary_failure(&self) -> Option<&SecretFailure> {
        match self {
            RunError::Generation { failures } => failures
                .iter()
                .find(|f| !f.error.is_cancellation())
                .or_else(|| failures.first()),
            _ => None,
        }
    }
}

fn format_failures(failures: &[SecretFailure]) -> String {
    match failures {
        [single] => single.to_string(),
        _ => {
            let lines: Vec<String> = failures.iter().map(|f| f.to_string()).collect();
            format!(
                "{} secrets failed to generate:\n  - {}",
                failures.len(),
                lines.join("\n  - ")
            )
        }
    }
}
