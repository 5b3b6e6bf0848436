//! Reproducible secret generation
//!
//! Secrets are generated concurrently, encrypted with age to the generator's
//! own identity plus every host that mounts them. Deterministic strategies
//! record their entropy so later runs can tell whether a secret's definition
//! or its dependencies changed, and leave it alone otherwise.
//!
//! # Example
//!
//! ```no_run
//! use camino::Utf8Path;
//! use secretgen_core::{Config, SecretsLayout};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::load(Utf8Path::new("secrets.json"))?;
//! let summary = secretgen_engine::run(
//!     config,
//!     Utf8Path::new("identity.txt"),
//!     SecretsLayout::default(),
//!     &CancellationToken::new(),
//! )
//! .await?;
//! println!("{} secrets generated", summary.generated.len());
//! # Ok(())
//! # }
//! ```

pub mod completion;
pub mod entropy;
pub mod envelope;
pub mod error;
pub mod functions;
pub mod generators;
pub mod hash;
pub mod keys;
pub mod orchestrator;
pub mod password;
pub mod printf;
pub mod store;

pub use error::{EnvelopeError, GenerateError, KeyError, RunError, SecretFailure, StoreError};
pub use keys::{GeneratorKeys, RecipientTable};
pub use orchestrator::{run, Orchestrator, RunSummary, SecretOutcome};
