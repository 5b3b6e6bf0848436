//! # secretgen-core
//!
//! Core library for secretgen providing:
//! - Configuration model (host keys, secrets, mounts)
//! - JSON configuration loading and validation
//! - The on-disk layout of encrypted secrets and entropy records

pub mod config;
pub mod error;
pub mod layout;
pub mod types;

pub use error::{Error, Result};
pub use layout::SecretsLayout;
pub use types::{
    Config, GenerationParams, JsonParams, RandomParams, ScriptParams, Secret, SecretMount,
    TemplateParams,
};
