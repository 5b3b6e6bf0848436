//! Type definitions for secretgen configuration

mod config_types;

pub use config_types::*;
