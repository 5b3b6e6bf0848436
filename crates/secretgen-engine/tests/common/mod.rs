//! Common test utilities for secretgen-engine
//!
//! - A `Testbed` owning a temporary secrets directory, a generator identity
//!   and a set of host identities
//! - Config builders for function calls and mounts
//! - Assertion helpers for generated files

#![allow(dead_code)]
#![allow(unused_imports)]

pub mod assertions;
pub mod builders;
pub mod fixtures;

pub use assertions::*;
pub use builders::*;
pub use fixtures::*;
