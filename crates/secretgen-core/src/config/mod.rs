//! Configuration loading and validation

mod loader;
mod validation;

pub use loader::STDIN_PATH;
