//! Generation strategies
//!
//! Each strategy turns its parameters (and, if deterministic, the entropy
//! stream) into plaintext written to an output sink.

mod json;
mod random;
mod script;
mod template;

pub use json::JsonGenerator;
pub use random::{charset_for, RandomGenerator, SUPPORTED_CHARSETS};
pub use script::ScriptGenerator;
pub use template::TemplateGenerator;

use crate::entropy::Entropy;
use crate::error::GenerateError;
use async_trait::async_trait;
use std::io::{self, Write};
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait Generator: Send + Sync {
    type Params: Send + Sync;

    /// Name of the strategy as it appears in configuration
    fn name(&self) -> &'static str;

    /// Whether output is a pure function of the parameters, the entropy
    /// stream and the secrets read through `readSecret`
    fn is_deterministic(&self) -> bool;

    async fn generate(
        &self,
        cancel: &CancellationToken,
        entropy: &mut Entropy,
        params: &Self::Params,
        output: &mut (dyn Write + Send),
    ) -> Result<(), GenerateError>;
}

/// Writes everything to two sinks
pub struct TeeWriter<'a, A: Write, B: Write> {
    primary: &'a mut A,
    copy: &'a mut B,
}

impl<'a, A: Write, B: Write> TeeWriter<'a, A, B> {
    pub fn new(primary: &'a mut A, copy: &'a mut B) -> Self {
        Self { primary, copy }
    }
}

impl<A: Write, B: Write> Write for TeeWriter<'_, A, B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.primary.write_all(buf)?;
        self.copy.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.primary.flush()?;
        self.copy.flush()
    }
}
