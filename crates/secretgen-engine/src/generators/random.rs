use super::Generator;
use crate::entropy::Entropy;
use crate::error::GenerateError;
use crate::password::generate_password;
use async_trait::async_trait;
use secretgen_core::RandomParams;
use std::io::Write;
use tokio_util::sync::CancellationToken;

/// Named character classes. Visually ambiguous characters are left out.
pub const SUPPORTED_CHARSETS: [(&str, &str); 4] = [
    ("lowercase", "abcdefghijkmnpqrstuvwxyz"),
    ("numbers", "123456789"),
    ("special", "#$%&@^`~.,:;\"'\\/|_-<>*+!?={[()]}"),
    ("uppercase", "ABCDEFGHJKLMNPQRSTUVWXYZ"),
];

pub fn charset_for(name: &str) -> Option<&'static str> {
    SUPPORTED_CHARSETS
        .iter()
        .find(|(charset, _)| *charset == name)
        .map(|(_, chars)| *chars)
}

/// Random password over the enabled charsets
pub struct RandomGenerator;

impl RandomGenerator {
    /// Concatenation of the enabled charsets in name order
    pub fn alphabet(params: &RandomParams) -> Result<String, GenerateError> {
        let mut alphabet = String::new();

        for (name, enabled) in &params.charsets {
            let chars = charset_for(name).ok_or_else(|| GenerateError::UnknownCharset {
                name: name.clone(),
            })?;
            if *enabled {
                alphabet.push_str(chars);
            }
        }

        if alphabet.is_empty() {
            return Err(GenerateError::EmptyCharset);
        }
        Ok(alphabet)
    }
}

#[async_trait]
impl Generator for RandomGenerator {
    type Params = RandomParams;

    fn name(&self) -> &'static str {
        "random"
    }

    fn is_deterministic(&self) -> bool {
        true
    }

    async fn generate(
        &self,
        _cancel: &CancellationToken,
        entropy: &mut Entropy,
        params: &RandomParams,
        output: &mut (dyn Write + Send),
    ) -> Result<(), GenerateError> {
        let alphabet = Self::alphabet(params)?;
        let password = generate_password(entropy, alphabet.as_bytes(), params.length)
            .map_err(GenerateError::from_entropy)?;

        output.write_all(&password).map_err(GenerateError::Output)
    }
}
