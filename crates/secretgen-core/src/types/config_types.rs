//! Configuration types consumed by the generator

use crate::error::Error;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Top-level configuration: host keys, secrets and the mounts that tie them together
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "RawConfig")]
pub struct Config {
    /// Host name to its ordered list of public keys (age or SSH)
    pub public_keys: BTreeMap<String, Vec<String>>,

    /// Secret name to its definition
    pub secrets: BTreeMap<String, Secret>,

    /// Mount name to the host/secret pair it binds
    pub secret_mounts: BTreeMap<String, SecretMount>,
}

impl Config {
    /// Mounts that bind the given secret, in mount-name order
    pub fn mounts_for<'a>(
        &'a self,
        secret_name: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a SecretMount)> + 'a {
        self.secret_mounts
            .iter()
            .filter(move |(_, mount)| mount.secret == secret_name)
            .map(|(name, mount)| (name.as_str(), mount))
    }
}

/// A single configured secret
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Secret {
    /// How the secret is generated. `None` means the secret is managed
    /// externally and is never generated.
    pub generation: Option<GenerationParams>,
}

impl Secret {
    /// Secret that is generated with the given parameters
    pub fn generated(params: impl Into<GenerationParams>) -> Self {
        Self {
            generation: Some(params.into()),
        }
    }

    /// Secret that is provided by the operator and never generated
    pub fn external() -> Self {
        Self { generation: None }
    }
}

/// Strategy-specific generation parameters
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationParams {
    Json(JsonParams),
    Random(RandomParams),
    Script(ScriptParams),
    Template(TemplateParams),
}

impl GenerationParams {
    /// Name of the strategy as it appears in configuration
    pub fn strategy(&self) -> &'static str {
        match self {
            GenerationParams::Json(_) => "json",
            GenerationParams::Random(_) => "random",
            GenerationParams::Script(_) => "script",
            GenerationParams::Template(_) => "template",
        }
    }
}

impl From<JsonParams> for GenerationParams {
    fn from(params: JsonParams) -> Self {
        GenerationParams::Json(params)
    }
}

impl From<RandomParams> for GenerationParams {
    fn from(params: RandomParams) -> Self {
        GenerationParams::Random(params)
    }
}

impl From<ScriptParams> for GenerationParams {
    fn from(params: ScriptParams) -> Self {
        GenerationParams::Script(params)
    }
}

impl From<TemplateParams> for GenerationParams {
    fn from(params: TemplateParams) -> Self {
        GenerationParams::Template(params)
    }
}

/// Structured data with embedded function calls
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct JsonParams {
    #[serde(default)]
    pub content: Value,
}

/// Random password drawn from named character classes
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RandomParams {
    #[serde(default)]
    pub charsets: BTreeMap<String, bool>,

    #[serde(default)]
    pub length: usize,
}

/// Output of an external program
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScriptParams {
    pub program: String,
}

/// Tera template rendered against `data`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TemplateParams {
    #[serde(default)]
    pub data: Map<String, Value>,

    pub content: String,
}

/// Declares that `host` needs the plaintext of `secret`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SecretMount {
    pub host: String,
    pub secret: String,
}

impl SecretMount {
    pub fn new(host: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            secret: secret.into(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    #[serde(default)]
    public_keys: BTreeMap<String, Vec<String>>,

    #[serde(default)]
    secrets: BTreeMap<String, RawSecret>,

    #[serde(default)]
    secret_mounts: BTreeMap<String, SecretMount>,
}

#[derive(Deserialize)]
struct RawSecret {
    #[serde(default)]
    generation: Option<RawGeneration>,
}

/// Wire shape of `generation`: an object with at most one strategy key set
#[derive(Default, Deserialize)]
struct RawGeneration {
    json: Option<JsonParams>,
    random: Option<RandomParams>,
    script: Option<ScriptParams>,
    template: Option<TemplateParams>,
}

impl RawGeneration {
    fn into_params(self, secret: &str) -> Result<Option<GenerationParams>, Error> {
        let mut selected: Vec<GenerationParams> = Vec::with_capacity(1);
        selected.extend(self.json.map(GenerationParams::Json));
        selected.extend(self.random.map(GenerationParams::Random));
        selected.extend(self.script.map(GenerationParams::Script));
        selected.extend(self.template.map(GenerationParams::Template));

        if selected.len() > 1 {
            let strategies: Vec<&str> = selected.iter().map(|p| p.strategy()).collect();
            return Err(Error::ConflictingGeneration {
                secret: secret.to_string(),
                strategies: strategies.join(", "),
            });
        }

        Ok(selected.pop())
    }
}

impl TryFrom<RawConfig> for Config {
    type Error = Error;

    fn try_from(raw: RawConfig) -> Result<Self, Self::Error> {
        let mut secrets = BTreeMap::new();

        for (name, raw_secret) in raw.secrets {
            let generation = raw_secret
                .generation
                .unwrap_or_default()
                .into_params(&name)?;
            secrets.insert(name, Secret { generation });
        }

        Ok(Self {
            public_keys: raw.public_keys,
            secrets,
            secret_mounts: raw.secret_mounts,
        })
    }
}
