//! Functions callable from JSON and template content
//!
//! | name            | arguments                                               |
//! |-----------------|---------------------------------------------------------|
//! | `fmt`           | `format: string`, `args: array` (optional)              |
//! | `hashArgon2id`  | `data`, `memory: number`, `iterations: number`, `parallelism: number` |
//! | `hashBcrypt`    | `data`, `rounds: number`                                |
//! | `readSecret`    | `name: string`                                          |
//! | `stringReplace` | `s: string`, `old: string`, `new: string`, `n: number` (optional) |
//!
//! `data` accepts any value; non-strings are hashed in their `%v` rendering.
//! Hash salts come from the caller's entropy, so hashes replay exactly.

use crate::completion::CompletionMap;
use crate::entropy::Entropy;
use crate::error::GenerateError;
use crate::hash::{self, Argon2idCost};
use crate::printf::{display_value, sprintf, type_name};
use crate::store::SecretStore;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Key marking a JSON object as a function call
pub const FUNCTION_CALL_TAG_KEY: &str = "__secretsGeneratorType";

/// Value of the tag key for function calls
pub const FUNCTION_CALL_TAG: &str = "functionCall";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    Fmt,
    HashArgon2id,
    HashBcrypt,
    ReadSecret,
    StringReplace,
}

/// Accepted JSON type of an argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Any,
    String,
    Number,
    Array,
}

impl ArgKind {
    fn name(self) -> &'static str {
        match self {
            ArgKind::Any => "any",
            ArgKind::String => "string",
            ArgKind::Number => "number",
            ArgKind::Array => "array",
        }
    }

    fn accepts(self, value: &Value) -> bool {
        match self {
            ArgKind::Any => true,
            ArgKind::String => value.is_string(),
            ArgKind::Number => value.is_number(),
            ArgKind::Array => value.is_array(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Parameter {
    pub name: &'static str,
    pub kind: ArgKind,
    pub required: bool,
}

const fn required(name: &'static str, kind: ArgKind) -> Parameter {
    Parameter {
        name,
        kind,
        required: true,
    }
}

const fn optional(name: &'static str, kind: ArgKind) -> Parameter {
    Parameter {
        name,
        kind,
        required: false,
    }
}

const FMT_PARAMS: &[Parameter] = &[
    required("format", ArgKind::String),
    optional("args", ArgKind::Array),
];

const ARGON2ID_PARAMS: &[Parameter] = &[
    required("data", ArgKind::Any),
    required("memory", ArgKind::Number),
    required("iterations", ArgKind::Number),
    required("parallelism", ArgKind::Number),
];

const BCRYPT_PARAMS: &[Parameter] = &[
    required("data", ArgKind::Any),
    required("rounds", ArgKind::Number),
];

const READ_SECRET_PARAMS: &[Parameter] = &[required("name", ArgKind::String)];

const STRING_REPLACE_PARAMS: &[Parameter] = &[
    required("s", ArgKind::String),
    required("old", ArgKind::String),
    required("new", ArgKind::String),
    optional("n", ArgKind::Number),
];

impl Function {
    pub const ALL: [Function; 5] = [
        Function::Fmt,
        Function::HashArgon2id,
        Function::HashBcrypt,
        Function::ReadSecret,
        Function::StringReplace,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Function::Fmt => "fmt",
            Function::HashArgon2id => "hashArgon2id",
            Function::HashBcrypt => "hashBcrypt",
            Function::ReadSecret => "readSecret",
            Function::StringReplace => "stringReplace",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, GenerateError> {
        Self::ALL
            .into_iter()
            .find(|f| f.name() == name)
            .ok_or_else(|| GenerateError::FunctionNotFound {
                name: name.to_string(),
            })
    }

    /// Whether a call consumes generation entropy
    pub fn draws_entropy(self) -> bool {
        matches!(self, Function::HashArgon2id | Function::HashBcrypt)
    }

    pub fn parameters(self) -> &'static [Parameter] {
        match self {
            Function::Fmt => FMT_PARAMS,
            Function::HashArgon2id => ARGON2ID_PARAMS,
            Function::HashBcrypt => BCRYPT_PARAMS,
            Function::ReadSecret => READ_SECRET_PARAMS,
            Function::StringReplace => STRING_REPLACE_PARAMS,
        }
    }
}

/// Call arguments checked against a function's parameter list
pub struct Arguments<'a> {
    function: Function,
    values: &'a Map<String, Value>,
}

impl<'a> Arguments<'a> {
    /// Check presence and type of every declared parameter. Undeclared
    /// arguments are ignored.
    pub fn bind(function: Function, values: &'a Map<String, Value>) -> Result<Self, GenerateError> {
        let args = Self { function, values };
        for parameter in function.parameters() {
            args.lookup(parameter)?;
        }
        Ok(args)
    }

    fn lookup(&self, parameter: &Parameter) -> Result<Option<&'a Value>, GenerateError> {
        match self.values.get(parameter.name) {
            None if parameter.required => Err(GenerateError::ArgumentMissing {
                function: self.function.name(),
                argument: parameter.name,
            }),
            None => Ok(None),
            Some(value) if !parameter.kind.accepts(value) => {
                Err(GenerateError::ArgumentTypeMismatch {
                    function: self.function.name(),
                    argument: parameter.name,
                    expected: parameter.kind.name(),
                    actual: type_name(value),
                })
            }
            Some(value) => Ok(Some(value)),
        }
    }

    fn parameter(&self, name: &str) -> Result<&'static Parameter, GenerateError> {
        self.function
            .parameters()
            .iter()
            .find(|p| p.name == name)
            .ok_or(GenerateError::MalformedCall {
                reason: "argument is not declared by the function",
            })
    }

    fn get(&self, name: &str) -> Result<Option<&'a Value>, GenerateError> {
        let parameter = self.parameter(name)?;
        self.lookup(parameter)
    }

    fn require(&self, name: &str) -> Result<&'a Value, GenerateError> {
        let parameter = self.parameter(name)?;
        self.lookup(parameter)?
            .ok_or(GenerateError::ArgumentMissing {
                function: self.function.name(),
                argument: parameter.name,
            })
    }

    pub fn string(&self, name: &str) -> Result<&'a str, GenerateError> {
        let value = self.require(name)?;
        value.as_str().ok_or(GenerateError::ArgumentTypeMismatch {
            function: self.function.name(),
            argument: self.parameter(name)?.name,
            expected: "string",
            actual: type_name(value),
        })
    }

    pub fn array_or_empty(&self, name: &str) -> Result<&'a [Value], GenerateError> {
        Ok(self
            .get(name)?
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]))
    }

    /// Argument rendered as text
    pub fn text(&self, name: &str) -> Result<String, GenerateError> {
        Ok(display_value(self.require(name)?))
    }

    pub fn u32(&self, name: &str) -> Result<u32, GenerateError> {
        let parameter = self.parameter(name)?;
        let value = self.require(name)?;
        value
            .as_u64()
            .or_else(|| {
                value
                    .as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                    .map(|f| f as u64)
            })
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| GenerateError::InvalidArgument {
                function: self.function.name(),
                argument: parameter.name,
                reason: format!("expected a non-negative integer, got {value}"),
            })
    }

    pub fn optional_i64(&self, name: &str) -> Result<Option<i64>, GenerateError> {
        let parameter = self.parameter(name)?;
        match self.get(name)? {
            None => Ok(None),
            Some(value) => value
                .as_i64()
                .or_else(|| value.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .map(Some)
                .ok_or_else(|| GenerateError::InvalidArgument {
                    function: self.function.name(),
                    argument: parameter.name,
                    reason: format!("expected an integer, got {value}"),
                }),
        }
    }
}

/// Function implementations with access to other secrets
#[derive(Clone)]
pub struct FunctionSet {
    completion: Arc<CompletionMap>,
    store: Arc<SecretStore>,
}

impl FunctionSet {
    pub fn new(completion: Arc<CompletionMap>, store: Arc<SecretStore>) -> Self {
        Self { completion, store }
    }

    /// Invoke `function` with already evaluated arguments
    pub async fn call(
        &self,
        function: Function,
        args: &Map<String, Value>,
        entropy: &mut Entropy,
        cancel: &CancellationToken,
    ) -> Result<Value, GenerateError> {
        let args = Arguments::bind(function, args)?;

        let result = match function {
            Function::Fmt => sprintf(args.string("format")?, args.array_or_empty("args")?)?,
            Function::HashArgon2id => {
                let cost = Argon2idCost {
                    memory: args.u32("memory")?,
                    iterations: args.u32("iterations")?,
                    parallelism: args.u32("parallelism")?,
                };
                hash::hash_argon2id(entropy, args.text("data")?.as_bytes(), cost)?
            }
            Function::HashBcrypt => {
                hash::hash_bcrypt(entropy, args.text("data")?.as_bytes(), args.u32("rounds")?)?
            }
            Function::ReadSecret => self.read_secret(args.string("name")?, cancel).await?,
            Function::StringReplace => {
                let input = args.string("s")?;
                let old = args.string("old")?;
                let new = args.string("new")?;
                match args.optional_i64("n")? {
                    Some(n) if n >= 0 => input.replacen(old, new, n as usize),
                    _ => input.replace(old, new),
                }
            }
        };

        Ok(Value::String(result))
    }

    /// Wait for `name` to be final, then return its plaintext
    pub async fn read_secret(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<String, GenerateError> {
        let signal = self.completion.signal(name);
        tokio::select! {
            biased;
            _ = signal.completed() => {}
            _ = cancel.cancelled() => return Err(GenerateError::Cancelled),
        }

        let plaintext = self.store.load_secret(name).await?;
        String::from_utf8(plaintext.to_vec()).map_err(|_| GenerateError::SecretNotUtf8 {
            name: name.to_string(),
        })
    }
}
