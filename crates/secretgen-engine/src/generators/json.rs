use super::Generator;
use crate::entropy::Entropy;
use crate::error::GenerateError;
use crate::functions::{Function, FunctionSet, FUNCTION_CALL_TAG, FUNCTION_CALL_TAG_KEY};
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use secretgen_core::JsonParams;
use serde_json::{Map, Value};
use std::io::Write;
use tokio_util::sync::CancellationToken;

/// Evaluates function calls embedded in JSON content
///
/// A call is an object of the form
///
/// ```json
/// { "__secretsGeneratorType": "functionCall", "name": "fmt", "arguments": { ... } }
/// ```
///
/// Arguments are evaluated before the call, so calls nest. Object members are
/// visited in sorted key order, which fixes the order entropy is consumed in.
pub struct JsonGenerator {
    functions: FunctionSet,
}

impl JsonGenerator {
    pub fn new(functions: FunctionSet) -> Self {
        Self { functions }
    }

    fn walk<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        entropy: &'a mut Entropy,
        value: &'a Value,
    ) -> BoxFuture<'a, Result<Value, GenerateError>> {
        async move {
            match value {
                Value::Object(object) if is_function_call(object) => {
                    self.call(cancel, entropy, object).await
                }
                Value::Object(object) => {
                    let mut members: Vec<(&String, &Value)> = object.iter().collect();
                    members.sort_by(|a, b| a.0.cmp(b.0));

                    let mut walked = Map::new();
                    for (key, member) in members {
                        let member = self.walk(cancel, &mut *entropy, member).await?;
                        walked.insert(key.clone(), member);
                    }
                    Ok(Value::Object(walked))
                }
                Value::Array(items) => {
                    let mut walked = Vec::with_capacity(items.len());
                    for item in items {
                        walked.push(self.walk(cancel, &mut *entropy, item).await?);
                    }
                    Ok(Value::Array(walked))
                }
                other => Ok(other.clone()),
            }
        }
        .boxed()
    }

    async fn call(
        &self,
        cancel: &CancellationToken,
        entropy: &mut Entropy,
        call: &Map<String, Value>,
    ) -> Result<Value, GenerateError> {
        let name = match call.get("name") {
            Some(Value::String(name)) => name,
            Some(_) => {
                return Err(GenerateError::MalformedCall {
                    reason: "function name is not a string",
                })
            }
            None => {
                return Err(GenerateError::MalformedCall {
                    reason: "function call has no name",
                })
            }
        };
        let arguments = call.get("arguments").ok_or(GenerateError::MalformedCall {
            reason: "function call has no arguments",
        })?;

        let arguments = match self.walk(cancel, &mut *entropy, arguments).await? {
            Value::Object(arguments) => arguments,
            _ => {
                return Err(GenerateError::MalformedCall {
                    reason: "function arguments are not an object",
                })
            }
        };

        let function = Function::from_name(name)?;
        self.functions
            .call(function, &arguments, entropy, cancel)
            .await
    }
}

fn is_function_call(object: &Map<String, Value>) -> bool {
    object.get(FUNCTION_CALL_TAG_KEY).and_then(Value::as_str) == Some(FUNCTION_CALL_TAG)
}

#[async_trait]
impl Generator for JsonGenerator {
    type Params = JsonParams;

    fn name(&self) -> &'static str {
        "json"
    }

    fn is_deterministic(&self) -> bool {
        true
    }

    async fn generate(
        &self,
        cancel: &CancellationToken,
        entropy: &mut Entropy,
        params: &JsonParams,
        output: &mut (dyn Write + Send),
    ) -> Result<(), GenerateError> {
        let content = self.walk(cancel, entropy, &params.content).await?;

        serde_json::to_writer(&mut *output, &content)?;
        output.write_all(b"\n").map_err(GenerateError::Output)
    }
}
