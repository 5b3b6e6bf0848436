//! Builders for generation parameters in wire format

#![allow(dead_code)]

use serde_json::{json, Value};

/// Tagged function call for JSON content
pub fn call(name: &str, arguments: Value) -> Value {
    json!({
        "__secretsGeneratorType": "functionCall",
        "name": name,
        "arguments": arguments,
    })
}

pub fn read_secret(name: &str) -> Value {
    call("readSecret", json!({ "name": name }))
}

pub fn random_secret(charsets: &[&str], length: usize) -> Value {
    let charsets: serde_json::Map<String, Value> = charsets
        .iter()
        .map(|name| (name.to_string(), Value::Bool(true)))
        .collect();
    json!({ "generation": { "random": { "charsets": charsets, "length": length } } })
}

pub fn json_secret(content: Value) -> Value {
    json!({ "generation": { "json": { "content": content } } })
}

pub fn template_secret(content: &str, data: Value) -> Value {
    json!({ "generation": { "template": { "content": content, "data": data } } })
}

pub fn script_secret(program: &str) -> Value {
    json!({ "generation": { "script": { "program": program } } })
}

pub fn external_secret() -> Value {
    json!({})
}
