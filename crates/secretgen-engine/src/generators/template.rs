use super::Generator;
use crate::entropy::Entropy;
use crate::error::GenerateError;
use crate::functions::{Function, FunctionSet};
use async_trait::async_trait;
use secretgen_core::TemplateParams;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tera::{Context, Tera};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

const TEMPLATE_NAME: &str = "secret";

/// Renders a Tera template against `data`
///
/// Every function is available under its own name with named arguments, e.g.
/// `{{ hashBcrypt(data=readSecret(name="db/password"), rounds=10) }}`.
/// Output is not escaped.
pub struct TemplateGenerator {
    functions: FunctionSet,
}

impl TemplateGenerator {
    pub fn new(functions: FunctionSet) -> Self {
        Self { functions }
    }
}

/// State shared between the render thread and the template functions
struct RenderState {
    entropy: Mutex<Entropy>,
    failure: Mutex<Option<GenerateError>>,
    cancel: CancellationToken,
}

struct TemplateFunction {
    function: Function,
    functions: FunctionSet,
    state: Arc<RenderState>,
    runtime: Handle,
}

impl tera::Function for TemplateFunction {
    fn call(&self, args: &HashMap<String, tera::Value>) -> tera::Result<tera::Value> {
        let args: Map<String, Value> = args.iter().map(|(k, v)| (k.clone(), v.clone())).collect();

        let result = {
            let mut entropy = lock(&self.state.entropy);
            self.runtime.block_on(self.functions.call(
                self.function,
                &args,
                &mut entropy,
                &self.state.cancel,
            ))
        };

        result.map_err(|error| {
            let message = format!("{}: {error}", self.function.name());
            lock(&self.state.failure).get_or_insert(error);
            tera::Error::msg(message)
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn render(
    content: &str,
    data: &Map<String, Value>,
    functions: FunctionSet,
    state: Arc<RenderState>,
    runtime: Handle,
) -> tera::Result<String> {
    let mut tera = Tera::default();
    tera.autoescape_on(vec![]);

    for function in Function::ALL {
        tera.register_function(
            function.name(),
            TemplateFunction {
                function,
                functions: functions.clone(),
                state: Arc::clone(&state),
                runtime: runtime.clone(),
            },
        );
    }

    tera.add_raw_template(TEMPLATE_NAME, content)?;
    let context = Context::from_serialize(data)?;
    tera.render(TEMPLATE_NAME, &context)
}

fn template_error(err: &tera::Error) -> GenerateError {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    GenerateError::Template { message }
}

/// Reject calls where more than one keyword argument draws entropy. Tera
/// evaluates keyword arguments in hash map order, so such draws would not
/// replay in the order they were recorded.
fn check_argument_order(content: &str) -> Result<(), GenerateError> {
    for expression in expressions(content) {
        check_expression(expression)?;
    }
    Ok(())
}

/// Bodies of `{{ }}` and `{% %}` tags, skipping comments and raw blocks
fn expressions(content: &str) -> Vec<&str> {
    let mut found = Vec::new();
    let mut rest = content;

    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        let close = match after.as_bytes().first() {
            Some(b'{') => "}}",
            Some(b'%') => "%}",
            Some(b'#') => "#}",
            _ => {
                rest = after;
                continue;
            }
        };

        let body = &after[1..];
        let end = if close == "#}" {
            body.find(close)
        } else {
            find_outside_strings(body, close)
        };
        // unterminated tags are left for tera to report
        let Some(end) = end else { break };

        let tag = &body[..end];
        rest = &body[end + close.len()..];
        match close {
            "#}" => {}
            "%}" if tag_keyword(tag) == "raw" => match end_of_raw(rest) {
                Some(offset) => rest = &rest[offset..],
                None => break,
            },
            _ => found.push(tag),
        }
    }

    found
}

fn tag_keyword(tag: &str) -> &str {
    tag.trim_matches(|c: char| c == '-' || c.is_whitespace())
}

/// Offset just past the `{% endraw %}` that closes a raw block
fn end_of_raw(content: &str) -> Option<usize> {
    let mut offset = 0;
    while let Some(start) = content[offset..].find("{%") {
        let body = offset + start + 2;
        let end = body + content[body..].find("%}")?;
        if tag_keyword(&content[body..end]) == "endraw" {
            return Some(end + 2);
        }
        offset = end + 2;
    }
    None
}

fn find_outside_strings(text: &str, needle: &str) -> Option<usize> {
    let mut quote = None;
    for (index, c) in text.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if matches!(c, '"' | '\'' | '`') => quote = Some(c),
            None if text[index..].starts_with(needle) => return Some(index),
            None => {}
        }
    }
    None
}

/// An open `(` or `[` while scanning an expression
#[derive(Default)]
struct Group {
    /// Callee when the group is an argument list
    call: Option<String>,
    /// The callee itself draws entropy
    draws: bool,
    /// Finished arguments that draw entropy
    drawing_arguments: usize,
    /// The argument being scanned draws entropy
    current: bool,
}

impl Group {
    fn end_argument(&mut self) {
        if self.current {
            self.drawing_arguments += 1;
        }
        self.current = false;
    }
}

fn check_expression(expression: &str) -> Result<(), GenerateError> {
    let mut groups: Vec<Group> = Vec::new();
    let mut quote = None;

    for (index, c) in expression.char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '"' | '\'' | '`' => quote = Some(c),
            '(' => {
                let call = callee(&expression[..index]);
                groups.push(Group {
                    draws: call.is_some_and(may_draw_entropy),
                    call: call.map(str::to_string),
                    ..Group::default()
                });
            }
            '[' => groups.push(Group::default()),
            ',' => {
                if let Some(group) = groups.last_mut() {
                    group.end_argument();
                }
            }
            ')' | ']' => {
                let Some(mut group) = groups.pop() else {
                    continue;
                };
                group.end_argument();

                if let Some(call) = group.call {
                    if group.drawing_arguments > 1 {
                        return Err(GenerateError::AmbiguousEntropyOrder { call });
                    }
                }
                if group.draws || group.drawing_arguments > 0 {
                    if let Some(parent) = groups.last_mut() {
                        parent.current = true;
                    }
                }
            }
            _ => {}
        }
    }

    Ok(())
}

/// Identifier (or `namespace::macro` path) directly before an opening paren
fn callee(before: &str) -> Option<&str> {
    let trimmed = before.trim_end();
    let start = trimmed
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_alphanumeric() || *c == '_' || *c == ':')
        .last()
        .map(|(index, _)| index)?;
    Some(&trimmed[start..])
}

/// Registry functions that consume entropy, and macros, which may call them
fn may_draw_entropy(name: &str) -> bool {
    name.contains("::") || Function::from_name(name).is_ok_and(Function::draws_entropy)
}

#[async_trait]
impl Generator for TemplateGenerator {
    type Params = TemplateParams;

    fn name(&self) -> &'static str {
        "template"
    }

    fn is_deterministic(&self) -> bool {
        true
    }

    async fn generate(
        &self,
        cancel: &CancellationToken,
        entropy: &mut Entropy,
        params: &TemplateParams,
        output: &mut (dyn Write + Send),
    ) -> Result<(), GenerateError> {
        check_argument_order(&params.content)?;

        // Tera functions are synchronous, so rendering happens on a blocking
        // thread that drives async calls through the runtime handle
        let state = Arc::new(RenderState {
            entropy: Mutex::new(std::mem::take(entropy)),
            failure: Mutex::new(None),
            cancel: cancel.clone(),
        });

        let rendered = {
            let state = Arc::clone(&state);
            let functions = self.functions.clone();
            let content = params.content.clone();
            let data = params.data.clone();
            let runtime = Handle::current();
            tokio::task::spawn_blocking(move || render(&content, &data, functions, state, runtime))
                .await
        };

        *entropy = std::mem::take(&mut *lock(&state.entropy));
        let failure = lock(&state.failure).take();

        let rendered = match rendered {
            Ok(Ok(rendered)) => rendered,
            Ok(Err(err)) => return Err(failure.unwrap_or_else(|| template_error(&err))),
            Err(join_error) => return Err(GenerateError::TaskFailed(join_error.to_string())),
        };

        output
            .write_all(rendered.as_bytes())
            .map_err(GenerateError::Output)
    }
}
