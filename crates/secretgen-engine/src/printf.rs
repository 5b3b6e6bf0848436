//! printf-style formatting over JSON values
//!
//! Supports the verbs `%v %s %q %d %f %e %g %x %X %t` and `%%`, the flags
//! `-+ 0#`, a decimal width and a precision. Mismatched arguments are
//! reported as errors instead of being rendered inline. Width and precision
//! are limited to [`MAX_WIDTH`].

use serde_json::{Number, Value};
use std::iter::Peekable;
use std::str::Chars;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("missing argument for %{verb} (argument {index})")]
    MissingArgument { verb: char, index: usize },

    #[error("%{verb} cannot format {actual} (argument {index})")]
    BadArgument {
        verb: char,
        actual: &'static str,
        index: usize,
    },

    #[error("unknown verb %{verb}")]
    UnknownVerb { verb: char },

    #[error("{count} unused argument(s)")]
    ExtraArguments { count: usize },

    #[error("format string ends inside a directive")]
    Truncated,

    #[error("width {width} exceeds 1000000")]
    BadWidth { width: usize },

    #[error("precision {precision} exceeds 1000000")]
    BadPrecision { precision: usize },
}

/// Largest accepted width or precision
pub const MAX_WIDTH: usize = 1_000_000;

#[derive(Debug, Default)]
struct Directive {
    minus: bool,
    plus: bool,
    space: bool,
    zero: bool,
    sharp: bool,
    width: Option<usize>,
    precision: Option<usize>,
}

/// Format `args` according to `format`
pub fn sprintf(format: &str, args: &[Value]) -> Result<String, FormatError> {
    let mut out = String::with_capacity(format.len());
    let mut chars = format.chars().peekable();
    let mut next_arg = 0;

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        let mut directive = Directive::default();
        while let Some(&flag) = chars.peek() {
            match flag {
                '-' => directive.minus = true,
                '+' => directive.plus = true,
                ' ' => directive.space = true,
                '0' => directive.zero = true,
                '#' => directive.sharp = true,
                _ => break,
            }
            chars.next();
        }
        directive.width = take_number(&mut chars);
        if let Some(width) = directive.width.filter(|w| *w > MAX_WIDTH) {
            return Err(FormatError::BadWidth { width });
        }
        if chars.peek() == Some(&'.') {
            chars.next();
            let precision = take_number(&mut chars).unwrap_or(0);
            if precision > MAX_WIDTH {
                return Err(FormatError::BadPrecision { precision });
            }
            directive.precision = Some(precision);
        }

        let verb = chars.next().ok_or(FormatError::Truncated)?;
        if verb == '%' {
            out.push('%');
            continue;
        }

        let arg = args.get(next_arg).ok_or(FormatError::MissingArgument {
            verb,
            index: next_arg,
        })?;
        let body = format_arg(verb, &directive, arg, next_arg)?;
        next_arg += 1;

        pad(&mut out, &body, &directive, is_numeric_verb(verb));
    }

    if next_arg < args.len() {
        return Err(FormatError::ExtraArguments {
            count: args.len() - next_arg,
        });
    }

    Ok(out)
}

/// Plain text rendering of a value, as `%v` prints it
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "<nil>".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => display_number(n),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Name of a value's JSON type, for error messages
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn take_number(chars: &mut Peekable<Chars<'_>>) -> Option<usize> {
    let mut value: Option<usize> = None;
    while let Some(digit) = chars.peek().and_then(|c| c.to_digit(10)) {
        value = Some(value.unwrap_or(0).saturating_mul(10).saturating_add(digit as usize));
        chars.next();
    }
    value
}

fn is_numeric_verb(verb: char) -> bool {
    matches!(verb, 'd' | 'f' | 'F' | 'e' | 'E' | 'g' | 'G' | 'x' | 'X')
}

fn format_arg(
    verb: char,
    directive: &Directive,
    arg: &Value,
    index: usize,
) -> Result<String, FormatError> {
    let bad = || FormatError::BadArgument {
        verb,
        actual: type_name(arg),
        index,
    };

    let body = match verb {
        'v' => match arg {
            Value::Number(n) => signed(display_number(n), directive),
            other => display_value(other),
        },
        's' => {
            let text = match arg {
                Value::String(s) => s.clone(),
                _ => return Err(bad()),
            };
            truncate(text, directive.precision)
        }
        'q' => {
            let text = arg.as_str().ok_or_else(bad)?;
            format!("{text:?}")
        }
        't' => arg.as_bool().ok_or_else(bad)?.to_string(),
        'd' => {
            let n = arg.as_number().and_then(as_integer).ok_or_else(bad)?;
            signed(n.to_string(), directive)
        }
        'f' | 'F' => {
            let f = arg.as_f64().ok_or_else(bad)?;
            signed(format!("{:.*}", directive.precision.unwrap_or(6), f), directive)
        }
        'e' | 'E' => {
            let f = arg.as_f64().ok_or_else(bad)?;
            let text = exponent(f, directive.precision.unwrap_or(6));
            signed(if verb == 'E' { text.to_uppercase() } else { text }, directive)
        }
        'g' | 'G' => {
            let n = arg.as_number().ok_or_else(bad)?;
            signed(display_number(n), directive)
        }
        'x' | 'X' => {
            let text: String = match arg {
                Value::String(s) => s.bytes().map(|b| format!("{b:02x}")).collect(),
                Value::Number(n) => {
                    let i = as_integer(n).ok_or_else(bad)?;
                    let digits = format!("{:x}", i.unsigned_abs());
                    if i < 0 {
                        format!("-{digits}")
                    } else {
                        digits
                    }
                }
                _ => return Err(bad()),
            };
            let text = if directive.sharp {
                match text.strip_prefix('-') {
                    Some(rest) => format!("-0x{rest}"),
                    None => format!("0x{text}"),
                }
            } else {
                text
            };
            if verb == 'X' {
                text.to_uppercase()
            } else {
                text
            }
        }
        other => return Err(FormatError::UnknownVerb { verb: other }),
    };

    Ok(body)
}

fn display_number(n: &Number) -> String {
    match as_integer(n) {
        Some(i) => i.to_string(),
        None => n.as_f64().map(|f| f.to_string()).unwrap_or_else(|| n.to_string()),
    }
}

/// Integral value of a number, including floats without a fractional part
fn as_integer(n: &Number) -> Option<i128> {
    if let Some(i) = n.as_i64() {
        return Some(i128::from(i));
    }
    if let Some(u) = n.as_u64() {
        return Some(i128::from(u));
    }
    let f = n.as_f64()?;
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e21 {
        Some(f as i128)
    } else {
        None
    }
}

fn exponent(f: f64, precision: usize) -> String {
    let text = format!("{f:.precision$e}");
    match text.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exp),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => text,
    }
}

fn signed(text: String, directive: &Directive) -> String {
    if text.starts_with('-') {
        text
    } else if directive.plus {
        format!("+{text}")
    } else if directive.space {
        format!(" {text}")
    } else {
        text
    }
}

fn truncate(text: String, precision: Option<usize>) -> String {
    match precision {
        Some(p) => text.chars().take(p).collect(),
        None => text,
    }
}

fn pad(out: &mut String, body: &str, directive: &Directive, numeric: bool) {
    let len = body.chars().count();
    let fill = directive.width.unwrap_or(0).saturating_sub(len);

    if fill == 0 {
        out.push_str(body);
    } else if directive.minus {
        out.push_str(body);
        out.extend(std::iter::repeat(' ').take(fill));
    } else if directive.zero && numeric {
        let split = if body.starts_with(['+', '-', ' ']) { 1 } else { 0 };
        let (sign, digits) = body.split_at(split);
        out.push_str(sign);
        out.extend(std::iter::repeat('0').take(fill));
        out.push_str(digits);
    } else {
        out.extend(std::iter::repeat(' ').take(fill));
        out.push_str(body);
    }
}
