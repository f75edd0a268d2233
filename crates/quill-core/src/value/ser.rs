//! [`Value`] to text.

use core::fmt::{self, Write as _};

use super::Value;

const INDENT: usize = 4;

/// Renders a value tree in compact form.
///
/// Strings are written between double quotes as-is; no escaping is applied,
/// matching the parser, which interprets none.
#[must_use]
pub fn stringify(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => write_number(out, *n),
        Value::String(s) => {
            out.push('"');
            out.push_str(s);
            out.push('"');
        }
        Value::Array(items) => {
            out.push('[');
            for item in items {
                write_value(out, item);
                out.push(',');
            }
            close(out, ']');
        }
        Value::Object(map) => {
            out.push('{');
            for (key, item) in map.iter() {
                out.push('"');
                out.push_str(key);
                out.push_str("\":");
                write_value(out, item);
                out.push(',');
            }
            close(out, '}');
        }
    }
}

/// Overwrites the trailing separator with `closer`, or appends it when the
/// container was empty.
fn close(out: &mut String, closer: char) {
    if out.ends_with(',') {
        out.pop();
    }
    out.push(closer);
}

fn write_number(out: &mut String, n: f64) {
    if n.is_finite() {
        // Display for f64 never uses exponent notation, which the parser
        // would not read back as a number.
        let _ = write!(out, "{n}");
    } else {
        out.push_str("null");
    }
}

/// Indented rendering of a value tree.
///
/// Every opening bracket starts a new, deeper line, every closing bracket
/// returns to the outer level, and every comma starts a new line. Empty
/// containers render as `[]` and `{}`.
///
/// ```
/// use quill_core::value::{parse, Pretty};
///
/// let v = parse(r#"{"a":[1,2]}"#).unwrap();
/// assert_eq!(
///     Pretty(&v).to_string(),
///     "{\n    \"a\":[\n        1,\n        2\n    ]\n}"
/// );
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Pretty<'a>(pub &'a Value);

impl fmt::Display for Pretty<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = stringify(self.0);
        let mut depth = 0usize;
        let mut in_string = false;

        let mut chars = text.chars().peekable();
        while let Some(c) = chars.next() {
            if in_string {
                f.write_char(c)?;
                in_string = c != '"';
                continue;
            }
            match c {
                '"' => {
                    in_string = true;
                    f.write_char(c)?;
                }
                '{' | '[' => {
                    f.write_char(c)?;
                    let close = if c == '{' { '}' } else { ']' };
                    // Empty containers stay on one line.
                    if chars.next_if_eq(&close).is_some() {
                        f.write_char(close)?;
                        continue;
                    }
                    depth += 1;
                    new_line(f, depth)?;
                }
                '}' | ']' => {
                    depth = depth.saturating_sub(1);
                    new_line(f, depth)?;
                    f.write_char(c)?;
                }
                ',' => {
                    f.write_char(c)?;
                    new_line(f, depth)?;
                }
                _ => f.write_char(c)?,
            }
        }
        Ok(())
    }
}

fn new_line(f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
    f.write_char('\n')?;
    write!(f, "{:width$}", "", width = depth * INDENT)
}
