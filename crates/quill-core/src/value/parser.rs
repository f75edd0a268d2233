//! Text to [`Value`] parsing.
//!
//! The grammar is JSON-like with a few intentional differences:
//!
//! - no escape sequences: a string runs from one `"` to the next;
//! - no exponent notation: `1e5` is read as the string `1e5`;
//! - bare tokens that are not literals or numbers become strings;
//! - inside arrays, empty elements and `null` elements are dropped, while
//!   `null` object values are kept.
//!
//! Parsing is two-phase. A single pass first pairs every `{`/`[` with its
//! closer, then the tree is built recursively using those precomputed bounds
//! so nested containers are never rescanned.

use std::collections::HashMap;

use thiserror::Error;

use super::{Map, Value};

/// The input does not match the value tree grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed input at byte {position}: {message}")]
pub struct ParseError {
    /// Byte offset where the problem was detected.
    pub position: usize,
    /// What went wrong.
    pub message: String,
}

impl ParseError {
    fn new(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

/// Result type for parsing.
pub type Result<T> = std::result::Result<T, ParseError>;

/// Parses `text` into a value tree.
///
/// # Errors
///
/// Returns [`ParseError`] for unbalanced brackets, unterminated strings or
/// keys, a key without `:`, a `:` without a value, and stray characters
/// between entries.
pub fn parse(text: &str) -> Result<Value> {
    let pairs = match_brackets(text)?;
    let parser = Parser {
        text,
        bytes: text.as_bytes(),
        pairs,
    };
    parser.parse_document()
}

/// Structural whitespace between tokens.
const fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\n' | b'\t' | b'\r')
}

/// Pairs each opening bracket with its closing bracket.
///
/// Brackets inside double-quoted strings are not structural and are skipped.
fn match_brackets(text: &str) -> Result<HashMap<usize, usize>> {
    let bytes = text.as_bytes();
    let mut stack: Vec<usize> = Vec::new();
    let mut pairs = HashMap::new();
    let mut in_string = false;

    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'"' => in_string = !in_string,
            _ if in_string => {}
            b'{' | b'[' => stack.push(i),
            b'}' | b']' => {
                let open = stack
                    .pop()
                    .ok_or_else(|| ParseError::new(i, "unmatched closing bracket"))?;
                let expected = if bytes[open] == b'{' { b'}' } else { b']' };
                if b != expected {
                    return Err(ParseError::new(
                        i,
                        format!(
                            "expected '{}' to close '{}' at byte {open}",
                            expected as char, bytes[open] as char
                        ),
                    ));
                }
                pairs.insert(open, i);
            }
            _ => {}
        }
    }

    match stack.pop() {
        Some(open) => Err(ParseError::new(open, "unclosed bracket")),
        None => Ok(pairs),
    }
}

struct Parser<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pairs: HashMap<usize, usize>,
}

impl Parser<'_> {
    fn parse_document(&self) -> Result<Value> {
        let len = self.bytes.len();
        let start = self.skip_space(0, len);
        if start >= len {
            return Ok(Value::Null);
        }

        let (value, close) = match self.bytes[start] {
            b'{' => {
                let close = self.closing(start)?;
                (self.parse_object(start, close)?, close)
            }
            b'[' => {
                let close = self.closing(start)?;
                (self.parse_array(start, close)?, close)
            }
            _ => return classify(self.text, 0),
        };

        let rest = self.skip_space(close + 1, len);
        if rest < len {
            return Err(ParseError::new(rest, "unexpected characters after document"));
        }
        Ok(value)
    }

    fn closing(&self, open: usize) -> Result<usize> {
        self.pairs
            .get(&open)
            .copied()
            .ok_or_else(|| ParseError::new(open, "unclosed bracket"))
    }

    fn skip_space(&self, mut i: usize, end: usize) -> usize {
        while i < end && is_space(self.bytes[i]) {
            i += 1;
        }
        i
    }

    /// Advances to the next `,` at this level or to `end`, stepping over
    /// quoted sections.
    fn scan_token(&self, mut i: usize, end: usize) -> usize {
        let mut in_string = false;
        while i < end {
            match self.bytes[i] {
                b'"' => in_string = !in_string,
                b',' if !in_string => break,
                _ => {}
            }
            i += 1;
        }
        i
    }

    /// Parses the object spanning `start..=end` (both brackets included).
    fn parse_object(&self, start: usize, end: usize) -> Result<Value> {
        let mut map = Map::new();
        let mut i = start + 1;

        loop {
            i = self.skip_space(i, end);
            if i >= end {
                break;
            }
            if self.bytes[i] != b'"' {
                return Err(ParseError::new(i, "expected a quoted key"));
            }

            let key_start = i + 1;
            i = key_start;
            while i < end && self.bytes[i] != b'"' {
                i += 1;
            }
            if i >= end {
                return Err(ParseError::new(key_start - 1, "unterminated key"));
            }
            let key = &self.text[key_start..i];
            i += 1;

            i = self.skip_space(i, end);
            if i >= end || self.bytes[i] != b':' {
                return Err(ParseError::new(i, format!("expected ':' after key \"{key}\"")));
            }
            i = self.skip_space(i + 1, end);
            if i >= end {
                return Err(ParseError::new(i, format!("expected a value after \"{key}\":")));
            }

            let value = match self.bytes[i] {
                b'{' => {
                    let close = self.closing(i)?;
                    let nested = self.parse_object(i, close)?;
                    i = close + 1;
                    nested
                }
                b'[' => {
                    let close = self.closing(i)?;
                    let nested = self.parse_array(i, close)?;
                    i = close + 1;
                    nested
                }
                _ => {
                    let token_start = i;
                    i = self.scan_token(i, end);
                    classify(&self.text[token_start..i], token_start)?
                }
            };
            map.insert(key, value);

            i = self.skip_space(i, end);
            if i < end {
                if self.bytes[i] != b',' {
                    return Err(ParseError::new(i, "expected ',' or '}'"));
                }
                i += 1;
            }
        }

        Ok(Value::Object(map))
    }

    /// Parses the array spanning `start..=end` (both brackets included).
    fn parse_array(&self, start: usize, end: usize) -> Result<Value> {
        let mut items = Vec::new();
        let mut i = start + 1;

        while i < end {
            i = self.skip_space(i, end);
            if i >= end {
                break;
            }

            match self.bytes[i] {
                // empty element
                b',' => {
                    i += 1;
                    continue;
                }
                b'{' => {
                    let close = self.closing(i)?;
                    items.push(self.parse_object(i, close)?);
                    i = close + 1;
                }
                b'[' => {
                    let close = self.closing(i)?;
                    items.push(self.parse_array(i, close)?);
                    i = close + 1;
                }
                _ => {
                    let token_start = i;
                    i = self.scan_token(i, end);
                    let value = classify(&self.text[token_start..i], token_start)?;
                    if !value.is_null() {
                        items.push(value);
                    }
                    // step over the ',' that ended the token
                    i += 1;
                    continue;
                }
            }

            i = self.skip_space(i, end);
            if i < end {
                if self.bytes[i] != b',' {
                    return Err(ParseError::new(i, "expected ',' or ']'"));
                }
                i += 1;
            }
        }

        Ok(Value::Array(items))
    }
}

/// Trims structural whitespace around a raw token.
fn trim_token(raw: &str) -> &str {
    raw.trim_matches(|c: char| u8::try_from(c).is_ok_and(is_space))
}

/// Optional sign followed by one or more digits.
fn is_integer(token: &str) -> bool {
    let digits = token.strip_prefix(['+', '-']).unwrap_or(token);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Optional sign followed by digits with at most one dot.
fn is_decimal(token: &str) -> bool {
    let digits = token.strip_prefix(['+', '-']).unwrap_or(token);
    !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit() || b == b'.')
        && digits.bytes().filter(|&b| b == b'.').count() <= 1
}

/// Turns a raw scalar token into a value.
///
/// Order: quoted string, `true`/`false`, `null`/empty, integer (float on
/// overflow), decimal, and finally the raw token as a string.
#[allow(clippy::cast_precision_loss)]
fn classify(raw: &str, position: usize) -> Result<Value> {
    let token = trim_token(raw);
    if token.is_empty() {
        return Ok(Value::Null);
    }

    if token.starts_with('"') {
        if token.len() < 2 || !token.ends_with('"') {
            return Err(ParseError::new(position, "unterminated string"));
        }
        return Ok(Value::String(token[1..token.len() - 1].to_string()));
    }

    match token {
        "true" => return Ok(Value::Bool(true)),
        "false" => return Ok(Value::Bool(false)),
        "null" => return Ok(Value::Null),
        _ => {}
    }

    if is_integer(token) {
        if let Ok(n) = token.parse::<i64>() {
            return Ok(Value::Number(n as f64));
        }
        if let Ok(n) = token.parse::<f64>() {
            return Ok(Value::Number(n));
        }
    } else if is_decimal(token) {
        if let Ok(n) = token.parse::<f64>() {
            return Ok(Value::Number(n));
        }
    }

    Ok(Value::String(token.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::stringify;

    fn num(n: f64) -> Value {
        Value::Number(n)
    }

    #[test]
    fn test_parse_flat_object() {
        let v = parse(r#"{"name": "id", "type": 0, "pk": true, "note": null}"#).unwrap();
        assert_eq!(v.get("name"), Some(&Value::from("id")));
        assert_eq!(v.get("type"), Some(&num(0.0)));
        assert_eq!(v.get("pk"), Some(&Value::Bool(true)));
        // explicit nulls are kept in objects
        assert_eq!(v.get("note"), Some(&Value::Null));
        assert_eq!(v.len(), 4);
    }

    #[test]
    fn test_parse_nested_containers() {
        let text = r#"{"a": {"b": [1, [2, 3], {"c": "d"}]}, "e": []}"#;
        let v = parse(text).unwrap();
        let inner = v.get("a").and_then(|a| a.get("b")).unwrap();
        assert_eq!(inner.len(), 3);
        assert_eq!(inner.get_index(0), Some(&num(1.0)));
        assert_eq!(inner.get_index(1).map(Value::len), Some(2));
        assert_eq!(
            inner.get_index(2).and_then(|o| o.get("c")),
            Some(&Value::from("d"))
        );
        assert_eq!(v.get("e"), Some(&Value::array()));
    }

    #[test]
    fn test_parse_deep_nesting() {
        let depth = 200;
        let text = format!("{}{}", "[".repeat(depth), "]".repeat(depth));
        let mut v = &parse(&text).unwrap();
        for _ in 1..depth {
            v = v.get_index(0).unwrap();
        }
        assert_eq!(v, &Value::array());
    }

    #[test]
    fn test_array_drops_nulls_and_empty_elements() {
        // Asymmetric with objects, where null values survive.
        let v = parse("[1, null, , 2,,null]").unwrap();
        assert_eq!(v, Value::Array(vec![num(1.0), num(2.0)]));
    }

    #[test]
    fn test_array_keeps_nested_null_in_object() {
        let v = parse(r#"[{"x": null}]"#).unwrap();
        assert_eq!(v.get_index(0).and_then(|o| o.get("x")), Some(&Value::Null));
    }

    #[test]
    fn test_scalar_classification() {
        assert_eq!(parse("[\"5\"]").unwrap(), Value::Array(vec![Value::from("5")]));
        assert_eq!(parse("[-12]").unwrap(), Value::Array(vec![num(-12.0)]));
        assert_eq!(parse("[+7]").unwrap(), Value::Array(vec![num(7.0)]));
        assert_eq!(parse("[3.25]").unwrap(), Value::Array(vec![num(3.25)]));
        assert_eq!(parse("[false]").unwrap(), Value::Array(vec![Value::Bool(false)]));
        // no exponent support: falls through to a bare string
        assert_eq!(parse("[1e5]").unwrap(), Value::Array(vec![Value::from("1e5")]));
        // two dots is not a number either
        assert_eq!(parse("[1.2.3]").unwrap(), Value::Array(vec![Value::from("1.2.3")]));
        assert_eq!(parse("[abc]").unwrap(), Value::Array(vec![Value::from("abc")]));
    }

    #[test]
    fn test_integer_overflow_falls_back_to_float() {
        let v = parse("[123456789012345678901234567890]").unwrap();
        let n = v.get_index(0).and_then(Value::as_f64).unwrap();
        assert!((n - 1.234_567_890_123_456_8e29).abs() < 1e15);
    }

    #[test]
    fn test_tabs_and_carriage_returns_are_whitespace() {
        assert_eq!(parse("{\"a\":\t1}").unwrap(), parse("{\"a\": 1\t}").unwrap());
        assert_eq!(parse("[\t1\r\n,2\t]").unwrap().len(), 2);

        let v = parse("{\r\n  \"a\": \"x\"\r\n, \"unique\": false\r\n}\r\n").unwrap();
        assert_eq!(v.get("a"), Some(&Value::from("x")));
        assert_eq!(v.get("unique"), Some(&Value::Bool(false)));
        assert_eq!(parse(" 7\t\r\n").unwrap(), num(7.0));
    }

    #[test]
    fn test_top_level_scalar() {
        assert_eq!(parse("  42\n").unwrap(), num(42.0));
        assert_eq!(parse("\"hi\"").unwrap(), Value::from("hi"));
        assert_eq!(parse("").unwrap(), Value::Null);
    }

    #[test]
    fn test_strings_may_contain_structural_characters() {
        let v = parse(r#"{"sql": "CREATE TABLE t (a, b) [x] {y}"}"#).unwrap();
        assert_eq!(
            v.get("sql").and_then(Value::as_str),
            Some("CREATE TABLE t (a, b) [x] {y}")
        );
    }

    #[test]
    fn test_no_escape_processing() {
        let v = parse(r#"["a\nb"]"#).unwrap();
        assert_eq!(v.get_index(0).and_then(Value::as_str), Some(r"a\nb"));
    }

    #[test]
    fn test_unterminated_string_is_error() {
        let err = parse(r#"{"a": "oops}"#).unwrap_err();
        assert!(err.message.contains("unclosed") || err.message.contains("unterminated"));

        let err = parse(r#"["oops]"#).unwrap_err();
        assert!(err.message.contains("unclosed"));

        let err = parse("\"abc").unwrap_err();
        assert_eq!(err.message, "unterminated string");
    }

    #[test]
    fn test_unterminated_key_is_error() {
        let err = parse(r#"{"abc}"#).unwrap_err();
        assert!(err.message.contains("unclosed") || err.message.contains("unterminated"));
    }

    #[test]
    fn test_missing_colon_is_error() {
        let err = parse(r#"{"a" 1}"#).unwrap_err();
        assert!(err.message.starts_with("expected ':'"), "{err}");
    }

    #[test]
    fn test_missing_value_is_error() {
        let err = parse(r#"{"a": }"#).unwrap_err();
        assert!(err.message.starts_with("expected a value"), "{err}");
    }

    #[test]
    fn test_unbalanced_brackets_are_errors() {
        assert!(parse("{").is_err());
        assert!(parse("]").is_err());
        assert!(parse("[}").is_err());
        assert!(parse("[] x").is_err());
    }

    #[test]
    fn test_round_trip() {
        let mut inner = Map::new();
        inner.insert("flag", false);
        inner.insert("none", Value::Null);
        inner.insert("list", vec![Value::from(1), Value::from("two, three"), Value::array()]);

        let mut root = Map::new();
        root.insert("name", "users");
        root.insert("ratio", 0.5);
        root.insert("count", -3);
        root.insert("inner", inner);
        root.insert("empty", Value::object());
        let original = Value::Object(root);

        assert_eq!(parse(&stringify(&original)).unwrap(), original);
    }

    #[test]
    fn test_round_trip_drops_array_nulls() {
        let original = Value::Array(vec![Value::from(1), Value::Null, Value::from(2)]);
        let reparsed = parse(&stringify(&original)).unwrap();
        assert_eq!(reparsed, Value::Array(vec![Value::from(1), Value::from(2)]));
    }
}
