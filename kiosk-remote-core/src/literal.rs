//! # Source Literal Parsing
//!
//! The host configuration file and widget sources are script files, not JSON.
//! This module reads the object literals embedded in them into
//! [`serde_json::Value`] trees.
//!
//! ## Accepted Syntax
//!
//! * Line (`// ...`) and block (`/* ... */`) comments
//! * Single or double quoted strings with the usual escapes
//! * Unquoted identifier keys and trailing commas
//! * `undefined` (read as `null`)
//!
//! ## Lenient Mode
//!
//! Widget option defaults frequently contain expressions such as
//! `10 * 60 * 1000` or function calls. In lenient mode an entry whose value
//! is not a plain literal is skipped instead of failing the whole object.

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag, take_until, take_while, take_while1},
    character::complete::{char, digit0, digit1, multispace1, not_line_ending, one_of},
    combinator::{map, not, opt, peek, recognize, value},
    error::{VerboseError, VerboseErrorKind, context},
    multi::many0,
    sequence::{delimited, pair, preceded, terminated, tuple},
};
use regex::Regex;
use serde_json::{Map, Number, Value};
use std::sync::LazyLock;
use thiserror::Error;

type ParseResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LiteralError {
    #[error("no `config` assignment found")]
    MissingAssignment,

    #[error("syntax error at line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("expected an object literal")]
    NotAnObject,
}

static CONFIG_ASSIGNMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:var|let|const)\s+config\s*=\s*").expect("valid assignment regex"));

static REGISTER_CALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Module\.register\s*\(").expect("valid register regex"));

static DEFAULTS_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bdefaults["']?\s*:\s*\{"#).expect("valid defaults regex"));

/// Reads the `config` object assigned in a host configuration source file.
///
/// A file holding a bare object literal (for example plain JSON) is accepted
/// as well.
pub fn parse_config_source(source: &str) -> Result<Map<String, Value>, LiteralError> {
    let start = match CONFIG_ASSIGNMENT.find(source) {
        Some(found) => found.end(),
        None if source.trim_start().starts_with('{') => 0,
        None => return Err(LiteralError::MissingAssignment),
    };
    match parse_object_at(source, start, false)? {
        Value::Object(map) => Ok(map),
        _ => Err(LiteralError::NotAnObject),
    }
}

/// Parses a single literal value, strictly.
pub fn parse_literal(input: &str) -> Result<Value, LiteralError> {
    match terminated(|i| literal(i, false), blank)(input) {
        Ok(("", value)) => Ok(value),
        Ok((rest, _)) => Err(LiteralError::Syntax {
            line: line_of(input, input.len() - rest.len()),
            message: "unexpected trailing input".to_string(),
        }),
        Err(err) => Err(to_literal_error(input, err)),
    }
}

/// Extracts the option defaults a widget declares in its registration call.
///
/// Returns `None` when the source registers no widget or declares no
/// defaults. Entries whose value is an expression rather than a literal are
/// dropped.
pub fn extract_module_defaults(source: &str) -> Option<Map<String, Value>> {
    let register = REGISTER_CALL.find(source)?;
    let key = DEFAULTS_KEY.find_at(source, register.end())?;
    // the match ends just after `{`
    match parse_object_at(source, key.end() - 1, true) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn parse_object_at(source: &str, offset: usize, lenient: bool) -> Result<Value, LiteralError> {
    let input = &source[offset..];
    match preceded(blank, |i| object(i, lenient))(input) {
        Ok((_, value)) => Ok(value),
        Err(err) => Err(to_literal_error(source, err)),
    }
}

fn to_literal_error(source: &str, err: nom::Err<VerboseError<&str>>) -> LiteralError {
    match err {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let (rest, kind) = e
                .errors
                .first()
                .cloned()
                .unwrap_or((source, VerboseErrorKind::Context("literal")));
            let offset = source.len().saturating_sub(rest.len());
            let message = match e.errors.iter().find_map(|(_, k)| match k {
                VerboseErrorKind::Context(ctx) => Some(*ctx),
                _ => None,
            }) {
                Some(ctx) => format!("invalid {}", ctx),
                None => format!("{:?}", kind),
            };
            LiteralError::Syntax {
                line: line_of(source, offset),
                message,
            }
        }
        nom::Err::Incomplete(_) => LiteralError::Syntax {
            line: line_of(source, source.len()),
            message: "unexpected end of input".to_string(),
        },
    }
}

fn line_of(source: &str, offset: usize) -> usize {
    source[..offset.min(source.len())].matches('\n').count() + 1
}

fn fail<'a, T>(input: &'a str, ctx: &'static str) -> ParseResult<'a, T> {
    Err(nom::Err::Error(VerboseError {
        errors: vec![(input, VerboseErrorKind::Context(ctx))],
    }))
}

/// Whitespace and comments.
fn blank(input: &str) -> ParseResult<&str> {
    recognize(many0(alt((
        multispace1,
        preceded(tag("//"), not_line_ending),
        delimited(tag("/*"), take_until("*/"), tag("*/")),
    ))))(input)
}

fn literal(input: &str, lenient: bool) -> ParseResult<Value> {
    context(
        "literal",
        alt((
            |i| object(i, lenient),
            |i| array(i, lenient),
            map(quoted_string, Value::String),
            number,
            keyword,
        )),
    )(input)
}

fn object(input: &str, lenient: bool) -> ParseResult<Value> {
    let (mut rest, _) = context("object", char('{'))(input)?;
    let mut entries = Map::new();
    loop {
        let (i, _) = blank(rest)?;
        if let Ok((i, _)) = char::<_, VerboseError<&str>>('}')(i) {
            return Ok((i, Value::Object(entries)));
        }
        let (i, key) = context("object key", key)(i)?;
        let (i, _) = context("colon", preceded(blank, char(':')))(i)?;
        let (i, _) = blank(i)?;
        let (i, entry) = entry_value(i, lenient)?;
        if let Some(v) = entry {
            entries.insert(key, v);
        }
        let (i, _) = blank(i)?;
        match char::<_, VerboseError<&str>>(',')(i) {
            Ok((i, _)) => rest = i,
            Err(_) => {
                let (i, _) = context("closing brace", char('}'))(i)?;
                return Ok((i, Value::Object(entries)));
            }
        }
    }
}

fn array(input: &str, lenient: bool) -> ParseResult<Value> {
    let (mut rest, _) = context("array", char('['))(input)?;
    let mut items = Vec::new();
    loop {
        let (i, _) = blank(rest)?;
        if let Ok((i, _)) = char::<_, VerboseError<&str>>(']')(i) {
            return Ok((i, Value::Array(items)));
        }
        let (i, item) = entry_value(i, lenient)?;
        if let Some(v) = item {
            items.push(v);
        }
        let (i, _) = blank(i)?;
        match char::<_, VerboseError<&str>>(',')(i) {
            Ok((i, _)) => rest = i,
            Err(_) => {
                let (i, _) = context("closing bracket", char(']'))(i)?;
                return Ok((i, Value::Array(items)));
            }
        }
    }
}

/// A value inside an object or array. In lenient mode a value that is not
/// directly followed by a separator is treated as an expression and skipped.
fn entry_value(input: &str, lenient: bool) -> ParseResult<Option<Value>> {
    if !lenient {
        return map(|i| literal(i, false), Some)(input);
    }
    if let Ok((rest, v)) = literal(input, true) {
        if peek(preceded(blank, one_of::<_, _, VerboseError<&str>>(",}]")))(rest).is_ok() {
            return Ok((rest, Some(v)));
        }
    }
    map(skip_expression, |_| None)(input)
}

fn key(input: &str) -> ParseResult<String> {
    alt((
        quoted_string,
        map(identifier, str::to_string),
        map(recognize(digit1), str::to_string),
    ))(input)
}

fn identifier(input: &str) -> ParseResult<&str> {
    recognize(pair(
        take_while1(|c: char| c.is_ascii_alphabetic() || c == '_' || c == '$'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '$'),
    ))(input)
}

fn keyword(input: &str) -> ParseResult<Value> {
    terminated(
        alt((
            value(Value::Bool(true), tag("true")),
            value(Value::Bool(false), tag("false")),
            value(Value::Null, tag("null")),
            value(Value::Null, tag("undefined")),
        )),
        not(take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_')),
    )(input)
}

fn number(input: &str) -> ParseResult<Value> {
    let (rest, text) = context(
        "number",
        recognize(tuple((
            opt(one_of("+-")),
            digit1,
            opt(pair(char('.'), digit0)),
            opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
        ))),
    )(input)?;
    let text = text.trim_start_matches('+');
    if let Ok(int) = text.parse::<i64>() {
        return Ok((rest, Value::Number(int.into())));
    }
    match text.parse::<f64>().ok().and_then(Number::from_f64) {
        Some(n) => Ok((rest, Value::Number(n))),
        None => fail(input, "number"),
    }
}

fn quoted_string(input: &str) -> ParseResult<String> {
    let mut chars = input.char_indices();
    let quote = match chars.next() {
        Some((_, q @ ('"' | '\''))) => q,
        _ => return fail(input, "string"),
    };
    let mut out = String::new();
    while let Some((idx, c)) = chars.next() {
        match c {
            c if c == quote => return Ok((&input[idx + c.len_utf8()..], out)),
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, 'r')) => out.push('\r'),
                Some((_, 'b')) => out.push('\u{8}'),
                Some((_, 'f')) => out.push('\u{c}'),
                Some((_, 'u')) => {
                    let hex: String = chars.by_ref().take(4).map(|(_, c)| c).collect();
                    match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                        Some(ch) => out.push(ch),
                        None => return fail(input, "unicode escape"),
                    }
                }
                Some((_, other)) => out.push(other),
                None => break,
            },
            '\n' => break,
            c => out.push(c),
        }
    }
    fail(input, "string")
}

/// Skips an arbitrary expression up to the next `,`, `}` or `]` at depth zero.
fn skip_expression(input: &str) -> ParseResult<&str> {
    let bytes = input.as_bytes();
    let mut depth = 0usize;
    let mut idx = 0;
    while idx < bytes.len() {
        match bytes[idx] {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' if depth > 0 => depth -= 1,
            b',' | b'}' | b']' if depth == 0 => break,
            q @ (b'"' | b'\'' | b'`') => {
                idx += 1;
                while idx < bytes.len() && bytes[idx] != q {
                    if bytes[idx] == b'\\' {
                        idx += 1;
                    }
                    idx += 1;
                }
            }
            b'/' if bytes.get(idx + 1) == Some(&b'/') => {
                while idx < bytes.len() && bytes[idx] != b'\n' {
                    idx += 1;
                }
                continue;
            }
            b'/' if bytes.get(idx + 1) == Some(&b'*') => {
                match input[idx + 2..].find("*/") {
                    Some(end) => idx += end + 4,
                    None => idx = bytes.len(),
                }
                continue;
            }
            _ => {}
        }
        idx += 1;
    }
    if idx == 0 {
        return fail(input, "expression");
    }
    let end = idx.min(bytes.len());
    Ok((&input[end..], &input[..end]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_parse_host_config_source() {
        let source = r#"/* Display config
 * generated
 */
var config = {
	address: "localhost", // listen address
	port: 8080,
	ipWhitelist: ["127.0.0.1", '::1',],
	language: 'en',
	zoom: 1.5,
	electronOptions: {},
	modules: [
		{
			module: "clock",
			position: "top_left",
			config: { displaySeconds: false, timezone: undefined }
		},
	],
};

/*************** DO NOT EDIT THE LINE BELOW ***************/
if (typeof module !== "undefined") {module.exports = config;}
"#;
        let config = parse_config_source(source).unwrap();
        assert_eq!(
            Value::Object(config),
            json!({
                "address": "localhost",
                "port": 8080,
                "ipWhitelist": ["127.0.0.1", "::1"],
                "language": "en",
                "zoom": 1.5,
                "electronOptions": {},
                "modules": [{
                    "module": "clock",
                    "position": "top_left",
                    "config": { "displaySeconds": false, "timezone": null }
                }]
            })
        );
    }

    #[test]
    fn test_plain_json_object_is_accepted() {
        let config = parse_config_source(r#"{"port": 8080, "modules": []}"#).unwrap();
        assert_eq!(config.get("port"), Some(&json!(8080)));
    }

    #[test]
    fn test_missing_assignment() {
        assert_eq!(
            parse_config_source("module.exports = 1;"),
            Err(LiteralError::MissingAssignment)
        );
    }

    #[test]
    fn test_syntax_error_reports_line() {
        let source = "var config = {\n  port: 8080\n  language: 'en'\n};";
        match parse_config_source(source) {
            Err(LiteralError::Syntax { line, .. }) => assert_eq!(line, 3),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            parse_literal(r#"'it\'s A "quoted"\n'"#).unwrap(),
            json!("it's A \"quoted\"\n")
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(parse_literal("-12").unwrap(), json!(-12));
        assert_eq!(parse_literal("2.5e3").unwrap(), json!(2500.0));
        assert!(parse_literal("0x10").is_err());
    }

    #[test]
    fn test_keywords_need_boundaries() {
        assert_eq!(parse_literal("true").unwrap(), json!(true));
        assert!(parse_literal("trueish").is_err());
    }

    #[test]
    fn test_extract_module_defaults_skips_expressions() {
        let source = r#"
Module.register("MMM-Example", {
	defaults: {
		updateInterval: 10 * 60 * 1000,
		title: "Example",
		showIcons: true,
		colors: ["red", "blue"],
		formatter: function (v) { return v + ","; },
		nested: { depth: 2 },
	},

	start: function () {
		this.loaded = false;
	},
});
"#;
        let defaults = extract_module_defaults(source).unwrap();
        assert_eq!(
            Value::Object(defaults),
            json!({
                "title": "Example",
                "showIcons": true,
                "colors": ["red", "blue"],
                "nested": { "depth": 2 }
            })
        );
    }

    #[test]
    fn test_extract_module_defaults_without_registration() {
        assert!(extract_module_defaults("const defaults = { a: 1 };").is_none());
        assert!(extract_module_defaults("Module.register('x', { start() {} });").is_none());
    }
}
