//! Comment removal for JSON files annotated with `//` and `/* */` comments.
//!
//! The scan is a single left-to-right pass over the input bytes. Every
//! delimiter it looks for is ASCII, so the slice boundaries it produces always
//! fall on character boundaries even when the text contains multi-byte UTF-8.

use serde::Deserialize;
use serde_json::Value;

use crate::error::StripError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StripOptions {
    /// Replace comment characters with spaces instead of dropping them, so
    /// line and column numbers of the remaining JSON stay the same.
    pub preserve_whitespace: bool,
}

impl StripOptions {
    pub fn preserving_whitespace() -> Self {
        Self {
            preserve_whitespace: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CommentKind {
    #[default]
    None,
    Line,
    Block,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StripReport {
    pub text: String,
    /// Comments removed, including an unterminated one at the end.
    pub comments: usize,
    /// Set when the input ended inside a comment.
    pub unterminated: Option<CommentKind>,
}

#[derive(Debug, Default)]
struct ScanState {
    inside_string: bool,
    comment: CommentKind,
    offset: usize,
    cursor: usize,
}

pub fn strip(input: &str, options: StripOptions) -> String {
    strip_with_report(input, options).text
}

pub fn strip_with_report(input: &str, options: StripOptions) -> StripReport {
    let bytes = input.as_bytes();
    let mut state = ScanState::default();
    let mut out = String::with_capacity(input.len());
    let mut comments = 0;

    while state.cursor < bytes.len() {
        let i = state.cursor;
        let current = bytes[i];
        let next = bytes.get(i + 1).copied();

        if state.comment == CommentKind::None && current == b'"' && !is_escaped(input, i) {
            state.inside_string = !state.inside_string;
        }

        if state.inside_string {
            state.cursor += 1;
            continue;
        }

        match (state.comment, current, next) {
            (CommentKind::None, b'/', Some(b'/')) => {
                out.push_str(&input[state.offset..i]);
                state.offset = i;
                state.comment = CommentKind::Line;
                state.cursor += 2;
            }
            (CommentKind::None, b'/', Some(b'*')) => {
                out.push_str(&input[state.offset..i]);
                state.offset = i;
                state.comment = CommentKind::Block;
                state.cursor += 2;
            }
            (CommentKind::Line, b'\n', _) | (CommentKind::Line, b'\r', Some(b'\n')) => {
                blank_into(&mut out, &input[state.offset..i], options);
                comments += 1;
                // The newline itself starts the next verbatim run.
                state.offset = i;
                state.comment = CommentKind::None;
                state.cursor += if current == b'\r' { 2 } else { 1 };
            }
            (CommentKind::Block, b'*', Some(b'/')) => {
                blank_into(&mut out, &input[state.offset..i + 2], options);
                comments += 1;
                state.offset = i + 2;
                state.comment = CommentKind::None;
                state.cursor += 2;
            }
            _ => state.cursor += 1,
        }
    }

    let tail = &input[state.offset..];
    let unterminated = match state.comment {
        CommentKind::None => {
            out.push_str(tail);
            None
        }
        kind => {
            blank_into(&mut out, tail, options);
            comments += 1;
            Some(kind)
        }
    };

    StripReport {
        text: out,
        comments,
        unterminated,
    }
}

/// Strips raw bytes, which must be UTF-8 text.
pub fn strip_bytes(input: &[u8], options: StripOptions) -> Result<String, StripError> {
    strip_bytes_with_report(input, options).map(|report| report.text)
}

pub fn strip_bytes_with_report(
    input: &[u8],
    options: StripOptions,
) -> Result<StripReport, StripError> {
    Ok(strip_with_report(text_from_bytes(input)?, options))
}

/// Strips a dynamic JSON value, which must be a string.
pub fn strip_value(value: &Value, options: StripOptions) -> Result<String, StripError> {
    match value {
        Value::String(text) => Ok(strip(text, options)),
        other => Err(StripError::not_text(json_type_name(other))),
    }
}

/// True when the quote at `quote_position` is preceded by an odd number of
/// backslashes.
pub fn is_escaped(text: &str, quote_position: usize) -> bool {
    let Some(before) = text.as_bytes().get(..quote_position) else {
        return false;
    };
    before.iter().rev().take_while(|&&b| b == b'\\').count() % 2 == 1
}

pub(crate) fn text_from_bytes(input: &[u8]) -> Result<&str, StripError> {
    std::str::from_utf8(input).map_err(|err| {
        StripError::not_text(format!(
            "bytes (invalid UTF-8 at offset {})",
            err.valid_up_to()
        ))
    })
}

fn blank_into(out: &mut String, span: &str, options: StripOptions) {
    if !options.preserve_whitespace {
        return;
    }
    out.extend(span.chars().map(|c| if is_kept_blank(c) { c } else { ' ' }));
}

// The ECMAScript whitespace set: Unicode White_Space without NEL, plus the BOM.
fn is_kept_blank(c: char) -> bool {
    match c {
        '\u{feff}' => true,
        '\u{85}' => false,
        c => c.is_whitespace(),
    }
}

// Named like `typeof`, so null and arrays report as objects.
fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Null | Value::Array(_) | Value::Object(_) => "object",
    }
}
