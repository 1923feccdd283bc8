use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, error};

use crate::error::StripError;
use crate::strip::{strip, strip_with_report, text_from_bytes, CommentKind, StripOptions};

const BYTE_ORDER_MARK: char = '\u{feff}';

#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub path: PathBuf,
    pub value: Value,
    pub comments: usize,
    pub warnings: Vec<String>,
}

pub fn load_document(path: &Path) -> Result<LoadedDocument> {
    let bytes = fs::read(path)
        .with_context(|| format!("Failed to read document: {}", path.display()))?;
    let text = decode_document(&bytes)
        .with_context(|| format!("Document is not UTF-8 text: {}", path.display()))?;

    // Blank rather than drop, so parse errors point at the original line.
    let report = strip_with_report(text, StripOptions::preserving_whitespace());

    let mut warnings = Vec::new();
    // A trailing line comment without a newline is normal; a block is not.
    if report.unterminated == Some(CommentKind::Block) {
        warnings.push(format!(
            "{} ends inside an unterminated block comment",
            path.display()
        ));
    }

    let value = serde_json::from_str(&report.text)
        .with_context(|| format!("Failed to parse document: {}", path.display()))?;

    debug!(
        path = %path.display(),
        comments = report.comments,
        "Loaded document"
    );

    Ok(LoadedDocument {
        path: path.to_path_buf(),
        value,
        comments: report.comments,
        warnings,
    })
}

/// Checks that `bytes` are UTF-8 text and drops a leading byte order mark,
/// which files saved by the player often carry and JSON parsers reject.
pub fn decode_document(bytes: &[u8]) -> Result<&str, StripError> {
    let text = text_from_bytes(bytes)?;
    Ok(text.strip_prefix(BYTE_ORDER_MARK).unwrap_or(text))
}

/// Strips comments and deserializes. Line and column numbers in the error
/// refer to `text` as given.
pub fn parse_jsonc<T: DeserializeOwned>(text: &str) -> Result<T> {
    let stripped = strip(text, StripOptions::preserving_whitespace());
    serde_json::from_str(&stripped).context("Failed to parse JSON")
}

pub fn parse_json_or_null(text: &str) -> Option<Value> {
    parse_jsonc(text).ok()
}

/// Parses `json`, logging it under `label` when `log` is set. Falls back to an
/// empty array when the text does not parse.
pub fn parse_json_logged(json: &str, label: &str, log: bool) -> Value {
    if log {
        debug!(label, json, "Parsing JSON");
    }
    match parse_jsonc(json) {
        Ok(value) => value,
        Err(err) => {
            error!(label, json, error = %format!("{err:#}"), "Failed to parse JSON");
            Value::Array(Vec::new())
        }
    }
}

/// Makes `text` safe to embed as a value in a JSON config: quotes and
/// backslashes are dropped and line breaks become spaces.
pub fn sanitize_json_string(text: &str) -> String {
    let cleaned: String = text
        .replace("\r\n", " ")
        .chars()
        .filter(|c| !matches!(c, '"' | '\\'))
        .map(|c| if matches!(c, '\n' | '\r') { ' ' } else { c })
        .collect();
    cleaned.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Panel {
        name: String,
        width: u32,
    }

    #[test]
    fn parse_jsonc_deserializes_commented_text() {
        let text = "{\n  // panel name\n  \"name\": \"art\", /* px */ \"width\": 320\n}";
        let panel: Panel = parse_jsonc(text).unwrap();
        assert_eq!(
            panel,
            Panel {
                name: "art".into(),
                width: 320
            }
        );
    }

    #[test]
    fn parse_errors_keep_original_line_numbers() {
        let text = "/* header\n   spans lines */\n{\n  \"name\": oops\n}";
        let err = parse_jsonc::<Value>(text).unwrap_err();
        assert!(format!("{err:#}").contains("line 4"), "{err:#}");
    }

    #[test]
    fn parse_json_or_null_swallows_errors() {
        assert_eq!(parse_json_or_null("[1, 2] // two"), Some(serde_json::json!([1, 2])));
        assert_eq!(parse_json_or_null("{not json"), None);
    }

    #[test]
    fn parse_json_logged_falls_back_to_empty_array() {
        assert_eq!(
            parse_json_logged("{\"a\": true}", "flags: ", true),
            serde_json::json!({"a": true})
        );
        assert_eq!(parse_json_logged("{", "broken: ", false), serde_json::json!([]));
    }

    #[test]
    fn sanitize_removes_quotes_and_line_breaks() {
        assert_eq!(sanitize_json_string("  say \"hi\"\r\nback\\slash\rend\n"), "say hi backslash end");
        assert_eq!(sanitize_json_string(""), "");
    }

    #[test]
    fn load_document_reports_unterminated_block() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("theme.jsonc");
        fs::write(&path, "{\"accent\": \"#ff0000\"} /* trailing").unwrap();

        let loaded = load_document(&path).unwrap();
        assert_eq!(loaded.value, serde_json::json!({"accent": "#ff0000"}));
        assert_eq!(loaded.comments, 1);
        assert_eq!(loaded.warnings.len(), 1);
        assert!(loaded.warnings[0].contains("unterminated block comment"));
    }

    #[test]
    fn load_document_skips_byte_order_mark() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "\u{feff}// saved by the player\n{\"volume\": 40}").unwrap();

        let loaded = load_document(&path).unwrap();
        assert_eq!(loaded.value["volume"], 40);
        assert!(loaded.warnings.is_empty());
    }

    #[test]
    fn decode_document_drops_only_the_leading_mark() {
        assert_eq!(decode_document("\u{feff}{}".as_bytes()).unwrap(), "{}");
        assert_eq!(decode_document("[\"\u{feff}\"]".as_bytes()).unwrap(), "[\"\u{feff}\"]");
        assert!(decode_document(&[0xc3, 0x28]).is_err());
    }

    #[test]
    fn load_document_rejects_non_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, [b'{', 0xfe, b'}']).unwrap();

        let err = load_document(&path).unwrap_err();
        assert!(format!("{err:#}").contains("not UTF-8"));
    }

    #[test]
    fn load_document_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_document(&dir.path().join("nope.json")).is_err());
    }
}
