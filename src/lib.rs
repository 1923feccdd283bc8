//! Comment stripping for the JSON files a now-playing skin keeps its settings
//! and themes in, plus the loading, config and hot-reload pieces around it.

pub mod config;
pub mod document;
pub mod error;
pub mod logging;
pub mod strip;
pub mod watch;

pub use document::{
    decode_document, load_document, parse_json_logged, parse_json_or_null, parse_jsonc,
    sanitize_json_string, LoadedDocument,
};
pub use error::StripError;
pub use strip::{
    is_escaped, strip, strip_bytes, strip_bytes_with_report, strip_value, strip_with_report,
    CommentKind, StripOptions, StripReport,
};
