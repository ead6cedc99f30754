//! Decode raw object bytes into structured content.
//!
//! The decoder is chosen from the lowercase suffix of the object key (the
//! text after the last `.`). The suffix is authoritative: no content
//! sniffing, no fallback to plain text.
//!
//! - `csv`: header row plus records, one column map per record
//! - `json`: a single JSON value of any shape
//! - `jsonl`: one JSON value per non-empty line
//! - `txt`, `md`: UTF-8 text, verbatim
//! - `pdf`: extracted text, one string per page

mod formats;
mod pdf;

use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// One CSV record, columns in header order.
pub type Row = Map<String, Value>;

/// Closed set of formats the parser understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Csv,
    Json,
    JsonLines,
    Text,
    Markdown,
    Pdf,
}

impl Format {
    /// Resolve the format from an object key.
    pub fn from_key(key: &str) -> Result<Self, ParseError> {
        let suffix = suffix_of(key);
        match suffix.as_str() {
            "csv" => Ok(Format::Csv),
            "json" => Ok(Format::Json),
            "jsonl" => Ok(Format::JsonLines),
            "txt" => Ok(Format::Text),
            "md" => Ok(Format::Markdown),
            "pdf" => Ok(Format::Pdf),
            _ => Err(ParseError::UnsupportedFormat { suffix }),
        }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            Format::Csv => "csv",
            Format::Json => "json",
            Format::JsonLines => "jsonl",
            Format::Text => "txt",
            Format::Markdown => "md",
            Format::Pdf => "pdf",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Structured result of a parse.
///
/// Serializes untagged, so the wire shape is the decoded data itself
/// (array of row objects, any JSON value, array of values, a string, or an
/// array of page strings).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParsedContent {
    Rows(Vec<Row>),
    Json(Value),
    JsonLines(Vec<Value>),
    Text(String),
    Pages(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unsupported file type: {suffix}")]
    UnsupportedFormat { suffix: String },

    #[error("malformed {format} content: {message}")]
    Malformed { format: Format, message: String },
}

impl ParseError {
    pub(crate) fn malformed(format: Format, message: impl fmt::Display) -> Self {
        ParseError::Malformed {
            format,
            message: message.to_string(),
        }
    }
}

/// Lowercased text after the last `.` of `key`, or the whole key when it
/// has no dot.
pub fn suffix_of(key: &str) -> String {
    key.rsplit('.').next().unwrap_or(key).to_lowercase()
}

/// Parse `bytes` according to the suffix of `key`.
pub fn parse(bytes: &[u8], key: &str) -> Result<ParsedContent, ParseError> {
    let format = Format::from_key(key)?;
    parse_as(bytes, format)
}

/// Parse `bytes` with an already resolved format.
pub fn parse_as(bytes: &[u8], format: Format) -> Result<ParsedContent, ParseError> {
    match format {
        Format::Csv => formats::parse_csv(bytes).map(ParsedContent::Rows),
        Format::Json => formats::parse_json(bytes).map(ParsedContent::Json),
        Format::JsonLines => formats::parse_jsonl(bytes).map(ParsedContent::JsonLines),
        Format::Text | Format::Markdown => formats::parse_text(bytes, format).map(ParsedContent::Text),
        Format::Pdf => pdf::parse_pdf(bytes).map(ParsedContent::Pages),
    }
}
