//! Text-based decoders: CSV, JSON, JSON lines, plain text

use crate::{Format, ParseError, Row};
use serde_json::Value;

fn decode_utf8(bytes: &[u8], format: Format) -> Result<&str, ParseError> {
    std::str::from_utf8(bytes).map_err(|e| ParseError::malformed(format, e))
}

/// Header row gives the column names; each record becomes a column map.
///
/// A record shorter than the header pads its missing columns with `null`.
/// A record longer than the header fails with [`ParseError::Malformed`]:
/// its extra fields have no column name to go under.
pub(crate) fn parse_csv(bytes: &[u8]) -> Result<Vec<Row>, ParseError> {
    let text = decode_utf8(bytes, Format::Csv)?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| ParseError::malformed(Format::Csv, e))?
        .clone();

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|e| ParseError::malformed(Format::Csv, e))?;
        if record.len() > headers.len() {
            return Err(ParseError::malformed(
                Format::Csv,
                format!(
                    "record {} has {} fields but the header has {}",
                    index + 1,
                    record.len(),
                    headers.len()
                ),
            ));
        }

        let mut row = Row::new();
        for (column, name) in headers.iter().enumerate() {
            let value = record
                .get(column)
                .map(|field| Value::String(field.to_string()))
                .unwrap_or(Value::Null);
            row.insert(name.to_string(), value);
        }
        rows.push(row);
    }

    Ok(rows)
}

pub(crate) fn parse_json(bytes: &[u8]) -> Result<Value, ParseError> {
    let text = decode_utf8(bytes, Format::Json)?;
    serde_json::from_str(text).map_err(|e| ParseError::malformed(Format::Json, e))
}

/// Blank lines are skipped; any bad line fails the whole document.
pub(crate) fn parse_jsonl(bytes: &[u8]) -> Result<Vec<Value>, ParseError> {
    let text = decode_utf8(bytes, Format::JsonLines)?;
    let mut values = Vec::new();

    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value = serde_json::from_str(line).map_err(|e| {
            ParseError::malformed(Format::JsonLines, format!("line {}: {}", index + 1, e))
        })?;
        values.push(value);
    }

    Ok(values)
}

pub(crate) fn parse_text(bytes: &[u8], format: Format) -> Result<String, ParseError> {
    decode_utf8(bytes, format).map(str::to_string)
}
