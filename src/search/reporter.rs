//! Turns pipeline failures into error rows for meta-column indexes.

use log::error;

use crate::error::{Result, RowlensError};
use crate::index::IndexRef;
use crate::schema::TableSchema;
use crate::search::ResultRow;
use crate::search::meta::make_synthetic_row;

/// Escape text for embedding in an ECMAScript string literal.
///
/// Quotes, apostrophes, backslashes and slashes get a backslash; control
/// characters use their short escapes where one exists; everything outside
/// printable ASCII becomes `\uXXXX`, with characters beyond the BMP written
/// as a surrogate pair.
pub fn escape_ecma_script(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '/' => out.push_str("\\/"),
            '\u{8}' => out.push_str("\\b"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\u{c}' => out.push_str("\\f"),
            '\r' => out.push_str("\\r"),
            ' '..='\u{7f}' => out.push(c),
            _ => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    out.push_str(&format!("\\u{unit:04X}"));
                }
            }
        }
    }
    out
}

/// The payload `{"error":"<escaped message>"}`.
pub fn error_payload(message: &str) -> Vec<u8> {
    format!("{{\"error\":\"{}\"}}", escape_ecma_script(message)).into_bytes()
}

/// Decide what a failed search returns.
///
/// Without a meta column the error goes back to the caller. With one, the
/// error is logged and reported as a single synthetic row, or as no rows
/// when the table cannot carry it.
pub fn report_error(
    err: RowlensError,
    meta_column: bool,
    schema: &TableSchema,
    index: &IndexRef,
) -> Result<Vec<ResultRow>> {
    if !meta_column {
        return Err(err);
    }
    error!("search on index {} failed: {err}", index.name);
    let rows = make_synthetic_row(schema, index, error_payload(&err.to_string()))
        .map(ResultRow::Synthetic)
        .into_iter()
        .collect();
    Ok(rows)
}
