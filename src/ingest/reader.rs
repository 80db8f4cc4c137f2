//! CSV and text readers with encoding detection.

use crate::ingest::error::{InputError, InputResult};
use crate::ingest::writer::AXIS_SEPARATOR;
use crate::models::{AggregateRow, ContingencyTable, ResponseTable};
use csv::{ReaderBuilder, Trim};
use std::path::Path;
use tracing::{debug, info};

/// Columns every aggregate file must carry.
pub const REQUIRED_AGGREGATE_COLUMNS: [&str; 8] = [
    "QuestionID",
    "QuestionText",
    "AnswerType",
    "Attribute",
    "Category",
    "Choice",
    "ValueType",
    "Value",
];

/// Read a text file, accepting UTF-8 (with or without BOM) and Shift_JIS.
pub fn read_text(path: &Path) -> InputResult<String> {
    let bytes = std::fs::read(path).map_err(|source| InputError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    decode_bytes(&bytes).ok_or_else(|| InputError::UnreadableEncoding {
        path: path.to_path_buf(),
    })
}

/// Decode raw bytes, or `None` when no supported encoding reads them cleanly.
pub fn decode_bytes(bytes: &[u8]) -> Option<String> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    if let Ok(text) = std::str::from_utf8(bytes) {
        return Some(text.to_string());
    }

    let (text, had_errors) = encoding_rs::SHIFT_JIS.decode_without_bom_handling(bytes);
    if had_errors {
        None
    } else {
        debug!("Decoded input as Shift_JIS");
        Some(text.into_owned())
    }
}

/// Read the wide response file.
pub fn read_response_table(path: &Path) -> InputResult<ResponseTable> {
    info!("Reading response data from {}", path.display());
    let content = read_text(path)?;
    parse_response_table(&content, &path.display().to_string())
}

/// Parse wide response CSV content. Short rows are padded with empty cells.
pub fn parse_response_table(content: &str, source_name: &str) -> InputResult<ResponseTable> {
    let csv_err = |source| InputError::Csv {
        source_name: source_name.to_string(),
        source,
    };

    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::Headers)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(String::from)
        .collect();
    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err(InputError::NoHeader {
            source_name: source_name.to_string(),
        });
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        let mut row: Vec<String> = record.iter().map(String::from).collect();
        row.resize(headers.len().max(row.len()), String::new());
        rows.push(row);
    }

    debug!(
        "{}: {} columns, {} respondents",
        source_name,
        headers.len(),
        rows.len()
    );
    Ok(ResponseTable::new(headers, rows))
}

/// Read the pre-aggregated file, rejecting it when a required column is absent.
pub fn read_aggregate_rows(path: &Path) -> InputResult<Vec<AggregateRow>> {
    info!("Reading aggregate data from {}", path.display());
    let content = read_text(path)?;
    parse_aggregate_rows(&content, &path.display().to_string())
}

/// Parse aggregate CSV content. Column order is free and extra columns are ignored.
pub fn parse_aggregate_rows(content: &str, source_name: &str) -> InputResult<Vec<AggregateRow>> {
    let csv_err = |source| InputError::Csv {
        source_name: source_name.to_string(),
        source,
    };

    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .from_reader(content.as_bytes());

    let headers = reader.headers().map_err(csv_err)?.clone();
    let missing: Vec<String> = REQUIRED_AGGREGATE_COLUMNS
        .iter()
        .filter(|col| !headers.iter().any(|h| h == **col))
        .map(|col| col.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(InputError::MissingColumns {
            source_name: source_name.to_string(),
            missing,
        });
    }

    let rows = reader
        .deserialize::<AggregateRow>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(csv_err)?;

    debug!("{}: {} aggregate rows", source_name, rows.len());
    Ok(rows)
}

/// Read an exported counts sheet from disk.
pub fn read_counts_sheet(path: &Path) -> InputResult<ContingencyTable> {
    info!("Reading counts sheet from {}", path.display());
    let content = read_text(path)?;
    parse_counts_sheet(&content, &path.display().to_string())
}

/// Read a counts sheet written by [`crate::ingest::write_counts_sheet`] back into a table.
pub fn parse_counts_sheet(content: &str, source_name: &str) -> InputResult<ContingencyTable> {
    let csv_err = |source| InputError::Csv {
        source_name: source_name.to_string(),
        source,
    };

    let mut reader = ReaderBuilder::new().from_reader(content.as_bytes());
    let headers = reader.headers().map_err(csv_err)?.clone();
    let corner = headers.get(0).ok_or_else(|| InputError::NoHeader {
        source_name: source_name.to_string(),
    })?;
    let (row_axis, col_axis) = corner.split_once(AXIS_SEPARATOR).unwrap_or((corner, ""));

    let mut table = ContingencyTable {
        row_axis: row_axis.to_string(),
        col_axis: col_axis.to_string(),
        row_labels: Vec::new(),
        col_labels: headers.iter().skip(1).map(String::from).collect(),
        counts: Vec::new(),
    };

    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(csv_err)?;
        let mut fields = record.iter();
        table
            .row_labels
            .push(fields.next().unwrap_or_default().to_string());
        let cells = fields
            .map(|v| {
                v.trim().parse::<u64>().map_err(|_| InputError::BadCount {
                    source_name: source_name.to_string(),
                    line: idx + 2,
                    value: v.to_string(),
                })
            })
            .collect::<InputResult<Vec<u64>>>()?;
        table.counts.push(cells);
    }

    Ok(table)
}
