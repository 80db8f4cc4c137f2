//! CSV writers for tidy records, crosstab sheets and the sample aggregate file.

use crate::models::{AggregateRow, ContingencyTable, Crosstab, PercentageTable, TidyRecord, ValueType};
use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Separator between the two axis names in a sheet's corner cell.
pub const AXIS_SEPARATOR: &str = " \\ ";

/// Write tidy records with the `No, qid, Question, type, choices` header.
pub fn write_tidy<W: Write>(writer: W, records: &[TidyRecord]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    if records.is_empty() {
        csv.write_record(["No", "qid", "Question", "type", "choices"])?;
    }
    for record in records {
        csv.serialize(record)?;
    }
    csv.flush()?;
    Ok(())
}

/// Write the counts sheet: corner cell, column labels, then one line per row label.
pub fn write_counts_sheet<W: Write>(writer: W, table: &ContingencyTable) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(header_record(&table.row_axis, &table.col_axis, &table.col_labels))?;
    for (label, cells) in table.row_labels.iter().zip(&table.counts) {
        let mut record = vec![label.clone()];
        record.extend(cells.iter().map(|c| c.to_string()));
        csv.write_record(&record)?;
    }
    csv.flush()?;
    Ok(())
}

/// Write the percentages sheet with raw numeric values (not the `%` display form).
pub fn write_percentages_sheet<W: Write>(
    writer: W,
    row_axis: &str,
    col_axis: &str,
    table: &PercentageTable,
) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(header_record(row_axis, col_axis, &table.col_labels))?;
    for (label, cells) in table.row_labels.iter().zip(&table.values) {
        let mut record = vec![label.clone()];
        record.extend(cells.iter().map(|v| format!("{:.4}", v)));
        csv.write_record(&record)?;
    }
    csv.flush()?;
    Ok(())
}

fn header_record(row_axis: &str, col_axis: &str, col_labels: &[String]) -> Vec<String> {
    let mut header = vec![format!("{}{}{}", row_axis, AXIS_SEPARATOR, col_axis)];
    header.extend(col_labels.iter().cloned());
    header
}

/// Write both sheets as `<stem>_counts.csv` and `<stem>_percentages.csv` under `dir`.
pub fn write_workbook(dir: &Path, stem: &str, crosstab: &Crosstab) -> Result<(PathBuf, PathBuf)> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let counts_path = dir.join(format!("{}_counts.csv", stem));
    let file = std::fs::File::create(&counts_path)
        .with_context(|| format!("Failed to create {}", counts_path.display()))?;
    write_counts_sheet(file, &crosstab.counts)?;

    let pct_path = dir.join(format!("{}_percentages.csv", stem));
    let file = std::fs::File::create(&pct_path)
        .with_context(|| format!("Failed to create {}", pct_path.display()))?;
    write_percentages_sheet(
        file,
        &crosstab.counts.row_axis,
        &crosstab.counts.col_axis,
        &crosstab.percentages,
    )?;

    info!(
        "Wrote {} and {}",
        counts_path.display(),
        pct_path.display()
    );
    Ok((counts_path, pct_path))
}

/// Write aggregate rows with the standard 8-column header.
pub fn write_aggregate_rows<W: Write>(writer: W, rows: &[AggregateRow]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for row in rows {
        csv.serialize(row)?;
    }
    csv.flush()?;
    Ok(())
}

/// A small aggregate data set showing the expected file layout.
pub fn sample_aggregate_rows() -> Vec<AggregateRow> {
    let q1 = "Overall satisfaction with the service";
    let q2 = "Features used often";
    let rows: [(&str, &str, &str, &str, &str, &str, u32); 11] = [
        ("Q1", q1, "Overall", "Overall", "Satisfied", "Single", 400),
        ("Q1", q1, "Overall", "Overall", "Unsatisfied", "Single", 100),
        ("Q1", q1, "Gender", "Male", "Satisfied", "Single", 250),
        ("Q1", q1, "Gender", "Female", "Satisfied", "Single", 150),
        ("Q1", q1, "Gender", "Male", "Unsatisfied", "Single", 40),
        ("Q1", q1, "Gender", "Female", "Unsatisfied", "Single", 60),
        ("Q2", q2, "Overall", "Overall", "Feature A", "Multiple", 300),
        ("Q2", q2, "Overall", "Overall", "Feature B", "Multiple", 200),
        ("Q2", q2, "Overall", "Overall", "Feature C", "Multiple", 450),
        ("Q2", q2, "Gender", "Male", "Feature A", "Multiple", 200),
        ("Q2", q2, "Gender", "Female", "Feature C", "Multiple", 200),
    ];

    rows.iter()
        .map(
            |(qid, text, attribute, category, choice, answer_type, value)| AggregateRow {
                question_id: qid.to_string(),
                question_text: text.to_string(),
                answer_type: answer_type.to_string(),
                attribute: attribute.to_string(),
                category: category.to_string(),
                choice: choice.to_string(),
                value_type: ValueType::Count,
                value: value.to_string(),
            },
        )
        .collect()
}
