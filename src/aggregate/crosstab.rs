//! Two-axis contingency tables.
//!
//! Counts are tallied over resolved labels, a Total row and column are
//! appended, and each row is normalized by its own total. The Total row is
//! normalized by the grand total, so it reads as the column shares of every
//! counted respondent.

use crate::ingest::{InputError, InputResult};
use crate::labels::LabelResolver;
use crate::models::{ContingencyTable, Crosstab, PercentageTable, ResponseTable, NO_ANSWER, TOTAL_LABEL};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Stand-in for a choice whose own label is "Total".
pub const RENAMED_TOTAL: &str = "Total (answer)";

/// Options for [`crosstab`].
#[derive(Debug, Clone, Copy)]
pub struct CrosstabOptions {
    /// Count respondents whose row or column answer is missing under "No Answer".
    pub include_no_answer: bool,
}

impl Default for CrosstabOptions {
    fn default() -> Self {
        Self {
            include_no_answer: true,
        }
    }
}

/// Cross-tabulate two question columns of the response table.
pub fn crosstab(
    table: &ResponseTable,
    row_qid: &str,
    col_qid: &str,
    resolver: &LabelResolver,
    options: CrosstabOptions,
) -> InputResult<Crosstab> {
    let row_idx = column(table, row_qid)?;
    let col_idx = column(table, col_qid)?;

    let mut tally: HashMap<(String, String), u64> = HashMap::new();
    let mut seen_rows = BTreeSet::new();
    let mut seen_cols = BTreeSet::new();
    let mut skipped = 0usize;

    for row in &table.rows {
        let row_label = axis_label(resolver.resolve(row_qid, table.cell(row, row_idx)));
        let col_label = axis_label(resolver.resolve(col_qid, table.cell(row, col_idx)));

        if !options.include_no_answer && (row_label == NO_ANSWER || col_label == NO_ANSWER) {
            skipped += 1;
            continue;
        }

        seen_rows.insert(row_label.clone());
        seen_cols.insert(col_label.clone());
        *tally.entry((row_label, col_label)).or_default() += 1;
    }

    if skipped > 0 {
        debug!("{} respondents without both answers excluded", skipped);
    }

    let row_labels = order_labels(declared(resolver, row_qid), seen_rows);
    let col_labels = order_labels(declared(resolver, col_qid), seen_cols);

    let counts = build_counts(row_qid, col_qid, &row_labels, &col_labels, &tally);
    let percentages = row_percentages(&counts);

    debug!(
        "Crosstab {} x {}: {} x {} cells, {} respondents",
        row_qid,
        col_qid,
        row_labels.len(),
        col_labels.len(),
        counts.grand_total()
    );

    Ok(Crosstab {
        counts,
        percentages,
    })
}

fn column(table: &ResponseTable, qid: &str) -> InputResult<usize> {
    table
        .column_index(qid)
        .ok_or_else(|| InputError::UnknownColumn {
            column: qid.to_string(),
        })
}

/// A choice literally labelled "Total" is renamed so it stays apart from the
/// appended marginal row and column. A declared "No Answer" choice is counted
/// together with missing responses.
fn axis_label(label: String) -> String {
    if label == TOTAL_LABEL {
        debug!("Choice label \"{}\" renamed to \"{}\"", TOTAL_LABEL, RENAMED_TOTAL);
        RENAMED_TOTAL.to_string()
    } else {
        label
    }
}

fn declared(resolver: &LabelResolver, qid: &str) -> Vec<String> {
    resolver
        .declared_labels(qid)
        .into_iter()
        .map(|label| if label == TOTAL_LABEL { RENAMED_TOTAL.to_string() } else { label })
        .collect()
}

/// Declared order first, then undeclared labels sorted, then "No Answer".
fn order_labels(declared: Vec<String>, mut seen: BTreeSet<String>) -> Vec<String> {
    let mut ordered = Vec::with_capacity(seen.len());
    for label in declared {
        if label != NO_ANSWER && seen.remove(&label) {
            ordered.push(label);
        }
    }
    let has_no_answer = seen.remove(NO_ANSWER);
    ordered.extend(seen);
    if has_no_answer {
        ordered.push(NO_ANSWER.to_string());
    }
    ordered
}

fn build_counts(
    row_axis: &str,
    col_axis: &str,
    row_labels: &[String],
    col_labels: &[String],
    tally: &HashMap<(String, String), u64>,
) -> ContingencyTable {
    let width = col_labels.len() + 1;
    let mut counts = Vec::with_capacity(row_labels.len() + 1);
    let mut total_row = vec![0u64; width];

    for r in row_labels {
        let mut cells = Vec::with_capacity(width);
        for c in col_labels {
            cells.push(tally.get(&(r.clone(), c.clone())).copied().unwrap_or(0));
        }
        cells.push(cells.iter().sum());
        for (total, cell) in total_row.iter_mut().zip(&cells) {
            *total += cell;
        }
        counts.push(cells);
    }
    counts.push(total_row);

    ContingencyTable {
        row_axis: row_axis.to_string(),
        col_axis: col_axis.to_string(),
        row_labels: with_total(row_labels),
        col_labels: with_total(col_labels),
        counts,
    }
}

fn with_total(labels: &[String]) -> Vec<String> {
    let mut labels = labels.to_vec();
    labels.push(TOTAL_LABEL.to_string());
    labels
}

/// Normalize every row by its last (Total) cell. Zero-total rows stay at 0.0.
pub fn row_percentages(counts: &ContingencyTable) -> PercentageTable {
    let values = counts
        .counts
        .iter()
        .map(|cells| {
            let total = cells.last().copied().unwrap_or(0);
            cells
                .iter()
                .map(|&n| {
                    if total == 0 {
                        0.0
                    } else {
                        n as f64 / total as f64 * 100.0
                    }
                })
                .collect()
        })
        .collect();

    PercentageTable {
        row_labels: counts.row_labels.clone(),
        col_labels: counts.col_labels.clone(),
        values,
    }
}
