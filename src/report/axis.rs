//! Tag-driven axis report.
//!
//! Every question carrying a tag is cross-tabulated against a fixed set of
//! demographic axes and rendered as row-wise percentage tables.

use crate::aggregate::{crosstab, markdown_table, CrosstabOptions};
use crate::labels::LabelResolver;
use crate::models::{format_percent, Crosstab, QuestionBook, ResponseTable, TOTAL_LABEL};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// One demographic axis of the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisAxis {
    pub qid: String,
    pub name: String,
}

impl AnalysisAxis {
    pub fn new(qid: &str, name: &str) -> Self {
        Self {
            qid: qid.to_string(),
            name: name.to_string(),
        }
    }
}

/// Area, age, household, finances and outing frequency.
pub fn default_axes() -> Vec<AnalysisAxis> {
    vec![
        AnalysisAxis::new("Q0-3", "Area"),
        AnalysisAxis::new("Q0-1", "Age"),
        AnalysisAxis::new("Q1-1", "Household"),
        AnalysisAxis::new("Q1-3", "Finances"),
        AnalysisAxis::new("Q2-8", "Outing frequency"),
    ]
}

/// Markdown report of every question tagged `tag` against every axis.
pub fn generate_axis_report(
    book: &QuestionBook,
    table: &ResponseTable,
    resolver: &LabelResolver,
    tag: &str,
    axes: &[AnalysisAxis],
) -> Result<String> {
    let tag = tag.trim();
    let questions: Vec<_> = book.with_tag(tag).collect();
    if questions.is_empty() {
        bail!("No question is tagged '{}'", tag);
    }
    info!(
        "Axis report for tag '{}': {} questions x {} axes",
        tag,
        questions.len(),
        axes.len()
    );

    let mut output = format!("# Axis report: {}\n\n", tag);

    for axis in axes {
        output.push_str(&format!("## Axis: {} ({})\n\n", axis.name, axis.qid));

        if table.column_index(&axis.qid).is_none() {
            warn!("Axis column {} not in the response data", axis.qid);
            output.push_str("*Axis column not present in the response data.*\n\n---\n\n");
            continue;
        }

        for question in &questions {
            output.push_str(&format!("### Question {}: {}\n\n", question.id, question.text));

            let result = match crosstab(
                table,
                &axis.qid,
                &question.id,
                resolver,
                CrosstabOptions::default(),
            ) {
                Ok(result) => result,
                Err(e) => {
                    warn!("Skipping {} on {}: {}", question.id, axis.qid, e);
                    output.push_str(&format!("*{}*\n\n", e));
                    continue;
                }
            };

            output.push_str(&segment_table(&result));
            output.push('\n');
        }
        output.push_str("---\n\n");
    }

    Ok(output)
}

/// Percent rows per segment, without the Total row and column. Empty segments are left out.
fn segment_table(result: &Crosstab) -> String {
    let counts = &result.counts;
    let choices: Vec<&String> = counts
        .col_labels
        .iter()
        .filter(|label| label.as_str() != TOTAL_LABEL)
        .collect();

    let mut header = vec!["Segment".to_string()];
    header.extend(choices.iter().map(|label| label.to_string()));

    let mut rows = Vec::new();
    for label in &counts.row_labels {
        let total = counts.get(label, TOTAL_LABEL).unwrap_or(0);
        if label == TOTAL_LABEL || total == 0 {
            continue;
        }
        let mut line = vec![label.clone()];
        line.extend(choices.iter().map(|choice| {
            result
                .percentages
                .display(label, choice)
                .unwrap_or_else(|| format_percent(0.0))
        }));
        rows.push(line);
    }

    markdown_table(&header, &rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::OverrideTable;
    use crate::metadata::{parse, ParseMode};

    const DOC: &str = "## Q5 Do you go shopping on your own?\n\n```yaml\nqid: Q5\ntype: single\ntags: [mobility, daily]\nchoices:\n  1: Yes\n  2: No\n```\n\n## Q6 Favourite colour\n\n```yaml\nqid: Q6\ntags: other\nchoices:\n  1: Red\n```\n";

    fn data() -> ResponseTable {
        let rows = [
            ["1", "1", "2", "1"],
            ["2", "1", "3", "2"],
            ["3", "2", "3", ""],
            ["4", "2", "7", "1"],
        ];
        ResponseTable::new(
            vec!["No".into(), "Q0-3".into(), "Q0-1".into(), "Q5".into()],
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn test_tagged_questions_against_axes() {
        let book = parse(DOC, ParseMode::Lenient);
        let resolver = LabelResolver::new(&book, OverrideTable::builtin());
        let axes = vec![AnalysisAxis::new("Q0-3", "Area")];

        let report = generate_axis_report(&book, &data(), &resolver, " mobility ", &axes).unwrap();

        assert!(report.starts_with("# Axis report: mobility\n"));
        assert!(report.contains("## Axis: Area (Q0-3)"));
        assert!(report.contains("### Question Q5: Do you go shopping on your own?"));
        assert!(!report.contains("Q6"));
        assert!(report.contains("| Segment | Yes | No | No Answer |"));
        assert!(report.contains("| Nisshin | 50.0% | 50.0% | 0.0% |"));
        assert!(report.contains("| Kawazoe | 50.0% | 0.0% | 50.0% |"));
        assert!(!report.contains("| Total |"));
    }

    #[test]
    fn test_missing_axis_column_is_noted() {
        let book = parse(DOC, ParseMode::Lenient);
        let resolver = LabelResolver::new(&book, OverrideTable::builtin());
        let report =
            generate_axis_report(&book, &data(), &resolver, "daily", &default_axes()).unwrap();

        assert!(report.contains("## Axis: Age (Q0-1)"));
        assert!(report.contains("| 65-69 | 100.0% | 0.0% |"));
        assert!(report.contains("## Axis: Household (Q1-1)\n\n*Axis column not present"));
    }

    #[test]
    fn test_unknown_tag_is_an_error() {
        let book = parse(DOC, ParseMode::Lenient);
        let resolver = LabelResolver::new(&book, OverrideTable::builtin());
        let err = generate_axis_report(&book, &data(), &resolver, "nothing", &default_axes())
            .unwrap_err();
        assert!(err.to_string().contains("nothing"));
    }
}
