//! Wide-to-long reshaping of response data.
//!
//! Every respondent row is expanded into one tidy record per question, or
//! one per selected option for multi-select questions. The question book is
//! the source of truth for which columns are survey questions.

use crate::labels::LabelResolver;
use crate::models::{QuestionBook, ResponseTable, TidyRecord};
use tracing::{debug, warn};

/// Tidy records plus the columns that were left out.
#[derive(Debug, Clone, Default)]
pub struct TidyOutput {
    pub records: Vec<TidyRecord>,
    pub warnings: Vec<String>,
}

/// Convert wide response rows into tidy records, row order then column order.
pub fn to_tidy(table: &ResponseTable, book: &QuestionBook, resolver: &LabelResolver) -> TidyOutput {
    let mut output = TidyOutput::default();

    // (column index, question) for every column the book knows about
    let mut columns = Vec::new();
    for (idx, header) in table.headers.iter().enumerate().skip(1) {
        match book.get(header) {
            Some(question) => columns.push((idx, question)),
            None => {
                let message = format!("Column {} has no question definition; ignored", header);
                warn!("{}", message);
                output.warnings.push(message);
            }
        }
    }

    for row in &table.rows {
        let respondent = table.cell(row, 0);
        for (idx, question) in &columns {
            let raw = table.cell(row, *idx);
            let labels = if question.answer_type.is_multiple() {
                resolver.resolve_multi(&question.id, raw)
            } else {
                vec![resolver.resolve(&question.id, raw)]
            };

            for label in labels {
                output.records.push(TidyRecord {
                    respondent_id: respondent.to_string(),
                    question_id: question.id.clone(),
                    question: question.text.clone(),
                    answer_type: question.answer_type.to_string(),
                    choice_label: label,
                });
            }
        }
    }

    debug!(
        "Reshaped {} rows x {} questions into {} records",
        table.len(),
        columns.len(),
        output.records.len()
    );
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::OverrideTable;
    use crate::metadata::{parse, ParseMode};
    use crate::models::NO_ANSWER;

    const DOC: &str = r#"
## Q1 Satisfaction

```yaml
qid: Q1
type: single
choices: {"1": "Satisfied", "2": "Unsatisfied"}
```

## Q2 Features used

```yaml
qid: Q2
type: multi
choices:
  1: Search
  2: Export
  3: Sharing
```
"#;

    fn table(rows: &[&[&str]]) -> ResponseTable {
        ResponseTable::new(
            vec!["No".into(), "Q1".into(), "Q2".into(), "Memo".into()],
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn test_single_answer_becomes_one_labeled_record() {
        let book = parse(DOC, ParseMode::Lenient);
        let resolver = LabelResolver::new(&book, OverrideTable::empty());
        let data = ResponseTable::new(
            vec!["No".into(), "Q1".into()],
            vec![vec!["1".into(), "1".into()]],
        );

        let output = to_tidy(&data, &book, &resolver);
        assert_eq!(output.records.len(), 1);
        assert_eq!(output.records[0].question, "Satisfaction");
        assert_eq!(output.records[0].choice_label, "Satisfied");
        assert_eq!(output.records[0].answer_type, "single");
        assert!(output.warnings.is_empty());
    }

    #[test]
    fn test_multi_select_explodes_in_order() {
        let book = parse(DOC, ParseMode::Lenient);
        let resolver = LabelResolver::new(&book, OverrideTable::empty());
        let data = table(&[&["7", "2", "3,1", "note"]]);

        let output = to_tidy(&data, &book, &resolver);
        let labels: Vec<_> = output
            .records
            .iter()
            .map(|r| (r.question_id.as_str(), r.choice_label.as_str()))
            .collect();
        assert_eq!(
            labels,
            vec![("Q1", "Unsatisfied"), ("Q2", "Sharing"), ("Q2", "Search")]
        );
        assert!(output.records.iter().all(|r| r.respondent_id == "7"));
    }

    #[test]
    fn test_empty_cells_emit_no_answer() {
        let book = parse(DOC, ParseMode::Lenient);
        let resolver = LabelResolver::new(&book, OverrideTable::empty());
        let data = table(&[&["1", "", "nan", ""]]);

        let output = to_tidy(&data, &book, &resolver);
        assert_eq!(output.records.len(), 2);
        assert!(output.records.iter().all(|r| r.choice_label == NO_ANSWER));
    }

    #[test]
    fn test_unknown_columns_warned_once() {
        let book = parse(DOC, ParseMode::Lenient);
        let resolver = LabelResolver::new(&book, OverrideTable::empty());
        let data = table(&[&["1", "1", "1", "a"], &["2", "2", "2", "b"]]);

        let output = to_tidy(&data, &book, &resolver);
        assert_eq!(output.warnings.len(), 1);
        assert!(output.warnings[0].contains("Memo"));
        assert!(output.records.iter().all(|r| r.question_id != "Memo"));
        // grouped by row, then column
        let order: Vec<_> = output
            .records
            .iter()
            .map(|r| format!("{}:{}", r.respondent_id, r.question_id))
            .collect();
        assert_eq!(order, vec!["1:Q1", "1:Q2", "2:Q1", "2:Q2"]);
    }

    #[test]
    fn test_undeclared_codes_are_kept() {
        let book = parse(DOC, ParseMode::Lenient);
        let resolver = LabelResolver::new(&book, OverrideTable::empty());
        let data = table(&[&["1", "9", "2,8", ""]]);

        let output = to_tidy(&data, &book, &resolver);
        let labels: Vec<_> = output.records.iter().map(|r| r.choice_label.as_str()).collect();
        assert_eq!(labels, vec!["Choice(9)", "Export", "Choice(8)"]);
    }
}
