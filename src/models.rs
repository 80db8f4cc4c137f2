//! Data models for survey tabulation.
//!
//! This module contains the core data structures shared by the parser,
//! the reshaping and aggregation engine, and the narrative report.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Label used for missing answers.
pub const NO_ANSWER: &str = "No Answer";

/// Label of the appended marginal row and column.
pub const TOTAL_LABEL: &str = "Total";

/// How a question is answered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnswerType {
    /// Exactly one choice per respondent.
    #[default]
    Single,
    /// Zero or more choices, comma-joined in the raw data.
    Multiple,
    /// Free text, numeric or any other declared type.
    Other(String),
}

impl AnswerType {
    pub fn is_multiple(&self) -> bool {
        matches!(self, AnswerType::Multiple)
    }
}

impl fmt::Display for AnswerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerType::Single => write!(f, "single"),
            AnswerType::Multiple => write!(f, "multi"),
            AnswerType::Other(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for AnswerType {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "single" | "sa" | "radio" => AnswerType::Single,
            "multi" | "multiple" | "ma" | "checkbox" => AnswerType::Multiple,
            other => AnswerType::Other(other.to_string()),
        }
    }
}

/// One question parsed from the definition document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionDefinition {
    /// Question id shared with the response columns.
    pub id: String,
    /// Header text, or the id itself when no header matched.
    pub text: String,
    /// Declared answer type.
    pub answer_type: AnswerType,
    /// Raw code to label, in declaration order.
    pub choices: IndexMap<String, String>,
    /// Free-form tags used to select questions for axis reports.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl QuestionDefinition {
    pub fn new(id: impl Into<String>, answer_type: AnswerType) -> Self {
        let id = id.into();
        Self {
            text: id.clone(),
            id,
            answer_type,
            choices: IndexMap::new(),
            tags: Vec::new(),
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Text shortened for menus and listings.
    pub fn short_text(&self, max_chars: usize) -> String {
        if self.text.chars().count() <= max_chars {
            self.text.clone()
        } else {
            let head: String = self.text.chars().take(max_chars).collect();
            format!("{}...", head)
        }
    }
}

/// All questions of one definition document, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionBook {
    questions: IndexMap<String, QuestionDefinition>,
}

impl QuestionBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a definition. Returns `false` and keeps the existing entry when the id is taken.
    pub fn insert(&mut self, definition: QuestionDefinition) -> bool {
        if self.questions.contains_key(&definition.id) {
            return false;
        }
        self.questions.insert(definition.id.clone(), definition);
        true
    }

    pub fn get(&self, id: &str) -> Option<&QuestionDefinition> {
        self.questions.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.questions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QuestionDefinition> {
        self.questions.values()
    }

    /// Questions carrying `tag`, in declaration order.
    pub fn with_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a QuestionDefinition> {
        self.questions.values().filter(move |q| q.has_tag(tag))
    }
}

/// Wide response data: one row per respondent, one column per question.
///
/// The first column holds the respondent number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ResponseTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Name of the respondent id column.
    pub fn id_column(&self) -> Option<&str> {
        self.headers.first().map(String::as_str)
    }

    /// Cell value, or an empty string for short rows.
    pub fn cell<'a>(&'a self, row: &'a [String], index: usize) -> &'a str {
        row.get(index).map(String::as_str).unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One (respondent, question, chosen option) fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TidyRecord {
    #[serde(rename = "No")]
    pub respondent_id: String,
    #[serde(rename = "qid")]
    pub question_id: String,
    #[serde(rename = "Question")]
    pub question: String,
    #[serde(rename = "type")]
    pub answer_type: String,
    #[serde(rename = "choices")]
    pub choice_label: String,
}

/// Whether an aggregate value is a count or a share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ValueType {
    Count,
    Percentage,
    Other(String),
}

impl From<String> for ValueType {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "count" | "counts" | "n" | "回答数" => ValueType::Count,
            "percentage" | "percent" | "%" | "share" | "割合" => ValueType::Percentage,
            _ => ValueType::Other(s),
        }
    }
}

impl From<ValueType> for String {
    fn from(v: ValueType) -> Self {
        v.to_string()
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Count => write!(f, "Count"),
            ValueType::Percentage => write!(f, "Percentage"),
            ValueType::Other(s) => write!(f, "{}", s),
        }
    }
}

/// One row of pre-tabulated survey output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRow {
    #[serde(rename = "QuestionID")]
    pub question_id: String,
    #[serde(rename = "QuestionText")]
    pub question_text: String,
    #[serde(rename = "AnswerType")]
    pub answer_type: String,
    #[serde(rename = "Attribute")]
    pub attribute: String,
    #[serde(rename = "Category")]
    pub category: String,
    #[serde(rename = "Choice")]
    pub choice: String,
    #[serde(rename = "ValueType")]
    pub value_type: ValueType,
    #[serde(rename = "Value")]
    pub value: String,
}

/// Two-way count table with a trailing Total row and column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContingencyTable {
    pub row_axis: String,
    pub col_axis: String,
    /// Row labels, ending with [`TOTAL_LABEL`].
    pub row_labels: Vec<String>,
    /// Column labels, ending with [`TOTAL_LABEL`].
    pub col_labels: Vec<String>,
    /// `counts[r][c]`, same shape as the labels.
    pub counts: Vec<Vec<u64>>,
}

impl ContingencyTable {
    pub fn get(&self, row: &str, col: &str) -> Option<u64> {
        let r = self.row_labels.iter().position(|l| l == row)?;
        let c = self.col_labels.iter().position(|l| l == col)?;
        self.counts.get(r).and_then(|cells| cells.get(c)).copied()
    }

    /// Grand total (bottom-right cell).
    pub fn grand_total(&self) -> u64 {
        self.counts
            .last()
            .and_then(|row| row.last())
            .copied()
            .unwrap_or(0)
    }
}

/// Row-normalized percentages for a [`ContingencyTable`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentageTable {
    pub row_labels: Vec<String>,
    pub col_labels: Vec<String>,
    /// Percent values in `0.0..=100.0`.
    pub values: Vec<Vec<f64>>,
}

impl PercentageTable {
    pub fn get(&self, row: &str, col: &str) -> Option<f64> {
        let r = self.row_labels.iter().position(|l| l == row)?;
        let c = self.col_labels.iter().position(|l| l == col)?;
        self.values.get(r).and_then(|cells| cells.get(c)).copied()
    }

    /// Display form of one cell, e.g. `86.2%`.
    pub fn display(&self, row: &str, col: &str) -> Option<String> {
        self.get(row, col).map(format_percent)
    }
}

/// Formats a percent value with one decimal place.
pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", value)
}

/// Counts and percentages for one pair of axes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crosstab {
    pub counts: ContingencyTable,
    pub percentages: PercentageTable,
}

/// How narrative generation is batched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum NarrativeMode {
    /// One prompt and one generation call for every requested pair.
    Combined,
    /// One prompt and one generation call per requested pair, paced.
    #[default]
    PerPair,
}

impl fmt::Display for NarrativeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NarrativeMode::Combined => write!(f, "combined"),
            NarrativeMode::PerPair => write!(f, "per-pair"),
        }
    }
}

/// Result of one generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "text", rename_all = "lowercase")]
pub enum SectionOutcome {
    Generated(String),
    Failed(String),
    Skipped(String),
}

/// One generated block of the narrative report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeSection {
    /// Request lines covered by this section, as `qid,attribute`.
    pub requests: Vec<String>,
    /// Prompt that was (or would have been) sent.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub prompt: String,
    pub outcome: SectionOutcome,
}

/// Metadata about a narrative run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub source_file: String,
    pub generated_at: DateTime<Utc>,
    pub model_used: String,
    pub mode: NarrativeMode,
    pub requests_total: usize,
    pub sections_generated: usize,
    pub sections_failed: usize,
    pub duration_seconds: f64,
}

/// The complete narrative report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeReport {
    pub metadata: ReportMetadata,
    pub sections: Vec<NarrativeSection>,
    /// Per-item warnings (malformed lines, pairs without data, cancellation).
    pub warnings: Vec<String>,
}

impl NarrativeReport {
    /// Recomputes the generated/failed counters from the sections.
    pub fn calculate_summary(&mut self) {
        self.metadata.sections_generated = self
            .sections
            .iter()
            .filter(|s| matches!(s.outcome, SectionOutcome::Generated(_)))
            .count();
        self.metadata.sections_failed = self
            .sections
            .iter()
            .filter(|s| matches!(s.outcome, SectionOutcome::Failed(_)))
            .count();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_type_from_str() {
        assert_eq!(AnswerType::from("single"), AnswerType::Single);
        assert_eq!(AnswerType::from("MULTI"), AnswerType::Multiple);
        assert_eq!(AnswerType::from("multiple"), AnswerType::Multiple);
        assert_eq!(AnswerType::from(" sa "), AnswerType::Single);
        assert_eq!(
            AnswerType::from("free"),
            AnswerType::Other("free".to_string())
        );
    }

    #[test]
    fn test_value_type_from_string() {
        assert_eq!(ValueType::from("count".to_string()), ValueType::Count);
        assert_eq!(ValueType::from("回答数".to_string()), ValueType::Count);
        assert_eq!(ValueType::from("割合".to_string()), ValueType::Percentage);
        assert_eq!(
            ValueType::from("mean".to_string()),
            ValueType::Other("mean".to_string())
        );
    }

    #[test]
    fn test_question_book_keeps_first_duplicate() {
        let mut book = QuestionBook::new();
        let mut first = QuestionDefinition::new("Q1", AnswerType::Single);
        first.text = "First".to_string();
        let mut second = QuestionDefinition::new("Q1", AnswerType::Multiple);
        second.text = "Second".to_string();

        assert!(book.insert(first));
        assert!(!book.insert(second));
        assert_eq!(book.len(), 1);
        assert_eq!(book.get("Q1").map(|q| q.text.as_str()), Some("First"));
    }

    #[test]
    fn test_short_text() {
        let mut q = QuestionDefinition::new("Q1", AnswerType::Single);
        q.text = "How satisfied are you with the service overall?".to_string();
        assert_eq!(q.short_text(10), "How satisf...");
        assert_eq!(q.short_text(100), q.text);
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(86.2068), "86.2%");
        assert_eq!(format_percent(0.0), "0.0%");
        assert_eq!(format_percent(100.0), "100.0%");
    }

    #[test]
    fn test_report_summary_counts() {
        let mut report = NarrativeReport {
            metadata: ReportMetadata {
                source_file: "agg.csv".to_string(),
                generated_at: Utc::now(),
                model_used: "test".to_string(),
                mode: NarrativeMode::PerPair,
                requests_total: 3,
                sections_generated: 0,
                sections_failed: 0,
                duration_seconds: 0.0,
            },
            sections: vec![
                NarrativeSection {
                    requests: vec!["Q1,Overall".to_string()],
                    prompt: String::new(),
                    outcome: SectionOutcome::Generated("ok".to_string()),
                },
                NarrativeSection {
                    requests: vec!["Q2,Overall".to_string()],
                    prompt: String::new(),
                    outcome: SectionOutcome::Failed("boom".to_string()),
                },
            ],
            warnings: vec![],
        };
        report.calculate_summary();
        assert_eq!(report.metadata.sections_generated, 1);
        assert_eq!(report.metadata.sections_failed, 1);
    }
}
