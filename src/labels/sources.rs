//! Label sources tried by the resolver, in order.

use crate::models::QuestionBook;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One strategy for turning a cleaned code into a label.
pub trait LabelSource {
    /// Short name used in debug logs.
    fn name(&self) -> &str;

    /// Label for `code`, or `None` to let the next source try.
    fn lookup(&self, question_id: &str, code: &str) -> Option<String>;

    /// Declared labels for a question in display order, if this source owns it.
    fn declared_labels(&self, _question_id: &str) -> Option<Vec<String>> {
        None
    }
}

/// A fixed code table for one axis, e.g. from the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisOverride {
    pub qid: String,
    pub choices: IndexMap<String, String>,
}

/// Fixed code tables that take precedence over the parsed codebook.
///
/// An override owns its axis: codes missing from the table resolve to
/// `Unknown(<code>)` instead of falling through.
#[derive(Debug, Clone, Default)]
pub struct OverrideTable {
    tables: IndexMap<String, IndexMap<String, String>>,
}

impl OverrideTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Area and age-bracket axes shipped with the tool.
    pub fn builtin() -> Self {
        let mut table = Self::empty();
        table.insert(
            "Q0-3",
            &[
                ("1", "Nisshin"),
                ("2", "Kawazoe"),
                ("3", "Misedani"),
                ("4", "Ogiwara"),
                ("5", "Ryonai"),
                ("6", "Osugidani"),
            ],
        );
        table.insert(
            "Q0-1",
            &[
                ("1", "Under 65"),
                ("2", "65-69"),
                ("3", "70-74"),
                ("4", "75-79"),
                ("5", "80-84"),
                ("6", "85-89"),
                ("7", "90 and over"),
            ],
        );
        table
    }

    pub fn from_overrides(overrides: &[AxisOverride]) -> Self {
        let mut table = Self::empty();
        table.apply(overrides);
        table
    }

    /// Add axes, replacing any existing table for the same question id.
    pub fn apply(&mut self, overrides: &[AxisOverride]) {
        for o in overrides {
            self.tables.insert(o.qid.clone(), o.choices.clone());
        }
    }

    pub fn insert(&mut self, qid: &str, pairs: &[(&str, &str)]) {
        self.tables.insert(
            qid.to_string(),
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
    }

    pub fn axes(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn to_overrides(&self) -> Vec<AxisOverride> {
        self.tables
            .iter()
            .map(|(qid, choices)| AxisOverride {
                qid: qid.clone(),
                choices: choices.clone(),
            })
            .collect()
    }
}

impl LabelSource for OverrideTable {
    fn name(&self) -> &str {
        "override"
    }

    fn lookup(&self, question_id: &str, code: &str) -> Option<String> {
        let table = self.tables.get(question_id)?;
        Some(
            table
                .get(code)
                .cloned()
                .unwrap_or_else(|| format!("Unknown({})", code)),
        )
    }

    fn declared_labels(&self, question_id: &str) -> Option<Vec<String>> {
        self.tables
            .get(question_id)
            .map(|t| t.values().cloned().collect())
    }
}

/// Choice maps parsed from the definition document.
pub struct CodebookSource<'a> {
    book: &'a QuestionBook,
}

impl<'a> CodebookSource<'a> {
    pub fn new(book: &'a QuestionBook) -> Self {
        Self { book }
    }
}

impl LabelSource for CodebookSource<'_> {
    fn name(&self) -> &str {
        "codebook"
    }

    fn lookup(&self, question_id: &str, code: &str) -> Option<String> {
        self.book.get(question_id)?.choices.get(code).cloned()
    }

    fn declared_labels(&self, question_id: &str) -> Option<Vec<String>> {
        let question = self.book.get(question_id)?;
        if question.choices.is_empty() {
            return None;
        }
        Some(question.choices.values().cloned().collect())
    }
}

/// Last resort: `Choice(<code>)`.
pub struct PlaceholderSource;

impl LabelSource for PlaceholderSource {
    fn name(&self) -> &str {
        "placeholder"
    }

    fn lookup(&self, _question_id: &str, code: &str) -> Option<String> {
        Some(format!("Choice({})", code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnswerType, QuestionDefinition};

    #[test]
    fn test_override_owns_axis() {
        let table = OverrideTable::builtin();
        assert_eq!(table.lookup("Q0-3", "2"), Some("Kawazoe".to_string()));
        assert_eq!(table.lookup("Q0-3", "9"), Some("Unknown(9)".to_string()));
        assert_eq!(table.lookup("Q5", "1"), None);
    }

    #[test]
    fn test_override_from_config_replaces_builtin() {
        let mut choices = IndexMap::new();
        choices.insert("1".to_string(), "North".to_string());
        let table = OverrideTable::from_overrides(&[AxisOverride {
            qid: "AREA".to_string(),
            choices,
        }]);
        assert_eq!(table.axes().collect::<Vec<_>>(), vec!["AREA"]);
        assert_eq!(table.lookup("Q0-3", "1"), None);
        assert_eq!(table.declared_labels("AREA"), Some(vec!["North".to_string()]));
    }

    #[test]
    fn test_codebook_source() {
        let mut book = QuestionBook::new();
        let mut q = QuestionDefinition::new("Q1", AnswerType::Single);
        q.choices.insert("1".to_string(), "Yes".to_string());
        book.insert(q);
        book.insert(QuestionDefinition::new("Q2", AnswerType::Single));

        let source = CodebookSource::new(&book);
        assert_eq!(source.lookup("Q1", "1"), Some("Yes".to_string()));
        assert_eq!(source.lookup("Q1", "2"), None);
        assert_eq!(source.lookup("Q3", "1"), None);
        assert_eq!(source.declared_labels("Q1"), Some(vec!["Yes".to_string()]));
        assert_eq!(source.declared_labels("Q2"), None);
    }
}
