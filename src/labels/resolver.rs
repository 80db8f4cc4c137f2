//! Label resolution for single- and multi-valued cells.

use crate::labels::sources::{CodebookSource, LabelSource, OverrideTable, PlaceholderSource};
use crate::models::{QuestionBook, NO_ANSWER};
use tracing::debug;

/// Resolves raw cell values through an ordered chain of label sources.
///
/// Always returns a label: missing cells become [`NO_ANSWER`] and unknown
/// codes get a placeholder.
pub struct LabelResolver<'a> {
    sources: Vec<Box<dyn LabelSource + 'a>>,
}

impl<'a> LabelResolver<'a> {
    /// Standard chain: overrides, parsed codebook, placeholder.
    pub fn new(book: &'a QuestionBook, overrides: OverrideTable) -> Self {
        let sources: Vec<Box<dyn LabelSource + 'a>> = vec![
            Box::new(overrides),
            Box::new(CodebookSource::new(book)),
            Box::new(PlaceholderSource),
        ];
        Self::from_sources(sources)
    }

    /// Custom chain. A [`PlaceholderSource`] is appended when the chain could fall through.
    pub fn from_sources(mut sources: Vec<Box<dyn LabelSource + 'a>>) -> Self {
        if sources.last().map(|s| s.name()) != Some("placeholder") {
            sources.push(Box::new(PlaceholderSource));
        }
        Self { sources }
    }

    /// Resolve a cell to one label. Comma-joined codes resolve to comma-joined labels.
    pub fn resolve(&self, question_id: &str, raw: &str) -> String {
        self.resolve_multi(question_id, raw).join(",")
    }

    /// Resolve a multi-select cell to its labels, in the order the codes appear.
    pub fn resolve_multi(&self, question_id: &str, raw: &str) -> Vec<String> {
        if is_missing(raw) {
            return vec![NO_ANSWER.to_string()];
        }

        let labels: Vec<String> = raw
            .split(',')
            .map(clean_code)
            .filter(|code| !code.is_empty() && !is_missing(code))
            .map(|code| self.resolve_code(question_id, code))
            .collect();

        if labels.is_empty() {
            vec![NO_ANSWER.to_string()]
        } else {
            labels
        }
    }

    /// Declared labels for a question, in display order.
    pub fn declared_labels(&self, question_id: &str) -> Vec<String> {
        self.sources
            .iter()
            .find_map(|s| s.declared_labels(question_id))
            .unwrap_or_default()
    }

    fn resolve_code(&self, question_id: &str, code: &str) -> String {
        for source in &self.sources {
            if let Some(label) = source.lookup(question_id, code) {
                debug!("{}={} resolved by {}", question_id, code, source.name());
                return label;
            }
        }
        format!("Choice({})", code)
    }
}

/// True for empty cells and the usual spreadsheet null markers.
pub fn is_missing(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "" | "nan" | "null" | "none"
    )
}

/// Trim a code and drop the `.0` that numeric spreadsheet exports append.
pub fn clean_code(part: &str) -> &str {
    let part = part.trim();
    match part.strip_suffix(".0") {
        Some(stripped) if !stripped.is_empty() => stripped,
        _ => part,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnswerType, QuestionDefinition};

    fn book() -> QuestionBook {
        let mut book = QuestionBook::new();
        let mut q1 = QuestionDefinition::new("Q1", AnswerType::Multiple);
        q1.choices.insert("1".to_string(), "A".to_string());
        q1.choices.insert("2".to_string(), "B".to_string());
        book.insert(q1);
        let mut area = QuestionDefinition::new("Q0-3", AnswerType::Single);
        area.choices.insert("1".to_string(), "From codebook".to_string());
        book.insert(area);
        book
    }

    #[test]
    fn test_missing_values_resolve_to_no_answer() {
        let book = book();
        let resolver = LabelResolver::new(&book, OverrideTable::builtin());
        for raw in ["", "  ", "nan", "NaN", "null", "NULL", "None", "none"] {
            assert_eq!(resolver.resolve("Q1", raw), NO_ANSWER, "raw={:?}", raw);
        }
    }

    #[test]
    fn test_resolve_multi_preserves_order() {
        let book = book();
        let resolver = LabelResolver::new(&book, OverrideTable::empty());
        assert_eq!(resolver.resolve_multi("Q1", "1,2"), vec!["A", "B"]);
        assert_eq!(resolver.resolve_multi("Q1", "2, 1"), vec!["B", "A"]);
        assert_eq!(resolver.resolve("Q1", "1,2"), "A,B");
    }

    #[test]
    fn test_float_artifacts_are_stripped() {
        let book = book();
        let resolver = LabelResolver::new(&book, OverrideTable::empty());
        assert_eq!(resolver.resolve("Q1", "1.0"), "A");
        assert_eq!(resolver.resolve_multi("Q1", "1.0, 2.0"), vec!["A", "B"]);
        assert_eq!(resolver.resolve("Q1", "1.5"), "Choice(1.5)");
    }

    #[test]
    fn test_unknown_codes_get_placeholders() {
        let book = book();
        let resolver = LabelResolver::new(&book, OverrideTable::builtin());
        assert_eq!(resolver.resolve("Q1", "9"), "Choice(9)");
        assert_eq!(resolver.resolve("Q99", "1"), "Choice(1)");
        assert_eq!(resolver.resolve("Q0-1", "42"), "Unknown(42)");
    }

    #[test]
    fn test_override_wins_over_codebook() {
        let book = book();
        let resolver = LabelResolver::new(&book, OverrideTable::builtin());
        assert_eq!(resolver.resolve("Q0-3", "1"), "Nisshin");

        let plain = LabelResolver::new(&book, OverrideTable::empty());
        assert_eq!(plain.resolve("Q0-3", "1"), "From codebook");
    }

    #[test]
    fn test_empty_parts_are_dropped() {
        let book = book();
        let resolver = LabelResolver::new(&book, OverrideTable::empty());
        assert_eq!(resolver.resolve_multi("Q1", "1,,2,"), vec!["A", "B"]);
        assert_eq!(resolver.resolve_multi("Q1", ","), vec![NO_ANSWER]);
    }

    #[test]
    fn test_declared_labels_follow_chain() {
        let book = book();
        let resolver = LabelResolver::new(&book, OverrideTable::builtin());
        assert_eq!(resolver.declared_labels("Q1"), vec!["A", "B"]);
        assert_eq!(resolver.declared_labels("Q0-1").len(), 7);
        assert!(resolver.declared_labels("Q404").is_empty());
    }

    #[test]
    fn test_custom_chain_gets_placeholder() {
        let sources: Vec<Box<dyn LabelSource>> = vec![Box::new(OverrideTable::empty())];
        let resolver = LabelResolver::from_sources(sources);
        assert_eq!(resolver.resolve("Q1", "3"), "Choice(3)");
    }
}
