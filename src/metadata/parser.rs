//! Line-oriented scanner for question-definition documents.
//!
//! Each fenced block is parsed on its own: a block that lacks a required
//! field is skipped, and a malformed `choices` section only empties that
//! block's choices. One bad block never blocks the rest of the document.

use crate::models::{AnswerType, QuestionBook, QuestionDefinition};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use tracing::{debug, warn};

static HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^##[ \t]+([\w\-]+)(?:[ \t]+(.*?))?[ \t]*$").expect("Invalid header regex")
});

static FENCE_OPEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[ \t]*```[ \t]*(?i:yaml|yml)(?:[ \t]*\{[^}]*\})?[ \t]*$")
        .expect("Invalid fence regex")
});

/// Which fields a block must carry to be accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    /// `qid` is required; a missing `type` means single choice.
    #[default]
    Lenient,
    /// Both `qid` and `type` are required.
    Strict,
}

/// Parsed document plus notes about skipped or degraded blocks.
#[derive(Debug, Clone, Default)]
pub struct ParsedDocument {
    pub book: QuestionBook,
    pub notes: Vec<String>,
}

/// Parse a definition document into a question book.
#[cfg(test)]
pub fn parse(document: &str, mode: ParseMode) -> QuestionBook {
    parse_with_notes(document, mode).book
}

/// Parse a definition document, keeping a note for every skipped or degraded block.
pub fn parse_with_notes(document: &str, mode: ParseMode) -> ParsedDocument {
    let lines: Vec<&str> = document.lines().map(|l| l.trim_end_matches('\r')).collect();
    let headers = collect_headers(&lines);
    debug!("Found {} question headers", headers.len());

    let mut parsed = ParsedDocument {
        book: QuestionBook::new(),
        notes: Vec::new(),
    };

    for block in extract_blocks(&lines, &mut parsed.notes) {
        let fields = scan_block(&block.lines);

        let Some(qid) = fields.qid else {
            debug!("Skipping block at line {}: no qid", block.start_line);
            parsed
                .notes
                .push(format!("line {}: block without qid skipped", block.start_line));
            continue;
        };

        let answer_type = match (fields.answer_type, mode) {
            (Some(t), _) => AnswerType::from(t.as_str()),
            (None, ParseMode::Lenient) => AnswerType::Single,
            (None, ParseMode::Strict) => {
                debug!("Skipping block {}: no type", qid);
                parsed
                    .notes
                    .push(format!("line {}: {} has no type, skipped", block.start_line, qid));
                continue;
            }
        };

        let choices = match fields.choices {
            Ok(choices) => choices,
            Err(reason) => {
                warn!("Malformed choices for {}: {}", qid, reason);
                parsed
                    .notes
                    .push(format!("{}: malformed choices ({}), using none", qid, reason));
                IndexMap::new()
            }
        };

        let mut definition = QuestionDefinition::new(qid.clone(), answer_type);
        if let Some(text) = headers.get(&qid) {
            definition.text = text.clone();
        }
        definition.choices = choices;
        definition.tags = fields.tags;

        if !parsed.book.insert(definition) {
            warn!("Duplicate question id {}, keeping the first definition", qid);
            parsed.notes.push(format!("{}: duplicate definition ignored", qid));
        }
    }

    debug!("Parsed {} question definitions", parsed.book.len());
    parsed
}

/// Map of question id to header text. The first header for an id wins.
fn collect_headers(lines: &[&str]) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    for line in lines {
        if let Some(caps) = HEADER_RE.captures(line) {
            let text = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");
            if text.is_empty() {
                continue;
            }
            headers
                .entry(caps[1].to_string())
                .or_insert_with(|| text.to_string());
        }
    }
    headers
}

struct RawBlock<'a> {
    /// 1-based line number of the opening fence.
    start_line: usize,
    lines: Vec<&'a str>,
}

fn extract_blocks<'a>(lines: &[&'a str], notes: &mut Vec<String>) -> Vec<RawBlock<'a>> {
    let mut blocks = Vec::new();
    let mut current: Option<RawBlock<'a>> = None;

    for (idx, line) in lines.iter().enumerate() {
        match current.as_mut() {
            None => {
                if FENCE_OPEN_RE.is_match(line) {
                    current = Some(RawBlock {
                        start_line: idx + 1,
                        lines: Vec::new(),
                    });
                }
            }
            Some(block) => {
                if line.trim_start().starts_with("```") {
                    if let Some(done) = current.take() {
                        blocks.push(done);
                    }
                } else {
                    block.lines.push(line);
                }
            }
        }
    }

    if let Some(open) = current {
        warn!("Unterminated block at line {} ignored", open.start_line);
        notes.push(format!("line {}: unterminated block ignored", open.start_line));
    }

    blocks
}

#[derive(Debug)]
struct BlockFields {
    qid: Option<String>,
    answer_type: Option<String>,
    tags: Vec<String>,
    choices: Result<IndexMap<String, String>, String>,
}

/// Scan one block body line by line.
fn scan_block(lines: &[&str]) -> BlockFields {
    let mut fields = BlockFields {
        qid: None,
        answer_type: None,
        tags: Vec::new(),
        choices: Ok(IndexMap::new()),
    };

    let base_indent = lines
        .iter()
        .filter(|l| !is_skippable(l))
        .map(|l| indent_of(l))
        .min()
        .unwrap_or(0);

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        i += 1;

        if is_skippable(line) || indent_of(line) > base_indent {
            continue;
        }
        let Some((key, value)) = line.trim().split_once(':') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();

        // Indented lines directly below a key belong to that key.
        let mut nested: Vec<&str> = Vec::new();
        while i < lines.len() && (is_skippable(lines[i]) || indent_of(lines[i]) > base_indent) {
            if !is_skippable(lines[i]) {
                nested.push(lines[i]);
            }
            i += 1;
        }

        match key {
            "qid" => {
                let qid = unquote(value);
                if !qid.is_empty() {
                    fields.qid = Some(qid.to_string());
                }
            }
            "type" => {
                let t = unquote(value);
                if !t.is_empty() {
                    fields.answer_type = Some(t.to_string());
                }
            }
            "tags" => fields.tags = parse_tags(value, &nested),
            "choices" => {
                fields.choices = if value.is_empty() {
                    parse_choice_lines(&nested)
                } else {
                    parse_flow_map(value)
                };
            }
            _ => {}
        }
    }

    fields
}

fn is_skippable(line: &str) -> bool {
    let t = line.trim();
    t.is_empty() || t.starts_with('#')
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// Strip surrounding whitespace and one pair of matching quotes.
fn unquote(s: &str) -> &str {
    let s = s.trim();
    for q in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(q) && s.ends_with(q) {
            return s[1..s.len() - 1].trim();
        }
    }
    s
}

/// Parse one `code: label` pair, quotes optional on either side.
fn parse_pair(entry: &str) -> Option<(String, String)> {
    let entry = entry.trim();
    let (key, rest) = match entry.chars().next() {
        Some(q @ ('"' | '\'')) => {
            let end = entry[1..].find(q)? + 1;
            let rest = entry[end + 1..].trim_start().strip_prefix(':')?;
            (&entry[1..end], rest)
        }
        _ => entry.split_once(':')?,
    };

    let key = key.trim();
    let value = unquote(rest);
    if key.is_empty() || value.is_empty() {
        return None;
    }
    Some((key.to_string(), value.to_string()))
}

fn parse_choice_lines(lines: &[&str]) -> Result<IndexMap<String, String>, String> {
    let mut choices = IndexMap::new();
    for line in lines {
        let (code, label) =
            parse_pair(line).ok_or_else(|| format!("cannot read `{}`", line.trim()))?;
        choices.insert(code, label);
    }
    Ok(choices)
}

/// Parse an inline `{"1": "A", "2": "B"}` map.
fn parse_flow_map(value: &str) -> Result<IndexMap<String, String>, String> {
    let inner = value
        .strip_prefix('{')
        .and_then(|v| v.strip_suffix('}'))
        .ok_or_else(|| format!("unbalanced inline map `{}`", value))?;

    let mut choices = IndexMap::new();
    for entry in split_outside_quotes(inner, ',') {
        if entry.trim().is_empty() {
            continue;
        }
        let (code, label) =
            parse_pair(&entry).ok_or_else(|| format!("cannot read `{}`", entry.trim()))?;
        choices.insert(code, label);
    }
    Ok(choices)
}

fn parse_tags(value: &str, nested: &[&str]) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    if value.is_empty() {
        for line in nested {
            if let Some(item) = line.trim().strip_prefix('-') {
                tags.push(unquote(item).to_string());
            }
        }
    } else {
        let inline = value
            .strip_prefix('[')
            .and_then(|v| v.strip_suffix(']'))
            .unwrap_or(value);
        tags.extend(
            split_outside_quotes(inline, ',')
                .iter()
                .map(|t| unquote(t).to_string()),
        );
    }
    tags.retain(|t| !t.is_empty());
    tags
}

fn split_outside_quotes(s: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in s.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => {
                quote = None;
                current.push(c);
            }
            (None, '"' | '\'') => {
                quote = Some(c);
                current.push(c);
            }
            (None, c) if c == sep => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    parts.push(current);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"# Customer survey

## Q1 Satisfaction

```yaml {#q1}
qid: Q1
type: single
choices:
  "1": "Satisfied"
  2: Unsatisfied
```

## Q2 Features used often

```yaml
qid: Q2
type: multi
tags: [service, usage]
choices:
  1: Feature A
  '2': 'Feature B'
  "3": Feature C
```
"#;

    #[test]
    fn test_parse_headers_and_choices() {
        let book = parse(DOC, ParseMode::Strict);
        assert_eq!(book.len(), 2);

        let q1 = book.get("Q1").unwrap();
        assert_eq!(q1.text, "Satisfaction");
        assert_eq!(q1.answer_type, AnswerType::Single);
        assert_eq!(q1.choices.get("1").map(String::as_str), Some("Satisfied"));
        assert_eq!(q1.choices.get("2").map(String::as_str), Some("Unsatisfied"));

        let q2 = book.get("Q2").unwrap();
        assert_eq!(q2.answer_type, AnswerType::Multiple);
        assert_eq!(q2.tags, vec!["service", "usage"]);
        let codes: Vec<_> = q2.choices.keys().map(String::as_str).collect();
        assert_eq!(codes, vec!["1", "2", "3"]);
        assert_eq!(q2.choices["2"], "Feature B");
    }

    #[test]
    fn test_inline_choice_map() {
        let doc = "## Q1 Satisfaction\n\n```yaml\nqid: Q1\nchoices: {\"1\": \"Satisfied\", \"2\": \"Unsatisfied\"}\n```\n";
        let book = parse(doc, ParseMode::Lenient);
        let q1 = book.get("Q1").unwrap();
        assert_eq!(q1.text, "Satisfaction");
        assert_eq!(q1.answer_type, AnswerType::Single);
        assert_eq!(q1.choices.len(), 2);
        assert_eq!(q1.choices["2"], "Unsatisfied");
    }

    #[test]
    fn test_block_without_qid_is_skipped() {
        let doc = "```yaml\ntype: single\n```\n\n```yaml\nqid: Q9\n```\n";
        let parsed = parse_with_notes(doc, ParseMode::Lenient);
        assert_eq!(parsed.book.len(), 1);
        assert!(parsed.book.contains("Q9"));
        assert_eq!(parsed.notes.len(), 1);
    }

    #[test]
    fn test_strict_mode_requires_type() {
        let doc = "```yaml\nqid: Q1\n```\n```yaml\nqid: Q2\ntype: multi\n```\n";
        assert_eq!(parse(doc, ParseMode::Strict).len(), 1);
        assert_eq!(parse(doc, ParseMode::Lenient).len(), 2);
    }

    #[test]
    fn test_malformed_choices_degrade_to_empty() {
        let doc = "## Q1 Broken\n```yaml\nqid: Q1\ntype: single\nchoices:\n  - not a pair\n```\n\n```yaml\nqid: Q2\nchoices:\n  1: Yes\n```\n";
        let parsed = parse_with_notes(doc, ParseMode::Lenient);
        let q1 = parsed.book.get("Q1").unwrap();
        assert!(q1.choices.is_empty());
        assert_eq!(q1.text, "Broken");
        assert_eq!(parsed.book.get("Q2").unwrap().choices["1"], "Yes");
        assert!(parsed.notes.iter().any(|n| n.contains("malformed")));
    }

    #[test]
    fn test_unbalanced_inline_map_is_malformed() {
        let doc = "```yaml\nqid: Q1\nchoices: {\"1\": \"A\"\n```\n";
        let book = parse(doc, ParseMode::Lenient);
        assert!(book.get("Q1").unwrap().choices.is_empty());
    }

    #[test]
    fn test_missing_header_falls_back_to_id() {
        let doc = "```yaml\nqid: Q7\n```\n";
        let book = parse(doc, ParseMode::Lenient);
        assert_eq!(book.get("Q7").unwrap().text, "Q7");
    }

    #[test]
    fn test_tolerates_whitespace_comments_and_crlf() {
        let doc = "##   Q1   Spaced   header  \r\n\r\n```yaml\r\n\r\n  qid:   \"Q1\"  \r\n  # a comment\r\n  type: 'multi'\r\n  choices:\r\n\r\n    1 :  One \r\n    \"2\":\"Two\"\r\n```\r\n";
        let book = parse(doc, ParseMode::Strict);
        let q1 = book.get("Q1").unwrap();
        assert_eq!(q1.text, "Spaced   header");
        assert_eq!(q1.answer_type, AnswerType::Multiple);
        assert_eq!(q1.choices["1"], "One");
        assert_eq!(q1.choices["2"], "Two");
    }

    #[test]
    fn test_choices_section_ends_at_next_key() {
        let doc = "```yaml\nqid: Q1\nchoices:\n  1: A\n  2: B\ntype: multi\ntags:\n  - health\n  - daily\n```\n";
        let q1 = parse(doc, ParseMode::Strict).get("Q1").cloned().unwrap();
        assert_eq!(q1.choices.len(), 2);
        assert_eq!(q1.answer_type, AnswerType::Multiple);
        assert_eq!(q1.tags, vec!["health", "daily"]);
    }

    #[test]
    fn test_label_may_contain_colon() {
        let doc = "```yaml\nqid: Q1\nchoices:\n  1: \"Time: morning\"\n  2: Time: evening\n```\n";
        let q1 = parse(doc, ParseMode::Lenient).get("Q1").cloned().unwrap();
        assert_eq!(q1.choices["1"], "Time: morning");
        assert_eq!(q1.choices["2"], "Time: evening");
    }

    #[test]
    fn test_non_yaml_fences_are_ignored() {
        let doc = "```json\n{\"qid\": \"Q1\"}\n```\n```\nqid: Q2\n```\n";
        assert!(parse(doc, ParseMode::Lenient).is_empty());
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let doc = "```yaml\nqid: Q1\ntype: single\n```\n```yaml\nqid: Q1\ntype: multi\n```\n";
        let parsed = parse_with_notes(doc, ParseMode::Lenient);
        assert_eq!(parsed.book.len(), 1);
        assert_eq!(
            parsed.book.get("Q1").unwrap().answer_type,
            AnswerType::Single
        );
        assert!(parsed.notes.iter().any(|n| n.contains("duplicate")));
    }

    #[test]
    fn test_parse_is_idempotent() {
        assert_eq!(
            parse(DOC, ParseMode::Lenient),
            parse(DOC, ParseMode::Lenient)
        );
    }

    #[test]
    fn test_unicode_ids() {
        let doc = "## 問1 サービスへの総合満足度\n```yaml\nqid: 問1\nchoices:\n  1: 満足\n```\n";
        let book = parse(doc, ParseMode::Lenient);
        let q = book.get("問1").unwrap();
        assert_eq!(q.text, "サービスへの総合満足度");
        assert_eq!(q.choices["1"], "満足");
    }
}
