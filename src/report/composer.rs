//! Narrative composition from pre-aggregated rows.
//!
//! A request list names `(question id, attribute)` pairs. Each pair is
//! filtered out of the aggregate rows, rendered as a markdown table and
//! wrapped in a prompt together with a style example. In combined mode all
//! tables go into one prompt; in per-pair mode every pair gets its own
//! prompt and its own paced generation call.

use crate::aggregate::markdown_table;
use crate::generation::{CancellationFlag, Pacer, TextGenerator};
use crate::models::{AggregateRow, NarrativeMode, NarrativeSection, SectionOutcome};
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Style example used when the caller does not supply one.
pub const DEFAULT_EXAMPLE_NARRATIVE: &str = r#"### Q1. Service satisfaction (by gender)
**Findings**:
The share answering "Satisfied" is 86.2% (250/290) among men and 71.4% (150/210) among women, 14.8 points higher for men. The share answering "Unsatisfied" among women (28.6%) is more than twice that among men (13.8%).

**Discussion**:
Satisfaction is high overall, but it differs between men and women. The higher dissatisfaction among women may indicate that specific features or the design of the service are geared towards men. The concrete complaints of female users should be investigated further."#;

const SINGLE_INSTRUCTIONS: &str = r###"You are a professional data analyst.
Analyze only the data under "## Aggregated data" below and write the analysis comment for a survey report.

Use the structure and tone of the "## Example" given by the user, and follow these instructions strictly.

### Instructions
1.  **State the subject**: Begin by briefly stating which question is being analyzed.
2.  **Objective facts**: Describe the facts that can be read from the data using concrete numbers (for example: "The share answering 'Satisfied' is 50% among men and 70% among women, 20 points higher"). Focus on the most and least frequent choices and on large differences between categories.
3.  **Discussion**: Describe the implications of those facts in a logical way the reader can follow.
4.  **Format**: Write the whole comment in Markdown, with headings, in polished prose that can be quoted in a report as is."###;

const COMBINED_INSTRUCTIONS: &str = r###"You are a professional data analyst.
Write a survey report based on the "## Aggregated data" and the "## Requested analyses" below.

Use the structure and tone of the "## Example" given by the user, and follow these instructions.

### Instructions
1.  **Keep the order**: Write one analysis comment per entry of the requested analyses, in the listed order.
2.  **Overall trend**: For each question, first summarize the overall trend (the overall attribute). Name the main choices and their values.
3.  **Comparison**: Then analyze the cross tabulations of the same question (for example by gender or age) so that differences from the overall trend and between categories are clear. Compare using concrete numbers such as point differences.
4.  **Per-question discussion**: Close the analysis of every question with a short summary of the implications, like the example.
5.  **Natural prose**: Write readable text that flows naturally as a report."###;

/// One `question id, attribute` pair to narrate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrativeRequest {
    pub question_id: String,
    pub attribute: String,
}

impl fmt::Display for NarrativeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.question_id, self.attribute)
    }
}

/// A request line or pair that was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestIssue {
    Malformed { line_number: usize, line: String },
    NoData { request: NarrativeRequest },
}

impl fmt::Display for RequestIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestIssue::Malformed { line_number, line } => write!(
                f,
                "line {}: `{}` is not `question id,attribute`; skipped",
                line_number, line
            ),
            RequestIssue::NoData { request } => {
                write!(f, "`{}`: no matching data; skipped", request)
            }
        }
    }
}

/// Parse one request per non-blank line. Bad lines become issues.
pub fn parse_requests(text: &str) -> (Vec<NarrativeRequest>, Vec<RequestIssue>) {
    let mut requests = Vec::new();
    let mut issues = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let fields: Vec<&str> = trimmed.split(',').map(str::trim).collect();
        match fields.as_slice() {
            [qid, attr] if !qid.is_empty() && !attr.is_empty() => {
                requests.push(NarrativeRequest {
                    question_id: qid.to_string(),
                    attribute: attr.to_string(),
                });
            }
            _ => {
                let issue = RequestIssue::Malformed {
                    line_number: idx + 1,
                    line: trimmed.to_string(),
                };
                warn!("{}", issue);
                issues.push(issue);
            }
        }
    }

    (requests, issues)
}

/// Rows belonging to one request, in file order.
pub fn filter_rows<'a>(rows: &'a [AggregateRow], request: &NarrativeRequest) -> Vec<&'a AggregateRow> {
    rows.iter()
        .filter(|r| r.question_id == request.question_id && r.attribute == request.attribute)
        .collect()
}

/// Markdown block for one request. An empty slice renders an explicit "no data" line.
pub fn render_table(
    request: &NarrativeRequest,
    rows: &[&AggregateRow],
    overall_attribute: &str,
) -> String {
    let Some(first) = rows.first() else {
        return format!("### {}, {}: no data\n", request.question_id, request.attribute);
    };

    let heading = format!(
        "### {}, {}: {} ({})",
        request.question_id, request.attribute, first.question_text, first.answer_type
    );

    let overall = request.attribute == overall_attribute;
    let header: Vec<String> = if overall {
        vec!["Choice".into(), "Value".into()]
    } else {
        vec!["Category".into(), "Choice".into(), "Value".into()]
    };
    let body: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            if overall {
                vec![r.choice.clone(), r.value.clone()]
            } else {
                vec![r.category.clone(), r.choice.clone(), r.value.clone()]
            }
        })
        .collect();

    format!("{}\n{}\n", heading, markdown_table(&header, &body))
}

/// Prompt for one rendered table.
pub fn build_single_prompt(data_markdown: &str, example: &str) -> String {
    format!(
        "{}\n\n---\n\n## Example\n{}\n\n---\n\n## Aggregated data\n{}\n---\n\n## Analysis comment\n",
        SINGLE_INSTRUCTIONS,
        example.trim(),
        data_markdown
    )
}

/// Prompt covering several rendered tables and the list of requests they answer.
pub fn build_combined_prompt(
    data_markdown: &str,
    requests: &[NarrativeRequest],
    example: &str,
) -> String {
    let list = requests
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "{}\n\n---\n\n## Example\n{}\n\n---\n\n## Requested analyses\n{}\n\n---\n\n## Aggregated data\n{}\n---\n\n## Report\n",
        COMBINED_INSTRUCTIONS,
        example.trim(),
        list,
        data_markdown
    )
}

/// Settings for one composition run.
#[derive(Debug, Clone)]
pub struct ComposerOptions {
    pub mode: NarrativeMode,
    pub overall_attribute: String,
    pub example: String,
    /// Minimum delay between calls in per-pair mode.
    pub request_interval: Duration,
    pub show_progress: bool,
}

impl Default for ComposerOptions {
    fn default() -> Self {
        Self {
            mode: NarrativeMode::default(),
            overall_attribute: "Overall".to_string(),
            example: DEFAULT_EXAMPLE_NARRATIVE.to_string(),
            request_interval: Duration::from_secs(4),
            show_progress: true,
        }
    }
}

/// One prompt to send, with the requests it covers.
#[derive(Debug, Clone)]
pub struct PlannedPrompt {
    pub requests: Vec<NarrativeRequest>,
    pub prompt: String,
}

/// All prompts of a run plus the skipped lines and pairs.
#[derive(Debug, Clone, Default)]
pub struct NarrativePlan {
    pub prompts: Vec<PlannedPrompt>,
    pub issues: Vec<RequestIssue>,
}

impl NarrativePlan {
    pub fn warnings(&self) -> Vec<String> {
        self.issues.iter().map(|i| i.to_string()).collect()
    }

    /// Sections for a run that never calls the generator.
    pub fn dry_run_sections(&self) -> Vec<NarrativeSection> {
        self.prompts
            .iter()
            .map(|p| section(p, SectionOutcome::Skipped("dry run".to_string())))
            .collect()
    }
}

/// Build the prompts for a request list without calling anything.
pub fn plan_narrative(rows: &[AggregateRow], request_text: &str, options: &ComposerOptions) -> NarrativePlan {
    let (requests, mut issues) = parse_requests(request_text);

    let mut matched = Vec::new();
    for request in requests {
        let subset = filter_rows(rows, &request);
        if subset.is_empty() {
            let issue = RequestIssue::NoData { request };
            warn!("{}", issue);
            issues.push(issue);
            continue;
        }
        let table = render_table(&request, &subset, &options.overall_attribute);
        matched.push((request, table));
    }

    let prompts = match options.mode {
        NarrativeMode::PerPair => matched
            .into_iter()
            .map(|(request, table)| PlannedPrompt {
                prompt: build_single_prompt(&table, &options.example),
                requests: vec![request],
            })
            .collect(),
        NarrativeMode::Combined if matched.is_empty() => Vec::new(),
        NarrativeMode::Combined => {
            let (requests, tables): (Vec<_>, Vec<_>) = matched.into_iter().unzip();
            let data = tables.join("\n");
            vec![PlannedPrompt {
                prompt: build_combined_prompt(&data, &requests, &options.example),
                requests,
            }]
        }
    };

    debug!(
        "Planned {} prompts, {} skipped items",
        prompts.len(),
        issues.len()
    );
    NarrativePlan { prompts, issues }
}

/// Sections in request order plus the warnings collected along the way.
#[derive(Debug, Clone, Default)]
pub struct NarrativeRun {
    pub sections: Vec<NarrativeSection>,
    pub warnings: Vec<String>,
}

/// Send every planned prompt, one at a time.
///
/// A failed call only fails its own section, except for authentication
/// failures which skip everything after them. Cancellation is checked
/// before each call, both before and after the pacing delay.
pub async fn compose_narrative(
    plan: &NarrativePlan,
    generator: &dyn TextGenerator,
    options: &ComposerOptions,
    cancel: &CancellationFlag,
) -> NarrativeRun {
    let mut run = NarrativeRun {
        sections: Vec::with_capacity(plan.prompts.len()),
        warnings: plan.warnings(),
    };

    let progress = if options.show_progress && plan.prompts.len() > 1 {
        let pb = ProgressBar::new(plan.prompts.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    let interval = match options.mode {
        NarrativeMode::PerPair => options.request_interval,
        NarrativeMode::Combined => Duration::ZERO,
    };
    let mut pacer = Pacer::new(interval);
    let mut stop_reason: Option<String> = None;

    for planned in &plan.prompts {
        let label = planned
            .requests
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join(" ");

        note_cancellation(cancel, &mut stop_reason, &mut run.warnings);
        if stop_reason.is_none() {
            pacer.wait().await;
            // Ctrl-C during the pacing delay
            note_cancellation(cancel, &mut stop_reason, &mut run.warnings);
        }
        if let Some(reason) = &stop_reason {
            run.sections
                .push(section(planned, SectionOutcome::Skipped(reason.clone())));
            progress.inc(1);
            continue;
        }

        progress.set_message(label.clone());
        info!("Generating narrative for {}", label);

        let outcome = match generator.generate(&planned.prompt).await {
            Ok(text) => SectionOutcome::Generated(text.trim().to_string()),
            Err(e) => {
                error!("Generation failed for {}: {}", label, e);
                run.warnings.push(format!("`{}`: {}", label, e));
                if e.is_auth() {
                    stop_reason = Some("authentication failed".to_string());
                }
                SectionOutcome::Failed(e.to_string())
            }
        };
        run.sections.push(section(planned, outcome));
        progress.inc(1);
    }

    progress.finish_and_clear();
    run
}

fn note_cancellation(
    cancel: &CancellationFlag,
    stop_reason: &mut Option<String>,
    warnings: &mut Vec<String>,
) {
    if stop_reason.is_none() && cancel.is_cancelled() {
        *stop_reason = Some("cancelled".to_string());
        warnings.push("Run cancelled; remaining requests were not sent".to_string());
    }
}

fn section(planned: &PlannedPrompt, outcome: SectionOutcome) -> NarrativeSection {
    NarrativeSection {
        requests: planned.requests.iter().map(|r| r.to_string()).collect(),
        prompt: planned.prompt.clone(),
        outcome,
    }
}
