//! Markdown report generation.
//!
//! This module renders the narrative report from the sections produced by
//! the composer, and the JSON form of the same data.

use crate::models::{NarrativeReport, NarrativeSection, ReportMetadata, SectionOutcome};
use anyhow::{Context, Result};
use std::path::Path;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &NarrativeReport) -> String {
    let mut output = String::new();

    output.push_str("# Survey Narrative Report\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_sections(&report.sections));
    output.push_str(&generate_warnings_section(&report.warnings));
    output.push_str(&generate_footer());

    output
}

fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Source:** {}\n", metadata.source_file));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Model Used:** `{}`\n", metadata.model_used));
    section.push_str(&format!("- **Mode:** {}\n", metadata.mode));
    section.push_str(&format!("- **Requests:** {}\n", metadata.requests_total));
    section.push_str(&format!(
        "- **Sections Generated:** {}\n",
        metadata.sections_generated
    ));
    if metadata.sections_failed > 0 {
        section.push_str(&format!(
            "- **Sections Failed:** {}\n",
            metadata.sections_failed
        ));
    }
    section.push_str(&format!(
        "- **Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Sections in request order, each separated by a rule.
fn generate_sections(sections: &[NarrativeSection]) -> String {
    if sections.is_empty() {
        return "No narrative was generated.\n\n".to_string();
    }

    let mut output = String::new();
    for section in sections {
        output.push_str("---\n\n");
        match &section.outcome {
            SectionOutcome::Generated(text) => {
                output.push_str(text);
                output.push_str("\n\n");
            }
            SectionOutcome::Failed(message) => {
                output.push_str(&format!(
                    "> **Generation failed** for `{}`: {}\n\n",
                    section.requests.join(" "),
                    message
                ));
            }
            SectionOutcome::Skipped(reason) => {
                output.push_str(&format!(
                    "> *Not generated* for `{}` ({})\n\n",
                    section.requests.join(" "),
                    reason
                ));
            }
        }
    }
    output
}

fn generate_warnings_section(warnings: &[String]) -> String {
    if warnings.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Warnings\n\n");
    for warning in warnings {
        section.push_str(&format!("- {}\n", warning));
    }
    section.push('\n');
    section
}

fn generate_footer() -> String {
    format!(
        "---\n\n*Report generated by surveytab v{}*\n",
        env!("CARGO_PKG_VERSION")
    )
}

/// Generate a JSON report.
pub fn generate_json_report(report: &NarrativeReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Write every prompt of a dry run into one text file, in request order.
pub fn write_prompts(sections: &[NarrativeSection], path: &Path) -> Result<()> {
    let mut content = String::new();
    for section in sections {
        content.push_str(&format!(
            "===== {} =====\n\n{}\n\n",
            section.requests.join(" "),
            section.prompt
        ));
    }
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write prompts to {}", path.display()))
}
