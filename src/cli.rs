//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::ingest::{read_text, InputResult};
use crate::models::NarrativeMode;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

/// surveytab - survey tabulation and narrative reports
///
/// Parse question definitions, reshape and cross-tabulate response data,
/// and draft report commentary with a Gemini model.
///
/// Examples:
///   surveytab questions -m questions.md
///   surveytab tidy -m questions.md -d responses.csv -o tidy.csv
///   surveytab crosstab -m questions.md -d responses.csv --rows Q0-1 --cols Q3 --format markdown
///   surveytab percentages --counts out/crosstab_Q0-1_Q3_counts.csv --format markdown
///   surveytab narrate -d aggregate.csv -r "Q1,Overall" -r "Q1,Gender"
///   surveytab axis-report -m questions.md -d responses.csv --tag mobility
///   surveytab init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    ///
    /// If not specified, looks for .surveytab.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List the questions of a definition document
    Questions(QuestionsArgs),
    /// Reshape wide response data into tidy records
    Tidy(TidyArgs),
    /// Cross-tabulate two questions
    Crosstab(CrosstabArgs),
    /// Recompute percentages from an exported counts sheet
    Percentages(PercentagesArgs),
    /// Generate narrative commentary from aggregated data
    Narrate(NarrateArgs),
    /// Percentage tables of tagged questions against demographic axes
    AxisReport(AxisReportArgs),
    /// Write a sample aggregate CSV showing the expected columns
    SampleAggregate(SampleArgs),
    /// Generate a default .surveytab.toml configuration file
    InitConfig,
}

/// Definition document options shared by several commands.
#[derive(ClapArgs, Debug, Clone)]
pub struct MetadataArgs {
    /// Question definition document (Markdown with yaml blocks)
    #[arg(short, long, value_name = "FILE")]
    pub metadata: PathBuf,

    /// Skip definition blocks without a `type` field
    #[arg(long)]
    pub strict: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct QuestionsArgs {
    #[command(flatten)]
    pub metadata: MetadataArgs,

    /// Response CSV to check question columns against
    #[arg(short, long, value_name = "FILE")]
    pub data: Option<PathBuf>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct TidyArgs {
    #[command(flatten)]
    pub metadata: MetadataArgs,

    /// Wide response CSV (first column is the respondent number)
    #[arg(short, long, value_name = "FILE")]
    pub data: PathBuf,

    /// Output CSV path (default: <output_dir>/tidy.csv)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct CrosstabArgs {
    #[command(flatten)]
    pub metadata: MetadataArgs,

    /// Wide response CSV
    #[arg(short, long, value_name = "FILE")]
    pub data: PathBuf,

    /// Question id for the row axis
    #[arg(long, value_name = "QID")]
    pub rows: String,

    /// Question id for the column axis
    #[arg(long, value_name = "QID")]
    pub cols: String,

    /// Output format
    #[arg(long, default_value = "text", value_name = "FORMAT")]
    pub format: CrosstabFormat,

    /// Leave out respondents without an answer on either axis
    #[arg(long)]
    pub exclude_no_answer: bool,

    /// Output file (a directory for --format csv); printed to stdout otherwise
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct PercentagesArgs {
    /// Counts sheet written by `crosstab --format csv`
    #[arg(long, value_name = "FILE")]
    pub counts: PathBuf,

    /// Output format
    #[arg(long, default_value = "text", value_name = "FORMAT")]
    pub format: CrosstabFormat,

    /// Output file (a directory for --format csv); printed to stdout otherwise
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct NarrateArgs {
    /// Aggregate CSV with QuestionID, QuestionText, AnswerType, Attribute,
    /// Category, Choice, ValueType and Value columns
    #[arg(short, long, value_name = "FILE")]
    pub data: PathBuf,

    /// Request (`question id,attribute`), may be repeated
    #[arg(short, long = "request", value_name = "QID,ATTR")]
    pub requests: Vec<String>,

    /// File with one `question id,attribute` request per line
    #[arg(long, value_name = "FILE")]
    pub requests_file: Option<PathBuf>,

    /// File with an example narrative whose structure and tone the model should follow
    #[arg(long, value_name = "FILE")]
    pub example: Option<PathBuf>,

    /// One call for all requests, or one paced call per request
    #[arg(long, default_value = "per-pair", value_name = "MODE")]
    pub mode: NarrativeMode,

    /// Gemini model name
    #[arg(long)]
    pub model: Option<String>,

    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Temperature for generation (0.0 - 2.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Minimum seconds between requests in per-pair mode
    #[arg(long, value_name = "SECS")]
    pub interval: Option<u64>,

    /// Attribute name used for whole-sample rows
    #[arg(long, value_name = "NAME")]
    pub overall: Option<String>,

    /// Report path (default: <output_dir>/narrative_report.md or .json)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Build and write the prompts without calling the model
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct AxisReportArgs {
    #[command(flatten)]
    pub metadata: MetadataArgs,

    /// Wide response CSV
    #[arg(short, long, value_name = "FILE")]
    pub data: PathBuf,

    /// Tag that selects the questions
    #[arg(short, long)]
    pub tag: String,

    /// Analysis axis as QID or QID=Name, may be repeated (default: Q0-3, Q0-1, Q1-1, Q1-3, Q2-8)
    #[arg(long = "axis", value_name = "QID[=NAME]")]
    pub axes: Vec<String>,

    /// Report path (default: <output_dir>/axis_report_<tag>.md)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct SampleArgs {
    /// Output CSV path
    #[arg(short, long, default_value = "sample_survey_data.csv", value_name = "FILE")]
    pub output: PathBuf,
}

/// Output format for the narrative report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// Output format for a crosstab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum CrosstabFormat {
    /// Aligned table with counts and percentages (default)
    #[default]
    Text,
    /// Markdown tables
    Markdown,
    /// Tab-separated percentages for pasting into a spreadsheet
    Tsv,
    /// JSON with counts and numeric percentages
    Json,
    /// Two CSV sheets: counts and percentages
    Csv,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        match &self.command {
            Command::Crosstab(args) => {
                if args.rows.trim().is_empty() || args.cols.trim().is_empty() {
                    return Err("--rows and --cols must name question ids".to_string());
                }
            }
            Command::Narrate(args) => {
                if args.requests.is_empty() && args.requests_file.is_none() {
                    return Err(
                        "Give at least one --request or a --requests-file".to_string()
                    );
                }
                if let Some(temperature) = args.temperature {
                    if !(0.0..=2.0).contains(&temperature) {
                        return Err("Temperature must be between 0.0 and 2.0".to_string());
                    }
                }
                if let Some(timeout) = args.timeout {
                    if timeout == 0 {
                        return Err("Timeout must be at least 1 second".to_string());
                    }
                }
            }
            Command::AxisReport(args) => {
                if args.tag.trim().is_empty() {
                    return Err("--tag must not be empty".to_string());
                }
                if let Some(bad) = args.axes.iter().find(|a| a.split('=').next().unwrap_or("").trim().is_empty()) {
                    return Err(format!("Invalid --axis value: '{}'", bad));
                }
            }
            _ => {}
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

impl NarrateArgs {
    /// Request lines from `--request` flags followed by the requests file.
    /// The file is decoded like every other input (BOM, Shift_JIS).
    pub fn request_text(&self) -> InputResult<String> {
        let mut text = self.requests.join("\n");
        if let Some(ref path) = self.requests_file {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(&read_text(path)?);
        }
        Ok(text)
    }
}

impl AxisReportArgs {
    /// Parsed `--axis` values as (qid, display name).
    pub fn axis_pairs(&self) -> Vec<(String, String)> {
        self.axes
            .iter()
            .map(|value| match value.split_once('=') {
                Some((qid, name)) if !name.trim().is_empty() => {
                    (qid.trim().to_string(), name.trim().to_string())
                }
                Some((qid, _)) => (qid.trim().to_string(), qid.trim().to_string()),
                None => (value.trim().to_string(), value.trim().to_string()),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_crosstab_arguments() {
        let args = parse(&[
            "surveytab", "crosstab", "-m", "q.md", "-d", "r.csv", "--rows", "Q0-1", "--cols",
            "Q3", "--format", "tsv",
        ]);
        match args.command {
            Command::Crosstab(c) => {
                assert_eq!(c.rows, "Q0-1");
                assert_eq!(c.format, CrosstabFormat::Tsv);
                assert!(!c.exclude_no_answer);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_percentages_arguments() {
        let args = parse(&["surveytab", "percentages", "--counts", "c.csv", "--format", "json"]);
        assert!(args.validate().is_ok());
        match args.command {
            Command::Percentages(p) => {
                assert_eq!(p.counts, PathBuf::from("c.csv"));
                assert_eq!(p.format, CrosstabFormat::Json);
                assert!(p.output.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = parse(&["surveytab", "questions", "-m", "q.md", "--verbose"]);
        assert!(args.verbose);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let args = parse(&["surveytab", "-v", "-q", "init-config"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_narrate_requires_requests() {
        let args = parse(&["surveytab", "narrate", "-d", "agg.csv"]);
        assert!(args.validate().is_err());

        let args = parse(&["surveytab", "narrate", "-d", "agg.csv", "-r", "Q1,Overall", "--temperature", "3.5"]);
        assert!(args.validate().is_err());

        let args = parse(&["surveytab", "narrate", "-d", "agg.csv", "-r", "Q1,Overall", "--mode", "combined"]);
        assert!(args.validate().is_ok());
        match args.command {
            Command::Narrate(n) => {
                assert_eq!(n.mode, NarrativeMode::Combined);
                assert_eq!(n.request_text().unwrap(), "Q1,Overall");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_requests_file_with_bom() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("requests.txt");
        std::fs::write(&path, "\u{FEFF}Q1,Overall\r\nQ2,Gender\r\n").unwrap();

        let args = parse(&[
            "surveytab",
            "narrate",
            "-d",
            "agg.csv",
            "-r",
            "Q3,Overall",
            "--requests-file",
            path.to_str().unwrap(),
        ]);
        match args.command {
            Command::Narrate(n) => {
                let text = n.request_text().unwrap();
                let lines: Vec<&str> = text.lines().collect();
                assert_eq!(lines, vec!["Q3,Overall", "Q1,Overall", "Q2,Gender"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_axis_pairs() {
        let args = parse(&[
            "surveytab", "axis-report", "-m", "q.md", "-d", "r.csv", "-t", "mobility", "--axis",
            "Q0-3=Area", "--axis", "Q2-8",
        ]);
        match args.command {
            Command::AxisReport(a) => assert_eq!(
                a.axis_pairs(),
                vec![
                    ("Q0-3".to_string(), "Area".to_string()),
                    ("Q2-8".to_string(), "Q2-8".to_string())
                ]
            ),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_log_level() {
        let mut args = parse(&["surveytab", "init-config"]);
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
