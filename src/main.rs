//! surveytab - survey tabulation and narrative reports
//!
//! A CLI tool that parses question definitions, reshapes and
//! cross-tabulates questionnaire responses, and drafts report
//! commentary from aggregated results with a Gemini model.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Invalid arguments, unreadable input, or a failed run

mod aggregate;
mod cli;
mod config;
mod generation;
mod ingest;
mod labels;
mod metadata;
mod models;
mod report;
mod reshape;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use cli::{
    Args, AxisReportArgs, Command, CrosstabArgs, CrosstabFormat, MetadataArgs, NarrateArgs,
    OutputFormat, PercentagesArgs, QuestionsArgs, SampleArgs, TidyArgs,
};
use config::{Config, DEFAULT_CONFIG_FILE};
use generation::{CancellationFlag, GeminiClient, GeminiConfig, GenerationError, TextGenerator};
use labels::LabelResolver;
use metadata::ParseMode;
use models::{NarrativeReport, QuestionBook, ReportMetadata};
use report::{AnalysisAxis, ComposerOptions, NarrativeRun};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle init-config early (no logging needed)
    if matches!(args.command, Command::InitConfig) {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("surveytab v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run(args).await {
        error!("Run failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }
    Ok(())
}

/// Handle init-config: generate a default .surveytab.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to customize the model, output directory, and override axes.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Load configuration and dispatch to the subcommand.
async fn run(args: Args) -> Result<()> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    match &args.command {
        Command::Questions(a) => run_questions(a, &config),
        Command::Tidy(a) => run_tidy(a, &config),
        Command::Crosstab(a) => run_crosstab(a, &config),
        Command::Percentages(a) => run_percentages(a, &config),
        Command::Narrate(a) => run_narrate(a, &config, args.quiet).await,
        Command::AxisReport(a) => run_axis_report(a, &config),
        Command::SampleAggregate(a) => run_sample(a),
        Command::InitConfig => handle_init_config(),
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}

/// Read and parse the definition document, logging skipped blocks.
fn load_questions(args: &MetadataArgs, config: &Config) -> Result<QuestionBook> {
    let mode = if config.labels.strict_metadata {
        ParseMode::Strict
    } else {
        ParseMode::Lenient
    };

    let text = ingest::read_text(&args.metadata)?;
    let parsed = metadata::parse_with_notes(&text, mode);
    for note in &parsed.notes {
        warn!("{}: {}", args.metadata.display(), note);
    }

    if parsed.book.is_empty() {
        bail!(
            "No question definitions found in {}",
            args.metadata.display()
        );
    }
    info!(
        "Parsed {} questions from {}",
        parsed.book.len(),
        args.metadata.display()
    );
    Ok(parsed.book)
}

fn run_questions(args: &QuestionsArgs, config: &Config) -> Result<()> {
    let book = load_questions(&args.metadata, config)?;

    println!("📋 {} questions in {}\n", book.len(), args.metadata.metadata.display());
    for question in book.iter() {
        println!(
            "   {:<8} {:<8} {:>3} choices  {}",
            question.id,
            question.answer_type.to_string(),
            question.choices.len(),
            question.short_text(30)
        );
    }

    let overrides = config.override_table();
    let axes: Vec<&str> = overrides.axes().collect();
    if !axes.is_empty() {
        println!("\n   Fixed label tables: {}", axes.join(", "));
    }

    if let Some(ref data) = args.data {
        let table = ingest::read_response_table(data)?;
        let columns: Vec<&str> = table.headers.iter().skip(1).map(String::as_str).collect();
        let present = book.iter().filter(|q| columns.contains(&q.id.as_str())).count();
        let undeclared: Vec<&str> = columns
            .iter()
            .copied()
            .filter(|c| !book.contains(c))
            .collect();

        println!("\n🔍 {} ({} respondents)", data.display(), table.len());
        if table.is_empty() {
            println!("   ⚠️  No respondent rows");
        }
        if let Some(id) = table.id_column() {
            println!("   Respondent column: {}", id);
        }
        println!("   Questions with a data column: {}/{}", present, book.len());
        if !undeclared.is_empty() {
            println!("   Columns without a definition: {}", undeclared.join(", "));
        }
    }

    Ok(())
}

fn run_tidy(args: &TidyArgs, config: &Config) -> Result<()> {
    let book = load_questions(&args.metadata, config)?;

    println!("📥 Reading responses: {}", args.data.display());
    let table = ingest::read_response_table(&args.data)?;
    let resolver = LabelResolver::new(&book, config.override_table());

    let output = reshape::to_tidy(&table, &book, &resolver);

    let path = config.output_path(args.output.as_deref(), "tidy.csv");
    ensure_parent(&path)?;
    let file = std::fs::File::create(&path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    ingest::write_tidy(file, &output.records)?;

    println!("\n📊 Reshape Summary:");
    println!("   Respondents: {}", table.len());
    println!("   Tidy records: {}", output.records.len());
    if !output.warnings.is_empty() {
        println!("   Ignored columns: {}", output.warnings.len());
    }
    println!("\n✅ Tidy data saved to: {}", path.display());
    Ok(())
}

fn run_crosstab(args: &CrosstabArgs, config: &Config) -> Result<()> {
    let book = load_questions(&args.metadata, config)?;
    let table = ingest::read_response_table(&args.data)?;
    let resolver = LabelResolver::new(&book, config.override_table());

    let options = aggregate::CrosstabOptions {
        include_no_answer: !args.exclude_no_answer,
    };
    let result = aggregate::crosstab(&table, &args.rows, &args.cols, &resolver, options)?;
    info!(
        "Crosstab {} x {}: {} respondents counted",
        args.rows,
        args.cols,
        result.counts.grand_total()
    );

    emit_crosstab(&result, args.format, args.output.as_deref(), config)
}

fn run_percentages(args: &PercentagesArgs, config: &Config) -> Result<()> {
    let counts = ingest::read_counts_sheet(&args.counts)?;
    if counts.row_labels.last().map(String::as_str) != Some(models::TOTAL_LABEL) {
        warn!(
            "{} has no trailing Total row; percentages assume it does",
            args.counts.display()
        );
    }

    let result = models::Crosstab {
        percentages: aggregate::row_percentages(&counts),
        counts,
    };
    emit_crosstab(&result, args.format, args.output.as_deref(), config)
}

/// Render a crosstab in the requested format to a file, or to stdout.
fn emit_crosstab(
    result: &models::Crosstab,
    format: CrosstabFormat,
    output_path: Option<&Path>,
    config: &Config,
) -> Result<()> {
    let row_axis = &result.counts.row_axis;
    let output = match format {
        CrosstabFormat::Text => aggregate::crosstab_text(result),
        CrosstabFormat::Markdown => aggregate::crosstab_markdown(result),
        CrosstabFormat::Tsv => aggregate::percentages_tsv(row_axis, &result.percentages),
        CrosstabFormat::Json => serde_json::to_string_pretty(result)?,
        CrosstabFormat::Csv => {
            let dir = match output_path {
                Some(dir) => dir.to_path_buf(),
                None => Path::new(&config.general.output_dir).to_path_buf(),
            };
            let stem = format!("crosstab_{}_{}", row_axis, result.counts.col_axis);
            let (counts, percentages) = ingest::write_workbook(&dir, &stem, result)?;
            println!("✅ Counts saved to: {}", counts.display());
            println!("✅ Percentages saved to: {}", percentages.display());
            return Ok(());
        }
    };

    match output_path {
        Some(path) => {
            ensure_parent(path)?;
            std::fs::write(path, &output)
                .with_context(|| format!("Failed to write crosstab to {}", path.display()))?;
            println!("✅ Crosstab saved to: {}", path.display());
        }
        None => println!("{}", output),
    }
    Ok(())
}

async fn run_narrate(args: &NarrateArgs, config: &Config, quiet: bool) -> Result<()> {
    let start_time = Instant::now();

    println!("📥 Reading aggregate data: {}", args.data.display());
    let rows = ingest::read_aggregate_rows(&args.data)?;
    info!("Loaded {} aggregate rows", rows.len());

    let request_text = args
        .request_text()
        .context("Failed to read the requests file")?;

    let example = match args.example {
        Some(ref path) => ingest::read_text(path)?,
        None => report::DEFAULT_EXAMPLE_NARRATIVE.to_string(),
    };

    let options = ComposerOptions {
        mode: args.mode,
        overall_attribute: config.labels.overall_attribute.clone(),
        example,
        request_interval: Duration::from_secs(config.model.request_interval_seconds),
        show_progress: !quiet,
    };

    let plan = report::plan_narrative(&rows, &request_text, &options);
    for warning in plan.warnings() {
        println!("   ⚠️  {}", warning);
    }
    if plan.prompts.is_empty() {
        bail!("None of the requests matched the aggregate data");
    }

    if args.dry_run {
        let path = config.output_path(args.output.as_deref(), "prompts.txt");
        ensure_parent(&path)?;
        report::write_prompts(&plan.dry_run_sections(), &path)?;
        println!(
            "\n✅ Dry run complete. {} prompts written to {}. No model calls were made.",
            plan.prompts.len(),
            path.display()
        );
        return Ok(());
    }

    let client = build_client(config)?;

    println!("🤖 Generating narrative...");
    println!("   Model: {}", client.model_name());
    println!("   Mode: {}", options.mode);
    println!("   Prompts: {}", plan.prompts.len());
    if options.mode == models::NarrativeMode::PerPair && plan.prompts.len() > 1 {
        println!(
            "   Interval: {}s between requests",
            config.model.request_interval_seconds
        );
    }

    let cancel = CancellationFlag::new();
    cancel.listen_for_ctrl_c();

    let NarrativeRun { sections, warnings } =
        report::compose_narrative(&plan, &client, &options, &cancel).await;

    let mut report = NarrativeReport {
        metadata: ReportMetadata {
            source_file: args.data.display().to_string(),
            generated_at: Utc::now(),
            model_used: client.model_name().to_string(),
            mode: options.mode,
            requests_total: plan.prompts.iter().map(|p| p.requests.len()).sum(),
            sections_generated: 0,
            sections_failed: 0,
            duration_seconds: start_time.elapsed().as_secs_f64(),
        },
        sections,
        warnings,
    };
    report.calculate_summary();

    let (output, default_name) = match args.format {
        OutputFormat::Json => (report::generate_json_report(&report)?, "narrative_report.json"),
        OutputFormat::Markdown => (
            report::generate_markdown_report(&report),
            "narrative_report.md",
        ),
    };

    let path = config.output_path(args.output.as_deref(), default_name);
    ensure_parent(&path)?;
    std::fs::write(&path, &output)
        .with_context(|| format!("Failed to write report to {}", path.display()))?;

    println!("\n📊 Narrative Summary:");
    println!("   Sections generated: {}", report.metadata.sections_generated);
    println!("   Sections failed: {}", report.metadata.sections_failed);
    println!("   Warnings: {}", report.warnings.len());
    println!("   Duration: {:.1}s", report.metadata.duration_seconds);
    println!("\n✅ Report saved to: {}", path.display());

    if report.metadata.sections_generated == 0 {
        bail!("No section could be generated");
    }
    Ok(())
}

/// Build the Gemini client from the merged configuration.
fn build_client(config: &Config) -> Result<GeminiClient> {
    let api_key = config.model.api_key.clone().unwrap_or_default();

    let client = GeminiClient::new(GeminiConfig {
        api_url: config.model.api_url.clone(),
        model: config.model.name.clone(),
        api_key,
        temperature: config.model.temperature,
        max_output_tokens: config.model.max_output_tokens,
        timeout_seconds: config.model.timeout_seconds,
    });

    match client {
        Ok(client) => Ok(client),
        Err(GenerationError::MissingCredential) => bail!(
            "No API key. Set GEMINI_API_KEY, pass --api-key, or add api_key under [model] in {}",
            DEFAULT_CONFIG_FILE
        ),
        Err(e) => Err(e.into()),
    }
}

fn run_axis_report(args: &AxisReportArgs, config: &Config) -> Result<()> {
    let book = load_questions(&args.metadata, config)?;
    let table = ingest::read_response_table(&args.data)?;
    let resolver = LabelResolver::new(&book, config.override_table());

    let axes = if args.axes.is_empty() {
        report::default_axes()
    } else {
        args.axis_pairs()
            .iter()
            .map(|(qid, name)| AnalysisAxis::new(qid, name))
            .collect()
    };

    println!(
        "🔬 Building axis report for tag '{}' over {} axes...",
        args.tag.trim(),
        axes.len()
    );
    let output = report::generate_axis_report(&book, &table, &resolver, &args.tag, &axes)?;

    let default_name = format!("axis_report_{}.md", args.tag.trim());
    let path = config.output_path(args.output.as_deref(), &default_name);
    ensure_parent(&path)?;
    std::fs::write(&path, &output)
        .with_context(|| format!("Failed to write report to {}", path.display()))?;

    println!("\n✅ Axis report saved to: {}", path.display());
    Ok(())
}

fn run_sample(args: &SampleArgs) -> Result<()> {
    ensure_parent(&args.output)?;
    let file = std::fs::File::create(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;
    let rows = ingest::sample_aggregate_rows();
    ingest::write_aggregate_rows(file, &rows)?;

    println!(
        "✅ Sample aggregate data ({} rows) saved to: {}",
        rows.len(),
        args.output.display()
    );
    Ok(())
}

/// Create the parent directory of an output path if needed.
fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
    }
    Ok(())
}
