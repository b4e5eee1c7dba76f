use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use form_model_core::{
    ChangeStatistics, ErrorsByPath, FormConfig, FormModel, Schema, SchemaType, validate_all,
};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Output format for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum CliOutputFormat {
    Json,
    Yaml,
    Text,
}

#[derive(Debug, Parser)]
#[command(name = "form-inspect")]
#[command(about = "Inspect, validate and edit schema-driven form state")]
struct Cli {
    /// Log model operations to stderr (overridden by RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the initial form values derived from a schema.
    Defaults(DefaultsArgs),
    /// List every field with its type, required flag and value.
    Fields(FieldsArgs),
    /// Validate form values against a schema.
    Validate(ValidateArgs),
    /// Apply a set of path edits and report what changed.
    Apply(ApplyArgs),
}

#[derive(Debug, Args)]
struct SourceArgs {
    /// Schema JSON file (full object node or map of top-level properties).
    #[arg(long)]
    schema: PathBuf,
    /// JSON object with initial values for top-level properties.
    #[arg(long)]
    values: Option<PathBuf>,
    /// YAML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct DefaultsArgs {
    /// Schema JSON file.
    #[arg(long)]
    schema: PathBuf,
}

#[derive(Debug, Args)]
struct FieldsArgs {
    #[command(flatten)]
    source: SourceArgs,
}

#[derive(Debug, Args)]
struct ValidateArgs {
    #[command(flatten)]
    source: SourceArgs,
    /// Output format.
    #[arg(long, default_value = "text")]
    format: CliOutputFormat,
}

#[derive(Debug, Args)]
struct ApplyArgs {
    #[command(flatten)]
    source: SourceArgs,
    /// JSON object mapping field paths to new values.
    #[arg(long)]
    edits: PathBuf,
    /// Output format.
    #[arg(long, default_value = "json")]
    format: CliOutputFormat,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidationReport {
    valid: bool,
    error_count: usize,
    errors: ErrorsByPath,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApplyReport {
    statistics: ChangeStatistics,
    changed_paths: Vec<String>,
    values: Value,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::Defaults(args) => run_defaults(args),
        Command::Fields(args) => run_fields(args),
        Command::Validate(args) => run_validate(args),
        Command::Apply(args) => run_apply(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_defaults(args: DefaultsArgs) -> Result<(), String> {
    let model = FormModel::from_json(read_json(&args.schema)?).map_err(|e| e.to_string())?;
    let raw = serde_json::to_string_pretty(&model.values())
        .map_err(|err| format!("Failed to serialize values: {err}"))?;
    println!("{raw}");
    Ok(())
}

fn run_fields(args: FieldsArgs) -> Result<(), String> {
    let model = load_model(&args.source)?;
    for (path, field) in model.fields() {
        println!(
            "{path}\t{}\t{}\t{}",
            type_name(&field.schema),
            if field.required { "required" } else { "optional" },
            field.value
        );
    }
    Ok(())
}

fn run_validate(args: ValidateArgs) -> Result<(), String> {
    let mut model = load_model(&args.source)?;
    let valid = model.validate();
    let report = ValidationReport {
        valid,
        error_count: model.error_count(),
        errors: validate_all(model.fields(), &model.config().validation),
    };

    let rendered = match args.format {
        CliOutputFormat::Json => serde_json::to_string_pretty(&report)
            .map_err(|e| format!("JSON serialization failed: {e}"))?,
        CliOutputFormat::Yaml => {
            serde_yaml::to_string(&report).map_err(|e| format!("YAML serialization failed: {e}"))?
        }
        CliOutputFormat::Text => format_validation_text(&report),
    };
    println!("{}", rendered.trim_end());

    if report.valid {
        Ok(())
    } else {
        Err(format!("{} invalid field(s)", report.error_count))
    }
}

fn run_apply(args: ApplyArgs) -> Result<(), String> {
    let mut model = load_model(&args.source)?;
    let Value::Object(edits) = read_json(&args.edits)? else {
        return Err(format!(
            "'{}' must contain a JSON object of path/value pairs",
            args.edits.display()
        ));
    };

    for (path, value) in edits {
        model
            .set_value(&path, value)
            .map_err(|err| format!("Failed to set '{path}': {err}"))?;
    }

    let report = ApplyReport {
        statistics: model.change_statistics(),
        changed_paths: model.changed_paths(),
        values: model.values(),
    };
    let rendered = match args.format {
        CliOutputFormat::Json => serde_json::to_string_pretty(&report)
            .map_err(|e| format!("JSON serialization failed: {e}"))?,
        CliOutputFormat::Yaml => {
            serde_yaml::to_string(&report).map_err(|e| format!("YAML serialization failed: {e}"))?
        }
        CliOutputFormat::Text => format_apply_text(&report),
    };
    println!("{}", rendered.trim_end());
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn load_model(source: &SourceArgs) -> Result<FormModel, String> {
    let config = match &source.config {
        Some(path) => FormConfig::load(path)
            .map_err(|err| format!("Failed to load config '{}': {err}", path.display()))?,
        None => FormConfig::default(),
    };
    let model = FormModel::from_json_with_config(read_json(&source.schema)?, config)
        .map_err(|err| format!("Invalid schema '{}': {err}", source.schema.display()))?;

    let model = match &source.values {
        Some(path) => model.with_values(read_json(path)?),
        None => model,
    };
    debug!(fields = model.fields().len(), "Loaded form model");
    Ok(model)
}

fn read_json(path: &Path) -> Result<Value, String> {
    let raw = fs::read_to_string(path)
        .map_err(|err| format!("Failed to read '{}': {err}", path.display()))?;
    serde_json::from_str(&raw).map_err(|err| format!("Failed to parse '{}': {err}", path.display()))
}

fn type_name(schema: &Schema) -> &'static str {
    match schema.schema_type {
        Some(SchemaType::String) => "string",
        Some(SchemaType::Number) => "number",
        Some(SchemaType::Integer) => "integer",
        Some(SchemaType::Boolean) => "boolean",
        Some(SchemaType::Array) => "array",
        Some(SchemaType::Object) => "object",
        None => "any",
    }
}

fn format_validation_text(report: &ValidationReport) -> String {
    if report.valid {
        return "valid\n".to_string();
    }
    let mut out = String::new();
    for (path, messages) in &report.errors {
        for message in messages {
            out.push_str(&format!("{path}: {message}\n"));
        }
    }
    out
}

fn format_apply_text(report: &ApplyReport) -> String {
    let stats = &report.statistics;
    let mut out = format!(
        "{} field(s), {} changed, {} dirty\n",
        stats.total_fields, stats.changed_fields, stats.dirty_fields
    );
    for path in &report.changed_paths {
        out.push_str(&format!("changed: {path}\n"));
    }
    out
}
