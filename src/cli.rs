use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::{io_utils::InputFormat, mapping::Axis};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Map heterogeneous records onto chart axes",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Infer field types and print one descriptor per field
    Probe(ProbeArgs),
    /// Resolve the axis mapping and emit cleaned, canonical points
    Process(ProcessArgs),
}

/// Where records come from and how to read them.
#[derive(Debug, Args)]
pub struct InputArgs {
    /// Input file (JSON array, NDJSON or CSV/TSV); `-` reads stdin
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Override the format inferred from the file extension
    #[arg(long = "format", value_enum)]
    pub format: Option<InputFormat>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Yaml,
}

#[derive(Debug, Args)]
pub struct ProbeArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Rows scanned to discover field names (0 means full scan)
    #[arg(long, default_value_t = crate::analyzer::DEFAULT_SAMPLE_ROWS)]
    pub sample_rows: usize,
    /// Output format for the descriptors
    #[arg(long = "output-format", value_enum, default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct ProcessArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Output file for the JSON result (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Settings file (YAML or JSON); flags below override it
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    /// Explicit mapping `axis=field`, highest priority
    #[arg(long = "map", value_parser = parse_axis_binding, action = clap::ArgAction::Append)]
    pub mappings: Vec<(Axis, String)>,
    /// Field key `axis=field`, used where no explicit mapping applies
    #[arg(long = "key", value_parser = parse_axis_binding, action = clap::ArgAction::Append)]
    pub keys: Vec<(Axis, String)>,
    /// Disable automatic axis detection
    #[arg(long = "no-auto-detect")]
    pub no_auto_detect: bool,
    /// Minimum type confidence for automatic detection (0.0 - 1.0)
    #[arg(long = "threshold")]
    pub threshold: Option<f64>,
    /// Rows scanned to discover field names (0 means full scan)
    #[arg(long = "sample-rows")]
    pub sample_rows: Option<usize>,
    /// Keep null values instead of dropping them
    #[arg(long = "keep-nulls")]
    pub keep_nulls: bool,
    /// Keep rows that are not objects or have neither x nor y
    #[arg(long = "keep-invalid")]
    pub keep_invalid: bool,
    /// Skip type validation warnings
    #[arg(long = "no-validate")]
    pub no_validate: bool,
    /// Leave numeric-looking strings as text
    #[arg(long = "no-parse-numbers")]
    pub no_parse_numbers: bool,
    /// Leave date-looking strings as text
    #[arg(long = "no-parse-dates")]
    pub no_parse_dates: bool,
    /// Keep surrounding whitespace on strings
    #[arg(long = "no-trim")]
    pub no_trim: bool,
    /// Point filters such as `y>=100` or `category contains east`
    #[arg(long = "filter", action = clap::ArgAction::Append)]
    pub filters: Vec<String>,
    /// Boolean evalexpr filters such as `y > 10 && index < 50`
    #[arg(long = "filter-expr", action = clap::ArgAction::Append)]
    pub filter_exprs: Vec<String>,
    /// Sort directive of the form `field[:asc|desc]`
    #[arg(long = "sort")]
    pub sort: Option<String>,
    /// Skip this many points after sorting
    #[arg(long)]
    pub offset: Option<usize>,
    /// Limit number of points emitted
    #[arg(long)]
    pub limit: Option<usize>,
    /// Print a preview table instead of the JSON result
    #[arg(long = "table")]
    pub table: bool,
    /// Pretty-print the JSON result
    #[arg(long = "pretty")]
    pub pretty: bool,
}

/// Parses `axis=field`.
pub fn parse_axis_binding(value: &str) -> Result<(Axis, String), String> {
    let (axis, field) = value
        .split_once('=')
        .ok_or_else(|| format!("Expected axis=field, got '{value}'"))?;
    let axis = axis.parse::<Axis>().map_err(|err| err.to_string())?;
    let field = field.trim();
    if field.is_empty() {
        return Err(format!("Missing field name for axis '{axis}'"));
    }
    Ok((axis, field.to_string()))
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
