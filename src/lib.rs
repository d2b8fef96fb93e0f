pub mod analyzer;
pub mod auto_map;
pub mod clean;
pub mod cli;
pub mod config;
pub mod data;
pub mod detect;
pub mod document;
pub mod error;
pub mod expr;
pub mod filter;
pub mod io_utils;
pub mod mapping;
pub mod pipeline;
pub mod process;
pub mod search;
pub mod stats;
pub mod table;
pub mod transform;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{LevelFilter, debug, info, warn};

pub use crate::{
    analyzer::FieldDescriptor,
    config::{ProcessorConfig, ProcessorSettings, RowFilter, SortDirection, SortSpec},
    data::{RawRecord, Value},
    detect::{DataType, DefaultTypeDetector, Detection, TypeDetector},
    mapping::{Accessor, Axis, AxisMap, AxisResolver, AxisState, CanonicalMapping},
    pipeline::{DataProcessor, ProcessorResult, process, process_value},
    stats::Statistics,
    transform::ProcessedPoint,
};

use crate::{
    cli::{Cli, Commands, InputArgs, OutputFormat},
    io_utils::InputOptions,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("vizmap", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Probe(args) => handle_probe(&args),
        Commands::Process(args) => handle_process(&args),
    }
}

fn load_records(args: &InputArgs) -> Result<serde_json::Value> {
    let options = InputOptions {
        format: args.format,
        delimiter: args.delimiter,
        encoding: io_utils::resolve_encoding(args.input_encoding.as_deref())?,
    };
    io_utils::read_input(&args.input, &options)
        .with_context(|| format!("Loading records from {:?}", args.input))
}

fn handle_probe(args: &cli::ProbeArgs) -> Result<()> {
    info!("Probing '{}'", args.input.input.display());
    let records = load_records(&args.input)?;
    let Some(rows) = records.as_array() else {
        bail!("Input must be an array of records");
    };
    let mut warnings = Vec::new();
    let fields = analyzer::analyze_fields(rows, args.sample_rows, &DefaultTypeDetector, &mut warnings);
    for warning in &warnings {
        warn!("{warning}");
    }
    let rendered = match args.output_format {
        OutputFormat::Table => table::render_fields(&fields),
        OutputFormat::Json => serde_json::to_string_pretty(&fields)?,
        OutputFormat::Yaml => document::to_string(&fields)?,
    };
    io_utils::write_output(None, &rendered)?;
    info!(
        "Described {} field(s) across {} row(s)",
        fields.len(),
        rows.len()
    );
    Ok(())
}

/// Settings file first, then command-line flags on top.
fn build_config(args: &cli::ProcessArgs) -> Result<ProcessorConfig> {
    let mut settings = match &args.config {
        Some(path) => ProcessorSettings::load(path)?,
        None => ProcessorSettings::default(),
    };
    for (axis, field) in &args.mappings {
        settings.mapping.set(*axis, field.clone());
    }
    for (axis, field) in &args.keys {
        settings.keys.set(*axis, field.clone());
    }
    if args.no_auto_detect {
        settings.auto_detect = false;
    }
    if let Some(threshold) = args.threshold {
        if !(0.0..=1.0).contains(&threshold) {
            bail!("--threshold must be between 0 and 1, got {threshold}");
        }
        settings.auto_detect_threshold = threshold;
    }
    if let Some(rows) = args.sample_rows {
        settings.sample_rows = rows;
    }
    settings.remove_nulls &= !args.keep_nulls;
    settings.remove_invalid &= !args.keep_invalid;
    settings.validate_types &= !args.no_validate;
    settings.parse_numbers &= !args.no_parse_numbers;
    settings.parse_dates &= !args.no_parse_dates;
    settings.trim_strings &= !args.no_trim;
    settings.filters.extend(args.filters.iter().cloned());
    settings.filter_exprs.extend(args.filter_exprs.iter().cloned());
    if let Some(sort) = &args.sort {
        settings.sort = Some(sort.parse().with_context(|| format!("Parsing --sort '{sort}'"))?);
    }
    if let Some(offset) = args.offset {
        settings.offset = offset;
    }
    if args.limit.is_some() {
        settings.limit = args.limit;
    }
    debug!("Effective settings: {settings:?}");
    settings.into_config()
}

fn handle_process(args: &cli::ProcessArgs) -> Result<()> {
    info!("Processing '{}'", args.input.input.display());
    let config = build_config(args)?;
    let records = load_records(&args.input)?;

    let result = DataProcessor::new().process_value(&records, &config);
    for error in &result.errors {
        warn!("{error}");
    }
    for warning in &result.warnings {
        debug!("{warning}");
    }
    if !result.warnings.is_empty() {
        info!("{} warning(s) recorded in the result", result.warnings.len());
    }

    let rendered = if args.table {
        let mut rendered = table::render_points(&result.data);
        rendered.push('\n');
        rendered.push_str(&result.statistics.render_summary());
        rendered
    } else if args.pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    io_utils::write_output(args.output.as_deref(), &rendered)?;
    info!(
        "Emitted {} of {} row(s)",
        result.statistics.valid, result.statistics.total
    );
    Ok(())
}
