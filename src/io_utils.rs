//! Input loading and output writing for the command line.
//!
//! Inputs are turned into one JSON value that the processor accepts:
//!
//! - **JSON**: the document as-is (a non-array document is passed through and
//!   reported by the processor).
//! - **NDJSON** (`.ndjson`, `.jsonl`): one record per non-blank line.
//! - **CSV/TSV**: a header row, then one object per record. Cells stay strings
//!   for the cleaner to coerce; empty cells become `null`.
//!
//! The `-` path reads stdin or writes stdout. Input bytes are decoded with
//! `encoding_rs`, defaulting to UTF-8.

use std::{
    fs::File,
    io::{BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use clap::ValueEnum;
use encoding_rs::{Encoding, UTF_8};
use log::debug;
use serde_json::{Map, Value as Json};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InputFormat {
    Json,
    Ndjson,
    Csv,
}

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

/// Picks the input format from the extension; stdin and unknown extensions are JSON.
pub fn resolve_input_format(path: &Path, provided: Option<InputFormat>) -> InputFormat {
    provided.unwrap_or_else(|| match extension(path).as_deref() {
        Some("ndjson" | "jsonl") => InputFormat::Ndjson,
        Some("csv" | "tsv") => InputFormat::Csv,
        _ => InputFormat::Json,
    })
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match extension(path).as_deref() {
        Some("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

fn open_input(path: &Path) -> Result<Box<dyn Read>> {
    if is_dash(path) {
        Ok(Box::new(std::io::stdin().lock()))
    } else {
        Ok(Box::new(
            File::open(path).with_context(|| format!("Opening input file {path:?}"))?,
        ))
    }
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(false);
    builder.from_reader(reader)
}

/// Options that shape how an input file becomes records.
#[derive(Debug, Clone, Copy)]
pub struct InputOptions {
    pub format: Option<InputFormat>,
    pub delimiter: Option<u8>,
    pub encoding: &'static Encoding,
}

impl Default for InputOptions {
    fn default() -> Self {
        Self {
            format: None,
            delimiter: None,
            encoding: UTF_8,
        }
    }
}

pub fn read_input(path: &Path, options: &InputOptions) -> Result<Json> {
    let format = resolve_input_format(path, options.format);
    debug!("Reading {path:?} as {format:?}");
    let reader = open_input(path)?;
    match format {
        InputFormat::Json => {
            let text = read_text(reader, options.encoding)?;
            serde_json::from_str(&text).with_context(|| format!("Parsing JSON from {path:?}"))
        }
        InputFormat::Ndjson => {
            let text = read_text(reader, options.encoding)?;
            parse_ndjson(&text).with_context(|| format!("Parsing NDJSON from {path:?}"))
        }
        InputFormat::Csv => {
            let delimiter = resolve_input_delimiter(path, options.delimiter);
            read_csv_records(reader, delimiter, options.encoding)
                .with_context(|| format!("Reading CSV from {path:?}"))
        }
    }
}

fn read_text(mut reader: Box<dyn Read>, encoding: &'static Encoding) -> Result<String> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    decode_bytes(&bytes, encoding)
}

pub fn parse_ndjson(text: &str) -> Result<Json> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line).with_context(|| format!("Line {}", idx + 1))
        })
        .collect::<Result<Vec<_>>>()
        .map(Json::Array)
}

pub fn read_csv_records<R: Read>(
    reader: R,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<Json> {
    let mut reader = open_csv_reader(reader, delimiter);
    let headers = decode_record(&reader.byte_headers()?.clone(), encoding)?;
    let mut rows = Vec::new();
    let mut record = csv::ByteRecord::new();
    while reader.read_byte_record(&mut record)? {
        let cells = decode_record(&record, encoding)?;
        let object = headers
            .iter()
            .zip(cells)
            .map(|(header, cell)| {
                let value = if cell.is_empty() {
                    Json::Null
                } else {
                    Json::String(cell)
                };
                (header.clone(), value)
            })
            .collect::<Map<_, _>>();
        rows.push(Json::Object(object));
    }
    debug!("Read {} CSV record(s) with {} column(s)", rows.len(), headers.len());
    Ok(Json::Array(rows))
}

/// Writes `contents` to `path`, or stdout when `path` is `None` or `-`.
pub fn write_output(path: Option<&Path>, contents: &str) -> Result<()> {
    let mut writer: Box<dyn Write> = match path {
        Some(p) if !is_dash(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        _ => Box::new(std::io::stdout().lock()),
    };
    writer.write_all(contents.as_bytes())?;
    if !contents.ends_with('\n') {
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}
