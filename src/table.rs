use std::borrow::Cow;
use std::fmt::Write as _;

use crate::{
    analyzer::FieldDescriptor,
    data::Value,
    mapping::Axis,
    transform::ProcessedPoint,
};

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths = headers
        .iter()
        .map(|h| display_width(h).max(1))
        .collect::<Vec<_>>();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(display_width(cell));
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));

    let separator_widths = widths.iter().map(|w| (*w).max(3)).collect::<Vec<_>>();
    let separator = separator_widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&separator, &separator_widths));

    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

fn cell(value: Option<&Value>) -> String {
    value.map(Value::as_display).unwrap_or_default()
}

/// One row per point: the original index followed by the six axes.
pub fn render_points(points: &[ProcessedPoint<'_>]) -> String {
    let headers = std::iter::once("index")
        .chain(Axis::ALL.iter().map(Axis::as_str))
        .map(String::from)
        .collect::<Vec<_>>();
    let rows = points
        .iter()
        .map(|point| {
            std::iter::once(point.index.to_string())
                .chain(Axis::ALL.iter().map(|axis| cell(point.get(*axis))))
                .collect()
        })
        .collect::<Vec<_>>();
    render_table(&headers, &rows)
}

pub fn render_fields(fields: &[FieldDescriptor]) -> String {
    let headers = ["field", "type", "confidence", "unique", "nulls", "samples"]
        .into_iter()
        .map(String::from)
        .collect::<Vec<_>>();
    let rows = fields
        .iter()
        .map(|field| {
            let samples = field
                .sample_values
                .iter()
                .map(|sample| match sample {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(", ");
            vec![
                field.name.clone(),
                field.inferred_type.to_string(),
                format!("{:.2}", field.confidence),
                field.unique_count.to_string(),
                field.null_count.to_string(),
                samples,
            ]
        })
        .collect::<Vec<_>>();
    render_table(&headers, &rows)
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let mut line = values
        .iter()
        .zip(widths)
        .map(|(value, width)| {
            let sanitized = sanitize_cell(value);
            let padding = width.saturating_sub(display_width(&sanitized));
            format!("{sanitized}{}", " ".repeat(padding))
        })
        .collect::<Vec<_>>()
        .join("  ");
    line.truncate(line.trim_end().len());
    line
}

fn display_width(value: &str) -> usize {
    let mut width = 0usize;
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            // ANSI escape sequence, e.g. \x1b[31m
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            width += 1;
        }
    }
    width
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}
