//! Field discovery and per-field type descriptors.
//!
//! Field names are discovered from the first `sample_rows` records only, while
//! the statistics for every discovered field scan the whole input.

use std::{
    collections::HashSet,
    panic::{AssertUnwindSafe, catch_unwind},
};

use log::{debug, warn};
use serde::Serialize;

use crate::{
    data::RawRecord,
    detect::{DataType, TypeDetector},
    error::{ProcessorError, panic_message},
};

pub const DEFAULT_SAMPLE_ROWS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    pub name: String,
    pub inferred_type: DataType,
    pub confidence: f64,
    pub sample_values: Vec<serde_json::Value>,
    pub unique_count: usize,
    pub null_count: usize,
}

impl FieldDescriptor {
    pub fn empty(name: &str, total: usize) -> Self {
        Self {
            name: name.to_string(),
            inferred_type: DataType::String,
            confidence: 0.0,
            sample_values: Vec::new(),
            unique_count: 0,
            null_count: total,
        }
    }

    pub fn meets(&self, data_type: DataType, threshold: f64) -> bool {
        self.inferred_type == data_type && self.confidence >= threshold
    }
}

/// Field names in first-seen order across the sampled prefix. `sample_rows == 0`
/// scans every row.
pub fn discover_fields(rows: &[RawRecord], sample_rows: usize) -> Vec<String> {
    let width = if sample_rows == 0 {
        rows.len()
    } else {
        sample_rows.min(rows.len())
    };
    let mut seen = HashSet::new();
    let mut names = Vec::new();
    for row in &rows[..width] {
        if let Some(object) = row.as_object() {
            for key in object.keys() {
                if seen.insert(key.as_str()) {
                    names.push(key.clone());
                }
            }
        }
    }
    names
}

pub fn analyze_fields(
    rows: &[RawRecord],
    sample_rows: usize,
    detector: &dyn TypeDetector,
    warnings: &mut Vec<String>,
) -> Vec<FieldDescriptor> {
    let names = discover_fields(rows, sample_rows);
    debug!(
        "Discovered {} field(s) from {} row(s)",
        names.len(),
        rows.len()
    );
    names
        .iter()
        .map(|name| {
            describe_field(rows, name, detector).unwrap_or_else(|err| {
                warn!("{err}");
                warnings.push(err.to_string());
                FieldDescriptor::empty(name, rows.len())
            })
        })
        .collect()
}

/// Numbers compare by value, so `1` and `1.0` are the same entry.
#[derive(PartialEq, Eq, Hash)]
enum UniqueKey {
    Number(u64),
    Other(String),
}

impl UniqueKey {
    fn of(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(f) => UniqueKey::Number((f + 0.0).to_bits()),
                None => UniqueKey::Other(n.to_string()),
            },
            other => UniqueKey::Other(other.to_string()),
        }
    }
}

/// A panicking detector degrades the field to an empty descriptor.
fn describe_field(
    rows: &[RawRecord],
    name: &str,
    detector: &dyn TypeDetector,
) -> Result<FieldDescriptor, ProcessorError> {
    let values = rows
        .iter()
        .filter_map(|row| row.get(name))
        .filter(|value| !value.is_null())
        .collect::<Vec<_>>();
    if values.is_empty() {
        return Ok(FieldDescriptor::empty(name, rows.len()));
    }

    let detection = catch_unwind(AssertUnwindSafe(|| detector.detect(&values))).map_err(
        |payload| ProcessorError::Detection {
            field: name.to_string(),
            message: panic_message(payload.as_ref()),
        },
    )?;
    let unique_count = values
        .iter()
        .map(|value| UniqueKey::of(value))
        .collect::<HashSet<_>>()
        .len();
    Ok(FieldDescriptor {
        name: name.to_string(),
        inferred_type: detection.data_type,
        confidence: detection.confidence.clamp(0.0, 1.0),
        sample_values: detection.samples,
        unique_count,
        null_count: rows.len() - values.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::DefaultTypeDetector;
    use serde_json::json;

    #[test]
    fn discovery_only_scans_sampled_prefix() {
        let mut rows = (0..10).map(|i| json!({ "a": i })).collect::<Vec<_>>();
        rows.push(json!({ "a": 10, "late": "x" }));

        assert_eq!(discover_fields(&rows, DEFAULT_SAMPLE_ROWS), vec!["a"]);
        assert_eq!(discover_fields(&rows, 0), vec!["a", "late"]);
    }

    #[test]
    fn statistics_scan_every_row() {
        let mut rows = (0..12).map(|i| json!({ "a": i % 4 })).collect::<Vec<_>>();
        rows.push(json!({ "a": null }));
        rows.push(json!(null));

        let fields = analyze_fields(&rows, DEFAULT_SAMPLE_ROWS, &DefaultTypeDetector, &mut Vec::new());
        let a = &fields[0];
        assert_eq!(a.inferred_type, DataType::Number);
        assert_eq!(a.unique_count, 4);
        assert_eq!(a.null_count, 2);
    }

    #[test]
    fn all_null_field_gets_zero_confidence_string() {
        let rows = vec![json!({ "gap": null }), json!({ "gap": null })];
        let fields = analyze_fields(&rows, DEFAULT_SAMPLE_ROWS, &DefaultTypeDetector, &mut Vec::new());
        assert_eq!(fields[0], FieldDescriptor::empty("gap", 2));
    }

    #[test]
    fn unique_count_distinguishes_numbers_from_numeric_strings() {
        let rows = vec![json!({ "v": 1 }), json!({ "v": "1" }), json!({ "v": 1 })];
        let fields = analyze_fields(&rows, DEFAULT_SAMPLE_ROWS, &DefaultTypeDetector, &mut Vec::new());
        assert_eq!(fields[0].unique_count, 2);
    }

    #[test]
    fn integral_and_float_spellings_are_one_value() {
        let rows = vec![json!({ "v": 1 }), json!({ "v": 1.0 }), json!({ "v": -0.0 }), json!({ "v": 0 })];
        let fields = analyze_fields(&rows, DEFAULT_SAMPLE_ROWS, &DefaultTypeDetector, &mut Vec::new());
        assert_eq!(fields[0].unique_count, 2);
    }

    struct PanickingDetector;

    impl TypeDetector for PanickingDetector {
        fn detect(&self, _values: &[&serde_json::Value]) -> crate::detect::Detection {
            panic!("detector exploded")
        }
    }

    #[test]
    fn detector_panics_become_warnings() {
        let rows = vec![json!({ "a": 1 })];
        let mut warnings = Vec::new();
        let fields = analyze_fields(&rows, DEFAULT_SAMPLE_ROWS, &PanickingDetector, &mut warnings);
        assert_eq!(fields[0], FieldDescriptor::empty("a", 1));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("detector exploded"));
    }
}
