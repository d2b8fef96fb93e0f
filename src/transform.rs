//! Row-to-point transformation using a resolved mapping and the value cleaner.

use std::{
    collections::HashMap,
    panic::{AssertUnwindSafe, catch_unwind},
};

use log::debug;
use serde::Serialize;

use crate::{
    analyzer::FieldDescriptor,
    clean::{CleanOptions, clean_value},
    data::{RawRecord, Value},
    detect::DataType,
    error::{ProcessorError, json_kind, panic_message},
    mapping::{Accessor, Axis, AxisResolver, CanonicalMapping},
};

/// Canonical output record. `original_data` borrows the caller's row and
/// `index` is the row's position in the original input.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedPoint<'a> {
    pub x: Option<Value>,
    pub y: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    pub original_data: &'a RawRecord,
    pub index: usize,
}

impl<'a> ProcessedPoint<'a> {
    fn empty(original_data: &'a RawRecord, index: usize) -> Self {
        Self {
            x: None,
            y: None,
            color: None,
            size: None,
            category: None,
            value: None,
            original_data,
            index,
        }
    }

    pub fn get(&self, axis: Axis) -> Option<&Value> {
        match axis {
            Axis::X => self.x.as_ref(),
            Axis::Y => self.y.as_ref(),
            Axis::Color => self.color.as_ref(),
            Axis::Size => self.size.as_ref(),
            Axis::Category => self.category.as_ref(),
            Axis::Value => self.value.as_ref(),
        }
    }

    fn set(&mut self, axis: Axis, value: Option<Value>) {
        let slot = match axis {
            Axis::X => &mut self.x,
            Axis::Y => &mut self.y,
            Axis::Color => &mut self.color,
            Axis::Size => &mut self.size,
            Axis::Category => &mut self.category,
            Axis::Value => &mut self.value,
        };
        *slot = value;
    }

    /// A null kept by the cleaner still counts as defined.
    pub fn has_position(&self) -> bool {
        self.x.is_some() || self.y.is_some()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TransformOptions {
    pub clean: CleanOptions,
    pub remove_invalid: bool,
    pub validate_types: bool,
    pub type_threshold: f64,
}

#[derive(Debug, Default)]
pub struct TransformOutput<'a> {
    pub points: Vec<ProcessedPoint<'a>>,
    pub warnings: Vec<String>,
}

pub fn transform_rows<'a>(
    rows: &'a [RawRecord],
    mapping: &CanonicalMapping,
    fields: &[FieldDescriptor],
    options: &TransformOptions,
) -> TransformOutput<'a> {
    let expected = expected_types(mapping, fields, options);
    let mut output = TransformOutput {
        points: Vec::with_capacity(rows.len()),
        warnings: Vec::new(),
    };

    for (index, row) in rows.iter().enumerate() {
        if options.remove_invalid && !row.is_object() {
            output.warnings.push(
                ProcessorError::InvalidRow {
                    index,
                    found: json_kind(row),
                }
                .to_string(),
            );
            continue;
        }

        let mut point = ProcessedPoint::empty(row, index);
        for (axis, resolver) in mapping.iter() {
            let raw = match resolver {
                AxisResolver::Unmapped => continue,
                AxisResolver::Field(name) => row.get(name.as_str()).cloned(),
                AxisResolver::Accessor(accessor) => match invoke_accessor(accessor, row) {
                    Ok(value) => Some(value),
                    Err(message) => {
                        output.warnings.push(
                            ProcessorError::Accessor {
                                index,
                                axis: axis.as_str(),
                                message,
                            }
                            .to_string(),
                        );
                        continue;
                    }
                },
            };
            let cleaned = clean_value(raw.as_ref(), &options.clean);
            if let (Some(field), Some(value)) = (resolver.field_name(), cleaned.as_ref())
                && let Some(expected) = expected.get(field)
                && let Some(warning) = type_mismatch(index, field, *expected, value)
            {
                output.warnings.push(warning);
            }
            point.set(axis, cleaned);
        }

        if options.remove_invalid && !point.has_position() {
            debug!("Dropping row {index}: neither x nor y is defined");
            continue;
        }
        output.points.push(point);
    }

    output
}

/// Runs caller code with both `Err` returns and panics contained.
fn invoke_accessor(accessor: &Accessor, row: &RawRecord) -> Result<serde_json::Value, String> {
    match catch_unwind(AssertUnwindSafe(|| accessor.call(row))) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(format!("{err:#}")),
        Err(payload) => Err(panic_message(payload.as_ref())),
    }
}

fn expected_types<'m>(
    mapping: &'m CanonicalMapping,
    fields: &[FieldDescriptor],
    options: &TransformOptions,
) -> HashMap<&'m str, DataType> {
    if !options.validate_types {
        return HashMap::new();
    }
    mapping
        .iter()
        .filter_map(|(_, resolver)| resolver.field_name())
        .filter_map(|name| {
            let descriptor = fields.iter().find(|field| field.name == name)?;
            let checked = matches!(descriptor.inferred_type, DataType::Number | DataType::Date);
            (checked && descriptor.confidence >= options.type_threshold)
                .then_some((name, descriptor.inferred_type))
        })
        .collect()
}

fn type_mismatch(index: usize, field: &str, expected: DataType, value: &Value) -> Option<String> {
    let matches = matches!(
        (expected, value),
        (_, Value::Null) | (DataType::Number, Value::Number(_)) | (DataType::Date, Value::Date(_))
    );
    if matches {
        return None;
    }
    Some(
        ProcessorError::TypeMismatch {
            index,
            field: field.to_string(),
            expected: expected.as_str(),
            found: value.kind_name(),
        }
        .to_string(),
    )
}
