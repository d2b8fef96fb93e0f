//! The processing entry points.
//!
//! A call runs the stages in a fixed order: field analysis, mapping
//! resolution, transformation, filtering, sorting, pagination and finally the
//! statistics. Nothing escapes the boundary: failures become entries in the
//! result's `errors` or `warnings`, and panics are caught at the outer edge.

use std::panic::{AssertUnwindSafe, catch_unwind};

use log::{debug, warn};
use serde::Serialize;

use crate::{
    analyzer::{FieldDescriptor, analyze_fields},
    auto_map::auto_mapping,
    config::ProcessorConfig,
    data::RawRecord,
    detect::{DefaultTypeDetector, TypeDetector},
    error::{ProcessorError, panic_message},
    mapping::{CanonicalMapping, MappingResolver},
    process::{apply_filter, apply_sort, paginate},
    stats::Statistics,
    transform::{ProcessedPoint, TransformOptions, transform_rows},
};

pub const NO_DATA_WARNING: &str = "No data provided";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessorResult<'a> {
    pub data: Vec<ProcessedPoint<'a>>,
    pub mapping: CanonicalMapping,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub statistics: Statistics,
}

impl<'a> ProcessorResult<'a> {
    fn failed(rows: &[RawRecord], error: ProcessorError) -> Self {
        Self {
            data: Vec::new(),
            mapping: CanonicalMapping::default(),
            errors: vec![error.to_string()],
            warnings: Vec::new(),
            statistics: Statistics::collect(rows, 0, &[]),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Stateless processor. The only thing it owns is the type detector, which is
/// read-only, so one processor can serve concurrent calls.
pub struct DataProcessor {
    detector: Box<dyn TypeDetector>,
}

impl Default for DataProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DataProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataProcessor").finish_non_exhaustive()
    }
}

impl DataProcessor {
    pub fn new() -> Self {
        Self::with_detector(DefaultTypeDetector)
    }

    pub fn with_detector(detector: impl TypeDetector + 'static) -> Self {
        Self {
            detector: Box::new(detector),
        }
    }

    /// Accepts any JSON value; anything other than an array yields a
    /// structural error in the result.
    pub fn process_value<'a>(
        &self,
        data: &'a serde_json::Value,
        config: &ProcessorConfig,
    ) -> ProcessorResult<'a> {
        match data.as_array() {
            Some(rows) => self.process(rows, config),
            None => {
                warn!("Rejecting non-array input");
                ProcessorResult::failed(&[], ProcessorError::NotAnArray)
            }
        }
    }

    pub fn process<'a>(&self, rows: &'a [RawRecord], config: &ProcessorConfig) -> ProcessorResult<'a> {
        match catch_unwind(AssertUnwindSafe(|| self.run(rows, config))) {
            Ok(result) => result,
            Err(payload) => {
                let error = ProcessorError::Unexpected(panic_message(payload.as_ref()));
                warn!("{error}");
                ProcessorResult::failed(rows, error)
            }
        }
    }

    fn run<'a>(&self, rows: &'a [RawRecord], config: &ProcessorConfig) -> ProcessorResult<'a> {
        let mut warnings = Vec::new();

        if rows.is_empty() {
            debug!("Empty input; resolving caller-supplied mapping only");
            return ProcessorResult {
                data: Vec::new(),
                mapping: resolve_mapping(config, &[]),
                errors: Vec::new(),
                warnings: vec![NO_DATA_WARNING.to_string()],
                statistics: Statistics::default(),
            };
        }

        let fields = analyze_fields(rows, config.sample_rows, self.detector.as_ref(), &mut warnings);
        let mapping = resolve_mapping(config, &fields);

        let options = TransformOptions {
            clean: config.clean_options(),
            remove_invalid: config.remove_invalid,
            validate_types: config.validate_types,
            type_threshold: config.auto_detect_threshold,
        };
        let transformed = transform_rows(rows, &mapping, &fields, &options);
        warnings.extend(transformed.warnings);
        let mut points = transformed.points;
        debug!("Transformed {} of {} row(s)", points.len(), rows.len());

        if let Some(filter) = &config.filter {
            points = apply_filter(points, filter, &mut warnings);
        }
        if let Some(sort) = &config.sort {
            points = apply_sort(points, sort);
        }
        let points = paginate(points, config.offset, config.limit);

        let statistics = Statistics::collect(rows, points.len(), &fields);
        ProcessorResult {
            data: points,
            mapping,
            errors: Vec::new(),
            warnings,
            statistics,
        }
    }
}

/// Resolves the four mapping sources, highest priority first.
pub fn resolve_mapping(config: &ProcessorConfig, fields: &[FieldDescriptor]) -> CanonicalMapping {
    let mut resolver = MappingResolver::new();
    resolver
        .apply_explicit(&config.mapping)
        .apply_accessors(&config.accessors)
        .apply_keys(&config.keys);
    if config.auto_detect {
        resolver.apply_auto(&auto_mapping(fields, config.auto_detect_threshold));
    }
    resolver.finish()
}

/// Runs the pipeline with the default type detector.
pub fn process<'a>(rows: &'a [RawRecord], config: &ProcessorConfig) -> ProcessorResult<'a> {
    DataProcessor::new().process(rows, config)
}

pub fn process_value<'a>(data: &'a serde_json::Value, config: &ProcessorConfig) -> ProcessorResult<'a> {
    DataProcessor::new().process_value(data, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::SortDirection,
        data::Value,
        detect::{DataType, Detection},
        mapping::{Axis, AxisResolver},
    };
    use serde_json::json;

    #[test]
    fn empty_input_warns_and_keeps_explicit_mapping() {
        let config = ProcessorConfig::builder().map_field(Axis::X, "month").build();
        let result = process(&[], &config);
        assert!(result.is_ok());
        assert!(result.data.is_empty());
        assert_eq!(result.warnings, vec![NO_DATA_WARNING]);
        assert_eq!(result.mapping.field(Axis::X), Some("month"));
        assert_eq!(result.statistics.total, 0);
    }

    #[test]
    fn non_array_input_is_a_structural_error() {
        let input = json!({"rows": []});
        let result = process_value(&input, &ProcessorConfig::default());
        assert_eq!(result.errors, vec!["Data must be an array"]);
        assert!(result.data.is_empty());
    }

    #[test]
    fn panicking_detector_is_contained_per_field() {
        struct Exploding;
        impl TypeDetector for Exploding {
            fn detect(&self, _values: &[&serde_json::Value]) -> Detection {
                panic!("no types today")
            }
        }
        let rows = vec![json!({"y": 1})];
        let config = ProcessorConfig::builder().key(Axis::Y, "y").build();
        let result = DataProcessor::with_detector(Exploding).process(&rows, &config);
        assert!(result.is_ok());
        assert_eq!(result.data.len(), 1);
        assert!(result.warnings.iter().any(|w| w.contains("no types today")));
    }

    #[test]
    fn stages_run_in_order() {
        let rows = (0..6)
            .map(|i| json!({"n": i, "label": format!("r{i}")}))
            .collect::<Vec<_>>();
        let config = ProcessorConfig::builder()
            .key(Axis::Y, "n")
            .key(Axis::Category, "label")
            .auto_detect(false)
            .filter(crate::config::RowFilter::new(|point, _| {
                Ok(point.y.as_ref().and_then(Value::as_number).unwrap_or(0.0) >= 1.0)
            }))
            .sort("y", SortDirection::Desc)
            .offset(1)
            .limit(2)
            .build();
        let result = process(&rows, &config);
        let indices = result.data.iter().map(|p| p.index).collect::<Vec<_>>();
        assert_eq!(indices, vec![4, 3]);
        assert_eq!(result.statistics.valid, 2);
        assert_eq!(result.statistics.invalid, 4);
        assert_eq!(
            result.mapping.resolver(Axis::Category),
            &AxisResolver::Field("label".into())
        );
        assert_eq!(result.statistics.fields["n"].inferred_type, DataType::Number);
    }
}
