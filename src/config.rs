//! Per-call processor configuration.
//!
//! [`ProcessorConfig`] is an explicit value passed into every call; the pipeline
//! keeps no global configuration. [`ProcessorSettings`] is the serializable
//! subset that can be loaded from YAML or JSON and turned into a config.

use std::{fmt, path::Path, str::FromStr, sync::Arc};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::{
    analyzer::DEFAULT_SAMPLE_ROWS,
    clean::CleanOptions,
    document, expr,
    filter::{FilterCondition, parse_filters},
    mapping::{Accessor, Axis, AxisMap, AxisResolver},
    transform::ProcessedPoint,
};

pub const DEFAULT_AUTO_DETECT_THRESHOLD: f64 = 0.7;

type FilterFn = dyn for<'a> Fn(&ProcessedPoint<'a>, usize) -> Result<bool> + Send + Sync;

/// Caller-supplied predicate over transformed points. `Err` or a panic keeps
/// the point and records a warning.
#[derive(Clone)]
pub struct RowFilter(Arc<FilterFn>);

impl RowFilter {
    pub fn new<F>(f: F) -> Self
    where
        F: for<'a> Fn(&ProcessedPoint<'a>, usize) -> Result<bool> + Send + Sync + 'static,
    {
        RowFilter(Arc::new(f))
    }

    pub fn call(&self, point: &ProcessedPoint<'_>, position: usize) -> Result<bool> {
        (self.0)(point, position)
    }

    /// Combines condition strings and expressions into one conjunctive filter.
    pub fn from_declarations(conditions: Vec<FilterCondition>, expressions: Vec<String>) -> Self {
        RowFilter::new(move |point, _| {
            for condition in &conditions {
                if !condition.matches(point) {
                    return Ok(false);
                }
            }
            for expression in &expressions {
                let context = expr::build_context(point)?;
                if !expr::evaluate_predicate(expression, &context)? {
                    return Ok(false);
                }
            }
            Ok(true)
        })
    }
}

impl fmt::Debug for RowFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RowFilter(<fn>)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortSpec {
    /// A canonical axis name, or a top-level field of the original row.
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    pub fn ascending(&self) -> bool {
        self.direction == SortDirection::Asc
    }
}

impl FromStr for SortSpec {
    type Err = anyhow::Error;

    /// Parses `field[:asc|desc]`.
    fn from_str(spec: &str) -> Result<Self> {
        let mut parts = spec.split(':');
        let field = parts
            .next()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow!("Sort directive is missing a field"))?;
        let direction = match parts.next().unwrap_or("asc").trim().to_ascii_lowercase().as_str() {
            "asc" => SortDirection::Asc,
            "desc" => SortDirection::Desc,
            other => return Err(anyhow!("Unknown sort direction '{other}'")),
        };
        Ok(SortSpec::new(field, direction))
    }
}

#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub mapping: AxisMap<AxisResolver>,
    pub accessors: AxisMap<Accessor>,
    pub keys: AxisMap<String>,
    pub auto_detect: bool,
    pub auto_detect_threshold: f64,
    /// Rows scanned for field discovery (0 = all rows).
    pub sample_rows: usize,
    pub remove_nulls: bool,
    pub remove_invalid: bool,
    pub validate_types: bool,
    pub parse_numbers: bool,
    pub parse_dates: bool,
    pub trim_strings: bool,
    pub filter: Option<RowFilter>,
    pub sort: Option<SortSpec>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            mapping: AxisMap::new(),
            accessors: AxisMap::new(),
            keys: AxisMap::new(),
            auto_detect: true,
            auto_detect_threshold: DEFAULT_AUTO_DETECT_THRESHOLD,
            sample_rows: DEFAULT_SAMPLE_ROWS,
            remove_nulls: true,
            remove_invalid: true,
            validate_types: true,
            parse_numbers: true,
            parse_dates: true,
            trim_strings: true,
            filter: None,
            sort: None,
            limit: None,
            offset: 0,
        }
    }
}

impl ProcessorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> ProcessorConfigBuilder {
        ProcessorConfigBuilder::default()
    }

    pub fn clean_options(&self) -> CleanOptions {
        CleanOptions {
            remove_nulls: self.remove_nulls,
            trim_strings: self.trim_strings,
            parse_numbers: self.parse_numbers,
            parse_dates: self.parse_dates,
        }
    }
}

#[derive(Debug, Default)]
pub struct ProcessorConfigBuilder {
    config: ProcessorConfig,
}

impl ProcessorConfigBuilder {
    /// Explicit mapping of an axis to a field name.
    pub fn map_field(mut self, axis: Axis, field: impl Into<String>) -> Self {
        self.config.mapping.set(axis, AxisResolver::Field(field.into()));
        self
    }

    /// Explicit mapping of an axis to an accessor (same priority as `map_field`).
    pub fn map_accessor(mut self, axis: Axis, accessor: Accessor) -> Self {
        self.config
            .mapping
            .set(axis, AxisResolver::Accessor(accessor));
        self
    }

    pub fn accessor(mut self, axis: Axis, accessor: Accessor) -> Self {
        self.config.accessors.set(axis, accessor);
        self
    }

    pub fn key(mut self, axis: Axis, field: impl Into<String>) -> Self {
        self.config.keys.set(axis, field.into());
        self
    }

    pub fn auto_detect(mut self, enabled: bool) -> Self {
        self.config.auto_detect = enabled;
        self
    }

    pub fn auto_detect_threshold(mut self, threshold: f64) -> Self {
        self.config.auto_detect_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn sample_rows(mut self, rows: usize) -> Self {
        self.config.sample_rows = rows;
        self
    }

    pub fn remove_nulls(mut self, enabled: bool) -> Self {
        self.config.remove_nulls = enabled;
        self
    }

    pub fn remove_invalid(mut self, enabled: bool) -> Self {
        self.config.remove_invalid = enabled;
        self
    }

    pub fn validate_types(mut self, enabled: bool) -> Self {
        self.config.validate_types = enabled;
        self
    }

    pub fn parse_numbers(mut self, enabled: bool) -> Self {
        self.config.parse_numbers = enabled;
        self
    }

    pub fn parse_dates(mut self, enabled: bool) -> Self {
        self.config.parse_dates = enabled;
        self
    }

    pub fn trim_strings(mut self, enabled: bool) -> Self {
        self.config.trim_strings = enabled;
        self
    }

    pub fn filter(mut self, filter: RowFilter) -> Self {
        self.config.filter = Some(filter);
        self
    }

    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.config.sort = Some(SortSpec::new(field, direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.config.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.config.offset = offset;
        self
    }

    pub fn build(self) -> ProcessorConfig {
        self.config
    }
}

/// File-backed settings. Callbacks cannot be expressed here; filters are
/// declared as condition strings or boolean expressions instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessorSettings {
    pub mapping: AxisMap<String>,
    pub keys: AxisMap<String>,
    pub auto_detect: bool,
    pub auto_detect_threshold: f64,
    pub sample_rows: usize,
    pub remove_nulls: bool,
    pub remove_invalid: bool,
    pub validate_types: bool,
    pub parse_numbers: bool,
    pub parse_dates: bool,
    pub trim_strings: bool,
    pub filters: Vec<String>,
    pub filter_exprs: Vec<String>,
    pub sort: Option<SortSpec>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        let config = ProcessorConfig::default();
        Self {
            mapping: AxisMap::new(),
            keys: AxisMap::new(),
            auto_detect: config.auto_detect,
            auto_detect_threshold: config.auto_detect_threshold,
            sample_rows: config.sample_rows,
            remove_nulls: config.remove_nulls,
            remove_invalid: config.remove_invalid,
            validate_types: config.validate_types,
            parse_numbers: config.parse_numbers,
            parse_dates: config.parse_dates,
            trim_strings: config.trim_strings,
            filters: Vec::new(),
            filter_exprs: Vec::new(),
            sort: None,
            limit: None,
            offset: 0,
        }
    }
}

impl ProcessorSettings {
    pub fn load(path: &Path) -> Result<Self> {
        document::load_from_path(path)
            .with_context(|| format!("Loading processor settings from {path:?}"))
    }

    pub fn into_config(self) -> Result<ProcessorConfig> {
        let mut mapping = AxisMap::new();
        for (axis, field) in self.mapping.iter() {
            mapping.set(axis, AxisResolver::Field(field.clone()));
        }
        let filter = if self.filters.is_empty() && self.filter_exprs.is_empty() {
            None
        } else {
            let conditions = parse_filters(&self.filters)?;
            Some(RowFilter::from_declarations(conditions, self.filter_exprs))
        };
        Ok(ProcessorConfig {
            mapping,
            accessors: AxisMap::new(),
            keys: self.keys,
            auto_detect: self.auto_detect,
            auto_detect_threshold: self.auto_detect_threshold.clamp(0.0, 1.0),
            sample_rows: self.sample_rows,
            remove_nulls: self.remove_nulls,
            remove_invalid: self.remove_invalid,
            validate_types: self.validate_types,
            parse_numbers: self.parse_numbers,
            parse_dates: self.parse_dates,
            trim_strings: self.trim_strings,
            filter,
            sort: self.sort,
            limit: self.limit,
            offset: self.offset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = ProcessorConfig::default();
        assert!(config.auto_detect);
        assert_eq!(config.auto_detect_threshold, 0.7);
        assert_eq!(config.sample_rows, 10);
        assert!(config.remove_nulls && config.remove_invalid && config.trim_strings);
        assert_eq!(config.offset, 0);
        assert!(config.limit.is_none());
    }

    #[test]
    fn builder_clamps_threshold() {
        let config = ProcessorConfig::builder()
            .auto_detect_threshold(1.5)
            .key(Axis::Y, "sales")
            .limit(3)
            .build();
        assert_eq!(config.auto_detect_threshold, 1.0);
        assert_eq!(config.keys.get(Axis::Y).map(String::as_str), Some("sales"));
        assert_eq!(config.limit, Some(3));
    }

    #[test]
    fn sort_spec_parses_direction() {
        let spec: SortSpec = "y:desc".parse().unwrap();
        assert_eq!(spec, SortSpec::new("y", SortDirection::Desc));
        let spec: SortSpec = "month".parse().unwrap();
        assert!(spec.ascending());
        assert!("y:sideways".parse::<SortSpec>().is_err());
        assert!(":asc".parse::<SortSpec>().is_err());
    }

    #[test]
    fn settings_deserialize_with_defaults() {
        let settings: ProcessorSettings = serde_json::from_str(
            r#"{"mapping": {"x": "month"}, "autoDetect": false, "sort": {"field": "y"}}"#,
        )
        .unwrap();
        assert!(!settings.auto_detect);
        assert!(settings.remove_nulls);
        let config = settings.into_config().unwrap();
        assert_eq!(
            config.mapping.get(Axis::X),
            Some(&AxisResolver::Field("month".into()))
        );
        assert_eq!(config.sort, Some(SortSpec::new("y", SortDirection::Asc)));
    }
}
