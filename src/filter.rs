use std::cmp::Ordering;

use anyhow::{Result, anyhow};

use crate::{
    clean::{CleanOptions, clean_value},
    data::{ComparableValue, Value},
    mapping::Axis,
    transform::ProcessedPoint,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    Eq,
    NotEq,
    Gt,
    Ge,
    Lt,
    Le,
    Contains,
    StartsWith,
    EndsWith,
}

/// A declarative condition such as `y >= 100` or `category contains east`.
///
/// `field` names a canonical axis, or otherwise a top-level field of the
/// point's original row.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition {
    pub field: String,
    pub operator: ComparisonOperator,
    pub raw_value: String,
}

pub fn parse_filters(filters: &[String]) -> Result<Vec<FilterCondition>> {
    filters.iter().map(|f| parse_filter(f)).collect()
}

pub fn parse_filter(filter: &str) -> Result<FilterCondition> {
    let trimmed = filter.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("Empty filter expression"));
    }

    let lowered = trimmed.to_ascii_lowercase();
    for (needle, op) in [
        (" contains ", ComparisonOperator::Contains),
        (" startswith ", ComparisonOperator::StartsWith),
        (" endswith ", ComparisonOperator::EndsWith),
    ] {
        if let Some(idx) = lowered.find(needle) {
            let (left, right_with_space) = trimmed.split_at(idx);
            let right = right_with_space[needle.len()..].trim();
            return condition(left, op, right);
        }
    }

    for (needle, op) in [
        ("!=", ComparisonOperator::NotEq),
        (">=", ComparisonOperator::Ge),
        ("<=", ComparisonOperator::Le),
        ("=", ComparisonOperator::Eq),
        (">", ComparisonOperator::Gt),
        ("<", ComparisonOperator::Lt),
    ] {
        if let Some(idx) = trimmed.find(needle) {
            let left = &trimmed[..idx];
            let right = trimmed[idx + needle.len()..].trim();
            return condition(left, op, right);
        }
    }

    Err(anyhow!("Failed to parse filter expression '{trimmed}'"))
}

fn condition(left: &str, operator: ComparisonOperator, right: &str) -> Result<FilterCondition> {
    let field = left.trim();
    if field.is_empty() {
        return Err(anyhow!("Filter expression is missing a field name"));
    }
    Ok(FilterCondition {
        field: field.to_string(),
        operator,
        raw_value: unquote(right).to_string(),
    })
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2
            && let Some(inner) = value
                .strip_prefix(quote)
                .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

impl FilterCondition {
    /// Evaluates the condition against a point. Both sides go through the
    /// default cleaner, so `"$1,200"` and `1200` compare equal.
    pub fn matches(&self, point: &ProcessedPoint<'_>) -> bool {
        let candidate = self.lookup(point);
        use ComparisonOperator::*;
        match self.operator {
            Contains | StartsWith | EndsWith => {
                let haystack = candidate.map(|v| v.as_display()).unwrap_or_default();
                let needle = self.raw_value.as_str();
                match self.operator {
                    Contains => haystack.contains(needle),
                    StartsWith => haystack.starts_with(needle),
                    _ => haystack.ends_with(needle),
                }
            }
            Eq | NotEq | Gt | Ge | Lt | Le => {
                let rhs = clean_value(
                    Some(&serde_json::Value::String(self.raw_value.clone())),
                    &CleanOptions::default(),
                );
                let left = ComparableValue(candidate);
                let right = ComparableValue(rhs);
                match (left.is_missing(), right.is_missing()) {
                    (false, false) => {
                        let ordering = left.cmp(&right);
                        match self.operator {
                            Eq => ordering == Ordering::Equal,
                            NotEq => ordering != Ordering::Equal,
                            Gt => ordering == Ordering::Greater,
                            Ge => ordering != Ordering::Less,
                            Lt => ordering == Ordering::Less,
                            _ => ordering != Ordering::Greater,
                        }
                    }
                    (true, true) => matches!(self.operator, Eq | Ge | Le),
                    _ => matches!(self.operator, NotEq),
                }
            }
        }
    }

    fn lookup(&self, point: &ProcessedPoint<'_>) -> Option<Value> {
        match Axis::from_canonical(&self.field) {
            Some(axis) => point.get(axis).cloned(),
            None => clean_value(
                point.original_data.get(self.field.as_str()),
                &CleanOptions::default(),
            ),
        }
    }
}
