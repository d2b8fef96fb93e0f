use std::{cmp::Ordering, fmt};

use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Serialize, Serializer};

/// Raw input row. No shape is assumed across an input array.
pub type RawRecord = serde_json::Value;

/// A scalar after cleaning. "Undefined" is modelled as `Option::None` by callers.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Number(f64),
    Text(String),
    Boolean(bool),
    Date(NaiveDateTime),
    Json(serde_json::Value),
}

impl Value {
    /// Converts a raw JSON value without any coercion.
    pub fn from_json(raw: &serde_json::Value) -> Self {
        match raw {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(*b),
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(f) => Value::Number(f),
                None => Value::Json(raw.clone()),
            },
            serde_json::Value::String(s) => Value::Text(s.clone()),
            other => Value::Json(other.clone()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Numeric projection used by range queries: numbers as-is, dates as epoch millis.
    pub fn as_metric(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Date(d) => Some(d.and_utc().timestamp_millis() as f64),
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Number(_) => "number",
            Value::Text(_) => "string",
            Value::Boolean(_) => "boolean",
            Value::Date(_) => "date",
            Value::Json(_) => "json",
        }
    }

    pub fn as_display(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Number(f) => {
                if f.fract() == 0.0 && f.abs() < 1e15 {
                    (*f as i64).to_string()
                } else {
                    f.to_string()
                }
            }
            Value::Text(s) => s.clone(),
            Value::Boolean(b) => b.to_string(),
            Value::Date(dt) => format_date(dt),
            Value::Json(v) => v.to_string(),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Boolean(_) => 1,
            Value::Number(_) => 2,
            Value::Date(_) => 3,
            Value::Text(_) => 4,
            Value::Json(_) => 5,
        }
    }

    /// Total order across kinds: boolean < number < date < text < json.
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.total_cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::Json(a), Value::Json(b)) => a.to_string().cmp(&b.to_string()),
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Date(dt) => serializer.serialize_str(&format_date(dt)),
            Value::Json(v) => v.serialize(serializer),
        }
    }
}

/// Sort key wrapper. Missing and null keys compare greater than any present key,
/// so they land last in ascending order; callers reverse only the present part.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparableValue(pub Option<Value>);

impl ComparableValue {
    pub fn is_missing(&self) -> bool {
        matches!(&self.0, None | Some(Value::Null))
    }
}

impl Eq for ComparableValue {}

impl Ord for ComparableValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.is_missing(), other.is_missing()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => match (&self.0, &other.0) {
                (Some(left), Some(right)) => left.total_cmp(right),
                _ => Ordering::Equal,
            },
        }
    }
}

impl PartialOrd for ComparableValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub fn format_date(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
}

pub fn parse_naive_date(value: &str) -> Result<NaiveDate> {
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%m/%d/%Y", "%d-%m-%Y"];
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    // Year-month ("2024-01") resolves to the first of the month.
    if value.len() == 7
        && let Ok(parsed) = NaiveDate::parse_from_str(&format!("{value}-01"), "%Y-%m-%d")
    {
        return Ok(parsed);
    }
    Err(anyhow!("Failed to parse '{value}' as date"))
}

pub fn parse_naive_datetime(value: &str) -> Result<NaiveDateTime> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%d/%m/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.naive_utc());
    }
    Err(anyhow!("Failed to parse '{value}' as datetime"))
}

/// Parses any supported date or date-time token into an instant.
pub fn parse_instant(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(date) = parse_naive_date(trimmed) {
        return date.and_hms_opt(0, 0, 0);
    }
    parse_naive_datetime(trimmed).ok()
}

/// Epoch milliseconds to an instant; `None` when out of range or non-finite.
pub fn instant_from_millis(millis: f64) -> Option<NaiveDateTime> {
    if !millis.is_finite() {
        return None;
    }
    DateTime::<Utc>::from_timestamp_millis(millis as i64).map(|dt| dt.naive_utc())
}

/// Strips `,`, `$`, `%` and parses the remainder as a finite float.
pub fn parse_numeric_token(value: &str) -> Option<f64> {
    let stripped: String = value
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '$' | '%'))
        .collect();
    let stripped = stripped.trim();
    if stripped.is_empty() {
        return None;
    }
    match stripped.parse::<f64>() {
        Ok(parsed) if parsed.is_finite() => Some(parsed),
        _ => None,
    }
}

pub fn normalize_field_name(name: &str) -> String {
    let mut normalized = name
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' => c,
            _ => '_',
        })
        .collect::<String>()
        .to_ascii_lowercase();
    if normalized.starts_with(|c: char| c.is_ascii_digit()) {
        normalized.insert(0, '_');
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_numeric_token_strips_currency_and_separators() {
        assert_eq!(parse_numeric_token("$1,234.50"), Some(1234.5));
        assert_eq!(parse_numeric_token("45%"), Some(45.0));
        assert_eq!(parse_numeric_token(" -3e2 "), Some(-300.0));
        assert_eq!(parse_numeric_token("12abc"), None);
        assert_eq!(parse_numeric_token("$"), None);
        assert_eq!(parse_numeric_token("inf"), None);
    }

    #[test]
    fn parse_naive_date_supports_multiple_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        assert_eq!(parse_naive_date("2024-05-06").unwrap(), expected);
        assert_eq!(parse_naive_date("06/05/2024").unwrap(), expected);
        assert_eq!(parse_naive_date("2024/05/06").unwrap(), expected);
        assert_eq!(
            parse_naive_date("2024-01").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
        );
        assert!(parse_naive_date("North").is_err());
    }

    #[test]
    fn parse_instant_accepts_rfc3339() {
        let parsed = parse_instant("2024-01-01T08:30:00Z").unwrap();
        assert_eq!(parsed.format("%H:%M").to_string(), "08:30");
    }

    #[test]
    fn from_json_keeps_structures_as_json() {
        assert_eq!(Value::from_json(&json!(2)), Value::Number(2.0));
        assert_eq!(Value::from_json(&json!(null)), Value::Null);
        assert!(matches!(Value::from_json(&json!([1, 2])), Value::Json(_)));
    }

    #[test]
    fn comparable_value_orders_missing_last() {
        let none = ComparableValue(None);
        let null = ComparableValue(Some(Value::Null));
        let some = ComparableValue(Some(Value::Number(0.0)));
        assert!(some < none);
        assert!(some < null);
        assert_eq!(none.cmp(&null), Ordering::Equal);
    }

    #[test]
    fn total_cmp_handles_mixed_kinds_without_panicking() {
        let number = Value::Number(10.0);
        let text = Value::Text("a".into());
        assert_eq!(number.total_cmp(&text), Ordering::Less);
        assert_eq!(text.total_cmp(&number), Ordering::Greater);
    }

    #[test]
    fn normalize_field_name_produces_identifiers() {
        assert_eq!(normalize_field_name("Order ID"), "order_id");
        assert_eq!(normalize_field_name("2024 sales"), "_2024_sales");
    }
}
