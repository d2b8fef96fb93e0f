use crate::data::{Value, instant_from_millis, parse_instant, parse_numeric_token};

/// The cleaning flags of a processor configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanOptions {
    pub remove_nulls: bool,
    pub trim_strings: bool,
    pub parse_numbers: bool,
    pub parse_dates: bool,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            remove_nulls: true,
            trim_strings: true,
            parse_numbers: true,
            parse_dates: true,
        }
    }
}

/// Cleans one raw value. `None` means the value is elided ("undefined").
///
/// Steps run in a fixed order: null elision, trimming, numeric coercion, date
/// coercion, pass-through. Numeric coercion runs first, so an epoch-like
/// numeric string becomes a number and never reaches date parsing.
pub fn clean_value(raw: Option<&serde_json::Value>, options: &CleanOptions) -> Option<Value> {
    use serde_json::Value as Json;

    let raw = match raw {
        None | Some(Json::Null) => return null_value(options),
        Some(value) => value,
    };

    match raw {
        Json::String(text) => clean_text(text, options),
        Json::Number(number) => {
            let Some(number) = number.as_f64().filter(|n| n.is_finite()) else {
                return Some(Value::Json(raw.clone()));
            };
            if options.parse_numbers {
                return Some(Value::Number(number));
            }
            if options.parse_dates
                && let Some(instant) = instant_from_millis(number)
            {
                return Some(Value::Date(instant));
            }
            Some(Value::Number(number))
        }
        other => Some(Value::from_json(other)),
    }
}

fn clean_text(text: &str, options: &CleanOptions) -> Option<Value> {
    let text = if options.trim_strings {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return null_value(options);
        }
        trimmed
    } else {
        text
    };

    if options.parse_numbers
        && let Some(number) = parse_numeric_token(text)
    {
        return Some(Value::Number(number));
    }
    if options.parse_dates
        && let Some(instant) = parse_instant(text)
    {
        return Some(Value::Date(instant));
    }
    Some(Value::Text(text.to_string()))
}

fn null_value(options: &CleanOptions) -> Option<Value> {
    if options.remove_nulls {
        None
    } else {
        Some(Value::Null)
    }
}
