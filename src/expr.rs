//! Boolean filter expressions over processed points, evaluated with `evalexpr`.
//!
//! Every expression sees the canonical axes (`x`, `y`, `color`, `size`,
//! `category`, `value`), the point's original `index`, and each top-level field
//! of the original row under its normalized name. Dates are bound as
//! `YYYY-MM-DDTHH:MM:SS.mmm` strings.

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDateTime, TimeDelta};
use evalexpr::{
    ContextWithMutableFunctions, ContextWithMutableVariables, EvalexprError, Function,
    HashMapContext, Value as EvalValue, eval_with_context,
};

use crate::{
    clean::{CleanOptions, clean_value},
    data::{Value, format_date, normalize_field_name, parse_instant},
    mapping::Axis,
    transform::ProcessedPoint,
};

type Builtin = fn(&[EvalValue]) -> Result<EvalValue, EvalexprError>;

/// Functions callable from filter expressions: name, arity, body.
const BUILTINS: &[(&str, usize, Builtin)] = &[
    ("date_add", 2, date_add),
    ("date_diff_days", 2, date_diff_days),
    ("date_format", 2, date_format),
    ("year", 1, year),
    ("month", 1, month),
    ("lowercase", 1, lowercase),
    ("uppercase", 1, uppercase),
    ("trim", 1, trim),
    ("is_null", 1, is_null),
];

fn register_builtins(context: &mut HashMapContext) -> Result<()> {
    for &(name, arity, body) in BUILTINS {
        let function = Function::new(move |arguments| body(&call_args(arguments, arity, name)?));
        context
            .set_function(name.to_string(), function)
            .map_err(anyhow::Error::from)
            .with_context(|| format!("Registering function '{name}'"))?;
    }
    Ok(())
}

fn date_add(args: &[EvalValue]) -> Result<EvalValue, EvalexprError> {
    let days = int_arg(&args[1], "days")?;
    let delta = TimeDelta::try_days(days)
        .ok_or_else(|| custom_error(&format!("date_add: {days} days is out of range")))?;
    instant_arg(&args[0])?
        .checked_add_signed(delta)
        .map(|shifted| EvalValue::String(format_date(&shifted)))
        .ok_or_else(|| custom_error("date_add overflow"))
}

fn date_diff_days(args: &[EvalValue]) -> Result<EvalValue, EvalexprError> {
    let span = instant_arg(&args[0])? - instant_arg(&args[1])?;
    Ok(EvalValue::Int(span.num_days()))
}

fn date_format(args: &[EvalValue]) -> Result<EvalValue, EvalexprError> {
    let pattern = str_arg(&args[1], "format")?;
    Ok(EvalValue::String(instant_arg(&args[0])?.format(pattern).to_string()))
}

fn year(args: &[EvalValue]) -> Result<EvalValue, EvalexprError> {
    Ok(EvalValue::Int(i64::from(instant_arg(&args[0])?.year())))
}

fn month(args: &[EvalValue]) -> Result<EvalValue, EvalexprError> {
    Ok(EvalValue::Int(i64::from(instant_arg(&args[0])?.month())))
}

fn lowercase(args: &[EvalValue]) -> Result<EvalValue, EvalexprError> {
    Ok(EvalValue::String(str_arg(&args[0], "value")?.to_lowercase()))
}

fn uppercase(args: &[EvalValue]) -> Result<EvalValue, EvalexprError> {
    Ok(EvalValue::String(str_arg(&args[0], "value")?.to_uppercase()))
}

fn trim(args: &[EvalValue]) -> Result<EvalValue, EvalexprError> {
    Ok(EvalValue::String(str_arg(&args[0], "value")?.trim().to_string()))
}

fn is_null(args: &[EvalValue]) -> Result<EvalValue, EvalexprError> {
    Ok(EvalValue::Boolean(matches!(args[0], EvalValue::Empty)))
}

/// Unpacks evalexpr's argument value: a bare value for unary calls, a tuple otherwise.
fn call_args(
    arguments: &EvalValue,
    arity: usize,
    name: &str,
) -> Result<Vec<EvalValue>, EvalexprError> {
    match arguments {
        EvalValue::Tuple(values) if values.len() == arity => Ok(values.clone()),
        EvalValue::Tuple(values) if arity != 1 => Err(
            EvalexprError::wrong_function_argument_amount(values.len(), arity),
        ),
        single if arity == 1 => Ok(vec![single.clone()]),
        _ => Err(custom_error(&format!("{name}() takes {arity} arguments"))),
    }
}

fn custom_error(message: &str) -> EvalexprError {
    EvalexprError::CustomMessage(message.to_string())
}

fn instant_arg(value: &EvalValue) -> Result<NaiveDateTime, EvalexprError> {
    let raw = str_arg(value, "date")?;
    parse_instant(raw).ok_or_else(|| custom_error(&format!("'{raw}' is not a date")))
}

fn int_arg(value: &EvalValue, name: &str) -> Result<i64, EvalexprError> {
    match value {
        EvalValue::Int(i) => Ok(*i),
        EvalValue::Float(f) if f.fract() == 0.0 => Ok(*f as i64),
        other => Err(custom_error(&format!("{name} must be a whole number, got {other}"))),
    }
}

fn str_arg<'a>(value: &'a EvalValue, name: &str) -> Result<&'a str, EvalexprError> {
    match value {
        EvalValue::String(s) => Ok(s),
        other => Err(custom_error(&format!("{name} must be a string, got {other}"))),
    }
}

pub fn value_to_evalexpr(value: &Value) -> EvalValue {
    match value {
        Value::Null => EvalValue::Empty,
        Value::Number(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => {
            EvalValue::Int(*n as i64)
        }
        Value::Number(n) => EvalValue::Float(*n),
        Value::Text(s) => EvalValue::String(s.clone()),
        Value::Boolean(b) => EvalValue::Boolean(*b),
        Value::Date(dt) => EvalValue::String(format_date(dt)),
        Value::Json(v) => EvalValue::String(v.to_string()),
    }
}

/// Binds a point's axes, index and raw fields. Axis names win over raw fields
/// that normalize to the same identifier.
pub fn build_context(point: &ProcessedPoint<'_>) -> Result<HashMapContext> {
    let mut context = HashMapContext::new();
    register_builtins(&mut context)?;

    if let Some(object) = point.original_data.as_object() {
        let options = CleanOptions {
            remove_nulls: false,
            ..CleanOptions::default()
        };
        for (name, raw) in object {
            let Some(cleaned) = clean_value(Some(raw), &options) else {
                continue;
            };
            context
                .set_value(normalize_field_name(name), value_to_evalexpr(&cleaned))
                .with_context(|| format!("Binding field '{name}'"))?;
        }
    }

    for axis in Axis::ALL {
        let bound = point
            .get(axis)
            .map(value_to_evalexpr)
            .unwrap_or(EvalValue::Empty);
        context
            .set_value(axis.as_str().to_string(), bound)
            .with_context(|| format!("Binding axis '{axis}'"))?;
    }

    context
        .set_value("index".to_string(), EvalValue::Int(point.index as i64))
        .context("Binding index")?;

    Ok(context)
}

/// Evaluates `source` against a bound point; non-boolean results use [`is_truthy`].
pub fn evaluate_predicate(source: &str, context: &HashMapContext) -> Result<bool> {
    eval_with_context(source, context)
        .map(|result| is_truthy(&result))
        .with_context(|| format!("Evaluating filter expression '{source}'"))
}

/// Zero, the empty string and `Empty` are false; tuples are true if any member is.
pub fn is_truthy(value: &EvalValue) -> bool {
    match value {
        EvalValue::Boolean(b) => *b,
        EvalValue::Int(i) => *i != 0,
        EvalValue::Float(f) => *f != 0.0,
        EvalValue::String(s) => !s.is_empty(),
        EvalValue::Tuple(members) => members.iter().any(is_truthy),
        EvalValue::Empty => false,
    }
}
