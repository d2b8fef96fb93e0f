use thiserror::Error;

/// Failures raised inside the pipeline. None of these cross the public
/// boundary; they are rendered into a result's `errors` or `warnings`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProcessorError {
    #[error("Data must be an array")]
    NotAnArray,

    #[error("Row {index}: expected an object, found {found}")]
    InvalidRow { index: usize, found: &'static str },

    #[error("Row {index}: accessor for '{axis}' failed: {message}")]
    Accessor {
        index: usize,
        axis: &'static str,
        message: String,
    },

    #[error("Row {index}: field '{field}' expected {expected}, found {found}")]
    TypeMismatch {
        index: usize,
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Field '{field}': type detection failed: {message}")]
    Detection { field: String, message: String },

    #[error("Filter failed at position {position}: {message}")]
    Filter { position: usize, message: String },

    #[error("Processing failed: {0}")]
    Unexpected(String),
}

pub(crate) fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Renders a caught panic payload into a message.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
