//! Scalar type detection over the non-null values of one field.
//!
//! The [`TypeDetector`] trait is the seam the field analyzer calls into;
//! [`DefaultTypeDetector`] votes each value into one of the four data types
//! and reports the winner together with its share of the votes.

use std::{collections::HashSet, fmt};

use serde::{Deserialize, Serialize};

use crate::data::{parse_instant, parse_numeric_token};

const SAMPLE_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Number,
    String,
    Date,
    Boolean,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Number => "number",
            DataType::String => "string",
            DataType::Date => "date",
            DataType::Boolean => "boolean",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub data_type: DataType,
    pub confidence: f64,
    pub samples: Vec<serde_json::Value>,
}

pub trait TypeDetector: Send + Sync {
    /// `values` is non-empty and holds no nulls.
    fn detect(&self, values: &[&serde_json::Value]) -> Detection;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTypeDetector;

impl TypeDetector for DefaultTypeDetector {
    fn detect(&self, values: &[&serde_json::Value]) -> Detection {
        let mut candidate = TypeCandidate::default();
        for value in values {
            candidate.update(value);
        }
        let (data_type, votes) = candidate.decide();
        let confidence = if candidate.observed == 0 {
            0.0
        } else {
            votes as f64 / candidate.observed as f64
        };
        Detection {
            data_type,
            confidence,
            samples: collect_samples(values),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct TypeCandidate {
    observed: usize,
    number_matches: usize,
    date_matches: usize,
    boolean_matches: usize,
    string_matches: usize,
}

impl TypeCandidate {
    fn update(&mut self, value: &serde_json::Value) {
        use serde_json::Value as Json;

        match value {
            Json::Null => return,
            Json::Bool(_) => self.boolean_matches += 1,
            Json::Number(_) => self.number_matches += 1,
            Json::String(raw) => {
                let trimmed = raw.trim();
                let lowered = trimmed.to_ascii_lowercase();
                if matches!(lowered.as_str(), "true" | "false" | "yes" | "no") {
                    self.boolean_matches += 1;
                } else if parse_numeric_token(trimmed).is_some() {
                    self.number_matches += 1;
                } else if parse_instant(trimmed).is_some() {
                    self.date_matches += 1;
                } else {
                    self.string_matches += 1;
                }
            }
            Json::Array(_) | Json::Object(_) => self.string_matches += 1,
        }
        self.observed += 1;
    }

    /// Most votes wins; ties resolve number > date > boolean > string.
    fn decide(&self) -> (DataType, usize) {
        let ranked = [
            (DataType::Number, self.number_matches),
            (DataType::Date, self.date_matches),
            (DataType::Boolean, self.boolean_matches),
            (DataType::String, self.string_matches),
        ];
        let mut best = ranked[0];
        for entry in &ranked[1..] {
            if entry.1 > best.1 {
                best = *entry;
            }
        }
        if best.1 == 0 {
            (DataType::String, 0)
        } else {
            best
        }
    }
}

fn collect_samples(values: &[&serde_json::Value]) -> Vec<serde_json::Value> {
    let mut seen = HashSet::new();
    let mut samples = Vec::with_capacity(SAMPLE_LIMIT);
    for value in values {
        if samples.len() >= SAMPLE_LIMIT {
            break;
        }
        if seen.insert(value.to_string()) {
            samples.push((*value).clone());
        }
    }
    samples
}
