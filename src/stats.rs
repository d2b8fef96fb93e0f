use std::collections::BTreeMap;

use serde::Serialize;

use crate::{analyzer::FieldDescriptor, data::RawRecord, table};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Statistics {
    pub total: usize,
    /// Points emitted after filtering and pagination.
    pub valid: usize,
    pub invalid: usize,
    pub nulls: usize,
    pub fields: BTreeMap<String, FieldDescriptor>,
}

impl Statistics {
    pub fn collect(rows: &[RawRecord], valid: usize, fields: &[FieldDescriptor]) -> Self {
        let total = rows.len();
        let valid = valid.min(total);
        Self {
            total,
            valid,
            invalid: total - valid,
            nulls: rows.iter().filter(|row| row.is_null()).count(),
            fields: fields
                .iter()
                .map(|field| (field.name.clone(), field.clone()))
                .collect(),
        }
    }

    pub fn render_summary(&self) -> String {
        let headers = ["total", "valid", "invalid", "nulls"]
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>();
        let row = [self.total, self.valid, self.invalid, self.nulls]
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        table::render_table(&headers, &[row])
    }
}
