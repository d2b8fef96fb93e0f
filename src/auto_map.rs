//! Axis role guessing from field descriptors, used as the lowest-priority
//! mapping source.

use itertools::Itertools;

use crate::{
    analyzer::FieldDescriptor,
    detect::DataType,
    mapping::{Axis, AxisMap},
};

const CATEGORY_MIN_UNIQUE: usize = 2;
const CATEGORY_MAX_UNIQUE: usize = 20;

/// Field names ranked by role suitability.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldRanking {
    /// Numeric fields at or above the threshold, most confident first.
    pub numeric: Vec<String>,
    /// Date fields at or above the threshold, most confident first.
    pub dates: Vec<String>,
    /// Low-cardinality string fields, fewest distinct values first.
    pub categories: Vec<String>,
}

impl FieldRanking {
    pub fn rank(fields: &[FieldDescriptor], threshold: f64) -> Self {
        let by_confidence = |data_type: DataType| {
            fields
                .iter()
                .filter(|field| field.meets(data_type, threshold))
                .sorted_by(|a, b| b.confidence.total_cmp(&a.confidence))
                .map(|field| field.name.clone())
                .collect::<Vec<_>>()
        };
        let categories = fields
            .iter()
            .filter(|field| {
                field.inferred_type == DataType::String
                    && (CATEGORY_MIN_UNIQUE..=CATEGORY_MAX_UNIQUE).contains(&field.unique_count)
            })
            .sorted_by_key(|field| field.unique_count)
            .map(|field| field.name.clone())
            .collect();
        Self {
            numeric: by_confidence(DataType::Number),
            dates: by_confidence(DataType::Date),
            categories,
        }
    }

    /// Proposes field names for x, y, color and size.
    pub fn propose(&self) -> AxisMap<String> {
        let mut proposal = AxisMap::new();

        let x = self
            .dates
            .first()
            .or_else(|| self.categories.first())
            .or_else(|| self.numeric.get(1));
        if let Some(x) = x {
            proposal.set(Axis::X, x.clone());
        }
        if let Some(y) = self.numeric.first() {
            proposal.set(Axis::Y, y.clone());
        }

        let color = self
            .categories
            .get(1)
            .filter(|candidate| Some(*candidate) != x)
            .or_else(|| self.categories.first().filter(|candidate| Some(*candidate) != x));
        if let Some(color) = color {
            proposal.set(Axis::Color, color.clone());
        }

        if let Some(size) = self.numeric.get(1).filter(|candidate| Some(*candidate) != x) {
            proposal.set(Axis::Size, size.clone());
        }

        proposal
    }
}

pub fn auto_mapping(fields: &[FieldDescriptor], threshold: f64) -> AxisMap<String> {
    FieldRanking::rank(fields, threshold).propose()
}
