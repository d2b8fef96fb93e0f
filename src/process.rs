use std::{
    cmp::Ordering,
    panic::{AssertUnwindSafe, catch_unwind},
};

use log::debug;

use crate::{
    config::{RowFilter, SortSpec},
    data::{ComparableValue, Value},
    error::{ProcessorError, panic_message},
    mapping::Axis,
    transform::ProcessedPoint,
};

/// Keeps points accepted by `filter`. A failing predicate keeps the point.
pub fn apply_filter<'a>(
    points: Vec<ProcessedPoint<'a>>,
    filter: &RowFilter,
    warnings: &mut Vec<String>,
) -> Vec<ProcessedPoint<'a>> {
    let before = points.len();
    let kept = points
        .into_iter()
        .enumerate()
        .filter_map(|(position, point)| {
            let verdict = catch_unwind(AssertUnwindSafe(|| filter.call(&point, position)));
            let keep = match verdict {
                Ok(Ok(keep)) => keep,
                Ok(Err(err)) => {
                    warnings.push(
                        ProcessorError::Filter {
                            position,
                            message: format!("{err:#}"),
                        }
                        .to_string(),
                    );
                    true
                }
                Err(payload) => {
                    warnings.push(
                        ProcessorError::Filter {
                            position,
                            message: panic_message(payload.as_ref()),
                        }
                        .to_string(),
                    );
                    true
                }
            };
            keep.then_some(point)
        })
        .collect::<Vec<_>>();
    debug!("Filter kept {} of {} point(s)", kept.len(), before);
    kept
}

/// The value a sort key names: a canonical axis, else a top-level raw field.
pub fn sort_key(point: &ProcessedPoint<'_>, field: &str) -> ComparableValue {
    match Axis::from_canonical(field) {
        Some(axis) => ComparableValue(point.get(axis).cloned()),
        None => ComparableValue(point.original_data.get(field).map(Value::from_json)),
    }
}

/// Stable sort; missing and null keys always come last, in either direction.
pub fn apply_sort<'a>(points: Vec<ProcessedPoint<'a>>, spec: &SortSpec) -> Vec<ProcessedPoint<'a>> {
    let ascending = spec.ascending();
    let mut keyed = points
        .into_iter()
        .map(|point| (sort_key(&point, &spec.field), point))
        .collect::<Vec<_>>();
    keyed.sort_by(|(left, _), (right, _)| compare_keys(left, right, ascending));
    keyed.into_iter().map(|(_, point)| point).collect()
}

fn compare_keys(left: &ComparableValue, right: &ComparableValue, ascending: bool) -> Ordering {
    match (left.is_missing(), right.is_missing()) {
        (false, false) if !ascending => left.cmp(right).reverse(),
        _ => left.cmp(right),
    }
}

pub fn paginate<'a>(
    points: Vec<ProcessedPoint<'a>>,
    offset: usize,
    limit: Option<usize>,
) -> Vec<ProcessedPoint<'a>> {
    let iter = points.into_iter().skip(offset);
    match limit {
        Some(limit) => iter.take(limit).collect(),
        None => iter.collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SortDirection;
    use anyhow::anyhow;
    use serde_json::json;

    fn points_with_y<'a>(rows: &'a [serde_json::Value], ys: &[Option<f64>]) -> Vec<ProcessedPoint<'a>> {
        rows.iter()
            .zip(ys)
            .enumerate()
            .map(|(index, (row, y))| ProcessedPoint {
                x: Some(Value::Number(index as f64)),
                y: y.map(Value::Number),
                color: None,
                size: None,
                category: None,
                value: None,
                original_data: row,
                index,
            })
            .collect()
    }

    fn ys(points: &[ProcessedPoint<'_>]) -> Vec<Option<f64>> {
        points
            .iter()
            .map(|p| p.y.as_ref().and_then(Value::as_number))
            .collect()
    }

    #[test]
    fn missing_keys_sort_last_in_both_directions() {
        let rows = vec![json!({}); 3];
        let points = points_with_y(&rows, &[Some(3.0), None, Some(1.0)]);

        let points = apply_sort(points, &SortSpec::new("y", SortDirection::Asc));
        assert_eq!(ys(&points), vec![Some(1.0), Some(3.0), None]);

        let points = apply_sort(points, &SortSpec::new("y", SortDirection::Desc));
        assert_eq!(ys(&points), vec![Some(3.0), Some(1.0), None]);
    }

    #[test]
    fn sort_is_stable_for_equal_keys() {
        let rows = vec![json!({}); 4];
        let points = points_with_y(&rows, &[Some(2.0), Some(1.0), Some(2.0), Some(1.0)]);
        let points = apply_sort(points, &SortSpec::new("y", SortDirection::Desc));
        let indices = points.iter().map(|p| p.index).collect::<Vec<_>>();
        assert_eq!(indices, vec![0, 2, 1, 3]);
    }

    #[test]
    fn unknown_sort_field_reads_original_data() {
        let rows = vec![json!({"rank": 2}), json!({"rank": 1}), json!({})];
        let points = points_with_y(&rows, &[None, None, None]);
        let points = apply_sort(points, &SortSpec::new("rank", SortDirection::Asc));
        let indices = points.iter().map(|p| p.index).collect::<Vec<_>>();
        assert_eq!(indices, vec![1, 0, 2]);
    }

    #[test]
    fn failing_filters_keep_points_and_warn() {
        let rows = vec![json!({}); 3];
        let points = points_with_y(&rows, &[Some(1.0), Some(2.0), Some(3.0)]);
        let filter = RowFilter::new(|point, position| match position {
            0 => Err(anyhow!("bad predicate")),
            1 => panic!("predicate panicked"),
            _ => Ok(point.y == Some(Value::Number(10.0))),
        });
        let mut warnings = Vec::new();
        let kept = apply_filter(points, &filter, &mut warnings);

        assert_eq!(kept.iter().map(|p| p.index).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("bad predicate"));
        assert!(warnings[1].contains("predicate panicked"));
    }

    #[test]
    fn paginate_applies_offset_then_limit() {
        let rows = vec![json!({}); 5];
        let points = points_with_y(&rows, &[Some(0.0); 5]);
        let page = paginate(points.clone(), 1, Some(2));
        assert_eq!(page.iter().map(|p| p.index).collect::<Vec<_>>(), vec![1, 2]);

        let rest = paginate(points.clone(), 3, None);
        assert_eq!(rest.iter().map(|p| p.index).collect::<Vec<_>>(), vec![3, 4]);

        assert!(paginate(points, 9, None).is_empty());
    }
}
