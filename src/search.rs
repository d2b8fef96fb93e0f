use chrono::NaiveDateTime;

use crate::{mapping::Axis, transform::ProcessedPoint};

fn metric(point: &ProcessedPoint<'_>, axis: Axis) -> Option<f64> {
    point.get(axis).and_then(|value| value.as_metric())
}

/// Number of leading points that carry a metric value (number, or date as
/// epoch millis) for `axis`. Unmeasured points must sit at the tail.
fn measured_len(points: &[ProcessedPoint<'_>], axis: Axis) -> usize {
    points.partition_point(|point| metric(point, axis).is_some())
}

/// The point whose `axis` value is closest to `target`. Ties go to the
/// earlier point.
pub fn nearest<'p, 'a>(
    points: &'p [ProcessedPoint<'a>],
    axis: Axis,
    target: f64,
) -> Option<&'p ProcessedPoint<'a>> {
    if !target.is_finite() {
        return None;
    }
    let measured = &points[..measured_len(points, axis)];
    let split = measured.partition_point(|point| metric(point, axis).is_some_and(|m| m < target));

    let before = split.checked_sub(1).map(|idx| &measured[idx]);
    let after = measured.get(split);
    match (before, after) {
        (Some(left), Some(right)) => {
            let left_gap = (target - metric(left, axis)?).abs();
            let right_gap = (metric(right, axis)? - target).abs();
            Some(if right_gap < left_gap { right } else { left })
        }
        (Some(only), None) | (None, Some(only)) => Some(only),
        (None, None) => None,
    }
}

pub fn nearest_date<'p, 'a>(
    points: &'p [ProcessedPoint<'a>],
    axis: Axis,
    target: NaiveDateTime,
) -> Option<&'p ProcessedPoint<'a>> {
    nearest(points, axis, target.and_utc().timestamp_millis() as f64)
}

/// Points whose `axis` value lies in `[low, high]`, as a subslice.
pub fn range<'p, 'a>(
    points: &'p [ProcessedPoint<'a>],
    axis: Axis,
    low: f64,
    high: f64,
) -> &'p [ProcessedPoint<'a>] {
    let measured = &points[..measured_len(points, axis)];
    if low.is_nan() || high.is_nan() || low > high {
        return &measured[..0];
    }
    let start = measured.partition_point(|point| metric(point, axis).is_some_and(|m| m < low));
    let end = measured.partition_point(|point| metric(point, axis).is_some_and(|m| m <= high));
    &measured[start..end.max(start)]
}
