// src/layering.rs

//! Red/gray layer bookkeeping for phases 2 and 3.

use crate::point::{DataPoint, Layer, PRESSURE_AXES};

/// Points whose peak axis pressure is further than this many standard
/// deviations from the mean count towards the gray capacity.
pub const OUTLIER_Z_SCORE: f64 = 1.2;

/// Largest primary-projection axis total of every point.
pub fn peak_pressures(points: &[DataPoint]) -> Vec<f64> {
    points
        .iter()
        .map(|point| point.primary().pressure.max_total())
        .collect()
}

/// Number of points the gray layer may hold: the pressure outliers, capped at
/// a quarter of all points.
pub fn gray_capacity(points: &[DataPoint]) -> usize {
    if points.is_empty() {
        return 0;
    }
    let peaks = peak_pressures(points);
    let n = peaks.len() as f64;
    let mean = peaks.iter().sum::<f64>() / n;
    let variance = peaks.iter().map(|p| (p - mean) * (p - mean)).sum::<f64>() / n;
    let deviation = variance.sqrt();

    let outliers = peaks
        .iter()
        .filter(|&&p| (p - mean).abs() > OUTLIER_Z_SCORE * deviation)
        .count();
    outliers.min(points.len() / 4)
}

pub fn gray_count(points: &[DataPoint]) -> usize {
    points.iter().filter(|p| p.layer == Layer::Gray).count()
}

/// Demotes the red point carrying the single largest axis pressure and
/// returns its index. Scans points then axes with a strict comparison from
/// `-1`, so the first point reaching the maximum is chosen.
pub fn demote_most_pressured(points: &mut [DataPoint]) -> Option<usize> {
    let mut best = -1.0_f64;
    let mut chosen = None;
    for (index, point) in points.iter().enumerate() {
        if !point.is_red() {
            continue;
        }
        let pressure = &point.primary().pressure;
        for axis in 0..PRESSURE_AXES {
            let total = pressure.total(axis);
            if total > best {
                best = total;
                chosen = Some(index);
            }
        }
    }

    let index = chosen?;
    points[index].demote();
    Some(index)
}

/// Phase 3: gray points move and exert force again, red points stay put.
pub fn swap_active_layer(points: &mut [DataPoint]) {
    for point in points.iter_mut() {
        match point.layer {
            Layer::Gray => {
                point.ineffective = false;
                point.frozen = false;
            }
            Layer::Red => point.frozen = true,
        }
    }
}
