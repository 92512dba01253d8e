// src/distance.rs

//! Original-space dissimilarities and the local-scale transform used by the
//! attractive force.

use ndarray::{Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{EmbedError, Result};
use crate::knn::nearest_in_row;

/// Rank of the neighbour whose distance sets each point's local scale.
pub const LOCAL_SCALE_RANK: usize = 20;

/// Below this absolute dot product the cosine distance is pinned to 1.
const COSINE_DOT_FLOOR: f64 = 1e-6;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Euclidean,
    Cosine,
}

impl Metric {
    pub fn distance(self, a: &[f64], b: &[f64]) -> f64 {
        match self {
            Metric::Euclidean => euclidean(a, b),
            Metric::Cosine => cosine(a, b),
        }
    }
}

pub fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// `1 - cos(a, b)`, or exactly 1 when `|a·b|` is too small to divide safely.
/// This also covers zero vectors.
pub fn cosine(a: &[f64], b: &[f64]) -> f64 {
    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if dot.abs() < COSINE_DOT_FLOOR {
        return 1.0;
    }
    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Raw and transformed pairwise distances for one run.
#[derive(Clone, Debug)]
pub struct DistanceMatrices {
    before: Array2<f64>,
    after: Array2<f64>,
}

impl DistanceMatrices {
    /// Builds both matrices from coordinate vectors.
    pub fn from_coordinates(coordinates: &[Vec<f64>], metric: Metric) -> Result<Self> {
        Self::from_raw(pairwise(coordinates, metric))
    }

    /// Builds the transformed matrix on top of a precomputed raw matrix.
    pub fn from_raw(before: Array2<f64>) -> Result<Self> {
        if before.nrows() != before.ncols() {
            return Err(EmbedError::spec(format!(
                "distance matrix must be square, got {}x{}",
                before.nrows(),
                before.ncols()
            )));
        }
        let after = transform(&before)?;
        Ok(DistanceMatrices { before, after })
    }

    pub fn len(&self) -> usize {
        self.before.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn before(&self) -> &Array2<f64> {
        &self.before
    }

    pub fn after(&self) -> &Array2<f64> {
        &self.after
    }

    pub fn transformed(&self, i: usize, j: usize) -> f64 {
        self.after[[i, j]]
    }

    pub fn max_transformed(&self) -> f64 {
        self.after.iter().copied().fold(0.0, f64::max)
    }
}

/// Full pairwise matrix, rows computed in parallel. The diagonal is 0.
pub fn pairwise(coordinates: &[Vec<f64>], metric: Metric) -> Array2<f64> {
    let n = coordinates.len();
    let mut matrix = Array2::<f64>::zeros((n, n));
    matrix
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(i, mut row)| {
            for j in 0..n {
                if i != j {
                    row[j] = metric.distance(&coordinates[i], &coordinates[j]);
                }
            }
        });
    matrix
}

/// Per-point scale `tan(1) / d20`, where `d20` is the distance to the 20th
/// nearest other point.
pub fn local_scales(before: &Array2<f64>) -> Result<Vec<f64>> {
    let n = before.nrows();
    let others = n.saturating_sub(1);
    if others < LOCAL_SCALE_RANK {
        return Err(EmbedError::NotEnoughPoints {
            required: LOCAL_SCALE_RANK,
            found: others,
        });
    }

    let scales = (0..n)
        .into_par_iter()
        .map(|i| {
            let row = before.row(i);
            let nearest = nearest_in_row(row, i, LOCAL_SCALE_RANK);
            let d20 = row[nearest[LOCAL_SCALE_RANK - 1]];
            1.0_f64.tan() / d20
        })
        .collect();
    Ok(scales)
}

/// `atan(m * d)`, taking coincident points as 0 even when `m` is infinite.
fn scaled_atan(scale: f64, distance: f64) -> f64 {
    if distance == 0.0 {
        0.0
    } else {
        (scale * distance).atan()
    }
}

/// `after[i][j] = (atan(m_i d_ij) + atan(m_j d_ij)) / 2`.
pub fn transform(before: &Array2<f64>) -> Result<Array2<f64>> {
    let scales = local_scales(before)?;
    let n = before.nrows();
    let mut after = Array2::<f64>::zeros((n, n));
    after
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(i, mut row)| {
            for j in 0..n {
                let d = before[[i, j]];
                row[j] = (scaled_atan(scales[i], d) + scaled_atan(scales[j], d)) / 2.0;
            }
        });
    Ok(after)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaled_atan_handles_infinite_scale() {
        assert_eq!(scaled_atan(f64::INFINITY, 0.0), 0.0);
        assert_eq!(scaled_atan(f64::INFINITY, 2.0), std::f64::consts::FRAC_PI_2);
    }

    #[test]
    fn euclidean_matches_hand_computation() {
        assert_eq!(euclidean(&[0.0, 0.0], &[3.0, 4.0]), 5.0);
    }
}
