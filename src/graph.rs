// src/graph.rs

//! Neighbourhood graph: directed attraction edges from every point to its K
//! nearest points by transformed distance.

use rayon::prelude::*;

use crate::distance::DistanceMatrices;
use crate::error::{EmbedError, Result};
use crate::knn::nearest_in_row;
use crate::point::{DataPoint, NeighbourRef};

/// Default K: a third of the point count.
pub fn default_neighbour_count(point_count: usize) -> usize {
    point_count / 3
}

/// Checks that K leaves every point with K distinct other points.
pub fn validate_neighbour_count(k: usize, point_count: usize) -> Result<()> {
    if k == 0 || k >= point_count {
        return Err(EmbedError::spec(format!(
            "number of neighbours for the neighbourhood graph must be in 1..={}, got {}",
            point_count.saturating_sub(1),
            k
        )));
    }
    Ok(())
}

/// K nearest neighbours of every point, nearest first. Equal distances are
/// ordered by point index.
pub fn nearest_neighbours(distances: &DistanceMatrices, k: usize) -> Vec<Vec<usize>> {
    let after = distances.after();
    (0..distances.len())
        .into_par_iter()
        .map(|i| nearest_in_row(after.row(i), i, k))
        .collect()
}

/// Replaces every point's edges with a fresh K-NN graph pointing at primary
/// projections. Points must still be unsplit.
pub fn build_neighbourhood_graph(
    points: &mut [DataPoint],
    distances: &DistanceMatrices,
    k: usize,
) -> Result<()> {
    validate_neighbour_count(k, points.len())?;
    let neighbours = nearest_neighbours(distances, k);
    for (point, nearest) in points.iter_mut().zip(neighbours) {
        debug_assert_eq!(point.projections.len(), 1);
        point.projections.truncate(1);
        point.primary_mut().neighbours = nearest.into_iter().map(NeighbourRef::primary).collect();
    }
    Ok(())
}

/// Reverse adjacency: for each (point, projection), the edges that end there,
/// as (source point, source projection), in source order.
///
/// Attraction pass 2 walks this index so that each worker only touches the
/// accumulators of the targets it owns.
#[derive(Clone, Debug, Default)]
pub struct IncomingEdges {
    edges: Vec<Vec<Vec<NeighbourRef>>>,
}

impl IncomingEdges {
    pub fn build(points: &[DataPoint]) -> Self {
        let mut edges: Vec<Vec<Vec<NeighbourRef>>> = points
            .iter()
            .map(|point| vec![Vec::new(); point.projections.len()])
            .collect();
        for (source, point) in points.iter().enumerate() {
            for (source_projection, projection) in point.projections.iter().enumerate() {
                for target in &projection.neighbours {
                    edges[target.point][target.projection].push(NeighbourRef {
                        point: source,
                        projection: source_projection,
                    });
                }
            }
        }
        IncomingEdges { edges }
    }

    pub fn edges_into(&self, point: usize, projection: usize) -> &[NeighbourRef] {
        &self.edges[point][projection]
    }

    pub fn per_point(&self) -> &[Vec<Vec<NeighbourRef>>] {
        &self.edges
    }
}
