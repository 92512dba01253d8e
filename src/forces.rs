// src/forces.rs

//! Force accumulation for one iteration.
//!
//! Three passes, each a barrier-separated parallel sweep over points:
//!
//! 1. repulsion: point `i` writes only its own accumulators,
//! 2. attraction, source side: for edge `s -> t`, point `s` writes its own,
//! 3. attraction, target side: point `t` writes its own, walking the
//!    incoming-edge index.
//!
//! Every pass reads positions from a `LayoutView` captured before pass 1 and
//! hands each worker exclusive `&mut` access to the points it owns. No point's
//! accumulator is ever written by two workers in the same pass; this is what
//! makes the sweep race-free without locks. Do not merge passes 2 and 3 into
//! one loop that writes both endpoints.

use nalgebra::Vector2;
use rayon::prelude::*;
use rayon::ThreadPool;

use crate::distance::DistanceMatrices;
use crate::graph::IncomingEdges;
use crate::point::{AxisDirections, DataPoint, NeighbourRef};

/// Floor for visual distances, keeps coincident projections finite.
pub const EPSILON: f64 = 1e-10;

/// Positions and activity of every projection, frozen for the duration of
/// the force passes.
#[derive(Clone, Debug)]
pub struct LayoutView {
    positions: Vec<Vector2<f64>>,
    offsets: Vec<usize>,
    active: Vec<bool>,
}

impl LayoutView {
    pub fn capture(points: &[DataPoint]) -> Self {
        let mut positions = Vec::with_capacity(points.len() + points.len() / 4);
        let mut offsets = Vec::with_capacity(points.len() + 1);
        offsets.push(0);
        for point in points {
            positions.extend(point.projections.iter().map(|p| p.position));
            offsets.push(positions.len());
        }
        let active = points.iter().map(|p| !p.ineffective).collect();
        LayoutView {
            positions,
            offsets,
            active,
        }
    }

    pub fn point_count(&self) -> usize {
        self.active.len()
    }

    pub fn projections(&self, point: usize) -> &[Vector2<f64>] {
        &self.positions[self.offsets[point]..self.offsets[point + 1]]
    }

    pub fn position(&self, target: NeighbourRef) -> Vector2<f64> {
        self.positions[self.offsets[target.point] + target.projection]
    }

    pub fn is_active(&self, point: usize) -> bool {
        self.active[point]
    }

    /// Largest distance between any two projections.
    pub fn max_pairwise_distance(&self) -> f64 {
        let mut max = 0.0_f64;
        for (i, a) in self.positions.iter().enumerate() {
            for b in &self.positions[i + 1..] {
                max = max.max((a - b).norm());
            }
        }
        max
    }
}

/// `base² / d` along the unit vector from `other` to `from`.
pub fn repulsive_force(
    from: Vector2<f64>,
    other: Vector2<f64>,
    squared_base_distance: f64,
) -> Vector2<f64> {
    let difference = from - other;
    let distance = difference.norm().max(EPSILON);
    difference * (squared_base_distance / distance / distance)
}

fn ratio(value: f64, max: f64) -> f64 {
    if max > 0.0 {
        value / max
    } else {
        0.0
    }
}

/// Constants shared by every force evaluation of a run.
#[derive(Clone, Debug)]
pub struct ForceField {
    pub base_distance: f64,
    pub squared_base_distance: f64,
    pub density: f64,
    pub max_transformed_distance: f64,
    pub max_visual_distance_at_start: f64,
    pub axes: AxisDirections,
}

impl ForceField {
    /// Attraction magnitude between two projections `visual_distance` apart
    /// whose points are `transformed` apart in the original space.
    ///
    /// The density term `(d / base)^(1 - density)` is corrected by how far the
    /// visual distance ratio lags the original one; the correction is clipped
    /// to half the density term.
    pub fn attraction_magnitude(&self, visual_distance: f64, transformed: f64) -> f64 {
        let density_term = (visual_distance / self.base_distance).powf(1.0 - self.density);
        let limit = density_term.abs() * 0.5;
        let lag = ratio(transformed, self.max_transformed_distance)
            - ratio(visual_distance, self.max_visual_distance_at_start);
        density_term + lag.clamp(-limit, limit)
    }

    /// Attraction felt by a projection at `from` towards one at `to`, before
    /// mass scaling.
    fn attraction_towards(
        &self,
        from: Vector2<f64>,
        to: Vector2<f64>,
        transformed: f64,
    ) -> Vector2<f64> {
        let difference = from - to;
        let distance = difference.norm().max(EPSILON);
        let magnitude = self.attraction_magnitude(distance, transformed);
        difference * (-magnitude / distance)
    }

    fn repel(
        &self,
        layout: &LayoutView,
        index: usize,
        point: &mut DataPoint,
        record_pressure: bool,
    ) {
        if !layout.is_active(index) {
            return;
        }
        for (slot, projection) in point.projections.iter_mut().enumerate() {
            let from = layout.projections(index)[slot];
            for other in 0..layout.point_count() {
                if !layout.is_active(other) {
                    continue;
                }
                for (other_slot, &position) in layout.projections(other).iter().enumerate() {
                    if other == index && other_slot == slot {
                        continue;
                    }
                    let force = repulsive_force(from, position, self.squared_base_distance);
                    projection.displacement += force;
                    if record_pressure {
                        projection.pressure.record(force, &self.axes);
                    }
                }
            }
        }
    }

    fn attract_as_source(
        &self,
        layout: &LayoutView,
        distances: &DistanceMatrices,
        index: usize,
        point: &mut DataPoint,
        record_pressure: bool,
    ) {
        if !layout.is_active(index) {
            return;
        }
        for (slot, projection) in point.projections.iter_mut().enumerate() {
            let from = layout.projections(index)[slot];
            for &target in &projection.neighbours {
                if target.point == index && target.projection == slot {
                    continue;
                }
                if !layout.is_active(target.point) {
                    continue;
                }
                let force = self.attraction_towards(
                    from,
                    layout.position(target),
                    distances.transformed(index, target.point),
                );
                projection.displacement += force / projection.mass;
                if record_pressure {
                    projection.pressure.record(force, &self.axes);
                }
            }
        }
    }

    fn attract_as_target(
        &self,
        layout: &LayoutView,
        distances: &DistanceMatrices,
        incoming: &[Vec<NeighbourRef>],
        index: usize,
        point: &mut DataPoint,
        record_pressure: bool,
    ) {
        if !layout.is_active(index) {
            return;
        }
        for (slot, projection) in point.projections.iter_mut().enumerate() {
            let at = layout.projections(index)[slot];
            for &source in &incoming[slot] {
                if source.point == index && source.projection == slot {
                    continue;
                }
                if !layout.is_active(source.point) {
                    continue;
                }
                let force = self.attraction_towards(
                    at,
                    layout.position(source),
                    distances.transformed(source.point, index),
                );
                projection.displacement += force / projection.mass;
                if record_pressure {
                    projection.pressure.record(force, &self.axes);
                }
            }
        }
    }
}

/// Runs the three force passes on `pool`, leaving every projection's
/// displacement (and pressure, when `record_pressure`) filled in.
/// Accumulators must have been reset by the caller.
pub fn accumulate_forces(
    pool: &ThreadPool,
    points: &mut [DataPoint],
    field: &ForceField,
    distances: &DistanceMatrices,
    incoming: &IncomingEdges,
    record_pressure: bool,
) {
    let layout = LayoutView::capture(points);
    pool.install(|| {
        points.par_iter_mut().enumerate().for_each(|(index, point)| {
            field.repel(&layout, index, point, record_pressure);
        });

        points.par_iter_mut().enumerate().for_each(|(index, point)| {
            field.attract_as_source(&layout, distances, index, point, record_pressure);
        });

        points
            .par_iter_mut()
            .zip(incoming.per_point().par_iter())
            .enumerate()
            .for_each(|(index, (point, edges))| {
                field.attract_as_target(&layout, distances, edges, index, point, record_pressure);
            });
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::axis_directions;

    fn field() -> ForceField {
        ForceField {
            base_distance: 10.0,
            squared_base_distance: 100.0,
            density: 0.9,
            max_transformed_distance: 1.0,
            max_visual_distance_at_start: 100.0,
            axes: axis_directions(),
        }
    }

    #[test]
    fn repulsion_is_inverse_distance() {
        let force = repulsive_force(Vector2::new(5.0, 0.0), Vector2::zeros(), 100.0);
        assert!((force.x - 20.0).abs() < 1e-12);
        assert_eq!(force.y, 0.0);
    }

    #[test]
    fn coincident_repulsion_stays_finite() {
        let force = repulsive_force(Vector2::new(1.0, 1.0), Vector2::new(1.0, 1.0), 100.0);
        assert!(force.x.is_finite() && force.y.is_finite());
    }

    #[test]
    fn correction_is_clipped_to_half_the_density_term() {
        let field = field();
        let density_term = (50.0_f64 / 10.0).powf(0.1);
        // Original-space ratio far above the visual one: correction saturates.
        let magnitude = field.attraction_magnitude(50.0, 1.0e6);
        assert!((magnitude - density_term * 1.5).abs() < 1e-12);
        // Visual ratio far above the original one: saturates the other way.
        let magnitude = field.attraction_magnitude(50.0, -1.0e6);
        assert!((magnitude - density_term * 0.5).abs() < 1e-12);
    }

    #[test]
    fn attraction_pulls_towards_target() {
        let field = field();
        let force = field.attraction_towards(Vector2::new(10.0, 0.0), Vector2::zeros(), 0.1);
        assert!(force.x < 0.0);
        assert!(force.y.abs() < 1e-12);
    }
}
