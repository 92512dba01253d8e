// src/split.rs

//! Vertex split: one point, two visual positions.
//!
//! The neighbourhood of the point's primary projection is cut by the line
//! perpendicular to its strongest pressure axis. Neighbours behind the line
//! stay with projection 0, the rest move to a new projection placed at their
//! centroid. Mass follows the edge counts.

use nalgebra::Vector2;

use crate::point::{AxisDirections, DataPoint, NeighbourRef, Projection, MAX_PROJECTIONS};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SplitFailure {
    /// Every axis total is zero.
    NoPressure,
    /// All neighbours fell on one side of the cut.
    OneSidedNeighbourhood,
    AlreadySplit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SplitOutcome {
    Split {
        axis: usize,
        primary_edges: usize,
        secondary_edges: usize,
    },
    Failed(SplitFailure),
}

impl SplitOutcome {
    pub fn is_split(&self) -> bool {
        matches!(self, SplitOutcome::Split { .. })
    }
}

fn position_of(points: &[DataPoint], target: NeighbourRef) -> Vector2<f64> {
    points[target.point].projections[target.projection].position
}

/// Attempts to split the primary projection of `points[index]`.
///
/// On failure the point is left untouched apart from `split_failed`.
pub fn split_vertex(points: &mut [DataPoint], index: usize, axes: &AxisDirections) -> SplitOutcome {
    let outcome = plan_split(points, index, axes);
    match outcome {
        Ok(plan) => {
            let outcome = SplitOutcome::Split {
                axis: plan.axis,
                primary_edges: plan.behind.len(),
                secondary_edges: plan.ahead.len(),
            };
            apply_split(&mut points[index], plan);
            outcome
        }
        Err(failure) => {
            points[index].split_failed = true;
            SplitOutcome::Failed(failure)
        }
    }
}

struct SplitPlan {
    axis: usize,
    behind: Vec<NeighbourRef>,
    ahead: Vec<NeighbourRef>,
    centroid: Vector2<f64>,
}

fn plan_split(
    points: &[DataPoint],
    index: usize,
    axes: &AxisDirections,
) -> Result<SplitPlan, SplitFailure> {
    let point = &points[index];
    if point.projections.len() >= MAX_PROJECTIONS {
        return Err(SplitFailure::AlreadySplit);
    }
    let primary = point.primary();
    let axis = primary
        .pressure
        .strongest_axis()
        .ok_or(SplitFailure::NoPressure)?;
    let direction = axes[axis];

    let mut behind = Vec::new();
    let mut ahead = Vec::new();
    let mut ahead_sum = Vector2::zeros();
    for &neighbour in &primary.neighbours {
        let position = position_of(points, neighbour);
        if direction.dot(&(position - primary.position)) < 0.0 {
            behind.push(neighbour);
        } else {
            ahead.push(neighbour);
            ahead_sum += position;
        }
    }
    if behind.is_empty() || ahead.is_empty() {
        return Err(SplitFailure::OneSidedNeighbourhood);
    }

    let centroid = ahead_sum / ahead.len() as f64;
    Ok(SplitPlan {
        axis,
        behind,
        ahead,
        centroid,
    })
}

fn apply_split(point: &mut DataPoint, plan: SplitPlan) {
    let total = (plan.behind.len() + plan.ahead.len()) as f64;
    let mass = point.primary().mass;

    let mut secondary = Projection::at(plan.centroid);
    secondary.mass = mass * plan.ahead.len() as f64 / total;
    secondary.neighbours = plan.ahead;

    let primary = point.primary_mut();
    primary.mass = mass * plan.behind.len() as f64 / total;
    primary.neighbours = plan.behind;

    point.projections.push(secondary);
}
