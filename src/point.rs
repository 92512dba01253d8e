// src/point.rs

//! Per-point simulation state.
//!
//! A `DataPoint` owns one or two `Projection`s. Everything that used to be a
//! parallel array (position, mass, displacement, pressure, neighbour edges)
//! lives inside the projection, so the per-slot data cannot drift apart when
//! a split appends a second slot.

use std::f64::consts::PI;
use std::fmt;

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

/// Number of angular pressure bins, 10 degrees apart.
pub const PRESSURE_AXES: usize = 36;

/// A point never holds more than its primary projection and one split duplicate.
pub const MAX_PROJECTIONS: usize = 2;

/// Unit direction of every pressure axis, indexed by axis number.
pub type AxisDirections = [Vector2<f64>; PRESSURE_AXES];

pub fn axis_directions() -> AxisDirections {
    std::array::from_fn(|axis| {
        let angle = PI * (axis as f64) * 10.0 / 180.0;
        Vector2::new(angle.cos(), angle.sin())
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Red,
    Gray,
}

impl Layer {
    pub fn as_str(self) -> &'static str {
        match self {
            Layer::Red => "red",
            Layer::Gray => "gray",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Directed attraction edge target: a specific projection of another point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NeighbourRef {
    pub point: usize,
    pub projection: usize,
}

impl NeighbourRef {
    pub fn primary(point: usize) -> Self {
        NeighbourRef {
            point,
            projection: 0,
        }
    }
}

/// Directional force accumulators over the 36 axes.
///
/// For every recorded force `f` and axis direction `a`, the dot product `a·f`
/// goes to `positive[axis]` when positive and `-(a·f)` to `negative[axis]`
/// otherwise, so opposing forces add up instead of cancelling.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PressureBins {
    pub positive: [f64; PRESSURE_AXES],
    pub negative: [f64; PRESSURE_AXES],
}

impl Default for PressureBins {
    fn default() -> Self {
        PressureBins {
            positive: [0.0; PRESSURE_AXES],
            negative: [0.0; PRESSURE_AXES],
        }
    }
}

impl PressureBins {
    pub fn clear(&mut self) {
        self.positive = [0.0; PRESSURE_AXES];
        self.negative = [0.0; PRESSURE_AXES];
    }

    pub fn record(&mut self, force: Vector2<f64>, axes: &AxisDirections) {
        for (axis, direction) in axes.iter().enumerate() {
            let pressure = direction.dot(&force);
            if pressure > 0.0 {
                self.positive[axis] += pressure;
            } else {
                self.negative[axis] -= pressure;
            }
        }
    }

    pub fn total(&self, axis: usize) -> f64 {
        self.positive[axis] + self.negative[axis]
    }

    /// Largest per-axis total, 0 when nothing was recorded.
    pub fn max_total(&self) -> f64 {
        (0..PRESSURE_AXES)
            .map(|axis| self.total(axis))
            .fold(0.0, f64::max)
    }

    /// Axis carrying the most pressure; the first axis wins ties.
    /// `None` when every axis is at zero.
    pub fn strongest_axis(&self) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for axis in 0..PRESSURE_AXES {
            let total = self.total(axis);
            if total > best.map_or(0.0, |(_, value)| value) {
                best = Some((axis, total));
            }
        }
        best.map(|(axis, _)| axis)
    }
}

/// One visual position of a point plus its per-iteration accumulators.
#[derive(Clone, Debug, PartialEq)]
pub struct Projection {
    pub position: Vector2<f64>,
    pub mass: f64,
    pub displacement: Vector2<f64>,
    pub pressure: PressureBins,
    pub neighbours: Vec<NeighbourRef>,
}

impl Projection {
    pub fn at(position: Vector2<f64>) -> Self {
        Projection {
            position,
            mass: 1.0,
            displacement: Vector2::zeros(),
            pressure: PressureBins::default(),
            neighbours: Vec::new(),
        }
    }

    pub fn reset_accumulators(&mut self) {
        self.displacement = Vector2::zeros();
        self.pressure.clear();
    }
}

/// One input observation and its evolving layout state.
#[derive(Clone, Debug)]
pub struct DataPoint {
    pub id: usize,
    pub class_label: i32,
    pub coordinates: Option<Vec<f64>>,
    pub projections: Vec<Projection>,
    pub layer: Layer,
    /// Neither exerts nor receives force.
    pub ineffective: bool,
    /// Forces still accumulate but the point does not move.
    pub frozen: bool,
    pub split_failed: bool,
}

impl DataPoint {
    pub fn new(id: usize, class_label: i32, coordinates: Option<Vec<f64>>) -> Self {
        DataPoint {
            id,
            class_label,
            coordinates,
            projections: vec![Projection::at(Vector2::zeros())],
            layer: Layer::Red,
            ineffective: false,
            frozen: false,
            split_failed: false,
        }
    }

    pub fn is_red(&self) -> bool {
        self.layer == Layer::Red
    }

    pub fn primary(&self) -> &Projection {
        &self.projections[0]
    }

    pub fn primary_mut(&mut self) -> &mut Projection {
        &mut self.projections[0]
    }

    pub fn total_mass(&self) -> f64 {
        self.projections.iter().map(|p| p.mass).sum()
    }

    /// Moves a red point to the gray layer, silenced and frozen.
    /// Returns false if the point was already gray; layers never go back.
    pub fn demote(&mut self) -> bool {
        if self.layer == Layer::Gray {
            return false;
        }
        self.layer = Layer::Gray;
        self.ineffective = true;
        self.frozen = true;
        true
    }
}
