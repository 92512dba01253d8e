// src/engine.rs

//! Four-phase layout simulation.
//!
//! Phase 1 lays out the whole graph. Phase 2 demotes the most pressured red
//! points to the gray layer, one per iteration. Phase 3 freezes the red layer
//! and lets the gray points settle around it. Phase 4 splits gray points whose
//! neighbourhood pulls them two ways and anneals once more.

use nalgebra::Vector2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info};

use crate::distance::DistanceMatrices;
use crate::error::{EmbedError, Result};
use crate::forces::{accumulate_forces, ForceField, LayoutView};
use crate::graph::{build_neighbourhood_graph, default_neighbour_count, IncomingEdges};
use crate::layering::{demote_most_pressured, gray_capacity, gray_count, swap_active_layer};
use crate::point::{axis_directions, DataPoint, Layer};
use crate::snapshot::{Embedding, IterationSnapshot};
use crate::split::{split_vertex, SplitOutcome};

pub const ITERATIONS: u32 = 1830;
pub const GRAY_SELECTION_START: u32 = 500;
pub const GRAY_RELAXATION_START: u32 = 950;
pub const SPLITTING_START: u32 = 1340;

pub const CANVAS_WIDTH: f64 = 1000.0;
pub const CANVAS_HEIGHT: f64 = 1000.0;

pub const INITIAL_TEMPERATURE: f64 = 100.0;
/// Iterations over which the temperature falls from its initial value to 0.
const COOLING_SPAN: f64 = 1000.0;

pub const DEFAULT_SEED: u64 = 159_720_256_358_285_954;
pub const DEFAULT_DENSITY: f64 = 0.9;

/// Share of the frame range added on each side when the frame is fixed.
const FRAME_MARGIN: f64 = 1.0 / 20.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    General,
    GraySelection,
    GrayRelaxation,
    Splitting,
}

impl Phase {
    pub fn number(self) -> u8 {
        match self {
            Phase::General => 1,
            Phase::GraySelection => 2,
            Phase::GrayRelaxation => 3,
            Phase::Splitting => 4,
        }
    }
}

/// Rectangle every projection is clamped into from phase 2 on.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Frame {
    pub low: Vector2<f64>,
    pub high: Vector2<f64>,
}

impl Frame {
    /// Bounding box of all projections, widened by a twentieth of its range
    /// on every side.
    pub fn around(points: &[DataPoint]) -> Frame {
        let mut low = Vector2::repeat(f64::INFINITY);
        let mut high = Vector2::repeat(f64::NEG_INFINITY);
        for projection in points.iter().flat_map(|p| &p.projections) {
            low = low.inf(&projection.position);
            high = high.sup(&projection.position);
        }
        let margin = (high - low) * FRAME_MARGIN;
        Frame {
            low: low - margin,
            high: high + margin,
        }
    }

    pub fn clamp(&self, position: Vector2<f64>) -> Vector2<f64> {
        Vector2::new(
            position.x.max(self.low.x).min(self.high.x),
            position.y.max(self.low.y).min(self.high.y),
        )
    }
}

/// Hardware threads minus one, never below one.
pub fn default_worker_threads() -> usize {
    num_cpus::get().saturating_sub(1).max(1)
}

/// Rejects density parameters outside the open unit interval.
pub fn validate_density(density: f64) -> Result<()> {
    if !(density > 0.0 && density < 1.0) {
        return Err(EmbedError::spec(format!(
            "visual density adjustment parameter must lie in (0, 1), got {density}"
        )));
    }
    Ok(())
}

/// Knobs of a single embedding run.
#[derive(Clone, Debug, PartialEq)]
pub struct EmbeddingParameters {
    pub density: f64,
    /// K of the neighbourhood graph; a third of the points when `None`.
    pub neighbour_count: Option<usize>,
    pub seed: u64,
    pub worker_threads: usize,
}

impl Default for EmbeddingParameters {
    fn default() -> Self {
        EmbeddingParameters {
            density: DEFAULT_DENSITY,
            neighbour_count: None,
            seed: DEFAULT_SEED,
            worker_threads: default_worker_threads(),
        }
    }
}

/// Uniform positions on the canvas, x then y for each point in turn.
pub fn initial_positions(count: usize, seed: u64) -> Vec<Vector2<f64>> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let x = rng.gen::<f64>() * CANVAS_WIDTH;
            let y = rng.gen::<f64>() * CANVAS_HEIGHT;
            Vector2::new(x, y)
        })
        .collect()
}

/// Linear cooling; `adjustment` shifts the schedule back up at phases 3 and 4.
fn cooled_temperature(iteration: u32, adjustment: f64) -> f64 {
    INITIAL_TEMPERATURE - (iteration as f64 - adjustment) / COOLING_SPAN * INITIAL_TEMPERATURE
}

/// Simulation context for one run.
pub struct Engine {
    points: Vec<DataPoint>,
    distances: DistanceMatrices,
    field: ForceField,
    incoming: IncomingEdges,
    pool: ThreadPool,
    neighbour_count: usize,
    worker_threads: usize,
    phase: Phase,
    temperature_adjustment: f64,
    frame: Option<Frame>,
    gray_capacity: Option<usize>,
}

impl Engine {
    /// Builds the neighbourhood graph, places every point and prepares the
    /// worker pool. `points[i]` must correspond to row `i` of `distances`.
    pub fn new(
        mut points: Vec<DataPoint>,
        distances: DistanceMatrices,
        parameters: &EmbeddingParameters,
    ) -> Result<Self> {
        if points.len() != distances.len() {
            return Err(EmbedError::spec(format!(
                "{} points but a {}x{} distance matrix",
                points.len(),
                distances.len(),
                distances.len()
            )));
        }
        validate_density(parameters.density)?;

        let n = points.len();
        let neighbour_count = parameters
            .neighbour_count
            .unwrap_or_else(|| default_neighbour_count(n));
        build_neighbourhood_graph(&mut points, &distances, neighbour_count)?;

        let placement = initial_positions(n, parameters.seed);
        for (point, position) in points.iter_mut().zip(placement) {
            point.primary_mut().position = position;
        }

        let squared_base_distance = CANVAS_WIDTH * CANVAS_HEIGHT / n as f64;
        let max_visual_distance_at_start = LayoutView::capture(&points).max_pairwise_distance();
        let field = ForceField {
            base_distance: squared_base_distance.sqrt(),
            squared_base_distance,
            density: parameters.density,
            max_transformed_distance: distances.max_transformed(),
            max_visual_distance_at_start,
            axes: axis_directions(),
        };

        let worker_threads = parameters.worker_threads.max(1);
        let pool = ThreadPoolBuilder::new().num_threads(worker_threads).build()?;
        let incoming = IncomingEdges::build(&points);

        Ok(Engine {
            points,
            distances,
            field,
            incoming,
            pool,
            neighbour_count,
            worker_threads,
            phase: Phase::General,
            temperature_adjustment: -1.0,
            frame: None,
            gray_capacity: None,
        })
    }

    pub fn points(&self) -> &[DataPoint] {
        &self.points
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn neighbour_count(&self) -> usize {
        self.neighbour_count
    }

    pub fn temperature(&self, iteration: u32) -> f64 {
        cooled_temperature(iteration, self.temperature_adjustment)
    }

    pub fn run(&mut self) -> Result<Embedding> {
        self.run_observed(|_| {})
    }

    /// Runs every iteration, calling `observer` after each one.
    pub fn run_observed<F>(&mut self, mut observer: F) -> Result<Embedding>
    where
        F: FnMut(u32),
    {
        info!(
            points = self.points.len(),
            neighbours = self.neighbour_count,
            workers = self.worker_threads,
            "starting layout"
        );

        let mut iterations = Vec::with_capacity(ITERATIONS as usize);
        for iteration in 1..=ITERATIONS {
            if iteration == 1 || iteration % 300 == 0 || iteration == ITERATIONS {
                info!(
                    "iteration {:04} of {}, phase {}",
                    iteration,
                    ITERATIONS,
                    self.phase.number()
                );
            }
            iterations.push(self.step(iteration)?);
            observer(iteration);
        }

        info!(
            gray = gray_count(&self.points),
            split = self.points.iter().filter(|p| p.projections.len() > 1).count(),
            "layout finished"
        );
        Ok(Embedding { iterations })
    }

    /// One iteration: forces, movement, demotion, snapshot, then the phase
    /// change due at this iteration.
    pub fn step(&mut self, iteration: u32) -> Result<IterationSnapshot> {
        for projection in self.points.iter_mut().flat_map(|p| &mut p.projections) {
            projection.reset_accumulators();
        }

        accumulate_forces(
            &self.pool,
            &mut self.points,
            &self.field,
            &self.distances,
            &self.incoming,
            self.phase >= Phase::GraySelection,
        );

        self.move_points(iteration)?;

        if self.phase == Phase::GraySelection {
            let capacity = match self.gray_capacity {
                Some(capacity) => capacity,
                None => {
                    let capacity = gray_capacity(&self.points);
                    info!(capacity, "gray layer capacity");
                    self.gray_capacity = Some(capacity);
                    capacity
                }
            };
            if gray_count(&self.points) < capacity {
                if let Some(index) = demote_most_pressured(&mut self.points) {
                    debug!(iteration, point = index, "moved to gray layer");
                }
            }
        }

        let snapshot = IterationSnapshot::capture(iteration, &self.points);
        self.advance_phase(iteration);
        Ok(snapshot)
    }

    fn move_points(&mut self, iteration: u32) -> Result<()> {
        let temperature = self.temperature(iteration);
        let frame = if self.phase >= Phase::GraySelection {
            self.frame
        } else {
            None
        };

        let pool = &self.pool;
        let points = &mut self.points;
        pool.install(|| {
            points
                .par_iter_mut()
                .enumerate()
                .filter(|(_, point)| !point.frozen)
                .try_for_each(|(index, point)| {
                    for (slot, projection) in point.projections.iter_mut().enumerate() {
                        let mut displacement = projection.displacement;
                        let length = displacement.norm();
                        if length > temperature {
                            displacement *= temperature / length;
                        }
                        let position = projection.position + displacement;
                        if !(position.x.is_finite() && position.y.is_finite()) {
                            return Err(EmbedError::NumericalInstability {
                                iteration,
                                point: index,
                                projection: slot,
                            });
                        }
                        projection.position = match frame {
                            Some(frame) => frame.clamp(position),
                            None => position,
                        };
                    }
                    Ok(())
                })
        })
    }

    fn advance_phase(&mut self, iteration: u32) {
        match iteration {
            GRAY_SELECTION_START => {
                self.phase = Phase::GraySelection;
                let frame = Frame::around(&self.points);
                debug!(?frame, "frame fixed");
                self.frame = Some(frame);
                info!("phase 2: selecting the gray layer");
            }
            GRAY_RELAXATION_START => {
                self.phase = Phase::GrayRelaxation;
                self.temperature_adjustment = 440.0;
                swap_active_layer(&mut self.points);
                info!(
                    gray = gray_count(&self.points),
                    "phase 3: red layer frozen, gray layer released"
                );
            }
            SPLITTING_START => {
                self.phase = Phase::Splitting;
                self.temperature_adjustment = 830.0;
                let (split, failed) = self.split_gray_layer();
                info!(split, failed, "phase 4: gray vertices split");
            }
            _ => {}
        }
    }

    fn split_gray_layer(&mut self) -> (usize, usize) {
        let mut split = 0;
        let mut failed = 0;
        for index in 0..self.points.len() {
            if self.points[index].layer != Layer::Gray {
                continue;
            }
            match split_vertex(&mut self.points, index, &self.field.axes) {
                SplitOutcome::Split { .. } => split += 1,
                SplitOutcome::Failed(reason) => {
                    debug!(point = index, ?reason, "split failed");
                    failed += 1;
                }
            }
        }
        self.incoming = IncomingEdges::build(&self.points);
        (split, failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temperature_follows_the_schedule() {
        assert!((cooled_temperature(1, -1.0) - 99.8).abs() < 1e-9);
        assert!((cooled_temperature(499, -1.0) - 50.0).abs() < 1e-9);
        assert!((cooled_temperature(951, 440.0) - 48.9).abs() < 1e-9);
        assert!(cooled_temperature(ITERATIONS, 830.0).abs() < 1e-9);
    }

    #[test]
    fn frame_widens_by_a_twentieth() {
        let mut a = DataPoint::new(0, 0, None);
        a.primary_mut().position = Vector2::new(0.0, 10.0);
        let mut b = DataPoint::new(1, 0, None);
        b.primary_mut().position = Vector2::new(100.0, 30.0);
        let frame = Frame::around(&[a, b]);
        assert_eq!(frame.low, Vector2::new(-5.0, 9.0));
        assert_eq!(frame.high, Vector2::new(105.0, 31.0));
        assert_eq!(frame.clamp(Vector2::new(200.0, 0.0)), Vector2::new(105.0, 9.0));
    }

    #[test]
    fn non_finite_move_is_reported_before_the_frame_clamp() -> Result<()> {
        let coordinates: Vec<Vec<f64>> = (0..22).map(|i| vec![i as f64]).collect();
        let distances =
            DistanceMatrices::from_coordinates(&coordinates, crate::distance::Metric::Euclidean)?;
        let points = (0..22).map(|i| DataPoint::new(i, 0, None)).collect();
        let parameters = EmbeddingParameters {
            neighbour_count: Some(5),
            worker_threads: 2,
            ..EmbeddingParameters::default()
        };
        let mut engine = Engine::new(points, distances, &parameters)?;
        engine.phase = Phase::GraySelection;
        engine.frame = Some(Frame {
            low: Vector2::new(0.0, 0.0),
            high: Vector2::new(1000.0, 1000.0),
        });
        engine.points[7].primary_mut().displacement = Vector2::new(f64::NAN, 0.0);

        match engine.move_points(600) {
            Err(EmbedError::NumericalInstability {
                iteration: 600,
                point: 7,
                projection: 0,
            }) => {}
            other => panic!("expected a numerical instability, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn density_must_be_strictly_inside_unit_interval() {
        assert!(validate_density(0.9).is_ok());
        assert!(validate_density(0.0).is_err());
        assert!(validate_density(1.0).is_err());
        assert!(validate_density(f64::NAN).is_err());
    }
}
