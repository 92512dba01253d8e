// src/evaluation.rs

//! k-NN classification accuracy of a finished layout.
//!
//! Every projection of an evaluated point looks up its k nearest projections
//! among the neighbour layers. All of a point's lookups vote together; the
//! most frequent class wins, the lowest class number on a tie. A point's own
//! duplicate may occupy a slot but never votes.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::error::Result;
use crate::knn::k_smallest_by;
use crate::point::{Layer, NeighbourRef};
use crate::snapshot::{write_json, PointSnapshot};

/// Which layers are evaluated and which layers supply neighbours.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayerCombination {
    pub evaluated: &'static [Layer],
    pub neighbours: &'static [Layer],
}

const RED_AND_GRAY: &[Layer] = &[Layer::Red, Layer::Gray];
const RED: &[Layer] = &[Layer::Red];
const GRAY: &[Layer] = &[Layer::Gray];

/// The six combinations reported for every neighbourhood size.
pub const LAYER_COMBINATIONS: [LayerCombination; 6] = [
    LayerCombination { evaluated: RED_AND_GRAY, neighbours: RED_AND_GRAY },
    LayerCombination { evaluated: RED_AND_GRAY, neighbours: RED },
    LayerCombination { evaluated: RED, neighbours: RED },
    LayerCombination { evaluated: GRAY, neighbours: GRAY },
    LayerCombination { evaluated: GRAY, neighbours: RED },
    LayerCombination { evaluated: GRAY, neighbours: RED_AND_GRAY },
];

fn layer_set_name(layers: &[Layer]) -> String {
    let names: Vec<&str> = layers.iter().map(|l| l.as_str()).collect();
    format!("({})", names.join("_and_"))
}

impl LayerCombination {
    /// `KNN_accuracy_(red_and_gray)_(red)` style label.
    pub fn name(&self) -> String {
        format!(
            "KNN_accuracy_{}_{}",
            layer_set_name(self.evaluated),
            layer_set_name(self.neighbours)
        )
    }
}

/// Rows are true classes, columns predicted classes, both indexed by
/// position in `labels`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    pub labels: Vec<i32>,
    pub counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    fn new(labels: Vec<i32>) -> Self {
        let n = labels.len();
        ConfusionMatrix {
            labels,
            counts: vec![vec![0; n]; n],
        }
    }

    fn index_of(&self, label: i32) -> Option<usize> {
        self.labels.binary_search(&label).ok()
    }

    fn record(&mut self, actual: i32, predicted: i32) {
        if let (Some(row), Some(column)) = (self.index_of(actual), self.index_of(predicted)) {
            self.counts[row][column] += 1;
        }
    }

    pub fn count(&self, actual: i32, predicted: i32) -> usize {
        match (self.index_of(actual), self.index_of(predicted)) {
            (Some(row), Some(column)) => self.counts[row][column],
            _ => 0,
        }
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    pub fn correct(&self) -> usize {
        (0..self.labels.len()).map(|i| self.counts[i][i]).sum()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct KnnScore {
    pub accuracy_percent: f64,
    pub confusion: ConfusionMatrix,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EvaluationOutcome {
    Scored(KnnScore),
    /// Some lookup found fewer than k candidate projections.
    NotEnoughNeighbours,
    /// No point of the evaluated layers cast a vote.
    NothingToEvaluate,
}

impl EvaluationOutcome {
    pub fn accuracy(&self) -> Option<f64> {
        match self {
            EvaluationOutcome::Scored(score) => Some(score.accuracy_percent),
            _ => None,
        }
    }
}

impl fmt::Display for EvaluationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.accuracy() {
            Some(percent) => write!(f, "{percent:.3}%"),
            None => f.write_str("NA"),
        }
    }
}

/// Majority class of `votes`; lowest class number on a tie.
fn majority(votes: &BTreeMap<i32, usize>) -> Option<i32> {
    let mut best: Option<(i32, usize)> = None;
    for (&label, &count) in votes {
        if best.map_or(true, |(_, top)| count > top) {
            best = Some((label, count));
        }
    }
    best.map(|(label, _)| label)
}

/// k-NN accuracy of `points` (one iteration) for one layer combination.
pub fn evaluate_knn(
    points: &[PointSnapshot],
    k: usize,
    evaluated: &[Layer],
    neighbour_layers: &[Layer],
) -> EvaluationOutcome {
    let mut labels: Vec<i32> = points.iter().map(|p| p.class_label).collect();
    labels.sort_unstable();
    labels.dedup();
    let mut confusion = ConfusionMatrix::new(labels);

    let candidates: Vec<NeighbourRef> = points
        .iter()
        .enumerate()
        .filter(|(_, p)| neighbour_layers.contains(&p.layer))
        .flat_map(|(point, p)| {
            (0..p.positions.len()).map(move |projection| NeighbourRef { point, projection })
        })
        .collect();

    for (index, point) in points.iter().enumerate() {
        if !evaluated.contains(&point.layer) {
            continue;
        }
        let mut votes: BTreeMap<i32, usize> = BTreeMap::new();
        for (slot, origin) in point.positions.iter().enumerate() {
            let nearest = k_smallest_by(
                candidates
                    .iter()
                    .copied()
                    .filter(|c| !(c.point == index && c.projection == slot)),
                k,
                |c| {
                    let [x, y] = points[c.point].positions[c.projection];
                    ((x - origin[0]).powi(2) + (y - origin[1]).powi(2)).sqrt()
                },
            );
            if nearest.len() < k {
                return EvaluationOutcome::NotEnoughNeighbours;
            }
            for neighbour in nearest.iter().filter(|n| n.point != index) {
                *votes.entry(points[neighbour.point].class_label).or_insert(0) += 1;
            }
        }
        if let Some(predicted) = majority(&votes) {
            confusion.record(point.class_label, predicted);
        }
    }

    let total = confusion.total();
    if total == 0 {
        return EvaluationOutcome::NothingToEvaluate;
    }
    EvaluationOutcome::Scored(KnnScore {
        accuracy_percent: 100.0 * confusion.correct() as f64 / total as f64,
        confusion,
    })
}

/// One row of the evaluation report.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EvaluationRecord {
    pub evaluation_type: String,
    pub neighbourhood_size: usize,
    pub outcome: EvaluationOutcome,
}

/// Every layer combination for every neighbourhood size, in that order.
pub fn evaluate_all(points: &[PointSnapshot], sizes: &[usize]) -> Vec<EvaluationRecord> {
    let mut records = Vec::with_capacity(sizes.len() * LAYER_COMBINATIONS.len());
    for &k in sizes {
        for combination in &LAYER_COMBINATIONS {
            records.push(EvaluationRecord {
                evaluation_type: combination.name(),
                neighbourhood_size: k,
                outcome: evaluate_knn(points, k, combination.evaluated, combination.neighbours),
            });
        }
    }
    records
}

/// `evaluation.csv`: type, neighbourhood size, accuracy (or `NA`).
pub fn write_report_csv(path: &Path, records: &[EvaluationRecord]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_path(path)?;
    writer.write_record(["Evaluation_type", "Evaluation_neighbourhood_size", "Evaluation"])?;
    for record in records {
        writer.write_record([
            record.evaluation_type.clone(),
            record.neighbourhood_size.to_string(),
            record.outcome.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// `evaluation_confusion.json`: every record including its confusion matrix.
pub fn write_confusion_json(path: &Path, records: &[EvaluationRecord]) -> Result<()> {
    write_json(path, records, true)
}
