// src/snapshot.rs

//! Per-iteration records of the layout, the only thing renderers and the
//! evaluator ever see.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::point::{DataPoint, Layer};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PointSnapshot {
    pub point_id: usize,
    pub class_label: i32,
    pub iteration: u32,
    pub layer: Layer,
    /// One entry per projection; the second one exists only after a split.
    pub positions: Vec<[f64; 2]>,
}

impl PointSnapshot {
    pub fn capture(iteration: u32, point: &DataPoint) -> Self {
        PointSnapshot {
            point_id: point.id,
            class_label: point.class_label,
            iteration,
            layer: point.layer,
            positions: point
                .projections
                .iter()
                .map(|p| [p.position.x, p.position.y])
                .collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IterationSnapshot {
    pub iteration: u32,
    pub points: Vec<PointSnapshot>,
}

impl IterationSnapshot {
    pub fn capture(iteration: u32, points: &[DataPoint]) -> Self {
        IterationSnapshot {
            iteration,
            points: points
                .iter()
                .map(|point| PointSnapshot::capture(iteration, point))
                .collect(),
        }
    }

    pub fn count_in(&self, layer: Layer) -> usize {
        self.points.iter().filter(|p| p.layer == layer).count()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json(path, self, true)
    }
}

/// Every iteration of one run, in order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub iterations: Vec<IterationSnapshot>,
}

impl Embedding {
    pub fn len(&self) -> usize {
        self.iterations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.iterations.is_empty()
    }

    pub fn last(&self) -> Option<&IterationSnapshot> {
        self.iterations.last()
    }

    /// Gzip-compressed compact JSON; a full run holds 1830 copies of the
    /// layout.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = BufWriter::new(File::create(path)?);
        let mut encoder = GzEncoder::new(file, Compression::default());
        serde_json::to_writer(&mut encoder, self)?;
        encoder.finish()?.flush()?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let decoder = GzDecoder::new(BufReader::new(File::open(path)?));
        Ok(serde_json::from_reader(BufReader::new(decoder))?)
    }
}

pub(crate) fn write_json<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
    pretty: bool,
) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    if pretty {
        serde_json::to_writer_pretty(&mut writer, value)?;
    } else {
        serde_json::to_writer(&mut writer, value)?;
    }
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}
