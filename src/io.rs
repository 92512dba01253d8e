use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use ndarray::Array2;
use tracing::{debug, info};

use crate::config::InputKind;
use crate::distance::{DistanceMatrices, Metric};
use crate::error::{EmbedError, Result};
use crate::point::DataPoint;

/// Where original-space distances come from.
#[derive(Clone, Debug, PartialEq)]
pub enum DataSource {
    Coordinates(Vec<Vec<f64>>),
    Distances(Array2<f64>),
}

/// Labelled input rows, in file order.
#[derive(Clone, Debug, PartialEq)]
pub struct Dataset {
    pub labels: Vec<i32>,
    pub source: DataSource,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Raw and transformed distances. `metric` only applies to coordinates.
    pub fn distance_matrices(&self, metric: Metric) -> Result<DistanceMatrices> {
        match &self.source {
            DataSource::Coordinates(rows) => DistanceMatrices::from_coordinates(rows, metric),
            DataSource::Distances(matrix) => DistanceMatrices::from_raw(matrix.clone()),
        }
    }

    /// Fresh simulation points, one per row, ids in row order.
    pub fn points(&self) -> Vec<DataPoint> {
        self.labels
            .iter()
            .enumerate()
            .map(|(id, &label)| {
                let coordinates = match &self.source {
                    DataSource::Coordinates(rows) => Some(rows[id].clone()),
                    DataSource::Distances(_) => None,
                };
                DataPoint::new(id, label, coordinates)
            })
            .collect()
    }
}

struct RawRow {
    line: usize,
    label: i32,
    values: Vec<f64>,
}

fn parse_row(record: &StringRecord, line: usize, class_count: usize) -> Result<RawRow> {
    let malformed = |reason: String| EmbedError::MalformedRow { row: line, reason };

    let label_field = record.get(0).ok_or_else(|| malformed("empty row".to_string()))?;
    let label: i32 = label_field
        .parse()
        .map_err(|_| malformed(format!("class label {label_field:?} is not an integer")))?;
    if label < 0 || label as usize >= class_count {
        return Err(malformed(format!(
            "class label {label} has no colour; {class_count} colours are configured"
        )));
    }

    let values = record
        .iter()
        .skip(1)
        .enumerate()
        .map(|(column, field)| {
            field
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| {
                    malformed(format!(
                        "column {}: {field:?} is not a finite number",
                        column + 2
                    ))
                })
        })
        .collect::<Result<Vec<f64>>>()?;
    if values.is_empty() {
        return Err(malformed("no values after the class label".to_string()));
    }

    Ok(RawRow {
        line,
        label,
        values,
    })
}

fn read_rows(path: &Path, row_limit: Option<usize>, class_count: usize) -> Result<Vec<RawRow>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_path(path)?;

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        if row_limit.is_some_and(|limit| rows.len() >= limit) {
            break;
        }
        let record = record?;
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(index + 1);
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }
        rows.push(parse_row(&record, line, class_count)?);
        if rows.len() % 5000 == 0 {
            debug!(rows = rows.len(), "reading input");
        }
    }

    if rows.is_empty() {
        return Err(EmbedError::spec(format!("input file {path:?} has no rows")));
    }
    Ok(rows)
}

/// Loads a labelled input file.
///
/// Coordinate rows must all have the same dimension. Distance rows must
/// supply at least one value per loaded row; with a row limit the leading
/// square block is used, otherwise the matrix must be exactly square.
pub fn load_dataset(
    path: &Path,
    kind: InputKind,
    row_limit: Option<usize>,
    class_count: usize,
) -> Result<Dataset> {
    let rows = read_rows(path, row_limit, class_count)?;
    let n = rows.len();
    let labels = rows.iter().map(|r| r.label).collect();

    let source = match kind {
        InputKind::Coordinates => {
            let dimension = rows[0].values.len();
            if let Some(row) = rows.iter().find(|r| r.values.len() != dimension) {
                return Err(EmbedError::MalformedRow {
                    row: row.line,
                    reason: format!(
                        "{} coordinates where earlier rows have {dimension}",
                        row.values.len()
                    ),
                });
            }
            DataSource::Coordinates(rows.into_iter().map(|r| r.values).collect())
        }
        InputKind::Distances => {
            let mut matrix = Array2::<f64>::zeros((n, n));
            for (i, row) in rows.iter().enumerate() {
                let too_short = row.values.len() < n;
                let ragged = row_limit.is_none() && row.values.len() != n;
                if too_short || ragged {
                    return Err(EmbedError::MalformedRow {
                        row: row.line,
                        reason: format!("{} distances for {n} loaded rows", row.values.len()),
                    });
                }
                for (j, &value) in row.values.iter().take(n).enumerate() {
                    matrix[[i, j]] = value;
                }
            }
            DataSource::Distances(matrix)
        }
    };

    info!(rows = n, path = %path.display(), "loaded input");
    Ok(Dataset { labels, source })
}
