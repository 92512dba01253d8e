// src/pipeline.rs

//! One embedding specification from input file to output directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::config::ResolvedSpecification;
use crate::distance::Metric;
use crate::engine::{Engine, ITERATIONS};
use crate::error::{EmbedError, Result};
use crate::evaluation::{evaluate_all, write_confusion_json, write_report_csv, EvaluationRecord};
use crate::io::load_dataset;
use crate::point::Layer;
use crate::progress::{count_progress_bar, spinner_progress};
use crate::render::{render_snapshot, save_png, write_legend, Colouring};
use crate::snapshot::{write_json, IterationSnapshot};

pub const LAST_ITERATION_FILE: &str = "last_iteration.json";
pub const ITERATIONS_FILE: &str = "iterations.json.gz";
pub const LEGEND_FILE: &str = "legend.html";
pub const DETAILS_FILE: &str = "embedding_details.json";
pub const EVALUATION_FILE: &str = "evaluation.csv";
pub const CONFUSION_FILE: &str = "evaluation_confusion.json";

pub fn colouring_file_name(colouring: Colouring) -> String {
    format!("last_iteration_colouring_{}.png", colouring.index())
}

/// Run parameters recorded next to the results.
#[derive(Debug, Serialize)]
struct EmbeddingDetails<'a> {
    input_file: &'a Path,
    number_of_data_abstraction_units: usize,
    metric: Metric,
    random_seed: u64,
    random_state: Option<u64>,
    visual_density_adjustment_parameter: f64,
    number_of_neighbours_for_building_neighbourhood_graph: usize,
    iterations: u32,
    class_labels: &'a [String],
    colours_list: &'a [String],
    evaluation_neighbourhood_sizes: &'a [usize],
    version: &'static str,
}

#[derive(Clone, Debug)]
pub struct RunSummary {
    pub output_directory: PathBuf,
    pub points: usize,
    pub gray: usize,
    pub split: usize,
    pub evaluation: Vec<EvaluationRecord>,
}

/// Writes the three PNG colourings of `snapshot` into `directory`.
pub fn render_all(
    snapshot: &IterationSnapshot,
    palette: &[[u8; 3]],
    directory: &Path,
) -> Result<()> {
    for colouring in Colouring::ALL {
        let image = render_snapshot(&snapshot.points, palette, colouring)?;
        save_png(&image, &directory.join(colouring_file_name(colouring)))?;
    }
    Ok(())
}

/// Loads, embeds, renders and evaluates one specification.
pub fn run_specification(spec: &ResolvedSpecification, show_progress: bool) -> Result<RunSummary> {
    if spec.output_directory.exists() {
        return Err(EmbedError::OutputDirectoryExists(spec.output_directory.clone()));
    }

    let dataset = load_dataset(
        &spec.input_file,
        spec.input_kind,
        spec.row_limit,
        spec.palette.len(),
    )?;

    let spinner = spinner_progress("distances", "computing distance matrices", show_progress);
    let distances = dataset.distance_matrices(spec.metric);
    spinner.finish_and_clear();
    let distances = distances?;

    let mut engine = Engine::new(dataset.points(), distances, &spec.parameters)?;
    fs::create_dir_all(&spec.output_directory)?;

    let bar = count_progress_bar("layout", "iterations", u64::from(ITERATIONS), show_progress);
    let embedding = engine.run_observed(|_| bar.inc(1));
    bar.finish_and_clear();
    let embedding = embedding?;

    let last = embedding
        .last()
        .ok_or_else(|| EmbedError::spec("layout produced no iterations"))?;
    let out = &spec.output_directory;
    last.save(&out.join(LAST_ITERATION_FILE))?;
    embedding.save(&out.join(ITERATIONS_FILE))?;

    let details = EmbeddingDetails {
        input_file: &spec.input_file,
        number_of_data_abstraction_units: dataset.len(),
        metric: spec.metric,
        random_seed: spec.parameters.seed,
        random_state: spec.random_state,
        visual_density_adjustment_parameter: spec.parameters.density,
        number_of_neighbours_for_building_neighbourhood_graph: engine.neighbour_count(),
        iterations: ITERATIONS,
        class_labels: &spec.class_labels,
        colours_list: &spec.colour_codes,
        evaluation_neighbourhood_sizes: &spec.evaluation_sizes,
        version: env!("CARGO_PKG_VERSION"),
    };
    write_json(&out.join(DETAILS_FILE), &details, true)?;

    render_all(last, &spec.palette, out)?;
    write_legend(&out.join(LEGEND_FILE), &spec.class_labels, &spec.colour_codes)?;

    let evaluation = if spec.evaluation_sizes.is_empty() {
        Vec::new()
    } else {
        let records = evaluate_all(&last.points, &spec.evaluation_sizes);
        write_report_csv(&out.join(EVALUATION_FILE), &records)?;
        write_confusion_json(&out.join(CONFUSION_FILE), &records)?;
        for record in &records {
            info!(
                k = record.neighbourhood_size,
                "{}: {}", record.evaluation_type, record.outcome
            );
        }
        records
    };

    let summary = RunSummary {
        output_directory: out.clone(),
        points: dataset.len(),
        gray: last.count_in(Layer::Gray),
        split: last.points.iter().filter(|p| p.positions.len() > 1).count(),
        evaluation,
    };
    info!(
        output = %summary.output_directory.display(),
        gray = summary.gray,
        split = summary.split,
        "embedding written"
    );
    Ok(summary)
}
