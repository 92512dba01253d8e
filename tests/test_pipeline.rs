// tests/test_pipeline.rs

use std::fs;
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;

use lvsde::config::SpecificationFile;
use lvsde::engine::ITERATIONS;
use lvsde::error::EmbedError;
use lvsde::pipeline::{
    colouring_file_name, run_specification, CONFUSION_FILE, DETAILS_FILE, EVALUATION_FILE,
    ITERATIONS_FILE, LAST_ITERATION_FILE, LEGEND_FILE,
};
use lvsde::render::{Colouring, DRAW_AREA, MARGIN};
use lvsde::snapshot::{Embedding, IterationSnapshot};
use tempfile::tempdir;

/// Thirty labelled 3-D points on two interleaved spirals.
fn write_input(path: &Path) -> std::io::Result<()> {
    let mut text = String::new();
    for i in 0..30 {
        let t = i as f64 * 0.37;
        let label = i % 2;
        let shift = if label == 0 { 0.0 } else { 4.0 };
        text.push_str(&format!(
            "{label},{:.4},{:.4},{:.4}\n",
            t.cos() + shift,
            t.sin(),
            0.1 * i as f64
        ));
    }
    fs::write(path, text)
}

fn write_specification(dir: &Path) -> std::io::Result<std::path::PathBuf> {
    let spec_path = dir.join("spec.json");
    fs::write(
        &spec_path,
        r##"{ "embedding_specifications": [ {
            "input_file_path": "points.csv",
            "output_directory": "embedding",
            "class_labels": ["even", "odd"],
            "colours_list": ["#1F77B4", "#FF7F0E"],
            "evaluation_neighbourhood_sizes": [3, 5],
            "worker_threads": 2
        } ] }"##,
    )?;
    Ok(spec_path)
}

#[test]
fn specification_run_writes_every_output() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    write_input(&dir.path().join("points.csv"))?;
    let specs = SpecificationFile::load(&write_specification(dir.path())?)?;
    assert_eq!(specs.len(), 1);

    let summary = run_specification(&specs[0], false)?;
    let out = dir.path().join("embedding");
    assert_eq!(summary.output_directory, out);
    assert_eq!(summary.points, 30);
    assert!(summary.split <= summary.gray);
    assert_eq!(summary.evaluation.len(), 12);

    let last = IterationSnapshot::load(&out.join(LAST_ITERATION_FILE))?;
    assert_eq!(last.iteration, ITERATIONS);
    assert_eq!(last.points.len(), 30);
    assert_eq!(last.points[7].class_label, 1);

    // The archive is gzip on disk and decodes to every iteration.
    let mut json = String::new();
    GzDecoder::new(fs::File::open(out.join(ITERATIONS_FILE))?).read_to_string(&mut json)?;
    assert!(json.starts_with("{\"iterations\":["));
    let embedding = Embedding::load(&out.join(ITERATIONS_FILE))?;
    assert_eq!(embedding.len(), ITERATIONS as usize);
    assert_eq!(embedding.last(), Some(&last));

    let legend = fs::read_to_string(out.join(LEGEND_FILE))?;
    assert_eq!(legend.matches(">even</div>").count(), 3);
    assert_eq!(legend.matches(">odd</div>").count(), 3);
    assert!(legend.contains("background-color:#FF7F0E;"));
    assert!(legend.contains("Second projection"));

    let details: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out.join(DETAILS_FILE))?)?;
    assert_eq!(details["number_of_data_abstraction_units"], 30);
    assert_eq!(details["number_of_neighbours_for_building_neighbourhood_graph"], 10);
    assert_eq!(details["metric"], "euclidean");

    for colouring in Colouring::ALL {
        let image = image::open(out.join(colouring_file_name(colouring)))?;
        assert_eq!(image.width(), DRAW_AREA + 2 * MARGIN);
        assert_eq!(image.height(), DRAW_AREA + 2 * MARGIN);
    }

    let report = fs::read_to_string(out.join(EVALUATION_FILE))?;
    assert_eq!(report.lines().count(), 13);
    assert!(out.join(CONFUSION_FILE).exists());
    Ok(())
}

#[test]
fn existing_output_directory_is_refused() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    write_input(&dir.path().join("points.csv"))?;
    let specs = SpecificationFile::load(&write_specification(dir.path())?)?;
    fs::create_dir(dir.path().join("embedding"))?;

    assert!(matches!(
        run_specification(&specs[0], false),
        Err(EmbedError::OutputDirectoryExists(_))
    ));
    Ok(())
}

#[test]
fn too_few_points_fails_before_creating_output() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let rows: String = (0..10).map(|i| format!("0,{i},{}\n", i * i)).collect();
    fs::write(dir.path().join("points.csv"), rows)?;
    let specs = SpecificationFile::load(&write_specification(dir.path())?)?;

    assert!(matches!(
        run_specification(&specs[0], false),
        Err(EmbedError::NotEnoughPoints { .. })
    ));
    assert!(!dir.path().join("embedding").exists());
    Ok(())
}
