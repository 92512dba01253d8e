// tests/test_config.rs

use std::path::Path;

use lvsde::config::{seed_from_state, InputKind, SpecificationFile, DEFAULT_COLOURS};
use lvsde::distance::Metric;
use lvsde::engine::{DEFAULT_DENSITY, DEFAULT_SEED};
use lvsde::error::EmbedError;
use tempfile::tempdir;

fn resolve_one(json: &str) -> Result<lvsde::config::ResolvedSpecification, EmbedError> {
    let file = SpecificationFile::from_json(json)?;
    let mut resolved = file.resolve(Path::new("/data/specs"))?;
    Ok(resolved.remove(0))
}

fn assert_invalid(json: &str) {
    match resolve_one(json) {
        Err(EmbedError::InvalidSpecification(_)) => {}
        other => panic!("expected an invalid specification, got {other:?}"),
    }
}

#[test]
fn minimal_entry_takes_defaults() -> Result<(), Box<dyn std::error::Error>> {
    let spec = resolve_one(
        r#"{ "embedding_specifications": [
            { "input_file_path": "input/points.csv", "output_directory": "out/run1" }
        ] }"#,
    )?;

    assert_eq!(spec.input_file, Path::new("/data/specs/input/points.csv"));
    assert_eq!(spec.output_directory, Path::new("/data/specs/out/run1"));
    assert_eq!(spec.input_kind, InputKind::Coordinates);
    assert_eq!(spec.metric, Metric::Euclidean);
    assert_eq!(spec.class_labels.len(), 10);
    assert_eq!(spec.class_labels[3], "3");
    assert_eq!(spec.colour_codes, DEFAULT_COLOURS.to_vec());
    assert_eq!(spec.palette[0], [0x8A, 0xB9, 0xF1]);
    assert_eq!(spec.parameters.density, DEFAULT_DENSITY);
    assert_eq!(spec.parameters.seed, DEFAULT_SEED);
    assert_eq!(spec.parameters.neighbour_count, None);
    assert!(spec.parameters.worker_threads >= 1);
    assert_eq!(spec.row_limit, None);
    assert!(spec.evaluation_sizes.is_empty());
    Ok(())
}

#[test]
fn full_entry_is_carried_through() -> Result<(), Box<dyn std::error::Error>> {
    let spec = resolve_one(
        r##"{ "embedding_specifications": [ {
            "input_file_path": "/abs/distances.csv",
            "is_input_file_distances": true,
            "output_directory": "out",
            "class_labels": ["cat", "dog"],
            "colours_list": ["#000000", "#ffffff"],
            "number_of_initial_data_abstraction_units": 500,
            "visual_density_adjustment_parameter": 0.5,
            "number_of_neighbours_for_building_neighbourhood_graph": 12,
            "random_seed": 77,
            "use_cosine_distance_for_input_multi_dimensional_data": true,
            "evaluation_neighbourhood_sizes": [1, 5, 10],
            "worker_threads": 3
        } ] }"##,
    )?;

    assert_eq!(spec.input_file, Path::new("/abs/distances.csv"));
    assert_eq!(spec.input_kind, InputKind::Distances);
    assert_eq!(spec.class_labels, vec!["cat", "dog"]);
    assert_eq!(spec.palette, vec![[0, 0, 0], [255, 255, 255]]);
    assert_eq!(spec.row_limit, Some(500));
    assert_eq!(spec.parameters.density, 0.5);
    assert_eq!(spec.parameters.neighbour_count, Some(12));
    assert_eq!(spec.parameters.seed, 77);
    assert_eq!(spec.parameters.worker_threads, 3);
    assert_eq!(spec.metric, Metric::Cosine);
    assert_eq!(spec.evaluation_sizes, vec![1, 5, 10]);
    Ok(())
}

#[test]
fn labels_alone_borrow_default_colours() -> Result<(), Box<dyn std::error::Error>> {
    let spec = resolve_one(
        r#"{ "embedding_specifications": [ {
            "input_file_path": "a.csv", "output_directory": "o",
            "class_labels": ["a", "b", "c"]
        } ] }"#,
    )?;
    assert_eq!(spec.colour_codes, DEFAULT_COLOURS[..3].to_vec());
    Ok(())
}

#[test]
fn random_state_derives_the_seed() -> Result<(), Box<dyn std::error::Error>> {
    let spec = resolve_one(
        r#"{ "embedding_specifications": [ {
            "input_file_path": "a.csv", "output_directory": "o", "random_state": 3
        } ] }"#,
    )?;
    assert_eq!(spec.parameters.seed, seed_from_state(3));
    assert_eq!(spec.random_state, Some(3));
    assert_ne!(seed_from_state(3), seed_from_state(4));
    Ok(())
}

#[test]
fn inconsistent_entries_are_rejected() {
    assert_invalid(r#"{ "embedding_specifications": [] }"#);
    assert_invalid(r#"{ "embedding_specifications": [ { "output_directory": "o" } ] }"#);
    assert_invalid(r#"{ "embedding_specifications": [ { "input_file_path": "a.csv" } ] }"#);
    assert_invalid(
        r##"{ "embedding_specifications": [ { "input_file_path": "a.csv", "output_directory": "o",
            "class_labels": ["a", "b"], "colours_list": ["#000000"] } ] }"##,
    );
    assert_invalid(
        r#"{ "embedding_specifications": [ { "input_file_path": "a.csv", "output_directory": "o",
            "class_labels": ["0","1","2","3","4","5","6","7","8","9","10"] } ] }"#,
    );
    assert_invalid(
        r#"{ "embedding_specifications": [ { "input_file_path": "a.csv", "output_directory": "o",
            "colours_list": ["red"] } ] }"#,
    );
    assert_invalid(
        r#"{ "embedding_specifications": [ { "input_file_path": "a.csv", "output_directory": "o",
            "visual_density_adjustment_parameter": 1.0 } ] }"#,
    );
    assert_invalid(
        r#"{ "embedding_specifications": [ { "input_file_path": "a.csv", "output_directory": "o",
            "random_seed": 1, "random_state": 2 } ] }"#,
    );
    assert_invalid(
        r#"{ "embedding_specifications": [ { "input_file_path": "a.csv", "output_directory": "o",
            "number_of_neighbours_for_building_neighbourhood_graph": 0 } ] }"#,
    );
    assert_invalid(
        r#"{ "embedding_specifications": [ { "input_file_path": "a.csv", "output_directory": "o",
            "evaluation_neighbourhood_sizes": [5, 0] } ] }"#,
    );
}

#[test]
fn load_resolves_against_the_file_directory() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let spec_path = dir.path().join("spec.json");
    std::fs::write(
        &spec_path,
        r#"{ "embedding_specifications": [
            { "input_file_path": "data.csv", "output_directory": "first" },
            { "input_file_path": "data.csv", "output_directory": "second" }
        ] }"#,
    )?;

    let specs = SpecificationFile::load(&spec_path)?;
    assert_eq!(specs.len(), 2);
    assert_eq!(specs[0].input_file, dir.path().join("data.csv"));
    assert_eq!(specs[1].output_directory, dir.path().join("second"));
    Ok(())
}

#[test]
fn malformed_json_is_a_json_error() {
    assert!(matches!(
        SpecificationFile::from_json("{ not json"),
        Err(EmbedError::Json { .. })
    ));
}
