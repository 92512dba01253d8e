use std::io::Write;

use lvsde::config::InputKind;
use lvsde::error::EmbedError;
use lvsde::io::{load_dataset, DataSource};
use tempfile::NamedTempFile;

fn input_file(contents: &str) -> Result<NamedTempFile, std::io::Error> {
    let mut file = NamedTempFile::new()?;
    file.write_all(contents.as_bytes())?;
    file.flush()?;
    Ok(file)
}

fn malformed_row(result: Result<lvsde::io::Dataset, EmbedError>) -> Option<usize> {
    match result {
        Err(EmbedError::MalformedRow { row, .. }) => Some(row),
        _ => None,
    }
}

#[test]
fn coordinates_load_with_padding_and_blank_lines() -> Result<(), Box<dyn std::error::Error>> {
    let file = input_file("0, 1.5 , 2\n\n1,3,-4e1\n  \n2,0,0\n")?;
    let dataset = load_dataset(file.path(), InputKind::Coordinates, None, 3)?;

    assert_eq!(dataset.len(), 3);
    assert_eq!(dataset.labels, vec![0, 1, 2]);
    assert_eq!(
        dataset.source,
        DataSource::Coordinates(vec![vec![1.5, 2.0], vec![3.0, -40.0], vec![0.0, 0.0]])
    );

    let points = dataset.points();
    assert_eq!(points.len(), 3);
    assert_eq!(points[1].id, 1);
    assert_eq!(points[1].class_label, 1);
    assert_eq!(points[1].coordinates, Some(vec![3.0, -40.0]));
    Ok(())
}

#[test]
fn row_limit_keeps_leading_rows() -> Result<(), Box<dyn std::error::Error>> {
    let file = input_file("0,1\n1,2\n0,3\n1,4\n")?;
    let dataset = load_dataset(file.path(), InputKind::Coordinates, Some(2), 2)?;
    assert_eq!(dataset.labels, vec![0, 1]);
    assert_eq!(
        dataset.source,
        DataSource::Coordinates(vec![vec![1.0], vec![2.0]])
    );
    Ok(())
}

#[test]
fn malformed_rows_are_located() -> Result<(), Box<dyn std::error::Error>> {
    let ragged = input_file("0,1,2\n1,3\n")?;
    assert_eq!(
        malformed_row(load_dataset(ragged.path(), InputKind::Coordinates, None, 2)),
        Some(2)
    );

    let unknown_class = input_file("0,1,2\n1,3,4\n5,0,0\n")?;
    assert_eq!(
        malformed_row(load_dataset(unknown_class.path(), InputKind::Coordinates, None, 2)),
        Some(3)
    );

    let negative_class = input_file("-1,1,2\n")?;
    assert_eq!(
        malformed_row(load_dataset(negative_class.path(), InputKind::Coordinates, None, 2)),
        Some(1)
    );

    let not_a_number = input_file("0,1,2\n1,abc,4\n")?;
    assert_eq!(
        malformed_row(load_dataset(not_a_number.path(), InputKind::Coordinates, None, 2)),
        Some(2)
    );

    let not_finite = input_file("0,NaN,2\n")?;
    assert_eq!(
        malformed_row(load_dataset(not_finite.path(), InputKind::Coordinates, None, 2)),
        Some(1)
    );

    let label_only = input_file("0\n")?;
    assert_eq!(
        malformed_row(load_dataset(label_only.path(), InputKind::Coordinates, None, 2)),
        Some(1)
    );
    Ok(())
}

#[test]
fn empty_file_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let file = input_file("")?;
    assert!(matches!(
        load_dataset(file.path(), InputKind::Coordinates, None, 2),
        Err(EmbedError::InvalidSpecification(_))
    ));
    Ok(())
}

#[test]
fn square_distance_matrix_loads() -> Result<(), Box<dyn std::error::Error>> {
    let file = input_file("0,0,1,2\n1,1,0,3\n1,2,3,0\n")?;
    let dataset = load_dataset(file.path(), InputKind::Distances, None, 2)?;

    assert_eq!(dataset.labels, vec![0, 1, 1]);
    match &dataset.source {
        DataSource::Distances(matrix) => {
            assert_eq!(matrix.dim(), (3, 3));
            assert_eq!(matrix[[1, 2]], 3.0);
            assert_eq!(matrix[[2, 0]], 2.0);
        }
        other => panic!("expected distances, got {other:?}"),
    }
    assert!(dataset.points().iter().all(|p| p.coordinates.is_none()));
    Ok(())
}

#[test]
fn distance_rows_must_match_row_count() -> Result<(), Box<dyn std::error::Error>> {
    let wide = input_file("0,0,1,2,9\n1,1,0,3,9\n1,2,3,0,9\n")?;
    assert_eq!(
        malformed_row(load_dataset(wide.path(), InputKind::Distances, None, 2)),
        Some(1)
    );

    // With a limit, the leading square block is taken.
    let dataset = load_dataset(wide.path(), InputKind::Distances, Some(2), 2)?;
    match &dataset.source {
        DataSource::Distances(matrix) => {
            assert_eq!(matrix.dim(), (2, 2));
            assert_eq!(matrix[[0, 1]], 1.0);
            assert_eq!(matrix[[1, 0]], 1.0);
        }
        other => panic!("expected distances, got {other:?}"),
    }

    let short = input_file("0,0,1\n1,1,0\n1,2,3\n")?;
    assert_eq!(
        malformed_row(load_dataset(short.path(), InputKind::Distances, None, 2)),
        Some(1)
    );
    Ok(())
}
