// src/config.rs

//! Embedding specification files.
//!
//! A specification file is a JSON document listing one or more embedding
//! runs. Paths inside it are relative to the file's own directory. Everything
//! is validated here, before any input is read or any layout work starts.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::distance::Metric;
use crate::engine::{
    default_worker_threads, validate_density, EmbeddingParameters, DEFAULT_DENSITY, DEFAULT_SEED,
};
use crate::error::{EmbedError, Result};

pub const DEFAULT_COLOURS: [&str; 10] = [
    "#8AB9F1", "#6F4E37", "#00FF00", "#8B008B", "#00356B", "#E1A95F", "#4F7942", "#FF66CC",
    "#F4C430", "#8806CE",
];

#[derive(Clone, Debug, Deserialize)]
pub struct SpecificationFile {
    pub embedding_specifications: Vec<EmbeddingSpecification>,
}

/// One entry of a specification file, as written.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSpecification {
    pub input_file_path: PathBuf,
    pub is_input_file_distances: bool,
    pub output_directory: PathBuf,
    pub class_labels: Option<Vec<String>>,
    pub colours_list: Option<Vec<String>>,
    pub number_of_initial_data_abstraction_units: Option<usize>,
    pub visual_density_adjustment_parameter: Option<f64>,
    pub number_of_neighbours_for_building_neighbourhood_graph: Option<usize>,
    pub random_seed: Option<u64>,
    pub random_state: Option<u64>,
    pub use_cosine_distance_for_input_multi_dimensional_data: bool,
    pub evaluation_neighbourhood_sizes: Vec<usize>,
    pub worker_threads: Option<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputKind {
    /// `label, x_1, ..., x_D` per row.
    Coordinates,
    /// `label, d_1, ..., d_N` per row, a square distance matrix.
    Distances,
}

/// A validated run with absolute paths and defaults filled in.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedSpecification {
    pub input_file: PathBuf,
    pub input_kind: InputKind,
    pub output_directory: PathBuf,
    pub class_labels: Vec<String>,
    pub colour_codes: Vec<String>,
    pub palette: Vec<[u8; 3]>,
    pub row_limit: Option<usize>,
    pub metric: Metric,
    pub parameters: EmbeddingParameters,
    pub random_state: Option<u64>,
    pub evaluation_sizes: Vec<usize>,
}

/// Parses a `#RRGGBB` colour.
pub fn parse_hex_colour(code: &str) -> Result<[u8; 3]> {
    let invalid = || EmbedError::spec(format!("colour {code:?} is not of the form #RRGGBB"));
    let hex = code.strip_prefix('#').ok_or_else(invalid)?;
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    let channel = |at: usize| u8::from_str_radix(&hex[at..at + 2], 16).map_err(|_| invalid());
    Ok([channel(0)?, channel(2)?, channel(4)?])
}

/// Seed picked by a `random_state`: the draw at that (zero-based) position
/// of a generator seeded with the default seed.
pub fn seed_from_state(state: u64) -> u64 {
    let mut rng = ChaCha8Rng::seed_from_u64(DEFAULT_SEED);
    // Each u64 draw consumes two 32-bit words of the stream.
    rng.set_word_pos(u128::from(state) * 2);
    rng.next_u64()
}

fn resolve_labels_and_colours(
    labels: Option<&[String]>,
    colours: Option<&[String]>,
) -> Result<(Vec<String>, Vec<String>)> {
    let defaults = || DEFAULT_COLOURS.iter().map(|c| c.to_string()).collect::<Vec<_>>();
    let numbered = |n: usize| (0..n).map(|i| i.to_string()).collect::<Vec<_>>();

    let (labels, colours) = match (labels, colours) {
        (Some(labels), Some(colours)) => (labels.to_vec(), colours.to_vec()),
        (Some(labels), None) => {
            if labels.len() > DEFAULT_COLOURS.len() {
                return Err(EmbedError::spec(format!(
                    "{} class labels but only {} default colours; give colours_list",
                    labels.len(),
                    DEFAULT_COLOURS.len()
                )));
            }
            let mut colours = defaults();
            colours.truncate(labels.len());
            (labels.to_vec(), colours)
        }
        (None, Some(colours)) => (numbered(colours.len()), colours.to_vec()),
        (None, None) => (numbered(DEFAULT_COLOURS.len()), defaults()),
    };

    if labels.len() != colours.len() {
        return Err(EmbedError::spec(format!(
            "{} class labels but {} colours",
            labels.len(),
            colours.len()
        )));
    }
    if labels.is_empty() {
        return Err(EmbedError::spec("at least one class label is required"));
    }
    Ok((labels, colours))
}

impl EmbeddingSpecification {
    /// Validates this entry and resolves its paths against `base`.
    pub fn resolve(&self, base: &Path) -> Result<ResolvedSpecification> {
        if self.input_file_path.as_os_str().is_empty() {
            return Err(EmbedError::spec("input_file_path is required"));
        }
        if self.output_directory.as_os_str().is_empty() {
            return Err(EmbedError::spec("output_directory is required"));
        }

        let (class_labels, colour_codes) = resolve_labels_and_colours(
            self.class_labels.as_deref(),
            self.colours_list.as_deref(),
        )?;
        let palette = colour_codes
            .iter()
            .map(|code| parse_hex_colour(code))
            .collect::<Result<Vec<_>>>()?;

        let density = self
            .visual_density_adjustment_parameter
            .unwrap_or(DEFAULT_DENSITY);
        validate_density(density)?;

        let seed = match (self.random_seed, self.random_state) {
            (Some(_), Some(_)) => {
                return Err(EmbedError::spec(
                    "random_seed and random_state are mutually exclusive",
                ))
            }
            (Some(seed), None) => seed,
            (None, Some(state)) => seed_from_state(state),
            (None, None) => DEFAULT_SEED,
        };

        if self.number_of_neighbours_for_building_neighbourhood_graph == Some(0) {
            return Err(EmbedError::spec(
                "number_of_neighbours_for_building_neighbourhood_graph must be positive",
            ));
        }
        if self.number_of_initial_data_abstraction_units == Some(0) {
            return Err(EmbedError::spec(
                "number_of_initial_data_abstraction_units must be positive",
            ));
        }
        if self.evaluation_neighbourhood_sizes.contains(&0) {
            return Err(EmbedError::spec("evaluation neighbourhood sizes must be positive"));
        }
        if self.worker_threads == Some(0) {
            return Err(EmbedError::spec("worker_threads must be positive"));
        }

        let metric = if self.use_cosine_distance_for_input_multi_dimensional_data {
            Metric::Cosine
        } else {
            Metric::Euclidean
        };

        Ok(ResolvedSpecification {
            input_file: base.join(&self.input_file_path),
            input_kind: if self.is_input_file_distances {
                InputKind::Distances
            } else {
                InputKind::Coordinates
            },
            output_directory: base.join(&self.output_directory),
            class_labels,
            colour_codes,
            palette,
            row_limit: self.number_of_initial_data_abstraction_units,
            metric,
            parameters: EmbeddingParameters {
                density,
                neighbour_count: self.number_of_neighbours_for_building_neighbourhood_graph,
                seed,
                worker_threads: self.worker_threads.unwrap_or_else(default_worker_threads),
            },
            random_state: self.random_state,
            evaluation_sizes: self.evaluation_neighbourhood_sizes.clone(),
        })
    }
}

impl SpecificationFile {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Reads and validates every entry of the file at `path`.
    pub fn load(path: &Path) -> Result<Vec<ResolvedSpecification>> {
        let file: SpecificationFile = serde_json::from_reader(BufReader::new(File::open(path)?))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        file.resolve(base)
    }

    pub fn resolve(&self, base: &Path) -> Result<Vec<ResolvedSpecification>> {
        if self.embedding_specifications.is_empty() {
            return Err(EmbedError::spec("no embedding specifications given"));
        }
        self.embedding_specifications
            .iter()
            .map(|entry| entry.resolve(base))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_seed_matches_sequential_draws() {
        let mut rng = ChaCha8Rng::seed_from_u64(DEFAULT_SEED);
        let draws: Vec<u64> = (0..4).map(|_| rng.next_u64()).collect();
        for (state, draw) in draws.iter().enumerate() {
            assert_eq!(seed_from_state(state as u64), *draw);
        }
    }

    #[test]
    fn hex_colours_parse_both_cases() {
        assert_eq!(parse_hex_colour("#8ab9F1").unwrap(), [0x8A, 0xB9, 0xF1]);
        assert!(parse_hex_colour("8AB9F1").is_err());
        assert!(parse_hex_colour("#8AB9F").is_err());
        assert!(parse_hex_colour("#GGGGGG").is_err());
    }
}
