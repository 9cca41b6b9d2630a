//! Dataset loading.
//!
//! A dataset `<name>` is three sibling text files: `<name>_train.csv`,
//! `<name>_test.csv`, and `<name>_neighbors.csv`, each line a
//! comma-separated sequence of floats. In the neighbors file, the first
//! value of line i is the index of the ground-truth nearest neighbor of
//! test row i; the remaining values are ignored here.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::Error;
use crate::vector::Vector;

const TRAIN_SUFFIX: &str = "_train.csv";
const TEST_SUFFIX: &str = "_test.csv";
const NEIGHBORS_SUFFIX: &str = "_neighbors.csv";

/// Read one CSV file of float vectors.
pub fn read_vectors(path: impl AsRef<Path>) -> Result<Vec<Vector>, Error> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut data = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let coords = line
            .split(',')
            .map(|token| {
                token.trim().parse::<f64>().map_err(|e| {
                    Error::Parse(format!(
                        "{}:{}: {:?}: {}",
                        path.display(),
                        line_no + 1,
                        token,
                        e
                    ))
                })
            })
            .collect::<Result<Vec<f64>, Error>>()?;
        data.push(Vector::new(coords));
    }
    Ok(data)
}

/// Load the train vectors, test vectors, and ground-truth neighbor indices
/// of dataset `name`.
pub fn read_dataset(name: &str) -> Result<(Vec<Vector>, Vec<Vector>, Vec<Vec<usize>>), Error> {
    let train = read_vectors(format!("{name}{TRAIN_SUFFIX}"))?;
    let test = read_vectors(format!("{name}{TEST_SUFFIX}"))?;
    let neighbor_rows = read_vectors(format!("{name}{NEIGHBORS_SUFFIX}"))?;

    let neighbors = neighbor_rows
        .iter()
        .map(|row| row.coords.iter().map(|&v| v as usize).collect())
        .collect();

    Ok((train, test, neighbors))
}
