//! Rotation, translation, and dimension reduction shared by the LSH
//! families.
//!
//! Dimensionality reduction is a random rotation followed by taking the
//! first `amplification` coordinates; with an orthogonal rotation this is
//! implicitly a Johnson–Lindenstrauss transform. A random translation
//! decorrelates the lattice cells from the origin.

use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::hash::universal::UniversalHash;
use crate::vector::Vector;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HashCommon {
    pub projection_lines: Vec<Vector>,
    pub offsets: Vector,
    pub orthogonal: bool,
    pub uhash: UniversalHash,
}

impl HashCommon {
    /// `dim` is the input dimension, `amplification` the projected
    /// dimension. Orthogonal projections require `amplification <= dim`;
    /// the non-orthogonal variant uses independent Gaussian directions and
    /// works for any shape.
    pub fn new(
        dim: usize,
        amplification: usize,
        max: f64,
        orthogonal: bool,
        rng: &mut impl Rng,
    ) -> Self {
        let mut projection_lines: Vec<Vector> = if orthogonal {
            assert!(
                amplification <= dim,
                "no orthogonal projection from {dim} to {amplification} dimensions"
            );
            let rotation = random_rotation_matrix(dim, rng);
            rotation[..amplification].to_vec()
        } else {
            (0..amplification).map(|_| random_vector(dim, rng)).collect()
        };
        for line in &mut projection_lines {
            *line = line.normalize();
        }

        let offsets = random_translation_vector(amplification, max, rng);
        let uhash = UniversalHash::new(amplification, rng);
        HashCommon {
            projection_lines,
            offsets,
            orthogonal,
            uhash,
        }
    }

    /// Apply the rotation and translation.
    pub fn project(&self, v: &Vector) -> Vector {
        let coords: Vec<f64> = self
            .projection_lines
            .iter()
            .map(|line| v.dot(line))
            .collect();
        Vector::new(coords).add(&self.offsets)
    }
}

/// A vector of independent standard normals.
pub fn random_vector(dim: usize, rng: &mut impl Rng) -> Vector {
    Vector::new((0..dim).map(|_| rng.sample(StandardNormal)).collect())
}

/// A vector drawn uniformly from the cube `[-max, max]^dim`.
pub fn random_translation_vector(dim: usize, max: f64, rng: &mut impl Rng) -> Vector {
    Vector::new(
        (0..dim)
            .map(|_| (rng.random::<f64>() - 0.5) * 2.0 * max)
            .collect(),
    )
}

/// A rotation matrix drawn uniformly from SO(dim), by the Householder
/// pipeline scipy uses for `special_ortho_group`.
pub fn random_rotation_matrix(dim: usize, rng: &mut impl Rng) -> Vec<Vector> {
    let mut h: Vec<Vec<f64>> = (0..dim)
        .map(|i| {
            let mut row = vec![0.0; dim];
            row[i] = 1.0;
            row
        })
        .collect();
    let mut d = vec![1.0f64; dim];

    for n in 0..dim.saturating_sub(1) {
        let mut x: Vec<f64> = (0..dim - n).map(|_| rng.sample(StandardNormal)).collect();
        let norm2: f64 = x.iter().map(|v| v * v).sum();
        let x0 = x[0];
        d[n] = if x0 >= 0.0 { 1.0 } else { -1.0 };
        x[0] += d[n] * norm2.sqrt();
        let factor = (2.0 / (norm2 - x0 * x0 + x[0] * x[0])).sqrt();
        for xv in &mut x {
            *xv *= factor;
        }

        // Householder transformation of the trailing columns
        for row in h.iter_mut() {
            let y: f64 = x.iter().enumerate().map(|(j, &xj)| row[n + j] * xj).sum();
            for (j, &xj) in x.iter().enumerate() {
                row[n + j] -= y * xj;
            }
        }
    }

    let prod: f64 = d[..dim - 1].iter().product();
    d[dim - 1] = if (dim - 1) % 2 == 0 { prod } else { -prod };

    h.into_iter()
        .enumerate()
        .map(|(i, row)| Vector::new(row.into_iter().map(|v| v * d[i]).collect()))
        .collect()
}
