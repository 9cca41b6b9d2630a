//! Dense real vectors with the handful of operations the LSH pipeline needs.

use serde::{Deserialize, Serialize};

/// An ordered sequence of doubles of known dimension.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vector {
    pub coords: Vec<f64>,
}

impl Vector {
    pub fn new(coords: Vec<f64>) -> Self {
        Vector { coords }
    }

    pub fn zero(dim: usize) -> Self {
        Vector {
            coords: vec![0.0; dim],
        }
    }

    pub fn size(&self) -> usize {
        self.coords.len()
    }

    #[inline]
    pub fn coord(&self, i: usize) -> f64 {
        self.coords[i]
    }

    pub fn dot(&self, other: &Vector) -> f64 {
        assert_eq!(self.size(), other.size(), "dot of mismatched dimensions");
        self.coords
            .iter()
            .zip(&other.coords)
            .map(|(a, b)| a * b)
            .sum()
    }

    pub fn add(&self, other: &Vector) -> Vector {
        assert_eq!(self.size(), other.size(), "add of mismatched dimensions");
        Vector {
            coords: self
                .coords
                .iter()
                .zip(&other.coords)
                .map(|(a, b)| a + b)
                .collect(),
        }
    }

    pub fn scale(&self, factor: f64) -> Vector {
        Vector {
            coords: self.coords.iter().map(|a| a * factor).collect(),
        }
    }

    /// Scale to unit Euclidean norm. The zero vector is returned unchanged.
    pub fn normalize(&self) -> Vector {
        let norm = self.dot(self).sqrt();
        if norm == 0.0 {
            return self.clone();
        }
        self.scale(1.0 / norm)
    }
}

/// Squared Euclidean distance between two coordinate slices.
pub fn dist_squared(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
