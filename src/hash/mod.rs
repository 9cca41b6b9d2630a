//! Locality-sensitive hashing over the Leech lattice.

pub mod common;
pub mod lattice;
pub mod leech;
pub mod multilattice;
pub mod search_queue;
pub mod universal;

use rand::Rng;
use serde::{Deserialize, Serialize};

pub use common::HashCommon;
pub use lattice::LatticeHash;
pub use multilattice::MultiLatticeHash;
pub use universal::UniversalHash;

use crate::vector::Vector;

/// An LSH function: maps a vector to a 64-bit lattice-cell identifier and,
/// for multi-probing, to the k most probable identifiers ordered by
/// ascending quantization distance.
///
/// The first multi-probe always equals the single-probe result, and the
/// sequence is deterministic given the function and the input.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LshFunction {
    Lattice(LatticeHash),
    MultiLattice(MultiLatticeHash),
}

impl LshFunction {
    /// A single-lattice hash over the full input dimension.
    pub fn new_lattice(dim: usize, width: f64, max: f64, rng: &mut impl Rng) -> Self {
        LshFunction::Lattice(LatticeHash::new(dim, width, max, rng))
    }

    /// A product of `copies` Leech lattices over permuted coordinate spans.
    pub fn new_multi_lattice(
        dim: usize,
        copies: usize,
        width: f64,
        max: f64,
        rng: &mut impl Rng,
    ) -> Self {
        LshFunction::MultiLattice(MultiLatticeHash::new(dim, copies, width, max, rng))
    }

    pub fn hash(&self, v: &Vector) -> u64 {
        match self {
            LshFunction::Lattice(h) => h.hash(v),
            LshFunction::MultiLattice(h) => h.hash(v),
        }
    }

    pub fn multi_hash(&self, v: &Vector, probes: usize) -> Vec<u64> {
        match self {
            LshFunction::Lattice(h) => h.multi_hash(v, probes),
            LshFunction::MultiLattice(h) => h.multi_hash(v, probes),
        }
    }
}
