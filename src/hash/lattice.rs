//! LSH function built from the Leech lattice decoder.
//!
//! The lattice points are the centers of the hash cells; a random rotation
//! and translation are applied and the space is scaled so the cell width
//! matches the requested LSH radius. The JL-transform is folded into the
//! same projection as the rotation, which normalizes by column rather than
//! row, hence the extra √(dim/24) factor.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::hash::common::HashCommon;
use crate::hash::leech;
use crate::vector::Vector;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LatticeHash {
    pub common: HashCommon,
    pub scale: f64,
}

impl LatticeHash {
    /// `width` is the LSH radius; `max` bounds the random translation.
    pub fn new(dim: usize, width: f64, max: f64, rng: &mut impl Rng) -> Self {
        // build the decoder tables before the first query needs them
        leech::tables();

        // the lattice is scaled by √8
        let base_scale = 2.0 * std::f64::consts::SQRT_2;
        let jl_scale = (dim as f64 / 24.0).sqrt();
        // spans narrower than 24 dimensions admit no orthogonal projection;
        // fall back to independent Gaussian lines
        let orthogonal = dim >= 24;
        LatticeHash {
            common: HashCommon::new(dim, 24, max, orthogonal, rng),
            scale: base_scale * jl_scale / width,
        }
    }

    /// The closest lattice cell and the squared quantization distance.
    ///
    /// The translation offsets are added back onto the decoded point so
    /// that distinct hash functions key the same lattice point differently.
    pub fn hash_with_dist(&self, v: &Vector) -> (Vector, f64) {
        let projected = self.common.project(v).scale(self.scale);
        let (point, dist) = leech::closest_point(&projected.coords);
        (rounded(point).add(&self.common.offsets), dist)
    }

    /// The `probes` closest cells, ordered by ascending quantization
    /// distance.
    pub fn multi_probe_hash_with_dist(&self, v: &Vector, probes: usize) -> (Vec<Vector>, Vec<f64>) {
        let projected = self.common.project(v).scale(self.scale);
        let (points, dists) = leech::closest_points(&projected.coords, probes);
        let vectors = points
            .into_iter()
            .map(|p| rounded(p).add(&self.common.offsets))
            .collect();
        (vectors, dists)
    }

    pub fn hash(&self, v: &Vector) -> u64 {
        let (point, _) = self.hash_with_dist(v);
        self.common.uhash.hash(&point.coords)
    }

    pub fn multi_hash(&self, v: &Vector, probes: usize) -> Vec<u64> {
        let (points, _) = self.multi_probe_hash_with_dist(v, probes);
        points
            .iter()
            .map(|p| self.common.uhash.hash(&p.coords))
            .collect()
    }
}

/// Snap each coordinate to the nearest integer so floating-point noise
/// cannot perturb the hash key.
fn rounded(coords: Vec<f64>) -> Vector {
    Vector::new(coords.into_iter().map(f64::round).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::common::random_vector;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn test_hash(dim: usize) -> (LatticeHash, ChaCha20Rng) {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let h = LatticeHash::new(dim, 1.0, 10.0, &mut rng);
        (h, rng)
    }

    #[test]
    fn test_hash_is_deterministic() {
        let (h, mut rng) = test_hash(32);
        let v = random_vector(32, &mut rng);
        assert_eq!(h.hash(&v), h.hash(&v));
    }

    #[test]
    fn test_nearby_points_collide() {
        let (h, mut rng) = test_hash(24);
        let v = random_vector(24, &mut rng).scale(10.0);
        // a tiny perturbation relative to the cell width
        let w = v.add(&random_vector(24, &mut rng).scale(1e-9));
        assert_eq!(h.hash(&v), h.hash(&w));
    }

    #[test]
    fn test_multi_probe_invariants() {
        let (h, mut rng) = test_hash(30);
        let v = random_vector(30, &mut rng).scale(5.0);
        let probes = 12;

        let (points, dists) = h.multi_probe_hash_with_dist(&v, probes);
        assert_eq!(points.len(), probes);
        assert_eq!(dists.len(), probes);

        // first probe equals the single-probe result
        let (single, single_dist) = h.hash_with_dist(&v);
        assert_eq!(points[0], single);
        assert_eq!(dists[0], single_dist);

        for w in dists.windows(2) {
            assert!(w[0] <= w[1], "multi-probe distances must be sorted");
        }

        // hashes line up with the probe list
        let hashes = h.multi_hash(&v, probes);
        assert_eq!(hashes[0], h.hash(&v));
        assert_eq!(hashes.len(), probes);
    }

    #[test]
    fn test_sub_24_dimensional_input() {
        let (h, mut rng) = test_hash(4);
        let v = random_vector(4, &mut rng);
        // must not panic, and must stay deterministic
        assert_eq!(h.hash(&v), h.hash(&v));
        assert_eq!(h.common.projection_lines.len(), 24);
    }
}
