//! A higher-dimensional LSH built as a direct product of Leech lattices.
//!
//! With `copies` = 2, a 48-dimensional input is viewed as two 24-dimensional
//! halves; each half is decoded independently and the results are
//! concatenated. The quantization error grows only by √2 while the
//! dimensionality-reduction error shrinks, a trade worth making: extra
//! tables and probes can recover lattice error but not projection error.
//!
//! A fixed random permutation of the coordinates makes the split uniform.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::hash::lattice::LatticeHash;
use crate::hash::search_queue::DistanceSearchQueue;
use crate::hash::universal::UniversalHash;
use crate::vector::Vector;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MultiLatticeHash {
    pub hashes: Vec<LatticeHash>,
    pub permutation: Vec<usize>,
    pub spans: Vec<(usize, usize)>,
    pub uhash: UniversalHash,
}

impl MultiLatticeHash {
    pub fn new(dim: usize, copies: usize, width: f64, max: f64, rng: &mut impl Rng) -> Self {
        let mut permutation: Vec<usize> = (0..dim).collect();
        permutation.shuffle(rng);

        let span_list = spans(dim, copies);
        let hashes = span_list
            .iter()
            .map(|&(start, end)| LatticeHash::new(end - start, width, max, rng))
            .collect();
        let uhash = UniversalHash::new(copies * 24, rng);

        MultiLatticeHash {
            hashes,
            permutation,
            spans: span_list,
            uhash,
        }
    }

    fn permuted(&self, v: &Vector) -> Vec<f64> {
        (0..v.size()).map(|i| v.coord(self.permutation[i])).collect()
    }

    /// Concatenated sublattice decodes and the summed quantization
    /// distance.
    pub fn hash_with_dist(&self, v: &Vector) -> (Vector, f64) {
        let permuted = self.permuted(v);
        let mut total_hash = Vec::with_capacity(self.hashes.len() * 24);
        let mut total_dist = 0.0;
        for (hash, &(start, end)) in self.hashes.iter().zip(&self.spans) {
            let (h, dist) = hash.hash_with_dist(&Vector::new(permuted[start..end].to_vec()));
            total_hash.extend_from_slice(&h.coords);
            total_dist += dist;
        }
        (Vector::new(total_hash), total_dist)
    }

    /// The `probes` most probable cells of the product lattice, found by
    /// enumerating the smallest distance sums across the sublattices'
    /// probe sequences.
    pub fn multi_probe_hash_with_dist(&self, v: &Vector, probes: usize) -> (Vec<Vector>, Vec<f64>) {
        let permuted = self.permuted(v);

        let mut sub_hashes = Vec::with_capacity(self.hashes.len());
        let mut sources = Vec::with_capacity(self.hashes.len());
        for (hash, &(start, end)) in self.hashes.iter().zip(&self.spans) {
            let (hs, dists) =
                hash.multi_probe_hash_with_dist(&Vector::new(permuted[start..end].to_vec()), probes);
            sub_hashes.push(hs);
            sources.push(dists);
        }

        let winners = DistanceSearchQueue::new(probes, sources).search();
        let mut output = Vec::with_capacity(winners.len());
        let mut distances = Vec::with_capacity(winners.len());
        for element in winners {
            let mut concat = Vec::with_capacity(self.hashes.len() * 24);
            for (j, &probe_index) in element.coords.iter().enumerate() {
                concat.extend_from_slice(&sub_hashes[j][probe_index].coords);
            }
            output.push(Vector::new(concat));
            distances.push(element.distance);
        }
        (output, distances)
    }

    pub fn hash(&self, v: &Vector) -> u64 {
        let (h, _) = self.hash_with_dist(v);
        self.uhash.hash(&h.coords)
    }

    pub fn multi_hash(&self, v: &Vector, probes: usize) -> Vec<u64> {
        let (hs, _) = self.multi_probe_hash_with_dist(v, probes);
        hs.iter().map(|h| self.uhash.hash(&h.coords)).collect()
    }
}

/// Divide `[0, total)` into `num_spans` contiguous half-open intervals with
/// lengths differing by at most one; lower-indexed spans carry the extras.
pub fn spans(total: usize, num_spans: usize) -> Vec<(usize, usize)> {
    let mut out = Vec::with_capacity(num_spans);
    let skip = total / num_spans;
    let mut extra = total % num_spans;
    let mut start = 0;
    for _ in 0..num_spans {
        let mut end = start + skip;
        if extra > 0 {
            end += 1;
            extra -= 1;
        }
        out.push((start, end));
        start = end;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::common::random_vector;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_spans_cover_evenly() {
        assert_eq!(spans(10, 3), vec![(0, 4), (4, 7), (7, 10)]);
        assert_eq!(spans(9, 3), vec![(0, 3), (3, 6), (6, 9)]);
        assert_eq!(spans(2, 2), vec![(0, 1), (1, 2)]);

        for (total, n) in [(100, 7), (5, 5), (64, 2)] {
            let s = spans(total, n);
            assert_eq!(s[0].0, 0);
            assert_eq!(s[n - 1].1, total);
            for w in s.windows(2) {
                assert_eq!(w[0].1, w[1].0, "spans must be contiguous");
            }
            let lens: Vec<usize> = s.iter().map(|&(a, b)| b - a).collect();
            let min = lens.iter().min().unwrap();
            let max = lens.iter().max().unwrap();
            assert!(max - min <= 1, "span lengths differ by more than one");
        }
    }

    #[test]
    fn test_hash_deterministic_and_permutation_fixed() {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let h = MultiLatticeHash::new(50, 2, 1.0, 10.0, &mut rng);
        let v = random_vector(50, &mut rng);
        assert_eq!(h.hash(&v), h.hash(&v));
        assert_eq!(h.spans, vec![(0, 25), (25, 50)]);
        let mut sorted = h.permutation.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_multi_probe_invariants() {
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        let h = MultiLatticeHash::new(48, 2, 1.0, 10.0, &mut rng);
        let v = random_vector(48, &mut rng).scale(3.0);
        let probes = 8;

        let (points, dists) = h.multi_probe_hash_with_dist(&v, probes);
        assert_eq!(points.len(), probes);

        let (single, single_dist) = h.hash_with_dist(&v);
        assert_eq!(points[0], single);
        assert!((dists[0] - single_dist).abs() < 1e-9);

        for w in dists.windows(2) {
            assert!(w[0] <= w[1]);
        }

        let hashes = h.multi_hash(&v, probes);
        assert_eq!(hashes[0], h.hash(&v));
    }

    #[test]
    fn test_two_dimensional_input() {
        // each sublattice sees a single coordinate through Gaussian lines
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        let h = MultiLatticeHash::new(2, 2, 1.0, 10.0, &mut rng);
        let v = Vector::new(vec![1000.0, 2037.0]);
        let hashes = h.multi_hash(&v, 4);
        assert_eq!(hashes.len(), 4);
        assert_eq!(hashes[0], h.hash(&v));
    }
}
