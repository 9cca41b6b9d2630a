//! Partition-by-range bucketing and probe-set construction.
//!
//! The hash-key domain `[0, p₆₄)` is split into B half-open intervals whose
//! lengths differ by at most one. The same partition function runs on the
//! client (to decide which slot a probe belongs to) and on the server (to
//! delimit each partition's rows in the sorted table), which is what lets a
//! DPF be evaluated over a single partition instead of the whole table.

use pir::Fp;

use crate::hash::universal;
use crate::hash::LshFunction;
use crate::vector::Vector;

#[derive(Clone, Debug)]
pub struct PbrBuckets {
    /// B half-open `[start, end)` intervals covering `[0, max)`.
    pub buckets: Vec<(u64, u64)>,
    /// `max / B`, the short bucket length and divisor of the fast locator.
    pub size: u64,
    pub max: u64,
}

impl PbrBuckets {
    pub fn new(max: u64, num_buckets: u64) -> Self {
        assert!(num_buckets > 0, "need at least one bucket");
        assert!(num_buckets <= max, "more buckets than keys");

        let mut buckets = Vec::with_capacity(num_buckets as usize);
        let skip = max / num_buckets;
        let mut extra = max % num_buckets;
        let mut start = 0u64;
        for _ in 0..num_buckets {
            let mut end = start + skip;
            if extra > 0 {
                end += 1;
                extra -= 1;
            }
            buckets.push((start, end));
            start = end;
        }
        PbrBuckets {
            buckets,
            size: skip,
            max,
        }
    }

    /// Bucket index of `hash` in O(1): divide, then correct by at most one.
    pub fn find_bucket(&self, hash: u64) -> usize {
        debug_assert!(hash < self.max);
        let mut guess = (hash / self.size) as usize;
        if guess >= self.buckets.len() || self.buckets[guess].0 > hash {
            guess -= 1;
        } else if self.buckets[guess].1 <= hash {
            guess += 1;
        }
        guess
    }
}

/// Sort `(keys, values)` ascending by key and return the `(starts, stops)`
/// row ranges delimiting each of the `num_buckets` partitions.
pub fn compute_bucket_divisions(
    num_buckets: usize,
    keys: &mut Vec<u64>,
    values: &mut Vec<Fp>,
) -> (Vec<usize>, Vec<usize>) {
    assert_eq!(keys.len(), values.len());

    let mut pairs: Vec<(u64, Fp)> = keys.drain(..).zip(values.drain(..)).collect();
    pairs.sort_unstable_by_key(|&(k, _)| k);
    keys.extend(pairs.iter().map(|&(k, _)| k));
    values.extend(pairs.iter().map(|&(_, v)| v));

    let pbr = PbrBuckets::new(universal::PRIME, num_buckets as u64);
    let mut starts = vec![0usize; num_buckets];
    let mut stops = vec![0usize; num_buckets];

    // a linear scan suffices; binary search would also work
    let mut bucket = 0;
    for (i, &key) in keys.iter().enumerate() {
        while key >= pbr.buckets[bucket].1 {
            stops[bucket] = i;
            bucket += 1;
            starts[bucket] = i;
        }
    }
    stops[bucket] = keys.len();
    for b in bucket + 1..num_buckets {
        starts[b] = keys.len();
        stops[b] = keys.len();
    }
    (starts, stops)
}

/// Place the query's multi-probes into their partition slots.
///
/// Probes are visited in decreasing order of probability (ascending
/// quantization distance); the first probe to claim a bucket keeps it and
/// later probes for the same bucket are dropped. Unclaimed slots stay zero,
/// which the PIR layer reads as "no probe" — a legitimate hash of zero is
/// harmless because DPF evaluation at index 0 still returns a correct
/// share.
pub fn compute_probes(
    hash_function: &LshFunction,
    query: &Vector,
    num_partitions: usize,
    num_probes: usize,
) -> Vec<u64> {
    let mut output = vec![0u64; num_partitions];
    let hashes = hash_function.multi_hash(query, num_probes);

    let buckets = PbrBuckets::new(universal::PRIME, num_partitions as u64);
    let mut used = vec![false; num_partitions];
    for h in hashes {
        let bucket = buckets.find_bucket(h);
        if !used[bucket] {
            used[bucket] = true;
            output[bucket] = h;
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_division_invariant_1000_by_7() {
        let pbr = PbrBuckets::new(1000, 7);
        let lens: Vec<u64> = pbr.buckets.iter().map(|&(a, b)| b - a).collect();
        assert_eq!(lens, vec![143, 143, 143, 143, 143, 143, 142]);
        assert_eq!(lens.iter().sum::<u64>(), 1000);
        assert_eq!(pbr.find_bucket(999), 6);
        assert_eq!(pbr.find_bucket(0), 0);
    }

    #[test]
    fn test_buckets_tile_the_domain() {
        for (max, b) in [(100u64, 10u64), (101, 10), (1 << 20, 7), (universal::PRIME, 100)] {
            let pbr = PbrBuckets::new(max, b);
            assert_eq!(pbr.buckets[0].0, 0);
            assert_eq!(pbr.buckets[b as usize - 1].1, max);
            for w in pbr.buckets.windows(2) {
                assert_eq!(w[0].1, w[1].0);
            }
        }
    }

    #[test]
    fn test_find_bucket_agrees_with_interval() {
        let mut rng = rand::rng();
        for &(max, b) in &[(1000u64, 7u64), (universal::PRIME, 64)] {
            let pbr = PbrBuckets::new(max, b);
            for _ in 0..2000 {
                let h = rng.random_range(0..max);
                let i = pbr.find_bucket(h);
                let (start, end) = pbr.buckets[i];
                assert!(start <= h && h < end, "h={h} landed in [{start},{end})");
            }
            // boundary values
            for &(start, end) in &pbr.buckets {
                assert!(pbr.buckets[pbr.find_bucket(start)].0 <= start);
                let i = pbr.find_bucket(end - 1);
                assert!(pbr.buckets[i].0 <= end - 1 && end - 1 < pbr.buckets[i].1);
            }
        }
    }

    #[test]
    fn test_bucket_divisions_sort_and_cover() {
        let mut keys = vec![
            universal::PRIME - 5,
            3,
            universal::PRIME / 2,
            universal::PRIME / 2 + 1,
            9,
        ];
        let mut values: Vec<Fp> = vec![50, 51, 52, 53, 54];
        let (starts, stops) = compute_bucket_divisions(4, &mut keys, &mut values);

        assert!(keys.windows(2).all(|w| w[0] <= w[1]), "keys must be sorted");
        // values stay parallel to their keys
        assert_eq!(keys[0], 3);
        assert_eq!(values[0], 51);

        assert_eq!(stops[3], keys.len());
        for b in 0..4 {
            assert!(starts[b] <= stops[b]);
            if b > 0 {
                assert_eq!(starts[b], stops[b - 1]);
            }
        }

        // every key falls in its assigned partition
        let pbr = PbrBuckets::new(universal::PRIME, 4);
        for b in 0..4 {
            for i in starts[b]..stops[b] {
                assert_eq!(pbr.find_bucket(keys[i]), b);
            }
        }
    }

    #[test]
    fn test_bucket_divisions_with_sparse_table() {
        // all keys land in the last partition; the scan must skip the
        // empty ones
        let mut keys = vec![universal::PRIME - 2, universal::PRIME - 1];
        let mut values: Vec<Fp> = vec![1, 2];
        let (starts, stops) = compute_bucket_divisions(8, &mut keys, &mut values);
        for b in 0..7 {
            assert_eq!(starts[b], stops[b], "partition {b} should be empty");
        }
        assert_eq!(starts[7], 0);
        assert_eq!(stops[7], 2);
    }

    #[test]
    fn test_compute_probes_places_by_bucket() {
        use rand::SeedableRng;
        let mut rng = rand_chacha::ChaCha20Rng::seed_from_u64(17);
        let f = LshFunction::new_multi_lattice(16, 2, 1.0, 10.0, &mut rng);
        let query = Vector::new((0..16).map(|i| (i as f64) * 2.11 - 7.0).collect());
        let num_probes = 8;

        let probes = compute_probes(&f, &query, num_probes, num_probes);
        assert_eq!(probes.len(), num_probes);

        let pbr = PbrBuckets::new(universal::PRIME, num_probes as u64);
        let hashes = f.multi_hash(&query, num_probes);

        // every placed probe sits in its own bucket slot
        for (slot, &p) in probes.iter().enumerate() {
            if p != 0 {
                assert_eq!(pbr.find_bucket(p), slot);
            }
        }
        // the single-probe hash is never dropped: it is visited first
        let first = hashes[0];
        assert_eq!(probes[pbr.find_bucket(first)], first);

        // slots hold the lowest-distance probe among contenders
        for (j, &h) in hashes.iter().enumerate() {
            let slot = pbr.find_bucket(h);
            let winner = probes[slot];
            let winner_rank = hashes.iter().position(|&x| x == winner).unwrap();
            assert!(winner_rank <= j, "later probe displaced an earlier one");
        }
    }

    #[test]
    fn test_bucket_divisions_empty_table() {
        let mut keys = Vec::new();
        let mut values = Vec::new();
        let (starts, stops) = compute_bucket_divisions(3, &mut keys, &mut values);
        assert_eq!(starts, vec![0, 0, 0]);
        assert_eq!(stops, vec![0, 0, 0]);
    }
}
