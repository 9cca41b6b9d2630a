//! Hash-table construction: hash every dataset vector under one LSH
//! function, then cap each multi-collision bucket to a single survivor.
//!
//! The build shards the dataset across worker threads; each worker fills a
//! private map and a single mutex-guarded merge folds the partials into the
//! shared table. Capping runs single-threaded afterward over a canonical
//! ordering (keys ascending, row ids ascending inside a bucket), so two
//! servers driving the build with the same seeded generator produce
//! bit-identical tables regardless of thread scheduling.

use std::collections::HashMap;
use std::sync::Mutex;
use std::thread;

use pir::Fp;
use rand::Rng;
use tracing::debug;

use crate::hash::multilattice::spans;
use crate::hash::LshFunction;
use crate::vector::Vector;

/// Multi-valued hash table, the pre-capping build state.
pub struct HashTable {
    table: usize,
    hashes: HashMap<u64, Vec<u32>>,
}

impl HashTable {
    pub fn new(table: usize) -> Self {
        HashTable {
            table,
            hashes: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    pub fn get(&self, hash: u64) -> Option<&[u32]> {
        self.hashes.get(&hash).map(|v| v.as_slice())
    }

    /// Hash every vector of `data`, sharded across the physical CPUs.
    pub fn add_all(&mut self, hash_function: &LshFunction, data: &[Vector]) {
        if data.is_empty() {
            return;
        }
        let num_threads = num_cpus::get().min(data.len());
        let sections = spans(data.len(), num_threads);
        let merged: Mutex<&mut HashMap<u64, Vec<u32>>> = Mutex::new(&mut self.hashes);
        let table = self.table;

        thread::scope(|scope| {
            for &(start, end) in &sections {
                let merged = &merged;
                scope.spawn(move || {
                    let mut local: HashMap<u64, Vec<u32>> = HashMap::new();
                    for row in start..end {
                        let key = hash_function.hash(&data[row]);
                        local.entry(key).or_default().push(row as u32);
                        if (row - start) % 16384 == 10000 {
                            debug!(table, "completed row {} of {}", row - start, end - start);
                        }
                    }
                    let mut shared = merged.lock().unwrap();
                    for (key, rows) in local {
                        shared.entry(key).or_default().extend(rows);
                    }
                });
            }
        });
    }

    /// Collapse each bucket to one uniformly chosen row id and return the
    /// table as parallel `(keys, values)` vectors sorted by key.
    ///
    /// The draw order is canonical, so an identically seeded generator on
    /// another server picks the same survivors.
    pub fn convert_and_cap(self, rng: &mut impl Rng) -> (Vec<u64>, Vec<Fp>) {
        let mut entries: Vec<(u64, Vec<u32>)> = self.hashes.into_iter().collect();
        entries.sort_unstable_by_key(|&(k, _)| k);

        let mut keys = Vec::with_capacity(entries.len());
        let mut values = Vec::with_capacity(entries.len());
        for (key, mut rows) in entries {
            rows.sort_unstable();
            let pick = if rows.len() > 1 {
                rng.random_range(0..rows.len())
            } else {
                0
            };
            keys.push(key);
            values.push(rows[pick] as Fp);
        }
        (keys, values)
    }
}

/// Build and cap table `table_index` in one step.
pub fn compute_hashes(
    table_index: usize,
    hash_function: &LshFunction,
    data: &[Vector],
    rng: &mut impl Rng,
) -> (Vec<u64>, Vec<Fp>) {
    let mut table = HashTable::new(table_index);
    table.add_all(hash_function, data);
    table.convert_and_cap(rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn fixture() -> (LshFunction, Vec<Vector>) {
        let mut rng = ChaCha20Rng::seed_from_u64(23);
        let f = LshFunction::new_multi_lattice(4, 2, 1.0, 10.0, &mut rng);
        // widely spaced rows plus exact duplicates to force collisions
        let mut data: Vec<Vector> = (0..40)
            .map(|i| Vector::new(vec![i as f64 * 500.0, 1.0, -3.0, i as f64 * 250.0]))
            .collect();
        for i in 0..10 {
            data.push(data[i].clone());
        }
        (f, data)
    }

    #[test]
    fn test_capped_value_is_a_member_of_the_bucket() {
        let (f, data) = fixture();
        let mut table = HashTable::new(0);
        table.add_all(&f, &data);

        let multi: HashMap<u64, Vec<u32>> = data
            .iter()
            .enumerate()
            .fold(HashMap::new(), |mut acc, (row, v)| {
                acc.entry(f.hash(v)).or_default().push(row as u32);
                acc
            });

        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let (keys, values) = table.convert_and_cap(&mut rng);
        assert_eq!(keys.len(), multi.len());
        for (key, value) in keys.iter().zip(&values) {
            let bucket = &multi[key];
            assert!(
                bucket.contains(&(*value as u32)),
                "capped value {value} not among colliders {bucket:?}"
            );
        }
    }

    #[test]
    fn test_build_is_deterministic_across_servers() {
        let (f, data) = fixture();
        let build = || {
            let mut rng = ChaCha20Rng::seed_from_u64(99);
            compute_hashes(0, &f, &data, &mut rng)
        };
        let (keys_a, values_a) = build();
        let (keys_b, values_b) = build();
        assert_eq!(keys_a, keys_b);
        assert_eq!(values_a, values_b);
    }

    #[test]
    fn test_keys_sorted_ascending() {
        let (f, data) = fixture();
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let (keys, _) = compute_hashes(0, &f, &data, &mut rng);
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_parallel_build_matches_serial_hashing() {
        let (f, data) = fixture();
        let mut table = HashTable::new(3);
        table.add_all(&f, &data);
        for (row, v) in data.iter().enumerate() {
            let bucket = table.get(f.hash(v)).expect("row missing from table");
            assert!(bucket.contains(&(row as u32)));
        }
    }

    #[test]
    fn test_empty_dataset() {
        let (f, _) = fixture();
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let (keys, values) = compute_hashes(0, &f, &[], &mut rng);
        assert!(keys.is_empty());
        assert!(values.is_empty());
    }
}
