//! Best-first enumeration of the k smallest sums across sorted sources.
//!
//! Given S sources, each a list of distances sorted ascending, this
//! enumerates the k smallest sums of one distance per source without
//! materializing the full S-fold product. Nodes are tuples of per-source
//! indices; starting from (0,…,0), each popped node expands into the S
//! neighbors obtained by incrementing exactly one coordinate. The standard
//! Dijkstra-on-a-lattice argument gives monotone output.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

/// One enumerated tuple: per-source indices and the summed distance.
#[derive(Clone, Debug, PartialEq)]
pub struct Element {
    pub coords: Vec<usize>,
    pub distance: f64,
}

#[derive(PartialEq)]
struct Node {
    distance: f64,
    coords: Vec<usize>,
}

impl Eq for Node {}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.coords.cmp(&other.coords))
    }
}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

pub struct DistanceSearchQueue {
    sources: Vec<Vec<f64>>,
    queue: BinaryHeap<Reverse<Node>>,
    inserted: HashSet<u64>,
    length: usize,
    id_base: u64,
}

impl DistanceSearchQueue {
    pub fn new(length: usize, sources: Vec<Vec<f64>>) -> Self {
        assert!(
            sources.iter().all(|s| !s.is_empty()),
            "every source must produce at least one candidate"
        );
        // the base must exceed every reachable coordinate
        let id_base = sources
            .iter()
            .map(|s| s.len())
            .max()
            .unwrap_or(0)
            .max(length) as u64;
        DistanceSearchQueue {
            sources,
            queue: BinaryHeap::new(),
            inserted: HashSet::new(),
            length,
            id_base,
        }
    }

    /// Enumerate up to `length` tuples, sorted ascending by summed distance.
    pub fn search(mut self) -> Vec<Element> {
        let base = Node {
            distance: self.sources.iter().map(|s| s[0]).sum(),
            coords: vec![0; self.sources.len()],
        };
        self.insert(base);

        let mut accepted = Vec::with_capacity(self.length);
        while accepted.len() < self.length {
            let Some(Reverse(node)) = self.queue.pop() else {
                break;
            };
            for pos in 0..self.sources.len() {
                if let Some(neighbor) = self.increment(&node, pos) {
                    self.insert(neighbor);
                }
            }
            accepted.push(Element {
                coords: node.coords,
                distance: node.distance,
            });
        }
        accepted
    }

    fn insert(&mut self, node: Node) {
        if self.inserted.insert(self.id(&node.coords)) {
            self.queue.push(Reverse(node));
        }
    }

    /// Neighbor of `node` with coordinate `pos` advanced by one, or None at
    /// the end of that source. The distance is recomputed from scratch so
    /// float error cannot accumulate along a path.
    fn increment(&self, node: &Node, pos: usize) -> Option<Node> {
        let mut coords = node.coords.clone();
        coords[pos] += 1;
        if coords[pos] >= self.sources[pos].len() {
            return None;
        }
        let distance = coords
            .iter()
            .enumerate()
            .map(|(i, &c)| self.sources[i][c])
            .sum();
        Some(Node { distance, coords })
    }

    /// Tuples deduplicate by their base-k integer encoding.
    fn id(&self, coords: &[usize]) -> u64 {
        let mut id = 0u64;
        for &c in coords {
            id = id * self.id_base + c as u64;
        }
        id
    }
}
