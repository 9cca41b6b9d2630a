//! Decoder for the 24-dimensional Leech lattice Λ₂₄.
//!
//! Follows the Conway–Sloane construction ("Soft decoding techniques for
//! codes and lattices, including the Golay code and the Leech lattice",
//! IEEE Trans. IT 1986): the Leech lattice is assembled from three glued
//! copies of E₈, each of which is two cosets of D₈ offset by the all-½
//! vector. The lattice here is scaled by √8 so that every lattice point has
//! even integer coordinates.
//!
//! Decoding a point means trying all 256 coset offsets (Table VI), decoding
//! the three 8-dimensional slices in E₈ for each, then scoring the 4096
//! admissible offset triples (Table VII) by summed squared distance. This is
//! the understandable O(56000 flop) decoder; faster ones exist but are far
//! harder to follow.

use once_cell::sync::Lazy;

use crate::vector::dist_squared;

/// Coset representatives A₀..A₁₅ from Conway–Sloane Table IV.
const TABLE_IV_A: [[i8; 8]; 16] = [
    [0, 0, 0, 0, 0, 0, 0, 0],
    [4, 0, 0, 0, 0, 0, 0, 0],
    [2, 2, 2, 2, 0, 0, 0, 0],
    [-2, 2, 2, 2, 0, 0, 0, 0],
    [2, 2, 0, 0, 2, 2, 0, 0],
    [-2, 2, 0, 0, 2, 2, 0, 0],
    [2, 2, 0, 0, 0, 0, 2, 2],
    [-2, 2, 0, 0, 0, 0, 2, 2],
    [2, 0, 2, 0, 2, 0, 2, 0],
    [-2, 0, 2, 0, 2, 0, 2, 0],
    [2, 0, 2, 0, 0, 2, 0, 2],
    [-2, 0, 2, 0, 0, 2, 0, 2],
    [2, 0, 0, 2, 2, 0, 0, 2],
    [-2, 0, 0, 2, 2, 0, 0, 2],
    [2, 0, 0, 2, 0, 2, 2, 0],
    [-2, 0, 0, 2, 0, 2, 2, 0],
];

/// Glue vectors T₀..T₁₅ from Conway–Sloane Table IV.
const TABLE_IV_T: [[i8; 8]; 16] = [
    [0, 0, 0, 0, 0, 0, 0, 0],
    [2, 2, 2, 0, 0, 2, 0, 0],
    [2, 2, 0, 2, 0, 0, 0, 2],
    [2, 0, 2, 2, 0, 0, 2, 0],
    [0, 2, 2, 2, 2, 0, 0, 0],
    [2, 2, 0, 0, 2, 0, 2, 0],
    [2, 0, 2, 0, 2, 0, 0, 2],
    [2, 0, 0, 2, 2, 2, 0, 0],
    [-3, 1, 1, 1, 1, 1, 1, 1],
    [3, -1, -1, 1, 1, -1, 1, 1],
    [3, -1, 1, -1, 1, 1, 1, -1],
    [3, 1, -1, -1, 1, 1, -1, 1],
    [3, 1, 1, 1, 1, -1, -1, -1],
    [3, -1, 1, 1, -1, 1, -1, 1],
    [3, 1, -1, 1, -1, 1, 1, -1],
    [3, 1, 1, -1, -1, -1, 1, 1],
];

pub struct LeechTables {
    /// The 256 distinct offsets Aᵢ + Tⱼ.
    pub vi: Vec<[i8; 8]>,
    /// The 4096 admissible triples of Table VI indices.
    pub vii: Vec<[u8; 3]>,
}

static TABLES: Lazy<LeechTables> = Lazy::new(precompute);

/// Process-wide decoder tables, built on first use.
pub fn tables() -> &'static LeechTables {
    &TABLES
}

fn precompute() -> LeechTables {
    let mut vi = Vec::with_capacity(256);
    for a in &TABLE_IV_A {
        for t in &TABLE_IV_T {
            let mut sum = [0i8; 8];
            for k in 0..8 {
                sum[k] = a[k] + t[k];
            }
            vi.push(sum);
        }
    }
    assert_eq!(vi.len(), 256, "expected 256 table VI entries");

    let mut vii = Vec::with_capacity(4096);
    for t in &TABLE_IV_T {
        for a in &TABLE_IV_A {
            let mut at = [0i8; 8];
            for k in 0..8 {
                at[k] = a[k] + t[k];
            }
            let at_index = find_table_index(&vi, &at);
            for b in &TABLE_IV_A {
                let mut bt = [0i8; 8];
                let mut ab = [0i8; 8];
                for k in 0..8 {
                    bt[k] = b[k] + t[k];
                    ab[k] = a[k] + b[k];
                }
                let bt_index = find_table_index(&vi, &bt);
                for c in &TABLE_IV_A {
                    let mut abc = ab;
                    for k in 0..8 {
                        abc[k] += c[k];
                    }
                    if !is_4e8_point(&abc) {
                        continue;
                    }
                    let mut ct = [0i8; 8];
                    for k in 0..8 {
                        ct[k] = c[k] + t[k];
                    }
                    let ct_index = find_table_index(&vi, &ct);
                    vii.push([at_index, bt_index, ct_index]);
                    break;
                }
            }
        }
    }
    assert_eq!(vii.len(), 4096, "expected 4096 table VII entries");

    LeechTables { vi, vii }
}

fn find_table_index(vi: &[[i8; 8]], v: &[i8; 8]) -> u8 {
    for (i, entry) in vi.iter().enumerate() {
        if entry == v {
            return i as u8;
        }
    }
    panic!("no matching table VI vector found");
}

/// Is `v` a point of 4·E₈? The coordinate sum must be a multiple of 8, and
/// the coordinates must be all ≡ 0 or all ≡ ±2 (mod 4).
fn is_4e8_point(v: &[i8; 8]) -> bool {
    let sum: i32 = v.iter().map(|&x| x as i32).sum();
    if sum % 8 != 0 {
        return false;
    }
    if v.iter().all(|&x| x % 4 == 0) {
        return true;
    }
    v.iter().all(|&x| {
        let m = x % 4;
        m == 2 || m == -2
    })
}

/// Closest point of D₈: round each coordinate, and if the coordinate sum is
/// odd, re-round the coordinate that was rounded furthest toward the other
/// side.
pub fn d8_decode(f: &[f64]) -> [f64; 8] {
    let mut v = [0.0f64; 8];
    let mut sum = 0i64;
    let mut farthest_dist = -1.0;
    let mut farthest_pos = 0;
    let mut other_direction = 0.0;
    for i in 0..8 {
        v[i] = f[i].round();
        sum += v[i] as i64;
        let diff = f[i] - v[i];
        let dist = diff.abs();
        if dist >= farthest_dist {
            farthest_dist = dist;
            farthest_pos = i;
            other_direction = if diff > 0.0 { v[i] + 1.0 } else { v[i] - 1.0 };
        }
    }
    if sum % 2 == 0 {
        return v;
    }
    v[farthest_pos] = other_direction;
    v
}

/// Closest point of E₈ = D₈ ∪ (D₈ + ½), with its squared distance.
pub fn e8_decode(f: &[f64]) -> ([f64; 8], f64) {
    let y0 = d8_decode(f);

    let mut shifted = [0.0f64; 8];
    for k in 0..8 {
        shifted[k] = f[k] - 0.5;
    }
    let mut y1 = d8_decode(&shifted);
    for y in &mut y1 {
        *y += 0.5;
    }

    let d0 = dist_squared(f, &y0);
    let d1 = dist_squared(f, &y1);
    if d0 < d1 {
        (y0, d0)
    } else {
        (y1, d1)
    }
}

/// For each of the 256 coset offsets, decode the three 8-dimensional slices
/// of `(f + offset) / 4` in E₈. Returns the candidate points (unscaled back
/// by 4) and their squared distances in the scaled space.
fn closest_per_coset(f: &[f64]) -> (Vec<[[f64; 8]; 3]>, Vec<[f64; 3]>) {
    let tables = tables();
    let mut points = vec![[[0.0f64; 8]; 3]; 256];
    let mut dists = vec![[0.0f64; 3]; 256];

    for (j, offset) in tables.vi.iter().enumerate() {
        let mut t = [0.0f64; 24];
        for k in 0..24 {
            t[k] = (f[k] + offset[k % 8] as f64) / 4.0;
        }
        for slice in 0..3 {
            let (p, d) = e8_decode(&t[slice * 8..slice * 8 + 8]);
            dists[j][slice] = d;
            for k in 0..8 {
                // unscale; the coordinates become even integers
                points[j][slice][k] = p[k] * 4.0;
            }
        }
    }
    (points, dists)
}

/// The closest Leech lattice point to `f` (24 coordinates) and its squared
/// distance, scaled back to the input space.
pub fn closest_point(f: &[f64]) -> (Vec<f64>, f64) {
    assert_eq!(f.len(), 24, "Leech decoder input must be 24-dimensional");
    let tables = tables();
    let (points, dists) = closest_per_coset(f);

    let mut best = f64::MAX;
    let mut best_index = 0;
    for (j, triple) in tables.vii.iter().enumerate() {
        let dist = dists[triple[0] as usize][0]
            + dists[triple[1] as usize][1]
            + dists[triple[2] as usize][2];
        if dist < best {
            best = dist;
            best_index = j;
        }
    }

    let point = assemble(&points, &tables.vii[best_index]);
    (point, best * 16.0)
}

/// The `num_points` closest Leech lattice points, sorted ascending by
/// squared distance. Distances carry the same ×16 scaling as
/// [`closest_point`], so the first entry is exactly the single-point decode.
pub fn closest_points(f: &[f64], num_points: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
    assert_eq!(f.len(), 24, "Leech decoder input must be 24-dimensional");
    let tables = tables();
    assert!(
        num_points <= tables.vii.len(),
        "at most 4096 probes are available"
    );
    let (points, dists) = closest_per_coset(f);

    let mut candidates: Vec<(f64, usize)> = tables
        .vii
        .iter()
        .enumerate()
        .map(|(j, triple)| {
            let dist = dists[triple[0] as usize][0]
                + dists[triple[1] as usize][1]
                + dists[triple[2] as usize][2];
            (dist, j)
        })
        .collect();
    // a partial heap selection would do for small k; the full sort is the
    // reference behavior
    candidates.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

    let mut out_points = Vec::with_capacity(num_points);
    let mut out_dists = Vec::with_capacity(num_points);
    for &(dist, j) in candidates.iter().take(num_points) {
        out_points.push(assemble(&points, &tables.vii[j]));
        out_dists.push(dist * 16.0);
    }
    (out_points, out_dists)
}

fn assemble(points: &[[[f64; 8]; 3]], triple: &[u8; 3]) -> Vec<f64> {
    let mut out = Vec::with_capacity(24);
    for slice in 0..3 {
        out.extend_from_slice(&points[triple[slice] as usize][slice]);
    }
    out
}
