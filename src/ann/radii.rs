//! LSH radius sequences.
//!
//! With a small number of tables, sampling radii directly from the target
//! distribution gives results with large variance; the quantiles are used
//! instead. The 0th and 100th quantiles of a normal are ±∞, so two variants
//! exist: one shrinks the quantile grid toward the center, the other shifts
//! it by half a step. They perform the same for many tables; for few tables
//! the shifted grid is better.

use rand::Rng;
use rand_distr::{Distribution, Normal};

/// Radii at the quantiles `(i+1)/(T+1)` of N(mean, stddev²), sorted
/// ascending. Non-positive quantiles are replaced by fresh positive draws.
pub fn normal_sequence(
    mean: f64,
    stddev: f64,
    num_tables: usize,
    rng: &mut impl Rng,
) -> Vec<f64> {
    let dist = Normal::new(mean, stddev).expect("invalid normal parameters");
    let mut radii: Vec<f64> = (0..num_tables)
        .map(|i| {
            let mut q = mean + stddev * standard_normal_quantile((i + 1) as f64 / (num_tables + 1) as f64);
            while q <= 0.0 {
                q = dist.sample(rng);
            }
            q
        })
        .collect();
    radii.sort_unstable_by(|a, b| a.total_cmp(b));
    radii
}

/// Radii at the quantiles `(i+0.5)/T` of N(mean, stddev²), sorted
/// ascending. Non-positive quantiles are replaced by fresh positive draws.
pub fn normal_sequence2(
    mean: f64,
    stddev: f64,
    num_tables: usize,
    rng: &mut impl Rng,
) -> Vec<f64> {
    let dist = Normal::new(mean, stddev).expect("invalid normal parameters");
    let mut radii: Vec<f64> = (0..num_tables)
        .map(|i| {
            let mut q = mean + stddev * standard_normal_quantile((i as f64 + 0.5) / num_tables as f64);
            while q <= 0.0 {
                q = dist.sample(rng);
            }
            q
        })
        .collect();
    radii.sort_unstable_by(|a, b| a.total_cmp(b));
    radii
}

/// Standard-normal quantiles linearly remapped so the extremes equal `min`
/// and `max`. Returns `(radii, mean, scale)` of the induced normal.
pub fn normal_sequence3(
    min: f64,
    max: f64,
    num_tables: usize,
    rng: &mut impl Rng,
) -> (Vec<f64>, f64, f64) {
    if num_tables == 1 {
        let avg = (min + max) / 2.0;
        return (vec![avg], avg, 0.0);
    }

    let mut quantiles: Vec<f64> = (0..num_tables)
        .map(|i| standard_normal_quantile((i + 1) as f64 / (num_tables + 1) as f64))
        .collect();

    let a = (max - min) / (quantiles[num_tables - 1] - quantiles[0]);
    let b = min - a * quantiles[0];

    let dist = Normal::new(b, a).expect("invalid normal parameters");
    for q in &mut quantiles {
        *q = a * *q + b;
        while *q <= 0.0 {
            *q = dist.sample(rng);
        }
    }
    quantiles.sort_unstable_by(|x, y| x.total_cmp(y));
    (quantiles, b, a)
}

/// Geometric progression from `min` to `max`: `r_i = min · (max/min)^(i/(T−1))`.
pub fn geometric_sequence(min: f64, max: f64, num_tables: usize) -> Vec<f64> {
    if num_tables == 1 {
        return vec![min];
    }
    let ratio = max / min;
    (0..num_tables)
        .map(|i| min * ratio.powf(i as f64 / (num_tables - 1) as f64))
        .collect()
}

/// Inverse CDF of the standard normal, by Acklam's rational approximation
/// (relative error below 1.15e-9 over the open unit interval).
fn standard_normal_quantile(p: f64) -> f64 {
    assert!(p > 0.0 && p < 1.0, "quantile argument must be in (0, 1)");

    const A: [f64; 6] = [
        -3.969683028665376e+01,
        2.209460984245205e+02,
        -2.759285104469687e+02,
        1.383577518672690e+02,
        -3.066479806614716e+01,
        2.506628277459239e+00,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e+01,
        1.615858368580409e+02,
        -1.556989798598866e+02,
        6.680131188771972e+01,
        -1.328068155288572e+01,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-03,
        -3.223964580411365e-01,
        -2.400758277161838e+00,
        -2.549732539343734e+00,
        4.374664141464968e+00,
        2.938163982698783e+00,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-03,
        3.224671290700398e-01,
        2.445134137142996e+00,
        3.754408661907416e+00,
    ];
    const P_LOW: f64 = 0.02425;

    if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -(((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_quantile_symmetry_and_known_values() {
        assert!(standard_normal_quantile(0.5).abs() < 1e-9);
        // Φ⁻¹(0.975) ≈ 1.959964
        assert!((standard_normal_quantile(0.975) - 1.959964).abs() < 1e-4);
        for p in [0.01, 0.2, 0.4] {
            let lo = standard_normal_quantile(p);
            let hi = standard_normal_quantile(1.0 - p);
            assert!((lo + hi).abs() < 1e-7, "quantiles must be symmetric");
        }
    }

    #[test]
    fn test_quantile_monotone() {
        let mut prev = f64::NEG_INFINITY;
        for i in 1..100 {
            let q = standard_normal_quantile(i as f64 / 100.0);
            assert!(q > prev);
            prev = q;
        }
    }

    #[test]
    fn test_normal_sequences_sorted_and_positive() {
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        for radii in [
            normal_sequence(887.7, 244.9, 10, &mut rng),
            normal_sequence2(887.7, 244.9, 10, &mut rng),
            normal_sequence2(1.0, 5.0, 8, &mut rng), // forces resampling
        ] {
            assert!(radii.iter().all(|&r| r > 0.0));
            assert!(radii.windows(2).all(|w| w[0] <= w[1]));
        }
    }

    #[test]
    fn test_normal_sequence2_centers_on_mean() {
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let radii = normal_sequence2(100.0, 10.0, 5, &mut rng);
        assert_eq!(radii.len(), 5);
        // middle quantile (i=2, p=0.5) is exactly the mean
        assert!((radii[2] - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_normal_sequence3_hits_the_extremes() {
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let (radii, mean, scale) = normal_sequence3(10.0, 50.0, 6, &mut rng);
        assert!((radii[0] - 10.0).abs() < 1e-9);
        assert!((radii[5] - 50.0).abs() < 1e-9);
        assert!((mean - 30.0).abs() < 1e-9);
        assert!(scale > 0.0);

        let (single, avg, spread) = normal_sequence3(10.0, 50.0, 1, &mut rng);
        assert_eq!(single, vec![30.0]);
        assert_eq!(avg, 30.0);
        assert_eq!(spread, 0.0);
    }

    #[test]
    fn test_geometric_sequence_endpoints() {
        let radii = geometric_sequence(2.0, 32.0, 5);
        assert_eq!(radii.len(), 5);
        assert!((radii[0] - 2.0).abs() < 1e-12);
        assert!((radii[4] - 32.0).abs() < 1e-12);
        // constant ratio
        for w in radii.windows(2) {
            assert!((w[1] / w[0] - 2.0).abs() < 1e-9);
        }
        assert_eq!(geometric_sequence(3.0, 9.0, 1), vec![3.0]);
    }
}
