//! Randomized linear hash from a real vector to a 64-bit field element.
//!
//! Output is `a₀ + Σ aᵢ·uᵢ (mod p)` where `uᵢ` is the IEEE-754 bit pattern
//! of the i-th coordinate and p is the largest 64-bit prime. The products
//! are 128 bits wide, so every term is reduced before accumulation.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Largest prime below 2⁶⁴; the modulus of the hash output field.
pub const PRIME: u64 = 18_446_744_073_709_551_557;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UniversalHash {
    /// dim + 1 coefficients, each uniform over `[0, PRIME)`.
    pub coefficients: Vec<u64>,
}

impl UniversalHash {
    pub fn new(dim: usize, rng: &mut impl Rng) -> Self {
        let coefficients = (0..=dim)
            .map(|_| {
                // rejection-sample to keep the coefficients unbiased
                loop {
                    let c = rng.random::<u64>();
                    if c < PRIME {
                        return c;
                    }
                }
            })
            .collect();
        UniversalHash { coefficients }
    }

    pub fn hash(&self, v: &[f64]) -> u64 {
        assert_eq!(
            v.len() + 1,
            self.coefficients.len(),
            "universal hash size mismatch"
        );
        let p = PRIME as u128;
        let mut acc = self.coefficients[0] as u128;
        for (i, &f) in v.iter().enumerate() {
            let term = (self.coefficients[i + 1] as u128 * f.to_bits() as u128) % p;
            acc = (acc + term) % p;
        }
        acc as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_for_same_input() {
        let mut rng = rand::rng();
        let h = UniversalHash::new(4, &mut rng);
        let v = [1.5, -2.25, 0.0, 1e300];
        assert_eq!(h.hash(&v), h.hash(&v));
    }

    #[test]
    fn test_output_in_field() {
        let mut rng = rand::rng();
        let h = UniversalHash::new(8, &mut rng);
        for _ in 0..100 {
            let v: Vec<f64> = (0..8).map(|_| rng.random::<f64>() * 1e6).collect();
            assert!(h.hash(&v) < PRIME);
        }
    }

    #[test]
    fn test_distinct_inputs_rarely_collide() {
        let mut rng = rand::rng();
        let h = UniversalHash::new(2, &mut rng);
        let a = h.hash(&[1.0, 2.0]);
        let b = h.hash(&[2.0, 1.0]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_empty_vector_returns_constant_term() {
        let mut rng = rand::rng();
        let h = UniversalHash::new(0, &mut rng);
        assert_eq!(h.hash(&[]), h.coefficients[0]);
    }

    #[test]
    #[should_panic(expected = "universal hash size mismatch")]
    fn test_size_mismatch_is_fatal() {
        let mut rng = rand::rng();
        let h = UniversalHash::new(3, &mut rng);
        h.hash(&[1.0]);
    }
}
