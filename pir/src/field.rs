//! Arithmetic in the prime field F_p with p = 2³¹ − 1.
//!
//! The field must be large enough to represent every dataset row identifier,
//! and large enough that the running sums formed during oblivious masking do
//! not overflow. Because p is a Mersenne prime, reduction after a multiply is
//! a shift, a mask, and one conditional subtract — no division.

use rand::Rng;

/// Field element. Values are always kept in `[0, p)`.
pub type Fp = u64;

/// p = 2³¹ − 1, the Mersenne prime used for all PIR shares.
pub const FIELD_PRIME: Fp = 2_147_483_647;

/// `(a + b) mod p` for `a, b ∈ [0, p)`.
#[inline]
pub fn add(a: Fp, b: Fp) -> Fp {
    let out = a + b;
    if out >= FIELD_PRIME {
        out - FIELD_PRIME
    } else {
        out
    }
}

/// `-a mod p`.
#[inline]
pub fn negate(a: Fp) -> Fp {
    if a != 0 {
        FIELD_PRIME - a
    } else {
        0
    }
}

/// `(a · b) mod p` for `a, b ∈ [0, p)`.
#[inline]
pub fn multiply(a: Fp, b: Fp) -> Fp {
    // the product is at most 62 bits, so it fits in a u64
    field_mod(a * b)
}

/// Reduce `[0, p²)` to `[0, p)` using 2³¹ ≡ 1 (mod p).
#[inline]
fn field_mod(a: u64) -> Fp {
    add(a >> 31, a & FIELD_PRIME)
}

/// Uniformly random element of `[0, p)`.
pub fn random_element(rng: &mut impl Rng) -> Fp {
    rng.random_range(0..FIELD_PRIME)
}
