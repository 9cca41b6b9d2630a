//! Two-party distributed point function (DPF) over a 64-bit keyword domain.
//!
//! Implements the tree-based construction of Boyle–Gilboa–Ishai ("Function
//! Secret Sharing: Improvements and Extensions", CCS 2016). `generate_keys`
//! produces two keys that encode additive shares (in F_p, p = 2³¹ − 1) of the
//! point function that is 1 at the special index and 0 everywhere else:
//!
//! ```text
//! eval(key_a, x) + eval(key_b, x) ≡ [x == index]   (mod p)
//! ```
//!
//! A single key reveals nothing about the special index.
//!
//! The PRG expanding each tree node is AES-128 in a Matyas–Meyer–Oseas-style
//! mode: both parties hold the same PRF key (it is public to the servers), so
//! the cipher is initialized once and each 128-bit seed is expanded into two
//! child seeds plus two control bits.
//!
//! Keys serialize to a flat byte blob of `18·(range_bits + 1) + 16` bytes;
//! evaluation rejects any other length.

use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::Aes128;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::field::{self, Fp};

/// AES-128 PRF key shared by the two servers.
pub type PrfKey = [u8; 16];

/// Bytes per tree level in the serialized key: a 16-byte seed correction
/// word plus the two control-bit correction words.
const CW_SIZE: usize = 18;

/// Number of top tree layers expanded once and cached during batch
/// evaluation.
const CACHE_LAYERS: usize = 12;

/// Serialized size of a key for a `2^range_bits` domain.
pub fn key_size(range_bits: usize) -> usize {
    CW_SIZE * (range_bits + 1) + 16
}

/// One share of a point function. The blob is opaque to the holder; only the
/// share index and the declared range are meaningful without the PRF key.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DpfKey {
    pub bytes: Vec<u8>,
    pub share_idx: u8,
    pub range_bits: usize,
}

/// DPF evaluation context: the PRF key and the expanded AES cipher.
pub struct Dpf {
    pub prf_key: PrfKey,
    cipher: Aes128,
}

/// Key fields unpacked from the serialized blob.
struct ParsedKey {
    root_seed: u128,
    root_t: u8,
    seed_cws: Vec<u128>,
    t_cws: Vec<(u8, u8)>,
    last_cw: Fp,
}

impl Dpf {
    /// Client-side initialization with a fresh random PRF key.
    pub fn client_initialize(rng: &mut impl Rng) -> Self {
        let prf_key: PrfKey = rng.random();
        Self::server_initialize(prf_key)
    }

    /// Server-side initialization from the PRF key carried in a query.
    pub fn server_initialize(prf_key: PrfKey) -> Self {
        let cipher = Aes128::new(GenericArray::from_slice(&prf_key));
        Dpf { prf_key, cipher }
    }

    /// Expand a seed into two child seeds and two control bits.
    fn prg(&self, input: u128) -> (u128, u128, u8, u8) {
        let input = input & !1;

        let mut left = GenericArray::clone_from_slice(&input.to_le_bytes());
        let mut right = GenericArray::clone_from_slice(&(input ^ 1).to_le_bytes());
        self.cipher.encrypt_block(&mut left);
        self.cipher.encrypt_block(&mut right);

        let s_left = u128::from_le_bytes(left.into()) ^ input;
        let s_right = (u128::from_le_bytes(right.into()) ^ input) ^ 1;

        let t_left = (s_left & 1) as u8;
        let t_right = (s_right & 1) as u8;
        (s_left & !1, s_right & !1, t_left, t_right)
    }

    /// Generate the two shares of the point function at `index` over the
    /// domain `[0, 2^range_bits)`.
    pub fn generate_keys(
        &self,
        index: u64,
        range_bits: usize,
        rng: &mut impl Rng,
    ) -> (DpfKey, DpfKey) {
        assert!(
            (1..=64).contains(&range_bits),
            "DPF range must cover between 1 and 64 bits"
        );
        if range_bits < 64 {
            assert!(
                index >> range_bits == 0,
                "special index outside the DPF domain"
            );
        }
        let size = range_bits;

        let mut seeds0 = vec![0u128; size + 1];
        let mut seeds1 = vec![0u128; size + 1];
        let mut bits0 = vec![0u8; size + 1];
        let mut bits1 = vec![0u8; size + 1];
        seeds0[0] = rng.random();
        seeds1[0] = rng.random();
        bits0[0] = 0;
        bits1[0] = 1;

        let mut seed_cws = vec![0u128; size];
        let mut t_cws = vec![(0u8, 0u8); size];

        for i in 1..=size {
            let (s0l, s0r, t0l, t0r) = self.prg(seeds0[i - 1]);
            let (s1l, s1r, t1l, t1r) = self.prg(seeds1[i - 1]);
            let s0 = [s0l, s0r];
            let s1 = [s1l, s1r];
            let t0 = [t0l, t0r];
            let t1 = [t1l, t1r];

            // descend left when the index bit is 0
            let index_bit = ((index >> (size - i)) & 1) as u8;
            let keep = index_bit as usize;
            let lose = 1 - keep;

            seed_cws[i - 1] = s0[lose] ^ s1[lose];
            t_cws[i - 1] = (t0[0] ^ t1[0] ^ index_bit ^ 1, t0[1] ^ t1[1] ^ index_bit);
            let keep_t_cw = if keep == 0 {
                t_cws[i - 1].0
            } else {
                t_cws[i - 1].1
            };

            if bits0[i - 1] == 1 {
                seeds0[i] = s0[keep] ^ seed_cws[i - 1];
                bits0[i] = t0[keep] ^ keep_t_cw;
            } else {
                seeds0[i] = s0[keep];
                bits0[i] = t0[keep];
            }
            if bits1[i - 1] == 1 {
                seeds1[i] = s1[keep] ^ seed_cws[i - 1];
                bits1[i] = t1[keep] ^ keep_t_cw;
            } else {
                seeds1[i] = s1[keep];
                bits1[i] = t1[keep];
            }
        }

        // final correction word makes the two leaf conversions sum to 1 at
        // the special index
        let s_final0 = convert(seeds0[size]);
        let s_final1 = convert(seeds1[size]);
        let mut last_cw = field::add(field::add(1, field::negate(s_final0)), s_final1);
        if bits1[size] == 1 {
            last_cw = field::negate(last_cw);
        }

        let mut k0 = vec![0u8; key_size(size)];
        k0[0] = 0;
        k0[1..17].copy_from_slice(&seeds0[0].to_le_bytes());
        k0[17] = bits0[0];
        for i in 1..=size {
            let off = CW_SIZE * i;
            k0[off..off + 16].copy_from_slice(&seed_cws[i - 1].to_le_bytes());
            k0[off + 16] = t_cws[i - 1].0;
            k0[off + 17] = t_cws[i - 1].1;
        }
        let last_off = CW_SIZE * (size + 1);
        k0[last_off..last_off + 16].copy_from_slice(&(last_cw as u128).to_le_bytes());

        let mut k1 = k0.clone();
        k1[0] = 1;
        k1[1..17].copy_from_slice(&seeds1[0].to_le_bytes());
        k1[17] = bits1[0];

        (
            DpfKey {
                bytes: k0,
                share_idx: 0,
                range_bits: size,
            },
            DpfKey {
                bytes: k1,
                share_idx: 1,
                range_bits: size,
            },
        )
    }

    /// Evaluate one share at point `x`.
    pub fn eval(&self, key: &DpfKey, x: u64) -> Fp {
        let parsed = parse_key(key);
        let size = key.range_bits;
        debug_assert!(size == 64 || x >> size == 0);

        let mut seed = parsed.root_seed;
        let mut t = parsed.root_t;
        for i in 1..=size {
            (seed, t) = self.step(&parsed, seed, t, i, x);
        }
        finalize(seed, t, parsed.last_cw, key.share_idx)
    }

    /// Evaluate one share at every point of `xs`.
    ///
    /// The top [`CACHE_LAYERS`] layers of the tree are expanded once up
    /// front, so each point only walks the remaining `range_bits − 12`
    /// levels.
    pub fn batch_eval(&self, key: &DpfKey, xs: &[u64]) -> Vec<Fp> {
        let parsed = parse_key(key);
        let size = key.range_bits;
        let cache_layers = size.min(CACHE_LAYERS);

        let mut seeds = vec![parsed.root_seed];
        let mut ts = vec![parsed.root_t];
        for level in 1..=cache_layers {
            let mut next_seeds = Vec::with_capacity(seeds.len() * 2);
            let mut next_ts = Vec::with_capacity(ts.len() * 2);
            for (&s, &t) in seeds.iter().zip(&ts) {
                let (mut sl, mut sr, mut tl, mut tr) = self.prg(s);
                if t == 1 {
                    sl ^= parsed.seed_cws[level - 1];
                    sr ^= parsed.seed_cws[level - 1];
                    tl ^= parsed.t_cws[level - 1].0;
                    tr ^= parsed.t_cws[level - 1].1;
                }
                next_seeds.push(sl);
                next_ts.push(tl);
                next_seeds.push(sr);
                next_ts.push(tr);
            }
            seeds = next_seeds;
            ts = next_ts;
        }

        xs.iter()
            .map(|&x| {
                debug_assert!(size == 64 || x >> size == 0);
                let prefix = if size == cache_layers {
                    x as usize
                } else {
                    ((x >> (size - cache_layers)) & ((1u64 << cache_layers) - 1)) as usize
                };
                let mut seed = seeds[prefix];
                let mut t = ts[prefix];
                for i in cache_layers + 1..=size {
                    (seed, t) = self.step(&parsed, seed, t, i, x);
                }
                finalize(seed, t, parsed.last_cw, key.share_idx)
            })
            .collect()
    }

    /// One level of the evaluation walk: expand, correct, branch on bit `i`
    /// (1-based from the most significant bit of the domain).
    #[inline]
    fn step(&self, parsed: &ParsedKey, seed: u128, t: u8, i: usize, x: u64) -> (u128, u8) {
        let (mut sl, mut sr, mut tl, mut tr) = self.prg(seed);
        if t == 1 {
            sl ^= parsed.seed_cws[i - 1];
            sr ^= parsed.seed_cws[i - 1];
            tl ^= parsed.t_cws[i - 1].0;
            tr ^= parsed.t_cws[i - 1].1;
        }
        let size = parsed.seed_cws.len();
        if (x >> (size - i)) & 1 == 0 {
            (sl, tl)
        } else {
            (sr, tr)
        }
    }
}

/// Fold a 128-bit leaf seed into a field element.
#[inline]
fn convert(raw: u128) -> Fp {
    let masked = (raw & ((1u128 << 31) - 1)) as u64;
    if masked < field::FIELD_PRIME {
        masked
    } else {
        masked - field::FIELD_PRIME
    }
}

#[inline]
fn finalize(seed: u128, t: u8, last_cw: Fp, share_idx: u8) -> Fp {
    let mut res = convert(seed);
    if t == 1 {
        res = field::add(res, last_cw);
    }
    if share_idx == 1 {
        res = field::negate(res);
    }
    res
}

fn parse_key(key: &DpfKey) -> ParsedKey {
    let size = key.range_bits;
    if key.bytes.len() != key_size(size) {
        panic!(
            "invalid DPF key size: {} bytes for range {}",
            key.bytes.len(),
            size
        );
    }
    let mut root = [0u8; 16];
    root.copy_from_slice(&key.bytes[1..17]);

    let mut seed_cws = Vec::with_capacity(size);
    let mut t_cws = Vec::with_capacity(size);
    for i in 1..=size {
        let off = CW_SIZE * i;
        let mut cw = [0u8; 16];
        cw.copy_from_slice(&key.bytes[off..off + 16]);
        seed_cws.push(u128::from_le_bytes(cw));
        t_cws.push((key.bytes[off + 16], key.bytes[off + 17]));
    }
    let last_off = CW_SIZE * (size + 1);
    let mut last = [0u8; 16];
    last.copy_from_slice(&key.bytes[last_off..last_off + 16]);

    ParsedKey {
        root_seed: u128::from_le_bytes(root),
        root_t: key.bytes[17],
        seed_cws,
        t_cws,
        last_cw: u128::from_le_bytes(last) as Fp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FIELD_PRIME;

    fn reconstruct(dpf: &Dpf, keys: &(DpfKey, DpfKey), x: u64) -> Fp {
        field::add(dpf.eval(&keys.0, x), dpf.eval(&keys.1, x))
    }

    #[test]
    fn test_point_function_small_domain() {
        let mut rng = rand::rng();
        let dpf = Dpf::client_initialize(&mut rng);
        let keys = dpf.generate_keys(5, 6, &mut rng);

        for x in 0..64u64 {
            let expected = if x == 5 { 1 } else { 0 };
            assert_eq!(reconstruct(&dpf, &keys, x), expected, "x={x}");
        }
    }

    #[test]
    fn test_point_function_random_indices() {
        let mut rng = rand::rng();
        let dpf = Dpf::client_initialize(&mut rng);
        for _ in 0..20 {
            let index = rng.random_range(0..1u64 << 16);
            let keys = dpf.generate_keys(index, 16, &mut rng);
            assert_eq!(reconstruct(&dpf, &keys, index), 1);
            for _ in 0..50 {
                let x = rng.random_range(0..1u64 << 16);
                if x != index {
                    assert_eq!(reconstruct(&dpf, &keys, x), 0, "index={index} x={x}");
                }
            }
        }
    }

    #[test]
    fn test_full_64_bit_domain() {
        let mut rng = rand::rng();
        let dpf = Dpf::client_initialize(&mut rng);
        let index = rng.random::<u64>();
        let keys = dpf.generate_keys(index, 64, &mut rng);

        assert_eq!(reconstruct(&dpf, &keys, index), 1);
        assert_eq!(reconstruct(&dpf, &keys, index ^ 1), 0);
        assert_eq!(reconstruct(&dpf, &keys, !index), 0);
        assert_eq!(reconstruct(&dpf, &keys, 0), if index == 0 { 1 } else { 0 });
    }

    #[test]
    fn test_single_share_is_in_field() {
        let mut rng = rand::rng();
        let dpf = Dpf::client_initialize(&mut rng);
        let keys = dpf.generate_keys(1234, 20, &mut rng);
        for x in [0u64, 1, 1234, 99999, (1 << 20) - 1] {
            assert!(dpf.eval(&keys.0, x) < FIELD_PRIME);
            assert!(dpf.eval(&keys.1, x) < FIELD_PRIME);
        }
    }

    #[test]
    fn test_batch_eval_matches_pointwise() {
        let mut rng = rand::rng();
        let dpf = Dpf::client_initialize(&mut rng);
        // 16 > CACHE_LAYERS so the cached-prefix path is exercised
        let keys = dpf.generate_keys(777, 16, &mut rng);

        let xs: Vec<u64> = (0..200).map(|_| rng.random_range(0..1u64 << 16)).collect();
        for key in [&keys.0, &keys.1] {
            let batch = dpf.batch_eval(key, &xs);
            for (i, &x) in xs.iter().enumerate() {
                assert_eq!(batch[i], dpf.eval(key, x));
            }
        }
    }

    #[test]
    fn test_batch_eval_domain_smaller_than_cache() {
        let mut rng = rand::rng();
        let dpf = Dpf::client_initialize(&mut rng);
        let keys = dpf.generate_keys(9, 4, &mut rng);

        let xs: Vec<u64> = (0..16).collect();
        let a = dpf.batch_eval(&keys.0, &xs);
        let b = dpf.batch_eval(&keys.1, &xs);
        for x in 0..16usize {
            let expected = if x == 9 { 1 } else { 0 };
            assert_eq!(field::add(a[x], b[x]), expected);
        }
    }

    #[test]
    fn test_server_initialize_matches_client() {
        let mut rng = rand::rng();
        let client = Dpf::client_initialize(&mut rng);
        let server = Dpf::server_initialize(client.prf_key);
        let keys = client.generate_keys(42, 10, &mut rng);
        for x in 0..1u64 << 10 {
            assert_eq!(client.eval(&keys.0, x), server.eval(&keys.0, x));
        }
    }

    #[test]
    #[should_panic(expected = "invalid DPF key size")]
    fn test_truncated_key_is_fatal() {
        let mut rng = rand::rng();
        let dpf = Dpf::client_initialize(&mut rng);
        let (mut key, _) = dpf.generate_keys(3, 8, &mut rng);
        key.bytes.truncate(10);
        dpf.eval(&key, 3);
    }

    #[test]
    #[should_panic(expected = "DPF range")]
    fn test_empty_range_is_fatal() {
        let mut rng = rand::rng();
        let dpf = Dpf::client_initialize(&mut rng);
        dpf.generate_keys(0, 0, &mut rng);
    }

    #[test]
    fn test_key_size_is_linear_in_range() {
        assert_eq!(key_size(64), 18 * 65 + 16);
        let mut rng = rand::rng();
        let dpf = Dpf::client_initialize(&mut rng);
        let (k0, k1) = dpf.generate_keys(0, 32, &mut rng);
        assert_eq!(k0.bytes.len(), key_size(32));
        assert_eq!(k1.bytes.len(), key_size(32));
        assert_eq!(k0.share_idx, 0);
        assert_eq!(k1.share_idx, 1);
    }
}
