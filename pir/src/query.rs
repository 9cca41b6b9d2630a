//! Query shares sent to the two servers, and share recovery.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::database::DbMetadata;
use crate::dpf::{Dpf, DpfKey, PrfKey};
use crate::field::{self, Fp};

/// One server's share of a query for a single database slot.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryShare {
    pub dpf_key: DpfKey,
    pub prf_key: PrfKey,
    /// Evaluate the DPF against row keywords rather than row indices.
    pub is_keyword_based: bool,
}

/// One server's shares for a whole batch query, one entry per partition.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchQueryShare {
    pub queries: Vec<QueryShare>,
}

impl DbMetadata {
    /// Generate the two shares of a query for the row whose keyword equals
    /// `keyword`.
    pub fn new_keyword_query_shares(
        &self,
        keyword: u64,
        range_bits: usize,
        rng: &mut impl Rng,
    ) -> [QueryShare; 2] {
        self.new_query_shares(keyword, range_bits, true, rng)
    }

    /// Generate the two shares of a query for the row at `index`.
    pub fn new_index_query_shares(
        &self,
        index: u64,
        range_bits: usize,
        rng: &mut impl Rng,
    ) -> [QueryShare; 2] {
        self.new_query_shares(index, range_bits, false, rng)
    }

    fn new_query_shares(
        &self,
        target: u64,
        range_bits: usize,
        is_keyword_based: bool,
        rng: &mut impl Rng,
    ) -> [QueryShare; 2] {
        let dpf = Dpf::client_initialize(rng);
        let (key_a, key_b) = dpf.generate_keys(target, range_bits, rng);

        [
            QueryShare {
                dpf_key: key_a,
                prf_key: dpf.prf_key,
                is_keyword_based,
            },
            QueryShare {
                dpf_key: key_b,
                prf_key: dpf.prf_key,
                is_keyword_based,
            },
        ]
    }
}

/// Combine the servers' shares of one slot into its value.
pub fn recover(shares: &[Fp]) -> Fp {
    shares.iter().fold(0, |acc, &s| field::add(acc, s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shares_carry_the_same_prf_key() {
        let mut rng = rand::rng();
        let md = DbMetadata { db_size: 16 };
        let shares = md.new_keyword_query_shares(7, 8, &mut rng);
        assert_eq!(shares[0].prf_key, shares[1].prf_key);
        assert_eq!(shares[0].dpf_key.share_idx, 0);
        assert_eq!(shares[1].dpf_key.share_idx, 1);
        assert!(shares[0].is_keyword_based);
        assert!(!md.new_index_query_shares(7, 8, &mut rng)[0].is_keyword_based);
    }

    #[test]
    fn test_recover_sums_mod_p() {
        assert_eq!(recover(&[1, 2, 3]), 6);
        assert_eq!(recover(&[]), 0);
        assert_eq!(
            recover(&[field::FIELD_PRIME - 1, 2]),
            1,
        );
    }
}
