//! Keyword PIR database with batched range queries.
//!
//! A database is a flat vector of field elements, optionally keyed by sorted
//! 64-bit keywords, and optionally partitioned into contiguous key ranges
//! ("batches"). A batch query carries one DPF share per partition; each share
//! is expanded only over its partition's rows, which is what keeps DPF
//! evaluation tractable for multi-probe workloads.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dpf::Dpf;
use crate::field::{self, Fp};
use crate::query::{BatchQueryShare, QueryShare};

#[derive(Error, Debug)]
pub enum PirError {
    #[error("no batching parameters specified")]
    EmptyBatch,

    #[error("invalid batching parameters: {0}")]
    InvalidBatch(String),

    #[error("keywords not sorted")]
    KeywordsNotSorted,

    #[error("number of keywords should match database size")]
    KeywordCountMismatch,
}

/// Layout information a client needs to form queries against a database.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbMetadata {
    pub db_size: usize,
}

/// A set of field-element slots, addressable by row index or by keyword.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Database {
    pub data: Vec<Fp>,
    /// Sorted keywords, one per row (empty for index-only databases).
    pub keywords: Vec<u64>,

    /// Number of partitions (0 until batching parameters are set).
    pub batch_size: usize,
    /// Row index where each partition starts.
    pub batch_starts: Vec<usize>,
    /// Row index one past each partition's last row.
    pub batch_stops: Vec<usize>,
}

impl Database {
    pub fn new() -> Self {
        Database::default()
    }

    /// Construct a database over `data` addressed by the parallel `keys`.
    pub fn build_for_keys_and_values(keys: Vec<u64>, data: Vec<Fp>) -> Result<Self, PirError> {
        let mut db = Database::new();
        db.build_for_data(data);
        db.set_keywords(keys)?;
        Ok(db)
    }

    pub fn build_for_data(&mut self, data: Vec<Fp>) {
        self.data = data;
    }

    pub fn set_keywords(&mut self, keywords: Vec<u64>) -> Result<(), PirError> {
        if keywords.len() != self.data.len() {
            return Err(PirError::KeywordCountMismatch);
        }
        self.keywords = keywords;
        Ok(())
    }

    pub fn db_size(&self) -> usize {
        self.data.len()
    }

    pub fn metadata(&self) -> DbMetadata {
        DbMetadata {
            db_size: self.db_size(),
        }
    }

    /// Declare the partition boundaries used by batch queries.
    ///
    /// Partitions must refine the keyword sort order; keywords are validated
    /// here so a malformed table fails at build time rather than query time.
    pub fn set_batching_parameters(
        &mut self,
        starts: Vec<usize>,
        stops: Vec<usize>,
    ) -> Result<(), PirError> {
        if starts.is_empty() {
            return Err(PirError::EmptyBatch);
        }
        if starts.len() != stops.len() {
            return Err(PirError::InvalidBatch(format!(
                "{} starts vs {} stops",
                starts.len(),
                stops.len()
            )));
        }
        if stops[stops.len() - 1] != self.db_size() {
            return Err(PirError::InvalidBatch(
                "last partition must end at the database size".to_string(),
            ));
        }
        if !self.keywords.is_empty() {
            for window in self.keywords.windows(2) {
                if window[0] > window[1] {
                    return Err(PirError::KeywordsNotSorted);
                }
            }
        }

        self.batch_size = starts.len();
        self.batch_starts = starts;
        self.batch_stops = stops;
        Ok(())
    }

    /// Expand a query's DPF over rows `[start, stop)`.
    ///
    /// Entry `i` of the result is a share of `[key(start + i) == target]`,
    /// where `key` is the row's keyword in keyword mode and the row index
    /// otherwise.
    pub fn expand_shared_query(&self, query: &QueryShare, start: usize, stop: usize) -> Vec<Fp> {
        let dpf = Dpf::server_initialize(query.prf_key);

        let keys: Vec<u64> = if query.is_keyword_based {
            self.keywords[start..stop].to_vec()
        } else {
            (start as u64..stop as u64).collect()
        };
        dpf.batch_eval(&query.dpf_key, &keys)
    }

    /// Inner product of a partition's values with pre-expanded DPF bits.
    pub fn answer_with_expanded_bits(&self, bits: &[Fp], start: usize, stop: usize) -> Fp {
        let mut result: Fp = 0;
        for (row, &bit) in (start..stop).zip(bits) {
            result = field::add(result, field::multiply(self.data[row], bit));
        }
        result
    }

    /// Answer a single query over the whole database.
    pub fn private_secret_shared_query(&self, query: &QueryShare) -> Fp {
        let bits = self.expand_shared_query(query, 0, self.db_size());
        self.answer_with_expanded_bits(&bits, 0, self.db_size())
    }

    /// Answer a batch query: one share per partition, each expanded only
    /// over its partition's rows.
    pub fn private_secret_shared_batch_query(&self, batch: &BatchQueryShare) -> Vec<Fp> {
        assert!(self.batch_size > 0, "no batching parameters specified");
        assert_eq!(
            self.batch_size,
            self.batch_starts.len(),
            "invalid batching parameters"
        );
        assert_eq!(
            batch.queries.len(),
            self.batch_size,
            "batch query count must match partition count"
        );

        batch
            .queries
            .iter()
            .enumerate()
            .map(|(b, query)| {
                let start = self.batch_starts[b];
                let stop = self.batch_stops[b];
                let bits = self.expand_shared_query(query, start, stop);
                self.answer_with_expanded_bits(&bits, start, stop)
            })
            .collect()
    }
}
