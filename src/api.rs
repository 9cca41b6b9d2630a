//! Wire types of the RPC surface.
//!
//! Everything here crosses the network as JSON; field names are camelCase
//! to match the published interface. The hash functions are transmitted in
//! full — permutation, projection lines, translation vectors, and
//! universal-hash coefficients — so the client can compute probes locally.

use pir::{BatchQueryShare, DbMetadata, Fp};
use serde::{Deserialize, Serialize};

use crate::hash::LshFunction;
use crate::vector::Vector;

/// Error field carried in responses; an empty message means success.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ApiError {
    pub msg: String,
}

impl ApiError {
    pub fn new(msg: impl Into<String>) -> Self {
        ApiError { msg: msg.into() }
    }

    pub fn is_empty(&self) -> bool {
        self.msg.is_empty()
    }
}

/// Everything a client needs to issue private ANN queries.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionParameters {
    pub session_id: i64,
    /// Number of hash tables.
    pub num_tables: usize,
    /// Number of bucket probes per table.
    pub num_probes: usize,
    /// A sample query the client can use for evaluation.
    pub test_query: Vector,
    /// LSH functions the client uses to compute keys.
    pub hash_functions: Vec<LshFunction>,
    /// Upper bound on the universal hash output width, in bits.
    pub hash_function_range: usize,
    /// PIR metadata for each table's buckets.
    pub table_bucket_metadata: Vec<DbMetadata>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WaitForExperimentArgs {}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WaitForExperimentResponse {}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct InitSessionArgs {}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitSessionResponse {
    pub error: ApiError,
    #[serde(flatten)]
    pub params: Option<SessionParameters>,
    pub stats_dataset_name: String,
    pub stats_dataset_size: usize,
    pub stats_num_features: usize,
    pub stats_preprocessing_ms: u64,
    pub stats_num_server_procs: usize,
}

/// One batch of DPF shares per table, shaped `[numTables][numProbes]`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnQueryArgs {
    pub session_id: i64,
    pub secret_shared: Vec<BatchQueryShare>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnQueryResponse {
    pub error: ApiError,
    pub session_id: i64,
    /// Masked per-slot shares, `numTables · numProbes` of them in table
    /// order.
    pub res_secret_shared: Vec<Fp>,
    pub stats_query_ms: u64,
    pub stats_masking_us: u64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TerminateSessionArgs {}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TerminateSessionResponse {}
