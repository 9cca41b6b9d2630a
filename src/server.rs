//! Server side of the protocol: session state machine, the per-table query
//! fan-out, and oblivious masking of the candidate stream.
//!
//! The server moves through Building → Ready → Terminated. The published
//! index (PIR databases and LSH functions) is immutable once installed;
//! query handling touches only per-request state, so the tables are shared
//! freely across request tasks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use pir::field::{self, Fp};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;
use tokio::sync::Notify;
use tracing::info;

use crate::api::{
    AnnQueryArgs, AnnQueryResponse, ApiError, InitSessionArgs, InitSessionResponse,
    SessionParameters, TerminateSessionArgs, TerminateSessionResponse, WaitForExperimentArgs,
    WaitForExperimentResponse,
};
use crate::hash::LshFunction;
use crate::vector::Vector;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Building,
    Ready,
    Terminated,
}

/// The immutable index snapshot published to clients.
pub struct ServerState {
    pub dataset_name: String,
    pub db_size: usize,

    /// PIR databases containing the capped LSH tables.
    pub table_dbs: Vec<pir::Database>,
    pub num_tables: usize,
    pub num_probes: usize,
    pub test_query: Vector,
    pub hash_functions: Vec<LshFunction>,
    /// Range size of the universal hash output (in bits).
    pub hash_function_range: usize,

    pub num_procs: usize,
    pub stats_preprocessing_ms: u64,
    pub stats_num_features: usize,
}

pub struct Server {
    phase: RwLock<Phase>,
    state: RwLock<Option<Arc<ServerState>>>,

    /// Seed shared by the two servers; the per-query masking multipliers
    /// must be common between them (and unknown to the client) or the
    /// reconstructed zero-prefix is destroyed.
    mask_seed: [u8; 32],
    query_counter: AtomicU64,

    /// Signals the listener to shut down after TerminateSession.
    pub shutdown: Notify,
}

impl Server {
    pub fn new(mask_seed: [u8; 32]) -> Self {
        Server {
            phase: RwLock::new(Phase::Building),
            state: RwLock::new(None),
            mask_seed,
            query_counter: AtomicU64::new(0),
            shutdown: Notify::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        *self.phase.read().unwrap()
    }

    /// Publish the built index and move to Ready.
    pub fn install(&self, state: ServerState) {
        *self.state.write().unwrap() = Some(Arc::new(state));
        *self.phase.write().unwrap() = Phase::Ready;
    }

    /// Move to Terminated and wake the listener. There is no re-entry.
    pub fn terminate(&self) {
        *self.phase.write().unwrap() = Phase::Terminated;
        self.shutdown.notify_waiters();
    }

    fn ready_state(&self) -> Option<Arc<ServerState>> {
        if self.phase() != Phase::Ready {
            return None;
        }
        self.state.read().unwrap().clone()
    }

    /// Per-query masking stream: both servers derive the same stream from
    /// the shared seed and the session-local query counter.
    fn next_mask_rng(&self) -> ChaCha20Rng {
        let counter = self.query_counter.fetch_add(1, Ordering::SeqCst);
        let mut seed = self.mask_seed;
        for (byte, counter_byte) in seed.iter_mut().zip(counter.to_le_bytes()) {
            *byte ^= counter_byte;
        }
        ChaCha20Rng::from_seed(seed)
    }

    pub fn session_parameters(&self) -> Option<SessionParameters> {
        let state = self.ready_state()?;
        Some(SessionParameters {
            // single-session server
            session_id: 0,
            num_tables: state.num_tables,
            num_probes: state.num_probes,
            test_query: state.test_query.clone(),
            hash_functions: state.hash_functions.clone(),
            hash_function_range: state.hash_function_range,
            table_bucket_metadata: state.table_dbs.iter().map(|db| db.metadata()).collect(),
        })
    }

    /// Run the PIR batch queries for every table and mask the candidates.
    ///
    /// The per-table batches run in parallel, each writing a disjoint slice
    /// of the candidate array; candidates appear in table order, partition
    /// order within a table. Masking then collapses the stream so only the
    /// first non-zero candidate survives reconstruction.
    pub fn handle_query(&self, args: &AnnQueryArgs) -> AnnQueryResponse {
        let Some(state) = self.ready_state() else {
            return query_error("server is not ready");
        };
        if args.secret_shared.len() != state.num_tables {
            return query_error(format!(
                "expected {} table batches, got {}",
                state.num_tables,
                args.secret_shared.len()
            ));
        }
        let batch_size = state.table_dbs[0].batch_size;
        if batch_size == 0 {
            return query_error("server has no batching parameters");
        }
        if args
            .secret_shared
            .iter()
            .any(|batch| batch.queries.len() != batch_size)
        {
            return query_error(format!("each batch must carry {batch_size} queries"));
        }

        let start = Instant::now();
        let mut candidates = vec![0 as Fp; state.num_tables * batch_size];
        candidates
            .par_chunks_mut(batch_size)
            .zip(state.table_dbs.par_iter())
            .zip(args.secret_shared.par_iter())
            .for_each(|((slots, db), batch)| {
                slots.copy_from_slice(&db.private_secret_shared_batch_query(batch));
            });
        let stats_query_ms = start.elapsed().as_millis() as u64;

        let start = Instant::now();
        let mut rng = self.next_mask_rng();
        let masked = oblivious_masking(&candidates, &mut rng);
        let stats_masking_us = start.elapsed().as_micros() as u64;

        info!("processed PrivateANNQuery request in {stats_query_ms} ms");

        AnnQueryResponse {
            error: ApiError::default(),
            session_id: args.session_id,
            res_secret_shared: masked,
            stats_query_ms,
            stats_masking_us,
        }
    }
}

fn query_error(msg: impl Into<String>) -> AnnQueryResponse {
    AnnQueryResponse {
        error: ApiError::new(msg),
        ..Default::default()
    }
}

/// Re-randomize a stream of additive shares so that, jointly with the other
/// server's output, everything after the first non-zero value reconstructs
/// to uniform noise.
///
/// Each slot adds `r · sum` where `sum` is the running share total of the
/// *earlier* slots. While the earlier values are all zero the shared sum is
/// zero and the slot passes through untouched; from the first non-zero
/// value onward the multiplier randomizes every later slot. The `r` stream
/// must be identical on both servers.
pub fn oblivious_masking(slots: &[Fp], rng: &mut impl Rng) -> Vec<Fp> {
    let mut out = Vec::with_capacity(slots.len());
    let mut sum: Fp = 0;
    for &slot in slots {
        let r = field::random_element(rng);
        out.push(field::add(slot, field::multiply(r, sum)));
        sum = field::add(sum, slot);
    }
    out
}

// ============================================================================
// RPC surface
// ============================================================================

pub fn router(server: Arc<Server>) -> Router {
    Router::new()
        .route("/wait", post(wait_for_experiment))
        .route("/init", post(init_session))
        .route("/query", post(private_ann_query))
        .route("/terminate", post(terminate_session))
        .with_state(server)
}

/// Blocks until the server has finished building its index.
async fn wait_for_experiment(
    State(server): State<Arc<Server>>,
    Json(_args): Json<WaitForExperimentArgs>,
) -> Json<WaitForExperimentResponse> {
    while server.phase() == Phase::Building {
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    Json(WaitForExperimentResponse::default())
}

async fn init_session(
    State(server): State<Arc<Server>>,
    Json(_args): Json<InitSessionArgs>,
) -> Json<InitSessionResponse> {
    info!("received request to InitSession");

    let Some(params) = server.session_parameters() else {
        return Json(InitSessionResponse {
            error: ApiError::new("session can only be initialized when the server is ready"),
            params: None,
            stats_dataset_name: String::new(),
            stats_dataset_size: 0,
            stats_num_features: 0,
            stats_preprocessing_ms: 0,
            stats_num_server_procs: 0,
        });
    };
    let state = server.ready_state().expect("state vanished after readiness");

    Json(InitSessionResponse {
        error: ApiError::default(),
        params: Some(params),
        stats_dataset_name: state.dataset_name.clone(),
        stats_dataset_size: state.db_size,
        stats_num_features: state.stats_num_features,
        stats_preprocessing_ms: state.stats_preprocessing_ms,
        stats_num_server_procs: state.num_procs,
    })
}

async fn private_ann_query(
    State(server): State<Arc<Server>>,
    Json(args): Json<AnnQueryArgs>,
) -> Json<AnnQueryResponse> {
    info!("received request to PrivateANNQuery");
    let response = tokio::task::spawn_blocking(move || server.handle_query(&args))
        .await
        .expect("query task panicked");
    Json(response)
}

async fn terminate_session(
    State(server): State<Arc<Server>>,
    Json(_args): Json<TerminateSessionArgs>,
) -> Json<TerminateSessionResponse> {
    info!("received request to TerminateSession");
    server.terminate();
    Json(TerminateSessionResponse::default())
}
