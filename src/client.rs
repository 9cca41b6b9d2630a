//! Client side of the protocol: session setup, probe construction, and the
//! two-server query round.
//!
//! A query proceeds in three steps: compute the multi-probes for every
//! table and pack them into partition slots, generate one DPF share pair
//! per slot, then send one batch to each server concurrently. Summing the
//! servers' masked answers slot by slot and scanning for the first non-zero
//! value yields the candidate identifier.

use pir::{field, query::recover, BatchQueryShare, Fp};
use serde::de::DeserializeOwned;
use serde::{Serialize, Deserialize};
use tracing::info;

use crate::ann::compute_probes;
use crate::api::{
    AnnQueryArgs, AnnQueryResponse, InitSessionArgs, InitSessionResponse, SessionParameters,
    TerminateSessionArgs, TerminateSessionResponse, WaitForExperimentArgs,
    WaitForExperimentResponse,
};
use crate::error::Error;
use crate::vector::Vector;

/// Index of the first server.
pub const SERVER_A: usize = 0;
/// Index of the second server.
pub const SERVER_B: usize = 1;

/// Timing and bandwidth measurements for a two-server deployment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RuntimeExperiment {
    pub dataset_name: String,
    pub dataset_size: usize,
    pub num_features: usize,
    pub num_tables: usize,
    pub num_probes: usize,
    pub hash_function_range: usize,
    pub num_server_procs: usize,
    pub server_preprocessing_ms: u64,
    pub query_up_bandwidth_bytes: Vec<u64>,
    pub query_down_bandwidth_bytes: Vec<u64>,
    #[serde(rename = "dpf_server_ms")]
    pub query_server_ms: Vec<u64>,
    #[serde(rename = "masking_server_us")]
    pub query_masking_server_us: Vec<u64>,
    pub query_client_ms: Vec<u64>,
}

pub struct Client {
    addresses: [String; 2],
    http: reqwest::Client,

    pub session_params: Option<SessionParameters>,
    pub experiment: RuntimeExperiment,
}

impl Client {
    /// `server_a` and `server_b` are base URLs, e.g. `http://10.0.0.1:8000`.
    pub fn new(server_a: impl Into<String>, server_b: impl Into<String>) -> Self {
        Client {
            addresses: [server_a.into(), server_b.into()],
            http: reqwest::Client::new(),
            session_params: None,
            experiment: RuntimeExperiment::default(),
        }
    }

    async fn call<A, R>(&self, server: usize, path: &str, args: &A) -> Result<R, Error>
    where
        A: Serialize,
        R: DeserializeOwned,
    {
        let url = format!("{}/{}", self.addresses[server], path);
        let response = self.http.post(url).json(args).send().await?;
        Ok(response.json::<R>().await?)
    }

    /// Block until both servers report readiness.
    pub async fn wait_for_experiment_start(&self) -> Result<(), Error> {
        let args = WaitForExperimentArgs::default();
        let a = self.call::<_, WaitForExperimentResponse>(SERVER_A, "wait", &args);
        let b = self.call::<_, WaitForExperimentResponse>(SERVER_B, "wait", &args);
        tokio::try_join!(a, b)?;
        Ok(())
    }

    /// Fetch the published session parameters from server A.
    pub async fn init_session(&mut self) -> Result<(), Error> {
        let response: InitSessionResponse = self
            .call(SERVER_A, "init", &InitSessionArgs::default())
            .await?;
        if !response.error.is_empty() {
            return Err(Error::Server(response.error.msg));
        }
        let params = response
            .params
            .ok_or_else(|| Error::Server("init response carried no parameters".into()))?;

        self.experiment.num_tables = params.num_tables;
        self.experiment.num_probes = params.num_probes;
        self.experiment.hash_function_range = params.hash_function_range;
        self.experiment.dataset_name = response.stats_dataset_name;
        self.experiment.dataset_size = response.stats_dataset_size;
        self.experiment.num_features = response.stats_num_features;
        self.experiment.num_server_procs = response.stats_num_server_procs;
        self.experiment.server_preprocessing_ms = response.stats_preprocessing_ms;

        self.session_params = Some(params);
        Ok(())
    }

    /// Privately retrieve the identifier of a dataset point colliding with
    /// `query` in some table. Returns 0 when no table yields a collision;
    /// an empty result is a normal outcome, not an error.
    pub async fn private_ann_query(&mut self, query: &Vector) -> Result<u32, Error> {
        let params = self
            .session_params
            .as_ref()
            .ok_or_else(|| Error::Config("no active session".into()))?;
        let num_tables = params.num_tables;
        let num_probes = params.num_probes;
        let mut rng = rand::rng();

        // one batch per table, one DPF share pair per partition slot;
        // the number of partitions equals the number of probes
        let mut batches_a = Vec::with_capacity(num_tables);
        let mut batches_b = Vec::with_capacity(num_tables);
        for table in 0..num_tables {
            let probes = compute_probes(
                &params.hash_functions[table],
                query,
                num_probes,
                num_probes,
            );
            let metadata = params.table_bucket_metadata[table];
            let mut queries_a = Vec::with_capacity(num_probes);
            let mut queries_b = Vec::with_capacity(num_probes);
            for &probe in &probes {
                let [share_a, share_b] = metadata.new_keyword_query_shares(
                    probe,
                    params.hash_function_range,
                    &mut rng,
                );
                queries_a.push(share_a);
                queries_b.push(share_b);
            }
            batches_a.push(BatchQueryShare { queries: queries_a });
            batches_b.push(BatchQueryShare { queries: queries_b });
        }

        let args_a = AnnQueryArgs {
            session_id: params.session_id,
            secret_shared: batches_a,
        };
        let args_b = AnnQueryArgs {
            session_id: params.session_id,
            secret_shared: batches_b,
        };
        let upload_bytes =
            (serde_json::to_vec(&args_a)?.len() + serde_json::to_vec(&args_b)?.len()) as u64;

        // query both servers in parallel
        let (res_a, res_b) = tokio::try_join!(
            self.call::<_, AnnQueryResponse>(SERVER_A, "query", &args_a),
            self.call::<_, AnnQueryResponse>(SERVER_B, "query", &args_b),
        )?;
        for res in [&res_a, &res_b] {
            if !res.error.is_empty() {
                return Err(Error::Server(res.error.msg.clone()));
            }
        }
        if res_a.res_secret_shared.len() != res_b.res_secret_shared.len() {
            return Err(Error::Server("servers returned mismatched slot counts".into()));
        }

        let download_bytes =
            (serde_json::to_vec(&res_a)?.len() + serde_json::to_vec(&res_b)?.len()) as u64;
        self.experiment.query_up_bandwidth_bytes.push(upload_bytes);
        self.experiment
            .query_down_bandwidth_bytes
            .push(download_bytes);
        self.experiment.query_server_ms.push(res_a.stats_query_ms);
        self.experiment
            .query_masking_server_us
            .push(res_a.stats_masking_us);

        Ok(first_candidate(
            &res_a.res_secret_shared,
            &res_b.res_secret_shared,
        ))
    }

    /// End the session on both servers.
    pub async fn terminate_sessions(&self) -> Result<(), Error> {
        let args = TerminateSessionArgs::default();
        let a = self.call::<_, TerminateSessionResponse>(SERVER_A, "terminate", &args);
        let b = self.call::<_, TerminateSessionResponse>(SERVER_B, "terminate", &args);
        tokio::try_join!(a, b)?;
        info!("terminated sessions on both servers");
        Ok(())
    }
}

/// Reconstruct each slot and return the first non-zero value; the masking
/// guarantees every later slot is uniform noise.
pub fn first_candidate(shares_a: &[Fp], shares_b: &[Fp]) -> u32 {
    for (&a, &b) in shares_a.iter().zip(shares_b) {
        let value = recover(&[a, b]);
        if value != 0 {
            return value as u32;
        }
    }
    0
}
