//! The pANN client binary.
//!
//! Waits for both servers, initializes a session, runs the published test
//! query through the private ANN protocol for the requested number of
//! trials, writes the runtime measurements to a JSON file, and terminates
//! the session.

use std::time::Instant;

use clap::Parser;
use private_ann::client::Client;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "pann-client", about = "Two-server private ANN search: client")]
struct Args {
    /// Base URLs of the two servers.
    #[arg(long, num_args = 2, default_values_t = [
        "http://localhost:8000".to_string(),
        "http://localhost:8001".to_string(),
    ])]
    server_addrs: Vec<String>,

    /// Number of times to run the experiment.
    #[arg(long, default_value_t = 1)]
    trials: usize,

    /// Where to write the experiment measurements.
    #[arg(long, default_value = "output.json")]
    save_file: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let mut client = Client::new(args.server_addrs[0].clone(), args.server_addrs[1].clone());

    for trial in 0..args.trials {
        info!("waiting for servers to initialize");
        if let Err(e) = client.wait_for_experiment_start().await {
            error!("failed to reach servers: {e}");
            std::process::exit(1);
        }

        let start = Instant::now();
        if let Err(e) = client.init_session().await {
            error!("failed to initialize session: {e}");
            std::process::exit(1);
        }
        let params = client.session_params.as_ref().expect("session initialized");
        info!(
            "session initialized (sid = {}) in {:.2}s",
            params.session_id,
            start.elapsed().as_secs_f64()
        );

        let query = params.test_query.clone();
        info!(
            "querying {} buckets in {} tables",
            params.num_tables * params.num_probes,
            params.num_tables
        );

        let start = Instant::now();
        match client.private_ann_query(&query).await {
            Ok(candidate) => {
                let elapsed_ms = start.elapsed().as_millis() as u64;
                client.experiment.query_client_ms.push(elapsed_ms);
                info!("ANN query returned candidate {candidate} in {elapsed_ms} ms");
            }
            Err(e) => {
                // a failed trial is logged and skipped, not retried
                error!("trial {trial} failed: {e}");
                continue;
            }
        }
        info!("finished experiment trial {} of {}", trial + 1, args.trials);
    }

    match serde_json::to_vec_pretty(&client.experiment) {
        Ok(json) => {
            if let Err(e) = std::fs::write(&args.save_file, json) {
                error!("failed to write {}: {e}", args.save_file);
            }
        }
        Err(e) => error!("failed to serialize experiment: {e}"),
    }

    if let Err(e) = client.terminate_sessions().await {
        error!("failed to terminate sessions: {e}");
        std::process::exit(1);
    }
}
