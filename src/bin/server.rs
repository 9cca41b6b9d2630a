//! The pANN server binary.
//!
//! Builds (or loads from cache) the LSH hash tables, wraps them in PIR
//! databases, and serves the RPC surface until the client terminates the
//! session. Run one instance with `--server-id 0` and one with
//! `--server-id 1`; both must receive the same seed so their indexes are
//! bit-identical.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use pir::Database;
use private_ann::ann::cache::{self, CachedHashTable};
use private_ann::ann::{compute_bucket_divisions, compute_hashes, dataset, radii};
use private_ann::error::Error;
use private_ann::hash::LshFunction;
use private_ann::server::{router, Server, ServerState};
use private_ann::vector::Vector;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rand_distr::StandardNormal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

#[derive(Parser, Clone, Debug)]
#[command(name = "pann-server", about = "Two-server private ANN search: server")]
struct Args {
    /// 0 for server A, 1 for server B.
    #[arg(long, default_value_t = 0)]
    server_id: usize,

    /// Dataset path prefix (expects <dataset>_train.csv etc.), or
    /// "synthetic" to generate random vectors.
    #[arg(long, default_value = "synthetic")]
    dataset: String,

    /// Directory holding pre-built hash-table caches.
    #[arg(long, default_value = "cache")]
    cache_dir: String,

    #[arg(long, default_value_t = 10)]
    num_tables: usize,

    /// Probes per table; also the number of PBR partitions.
    #[arg(long, default_value_t = 100)]
    num_probes: usize,

    /// Range of the universal hash output, in bits.
    #[arg(long, default_value_t = 64)]
    hash_function_range: usize,

    #[arg(long, default_value_t = 887.7)]
    projection_width_mean: f64,

    #[arg(long, default_value_t = 244.9)]
    projection_width_stddev: f64,

    /// Bound on the random translation applied by each hash.
    #[arg(long, default_value_t = 1000.0)]
    max_coordinate_value: f64,

    /// Number of Leech lattice copies in the product hash.
    #[arg(long, default_value_t = 2)]
    lattice_copies: usize,

    /// Rows kept per hash bucket; only 1 is supported.
    #[arg(long, default_value_t = 1)]
    bucket_size: usize,

    /// Shared PRNG seed; must match on both servers.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Listen port; defaults to 8000 + server id.
    #[arg(long)]
    port: Option<u16>,

    /// Synthetic dataset only: number of vectors.
    #[arg(long, default_value_t = 10000)]
    dataset_size: usize,

    /// Synthetic dataset only: vector dimension.
    #[arg(long, default_value_t = 50)]
    num_features: usize,
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
    info!("starting server with args: {args:?}");

    if args.bucket_size == 0 {
        error!("bucket size must be at least 1");
        std::process::exit(1);
    }
    if args.bucket_size != 1 {
        error!("bucket size {} not implemented", args.bucket_size);
        std::process::exit(1);
    }
    if args.num_tables == 0 || args.num_probes == 0 {
        error!("need at least one table and one probe");
        std::process::exit(1);
    }

    let port = args.port.unwrap_or(8000 + args.server_id as u16);

    // The masking multipliers must be common to both servers but distinct
    // from the build randomness.
    let mut mask_seed = [0u8; 32];
    mask_seed[..8].copy_from_slice(&args.seed.to_le_bytes());
    mask_seed[8] = b'm';

    let server = Arc::new(Server::new(mask_seed));

    // build in the background so WaitForExperiment can poll readiness
    let build_server = server.clone();
    let build_args = args.clone();
    tokio::task::spawn_blocking(move || match build_index(&build_args) {
        Ok(state) => {
            info!(
                "server is ready: {} tables over {} rows",
                state.num_tables, state.db_size
            );
            build_server.install(state);
        }
        Err(e) => {
            error!("failed to build index: {e}");
            std::process::exit(1);
        }
    });

    let listener = match tokio::net::TcpListener::bind(("0.0.0.0", port)).await {
        Ok(l) => l,
        Err(e) => {
            error!("listen error: {e}");
            std::process::exit(1);
        }
    };
    info!("waiting for clients on port {port}");

    let app = router(server.clone())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let shutdown_server = server.clone();
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_server.shutdown.notified().await;
        })
        .await
    {
        error!("serve error: {e}");
        std::process::exit(1);
    }
    info!("session terminated, listener closed");
}

/// Load the hash tables from cache if present, otherwise hash the dataset
/// and write the cache; then wrap every table in a partitioned PIR
/// database.
fn build_index(args: &Args) -> Result<ServerState, Error> {
    let start = Instant::now();

    // ========================================================================
    // IMPORTANT: index construction must be bit-identical on both servers,
    // so everything random below draws from this one seeded generator in a
    // fixed order. Per-query randomness never touches it.
    // ========================================================================
    let mut rng = ChaCha20Rng::seed_from_u64(args.seed);

    let dataset_name = Path::new(&args.dataset)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| args.dataset.clone());

    let table0_path = cache::cached_table_path(&args.cache_dir, &dataset_name, args.num_tables, 0);
    let have_cache = table0_path.exists();

    let (training_data, test_query, mut cached_tables): (Vec<Vector>, Vector, Vec<CachedHashTable>) =
        if have_cache {
            let mut tables = Vec::with_capacity(args.num_tables);
            for i in 0..args.num_tables {
                let path =
                    cache::cached_table_path(&args.cache_dir, &dataset_name, args.num_tables, i);
                tables.push(cache::read_cached_table(&path)?);
                info!("loaded cached table {}", path.display());
            }
            let test_query = Vector::new(tables[0].test_query.clone());
            (Vec::new(), test_query, tables)
        } else if args.dataset == "synthetic" {
            info!(
                "generating synthetic dataset: {} vectors of dimension {}",
                args.dataset_size, args.num_features
            );
            let train: Vec<Vector> = (0..args.dataset_size)
                .map(|_| {
                    Vector::new(
                        (0..args.num_features)
                            .map(|_| {
                                let g: f64 = rng.sample(StandardNormal);
                                g * args.max_coordinate_value / 10.0
                            })
                            .collect(),
                    )
                })
                .collect();
            let test_query = train[0].clone();
            (train, test_query, Vec::new())
        } else {
            info!("loading dataset {}", args.dataset);
            let (train, test, _neighbors) = dataset::read_dataset(&args.dataset)?;
            if train.is_empty() || test.is_empty() {
                return Err(Error::Config(format!("dataset {} is empty", args.dataset)));
            }
            let test_query = test[0].clone();
            (train, test_query, Vec::new())
        };

    let (input_dim, db_size) = if have_cache {
        (cached_tables[0].dimension, cached_tables[0].n)
    } else {
        (training_data[0].size(), training_data.len())
    };

    // radii and hash functions are derived from the seed, never cached
    let radii = radii::normal_sequence2(
        args.projection_width_mean,
        args.projection_width_stddev,
        args.num_tables,
        &mut rng,
    );
    let hash_functions: Vec<LshFunction> = radii
        .iter()
        .map(|&radius| {
            LshFunction::new_multi_lattice(
                input_dim,
                args.lattice_copies,
                radius,
                args.max_coordinate_value,
                &mut rng,
            )
        })
        .collect();

    if !have_cache {
        info!("building ANN data structure for {db_size} items");
        std::fs::create_dir_all(&args.cache_dir)?;
        for (i, hash_function) in hash_functions.iter().enumerate() {
            let (keys, values) = compute_hashes(i, hash_function, &training_data, &mut rng);
            let table = CachedHashTable {
                dimension: input_dim,
                n: db_size,
                test_query: test_query.coords.clone(),
                keys,
                values,
            };
            let path = cache::cached_table_path(&args.cache_dir, &dataset_name, args.num_tables, i);
            cache::write_cached_table(&path, &table)?;
            info!("cached table {} to {}", i, path.display());
            cached_tables.push(table);
        }
    }

    // per-table: sort by key, partition by range, wrap in a PIR database
    let mut table_dbs = Vec::with_capacity(args.num_tables);
    for table in cached_tables {
        let mut keys = table.keys;
        let mut values = table.values;
        let (starts, stops) = compute_bucket_divisions(args.num_probes, &mut keys, &mut values);
        let mut db = Database::build_for_keys_and_values(keys, values)?;
        db.set_batching_parameters(starts, stops)?;
        table_dbs.push(db);
    }

    Ok(ServerState {
        dataset_name,
        db_size,
        table_dbs,
        num_tables: args.num_tables,
        num_probes: args.num_probes,
        test_query,
        hash_functions,
        hash_function_range: args.hash_function_range,
        num_procs: num_cpus::get(),
        stats_preprocessing_ms: start.elapsed().as_millis() as u64,
        stats_num_features: input_dim,
    })
}
