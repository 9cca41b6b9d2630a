//! Full service round trip over HTTP: two axum servers on ephemeral ports,
//! one client driving the published RPC surface.

use std::sync::Arc;

use pir::Database;
use private_ann::ann::{compute_bucket_divisions, compute_hashes};
use private_ann::client::Client;
use private_ann::hash::LshFunction;
use private_ann::server::{router, Server, ServerState};
use private_ann::vector::Vector;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

const NUM_TABLES: usize = 2;
const NUM_PROBES: usize = 2;

fn dataset() -> Vec<Vector> {
    (0..50)
        .map(|i| Vector::new(vec![i as f64 * 2000.0, i as f64 * 1000.0 + 5.0]))
        .collect()
}

fn build_state(seed: u64, data: &[Vector]) -> ServerState {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let hash_functions: Vec<LshFunction> = (0..NUM_TABLES)
        .map(|i| LshFunction::new_multi_lattice(2, 2, 1.0 + 0.5 * i as f64, 10.0, &mut rng))
        .collect();

    let mut table_dbs = Vec::with_capacity(NUM_TABLES);
    for (i, hash_function) in hash_functions.iter().enumerate() {
        let (mut keys, mut values) = compute_hashes(i, hash_function, data, &mut rng);
        let (starts, stops) = compute_bucket_divisions(NUM_PROBES, &mut keys, &mut values);
        let mut db = Database::build_for_keys_and_values(keys, values).unwrap();
        db.set_batching_parameters(starts, stops).unwrap();
        table_dbs.push(db);
    }

    ServerState {
        dataset_name: "toy".into(),
        db_size: data.len(),
        table_dbs,
        num_tables: NUM_TABLES,
        num_probes: NUM_PROBES,
        test_query: data[17].clone(),
        hash_functions,
        hash_function_range: 64,
        num_procs: 1,
        stats_preprocessing_ms: 0,
        stats_num_features: 2,
    }
}

async fn spawn_server(state: ServerState) -> String {
    let server = Arc::new(Server::new([5u8; 32]));
    server.install(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(server.clone());
    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                server.shutdown.notified().await;
            })
            .await
            .unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_service_round_trip() {
    let data = dataset();
    // each server builds its own index from the shared seed
    let addr_a = spawn_server(build_state(3, &data)).await;
    let addr_b = spawn_server(build_state(3, &data)).await;

    let mut client = Client::new(addr_a, addr_b);
    client.wait_for_experiment_start().await.unwrap();
    client.init_session().await.unwrap();

    let params = client.session_params.as_ref().unwrap();
    assert_eq!(params.session_id, 0);
    assert_eq!(params.num_tables, NUM_TABLES);
    assert_eq!(params.num_probes, NUM_PROBES);
    assert_eq!(params.hash_functions.len(), NUM_TABLES);
    assert_eq!(params.table_bucket_metadata.len(), NUM_TABLES);
    assert_eq!(client.experiment.dataset_name, "toy");
    assert_eq!(client.experiment.dataset_size, 50);

    // the published test query is dataset point 17
    let query = params.test_query.clone();
    let candidate = client.private_ann_query(&query).await.unwrap();
    assert_eq!(candidate, 17);

    // a second query keeps the servers' masking streams aligned
    let candidate = client.private_ann_query(&query).await.unwrap();
    assert_eq!(candidate, 17);

    assert_eq!(client.experiment.query_server_ms.len(), 2);
    assert_eq!(client.experiment.query_up_bandwidth_bytes.len(), 2);

    client.terminate_sessions().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_query_against_unready_server_is_an_error() {
    let server = Arc::new(Server::new([0u8; 32]));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = format!("http://{}", listener.local_addr().unwrap());
    let app = router(server.clone());
    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                server.shutdown.notified().await;
            })
            .await
            .unwrap();
    });

    // init against a still-building server reports an error message
    let mut client = Client::new(addr.clone(), addr);
    let err = client.init_session().await.unwrap_err();
    assert!(err.to_string().contains("ready"));
}
