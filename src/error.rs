//! Error types for the ANN service.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse dataset value: {0}")]
    Parse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("RPC request failed: {0}")]
    Rpc(#[from] reqwest::Error),

    #[error("server error: {0}")]
    Server(String),

    #[error(transparent)]
    Pir(#[from] pir::PirError),
}
