//! Two-server keyword PIR over a small prime field.
//!
//! This crate provides the private-retrieval layer of the ANN search
//! service:
//!
//! - [`field`] — arithmetic in F_p with p = 2³¹ − 1,
//! - [`dpf`] — a two-party distributed point function over 64-bit keywords,
//! - [`database`] — a sorted keyword database with batched range queries,
//! - [`query`] — query-share generation and share recovery.
//!
//! The intended flow: a client generates a pair of [`query::QueryShare`]s
//! for a keyword, sends one to each of two non-colluding servers, and each
//! server inner-products the expanded DPF against its (identical) database.
//! Summing the two answers mod p yields the selected slot, while neither
//! server learns which keyword was queried.

pub mod database;
pub mod dpf;
pub mod field;
pub mod query;

pub use database::{Database, DbMetadata, PirError};
pub use dpf::{Dpf, DpfKey, PrfKey};
pub use field::Fp;
pub use query::{recover, BatchQueryShare, QueryShare};
