//! Two-server private approximate nearest neighbor (pANN) search.
//!
//! A client holding a query vector learns the identifier of a nearby
//! dataset point; neither server learns which point — or even which hash
//! bucket — the client asked about. Three subsystems cooperate:
//!
//! 1. An LSH index over a static dataset, quantized by the 24-dimensional
//!    Leech lattice (or a direct product of Leech lattices), replicated
//!    bit-identically on both servers ([`hash`], [`ann`]).
//! 2. A private-retrieval layer built from a two-party distributed point
//!    function (the [`pir`] crate).
//! 3. A probe-set and candidate-aggregation protocol that packs the
//!    multi-probes of every table into partition-by-range slots, retrieves
//!    each slot privately, and obliviously collapses the candidate stream
//!    to a single survivor ([`client`], [`server`]).
//!
//! The security model assumes two non-colluding honest-but-curious servers
//! that share a pseudorandom seed for index construction. Nearest-neighbor
//! answers are approximate by design.

pub mod ann;
pub mod api;
pub mod client;
pub mod error;
pub mod hash;
pub mod server;
pub mod vector;

pub use error::Error;
pub use vector::Vector;
