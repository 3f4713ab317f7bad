#![warn(missing_docs)]
//! Contract energy scan engine
//!
//! Walks a block ledger backward from the chain head and keeps the contract transactions with
//! the highest recorded energy usage, in memory bounded by the number of results requested.
//!
//! Entrypoint: [`crate::scan::task::spawn_scan`]

pub mod error;
pub mod filter;
pub mod ledger;
#[allow(missing_docs)]
pub mod primitives;
pub mod report;
pub mod scan;
pub mod selector;
pub mod traits;

pub use energy_config::{OutputSink, ScanConfig};
pub use error::ScanError;
pub use scan::task::{scan_blocking, spawn_scan, CancelToken, ScanHandle};
