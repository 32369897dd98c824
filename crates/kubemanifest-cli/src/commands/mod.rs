//! CLI commands
//!
//! Each command performs one reconciliation call. Inputs are checked before
//! connecting to the cluster.

pub mod create;
pub mod delete;
pub mod diff;
pub mod import;
pub mod read;
pub mod update;
