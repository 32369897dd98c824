//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

/// Success - operation completed without errors
#[allow(dead_code)]
pub const SUCCESS: i32 = 0;

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Input error - malformed manifest or tracking key
pub const INPUT_ERROR: i32 = 2;

/// Configuration error - unreadable or invalid config file
pub const CONFIG_ERROR: i32 = 3;

/// Not found - the object does not exist on the cluster
pub const NOT_FOUND: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;

/// Conflict - the object exists already or was modified concurrently
pub const CONFLICT: i32 = 6;

/// Timeout - the object did not reach the awaited state in time
pub const TIMEOUT: i32 = 7;

/// Cluster error - API server unreachable or rejected the request
pub const CLUSTER_ERROR: i32 = 8;
