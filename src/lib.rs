//! Rekordbox playlist reconciliation - shared modules for all binaries.

pub mod config;
pub mod cue_sync;
pub mod db;
pub mod error;
pub mod markers;
pub mod matcher;
pub mod models;
pub mod normalize;
pub mod paths;
pub mod progress;
pub mod reconcile;
pub mod record;
pub mod reorder;
pub mod safety;
pub mod set_length;
pub mod store;
