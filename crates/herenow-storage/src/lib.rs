//! here/now storage crate - SQLite persistence for the page-event log.
//!
//! Provides a WAL-mode SQLite database with migrations and the event
//! store: append-only visit inserts plus the single-pass presence
//! aggregation that backs the stats endpoint.

pub mod db;
pub mod events;
pub mod migrations;

pub use db::Database;
pub use events::{EventStore, NewVisit};
