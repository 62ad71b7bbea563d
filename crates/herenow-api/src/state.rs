//! Application state shared across all route handlers.
//!
//! All fields use `Arc` for cheap cloning across handler tasks. The
//! configuration is immutable for the process lifetime (no runtime
//! config endpoint), so no lock is needed around it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use herenow_core::config::HereNowConfig;
use herenow_core::domains::DomainAllowlist;
use herenow_storage::{Database, EventStore};

use crate::cache::StatsCache;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<HereNowConfig>,
    /// Domain allowlist derived from the configuration.
    pub allowlist: Arc<DomainAllowlist>,
    /// SQLite database holding the event log.
    pub database: Arc<Database>,
    /// Append + aggregate access to the page-event log.
    pub events: Arc<EventStore>,
    /// TTL-bounded snapshot cache in front of the aggregation.
    pub cache: Arc<StatsCache>,
    /// Server start time for uptime reporting.
    pub start_time: Instant,
}

impl AppState {
    /// Create a new AppState around an opened database.
    pub fn new(config: HereNowConfig, database: Database) -> Self {
        let allowlist = config.allowlist();
        let cache = StatsCache::new(
            Duration::from_secs(config.cache.ttl_secs),
            config.cache.max_entries,
        );
        let database = Arc::new(database);
        Self {
            config: Arc::new(config),
            allowlist: Arc::new(allowlist),
            events: Arc::new(EventStore::new(Arc::clone(&database))),
            database,
            cache: Arc::new(cache),
            start_time: Instant::now(),
        }
    }
}
