//! The append-only page-event store and presence aggregation.
//!
//! Recording a visit is a single INSERT; answering "here vs. now" is a
//! single SELECT producing both distinct-visitor counts in one pass, so
//! query cost stays bounded regardless of table size.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use herenow_core::error::HereNowError;
use herenow_core::types::{PageVisitEvent, PresenceSnapshot};

use crate::db::Database;

/// A visit to be recorded. Identifiers are optional; missing ones are
/// generated server-side at insert time.
#[derive(Debug, Clone)]
pub struct NewVisit {
    pub domain: String,
    pub path: String,
    pub visitor_id: Option<String>,
    pub session_id: Option<String>,
    pub user_agent: String,
}

/// Append + aggregate access to the page-event log.
pub struct EventStore {
    db: Arc<Database>,
}

impl EventStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Record one visit event, stamped with the server clock.
    ///
    /// Returns the stored event, including any identifiers generated
    /// for an anonymous caller.
    pub fn record_visit(&self, visit: NewVisit) -> Result<PageVisitEvent, HereNowError> {
        let event = PageVisitEvent {
            id: Uuid::new_v4(),
            domain: visit.domain,
            path: visit.path,
            visitor_id: visit.visitor_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            session_id: visit.session_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            user_agent: visit.user_agent,
            occurred_at: Utc::now(),
        };

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO page_events (id, domain, path, visitor_id, session_id, user_agent, occurred_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    event.id.to_string(),
                    event.domain,
                    event.path,
                    event.visitor_id,
                    event.session_id,
                    event.user_agent,
                    event.occurred_at.timestamp(),
                ],
            )
            .map_err(|e| HereNowError::Storage(format!("Failed to insert event: {}", e)))?;
            Ok(())
        })?;

        Ok(event)
    }

    /// Compute the presence snapshot for one (domain, path) pair.
    ///
    /// One pass over the page's rows produces both counts: all-time
    /// distinct visitors ("here") and distinct visitors with an event
    /// at or after `now - window` ("now"). A page with no rows yields
    /// zeros, not an error.
    pub fn aggregate(
        &self,
        domain: &str,
        path: &str,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<PresenceSnapshot, HereNowError> {
        let cutoff = (now - window).timestamp();

        let (here, now_count) = self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT COUNT(DISTINCT visitor_id),
                        COUNT(DISTINCT CASE WHEN occurred_at >= ?3 THEN visitor_id END)
                 FROM page_events
                 WHERE domain = ?1 AND path = ?2",
                rusqlite::params![domain, path, cutoff],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
            )
            .map_err(|e| HereNowError::Storage(format!("Failed to aggregate presence: {}", e)))
        })?;

        Ok(PresenceSnapshot {
            domain: domain.to_string(),
            path: path.to_string(),
            here: here as u64,
            now: now_count as u64,
            computed_at: now,
        })
    }

    /// Insert an event with an explicit timestamp. Test-only: lets
    /// window-expiry scenarios backdate activity instead of sleeping.
    #[doc(hidden)]
    pub fn record_visit_at(
        &self,
        domain: &str,
        path: &str,
        visitor_id: &str,
        occurred_at: DateTime<Utc>,
    ) -> Result<(), HereNowError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO page_events (id, domain, path, visitor_id, session_id, occurred_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    Uuid::new_v4().to_string(),
                    domain,
                    path,
                    visitor_id,
                    Uuid::new_v4().to_string(),
                    occurred_at.timestamp(),
                ],
            )
            .map_err(|e| HereNowError::Storage(format!("Failed to insert event: {}", e)))?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_store() -> EventStore {
        EventStore::new(Arc::new(Database::in_memory().unwrap()))
    }

    fn visit(domain: &str, path: &str, visitor: &str) -> NewVisit {
        NewVisit {
            domain: domain.to_string(),
            path: path.to_string(),
            visitor_id: Some(visitor.to_string()),
            session_id: Some("sess".to_string()),
            user_agent: String::new(),
        }
    }

    const WINDOW: i64 = 300;

    #[test]
    fn test_unseen_page_yields_zeros() {
        let store = make_store();
        let snap = store
            .aggregate("example.com", "/", Utc::now(), Duration::seconds(WINDOW))
            .unwrap();
        assert_eq!(snap.here, 0);
        assert_eq!(snap.now, 0);
        assert_eq!(snap.domain, "example.com");
        assert_eq!(snap.path, "/");
    }

    #[test]
    fn test_distinct_visitors_counted_once() {
        let store = make_store();
        store.record_visit(visit("example.com", "/", "u1")).unwrap();
        store.record_visit(visit("example.com", "/", "u1")).unwrap();
        store.record_visit(visit("example.com", "/", "u2")).unwrap();

        let snap = store
            .aggregate("example.com", "/", Utc::now(), Duration::seconds(WINDOW))
            .unwrap();
        assert_eq!(snap.here, 2);
        assert_eq!(snap.now, 2);
    }

    #[test]
    fn test_now_excludes_visitors_outside_window() {
        let store = make_store();
        let now = Utc::now();

        // u1 was active 10 minutes ago, u2 just now.
        store
            .record_visit_at("example.com", "/", "u1", now - Duration::seconds(600))
            .unwrap();
        store.record_visit(visit("example.com", "/", "u2")).unwrap();

        let snap = store
            .aggregate("example.com", "/", now, Duration::seconds(WINDOW))
            .unwrap();
        assert_eq!(snap.here, 2);
        assert_eq!(snap.now, 1);
    }

    #[test]
    fn test_now_zero_after_everyone_went_quiet() {
        let store = make_store();
        let now = Utc::now();
        for v in ["u1", "u2"] {
            store
                .record_visit_at("example.com", "/", v, now - Duration::seconds(WINDOW + 1))
                .unwrap();
        }

        let snap = store
            .aggregate("example.com", "/", now, Duration::seconds(WINDOW))
            .unwrap();
        assert_eq!(snap.here, 2);
        assert_eq!(snap.now, 0);
    }

    #[test]
    fn test_window_boundary_is_inclusive() {
        let store = make_store();
        let now = Utc::now();
        store
            .record_visit_at("example.com", "/", "u1", now - Duration::seconds(WINDOW))
            .unwrap();

        let snap = store
            .aggregate("example.com", "/", now, Duration::seconds(WINDOW))
            .unwrap();
        assert_eq!(snap.now, 1);
    }

    #[test]
    fn test_pages_are_isolated() {
        let store = make_store();
        store.record_visit(visit("example.com", "/", "u1")).unwrap();
        store
            .record_visit(visit("example.com", "/blog", "u2"))
            .unwrap();
        store.record_visit(visit("other.com", "/", "u3")).unwrap();

        let snap = store
            .aggregate("example.com", "/", Utc::now(), Duration::seconds(WINDOW))
            .unwrap();
        assert_eq!(snap.here, 1);
    }

    #[test]
    fn test_monotonicity_distinct_new_visitors() {
        let store = make_store();
        store.record_visit(visit("example.com", "/", "u1")).unwrap();

        let before = store
            .aggregate("example.com", "/", Utc::now(), Duration::seconds(WINDOW))
            .unwrap();

        for v in ["u2", "u3", "u4"] {
            store.record_visit(visit("example.com", "/", v)).unwrap();
        }

        let after = store
            .aggregate("example.com", "/", Utc::now(), Duration::seconds(WINDOW))
            .unwrap();
        assert_eq!(after.here, before.here + 3);
        assert_eq!(after.now, before.now + 3);
    }

    #[test]
    fn test_now_never_exceeds_here() {
        let store = make_store();
        let now = Utc::now();
        // A mix of fresh and stale activity, including repeat visitors.
        store.record_visit(visit("example.com", "/", "u1")).unwrap();
        store
            .record_visit_at("example.com", "/", "u1", now - Duration::seconds(900))
            .unwrap();
        store
            .record_visit_at("example.com", "/", "u2", now - Duration::seconds(900))
            .unwrap();
        store.record_visit(visit("example.com", "/", "u3")).unwrap();

        let snap = store
            .aggregate("example.com", "/", now, Duration::seconds(WINDOW))
            .unwrap();
        assert!(snap.now <= snap.here);
        assert_eq!(snap.here, 3);
        assert_eq!(snap.now, 2);
    }

    #[test]
    fn test_generated_ids_when_absent() {
        let store = make_store();
        let event = store
            .record_visit(NewVisit {
                domain: "example.com".to_string(),
                path: "/".to_string(),
                visitor_id: None,
                session_id: None,
                user_agent: "curl/8.0".to_string(),
            })
            .unwrap();

        assert!(!event.visitor_id.is_empty());
        assert!(!event.session_id.is_empty());
        assert_ne!(event.visitor_id, event.session_id);
    }
}
