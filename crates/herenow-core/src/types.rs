use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single page-visit event, append-only once written.
///
/// `occurred_at` is the server clock at ingestion time, never the
/// client's. Events are only inserted and aggregated; there is no
/// update or delete path anywhere in the system.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageVisitEvent {
    pub id: Uuid,
    /// Canonical host of the tracked site.
    pub domain: String,
    /// Page path within the domain.
    pub path: String,
    /// Stable per-browser identifier, persisted client-side across sessions.
    pub visitor_id: String,
    /// Identifier scoped to one browser session.
    pub session_id: String,
    /// Requesting User-Agent header, empty when absent.
    pub user_agent: String,
    pub occurred_at: DateTime<Utc>,
}

/// A computed (here, now) result for one (domain, path) at a point in time.
///
/// `now <= here` always: every visitor counted in the activity window
/// also appears in the all-time distinct set. Snapshots are superseded
/// by the next computation, never mutated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceSnapshot {
    pub domain: String,
    pub path: String,
    /// Distinct visitors ever recorded for this page.
    pub here: u64,
    /// Distinct visitors active within the trailing activity window.
    pub now: u64,
    pub computed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_serializes_counts_as_numbers() {
        let snap = PresenceSnapshot {
            domain: "example.com".to_string(),
            path: "/".to_string(),
            here: 7,
            now: 2,
            computed_at: Utc::now(),
        };
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["here"], 7);
        assert_eq!(json["now"], 2);
        assert_eq!(json["domain"], "example.com");
    }

    #[test]
    fn test_event_roundtrip() {
        let event = PageVisitEvent {
            id: Uuid::new_v4(),
            domain: "example.com".to_string(),
            path: "/blog".to_string(),
            visitor_id: "v1".to_string(),
            session_id: "s1".to_string(),
            user_agent: "Mozilla/5.0".to_string(),
            occurred_at: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: PageVisitEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
