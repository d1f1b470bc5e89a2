/// Unread evaluation — a pure function over a summary entry and the
/// viewer's read marker. No internal state; callers reevaluate on every
/// cache refresh and marker update.
use crate::summary::SummaryEntry;
use chrono::{DateTime, Utc};

/// True iff the conversation has a last message, it was not sent by the
/// viewer, and it is strictly newer than the read marker. A missing marker
/// counts as the epoch, so everything is unread until first open.
pub fn is_unread(
    entry: &SummaryEntry,
    marker: Option<DateTime<Utc>>,
    viewer_id: &str,
) -> bool {
    let Some(last_ts) = entry.last_timestamp else {
        return false;
    };
    let Some(sender) = entry.last_sender.as_deref() else {
        return false;
    };
    if sender == viewer_id {
        return false;
    }
    last_ts > marker.unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::parse_ts;

    fn entry(sender: Option<&str>, ts: Option<&str>) -> SummaryEntry {
        SummaryEntry {
            conversation_id: "c1".to_string(),
            last_sender: sender.map(|s| s.to_string()),
            last_timestamp: ts.and_then(parse_ts),
            updated_at: None,
        }
    }

    #[test]
    fn test_unread_with_no_marker() {
        let e = entry(Some("u2"), Some("2024-05-01T12:00:00Z"));
        assert!(is_unread(&e, None, "viewer"));
    }

    #[test]
    fn test_own_message_is_read() {
        let e = entry(Some("viewer"), Some("2024-05-01T12:00:00Z"));
        assert!(!is_unread(&e, None, "viewer"));
    }

    #[test]
    fn test_no_last_message_is_read() {
        assert!(!is_unread(&entry(None, Some("2024-05-01T12:00:00Z")), None, "viewer"));
        assert!(!is_unread(&entry(Some("u2"), None), None, "viewer"));
    }

    #[test]
    fn test_marker_boundary_is_strict() {
        let ts = parse_ts("2024-05-01T12:00:00Z");
        let e = entry(Some("u2"), Some("2024-05-01T12:00:00Z"));

        // Marker exactly at the last message: read
        assert!(!is_unread(&e, ts, "viewer"));
        // Marker after: read
        assert!(!is_unread(&e, parse_ts("2024-05-01T12:00:01Z"), "viewer"));
        // Marker before: unread again
        assert!(is_unread(&e, parse_ts("2024-05-01T11:59:59Z"), "viewer"));
    }

    #[test]
    fn test_new_message_after_read() {
        let marker = parse_ts("2024-05-01T12:00:00Z");
        let newer = entry(Some("u2"), Some("2024-05-01T12:05:00Z"));
        assert!(is_unread(&newer, marker, "viewer"));
    }
}
