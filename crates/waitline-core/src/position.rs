//! # Queue Position
//!
//! Position and wait estimates for the pull-based `status` view.
//!
//! ## Rule
//! ```text
//! position(E) = |{ W : W.state = waiting
//!                   ∧ W in the same queue and movement date as E
//!                   ∧ (W.entered_at, W.seq) < (E.entered_at, E.seq) }|
//! ```
//! `seq` is the store's insertion order and only matters when two entries
//! share the same `entered_at`.

use crate::types::{EntryState, QueueEntry};

/// Counts still-waiting entries that entered before `entry`.
///
/// `candidates` may contain anything (including `entry` itself); entries from
/// other queue instances or in other states are ignored. Always `>= 0`.
pub fn position_of(entry: &QueueEntry, candidates: &[QueueEntry]) -> u32 {
    let ahead = candidates
        .iter()
        .filter(|other| other.id != entry.id)
        .filter(|other| other.state == EntryState::Waiting)
        .filter(|other| {
            other.company_id == entry.company_id
                && other.queue_id == entry.queue_id
                && other.movement_date == entry.movement_date
        })
        .filter(|other| (other.entered_at, other.seq) < (entry.entered_at, entry.seq))
        .count();

    u32::try_from(ahead).unwrap_or(u32::MAX)
}

/// Estimated minutes until `position` entries ahead have been served.
pub fn estimated_wait_minutes(position: u32, average_service_minutes: i64) -> u32 {
    let per_entry = u32::try_from(average_service_minutes.max(0)).unwrap_or(u32::MAX);
    position.saturating_mul(per_entry)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn entry(id: &str, seq: i64, minute: i64, state: EntryState) -> QueueEntry {
        let base = Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap();
        QueueEntry {
            id: id.into(),
            seq,
            company_id: "acme".into(),
            queue_id: "front-desk".into(),
            movement_date: base.date_naive(),
            customer_id: format!("customer-{id}"),
            display_name: id.to_uppercase(),
            phone: None,
            email: None,
            preferred_channel: None,
            party_size: 1,
            state,
            entered_at: base + Duration::minutes(minute),
            called_at: None,
            confirmed_at: None,
            attended_at: None,
            left_at: None,
            call_tolerance_minutes: None,
        }
    }

    #[test]
    fn test_first_in_line_is_zero() {
        let a = entry("a", 1, 0, EntryState::Waiting);
        assert_eq!(position_of(&a, &[a.clone()]), 0);
        assert_eq!(position_of(&a, &[]), 0);
    }

    #[test]
    fn test_only_earlier_waiting_entries_count() {
        let entries = vec![
            entry("a", 1, 0, EntryState::Waiting),
            entry("b", 2, 1, EntryState::Called),
            entry("c", 3, 2, EntryState::Removed),
            entry("d", 4, 3, EntryState::Waiting),
            entry("e", 5, 4, EntryState::Waiting),
            entry("f", 6, 5, EntryState::Waiting),
        ];

        assert_eq!(position_of(&entries[4], &entries), 2);
        assert_eq!(position_of(&entries[5], &entries), 3);
        // A called entry still reports the waiting entries ahead of it.
        assert_eq!(position_of(&entries[1], &entries), 1);
    }

    #[test]
    fn test_ties_broken_by_sequence() {
        let a = entry("a", 7, 0, EntryState::Waiting);
        let b = entry("b", 8, 0, EntryState::Waiting);
        let all = vec![a.clone(), b.clone()];
        assert_eq!(position_of(&a, &all), 0);
        assert_eq!(position_of(&b, &all), 1);
    }

    #[test]
    fn test_other_queue_instances_ignored() {
        let me = entry("me", 10, 30, EntryState::Waiting);
        let mut other_queue = entry("x", 1, 0, EntryState::Waiting);
        other_queue.queue_id = "bar".into();
        let mut yesterday = entry("y", 2, 0, EntryState::Waiting);
        yesterday.movement_date = yesterday.movement_date.pred_opt().unwrap();

        assert_eq!(position_of(&me, &[other_queue, yesterday]), 0);
    }

    #[test]
    fn test_wait_estimate() {
        assert_eq!(estimated_wait_minutes(0, 5), 0);
        assert_eq!(estimated_wait_minutes(3, 5), 15);
        assert_eq!(estimated_wait_minutes(3, -2), 0);
        assert_eq!(estimated_wait_minutes(u32::MAX, 5), u32::MAX);
    }
}
