//! Commit-order comparator.
//!
//! Ascending `(commit_timestamp, commit_lsn, commit_idx)`, then the record id
//! as a final tiebreak so the order is total even when the replication
//! metadata of two events is identical.

use std::cmp::Ordering;

use crate::shared::change_event::ChangeEvent;

pub fn compare_commit_order(a: &ChangeEvent, b: &ChangeEvent) -> Ordering {
    a.metadata
        .commit_timestamp
        .cmp(&b.metadata.commit_timestamp)
        .then_with(|| a.metadata.commit_lsn.cmp(&b.metadata.commit_lsn))
        .then_with(|| a.metadata.commit_idx.cmp(&b.metadata.commit_idx))
        .then_with(|| a.record_id().cmp(&b.record_id()))
}

/// Stable in-place sort into commit order
pub fn sort_by_commit_order(events: &mut [ChangeEvent]) {
    events.sort_by(compare_commit_order);
}
