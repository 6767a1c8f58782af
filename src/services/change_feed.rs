use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::{
    scoring::realtime::{ChangeType, RowChange},
    state::{RowChangeEvent, SharedState},
};

fn commit_timestamp() -> Option<String> {
    OffsetDateTime::now_utc().format(&Rfc3339).ok()
}

/// Change describing a freshly inserted row.
pub fn inserted<T>(row: T) -> RowChange<T> {
    RowChange {
        event_type: ChangeType::Insert,
        new: Some(row),
        old: None,
        commit_timestamp: commit_timestamp(),
    }
}

/// Change describing an in-place update.
pub fn updated<T>(old: T, new: T) -> RowChange<T> {
    RowChange {
        event_type: ChangeType::Update,
        new: Some(new),
        old: Some(old),
        commit_timestamp: commit_timestamp(),
    }
}

/// Change describing a removed row.
pub fn deleted<T>(old: T) -> RowChange<T> {
    RowChange {
        event_type: ChangeType::Delete,
        new: None,
        old: Some(old),
        commit_timestamp: commit_timestamp(),
    }
}

/// Publish a change to every connected stream.
pub fn publish(state: &SharedState, event: RowChangeEvent) {
    tracing::debug!(table = event.table(), "publishing row change");
    state.changes().publish(event);
}
