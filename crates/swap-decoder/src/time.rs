use chrono::{DateTime, Utc};

/// Deadline substituted for call shapes that do not carry one on the wire.
pub(crate) fn synthetic_deadline(now: DateTime<Utc>) -> u64 {
    const SYNTHETIC_DEADLINE_SECS: u64 = 3600;
    now.timestamp().max(0) as u64 + SYNTHETIC_DEADLINE_SECS
}
