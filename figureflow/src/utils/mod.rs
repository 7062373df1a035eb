//! Small helpers for identifiers and timing.

use chrono::{DateTime, Utc};
use std::time::Instant;
use uuid::Uuid;

/// Generates a new run identifier (UUID v4).
#[must_use]
pub fn new_run_id() -> Uuid {
    Uuid::new_v4()
}

/// Generates a new record identifier, time-ordered so rows sort by insert.
#[must_use]
pub fn new_record_id() -> String {
    Uuid::now_v7().to_string()
}

/// Current UTC time.
#[must_use]
pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

/// Milliseconds elapsed since `start`, saturating.
#[must_use]
pub fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_is_v4() {
        assert_eq!(new_run_id().get_version_num(), 4);
    }

    #[test]
    fn test_record_ids_are_distinct() {
        assert_ne!(new_record_id(), new_record_id());
    }

    #[test]
    fn test_elapsed_ms_is_small_for_fresh_start() {
        assert!(elapsed_ms(Instant::now()) < 1_000);
    }
}
