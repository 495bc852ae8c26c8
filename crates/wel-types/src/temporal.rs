//! Entry timestamps.
//!
//! Timestamps are integer milliseconds since the UNIX epoch. The ledger only
//! requires them to be non-decreasing within a world instance.

use chrono::Utc;

/// Current wall-clock time in milliseconds since the UNIX epoch.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// A timestamp for an entry whose caller supplied none: the current time,
/// held back to `last` if the wall clock has stepped backwards.
pub fn next_timestamp(last: Option<i64>) -> i64 {
    let now = now_millis();
    match last {
        Some(last) if last > now => last,
        _ => now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_produces_reasonable_timestamp() {
        // Should be after 2020-01-01 (1577836800000 ms)
        assert!(now_millis() > 1_577_836_800_000);
    }

    #[test]
    fn next_timestamp_never_goes_backwards() {
        let future = now_millis() + 60_000;
        assert_eq!(next_timestamp(Some(future)), future);
        assert!(next_timestamp(Some(0)) > 0);
        assert!(next_timestamp(None) > 0);
    }
}
