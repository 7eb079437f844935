use crate::foundation::constants::{NANOS_PER_SECOND, TEST_NOW_NANOS_ENV_VAR};
use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock time in nanoseconds since the Unix epoch, or the value pinned in
/// `ORACLE_NODE_TEST_NOW_NANOS`. A clock before the epoch reads as 0.
pub fn now_nanos() -> u64 {
    if let Some(pinned) = pinned_now_nanos() {
        return pinned;
    }
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_secs().saturating_mul(NANOS_PER_SECOND).saturating_add(u64::from(elapsed.subsec_nanos())),
        Err(_) => 0,
    }
}

fn pinned_now_nanos() -> Option<u64> {
    std::env::var(TEST_NOW_NANOS_ENV_VAR).ok()?.trim().parse().ok()
}
