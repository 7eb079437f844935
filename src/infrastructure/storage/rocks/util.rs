use crate::foundation::{NodeError, Result, STORAGE_LOCK_TIMEOUT_SECS};
use crate::storage_err;
use std::sync::{Mutex, MutexGuard, TryLockError};
use std::time::{Duration, Instant};

const RETRY_EVERY: Duration = Duration::from_millis(10);

/// Takes a RocksDB writer lock, failing with the transient `StorageLockTimeout` once
/// `STORAGE_LOCK_TIMEOUT_SECS` have passed.
pub fn acquire_with_timeout<'a, T>(lock: &'a Mutex<T>, operation: &'static str) -> Result<MutexGuard<'a, T>> {
    acquire_within(lock, operation, Duration::from_secs(STORAGE_LOCK_TIMEOUT_SECS))
}

pub(crate) fn acquire_within<'a, T>(lock: &'a Mutex<T>, operation: &'static str, budget: Duration) -> Result<MutexGuard<'a, T>> {
    let deadline = Instant::now() + budget;
    loop {
        match lock.try_lock() {
            Ok(guard) => return Ok(guard),
            Err(TryLockError::Poisoned(_)) => return Err(storage_err!(operation, "writer lock poisoned")),
            Err(TryLockError::WouldBlock) if Instant::now() >= deadline => {
                return Err(NodeError::StorageLockTimeout { operation: operation.to_string(), timeout_secs: budget.as_secs() });
            }
            Err(TryLockError::WouldBlock) => std::thread::sleep(RETRY_EVERY),
        }
    }
}
