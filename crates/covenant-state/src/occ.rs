//! Optimistic-concurrency helper: read current version, let the caller
//! produce a new value, write only if the version is still what was
//! read, retry a bounded number of times on conflict.
//!
//! A single per-account nonce check generalized into a reusable
//! read-modify-write-if-unchanged loop for any versioned entity.

use tracing::warn;

use crate::error::StateError;

/// Runs `read` then `modify`, writing back only if `read` still observes
/// the version `modify` was given, retrying up to `attempts` times.
///
/// `read` returns `(current_value, current_version)`; `modify` takes the
/// current value and must return the next value with its version field
/// already incremented; `write` performs the conditional commit and
/// returns `Ok(true)` if the write landed, `Ok(false)` on a version
/// mismatch observed at write time.
pub fn retry_with_occ<T, F, M, W>(
    attempts: u32,
    mut read: F,
    mut modify: M,
    mut write: W,
) -> Result<T, StateError>
where
    F: FnMut() -> Result<(T, u64), StateError>,
    M: FnMut(T) -> Result<T, StateError>,
    W: FnMut(&T, u64) -> Result<bool, StateError>,
{
    for attempt in 0..attempts {
        let (current, version) = read()?;
        let next = modify(current)?;
        if write(&next, version)? {
            return Ok(next);
        }
        warn!(attempt, version, "optimistic concurrency conflict, retrying");
    }
    Err(StateError::RetryExhausted { attempts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn succeeds_on_first_attempt_when_uncontended() {
        let store = RefCell::new((10u64, 0u64));
        let result = retry_with_occ(
            3,
            || Ok(store.borrow().clone()),
            |v| Ok(v + 1),
            |next, version| {
                let mut s = store.borrow_mut();
                if s.1 == version {
                    s.0 = *next;
                    s.1 += 1;
                    Ok(true)
                } else {
                    Ok(false)
                }
            },
        )
        .unwrap();
        assert_eq!(result, 11);
    }

    #[test]
    fn exhausts_retry_budget_under_permanent_contention() {
        let result: Result<u64, StateError> = retry_with_occ(
            3,
            || Ok((1u64, 0u64)),
            |v| Ok(v + 1),
            |_next, _version| Ok(false),
        );
        assert!(matches!(result, Err(StateError::RetryExhausted { attempts: 3 })));
    }
}
