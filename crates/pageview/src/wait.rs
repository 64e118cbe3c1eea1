//! Wait Mechanisms
//!
//! Polling is the one way the runtime synchronizes with the page: page safety,
//! navigation arrival, wait fill strategies, tree lazy loads and alert
//! appearance are all [`wait_for`] calls with explicit bounds.
//!
//! A predicate returns `Ok(Some(value))` when the condition holds, `Ok(None)`
//! to keep polling. Errors end the wait unless `handle_exception` is set, and
//! fatal errors ([`crate::ViewError::is_fatal`]) end it regardless.

use crate::result::{ViewError, ViewResult};
use std::time::{Duration, Instant};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default timeout for wait operations (120 seconds)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 120_000;

/// Default polling interval (1 second)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;

// =============================================================================
// WAIT OPTIONS
// =============================================================================

/// Options for wait operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitOptions {
    /// Timeout in milliseconds
    pub timeout_ms: u64,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
    /// What is being waited for, used in the timeout error
    pub message: String,
    /// Treat non-fatal predicate errors as "not yet"
    pub handle_exception: bool,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            message: "condition".to_string(),
            handle_exception: false,
        }
    }
}

impl WaitOptions {
    /// Create new wait options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Options with a timeout and polling interval
    #[must_use]
    pub fn bounded(timeout_ms: u64, poll_interval_ms: u64) -> Self {
        Self::new()
            .with_timeout(timeout_ms)
            .with_poll_interval(poll_interval_ms)
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Set the description used in timeout errors
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Swallow non-fatal predicate errors
    #[must_use]
    pub const fn with_handle_exception(mut self, handle: bool) -> Self {
        self.handle_exception = handle;
        self
    }

    /// Get timeout as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get poll interval as Duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// =============================================================================
// WAIT RESULT
// =============================================================================

/// Result of a successful wait
#[derive(Debug, Clone, PartialEq)]
pub struct WaitResult<T> {
    /// Value the predicate produced
    pub value: T,
    /// Time spent waiting
    pub elapsed: Duration,
    /// Description of what was waited for
    pub waited_for: String,
}

// =============================================================================
// WAITING
// =============================================================================

/// Poll `predicate` until it yields a value or the timeout expires.
///
/// The predicate runs at least once, even with a zero timeout.
pub fn wait_for<T>(
    predicate: impl FnMut() -> ViewResult<Option<T>>,
    options: &WaitOptions,
) -> ViewResult<WaitResult<T>> {
    wait_for_with_fail(predicate, || Ok(()), options)
}

/// [`wait_for`] running `fail_func` between unsuccessful polls
pub fn wait_for_with_fail<T>(
    mut predicate: impl FnMut() -> ViewResult<Option<T>>,
    mut fail_func: impl FnMut() -> ViewResult<()>,
    options: &WaitOptions,
) -> ViewResult<WaitResult<T>> {
    let start = Instant::now();
    let timeout = options.timeout();
    let mut attempts = 0_u32;

    loop {
        attempts += 1;
        match predicate() {
            Ok(Some(value)) => {
                tracing::trace!(
                    waited_for = %options.message,
                    attempts,
                    elapsed_ms = start.elapsed().as_millis(),
                    "wait satisfied"
                );
                return Ok(WaitResult {
                    value,
                    elapsed: start.elapsed(),
                    waited_for: options.message.clone(),
                });
            }
            Ok(None) => {}
            Err(err) if err.is_fatal() || !options.handle_exception => return Err(err),
            Err(err) => {
                tracing::trace!(waited_for = %options.message, error = %err, "predicate failed");
            }
        }

        let elapsed = start.elapsed();
        if elapsed >= timeout {
            tracing::debug!(
                waited_for = %options.message,
                attempts,
                timeout_ms = options.timeout_ms,
                "wait timed out"
            );
            return Err(ViewError::TimedOut {
                message: options.message.clone(),
                timeout_ms: options.timeout_ms,
            });
        }

        fail_func()?;
        std::thread::sleep(options.poll_interval().min(timeout - elapsed));
    }
}

/// Poll a boolean condition
pub fn wait_until(
    mut predicate: impl FnMut() -> ViewResult<bool>,
    options: &WaitOptions,
) -> ViewResult<Duration> {
    wait_for(|| Ok(predicate()?.then_some(())), options).map(|r| r.elapsed)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn quick(timeout_ms: u64) -> WaitOptions {
        WaitOptions::bounded(timeout_ms, 1).with_message("quick")
    }

    mod options_tests {
        use super::*;

        #[test]
        fn test_builders() {
            let opts = WaitOptions::new()
                .with_timeout(50)
                .with_poll_interval(5)
                .with_message("tree loaded")
                .with_handle_exception(true);
            assert_eq!(opts.timeout(), Duration::from_millis(50));
            assert_eq!(opts.poll_interval(), Duration::from_millis(5));
            assert_eq!(opts.message, "tree loaded");
            assert!(opts.handle_exception);
        }
    }

    mod wait_for_tests {
        use super::*;

        #[test]
        fn test_returns_value_when_ready() {
            let calls = Cell::new(0);
            let result = wait_for(
                || {
                    calls.set(calls.get() + 1);
                    Ok((calls.get() >= 3).then_some("ready"))
                },
                &quick(1_000),
            )
            .unwrap();
            assert_eq!(result.value, "ready");
            assert_eq!(calls.get(), 3);
            assert_eq!(result.waited_for, "quick");
        }

        #[test]
        fn test_zero_timeout_still_tries_once() {
            let calls = Cell::new(0);
            let result = wait_for(
                || {
                    calls.set(calls.get() + 1);
                    Ok(Some(()))
                },
                &quick(0),
            );
            assert!(result.is_ok());
            assert_eq!(calls.get(), 1);
        }

        #[test]
        fn test_times_out() {
            let err = wait_for(|| Ok(None::<()>), &quick(20)).unwrap_err();
            assert!(matches!(err, ViewError::TimedOut { timeout_ms: 20, ref message } if message == "quick"));
        }

        #[test]
        fn test_errors_propagate_by_default() {
            let err = wait_for(|| Err::<Option<()>, _>(ViewError::NoAlert), &quick(100)).unwrap_err();
            assert!(matches!(err, ViewError::NoAlert));
        }

        #[test]
        fn test_handle_exception_counts_errors_as_falsy() {
            let calls = Cell::new(0);
            let result = wait_for(
                || {
                    calls.set(calls.get() + 1);
                    if calls.get() < 2 {
                        Err(ViewError::stale("//a"))
                    } else {
                        Ok(Some(7))
                    }
                },
                &quick(1_000).with_handle_exception(true),
            )
            .unwrap();
            assert_eq!(result.value, 7);
        }

        #[test]
        fn test_fatal_errors_are_never_swallowed() {
            let err = wait_for(
                || {
                    Err::<Option<()>, _>(ViewError::SessionLost {
                        message: "closed".into(),
                    })
                },
                &quick(1_000).with_handle_exception(true),
            )
            .unwrap_err();
            assert!(err.is_fatal());
        }

        #[test]
        fn test_fail_func_runs_between_polls() {
            let fails = Cell::new(0);
            let polls = Cell::new(0);
            wait_for_with_fail(
                || {
                    polls.set(polls.get() + 1);
                    Ok((polls.get() == 3).then_some(()))
                },
                || {
                    fails.set(fails.get() + 1);
                    Ok(())
                },
                &quick(1_000),
            )
            .unwrap();
            assert_eq!(fails.get(), 2);
        }

        #[test]
        fn test_wait_until() {
            let flag = Cell::new(false);
            let elapsed = wait_until(
                || {
                    let was = flag.get();
                    flag.set(true);
                    Ok(was)
                },
                &quick(1_000),
            )
            .unwrap();
            assert!(elapsed < Duration::from_secs(1));
        }
    }
}
