pub mod probe;

use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

/// How the poller waits between attempts.
///
/// The default [`ThreadSleep`] blocks the calling thread. A cooperative
/// substrate (one that yields to other in-process tasks while waiting) can
/// plug in here without changing the polling contract.
pub trait SleepStrategy {
    fn sleep(&self, interval: Duration);
}

/// Blocks the calling thread between attempts.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleep;

impl SleepStrategy for ThreadSleep {
    fn sleep(&self, interval: Duration) {
        thread::sleep(interval);
    }
}

/// Options for a single poll.
#[derive(Debug, Clone)]
pub struct PollOptions {
    /// Wait between attempts.
    pub sleep_interval: Duration,
    /// Overall bound. `None` waits forever.
    pub timeout: Option<Duration>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            sleep_interval: Duration::from_secs(1),
            timeout: None,
        }
    }
}

impl PollOptions {
    /// Options with a bound, keeping the default interval.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Self::default()
        }
    }
}

/// The condition never became true within the allotted time.
///
/// Always distinct from an error produced by the retriever itself; see
/// [`PollError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollTimeout {
    pub elapsed: Duration,
    pub timeout: Duration,
    pub attempts: u32,
}

impl fmt::Display for PollTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "condition did not hold after {} attempts over {:.1}s (timeout {:.1}s)",
            self.attempts,
            self.elapsed.as_secs_f64(),
            self.timeout.as_secs_f64()
        )
    }
}

impl std::error::Error for PollTimeout {}

/// Outcome of a poll whose retriever is fallible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollError<E> {
    /// The bound elapsed without the condition holding.
    TimedOut(PollTimeout),
    /// The retriever itself failed. Propagated unmodified; the poll is
    /// aborted immediately, never retried.
    Retriever(E),
}

impl<E: fmt::Display> fmt::Display for PollError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimedOut(t) => t.fmt(f),
            Self::Retriever(e) => write!(f, "retriever failed: {e}"),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for PollError<E> {}

/// Repeatedly invoke `retriever` until `condition` holds for its value,
/// then return that value.
///
/// The retriever and condition always run at least once, even with a zero
/// or already-elapsed timeout. The elapsed check happens after each failed
/// condition test and before the sleep, so a poll with timeout `t` and
/// interval `s` makes at most `t/s + 1` attempts.
///
/// # Errors
///
/// Returns [`PollTimeout`] if a timeout was supplied and elapsed. With
/// `timeout: None` this never returns.
pub fn poll_until<T, R, C>(retriever: R, condition: C, options: &PollOptions) -> Result<T, PollTimeout>
where
    R: FnMut() -> T,
    C: FnMut(&T) -> bool,
{
    poll_with_sleeper(&ThreadSleep, retriever, condition, options)
}

/// [`poll_until`] with an explicit sleep strategy.
///
/// # Errors
///
/// Returns [`PollTimeout`] if a timeout was supplied and elapsed.
pub fn poll_with_sleeper<T, R, C>(
    sleeper: &dyn SleepStrategy,
    mut retriever: R,
    mut condition: C,
    options: &PollOptions,
) -> Result<T, PollTimeout>
where
    R: FnMut() -> T,
    C: FnMut(&T) -> bool,
{
    let start = Instant::now();
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        let value = retriever();
        if condition(&value) {
            return Ok(value);
        }
        if let Some(timeout) = options.timeout {
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return Err(PollTimeout {
                    elapsed,
                    timeout,
                    attempts,
                });
            }
        }
        sleeper.sleep(options.sleep_interval);
    }
}

/// Poll a boolean check until it returns true.
///
/// # Errors
///
/// Returns [`PollTimeout`] if a timeout was supplied and elapsed.
pub fn poll_until_true<R>(retriever: R, options: &PollOptions) -> Result<(), PollTimeout>
where
    R: FnMut() -> bool,
{
    poll_until(retriever, |up| *up, options).map(|_| ())
}

/// [`poll_until`] for a fallible retriever.
///
/// An `Err` from the retriever aborts the poll at once and comes back as
/// [`PollError::Retriever`], always distinguishable from a timeout.
///
/// # Errors
///
/// Returns [`PollError::TimedOut`] if the bound elapsed, or
/// [`PollError::Retriever`] with the retriever's own error.
pub fn try_poll_until<T, E, R, C>(
    mut retriever: R,
    mut condition: C,
    options: &PollOptions,
) -> Result<T, PollError<E>>
where
    R: FnMut() -> Result<T, E>,
    C: FnMut(&T) -> bool,
{
    let start = Instant::now();
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        let value = retriever().map_err(PollError::Retriever)?;
        if condition(&value) {
            return Ok(value);
        }
        if let Some(timeout) = options.timeout {
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return Err(PollError::TimedOut(PollTimeout {
                    elapsed,
                    timeout,
                    attempts,
                }));
            }
        }
        ThreadSleep.sleep(options.sleep_interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Records sleeps instead of blocking, so timing tests run instantly.
    struct RecordingSleep {
        calls: Cell<u32>,
    }

    impl RecordingSleep {
        fn new() -> Self {
            Self { calls: Cell::new(0) }
        }
    }

    impl SleepStrategy for RecordingSleep {
        fn sleep(&self, _interval: Duration) {
            self.calls.set(self.calls.get() + 1);
        }
    }

    fn immediate() -> PollOptions {
        PollOptions {
            sleep_interval: Duration::from_millis(1),
            timeout: Some(Duration::from_millis(30)),
        }
    }

    #[test]
    fn returns_first_value_that_satisfies_condition() {
        let mut count = 0;
        let result = poll_until(
            || {
                count += 1;
                count
            },
            |n| *n >= 3,
            &immediate(),
        );
        assert_eq!(result.unwrap(), 3);
        assert_eq!(count, 3);
    }

    #[test]
    fn makes_no_further_calls_after_success() {
        let mut count = 0;
        let _ = poll_until(
            || {
                count += 1;
                count
            },
            |_| true,
            &immediate(),
        );
        assert_eq!(count, 1);
    }

    #[test]
    fn zero_timeout_still_invokes_retriever_once() {
        let mut count = 0;
        let result = poll_until(
            || {
                count += 1;
                false
            },
            |v| *v,
            &PollOptions {
                sleep_interval: Duration::from_millis(1),
                timeout: Some(Duration::ZERO),
            },
        );
        assert_eq!(count, 1);
        let timeout = result.unwrap_err();
        assert_eq!(timeout.attempts, 1);
    }

    #[test]
    fn zero_timeout_succeeds_if_condition_holds_immediately() {
        let result = poll_until(
            || 7,
            |n| *n == 7,
            &PollOptions {
                sleep_interval: Duration::from_millis(1),
                timeout: Some(Duration::ZERO),
            },
        );
        assert_eq!(result.unwrap(), 7);
    }

    #[test]
    fn timeout_error_reports_attempts_and_elapsed() {
        let result = poll_until(|| 0, |n| *n > 0, &immediate());
        let timeout = result.unwrap_err();
        assert!(timeout.attempts >= 1);
        assert!(timeout.elapsed >= timeout.timeout);
        assert_eq!(timeout.timeout, Duration::from_millis(30));
    }

    #[test]
    fn no_timeout_keeps_polling_past_large_call_counts() {
        // With timeout: None a poll can only end by the condition holding.
        let sleeper = RecordingSleep::new();
        let mut count = 0u32;
        let result = poll_with_sleeper(
            &sleeper,
            || {
                count += 1;
                count
            },
            |n| *n >= 500,
            &PollOptions {
                sleep_interval: Duration::from_millis(1),
                timeout: None,
            },
        );
        assert_eq!(result.unwrap(), 500);
        assert_eq!(sleeper.calls.get(), 499);
    }

    #[test]
    fn sleeps_between_attempts_but_not_after_success() {
        let sleeper = RecordingSleep::new();
        let mut count = 0;
        let _ = poll_with_sleeper(
            &sleeper,
            || {
                count += 1;
                count
            },
            |n| *n >= 3,
            &PollOptions {
                sleep_interval: Duration::from_millis(1),
                timeout: None,
            },
        );
        assert_eq!(sleeper.calls.get(), 2);
    }

    #[test]
    fn poll_until_true_unwraps_boolean_checks() {
        let mut count = 0;
        let result = poll_until_true(
            || {
                count += 1;
                count >= 2
            },
            &immediate(),
        );
        assert!(result.is_ok());
        assert_eq!(count, 2);
    }

    #[test]
    fn retriever_error_aborts_immediately() {
        let mut count = 0;
        let result: Result<u32, PollError<String>> = try_poll_until(
            || {
                count += 1;
                if count == 2 {
                    Err("connection refused".to_owned())
                } else {
                    Ok(0)
                }
            },
            |n| *n > 0,
            &immediate(),
        );
        assert_eq!(count, 2, "retriever must not be retried after an error");
        match result.unwrap_err() {
            PollError::Retriever(e) => assert_eq!(e, "connection refused"),
            PollError::TimedOut(_) => panic!("expected the retriever error, not a timeout"),
        }
    }

    #[test]
    fn retriever_error_is_distinguishable_from_timeout() {
        let timed_out: Result<u32, PollError<String>> =
            try_poll_until(|| Ok(0), |n| *n > 0, &immediate());
        assert!(matches!(timed_out.unwrap_err(), PollError::TimedOut(_)));
    }

    #[test]
    fn try_poll_returns_value_on_success() {
        let mut count = 0;
        let result: Result<u32, PollError<String>> = try_poll_until(
            || {
                count += 1;
                Ok(count)
            },
            |n| *n >= 4,
            &immediate(),
        );
        assert_eq!(result.unwrap(), 4);
    }

    #[test]
    fn attempt_count_is_bounded_by_timeout_over_interval() {
        // timeout t, interval s: at most t/s + 1 attempts.
        let mut count: u32 = 0;
        let _ = poll_until(
            || {
                count += 1;
                false
            },
            |v| *v,
            &PollOptions {
                sleep_interval: Duration::from_millis(10),
                timeout: Some(Duration::from_millis(35)),
            },
        );
        assert!(count >= 1);
        assert!(count <= 5, "made {count} attempts for a 35ms/10ms poll");
    }

    #[test]
    fn timeout_display_names_attempts() {
        let timeout = PollTimeout {
            elapsed: Duration::from_secs(3),
            timeout: Duration::from_secs(2),
            attempts: 4,
        };
        let text = timeout.to_string();
        assert!(text.contains("4 attempts"));
        assert!(text.contains("3.0s"));
    }
}
