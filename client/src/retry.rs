//! Retry configuration and backoff bookkeeping shared by the s3stash crates.
//!
//! [Retry] says how often a storage operation may be retried and how the delays
//! between attempts grow; [Backoff] tracks one operation's attempts against that
//! configuration.  Intended for this crate and the transfer crates
//! (`s3stash-upload`, `s3stash-download`), not for general use.
use backoff::backoff::Backoff as BackoffTrait;
use backoff::ExponentialBackoff;
use std::time::Duration;

/// How transient storage failures are retried.
#[derive(Debug, Clone)]
pub struct Retry {
    /// How many times a failed operation is retried after its first attempt.
    /// Zero disables retrying. (default 5)
    pub retries: u32,

    /// Longest allowed delay between two attempts; the doubling stops here.
    /// (default 30s)
    pub max_delay: Duration,

    /// Base delay: the wait before retry `n` is about `delay_factor * 2^n`.
    /// (default 100ms)
    pub delay_factor: Duration,

    /// Jitter, as a fraction of the nominal delay.  With the default of 0.25 each
    /// delay lands uniformly between 0.75 and 1.25 times its nominal value.
    pub randomization_factor: f64,
}

impl Default for Retry {
    fn default() -> Self {
        Self {
            retries: 5,
            max_delay: Duration::from_secs(30),
            delay_factor: Duration::from_millis(100),
            randomization_factor: 0.25,
        }
    }
}

/// The attempt counter for one possibly-retried operation, a thin wrapper around
/// [backoff::ExponentialBackoff] that counts retries instead of elapsed time.
/// Jitter is disabled under `cfg(test)` so tests can assert exact delays.
#[derive(Debug)]
pub struct Backoff<'a> {
    retry: &'a Retry,
    tries: u32,
    backoff: ExponentialBackoff,
}

impl<'a> Backoff<'a> {
    pub fn new(retry: &Retry) -> Backoff {
        let mut backoff = ExponentialBackoff {
            max_elapsed_time: None, // retries are counted, not timed
            max_interval: retry.max_delay,
            initial_interval: retry.delay_factor,
            multiplier: 2.0,
            #[cfg(not(test))]
            randomization_factor: retry.randomization_factor,
            #[cfg(test)]
            randomization_factor: 0.0,
            ..Default::default()
        };
        backoff.reset();
        Backoff {
            retry,
            tries: 0,
            backoff,
        }
    }

    /// How long to sleep before the next retry, or None once the configured number
    /// of retries is spent.
    pub fn next_backoff(&mut self) -> Option<Duration> {
        self.tries += 1;
        if self.tries > self.retry.retries {
            None
        } else {
            self.backoff.next_backoff()
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn delays_double_until_retries_are_spent() {
        let retry = Retry {
            retries: 2,
            delay_factor: Duration::from_millis(250),
            ..Default::default()
        };
        let mut backoff = Backoff::new(&retry);
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(250)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(500)));
        assert_eq!(backoff.next_backoff(), None);
    }

    #[test]
    fn delays_stop_doubling_at_max_delay() {
        let retry = Retry {
            retries: 4,
            delay_factor: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
            ..Default::default()
        };
        let mut backoff = Backoff::new(&retry);
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(100)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(200)));
        // 400ms nominal, capped
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(300)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(300)));
        assert_eq!(backoff.next_backoff(), None);
    }

    #[test]
    fn zero_retries_means_one_attempt() {
        let retry = Retry {
            retries: 0,
            ..Default::default()
        };
        let mut backoff = Backoff::new(&retry);
        assert_eq!(backoff.next_backoff(), None);
    }
}
