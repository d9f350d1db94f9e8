use std::time::Duration;

/// An infinite stream of delays which grow by a constant factor, starting
/// from `start` and saturating at `max`. Use `take(n)` to bound the number
/// of attempts.
///
pub struct ExponentialBackoff {
    curr: Duration,
    max: Duration,
    factor: u32,
}

impl ExponentialBackoff {
    pub fn new(start: Duration, max: Duration, factor: u32) -> ExponentialBackoff {
        ExponentialBackoff {
            curr: start.min(max),
            max,
            factor,
        }
    }
}

impl Iterator for ExponentialBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Self::Item> {
        let delay = self.curr;
        self.curr = (self.curr * self.factor).min(self.max);
        Some(delay)
    }
}

/// Retry a fallible operation once per delay yielded by an iterator.
///
pub trait Retry: Iterator<Item = Duration> + Sized {
    /// Call `f` until it returns [Ok]. After each failure, `wait` is given
    /// the error and the next delay; it is expected to sleep and may log.
    /// The operation is attempted once more than the number of delays, and
    /// the last result is returned.
    fn retry<F, W, T, E>(self, mut f: F, mut wait: W) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
        W: FnMut(&E, Duration),
    {
        let mut result = f();

        for delay in self {
            match &result {
                Ok(_) => break,
                Err(e) => wait(e, delay),
            }
            result = f();
        }
        result
    }
}

impl<I: Iterator<Item = Duration>> Retry for I {}
