//! Sliding-window rate limiting for outbound requests
//!
//! A single `RateLimiter` is shared by every request the harvester makes. It
//! keeps the admission timestamps of the trailing window and admits a new
//! request only while fewer than `rate_limit` of them are younger than the
//! window length.
//!
//! The limiter can be used as a scoped guard: acquiring is `admit`, and there
//! is nothing to release because the constraint is on the window, not on a
//! count of live permits.

mod suspend;

pub use suspend::Suspension;

use crate::HarvestError;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Proof that a request was admitted by the limiter
#[derive(Debug, Clone, Copy)]
#[must_use]
pub struct Admission {
    admitted_at: Instant,
}

impl Admission {
    /// When the request was admitted
    pub fn admitted_at(&self) -> Instant {
        self.admitted_at
    }
}

/// Sliding-window rate limiter
#[derive(Debug)]
pub struct RateLimiter {
    /// Maximum admissions per window
    rate_limit: usize,

    /// Length of the trailing window
    window: Duration,

    /// Admission timestamps, oldest first
    request_times: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter admitting at most `rate_limit` requests per `window`
    ///
    /// A zero `rate_limit` or zero `window` disables limiting entirely.
    pub fn new(rate_limit: u32, window: Duration) -> Self {
        Self {
            rate_limit: rate_limit as usize,
            window,
            request_times: Mutex::new(VecDeque::new()),
        }
    }

    /// Creates a limiter that admits every request immediately
    pub fn unlimited() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Returns whether this limiter ever makes callers wait
    pub fn is_limiting(&self) -> bool {
        self.rate_limit > 0 && !self.window.is_zero()
    }

    /// Number of admissions still inside the trailing window
    pub fn in_window(&self) -> usize {
        let mut times = self.request_times.lock();
        Self::trim(&mut times, self.window, Instant::now());
        times.len()
    }

    /// Waits on the calling thread until a request may be issued, then records it
    pub fn admit_blocking(&self) -> Admission {
        loop {
            match self.try_admit(Instant::now()) {
                Ok(admission) => return admission,
                Err(wait) => std::thread::sleep(wait),
            }
        }
    }

    /// Waits cooperatively until a request may be issued, then records it
    pub async fn admit(&self) -> Admission {
        loop {
            match self.try_admit(Instant::now()) {
                Ok(admission) => return admission,
                Err(wait) => tokio::time::sleep(wait).await,
            }
        }
    }

    /// Waits using the given suspension strategy, honoring cancellation
    pub async fn admit_with(
        &self,
        suspension: Suspension,
        cancel: &CancellationToken,
    ) -> Result<Admission, HarvestError> {
        loop {
            if cancel.is_cancelled() {
                return Err(HarvestError::Cancelled);
            }
            match self.try_admit(Instant::now()) {
                Ok(admission) => return Ok(admission),
                Err(wait) => {
                    tracing::trace!("Rate limit reached, waiting {:?}", wait);
                    suspension.pause(wait, cancel).await?;
                }
            }
        }
    }

    /// Admits a request at `now` if the window has room
    ///
    /// Returns the time until the oldest admission leaves the window otherwise.
    fn try_admit(&self, now: Instant) -> Result<Admission, Duration> {
        if !self.is_limiting() {
            return Ok(Admission { admitted_at: now });
        }

        let mut times = self.request_times.lock();
        Self::trim(&mut times, self.window, now);

        if times.len() < self.rate_limit {
            times.push_back(now);
            return Ok(Admission { admitted_at: now });
        }

        // Window is full, so there is an oldest entry still inside it
        let oldest = times.front().copied().unwrap_or(now);
        Err(self
            .window
            .saturating_sub(now.duration_since(oldest))
            .max(Duration::from_micros(10)))
    }

    /// Drops every timestamp that is `window` or more older than `now`
    fn trim(times: &mut VecDeque<Instant>, window: Duration, now: Instant) {
        while let Some(front) = times.front() {
            if now.duration_since(*front) >= window {
                times.pop_front();
            } else {
                break;
            }
        }
    }
}
