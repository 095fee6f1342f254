//! Fixed-window call throttling
//!
//! One `Throttler` is shared per API (wrapped in an `Arc`), and every call
//! dispatched to that API acquires a slot before any network I/O. Admission
//! is counted against a fixed window: the counter resets when a call arrives
//! `period` or more after the window started. A burst straddling a window
//! boundary can therefore admit close to twice the quota in a short
//! real-time span; that is the documented behavior of this scheme, not a
//! bug, and callers who need smoother pacing should configure a shorter
//! period.

use nokey_core::{Error, Result};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Blocking fixed-window rate limiter.
///
/// `acquire` never fails; when the window is saturated it sleeps until the
/// window resets. The counter lives behind a mutex so one throttler can be
/// shared by any number of concurrent callers.
#[derive(Debug)]
pub struct Throttler {
  rate_limit: u32,
  period: Duration,
  state: Mutex<Window>,
}

#[derive(Debug)]
struct Window {
  started_at: Instant,
  calls: u32,
}

enum Admission {
  Admitted,
  /// Window saturated; wait this long before re-checking
  Wait(Duration),
}

impl Throttler {
  /// Create a throttler admitting `rate_limit` calls per `period`.
  ///
  /// # Errors
  ///
  /// Returns `Error::Config` when `rate_limit` is zero or `period` is zero.
  pub fn new(rate_limit: u32, period: Duration) -> Result<Self> {
    if rate_limit == 0 {
      return Err(Error::Config("throttle rate_limit must be greater than zero".to_string()));
    }
    if period.is_zero() {
      return Err(Error::Config("throttle period must be greater than zero".to_string()));
    }

    Ok(Self {
      rate_limit,
      period,
      state: Mutex::new(Window { started_at: Instant::now(), calls: 0 }),
    })
  }

  /// Calls admitted per window
  pub fn rate_limit(&self) -> u32 {
    self.rate_limit
  }

  /// Window length
  pub fn period(&self) -> Duration {
    self.period
  }

  /// Acquire one call slot, sleeping through window resets as needed.
  ///
  /// Within one window at most `rate_limit` acquisitions return without
  /// sleeping; the next one sleeps until the window rolls over.
  pub async fn acquire(&self) {
    loop {
      match self.try_admit() {
        Admission::Admitted => return,
        Admission::Wait(wait) => {
          warn!(wait_secs = wait.as_secs_f64(), "rate limit reached, waiting for window reset");
          tokio::time::sleep(wait).await;
        }
      }
    }
  }

  /// Like [`acquire`](Self::acquire), but gives up instead of waiting past
  /// `budget`.
  ///
  /// # Errors
  ///
  /// Returns `Error::RateLimit` when the remaining window wait would overrun
  /// the budget. No slot is consumed in that case.
  pub async fn acquire_within(&self, budget: Duration) -> Result<()> {
    // A budget too large to represent as a deadline can never be exceeded
    let deadline = Instant::now().checked_add(budget);
    loop {
      match self.try_admit() {
        Admission::Admitted => return Ok(()),
        Admission::Wait(wait) => {
          if let Some(deadline) = deadline {
            if Instant::now() + wait > deadline {
              return Err(Error::RateLimit(format!(
                "window resets in {:.2}s, which exceeds the caller's wait budget",
                wait.as_secs_f64()
              )));
            }
          }
          warn!(wait_secs = wait.as_secs_f64(), "rate limit reached, waiting for window reset");
          tokio::time::sleep(wait).await;
        }
      }
    }
  }

  /// Single admission check under the lock. Rolls the window over when the
  /// period has elapsed; never sleeps.
  fn try_admit(&self) -> Admission {
    let mut window = self.state.lock().unwrap_or_else(PoisonError::into_inner);
    let now = Instant::now();
    let elapsed = now.duration_since(window.started_at);

    if elapsed >= self.period {
      window.started_at = now;
      window.calls = 0;
    }

    if window.calls >= self.rate_limit {
      // elapsed < period here, so the wait is always positive
      return Admission::Wait(self.period - elapsed);
    }

    window.calls += 1;
    debug!(calls = window.calls, limit = self.rate_limit, "call admitted");
    Admission::Admitted
  }
}
