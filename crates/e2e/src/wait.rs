//! Bounded waits
//!
//! Every DOM-dependent read goes through [`until`]: the probe is retried on an
//! interval until it reports [`Probe::Ready`] or the budget runs out. The only
//! fixed delay in the crate is [`settle`], used where the page exposes no
//! condition to poll.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::config::Budget;
use crate::error::{E2eError, E2eResult};

/// Outcome of one probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe<T> {
    Ready(T),
    /// Not there yet; carries the raw value observed, for the timeout message
    Pending(String),
}

/// Polls `probe` until it is ready or `budget.timeout` elapses.
///
/// Transient driver errors count as a pending probe. Any other error aborts
/// the wait immediately.
pub async fn until<T, F, Fut>(budget: Budget, what: &str, mut probe: F) -> E2eResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = E2eResult<Probe<T>>>,
{
    let deadline = Instant::now() + budget.timeout;
    let mut attempts = 0usize;

    loop {
        attempts += 1;
        let last = match probe().await {
            Ok(Probe::Ready(value)) => return Ok(value),
            Ok(Probe::Pending(seen)) => seen,
            Err(e) if e.is_transient() => e.to_string(),
            Err(e) => return Err(e),
        };

        if Instant::now() >= deadline {
            debug!("Gave up waiting for {} after {} attempts", what, attempts);
            return Err(E2eError::Timeout {
                what: what.to_string(),
                last,
            });
        }

        sleep(budget.interval).await;
    }
}

/// Fixed delay for re-render latency that has no observable completion signal.
pub async fn settle(delay: Duration) {
    sleep(delay).await;
}
