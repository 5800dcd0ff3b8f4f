// # Expiry sweeper
//
// Background task that ages idle sessions out even when nothing is calling `acquire` to
// trigger the inline expiration pass. Wakes on a fixed cadence, raced against a dedicated
// shutdown `Notify` so it exits promptly rather than on its next scheduled tick.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::pool::connector::Connector;
use crate::pool::coordinator::{self, PoolInner};

/// Run until the pool shuts down, periodically expiring and refilling idle sessions.
///
/// `expire_after` is the configured age limit; the sweep interval is half of it (bounded
/// below by [`coordinator::WAIT_CHUNK`]) so a session is never idle much past its limit
/// before being noticed.
pub(crate) async fn run<C: Connector>(inner: Arc<PoolInner<C>>, expire_after: Duration) {
    let interval = (expire_after / 2).max(coordinator::WAIT_CHUNK);

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = inner.shutdown_notify.notified() => break,
        }

        if inner.shutdown_flag.load(Ordering::Acquire) {
            break;
        }

        let mut state = inner.state.lock().await;
        if state.shutdown {
            break;
        }

        let idle_long_enough = match state.counters.last_acquire {
            Some(last) => last.elapsed() >= interval,
            None => true,
        };
        if !idle_long_enough {
            drop(state);
            continue;
        }

        let result = coordinator::expire_and_refill(&inner, &mut state, expire_after).await;
        drop(state);

        match result {
            Ok(()) => inner.notify.notify_waiters(),
            Err(e) => tracing::warn!(error = %e, "expiry sweep failed to refill pool to min_size"),
        }
    }

    tracing::debug!("expiry sweeper exiting");
}
