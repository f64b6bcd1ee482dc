//! Race a primary operation against a timer.
//!
//! # Behaviour
//!
//! - The primary operation is spawned as its own task; the timer runs in the
//!   calling task. Neither blocks the other.
//! - The race settles exactly once, with whichever side finishes first.
//! - A primary failure settles the race immediately. It does not wait for
//!   the timer and it is never reported as a timeout.
//! - When both sides are ready at the same poll, the primary wins.
//!
//! # Loser handling
//!
//! When the primary wins, the timer is dropped. When the timer wins, the
//! primary task is handled per [`LoserPolicy`]: by default it is detached and
//! keeps running, so any side effects it has (an in-flight request, a write)
//! still happen. Its eventual result is discarded. [`LoserPolicy::Abort`]
//! aborts it instead.

use std::any::Any;
use std::future::Future;
use std::time::Duration;

use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tricks_types::{LoserPolicy, RaceError, RaceOutcome, TimedOut};

/// Delay used by [`timer`] when none is given.
pub const DEFAULT_TIMER_DELAY: Duration = Duration::from_millis(30_000);

/// Wait for `delay` (default [`DEFAULT_TIMER_DELAY`]) and produce a timeout error.
pub async fn timer(delay: Option<Duration>) -> TimedOut {
    let after = delay.unwrap_or(DEFAULT_TIMER_DELAY);
    tokio::time::sleep(after).await;
    TimedOut { after }
}

/// Run `op` concurrently with a timer of `limit` and report whichever settles first.
///
/// Must be called from within a Tokio runtime.
///
/// # Returns
///
/// - `Ok(RaceOutcome::Success(v))` when `op` returns `Ok(v)` first
/// - `Ok(RaceOutcome::Timeout { .. })` when the timer elapses first
/// - `Err(RaceError::Failed(e))` when `op` returns `Err(e)` first
/// - `Err(RaceError::Panicked { .. })` when `op` panics first
pub async fn race<F, T, E>(
    op: F,
    limit: Duration,
    policy: LoserPolicy,
) -> Result<RaceOutcome<T>, RaceError<E>>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    let started = Instant::now();
    let mut primary = tokio::spawn(op);

    let settled = tokio::select! {
        biased;
        joined = &mut primary => Ok(joined),
        expired = timer(Some(limit)) => Err(expired),
    };

    match settled {
        Ok(joined) => {
            let result = settle(joined);
            tracing::debug!(
                elapsed_ms = started.elapsed().as_millis(),
                limit_ms = limit.as_millis(),
                ok = result.is_ok(),
                "Primary operation settled the race"
            );
            result.map(RaceOutcome::Success)
        }
        Err(expired) => {
            handle_loser(primary, policy);
            tracing::debug!(
                limit_ms = expired.after.as_millis(),
                policy = policy.as_str(),
                "Timer settled the race"
            );
            Ok(RaceOutcome::Timeout {
                limit: expired.after,
            })
        }
    }
}

/// [`race`] with the default [`LoserPolicy::Detach`], folding a timeout into
/// [`RaceError::TimedOut`].
///
/// The primary operation is not cancelled on timeout.
pub async fn race_with_timeout<F, T, E>(op: F, limit: Duration) -> Result<T, RaceError<E>>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    race(op, limit, LoserPolicy::Detach)
        .await
        .and_then(RaceOutcome::into_result)
}

fn handle_loser<T>(primary: JoinHandle<T>, policy: LoserPolicy) {
    match policy {
        // Dropping the handle detaches the task.
        LoserPolicy::Detach => drop(primary),
        LoserPolicy::Abort => primary.abort(),
    }
}

fn settle<T, E>(joined: Result<Result<T, E>, JoinError>) -> Result<T, RaceError<E>> {
    match joined {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(RaceError::Failed(err)),
        Err(join_err) if join_err.is_panic() => {
            let message = panic_payload_to_string(&*join_err.into_panic());
            tracing::warn!(%message, "Primary operation panicked");
            Err(RaceError::Panicked { message })
        }
        Err(_) => Err(RaceError::Aborted),
    }
}

fn panic_payload_to_string(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::time::sleep;

    async fn resolve_after<T>(delay_ms: u64, value: T) -> Result<T, String> {
        sleep(Duration::from_millis(delay_ms)).await;
        Ok(value)
    }

    async fn fail_after(delay_ms: u64, message: &str) -> Result<&'static str, String> {
        sleep(Duration::from_millis(delay_ms)).await;
        Err(message.to_string())
    }

    async fn explode() -> Result<(), String> {
        panic!("boom")
    }

    /// Operation that raises `flag` once it finishes sleeping.
    fn flagging_op(
        delay_ms: u64,
        flag: Arc<AtomicBool>,
    ) -> impl Future<Output = Result<(), String>> + Send + 'static {
        async move {
            sleep(Duration::from_millis(delay_ms)).await;
            flag.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_defaults_to_thirty_seconds() {
        let started = Instant::now();
        let expired = timer(None).await;
        assert_eq!(expired.after, DEFAULT_TIMER_DELAY);
        assert!(started.elapsed() >= DEFAULT_TIMER_DELAY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_honours_explicit_delay() {
        let started = Instant::now();
        let expired = timer(Some(Duration::from_millis(250))).await;
        assert_eq!(expired.after, Duration::from_millis(250));
        assert!(started.elapsed() >= Duration::from_millis(250));
        assert!(started.elapsed() < DEFAULT_TIMER_DELAY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_operation_wins() {
        let value = race_with_timeout(resolve_after(500, "ok"), Duration::from_millis(1000))
            .await
            .unwrap();
        assert_eq!(value, "ok");
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_operation_times_out() {
        let err = race_with_timeout(resolve_after(2000, "late"), Duration::from_millis(1000))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        match err {
            RaceError::TimedOut { limit } => assert_eq!(limit, Duration::from_millis(1000)),
            other => panic!("expected TimedOut, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_surfaces_without_waiting_for_timer() {
        let started = Instant::now();
        let err = race_with_timeout(fail_after(100, "network down"), Duration::from_millis(1000))
            .await
            .unwrap_err();

        assert!(!err.is_timeout());
        assert_eq!(err.into_failure().as_deref(), Some("network down"));
        assert!(started.elapsed() < Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_after_timeout_is_a_timeout() {
        let err = race_with_timeout(fail_after(1500, "too late"), Duration::from_millis(1000))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn test_panic_is_reported_separately() {
        let err = race_with_timeout(explode(), Duration::from_millis(1000))
            .await
            .unwrap_err();
        match err {
            RaceError::Panicked { message } => assert_eq!(message, "boom"),
            other => panic!("expected Panicked, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_race_reports_outcome() {
        let limit = Duration::from_millis(1000);

        let won = race(resolve_after(10, 7), limit, LoserPolicy::Detach)
            .await
            .unwrap();
        assert_eq!(won, RaceOutcome::Success(7));

        let lost = race(resolve_after(5000, 7), limit, LoserPolicy::Detach)
            .await
            .unwrap();
        assert_eq!(lost, RaceOutcome::Timeout { limit });
    }

    #[tokio::test(start_paused = true)]
    async fn test_detached_loser_keeps_running() {
        let finished = Arc::new(AtomicBool::new(false));

        let outcome = race(
            flagging_op(2000, Arc::clone(&finished)),
            Duration::from_millis(1000),
            LoserPolicy::Detach,
        )
        .await
        .unwrap();

        assert!(outcome.is_timeout());
        assert!(!finished.load(Ordering::SeqCst));

        sleep(Duration::from_millis(1500)).await;
        assert!(finished.load(Ordering::SeqCst), "loser should still finish");
    }

    #[tokio::test(start_paused = true)]
    async fn test_aborted_loser_stops() {
        let finished = Arc::new(AtomicBool::new(false));

        let outcome = race(
            flagging_op(2000, Arc::clone(&finished)),
            Duration::from_millis(1000),
            LoserPolicy::Abort,
        )
        .await
        .unwrap();

        assert!(outcome.is_timeout());

        sleep(Duration::from_millis(1500)).await;
        assert!(!finished.load(Ordering::SeqCst), "aborted loser must not finish");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_has_no_effect_after_primary_wins() {
        let value = race_with_timeout(resolve_after(10, "first"), Duration::from_millis(100))
            .await
            .unwrap();
        sleep(Duration::from_millis(500)).await;
        assert_eq!(value, "first");
    }

    #[test]
    fn test_panic_payload_to_string() {
        let s: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_payload_to_string(&*s), "static");

        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_payload_to_string(&*owned), "owned");

        let other: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_payload_to_string(&*other), "unknown panic");
    }
}
