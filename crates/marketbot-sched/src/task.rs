//! Periodic task with re-entrancy guard and runtime-mutable interval.
//!
//! Semantics:
//! - Ticks fire on the current interval; the work runs in its own task
//!   so late work never blocks the schedule.
//! - If the previous tick's work has not completed when a tick fires,
//!   the tick is skipped entirely (no queuing, no cancellation).
//! - A work fault is logged and does not stop the schedule; only `stop`
//!   ends it.
//! - `stop` cancels future ticks, then waits until the in-flight
//!   invocation (if any) has completed before returning.
//! - The interval is read before every sleep, so a change through the
//!   shared handle takes effect by the following tick at the latest.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

type BoxFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;
type WorkFn = dyn Fn() -> BoxFuture + Send + Sync;

/// How long `stop` and `run_now` wait between polls of the guard.
const GUARD_POLL: Duration = Duration::from_millis(5);

/// Shared, runtime-mutable tick interval.
#[derive(Debug, Clone)]
pub struct IntervalHandle(Arc<AtomicU64>);

impl IntervalHandle {
    pub fn new(interval: Duration) -> Self {
        Self(Arc::new(AtomicU64::new(interval.as_millis() as u64)))
    }

    pub fn get(&self) -> Duration {
        Duration::from_millis(self.0.load(Ordering::SeqCst))
    }

    pub fn set(&self, interval: Duration) {
        self.0.store(interval.as_millis() as u64, Ordering::SeqCst);
    }
}

/// Clears the running flag when the work finishes, panicking included.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// One independently clocked periodic task.
pub struct PeriodicTask {
    name: &'static str,
    interval: IntervalHandle,
    work: Arc<WorkFn>,
    running: Arc<AtomicBool>,
    invocations: Arc<AtomicU64>,
    skipped: Arc<AtomicU64>,
    shutdown_tx: watch::Sender<bool>,
    driver: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    /// Spawn a periodic task.
    ///
    /// `work` is a factory producing one tick's unit of work; it is
    /// invoked once per non-skipped tick.
    pub fn spawn<F, Fut>(name: &'static str, interval: IntervalHandle, work: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let work: Arc<WorkFn> = Arc::new(move || Box::pin(work()) as BoxFuture);
        let running = Arc::new(AtomicBool::new(false));
        let invocations = Arc::new(AtomicU64::new(0));
        let skipped = Arc::new(AtomicU64::new(0));
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let driver = {
            let interval = interval.clone();
            let work = work.clone();
            let running = running.clone();
            let invocations = invocations.clone();
            let skipped = skipped.clone();
            tokio::spawn(async move {
                loop {
                    let period = interval.get();
                    tokio::select! {
                        _ = shutdown_rx.changed() => break,
                        _ = tokio::time::sleep(period) => {
                            Self::fire(name, &work, &running, &invocations, &skipped);
                        }
                    }
                }
                debug!(task = name, "Schedule cancelled");
            })
        };

        Self {
            name,
            interval,
            work,
            running,
            invocations,
            skipped,
            shutdown_tx,
            driver: Some(driver),
        }
    }

    /// Launch one tick's work unless the previous one is still running.
    fn fire(
        name: &'static str,
        work: &Arc<WorkFn>,
        running: &Arc<AtomicBool>,
        invocations: &Arc<AtomicU64>,
        skipped: &Arc<AtomicU64>,
    ) {
        if running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            skipped.fetch_add(1, Ordering::SeqCst);
            debug!(task = name, "Previous tick still running, skipping");
            return;
        }

        invocations.fetch_add(1, Ordering::SeqCst);
        let guard = RunningGuard(running.clone());
        let work = work.clone();
        tokio::spawn(async move {
            let _guard = guard;
            if let Err(e) = (work)().await {
                warn!(task = name, error = format!("{e:#}"), "Tick work failed");
            }
        });
    }

    /// Run the work immediately, inline, under the same re-entrancy
    /// guard. Skips (returns `false`) when a tick is already in flight.
    pub async fn run_now(&self) -> bool {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        self.invocations.fetch_add(1, Ordering::SeqCst);
        let _guard = RunningGuard(self.running.clone());
        if let Err(e) = (self.work)().await {
            warn!(task = self.name, error = format!("{e:#}"), "Tick work failed");
        }
        true
    }

    /// Cancel future ticks and wait for the in-flight invocation.
    pub async fn stop(mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(driver) = self.driver.take() {
            let _ = driver.await;
        }
        while self.running.load(Ordering::SeqCst) {
            tokio::time::sleep(GUARD_POLL).await;
        }
        debug!(task = self.name, "Stopped");
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Shared interval handle (for adaptive cadence).
    pub fn interval(&self) -> IntervalHandle {
        self.interval.clone()
    }

    /// Ticks whose work actually ran.
    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::SeqCst)
    }

    /// Ticks skipped because the previous work was still running.
    pub fn skipped_ticks(&self) -> u64 {
        self.skipped.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[tokio::test(start_paused = true)]
    async fn test_ticks_run_on_cadence() {
        let count = Arc::new(AtomicU32::new(0));
        let task = {
            let count = count.clone();
            PeriodicTask::spawn("test", IntervalHandle::new(Duration::from_millis(100)), move || {
                let count = count.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
        };

        tokio::time::sleep(Duration::from_millis(450)).await;
        task.stop().await;
        assert_eq!(count.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_ticks_are_skipped() {
        let task = PeriodicTask::spawn(
            "slow",
            IntervalHandle::new(Duration::from_millis(50)),
            || async {
                tokio::time::sleep(Duration::from_millis(120)).await;
                Ok(())
            },
        );

        // Ticks at 50, 100, ..., 450: work at 50/200/350, rest skipped.
        tokio::time::sleep(Duration::from_millis(480)).await;
        let invocations = task.invocations();
        let skipped = task.skipped_ticks();
        task.stop().await;

        assert_eq!(invocations, 3);
        assert_eq!(skipped, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fault_does_not_stop_schedule() {
        let count = Arc::new(AtomicU32::new(0));
        let task = {
            let count = count.clone();
            PeriodicTask::spawn("faulty", IntervalHandle::new(Duration::from_millis(100)), move || {
                let count = count.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    anyhow::bail!("boom")
                }
            })
        };

        tokio::time::sleep(Duration::from_millis(350)).await;
        task.stop().await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_waits_for_in_flight_work() {
        let done = Arc::new(AtomicBool::new(false));
        let task = {
            let done = done.clone();
            PeriodicTask::spawn("inflight", IntervalHandle::new(Duration::from_millis(50)), move || {
                let done = done.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    done.store(true, Ordering::SeqCst);
                    Ok(())
                }
            })
        };

        // Let the first tick start its work, then stop mid-flight.
        tokio::time::sleep(Duration::from_millis(60)).await;
        task.stop().await;
        assert!(done.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_change_takes_effect() {
        let count = Arc::new(AtomicU32::new(0));
        let interval = IntervalHandle::new(Duration::from_millis(100));
        let task = {
            let count = count.clone();
            PeriodicTask::spawn("adaptive", interval.clone(), move || {
                let count = count.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
        };

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);

        interval.set(Duration::from_millis(10));
        // One stale 100ms sleep may still elapse before the new cadence.
        tokio::time::sleep(Duration::from_millis(300)).await;
        task.stop().await;
        assert!(count.load(Ordering::SeqCst) >= 20);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_now_respects_guard() {
        let count = Arc::new(AtomicU32::new(0));
        let task = {
            let count = count.clone();
            // Long interval: ticks never fire during this test.
            PeriodicTask::spawn("manual", IntervalHandle::new(Duration::from_secs(3600)), move || {
                let count = count.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
        };

        assert!(task.run_now().await);
        assert!(task.run_now().await);
        assert_eq!(count.load(Ordering::SeqCst), 2);
        task.stop().await;
    }
}
