//! Single-slot background scheduler for reconciliation passes.
//!
//! One tokio task owns the slot. It runs a pass when the periodic trigger
//! comes due or when an immediate run is requested, never two at once.

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tokio::{
    sync::{RwLock, mpsc},
    task::JoinHandle,
    time::{self, Instant},
};
use tracing::{debug, error, info, warn};

use crate::{
    error::AppResult,
    models::{SyncReport, SyncStatus},
    sync::Syncer,
    tmdb::Catalog,
};

/// Unit of work the scheduler runs in its slot.
pub trait SyncJob: Send + Sync + 'static {
    fn run(&self) -> impl Future<Output = AppResult<SyncReport>> + Send;
}

impl<K: Catalog + 'static> SyncJob for Syncer<K> {
    fn run(&self) -> impl Future<Output = AppResult<SyncReport>> + Send {
        self.run_pass()
    }
}

#[derive(Debug)]
enum Command {
    Immediate,
    Periodic { interval: Duration, flex: Duration },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Trigger {
    Manual,
    Periodic,
}

#[derive(Debug)]
struct PeriodicTrigger {
    interval: Duration,
    flex: Duration,
    anchor: Instant,
}

impl PeriodicTrigger {
    fn due(&self) -> Instant {
        self.anchor + self.interval
    }

    fn window_start(&self) -> Instant {
        self.due() - self.flex
    }
}

#[derive(Clone)]
pub struct SchedulerHandle {
    tx: mpsc::UnboundedSender<Command>,
    status: Arc<RwLock<SyncStatus>>,
    registered: Arc<AtomicBool>,
    default_interval: Duration,
    default_flex: Duration,
}

impl SchedulerHandle {
    /// Registers the default periodic trigger and kicks off a first run.
    /// Only the first call has any effect; returns whether it was this one.
    pub fn ensure_scheduling(&self) -> bool {
        if self.registered.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.schedule_periodic_sync(self.default_interval, self.default_flex);
        self.schedule_immediate_sync();
        true
    }

    pub fn schedule_immediate_sync(&self) {
        self.send(Command::Immediate);
    }

    /// Replaces any existing periodic trigger. `flex` is clamped to `interval`.
    pub fn schedule_periodic_sync(&self, interval: Duration, flex: Duration) {
        if interval.is_zero() {
            warn!("ignoring periodic sync with zero interval");
            return;
        }
        self.send(Command::Periodic { interval, flex: flex.min(interval) });
    }

    pub async fn status(&self) -> SyncStatus {
        self.status.read().await.clone()
    }

    fn send(&self, cmd: Command) {
        if self.tx.send(cmd).is_err() {
            warn!("sync scheduler has stopped, trigger dropped");
        }
    }
}

/// Starts the scheduler task. It exits once every handle is dropped.
pub fn spawn<J: SyncJob>(
    job: J,
    default_interval: Duration,
    default_flex: Duration,
) -> (SchedulerHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let status = Arc::new(RwLock::new(SyncStatus::default()));
    let handle = SchedulerHandle {
        tx,
        status: status.clone(),
        registered: Arc::new(AtomicBool::new(false)),
        default_interval,
        default_flex,
    };
    let task = tokio::spawn(run_loop(job, rx, status));
    (handle, task)
}

async fn run_loop<J: SyncJob>(
    job: J,
    mut rx: mpsc::UnboundedReceiver<Command>,
    status: Arc<RwLock<SyncStatus>>,
) {
    info!("sync scheduler started");

    let mut periodic: Option<PeriodicTrigger> = None;
    let mut pending_manual = false;

    loop {
        let trigger = if std::mem::take(&mut pending_manual) {
            Trigger::Manual
        } else {
            let due = periodic.as_ref().map(PeriodicTrigger::due);
            tokio::select! {
                cmd = rx.recv() => match cmd {
                    None => break,
                    Some(Command::Immediate) => Trigger::Manual,
                    Some(Command::Periodic { interval, flex }) => {
                        info!(interval_secs = interval.as_secs(), flex_secs = flex.as_secs(), "periodic sync registered");
                        periodic = Some(PeriodicTrigger { interval, flex, anchor: Instant::now() });
                        continue;
                    },
                },
                _ = sleep_until(due) => Trigger::Periodic,
            }
        };

        run_job(&job, &status, trigger).await;
        let finished = Instant::now();

        while let Ok(cmd) = rx.try_recv() {
            match cmd {
                Command::Immediate => pending_manual = true,
                Command::Periodic { interval, flex } => {
                    periodic = Some(PeriodicTrigger { interval, flex, anchor: finished });
                },
            }
        }
        if pending_manual {
            debug!("coalesced sync requests received during pass");
        }

        if let Some(p) = periodic.as_mut() {
            // A manual run inside the flex window stands in for the periodic one.
            if trigger == Trigger::Periodic || finished >= p.window_start() {
                p.anchor = finished;
            }
        }
    }

    info!("sync scheduler stopped");
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn run_job<J: SyncJob>(job: &J, status: &RwLock<SyncStatus>, trigger: Trigger) {
    status.write().await.running = true;
    debug!(trigger = ?trigger, "sync pass starting");

    let result = job.run().await;

    let mut status = status.write().await;
    status.running = false;
    status.passes += 1;
    status.last_finished_at = Some(jiff::Timestamp::now());
    match result {
        Ok(report) => {
            status.last_report = Some(report);
            status.last_error = None;
        },
        Err(err) => {
            error!(trigger = ?trigger, error = %err, "sync pass failed");
            status.failures += 1;
            status.last_error = Some(err.to_string());
        },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::error::AppError;

    struct CountingJob {
        runs: Arc<AtomicUsize>,
        delay: Duration,
        fail: bool,
    }

    impl SyncJob for CountingJob {
        async fn run(&self) -> AppResult<SyncReport> {
            time::sleep(self.delay).await;
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AppError::Other(anyhow::anyhow!("catalog unreachable")));
            }
            Ok(SyncReport::default())
        }
    }

    fn start(delay: Duration, fail: bool) -> (SchedulerHandle, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let job = CountingJob { runs: runs.clone(), delay, fail };
        let (handle, _task) = spawn(job, Duration::from_secs(4 * 3600), Duration::from_secs(3600));
        (handle, runs)
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_trigger_fires_every_interval() {
        let (handle, runs) = start(Duration::ZERO, false);
        handle.schedule_periodic_sync(secs(10), secs(2));

        time::sleep(secs(9)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        time::sleep(secs(16)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn immediate_requests_during_a_pass_coalesce() {
        let (handle, runs) = start(secs(5), false);
        handle.schedule_immediate_sync();

        time::sleep(secs(1)).await;
        assert!(handle.status().await.running);
        for _ in 0..3 {
            handle.schedule_immediate_sync();
        }

        time::sleep(secs(20)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert!(!handle.status().await.running);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_run_inside_flex_window_replaces_periodic_run() {
        let (handle, runs) = start(Duration::ZERO, false);
        handle.schedule_periodic_sync(secs(10), secs(3));

        time::sleep(secs(8)).await;
        handle.schedule_immediate_sync();
        time::sleep(secs(7)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        time::sleep(secs(4)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_run_before_flex_window_keeps_periodic_deadline() {
        let (handle, runs) = start(Duration::ZERO, false);
        handle.schedule_periodic_sync(secs(10), secs(3));

        time::sleep(secs(3)).await;
        handle.schedule_immediate_sync();
        time::sleep(secs(8)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn ensure_scheduling_registers_once() {
        let (handle, runs) = start(Duration::ZERO, false);

        assert!(handle.ensure_scheduling());
        assert!(!handle.ensure_scheduling());

        time::sleep(secs(60)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        time::sleep(secs(4 * 3600)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_pass_is_recorded() {
        let (handle, _runs) = start(Duration::ZERO, true);
        handle.schedule_immediate_sync();
        time::sleep(secs(1)).await;

        let status = handle.status().await;
        assert_eq!(status.passes, 1);
        assert_eq!(status.failures, 1);
        assert_eq!(status.last_error.as_deref(), Some("catalog unreachable"));
    }

    #[tokio::test(start_paused = true)]
    async fn flex_is_clamped_to_interval() {
        let (handle, runs) = start(Duration::ZERO, false);
        handle.schedule_periodic_sync(secs(10), secs(60));

        // With the window spanning the whole period any manual run resets the deadline.
        time::sleep(secs(2)).await;
        handle.schedule_immediate_sync();
        time::sleep(secs(9)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        time::sleep(secs(2)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }
}
