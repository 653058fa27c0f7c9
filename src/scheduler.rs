use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;
use tracing::{debug, info};

pub type Slot = (NaiveDate, u32);

/// The local hour slot in `tz` that should fire at `now`, unless it already fired.
pub fn due_slot(
    now: DateTime<Utc>,
    tz: Tz,
    hours: &[u32],
    last_fired: Option<Slot>,
) -> Option<Slot> {
    let local = now.with_timezone(&tz);
    let slot = (local.date_naive(), local.hour());
    if !hours.contains(&slot.1) || last_fired == Some(slot) {
        return None;
    }
    Some(slot)
}

pub struct SchedulerHandle {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn stop(self) {
        self.stop.store(true, Ordering::Release);
        let _ = self.handle.join();
    }

    /// Blocks until the scheduler thread exits (it only does after `stop`).
    pub fn join(self) {
        let _ = self.handle.join();
    }
}

/// Runs `job` once per configured local hour in `tz`. Overlap between a slow job and
/// the next slot is the job's concern; the refresh job collapses it through its guard.
pub fn spawn_scheduler<F>(hours: Vec<u32>, tz: Tz, tick: Duration, job: F) -> SchedulerHandle
where
    F: Fn() + Send + 'static,
{
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);
    info!(?hours, %tz, "scheduler started");

    let handle = thread::spawn(move || {
        let mut last_fired: Option<Slot> = None;
        while !stop_flag.load(Ordering::Acquire) {
            if let Some(slot) = due_slot(Utc::now(), tz, &hours, last_fired) {
                info!(date = %slot.0, hour = slot.1, "scheduled refresh starting");
                last_fired = Some(slot);
                job();
            } else {
                debug!("scheduler tick");
            }
            thread::sleep(tick);
        }
        info!("scheduler stopped");
    });

    SchedulerHandle { stop, handle }
}
