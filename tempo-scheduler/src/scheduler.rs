/// Reminder scheduling for calendar tasks
///
/// For each task the scheduler computes the fire time
/// (`start_at - notify_lead_minutes`) and either delivers the reminder
/// immediately (fire time already passed) or arms a one-shot timer.
///
/// # Timer discipline
///
/// At most one live timer exists per task id. Scheduling a task that already
/// has a pending timer cancels and replaces it, so an edited task fires once,
/// at its new time. Deleting a task cancels its timer outright.
///
/// # Failure policy
///
/// Reminders are best-effort: delivery problems are logged and never
/// surfaced to the caller. A process restart drops all pending timers; the
/// startup re-scan ([`NotificationScheduler::schedule_all`]) rebuilds them
/// from the task store, delivering immediately any reminder whose fire time
/// passed during the downtime.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use tempo_scheduler::{Broadcaster, NotificationScheduler};
/// use tempo_shared::models::task::Task;
///
/// # async fn example(pool: sqlx::PgPool, task: Task) -> Result<(), sqlx::Error> {
/// let broadcaster = Arc::new(Broadcaster::new());
/// let scheduler = NotificationScheduler::new(broadcaster);
///
/// // Startup: arm a timer for every stored task
/// scheduler.schedule_all(&pool).await?;
///
/// // On create/update
/// scheduler.schedule(task);
/// # Ok(())
/// # }
/// ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use sqlx::PgPool;
use tempo_shared::events::NotificationEvent;
use tempo_shared::models::task::Task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::broadcast::Broadcaster;

/// A pending one-shot reminder timer
struct TimerEntry {
    /// Distinguishes this timer from any later replacement for the same task
    generation: u64,
    token: CancellationToken,
}

/// Timer bookkeeping shared with the spawned timer tasks
#[derive(Default)]
struct TimerTable {
    timers: Mutex<HashMap<i64, TimerEntry>>,
    generation: AtomicU64,
}

impl TimerTable {
    /// Installs a timer for a task, cancelling any previous one
    fn arm(&self, task_id: i64) -> (u64, CancellationToken) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();

        let mut timers = self.timers.lock().expect("timer table poisoned");
        if let Some(previous) = timers.insert(
            task_id,
            TimerEntry {
                generation,
                token: token.clone(),
            },
        ) {
            previous.token.cancel();
            debug!(task_id, "Replaced pending reminder timer");
        }

        (generation, token)
    }

    /// Removes a fired timer's entry, unless it was already replaced
    fn disarm(&self, task_id: i64, generation: u64) {
        let mut timers = self.timers.lock().expect("timer table poisoned");
        if timers
            .get(&task_id)
            .is_some_and(|entry| entry.generation == generation)
        {
            timers.remove(&task_id);
        }
    }

    /// Cancels and removes a task's timer; returns true if one existed
    fn cancel(&self, task_id: i64) -> bool {
        let entry = self
            .timers
            .lock()
            .expect("timer table poisoned")
            .remove(&task_id);

        match entry {
            Some(entry) => {
                entry.token.cancel();
                true
            }
            None => false,
        }
    }

    fn len(&self) -> usize {
        self.timers.lock().expect("timer table poisoned").len()
    }
}

/// Schedules reminder delivery for tasks
///
/// The delivery channel is injected at construction; the scheduler has no
/// late-bound global state.
pub struct NotificationScheduler {
    broadcaster: Arc<Broadcaster>,
    table: Arc<TimerTable>,
}

impl NotificationScheduler {
    /// Creates a scheduler delivering through `broadcaster`
    pub fn new(broadcaster: Arc<Broadcaster>) -> Self {
        Self {
            broadcaster,
            table: Arc::new(TimerTable::default()),
        }
    }

    /// Schedules the reminder for a task
    ///
    /// Cancels any pending timer for the same task id first. If the fire
    /// time is at or before now, the reminder is delivered synchronously
    /// before this method returns; otherwise a one-shot timer is armed.
    ///
    /// Exactly one delivery attempt is made per armed timer, with no retry.
    pub fn schedule(&self, task: Task) {
        let fire_at = task.fire_at();
        let now = Utc::now();

        if fire_at <= now {
            debug!(
                task_id = task.id,
                title = %task.title,
                "Fire time already passed, delivering reminder immediately"
            );
            self.table.cancel(task.id);
            deliver(&self.broadcaster, &task);
            return;
        }

        let delay = (fire_at - now)
            .to_std()
            .unwrap_or(std::time::Duration::ZERO);

        let (generation, token) = self.table.arm(task.id);

        debug!(
            task_id = task.id,
            title = %task.title,
            fire_at = %fire_at,
            "Reminder timer armed"
        );

        let table = Arc::clone(&self.table);
        let broadcaster = Arc::clone(&self.broadcaster);
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(task_id = task.id, "Reminder timer canceled");
                }
                _ = tokio::time::sleep(delay) => {
                    table.disarm(task.id, generation);
                    deliver(&broadcaster, &task);
                }
            }
        });
    }

    /// Cancels the pending timer for a task, if any
    ///
    /// Idempotent; returns true if a timer was canceled.
    pub fn cancel(&self, task_id: i64) -> bool {
        let canceled = self.table.cancel(task_id);
        if canceled {
            debug!(task_id, "Reminder timer canceled");
        }
        canceled
    }

    /// Re-scans the task store and schedules every task
    ///
    /// Intended to run once at startup, after store connectivity is
    /// established. Tasks whose fire time passed while the process was down
    /// are delivered immediately by the schedule path.
    ///
    /// # Errors
    ///
    /// Returns an error if the task store cannot be read. Individual
    /// delivery problems are logged, never returned.
    pub async fn schedule_all(&self, pool: &PgPool) -> Result<usize, sqlx::Error> {
        let tasks = Task::list_all(pool).await?;
        let count = tasks.len();

        for task in tasks {
            self.schedule(task);
        }

        info!(tasks = count, "Scheduled reminders for stored tasks");
        Ok(count)
    }

    /// Number of currently pending timers
    pub fn pending_timers(&self) -> usize {
        self.table.len()
    }
}

/// Delivers the reminder event through the broadcast channel
///
/// Best-effort: the outcome is logged and never propagated.
fn deliver(broadcaster: &Broadcaster, task: &Task) {
    let event = NotificationEvent::for_task(task);
    let delivered = broadcaster.broadcast(&event);

    if delivered == 0 {
        warn!(
            task_id = task.id,
            title = %task.title,
            "Reminder fired with no viewers connected"
        );
    } else {
        info!(
            task_id = task.id,
            title = %task.title,
            viewers = delivered,
            "Reminder delivered"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn task_with_start(id: i64, minutes_from_now: i64, lead_minutes: i32) -> Task {
        let now = Utc::now();
        Task {
            id,
            title: format!("task-{id}"),
            start_at: now + ChronoDuration::minutes(minutes_from_now),
            end_at: None,
            priority: "medium".to_string(),
            notify_lead_minutes: lead_minutes,
            color: None,
            text_color: None,
            agenda_avatar: None,
            editable: true,
            deletable: true,
            draggable: true,
            all_day: false,
            disabled: false,
            checked: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_past_fire_time_delivers_synchronously() {
        let broadcaster = Arc::new(Broadcaster::new());
        let scheduler = NotificationScheduler::new(Arc::clone(&broadcaster));
        let mut viewer = broadcaster.register();

        // start in 2 minutes, lead 5 minutes: fire time is in the past
        scheduler.schedule(task_with_start(1, 2, 5));

        // Delivered before schedule() returned, no timer left behind
        let event = viewer.try_recv().expect("reminder should be delivered");
        assert_eq!(event.task.as_ref().unwrap().id, 1);
        assert_eq!(scheduler.pending_timers(), 0);
    }

    #[tokio::test]
    async fn test_immediate_delivery_happens_exactly_once() {
        let broadcaster = Arc::new(Broadcaster::new());
        let scheduler = NotificationScheduler::new(Arc::clone(&broadcaster));
        let mut viewer = broadcaster.register();

        scheduler.schedule(task_with_start(1, 0, 10));

        assert!(viewer.try_recv().is_some());
        assert!(viewer.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_future_fire_time_arms_timer() {
        let broadcaster = Arc::new(Broadcaster::new());
        let scheduler = NotificationScheduler::new(Arc::clone(&broadcaster));
        let mut viewer = broadcaster.register();

        scheduler.schedule(task_with_start(1, 60, 10));

        assert_eq!(scheduler.pending_timers(), 1);
        assert!(viewer.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_cancel_removes_pending_timer() {
        let broadcaster = Arc::new(Broadcaster::new());
        let scheduler = NotificationScheduler::new(broadcaster);

        scheduler.schedule(task_with_start(1, 60, 10));
        assert_eq!(scheduler.pending_timers(), 1);

        assert!(scheduler.cancel(1));
        assert_eq!(scheduler.pending_timers(), 0);

        // Idempotent
        assert!(!scheduler.cancel(1));
    }

    #[tokio::test]
    async fn test_reschedule_keeps_single_timer() {
        let broadcaster = Arc::new(Broadcaster::new());
        let scheduler = NotificationScheduler::new(broadcaster);

        scheduler.schedule(task_with_start(1, 60, 10));
        scheduler.schedule(task_with_start(1, 90, 10));
        scheduler.schedule(task_with_start(1, 120, 10));

        assert_eq!(scheduler.pending_timers(), 1);
    }

    #[tokio::test]
    async fn test_timers_are_tracked_per_task() {
        let broadcaster = Arc::new(Broadcaster::new());
        let scheduler = NotificationScheduler::new(broadcaster);

        scheduler.schedule(task_with_start(1, 60, 10));
        scheduler.schedule(task_with_start(2, 60, 10));
        scheduler.schedule(task_with_start(3, 60, 10));

        assert_eq!(scheduler.pending_timers(), 3);
        scheduler.cancel(2);
        assert_eq!(scheduler.pending_timers(), 2);
    }
}
