/// End-to-end reminder scenarios under virtual time
///
/// These tests drive the scheduler and broadcast channel together, using
/// tokio's paused clock to step through long reminder windows instantly.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use tempo_scheduler::{Broadcaster, NotificationScheduler};
use tempo_shared::events::NotificationKind;
use tempo_shared::models::task::Task;

fn task(id: i64, title: &str, start_in_minutes: i64, lead_minutes: i32) -> Task {
    let now = Utc::now();
    Task {
        id,
        title: title.to_string(),
        start_at: now + ChronoDuration::minutes(start_in_minutes),
        end_at: None,
        priority: "high".to_string(),
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

/// Create "Pay rent" starting in 2 minutes with a 5 minute lead: the fire
/// time is already in the past, so the reminder is delivered within the same
/// call and a connected viewer sees it immediately.
#[tokio::test]
async fn reminder_in_the_past_is_delivered_immediately() {
    let broadcaster = Arc::new(Broadcaster::new());
    let scheduler = Arc::new(NotificationScheduler::new(Arc::clone(&broadcaster)));
    let mut viewer = broadcaster.register();

    scheduler.schedule(task(1, "Pay rent", 2, 5));

    let event = viewer.try_recv().expect("reminder should arrive synchronously");
    assert_eq!(event.kind, NotificationKind::TaskNotification);

    let task_ref = event.task.expect("reminder should carry the task");
    assert_eq!(task_ref.title, "Pay rent");
    assert_eq!(task_ref.id, 1);
}

/// Create "Call dentist" starting in 60 minutes with a 10 minute lead: no
/// event for 49 minutes, exactly one at the 50 minute mark.
#[tokio::test(start_paused = true)]
async fn reminder_in_the_future_fires_at_the_lead_mark() {
    let broadcaster = Arc::new(Broadcaster::new());
    let scheduler = Arc::new(NotificationScheduler::new(Arc::clone(&broadcaster)));
    let mut viewer = broadcaster.register();

    scheduler.schedule(task(2, "Call dentist", 60, 10));
    // Let the spawned timer task register its sleep against the paused clock
    // before we advance time, otherwise the advance happens first and is lost.
    tokio::task::yield_now().await;
    assert_eq!(scheduler.pending_timers(), 1);

    // 49 minutes in: nothing yet
    tokio::time::advance(Duration::from_secs(49 * 60)).await;
    tokio::task::yield_now().await;
    assert!(viewer.try_recv().is_none());

    // Cross the 50 minute mark
    tokio::time::advance(Duration::from_secs(2 * 60)).await;
    tokio::task::yield_now().await;

    let event = viewer.try_recv().expect("reminder should have fired");
    assert_eq!(event.task.unwrap().title, "Call dentist");

    // Exactly once
    assert!(viewer.try_recv().is_none());
    assert_eq!(scheduler.pending_timers(), 0);
}

/// Editing a task with a pending timer replaces the timer instead of adding
/// a second one: a single reminder fires, at the new time.
#[tokio::test(start_paused = true)]
async fn rescheduling_replaces_the_pending_timer() {
    let broadcaster = Arc::new(Broadcaster::new());
    let scheduler = Arc::new(NotificationScheduler::new(Arc::clone(&broadcaster)));
    let mut viewer = broadcaster.register();

    // Original: would fire at the 20 minute mark
    scheduler.schedule(task(3, "Team sync", 30, 10));

    // Edited: now fires at the 50 minute mark
    scheduler.schedule(task(3, "Team sync", 60, 10));
    // Let the replacement timer task arm its sleep before advancing time.
    tokio::task::yield_now().await;
    assert_eq!(scheduler.pending_timers(), 1);

    // The original fire time passes silently
    tokio::time::advance(Duration::from_secs(25 * 60)).await;
    tokio::task::yield_now().await;
    assert!(viewer.try_recv().is_none());

    // The new fire time delivers exactly one reminder
    tokio::time::advance(Duration::from_secs(30 * 60)).await;
    tokio::task::yield_now().await;
    assert!(viewer.try_recv().is_some());
    assert!(viewer.try_recv().is_none());
}

/// Deleting a task cancels its reminder outright.
#[tokio::test(start_paused = true)]
async fn canceled_reminder_never_fires() {
    let broadcaster = Arc::new(Broadcaster::new());
    let scheduler = Arc::new(NotificationScheduler::new(Arc::clone(&broadcaster)));
    let mut viewer = broadcaster.register();

    scheduler.schedule(task(4, "Water plants", 30, 5));
    assert!(scheduler.cancel(4));

    tokio::time::advance(Duration::from_secs(60 * 60)).await;
    tokio::task::yield_now().await;

    assert!(viewer.try_recv().is_none());
    assert_eq!(scheduler.pending_timers(), 0);
}

/// Independent tasks fire independently and in time order.
#[tokio::test(start_paused = true)]
async fn multiple_tasks_fire_in_time_order() {
    let broadcaster = Arc::new(Broadcaster::new());
    let scheduler = Arc::new(NotificationScheduler::new(Arc::clone(&broadcaster)));
    let mut viewer = broadcaster.register();

    scheduler.schedule(task(5, "First", 20, 10)); // fires at 10 min
    scheduler.schedule(task(6, "Second", 40, 10)); // fires at 30 min
    // Let both spawned timer tasks arm their sleeps before advancing time.
    tokio::task::yield_now().await;
    assert_eq!(scheduler.pending_timers(), 2);

    tokio::time::advance(Duration::from_secs(15 * 60)).await;
    tokio::task::yield_now().await;

    let first = viewer.try_recv().expect("first reminder due");
    assert_eq!(first.task.unwrap().title, "First");
    assert!(viewer.try_recv().is_none());

    tokio::time::advance(Duration::from_secs(20 * 60)).await;
    tokio::task::yield_now().await;

    let second = viewer.try_recv().expect("second reminder due");
    assert_eq!(second.task.unwrap().title, "Second");
    assert_eq!(scheduler.pending_timers(), 0);
}

/// A reminder that fires with nobody connected is dropped, not queued: a
/// viewer connecting afterwards sees nothing.
#[tokio::test(start_paused = true)]
async fn reminders_are_not_replayed_to_late_viewers() {
    let broadcaster = Arc::new(Broadcaster::new());
    let scheduler = Arc::new(NotificationScheduler::new(Arc::clone(&broadcaster)));

    scheduler.schedule(task(7, "Lonely reminder", 10, 5));
    // Let the spawned timer task arm its sleep before advancing time.
    tokio::task::yield_now().await;

    tokio::time::advance(Duration::from_secs(10 * 60)).await;
    tokio::task::yield_now().await;
    assert_eq!(scheduler.pending_timers(), 0);

    let mut late = broadcaster.register();
    assert!(late.try_recv().is_none());
}
