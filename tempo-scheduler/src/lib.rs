//! # Tempo Notification Scheduler
//!
//! This crate decides when each task's reminder fires and fans the resulting
//! events out to connected clients. It runs inside the API process; route
//! handlers call it directly on task create/update/delete, and startup runs
//! a full re-scan of the task store.
//!
//! ## Components
//!
//! - [`broadcast::Broadcaster`]: the delivery channel. Holds the set of
//!   currently connected viewers and forwards every emitted event to all of
//!   them, in emission order, with no persistence or replay.
//! - [`scheduler::NotificationScheduler`]: computes fire times and manages
//!   one-shot timers, at most one live timer per task. The delivery channel
//!   is injected at construction.

pub mod broadcast;
pub mod scheduler;

pub use broadcast::{Broadcaster, Viewer};
pub use scheduler::NotificationScheduler;
