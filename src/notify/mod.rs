//! Deferred notifications: queue records, delivery ticker, digests.

pub mod model;
pub mod scheduler;

pub use model::{Notification, NotificationKind, NotificationStatus};
pub use scheduler::{NotificationScheduler, next_cron_fire};
