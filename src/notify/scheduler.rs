//! Deferred notification delivery.
//!
//! Two independent background loops:
//! - A **due ticker** that polls the DB for pending notifications whose
//!   scheduled time has passed and delivers them.
//! - A **health-tip ticker** that fires on a cron schedule and sends a tip
//!   to every opted-in profile.
//!
//! Delivery is fire-and-forget relative to the work that scheduled it:
//! failures are logged and retried on the next tick, never propagated.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use crate::catalog::tips_for;
use crate::channels::{Messenger, OutboundMessage};
use crate::config::NotifyConfig;
use crate::notify::model::NotificationKind;
use crate::profile::HealthProfile;
use crate::store::Database;

/// Parse a cron expression and compute the next fire time from now.
pub fn next_cron_fire(schedule: &str) -> Result<Option<DateTime<Utc>>, String> {
    let cron_schedule =
        cron::Schedule::from_str(schedule).map_err(|e| format!("invalid cron: {e}"))?;
    Ok(cron_schedule.upcoming(Utc).next())
}

/// Drains the notification queue and runs the recurring digests.
pub struct NotificationScheduler {
    store: Arc<dyn Database>,
    messenger: Arc<dyn Messenger>,
    config: NotifyConfig,
}

impl NotificationScheduler {
    pub fn new(
        store: Arc<dyn Database>,
        messenger: Arc<dyn Messenger>,
        config: NotifyConfig,
    ) -> Self {
        Self {
            store,
            messenger,
            config,
        }
    }

    /// Deliver everything due at `now`. Returns the number delivered.
    pub async fn deliver_due(&self, now: DateTime<Utc>) -> usize {
        let due = match self.store.list_due_notifications(now).await {
            Ok(due) => due,
            Err(e) => {
                tracing::error!("Failed to load due notifications: {e}");
                return 0;
            }
        };

        let mut delivered = 0;
        for notification in due {
            let outbound = OutboundMessage {
                to: notification.identity.clone(),
                body: notification.body.clone(),
                media_url: None,
            };
            if let Err(e) = self.messenger.send(&outbound).await {
                tracing::warn!(
                    id = %notification.id,
                    kind = %notification.kind,
                    "Notification send failed, will retry next tick: {e}"
                );
                continue;
            }
            if let Err(e) = self.store.mark_notification_sent(notification.id).await {
                // The message went out; a stuck 'pending' row means one
                // duplicate on the next tick at worst.
                tracing::warn!(id = %notification.id, "Failed to mark notification sent: {e}");
            }
            delivered += 1;
        }

        if delivered > 0 {
            tracing::info!(delivered, "Delivered due notifications");
        }
        delivered
    }

    /// Send a health tip to every opted-in profile. Returns send count.
    pub async fn send_health_tips(&self) -> usize {
        let recipients = match self.store.list_health_tip_recipients().await {
            Ok(r) => r,
            Err(e) => {
                tracing::error!("Failed to load health-tip recipients: {e}");
                return 0;
            }
        };

        let mut sent = 0;
        for profile in recipients {
            let body = tip_for_profile(&profile);
            let outbound = OutboundMessage {
                to: profile.identity.clone(),
                body,
                media_url: None,
            };
            match self.messenger.send(&outbound).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    tracing::warn!(identity = %profile.identity, "Health tip send failed: {e}");
                }
            }
        }
        sent
    }

    /// Spawn the due-notification ticker.
    pub fn spawn_ticker(self: Arc<Self>) -> JoinHandle<()> {
        let interval = self.config.tick_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                self.deliver_due(Utc::now()).await;
            }
        })
    }

    /// Spawn the cron-scheduled health-tip digest.
    pub fn spawn_health_tip_ticker(self: Arc<Self>) -> JoinHandle<()> {
        let schedule = self.config.health_tip_schedule.clone();
        tokio::spawn(async move {
            loop {
                let next = match next_cron_fire(&schedule) {
                    Ok(Some(next)) => next,
                    Ok(None) => {
                        tracing::warn!(schedule, "Health-tip schedule has no future firings");
                        return;
                    }
                    Err(e) => {
                        tracing::error!(schedule, "Health-tip ticker disabled: {e}");
                        return;
                    }
                };

                let wait = (next - Utc::now()).to_std().unwrap_or_default();
                tokio::time::sleep(wait).await;
                let sent = self.send_health_tips().await;
                tracing::info!(sent, "Health-tip digest fired");
            }
        })
    }
}

/// Pick a tip matching the profile's conditions, rotating deterministically
/// by visit count; generic hydration tip when nothing matches.
fn tip_for_profile(profile: &HealthProfile) -> String {
    let name = profile.display_name.as_deref().unwrap_or("there");
    for condition in &profile.conditions {
        if let Some(tips) = tips_for(condition) {
            let tip = tips[(profile.visit_count as usize) % tips.len()];
            return format!("Hi {name}! Daily health tip ({condition}): {tip}");
        }
    }
    format!("Hi {name}! Daily health tip: drink enough water and take a short walk today.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::SimulatedMessenger;
    use crate::config::NotifyConfig;
    use crate::notify::model::Notification;
    use crate::store::LibSqlBackend;

    async fn scheduler_with(
        messenger: Arc<SimulatedMessenger>,
    ) -> (NotificationScheduler, Arc<dyn Database>) {
        let store: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let scheduler = NotificationScheduler::new(
            Arc::clone(&store),
            messenger,
            NotifyConfig::default(),
        );
        (scheduler, store)
    }

    #[tokio::test]
    async fn delivers_due_and_skips_future() {
        let messenger = Arc::new(SimulatedMessenger::new());
        let (scheduler, store) = scheduler_with(Arc::clone(&messenger)).await;
        let now = Utc::now();

        let due = Notification::new(
            "+254700000001",
            NotificationKind::Reminder,
            "visit soon".into(),
            now - chrono::Duration::minutes(1),
            None,
        );
        let future = Notification::new(
            "+254700000001",
            NotificationKind::Arrival,
            "not yet".into(),
            now + chrono::Duration::hours(1),
            None,
        );
        store.schedule_notification(&due).await.unwrap();
        store.schedule_notification(&future).await.unwrap();

        assert_eq!(scheduler.deliver_due(now).await, 1);
        let sent = messenger.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].body, "visit soon");

        // Delivered notification doesn't fire twice.
        assert_eq!(scheduler.deliver_due(now).await, 0);
    }

    #[tokio::test]
    async fn cancelled_notifications_are_not_delivered() {
        let messenger = Arc::new(SimulatedMessenger::new());
        let (scheduler, store) = scheduler_with(Arc::clone(&messenger)).await;
        let now = Utc::now();
        let booking_id = uuid::Uuid::new_v4();

        let n = Notification::new(
            "+254700000001",
            NotificationKind::Reminder,
            "visit soon".into(),
            now - chrono::Duration::minutes(1),
            Some(booking_id),
        );
        store.schedule_notification(&n).await.unwrap();
        assert_eq!(
            store.cancel_notifications_for_booking(booking_id).await.unwrap(),
            1
        );

        assert_eq!(scheduler.deliver_due(now).await, 0);
        assert!(messenger.sent().await.is_empty());
    }

    #[test]
    fn cron_parsing() {
        assert!(next_cron_fire("0 0 9 * * *").unwrap().is_some());
        assert!(next_cron_fire("not a cron").is_err());
    }
}
