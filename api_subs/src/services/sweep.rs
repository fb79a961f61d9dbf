use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use common::{error::Res, plan::Plan};
use db::{models::subscription::Subscription, store::SubscriptionStore};
use serde::Serialize;

use super::{
    notify::{NotificationKind, Notifier},
    sub::{month_start, plan_change},
};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub reminded: usize,
    pub downgraded: usize,
    pub rolled_over: u64,
    pub failed: usize,
}

enum Outcome {
    Untouched,
    Reminded,
    Downgraded,
}

/// Daily review of subscriptions: renewal reminders, downgrades of expired Pro
/// subscriptions and the monthly usage roll-over.
///
/// Safe to run more than once a day. Downgrades only apply to records still on
/// Pro with the end date seen when the sweep loaded them, and the roll-over
/// only touches records counting an older month. Reminders are sent again on
/// every run inside the reminder horizon.
pub struct Reconciler {
    store: Arc<dyn SubscriptionStore>,
    notifier: Arc<dyn Notifier>,
    reminder_days: i64,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        notifier: Arc<dyn Notifier>,
        reminder_days: i64,
    ) -> Self {
        Self {
            store,
            notifier,
            reminder_days,
        }
    }

    pub async fn run_daily_sweep(&self) -> Res<SweepReport> {
        self.run_daily_sweep_at(Utc::now()).await
    }

    /// Fails only if the Pro subscriptions cannot be listed. A record that
    /// cannot be processed is logged, counted in `failed` and skipped.
    pub async fn run_daily_sweep_at(&self, now: DateTime<Utc>) -> Res<SweepReport> {
        let today = now.date_naive();
        let reminder_date = today + Duration::days(self.reminder_days);
        let mut report = SweepReport::default();

        match self.store.roll_over_usage(month_start(today)).await {
            Ok(count) => report.rolled_over = count,
            Err(e) => {
                log::error!("Failed to roll over monthly usage: {}", e);
                report.failed += 1;
            }
        }

        let subscriptions = self.store.list_subscriptions_by_plan(Plan::Pro).await?;

        for sub in &subscriptions {
            match self.review(sub, now, today, reminder_date).await {
                Ok(Outcome::Reminded) => report.reminded += 1,
                Ok(Outcome::Downgraded) => report.downgraded += 1,
                Ok(Outcome::Untouched) => {}
                Err(e) => {
                    log::error!("Failed to review subscription of user {}: {}", sub.user_id, e);
                    report.failed += 1;
                }
            }
        }

        log::info!(
            "Daily sweep over {} Pro subscriptions: {} reminded, {} downgraded, {} usage resets, {} failed",
            subscriptions.len(),
            report.reminded,
            report.downgraded,
            report.rolled_over,
            report.failed
        );
        Ok(report)
    }

    async fn review(
        &self,
        sub: &Subscription,
        now: DateTime<Utc>,
        today: NaiveDate,
        reminder_date: NaiveDate,
    ) -> Res<Outcome> {
        let Some(end) = sub.subscription_end_date else {
            return Ok(Outcome::Untouched);
        };
        let ends_on = end.date_naive();

        if today < ends_on && ends_on <= reminder_date {
            return match self.store.get_user(sub.user_id).await? {
                Some(user) => {
                    self.notifier
                        .notify(&user, NotificationKind::RenewalReminder { ends_on })
                        .await?;
                    Ok(Outcome::Reminded)
                }
                None => {
                    log::warn!("No user record for subscription {}, reminder skipped", sub.user_id);
                    Ok(Outcome::Untouched)
                }
            };
        }

        if ends_on <= today {
            let downgraded = self
                .store
                .downgrade_expired(sub.user_id, end, &plan_change(Plan::Free, now))
                .await?;
            if !downgraded {
                log::debug!("Subscription {} changed during the sweep, left as is", sub.user_id);
                return Ok(Outcome::Untouched);
            }

            match self.store.get_user(sub.user_id).await {
                Ok(Some(user)) => {
                    // the downgrade is already persisted
                    if let Err(e) = self.notifier.notify(&user, NotificationKind::Downgraded).await {
                        log::error!("Failed to notify {} of downgrade: {}", user.email, e);
                    }
                }
                Ok(None) => log::info!("User ID {} downgraded from Pro to Free", sub.user_id),
                Err(e) => log::error!(
                    "User ID {} downgraded but could not be loaded for notification: {}",
                    sub.user_id,
                    e
                ),
            }
            return Ok(Outcome::Downgraded);
        }

        Ok(Outcome::Untouched)
    }
}
