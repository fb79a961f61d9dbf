use async_trait::async_trait;
use chrono::NaiveDate;
use common::error::Res;
use db::models::user::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// The Pro subscription ends on the given day.
    RenewalReminder { ends_on: NaiveDate },
    /// The subscription expired and was moved back to Free.
    Downgraded,
}

/// Outbound user notifications raised by the daily sweep.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, user: &User, kind: NotificationKind) -> Res<()>;
}

/// Writes notifications to the log instead of delivering them.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, user: &User, kind: NotificationKind) -> Res<()> {
        match kind {
            NotificationKind::RenewalReminder { ends_on } => log::info!(
                "Email reminder sent to {}: Pro subscription ends on {}",
                user.email,
                ends_on
            ),
            NotificationKind::Downgraded => {
                log::info!("User {} downgraded from Pro to Free", user.email)
            }
        }
        Ok(())
    }
}
