use std::{sync::Arc, time::Duration};

use api_subs::services::sweep::Reconciler;
use chrono::{DateTime, TimeZone, Utc};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Runs the subscription sweep every day at `hour_utc`:00 UTC.
///
/// Runs are not locked against each other; a second process doing the same is
/// tolerated because the sweep is idempotent.
pub fn spawn_daily_sweep(reconciler: Arc<Reconciler>, hour_utc: u32) {
    actix_web::rt::spawn(async move {
        loop {
            let wait = duration_until_next_run(Utc::now(), hour_utc);
            log::info!(
                "Next subscription sweep in {}h{:02}m",
                wait.as_secs() / 3600,
                wait.as_secs() % 3600 / 60
            );
            tokio::time::sleep(wait).await;

            match reconciler.run_daily_sweep().await {
                Ok(report) => log::debug!("Subscription sweep finished: {:?}", report),
                Err(e) => log::error!("Subscription sweep aborted: {}", e),
            }
        }
    });
}

fn duration_until_next_run(now: DateTime<Utc>, hour_utc: u32) -> Duration {
    let Some(run_today) = now.date_naive().and_hms_opt(hour_utc, 0, 0) else {
        return DAY;
    };

    let mut next = Utc.from_utc_datetime(&run_today);
    if next <= now {
        next += chrono::Duration::days(1);
    }

    next.signed_duration_since(now).to_std().unwrap_or(DAY)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, h, m, 0).unwrap()
    }

    #[test]
    fn waits_for_todays_run_if_still_ahead() {
        assert_eq!(
            duration_until_next_run(at(0, 30), 2),
            Duration::from_secs(90 * 60)
        );
    }

    #[test]
    fn rolls_to_tomorrow_once_passed() {
        assert_eq!(duration_until_next_run(at(2, 0), 2), DAY);
        assert_eq!(
            duration_until_next_run(at(23, 0), 2),
            Duration::from_secs(3 * 60 * 60)
        );
    }

    #[test]
    fn invalid_hour_falls_back_to_a_day() {
        assert_eq!(duration_until_next_run(at(5, 0), 24), DAY);
    }
}
