//! Scheduled purging of old vehicle entries.
//!
//! Each admin tier owns one job. A job fires on its tier's cadence and, if at
//! least one user of that tier exists, deletes every entry created strictly
//! before the tier's cutoff, together with their photo files.

use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Datelike, Days, Duration, Local, Months, NaiveDate, TimeZone, Utc};
use sqlx::PgPool;
use tokio::task::JoinHandle;

use crate::permissions::Role;
use crate::routes::auth::User;
use crate::routes::entry::{VehicleEntry, photo};
use crate::utils::time::local_midnight;

/// Entries created before this instant are purged by the tier's job.
pub fn cutoff(role: Role, now: DateTime<Utc>) -> DateTime<Utc> {
    match role {
        Role::Daily => now - Duration::days(1),
        Role::Weekly => now - Duration::days(7),
        Role::Yearly => now
            .checked_sub_months(Months::new(12))
            .unwrap_or(now - Duration::days(365)),
    }
}

/// Next fire time strictly after `after`: daily at midnight, Sundays at
/// midnight, or the first of the month at midnight.
pub fn next_run<Tz: TimeZone>(role: Role, after: &DateTime<Tz>, tz: &Tz) -> DateTime<Tz> {
    let today = after.with_timezone(tz).date_naive();

    let date = match role {
        Role::Daily => today + Days::new(1),
        Role::Weekly => {
            let until_sunday = 7 - u64::from(today.weekday().num_days_from_sunday());
            today + Days::new(until_sunday)
        }
        Role::Yearly => first_of_month(today) + Months::new(1),
    };

    local_midnight(date, tz)
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Runs one cleanup pass for `role`. Returns `None` when no user of that tier
/// exists, otherwise the number of deleted entries.
pub async fn run_cleanup(
    pool: &PgPool,
    upload_dir: &Path,
    role: Role,
    now: DateTime<Utc>,
) -> Result<Option<u64>, sqlx::Error> {
    if !User::exists_with_role(pool, role).await? {
        tracing::debug!("Skipping {} cleanup, no such admin exists", role);
        return Ok(None);
    }

    let cutoff = cutoff(role, now);
    let purged = VehicleEntry::delete_created_before(pool, cutoff).await?;
    photo::remove_all(upload_dir, &purged.photos).await;
    tracing::info!(
        "{} cleanup removed {} entries created before {}",
        role,
        purged.count,
        cutoff
    );
    Ok(Some(purged.count))
}

/// Starts one background task per tier. The tasks run until the runtime shuts down.
pub fn spawn_cleanup_jobs(pool: PgPool, upload_dir: PathBuf) -> Vec<JoinHandle<()>> {
    Role::ALL
        .into_iter()
        .map(|role| {
            let pool = pool.clone();
            let upload_dir = upload_dir.clone();
            tokio::spawn(async move {
                loop {
                    let now = Local::now();
                    let next = next_run(role, &now, &Local);
                    let wait = (next.clone() - now).to_std().unwrap_or(StdDuration::ZERO);
                    tracing::debug!("Next {} cleanup at {}", role, next);
                    tokio::time::sleep(wait).await;

                    if let Err(e) = run_cleanup(&pool, &upload_dir, role, Utc::now()).await {
                        tracing::error!("{} cleanup failed: {}", role, e);
                    }
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Weekday};

    fn tz() -> FixedOffset {
        FixedOffset::east_opt(-5 * 3600).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<FixedOffset> {
        tz().with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn cutoffs_per_tier() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        assert_eq!(
            cutoff(Role::Daily, now),
            Utc.with_ymd_and_hms(2024, 3, 14, 12, 0, 0).unwrap()
        );
        assert_eq!(
            cutoff(Role::Weekly, now),
            Utc.with_ymd_and_hms(2024, 3, 8, 12, 0, 0).unwrap()
        );
        assert_eq!(
            cutoff(Role::Yearly, now),
            Utc.with_ymd_and_hms(2023, 3, 15, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn yearly_cutoff_handles_leap_day() {
        let now = Utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap();
        assert_eq!(
            cutoff(Role::Yearly, now),
            Utc.with_ymd_and_hms(2023, 2, 28, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn daily_runs_at_next_midnight() {
        assert_eq!(next_run(Role::Daily, &at(2024, 3, 15, 13, 30), &tz()), at(2024, 3, 16, 0, 0));
        // exactly at midnight the next run is a full day later
        assert_eq!(next_run(Role::Daily, &at(2024, 3, 16, 0, 0), &tz()), at(2024, 3, 17, 0, 0));
    }

    #[test]
    fn weekly_runs_on_sunday_midnight() {
        // 2024-03-15 is a Friday
        let next = next_run(Role::Weekly, &at(2024, 3, 15, 9, 0), &tz());
        assert_eq!(next, at(2024, 3, 17, 0, 0));
        assert_eq!(next.weekday(), Weekday::Sun);

        // from a Sunday afternoon the next run is the following Sunday
        assert_eq!(next_run(Role::Weekly, &at(2024, 3, 17, 15, 0), &tz()), at(2024, 3, 24, 0, 0));
    }

    #[test]
    fn yearly_tier_runs_monthly() {
        assert_eq!(next_run(Role::Yearly, &at(2024, 1, 31, 23, 59), &tz()), at(2024, 2, 1, 0, 0));
        assert_eq!(next_run(Role::Yearly, &at(2024, 12, 1, 0, 0), &tz()), at(2025, 1, 1, 0, 0));
    }

    #[test]
    fn next_run_is_always_in_the_future() {
        let mut now = at(2024, 1, 1, 0, 0);
        for _ in 0..500 {
            for role in Role::ALL {
                assert!(next_run(role, &now, &tz()) > now);
            }
            now = now + Duration::hours(17);
        }
    }
}
