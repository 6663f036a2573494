use chrono::{DateTime, Days, Local, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::error::AppError;

/// Start of the server-local calendar day containing `now`.
pub fn local_day_start<Tz: TimeZone>(now: &DateTime<Tz>, tz: &Tz) -> DateTime<Tz> {
    let date = now.with_timezone(tz).date_naive();
    local_midnight(date, tz)
}

/// Midnight of `date` in `tz`. When midnight falls in a DST gap, 01:00 is used.
pub fn local_midnight<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> DateTime<Tz> {
    let naive = date.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| {
            tz.from_local_datetime(&(naive + chrono::Duration::hours(1)))
                .earliest()
        })
        .unwrap_or_else(|| tz.from_utc_datetime(&naive))
}

pub fn today_start_utc() -> DateTime<Utc> {
    local_day_start(&Local::now(), &Local).with_timezone(&Utc)
}

/// Parses a date-range bound. RFC 3339 timestamps are taken as-is; a bare
/// `YYYY-MM-DD` date covers the whole local day, so an end bound resolves to
/// the last microsecond of that day.
pub fn parse_range_bound<Tz: TimeZone>(
    value: &str,
    is_end: bool,
    tz: &Tz,
) -> Result<DateTime<Utc>, AppError> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        AppError::Validation(format!(
            "Invalid date '{}', expected YYYY-MM-DD or an RFC 3339 timestamp",
            value
        ))
    })?;

    if is_end {
        let next = date
            .checked_add_days(Days::new(1))
            .ok_or_else(|| AppError::Validation(format!("Date out of range: {}", value)))?;
        Ok((local_midnight(next, tz) - chrono::Duration::microseconds(1)).with_timezone(&Utc))
    } else {
        Ok(local_midnight(date, tz).with_timezone(&Utc))
    }
}
