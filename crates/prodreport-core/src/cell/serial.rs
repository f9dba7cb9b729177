//! Excel serial date conversion (1900 date system).
//!
//! Serial 1 is 1900-01-01. Serial 60 is the non-existent 1900-02-29 that
//! Excel keeps for Lotus compatibility, so every serial from 61 onward is
//! one day ahead of a plain day count.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

const SECONDS_PER_DAY: f64 = 86_400.0;

fn epoch_before_leap_bug() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 31).expect("valid epoch")
}

fn epoch_after_leap_bug() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).expect("valid epoch")
}

/// Convert a date-time to an Excel serial number
pub fn to_excel_serial(value: NaiveDateTime) -> f64 {
    let date = value.date();
    let march_first = NaiveDate::from_ymd_opt(1900, 3, 1).expect("valid date");
    let epoch = if date < march_first {
        epoch_before_leap_bug()
    } else {
        epoch_after_leap_bug()
    };
    let days = (date - epoch).num_days() as f64;
    let seconds = value.time().num_seconds_from_midnight() as f64
        + value.time().nanosecond() as f64 / 1e9;
    days + seconds / SECONDS_PER_DAY
}

/// Convert an Excel serial number to a date-time
///
/// Returns `None` for negative serials, non-finite input, and the phantom
/// serial 60.
pub fn from_excel_serial(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let days = serial.floor();
    if days == 60.0 {
        return None;
    }
    let epoch = if days < 60.0 {
        epoch_before_leap_bug()
    } else {
        epoch_after_leap_bug()
    };
    let date = epoch.checked_add_signed(Duration::days(days as i64))?;
    let seconds = ((serial - days) * SECONDS_PER_DAY).round() as i64;
    let midnight = date.and_time(NaiveTime::MIN);
    midnight.checked_add_signed(Duration::seconds(seconds))
}
