//! Weekday-dependent target dates and best-effort date coercion

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::cell::CellValue;

/// How far back from today a lookup reaches.
///
/// Both rules assume the run happens on a business day; the report is
/// produced the morning after the shift it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetDateRule {
    /// Monday goes back to Friday (3 days), every other day to yesterday
    PreviousWorkday,
    /// Monday and Tuesday go back 4 days, every other day 2 days
    TwoWorkdaysBack,
}

impl TargetDateRule {
    /// Resolve the rule against a calendar day
    pub fn target_date(self, today: NaiveDate) -> NaiveDate {
        let days = match (self, today.weekday()) {
            (TargetDateRule::PreviousWorkday, Weekday::Mon) => 3,
            (TargetDateRule::PreviousWorkday, _) => 1,
            (TargetDateRule::TwoWorkdaysBack, Weekday::Mon | Weekday::Tue) => 4,
            (TargetDateRule::TwoWorkdaysBack, _) => 2,
        };
        today - Duration::days(days)
    }
}

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
    // month-first, as the header cells are read with US conventions...
    "%m/%d/%Y",
    "%m.%d.%Y",
    "%m-%d-%Y",
    // ...and day-first when the first field cannot be a month
    "%d/%m/%Y",
    "%d.%m.%Y",
    "%d-%m-%Y",
    "%d. %m. %Y",
];

const TIME_SUFFIXES: &[&str] = &[" %H:%M:%S", " %H:%M", "T%H:%M:%S", "T%H:%M:%S%.f", " %H:%M:%S%.f"];

/// Parse a text cell as a calendar day.
///
/// Accepts ISO dates, slash/dot/dash separated month-first or day-first
/// dates, the spaced European form `14. 3. 2025`, each optionally followed
/// by a time of day (which is dropped). Returns `None` for anything else.
pub fn parse_date_text(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() || !text.chars().next()?.is_ascii_digit() {
        return None;
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date);
        }
        for suffix in TIME_SUFFIXES {
            let with_time = format!("{}{}", format, suffix);
            if let Ok(dt) = NaiveDateTime::parse_from_str(text, &with_time) {
                return Some(dt.date());
            }
        }
    }
    None
}

/// Coerce a header cell to a calendar day.
///
/// Native dates lose their time part; strings go through
/// [`parse_date_text`]; every other value is not a date.
pub fn coerce_date(value: &CellValue) -> Option<NaiveDate> {
    match value {
        CellValue::DateTime(dt) => Some(dt.date()),
        CellValue::String(s) => parse_date_text(s),
        _ => None,
    }
}
