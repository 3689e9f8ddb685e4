// oppsift - core/dates.rs
//
// Best-effort calendar-date coercion and the fixed reference clock used by
// every relative-date filter.
//
// Coercion never fails: anything that does not look like a date becomes a
// null cell. Coercing an already-coerced value returns it unchanged.

use crate::core::model::Cell;
use crate::util::constants;
use chrono::{DateTime, Datelike, Days, Duration, NaiveDate, NaiveDateTime, Utc};

/// Date-time layouts tried after RFC 3339, all with an explicit offset.
/// The calendar date is taken in the stated offset, not converted to UTC.
/// `%#z` also accepts hour-only offsets such as "-06".
const OFFSET_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%#z",
    "%Y-%m-%d %H:%M:%S%.f%#z",
    "%Y-%m-%d %H:%M:%S%.f %#z",
];

/// Naive date-time layouts. `%.f` also accepts an absent fraction.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
];

/// Date-only layouts. Slash dates are read month-first, like US exports.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%d-%b-%Y",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%b %d %Y",
    "%Y%m%d",
];

// =============================================================================
// Parsing and coercion
// =============================================================================

/// Parse a date-like string into a calendar date, dropping any time of day.
///
/// Returns `None` for empty or unrecognised input.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local().date());
    }
    for format in OFFSET_DATETIME_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, format) {
            return Some(dt.naive_local().date());
        }
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(ndt.date());
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(s, format).ok())
}

/// Coerce one cell to a pure calendar date, or null when it is not date-like.
pub fn force_date(cell: &Cell) -> Cell {
    match cell {
        Cell::Date(d) => Cell::Date(*d),
        Cell::DateTime(dt) => Cell::Date(dt.date()),
        Cell::Text(s) => parse_date(s).map_or(Cell::Null, Cell::Date),
        // Compact `yyyymmdd` dates load as integers.
        Cell::Int(i) if (10_000_101..=99_991_231).contains(i) => {
            parse_date(&i.to_string()).map_or(Cell::Null, Cell::Date)
        }
        Cell::Null | Cell::Bool(_) | Cell::Int(_) | Cell::Float(_) => Cell::Null,
    }
}

/// Coerce a whole column of cells. Idempotent.
pub fn force_date_column(values: &[Cell]) -> Vec<Cell> {
    values.iter().map(force_date).collect()
}

// =============================================================================
// Reference clock
// =============================================================================

/// Today's date in the fixed reference timezone.
///
/// Independent of the host's local timezone so relative filters are
/// reproducible wherever the pipeline runs.
pub fn reference_today() -> NaiveDate {
    reference_date_at(Utc::now())
}

/// Calendar date in the reference timezone at the given instant.
pub fn reference_date_at(now: DateTime<Utc>) -> NaiveDate {
    (now.naive_utc() + Duration::seconds(constants::REFERENCE_UTC_OFFSET_SECS)).date()
}

/// Shift a date by whole days, saturating at the representable range.
pub fn shift_days(date: NaiveDate, days: i64) -> NaiveDate {
    let magnitude = Days::new(days.unsigned_abs());
    if days >= 0 {
        date.checked_add_days(magnitude).unwrap_or(NaiveDate::MAX)
    } else {
        date.checked_sub_days(magnitude).unwrap_or(NaiveDate::MIN)
    }
}

/// Inclusive calendar-date window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Single-day window.
    pub fn day(date: NaiveDate) -> Self {
        Self::new(date, date)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Monday-to-Sunday week containing `date`.
    pub fn week_of(date: NaiveDate) -> Self {
        let monday = shift_days(date, -i64::from(date.weekday().num_days_from_monday()));
        Self::new(monday, shift_days(monday, 6))
    }

    /// The Monday-to-Sunday week before the one containing `date`.
    pub fn week_before(date: NaiveDate) -> Self {
        let this_week = Self::week_of(date);
        Self::new(
            shift_days(this_week.start, -7),
            shift_days(this_week.start, -1),
        )
    }
}
