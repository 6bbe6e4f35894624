//! Turns raw `from` / `to` / `range_h` query values into a UTC lookup window.
//!
//! Resolution never fails. `range_h` wins when it is an integer; otherwise
//! each bound is parsed as `YYYY-MM-DD HH:MM` in the display timezone and
//! falls back on its own default (start of today / now) when it doesn't
//! parse. A reversed window is passed through and simply matches no rows.

use chrono::{
    DateTime, Duration, LocalResult, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc,
};
use chrono_tz::Tz;
use log::warn;

/// Wall-clock format of `from` / `to`, both as accepted and as displayed.
pub const WINDOW_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub display_timezone: Tz,
}

impl TimeWindow {
    pub fn display_from(&self) -> String {
        to_display(&self.from, self.display_timezone)
    }

    pub fn display_to(&self) -> String {
        to_display(&self.to, self.display_timezone)
    }
}

pub fn to_display(instant: &DateTime<Utc>, tz: Tz) -> String {
    instant.with_timezone(&tz).format(WINDOW_FORMAT).to_string()
}

/// Unknown zone names resolve to UTC.
pub fn parse_timezone(raw: &str) -> Tz {
    raw.trim().parse().unwrap_or_else(|_| {
        warn!("unknown timezone '{raw}', using UTC");
        Tz::UTC
    })
}

pub fn resolve(
    raw_from: Option<&str>,
    raw_to: Option<&str>,
    raw_range_hours: Option<&str>,
    display_timezone: Tz,
) -> TimeWindow {
    resolve_at(raw_from, raw_to, raw_range_hours, display_timezone, Utc::now())
}

pub fn resolve_at(
    raw_from: Option<&str>,
    raw_to: Option<&str>,
    raw_range_hours: Option<&str>,
    display_timezone: Tz,
    now: DateTime<Utc>,
) -> TimeWindow {
    let now = truncate_to_minute(now);

    if let Some(from) = raw_range_hours
        .and_then(parse_range_hours)
        .and_then(Duration::try_hours)
        .and_then(|span| now.checked_sub_signed(span))
    {
        return TimeWindow {
            from,
            to: now,
            display_timezone,
        };
    }

    let from = raw_from
        .and_then(parse_local)
        .map(|local| localize(display_timezone, local))
        .unwrap_or_else(|| start_of_local_day(now, display_timezone));
    let to = raw_to
        .and_then(parse_local)
        .map(|local| localize(display_timezone, local))
        .unwrap_or(now);

    TimeWindow {
        from,
        to,
        display_timezone,
    }
}

fn parse_range_hours(raw: &str) -> Option<i64> {
    raw.trim().parse().ok()
}

fn parse_local(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.trim(), WINDOW_FORMAT).ok()
}

fn truncate_to_minute(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(instant)
}

fn start_of_local_day(now: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    let midnight = now.with_timezone(&tz).date_naive().and_time(NaiveTime::MIN);
    localize(tz, midnight)
}

/// Wall-clock time in `tz` to UTC. Ambiguous times take the earlier instant;
/// times skipped by a DST jump move forward an hour.
fn localize(tz: Tz, local: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => tz
            .from_local_datetime(&(local + Duration::hours(1)))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| local.and_utc()),
    }
}
