use crate::clock::{day_key, local_day, local_midnight, parse_day_key};
use crate::models::{CalendarDay, CalendarMonth, DayStatus, QuitRecord, Reflection};
use chrono::{DateTime, Datelike, Local, NaiveDate, TimeZone};

const MILLIS_PER_HOUR: i64 = 3_600_000;

/// Counts consecutive good days walking back from `today` to the first-opened day.
pub fn streak_days_at(record: &QuitRecord, today: NaiveDate) -> u32 {
    let Some(first_opened) = record.first_opened_date.and_then(local_day) else {
        return 0;
    };
    if today < first_opened {
        return 0;
    }

    let mut streak = 0;
    let mut day = today;
    while day >= first_opened {
        if effective_status(record, day) == DayStatus::Slip {
            break;
        }
        streak += 1;
        match day.pred_opt() {
            Some(prev) => day = prev,
            None => break,
        }
    }
    streak
}

/// Elapsed time since the latest slip, formatted as whole days or hours.
///
/// The latest slip is the most recent calendar day marked slip, measured from
/// its local midnight. Without any slip day the last relapse timestamp is used.
/// A slip day later than `now` reads as "0 hours" rather than a negative count.
pub fn time_since_relapse_at(record: &QuitRecord, now: DateTime<Local>) -> Option<String> {
    let moment = most_recent_slip_day(record)
        .and_then(local_midnight)
        .or_else(|| {
            record
                .last_relapse_date
                .and_then(|millis| Local.timestamp_millis_opt(millis).single())
        })?;

    let elapsed = now.timestamp_millis() - moment.timestamp_millis();
    let hours = elapsed.div_euclid(MILLIS_PER_HOUR).max(0);
    Some(format_elapsed(hours))
}

pub fn format_elapsed(hours: i64) -> String {
    let days = hours / 24;
    if days > 0 {
        return plural(days, "day");
    }
    plural(hours, "hour")
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("1 {unit}")
    } else {
        format!("{count} {unit}s")
    }
}

fn most_recent_slip_day(record: &QuitRecord) -> Option<NaiveDate> {
    record
        .day_statuses
        .iter()
        .filter(|(_, status)| **status == DayStatus::Slip)
        .filter_map(|(key, _)| parse_day_key(key))
        .max()
}

pub fn effective_status(record: &QuitRecord, day: NaiveDate) -> DayStatus {
    record
        .day_statuses
        .get(&day_key(day))
        .copied()
        .unwrap_or(DayStatus::Good)
}

/// Status of a day inside `[first opened, today]`, `None` outside that range.
pub fn day_status_in_range(
    record: &QuitRecord,
    day: NaiveDate,
    today: NaiveDate,
) -> Option<DayStatus> {
    let first_opened = record.first_opened_date.and_then(local_day)?;
    if day < first_opened || day > today {
        return None;
    }
    Some(effective_status(record, day))
}

pub fn calendar_month(
    record: &QuitRecord,
    year: i32,
    month: u32,
    today: NaiveDate,
) -> Option<CalendarMonth> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let mut days = Vec::with_capacity(31);
    let mut next = Some(first);
    while let Some(day) = next.filter(|day| day.month() == month) {
        days.push(CalendarDay {
            date: day_key(day),
            status: day_status_in_range(record, day, today),
        });
        next = day.succ_opt();
    }

    Some(CalendarMonth { year, month, days })
}

/// Relapses and logged actions on one timeline, newest first.
pub fn reflections(record: &QuitRecord) -> Vec<Reflection> {
    let mut items: Vec<Reflection> = record
        .relapse_history
        .iter()
        .cloned()
        .map(Reflection::Relapse)
        .chain(record.trigger_history.iter().cloned().map(Reflection::Action))
        .collect();
    items.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));
    items
}
