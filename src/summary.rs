//! Daily attendance summary engine.
//!
//! Pure computation: raw punches, make-up entries, and the employee
//! directory go in, one reconciled row per (employee, date) comes out.
//! All I/O lives in [`crate::store`]; [`daily_summary`] is the async glue
//! tying the two together.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::SqlitePool;
use tracing::debug;

use crate::model::employee::Employee;
use crate::model::event::AttendanceEvent;
use crate::model::makeup::MakeupEntry;
use crate::model::summary::DailySummary;
use crate::store;

const LUNCH_BREAK_SECONDS: i64 = 3600;

// Shift policy. Fixed by company rule, not runtime configuration.
fn work_start() -> NaiveTime {
    at(8, 0)
}

fn lunch_start() -> NaiveTime {
    at(12, 0)
}

fn afternoon_start() -> NaiveTime {
    at(13, 0)
}

fn work_end() -> NaiveTime {
    at(17, 0)
}

fn at(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).expect("valid wall-clock time")
}

#[derive(Debug, Clone, Default)]
pub struct SummaryFilters {
    pub employee_id: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Check-in/out and derived metrics for one employee/date group before
/// make-up hours and calendar flags are merged in.
#[derive(Debug, Clone, Default)]
struct DayMetrics {
    check_in: Option<NaiveDateTime>,
    check_out: Option<NaiveDateTime>,
    worked_hours: Option<f64>,
    late_minutes: i64,
    early_leave_minutes: i64,
}

/// Reconcile one day's punches into check-in/check-out and metrics.
///
/// The earliest and latest punches are the starting candidates. An
/// earliest punch already in the afternoon is replaced by the earliest
/// pre-lunch punch (or dropped); a latest punch still in the morning is
/// replaced by the latest punch at or after the afternoon start (or
/// dropped). Lateness and early leave are measured against the 08:00 and
/// 17:00 shift bounds from whichever punches survive.
fn reconcile_day(date: NaiveDate, timestamps: &[NaiveDateTime]) -> DayMetrics {
    let (Some(&earliest), Some(&latest)) = (timestamps.iter().min(), timestamps.iter().max())
    else {
        return DayMetrics::default();
    };

    let mut check_in = Some(earliest);
    let mut check_out = Some(latest);

    if earliest.time() >= lunch_start() {
        check_in = timestamps.iter().filter(|ts| ts.time() < lunch_start()).min().copied();
    }
    if latest.time() < lunch_start() {
        check_out = timestamps.iter().filter(|ts| ts.time() >= afternoon_start()).max().copied();
    }
    if let (Some(ci), Some(co)) = (check_in, check_out) {
        if ci > co {
            check_in = Some(co);
            check_out = Some(ci);
        }
    }

    let mut worked_hours = None;
    if let (Some(ci), Some(co)) = (check_in, check_out) {
        if co > ci {
            let mut seconds = (co - ci).num_seconds();
            let spans_lunch = ci.time() <= lunch_start() && co.time() >= afternoon_start();
            if spans_lunch && seconds > 6 * 3600 {
                seconds -= LUNCH_BREAK_SECONDS;
            }
            worked_hours = Some(round2(seconds.max(0) as f64 / 3600.0));
        }
    }

    let shift_start = date.and_time(work_start());
    let shift_end = date.and_time(work_end());
    let late_minutes = check_in
        .map(|ci| minutes_between(shift_start, ci).max(0))
        .unwrap_or(0);
    let early_leave_minutes = check_out
        .map(|co| minutes_between(co, shift_end).max(0))
        .unwrap_or(0);

    DayMetrics { check_in, check_out, worked_hours, late_minutes, early_leave_minutes }
}

/// Signed whole minutes from `from` to `to`, rounded to the nearest
/// minute (half away from zero).
fn minutes_between(from: NaiveDateTime, to: NaiveDateTime) -> i64 {
    ((to - from).num_seconds() as f64 / 60.0).round() as i64
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Compute one summary row per (employee, date) with any activity.
///
/// Rows come from three sources: real punch groups, make-up entries with
/// no punches, and (when both range bounds are given) placeholder days
/// filling the calendar for every employee that already has a row.
/// Employees whose every row is a day off with zero make-up hours are
/// dropped. Output is ordered by employee id, then date.
pub fn compute_daily_summaries(
    events: &[AttendanceEvent],
    makeup: &BTreeMap<(i64, NaiveDate), MakeupEntry>,
    employees: &[Employee],
    filters: &SummaryFilters,
) -> Vec<DailySummary> {
    let mut grouped: BTreeMap<(i64, NaiveDate), Vec<NaiveDateTime>> = BTreeMap::new();
    for event in events {
        grouped
            .entry((event.employee_id, event.timestamp.date()))
            .or_default()
            .push(event.timestamp);
    }

    let mut days: BTreeMap<(i64, NaiveDate), DayMetrics> = BTreeMap::new();
    for ((employee_id, date), timestamps) in &grouped {
        days.insert((*employee_id, *date), reconcile_day(*date, timestamps));
    }

    // Make-up entries with no punches that day still carry a row.
    for (employee_id, date) in makeup.keys() {
        days.entry((*employee_id, *date)).or_default();
    }

    if days.is_empty() {
        return Vec::new();
    }

    let mut active: BTreeSet<i64> = days.keys().map(|(employee_id, _)| *employee_id).collect();
    if let Some(employee_id) = filters.employee_id {
        active.retain(|candidate| *candidate == employee_id);
    }

    // Dense calendar fill, only when the caller pinned both bounds and
    // only for employees that already surfaced above.
    if let (Some(start), Some(end)) = (filters.start_date, filters.end_date) {
        for employee_id in &active {
            for date in start.iter_days().take_while(|date| *date <= end) {
                days.entry((*employee_id, date)).or_default();
            }
        }
    }

    let directory: BTreeMap<i64, &Employee> =
        employees.iter().map(|employee| (employee.employee_id, employee)).collect();

    let mut rows: Vec<DailySummary> = Vec::with_capacity(days.len());
    for ((employee_id, date), metrics) in &days {
        if !active.contains(employee_id) {
            continue;
        }

        let entry = makeup.get(&(*employee_id, *date));
        let makeup_hours = entry.map(|m| m.hours).unwrap_or(0.0);
        let makeup_note = entry.and_then(|m| m.note.clone());
        let total = metrics.worked_hours.unwrap_or(0.0) + makeup_hours;
        // An exact-zero total collapses to absent rather than 0.0.
        let total_hours = (total != 0.0).then(|| round2(total));

        let missing_check_in = metrics.check_in.is_none();
        let missing_check_out = metrics.check_out.is_none();
        let is_day_off = missing_check_in && missing_check_out;

        let weekday = date.weekday().num_days_from_monday();
        let is_weekend = weekday >= 5;
        let worked_on_weekend = is_weekend && !is_day_off;
        let weekend_note =
            (weekday == 5 && !is_day_off).then(|| "Worked on Saturday".to_string());

        let meta = directory.get(employee_id);

        rows.push(DailySummary {
            employee_id: *employee_id,
            name: meta.and_then(|e| e.name.clone()),
            department: meta.and_then(|e| e.department.clone()),
            date: *date,
            check_in: metrics.check_in.map(|ts| ts.time()),
            check_out: metrics.check_out.map(|ts| ts.time()),
            worked_hours: metrics.worked_hours,
            late_minutes: metrics.late_minutes,
            early_leave_minutes: metrics.early_leave_minutes,
            makeup_hours,
            makeup_note,
            total_hours,
            missing_check_in,
            missing_check_out,
            is_day_off,
            weekday,
            weekday_label: date.format("%A").to_string(),
            is_weekend,
            worked_on_weekend,
            weekend_note,
        });
    }

    // Keep only employees with at least one real attendance day or some
    // credited make-up hours anywhere in their row set.
    let mut has_activity: BTreeMap<i64, bool> = BTreeMap::new();
    for row in &rows {
        let flag = has_activity.entry(row.employee_id).or_insert(false);
        if !row.is_day_off || row.makeup_hours > 0.0 {
            *flag = true;
        }
    }
    rows.retain(|row| has_activity.get(&row.employee_id).copied().unwrap_or(false));
    rows
}

/// Fetch events, make-up hours, and the employee directory for the given
/// filters and run the summary computation over them.
pub async fn daily_summary(
    pool: &SqlitePool,
    filters: &SummaryFilters,
) -> anyhow::Result<Vec<DailySummary>> {
    let events = store::fetch_events(pool, filters).await?;
    let makeup = store::fetch_makeup_hours(pool, filters).await?;
    let employees = store::fetch_employees(pool).await?;
    debug!(
        events = events.len(),
        makeup_entries = makeup.len(),
        employees = employees.len(),
        "computing daily summaries"
    );
    Ok(compute_daily_summaries(&events, &makeup, &employees, filters))
}
