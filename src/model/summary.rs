use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// One reconciled attendance day for one employee. Derived by the summary
/// engine, never persisted. Field names are a compatibility contract with
/// downstream consumers of the JSON output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub employee_id: i64,
    pub name: Option<String>,
    pub department: Option<String>,
    pub date: NaiveDate,
    pub check_in: Option<NaiveTime>,
    pub check_out: Option<NaiveTime>,
    /// Hours between check-in and check-out, lunch break deducted,
    /// rounded to two decimals. Absent unless both punches survived.
    pub worked_hours: Option<f64>,
    pub late_minutes: i64,
    pub early_leave_minutes: i64,
    pub makeup_hours: f64,
    pub makeup_note: Option<String>,
    /// worked_hours + makeup_hours, rounded to two decimals. Absent when
    /// the sum is exactly zero.
    pub total_hours: Option<f64>,
    pub missing_check_in: bool,
    pub missing_check_out: bool,
    pub is_day_off: bool,
    /// 0 = Monday .. 6 = Sunday.
    pub weekday: u32,
    pub weekday_label: String,
    pub is_weekend: bool,
    pub worked_on_weekend: bool,
    pub weekend_note: Option<String>,
}
