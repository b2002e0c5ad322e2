use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Manually credited work hours for one employee on one date. At most one
/// entry exists per (employee_id, date); a later write replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MakeupEntry {
    pub employee_id: i64,
    pub date: NaiveDate,
    pub hours: f64,
    pub note: Option<String>,
}
