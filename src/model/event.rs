use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Raw punch recorded by the clock device. The status code is carried
/// through unchanged; the summary engine only cares that the punch exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AttendanceEvent {
    pub employee_id: i64,
    pub timestamp: NaiveDateTime,
    pub status_code: i64,
}
