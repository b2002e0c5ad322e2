use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Employee {
    pub employee_id: i64,
    pub name: Option<String>,
    pub department: Option<String>,
}
