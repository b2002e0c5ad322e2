use std::collections::BTreeMap;

use chrono::NaiveDate;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::model::employee::Employee;
use crate::model::event::AttendanceEvent;
use crate::model::makeup::MakeupEntry;
use crate::summary::SummaryFilters;

/// Load punch events constrained by the optional filters, ascending by
/// timestamp. Date bounds compare against the date portion of the
/// timestamp, inclusive on both ends.
pub async fn fetch_events(
    pool: &SqlitePool,
    filters: &SummaryFilters,
) -> Result<Vec<AttendanceEvent>, sqlx::Error> {
    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT employee_id, timestamp, status_code FROM attendance_events WHERE 1 = 1",
    );
    if let Some(employee_id) = filters.employee_id {
        query.push(" AND employee_id = ").push_bind(employee_id);
    }
    if let Some(start_date) = filters.start_date {
        query.push(" AND date(timestamp) >= date(").push_bind(start_date).push(")");
    }
    if let Some(end_date) = filters.end_date {
        query.push(" AND date(timestamp) <= date(").push_bind(end_date).push(")");
    }
    query.push(" ORDER BY timestamp ASC");

    query.build_query_as::<AttendanceEvent>().fetch_all(pool).await
}

/// Insert newly observed punches, skipping any (employee, timestamp,
/// status) triple already stored. Returns the number of new rows.
pub async fn insert_events(
    pool: &SqlitePool,
    events: &[AttendanceEvent],
) -> Result<u64, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let mut inserted = 0u64;
    for event in events {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO attendance_events (employee_id, timestamp, status_code) \
             VALUES (?, ?, ?)",
        )
        .bind(event.employee_id)
        .bind(event.timestamp)
        .bind(event.status_code)
        .execute(&mut *tx)
        .await?;
        inserted += result.rows_affected();
    }
    tx.commit().await?;

    debug!(received = events.len(), inserted, "stored attendance events");
    Ok(inserted)
}

/// Return stored make-up hours keyed by (employee_id, date).
pub async fn fetch_makeup_hours(
    pool: &SqlitePool,
    filters: &SummaryFilters,
) -> Result<BTreeMap<(i64, NaiveDate), MakeupEntry>, sqlx::Error> {
    let mut query: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT employee_id, date, hours, note FROM makeup_hours WHERE 1 = 1");
    if let Some(employee_id) = filters.employee_id {
        query.push(" AND employee_id = ").push_bind(employee_id);
    }
    if let Some(start_date) = filters.start_date {
        query.push(" AND date >= date(").push_bind(start_date).push(")");
    }
    if let Some(end_date) = filters.end_date {
        query.push(" AND date <= date(").push_bind(end_date).push(")");
    }
    query.push(" ORDER BY date ASC");

    let rows = query.build_query_as::<MakeupEntry>().fetch_all(pool).await?;
    Ok(rows
        .into_iter()
        .map(|entry| ((entry.employee_id, entry.date), entry))
        .collect())
}

/// Create or replace the make-up entry for the given employee/date.
pub async fn set_makeup_hours(
    pool: &SqlitePool,
    employee_id: i64,
    date: NaiveDate,
    hours: f64,
    note: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO makeup_hours (employee_id, date, hours, note)
        VALUES (?, date(?), ?, ?)
        ON CONFLICT(employee_id, date)
        DO UPDATE SET
            hours = excluded.hours,
            note = excluded.note,
            created_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(employee_id)
    .bind(date)
    .bind(hours)
    .bind(note)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn fetch_employees(pool: &SqlitePool) -> Result<Vec<Employee>, sqlx::Error> {
    sqlx::query_as::<_, Employee>(
        "SELECT employee_id, name, department FROM employees ORDER BY employee_id",
    )
    .fetch_all(pool)
    .await
}

pub async fn get_employee(
    pool: &SqlitePool,
    employee_id: i64,
) -> Result<Option<Employee>, sqlx::Error> {
    sqlx::query_as::<_, Employee>(
        "SELECT employee_id, name, department FROM employees WHERE employee_id = ?",
    )
    .bind(employee_id)
    .fetch_optional(pool)
    .await
}

/// Ensure the employee exists and update metadata when provided. Fields
/// passed as None keep their stored value.
pub async fn upsert_employee(
    pool: &SqlitePool,
    employee_id: i64,
    name: Option<&str>,
    department: Option<&str>,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    sqlx::query("INSERT OR IGNORE INTO employees (employee_id, name, department) VALUES (?, ?, ?)")
        .bind(employee_id)
        .bind(name)
        .bind(department)
        .execute(&mut *tx)
        .await?;
    if name.is_some() || department.is_some() {
        sqlx::query(
            r#"
            UPDATE employees
            SET name = COALESCE(?, name),
                department = COALESCE(?, department)
            WHERE employee_id = ?
            "#,
        )
        .bind(name)
        .bind(department)
        .bind(employee_id)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await
}

/// Remove an employee together with their punches and make-up entries.
pub async fn delete_employee(pool: &SqlitePool, employee_id: i64) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM attendance_events WHERE employee_id = ?")
        .bind(employee_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM makeup_hours WHERE employee_id = ?")
        .bind(employee_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM employees WHERE employee_id = ?")
        .bind(employee_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use chrono::NaiveDateTime;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use std::str::FromStr;

    async fn test_pool() -> SqlitePool {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").unwrap();
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();
        db::create_schema(&pool).await.unwrap();
        pool
    }

    fn punch(employee_id: i64, stamp: &str) -> AttendanceEvent {
        AttendanceEvent {
            employee_id,
            timestamp: NaiveDateTime::parse_from_str(stamp, "%Y-%m-%d %H:%M:%S").unwrap(),
            status_code: 1,
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[tokio::test]
    async fn insert_events_is_idempotent() {
        let pool = test_pool().await;
        let batch = vec![punch(1, "2024-01-01 08:00:00"), punch(1, "2024-01-01 17:00:00")];

        assert_eq!(insert_events(&pool, &batch).await.unwrap(), 2);
        assert_eq!(insert_events(&pool, &batch).await.unwrap(), 0);

        let stored = fetch_events(&pool, &SummaryFilters::default()).await.unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[tokio::test]
    async fn fetch_events_filters_by_date_portion_and_sorts() {
        let pool = test_pool().await;
        let batch = vec![
            punch(1, "2024-01-02 17:00:00"),
            punch(1, "2024-01-02 08:00:00"),
            punch(1, "2024-01-01 23:59:59"),
            punch(1, "2024-01-03 00:00:00"),
        ];
        insert_events(&pool, &batch).await.unwrap();

        let filters = SummaryFilters {
            employee_id: None,
            start_date: Some(date("2024-01-02")),
            end_date: Some(date("2024-01-02")),
        };
        let stored = fetch_events(&pool, &filters).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored[0].timestamp < stored[1].timestamp);
        assert_eq!(stored[0].timestamp.time(), chrono::NaiveTime::from_hms_opt(8, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn fetch_events_filters_by_employee() {
        let pool = test_pool().await;
        insert_events(
            &pool,
            &[punch(1, "2024-01-01 08:00:00"), punch(2, "2024-01-01 08:00:00")],
        )
        .await
        .unwrap();

        let filters = SummaryFilters { employee_id: Some(2), ..Default::default() };
        let stored = fetch_events(&pool, &filters).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].employee_id, 2);
    }

    #[tokio::test]
    async fn makeup_hours_last_write_wins() {
        let pool = test_pool().await;
        let day = date("2024-01-05");
        set_makeup_hours(&pool, 3, day, 2.0, Some("device offline")).await.unwrap();
        set_makeup_hours(&pool, 3, day, 4.5, None).await.unwrap();

        let lookup = fetch_makeup_hours(&pool, &SummaryFilters::default()).await.unwrap();
        assert_eq!(lookup.len(), 1);
        let entry = &lookup[&(3, day)];
        assert_eq!(entry.hours, 4.5);
        assert_eq!(entry.note, None);
    }

    #[tokio::test]
    async fn fetch_makeup_hours_respects_range() {
        let pool = test_pool().await;
        set_makeup_hours(&pool, 1, date("2024-01-01"), 1.0, None).await.unwrap();
        set_makeup_hours(&pool, 1, date("2024-02-01"), 2.0, None).await.unwrap();

        let filters = SummaryFilters {
            employee_id: None,
            start_date: Some(date("2024-01-01")),
            end_date: Some(date("2024-01-31")),
        };
        let lookup = fetch_makeup_hours(&pool, &filters).await.unwrap();
        assert_eq!(lookup.len(), 1);
        assert!(lookup.contains_key(&(1, date("2024-01-01"))));
    }

    #[tokio::test]
    async fn upsert_employee_keeps_fields_not_provided() {
        let pool = test_pool().await;
        upsert_employee(&pool, 9, Some("Minh"), None).await.unwrap();
        upsert_employee(&pool, 9, None, Some("QA")).await.unwrap();

        let employee = get_employee(&pool, 9).await.unwrap().unwrap();
        assert_eq!(employee.name.as_deref(), Some("Minh"));
        assert_eq!(employee.department.as_deref(), Some("QA"));
    }

    #[tokio::test]
    async fn delete_employee_removes_related_rows() {
        let pool = test_pool().await;
        upsert_employee(&pool, 4, Some("Hoa"), None).await.unwrap();
        insert_events(&pool, &[punch(4, "2024-01-01 08:00:00")]).await.unwrap();
        set_makeup_hours(&pool, 4, date("2024-01-02"), 1.0, None).await.unwrap();

        delete_employee(&pool, 4).await.unwrap();

        assert!(get_employee(&pool, 4).await.unwrap().is_none());
        assert!(fetch_events(&pool, &SummaryFilters::default()).await.unwrap().is_empty());
        assert!(
            fetch_makeup_hours(&pool, &SummaryFilters::default()).await.unwrap().is_empty()
        );
    }
}
