use anyhow::Context;
use chrono::NaiveDate;
use dotenvy::dotenv;

mod config;
mod db;
mod model;
mod store;
mod summary;

use config::Config;
use summary::SummaryFilters;
use tracing::info;

fn parse_filters<I>(mut args: I) -> anyhow::Result<SummaryFilters>
where
    I: Iterator<Item = String>,
{
    let mut filters = SummaryFilters::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--employee" => {
                let value = args.next().context("--employee requires a value")?;
                filters.employee_id =
                    Some(value.parse().with_context(|| format!("invalid employee id: {value}"))?);
            }
            "--start" => {
                let value = args.next().context("--start requires a value")?;
                filters.start_date = Some(parse_date(&value)?);
            }
            "--end" => {
                let value = args.next().context("--end requires a value")?;
                filters.end_date = Some(parse_date(&value)?);
            }
            other => anyhow::bail!(
                "unknown argument: {other} (expected --employee, --start, --end)"
            ),
        }
    }
    Ok(filters)
}

fn parse_date(value: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("invalid date (expected YYYY-MM-DD): {value}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    let filters = parse_filters(std::env::args().skip(1))?;
    let config = Config::from_env();

    let pool = db::connect(&config.database_url)
        .await
        .with_context(|| format!("failed to open database {}", config.database_url))?;
    db::create_schema(&pool).await?;

    let rows = summary::daily_summary(&pool, &filters).await?;
    info!(rows = rows.len(), "daily summary computed");

    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}
