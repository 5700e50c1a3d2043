

use anyhow::Result;
use configs::DatabaseConfig;
use migration::MigratorTrait;
use sea_orm::DatabaseConnection;
use tempfile::TempDir;

use crate::db::connect_with_config;

/// Fresh migrated SQLite database in a temp directory; keep the `TempDir` alive for the test.
pub(crate) async fn setup_test_db() -> Result<(TempDir, DatabaseConnection)> {
    let dir = tempfile::tempdir()?;
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("models.db").display());
    let mut cfg = DatabaseConfig::for_url(&url);
    cfg.min_connections = 1;
    cfg.max_connections = 4;
    let db = connect_with_config(&cfg).await?;
    migration::Migrator::up(&db, None).await?;
    Ok((dir, db))
}

pub(crate) fn sample_history() -> crate::service_history::NewServiceHistory {
    crate::service_history::NewServiceHistory {
        customer_id: 7,
        service_id: 3,
        employee_id: 2,
        service_date: chrono::NaiveDate::from_ymd_opt(2024, 5, 17).unwrap(),
        price: 250000.0,
        payment_method: "cash".into(),
        notes: Some("  gel nails  ".into()),
    }
}
