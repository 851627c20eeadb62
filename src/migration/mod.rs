use anyhow::Context;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::prelude::*;
use std::fs::{self, create_dir_all};
use std::path::Path;
use std::time::Duration;

mod m20251001_000001_init;
mod m20251001_000002_create_merchant_offer;
mod m20251008_000001_create_promotions;
mod m20251012_000001_create_notifications;
mod m20251012_000002_create_system_config;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20251001_000001_init::Migration),
            Box::new(m20251001_000002_create_merchant_offer::Migration),
            Box::new(m20251008_000001_create_promotions::Migration),
            Box::new(m20251012_000001_create_notifications::Migration),
            Box::new(m20251012_000002_create_system_config::Migration),
        ]
    }
}

/// 连接数据库，SQLite 文件不存在时先创建
pub async fn connect(database_url: &str) -> anyhow::Result<DatabaseConnection> {
    if let Some(path) = sqlite_file_path(database_url) {
        let path = Path::new(path);
        if !path.exists() {
            if let Some(parent) = path.parent() {
                create_dir_all(parent)
                    .with_context(|| format!("无法创建数据库目录: {}", parent.display()))?;
            }
            fs::write(path, "").with_context(|| format!("无法创建数据库文件: {}", path.display()))?;
        }
    }

    let mut options = ConnectOptions::new(database_url.to_string());
    options
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);

    Database::connect(options)
        .await
        .with_context(|| format!("连接数据库失败: {}", database_url))
}

fn sqlite_file_path(database_url: &str) -> Option<&str> {
    let rest = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() || path.contains(":memory:") {
        return None;
    }
    Some(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_file_path() {
        assert_eq!(sqlite_file_path("sqlite://data/tawfir.db"), Some("data/tawfir.db"));
        assert_eq!(sqlite_file_path("sqlite://data/tawfir.db?mode=rwc"), Some("data/tawfir.db"));
        assert_eq!(sqlite_file_path("sqlite::memory:"), None);
        assert_eq!(sqlite_file_path("postgres://localhost/tawfir"), None);
    }

    #[tokio::test]
    async fn test_migrations_seed_configs() {
        use crate::entity::SystemConfig;
        use sea_orm::{EntityTrait, PaginatorTrait};

        let db = crate::test_support::setup_db().await;
        let count = SystemConfig::find().count(&db).await.unwrap();
        assert_eq!(count, 23);

        Migrator::down(&db, None).await.unwrap();
    }
}
