mod models;

pub use models::*;

use anyhow::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

pub type DbPool = SqlitePool;

/// Execute a SQL migration file, properly handling comments
async fn execute_sql(pool: &SqlitePool, sql: &str) -> Result<()> {
    for statement in sql.split(';') {
        let cleaned: String = statement
            .lines()
            .filter(|line| !line.trim().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n");
        let trimmed = cleaned.trim();
        if !trimmed.is_empty() {
            sqlx::query(trimmed).execute(pool).await?;
        }
    }
    Ok(())
}

/// Open the on-disk database under `data_dir` and bring the schema up to date.
pub async fn init(data_dir: &Path) -> Result<DbPool> {
    let db_path = data_dir.join("tenancy.db");
    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    info!("Initializing database at {}", db_path.display());

    let pool = connect(&db_url, 5).await?;

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;

    info!("Database initialized successfully");
    Ok(pool)
}

/// Connect to any SQLite URL and run migrations.
///
/// In-memory databases live only as long as their connection, so callers
/// passing `sqlite::memory:` should use a single connection.
pub async fn connect(url: &str, max_connections: u32) -> Result<DbPool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect(url)
        .await?;

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;
    Ok(pool)
}

async fn table_exists(pool: &SqlitePool, table: &str) -> Result<bool> {
    let found: Option<(String,)> =
        sqlx::query_as("SELECT name FROM sqlite_master WHERE type='table' AND name = ?")
            .bind(table)
            .fetch_optional(pool)
            .await?;
    Ok(found.is_some())
}

async fn index_exists(pool: &SqlitePool, index: &str) -> Result<bool> {
    let found: Option<(String,)> =
        sqlx::query_as("SELECT name FROM sqlite_master WHERE type='index' AND name = ?")
            .bind(index)
            .fetch_optional(pool)
            .await?;
    Ok(found.is_some())
}

async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Running database migrations...");

    // Migration 001: Users, sessions, categories, amenities
    if !table_exists(pool, "users").await? {
        execute_sql(pool, include_str!("../../migrations/001_initial.sql")).await?;
    }

    // Migration 002: Listings and rooms
    if !table_exists(pool, "listings").await? {
        execute_sql(pool, include_str!("../../migrations/002_listings.sql")).await?;
    }

    // Migration 003: Leases, payments, maintenance, viewings
    if !table_exists(pool, "lease_contracts").await? {
        execute_sql(pool, include_str!("../../migrations/003_tenancy.sql")).await?;
    }

    // Migration 004: Registration verification
    if !table_exists(pool, "registrations").await? {
        execute_sql(pool, include_str!("../../migrations/004_registrations.sql")).await?;
    }

    // Migration 005: Audit logs
    if !table_exists(pool, "audit_logs").await? {
        execute_sql(pool, include_str!("../../migrations/005_audit_logs.sql")).await?;
    }

    // Migration 006: Uniqueness of active leases and pending viewings
    if !index_exists(pool, "idx_leases_active_listing").await? {
        execute_sql(pool, include_str!("../../migrations/006_active_uniqueness.sql")).await?;
    }

    info!("Migrations completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_create_schema_and_are_idempotent() {
        let pool = connect("sqlite::memory:", 1).await.unwrap();

        for table in [
            "users",
            "sessions",
            "listings",
            "rooms",
            "lease_contracts",
            "payments",
            "maintenance_requests",
            "viewing_requests",
            "registrations",
            "verification_codes",
            "audit_logs",
        ] {
            assert!(table_exists(&pool, table).await.unwrap(), "{} missing", table);
        }
        assert!(index_exists(&pool, "idx_viewings_pending").await.unwrap());

        run_migrations(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_only_one_active_lease_per_listing() {
        let pool = connect("sqlite::memory:", 1).await.unwrap();
        for (id, email) in [("u1", "owner@example.com"), ("u2", "tenant@example.com")] {
            sqlx::query("INSERT INTO users (id, email, name, password_hash) VALUES (?, ?, 'x', 'x')")
                .bind(id)
                .bind(email)
                .execute(&pool)
                .await
                .unwrap();
        }
        sqlx::query(
            "INSERT INTO listings (id, landlord_id, title, description, address, city, monthly_rent) VALUES ('l1', 'u1', 't', 'd', 'a', 'c', 100)",
        )
        .execute(&pool)
        .await
        .unwrap();

        let insert = |id: &'static str, status: &'static str| {
            sqlx::query(
                "INSERT INTO lease_contracts (id, listing_id, tenant_id, landlord_id, rent_amount, due_day, start_date, status) VALUES (?, 'l1', 'u2', 'u1', 100, 1, '2026-01-01', ?)",
            )
            .bind(id)
            .bind(status)
        };

        insert("a", "active").execute(&pool).await.unwrap();
        insert("b", "terminated").execute(&pool).await.unwrap();
        let err = insert("c", "active").execute(&pool).await.unwrap_err();
        match err {
            sqlx::Error::Database(db_err) => assert!(db_err.is_unique_violation()),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_execute_sql_statement_splitting_ignores_comments() {
        let sql = include_str!("../../migrations/005_audit_logs.sql");
        let statements: Vec<_> = sql
            .split(';')
            .map(|s| {
                s.lines()
                    .filter(|l| !l.trim().starts_with("--"))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .filter(|s| !s.trim().is_empty())
            .collect();
        assert_eq!(statements.len(), 3);
    }
}
