//! Version-tracked database migrations for the libSQL backend.
//!
//! Each migration has a version number and SQL. `run_migrations()` checks
//! the current version and applies only the new ones sequentially.

use libsql::Connection;

use crate::error::DatabaseError;

/// A single migration step.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. Add new versions to the end.
static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: r#"
        CREATE TABLE IF NOT EXISTS bookings (
            id TEXT PRIMARY KEY,
            display_code TEXT NOT NULL,
            identity TEXT NOT NULL,
            service_key TEXT NOT NULL,
            service_name TEXT NOT NULL,
            service_category TEXT NOT NULL,
            service_fee TEXT NOT NULL,
            duration_minutes INTEGER NOT NULL,
            slot_key TEXT NOT NULL,
            slot_label TEXT NOT NULL,
            slot_start TEXT NOT NULL,
            slot_end TEXT NOT NULL,
            location TEXT NOT NULL,
            zone TEXT NOT NULL,
            logistics_fee TEXT NOT NULL,
            total_fee TEXT NOT NULL,
            payment_method TEXT NOT NULL,
            payment_reference TEXT,
            payment_status TEXT NOT NULL DEFAULT 'pending',
            prediagnosis TEXT,
            status TEXT NOT NULL DEFAULT 'pending',
            scheduled_time TEXT NOT NULL,
            idempotency_key TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_bookings_identity ON bookings(identity);
        CREATE INDEX IF NOT EXISTS idx_bookings_status ON bookings(status);
        CREATE INDEX IF NOT EXISTS idx_bookings_payment_reference
            ON bookings(payment_reference);

        CREATE TABLE IF NOT EXISTS health_profiles (
            identity TEXT PRIMARY KEY,
            display_name TEXT,
            visit_count INTEGER NOT NULL DEFAULT 0,
            last_visit TEXT,
            conditions TEXT NOT NULL DEFAULT '[]',
            preferred_categories TEXT NOT NULL DEFAULT '[]',
            payment_methods TEXT NOT NULL DEFAULT '[]',
            prefs TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS loyalty_transactions (
            id TEXT PRIMARY KEY,
            identity TEXT NOT NULL,
            points INTEGER NOT NULL,
            reason TEXT NOT NULL,
            booking_id TEXT,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_loyalty_identity
            ON loyalty_transactions(identity);

        CREATE TABLE IF NOT EXISTS referral_codes (
            code TEXT PRIMARY KEY,
            owner TEXT NOT NULL,
            uses INTEGER NOT NULL DEFAULT 0,
            max_uses INTEGER NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_referral_owner ON referral_codes(owner);

        CREATE TABLE IF NOT EXISTS notifications (
            id TEXT PRIMARY KEY,
            identity TEXT NOT NULL,
            kind TEXT NOT NULL,
            body TEXT NOT NULL,
            scheduled_for TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            booking_id TEXT,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_notifications_due
            ON notifications(status, scheduled_for);
        CREATE INDEX IF NOT EXISTS idx_notifications_booking
            ON notifications(booking_id);
    "#,
}];

/// Apply all migrations newer than the recorded version.
pub async fn run(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        (),
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("creating _migrations table: {e}")))?;

    let current = current_version(conn).await?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        conn.execute_batch(migration.sql)
            .await
            .map_err(|e| {
                DatabaseError::Migration(format!(
                    "migration v{} ({}): {e}",
                    migration.version, migration.name
                ))
            })?;

        conn.execute(
            "INSERT INTO _migrations (version, name) VALUES (?1, ?2)",
            libsql::params![migration.version, migration.name],
        )
        .await
        .map_err(|e| {
            DatabaseError::Migration(format!(
                "recording migration v{}: {e}",
                migration.version
            ))
        })?;

        tracing::info!(
            version = migration.version,
            name = migration.name,
            "Applied migration"
        );
    }

    Ok(())
}

async fn current_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("reading migration version: {e}")))?;

    match rows
        .next()
        .await
        .map_err(|e| DatabaseError::Migration(e.to_string()))?
    {
        Some(row) => row
            .get::<i64>(0)
            .map_err(|e| DatabaseError::Migration(e.to_string())),
        None => Ok(0),
    }
}
