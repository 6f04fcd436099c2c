//! libSQL backend — async `Database` trait implementation.
//!
//! Supports local file and in-memory databases. Money columns are stored
//! as decimal strings; timestamps as RFC 3339.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, Row, params};
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::booking::{Booking, BookingStatus, PaymentStatus};
use crate::catalog::{PaymentMethod, TimeSlotDef};
use crate::error::DatabaseError;
use crate::logistics::Zone;
use crate::loyalty::{LoyaltyTransaction, ReferralCode};
use crate::notify::model::{Notification, NotificationKind, NotificationStatus};
use crate::profile::{HealthProfile, NotificationPrefs};
use crate::store::migrations;
use crate::store::traits::Database;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        migrations::run(&backend.conn).await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        migrations::run(&backend.conn).await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

fn q(e: libsql::Error) -> DatabaseError {
    let msg = e.to_string();
    if msg.contains("UNIQUE constraint") {
        DatabaseError::Constraint(msg)
    } else {
        DatabaseError::Query(msg)
    }
}

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn parse_optional_datetime(s: Option<String>) -> Option<DateTime<Utc>> {
    s.map(|s| parse_datetime(&s))
}

fn parse_decimal(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap_or(Decimal::ZERO)
}

fn parse_uuid(s: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(s).map_err(|e| DatabaseError::Serialization(format!("bad uuid {s}: {e}")))
}

fn get_str(row: &Row, idx: i32) -> Result<String, DatabaseError> {
    row.get::<String>(idx)
        .map_err(|e| DatabaseError::Serialization(e.to_string()))
}

fn get_opt_str(row: &Row, idx: i32) -> Result<Option<String>, DatabaseError> {
    row.get::<Option<String>>(idx)
        .map_err(|e| DatabaseError::Serialization(e.to_string()))
}

fn get_i64(row: &Row, idx: i32) -> Result<i64, DatabaseError> {
    row.get::<i64>(idx)
        .map_err(|e| DatabaseError::Serialization(e.to_string()))
}

/// Booking column list shared by every SELECT.
///
/// Order: 0:id, 1:display_code, 2:identity, 3:service_key, 4:service_name,
/// 5:service_category, 6:service_fee, 7:duration_minutes, 8:slot_key,
/// 9:slot_label, 10:slot_start, 11:slot_end, 12:location, 13:zone,
/// 14:logistics_fee, 15:total_fee, 16:payment_method, 17:payment_reference,
/// 18:payment_status, 19:prediagnosis, 20:status, 21:scheduled_time,
/// 22:idempotency_key, 23:created_at, 24:updated_at
const BOOKING_COLUMNS: &str = "id, display_code, identity, service_key, service_name, \
     service_category, service_fee, duration_minutes, slot_key, slot_label, slot_start, \
     slot_end, location, zone, logistics_fee, total_fee, payment_method, payment_reference, \
     payment_status, prediagnosis, status, scheduled_time, idempotency_key, created_at, \
     updated_at";

fn row_to_booking(row: &Row) -> Result<Booking, DatabaseError> {
    Ok(Booking {
        id: parse_uuid(&get_str(row, 0)?)?,
        display_code: get_str(row, 1)?,
        identity: get_str(row, 2)?,
        service_key: get_str(row, 3)?,
        service_name: get_str(row, 4)?,
        service_category: get_str(row, 5)?,
        service_fee: parse_decimal(&get_str(row, 6)?),
        duration_minutes: get_i64(row, 7)? as u32,
        slot_key: get_str(row, 8)?,
        slot_label: get_str(row, 9)?,
        slot_start: get_str(row, 10)?,
        slot_end: get_str(row, 11)?,
        location: get_str(row, 12)?,
        zone: Zone::from_str(&get_str(row, 13)?)
            .map_err(DatabaseError::Serialization)?,
        logistics_fee: parse_decimal(&get_str(row, 14)?),
        total_fee: parse_decimal(&get_str(row, 15)?),
        payment_method: PaymentMethod::from_str(&get_str(row, 16)?)
            .map_err(DatabaseError::Serialization)?,
        payment_reference: get_opt_str(row, 17)?,
        payment_status: PaymentStatus::from_str(&get_str(row, 18)?)
            .map_err(DatabaseError::Serialization)?,
        prediagnosis: get_opt_str(row, 19)?,
        status: BookingStatus::from_str(&get_str(row, 20)?)
            .map_err(DatabaseError::Serialization)?,
        scheduled_time: parse_datetime(&get_str(row, 21)?),
        idempotency_key: get_str(row, 22)?,
        created_at: parse_datetime(&get_str(row, 23)?),
        updated_at: parse_datetime(&get_str(row, 24)?),
    })
}

fn row_to_profile(row: &Row) -> Result<HealthProfile, DatabaseError> {
    // 0:identity, 1:display_name, 2:visit_count, 3:last_visit, 4:conditions,
    // 5:preferred_categories, 6:payment_methods, 7:prefs, 8:created_at, 9:updated_at
    let json_vec = |s: String| -> Vec<String> { serde_json::from_str(&s).unwrap_or_default() };
    Ok(HealthProfile {
        identity: get_str(row, 0)?,
        display_name: get_opt_str(row, 1)?,
        visit_count: get_i64(row, 2)?,
        last_visit: parse_optional_datetime(get_opt_str(row, 3)?),
        conditions: json_vec(get_str(row, 4)?),
        preferred_categories: json_vec(get_str(row, 5)?),
        payment_methods: json_vec(get_str(row, 6)?),
        prefs: serde_json::from_str::<NotificationPrefs>(&get_str(row, 7)?).unwrap_or_default(),
        created_at: parse_datetime(&get_str(row, 8)?),
        updated_at: parse_datetime(&get_str(row, 9)?),
    })
}

fn row_to_loyalty_tx(row: &Row) -> Result<LoyaltyTransaction, DatabaseError> {
    // 0:id, 1:identity, 2:points, 3:reason, 4:booking_id, 5:created_at
    Ok(LoyaltyTransaction {
        id: parse_uuid(&get_str(row, 0)?)?,
        identity: get_str(row, 1)?,
        points: get_i64(row, 2)?,
        reason: get_str(row, 3)?,
        booking_id: match get_opt_str(row, 4)? {
            Some(s) => Some(parse_uuid(&s)?),
            None => None,
        },
        created_at: parse_datetime(&get_str(row, 5)?),
    })
}

fn row_to_referral(row: &Row) -> Result<ReferralCode, DatabaseError> {
    // 0:code, 1:owner, 2:uses, 3:max_uses, 4:active, 5:created_at
    Ok(ReferralCode {
        code: get_str(row, 0)?,
        owner: get_str(row, 1)?,
        uses: get_i64(row, 2)? as u32,
        max_uses: get_i64(row, 3)? as u32,
        active: get_i64(row, 4)? != 0,
        created_at: parse_datetime(&get_str(row, 5)?),
    })
}

fn row_to_notification(row: &Row) -> Result<Notification, DatabaseError> {
    // 0:id, 1:identity, 2:kind, 3:body, 4:scheduled_for, 5:status,
    // 6:booking_id, 7:created_at
    Ok(Notification {
        id: parse_uuid(&get_str(row, 0)?)?,
        identity: get_str(row, 1)?,
        kind: NotificationKind::from_str(&get_str(row, 2)?)
            .map_err(DatabaseError::Serialization)?,
        body: get_str(row, 3)?,
        scheduled_for: parse_datetime(&get_str(row, 4)?),
        status: NotificationStatus::from_str(&get_str(row, 5)?)
            .map_err(DatabaseError::Serialization)?,
        booking_id: match get_opt_str(row, 6)? {
            Some(s) => Some(parse_uuid(&s)?),
            None => None,
        },
        created_at: parse_datetime(&get_str(row, 7)?),
    })
}

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run(self.conn()).await
    }

    // ── Bookings ────────────────────────────────────────────────────

    async fn insert_booking(&self, b: &Booking) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO bookings ({BOOKING_COLUMNS}) VALUES \
                     (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, \
                      ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25)"
                ),
                params![
                    b.id.to_string(),
                    b.display_code.clone(),
                    b.identity.clone(),
                    b.service_key.clone(),
                    b.service_name.clone(),
                    b.service_category.clone(),
                    b.service_fee.to_string(),
                    b.duration_minutes as i64,
                    b.slot_key.clone(),
                    b.slot_label.clone(),
                    b.slot_start.clone(),
                    b.slot_end.clone(),
                    b.location.clone(),
                    b.zone.to_string(),
                    b.logistics_fee.to_string(),
                    b.total_fee.to_string(),
                    b.payment_method.to_string(),
                    b.payment_reference.clone(),
                    b.payment_status.to_string(),
                    b.prediagnosis.clone(),
                    b.status.to_string(),
                    b.scheduled_time.to_rfc3339(),
                    b.idempotency_key.clone(),
                    b.created_at.to_rfc3339(),
                    b.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(q)?;
        Ok(())
    }

    async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(q)?;
        match rows.next().await.map_err(q)? {
            Some(row) => Ok(Some(row_to_booking(&row)?)),
            None => Ok(None),
        }
    }

    async fn get_booking_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<Booking>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE idempotency_key = ?1"),
                params![key],
            )
            .await
            .map_err(q)?;
        match rows.next().await.map_err(q)? {
            Some(row) => Ok(Some(row_to_booking(&row)?)),
            None => Ok(None),
        }
    }

    async fn get_booking_by_payment_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Booking>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {BOOKING_COLUMNS} FROM bookings WHERE payment_reference = ?1 \
                     ORDER BY created_at DESC LIMIT 1"
                ),
                params![reference],
            )
            .await
            .map_err(q)?;
        match rows.next().await.map_err(q)? {
            Some(row) => Ok(Some(row_to_booking(&row)?)),
            None => Ok(None),
        }
    }

    async fn update_booking_status(
        &self,
        id: Uuid,
        status: BookingStatus,
    ) -> Result<(), DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE bookings SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.to_string(), Utc::now().to_rfc3339(), id.to_string()],
            )
            .await
            .map_err(q)?;
        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: "booking".into(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn update_payment_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
    ) -> Result<(), DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE bookings SET payment_status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.to_string(), Utc::now().to_rfc3339(), id.to_string()],
            )
            .await
            .map_err(q)?;
        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: "booking".into(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn reschedule_booking(
        &self,
        id: Uuid,
        slot: &TimeSlotDef,
        scheduled_time: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE bookings SET slot_key = ?1, slot_label = ?2, slot_start = ?3, \
                 slot_end = ?4, scheduled_time = ?5, status = 'rescheduled', updated_at = ?6 \
                 WHERE id = ?7",
                params![
                    slot.key,
                    slot.label,
                    slot.start,
                    slot.end,
                    scheduled_time.to_rfc3339(),
                    Utc::now().to_rfc3339(),
                    id.to_string(),
                ],
            )
            .await
            .map_err(q)?;
        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: "booking".into(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn list_bookings_for(
        &self,
        identity: &str,
        limit: usize,
    ) -> Result<Vec<Booking>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {BOOKING_COLUMNS} FROM bookings WHERE identity = ?1 \
                     ORDER BY created_at DESC LIMIT ?2"
                ),
                params![identity, limit as i64],
            )
            .await
            .map_err(q)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(q)? {
            out.push(row_to_booking(&row)?);
        }
        Ok(out)
    }

    async fn latest_active_booking(
        &self,
        identity: &str,
    ) -> Result<Option<Booking>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {BOOKING_COLUMNS} FROM bookings WHERE identity = ?1 \
                     AND status IN ('pending', 'confirmed', 'rescheduled') \
                     ORDER BY created_at DESC LIMIT 1"
                ),
                params![identity],
            )
            .await
            .map_err(q)?;
        match rows.next().await.map_err(q)? {
            Some(row) => Ok(Some(row_to_booking(&row)?)),
            None => Ok(None),
        }
    }

    // ── Health profiles ─────────────────────────────────────────────

    async fn get_profile(&self, identity: &str) -> Result<Option<HealthProfile>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT identity, display_name, visit_count, last_visit, conditions, \
                 preferred_categories, payment_methods, prefs, created_at, updated_at \
                 FROM health_profiles WHERE identity = ?1",
                params![identity],
            )
            .await
            .map_err(q)?;
        match rows.next().await.map_err(q)? {
            Some(row) => Ok(Some(row_to_profile(&row)?)),
            None => Ok(None),
        }
    }

    async fn upsert_profile(&self, p: &HealthProfile) -> Result<(), DatabaseError> {
        let to_json = |v: &Vec<String>| {
            serde_json::to_string(v).map_err(|e| DatabaseError::Serialization(e.to_string()))
        };
        self.conn()
            .execute(
                "INSERT INTO health_profiles (identity, display_name, visit_count, last_visit, \
                 conditions, preferred_categories, payment_methods, prefs, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) \
                 ON CONFLICT(identity) DO UPDATE SET \
                   display_name = excluded.display_name, \
                   visit_count = excluded.visit_count, \
                   last_visit = excluded.last_visit, \
                   conditions = excluded.conditions, \
                   preferred_categories = excluded.preferred_categories, \
                   payment_methods = excluded.payment_methods, \
                   prefs = excluded.prefs, \
                   updated_at = excluded.updated_at",
                params![
                    p.identity.clone(),
                    p.display_name.clone(),
                    p.visit_count,
                    p.last_visit.map(|t| t.to_rfc3339()),
                    to_json(&p.conditions)?,
                    to_json(&p.preferred_categories)?,
                    to_json(&p.payment_methods)?,
                    serde_json::to_string(&p.prefs)
                        .map_err(|e| DatabaseError::Serialization(e.to_string()))?,
                    p.created_at.to_rfc3339(),
                    Utc::now().to_rfc3339(),
                ],
            )
            .await
            .map_err(q)?;
        Ok(())
    }

    async fn list_health_tip_recipients(&self) -> Result<Vec<HealthProfile>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT identity, display_name, visit_count, last_visit, conditions, \
                 preferred_categories, payment_methods, prefs, created_at, updated_at \
                 FROM health_profiles",
                (),
            )
            .await
            .map_err(q)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(q)? {
            let profile = row_to_profile(&row)?;
            if profile.prefs.health_tips {
                out.push(profile);
            }
        }
        Ok(out)
    }

    // ── Loyalty ─────────────────────────────────────────────────────

    async fn insert_loyalty_transaction(
        &self,
        tx: &LoyaltyTransaction,
    ) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO loyalty_transactions (id, identity, points, reason, booking_id, \
                 created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    tx.id.to_string(),
                    tx.identity.clone(),
                    tx.points,
                    tx.reason.clone(),
                    tx.booking_id.map(|id| id.to_string()),
                    tx.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(q)?;
        Ok(())
    }

    async fn loyalty_balance(&self, identity: &str) -> Result<i64, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT COALESCE(SUM(points), 0) FROM loyalty_transactions WHERE identity = ?1",
                params![identity],
            )
            .await
            .map_err(q)?;
        match rows.next().await.map_err(q)? {
            Some(row) => get_i64(&row, 0),
            None => Ok(0),
        }
    }

    async fn list_loyalty_transactions(
        &self,
        identity: &str,
        limit: usize,
    ) -> Result<Vec<LoyaltyTransaction>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, identity, points, reason, booking_id, created_at \
                 FROM loyalty_transactions WHERE identity = ?1 \
                 ORDER BY created_at DESC LIMIT ?2",
                params![identity, limit as i64],
            )
            .await
            .map_err(q)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(q)? {
            out.push(row_to_loyalty_tx(&row)?);
        }
        Ok(out)
    }

    // ── Referral codes ──────────────────────────────────────────────

    async fn insert_referral_code(&self, code: &ReferralCode) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO referral_codes (code, owner, uses, max_uses, active, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    code.code.clone(),
                    code.owner.clone(),
                    code.uses as i64,
                    code.max_uses as i64,
                    code.active as i64,
                    code.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(q)?;
        Ok(())
    }

    async fn get_referral_code(&self, code: &str) -> Result<Option<ReferralCode>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT code, owner, uses, max_uses, active, created_at \
                 FROM referral_codes WHERE code = ?1",
                params![code],
            )
            .await
            .map_err(q)?;
        match rows.next().await.map_err(q)? {
            Some(row) => Ok(Some(row_to_referral(&row)?)),
            None => Ok(None),
        }
    }

    async fn latest_referral_code_for(
        &self,
        identity: &str,
    ) -> Result<Option<ReferralCode>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT code, owner, uses, max_uses, active, created_at \
                 FROM referral_codes WHERE owner = ?1 ORDER BY created_at DESC LIMIT 1",
                params![identity],
            )
            .await
            .map_err(q)?;
        match rows.next().await.map_err(q)? {
            Some(row) => Ok(Some(row_to_referral(&row)?)),
            None => Ok(None),
        }
    }

    async fn increment_referral_use(&self, code: &str) -> Result<(), DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE referral_codes SET uses = uses + 1 WHERE code = ?1",
                params![code],
            )
            .await
            .map_err(q)?;
        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: "referral_code".into(),
                id: code.to_string(),
            });
        }
        Ok(())
    }

    // ── Notifications ───────────────────────────────────────────────

    async fn schedule_notification(&self, n: &Notification) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO notifications (id, identity, kind, body, scheduled_for, status, \
                 booking_id, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    n.id.to_string(),
                    n.identity.clone(),
                    n.kind.to_string(),
                    n.body.clone(),
                    n.scheduled_for.to_rfc3339(),
                    n.status.to_string(),
                    n.booking_id.map(|id| id.to_string()),
                    n.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(q)?;
        Ok(())
    }

    async fn list_due_notifications(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Notification>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, identity, kind, body, scheduled_for, status, booking_id, created_at \
                 FROM notifications WHERE status = 'pending' AND scheduled_for <= ?1 \
                 ORDER BY scheduled_for ASC",
                params![now.to_rfc3339()],
            )
            .await
            .map_err(q)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(q)? {
            out.push(row_to_notification(&row)?);
        }
        Ok(out)
    }

    async fn mark_notification_sent(&self, id: Uuid) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "UPDATE notifications SET status = 'sent' WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(q)?;
        Ok(())
    }

    async fn cancel_notifications_for_booking(
        &self,
        booking_id: Uuid,
    ) -> Result<usize, DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE notifications SET status = 'cancelled' \
                 WHERE booking_id = ?1 AND status = 'pending'",
                params![booking_id.to_string()],
            )
            .await
            .map_err(q)?;
        Ok(affected as usize)
    }
}
