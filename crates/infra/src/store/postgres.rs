//! Postgres-backed inventory store.
//!
//! Conditional writes are single statements, so the database does the
//! compare-and-swap:
//!
//! - updates carry `WHERE store_id = $1 AND product_id = $2 AND version = $n`
//!   and report a conflict when no row comes back;
//! - lazy creation is `INSERT … ON CONFLICT DO NOTHING`, which reports a
//!   conflict when another writer created the row first.
//!
//! Row-level locking is never held across calls; the version predicate is the
//! atomic unit.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `Conflict` | Concurrent creation of the same key |
//! | Database (check constraint violation) | `23514` | `Rejected` | Row would break a ledger invariant |
//! | Database (other) | Any other | `Backend` | Other database errors |
//! | PoolClosed / Io / other | N/A | `Backend` | Connection failures |

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgPool, Row};
use tracing::instrument;

use async_trait::async_trait;
use stockledger_core::{ExpectedVersion, ProductId, StoreId};
use stockledger_inventory::{InventoryKey, InventoryRecord, RecordParts};

use super::r#trait::{InventoryStore, StoreError};

/// Schema for `inventory_records`, applied by [`PostgresInventoryStore::migrate`].
pub const SCHEMA: &str = include_str!("../../migrations/0001_inventory_records.sql");

/// Postgres-backed inventory store.
///
/// `PgPool` is internally reference counted; clones share one pool.
#[derive(Debug, Clone)]
pub struct PostgresInventoryStore {
    pool: PgPool,
}

impl PostgresInventoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a pool for `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply the schema (idempotent).
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    async fn insert_new(&self, record: InventoryRecord) -> Result<InventoryRecord, StoreError> {
        let key = record.key();
        let row = sqlx::query(
            r#"
            INSERT INTO inventory_records (
                store_id,
                product_id,
                sku,
                quantity_on_hand,
                reserved,
                reorder_point,
                reorder_quantity,
                last_restocked_at,
                updated_at,
                version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 1)
            ON CONFLICT (store_id, product_id) DO NOTHING
            RETURNING
                id,
                store_id,
                product_id,
                sku,
                quantity_on_hand,
                reserved,
                reorder_point,
                reorder_quantity,
                last_restocked_at,
                updated_at,
                version
            "#,
        )
        .bind(key.store_id.as_uuid())
        .bind(key.product_id.as_uuid())
        .bind(record.sku())
        .bind(record.quantity_on_hand())
        .bind(record.reserved())
        .bind(record.reorder_point())
        .bind(record.reorder_quantity())
        .bind(record.last_restocked_at())
        .bind(record.updated_at())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_record", e))?;

        match row {
            Some(row) => decode(&row),
            None => Err(StoreError::Conflict(format!("{key}: record already exists"))),
        }
    }

    async fn update_at_version(
        &self,
        record: InventoryRecord,
        expected_version: u64,
    ) -> Result<InventoryRecord, StoreError> {
        let key = record.key();
        let row = sqlx::query(
            r#"
            UPDATE inventory_records
            SET
                sku = $3,
                quantity_on_hand = $4,
                reserved = $5,
                reorder_point = $6,
                reorder_quantity = $7,
                last_restocked_at = $8,
                updated_at = $9,
                version = version + 1
            WHERE store_id = $1 AND product_id = $2 AND version = $10
            RETURNING
                id,
                store_id,
                product_id,
                sku,
                quantity_on_hand,
                reserved,
                reorder_point,
                reorder_quantity,
                last_restocked_at,
                updated_at,
                version
            "#,
        )
        .bind(key.store_id.as_uuid())
        .bind(key.product_id.as_uuid())
        .bind(record.sku())
        .bind(record.quantity_on_hand())
        .bind(record.reserved())
        .bind(record.reorder_point())
        .bind(record.reorder_quantity())
        .bind(record.last_restocked_at())
        .bind(record.updated_at())
        .bind(expected_version as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_record", e))?;

        match row {
            Some(row) => decode(&row),
            None => Err(StoreError::Conflict(format!(
                "{key}: record is no longer at version {expected_version}"
            ))),
        }
    }
}

#[async_trait]
impl InventoryStore for PostgresInventoryStore {
    #[instrument(skip(self), fields(key = %key), err)]
    async fn load_for_update(&self, key: InventoryKey) -> Result<Option<InventoryRecord>, StoreError> {
        self.get(key).await
    }

    #[instrument(skip(self, record), fields(key = %record.key(), expected = ?expected), err)]
    async fn conditional_save(
        &self,
        record: InventoryRecord,
        expected: ExpectedVersion,
    ) -> Result<InventoryRecord, StoreError> {
        match expected {
            ExpectedVersion::Absent => self.insert_new(record).await,
            ExpectedVersion::Exact(v) => self.update_at_version(record, v).await,
        }
    }

    #[instrument(skip(self, record), fields(key = %record.key()), err)]
    async fn save(&self, record: InventoryRecord) -> Result<InventoryRecord, StoreError> {
        self.insert_new(record).await
    }

    async fn get(&self, key: InventoryKey) -> Result<Option<InventoryRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT
                id,
                store_id,
                product_id,
                sku,
                quantity_on_hand,
                reserved,
                reorder_point,
                reorder_quantity,
                last_restocked_at,
                updated_at,
                version
            FROM inventory_records
            WHERE store_id = $1 AND product_id = $2
            "#,
        )
        .bind(key.store_id.as_uuid())
        .bind(key.product_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_record", e))?;

        row.as_ref().map(decode).transpose()
    }

    #[instrument(skip(self), fields(store_id = %store_id), err)]
    async fn list_by_store(&self, store_id: StoreId) -> Result<Vec<InventoryRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                id,
                store_id,
                product_id,
                sku,
                quantity_on_hand,
                reserved,
                reorder_point,
                reorder_quantity,
                last_restocked_at,
                updated_at,
                version
            FROM inventory_records
            WHERE store_id = $1
            ORDER BY product_id ASC
            "#,
        )
        .bind(store_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_by_store", e))?;

        rows.iter().map(decode).collect()
    }

    #[instrument(skip(self), fields(store_id = %store_id), err)]
    async fn list_low_stock(&self, store_id: StoreId) -> Result<Vec<InventoryRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                id,
                store_id,
                product_id,
                sku,
                quantity_on_hand,
                reserved,
                reorder_point,
                reorder_quantity,
                last_restocked_at,
                updated_at,
                version
            FROM inventory_records
            WHERE store_id = $1 AND quantity_on_hand - reserved <= reorder_point
            ORDER BY quantity_on_hand - reserved ASC, product_id ASC
            "#,
        )
        .bind(store_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_low_stock", e))?;

        rows.iter().map(decode).collect()
    }

    #[instrument(skip(self), err)]
    async fn list_by_sku(&self, sku: &str) -> Result<Vec<InventoryRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                id,
                store_id,
                product_id,
                sku,
                quantity_on_hand,
                reserved,
                reorder_point,
                reorder_quantity,
                last_restocked_at,
                updated_at,
                version
            FROM inventory_records
            WHERE sku = $1
            ORDER BY store_id ASC, product_id ASC
            "#,
        )
        .bind(sku)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_by_sku", e))?;

        rows.iter().map(decode).collect()
    }
}

fn decode(row: &PgRow) -> Result<InventoryRecord, StoreError> {
    let row = InventoryRow::from_row(row)
        .map_err(|e| StoreError::Corrupt(format!("failed to deserialize inventory row: {e}")))?;
    InventoryRecord::try_from(row)
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                // Unique violation: someone else created the key first.
                Some("23505") => StoreError::Conflict(msg),
                // Check violation: the row would break a ledger invariant.
                Some("23514") => StoreError::Rejected(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}

// SQLx row types

#[derive(Debug)]
struct InventoryRow {
    id: i64,
    store_id: uuid::Uuid,
    product_id: uuid::Uuid,
    sku: Option<String>,
    quantity_on_hand: i64,
    reserved: i64,
    reorder_point: i64,
    reorder_quantity: i64,
    last_restocked_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl<'r> sqlx::FromRow<'r, PgRow> for InventoryRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(InventoryRow {
            id: row.try_get("id")?,
            store_id: row.try_get("store_id")?,
            product_id: row.try_get("product_id")?,
            sku: row.try_get("sku")?,
            quantity_on_hand: row.try_get("quantity_on_hand")?,
            reserved: row.try_get("reserved")?,
            reorder_point: row.try_get("reorder_point")?,
            reorder_quantity: row.try_get("reorder_quantity")?,
            last_restocked_at: row.try_get("last_restocked_at")?,
            updated_at: row.try_get("updated_at")?,
            version: row.try_get("version")?,
        })
    }
}

impl TryFrom<InventoryRow> for InventoryRecord {
    type Error = StoreError;

    fn try_from(row: InventoryRow) -> Result<Self, Self::Error> {
        let version = u64::try_from(row.version)
            .map_err(|_| StoreError::Corrupt(format!("negative version {}", row.version)))?;

        InventoryRecord::from_parts(RecordParts {
            id: Some(row.id),
            key: InventoryKey::new(
                StoreId::from_uuid(row.store_id),
                ProductId::from_uuid(row.product_id),
            ),
            sku: row.sku,
            quantity_on_hand: row.quantity_on_hand,
            reserved: row.reserved,
            reorder_point: row.reorder_point,
            reorder_quantity: row.reorder_quantity,
            last_restocked_at: row.last_restocked_at,
            updated_at: row.updated_at,
            version,
        })
        .map_err(|e| StoreError::Corrupt(e.to_string()))
    }
}
