//! Document store repository.
//!
//! Uses prepared statements and transactions for data integrity.

use sqlx::{Row, SqlitePool};

use crate::errors::AppError;
use crate::models::{format_item_id, Item, Status, MAX_ITEM_SEQUENCE};

/// Name of the counter row backing item id allocation.
pub const ITEM_COUNTER: &str = "items";

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ==================== ID ALLOCATION ====================

    /// Atomically advance the item counter and return the new id.
    ///
    /// The counter row is written before it is read, so the transaction holds
    /// the database write lock for its whole read-modify-write and concurrent
    /// allocators queue behind it. On overflow or corruption the transaction
    /// is rolled back and the counter is left as it was.
    pub async fn allocate_item_id(&self) -> Result<String, AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT OR IGNORE INTO counters (name, value) VALUES (?, 0)")
            .bind(ITEM_COUNTER)
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query("SELECT value FROM counters WHERE name = ?")
            .bind(ITEM_COUNTER)
            .fetch_one(&mut *tx)
            .await?;

        let current = match row.try_get::<i64, _>("value") {
            Ok(value) if value >= 0 => value,
            Ok(value) => {
                tx.rollback().await?;
                return Err(AppError::CounterCorrupt(format!(
                    "counter '{}' holds negative value {}",
                    ITEM_COUNTER, value
                )));
            }
            Err(e) => {
                tx.rollback().await?;
                return Err(AppError::CounterCorrupt(format!(
                    "counter '{}' is not an integer: {}",
                    ITEM_COUNTER, e
                )));
            }
        };

        if current >= MAX_ITEM_SEQUENCE {
            tx.rollback().await?;
            return Err(AppError::CounterOverflow);
        }

        let next = current + 1;
        sqlx::query("UPDATE counters SET value = ? WHERE name = ?")
            .bind(next)
            .bind(ITEM_COUNTER)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(format_item_id(next))
    }

    // ==================== ITEM OPERATIONS ====================

    /// Persist a new item. Fails if the id is already taken.
    pub async fn insert_item(&self, item: &Item) -> Result<(), AppError> {
        let document = encode_item(item)?;

        sqlx::query(
            "INSERT INTO items (id, status, created_at, updated_at, document) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&item.id)
        .bind(item.status.as_str())
        .bind(item.created_at.to_rfc3339())
        .bind(item.updated_at.to_rfc3339())
        .bind(&document)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Overwrite an existing item's document.
    pub async fn replace_item(&self, item: &Item) -> Result<(), AppError> {
        let document = encode_item(item)?;

        let result = sqlx::query(
            "UPDATE items SET status = ?, updated_at = ?, document = ? WHERE id = ?",
        )
        .bind(item.status.as_str())
        .bind(item.updated_at.to_rfc3339())
        .bind(&document)
        .bind(&item.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Item {} not found", item.id)));
        }

        Ok(())
    }

    /// Get an item by ID, whatever its status.
    pub async fn get_item(&self, id: &str) -> Result<Option<Item>, AppError> {
        let row = sqlx::query("SELECT id, document FROM items WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(item_from_row).transpose()
    }

    /// All published items, in id order.
    pub async fn list_published_items(&self) -> Result<Vec<Item>, AppError> {
        let rows = sqlx::query("SELECT id, document FROM items WHERE status = ? ORDER BY id")
            .bind(Status::Published.as_str())
            .fetch_all(&self.pool)
            .await?;

        Ok(decode_rows(&rows))
    }

    /// Every stored item, in id order.
    pub async fn list_items(&self) -> Result<Vec<Item>, AppError> {
        let rows = sqlx::query("SELECT id, document FROM items ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(decode_rows(&rows))
    }

    /// Re-derive search tokens for every item and rewrite the ones that drifted.
    ///
    /// Returns the number of items rewritten.
    pub async fn refresh_all_search_tokens(&self) -> Result<usize, AppError> {
        let mut rewritten = 0;

        for mut item in self.list_items().await? {
            let stored = std::mem::take(&mut item.search_tokens);
            item.refresh_search_tokens();
            if item.search_tokens != stored {
                self.replace_item(&item).await?;
                rewritten += 1;
            }
        }

        Ok(rewritten)
    }
}

// Helper functions for document conversion

fn encode_item(item: &Item) -> Result<String, AppError> {
    serde_json::to_string(item)
        .map_err(|e| AppError::Internal(format!("Failed to encode item {}: {}", item.id, e)))
}

fn item_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Item, AppError> {
    let id: String = row.get("id");
    let document: String = row.get("document");
    serde_json::from_str(&document)
        .map_err(|e| AppError::Store(format!("Item {} has an unreadable document: {}", id, e)))
}

/// Decode rows, skipping documents that no longer parse.
///
/// A skipped row is store corruption and is logged at error level with its id.
fn decode_rows(rows: &[sqlx::sqlite::SqliteRow]) -> Vec<Item> {
    rows.iter()
        .filter_map(|row| match item_from_row(row) {
            Ok(item) => Some(item),
            Err(e) => {
                let id: String = row.get("id");
                tracing::error!(%id, error = %e, "Unreadable stored item excluded from results");
                None
            }
        })
        .collect()
}
