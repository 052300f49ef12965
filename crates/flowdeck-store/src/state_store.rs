//! Key/value application state.
//!
//! Small pieces of state that must survive restarts live here as string
//! pairs.  The one the engine cares about is the "time saved" counter,
//! credited after every successful step.

use rusqlite::OptionalExtension;
use tracing::{debug, instrument};

use crate::db::Database;
use crate::error::{StoreError, StoreResult};

/// Key of the cumulative time-saved counter (seconds).
pub const TIME_SAVED_KEY: &str = "time_saved_seconds";

/// Persistent key/value store.
#[derive(Clone)]
pub struct StateStore {
    db: Database,
}

impl StateStore {
    /// Create a new state store backed by `db`.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Get a value by key, returning `None` if not found.
    #[instrument(skip(self))]
    pub async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let key = key.to_string();
        self.db
            .execute(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT value FROM app_state WHERE key = ?1",
                        rusqlite::params![key],
                        |row| row.get(0),
                    )
                    .optional()?)
            })
            .await
    }

    /// Set a value for a key (insert or update).
    #[instrument(skip(self, value))]
    pub async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let key = key.to_string();
        let value = value.to_string();
        self.db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO app_state (key, value) VALUES (?1, ?2) \
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                    rusqlite::params![key, value],
                )?;
                debug!(key = %key, "app state updated");
                Ok(())
            })
            .await
    }

    /// Get a value parsed as i64, or `None` if absent.  A value that is not
    /// an integer is reported as [`StoreError::Corrupt`].
    pub async fn get_i64(&self, key: &str) -> StoreResult<Option<i64>> {
        self.get(key)
            .await?
            .map(|value| parse_i64(key, value))
            .transpose()
    }

    /// Add `amount` to an integer value and return the new total.  A missing
    /// value counts as zero; a non-integer value is left untouched and
    /// reported as [`StoreError::Corrupt`].
    #[instrument(skip(self))]
    pub async fn increment_i64(&self, key: &str, amount: i64) -> StoreResult<i64> {
        let key = key.to_string();
        self.db
            .execute_mut(move |conn| {
                let tx = conn.transaction()?;
                let current = tx
                    .query_row(
                        "SELECT value FROM app_state WHERE key = ?1",
                        rusqlite::params![key],
                        |row| row.get::<_, String>(0),
                    )
                    .optional()?
                    .map(|value| parse_i64(&key, value))
                    .transpose()?
                    .unwrap_or(0);

                let total = current.checked_add(amount).ok_or_else(|| {
                    StoreError::InvalidArgument(format!("`{key}` would overflow"))
                })?;
                tx.execute(
                    "INSERT INTO app_state (key, value) VALUES (?1, ?2) \
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                    rusqlite::params![key, total.to_string()],
                )?;
                tx.commit()?;
                Ok(total)
            })
            .await
    }

    /// Cumulative seconds credited to successful steps.
    pub async fn time_saved_seconds(&self) -> StoreResult<i64> {
        Ok(self.get_i64(TIME_SAVED_KEY).await?.unwrap_or(0))
    }

    /// Credit `seconds` to the time-saved counter, returning the new total.
    pub async fn increment_time_saved(&self, seconds: i64) -> StoreResult<i64> {
        let total = self.increment_i64(TIME_SAVED_KEY, seconds).await?;
        debug!(credited = seconds, total, "time saved credited");
        Ok(total)
    }
}

fn parse_i64(key: &str, value: String) -> StoreResult<i64> {
    value.trim().parse().map_err(|_| StoreError::Corrupt {
        key: key.to_string(),
        value,
    })
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_store() -> StateStore {
        let db = Database::open_in_memory().unwrap();
        db.run_migrations().await.unwrap();
        StateStore::new(db)
    }

    #[tokio::test]
    async fn get_nonexistent_returns_none() {
        let store = setup_store().await;
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_overwrites() {
        let store = setup_store().await;
        store.set("key1", "old").await.unwrap();
        store.set("key1", "new").await.unwrap();
        assert_eq!(store.get("key1").await.unwrap(), Some("new".to_string()));
    }

    #[tokio::test]
    async fn get_i64_unparseable_is_an_error() {
        let store = setup_store().await;
        store.set("n", "not_a_number").await.unwrap();
        assert!(matches!(
            store.get_i64("n").await,
            Err(StoreError::Corrupt { ref key, .. }) if key == "n"
        ));
    }

    #[tokio::test]
    async fn corrupt_counter_is_not_reset() {
        let store = setup_store().await;
        store.set(TIME_SAVED_KEY, "12abc").await.unwrap();

        let err = store.increment_time_saved(10).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
        assert!(store.time_saved_seconds().await.is_err());
        assert_eq!(
            store.get(TIME_SAVED_KEY).await.unwrap().as_deref(),
            Some("12abc")
        );
    }

    #[tokio::test]
    async fn increment_starts_from_zero() {
        let store = setup_store().await;
        assert_eq!(store.increment_i64("n", 5).await.unwrap(), 5);
        assert_eq!(store.increment_i64("n", 7).await.unwrap(), 12);
        assert_eq!(store.get_i64("n").await.unwrap(), Some(12));
    }

    #[tokio::test]
    async fn time_saved_counter() {
        let store = setup_store().await;
        assert_eq!(store.time_saved_seconds().await.unwrap(), 0);

        for _ in 0..3 {
            store.increment_time_saved(10).await.unwrap();
        }
        assert_eq!(store.time_saved_seconds().await.unwrap(), 30);
    }
}
