//! Workflow definition persistence.
//!
//! A workflow is a named, ordered list of steps.  The store treats the step
//! list as an opaque JSON array: the engine owns the step schema, the store
//! only guarantees that what was written is what is read back, and that
//! `updated_at` moves on every step-list change.
//!
//! Listing order is what the window, tray and menu show: favourites first,
//! then the user's persisted custom order, then creation order.

use chrono::Utc;
use rusqlite::OptionalExtension;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::db::Database;
use crate::error::{StoreError, StoreResult};

// ═══════════════════════════════════════════════════════════════════════
//  Types
// ═══════════════════════════════════════════════════════════════════════

/// A persisted workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredWorkflow {
    /// Unique identifier (UUID v7).
    pub id: String,
    /// Human-readable name.  Not required to be unique.
    pub name: String,
    /// JSON array of step definitions, in execution order.
    pub steps: serde_json::Value,
    /// Favourites sort first in listings.
    pub is_favorite: bool,
    /// Persisted custom position, if the user ever reordered.
    pub display_order: Option<i64>,
    /// Unix timestamp when the workflow was created.
    pub created_at: i64,
    /// Unix timestamp of the last step-list change.
    pub updated_at: i64,
}

const SELECT_COLUMNS: &str =
    "SELECT id, name, steps, is_favorite, display_order, created_at, updated_at FROM workflows";

const LIST_ORDER: &str =
    "ORDER BY is_favorite DESC, display_order IS NULL, display_order ASC, created_at ASC, id ASC";

// ═══════════════════════════════════════════════════════════════════════
//  WorkflowStore
// ═══════════════════════════════════════════════════════════════════════

/// CRUD operations on workflow definitions.
#[derive(Clone)]
pub struct WorkflowStore {
    db: Database,
}

impl WorkflowStore {
    /// Create a new workflow store backed by `db`.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create an empty workflow named `name`.
    ///
    /// The name is trimmed and must not be empty.
    #[instrument(skip(self))]
    pub async fn create(&self, name: &str) -> StoreResult<StoredWorkflow> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(StoreError::InvalidArgument(
                "workflow name must not be empty".into(),
            ));
        }

        let now = Utc::now().timestamp();
        let workflow = StoredWorkflow {
            id: Uuid::now_v7().to_string(),
            name,
            steps: serde_json::Value::Array(Vec::new()),
            is_favorite: false,
            display_order: None,
            created_at: now,
            updated_at: now,
        };

        let id = workflow.id.clone();
        let row_name = workflow.name.clone();
        self.db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO workflows (id, name, steps, is_favorite, display_order, created_at, updated_at) \
                     VALUES (?1, ?2, '[]', 0, NULL, ?3, ?3)",
                    rusqlite::params![id, row_name, now],
                )?;
                Ok(())
            })
            .await?;

        debug!(workflow_id = %workflow.id, workflow_name = %workflow.name, "workflow created");
        Ok(workflow)
    }

    /// Fetch a single workflow by ID, returning `None` if not found.
    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> StoreResult<Option<StoredWorkflow>> {
        let id = id.to_string();
        self.db
            .execute(move |conn| {
                conn.query_row(
                    &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                    rusqlite::params![id],
                    WorkflowRow::from_row,
                )
                .optional()?
                .map(WorkflowRow::into_stored_workflow)
                .transpose()
            })
            .await
    }

    /// List every workflow in display order.
    #[instrument(skip(self))]
    pub async fn list(&self) -> StoreResult<Vec<StoredWorkflow>> {
        self.db
            .execute(|conn| {
                let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} {LIST_ORDER}"))?;
                let rows = stmt
                    .query_map([], WorkflowRow::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;

                rows.into_iter()
                    .map(WorkflowRow::into_stored_workflow)
                    .collect()
            })
            .await
    }

    /// Replace a workflow's step list and refresh `updated_at`.
    ///
    /// `steps` must be a JSON array.
    #[instrument(skip(self, steps))]
    pub async fn update_steps(&self, id: &str, steps: serde_json::Value) -> StoreResult<()> {
        if !steps.is_array() {
            return Err(StoreError::InvalidArgument(
                "workflow steps must be a JSON array".into(),
            ));
        }

        let id = id.to_string();
        let steps_json = serde_json::to_string(&steps)?;
        let now = Utc::now().timestamp();

        self.db
            .execute(move |conn| {
                let updated = conn.execute(
                    "UPDATE workflows SET steps = ?2, updated_at = ?3 WHERE id = ?1",
                    rusqlite::params![id, steps_json, now],
                )?;
                if updated == 0 {
                    return Err(StoreError::NotFound {
                        entity: "workflow",
                        id,
                    });
                }
                debug!(workflow_id = %id, "workflow steps updated");
                Ok(())
            })
            .await
    }

    /// Rename a workflow.
    #[instrument(skip(self))]
    pub async fn rename(&self, id: &str, name: &str) -> StoreResult<()> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(StoreError::InvalidArgument(
                "workflow name must not be empty".into(),
            ));
        }
        let id = id.to_string();
        let now = Utc::now().timestamp();

        self.db
            .execute(move |conn| {
                let updated = conn.execute(
                    "UPDATE workflows SET name = ?2, updated_at = ?3 WHERE id = ?1",
                    rusqlite::params![id, name, now],
                )?;
                if updated == 0 {
                    return Err(StoreError::NotFound {
                        entity: "workflow",
                        id,
                    });
                }
                Ok(())
            })
            .await
    }

    /// Mark or unmark a workflow as favourite.
    #[instrument(skip(self))]
    pub async fn set_favorite(&self, id: &str, is_favorite: bool) -> StoreResult<()> {
        let id = id.to_string();

        self.db
            .execute(move |conn| {
                let updated = conn.execute(
                    "UPDATE workflows SET is_favorite = ?2 WHERE id = ?1",
                    rusqlite::params![id, is_favorite],
                )?;
                if updated == 0 {
                    return Err(StoreError::NotFound {
                        entity: "workflow",
                        id,
                    });
                }
                Ok(())
            })
            .await
    }

    /// Persist a custom order.
    ///
    /// Workflows named in `ids` take positions `0..n` in the given order;
    /// unknown IDs are ignored.  Workflows not named keep their current
    /// relative order and follow the named ones.  Returns the number of
    /// workflows whose position was written.
    #[instrument(skip(self, ids))]
    pub async fn reorder(&self, ids: &[String]) -> StoreResult<usize> {
        let requested = ids.to_vec();

        self.db
            .execute_mut(move |conn| {
                let tx = conn.transaction()?;

                let current: Vec<String> = {
                    let mut stmt = tx.prepare(&format!("SELECT id FROM workflows {LIST_ORDER}"))?;
                    let ids = stmt
                        .query_map([], |row| row.get(0))?
                        .collect::<Result<Vec<_>, _>>()?;
                    ids
                };

                let mut ordered: Vec<&String> = Vec::with_capacity(current.len());
                for id in &requested {
                    if current.contains(id) && !ordered.contains(&id) {
                        ordered.push(id);
                    }
                }
                for id in &current {
                    if !ordered.contains(&id) {
                        ordered.push(id);
                    }
                }

                for (position, id) in ordered.iter().enumerate() {
                    tx.execute(
                        "UPDATE workflows SET display_order = ?2 WHERE id = ?1",
                        rusqlite::params![id, position as i64],
                    )?;
                }
                tx.commit()?;

                debug!(workflows = ordered.len(), "workflow order persisted");
                Ok(ordered.len())
            })
            .await
    }

    /// Delete a workflow by ID.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> StoreResult<()> {
        let id = id.to_string();
        self.db
            .execute(move |conn| {
                let deleted =
                    conn.execute("DELETE FROM workflows WHERE id = ?1", rusqlite::params![id])?;
                if deleted == 0 {
                    return Err(StoreError::NotFound {
                        entity: "workflow",
                        id,
                    });
                }
                Ok(())
            })
            .await
    }

    /// Return the total number of workflows.
    #[instrument(skip(self))]
    pub async fn count(&self) -> StoreResult<i64> {
        self.db
            .execute(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM workflows", [], |row| row.get(0))?;
                Ok(count)
            })
            .await
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Internal row mapping
// ═══════════════════════════════════════════════════════════════════════

/// Raw row data before JSON decoding, so the `rusqlite` mapping closure
/// stays infallible with respect to JSON.
struct WorkflowRow {
    id: String,
    name: String,
    steps: String,
    is_favorite: bool,
    display_order: Option<i64>,
    created_at: i64,
    updated_at: i64,
}

impl WorkflowRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            steps: row.get(2)?,
            is_favorite: row.get(3)?,
            display_order: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn into_stored_workflow(self) -> StoreResult<StoredWorkflow> {
        Ok(StoredWorkflow {
            id: self.id,
            name: self.name,
            steps: serde_json::from_str(&self.steps)?,
            is_favorite: self.is_favorite,
            display_order: self.display_order,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn setup_store() -> WorkflowStore {
        let db = Database::open_in_memory().unwrap();
        db.run_migrations().await.unwrap();
        WorkflowStore::new(db)
    }

    fn names(list: &[StoredWorkflow]) -> Vec<&str> {
        list.iter().map(|w| w.name.as_str()).collect()
    }

    #[tokio::test]
    async fn create_and_get_roundtrip() {
        let store = setup_store().await;

        let workflow = store.create("  Morning setup ").await.unwrap();
        assert_eq!(workflow.name, "Morning setup");
        assert_eq!(workflow.steps, json!([]));
        assert!(!workflow.is_favorite);
        assert!(workflow.display_order.is_none());
        assert_eq!(workflow.created_at, workflow.updated_at);

        let fetched = store.get(&workflow.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, workflow.id);
        assert_eq!(fetched.name, "Morning setup");
        assert_eq!(fetched.steps, json!([]));
    }

    #[tokio::test]
    async fn create_rejects_blank_name() {
        let store = setup_store().await;
        let result = store.create("   ").await;
        assert!(matches!(result, Err(StoreError::InvalidArgument(_))));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn duplicate_names_allowed() {
        let store = setup_store().await;
        let a = store.create("same").await.unwrap();
        let b = store.create("same").await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn get_nonexistent_returns_none() {
        let store = setup_store().await;
        assert!(store.get("nonexistent-id").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_steps_roundtrip_and_timestamp() {
        let store = setup_store().await;
        let workflow = store.create("wf").await.unwrap();

        let steps = json!([
            {"id": "a", "kind": "url", "payload": "https://example.com"},
            {"id": "b", "kind": "terminal_command", "payload": "ls"}
        ]);
        store.update_steps(&workflow.id, steps.clone()).await.unwrap();

        let fetched = store.get(&workflow.id).await.unwrap().unwrap();
        assert_eq!(fetched.steps, steps);
        assert!(fetched.updated_at >= workflow.updated_at);
    }

    #[tokio::test]
    async fn update_steps_rejects_non_array() {
        let store = setup_store().await;
        let workflow = store.create("wf").await.unwrap();
        let result = store.update_steps(&workflow.id, json!({"id": "a"})).await;
        assert!(matches!(result, Err(StoreError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn update_steps_nonexistent_returns_not_found() {
        let store = setup_store().await;
        match store.update_steps("missing", json!([])).await.unwrap_err() {
            StoreError::NotFound { entity, .. } => assert_eq!(entity, "workflow"),
            other => panic!("expected NotFound, got: {other}"),
        }
    }

    #[tokio::test]
    async fn rename_workflow() {
        let store = setup_store().await;
        let workflow = store.create("old").await.unwrap();
        store.rename(&workflow.id, "new").await.unwrap();
        assert_eq!(store.get(&workflow.id).await.unwrap().unwrap().name, "new");
        assert!(store.rename(&workflow.id, "").await.is_err());
    }

    #[tokio::test]
    async fn favorites_list_first() {
        let store = setup_store().await;
        let _a = store.create("a").await.unwrap();
        let b = store.create("b").await.unwrap();
        let _c = store.create("c").await.unwrap();

        store.set_favorite(&b.id, true).await.unwrap();

        let list = store.list().await.unwrap();
        assert_eq!(names(&list), vec!["b", "a", "c"]);
        assert!(list[0].is_favorite);

        store.set_favorite(&b.id, false).await.unwrap();
        let list = store.list().await.unwrap();
        assert_eq!(names(&list), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn set_favorite_nonexistent_returns_not_found() {
        let store = setup_store().await;
        assert!(matches!(
            store.set_favorite("missing", true).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn reorder_persists_custom_order() {
        let store = setup_store().await;
        let a = store.create("a").await.unwrap();
        let b = store.create("b").await.unwrap();
        let c = store.create("c").await.unwrap();

        let written = store
            .reorder(&[c.id.clone(), a.id.clone(), b.id.clone()])
            .await
            .unwrap();
        assert_eq!(written, 3);

        let list = store.list().await.unwrap();
        assert_eq!(names(&list), vec!["c", "a", "b"]);
        assert_eq!(list[0].display_order, Some(0));
    }

    #[tokio::test]
    async fn reorder_ignores_unknown_and_keeps_unnamed() {
        let store = setup_store().await;
        let a = store.create("a").await.unwrap();
        let _b = store.create("b").await.unwrap();
        let c = store.create("c").await.unwrap();

        store
            .reorder(&[c.id.clone(), "ghost".to_string(), a.id.clone()])
            .await
            .unwrap();

        let list = store.list().await.unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(names(&list), vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn favorites_still_lead_custom_order() {
        let store = setup_store().await;
        let a = store.create("a").await.unwrap();
        let b = store.create("b").await.unwrap();

        store.reorder(&[a.id.clone(), b.id.clone()]).await.unwrap();
        store.set_favorite(&b.id, true).await.unwrap();

        let list = store.list().await.unwrap();
        assert_eq!(names(&list), vec!["b", "a"]);
    }

    #[tokio::test]
    async fn delete_workflow() {
        let store = setup_store().await;
        let workflow = store.create("to-delete").await.unwrap();

        store.delete(&workflow.id).await.unwrap();
        assert!(store.get(&workflow.id).await.unwrap().is_none());

        match store.delete(&workflow.id).await.unwrap_err() {
            StoreError::NotFound { entity, .. } => assert_eq!(entity, "workflow"),
            other => panic!("expected NotFound, got: {other}"),
        }
    }
}
