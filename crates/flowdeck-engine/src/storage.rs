//! The storage collaborator as the runner sees it.

use async_trait::async_trait;
use tracing::instrument;

use flowdeck_store::{Database, StateStore, WorkflowStore};

use crate::error::Result;
use crate::workflow::Workflow;

/// Read access to workflows plus the time-saved counter.
#[async_trait]
pub trait WorkflowStorage: Send + Sync {
    /// Load a workflow, or `None` if the id is unknown.
    async fn get_workflow(&self, id: &str) -> Result<Option<Workflow>>;

    /// Add `seconds` to the time-saved counter.
    async fn increment_time_saved(&self, seconds: i64) -> Result<()>;
}

/// [`WorkflowStorage`] over the SQLite stores.
#[derive(Clone)]
pub struct SqliteStorage {
    workflows: WorkflowStore,
    state: StateStore,
}

impl SqliteStorage {
    pub fn new(db: Database) -> Self {
        Self {
            workflows: WorkflowStore::new(db.clone()),
            state: StateStore::new(db),
        }
    }

    pub fn workflows(&self) -> &WorkflowStore {
        &self.workflows
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }
}

#[async_trait]
impl WorkflowStorage for SqliteStorage {
    #[instrument(skip(self))]
    async fn get_workflow(&self, id: &str) -> Result<Option<Workflow>> {
        match self.workflows.get(id).await? {
            Some(stored) => Ok(Some(Workflow::from_stored(stored)?)),
            None => Ok(None),
        }
    }

    async fn increment_time_saved(&self, seconds: i64) -> Result<()> {
        self.state.increment_time_saved(seconds).await?;
        Ok(())
    }
}
