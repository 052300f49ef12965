//! # flowdeck-store
//!
//! Storage engine for flowdeck.
//!
//! Persists workflow definitions and small pieces of application state in a
//! single SQLite file (WAL mode).  Every call hops onto the blocking thread
//! pool, so the stores are safe to use from async code.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  WorkflowStore  (definitions, ordering) │
//! │  StateStore     (key/value, counters)   │
//! ├─────────────────────────────────────────┤
//! │  Database (rusqlite WAL)                │
//! │  Migrations (versioned, transactional)  │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! use flowdeck_store::{Database, WorkflowStore, StateStore};
//!
//! let db = Database::open_and_migrate("data/flowdeck.db").await?;
//! let workflows = WorkflowStore::new(db.clone());
//! let state = StateStore::new(db);
//!
//! let wf = workflows.create("Morning setup").await?;
//! state.increment_time_saved(10).await?;
//! ```

pub mod db;
pub mod error;
pub mod migration;
pub mod state_store;
pub mod workflow_store;

// ── re-exports ───────────────────────────────────────────────────────

pub use db::Database;
pub use error::{StoreError, StoreResult};
pub use state_store::{StateStore, TIME_SAVED_KEY};
pub use workflow_store::{StoredWorkflow, WorkflowStore};
