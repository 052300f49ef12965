//! flowdeck transport plumbing.
//!
//! The workflow engine itself knows nothing about how it is invoked or how
//! its progress reaches a screen.  This crate holds the pieces that sit
//! between the engine and its callers:
//!
//! - **[`registry`]** -- Explicit channel → handler dispatch table with a
//!   `register` / `unregister` lifecycle, owned by whoever wires the engine
//!   to its transport.  Re-registering a channel replaces the old handler.
//! - **[`ipc`]** -- Publish/subscribe progress bus backed by
//!   [`tokio::sync::broadcast`], so any number of surfaces (window, tray,
//!   terminal) can follow the active step.
//! - **[`error`]** -- Kernel error types via [`thiserror`].

pub mod error;
pub mod ipc;
pub mod registry;

pub use error::{KernelError, Result};
pub use ipc::{ProgressBus, ProgressEvent};
pub use registry::{Handler, HandlerFuture, HandlerInfo, HandlerRegistry, handler_fn};
