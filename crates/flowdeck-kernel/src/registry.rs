//! Channel handler registry.
//!
//! Callers reach the engine through named channels (`run-workflow`,
//! `execute-step`, ...).  The registry maps each channel to exactly one
//! async handler.  It is an explicit object owned by the component that
//! wires the engine to its transport: handlers are registered at startup,
//! replaced on re-registration (never duplicated), and dropped with
//! [`HandlerRegistry::clear`] on shutdown.
//!
//! Internally the registry is backed by [`DashMap`] so it can be shared
//! across tasks without a global lock.
//!
//! # Example
//!
//! ```rust
//! # use flowdeck_kernel::registry::{HandlerRegistry, handler_fn};
//! # async fn example() {
//! let registry = HandlerRegistry::new();
//! registry.register("ping", handler_fn(|payload| async move { Ok(payload) }));
//!
//! let reply = registry.dispatch("ping", serde_json::json!({"n": 1})).await.unwrap();
//! assert_eq!(reply["n"], 1);
//! # }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;

use crate::error::{KernelError, Result};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// The future returned by a channel handler.
pub type HandlerFuture = Pin<Box<dyn Future<Output = std::result::Result<Value, String>> + Send>>;

/// A channel handler: takes a JSON payload, resolves to a JSON reply.
pub type Handler = Arc<dyn Fn(Value) -> HandlerFuture + Send + Sync>;

/// Wrap an async closure into a [`Handler`].
pub fn handler_fn<F, Fut>(f: F) -> Handler
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<Value, String>> + Send + 'static,
{
    Arc::new(move |payload| Box::pin(f(payload)))
}

/// Metadata about a registered channel.
#[derive(Debug, Clone, Serialize)]
pub struct HandlerInfo {
    /// Channel name.
    pub channel: String,
    /// When the current handler was registered.
    pub registered_at: DateTime<Utc>,
    /// Number of dispatches served by the current handler.
    pub dispatch_count: u64,
}

struct Entry {
    handler: Handler,
    info: HandlerInfo,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Concurrent channel → handler registry.
///
/// The registry is cheaply cloneable (`Arc`-backed) and `Send + Sync`.
#[derive(Clone)]
pub struct HandlerRegistry {
    inner: Arc<DashMap<String, Entry>>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
        }
    }

    /// Register `handler` for `channel`.
    ///
    /// If the channel already has a handler it is replaced.  Returns `true`
    /// when an existing handler was replaced.
    pub fn register(&self, channel: impl Into<String>, handler: Handler) -> bool {
        let channel = channel.into();
        let info = HandlerInfo {
            channel: channel.clone(),
            registered_at: Utc::now(),
            dispatch_count: 0,
        };

        let replaced = self
            .inner
            .insert(channel.clone(), Entry { handler, info })
            .is_some();

        if replaced {
            tracing::debug!(channel = %channel, "handler replaced");
        } else {
            tracing::info!(channel = %channel, "handler registered");
        }
        replaced
    }

    /// Remove the handler for `channel`, returning `true` if one existed.
    pub fn unregister(&self, channel: &str) -> bool {
        let removed = self.inner.remove(channel).is_some();
        if removed {
            tracing::info!(channel = %channel, "handler unregistered");
        }
        removed
    }

    /// Invoke the handler registered for `channel` with `payload`.
    pub async fn dispatch(&self, channel: &str, payload: Value) -> Result<Value> {
        // Clone the handler out so no map guard is held across the await.
        let handler = {
            let mut entry =
                self.inner
                    .get_mut(channel)
                    .ok_or_else(|| KernelError::HandlerNotFound {
                        channel: channel.to_string(),
                    })?;
            entry.info.dispatch_count += 1;
            Arc::clone(&entry.handler)
        };

        tracing::trace!(channel = %channel, "dispatching");

        handler(payload)
            .await
            .map_err(|reason| KernelError::HandlerFailed {
                channel: channel.to_string(),
                reason,
            })
    }

    /// Whether a handler is registered for `channel`.
    pub fn contains(&self, channel: &str) -> bool {
        self.inner.contains_key(channel)
    }

    /// Snapshot of a channel's metadata.
    pub fn info(&self, channel: &str) -> Option<HandlerInfo> {
        self.inner.get(channel).map(|e| e.info.clone())
    }

    /// Return all registered channel names, sorted.
    pub fn channels(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Return the number of registered channels.
    pub fn count(&self) -> usize {
        self.inner.len()
    }

    /// Drop every handler.  Called on application shutdown.
    pub fn clear(&self) {
        let n = self.inner.len();
        self.inner.clear();
        tracing::info!(handlers = n, "handler registry cleared");
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo() -> Handler {
        handler_fn(|payload| async move { Ok(payload) })
    }

    #[tokio::test]
    async fn register_and_dispatch() {
        let registry = HandlerRegistry::new();
        assert!(!registry.register("echo", echo()));

        let reply = registry.dispatch("echo", json!({"a": 1})).await.unwrap();
        assert_eq!(reply, json!({"a": 1}));
        assert_eq!(registry.info("echo").unwrap().dispatch_count, 1);
    }

    #[tokio::test]
    async fn reregister_replaces_without_duplicating() {
        let registry = HandlerRegistry::new();
        registry.register("chan", echo());
        let replaced = registry.register(
            "chan",
            handler_fn(|_| async move { Ok(json!("second")) }),
        );

        assert!(replaced);
        assert_eq!(registry.count(), 1);
        let reply = registry.dispatch("chan", Value::Null).await.unwrap();
        assert_eq!(reply, json!("second"));
    }

    #[tokio::test]
    async fn dispatch_unknown_channel() {
        let registry = HandlerRegistry::new();
        let result = registry.dispatch("missing", Value::Null).await;
        assert!(matches!(result, Err(KernelError::HandlerNotFound { .. })));
    }

    #[tokio::test]
    async fn handler_failure_is_wrapped() {
        let registry = HandlerRegistry::new();
        registry.register(
            "boom",
            handler_fn(|_| async move { Err("exploded".to_string()) }),
        );

        match registry.dispatch("boom", Value::Null).await {
            Err(KernelError::HandlerFailed { channel, reason }) => {
                assert_eq!(channel, "boom");
                assert_eq!(reason, "exploded");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn unregister_and_clear() {
        let registry = HandlerRegistry::new();
        registry.register("a", echo());
        registry.register("b", echo());
        assert_eq!(registry.channels(), vec!["a".to_string(), "b".to_string()]);

        assert!(registry.unregister("a"));
        assert!(!registry.unregister("a"));
        assert!(!registry.contains("a"));

        registry.clear();
        assert_eq!(registry.count(), 0);
    }
}
