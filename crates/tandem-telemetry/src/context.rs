//! Invocation context for correlating a guest call with its completion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Context carried through a single invocation of a bridged function.
///
/// The bridge creates one per call and instruments the guest work with
/// [`InvocationContext::span`], so every log line emitted on a worker thread
/// can be tied back to the call that started it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationContext {
    /// Unique invocation identifier.
    pub invocation_id: Uuid,
    /// Entry point being invoked (e.g. `Startup.Invoke`).
    pub entry_point: String,
    /// Whether the entry point completes through a deferred value.
    pub deferred: bool,
    /// When the invocation started.
    pub started_at: DateTime<Utc>,
}

impl InvocationContext {
    /// Create a new invocation context.
    #[must_use]
    pub fn new(entry_point: impl Into<String>) -> Self {
        Self {
            invocation_id: Uuid::new_v4(),
            entry_point: entry_point.into(),
            deferred: false,
            started_at: Utc::now(),
        }
    }

    /// Mark the invocation as completing through a deferred value.
    #[must_use]
    pub fn with_deferred(mut self, deferred: bool) -> Self {
        self.deferred = deferred;
        self
    }

    /// Get elapsed time since the invocation started.
    #[must_use]
    pub fn elapsed(&self) -> chrono::Duration {
        // Utc::now() >= self.started_at by construction
        #[allow(clippy::arithmetic_side_effects)]
        let elapsed = Utc::now() - self.started_at;
        elapsed
    }

    /// Get elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> i64 {
        self.elapsed().num_milliseconds()
    }

    /// Create a tracing span with this context.
    #[must_use]
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "invocation",
            invocation_id = %self.invocation_id,
            short_id = %self.short_id(),
            entry_point = %self.entry_point,
            deferred = self.deferred,
        )
    }

    /// Get a short identifier for logging.
    #[must_use]
    pub fn short_id(&self) -> String {
        let mut id = self.invocation_id.simple().to_string();
        id.truncate(8);
        id
    }
}
