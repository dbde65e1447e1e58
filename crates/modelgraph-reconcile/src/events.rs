//! Events emitted during reconciliation, for external observers.

use crate::bundle::FactBundle;
use crate::directive::Directive;
use chrono::{DateTime, Utc};
use modelgraph_model::EntityHandle;
use serde::{Deserialize, Serialize};

/// What one `apply()` did, for observers and batch reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyReport {
    pub target_id: String,
    pub directive: Directive,
    pub changed: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Events delivered to the [`EventSink`].
#[derive(Clone, Copy)]
pub enum ReconcileEvent<'a> {
    /// The update handler wrote attributes to the target.
    EntityUpdated {
        root: &'a EntityHandle,
        bundle: &'a FactBundle,
        target: &'a EntityHandle,
    },
    /// An entity was inserted into a non-owning relationship.
    EntityRelocated {
        target: &'a EntityHandle,
        relationship: &'a str,
    },
    /// One reconciliation finished, whatever the outcome. Always emitted.
    Applied { report: &'a ApplyReport },
}

/// External observer of reconciliation activity. Callbacks are synchronous
/// and must not block indefinitely.
pub trait EventSink: Send + Sync {
    fn notify(&self, event: ReconcileEvent<'_>);
}

/// Sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn notify(&self, _event: ReconcileEvent<'_>) {}
}
