//! Modelgraph Reconciliation Engine
//!
//! Converges the persisted object graph toward fact bundles produced by
//! external collectors. One bundle describes one entity; the engine decides
//! which action makes the graph match the bundle, executes it safely, and
//! reports whether anything changed.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                     RECONCILIATION PIPELINE                         │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │                                                                     │
//! │  FactBundle ──► extract identity ──► resolve parent/target          │
//! │                                            │                        │
//! │                                            ▼                        │
//! │                        ┌── directive resolution ──┐                 │
//! │                        │ override → add → rebuild │◄── LockPolicy   │
//! │                        │     → update → nochange  │                 │
//! │                        └──────────┬───────────────┘                 │
//! │                                   ▼                                 │
//! │   EntityFactory ──► add / update / remove / rebuild / nochange      │
//! │                                   │                                 │
//! │                                   ▼                                 │
//! │                        EventSink (updated / relocated / applied)    │
//! │                                                                     │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The core is synchronous and performs no I/O. Transport, store commit
//! semantics, and scheduling live in the surrounding orchestrator.

pub mod bundle;
pub mod diff;
pub mod directive;
pub mod engine;
pub mod events;
pub mod reconciler;

use modelgraph_model::FactoryError;

// ============================================================================
// Errors
// ============================================================================

/// Errors that abort a single reconciliation. Identity mismatches and
/// lookup-not-found conditions are folded into safe defaults instead and
/// never surface here.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// Malformed fact bundle, or a directive whose preconditions fail
    /// (`add` without a module name, or a missing relationship when one is
    /// required). Fatal for this bundle only; batch callers skip and go on.
    #[error("invalid reconciliation input: {0}")]
    InvalidInput(String),

    /// The entity factory refused to construct the target.
    #[error(transparent)]
    EntityCreation(#[from] FactoryError),

    /// The attribute applier failed to write the change set.
    #[error("attribute update failed for {target}: {source}")]
    AttributeUpdate {
        target: String,
        #[source]
        source: anyhow::Error,
    },
}

// ============================================================================
// Collaborator traits
// ============================================================================

/// Verdict of the lock policy for one directive against one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockDecision {
    Allow,
    Deny,
}

/// External veto authority over mutation of a specific entity. Consulted on
/// every directive assignment for mutating directives; a denial downgrades
/// the directive to `nochange` rather than erroring.
pub trait LockPolicy: Send + Sync {
    fn check(&self, directive: Directive, target: Option<&EntityHandle>) -> LockDecision;
}

/// Policy that never vetoes.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl LockPolicy for AllowAll {
    fn check(&self, _directive: Directive, _target: Option<&EntityHandle>) -> LockDecision {
        LockDecision::Allow
    }
}

/// Writes a resolved change set into the target's persisted attributes.
/// External so the surrounding store can intercept attribute writes.
pub trait AttributeApplier: Send + Sync {
    fn apply(&self, target: &EntityHandle, changes: &ChangeSet) -> anyhow::Result<()>;
}

/// Applier that writes straight into the in-memory entity.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectApplier;

impl AttributeApplier for DirectApplier {
    fn apply(&self, target: &EntityHandle, changes: &ChangeSet) -> anyhow::Result<()> {
        let mut entity = target.write();
        for (key, value) in changes.iter() {
            entity.set_attribute(key.clone(), value.clone());
        }
        Ok(())
    }
}

// ============================================================================
// Re-exports
// ============================================================================

pub use bundle::FactBundle;
pub use diff::{diff_against, ChangeSet};
pub use directive::Directive;
pub use engine::{BatchReport, BundleFailure, ReconcileEngine};
pub use events::{ApplyReport, EventSink, NullSink, ReconcileEvent};
pub use reconciler::{Collaborators, Reconciler};

// Model types callers need alongside the engine.
pub use modelgraph_model::{
    AttrValue, Entity, EntityFactory, EntityHandle, RegistryFactory, RelationKind, Relationship,
};
