//! The engine: owns the collaborators and drives reconciliations.

use crate::bundle::{FactBundle, KEY_ID};
use crate::directive::Directive;
use crate::events::{ApplyReport, EventSink, NullSink};
use crate::reconciler::{Collaborators, Reconciler};
use crate::{AllowAll, AttributeApplier, DirectApplier, LockPolicy, ReconcileError};
use modelgraph_model::{EntityFactory, EntityHandle, RegistryFactory};
use serde::Serialize;

/// Reusable reconciliation engine: one set of collaborators, many bundles.
///
/// A fresh [`Reconciler`] is created per bundle and discarded after its one
/// `apply()`; all cross-call state lives in the external graph.
pub struct ReconcileEngine {
    factory: Box<dyn EntityFactory>,
    locks: Box<dyn LockPolicy>,
    events: Box<dyn EventSink>,
    applier: Box<dyn AttributeApplier>,
}

impl ReconcileEngine {
    /// Engine with permissive defaults: registry factory, no locks, no
    /// observers, direct attribute writes.
    pub fn new() -> Self {
        Self {
            factory: Box::new(RegistryFactory::permissive()),
            locks: Box::new(AllowAll),
            events: Box::new(NullSink),
            applier: Box::new(DirectApplier),
        }
    }

    pub fn with_factory(mut self, factory: Box<dyn EntityFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn with_locks(mut self, locks: Box<dyn LockPolicy>) -> Self {
        self.locks = locks;
        self
    }

    pub fn with_events(mut self, events: Box<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_applier(mut self, applier: Box<dyn AttributeApplier>) -> Self {
        self.applier = applier;
        self
    }

    fn collaborators(&self) -> Collaborators<'_> {
        Collaborators {
            factory: self.factory.as_ref(),
            locks: self.locks.as_ref(),
            events: self.events.as_ref(),
            applier: self.applier.as_ref(),
        }
    }

    /// Reconcile one bundle against the graph rooted at `root`.
    pub fn reconcile(
        &self,
        root: &EntityHandle,
        bundle: FactBundle,
    ) -> Result<ApplyReport, ReconcileError> {
        let mut reconciler = Reconciler::new(root.clone(), bundle, self.collaborators())?;
        reconciler.apply()
    }

    /// Reconcile with an explicit directive override instead of inference.
    /// The override is still subject to lock checks and `add` preconditions.
    pub fn reconcile_with_directive(
        &self,
        root: &EntityHandle,
        bundle: FactBundle,
        directive: Directive,
    ) -> Result<ApplyReport, ReconcileError> {
        let mut reconciler = Reconciler::new(root.clone(), bundle, self.collaborators())?;
        reconciler.set_directive(directive)?;
        reconciler.apply()
    }

    /// Reconcile a batch sequentially, continuing past per-bundle failures.
    /// Each failure is attributed to its bundle; the rest of the batch is
    /// unaffected.
    pub fn reconcile_batch(
        &self,
        root: &EntityHandle,
        bundles: impl IntoIterator<Item = FactBundle>,
    ) -> BatchReport {
        let mut report = BatchReport::default();
        for bundle in bundles {
            let target_id = bundle
                .get(KEY_ID)
                .and_then(|value| value.as_str())
                .unwrap_or_default()
                .to_string();
            match self.reconcile(root, bundle) {
                Ok(applied) => report.applied.push(applied),
                Err(error) => {
                    tracing::warn!(
                        target = %target_id,
                        error = %error,
                        "skipping bundle that failed to reconcile"
                    );
                    report.failures.push(BundleFailure {
                        target_id,
                        error: error.to_string(),
                    });
                }
            }
        }
        report
    }
}

impl Default for ReconcileEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of a batch run: per-bundle reports plus attributed failures.
#[derive(Debug, Default, Serialize)]
pub struct BatchReport {
    pub applied: Vec<ApplyReport>,
    pub failures: Vec<BundleFailure>,
}

impl BatchReport {
    /// How many reconciliations actually mutated the graph.
    pub fn changed_count(&self) -> usize {
        self.applied.iter().filter(|report| report.changed).count()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// One bundle that could not be reconciled, and why.
#[derive(Debug, Clone, Serialize)]
pub struct BundleFailure {
    pub target_id: String,
    pub error: String,
}
