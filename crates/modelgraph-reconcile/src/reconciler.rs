//! The reconciler: one fact bundle, one target resolution, one directive.
//!
//! A `Reconciler` is created per bundle, consumed by exactly one `apply()`,
//! then discarded. Parent, target, diff, and directive are resolved lazily
//! and memoized; the only invalidation path is an explicit directive
//! override, which re-runs lock and precondition checks.

use crate::bundle::{BundleParts, FactBundle};
use crate::diff::{diff_against, ChangeSet};
use crate::directive::Directive;
use crate::events::{ApplyReport, EventSink, ReconcileEvent};
use crate::{AttributeApplier, LockDecision, LockPolicy, ReconcileError};
use chrono::{DateTime, Utc};
use modelgraph_model::{resolve_path, AttrValue, EntityFactory, EntityHandle, RemoveOutcome};
use std::collections::BTreeMap;

/// The external collaborators one reconciliation talks to.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub factory: &'a dyn EntityFactory,
    pub locks: &'a dyn LockPolicy,
    pub events: &'a dyn EventSink,
    pub applier: &'a dyn AttributeApplier,
}

/// Memoized resolution slot, distinguishing "not yet resolved" from
/// "resolved to absent".
enum Cached<T> {
    Unset,
    Value(T),
}

/// Converges the graph toward one fact bundle.
pub struct Reconciler<'a> {
    root: EntityHandle,
    bundle: FactBundle,

    target_id: String,
    parent_path: Option<String>,
    relationship_name: Option<String>,
    module_name: Option<String>,
    class_name: Option<String>,
    effective_class: String,
    attributes: BTreeMap<String, AttrValue>,
    override_directive: Option<Directive>,

    collab: Collaborators<'a>,

    parent: Option<EntityHandle>,
    target: Cached<Option<EntityHandle>>,
    directive: Option<Directive>,
    diff: Option<ChangeSet>,
    changed: bool,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl<'a> Reconciler<'a> {
    /// Validate the bundle and extract identity fields. The legacy embedded
    /// directive, if present, is evaluated here and stripped from the
    /// attribute set.
    pub fn new(
        root: EntityHandle,
        bundle: FactBundle,
        collab: Collaborators<'a>,
    ) -> Result<Self, ReconcileError> {
        let parts = BundleParts::extract(&bundle)?;
        let effective_class = parts.effective_class_name();

        Ok(Self {
            root,
            bundle,
            target_id: parts.target_id,
            parent_path: parts.parent_path,
            relationship_name: parts.relationship_name,
            module_name: parts.module_name,
            class_name: parts.class_name,
            effective_class,
            attributes: parts.attributes,
            override_directive: parts.legacy_directive,
            collab,
            parent: None,
            target: Cached::Unset,
            directive: None,
            diff: None,
            changed: false,
            started_at: None,
            finished_at: None,
        })
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    pub fn changed(&self) -> bool {
        self.changed
    }

    /// Wall-clock bracketing of `apply()`; unset until it runs.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    // ========================================================================
    // Resolution (lazy, memoized)
    // ========================================================================

    /// Parent entity: the path lookup result, folding not-found into the
    /// graph root. No path means the root itself.
    pub fn parent(&mut self) -> EntityHandle {
        if let Some(parent) = &self.parent {
            return parent.clone();
        }
        let parent = match self.parent_path.as_deref() {
            Some(path) => resolve_path(&self.root, path),
            None => self.root.clone(),
        };
        self.parent = Some(parent.clone());
        parent
    }

    /// Target entity, or `None` for absent. Absence is a legitimate state
    /// feeding directive resolution, never an error: an unresolvable
    /// relationship or a missing member both yield absent.
    pub fn target(&mut self) -> Option<EntityHandle> {
        if let Cached::Value(target) = &self.target {
            return target.clone();
        }
        let parent = self.parent();
        let resolved = match self.relationship_name.as_deref() {
            None => Some(parent),
            Some(relname) => {
                let found = parent
                    .read()
                    .relationship(relname)
                    .and_then(|rel| rel.get(&self.target_id));
                if found.is_none() {
                    tracing::debug!(
                        target = %self.target_id,
                        relationship = %relname,
                        "related entity not found"
                    );
                }
                found
            }
        };
        self.target = Cached::Value(resolved.clone());
        resolved
    }

    fn relationship_resolvable(&mut self) -> bool {
        let Some(relname) = self.relationship_name.clone() else {
            return false;
        };
        let parent = self.parent();
        let exists = parent.read().relationship(&relname).is_some();
        exists
    }

    /// The resolved directive, computed on first access:
    /// override → add (absent target) → rebuild (class changed) →
    /// update (diff + valid id) → nochange.
    pub fn directive(&mut self) -> Result<Directive, ReconcileError> {
        if let Some(directive) = self.directive {
            return Ok(directive);
        }
        let resolved = if let Some(directive) = self.override_directive {
            directive
        } else if self.target().is_none() {
            Directive::Add
        } else if self.class_changed() {
            Directive::Rebuild
        } else if !self.diff().is_empty() && self.valid_id() {
            Directive::Update
        } else {
            Directive::NoChange
        };
        self.set_directive(resolved)?;
        Ok(self.directive.unwrap_or(Directive::NoChange))
    }

    /// Assign a directive. Every assignment re-runs the lock check (a denial
    /// downgrades to `nochange`) and the directive's own preconditions.
    pub fn set_directive(&mut self, directive: Directive) -> Result<(), ReconcileError> {
        let mut directive = directive;

        if directive.is_mutating() {
            let target = self.target();
            if self.collab.locks.check(directive, target.as_ref()) == LockDecision::Deny {
                tracing::debug!(
                    target = %self.target_id,
                    directive = %directive,
                    "target is locked, downgrading to nochange"
                );
                directive = Directive::NoChange;
            }
        }

        if directive == Directive::Add {
            if self.module_name.as_deref().unwrap_or_default().is_empty() {
                return Err(ReconcileError::InvalidInput(
                    "adding an entity requires modname".to_string(),
                ));
            }
            if !self.relationship_resolvable() {
                let relname = self.relationship_name.as_deref().unwrap_or("<none>");
                return Err(ReconcileError::InvalidInput(format!(
                    "directive add requires relationship {relname:?}, not found on parent"
                )));
            }
        }

        self.directive = Some(directive);
        Ok(())
    }

    /// Class identity check: an empty declared classname means "no opinion"
    /// and never triggers a rebuild.
    fn class_changed(&mut self) -> bool {
        let declared_class = match self.class_name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => return false,
        };
        let declared_module = self.module_name.clone().unwrap_or_default();
        let Some(target) = self.target() else {
            return false;
        };
        let changed = !target.read().class_is(&declared_module, &declared_class);
        if changed {
            tracing::debug!(
                target = %self.target_id,
                module = %declared_module,
                class = %declared_class,
                "declared class differs from persisted entity"
            );
        }
        changed
    }

    /// The bundle id must match the resolved target's own id; on mismatch the
    /// update is withheld rather than misapplied to the wrong entity.
    fn valid_id(&mut self) -> bool {
        if self.target_id.is_empty() {
            return true;
        }
        let Some(target) = self.target() else {
            return true;
        };
        let actual = target.read().id().to_string();
        if actual == self.target_id {
            return true;
        }
        tracing::warn!(
            bundle_id = %self.target_id,
            target_id = %actual,
            "fact bundle id does not match target id, changes will not be applied"
        );
        false
    }

    /// Attribute diff against the resolved target, computed at most once.
    pub fn diff(&mut self) -> ChangeSet {
        if self.diff.is_none() {
            let target = self.target();
            self.diff = Some(diff_against(&self.attributes, target.as_ref()));
        }
        self.diff.clone().unwrap_or_default()
    }

    // ========================================================================
    // Apply
    // ========================================================================

    /// Run the handler for the resolved directive, then notify the sink that
    /// this reconciliation finished. May propagate `InvalidInput` from
    /// directive assignment and construction failures from the factory;
    /// never errors for `nochange` or remove-on-absent.
    pub fn apply(&mut self) -> Result<ApplyReport, ReconcileError> {
        let started_at = Utc::now();
        self.started_at = Some(started_at);

        let directive = self.directive()?;
        match directive {
            Directive::Add => self.handle_add()?,
            Directive::Update => self.handle_update()?,
            Directive::Remove => self.handle_remove(),
            Directive::Rebuild => self.handle_rebuild()?,
            Directive::NoChange => self.handle_nochange(),
        }

        let finished_at = Utc::now();
        self.finished_at = Some(finished_at);

        let report = ApplyReport {
            target_id: self.target_id.clone(),
            directive,
            changed: self.changed,
            started_at,
            finished_at,
        };
        self.collab
            .events
            .notify(ReconcileEvent::Applied { report: &report });
        Ok(report)
    }

    // ========================================================================
    // Handlers
    // ========================================================================

    /// Construct the target, insert it into the relationship (idempotently,
    /// by identity), retarget to the inserted member, then update it.
    fn handle_add(&mut self) -> Result<(), ReconcileError> {
        let entity = self.construct_target()?;
        self.insert_into_relationship(&entity)?;

        // Re-resolve to the member the relationship actually holds.
        let relname = self.require_relname()?;
        let parent = self.parent();
        let inserted = parent
            .read()
            .relationship(&relname)
            .and_then(|rel| rel.get(&self.target_id));
        self.target = Cached::Value(inserted);

        self.handle_update()
    }

    /// Apply the cached diff via the attribute applier and notify the sink.
    /// Reaching `update` means the diff was non-empty at resolution time, so
    /// `changed` is set unconditionally.
    fn handle_update(&mut self) -> Result<(), ReconcileError> {
        let changes = self.diff();
        let target = self.target().ok_or_else(|| {
            ReconcileError::InvalidInput("update requires a resolved target".to_string())
        })?;

        self.collab
            .applier
            .apply(&target, &changes)
            .map_err(|source| ReconcileError::AttributeUpdate {
                target: self.target_id.clone(),
                source,
            })?;

        self.collab.events.notify(ReconcileEvent::EntityUpdated {
            root: &self.root,
            bundle: &self.bundle,
            target: &target,
        });
        self.changed = true;
        Ok(())
    }

    /// Remove the target from the parent relationship. Absent targets and
    /// edges without removal capability report `changed = false` instead of
    /// erroring.
    fn handle_remove(&mut self) {
        let Some(target) = self.target() else {
            self.changed = false;
            return;
        };
        let member_id = target.read().id().to_string();
        let parent = self.parent();

        let outcome = match self.relationship_name.as_deref() {
            None => RemoveOutcome::Unsupported,
            Some(relname) => {
                let mut guard = parent.write();
                match guard.relationship_mut(relname) {
                    None => RemoveOutcome::Unsupported,
                    Some(rel) => rel.remove(&member_id),
                }
            }
        };

        if outcome == RemoveOutcome::Unsupported {
            tracing::debug!(
                target = %self.target_id,
                "relationship does not support removal"
            );
        }
        self.changed = outcome == RemoveOutcome::Removed;
    }

    /// Remove then add, unconditionally. Recreation is the only way to change
    /// an entity's persisted class.
    fn handle_rebuild(&mut self) -> Result<(), ReconcileError> {
        tracing::debug!(target = %self.target_id, "rebuilding entity with declared class");
        self.handle_remove();
        self.handle_add()?;
        self.changed = true;
        Ok(())
    }

    fn handle_nochange(&mut self) {
        tracing::debug!(target = %self.target_id, "entity unchanged");
    }

    // ========================================================================
    // Add helpers
    // ========================================================================

    fn construct_target(&self) -> Result<EntityHandle, ReconcileError> {
        let module = self.module_name.as_deref().unwrap_or_default();
        let entity = self
            .collab
            .factory
            .construct(module, &self.effective_class, &self.target_id)?;
        Ok(entity)
    }

    fn insert_into_relationship(&mut self, entity: &EntityHandle) -> Result<(), ReconcileError> {
        let relname = self.require_relname()?;
        let parent = self.parent();

        let relocated = {
            let mut guard = parent.write();
            let rel = guard.relationship_mut(&relname).ok_or_else(|| {
                ReconcileError::InvalidInput(format!(
                    "relationship {relname:?} not found on parent"
                ))
            })?;
            if rel.contains(entity) {
                return Ok(());
            }
            tracing::debug!(
                target = %self.target_id,
                relationship = %relname,
                "inserting entity into relationship"
            );
            rel.insert(self.target_id.clone(), entity.clone());
            !rel.is_containment()
        };

        // Non-owning edges: tell observers the member moved rather than
        // being newly contained.
        if relocated {
            self.collab.events.notify(ReconcileEvent::EntityRelocated {
                target: entity,
                relationship: &relname,
            });
        }
        Ok(())
    }

    // Guaranteed present after `add` validation; the error is a backstop.
    fn require_relname(&self) -> Result<String, ReconcileError> {
        self.relationship_name.clone().ok_or_else(|| {
            ReconcileError::InvalidInput("directive requires a relationship, no relname given".to_string())
        })
    }
}
