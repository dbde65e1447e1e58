//! Relationship edges: named containment or reference collections of entities.

use crate::entity::EntityHandle;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// How an edge relates parent to children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationKind {
    /// Parent owns the children; deleting the parent deletes them.
    Containment,
    /// Non-owning pointer collection. Inserting here moves nothing on disk,
    /// so observers are told the member was relocated.
    Reference,
}

/// Outcome of a removal attempt, distinct from an error: an edge that cannot
/// remove is a capability gap, not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotMember,
    Unsupported,
}

/// A named edge on an entity holding zero or more children, keyed by id.
#[derive(Debug, Clone)]
pub struct Relationship {
    name: String,
    kind: RelationKind,
    frozen: bool,
    members: BTreeMap<String, EntityHandle>,
}

impl Relationship {
    pub fn containment(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: RelationKind::Containment,
            frozen: false,
            members: BTreeMap::new(),
        }
    }

    pub fn reference(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: RelationKind::Reference,
            frozen: false,
            members: BTreeMap::new(),
        }
    }

    /// Disable removal from this edge; `remove` reports `Unsupported`.
    pub fn frozen(mut self) -> Self {
        self.frozen = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> RelationKind {
        self.kind
    }

    pub fn is_containment(&self) -> bool {
        self.kind == RelationKind::Containment
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Membership test by identity (same allocation), not value equality.
    pub fn contains(&self, entity: &EntityHandle) -> bool {
        self.members
            .values()
            .any(|member| Arc::ptr_eq(member, entity))
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.members.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<EntityHandle> {
        self.members.get(id).cloned()
    }

    pub fn insert(&mut self, id: impl Into<String>, entity: EntityHandle) {
        self.members.insert(id.into(), entity);
    }

    pub fn remove(&mut self, id: &str) -> RemoveOutcome {
        if self.frozen {
            return RemoveOutcome::Unsupported;
        }
        match self.members.remove(id) {
            Some(_) => RemoveOutcome::Removed,
            None => RemoveOutcome::NotMember,
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    pub fn members(&self) -> impl Iterator<Item = &EntityHandle> {
        self.members.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;

    #[test]
    fn contains_is_identity_not_equality() {
        let mut rel = Relationship::containment("routes");
        let member = Entity::new("r1", "pkg.IpRouteEntry", "IpRouteEntry").into_handle();
        let twin = Entity::new("r1", "pkg.IpRouteEntry", "IpRouteEntry").into_handle();

        rel.insert("r1", member.clone());
        assert!(rel.contains(&member));
        assert!(!rel.contains(&twin));
        assert!(rel.contains_id("r1"));
    }

    #[test]
    fn remove_outcomes() {
        let mut rel = Relationship::containment("routes");
        rel.insert(
            "r1",
            Entity::new("r1", "pkg.IpRouteEntry", "IpRouteEntry").into_handle(),
        );

        assert_eq!(rel.remove("r2"), RemoveOutcome::NotMember);
        assert_eq!(rel.remove("r1"), RemoveOutcome::Removed);
        assert!(rel.is_empty());
    }

    #[test]
    fn frozen_edge_refuses_removal() {
        let mut rel = Relationship::reference("monitors").frozen();
        rel.insert(
            "m1",
            Entity::new("m1", "mon.Monitor", "Monitor").into_handle(),
        );

        assert_eq!(rel.remove("m1"), RemoveOutcome::Unsupported);
        assert_eq!(rel.len(), 1);
    }
}
