//! Graph entities: identity, class, attributes, and relationship edges.

use crate::relationship::Relationship;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Attribute value as delivered by collectors (scalars or sequences).
pub type AttrValue = serde_json::Value;

/// Shared handle to an entity in the graph.
///
/// Entities are referenced from multiple relationships and mutated in place,
/// so they live behind `Arc<RwLock<_>>`. A single reconciliation call is
/// single-writer; concurrent writers to the same entity need external
/// serialization.
pub type EntityHandle = Arc<RwLock<Entity>>;

/// One node of the monitored-infrastructure graph.
///
/// Class identity is the `(module_name, class_name)` pair declared by the
/// plugin that modeled the entity. Attributes are an open map; the concrete
/// schema of entity classes is owned by the surrounding system.
#[derive(Debug, Clone)]
pub struct Entity {
    id: String,
    module_name: String,
    class_name: String,
    attributes: BTreeMap<String, AttrValue>,
    relationships: BTreeMap<String, Relationship>,
}

impl Entity {
    pub fn new(
        id: impl Into<String>,
        module_name: impl Into<String>,
        class_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            module_name: module_name.into(),
            class_name: class_name.into(),
            attributes: BTreeMap::new(),
            relationships: BTreeMap::new(),
        }
    }

    /// Wrap this entity in a shared handle.
    pub fn into_handle(self) -> EntityHandle {
        Arc::new(RwLock::new(self))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Does this entity's class identity match the given pair?
    pub fn class_is(&self, module_name: &str, class_name: &str) -> bool {
        self.module_name == module_name && self.class_name == class_name
    }

    pub fn attribute(&self, name: &str) -> Option<&AttrValue> {
        self.attributes.get(name)
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: AttrValue) {
        self.attributes.insert(name.into(), value);
    }

    pub fn attributes(&self) -> &BTreeMap<String, AttrValue> {
        &self.attributes
    }

    pub fn relationship(&self, name: &str) -> Option<&Relationship> {
        self.relationships.get(name)
    }

    pub fn relationship_mut(&mut self, name: &str) -> Option<&mut Relationship> {
        self.relationships.get_mut(name)
    }

    /// Attach a relationship edge, keyed by its name.
    pub fn add_relationship(&mut self, relationship: Relationship) {
        self.relationships
            .insert(relationship.name().to_string(), relationship);
    }

    pub fn relationship_names(&self) -> impl Iterator<Item = &str> {
        self.relationships.keys().map(String::as_str)
    }

    /// Find a direct child by id, scanning relationships in name order.
    pub fn find_child(&self, id: &str) -> Option<EntityHandle> {
        self.relationships.values().find_map(|rel| rel.get(id))
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}<{}>", self.module_name, self.class_name, self.id)
    }
}
