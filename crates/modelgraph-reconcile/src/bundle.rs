//! Fact bundles: one external observation about one target entity.

use crate::directive::Directive;
use crate::ReconcileError;
use modelgraph_model::AttrValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reserved keys carrying identity rather than observed attributes.
pub const KEY_ID: &str = "id";
pub const KEY_PARENT_ID: &str = "parentId";
pub const KEY_COMPNAME: &str = "compname";
pub const KEY_RELNAME: &str = "relname";
pub const KEY_MODNAME: &str = "modname";
pub const KEY_CLASSNAME: &str = "classname";
/// Legacy embedded directive override, evaluated and stripped before
/// identity extraction.
pub const KEY_DIRECTIVE: &str = "directive";

const RESERVED_KEYS: &[&str] = &[
    KEY_ID,
    KEY_PARENT_ID,
    KEY_COMPNAME,
    KEY_RELNAME,
    KEY_MODNAME,
    KEY_CLASSNAME,
    KEY_DIRECTIVE,
];

/// A partial observation of one entity: a flat key/value map plus reserved
/// identity keys. Immutable for the life of one reconciliation call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactBundle {
    values: BTreeMap<String, AttrValue>,
}

impl FactBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bundle targeting the entity with the given id.
    pub fn for_target(id: impl Into<String>) -> Self {
        let id: String = id.into();
        Self::new().with(KEY_ID, id)
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn parent(self, path: impl Into<String>) -> Self {
        let path: String = path.into();
        self.with(KEY_PARENT_ID, path)
    }

    pub fn relname(self, name: impl Into<String>) -> Self {
        let name: String = name.into();
        self.with(KEY_RELNAME, name)
    }

    pub fn modname(self, name: impl Into<String>) -> Self {
        let name: String = name.into();
        self.with(KEY_MODNAME, name)
    }

    pub fn classname(self, name: impl Into<String>) -> Self {
        let name: String = name.into();
        self.with(KEY_CLASSNAME, name)
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.values.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<AttrValue>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttrValue)> {
        self.values.iter()
    }
}

/// Identity fields pulled out of a bundle, with the remainder as attributes.
#[derive(Debug, Clone)]
pub(crate) struct BundleParts {
    pub target_id: String,
    pub parent_path: Option<String>,
    pub relationship_name: Option<String>,
    pub module_name: Option<String>,
    pub class_name: Option<String>,
    pub legacy_directive: Option<Directive>,
    pub attributes: BTreeMap<String, AttrValue>,
}

impl BundleParts {
    /// Extract identity keys from a bundle. Reserved keys must be strings;
    /// anything else is a malformed bundle.
    pub fn extract(bundle: &FactBundle) -> Result<Self, ReconcileError> {
        let legacy_directive = match bundle.get(KEY_DIRECTIVE) {
            None => None,
            Some(value) => Some(reserved_str(KEY_DIRECTIVE, value)?.parse()?),
        };

        let target_id = match bundle.get(KEY_ID) {
            None => String::new(),
            Some(value) => reserved_str(KEY_ID, value)?.to_string(),
        };

        // `compname` is the legacy alias for the parent path; it wins when
        // both are present.
        let parent_path = match (bundle.get(KEY_COMPNAME), bundle.get(KEY_PARENT_ID)) {
            (Some(value), _) => Some(reserved_str(KEY_COMPNAME, value)?.to_string()),
            (None, Some(value)) => Some(reserved_str(KEY_PARENT_ID, value)?.to_string()),
            (None, None) => None,
        };

        let relationship_name = reserved_opt(bundle, KEY_RELNAME)?;
        let module_name = reserved_opt(bundle, KEY_MODNAME)?;
        let class_name = reserved_opt(bundle, KEY_CLASSNAME)?;

        let attributes = bundle
            .iter()
            .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Ok(Self {
            target_id,
            parent_path,
            relationship_name,
            module_name,
            class_name,
            legacy_directive,
            attributes,
        })
    }

    /// Class name for construction: the declared one, or the tail of the
    /// module name when no class is declared.
    pub fn effective_class_name(&self) -> String {
        match self.class_name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self
                .module_name
                .as_deref()
                .and_then(|module| module.rsplit('.').next())
                .unwrap_or_default()
                .to_string(),
        }
    }
}

fn reserved_str<'a>(key: &str, value: &'a AttrValue) -> Result<&'a str, ReconcileError> {
    value.as_str().ok_or_else(|| {
        ReconcileError::InvalidInput(format!("reserved key {key:?} must be a string, got {value}"))
    })
}

fn reserved_opt(bundle: &FactBundle, key: &str) -> Result<Option<String>, ReconcileError> {
    match bundle.get(key) {
        None => Ok(None),
        Some(value) => Ok(Some(reserved_str(key, value)?.to_string())),
    }
}
