//! Attribute diffing between a fact bundle and the current target state.

use modelgraph_model::{AttrValue, EntityHandle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The minimal attribute change set: keys whose bundle value differs from
/// (or is missing on) the target, with their new values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeSet {
    changes: BTreeMap<String, AttrValue>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.changes.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttrValue)> {
        self.changes.iter()
    }
}

/// Compare bundle attributes against the target's current values.
///
/// Deterministic and side-effect free; an absent target diffs to empty
/// (directive resolution short-circuits to `add` before diffing matters).
pub fn diff_against(
    attributes: &BTreeMap<String, AttrValue>,
    target: Option<&EntityHandle>,
) -> ChangeSet {
    let Some(target) = target else {
        return ChangeSet::default();
    };

    let entity = target.read();
    let changes = attributes
        .iter()
        .filter(|(key, value)| entity.attribute(key) != Some(value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    ChangeSet { changes }
}
