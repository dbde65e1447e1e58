//! Convergence directives: the action chosen for one reconciliation.

use crate::ReconcileError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The action that converges the graph toward a fact bundle.
///
/// Every directive is terminal for a single `apply()`; there are no automatic
/// transitions between calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Directive {
    /// Target does not exist; construct and insert it, then update.
    Add,
    /// Target exists and differs; apply the attribute diff.
    Update,
    /// Remove the target from its parent relationship.
    Remove,
    /// Declared class differs from the persisted one; delete and recreate.
    /// The only way to change an entity's type.
    Rebuild,
    /// Nothing to do.
    NoChange,
}

impl Directive {
    /// Directives that mutate the graph and are subject to lock vetoes.
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Directive::NoChange)
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Directive::Add => "add",
            Directive::Update => "update",
            Directive::Remove => "remove",
            Directive::Rebuild => "rebuild",
            Directive::NoChange => "nochange",
        };
        f.write_str(verb)
    }
}

impl FromStr for Directive {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(Directive::Add),
            "update" => Ok(Directive::Update),
            "remove" => Ok(Directive::Remove),
            "rebuild" => Ok(Directive::Rebuild),
            "nochange" => Ok(Directive::NoChange),
            other => Err(ReconcileError::InvalidInput(format!(
                "unknown directive verb: {other:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display_round_trip() {
        for verb in ["add", "update", "remove", "rebuild", "nochange"] {
            let directive: Directive = verb.parse().expect("known verb");
            assert_eq!(directive.to_string(), verb);
        }
    }

    #[test]
    fn unknown_verb_is_invalid_input() {
        let err = "upsert".parse::<Directive>().expect_err("unknown verb");
        assert!(matches!(err, ReconcileError::InvalidInput(_)));
    }

    #[test]
    fn only_nochange_is_non_mutating() {
        assert!(Directive::Add.is_mutating());
        assert!(Directive::Update.is_mutating());
        assert!(Directive::Remove.is_mutating());
        assert!(Directive::Rebuild.is_mutating());
        assert!(!Directive::NoChange.is_mutating());
    }
}
