//! Precedence metadata: relation key → set of action identities.
//!
//! Merging is a per-key set union, so it is associative and commutative and
//! the empty map is its identity. The meaning of each relation key belongs to
//! the plan store that linearizes the plan (see `planner`); this module only
//! guarantees that entries propagate and merge correctly.

use super::action::{ActionFn, ActionMeta, MetaValue};
use super::types::ActionId;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Ordering constraints attached to an action or active in a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Precedence(BTreeMap<String, BTreeSet<ActionId>>);

impl Precedence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Precedence::insert_all`].
    pub fn with<I, T>(mut self, relation: impl Into<String>, ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ActionId>,
    {
        self.insert_all(relation, ids);
        self
    }

    pub fn insert(&mut self, relation: impl Into<String>, id: impl Into<ActionId>) {
        self.0.entry(relation.into()).or_default().insert(id.into());
    }

    pub fn insert_all<I, T>(&mut self, relation: impl Into<String>, ids: I)
    where
        I: IntoIterator<Item = T>,
        T: Into<ActionId>,
    {
        let set = self.0.entry(relation.into()).or_default();
        set.extend(ids.into_iter().map(Into::into));
    }

    pub fn get(&self, relation: &str) -> Option<&BTreeSet<ActionId>> {
        self.0.get(relation)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeSet<ActionId>)> {
        self.0.iter()
    }

    /// Per-key union of `self` and `other`. Neither input is modified.
    pub fn merge(&self, other: &Precedence) -> Precedence {
        let mut out = self.clone();
        for (relation, ids) in &other.0 {
            out.0
                .entry(relation.clone())
                .or_default()
                .extend(ids.iter().cloned());
        }
        out
    }

    /// Relation entries of definition-site metadata. Single identities become
    /// one-element sets; text entries are not relations and are skipped.
    pub fn from_meta(meta: &ActionMeta) -> Precedence {
        let mut out = Precedence::new();
        for (key, value) in meta.iter() {
            match value {
                MetaValue::Id(id) => out.insert(key.clone(), id.clone()),
                MetaValue::Ids(ids) => out.insert_all(key.clone(), ids.iter().cloned()),
                MetaValue::Text(_) => {}
            }
        }
        out
    }
}

/// Merge an action's intrinsic relations with the ambient precedence context.
pub fn resolve_metadata(context: &Precedence, action: &ActionFn) -> Precedence {
    let resolved = Precedence::from_meta(action.meta()).merge(context);
    tracing::trace!(
        action = %action.id(),
        relations = resolved.0.len(),
        "resolved precedence metadata"
    );
    resolved
}
