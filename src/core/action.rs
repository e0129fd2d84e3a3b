//! Action functions, their definition-site metadata, and the immutable
//! descriptor submitted to a plan store for every action occurrence.

use super::precedence::Precedence;
use super::types::{ActionId, ActionKind, Args, ExecutionClass, Location};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Metadata key carrying the declared action name.
pub const ACTION_NAME: &str = "action-name";

/// Metadata key carrying the documentation string.
pub const DOC: &str = "doc";

/// Relation: this action runs before the named actions.
pub const ALWAYS_BEFORE: &str = "always-before";

/// Relation: this action runs after the named actions.
pub const ALWAYS_AFTER: &str = "always-after";

/// Renders one argument set into the action's payload (script text, a
/// local computation's result, a transfer spec).
pub type ActionBody = Arc<dyn Fn(&[serde_json::Value]) -> Result<String, String> + Send + Sync>;

// ============================================================================
// Metadata
// ============================================================================

/// A single metadata value. Identity-valued entries are precedence relations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MetaValue {
    Text(String),
    Id(ActionId),
    Ids(BTreeSet<ActionId>),
}

impl MetaValue {
    /// Identities named by a relation entry. Text entries name none.
    fn relation_ids(&self) -> Option<BTreeSet<ActionId>> {
        match self {
            MetaValue::Text(_) => None,
            MetaValue::Id(id) => Some(BTreeSet::from([id.clone()])),
            MetaValue::Ids(ids) => Some(ids.clone()),
        }
    }
}

/// Definition-site metadata attached to an action function.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActionMeta(IndexMap<String, MetaValue>);

impl ActionMeta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a plain text entry.
    pub fn text(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), MetaValue::Text(value.into()));
        self
    }

    /// Add identities to a relation entry, unioning with any already present.
    pub fn relation<I, T>(mut self, key: impl Into<String>, ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ActionId>,
    {
        let ids: BTreeSet<ActionId> = ids.into_iter().map(Into::into).collect();
        self.insert(key, MetaValue::Ids(ids));
        self
    }

    /// Insert an entry. Two relation entries under one key are unioned;
    /// otherwise the new value replaces the old.
    pub fn insert(&mut self, key: impl Into<String>, value: MetaValue) {
        let key = key.into();
        let joined = self
            .0
            .get(&key)
            .and_then(MetaValue::relation_ids)
            .zip(value.relation_ids());
        match joined {
            Some((mut ids, extra)) => {
                ids.extend(extra);
                self.0.insert(key, MetaValue::Ids(ids));
            }
            None => {
                self.0.insert(key, value);
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        self.0.get(key)
    }

    /// Entries of `other` win on key collisions, except that relation
    /// entries on both sides are unioned.
    pub fn merged(&self, other: &ActionMeta) -> ActionMeta {
        let mut out = self.clone();
        for (k, v) in &other.0 {
            out.insert(k.clone(), v.clone());
        }
        out
    }

    pub fn name(&self) -> Option<&str> {
        self.text_entry(ACTION_NAME)
    }

    pub fn doc(&self) -> Option<&str> {
        self.text_entry(DOC)
    }

    fn text_entry(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(MetaValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MetaValue)> {
        self.0.iter()
    }
}

// ============================================================================
// Action function
// ============================================================================

/// An action-producing function: identity, intrinsic metadata, and body.
///
/// Equality is identity equality, so every occurrence of the same defined
/// action compares equal regardless of arguments.
#[derive(Clone)]
pub struct ActionFn {
    id: ActionId,
    meta: ActionMeta,
    body: ActionBody,
}

impl ActionFn {
    /// An action function with no intrinsic metadata.
    pub fn new<F>(id: impl Into<ActionId>, body: F) -> Self
    where
        F: Fn(&[serde_json::Value]) -> Result<String, String> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            meta: ActionMeta::new(),
            body: Arc::new(body),
        }
    }

    pub fn with_meta(mut self, meta: ActionMeta) -> Self {
        self.meta = meta;
        self
    }

    pub fn id(&self) -> &ActionId {
        &self.id
    }

    pub fn meta(&self) -> &ActionMeta {
        &self.meta
    }

    /// Invoke the body for one argument set.
    pub fn render(&self, args: &[serde_json::Value]) -> Result<String, String> {
        (self.body)(args)
    }
}

impl PartialEq for ActionFn {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ActionFn {}

impl fmt::Debug for ActionFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionFn")
            .field("id", &self.id)
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Descriptor
// ============================================================================

/// One action occurrence. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct ActionDescriptor {
    function: ActionFn,
    args: Args,
    class: ExecutionClass,
    kind: ActionKind,
    location: Location,
    metadata: Precedence,
}

impl ActionDescriptor {
    pub fn new(
        function: ActionFn,
        args: Args,
        class: ExecutionClass,
        kind: ActionKind,
        location: Location,
        metadata: Precedence,
    ) -> Self {
        Self {
            function,
            args,
            class,
            kind,
            location,
            metadata,
        }
    }

    pub fn function(&self) -> &ActionFn {
        &self.function
    }

    pub fn id(&self) -> &ActionId {
        self.function.id()
    }

    pub fn args(&self) -> &[serde_json::Value] {
        &self.args
    }

    pub fn class(&self) -> ExecutionClass {
        self.class
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn metadata(&self) -> &Precedence {
        &self.metadata
    }
}
