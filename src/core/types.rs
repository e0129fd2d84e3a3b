//! Scheduling vocabulary: execution classes, action kinds, locations,
//! identities, targets, and the linearization policy.
//!
//! All of these are closed enumerations: the set of scheduling buckets and
//! backend kinds is small and fixed, so dispatch happens by `match`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Positional call arguments. Opaque to scheduling.
pub type Args = Vec<serde_json::Value>;

// ============================================================================
// Execution class
// ============================================================================

/// Scheduling bucket for an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionClass {
    /// Merged per identity, runs before in-sequence actions.
    Aggregated,
    /// Runs in declared order.
    InSequence,
    /// Merged per identity, runs after in-sequence actions.
    Collected,
}

impl ExecutionClass {
    /// Bucket position in the base linearization order.
    pub fn rank(self) -> u8 {
        match self {
            Self::Aggregated => 0,
            Self::InSequence => 1,
            Self::Collected => 2,
        }
    }

    /// Whether occurrences sharing an identity collapse into one step.
    pub fn merges(self) -> bool {
        !matches!(self, Self::InSequence)
    }
}

impl fmt::Display for ExecutionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aggregated => write!(f, "aggregated"),
            Self::InSequence => write!(f, "in-sequence"),
            Self::Collected => write!(f, "collected"),
        }
    }
}

// ============================================================================
// Action kind / location
// ============================================================================

/// Backend interpretation tag, carried through to the plan untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    RemoteScript,
    LocalFunction,
    TransferToTarget,
    TransferFromTarget,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RemoteScript => write!(f, "remote-script"),
            Self::LocalFunction => write!(f, "local-function"),
            Self::TransferToTarget => write!(f, "transfer-to-target"),
            Self::TransferFromTarget => write!(f, "transfer-from-target"),
        }
    }
}

/// Where an action's effect is realized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    Origin,
    Target,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Origin => write!(f, "origin"),
            Self::Target => write!(f, "target"),
        }
    }
}

// ============================================================================
// Identities
// ============================================================================

/// Stable identity of a defined action, derived from its declared name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(String);

impl ActionId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ActionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Reserved target name for the controlling host.
pub const ORIGIN: &str = "origin";

/// The node a phase pass runs against, or the controlling host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TargetId {
    /// No node: origin-only actions.
    Origin,
    Node(String),
}

impl TargetId {
    /// A named node. The reserved name `origin` yields [`TargetId::Origin`].
    pub fn node(name: impl Into<String>) -> Self {
        Self::from(name.into())
    }

    /// `Node("origin")` is invalid: it would display and serialize exactly
    /// like [`TargetId::Origin`] while keying a different plan path.
    pub fn is_valid(&self) -> bool {
        match self {
            Self::Origin => true,
            Self::Node(name) => name != ORIGIN && is_identifier(name),
        }
    }
}

impl From<String> for TargetId {
    fn from(s: String) -> Self {
        if s == ORIGIN {
            Self::Origin
        } else {
            Self::Node(s)
        }
    }
}

impl From<&str> for TargetId {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<TargetId> for String {
    fn from(t: TargetId) -> Self {
        t.to_string()
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Origin => f.write_str(ORIGIN),
            Self::Node(name) => f.write_str(name),
        }
    }
}

/// Check that a phase, target, or action name is a usable identifier:
/// non-empty, no whitespace or control characters, and limited punctuation.
pub fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ':' | '/' | '@'))
}

// ============================================================================
// Policy
// ============================================================================

/// Linearization policy, read from the phase file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// What to do with precedence references to actions absent from a plan
    #[serde(default)]
    pub missing_references: ReferencePolicy,
}

/// Handling of dangling precedence references.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferencePolicy {
    #[default]
    Ignore,
    Error,
}
