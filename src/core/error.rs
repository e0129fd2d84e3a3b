//! Error taxonomy for scheduling, plan storage, and action definition.
//!
//! Every variant aborts the current scheduling pass. Nothing here is retried.

use super::types::ActionId;
use thiserror::Error;

/// Failure while registering actions or threading a session.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("no active phase in session")]
    MissingPhase,

    #[error("no active target in session")]
    MissingTarget,

    #[error("invalid {field} identifier: {value:?}")]
    InvalidIdentifier { field: &'static str, value: String },

    #[error("action '{action}' takes {expected} argument(s), got {got}")]
    ArityMismatch {
        action: ActionId,
        expected: usize,
        got: usize,
    },

    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Invalid-state failure raised by a plan store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{path}: leave-scope with no open block")]
    NoOpenBlock { path: String },

    #[error("{path}: {depth} scope(s) left open at phase completion")]
    LeakedScope { path: String, depth: usize },

    #[error("{path}: precedence cycle detected involving: {}", .members.join(", "))]
    PrecedenceCycle { path: String, members: Vec<String> },

    #[error("{path}: action '{action}' declares {relation} unknown action '{missing}'")]
    UnknownReference {
        path: String,
        action: ActionId,
        relation: String,
        missing: ActionId,
    },
}

/// Malformed action definition, rejected when the definition is processed.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("action name must not be empty")]
    EmptyName,

    #[error("invalid action name: {0:?}")]
    InvalidName(String),

    #[error("action '{0}' has no argument list")]
    MissingParams(String),

    #[error("action '{action}' declares parameter '{param}' twice")]
    DuplicateParam { action: String, param: String },

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("unknown action flavor: {0}")]
    UnknownFlavor(String),
}
