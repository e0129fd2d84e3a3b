//! Scheduling core: descriptors, precedence, registration, definitions,
//! scopes, plan storage, and linearization.

pub mod action;
pub mod define;
pub mod error;
pub mod fingerprint;
pub mod parser;
pub mod phase;
pub mod planner;
pub mod precedence;
pub mod registrar;
pub mod scope;
pub mod session;
pub mod store;
pub mod template;
pub mod types;
