//! Phaseplan: action scheduling for phase-based orchestration.
//!
//! Phase bodies call action-producing functions; each call is classified by
//! execution class, tagged with a stable identity and precedence metadata,
//! and appended to a per-target plan tree that is later linearized.

pub mod cli;
pub mod core;

pub use crate::core::define::{
    aggregated_action, bash_action, collected_action, declare, declare_with_meta, define_action,
    fn_action, ActionDecl, DefinedAction, Flavor,
};
pub use crate::core::error::{DefinitionError, ScheduleError, StoreError};
pub use crate::core::precedence::{resolve_metadata, Precedence};
pub use crate::core::registrar::{schedule, schedule_action};
pub use crate::core::scope::{enter_scope, leave_scope, with_scope};
pub use crate::core::session::Session;
pub use crate::core::store::{PlanStore, TreePlanStore};
