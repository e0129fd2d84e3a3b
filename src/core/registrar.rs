//! Action registration: build a descriptor and append it to the plan store
//! at the active target's cursor.

use super::action::{ActionDescriptor, ActionFn};
use super::error::ScheduleError;
use super::precedence::{resolve_metadata, Precedence};
use super::session::Session;
use super::store::PlanStore;
use super::types::{ActionKind, Args, ExecutionClass, Location};

/// Register one action occurrence with already-resolved precedence metadata.
///
/// Fails without touching the store when the session has no usable phase or
/// target.
pub fn schedule<S: PlanStore>(
    mut session: Session<S>,
    action: &ActionFn,
    metadata: Precedence,
    args: Args,
    class: ExecutionClass,
    kind: ActionKind,
    location: Location,
) -> Result<Session<S>, ScheduleError> {
    let path = session.target_path()?;
    let depth = session.store().depth(&path);
    tracing::debug!(
        path = %path,
        action = %action.id(),
        class = %class,
        kind = %kind,
        location = %location,
        depth,
        "scheduling action"
    );
    let descriptor = ActionDescriptor::new(action.clone(), args, class, kind, location, metadata);
    session.store_mut().add_action(&path, descriptor)?;
    Ok(session)
}

/// Register an ad-hoc action, resolving its metadata against the session's
/// precedence context first.
pub fn schedule_action<S: PlanStore>(
    session: Session<S>,
    action: &ActionFn,
    args: Args,
    class: ExecutionClass,
    kind: ActionKind,
    location: Location,
) -> Result<Session<S>, ScheduleError> {
    let metadata = resolve_metadata(session.precedence(), action);
    schedule(session, action, metadata, args, class, kind, location)
}
