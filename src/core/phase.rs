//! Phase runner: schedule a phase file's body on each target, then
//! linearize the resulting block trees.

use super::action::{ALWAYS_AFTER, ALWAYS_BEFORE};
use super::define::DefinedAction;
use super::error::{DefinitionError, ScheduleError};
use super::parser::{build_actions, PhaseFile, Step};
use super::planner::{linearize_all, TargetPlan};
use super::precedence::Precedence;
use super::scope::with_scope;
use super::session::Session;
use super::store::{PhasePlan, PlanStore, TreePlanStore};
use super::types::TargetId;
use indexmap::{IndexMap, IndexSet};

/// Schedule the phase body for one target.
pub fn schedule_phase<S: PlanStore>(
    session: Session<S>,
    file: &PhaseFile,
    actions: &IndexMap<String, DefinedAction>,
    target: &TargetId,
) -> Result<Session<S>, ScheduleError> {
    tracing::debug!(phase = %file.phase, target = %target, "scheduling phase body");
    let session = session.for_target(file.phase.clone(), target.clone());
    run_steps(session, &file.body, actions)
}

fn run_steps<S: PlanStore>(
    session: Session<S>,
    steps: &[Step],
    actions: &IndexMap<String, DefinedAction>,
) -> Result<Session<S>, ScheduleError> {
    steps
        .iter()
        .try_fold(session, |s, step| run_step(s, step, actions))
}

fn run_step<S: PlanStore>(
    session: Session<S>,
    step: &Step,
    actions: &IndexMap<String, DefinedAction>,
) -> Result<Session<S>, ScheduleError> {
    match step {
        Step::Call { call, args } => {
            let action = actions
                .get(call)
                .ok_or_else(|| DefinitionError::UnknownAction(call.clone()))?;
            action.invoke(session, args.clone())
        }
        Step::Scope { scope } => with_scope(session, |s| run_steps(s, scope, actions)),
        Step::Precedence { precedence } => {
            let mut relations = Precedence::new();
            if !precedence.always_before.is_empty() {
                let ids = precedence.always_before.iter().map(String::as_str);
                relations.insert_all(ALWAYS_BEFORE, ids);
            }
            if !precedence.always_after.is_empty() {
                let ids = precedence.always_after.iter().map(String::as_str);
                relations.insert_all(ALWAYS_AFTER, ids);
            }
            session.with_precedence(&relations, |s| run_steps(s, &precedence.body, actions))
        }
    }
}

/// Targets selected by an optional filter, in file order. A target listed
/// more than once is scheduled once.
fn selected_targets<'a>(
    file: &'a PhaseFile,
    target_filter: Option<&str>,
) -> IndexSet<&'a TargetId> {
    let mut selected = IndexSet::new();
    for target in &file.targets {
        if target_filter.is_some_and(|f| target.to_string() != f) {
            continue;
        }
        if !selected.insert(target) {
            tracing::warn!(phase = %file.phase, target = %target, "duplicate target skipped");
        }
    }
    selected
}

/// Schedule every selected target and close the store.
pub fn schedule_all(
    file: &PhaseFile,
    target_filter: Option<&str>,
) -> Result<PhasePlan, ScheduleError> {
    let actions = build_actions(file)?;
    let mut session = Session::new(TreePlanStore::new());
    for target in selected_targets(file, target_filter) {
        session = schedule_phase(session, file, &actions, target)?;
    }
    Ok(session.into_store().finish()?)
}

/// Schedule and linearize every selected target.
pub fn plan_phase(
    file: &PhaseFile,
    target_filter: Option<&str>,
) -> Result<Vec<TargetPlan>, ScheduleError> {
    let phase_plan = schedule_all(file, target_filter)?;
    Ok(linearize_all(&phase_plan, &file.policy)?)
}
