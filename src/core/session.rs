//! Session: the explicitly threaded scheduling context.
//!
//! A session carries the active phase and target, the ambient precedence
//! context, and the plan store. Every scheduling operation consumes a session
//! and returns the updated one; nothing is shared across target passes.

use super::error::ScheduleError;
use super::precedence::Precedence;
use super::store::{PlanPath, PlanStore, TreePlanStore};
use super::types::{is_identifier, TargetId};

/// Scheduling context for one pass.
#[derive(Debug, Clone)]
pub struct Session<S = TreePlanStore> {
    phase: Option<String>,
    target: Option<TargetId>,
    precedence: Precedence,
    store: S,
}

impl<S: PlanStore> Session<S> {
    /// A session with no active phase or target.
    pub fn new(store: S) -> Self {
        Self {
            phase: None,
            target: None,
            precedence: Precedence::new(),
            store,
        }
    }

    /// Switch the active phase and target.
    pub fn for_target(mut self, phase: impl Into<String>, target: impl Into<TargetId>) -> Self {
        self.phase = Some(phase.into());
        self.target = Some(target.into());
        self
    }

    pub fn phase(&self) -> Option<&str> {
        self.phase.as_deref()
    }

    pub fn target(&self) -> Option<&TargetId> {
        self.target.as_ref()
    }

    /// Ambient precedence context.
    pub fn precedence(&self) -> &Precedence {
        &self.precedence
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Run `body` with `relations` merged into the precedence context.
    ///
    /// Whatever the body does to its own context, the returned session carries
    /// the precedence context that was active before the call.
    pub fn with_precedence<F>(self, relations: &Precedence, body: F) -> Result<Self, ScheduleError>
    where
        F: FnOnce(Self) -> Result<Self, ScheduleError>,
    {
        let saved = self.precedence.clone();
        let inner = Self {
            precedence: saved.merge(relations),
            ..self
        };
        let mut out = body(inner)?;
        out.precedence = saved;
        Ok(out)
    }

    /// Plan path of the active phase/target, checking both are present and
    /// well formed.
    pub fn target_path(&self) -> Result<PlanPath, ScheduleError> {
        let phase = self.phase.as_deref().ok_or(ScheduleError::MissingPhase)?;
        if !is_identifier(phase) {
            return Err(ScheduleError::InvalidIdentifier {
                field: "phase",
                value: phase.to_string(),
            });
        }
        let target = self.target.as_ref().ok_or(ScheduleError::MissingTarget)?;
        if !target.is_valid() {
            return Err(ScheduleError::InvalidIdentifier {
                field: "target",
                value: target.to_string(),
            });
        }
        Ok(self.store.resolve_target_path(phase, target))
    }

    pub(crate) fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::action::{ALWAYS_AFTER, ALWAYS_BEFORE};

    fn session() -> Session {
        Session::new(TreePlanStore::new()).for_target("configure", "web1")
    }

    #[test]
    fn test_target_path() {
        let p = session().target_path().unwrap();
        assert_eq!(p.phase, "configure");
        assert_eq!(p.target, TargetId::node("web1"));
    }

    #[test]
    fn test_target_path_missing_phase() {
        let s = Session::new(TreePlanStore::new());
        assert!(matches!(s.target_path(), Err(ScheduleError::MissingPhase)));
    }

    #[test]
    fn test_target_path_invalid_target() {
        let s = Session::new(TreePlanStore::new()).for_target("configure", "bad host");
        assert!(matches!(
            s.target_path(),
            Err(ScheduleError::InvalidIdentifier { field: "target", .. })
        ));
    }

    #[test]
    fn test_node_named_origin_rejected() {
        let s = Session::new(TreePlanStore::new())
            .for_target("configure", TargetId::Node("origin".to_string()));
        assert!(matches!(
            s.target_path(),
            Err(ScheduleError::InvalidIdentifier { field: "target", .. })
        ));
    }

    #[test]
    fn test_origin_target_is_valid() {
        let s = Session::new(TreePlanStore::new()).for_target("configure", TargetId::Origin);
        assert_eq!(s.target_path().unwrap().target, TargetId::Origin);
    }

    #[test]
    fn test_with_precedence_restores_context() {
        let outer = Precedence::new().with(ALWAYS_AFTER, ["repo"]);
        let s = session().with_precedence(&outer, Ok).unwrap();
        assert!(s.precedence().is_empty());
    }

    #[test]
    fn test_with_precedence_nested_union() {
        let outer = Precedence::new().with(ALWAYS_BEFORE, ["a"]);
        let inner = Precedence::new().with(ALWAYS_BEFORE, ["b"]);
        let s = session()
            .with_precedence(&outer, |s| {
                s.with_precedence(&inner, |s| {
                    let seen = s.precedence().get(ALWAYS_BEFORE).unwrap();
                    assert_eq!(seen.len(), 2);
                    Ok(s)
                })
                .map(|s| {
                    assert_eq!(s.precedence(), &outer);
                    s
                })
            })
            .unwrap();
        assert!(s.precedence().is_empty());
    }

    #[test]
    fn test_with_precedence_propagates_error() {
        let r = session()
            .with_precedence(&Precedence::new(), |_| Err(ScheduleError::MissingTarget));
        assert!(matches!(r, Err(ScheduleError::MissingTarget)));
    }
}
