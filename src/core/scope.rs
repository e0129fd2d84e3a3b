//! Scoped blocks within a target's plan.
//!
//! Per target: `Root → enter → Block₁ → enter → Block₂ … leave → Root`. A
//! leave with nothing open is rejected by the store; a scope still open when
//! the phase completes is rejected by [`TreePlanStore::finish`].
//!
//! [`TreePlanStore::finish`]: super::store::TreePlanStore::finish

use super::error::ScheduleError;
use super::session::Session;
use super::store::PlanStore;

/// Open a new block at the active target's cursor and descend into it.
pub fn enter_scope<S: PlanStore>(mut session: Session<S>) -> Result<Session<S>, ScheduleError> {
    let path = session.target_path()?;
    session.store_mut().push_block(&path)?;
    tracing::debug!(path = %path, depth = session.store().depth(&path), "entered scope");
    Ok(session)
}

/// Close the current block and return the cursor to its parent.
pub fn leave_scope<S: PlanStore>(mut session: Session<S>) -> Result<Session<S>, ScheduleError> {
    let path = session.target_path()?;
    session.store_mut().pop_block(&path)?;
    tracing::debug!(path = %path, depth = session.store().depth(&path), "left scope");
    Ok(session)
}

/// Run `body` inside a fresh block.
pub fn with_scope<S, F>(session: Session<S>, body: F) -> Result<Session<S>, ScheduleError>
where
    S: PlanStore,
    F: FnOnce(Session<S>) -> Result<Session<S>, ScheduleError>,
{
    leave_scope(body(enter_scope(session)?)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::StoreError;
    use crate::core::store::TreePlanStore;
    use proptest::prelude::*;

    fn session() -> Session {
        Session::new(TreePlanStore::new()).for_target("configure", "web1")
    }

    fn depth(s: &Session) -> usize {
        s.store().depth(&s.target_path().unwrap())
    }

    #[test]
    fn test_enter_then_leave_returns_to_root() {
        let s = enter_scope(session()).unwrap();
        assert_eq!(depth(&s), 1);
        let s = leave_scope(s).unwrap();
        assert_eq!(depth(&s), 0);
    }

    #[test]
    fn test_leave_at_root_is_invalid_state() {
        let err = leave_scope(session()).unwrap_err();
        assert!(matches!(
            err,
            ScheduleError::Store(StoreError::NoOpenBlock { .. })
        ));
    }

    #[test]
    fn test_enter_requires_target() {
        let s: Session = Session::new(TreePlanStore::new());
        assert!(matches!(enter_scope(s), Err(ScheduleError::MissingPhase)));
    }

    #[test]
    fn test_with_scope_balances() {
        let s = with_scope(session(), |s| {
            assert_eq!(depth(&s), 1);
            with_scope(s, |s| {
                assert_eq!(depth(&s), 2);
                Ok(s)
            })
        })
        .unwrap();
        assert_eq!(depth(&s), 0);
    }

    #[test]
    fn test_with_scope_surfaces_unbalanced_body() {
        let err = with_scope(session(), leave_scope).unwrap_err();
        assert!(matches!(
            err,
            ScheduleError::Store(StoreError::NoOpenBlock { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_balanced_scopes_return_to_root(n in 0usize..12) {
            let mut s = session();
            for _ in 0..n {
                s = enter_scope(s).unwrap();
            }
            prop_assert_eq!(depth(&s), n);
            for _ in 0..n {
                s = leave_scope(s).unwrap();
            }
            prop_assert_eq!(depth(&s), 0);
            prop_assert!(leave_scope(s).is_err());
        }
    }
}
