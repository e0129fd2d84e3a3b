//! End-to-end scheduling scenarios through the public API.

use phaseplan::core::action::{ActionDescriptor, ALWAYS_BEFORE};
use phaseplan::core::planner::linearize;
use phaseplan::core::store::{Block, PlanNode};
use phaseplan::core::types::{ExecutionClass, Policy, TargetId};
use phaseplan::{
    aggregated_action, bash_action, enter_scope, leave_scope, ActionDecl, DefinedAction,
    Precedence, ScheduleError, Session, StoreError, TreePlanStore,
};
use serde_json::json;

fn shell(args: &[serde_json::Value]) -> Result<String, String> {
    Ok(args.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(" "))
}

fn seq(name: &str) -> DefinedAction {
    bash_action(ActionDecl::new(name).params(Vec::<String>::new()), shell).unwrap()
}

fn session() -> Session {
    Session::new(TreePlanStore::new()).for_target("configure", "web1")
}

fn root(s: &Session) -> &Block {
    s.store().root(&s.target_path().unwrap()).unwrap()
}

fn actions(block: &Block) -> Vec<&ActionDescriptor> {
    block.children.iter().filter_map(PlanNode::as_action).collect()
}

#[test]
fn test_scenario_a_in_sequence_order() {
    let (a, b) = (seq("a"), seq("b"));
    let s = a.invoke(session(), vec![]).unwrap();
    let s = b.invoke(s, vec![]).unwrap();

    let block = root(&s);
    assert_eq!(block.children.len(), 2);
    let ids: Vec<_> = actions(block).iter().map(|d| d.id().to_string()).collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert!(actions(block)
        .iter()
        .all(|d| d.class() == ExecutionClass::InSequence));
}

#[test]
fn test_scenario_b_submission_order_then_hoist() {
    let x = aggregated_action(ActionDecl::new("x").params(["n"]), shell).unwrap();
    let y = seq("y");
    let s = x.invoke(session(), vec![json!(1)]).unwrap();
    let s = y.invoke(s, vec![]).unwrap();
    let s = x.invoke(s, vec![json!(2)]).unwrap();

    let submitted: Vec<_> = actions(root(&s))
        .iter()
        .map(|d| (d.class(), d.id().to_string(), d.args().to_vec()))
        .collect();
    assert_eq!(
        submitted,
        vec![
            (ExecutionClass::Aggregated, "x".to_string(), vec![json!(1)]),
            (ExecutionClass::InSequence, "y".to_string(), vec![]),
            (ExecutionClass::Aggregated, "x".to_string(), vec![json!(2)]),
        ]
    );

    let path = s.target_path().unwrap();
    let plan = linearize(&path, root(&s), &Policy::default()).unwrap();
    let order: Vec<_> = plan.steps.iter().map(|st| st.action.as_str()).collect();
    assert_eq!(order, vec!["x", "y"]);
    assert_eq!(plan.steps[0].arg_sets, vec![vec![json!(1)], vec![json!(2)]]);
}

#[test]
fn test_scenario_c_nested_scopes() {
    let (a, b, c) = (seq("a"), seq("b"), seq("c"));
    let s = enter_scope(session()).unwrap();
    let s = a.invoke(s, vec![]).unwrap();
    let s = enter_scope(s).unwrap();
    let s = b.invoke(s, vec![]).unwrap();
    let s = leave_scope(s).unwrap();
    let s = c.invoke(s, vec![]).unwrap();
    let s = leave_scope(s).unwrap();

    let top = root(&s);
    assert_eq!(top.children.len(), 1);
    let PlanNode::Block(outer) = &top.children[0] else {
        panic!("expected outer block");
    };
    assert_eq!(outer.children.len(), 3);
    assert_eq!(outer.children[0].as_action().unwrap().id().as_str(), "a");
    let PlanNode::Block(inner) = &outer.children[1] else {
        panic!("expected inner block");
    };
    assert_eq!(inner.children[0].as_action().unwrap().id().as_str(), "b");
    assert_eq!(outer.children[2].as_action().unwrap().id().as_str(), "c");

    s.into_store().finish().unwrap();
}

#[test]
fn test_extra_leave_scope_is_error() {
    let s = enter_scope(session()).unwrap();
    let s = leave_scope(s).unwrap();
    let err = leave_scope(s).unwrap_err();
    assert!(matches!(
        err,
        ScheduleError::Store(StoreError::NoOpenBlock { .. })
    ));
}

#[test]
fn test_leaked_scope_detected_at_finish() {
    let s = enter_scope(session()).unwrap();
    let err = s.into_store().finish().unwrap_err();
    assert!(matches!(err, StoreError::LeakedScope { depth: 1, .. }));
}

#[test]
fn test_registration_requires_phase_and_target() {
    let s: Session = Session::new(TreePlanStore::new());
    assert!(matches!(
        seq("a").invoke(s, vec![]),
        Err(ScheduleError::MissingPhase)
    ));
}

#[test]
fn test_determinism_across_runs() {
    let run = || {
        let x = aggregated_action(ActionDecl::new("x").params(["n"]), shell).unwrap();
        let y = seq("y");
        let ctx = Precedence::new().with(ALWAYS_BEFORE, ["y"]);
        let s = x.invoke(session(), vec![json!("a")]).unwrap();
        let s = s.with_precedence(&ctx, |s| y.invoke(s, vec![])).unwrap();
        let s = x.invoke(s, vec![json!("b")]).unwrap();
        let path = s.target_path().unwrap();
        linearize(&path, root(&s), &Policy::default()).unwrap().fingerprint
    };
    assert_eq!(run(), run());
}

#[test]
fn test_precedence_restored_after_block() {
    let before = Precedence::new().with("k", ["a"]);
    let s = session()
        .with_precedence(&before, |s| {
            let inner = Precedence::new().with("k", ["b"]);
            s.with_precedence(&inner, |s| seq("z").invoke(s, vec![]))
        })
        .unwrap();
    assert!(s.precedence().is_empty());

    let d = actions(root(&s))[0];
    assert_eq!(d.metadata().get("k").unwrap().len(), 2);
}

#[test]
fn test_targets_have_separate_trees() {
    let a = seq("a");
    let s = enter_scope(session()).unwrap();
    let s = s.for_target("configure", TargetId::Origin);
    let s = a.invoke(s, vec![]).unwrap();
    assert!(leave_scope(s.clone()).is_err());
    let s = leave_scope(s.for_target("configure", "web1")).unwrap();
    let plan = s.into_store().finish().unwrap();
    assert_eq!(plan.blocks.len(), 2);
}
