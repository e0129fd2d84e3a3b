//! Plan linearization: turn a target's block tree into an ordered step list.
//!
//! 1. Flatten the tree depth-first, remembering each action's block path.
//! 2. Merge aggregated and collected occurrences per identity (first
//!    occurrence position, all argument sets each with its own block path,
//!    union of metadata).
//! 3. Base order: aggregated, then in-sequence, then collected.
//! 4. Apply `always-before` / `always-after` edges with Kahn's algorithm,
//!    breaking ties by base order so the result is deterministic.
//!
//! Other relation keys are carried on the step but not interpreted.

use super::action::{ActionDescriptor, ActionFn, ALWAYS_AFTER, ALWAYS_BEFORE};
use super::error::StoreError;
use super::fingerprint;
use super::precedence::Precedence;
use super::store::{Block, PhasePlan, PlanNode, PlanPath};
use super::types::{ActionId, ActionKind, Args, ExecutionClass, Location, Policy, ReferencePolicy};
use indexmap::IndexMap;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap};

/// One step of a linearized plan.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedStep {
    pub action: ActionId,
    pub class: ExecutionClass,
    pub kind: ActionKind,
    pub location: Location,
    /// Argument sets in submission order; one per merged occurrence.
    pub arg_sets: Vec<Args>,
    pub relations: Precedence,
    /// Block path of each argument set (child indices from the root).
    /// `scopes[i]` belongs to `arg_sets[i]`.
    pub scopes: Vec<Vec<usize>>,
    #[serde(skip)]
    function: ActionFn,
}

impl PlannedStep {
    /// Render the step payload: the body once per argument set.
    pub fn render(&self) -> Result<String, String> {
        let parts = self
            .arg_sets
            .iter()
            .map(|args| self.function.render(args))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(parts.join("\n"))
    }
}

/// Linearized plan for one phase/target path.
#[derive(Debug, Clone, Serialize)]
pub struct TargetPlan {
    pub path: PlanPath,
    pub steps: Vec<PlannedStep>,
    pub fingerprint: String,
}

/// Linearize every path of a finished phase plan, in first-use order.
pub fn linearize_all(plan: &PhasePlan, policy: &Policy) -> Result<Vec<TargetPlan>, StoreError> {
    plan.blocks
        .iter()
        .map(|(path, root)| linearize(path, root, policy))
        .collect()
}

/// Linearize one target's block tree.
pub fn linearize(path: &PlanPath, root: &Block, policy: &Policy) -> Result<TargetPlan, StoreError> {
    let mut flat = Vec::new();
    flatten(root, &mut Vec::new(), &mut flat);

    let steps = build_steps(&flat);
    let order = order_steps(path, &steps, policy)?;

    let mut slots: Vec<Option<PlannedStep>> = steps.into_iter().map(Some).collect();
    let steps: Vec<PlannedStep> = order.into_iter().filter_map(|i| slots[i].take()).collect();
    let fingerprint = fingerprint::fingerprint_steps(&steps);

    tracing::info!(
        path = %path,
        actions = flat.len(),
        steps = steps.len(),
        fingerprint = %fingerprint,
        "linearized plan"
    );

    Ok(TargetPlan {
        path: path.clone(),
        steps,
        fingerprint,
    })
}

/// Depth-first walk collecting every action with its block path.
fn flatten<'a>(
    block: &'a Block,
    scope: &mut Vec<usize>,
    out: &mut Vec<(&'a ActionDescriptor, Vec<usize>)>,
) {
    for (idx, child) in block.children.iter().enumerate() {
        match child {
            PlanNode::Action(a) => out.push((a, scope.clone())),
            PlanNode::Block(b) => {
                scope.push(idx);
                flatten(b, scope, out);
                scope.pop();
            }
        }
    }
}

/// Merge occurrences and arrange steps in base order.
fn build_steps(flat: &[(&ActionDescriptor, Vec<usize>)]) -> Vec<PlannedStep> {
    let mut aggregated: IndexMap<ActionId, PlannedStep> = IndexMap::new();
    let mut collected: IndexMap<ActionId, PlannedStep> = IndexMap::new();
    let mut in_sequence: Vec<PlannedStep> = Vec::new();

    for (action, scope) in flat {
        let bucket = match action.class() {
            ExecutionClass::Aggregated => &mut aggregated,
            ExecutionClass::Collected => &mut collected,
            ExecutionClass::InSequence => {
                in_sequence.push(new_step(action, scope));
                continue;
            }
        };
        match bucket.get_mut(action.id()) {
            Some(step) => {
                step.arg_sets.push(action.args().to_vec());
                step.scopes.push(scope.clone());
                step.relations = step.relations.merge(action.metadata());
            }
            None => {
                bucket.insert(action.id().clone(), new_step(action, scope));
            }
        }
    }

    aggregated
        .into_values()
        .chain(in_sequence)
        .chain(collected.into_values())
        .collect()
}

fn new_step(action: &ActionDescriptor, scope: &[usize]) -> PlannedStep {
    PlannedStep {
        action: action.id().clone(),
        class: action.class(),
        kind: action.kind(),
        location: action.location(),
        arg_sets: vec![action.args().to_vec()],
        relations: action.metadata().clone(),
        scopes: vec![scope.to_vec()],
        function: action.function().clone(),
    }
}

/// Topological order over step indices honoring precedence relations.
/// Uses Kahn's algorithm with base-order tie-breaking for determinism.
fn order_steps(
    path: &PlanPath,
    steps: &[PlannedStep],
    policy: &Policy,
) -> Result<Vec<usize>, StoreError> {
    let mut by_id: HashMap<&ActionId, Vec<usize>> = HashMap::new();
    for (i, step) in steps.iter().enumerate() {
        by_id.entry(&step.action).or_default().push(i);
    }

    // Edges as sets so repeated references count once
    let mut adjacency: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); steps.len()];
    for (i, step) in steps.iter().enumerate() {
        for (relation, ids) in step.relations.iter() {
            let before = match relation.as_str() {
                ALWAYS_BEFORE => true,
                ALWAYS_AFTER => false,
                _ => continue,
            };
            for id in ids {
                let Some(targets) = by_id.get(id) else {
                    if policy.missing_references == ReferencePolicy::Error {
                        return Err(StoreError::UnknownReference {
                            path: path.to_string(),
                            action: step.action.clone(),
                            relation: relation.clone(),
                            missing: id.clone(),
                        });
                    }
                    tracing::debug!(
                        path = %path,
                        action = %step.action,
                        missing = %id,
                        "ignoring dangling reference"
                    );
                    continue;
                };
                for &j in targets.iter().filter(|&&j| j != i) {
                    if before {
                        adjacency[i].insert(j);
                    } else {
                        adjacency[j].insert(i);
                    }
                }
            }
        }
    }

    let mut in_degree = vec![0usize; steps.len()];
    for edges in &adjacency {
        for &j in edges {
            in_degree[j] += 1;
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, &d)| d == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut order = Vec::with_capacity(steps.len());
    while let Some(Reverse(current)) = ready.pop() {
        order.push(current);
        for &next in &adjacency[current] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push(Reverse(next));
            }
        }
    }

    if order.len() != steps.len() {
        let members: BTreeSet<String> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &d)| d > 0)
            .map(|(i, _)| steps[i].action.to_string())
            .collect();
        return Err(StoreError::PrecedenceCycle {
            path: path.to_string(),
            members: members.into_iter().collect(),
        });
    }

    Ok(order)
}
