//! Plan store: owns the per-target block trees that registrations land in.
//!
//! The scheduling core only talks to a store through [`PlanStore`]. The
//! in-memory [`TreePlanStore`] keeps one root block and one cursor stack per
//! phase/target path; `planner` linearizes the finished trees.

use super::action::ActionDescriptor;
use super::error::StoreError;
use super::types::TargetId;
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;

/// Where a phase/target pass keeps its actions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PlanPath {
    pub phase: String,
    pub target: TargetId,
}

impl fmt::Display for PlanPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.phase, self.target)
    }
}

/// A child of a block: an action occurrence or a nested block.
#[derive(Debug, Clone)]
pub enum PlanNode {
    Action(ActionDescriptor),
    Block(Block),
}

impl PlanNode {
    pub fn as_action(&self) -> Option<&ActionDescriptor> {
        match self {
            Self::Action(a) => Some(a),
            Self::Block(_) => None,
        }
    }
}

/// Ordered grouping of plan nodes.
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub children: Vec<PlanNode>,
}

impl Block {
    /// Number of actions in this block and all nested blocks.
    pub fn action_count(&self) -> usize {
        self.children
            .iter()
            .map(|c| match c {
                PlanNode::Action(_) => 1,
                PlanNode::Block(b) => b.action_count(),
            })
            .sum()
    }

    /// Walk down a cursor (child indices of successively nested blocks).
    fn descend_mut(&mut self, cursor: &[usize]) -> &mut Block {
        let mut block = self;
        for &idx in cursor {
            block = match &mut block.children[idx] {
                PlanNode::Block(b) => b,
                PlanNode::Action(_) => unreachable!("cursor points at an action"),
            };
        }
        block
    }
}

/// Operations the scheduling core needs from a plan store.
pub trait PlanStore {
    /// Locate where the given phase/target pass keeps its actions.
    fn resolve_target_path(&self, phase: &str, target: &TargetId) -> PlanPath;

    /// Append an action at the path's current cursor.
    fn add_action(&mut self, path: &PlanPath, action: ActionDescriptor) -> Result<(), StoreError>;

    /// Open a new empty block at the cursor and descend into it.
    fn push_block(&mut self, path: &PlanPath) -> Result<(), StoreError>;

    /// Close the current block and return to its parent.
    fn pop_block(&mut self, path: &PlanPath) -> Result<(), StoreError>;

    /// Number of open blocks above the root for a path.
    fn depth(&self, path: &PlanPath) -> usize;
}

/// Per-path tree plus cursor.
#[derive(Debug, Clone, Default)]
struct TargetTree {
    root: Block,
    cursor: Vec<usize>,
}

/// In-memory plan store.
#[derive(Debug, Clone, Default)]
pub struct TreePlanStore {
    trees: IndexMap<PlanPath, TargetTree>,
}

impl TreePlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Root block registered so far for a path.
    pub fn root(&self, path: &PlanPath) -> Option<&Block> {
        self.trees.get(path).map(|t| &t.root)
    }

    /// Close the store. Every path must be back at its root.
    pub fn finish(self) -> Result<PhasePlan, StoreError> {
        let mut blocks = IndexMap::new();
        for (path, tree) in self.trees {
            if !tree.cursor.is_empty() {
                return Err(StoreError::LeakedScope {
                    path: path.to_string(),
                    depth: tree.cursor.len(),
                });
            }
            blocks.insert(path, tree.root);
        }
        Ok(PhasePlan { blocks })
    }

    fn tree_mut(&mut self, path: &PlanPath) -> &mut TargetTree {
        self.trees.entry(path.clone()).or_default()
    }
}

impl PlanStore for TreePlanStore {
    fn resolve_target_path(&self, phase: &str, target: &TargetId) -> PlanPath {
        PlanPath {
            phase: phase.to_string(),
            target: target.clone(),
        }
    }

    fn add_action(&mut self, path: &PlanPath, action: ActionDescriptor) -> Result<(), StoreError> {
        let tree = self.tree_mut(path);
        let block = tree.root.descend_mut(&tree.cursor);
        block.children.push(PlanNode::Action(action));
        Ok(())
    }

    fn push_block(&mut self, path: &PlanPath) -> Result<(), StoreError> {
        let tree = self.tree_mut(path);
        let block = tree.root.descend_mut(&tree.cursor);
        block.children.push(PlanNode::Block(Block::default()));
        let idx = block.children.len() - 1;
        tree.cursor.push(idx);
        Ok(())
    }

    fn pop_block(&mut self, path: &PlanPath) -> Result<(), StoreError> {
        let popped = self.trees.get_mut(path).and_then(|t| t.cursor.pop());
        match popped {
            Some(_) => Ok(()),
            None => Err(StoreError::NoOpenBlock {
                path: path.to_string(),
            }),
        }
    }

    fn depth(&self, path: &PlanPath) -> usize {
        self.trees.get(path).map_or(0, |t| t.cursor.len())
    }
}

/// Completed block trees of every phase/target pass, in first-use order.
#[derive(Debug, Clone, Default)]
pub struct PhasePlan {
    pub blocks: IndexMap<PlanPath, Block>,
}
