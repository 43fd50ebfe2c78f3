//! The task tree: composition nodes owning tasks, and the walker driving
//! them parent-before-child while streaming each node's completed response.

mod collection;
mod decision;
mod fork_join;
mod node;
mod tree;

pub use decision::{DecisionBranch, DecisionFn};
pub use node::TaskNode;
pub use tree::{NodeOutput, TaskTree};
