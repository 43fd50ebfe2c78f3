//! # Fanflow
//!
//! Fanflow is a lightweight, tree-structured task orchestration engine written in Rust.
//! It is designed to be embedded in applications that fetch and mutate remote data
//! through trees of dependent calls.
//!
//! ## Core Features
//!
//! - **Tree Orchestration**: Parent-before-child execution over an owned task tree
//! - **Concurrent Fan-Out**: Sibling tasks and per-record requests dispatch together
//!   and settle together, so one failing branch never aborts the rest
//! - **Async Execution**: Powered by `tokio`; node completions arrive as a lazy stream
//! - **Pluggable Transport**: Tasks talk to an injected [`DataResolver`] capability
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use fanflow::{RestResolver, Task, TaskNode, TaskRequest, TaskTree};
//! use tokio_stream::StreamExt;
//!
//! let resolver = Arc::new(RestResolver::new("http://localhost:8080")?);
//! let root = Task::new("PersonTask", TaskRequest::get("/persons?email=${param1}"), resolver)
//!     .with_allow_many(false);
//!
//! let mut tree = TaskTree::new(TaskNode::new(root));
//! tree.set_root_param("${param1}", "a@b.com");
//!
//! let mut nodes = tree.run();
//! while let Some(output) = nodes.next().await {
//!     println!("{} -> {:?}", output.key, output.response.result);
//! }
//! ```

mod common;
mod config;
mod error;
mod resolver;
mod task;
#[cfg(test)]
mod test_util;
mod tree;
mod utils;

pub use common::{group_by_key, merge_by_key};
pub use config::{AuthConfig, AuthKind, ResolverConfig};
pub use error::FanflowError;
pub use resolver::{DataResolver, RestResolver};
pub use task::{
    ConditionalTask, CriteriaFn, Method, PostProcessFn, ProcessingRecord, Task, TaskRequest,
    TaskResponse, UpdateBodyFn,
};
pub use tree::{DecisionBranch, DecisionFn, NodeOutput, TaskNode, TaskTree};

/// Result type alias for Fanflow operations.
pub type Result<T> = std::result::Result<T, FanflowError>;
