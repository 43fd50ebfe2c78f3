use std::collections::HashMap;

use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tokio_stream::{StreamExt, wrappers::ReceiverStream};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::task::TaskResponse;

use super::node::{ParentContext, TaskNode};

/// One completed node of a walk: the node's key and its final response.
#[derive(Debug, Clone)]
pub struct NodeOutput {
    pub key: String,
    pub response: TaskResponse,
}

/// A built task tree and its walker.
///
/// The tree is wired once (parent before child), seeded with the caller's
/// root literals, then consumed by [`run`](TaskTree::run): the walk visits
/// nodes depth-first in insertion order, a child only starting after its
/// parent has completed all three phases, and yields every node's response
/// as it completes, so the caller reacts per node without waiting for the
/// whole tree.
pub struct TaskTree {
    root: TaskNode,
}

impl TaskTree {
    pub fn new(root: TaskNode) -> Self {
        Self { root }
    }

    /// Seeds a root-level `${token}` -> literal entry, consulted during the
    /// root's substitution where no parent context exists. No-op (logged)
    /// when the root is a composite node, which carries no request.
    pub fn set_root_param(
        &mut self,
        token: impl AsRef<str>,
        literal: impl AsRef<str>,
    ) {
        if !self.root.set_param(token.as_ref(), literal.as_ref()) {
            warn!(node = %self.root.key(), "root is a composite node, literal ignored");
        }
    }

    /// Drives the tree on a spawned task and returns the stream of node
    /// completions, yielded in depth-first pre-order.
    pub fn run(self) -> ReceiverStream<NodeOutput> {
        let (tx, rx) = mpsc::channel(64);
        let run_id = Uuid::new_v4();

        tokio::spawn(async move {
            debug!(%run_id, root = %self.root.key(), "tree walk started");
            walk(self.root, None, tx, run_id).await;
            debug!(%run_id, "tree walk finished");
        });

        ReceiverStream::new(rx)
    }

    /// Runs the whole tree and folds the stream into a key -> response map.
    /// Node keys are expected to be unique within one tree.
    pub async fn collect(self) -> HashMap<String, TaskResponse> {
        let mut outputs = HashMap::new();
        let mut stream = self.run();
        while let Some(output) = stream.next().await {
            outputs.insert(output.key, output.response);
        }
        outputs
    }
}

/// Recursive walk step: complete this node's phases, surface its output,
/// then visit its children sequentially with this node's completed context.
fn walk(
    mut node: TaskNode,
    parent: Option<ParentContext>,
    tx: mpsc::Sender<NodeOutput>,
    run_id: Uuid,
) -> BoxFuture<'static, ()> {
    Box::pin(async move {
        debug!(%run_id, node = %node.key(), "node started");
        let response = node.execute(parent.as_ref()).await;
        debug!(%run_id, node = %node.key(), has_data = response.has_data(), errors = response.errors.len(), "node completed");

        let context = node.parent_context(response.clone());
        let output = NodeOutput {
            key: node.key().to_string(),
            response,
        };
        // a dropped receiver only stops delivery; the walk itself carries on
        let _ = tx.send(output).await;

        let children = std::mem::take(&mut node.children);
        for child in children {
            walk(child, Some(context.clone()), tx.clone(), run_id).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{Value, json};

    use crate::{
        task::{Task, TaskRequest},
        test_util::StubResolver,
    };

    use super::*;

    fn person_task(resolver: Arc<StubResolver>) -> Task {
        Task::new(
            "PersonTask",
            TaskRequest::get("/persons?email=${param1}").param("${param1}", ""),
            resolver,
        )
        .with_allow_many(false)
        .with_post_process(|mut response, _parent| {
            // unwrap the unique row out of its array
            if let Some(Value::Array(rows)) = &response.result {
                if rows.len() == 1 {
                    response.result = Some(rows[0].clone());
                }
            }
            response
        })
    }

    // ==================== end-to-end scenario ====================

    #[tokio::test]
    async fn test_person_rre_scenario() {
        let resolver = Arc::new(
            StubResolver::new()
                .route("/persons?email=a@b.com", json!([{"prsnId": 7}]))
                .route("/persons/7/rre", json!([{"rptrId": 2}, {"rptrId": 1}])),
        );

        let rre_task = Task::new(
            "RreTask",
            TaskRequest::get("/persons/${param1}/rre").param("${param1}", "prsnId"),
            resolver.clone(),
        )
        .with_post_process(|mut response, _parent| {
            if let Some(Value::Array(rows)) = &mut response.result {
                rows.sort_by_key(|row| row["rptrId"].as_i64().unwrap_or(0));
            }
            response
        });

        let root = TaskNode::new(person_task(resolver.clone())).with_child(TaskNode::new(rre_task));
        let mut tree = TaskTree::new(root);
        tree.set_root_param("${param1}", "a@b.com");

        let mut stream = tree.run();

        let person = stream.next().await.unwrap();
        assert_eq!(person.key, "PersonTask");
        assert_eq!(person.response.result, Some(json!({"prsnId": 7})));

        let rre = stream.next().await.unwrap();
        assert_eq!(rre.key, "RreTask");
        assert_eq!(rre.response.result, Some(json!([{"rptrId": 1}, {"rptrId": 2}])));

        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_collect_keys_by_node() {
        let resolver = Arc::new(
            StubResolver::new()
                .route("/persons?email=a@b.com", json!([{"prsnId": 7}]))
                .route("/persons/7/rre", json!([{"rptrId": 1}])),
        );
        let rre_task = Task::new("RreTask", TaskRequest::get("/persons/${param1}/rre").param("${param1}", "prsnId"), resolver.clone());

        let root = TaskNode::new(person_task(resolver)).with_child(TaskNode::new(rre_task));
        let mut tree = TaskTree::new(root);
        tree.set_root_param("${param1}", "a@b.com");

        let outputs = tree.collect().await;
        assert_eq!(outputs.len(), 2);
        assert!(outputs["PersonTask"].has_data());
        assert_eq!(outputs["RreTask"].result, Some(json!([{"rptrId": 1}])));
    }

    // ==================== ordering and isolation ====================

    #[tokio::test]
    async fn test_depth_first_pre_order() {
        let resolver = Arc::new(StubResolver::new().route("/root", json!([{"id": 1}])));
        let node = |key: &str| TaskNode::new(Task::new(key, TaskRequest::get("/root"), resolver.clone()));

        let root = node("A").with_child(node("B").with_child(node("C"))).with_child(node("D"));
        let mut stream = TaskTree::new(root).run();

        let mut keys = Vec::new();
        while let Some(output) = stream.next().await {
            keys.push(output.key);
        }
        assert_eq!(keys, vec!["A", "B", "C", "D"]);
    }

    #[tokio::test]
    async fn test_failed_branch_does_not_abort_siblings() {
        let resolver = Arc::new(
            StubResolver::new()
                .route("/persons?email=a@b.com", json!([{"prsnId": 7}]))
                .fail_on("/persons/7/rre", "boom")
                .route("/persons/7/address", json!([{"city": "x"}])),
        );

        let rre = TaskNode::new(Task::new("RreTask", TaskRequest::get("/persons/${param1}/rre").param("${param1}", "prsnId"), resolver.clone()));
        let address =
            TaskNode::new(Task::new("AddressTask", TaskRequest::get("/persons/${param1}/address").param("${param1}", "prsnId"), resolver.clone()));

        let root = TaskNode::new(person_task(resolver)).with_child(rre).with_child(address);
        let mut tree = TaskTree::new(root);
        tree.set_root_param("${param1}", "a@b.com");

        let outputs = tree.collect().await;
        assert_eq!(outputs["RreTask"].status, 500);
        assert_eq!(outputs["AddressTask"].result, Some(json!([{"city": "x"}])));
    }

    #[tokio::test]
    async fn test_child_of_dataless_parent_yields_empty() {
        let resolver = Arc::new(StubResolver::new().route("/persons?email=a@b.com", json!([])));
        let rre = TaskNode::new(Task::new("RreTask", TaskRequest::get("/persons/${param1}/rre").param("${param1}", "prsnId"), resolver.clone()));

        let root = TaskNode::new(person_task(resolver.clone())).with_child(rre);
        let mut tree = TaskTree::new(root);
        tree.set_root_param("${param1}", "a@b.com");

        let outputs = tree.collect().await;
        assert_eq!(outputs["PersonTask"].errors, vec!["Key not found"]);
        // the child is still visited and yielded, but ran nothing
        assert!(outputs.contains_key("RreTask"));
        assert!(!outputs["RreTask"].has_data());
        assert_eq!(resolver.calls(), 1);
    }

    #[tokio::test]
    async fn test_failover_child_reuses_root_literal() {
        let resolver = Arc::new(
            StubResolver::new()
                .route("/persons?email=a@b.com", json!([]))
                .route("/persons?loginid=a@b.com", json!([{"prsnId": 7}])),
        );

        let by_login = TaskNode::new(
            Task::new(
                "PersonByLoginTask",
                TaskRequest::get("/persons?loginid=${param1}").param("${param1}", "${param1}"),
                resolver.clone(),
            )
            .with_allow_many(false),
        )
        .with_failover("Key not found");

        let root = TaskNode::new(person_task(resolver.clone())).with_child(by_login);
        let mut tree = TaskTree::new(root);
        tree.set_root_param("${param1}", "a@b.com");

        let outputs = tree.collect().await;
        assert_eq!(outputs["PersonByLoginTask"].result, Some(json!([{"prsnId": 7}])));
        assert_eq!(resolver.calls(), 2);
    }
}
