use serde_json::{Map, Value};
use tracing::debug;

use crate::task::{ConditionalTask, Task, TaskResponse};

use super::{
    collection::CollectionBody,
    decision::{DecisionBody, DecisionBranch},
    fork_join::ForkJoinBody,
};

/// One node of a task tree.
///
/// A node owns either a single task (plain or conditional) or a composite
/// body coordinating several member tasks, plus the child nodes that read its
/// completed response. The tree is strictly acyclic and single-owner: children
/// are an owned vector and there is no parent back-reference. The parent's
/// completed response is instead threaded down the walk as an explicit
/// [`ParentContext`].
pub struct TaskNode {
    key: String,
    body: NodeBody,
    process_many: bool,
    failover_criteria: Option<String>,
    pub(crate) children: Vec<TaskNode>,
}

enum NodeBody {
    Task(Task),
    Conditional(ConditionalTask),
    ForkJoin(ForkJoinBody),
    Collection(CollectionBody),
    Decision(DecisionBody),
}

/// Completed state of a node, handed to each of its children during the walk.
#[derive(Clone)]
pub(crate) struct ParentContext {
    pub(crate) response: TaskResponse,
    pub(crate) allow_many: bool,
    /// The node's request parameters rendered as a token -> value object.
    /// Consumed by failover children substituting against the parent's
    /// request rather than its (absent) response data.
    pub(crate) request_context: Value,
}

impl ParentContext {
    /// The payload a child reads: the response result, unwrapped to its
    /// first element when the parent expected a unique row yet the transport
    /// returned an array.
    pub(crate) fn payload(&self) -> Value {
        match &self.response.result {
            Some(Value::Array(rows)) if !self.allow_many && !rows.is_empty() => rows[0].clone(),
            Some(value) => value.clone(),
            None => Value::Null,
        }
    }
}

impl TaskNode {
    /// Plain node around one [`Task`]; the node takes the task's key.
    pub fn new(task: Task) -> Self {
        Self::with_body(task.key().to_string(), NodeBody::Task(task))
    }

    /// Plain node around one [`ConditionalTask`].
    pub fn conditional(task: ConditionalTask) -> Self {
        Self::with_body(task.key().to_string(), NodeBody::Conditional(task))
    }

    /// Fork-join node: every member task runs concurrently on the identical
    /// parent payload; results are merged into one array keyed by `merge_key`.
    pub fn fork_join(
        key: impl Into<String>,
        merge_key: impl Into<String>,
        tasks: Vec<Task>,
    ) -> Self {
        Self::with_body(key.into(), NodeBody::ForkJoin(ForkJoinBody::new(merge_key, tasks)))
    }

    /// Collection node: like fork-join, but every member task fans out over
    /// the parent's full record list (`process_many` is always on).
    pub fn collection(
        key: impl Into<String>,
        merge_key: impl Into<String>,
        tasks: Vec<Task>,
    ) -> Self {
        let mut node = Self::with_body(key.into(), NodeBody::Collection(CollectionBody::new(merge_key, tasks)));
        node.process_many = true;
        node
    }

    /// Decision node: partitions the parent's records into matched/unmatched
    /// queues by a predicate, runs each branch's tasks against its queue, and
    /// groups the per-record outcomes by `merge_key`.
    pub fn decision(
        key: impl Into<String>,
        merge_key: impl Into<String>,
        branches: Vec<DecisionBranch>,
    ) -> Self {
        let mut node = Self::with_body(key.into(), NodeBody::Decision(DecisionBody::new(merge_key, branches)));
        node.process_many = true;
        node
    }

    fn with_body(
        key: String,
        body: NodeBody,
    ) -> Self {
        Self {
            key,
            body,
            process_many: false,
            failover_criteria: None,
            children: Vec::new(),
        }
    }

    /// Fans the parent's array result out into one request per record.
    pub fn with_process_many(
        mut self,
        process_many: bool,
    ) -> Self {
        self.process_many = process_many;
        self
    }

    /// Marks the node as a failover: when its parent completed without data
    /// and one of the parent's errors contains `criteria`, this node runs
    /// against the parent's request parameters instead of staying idle.
    pub fn with_failover(
        mut self,
        criteria: impl Into<String>,
    ) -> Self {
        self.failover_criteria = Some(criteria.into());
        self
    }

    /// Sets the decision predicate (decision nodes only; no-op elsewhere).
    pub fn with_decision_criteria<F>(
        mut self,
        criteria: F,
    ) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        match &mut self.body {
            NodeBody::Decision(decision) => decision.set_criteria(criteria),
            _ => debug!(node = %self.key, "decision criteria set on a non-decision node, ignored"),
        }
        self
    }

    pub fn with_child(
        mut self,
        child: TaskNode,
    ) -> Self {
        self.children.push(child);
        self
    }

    pub fn add_child(
        &mut self,
        child: TaskNode,
    ) {
        self.children.push(child);
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Upserts a token -> literal entry on the node's request (plain nodes
    /// only; composites have no request of their own).
    pub(crate) fn set_param(
        &mut self,
        token: &str,
        literal: &str,
    ) -> bool {
        match &mut self.body {
            NodeBody::Task(task) => {
                task.request_mut().set_param(token, literal);
                true
            }
            NodeBody::Conditional(conditional) => {
                conditional.task.request_mut().set_param(token, literal);
                true
            }
            _ => false,
        }
    }

    /// Runs the node's three phases against its parent's completed state and
    /// returns the node's response. A node whose parent finished without data
    /// runs nothing (failover aside) and completes empty; a root node
    /// substitutes its caller-supplied literals.
    pub(crate) async fn execute(
        &mut self,
        parent: Option<&ParentContext>,
    ) -> TaskResponse {
        match parent {
            None => self.run_phases(None, None).await,
            Some(context) if context.response.has_data() => {
                let payload = context.payload();
                self.run_phases(Some(&payload), None).await
            }
            Some(context) => {
                let triggered = self
                    .failover_criteria
                    .as_ref()
                    .is_some_and(|criteria| context.response.errors.iter().any(|e| e.contains(criteria.as_str())));
                if triggered {
                    debug!(node = %self.key, "failover triggered, substituting against parent request");
                    self.run_phases(None, Some(&context.request_context)).await
                } else {
                    debug!(node = %self.key, "parent completed without data, node idle");
                    TaskResponse::new()
                }
            }
        }
    }

    async fn run_phases(
        &mut self,
        parent_data: Option<&Value>,
        parent_request_data: Option<&Value>,
    ) -> TaskResponse {
        let process_many = self.process_many;
        match &mut self.body {
            NodeBody::Task(task) => {
                task.pre_process(parent_data, parent_request_data, process_many);
                task.process(process_many).await;
                task.post_process(parent_data, process_many);
                task.response().clone()
            }
            NodeBody::Conditional(task) => {
                task.pre_process(parent_data, parent_request_data, process_many);
                task.process(process_many).await;
                task.post_process(parent_data, process_many);
                task.response().clone()
            }
            NodeBody::ForkJoin(fork_join) => fork_join.run(parent_data, process_many).await,
            NodeBody::Collection(collection) => collection.run(parent_data).await,
            NodeBody::Decision(decision) => decision.run(parent_data).await,
        }
    }

    /// Builds the context this node hands to each of its children.
    pub(crate) fn parent_context(
        &self,
        response: TaskResponse,
    ) -> ParentContext {
        let (allow_many, request_context) = match &self.body {
            NodeBody::Task(task) => (task.allow_many(), render_params(task)),
            NodeBody::Conditional(conditional) => (conditional.task.allow_many(), render_params(&conditional.task)),
            _ => (true, Value::Null),
        };
        ParentContext {
            response,
            allow_many,
            request_context,
        }
    }
}

fn render_params(task: &Task) -> Value {
    let mut object = Map::new();
    for (token, value) in &task.request().params {
        object.insert(token.clone(), Value::String(value.clone()));
    }
    Value::Object(object)
}
