use std::sync::Arc;

use futures::future::join_all;
use serde_json::{Value, json};
use tracing::warn;

use crate::{
    common::group_by_key,
    task::{ConditionalTask, TaskResponse},
};

/// Record-routing predicate of a decision node, evaluated once per record.
pub type DecisionFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// One branch registration of a decision node: the task runs against the
/// matched queue when `on_match` is true, against the unmatched queue
/// otherwise. Several branches may target the same queue.
pub struct DecisionBranch {
    on_match: bool,
    task: ConditionalTask,
    ran: bool,
}

impl DecisionBranch {
    /// Registers `task` against the records the decision criteria accepts.
    pub fn on_match(task: ConditionalTask) -> Self {
        Self {
            on_match: true,
            task,
            ran: false,
        }
    }

    /// Registers `task` against the records the decision criteria rejects.
    pub fn on_mismatch(task: ConditionalTask) -> Self {
        Self {
            on_match: false,
            task,
            ran: false,
        }
    }
}

/// Decision body: partitions the parent's records into two queues by the
/// decision criteria, fans each branch task out over its queue, then groups
/// every task's per-record outcome by the merge key into one aggregate
/// record per key.
pub(crate) struct DecisionBody {
    merge_key: String,
    criteria: Option<DecisionFn>,
    branches: Vec<DecisionBranch>,
}

impl DecisionBody {
    pub(crate) fn new(
        merge_key: impl Into<String>,
        branches: Vec<DecisionBranch>,
    ) -> Self {
        Self {
            merge_key: merge_key.into(),
            criteria: None,
            branches,
        }
    }

    pub(crate) fn set_criteria<F>(
        &mut self,
        criteria: F,
    ) where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.criteria = Some(Arc::new(criteria));
    }

    pub(crate) async fn run(
        &mut self,
        parent_data: Option<&Value>,
    ) -> TaskResponse {
        let (matched, unmatched) = self.partition(parent_data);

        // pre_process every branch with a non-empty queue, then settle all
        // dispatches together, then post_process; a branch whose queue is
        // empty is never invoked at all
        for branch in &mut self.branches {
            let queue = if branch.on_match { &matched } else { &unmatched };
            if queue.is_empty() {
                continue;
            }
            branch.ran = true;
            branch.task.pre_process(Some(&Value::Array(queue.clone())), None, true);
        }

        join_all(
            self.branches
                .iter_mut()
                .filter(|branch| branch.ran)
                .map(|branch| branch.task.process(true)),
        )
        .await;

        for branch in self.branches.iter_mut().filter(|branch| branch.ran) {
            branch.task.post_process(parent_data, true);
        }

        self.aggregate()
    }

    /// Splits the parent's record array into the matched and unmatched
    /// queues. The default criteria accepts every record.
    fn partition(
        &self,
        parent_data: Option<&Value>,
    ) -> (Vec<Value>, Vec<Value>) {
        let records = match parent_data {
            Some(Value::Array(rows)) => rows.clone(),
            Some(value) if !value.is_null() => vec![value.clone()],
            _ => Vec::new(),
        };

        let mut matched = Vec::new();
        let mut unmatched = Vec::new();
        for record in records {
            if self.criteria.as_ref().is_none_or(|criteria| criteria(&record)) {
                matched.push(record);
            } else {
                unmatched.push(record);
            }
        }
        (matched, unmatched)
    }

    /// Flattens every executed branch's per-record outcomes, re-keys each by
    /// the merge key, and emits one aggregate record per key value:
    /// `{<merge_key>: key, task_action_statuses: [..]}`.
    fn aggregate(&self) -> TaskResponse {
        let mut statuses: Vec<Value> = Vec::new();

        for branch in self.branches.iter().filter(|branch| branch.ran) {
            let response = branch.task.response();
            match &response.result {
                Some(Value::Array(outcomes)) if response.has_data() => {
                    for outcome in outcomes {
                        statuses.push(self.record_status(branch.task.key(), outcome));
                    }
                }
                _ => {
                    warn!(task = %branch.task.key(), errors = ?response.errors, "branch task finished without outcomes");
                    statuses.push(json!({
                        (self.merge_key.as_str()): "",
                        "task_id": branch.task.key(),
                        "skipped_processing": false,
                        "processed": false,
                        "results": [],
                        "errors": response.errors,
                    }));
                }
            }
        }

        let aggregates: Vec<Value> = group_by_key(&self.merge_key, statuses)
            .into_iter()
            .map(|(key, group)| {
                json!({
                    (self.merge_key.as_str()): key,
                    "task_action_statuses": group,
                })
            })
            .collect();

        let mut response = TaskResponse::new();
        response.result = Some(Value::Array(aggregates));
        response
    }

    fn record_status(
        &self,
        task_id: &str,
        outcome: &Value,
    ) -> Value {
        let meets_criteria = outcome["meets_criteria"].as_bool().unwrap_or(false);
        let errors = match outcome.get("error") {
            Some(Value::String(message)) => json!([message]),
            _ => json!([]),
        };
        // results is always an array: empty for skipped/failed records, one
        // element on success
        let results = match outcome.get("result") {
            Some(Value::Null) | None => json!([]),
            Some(value) => json!([value]),
        };
        json!({
            (self.merge_key.as_str()): outcome["tracking_id"],
            "task_id": task_id,
            "skipped_processing": !meets_criteria,
            "processed": outcome["processed"],
            "results": results,
            "errors": errors,
        })
    }
}
