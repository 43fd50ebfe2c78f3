use futures::future::join_all;
use serde_json::Value;
use tracing::warn;

use crate::{
    common::merge_by_key,
    task::{Task, TaskResponse},
};

/// Fork-join body: all member tasks run on the identical parent payload,
/// phase-synchronized with each other, and their result arrays are merged
/// into one array keyed by the caller's join field.
pub(crate) struct ForkJoinBody {
    merge_key: String,
    tasks: Vec<Task>,
}

impl ForkJoinBody {
    pub(crate) fn new(
        merge_key: impl Into<String>,
        tasks: Vec<Task>,
    ) -> Self {
        Self {
            merge_key: merge_key.into(),
            tasks,
        }
    }

    pub(crate) async fn run(
        &mut self,
        parent_data: Option<&Value>,
        process_many: bool,
    ) -> TaskResponse {
        run_member_tasks(&mut self.tasks, parent_data, process_many).await;
        merge_member_results(&self.merge_key, &self.tasks)
    }
}

/// Drives the member tasks through the three phases together: every task
/// finishes `pre_process` before any dispatches, and all dispatches settle
/// (`join_all`, no short-circuit) before any task post-processes.
pub(crate) async fn run_member_tasks(
    tasks: &mut [Task],
    parent_data: Option<&Value>,
    process_many: bool,
) {
    for task in tasks.iter_mut() {
        task.pre_process(parent_data, None, process_many);
    }

    join_all(tasks.iter_mut().map(|task| task.process(process_many))).await;

    for task in tasks.iter_mut() {
        task.post_process(parent_data, process_many);
    }
}

/// Collects every member's result rows in declaration order and merges them
/// by `merge_key`, last-write-wins per field. A member that finished without
/// data contributes nothing; its errors are logged, not propagated, so one
/// failing member never hides its siblings' rows.
pub(crate) fn merge_member_results(
    merge_key: &str,
    tasks: &[Task],
) -> TaskResponse {
    let mut arrays: Vec<Vec<Value>> = Vec::with_capacity(tasks.len());
    for task in tasks {
        let response = task.response();
        if response.has_data() {
            arrays.push(match response.result.clone() {
                Some(Value::Array(rows)) => rows,
                Some(value) => vec![value],
                None => Vec::new(),
            });
        } else {
            if response.has_error() {
                warn!(task = %task.key(), errors = ?response.errors, "member task finished without data");
            }
            arrays.push(Vec::new());
        }
    }

    let mut response = TaskResponse::new();
    response.result = Some(Value::Array(merge_by_key(merge_key, arrays)));
    response
}
