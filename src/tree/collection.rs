use serde_json::Value;

use crate::task::{Task, TaskResponse};

use super::fork_join::{merge_member_results, run_member_tasks};

/// Collection body: the fork-join pattern applied to record-set expansion.
/// Every member task fans out over the parent's full record list
/// independently (`process_many` is always on), then the per-member result
/// arrays are merged by the caller's key.
pub(crate) struct CollectionBody {
    merge_key: String,
    tasks: Vec<Task>,
}

impl CollectionBody {
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
    ) -> TaskResponse {
        run_member_tasks(&mut self.tasks, parent_data, true).await;
        merge_member_results(&self.merge_key, &self.tasks)
    }
}
