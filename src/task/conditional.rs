use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::resolver::DataResolver;

use super::{
    Task, TaskRequest, TaskResponse,
    dispatch::dispatch_tracked_request,
    substitute::{render_value, substitute_body, substitute_url},
};

/// Per-record eligibility predicate, evaluated once at enqueue time.
pub type CriteriaFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Produces the outgoing body for one record when the request template
/// carries none of its own. Receives the record and the current body.
pub type UpdateBodyFn = Arc<dyn Fn(&Value, Option<&Value>) -> Value + Send + Sync>;

/// One entry of a [`ConditionalTask`]'s processing queue.
///
/// Created per parent record during `pre_process`, settled during `process`,
/// and emitted verbatim (minus the request) as the task's per-record outcome.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ProcessingRecord {
    pub tracking_id: String,
    #[serde(skip)]
    pub(crate) request: TaskRequest,
    pub meets_criteria: bool,
    pub processed: bool,
    pub result: Option<Value>,
    pub error: Option<String>,
}

/// Task variant that decides per record whether the record is even attempted.
///
/// Under fan-out every parent record is wrapped in a [`ProcessingRecord`];
/// records failing the criteria stay in the queue (reported skipped) but are
/// never dispatched. The task's response result is the full outcome list, so
/// callers can tell skipped, succeeded and failed records apart. Without
/// fan-out it behaves exactly like a plain [`Task`].
#[derive(Clone)]
pub struct ConditionalTask {
    pub(crate) task: Task,
    tracker_key: String,
    queue: Vec<ProcessingRecord>,
    fanned_out: bool,
    criteria: Option<CriteriaFn>,
    update_body: Option<UpdateBodyFn>,
}

impl ConditionalTask {
    /// `tracker_key` names the record field whose value becomes each queue
    /// entry's tracking id (and later the merge key value in decision output).
    pub fn new(
        key: impl Into<String>,
        request: TaskRequest,
        resolver: Arc<dyn DataResolver>,
        tracker_key: impl Into<String>,
    ) -> Self {
        Self {
            task: Task::new(key, request, resolver),
            tracker_key: tracker_key.into(),
            queue: Vec::new(),
            fanned_out: false,
            criteria: None,
            update_body: None,
        }
    }

    pub fn with_allow_many(
        mut self,
        allow_many: bool,
    ) -> Self {
        self.task = self.task.with_allow_many(allow_many);
        self
    }

    pub fn with_criteria<F>(
        mut self,
        criteria: F,
    ) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.criteria = Some(Arc::new(criteria));
        self
    }

    pub fn with_update_body<F>(
        mut self,
        hook: F,
    ) -> Self
    where
        F: Fn(&Value, Option<&Value>) -> Value + Send + Sync + 'static,
    {
        self.update_body = Some(Arc::new(hook));
        self
    }

    pub fn with_post_process<F>(
        mut self,
        hook: F,
    ) -> Self
    where
        F: Fn(TaskResponse, Option<&Value>) -> TaskResponse + Send + Sync + 'static,
    {
        self.task = self.task.with_post_process(hook);
        self
    }

    pub fn key(&self) -> &str {
        self.task.key()
    }

    pub fn response(&self) -> &TaskResponse {
        self.task.response()
    }

    pub fn tracker_key(&self) -> &str {
        &self.tracker_key
    }

    /// The processing queue in enqueue order (empty before `pre_process`).
    pub fn queue(&self) -> &[ProcessingRecord] {
        &self.queue
    }

    pub(crate) fn pre_process(
        &mut self,
        parent_data: Option<&Value>,
        parent_request_data: Option<&Value>,
        process_many: bool,
    ) {
        let records = parent_data.and_then(Value::as_array);
        match records {
            Some(records) if process_many => {
                self.task.allow_many = true;
                self.fanned_out = true;
                for record in records {
                    self.enqueue(record);
                }
            }
            _ => self.task.pre_process(parent_data, parent_request_data, process_many),
        }
    }

    pub(crate) async fn process(
        &mut self,
        process_many: bool,
    ) {
        if !self.fanned_out {
            self.task.process(process_many).await;
            return;
        }

        let resolver = self.task.resolver.clone();
        let allow_many = self.task.allow_many;
        let eligible = self
            .queue
            .iter()
            .filter(|record| record.meets_criteria && record.error.is_none());
        let settled = join_all(
            eligible.map(|record| dispatch_tracked_request(&record.tracking_id, &record.request, resolver.as_ref(), allow_many)),
        )
        .await;

        for response in settled {
            self.settle_record(response);
        }

        let outcome = match serde_json::to_value(&self.queue) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(task = %self.task.key, error = %err, "queue serialization failed");
                None
            }
        };
        self.task.response = TaskResponse::from_result(self.task.key.clone(), outcome, "");
    }

    pub(crate) fn post_process(
        &mut self,
        parent_data: Option<&Value>,
        process_many: bool,
    ) {
        self.task.post_process(parent_data, process_many);
    }

    /// Wraps one parent record: evaluates the criteria exactly once, then
    /// parameterizes url and body only for records that pass. A substitution
    /// failure marks the record failed without touching its siblings.
    fn enqueue(
        &mut self,
        record: &Value,
    ) {
        let tracking_id = record.get(&self.tracker_key).map(render_value).unwrap_or_default();
        let meets_criteria = self.criteria.as_ref().is_none_or(|criteria| criteria(record));

        let mut entry = ProcessingRecord {
            tracking_id,
            request: self.task.request.clone(),
            meets_criteria,
            processed: false,
            result: None,
            error: None,
        };

        if meets_criteria {
            match substitute_url(&entry.request, Some(record), false) {
                Ok(url) => entry.request.url = url,
                Err(err) => entry.error = Some(err.to_string()),
            }

            if entry.error.is_none() && entry.request.method.is_mutating() {
                if entry.request.body.is_some() {
                    match substitute_body(&entry.request, Some(record), false) {
                        Ok(body) => entry.request.body = body,
                        Err(err) => entry.error = Some(err.to_string()),
                    }
                } else if let Some(update_body) = &self.update_body {
                    entry.request.body = Some(update_body(record, entry.request.body.as_ref()));
                } else {
                    // a bodiless mutating record sends itself as the body
                    entry.request.body = Some(record.clone());
                }
            }
        }

        self.queue.push(entry);
    }

    fn settle_record(
        &mut self,
        response: TaskResponse,
    ) {
        let Some(record) = self.queue.iter_mut().find(|r| r.tracking_id == response.tracking_id) else {
            warn!(task = %self.task.key, tracking_id = %response.tracking_id, "settled response has no queue record");
            return;
        };

        record.processed = true;
        if response.has_data() {
            record.result = response.result;
        } else if response.has_error() {
            record.error = Some(response.errors.join(", "));
        }
    }
}
