use std::sync::Arc;

use futures::future::join_all;
use serde_json::Value;
use tracing::warn;

use crate::resolver::DataResolver;

use super::{
    TaskRequest, TaskResponse,
    dispatch::dispatch_request,
    substitute::{substitute_body, substitute_url},
};

/// Post-processing hook: reshapes the settled response, optionally reading the
/// parent payload. Assigned per task instead of subclassing.
pub type PostProcessFn = Arc<dyn Fn(TaskResponse, Option<&Value>) -> TaskResponse + Send + Sync>;

/// Atomic three-phase unit of work over one parameterized remote call.
///
/// `pre_process` resolves `${param}` tokens (or, in fan-out mode, clones the
/// request template once per parent record), `process` dispatches through the
/// injected [`DataResolver`] and settles, `post_process` applies the optional
/// transformation hook. A failure in any phase is recorded on the task's
/// response and later phases become no-ops; nothing is ever raised out of a
/// phase.
#[derive(Clone)]
pub struct Task {
    pub(crate) key: String,
    pub(crate) request: TaskRequest,
    pub(crate) response: TaskResponse,
    pub(crate) resolver: Arc<dyn DataResolver>,
    pub(crate) allow_many: bool,
    fanout_queue: Vec<TaskRequest>,
    fanned_out: bool,
    post_process_fn: Option<PostProcessFn>,
}

impl Task {
    pub fn new(
        key: impl Into<String>,
        request: TaskRequest,
        resolver: Arc<dyn DataResolver>,
    ) -> Self {
        Self {
            key: key.into(),
            request,
            response: TaskResponse::new(),
            resolver,
            allow_many: true,
            fanout_queue: Vec::new(),
            fanned_out: false,
            post_process_fn: None,
        }
    }

    /// Whether more than one row is an acceptable outcome (default true).
    pub fn with_allow_many(
        mut self,
        allow_many: bool,
    ) -> Self {
        self.allow_many = allow_many;
        self
    }

    pub fn with_post_process<F>(
        mut self,
        hook: F,
    ) -> Self
    where
        F: Fn(TaskResponse, Option<&Value>) -> TaskResponse + Send + Sync + 'static,
    {
        self.post_process_fn = Some(Arc::new(hook));
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn response(&self) -> &TaskResponse {
        &self.response
    }

    pub fn request(&self) -> &TaskRequest {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut TaskRequest {
        &mut self.request
    }

    pub fn allow_many(&self) -> bool {
        self.allow_many
    }

    /// Parameter resolution. Exactly one source applies:
    /// parent payload (fanned per record under `process_many`), parent request
    /// data (failover), or caller literals at the tree root.
    pub(crate) fn pre_process(
        &mut self,
        parent_data: Option<&Value>,
        parent_request_data: Option<&Value>,
        process_many: bool,
    ) {
        if process_many {
            // fan-out dispatches one request per record, so a unique-row
            // expectation no longer applies
            self.allow_many = true;
        }

        match (parent_data, parent_request_data) {
            (Some(payload), _) if process_many => self.parameterize_many(payload),
            (Some(payload), _) => self.parameterize(Some(payload), false),
            (None, Some(request_data)) => self.parameterize(Some(request_data), false),
            (None, None) => self.parameterize(None, true),
        }
    }

    /// Dispatch and settle. Skipped entirely when `pre_process` already failed.
    pub(crate) async fn process(
        &mut self,
        _process_many: bool,
    ) {
        if self.response.has_error() {
            return;
        }

        if self.fanned_out {
            self.process_queue().await;
        } else {
            self.response = dispatch_request(&self.request, self.resolver.as_ref(), self.allow_many).await;
        }
    }

    pub(crate) fn post_process(
        &mut self,
        parent_data: Option<&Value>,
        _process_many: bool,
    ) {
        if let Some(hook) = &self.post_process_fn {
            let response = std::mem::take(&mut self.response);
            self.response = hook(response, parent_data);
        }
    }

    fn parameterize(
        &mut self,
        context: Option<&Value>,
        skip_check: bool,
    ) {
        match substitute_url(&self.request, context, skip_check) {
            Ok(url) => self.request.url = url,
            Err(err) => {
                self.response.push_error(err);
                return;
            }
        }

        if self.request.method.is_mutating() && self.request.body.is_some() {
            match substitute_body(&self.request, context, skip_check) {
                Ok(body) => self.request.body = body,
                Err(err) => self.response.push_error(err),
            }
        }
    }

    fn parameterize_many(
        &mut self,
        payload: &Value,
    ) {
        let Some(records) = payload.as_array() else {
            // non-array parent payload degrades to the single-record case
            self.parameterize(Some(payload), false);
            return;
        };

        self.fanned_out = true;
        for record in records {
            let mut request = self.request.clone();
            match substitute_url(&request, Some(record), false) {
                Ok(url) => request.url = url,
                Err(err) => {
                    self.response.push_error(err);
                    return;
                }
            }
            if request.method.is_mutating() && request.body.is_some() {
                match substitute_body(&request, Some(record), false) {
                    Ok(body) => request.body = body,
                    Err(err) => {
                        self.response.push_error(err);
                        return;
                    }
                }
            }
            self.fanout_queue.push(request);
        }
    }

    /// Dispatches every queued per-record request concurrently, waits for all
    /// to settle, and concatenates the rows of those that returned data.
    /// Failed records are dropped from the aggregate; their errors are only
    /// logged here.
    async fn process_queue(&mut self) {
        let settled = join_all(
            self.fanout_queue
                .iter()
                .map(|request| dispatch_request(request, self.resolver.as_ref(), self.allow_many)),
        )
        .await;

        let mut combined: Vec<Value> = Vec::new();
        for response in settled {
            if response.has_data() {
                match response.result {
                    Some(Value::Array(rows)) => combined.extend(rows),
                    Some(value) => combined.push(value),
                    None => {}
                }
            } else if response.has_error() {
                warn!(task = %self.key, errors = ?response.errors, "fan-out record dropped from aggregate");
            }
        }

        self.response = TaskResponse::new();
        self.response.result = Some(Value::Array(combined));
    }
}
