use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Outcome envelope of one task (or one per-record sub-request).
///
/// Status follows the 200-success convention: domain-level failures (missing
/// rows, substitution errors) keep status 200 and report through `errors`,
/// while transport failures are marked with status 500. A response never
/// carries data and errors at the same time from the engine's perspective.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TaskResponse {
    /// Empty for responses that are not scoped to one input record.
    pub tracking_id: String,
    pub status: u16,
    pub errors: Vec<String>,
    pub result: Option<JsonValue>,
}

impl Default for TaskResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskResponse {
    pub fn new() -> Self {
        Self {
            tracking_id: String::new(),
            status: 200,
            errors: Vec::new(),
            result: None,
        }
    }

    pub fn with_tracking_id(tracking_id: impl Into<String>) -> Self {
        Self {
            tracking_id: tracking_id.into(),
            ..Self::new()
        }
    }

    /// Adopts `result` when it holds a value, otherwise records `error_message`.
    pub fn from_result(
        tracking_id: impl Into<String>,
        result: Option<JsonValue>,
        error_message: &str,
    ) -> Self {
        let mut response = Self::with_tracking_id(tracking_id);
        match result {
            Some(value) if !value.is_null() => response.result = Some(value),
            _ => {
                if !error_message.is_empty() {
                    response.errors.push(error_message.to_string());
                }
            }
        }
        response
    }

    /// Resolver-level failure: status 500 plus the transport message.
    pub fn transport_error(message: impl Into<String>) -> Self {
        let message = message.into();
        let mut response = Self::new();
        response.status = 500;
        response.errors.push(if message.is_empty() {
            "Unknown error message".to_string()
        } else {
            message
        });
        response
    }

    pub fn push_error(
        &mut self,
        message: impl Into<String>,
    ) {
        self.errors.push(message.into());
    }

    /// True iff the response carries a non-null result and no errors.
    pub fn has_data(&self) -> bool {
        self.result.as_ref().is_some_and(|v| !v.is_null()) && self.errors.is_empty()
    }

    pub fn has_error(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn processing_success(&self) -> bool {
        self.status == 200 && self.errors.is_empty()
    }
}
