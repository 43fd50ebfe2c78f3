use serde_json::Value;
use tracing::warn;

use crate::resolver::DataResolver;

use super::{Method, TaskRequest, TaskResponse};

const KEY_NOT_FOUND: &str = "Key not found";
const KEY_NOT_UNIQUE: &str = "Key Not Unique";
const NO_ROWS_AFFECTED: &str = "No rows affected";

/// Reply field conventionally reported by mutating endpoints.
const ROWS_AFFECTED_FIELD: &str = "rows_affected";

/// Dispatches one request through the resolver and normalizes the raw reply.
///
/// GET replies are record sets: zero rows become "Key not found", more than
/// one row with `allow_many=false` becomes "Key Not Unique". Mutating replies
/// reporting zero affected rows become "No rows affected". Transport failure
/// becomes a status-500 response; this function never raises.
pub(crate) async fn dispatch_request(
    request: &TaskRequest,
    resolver: &dyn DataResolver,
    allow_many: bool,
) -> TaskResponse {
    dispatch_tracked_request("", request, resolver, allow_many).await
}

/// Same as [`dispatch_request`] but stamps the response with a tracking id so
/// it can be re-attached to its queue record after a concurrent settle.
pub(crate) async fn dispatch_tracked_request(
    tracking_id: &str,
    request: &TaskRequest,
    resolver: &dyn DataResolver,
    allow_many: bool,
) -> TaskResponse {
    let mut response = TaskResponse::with_tracking_id(tracking_id);

    if !request.is_valid() {
        warn!(method = %request.method, "request not dispatchable, resolving empty");
        return response;
    }

    match request.method {
        Method::GET => match resolver.get_array(&request.url).await {
            Ok(rows) => {
                if !allow_many && rows.len() > 1 {
                    response.push_error(KEY_NOT_UNIQUE);
                } else if rows.is_empty() {
                    response.push_error(KEY_NOT_FOUND);
                } else {
                    response.result = Some(Value::Array(rows));
                }
            }
            Err(err) => {
                response = transport_failure(tracking_id, err.into());
            }
        },
        Method::POST | Method::PUT | Method::DELETE => {
            let body = request.body.clone().unwrap_or(Value::Null);
            let reply = match request.method {
                Method::POST => resolver.post(&request.url, &body).await,
                Method::PUT => resolver.put(&request.url, &body).await,
                Method::DELETE => resolver.delete(&request.url, request.body.as_ref()).await,
                Method::GET => unreachable!(),
            };
            match reply {
                Ok(value) => normalize_mutation_reply(&mut response, value),
                Err(err) => {
                    response = transport_failure(tracking_id, err.into());
                }
            }
        }
    }

    response
}

fn normalize_mutation_reply(
    response: &mut TaskResponse,
    value: Value,
) {
    match value {
        Value::Null => {}
        Value::Array(rows) => {
            if rows.is_empty() {
                response.push_error(NO_ROWS_AFFECTED);
            } else {
                response.result = Some(Value::Array(rows));
            }
        }
        other => {
            let affected = other.get(ROWS_AFFECTED_FIELD).and_then(Value::as_i64);
            if affected.is_some_and(|n| n < 1) {
                response.push_error(NO_ROWS_AFFECTED);
            } else {
                response.result = Some(other);
            }
        }
    }
}

fn transport_failure(
    tracking_id: &str,
    message: String,
) -> TaskResponse {
    let mut response = TaskResponse::transport_error(message);
    response.tracking_id = tracking_id.to_string();
    response
}
