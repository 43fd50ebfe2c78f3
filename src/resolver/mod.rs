mod rest;

use async_trait::async_trait;
use serde_json::Value;

use crate::Result;

pub use rest::RestResolver;

/// Transport capability every task dispatches through.
///
/// The engine never opens connections itself; it is handed an implementation
/// of this trait (REST over HTTP in [`RestResolver`], an in-memory table in
/// tests) and stays agnostic to what the urls mean. All methods reject with
/// [`crate::FanflowError::Resolver`] on transport failure; domain-level
/// outcomes (no rows, too many rows) are left to the engine to classify.
#[async_trait]
pub trait DataResolver: Send + Sync {
    /// Fetches a single value.
    async fn get(
        &self,
        url: &str,
    ) -> Result<Value>;

    /// Fetches a record set. An endpoint with no matching rows returns an
    /// empty vec, not an error.
    async fn get_array(
        &self,
        url: &str,
    ) -> Result<Vec<Value>>;

    /// Creates data, returning the reply payload.
    async fn post(
        &self,
        url: &str,
        body: &Value,
    ) -> Result<Value>;

    /// Updates data, returning the reply payload.
    async fn put(
        &self,
        url: &str,
        body: &Value,
    ) -> Result<Value>;

    /// Deletes data; the optional body carries match criteria.
    async fn delete(
        &self,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Value>;
}
