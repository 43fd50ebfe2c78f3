//! Shared in-memory resolver for unit tests.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;

use serde_json::Value;

use crate::{FanflowError, Result, resolver::DataResolver};

/// Canned-reply resolver: maps urls to fixed replies, rejects urls listed as
/// failing, and counts every call it receives.
pub(crate) struct StubResolver {
    routes: HashMap<String, Value>,
    failing: HashMap<String, String>,
    calls: AtomicUsize,
}

impl StubResolver {
    pub(crate) fn new() -> Self {
        Self {
            routes: HashMap::new(),
            failing: HashMap::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn route(
        mut self,
        url: &str,
        reply: Value,
    ) -> Self {
        self.routes.insert(url.to_string(), reply);
        self
    }

    /// Makes `url` reject with a transport error carrying `message`.
    pub(crate) fn fail_on(
        mut self,
        url: &str,
        message: &str,
    ) -> Self {
        self.failing.insert(url.to_string(), message.to_string());
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn lookup(
        &self,
        url: &str,
    ) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.failing.get(url) {
            return Err(FanflowError::Resolver(message.clone()));
        }
        Ok(self.routes.get(url).cloned().unwrap_or(Value::Null))
    }
}

#[async_trait]
impl DataResolver for StubResolver {
    async fn get(
        &self,
        url: &str,
    ) -> Result<Value> {
        self.lookup(url)
    }

    async fn get_array(
        &self,
        url: &str,
    ) -> Result<Vec<Value>> {
        match self.lookup(url)? {
            Value::Null => Ok(Vec::new()),
            Value::Array(rows) => Ok(rows),
            single => Ok(vec![single]),
        }
    }

    async fn post(
        &self,
        url: &str,
        _body: &Value,
    ) -> Result<Value> {
        self.lookup(url)
    }

    async fn put(
        &self,
        url: &str,
        _body: &Value,
    ) -> Result<Value> {
        self.lookup(url)
    }

    async fn delete(
        &self,
        url: &str,
        _body: Option<&Value>,
    ) -> Result<Value> {
        self.lookup(url)
    }
}
