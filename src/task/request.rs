use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// HTTP-style method of a task request.
///
/// The engine never talks to a network itself; the method only selects which
/// resolver capability a request is dispatched through.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString, strum::Display)]
pub enum Method {
    #[default]
    GET,
    POST,
    PUT,
    DELETE,
}

impl Method {
    /// Mutating methods carry a body and report affected rows.
    pub fn is_mutating(&self) -> bool {
        matches!(self, Method::POST | Method::PUT | Method::DELETE)
    }
}

/// Declarative description of one remote call.
///
/// The url (and optionally the body) may contain `${param}` tokens. Each token
/// is declared in `params` together with the name of the context field its
/// value is resolved from; at the tree root the mapping value is taken as the
/// literal replacement instead.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct TaskRequest {
    pub url: String,
    pub method: Method,
    pub body: Option<JsonValue>,
    /// Ordered token -> source-field mapping.
    pub params: Vec<(String, String)>,
}

impl TaskRequest {
    pub fn new(
        method: Method,
        url: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            method,
            body: None,
            params: Vec::new(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    pub fn with_body(
        mut self,
        body: JsonValue,
    ) -> Self {
        self.body = Some(body);
        self
    }

    /// Declares a `${token}` -> context-field mapping (appended in order).
    pub fn param(
        mut self,
        token: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        self.params.push((token.into(), field.into()));
        self
    }

    /// Inserts or replaces the mapping for `token`, keeping declaration order.
    pub fn set_param(
        &mut self,
        token: impl Into<String>,
        value: impl Into<String>,
    ) {
        let token = token.into();
        let value = value.into();
        match self.params.iter_mut().find(|(t, _)| *t == token) {
            Some(entry) => entry.1 = value,
            None => self.params.push((token, value)),
        }
    }

    /// A request is dispatchable only once its url is set.
    pub fn is_valid(&self) -> bool {
        !self.url.is_empty()
    }
}
