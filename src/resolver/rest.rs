use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use nanoid::nanoid;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, InvalidHeaderValue};
use serde_json::Value;

use crate::{
    FanflowError, Result,
    config::{AuthKind, ResolverConfig},
    resolver::DataResolver,
    utils,
};

const TRACE_ID_HEADER: &str = "x-b3-traceid";
const REQUEST_TS_HEADER: &str = "x-request-ts";

/// [`DataResolver`] over a REST backend.
///
/// Joins every request url onto the configured base url, attaches a fresh
/// trace id and a request timestamp, and decodes JSON replies. An empty reply
/// body decodes as JSON null.
pub struct RestResolver {
    client: reqwest::Client,
    config: ResolverConfig,
}

impl RestResolver {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::from_config(ResolverConfig {
            base_url: base_url.into(),
            ..ResolverConfig::default()
        })
    }

    pub fn from_config(config: ResolverConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout_ms) = config.timeout_ms {
            builder = builder.timeout(Duration::from_millis(timeout_ms));
        }
        let client = builder.build()?;

        Ok(Self { client, config })
    }

    fn join_url(
        &self,
        url: &str,
    ) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            url.trim_start_matches('/')
        )
    }

    /// Apply authorization headers based on auth config
    fn apply_auth_headers(
        &self,
        headers: &mut HeaderMap,
    ) -> Result<()> {
        let Some(auth) = &self.config.auth else {
            return Ok(());
        };

        let header_value = match auth.kind {
            AuthKind::Bearer => {
                let token = auth.token.as_ref().ok_or_else(|| FanflowError::Config("token is required for bearer authorization".to_string()))?;
                format!("Bearer {}", token)
            }
            AuthKind::Basic => {
                let username = auth.username.as_deref().unwrap_or_default();
                let password = auth.password.as_deref().unwrap_or_default();
                let encoded = STANDARD.encode(format!("{}:{}", username, password).as_bytes());
                format!("Basic {}", encoded)
            }
        };

        headers.insert(
            HeaderName::from_static("authorization"),
            header_value.parse().map_err(|err: InvalidHeaderValue| FanflowError::Config(err.to_string()))?,
        );
        Ok(())
    }

    fn build_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static("accept"), HeaderValue::from_static("application/json"));
        headers.insert(
            HeaderName::from_static(TRACE_ID_HEADER),
            nanoid!().parse().map_err(|err: InvalidHeaderValue| FanflowError::Resolver(err.to_string()))?,
        );
        headers.insert(
            HeaderName::from_static(REQUEST_TS_HEADER),
            utils::time::now_rfc3339().parse().map_err(|err: InvalidHeaderValue| FanflowError::Resolver(err.to_string()))?,
        );

        self.apply_auth_headers(&mut headers)?;

        for (key, value) in &self.config.headers {
            headers.insert(
                key.parse::<HeaderName>().map_err(|err| FanflowError::Config(err.to_string()))?,
                value.parse().map_err(|err: InvalidHeaderValue| FanflowError::Config(err.to_string()))?,
            );
        }

        Ok(headers)
    }

    async fn decode(
        &self,
        response: reqwest::Response,
    ) -> Result<Value> {
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(FanflowError::Resolver(format!("status {}: {}", status.as_u16(), text)));
        }
        if text.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|err| FanflowError::Resolver(err.to_string()))
    }
}

#[async_trait]
impl DataResolver for RestResolver {
    async fn get(
        &self,
        url: &str,
    ) -> Result<Value> {
        let response = self
            .client
            .get(self.join_url(url))
            .headers(self.build_headers()?)
            .send()
            .await?;
        self.decode(response).await
    }

    async fn get_array(
        &self,
        url: &str,
    ) -> Result<Vec<Value>> {
        match self.get(url).await? {
            Value::Null => Ok(Vec::new()),
            Value::Array(rows) => Ok(rows),
            single => Ok(vec![single]),
        }
    }

    async fn post(
        &self,
        url: &str,
        body: &Value,
    ) -> Result<Value> {
        let response = self
            .client
            .post(self.join_url(url))
            .headers(self.build_headers()?)
            .json(body)
            .send()
            .await?;
        self.decode(response).await
    }

    async fn put(
        &self,
        url: &str,
        body: &Value,
    ) -> Result<Value> {
        let response = self
            .client
            .put(self.join_url(url))
            .headers(self.build_headers()?)
            .json(body)
            .send()
            .await?;
        self.decode(response).await
    }

    async fn delete(
        &self,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Value> {
        let mut request = self
            .client
            .delete(self.join_url(url))
            .headers(self.build_headers()?);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        self.decode(response).await
    }
}
