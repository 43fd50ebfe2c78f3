use std::{collections::HashMap, fs, path::Path};

use serde::Deserialize;

use crate::{FanflowError, Result};

/// Settings for the bundled REST data resolver.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// base url every request url is joined onto
    pub base_url: String,
    /// request timeout in milliseconds; no timeout when unset
    pub timeout_ms: Option<u64>,
    /// static headers attached to every request
    pub headers: HashMap<String, String>,
    /// authorization config
    pub auth: Option<AuthConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub kind: AuthKind,
    /// bearer token
    pub token: Option<String>,
    /// basic credentials
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthKind {
    #[default]
    Bearer,
    Basic,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout_ms: None,
            headers: HashMap::new(),
            auth: None,
        }
    }
}

impl ResolverConfig {
    pub fn from_file<T: AsRef<Path>>(path: T) -> Result<Self> {
        let data = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(data.as_str())
    }

    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        toml::from_str::<ResolverConfig>(toml_str).map_err(|err| FanflowError::Config(err.to_string()))
    }
}

#[cfg(test)]
mod test {
    use crate::{AuthKind, ResolverConfig};

    #[test]
    fn test_config_deserialize() {
        let toml_str = r#"
        base_url = "https://api.internal:8443/cob"
        timeout_ms = 5000

        [headers]
        rest-user = "batch"

        [auth]
        kind = "basic"
        username = "svc"
        password = "secret"
        "#;
        let config = ResolverConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.base_url, "https://api.internal:8443/cob");
        assert_eq!(config.timeout_ms, Some(5000));
        assert_eq!(config.headers.get("rest-user").map(String::as_str), Some("batch"));

        let auth = config.auth.unwrap();
        assert_eq!(auth.kind, AuthKind::Basic);
        assert_eq!(auth.username.as_deref(), Some("svc"));
    }

    #[test]
    fn test_config_defaults() {
        let config = ResolverConfig::default();
        assert_eq!(config.base_url, "http://localhost:8080");
        assert!(config.timeout_ms.is_none());
        assert!(config.headers.is_empty());
        assert!(config.auth.is_none());
    }
}
