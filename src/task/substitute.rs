use regex::Regex;
use serde_json::Value;

use crate::{FanflowError, Result};

use super::request::TaskRequest;

/// Regex pattern for request parameter tokens
/// Format: `${name}`
const PARAM_TOKEN_PATTERN: &str = r"\$\{([^}]+)\}";

/// Resolve the request's url template against `context`.
///
/// Every declared `(token, field)` pair replaces the first occurrence of
/// `token` with the string rendering of `context[field]`. With `skip_check`
/// (tree root) the mapping value itself is the literal replacement and no
/// context is consulted. Returns an error when the named field is missing or
/// null, or when a `${..}` token is left with no mapping at all.
pub fn substitute_url(
    request: &TaskRequest,
    context: Option<&Value>,
    skip_check: bool,
) -> Result<String> {
    let url = apply_params(&request.url, &request.params, context, skip_check)?;
    ensure_fully_resolved(&url)?;
    Ok(url)
}

/// Resolve tokens inside the request body, if one is set.
///
/// The body is substituted in its JSON-serialized form and re-parsed, so a
/// token embedded in a string field is replaced textually.
pub fn substitute_body(
    request: &TaskRequest,
    context: Option<&Value>,
    skip_check: bool,
) -> Result<Option<Value>> {
    let Some(body) = &request.body else {
        return Ok(None);
    };

    let serialized = serde_json::to_string(body)?;
    let substituted = apply_params(&serialized, &request.params, context, skip_check)?;
    ensure_fully_resolved(&substituted)?;

    let body = serde_json::from_str(&substituted)?;
    Ok(Some(body))
}

fn apply_params(
    template: &str,
    params: &[(String, String)],
    context: Option<&Value>,
    skip_check: bool,
) -> Result<String> {
    let mut result = template.to_string();

    for (token, field) in params {
        let replacement = if skip_check {
            field.clone()
        } else {
            let value = context.and_then(|ctx| ctx.get(field.as_str()));
            match value {
                None => {
                    return Err(FanflowError::Substitution(format!("`{}` not found", field)));
                }
                Some(Value::Null) => {
                    return Err(FanflowError::Substitution(format!("`{}` value is undefined", field)));
                }
                Some(value) => render_value(value),
            }
        };
        result = result.replacen(token.as_str(), &replacement, 1);
    }

    Ok(result)
}

/// String rendering used for substitution values, tracking ids and merge
/// keys: strings unquoted, scalars via `to_string`, containers as JSON.
pub(crate) fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        v => v.to_string(), // For objects/arrays, use JSON string
    }
}

fn ensure_fully_resolved(text: &str) -> Result<()> {
    let re = Regex::new(PARAM_TOKEN_PATTERN).unwrap();
    if let Some(caps) = re.captures(text) {
        return Err(FanflowError::Substitution(format!("`{}` not mapped", &caps[0])));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    // ==================== substitute_url tests ====================

    #[test]
    fn test_substitute_url_no_tokens() {
        let request = TaskRequest::get("/persons");
        let url = substitute_url(&request, Some(&json!({})), false).unwrap();
        assert_eq!(url, "/persons");
    }

    #[test]
    fn test_substitute_url_string_field() {
        let request = TaskRequest::get("/persons?email=${param1}").param("${param1}", "email");
        let context = json!({"email": "a@b.com"});

        let url = substitute_url(&request, Some(&context), false).unwrap();
        assert_eq!(url, "/persons?email=a@b.com");
    }

    #[test]
    fn test_substitute_url_number_field() {
        let request = TaskRequest::get("/persons/${param1}/rre").param("${param1}", "prsnId");
        let context = json!({"prsnId": 7});

        let url = substitute_url(&request, Some(&context), false).unwrap();
        assert_eq!(url, "/persons/7/rre");
    }

    #[test]
    fn test_substitute_url_bool_field() {
        let request = TaskRequest::get("/persons?active=${param1}").param("${param1}", "active");
        let context = json!({"active": true});

        let url = substitute_url(&request, Some(&context), false).unwrap();
        assert_eq!(url, "/persons?active=true");
    }

    #[test]
    fn test_substitute_url_multiple_tokens() {
        let request = TaskRequest::get("/persons/${param1}/accounts/${param2}")
            .param("${param1}", "prsnId")
            .param("${param2}", "acctId");
        let context = json!({"prsnId": 7, "acctId": "A-1"});

        let url = substitute_url(&request, Some(&context), false).unwrap();
        assert_eq!(url, "/persons/7/accounts/A-1");
    }

    #[test]
    fn test_substitute_url_missing_field() {
        let request = TaskRequest::get("/persons/${param1}").param("${param1}", "prsnId");

        let err = substitute_url(&request, Some(&json!({})), false).unwrap_err();
        assert_eq!(err.to_string(), "`prsnId` not found");
    }

    #[test]
    fn test_substitute_url_null_field() {
        let request = TaskRequest::get("/persons/${param1}").param("${param1}", "prsnId");
        let context = json!({"prsnId": null});

        let err = substitute_url(&request, Some(&context), false).unwrap_err();
        assert_eq!(err.to_string(), "`prsnId` value is undefined");
    }

    #[test]
    fn test_substitute_url_no_context() {
        let request = TaskRequest::get("/persons/${param1}").param("${param1}", "prsnId");

        let err = substitute_url(&request, None, false).unwrap_err();
        assert_eq!(err.to_string(), "`prsnId` not found");
    }

    #[test]
    fn test_substitute_url_unmapped_token() {
        let request = TaskRequest::get("/persons/${param1}/rre/${param2}").param("${param1}", "prsnId");
        let context = json!({"prsnId": 7});

        let err = substitute_url(&request, Some(&context), false).unwrap_err();
        assert_eq!(err.to_string(), "`${param2}` not mapped");
    }

    #[test]
    fn test_substitute_url_replaces_first_occurrence_per_entry() {
        let request = TaskRequest::get("/a/${param1}/b/${param1}")
            .param("${param1}", "id")
            .param("${param1}", "id");
        let context = json!({"id": 3});

        let url = substitute_url(&request, Some(&context), false).unwrap();
        assert_eq!(url, "/a/3/b/3");
    }

    // ==================== skip_check tests ====================

    #[test]
    fn test_skip_check_uses_literals() {
        let request = TaskRequest::get("/persons?email=${param1}").param("${param1}", "a@b.com");

        let url = substitute_url(&request, None, true).unwrap();
        assert_eq!(url, "/persons?email=a@b.com");
    }

    #[test]
    fn test_skip_check_unset_literal_still_fails_when_unmapped() {
        let request = TaskRequest::get("/persons?email=${param1}");

        let err = substitute_url(&request, None, true).unwrap_err();
        assert_eq!(err.to_string(), "`${param1}` not mapped");
    }

    // ==================== substitute_body tests ====================

    #[test]
    fn test_substitute_body_none() {
        let request = TaskRequest::get("/persons");
        let body = substitute_body(&request, Some(&json!({})), false).unwrap();
        assert!(body.is_none());
    }

    #[test]
    fn test_substitute_body_object() {
        let request = TaskRequest::post("/persons/${param1}/rre")
            .with_body(json!({"rptrId": "${param2}", "fixed": true}))
            .param("${param1}", "prsnId")
            .param("${param2}", "rptrId");
        let context = json!({"prsnId": 7, "rptrId": "R-9"});

        let body = substitute_body(&request, Some(&context), false).unwrap();
        assert_eq!(body, Some(json!({"rptrId": "R-9", "fixed": true})));
    }

    #[test]
    fn test_substitute_body_number_stays_textual() {
        // Substitution happens on the serialized body, so a token inside a
        // string field keeps its string type after re-parsing.
        let request = TaskRequest::put("/accounts/${param1}")
            .with_body(json!({"acctId": "${param1}"}))
            .param("${param1}", "acctId");
        let context = json!({"acctId": 42});

        let body = substitute_body(&request, Some(&context), false).unwrap();
        assert_eq!(body, Some(json!({"acctId": "42"})));
    }

    #[test]
    fn test_substitute_body_missing_field() {
        let request = TaskRequest::post("/rre")
            .with_body(json!({"rptrId": "${param1}"}))
            .param("${param1}", "rptrId");

        let err = substitute_body(&request, Some(&json!({})), false).unwrap_err();
        assert_eq!(err.to_string(), "`rptrId` not found");
    }
}
