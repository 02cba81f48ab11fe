//! Request accessors: `header`, `path`, `param`, `form`, `json`.

use super::{FunctionError, RequestScope};
use crate::route::RouteMatcher;
use serde_json::Value;
use serde_json_path::JsonPath;

pub(super) fn header(scope: &RequestScope<'_>, name: &str) -> String {
    scope.request.header(name).unwrap_or_default().to_string()
}

pub(super) fn param(scope: &RequestScope<'_>, name: &str) -> String {
    scope.request.query_value(name).unwrap_or_default().to_string()
}

pub(super) fn form(scope: &RequestScope<'_>, name: &str) -> String {
    scope.request.form_value(name).unwrap_or_default().to_string()
}

/// Variable from the definition's current pattern, re-matched on every call.
///
/// The table entry may have been rebuilt since routing; when the entry is gone
/// the definition that matched is compiled on the spot.
pub(super) fn path(scope: &RequestScope<'_>, name: &str) -> Result<String, FunctionError> {
    let entry = scope.routes.entry(&scope.definition.id);
    let compiled;
    let matcher = match &entry {
        Some(entry) => entry.matcher(),
        None => {
            compiled = RouteMatcher::compile(scope.definition)
                .map_err(|e| FunctionError::NotFound(e.to_string()))?;
            &compiled
        }
    };

    if !matcher.declares(name) {
        return Err(FunctionError::NotFound(format!(
            "path variable {name:?} is not declared"
        )));
    }
    matcher
        .variables(scope.request)
        .and_then(|mut vars| vars.remove(name))
        .ok_or_else(|| {
            FunctionError::NotFound(format!("path variable {name:?} does not match the request"))
        })
}

/// Value at `path` in the JSON request body; empty when absent.
///
/// Paths starting with `$` are JSONPath; anything else is a dotted path.
pub(super) fn json(scope: &RequestScope<'_>, path: &str) -> Result<String, FunctionError> {
    let Some(body) = scope.request.json() else {
        return Ok(String::new());
    };
    select(body, path).map(|v| v.map(|v| render(&v)).unwrap_or_default())
}

pub(crate) fn select(body: &Value, path: &str) -> Result<Option<Value>, FunctionError> {
    if path.starts_with('$') {
        let json_path =
            JsonPath::parse(path).map_err(|e| FunctionError::Args(format!("{path}: {e}")))?;
        return Ok(json_path.query(body).first().cloned());
    }
    let segments = split_dotted(path);
    Ok(walk(body, &segments))
}

/// Split on unescaped dots; `\.` is a literal dot.
fn split_dotted(path: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            '.' => segments.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    segments.push(current);
    segments.retain(|s| !s.is_empty());
    segments
}

fn walk(value: &Value, segments: &[String]) -> Option<Value> {
    let Some((segment, rest)) = segments.split_first() else {
        return Some(value.clone());
    };
    match value {
        Value::Object(map) => walk(map.get(segment)?, rest),
        // `#` alone is the length; `#.rest` maps the rest over every element.
        Value::Array(items) if segment == "#" => {
            if rest.is_empty() {
                Some(Value::from(items.len()))
            } else {
                Some(Value::Array(
                    items.iter().filter_map(|item| walk(item, rest)).collect(),
                ))
            }
        }
        Value::Array(items) => walk(items.get(segment.parse::<usize>().ok()?)?, rest),
        _ => None,
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(_) | Value::Number(_) => value.to_string(),
        Value::Array(_) | Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::Definition;
    use crate::request::MockRequest;
    use crate::route::RouteTable;
    use bytes::Bytes;
    use hyper::header::{HeaderValue, CONTENT_TYPE};
    use hyper::{HeaderMap, Method, Uri};
    use serde_json::json;

    fn post(uri: &str, content_type: &str, body: &str) -> MockRequest {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        headers.insert("x-request-id", HeaderValue::from_static("req-123"));
        let uri: Uri = uri.parse().unwrap();
        MockRequest::new(Method::POST, &uri, headers, Bytes::from(body.to_string()))
    }

    #[test]
    fn test_header_param_form() {
        let req = post(
            "/users/9?lang=en",
            "application/x-www-form-urlencoded",
            "name=Ada+Lovelace",
        );
        let def = Definition::new("d", "POST", "/users/{id}");
        let routes = RouteTable::new();
        let scope = RequestScope::new(&req, &def, &routes);

        assert_eq!(header(&scope, "X-Request-Id"), "req-123");
        assert_eq!(header(&scope, "x-missing"), "");
        assert_eq!(param(&scope, "lang"), "en");
        assert_eq!(param(&scope, "missing"), "");
        assert_eq!(form(&scope, "name"), "Ada Lovelace");
        assert_eq!(form(&scope, "lang"), "en");
        assert_eq!(form(&scope, "missing"), "");
    }

    #[test]
    fn test_path_uses_live_entry() {
        let req = post("/users/9", "text/plain", "");
        let def = Definition::new("d", "POST", "/users/{id}");
        let routes = RouteTable::new();
        routes.rebuild(def.clone()).unwrap();
        let scope = RequestScope::new(&req, &def, &routes);
        assert_eq!(path(&scope, "id").unwrap(), "9");
        assert!(matches!(path(&scope, "name"), Err(FunctionError::NotFound(_))));

        // Pattern changes after routing; the variable is re-derived.
        routes
            .rebuild(Definition::new("d", "POST", "/users/{user}"))
            .unwrap();
        assert_eq!(path(&scope, "user").unwrap(), "9");
        assert!(matches!(path(&scope, "id"), Err(FunctionError::NotFound(_))));

        // Pattern no longer matches the request.
        routes
            .rebuild(Definition::new("d", "POST", "/accounts/{user}"))
            .unwrap();
        assert!(matches!(path(&scope, "user"), Err(FunctionError::NotFound(_))));
    }

    #[test]
    fn test_path_falls_back_to_matched_definition() {
        let req = post("/users/9", "text/plain", "");
        let def = Definition::new("gone", "POST", "/users/{id}");
        let routes = RouteTable::new();
        let scope = RequestScope::new(&req, &def, &routes);
        assert_eq!(path(&scope, "id").unwrap(), "9");
    }

    #[test]
    fn test_json_dotted_paths() {
        let body = json!({
            "name": {"first": "Ada", "last": "Lovelace"},
            "age": 36,
            "active": true,
            "nothing": null,
            "tags": ["a", "b"],
            "friends": [{"first": "Charles"}, {"first": "Mary"}],
            "dotted.key": "x"
        });
        let get = |p: &str| select(&body, p).unwrap().map(|v| render(&v));
        assert_eq!(get("name.first").as_deref(), Some("Ada"));
        assert_eq!(get("age").as_deref(), Some("36"));
        assert_eq!(get("active").as_deref(), Some("true"));
        assert_eq!(get("nothing").as_deref(), Some(""));
        assert_eq!(get("tags.1").as_deref(), Some("b"));
        assert_eq!(get("tags.#").as_deref(), Some("2"));
        assert_eq!(
            get("friends.#.first").as_deref(),
            Some(r#"["Charles","Mary"]"#)
        );
        assert_eq!(get("name").as_deref(), Some(r#"{"first":"Ada","last":"Lovelace"}"#));
        assert_eq!(get(r"dotted\.key").as_deref(), Some("x"));
        assert_eq!(get("name.middle"), None);
        assert_eq!(get("tags.9"), None);
    }

    #[test]
    fn test_json_jsonpath() {
        let body = json!({"items": [{"id": 1}, {"id": 2}]});
        assert_eq!(select(&body, "$.items[1].id").unwrap(), Some(json!(2)));
        assert_eq!(select(&body, "$.missing").unwrap(), None);
        assert!(matches!(select(&body, "$[").unwrap_err(), FunctionError::Args(_)));
    }

    #[test]
    fn test_json_function_on_request() {
        let req = post("/", "application/json", r#"{"user": {"id": "u-1"}}"#);
        let def = Definition::new("d", "POST", "/");
        let routes = RouteTable::new();
        let scope = RequestScope::new(&req, &def, &routes);
        assert_eq!(json(&scope, "user.id").unwrap(), "u-1");
        assert_eq!(json(&scope, "user.name").unwrap(), "");

        let not_json = post("/", "text/plain", "hello");
        let scope = RequestScope::new(&not_json, &def, &routes);
        assert_eq!(json(&scope, "user.id").unwrap(), "");
    }
}
