//! Compiled request matcher for one definition.
//!
//! Compilation folds the query string embedded in the definition path into the
//! query matchers, drops inert KV rows and validates method, path and header
//! names up front so matching itself cannot fail.

use super::pattern::{TemplateKind, VarTemplate};
use super::types::RouteError;
use crate::definition::Definition;
use crate::request::{parse_query, MockRequest};
use hyper::header::HeaderName;
use hyper::Method;
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct HeaderMatcher {
    name: HeaderName,
    value: String,
}

#[derive(Debug, Clone)]
enum ValueMatcher {
    Literal(String),
    Template(VarTemplate),
}

#[derive(Debug, Clone)]
struct QueryMatcher {
    key: String,
    value: ValueMatcher,
}

impl QueryMatcher {
    fn compile(key: &str, value: &str) -> Result<Self, RouteError> {
        let template = VarTemplate::compile(value, TemplateKind::QueryValue)?;
        let value = if template.has_variables() {
            ValueMatcher::Template(template)
        } else {
            ValueMatcher::Literal(value.to_string())
        };
        Ok(Self {
            key: key.to_string(),
            value,
        })
    }

    /// Any value of a repeated key may satisfy the matcher.
    fn matches(&self, request: &MockRequest) -> bool {
        request
            .query_values(&self.key)
            .any(|actual| match &self.value {
                ValueMatcher::Literal(expected) => actual == expected,
                ValueMatcher::Template(template) => template.is_match(actual),
            })
    }
}

/// Predicate over method, path, headers and query derived from a [`Definition`].
#[derive(Debug, Clone)]
pub struct RouteMatcher {
    method: Method,
    path: VarTemplate,
    headers: Vec<HeaderMatcher>,
    queries: Vec<QueryMatcher>,
}

impl RouteMatcher {
    pub fn compile(definition: &Definition) -> Result<Self, RouteError> {
        let method = compile_method(&definition.method)?;

        let raw = definition
            .path
            .split_once('#')
            .map(|(p, _)| p)
            .unwrap_or(definition.path.as_str());
        let (raw_path, raw_query) = match raw.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (raw, None),
        };
        let decoded = urlencoding::decode(raw_path)
            .map_err(|_| RouteError::InvalidEncoding(raw_path.to_string()))?;
        let path = VarTemplate::compile(&decoded, TemplateKind::Path)?;

        let headers = definition
            .route_headers
            .pairs()
            .map(|(key, value)| {
                HeaderName::from_bytes(key.as_bytes())
                    .map(|name| HeaderMatcher {
                        name,
                        value: value.to_string(),
                    })
                    .map_err(|_| RouteError::InvalidHeader(key.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let embedded = parse_query(raw_query);
        let queries = embedded
            .iter()
            .filter(|(k, v)| !k.is_empty() && !v.is_empty())
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .chain(definition.route_params.pairs())
            .map(|(k, v)| QueryMatcher::compile(k, v))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            method,
            path,
            headers,
            queries,
        })
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path_template(&self) -> &str {
        self.path.source()
    }

    pub fn matches(&self, request: &MockRequest) -> bool {
        request
            .method()
            .as_str()
            .eq_ignore_ascii_case(self.method.as_str())
            && self.path.is_match(request.path())
            && self.headers.iter().all(|h| {
                request
                    .header_values(h.name.as_str())
                    .any(|v| v == h.value)
            })
            && self.queries.iter().all(|q| q.matches(request))
    }

    /// Whether `name` is a declared path or query variable.
    pub fn declares(&self, name: &str) -> bool {
        self.path.declares(name)
            || self.queries.iter().any(|q| match &q.value {
                ValueMatcher::Template(t) => t.declares(name),
                ValueMatcher::Literal(_) => false,
            })
    }

    /// Variables captured from the request path and query.
    ///
    /// Returns `None` when the path does not match. Query variables whose key is
    /// missing or whose value does not match are left out.
    pub fn variables(&self, request: &MockRequest) -> Option<HashMap<String, String>> {
        let mut vars: HashMap<String, String> =
            self.path.captures(request.path())?.into_iter().collect();
        for query in &self.queries {
            if let ValueMatcher::Template(template) = &query.value {
                if let Some(caps) = request
                    .query_values(&query.key)
                    .find_map(|v| template.captures(v))
                {
                    vars.extend(caps);
                }
            }
        }
        Some(vars)
    }

    /// Ordering key for ambiguous matches; larger is more specific.
    ///
    /// Literal path segments weigh first, then the number of header and query
    /// constraints.
    pub fn specificity(&self) -> (usize, usize) {
        (
            self.path.literal_segments(),
            self.headers.len() + self.queries.len(),
        )
    }
}

fn compile_method(method: &str) -> Result<Method, RouteError> {
    let upper = method.trim().to_ascii_uppercase();
    if upper.is_empty() {
        return Err(RouteError::InvalidMethod(method.to_string()));
    }
    Method::from_bytes(upper.as_bytes()).map_err(|_| RouteError::InvalidMethod(method.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::KvFields;
    use bytes::Bytes;
    use hyper::header::HeaderValue;
    use hyper::{HeaderMap, Uri};

    fn request(method: Method, uri: &str, headers: &[(&str, &str)]) -> MockRequest {
        let mut map = HeaderMap::new();
        for (k, v) in headers {
            map.append(
                HeaderName::from_bytes(k.as_bytes()).unwrap(),
                HeaderValue::from_str(v).unwrap(),
            );
        }
        let uri: Uri = uri.parse().unwrap();
        MockRequest::new(method, &uri, map, Bytes::new())
    }

    #[test]
    fn test_method_is_case_insensitive() {
        let matcher = RouteMatcher::compile(&Definition::new("a", "get", "/x")).unwrap();
        assert_eq!(matcher.method(), &Method::GET);
        assert!(matcher.matches(&request(Method::GET, "/x", &[])));
        assert!(!matcher.matches(&request(Method::POST, "/x", &[])));
    }

    #[test]
    fn test_invalid_method() {
        assert_eq!(
            RouteMatcher::compile(&Definition::new("a", "", "/x")).unwrap_err(),
            RouteError::InvalidMethod(String::new())
        );
        assert!(matches!(
            RouteMatcher::compile(&Definition::new("a", "GE T", "/x")),
            Err(RouteError::InvalidMethod(_))
        ));
    }

    #[test]
    fn test_embedded_query_is_folded_into_matchers() {
        let matcher =
            RouteMatcher::compile(&Definition::new("a", "GET", "/search?kind=book&flag"))
                .unwrap();
        assert_eq!(matcher.path_template(), "/search");
        assert!(matcher.matches(&request(Method::GET, "/search?kind=book", &[])));
        assert!(matcher.matches(&request(Method::GET, "/search?x=1&kind=book", &[])));
        assert!(!matcher.matches(&request(Method::GET, "/search?kind=film", &[])));
        assert!(!matcher.matches(&request(Method::GET, "/search", &[])));
    }

    #[test]
    fn test_repeated_query_key_matches_any_value() {
        let matcher =
            RouteMatcher::compile(&Definition::new("a", "GET", "/search?kind=book")).unwrap();
        assert!(matcher.matches(&request(Method::GET, "/search?kind=film&kind=book", &[])));
        assert!(!matcher.matches(&request(Method::GET, "/search?kind=film&kind=tv", &[])));

        let mut def = Definition::new("b", "GET", "/items");
        def.route_params = [("page", "{page:[0-9]+}")].into_iter().collect::<KvFields>();
        let matcher = RouteMatcher::compile(&def).unwrap();
        let req = request(Method::GET, "/items?page=x&page=7", &[]);
        assert!(matcher.matches(&req));
        assert_eq!(matcher.variables(&req).unwrap()["page"], "7");
    }

    #[test]
    fn test_route_params_and_query_variables() {
        let mut def = Definition::new("a", "GET", "/items");
        def.route_params = [("page", "{page:[0-9]+}"), ("", "ignored"), ("empty", "")]
            .into_iter()
            .collect::<KvFields>();
        let matcher = RouteMatcher::compile(&def).unwrap();
        let req = request(Method::GET, "/items?page=3", &[]);
        assert!(matcher.matches(&req));
        assert!(!matcher.matches(&request(Method::GET, "/items?page=x", &[])));
        assert!(matcher.declares("page"));
        assert_eq!(matcher.variables(&req).unwrap()["page"], "3");
    }

    #[test]
    fn test_header_matchers() {
        let mut def = Definition::new("a", "GET", "/h");
        def.route_headers = [("X-Env", "test"), ("X-Ignored", "")]
            .into_iter()
            .collect::<KvFields>();
        let matcher = RouteMatcher::compile(&def).unwrap();
        assert!(matcher.matches(&request(Method::GET, "/h", &[("x-env", "test")])));
        assert!(matcher.matches(&request(
            Method::GET,
            "/h",
            &[("x-env", "prod"), ("x-env", "test")]
        )));
        assert!(!matcher.matches(&request(Method::GET, "/h", &[("x-env", "TEST")])));
        assert!(!matcher.matches(&request(Method::GET, "/h", &[])));
    }

    #[test]
    fn test_invalid_header_name() {
        let mut def = Definition::new("a", "GET", "/h");
        def.route_headers = [("bad header", "v")].into_iter().collect::<KvFields>();
        assert_eq!(
            RouteMatcher::compile(&def).unwrap_err(),
            RouteError::InvalidHeader("bad header".to_string())
        );
    }

    #[test]
    fn test_variables_none_when_path_differs() {
        let matcher = RouteMatcher::compile(&Definition::new("a", "GET", "/echo/{name}")).unwrap();
        assert!(matcher
            .variables(&request(Method::GET, "/other/world", &[]))
            .is_none());
        assert_eq!(
            matcher.variables(&request(Method::GET, "/echo/world", &[])).unwrap()["name"],
            "world"
        );
    }

    #[test]
    fn test_specificity() {
        let plain = RouteMatcher::compile(&Definition::new("a", "GET", "/users/{id}")).unwrap();
        let literal = RouteMatcher::compile(&Definition::new("b", "GET", "/users/me")).unwrap();
        let mut def = Definition::new("c", "GET", "/users/{id}?v=1");
        def.route_headers = [("X-A", "1")].into_iter().collect::<KvFields>();
        let constrained = RouteMatcher::compile(&def).unwrap();
        assert_eq!(plain.specificity(), (1, 0));
        assert_eq!(literal.specificity(), (2, 0));
        assert_eq!(constrained.specificity(), (1, 2));
    }
}
