//! Variable templates for paths and query values.
//!
//! A template is literal text with `{name}` or `{name:regex}` placeholders.
//! Compilation turns it into one anchored regex with a named group per
//! variable, so user patterns may carry their own groups without shifting
//! variable positions.

use super::types::RouteError;
use regex::Regex;
use std::fmt::Write;
use std::sync::Arc;

/// Default variable pattern inside a path: one non-empty segment.
const PATH_VARIABLE: &str = "[^/]+";
/// Default variable pattern inside a query value: anything.
const QUERY_VARIABLE: &str = ".*";

/// Where a template is used; selects validation and the default variable pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    Path,
    QueryValue,
}

/// A compiled `{var}` template.
#[derive(Debug, Clone)]
pub struct VarTemplate {
    source: String,
    regex: Arc<Regex>,
    /// (variable name, regex group name)
    variables: Vec<(String, String)>,
    literal_segments: usize,
}

impl VarTemplate {
    pub fn compile(template: &str, kind: TemplateKind) -> Result<Self, RouteError> {
        if kind == TemplateKind::Path && !template.starts_with('/') {
            return Err(RouteError::MissingLeadingSlash(template.to_string()));
        }

        let default_pattern = match kind {
            TemplateKind::Path => PATH_VARIABLE,
            TemplateKind::QueryValue => QUERY_VARIABLE,
        };

        let mut pattern = String::from("^");
        let mut variables: Vec<(String, String)> = Vec::new();
        let mut end = 0;

        for (i, (start, stop)) in brace_spans(template)?.into_iter().enumerate() {
            pattern.push_str(&regex::escape(&template[end..start]));

            let inner = &template[start + 1..stop - 1];
            let (name, var_pattern) = match inner.split_once(':') {
                Some((name, p)) => (name.trim(), p),
                None => (inner.trim(), default_pattern),
            };
            if name.is_empty() || var_pattern.is_empty() {
                return Err(RouteError::MissingVariableName(template.to_string()));
            }
            if variables.iter().any(|(n, _)| n == name) {
                return Err(RouteError::DuplicateVariable {
                    name: name.to_string(),
                    template: template.to_string(),
                });
            }

            let group = format!("v{i}");
            let _ = write!(pattern, "(?P<{group}>{var_pattern})");
            variables.push((name.to_string(), group));
            end = stop;
        }
        pattern.push_str(&regex::escape(&template[end..]));
        pattern.push('$');

        let regex = Regex::new(&pattern).map_err(|e| RouteError::InvalidPattern {
            template: template.to_string(),
            message: e.to_string(),
        })?;

        let literal_segments = match kind {
            TemplateKind::Path => template
                .split('/')
                .filter(|s| !s.is_empty() && !s.contains('{'))
                .count(),
            TemplateKind::QueryValue => 0,
        };

        Ok(Self {
            source: template.to_string(),
            regex: Arc::new(regex),
            variables,
            literal_segments,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    pub fn has_variables(&self) -> bool {
        !self.variables.is_empty()
    }

    pub fn declares(&self, name: &str) -> bool {
        self.variables.iter().any(|(n, _)| n == name)
    }

    /// Number of path segments without placeholders.
    pub fn literal_segments(&self) -> usize {
        self.literal_segments
    }

    /// Captured variables, or `None` when `text` does not match.
    pub fn captures(&self, text: &str) -> Option<Vec<(String, String)>> {
        let caps = self.regex.captures(text)?;
        Some(
            self.variables
                .iter()
                .map(|(name, group)| {
                    let value = caps
                        .name(group)
                        .map(|m| m.as_str().to_string())
                        .unwrap_or_default();
                    (name.clone(), value)
                })
                .collect(),
        )
    }
}

/// Byte ranges of top-level `{...}` groups, including the braces.
fn brace_spans(template: &str) -> Result<Vec<(usize, usize)>, RouteError> {
    let mut level = 0usize;
    let mut start = 0;
    let mut spans = Vec::new();
    for (i, b) in template.bytes().enumerate() {
        match b {
            b'{' => {
                if level == 0 {
                    start = i;
                }
                level += 1;
            }
            b'}' => {
                if level == 0 {
                    return Err(RouteError::UnbalancedBraces(template.to_string()));
                }
                level -= 1;
                if level == 0 {
                    spans.push((start, i + 1));
                }
            }
            _ => {}
        }
    }
    if level != 0 {
        return Err(RouteError::UnbalancedBraces(template.to_string()));
    }
    Ok(spans)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(t: &str) -> VarTemplate {
        VarTemplate::compile(t, TemplateKind::Path).unwrap()
    }

    #[test]
    fn test_literal_path() {
        let t = path("/api/users");
        assert!(t.is_match("/api/users"));
        assert!(!t.is_match("/api/users/1"));
        assert!(!t.is_match("/api"));
        assert_eq!(t.literal_segments(), 2);
    }

    #[test]
    fn test_literal_path_escapes_regex_chars() {
        let t = path("/v1.0/items+");
        assert!(t.is_match("/v1.0/items+"));
        assert!(!t.is_match("/v1x0/items"));
    }

    #[test]
    fn test_default_variable_is_one_segment() {
        let t = path("/echo/{name}");
        assert_eq!(
            t.captures("/echo/world"),
            Some(vec![("name".to_string(), "world".to_string())])
        );
        assert!(t.captures("/echo/a/b").is_none());
        assert!(t.captures("/echo/").is_none());
    }

    #[test]
    fn test_variable_with_pattern() {
        let t = path("/users/{id:[0-9]+}/posts/{slug}");
        let caps = t.captures("/users/42/posts/hello").unwrap();
        assert_eq!(caps[0], ("id".to_string(), "42".to_string()));
        assert_eq!(caps[1], ("slug".to_string(), "hello".to_string()));
        assert!(!t.is_match("/users/abc/posts/hello"));
        assert_eq!(t.literal_segments(), 2);
    }

    #[test]
    fn test_variable_pattern_with_nested_braces_and_groups() {
        let t = path("/code/{code:[a-z]{2}(x|y)?}/{rest}");
        let caps = t.captures("/code/abx/tail").unwrap();
        assert_eq!(caps[0].1, "abx");
        assert_eq!(caps[1].1, "tail");
    }

    #[test]
    fn test_query_value_template() {
        let t = VarTemplate::compile("{page:[0-9]*}", TemplateKind::QueryValue).unwrap();
        assert!(t.is_match("12"));
        assert!(t.is_match(""));
        assert!(!t.is_match("x"));
    }

    #[test]
    fn test_structural_errors() {
        assert!(matches!(
            VarTemplate::compile("users", TemplateKind::Path),
            Err(RouteError::MissingLeadingSlash(_))
        ));
        assert!(matches!(
            VarTemplate::compile("/users/{id", TemplateKind::Path),
            Err(RouteError::UnbalancedBraces(_))
        ));
        assert!(matches!(
            VarTemplate::compile("/users/id}", TemplateKind::Path),
            Err(RouteError::UnbalancedBraces(_))
        ));
        assert!(matches!(
            VarTemplate::compile("/users/{}", TemplateKind::Path),
            Err(RouteError::MissingVariableName(_))
        ));
        assert!(matches!(
            VarTemplate::compile("/users/{id:}", TemplateKind::Path),
            Err(RouteError::MissingVariableName(_))
        ));
        assert!(matches!(
            VarTemplate::compile("/{id}/{id}", TemplateKind::Path),
            Err(RouteError::DuplicateVariable { .. })
        ));
        assert!(matches!(
            VarTemplate::compile("/{id:[}", TemplateKind::Path),
            Err(RouteError::InvalidPattern { .. })
        ));
    }
}
