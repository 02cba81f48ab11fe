//! Route table error types.

/// Structural problems found while compiling a definition into a matcher.
///
/// A rebuild that fails with one of these leaves the previous entry in place.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("invalid method {0:?}")]
    InvalidMethod(String),
    #[error("path must start with a slash, got {0:?}")]
    MissingLeadingSlash(String),
    #[error("unbalanced braces in {0:?}")]
    UnbalancedBraces(String),
    #[error("missing name or pattern in {0:?}")]
    MissingVariableName(String),
    #[error("duplicated variable {name:?} in {template:?}")]
    DuplicateVariable { name: String, template: String },
    #[error("invalid pattern in {template:?}: {message}")]
    InvalidPattern { template: String, message: String },
    #[error("path is not valid UTF-8 after decoding: {0:?}")]
    InvalidEncoding(String),
    #[error("invalid header name {0:?}")]
    InvalidHeader(String),
}
