//! Functions callable from response templates.
//!
//! The set is closed: every name resolves through a lookup table built once to
//! a [`Function`] variant, and every variant shares the same contract of
//! `(scope, args) -> Result<String, FunctionError>`.
//!
//! | name | args | result |
//! |---|---|---|
//! | `header` | name | request header value |
//! | `path` | name | path/query variable, re-matched against the live route |
//! | `param` | name | URL query value |
//! | `form` | name | form body value, then URL query value |
//! | `json` | path | value at a JSON path in the request body |
//! | `rand` | min, max | inclusive random integer |
//! | `uuid` | | v4 UUID |
//! | `encode` | method, text | `base64` or `hex` encoding |

mod encode;
mod request;
mod util;

use crate::definition::Definition;
use crate::expression::FunctionTable;
use crate::request::MockRequest;
use crate::route::RouteTable;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Errors raised by template functions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FunctionError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid arguments: {0}")]
    Args(String),
    #[error("unknown function {0:?}")]
    Unknown(String),
    #[error("{name} expects {expected} argument(s), got {actual}")]
    Arity {
        name: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Everything a function may read while a response is synthesized.
pub struct RequestScope<'a> {
    pub request: &'a MockRequest,
    /// The definition that matched at routing time
    pub definition: &'a Definition,
    /// Live table, consulted by `path` on every call
    pub routes: &'a RouteTable,
}

impl<'a> RequestScope<'a> {
    pub fn new(request: &'a MockRequest, definition: &'a Definition, routes: &'a RouteTable) -> Self {
        Self {
            request,
            definition,
            routes,
        }
    }
}

impl FunctionTable for RequestScope<'_> {
    fn call(&self, name: &str, args: &[String]) -> Result<String, FunctionError> {
        let function = lookup(name).ok_or_else(|| FunctionError::Unknown(name.to_string()))?;
        function.call(self, args)
    }
}

/// The closed set of template functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    Header,
    Path,
    Param,
    Form,
    Json,
    Rand,
    Uuid,
    Encode,
}

impl Function {
    pub const ALL: [Function; 8] = [
        Function::Header,
        Function::Path,
        Function::Param,
        Function::Form,
        Function::Json,
        Function::Rand,
        Function::Uuid,
        Function::Encode,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Function::Header => "header",
            Function::Path => "path",
            Function::Param => "param",
            Function::Form => "form",
            Function::Json => "json",
            Function::Rand => "rand",
            Function::Uuid => "uuid",
            Function::Encode => "encode",
        }
    }

    pub fn arity(self) -> usize {
        match self {
            Function::Uuid => 0,
            Function::Header | Function::Path | Function::Param | Function::Form | Function::Json => 1,
            Function::Rand | Function::Encode => 2,
        }
    }

    pub fn call(self, scope: &RequestScope<'_>, args: &[String]) -> Result<String, FunctionError> {
        if args.len() != self.arity() {
            return Err(FunctionError::Arity {
                name: self.name(),
                expected: self.arity(),
                actual: args.len(),
            });
        }
        match self {
            Function::Header => Ok(request::header(scope, &args[0])),
            Function::Path => request::path(scope, &args[0]),
            Function::Param => Ok(request::param(scope, &args[0])),
            Function::Form => Ok(request::form(scope, &args[0])),
            Function::Json => request::json(scope, &args[0]),
            Function::Rand => util::rand(&args[0], &args[1]),
            Function::Uuid => Ok(util::uuid()),
            Function::Encode => encode::encode(&args[0], &args[1]),
        }
    }
}

static REGISTRY: OnceLock<HashMap<&'static str, Function>> = OnceLock::new();

/// Resolve a template function by name.
pub fn lookup(name: &str) -> Option<Function> {
    REGISTRY
        .get_or_init(|| Function::ALL.iter().map(|f| (f.name(), *f)).collect())
        .get(name)
        .copied()
}
