//! Response templating.
//!
//! Header values and raw bodies may embed `{{func "arg" ...}}` actions that are
//! evaluated against the incoming request. Evaluation is fail-open: any parse or
//! execution error leaves the template text unchanged.
//!
//! # Example
//!
//! ```text
//! {"user": "{{path "id"}}", "trace": "{{header "X-Trace" | encode "hex"}}"}
//! ```
//!
//! Templates without `{{` are returned as-is without parsing.

mod parser;

use crate::functions::FunctionError;
use parser::{Command, Node, Operand, Pipeline};
use std::collections::BTreeMap;

/// Resolves function names used in templates.
pub trait FunctionTable {
    fn call(&self, name: &str, args: &[String]) -> Result<String, FunctionError>;
}

/// Per-request values shared by every template of one response.
///
/// `{{$x := ...}}` stores into it, `{{$x}}` and `{{.x}}` read from it, and
/// `{{.}}` renders the whole map as JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings(BTreeMap<String, String>);

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExpressionError {
    #[error("parse error at byte {offset}: {message}")]
    Parse { offset: usize, message: String },
    #[error("error calling {name}: {source}")]
    Function {
        name: String,
        #[source]
        source: FunctionError,
    },
    #[error("undefined variable ${0}")]
    UndefinedVariable(String),
    #[error("can't give argument to non-function {0}")]
    NotAFunction(String),
}

/// A parsed template.
#[derive(Debug, Clone)]
pub struct Template {
    nodes: Vec<Node>,
}

impl Template {
    pub fn parse(src: &str) -> Result<Self, ExpressionError> {
        Ok(Self {
            nodes: parser::parse(src)?,
        })
    }

    /// Execute all actions; the first error aborts the whole template.
    pub fn execute(
        &self,
        bindings: &mut Bindings,
        functions: &dyn FunctionTable,
    ) -> Result<String, ExpressionError> {
        let mut out = String::new();
        for node in &self.nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Action(pipeline) => {
                    out.push_str(&run_pipeline(pipeline, bindings, functions)?);
                }
                Node::Assign { name, pipeline } => {
                    let value = run_pipeline(pipeline, bindings, functions)?;
                    bindings.insert(name.clone(), value);
                }
            }
        }
        Ok(out)
    }
}

/// Parse and execute `template`, surfacing the first error.
pub fn try_render(
    template: &str,
    bindings: &mut Bindings,
    functions: &dyn FunctionTable,
) -> Result<String, ExpressionError> {
    if !template.contains("{{") {
        return Ok(template.to_string());
    }
    Template::parse(template)?.execute(bindings, functions)
}

/// Parse and execute `template`; on any error the original text is returned.
pub fn render(template: &str, bindings: &mut Bindings, functions: &dyn FunctionTable) -> String {
    match try_render(template, bindings, functions) {
        Ok(rendered) => rendered,
        Err(e) => {
            tracing::debug!(error = %e, "Template left unrendered");
            template.to_string()
        }
    }
}

fn run_pipeline(
    pipeline: &Pipeline,
    bindings: &Bindings,
    functions: &dyn FunctionTable,
) -> Result<String, ExpressionError> {
    let mut previous: Option<String> = None;
    for command in &pipeline.0 {
        let value = match command {
            Command::Call { name, args } => {
                let mut values = Vec::with_capacity(args.len() + 1);
                for arg in args {
                    values.push(operand(arg, bindings, functions)?);
                }
                values.extend(previous.take());
                call(name, &values, functions)?
            }
            Command::Value(value) => {
                if previous.is_some() {
                    return Err(ExpressionError::NotAFunction(format!("{value:?}")));
                }
                operand(value, bindings, functions)?
            }
        };
        previous = Some(value);
    }
    Ok(previous.unwrap_or_default())
}

fn operand(
    operand: &Operand,
    bindings: &Bindings,
    functions: &dyn FunctionTable,
) -> Result<String, ExpressionError> {
    match operand {
        Operand::Str(s) | Operand::Number(s) => Ok(s.clone()),
        Operand::Dot if bindings.is_empty() => Ok(String::new()),
        Operand::Dot => Ok(serde_json::to_string(&bindings.0).unwrap_or_default()),
        Operand::Field(name) => Ok(bindings.get(name).unwrap_or_default().to_string()),
        Operand::Var(name) => bindings
            .get(name)
            .map(str::to_string)
            .ok_or_else(|| ExpressionError::UndefinedVariable(name.clone())),
        Operand::Ident(name) => call(name, &[], functions),
        Operand::Sub(pipeline) => run_pipeline(pipeline, bindings, functions),
    }
}

fn call(
    name: &str,
    args: &[String],
    functions: &dyn FunctionTable,
) -> Result<String, ExpressionError> {
    functions
        .call(name, args)
        .map_err(|source| ExpressionError::Function {
            name: name.to_string(),
            source,
        })
}
