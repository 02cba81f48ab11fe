//! Route table: definition id → compiled matcher.
//!
//! ## Module Structure
//!
//! - `types`: error types
//! - `pattern`: `{var}` template compilation for paths and query values
//! - `matcher`: compiled matcher for a single definition
//! - `table`: the concurrent table and its tie-break order

mod matcher;
mod pattern;
mod table;
mod types;


pub use matcher::RouteMatcher;
pub use pattern::{TemplateKind, VarTemplate};
pub use table::{RouteEntry, RouteTable};
pub use types::RouteError;
