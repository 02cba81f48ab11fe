//! Workspace-scoped HTTP mock server.
//!
//! A workspace owns a [`store::DefinitionStore`], a [`route::RouteTable`]
//! compiled from it and a listener serving [`dispatch::Dispatcher`]. Mock
//! responses are synthesized from the matched [`definition::Definition`], with
//! header values and raw bodies rendered through [`expression`] templates.

pub mod config;
pub mod definition;
pub mod dispatch;
pub mod expression;
pub mod functions;
pub mod request;
pub mod route;
pub mod store;
pub mod workspace;

pub use config::{Config, WorkspaceConfig};
pub use definition::{Collection, Definition};
pub use dispatch::Dispatcher;
pub use route::RouteTable;
pub use workspace::{Workspace, WorkspaceError};
