//! Request dispatch: route lookup, response synthesis and the accept loop.
//!
//! ## Module Structure
//!
//! - `handler`: [`Dispatcher`] and [`serve`]
//! - `synthesizer`: builds status, headers and body for a matched definition
//! - `response`: hyper response helpers

mod handler;
mod response;
mod synthesizer;


pub use handler::{serve, Dispatcher, NOT_FOUND_BODY};
pub use response::{build_response, build_response_with_headers, set_header};
pub use synthesizer::{resolve_status, synthesize, Synthesized, CONTENT_TYPE_OVERRIDE};
