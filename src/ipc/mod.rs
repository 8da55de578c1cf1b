mod error;
mod handlers;
mod payload;
mod router;
mod types;

pub use router::handle_request;
pub use types::{AppState, Request};
