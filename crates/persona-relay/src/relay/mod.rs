mod cors;
mod server;
mod service;
mod types;

pub use cors::{ALLOW_HEADERS, ALLOW_METHODS, apply_cors, insert_cors_headers};
pub use server::{AppState, RelayServer, create_router};
pub use service::{Relay, describe_status};
pub use types::{AskRequest, RelayResponse, ReplyEnvelope};
