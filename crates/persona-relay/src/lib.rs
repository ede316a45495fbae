//! Persona Relay - forwards chat messages to Gemini behind a persona prompt
//!
//! This crate provides an HTTP relay that frames a caller's message with a
//! system prompt chosen by a `context`/`mode` key, calls the upstream
//! text-generation API with bounded retries, and returns the reply in a
//! tagged `{ok, reply | error}` envelope.

pub mod config;
pub mod error;
pub mod persona;
pub mod relay;
pub mod testing;
pub mod upstream;

pub use error::{RelayError, TransportError};
