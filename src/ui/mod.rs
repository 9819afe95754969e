//! HTTP control API
//!
//! Fire-and-forget launches plus the status and name lookups a station
//! page polls.

pub mod handlers;
pub mod server;

pub use server::{AppState, WebServer};
