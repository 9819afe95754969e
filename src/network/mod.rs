//! Network subsystem for live source streaming

pub mod icecast;
pub mod pacing;
pub mod streamer;

pub use icecast::{source_request, SourceCredentials};
pub use pacing::{Clock, ManualClock, RateLimiter, TokioClock};
pub use streamer::{Delivery, StreamConnection, Streamer};
