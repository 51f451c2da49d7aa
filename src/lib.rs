//! Assistant Core: coordination runtime for voice-assistant clients
//!
//! Routes server directives to capability handlers with per-medium blocking, aggregates
//! capability context for outgoing events under a latency bound, and arbitrates
//! exclusive focus channels between capabilities.

pub mod capability;
pub mod config;
pub mod context;
pub mod directive;
pub mod error;
pub mod event;
pub mod focus;
pub mod logging;
pub mod runtime;
pub mod tooling;
pub mod types;
pub mod upstream;

pub use error::CoreError;
pub use runtime::CoreRuntime;
