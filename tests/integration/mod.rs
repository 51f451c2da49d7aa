//! Integration tests for the assistant coordination runtime

mod context_latency;
mod end_to_end;
mod focus_properties;
