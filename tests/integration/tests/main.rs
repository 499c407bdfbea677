//! End-to-End Integration Tests
//!
//! These tests run the protocol crates together: a connector engine talks to
//! a proxy service node served on an ephemeral port, metadata is published
//! through a mock HTTP server and light messages go through the shared
//! correlation cache.

mod common;
mod engine_flow;
mod light_flow;
mod metadata_flow;
mod node_flow;
