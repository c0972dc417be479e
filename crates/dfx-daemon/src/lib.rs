//! dfx-daemon library target.
//!
//! Exposes the router, middleware and state for integration tests.
//! The binary `main.rs` depends on this library target.

pub mod api_types;
pub mod binder;
pub mod body;
pub mod gate;
pub mod routes;
pub mod state;
pub mod webhook;
