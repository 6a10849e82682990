//! HTTP admission service.
//!
//! Callers post to `/v1/check/{operation}` before running a guarded
//! operation and stop on a `429` response.

mod server;
mod service;

pub use server::{serve_listener, HttpServer};
pub use service::{check_handler, client_from_headers, health_handler, router, AppState};
