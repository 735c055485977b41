//! HTTP front end of the signing server
//!
//! The server exposes the following endpoints:
//! - GET /sign - Submission form
//! - POST /sign - Sign a shortcut
//! - GET /health - Health check endpoint
//! - GET /metrics - Prometheus metrics (when enabled)

pub mod form;
pub mod handlers;
pub mod server;

pub use server::start_server;
