//! Server-side components of the greeter service.
//!
//! ## Submodules
//!
//! - [`config`] - CLI and environment configuration.
//! - [`executor`] - One task per call, in-flight tracking and shutdown.
//! - [`health`] - Plain HTTP liveness endpoint.
//! - [`service`] - The tonic service implementation.
//! - [`streaming`] - Shape classification and the per-shape protocols.
//! - [`telemetry`] - Logging, tracing and metrics initialization.
//!
//! These components are wired together in the server's `main.rs`.

pub mod config;
pub mod executor;
pub mod health;
pub mod service;
pub mod streaming;
pub mod telemetry;
