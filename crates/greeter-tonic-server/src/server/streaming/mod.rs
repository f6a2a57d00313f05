//! Call dispatch: classifies a call, drives its protocol to a terminal state.
//!
//! - [`coordinator`] - `Call`, `CallContext` and the `drive` loop that turns a
//!   call into a `CallReport`.
//! - [`processor`] - One protocol driver per call shape.
//! - [`request`] - Inbound stream events.
//! - [`response`] - Response builders.
//! - [`session`] - Per-call accumulator for client streaming.

pub mod coordinator;
pub mod processor;
pub mod request;
pub mod response;
pub mod session;
