//! Types shared by the greeter server and its clients.
//!
//! - [`catalog`] - The ordered locale to greeting catalog and its resolver.
//! - [`error`] - Service error type and its mapping to [`tonic::Status`].
//! - [`types`] - Call shapes and other small shared types.
//! - [`proto`] - Generated protobuf messages, client and server bindings.

pub mod catalog;
pub mod error;
pub mod types;

pub use error::{Error, Result};

/// gRPC service and message definitions generated from
/// `proto/greeting.proto`.
///
/// ## Service
///
/// - `SayHello` - one request, one response.
/// - `SayHelloServerStream` - one request, one response per catalog entry.
/// - `SayHelloClientStream` - a request stream, one summary response.
/// - `SayHelloBidirectional` - a request stream, one response per request.
///
/// ## Messages
///
/// - [`HelloRequest`](proto::HelloRequest) - a name and an optional locale.
/// - [`HelloResponse`](proto::HelloResponse) - the greeting, an RFC 3339
///   timestamp and the descriptor of the task that produced it.
pub mod proto {
    tonic::include_proto!("greeting");

    /// Encoded `FileDescriptorSet` for registering the schema with gRPC
    /// reflection.
    pub const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("greeting_descriptor");
}
