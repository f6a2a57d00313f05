//! # Call Shapes
//!
//! Every RPC exposed by the greeter belongs to one of four streaming
//! cardinalities. The shape decides which protocol state machine the server
//! drives for a call and is attached to every log line and metric emitted for
//! it.
//!
//! | Shape | RPC | Requests | Responses |
//! |-------|-----|----------|-----------|
//! | [`CallShape::Unary`] | `SayHello` | 1 | 1 |
//! | [`CallShape::ServerStream`] | `SayHelloServerStream` | 1 | catalog size |
//! | [`CallShape::ClientStream`] | `SayHelloClientStream` | N | 1 |
//! | [`CallShape::Bidirectional`] | `SayHelloBidirectional` | N | N |

use core::fmt;

/// Fully qualified name of the greeter gRPC service.
pub const SERVICE_NAME: &str = "greeting.GreetingService";

/// Streaming cardinality of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallShape {
    /// Single request, single response.
    Unary,
    /// Single request, streamed responses.
    ServerStream,
    /// Streamed requests, single response.
    ClientStream,
    /// Streamed requests, streamed responses.
    Bidirectional,
}

impl CallShape {
    pub const ALL: [Self; 4] = [
        Self::Unary,
        Self::ServerStream,
        Self::ClientStream,
        Self::Bidirectional,
    ];

    /// Short label used in logs and as the `shape` metric attribute.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unary => "unary",
            Self::ServerStream => "server_stream",
            Self::ClientStream => "client_stream",
            Self::Bidirectional => "bidi_stream",
        }
    }

    /// Name of the RPC method that carries this shape.
    pub const fn method(self) -> &'static str {
        match self {
            Self::Unary => "SayHello",
            Self::ServerStream => "SayHelloServerStream",
            Self::ClientStream => "SayHelloClientStream",
            Self::Bidirectional => "SayHelloBidirectional",
        }
    }

    /// gRPC path of the method, e.g. `/greeting.GreetingService/SayHello`.
    pub fn path(self) -> String {
        format!("/{SERVICE_NAME}/{}", self.method())
    }
}

impl fmt::Display for CallShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_name_the_service_method() {
        assert_eq!(
            CallShape::Unary.path(),
            "/greeting.GreetingService/SayHello"
        );
        assert_eq!(
            CallShape::Bidirectional.path(),
            "/greeting.GreetingService/SayHelloBidirectional"
        );
    }

    #[test]
    fn labels_are_distinct() {
        let labels: std::collections::HashSet<_> =
            CallShape::ALL.iter().map(|s| s.as_str()).collect();
        assert_eq!(labels.len(), CallShape::ALL.len());
    }
}
