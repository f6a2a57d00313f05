//! Error types for the greeter service.
//!
//! This module defines the central `Error` enum, which captures every way a
//! single call can end in failure. Failures are always local to the call that
//! raised them. It implements `From<Error>` for `tonic::Status` so a failed
//! call can be surfaced to its client with an appropriate status code.
//!
//! ## Error Cases
//! - `ChannelError`: The response channel to the transport is closed, usually
//!   because the client went away.
//! - `RequestCancelled`: The call's task was interrupted while suspended.
//! - `Transport`: The inbound request stream reported an error.
//! - `ServiceShutdown`: A call arrived while the service was shutting down.

use tonic::Status;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the greeter service.
#[derive(Clone, thiserror::Error, Debug)]
pub enum Error {
    /// Internal channel send/receive failure (e.g., closed channel).
    #[error("Channel error: {context}")]
    ChannelError { context: String },

    /// The call was cancelled while it was suspended.
    #[error("Request cancelled")]
    RequestCancelled,

    /// The inbound stream failed (malformed message, connection drop).
    #[error("Transport error: {}", .0.message())]
    Transport(Status),

    /// The service is in the process of shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,
}

impl From<Status> for Error {
    fn from(status: Status) -> Self {
        Self::Transport(status)
    }
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::ChannelError { context } => {
                Status::internal(format!("Channel error: {}", context))
            }
            Error::RequestCancelled => Status::cancelled("Request was cancelled"),
            Error::Transport(status) => status,
            Error::ServiceShutdown => Status::unavailable("Service is shutting down"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn maps_errors_to_status_codes() {
        let cases = [
            (
                Error::ChannelError {
                    context: "closed".to_string(),
                },
                Code::Internal,
            ),
            (Error::RequestCancelled, Code::Cancelled),
            (Error::ServiceShutdown, Code::Unavailable),
            (
                Error::Transport(Status::data_loss("truncated frame")),
                Code::DataLoss,
            ),
        ];

        for (err, code) in cases {
            assert_eq!(Status::from(err).code(), code);
        }
    }

    #[test]
    fn transport_status_is_passed_through() {
        let err = Error::from(Status::invalid_argument("bad frame"));
        assert_eq!(err.to_string(), "Transport error: bad frame");
        let status = Status::from(err);
        assert_eq!(status.message(), "bad frame");
    }
}
