//! Inbound transport events for streamed-request calls.
//!
//! The transport hands a call its request stream. Each poll of that stream is
//! classified into a [`CallEvent`] so the protocol drivers can match on the
//! event instead of on nested `Option<Result<_>>` values.

use futures::{Stream, StreamExt};
use greeter_tonic_core::proto::HelloRequest;
use tonic::Status;

/// One event observed on a call's inbound stream.
#[derive(Debug)]
pub enum CallEvent {
    /// The client sent a request.
    Message(HelloRequest),
    /// The client closed its side of the stream.
    Close,
    /// The transport failed (malformed message, connection drop).
    Error(Status),
}

/// Waits for the next event on `inbound`.
pub async fn next_event<S>(inbound: &mut S) -> CallEvent
where
    S: Stream<Item = Result<HelloRequest, Status>> + Unpin,
{
    match inbound.next().await {
        Some(Ok(request)) => CallEvent::Message(request),
        Some(Err(status)) => CallEvent::Error(status),
        None => CallEvent::Close,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn classifies_messages_errors_and_close() {
        let mut inbound = tokio_stream::iter(vec![
            Ok(HelloRequest {
                name: "A".to_string(),
                language: String::new(),
            }),
            Err(Status::data_loss("truncated")),
        ]);

        assert!(matches!(
            next_event(&mut inbound).await,
            CallEvent::Message(req) if req.name == "A"
        ));
        assert!(matches!(
            next_event(&mut inbound).await,
            CallEvent::Error(status) if status.code() == tonic::Code::DataLoss
        ));
        assert!(matches!(next_event(&mut inbound).await, CallEvent::Close));
    }
}
