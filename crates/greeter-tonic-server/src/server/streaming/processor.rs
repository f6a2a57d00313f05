//! Protocol drivers, one per call shape.
//!
//! Each driver runs on the call's own task and owns all per-call state. They
//! return as soon as a suspension, emission or inbound read fails; the
//! coordinator turns that into the call's failed state.
//!
//! | Shape | States |
//! |-------|--------|
//! | unary | `Started -> Completed` |
//! | server stream | `Started -> Emitting(k) -> Completed`, `k` over the catalog |
//! | client stream | `Collecting -> Completed` |
//! | bidirectional | `Active -> Completed` |

use super::{coordinator::CallContext, request::CallEvent, response, session::CallSession};
use futures::Stream;
use greeter_tonic_core::{catalog, proto::HelloRequest};
use tonic::Status;

/// One request, one greeting.
pub async fn unary(
    ctx: &mut CallContext,
    request: HelloRequest,
) -> greeter_tonic_core::Result<()> {
    #[cfg(feature = "tracing")]
    tracing::debug!("[{}] Request for: {}", ctx.shape(), request.name);

    ctx.suspend().await?;
    ctx.emit(response::build(&request.name, &request.language))
        .await
}

/// One request, one greeting per catalog entry in catalog order.
///
/// The request's own locale is ignored: every locale is greeted.
pub async fn server_stream(
    ctx: &mut CallContext,
    request: HelloRequest,
) -> greeter_tonic_core::Result<()> {
    for entry in catalog::entries() {
        ctx.suspend().await?;
        ctx.emit(response::build_catalog_entry(&request.name, entry))
            .await?;
    }

    #[cfg(feature = "tracing")]
    tracing::debug!("[{}] Sent {} greetings", ctx.shape(), catalog::len());
    Ok(())
}

/// Collects every inbound name, then answers once with a summary.
///
/// A stream closed without any message still gets its summary, reporting
/// zero names.
pub async fn client_stream<S>(
    ctx: &mut CallContext,
    inbound: &mut S,
) -> greeter_tonic_core::Result<()>
where
    S: Stream<Item = Result<HelloRequest, Status>> + Unpin,
{
    let mut session = CallSession::new();

    loop {
        match ctx.next_event(inbound).await? {
            CallEvent::Message(request) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("[{}] Received: {}", ctx.shape(), request.name);
                session.record(request);
                ctx.suspend().await?;
            }
            CallEvent::Close => break,
            CallEvent::Error(status) => return Err(status.into()),
        }
    }

    #[cfg(feature = "tracing")]
    tracing::debug!("[{}] Received {} names", ctx.shape(), session.len());
    ctx.emit(response::build_summary(session.names())).await
}

/// Answers each inbound request before reading the next one.
///
/// Closing the inbound stream completes the call without a final response.
pub async fn bidirectional<S>(
    ctx: &mut CallContext,
    inbound: &mut S,
) -> greeter_tonic_core::Result<()>
where
    S: Stream<Item = Result<HelloRequest, Status>> + Unpin,
{
    let mut processed = 0_usize;

    loop {
        match ctx.next_event(inbound).await? {
            CallEvent::Message(request) => {
                processed += 1;
                #[cfg(feature = "tracing")]
                tracing::debug!("[{}] Received #{processed}: {}", ctx.shape(), request.name);

                ctx.suspend().await?;
                ctx.emit(response::build(&request.name, &request.language))
                    .await?;
            }
            CallEvent::Close => {
                #[cfg(feature = "tracing")]
                tracing::debug!("[{}] Processed {processed} messages", ctx.shape());
                return Ok(());
            }
            CallEvent::Error(status) => return Err(status.into()),
        }
    }
}
