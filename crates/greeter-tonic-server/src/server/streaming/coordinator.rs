use super::{
    processor,
    request::{CallEvent, next_event},
};
use crate::server::{
    executor::tag::ExecutorTag,
    telemetry::{
        decrement_calls_inflight, increment_call_errors, increment_calls,
        increment_calls_inflight, increment_messages_received, increment_responses_emitted,
        record_call_duration,
    },
};
use core::time::Duration;
use futures::{Stream, stream};
use greeter_tonic_core::{
    Error,
    proto::{HelloRequest, HelloResponse},
    types::CallShape,
};
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tonic::Status;

/// Creates the channel carrying one call's output to the transport.
///
/// Responses travel on a bounded queue of `capacity`. The terminal failure
/// status, if any, travels on its own slot and is yielded after every queued
/// response, so a full queue can never swallow it.
pub fn response_channel(capacity: usize) -> (ResponseSender, ResponseReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    let (status_tx, status_rx) = oneshot::channel();
    (
        ResponseSender {
            tx,
            status: Some(status_tx),
        },
        ResponseReceiver {
            rx,
            status: Some(status_rx),
        },
    )
}

/// Sending half of [`response_channel`], owned by the call's task.
#[derive(Debug)]
pub struct ResponseSender {
    tx: mpsc::Sender<HelloResponse>,
    status: Option<oneshot::Sender<Status>>,
}

/// Receiving half of [`response_channel`], owned by the transport.
#[derive(Debug)]
pub struct ResponseReceiver {
    rx: mpsc::Receiver<HelloResponse>,
    status: Option<oneshot::Receiver<Status>>,
}

impl ResponseReceiver {
    /// Next response, then the failure status once the queue is drained.
    ///
    /// Returns `None` once the call has ended and everything it produced has
    /// been yielded.
    pub async fn recv(&mut self) -> Option<Result<HelloResponse, Status>> {
        if let Some(response) = self.rx.recv().await {
            return Some(Ok(response));
        }
        // The queue only reports closed once the call's sender is dropped,
        // and the status is always settled before that.
        let status = self.status.take()?;
        status.await.ok().map(Err)
    }

    /// Responses waiting in the queue.
    #[cfg(test)]
    pub fn queued(&self) -> usize {
        self.rx.len()
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<HelloResponse, Status>> + Send {
        stream::unfold(self, |mut rx| async move {
            let item = rx.recv().await?;
            Some((item, rx))
        })
    }
}

/// An accepted call, classified by shape.
///
/// `S` is the inbound request stream for the streamed-request shapes.
#[derive(Debug)]
pub enum Call<S> {
    Unary(HelloRequest),
    ServerStream(HelloRequest),
    ClientStream(S),
    Bidirectional(S),
}

impl<S> Call<S> {
    pub const fn shape(&self) -> CallShape {
        match self {
            Self::Unary(_) => CallShape::Unary,
            Self::ServerStream(_) => CallShape::ServerStream,
            Self::ClientStream(_) => CallShape::ClientStream,
            Self::Bidirectional(_) => CallShape::Bidirectional,
        }
    }
}

/// Terminal state of a call.
#[derive(Debug, Clone)]
pub enum CallState {
    Completed,
    Failed(Error),
}

impl CallState {
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// What the observability sink receives once a call has ended.
#[derive(Debug, Clone)]
pub struct CallReport {
    pub shape: CallShape,
    pub tag: ExecutorTag,
    pub state: CallState,
    pub emitted: usize,
    pub elapsed: Duration,
}

/// Per-call handle on the transport, cancellation and simulated work.
///
/// Owned by the call's task for the whole call. Every suspension and every
/// emission first checks for cancellation, so nothing is emitted once the
/// call has observed it.
#[derive(Debug)]
pub struct CallContext {
    shape: CallShape,
    out: ResponseSender,
    cancel: CancellationToken,
    delay: Duration,
    emitted: usize,
}

impl CallContext {
    pub const fn new(
        shape: CallShape,
        out: ResponseSender,
        cancel: CancellationToken,
        delay: Duration,
    ) -> Self {
        Self {
            shape,
            out,
            cancel,
            delay,
            emitted: 0,
        }
    }

    pub const fn shape(&self) -> CallShape {
        self.shape
    }

    /// Responses handed to the transport so far.
    pub const fn emitted(&self) -> usize {
        self.emitted
    }

    /// Performs the simulated work for one response.
    ///
    /// Parks only this call's task. Fails if the call is cancelled or the
    /// transport goes away while parked.
    pub async fn suspend(&self) -> greeter_tonic_core::Result<()> {
        self.ensure_active()?;
        if self.delay.is_zero() {
            return Ok(());
        }

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Error::RequestCancelled),
            () = self.out.tx.closed() => Err(Error::ChannelError {
                context: "Response stream closed while suspended".to_string(),
            }),
            () = tokio::time::sleep(self.delay) => Ok(()),
        }
    }

    /// Hands one response to the transport.
    pub async fn emit(&mut self, response: HelloResponse) -> greeter_tonic_core::Result<()> {
        self.ensure_active()?;

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(Error::RequestCancelled),
            sent = self.out.tx.send(response) => {
                sent.map_err(|e| Error::ChannelError {
                    context: format!("Failed to forward response: {e}"),
                })?;
            }
        }

        self.emitted += 1;
        increment_responses_emitted(self.shape);
        Ok(())
    }

    /// Waits for the next inbound event while watching for cancellation.
    pub async fn next_event<S>(
        &self,
        inbound: &mut S,
    ) -> greeter_tonic_core::Result<CallEvent>
    where
        S: Stream<Item = Result<HelloRequest, Status>> + Unpin,
    {
        self.ensure_active()?;

        let event = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(Error::RequestCancelled),
            event = next_event(inbound) => event,
        };

        if matches!(event, CallEvent::Message(_)) {
            increment_messages_received(self.shape);
        }
        Ok(event)
    }

    fn ensure_active(&self) -> greeter_tonic_core::Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::RequestCancelled);
        }
        if self.out.tx.is_closed() {
            return Err(Error::ChannelError {
                context: "Response stream closed".to_string(),
            });
        }
        Ok(())
    }

    /// Settles the status the client sees after the last response.
    ///
    /// Never waits on the response queue; the status is delivered once the
    /// client has read everything emitted before the failure.
    fn report_failure(&mut self, err: &Error) {
        let Some(status_tx) = self.out.status.take() else {
            return;
        };
        if status_tx.send(err.clone().into()).is_err() {
            #[cfg(feature = "tracing")]
            tracing::debug!("[{}] Client gone before the error status", self.shape);
        }
    }
}

/// Drives one call to its terminal state.
///
/// Runs the protocol for the call's shape, records telemetry and returns the
/// [`CallReport`]. Failures stay local to this call: they are logged, counted
/// and surfaced to the client, never propagated further. Responses emitted
/// before a failure are not retracted.
#[cfg_attr(
    feature = "tracing",
    tracing::instrument(skip_all, fields(shape = %call.shape(), rpc = %call.shape().path()))
)]
pub async fn drive<S>(call: Call<S>, mut ctx: CallContext) -> CallReport
where
    S: Stream<Item = Result<HelloRequest, Status>> + Unpin,
{
    let start = Instant::now();
    let shape = call.shape();
    let tag = ExecutorTag::current();

    #[cfg(feature = "tracing")]
    tracing::info!("[{shape}] Started on {tag}");

    increment_calls(shape);
    increment_calls_inflight(shape);

    let result = match call {
        Call::Unary(request) => processor::unary(&mut ctx, request).await,
        Call::ServerStream(request) => processor::server_stream(&mut ctx, request).await,
        Call::ClientStream(mut inbound) => {
            processor::client_stream(&mut ctx, &mut inbound).await
        }
        Call::Bidirectional(mut inbound) => {
            processor::bidirectional(&mut ctx, &mut inbound).await
        }
    };

    decrement_calls_inflight(shape);

    let state = match result {
        Ok(()) => CallState::Completed,
        Err(e) => {
            increment_call_errors(shape);
            #[cfg(feature = "tracing")]
            tracing::warn!(
                "[{shape}] Failed after {} responses: {e}",
                ctx.emitted()
            );
            ctx.report_failure(&e);
            CallState::Failed(e)
        }
    };

    let elapsed = start.elapsed();
    record_call_duration(shape, elapsed.as_secs_f64() * 1000.0);

    #[cfg(feature = "tracing")]
    tracing::info!(
        "[{shape}] Finished on {tag} in {:?} ({} responses, completed = {})",
        elapsed,
        ctx.emitted(),
        state.is_completed()
    );

    CallReport {
        shape,
        tag,
        state,
        emitted: ctx.emitted(),
        elapsed,
    }
}
