//! gRPC service implementation for the greeter.
//!
//! This module defines [`GreeterService`], the concrete implementation of the
//! [`GreetingService`] gRPC service defined in `greeting.proto`. It
//! exposes one endpoint per call shape.
//!
//! ## Responsibilities
//!
//! - Classify each incoming call by shape.
//! - Hand the call to the [`CallExecutor`], which runs it on its own task.
//! - Connect the call's response channel to the gRPC response (a single
//!   message or a stream).
//! - Refuse new calls and drain in-flight ones on shutdown.

use crate::server::{
    config::ServerConfig,
    executor::CallExecutor,
    streaming::coordinator::{Call, CallContext, ResponseReceiver, drive, response_channel},
};
use core::pin::Pin;
use greeter_tonic_core::{
    Error,
    proto::{HelloRequest, HelloResponse, greeting_service_server::GreetingService},
};
use std::sync::Arc;
use tokio_stream::Stream;
use tonic::{Request, Response, Status, Streaming};

/// Streamed responses handed to tonic.
pub type ResponseStream = Pin<Box<dyn Stream<Item = Result<HelloResponse, Status>> + Send>>;

type Inbound = Streaming<HelloRequest>;

/// gRPC greeter running every call on its own task.
///
/// Implements the [`GreetingService`] service defined in the protobuf schema.
/// Cloning is cheap: clones share the same executor.
#[derive(Clone)]
pub struct GreeterService {
    config: ServerConfig,
    executor: Arc<CallExecutor>,
}

impl GreeterService {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            executor: Arc::new(CallExecutor::new()),
        }
    }

    /// The executor running this service's calls.
    pub fn executor(&self) -> &Arc<CallExecutor> {
        &self.executor
    }

    /// Initiates a graceful shutdown.
    ///
    /// New calls are refused, in-flight calls get the configured drain window
    /// and are cancelled after it.
    pub async fn shutdown(&self) -> Result<(), Error> {
        self.executor.shutdown(self.config.shutdown_timeout).await
    }

    /// Spawns `call` and returns the receiving end of its response channel.
    fn start(&self, call: Call<Inbound>) -> Result<ResponseReceiver, Status> {
        let shape = call.shape();
        let delay = self.config.delays.for_shape(shape);
        let (tx, rx) = response_channel(self.config.stream_buffer_size);

        self.executor.spawn(shape, move |cancel| {
            drive(call, CallContext::new(shape, tx, cancel, delay))
        })?;

        Ok(rx)
    }
}

/// Waits for the single response of a unary or client-streaming call.
async fn single_response(mut rx: ResponseReceiver) -> Result<Response<HelloResponse>, Status> {
    match rx.recv().await {
        Some(result) => result.map(Response::new),
        None => Err(Status::internal("Call ended without a response")),
    }
}

fn response_stream(rx: ResponseReceiver) -> ResponseStream {
    Box::pin(rx.into_stream())
}

#[tonic::async_trait]
impl GreetingService for GreeterService {
    type SayHelloServerStreamStream = ResponseStream;
    type SayHelloBidirectionalStream = ResponseStream;

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(skip_all, fields(name = %req.get_ref().name))
    )]
    async fn say_hello(
        &self,
        req: Request<HelloRequest>,
    ) -> Result<Response<HelloResponse>, Status> {
        let rx = self.start(Call::Unary(req.into_inner()))?;
        single_response(rx).await
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(skip_all, fields(name = %req.get_ref().name))
    )]
    async fn say_hello_server_stream(
        &self,
        req: Request<HelloRequest>,
    ) -> Result<Response<Self::SayHelloServerStreamStream>, Status> {
        let rx = self.start(Call::ServerStream(req.into_inner()))?;
        Ok(Response::new(response_stream(rx)))
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    async fn say_hello_client_stream(
        &self,
        req: Request<Streaming<HelloRequest>>,
    ) -> Result<Response<HelloResponse>, Status> {
        let rx = self.start(Call::ClientStream(req.into_inner()))?;
        single_response(rx).await
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    async fn say_hello_bidirectional(
        &self,
        req: Request<Streaming<HelloRequest>>,
    ) -> Result<Response<Self::SayHelloBidirectionalStream>, Status> {
        let rx = self.start(Call::Bidirectional(req.into_inner()))?;
        Ok(Response::new(response_stream(rx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::config::WorkDelays;
    use core::time::Duration;
    use futures::{StreamExt, future::join_all};
    use greeter_tonic_core::{
        catalog,
        proto::{
            greeting_service_client::GreetingServiceClient,
            greeting_service_server::GreetingServiceServer,
        },
    };
    use std::collections::HashSet;
    use tokio::{net::TcpListener, time::timeout};
    use tokio_stream::wrappers::TcpListenerStream;
    use tonic::{
        Code,
        transport::{Channel, Server},
    };

    const WAIT: Duration = Duration::from_secs(10);

    fn config(delays: WorkDelays) -> ServerConfig {
        ServerConfig {
            delays,
            shutdown_timeout: Duration::from_millis(100),
            ..ServerConfig::default()
        }
    }

    /// Serves `service` on an ephemeral loopback port and connects a client.
    async fn serve(service: GreeterService) -> GreetingServiceClient<Channel> {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(
            Server::builder()
                .add_service(GreetingServiceServer::new(service))
                .serve_with_incoming(TcpListenerStream::new(listener)),
        );

        let channel = Channel::from_shared(format!("http://{addr}"))
            .unwrap()
            .connect()
            .await
            .unwrap();
        GreetingServiceClient::new(channel)
    }

    fn request(name: &str, language: &str) -> HelloRequest {
        HelloRequest {
            name: name.to_string(),
            language: language.to_string(),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn say_hello_greets_in_locale() {
        let mut client = serve(GreeterService::new(config(WorkDelays::NONE))).await;

        let response = client
            .say_hello(request("World", "fr"))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(response.message, "Bonjour, World!");
        assert!(response.thread_info.starts_with("Task[id="));
        assert!(response.timestamp.ends_with('Z'));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn server_stream_sends_every_locale_once() {
        let mut client = serve(GreeterService::new(config(WorkDelays::NONE))).await;

        let messages: Vec<_> = client
            .say_hello_server_stream(request("X", ""))
            .await
            .unwrap()
            .into_inner()
            .map(|res| res.unwrap().message)
            .collect()
            .await;

        assert_eq!(messages.len(), catalog::len());
        let locales: Vec<_> = messages
            .iter()
            .map(|m| {
                let start = m.rfind('[').unwrap() + 1;
                m[start..m.len() - 1].to_string()
            })
            .collect();
        let expected: Vec<_> = catalog::entries().map(|e| e.locale.to_string()).collect();
        assert_eq!(locales, expected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn client_stream_answers_once_with_summary() {
        let mut client = serve(GreeterService::new(config(WorkDelays::NONE))).await;

        let names = ["A", "B", "C"].map(|n| request(n, ""));
        let response = client
            .say_hello_client_stream(tokio_stream::iter(names))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(response.message, "Hello to all 3 friends: A, B, C!");

        let response = client
            .say_hello_client_stream(tokio_stream::iter(Vec::<HelloRequest>::new()))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(response.message, "Hello to all 0 friends: !");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn bidirectional_answers_in_order() {
        let mut client = serve(GreeterService::new(config(WorkDelays::NONE))).await;

        let names: Vec<_> = (0..25).map(|i| format!("friend-{i}")).collect();
        let outbound = tokio_stream::iter(names.clone().into_iter().map(|n| request(&n, "it")));
        let messages: Vec<_> = client
            .say_hello_bidirectional(outbound)
            .await
            .unwrap()
            .into_inner()
            .map(|res| res.unwrap().message)
            .collect()
            .await;

        let expected: Vec<_> = names.iter().map(|n| format!("Ciao, {n}!")).collect();
        assert_eq!(messages, expected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_calls_run_on_distinct_tasks() {
        let delays = WorkDelays::uniform(Duration::from_millis(20));
        let client = serve(GreeterService::new(config(delays))).await;

        let calls = (0..200).map(|i| {
            let mut client = client.clone();
            async move {
                client
                    .say_hello(request(&format!("caller-{i}"), "de"))
                    .await
                    .unwrap()
                    .into_inner()
            }
        });
        let responses = timeout(WAIT, join_all(calls)).await.unwrap();

        let tags: HashSet<_> = responses.iter().map(|r| r.thread_info.clone()).collect();
        assert_eq!(tags.len(), responses.len());
        for (i, response) in responses.iter().enumerate() {
            assert_eq!(response.message, format!("Hallo, caller-{i}!"));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn shutdown_cancels_lingering_calls_and_refuses_new_ones() {
        let delays = WorkDelays::uniform(Duration::from_secs(30));
        let service = GreeterService::new(config(delays));
        let executor = Arc::clone(service.executor());
        let mut client = serve(service.clone()).await;

        let mut stream = client
            .say_hello_server_stream(request("X", ""))
            .await
            .unwrap()
            .into_inner();

        timeout(WAIT, async {
            while executor.inflight() == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        service.shutdown().await.unwrap();

        let status = timeout(WAIT, stream.message()).await.unwrap().unwrap_err();
        assert_eq!(status.code(), Code::Cancelled);

        let status = client.say_hello(request("late", "")).await.unwrap_err();
        assert_eq!(status.code(), Code::Unavailable);
    }
}
