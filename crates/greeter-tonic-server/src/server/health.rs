//! Plain HTTP liveness endpoint.
//!
//! Serves `GET /health` with `{"status":"UP"}` on its own listener, next to
//! the gRPC health service. Load balancers that cannot speak gRPC probe this
//! one instead.

use axum::{Json, Router, routing::get};
use serde_json::{Value, json};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub fn router() -> Router {
    Router::new().route("/health", get(health))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "UP" }))
}

/// Serves the liveness endpoint on `addr` until `shutdown` is cancelled.
pub async fn serve(addr: SocketAddr, shutdown: CancellationToken) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;

    #[cfg(feature = "tracing")]
    tracing::info!(
        "Health endpoint listening on http://{}/health",
        listener.local_addr()?
    );

    axum::serve(listener, router())
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    #[cfg(feature = "tracing")]
    tracing::debug!("Health endpoint stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    #[tokio::test]
    async fn reports_up() {
        let res = router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, json!({ "status": "UP" }));
    }

    #[tokio::test]
    async fn unknown_paths_are_not_found() {
        let res = router()
            .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn stops_when_cancelled() {
        let shutdown = CancellationToken::new();
        let server = tokio::spawn(serve(
            SocketAddr::from(([127, 0, 0, 1], 0)),
            shutdown.clone(),
        ));

        shutdown.cancel();
        let res = tokio::time::timeout(core::time::Duration::from_secs(5), server).await;
        assert!(res.unwrap().unwrap().is_ok());
    }
}
