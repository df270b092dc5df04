use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use tagsync_core::{LeaderElector, map::to_task_spec};
use tagsync_model::BackoffStrategy;
use tagsync_prometheus::PrometheusMetrics;
use taskvisor::{RestartPolicy, TaskError, TaskFn, TaskRef, TaskSpec};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub const HTTP_TASK: &str = "tagsync-http";

#[derive(Clone)]
struct HttpState {
    metrics: PrometheusMetrics,
    elector: Arc<LeaderElector>,
}

/// Routes:
/// - GET /metrics - Prometheus text exposition
/// - GET /healthz - liveness plus current leadership
pub fn router(metrics: PrometheusMetrics, elector: Arc<LeaderElector>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz))
        .with_state(HttpState { metrics, elector })
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    identity: String,
    leader: bool,
}

async fn metrics_handler(State(state): State<HttpState>) -> Response {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [(CONTENT_TYPE, state.metrics.content_type())],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn healthz(State(state): State<HttpState>) -> Json<Health> {
    Json(Health {
        status: "ok",
        identity: state.elector.identity().to_string(),
        leader: state.elector.is_held(),
    })
}

/// Serve [`router`] on `addr` until the supervisor cancels the task.
pub fn http_task(addr: SocketAddr, metrics: PrometheusMetrics, elector: Arc<LeaderElector>) -> TaskSpec {
    let task: TaskRef = TaskFn::arc(HTTP_TASK, move |ctx: CancellationToken| {
        let app = router(metrics.clone(), Arc::clone(&elector));
        async move {
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .map_err(|e| TaskError::Fail {
                    reason: format!("bind {addr}: {e}"),
                })?;
            info!(%addr, "http endpoint listening");
            axum::serve(listener, app)
                .with_graceful_shutdown(ctx.cancelled_owned())
                .await
                .map_err(|e| TaskError::Fail {
                    reason: format!("http server: {e}"),
                })
        }
    });
    to_task_spec(
        task,
        RestartPolicy::OnFailure,
        &BackoffStrategy::on_failure(1_000, 30_000),
        None,
    )
}
