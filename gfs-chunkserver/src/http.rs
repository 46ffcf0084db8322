//! The chunkserver's HTTP surface: one `axum` handler per endpoint,
//! dispatching against a shared [`ChunkServerContext`].

use crate::context::ChunkServerContext;
use axum::extract::{Path, State};
use axum::middleware::{self, Next};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use gfs_core::{GfsError, Port, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub fn router(ctx: Arc<ChunkServerContext>) -> Router {
    Router::new()
        .route("/chunk/stage", post(chunk_stage))
        .route("/chunk/commit", post(chunk_commit))
        .route("/chunk/read/:handle", get(chunk_read))
        .route("/admin/status", get(admin_status))
        .route("/admin/clock", get(admin_clock))
        .route("/admin/adjust-clock", post(admin_adjust_clock))
        .route("/admin/kill", post(admin_kill))
        .with_state(ctx.clone())
        .layer(middleware::from_fn_with_state(ctx, count_requests))
}

/// Counts every inbound request, used by `/admin/status`.
async fn count_requests(
    State(ctx): State<Arc<ChunkServerContext>>,
    req: axum::extract::Request,
    next: Next,
) -> impl IntoResponse {
    ctx.count_request();
    next.run(req).await
}

#[derive(Deserialize)]
struct StageRequest {
    handle: String,
    content: String,
}

async fn chunk_stage(
    State(ctx): State<Arc<ChunkServerContext>>,
    Json(req): Json<StageRequest>,
) -> impl IntoResponse {
    ctx.store.stage(&req.handle, req.content.into_bytes()).await;
    Json(json!({ "status": "staged" }))
}

#[derive(Deserialize)]
struct CommitRequest {
    handle: String,
    /// Present when this commit is itself a secondary-fanout forward from a
    /// primary; absent for a client committing its own staged write.
    content: Option<String>,
    #[serde(default)]
    secondaries: Vec<Port>,
}

async fn chunk_commit(
    State(ctx): State<Arc<ChunkServerContext>>,
    Json(req): Json<CommitRequest>,
) -> Result<Json<serde_json::Value>> {
    let last_mod = ctx.clock.now().await;

    let content = match req.content {
        Some(content) => {
            ctx.store
                .commit_replicated(&req.handle, content.clone().into_bytes(), last_mod)
                .await?;
            content
        }
        None => {
            let data = ctx.store.commit(&req.handle, last_mod).await?;
            String::from_utf8(data).map_err(|e| GfsError::BadRequest(e.to_string()))?
        }
    };

    if !req.secondaries.is_empty() {
        ctx.fan_out_commit(&req.handle, &content, &req.secondaries).await;
    }

    Ok(Json(json!({ "status": "committed" })))
}

#[derive(Serialize)]
struct ReadResponse {
    data: String,
}

async fn chunk_read(
    State(ctx): State<Arc<ChunkServerContext>>,
    Path(handle): Path<String>,
) -> Result<Json<ReadResponse>> {
    let data = ctx.store.read(&handle).await?;
    let data = String::from_utf8(data).map_err(|e| GfsError::Storage(e.to_string()))?;
    Ok(Json(ReadResponse { data }))
}

async fn admin_status(State(ctx): State<Arc<ChunkServerContext>>) -> impl IntoResponse {
    Json(json!({
        "port": ctx.self_port,
        "status": "ONLINE",
        "metrics": {
            "clock_offset": ctx.clock.offset().await,
            "total_requests": ctx.total_requests(),
        },
    }))
}

#[derive(Serialize)]
struct ClockResponse {
    port: Port,
    simulated_time: f64,
}

async fn admin_clock(State(ctx): State<Arc<ChunkServerContext>>) -> impl IntoResponse {
    Json(ClockResponse {
        port: ctx.self_port,
        simulated_time: ctx.clock.now().await,
    })
}

#[derive(Deserialize)]
struct AdjustClockRequest {
    #[serde(default)]
    offset: f64,
}

async fn admin_adjust_clock(
    State(ctx): State<Arc<ChunkServerContext>>,
    Json(req): Json<AdjustClockRequest>,
) -> impl IntoResponse {
    ctx.clock.adjust(req.offset).await;
    Json(json!({ "status": "ok" }))
}

async fn admin_kill() -> impl IntoResponse {
    warn!("received admin kill request, exiting shortly");
    tokio::spawn(async {
        tokio::time::sleep(Duration::from_millis(300)).await;
        std::process::exit(0);
    });
    Json(json!({ "status": "ok" }))
}
