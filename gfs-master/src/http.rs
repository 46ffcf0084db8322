//! The master's HTTP surface: one `axum` handler per endpoint, dispatching
//! against a shared [`MasterContext`].

use crate::auth::digest_password;
use crate::context::MasterContext;
use axum::extract::{Path, State};
use axum::middleware::{self, Next};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use gfs_core::{
    AccessStatus, ChunkHandle, ChunkMapping, FileId, FileRecord, GfsError, PermissionRequest,
    Port, ReplicatedOp, RequestId, Result, UserId,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub fn router(ctx: Arc<MasterContext>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/election/msg", post(election_msg))
        .route("/heartbeat", post(heartbeat))
        .route("/system/status", get(system_status))
        .route("/system/replicate", post(system_replicate))
        .route("/auth/register", post(auth_register))
        .route("/auth/login", post(auth_login))
        .route("/file/create", post(file_create))
        .route("/file/lookup/:file_id", post(file_lookup))
        .route("/file/list/:user_id", get(file_list))
        .route("/access/request", post(access_request))
        .route("/access/pending/:owner_user_id", get(access_pending))
        .route("/access/approve", post(access_approve))
        .route("/admin/kill", post(admin_kill))
        .with_state(ctx.clone())
        .layer(middleware::from_fn_with_state(ctx, count_requests))
}

/// Counts every inbound request, surfaced in `/system/status`.
async fn count_requests(
    State(ctx): State<Arc<MasterContext>>,
    req: axum::extract::Request,
    next: Next,
) -> impl IntoResponse {
    ctx.count_request();
    next.run(req).await
}

async fn health(State(ctx): State<Arc<MasterContext>>) -> impl IntoResponse {
    let role = if ctx.is_leader().await { "leader" } else { "follower" };
    Json(json!({ "status": "ok", "role": role }))
}

#[derive(Deserialize)]
struct ElectionMessage {
    #[serde(rename = "type")]
    kind: String,
    sender: Port,
    #[serde(default)]
    term: u64,
}

async fn election_msg(
    State(ctx): State<Arc<MasterContext>>,
    Json(msg): Json<ElectionMessage>,
) -> impl IntoResponse {
    match msg.kind.as_str() {
        "ELECTION" => ctx.election.handle_election_message(msg.sender).await,
        "COORDINATOR" => {
            ctx.election
                .handle_coordinator_message(msg.sender, msg.term)
                .await
        }
        other => warn!(kind = other, "unknown election message kind, ignoring"),
    }
    Json(json!({ "status": "ok" }))
}

#[derive(Deserialize)]
struct HeartbeatRequest {
    port: Port,
    #[allow(dead_code)]
    time: f64,
}

async fn heartbeat(
    State(ctx): State<Arc<MasterContext>>,
    Json(req): Json<HeartbeatRequest>,
) -> impl IntoResponse {
    ctx.liveness.record_heartbeat(req.port).await;
    Json(json!({ "status": "ok" }))
}

async fn system_status(State(ctx): State<Arc<MasterContext>>) -> impl IntoResponse {
    let role = if ctx.is_leader().await { "leader" } else { "follower" };
    let leader_id = ctx.election.current_leader().await;
    let live = ctx.liveness.live_ports().await;
    let clock_sync_role = if ctx.is_leader().await { "DAEMON" } else { "CLIENT" };
    let election_state = match ctx.election.state().await {
        gfs_coordination::ElectionState::InProgress { .. } => "VOTING",
        _ => "IDLE",
    };
    Json(json!({
        "self_port": ctx.self_port,
        "role": role,
        "leader_id": leader_id,
        "peers": ctx.peer_ports,
        "live_chunkservers": live,
        "algo_status": {
            "election_state": election_state,
            "total_requests": ctx.total_requests(),
            "clock_sync_role": clock_sync_role,
        },
    }))
}

#[derive(Deserialize)]
struct ReplicateRequest {
    op: ReplicatedOp,
}

async fn system_replicate(
    State(ctx): State<Arc<MasterContext>>,
    Json(req): Json<ReplicateRequest>,
) -> impl IntoResponse {
    if let Err(e) = ctx.metadata.apply(req.op).await {
        warn!(error = %e, "failed to apply replicated operation, ignoring");
    }
    Json(json!({ "status": "ok" }))
}

#[derive(Deserialize)]
struct Credentials {
    username: String,
    password: String,
}

#[derive(Serialize)]
struct UserResponse {
    user_id: UserId,
    username: String,
}

async fn auth_register(
    State(ctx): State<Arc<MasterContext>>,
    Json(req): Json<Credentials>,
) -> Result<Json<UserResponse>> {
    if !ctx.is_leader().await {
        return Err(GfsError::NotLeader);
    }
    let user_id = UserId::generate();
    let digest = digest_password(&req.password);
    ctx.metadata
        .register_user(&user_id, &req.username, &digest)
        .await?;
    ctx.replicate(ReplicatedOp::RegisterUser {
        user_id: user_id.clone(),
        username: req.username.clone(),
        password_digest: digest,
    })
    .await;
    info!(username = %req.username, "registered user");
    Ok(Json(UserResponse {
        user_id,
        username: req.username,
    }))
}

async fn auth_login(
    State(ctx): State<Arc<MasterContext>>,
    Json(req): Json<Credentials>,
) -> Result<Json<UserResponse>> {
    let digest = digest_password(&req.password);
    let user_id = ctx.metadata.authenticate(&req.username, &digest).await?;
    Ok(Json(UserResponse {
        user_id,
        username: req.username,
    }))
}

#[derive(Deserialize)]
struct FileCreateRequest {
    filename: String,
    user_id: UserId,
}

#[derive(Serialize)]
struct FileCreateResponse {
    file_id: FileId,
    chunk_handle: ChunkHandle,
    replicas: Vec<Port>,
    primary: Port,
}

async fn file_create(
    State(ctx): State<Arc<MasterContext>>,
    Json(req): Json<FileCreateRequest>,
) -> Result<Json<FileCreateResponse>> {
    if !ctx.is_leader().await {
        return Err(GfsError::NotLeader);
    }
    if !ctx.wait_for_live_chunkserver().await {
        return Err(GfsError::NoServersAvailable);
    }

    let live = ctx.liveness.live_ports().await;
    let replicas: Vec<Port> = live.into_iter().take(ctx.config.max_replicas).collect();

    let file_id = FileId::generate();
    let chunk_handle = ChunkHandle::for_first_chunk(&file_id);
    let primary = ctx.leases.grant_lease(&chunk_handle.0, &replicas).await;

    let file = FileRecord {
        file_id: file_id.clone(),
        filename: req.filename,
        size: 0,
        owner_id: req.user_id,
    };
    ctx.metadata.create_file(&file).await?;
    ctx.replicate(ReplicatedOp::CreateFile { file: file.clone() }).await;

    let mapping = ChunkMapping {
        chunk_handle: chunk_handle.clone(),
        file_id: file_id.clone(),
        sequence_index: 0,
        primary_location: primary,
        replica_set: replicas.clone(),
    };
    ctx.metadata.create_chunk_mapping(&mapping).await?;
    ctx.replicate(ReplicatedOp::CreateChunkMapping { mapping }).await;

    info!(%file_id, primary, ?replicas, "created file");
    Ok(Json(FileCreateResponse {
        file_id,
        chunk_handle,
        replicas,
        primary,
    }))
}

#[derive(Deserialize)]
struct FileLookupRequest {
    user_id: UserId,
}

#[derive(Serialize)]
struct ChunkLocation {
    handle: ChunkHandle,
    primary: Port,
    replicas: Vec<Port>,
}

#[derive(Serialize)]
struct FileLookupResponse {
    chunks: Vec<ChunkLocation>,
}

async fn file_lookup(
    State(ctx): State<Arc<MasterContext>>,
    Path(file_id): Path<String>,
    Json(req): Json<FileLookupRequest>,
) -> Result<Json<FileLookupResponse>> {
    let file_id = FileId(file_id);
    ctx.metadata
        .lookup_file(&file_id)
        .await?
        .ok_or_else(|| GfsError::NotFound(format!("file {}", file_id.0)))?;

    if !ctx.metadata.has_access(&file_id, &req.user_id).await? {
        return Err(GfsError::PermissionDenied);
    }

    let handle = ChunkHandle::for_first_chunk(&file_id);
    let mapping = ctx
        .metadata
        .chunk_mapping(&handle)
        .await?
        .ok_or_else(|| GfsError::NotFound(format!("chunk mapping for {}", file_id.0)))?;

    let primary = if ctx.is_leader().await {
        ctx.leases
            .grant_lease(&mapping.chunk_handle.0, &mapping.replica_set)
            .await
    } else {
        mapping.primary_location
    };

    Ok(Json(FileLookupResponse {
        chunks: vec![ChunkLocation {
            handle: mapping.chunk_handle,
            primary,
            replicas: mapping.replica_set,
        }],
    }))
}

async fn file_list(
    State(ctx): State<Arc<MasterContext>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<FileRecord>>> {
    let user_id = UserId(user_id);
    let mut files = ctx.metadata.list_files(&user_id).await?;
    files.extend(ctx.metadata.shared_files_for(&user_id).await?);
    Ok(Json(files))
}

#[derive(Deserialize)]
struct AccessRequestBody {
    file_id: FileId,
    user_id: UserId,
    access_type: String,
}

#[derive(Serialize)]
struct AccessRequestResponse {
    request_id: RequestId,
}

async fn access_request(
    State(ctx): State<Arc<MasterContext>>,
    Json(req): Json<AccessRequestBody>,
) -> Result<Json<AccessRequestResponse>> {
    if !ctx.is_leader().await {
        return Err(GfsError::NotLeader);
    }
    let request_id = RequestId::generate();
    let permission_request = PermissionRequest {
        request_id: request_id.clone(),
        file_id: req.file_id.clone(),
        user_id: req.user_id.clone(),
        access_type: req.access_type.clone(),
        status: AccessStatus::Pending,
    };
    ctx.metadata.request_access(&permission_request).await?;
    ctx.replicate(ReplicatedOp::RequestAccess {
        request_id: request_id.clone(),
        file_id: req.file_id,
        user_id: req.user_id,
        access_type: req.access_type,
    })
    .await;
    Ok(Json(AccessRequestResponse { request_id }))
}

async fn access_pending(
    State(ctx): State<Arc<MasterContext>>,
    Path(owner_user_id): Path<String>,
) -> Result<Json<Vec<PermissionRequest>>> {
    let owner = UserId(owner_user_id);
    Ok(Json(ctx.metadata.pending_requests_for_owner(&owner).await?))
}

#[derive(Deserialize)]
struct AccessApproveRequest {
    req_id: RequestId,
    action: String,
}

async fn access_approve(
    State(ctx): State<Arc<MasterContext>>,
    Json(req): Json<AccessApproveRequest>,
) -> Result<Json<serde_json::Value>> {
    if !ctx.is_leader().await {
        return Err(GfsError::NotLeader);
    }
    let status = AccessStatus::parse(&req.action)
        .ok_or_else(|| GfsError::BadRequest(format!("unknown action {}", req.action)))?;
    ctx.metadata.set_access_status(&req.req_id, status).await?;
    ctx.replicate(ReplicatedOp::SetAccessStatus {
        request_id: req.req_id,
        status,
    })
    .await;
    Ok(Json(json!({ "status": "ok" })))
}

async fn admin_kill() -> impl IntoResponse {
    warn!("received admin kill request, exiting shortly");
    tokio::spawn(async {
        tokio::time::sleep(Duration::from_millis(300)).await;
        std::process::exit(0);
    });
    Json(json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn test_context() -> Arc<MasterContext> {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("master.db");
        let ctx = MasterContext::new(9001, vec![], db_path).await.unwrap();
        // sqlite keeps the file open via its fd even after the tempdir is
        // removed on drop, so it's fine to let `dir` go out of scope here.
        ctx
    }

    async fn send(router: Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let resp = router.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    #[tokio::test]
    async fn health_reports_follower_before_any_election() {
        let ctx = test_context().await;
        let router = router(ctx);
        let (status, body) = send(
            router,
            Request::builder().uri("/health").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn lone_node_self_elects_and_serves_as_leader() {
        let ctx = test_context().await;
        ctx.election.start_election().await;
        let router = router(ctx);
        let (status, body) = send(
            router,
            Request::builder().uri("/health").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["role"], "leader");
    }

    #[tokio::test]
    async fn register_then_login_round_trips_a_user() {
        let ctx = test_context().await;
        ctx.election.start_election().await;
        let router = router(ctx);

        let (status, body) = send(
            router.clone(),
            Request::builder()
                .method("POST")
                .uri("/auth/register")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({ "username": "alice", "password": "hunter2" }).to_string(),
                ))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["username"], "alice");

        let (status, body) = send(
            router,
            Request::builder()
                .method("POST")
                .uri("/auth/login")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({ "username": "alice", "password": "wrong" }).to_string(),
                ))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "invalid credentials");
    }

    #[tokio::test]
    async fn register_on_a_non_leader_is_rejected() {
        let ctx = test_context().await;
        // No election has run: this node believes itself InProgress, not Leader.
        let router = router(ctx);
        let (status, _) = send(
            router,
            Request::builder()
                .method("POST")
                .uri("/auth/register")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({ "username": "bob", "password": "x" }).to_string(),
                ))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn file_create_fails_fast_with_no_live_chunkservers() {
        let ctx = test_context().await;
        ctx.election.start_election().await;
        let router = router(ctx);
        let (status, _) = send(
            router,
            Request::builder()
                .method("POST")
                .uri("/file/create")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({ "filename": "a.txt", "user_id": "u1" }).to_string(),
                ))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
