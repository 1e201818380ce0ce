use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{StatusCode, header},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use uuid::Uuid;

use super::dto::{
    CheckoutParams, CommitEnvelope, CommitIdParams, CommitIdResponse, CommitListResponse,
    CommitNameResponse, ListCommitsParams, MergeRequest, RegisterTeamRequest, RootCommitParams,
    RootCommitResponse,
};
use super::service::DagService;
use crate::response::{ApiError, trace_request};

pub const MAX_UPLOAD_SIZE: usize = 100 * 1024 * 1024;

pub struct StorageState {
    pub service: DagService,
}

async fn health() -> &'static str {
    "OK"
}

/// Multipart fields accepted by the init and push endpoints.
#[derive(Default)]
struct CommitUpload {
    team_id: Option<Uuid>,
    root_commit: Option<Uuid>,
    parent_commit: Option<Uuid>,
    repo_name: Option<String>,
    commit_name: Option<String>,
    code: Option<Vec<u8>>,
}

async fn read_commit_upload(mut multipart: Multipart) -> Result<CommitUpload, ApiError> {
    let mut upload = CommitUpload::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::invalid_request(format!("failed to parse form data: {e}")))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match name.as_str() {
            "team_id" => upload.team_id = Some(parse_uuid_field(&name, field).await?),
            "root_commit" => upload.root_commit = Some(parse_uuid_field(&name, field).await?),
            "commit_id" => upload.parent_commit = Some(parse_uuid_field(&name, field).await?),
            "repo_name" => upload.repo_name = Some(text_field(&name, field).await?),
            "commit_name" => upload.commit_name = Some(text_field(&name, field).await?),
            "code" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::invalid_request(format!("failed to read code: {e}")))?;
                upload.code = Some(bytes.to_vec());
            }
            _ => {}
        }
    }

    Ok(upload)
}

async fn text_field(
    name: &str,
    field: axum::extract::multipart::Field<'_>,
) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::invalid_request(format!("invalid {name} field: {e}")))
}

async fn parse_uuid_field(
    name: &str,
    field: axum::extract::multipart::Field<'_>,
) -> Result<Uuid, ApiError> {
    let text = text_field(name, field).await?;
    text.parse()
        .map_err(|_| ApiError::invalid_request(format!("invalid {name} format")))
}

fn require<T>(value: Option<T>, message: &str) -> Result<T, ApiError> {
    value.ok_or_else(|| ApiError::invalid_request(message))
}

async fn register_team(
    State(state): State<Arc<StorageState>>,
    Json(req): Json<RegisterTeamRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.service.register_team(req.team_id, &req.name)?;
    Ok(StatusCode::CREATED)
}

async fn init_repository(
    State(state): State<Arc<StorageState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let upload = read_commit_upload(multipart).await?;
    let team_id = require(upload.team_id, "team_id is required")?;
    let code = require(upload.code, "code file is required")?;

    let commit = state.service.init_repository(
        team_id,
        upload.repo_name.as_deref(),
        upload.commit_name.as_deref(),
        &code,
    )?;

    Ok((StatusCode::CREATED, Json(CommitEnvelope { commit })))
}

async fn push(
    State(state): State<Arc<StorageState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let upload = read_commit_upload(multipart).await?;
    let team_id = require(upload.team_id, "team_id is required")?;
    let root_commit = require(upload.root_commit, "root_commit is required")?;
    let parent_commit = require(upload.parent_commit, "commit_id is required")?;
    let code = require(upload.code, "code file is required")?;

    let commit = state.service.push(
        team_id,
        root_commit,
        parent_commit,
        upload.commit_name.as_deref(),
        &code,
    )?;

    Ok((StatusCode::CREATED, Json(CommitEnvelope { commit })))
}

async fn checkout(
    State(state): State<Arc<StorageState>>,
    Query(params): Query<CheckoutParams>,
) -> Result<impl IntoResponse, ApiError> {
    let code = state
        .service
        .checkout(params.team_id, params.root_commit, params.commit_id)?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/zip"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=code.zip",
            ),
        ],
        code,
    ))
}

async fn merge(
    State(state): State<Arc<StorageState>>,
    Json(req): Json<MergeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let commit = state
        .service
        .merge(req.team_id, req.root_commit, req.commit_id1, req.commit_id2)?;

    Ok((StatusCode::CREATED, Json(CommitEnvelope { commit })))
}

async fn get_commit_name(
    State(state): State<Arc<StorageState>>,
    Path(commit_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let name = state.service.commit_name(commit_id)?;
    Ok(Json(CommitNameResponse { commit_id, name }))
}

async fn get_commit_id(
    State(state): State<Arc<StorageState>>,
    Query(params): Query<CommitIdParams>,
) -> Result<impl IntoResponse, ApiError> {
    let commit_id =
        state
            .service
            .commit_id_by_name(params.team_id, params.root_commit, &params.name)?;
    Ok(Json(CommitIdResponse { commit_id }))
}

async fn get_root_commit(
    State(state): State<Arc<StorageState>>,
    Query(params): Query<RootCommitParams>,
) -> Result<impl IntoResponse, ApiError> {
    let root_commit = state
        .service
        .root_by_repo_name(params.team_id, &params.repo_name)?;
    Ok(Json(RootCommitResponse { root_commit }))
}

async fn list_commits(
    State(state): State<Arc<StorageState>>,
    Query(params): Query<ListCommitsParams>,
) -> Result<impl IntoResponse, ApiError> {
    let commits = state
        .service
        .list_commits(params.team_id, params.root_commit)?;
    Ok(Json(CommitListResponse { commits }))
}

pub fn storage_router(state: Arc<StorageState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/storage/team/add", post(register_team))
        .route("/storage/init", post(init_repository))
        .route("/storage/push", post(push))
        .route("/storage/checkout", get(checkout))
        .route("/storage/merge", post(merge))
        .route("/storage/commitName/{commit_id}", get(get_commit_name))
        .route("/storage/commitID", get(get_commit_id))
        .route("/storage/rootCommit", get(get_root_commit))
        .route("/storage/commits", get(list_commits))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE))
        .layer(middleware::from_fn(trace_request))
        .with_state(state)
}
