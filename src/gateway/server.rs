use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, FromRequestParts, Multipart, Query, State},
    http::{StatusCode, header, request::Parts},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};

use super::dto::{
    ApproveResponse, CheckoutParams, CommitEnvelope, CreatePrRequest, CreateTeamRequest,
    DeactivateTeamRequest, PrParams, ProfileResponse, PullRequestEnvelope, PullRequestListResponse,
    PullRequestView, RejectBody, StatusFilterParams, TeamEnvelope, TeamNameParams,
};
use super::service::GatewayService;
use crate::response::{ApiError, trace_request};

pub const MAX_UPLOAD_SIZE: usize = 100 * 1024 * 1024;

const USERNAME_HEADER: &str = "x-username";

pub struct GatewayState {
    pub service: GatewayService,
}

/// Extractor for the required `X-Username` header.
pub struct Username(pub String);

impl<S: Send + Sync> FromRequestParts<S> for Username {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USERNAME_HEADER)
            .and_then(|h| h.to_str().ok())
            .filter(|s| !s.is_empty())
            .map(|s| Username(s.to_string()))
            .ok_or_else(|| ApiError::invalid_request("X-Username header is required"))
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn get_profile(
    Username(username): Username,
    State(state): State<Arc<GatewayState>>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.service.user_profile(&username).await?;
    Ok(Json(ProfileResponse { user }))
}

async fn create_team(
    Username(_username): Username,
    State(state): State<Arc<GatewayState>>,
    Json(req): Json<CreateTeamRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.team_name.is_empty() {
        return Err(ApiError::invalid_request("team_name is required"));
    }
    if req.members.is_empty() {
        return Err(ApiError::invalid_request("at least one member is required"));
    }

    let team = state.service.create_team(&req.team_name, req.members).await?;
    Ok((StatusCode::CREATED, Json(TeamEnvelope { team })))
}

async fn get_team(
    Username(username): Username,
    State(state): State<Arc<GatewayState>>,
    Query(params): Query<TeamNameParams>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .service
        .authorize(&username, Some(&params.team_name))
        .await?;
    let team = state.service.get_team(&params.team_name).await?;
    Ok(Json(TeamEnvelope { team }))
}

async fn deactivate_team(
    Username(username): Username,
    State(state): State<Arc<GatewayState>>,
    Json(req): Json<DeactivateTeamRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .service
        .authorize(&username, Some(&req.team_name))
        .await?;
    let report = state.service.deactivate_team(&req.team_name).await?;
    Ok(Json(report))
}

/// Multipart fields accepted by the repo init and push endpoints.
#[derive(Default)]
struct RepoUpload {
    team_name: Option<String>,
    repo_name: Option<String>,
    parent_commit_name: Option<String>,
    commit_name: Option<String>,
    code: Option<Vec<u8>>,
}

async fn read_repo_upload(mut multipart: Multipart) -> Result<RepoUpload, ApiError> {
    let mut upload = RepoUpload::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::invalid_request(format!("failed to parse form data: {e}")))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match name.as_str() {
            "team_name" => upload.team_name = Some(text_field(&name, field).await?),
            "repo_name" => upload.repo_name = Some(text_field(&name, field).await?),
            "parent_commit_name" => {
                upload.parent_commit_name = Some(text_field(&name, field).await?)
            }
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

fn require<T>(value: Option<T>, message: &str) -> Result<T, ApiError> {
    value.ok_or_else(|| ApiError::invalid_request(message))
}

async fn init_repository(
    Username(username): Username,
    State(state): State<Arc<GatewayState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let upload = read_repo_upload(multipart).await?;
    let team_name = require(upload.team_name, "team_name is required")?;
    let repo_name = require(upload.repo_name, "repo_name is required")?;
    let code = require(upload.code, "code file is required")?;

    state.service.authorize(&username, Some(&team_name)).await?;

    let commit = state
        .service
        .init_repository(&team_name, &repo_name, upload.commit_name.as_deref(), code)
        .await?;
    Ok((StatusCode::CREATED, Json(CommitEnvelope { commit })))
}

async fn push(
    Username(username): Username,
    State(state): State<Arc<GatewayState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let upload = read_repo_upload(multipart).await?;
    let team_name = require(upload.team_name, "team_name is required")?;
    let repo_name = require(upload.repo_name, "repo_name is required")?;
    let parent = require(upload.parent_commit_name, "parent_commit_name is required")?;
    let code = require(upload.code, "code file is required")?;

    state.service.authorize(&username, Some(&team_name)).await?;

    let commit = state
        .service
        .push(
            &team_name,
            &repo_name,
            &parent,
            upload.commit_name.as_deref(),
            code,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(CommitEnvelope { commit })))
}

fn zip_response(code: Vec<u8>) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "application/zip"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=code.zip",
            ),
        ],
        code,
    )
}

async fn checkout(
    Username(username): Username,
    State(state): State<Arc<GatewayState>>,
    Query(params): Query<CheckoutParams>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .service
        .authorize(&username, Some(&params.team_name))
        .await?;
    let code = state
        .service
        .checkout(&params.team_name, &params.repo_name, &params.commit_name)
        .await?;
    Ok(zip_response(code))
}

async fn create_pr(
    Username(username): Username,
    State(state): State<Arc<GatewayState>>,
    Json(req): Json<CreatePrRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.pr_name.is_empty() {
        return Err(ApiError::invalid_request("pr_name is required"));
    }
    let author = state
        .service
        .authorize(&username, Some(&req.team_name))
        .await?;

    let (pr, meta) = state
        .service
        .create_pr(
            &author,
            &req.team_name,
            &req.pr_name,
            &req.repo_name,
            &req.source_commit,
            &req.target_commit,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(PullRequestEnvelope {
            pull_request: PullRequestView::new(pr, Some(&meta)),
        }),
    ))
}

async fn my_prs(
    Username(username): Username,
    State(state): State<Arc<GatewayState>>,
    Query(params): Query<StatusFilterParams>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.service.authorize(&username, None).await?;
    let prs = state
        .service
        .authored_prs(&user.user_id, params.status.as_deref())
        .await?;

    let pull_requests = prs
        .into_iter()
        .map(|pr| {
            let meta = state.service.pr_metadata_by_id(&pr.pull_request_id);
            PullRequestView::new(pr, meta.as_ref())
        })
        .collect();
    Ok(Json(PullRequestListResponse { pull_requests }))
}

async fn review_prs(
    Username(username): Username,
    State(state): State<Arc<GatewayState>>,
    Query(params): Query<StatusFilterParams>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.service.authorize(&username, None).await?;
    let prs = state
        .service
        .review_prs(&user.user_id, params.status.as_deref())
        .await?;

    let pull_requests = prs
        .into_iter()
        .map(|pr| {
            let meta = state.service.pr_metadata_by_id(&pr.pull_request_id);
            PullRequestView::new(pr, meta.as_ref())
        })
        .collect();
    Ok(Json(PullRequestListResponse { pull_requests }))
}

async fn approve_pr(
    Username(username): Username,
    State(state): State<Arc<GatewayState>>,
    Query(params): Query<PrParams>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .service
        .authorize(&username, Some(&params.team_name))
        .await?;
    let meta = state
        .service
        .pr_metadata(&params.team_name, &params.pr_name)?;

    let (pr, merge_commit) = state.service.approve_pr(&user.user_id, &meta).await?;
    Ok(Json(ApproveResponse {
        pull_request: PullRequestView::new(pr, Some(&meta)),
        merge_commit,
    }))
}

async fn reject_pr(
    Username(username): Username,
    State(state): State<Arc<GatewayState>>,
    Query(params): Query<PrParams>,
    body: Option<Json<RejectBody>>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .service
        .authorize(&username, Some(&params.team_name))
        .await?;
    let meta = state
        .service
        .pr_metadata(&params.team_name, &params.pr_name)?;
    let reason = body.as_ref().and_then(|b| b.reason.as_deref());

    let pr = state.service.reject_pr(&user.user_id, &meta, reason).await?;
    Ok(Json(PullRequestEnvelope {
        pull_request: PullRequestView::new(pr, Some(&meta)),
    }))
}

async fn pr_code(
    Username(username): Username,
    State(state): State<Arc<GatewayState>>,
    Query(params): Query<PrParams>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .service
        .authorize(&username, Some(&params.team_name))
        .await?;
    let meta = state
        .service
        .pr_metadata(&params.team_name, &params.pr_name)?;

    let code = state.service.pr_code(&meta).await?;
    Ok(zip_response(code))
}

pub fn gateway_router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/me", get(get_profile))
        .route("/api/team/create", post(create_team))
        .route("/api/team/get", get(get_team))
        .route("/api/team/deactivateUsers", post(deactivate_team))
        .route("/api/repo/init", post(init_repository))
        .route("/api/repo/push", post(push))
        .route("/api/repo/checkout", get(checkout))
        .route("/api/pr/create", post(create_pr))
        .route("/api/pr/my", get(my_prs))
        .route("/api/pr/reviews", get(review_prs))
        .route("/api/pr/approve", post(approve_pr))
        .route("/api/pr/reject", post(reject_pr))
        .route("/api/pr/code", get(pr_code))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE))
        .layer(middleware::from_fn(trace_request))
        .with_state(state)
}
