use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};

use super::dto::{
    ApprovePrRequest, ApprovePrResponse, BulkDeactivateRequest, CreatePrRequest,
    CreateTeamRequest, MergePrRequest, PrEnvelope, PullRequestListResponse, ReassignRequest,
    ReassignResponse, RejectPrRequest, SetUserActiveRequest, TeamEnvelope, TeamNameParams,
    TeamResolveResponse, UserEnvelope, UserIdParams,
};
use super::engine::AllocationEngine;
use crate::response::{ApiError, trace_request};

pub struct AllocationState {
    pub engine: AllocationEngine,
}

async fn health() -> &'static str {
    "OK"
}

async fn create_team(
    State(state): State<Arc<AllocationState>>,
    Json(req): Json<CreateTeamRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.team_name.is_empty() {
        return Err(ApiError::invalid_request("team_name is required"));
    }
    if req.members.is_empty() {
        return Err(ApiError::invalid_request("at least one member is required"));
    }

    let team = state.engine.create_team(&req.team_name, req.members)?;
    Ok((StatusCode::CREATED, Json(TeamEnvelope { team })))
}

async fn get_team(
    State(state): State<Arc<AllocationState>>,
    Query(params): Query<TeamNameParams>,
) -> Result<impl IntoResponse, ApiError> {
    let team = state.engine.get_team(&params.team_name)?;
    Ok(Json(TeamEnvelope { team }))
}

async fn resolve_team(
    State(state): State<Arc<AllocationState>>,
    Query(params): Query<TeamNameParams>,
) -> Result<impl IntoResponse, ApiError> {
    let team_id = state.engine.team_id_by_name(&params.team_name)?;
    Ok(Json(TeamResolveResponse {
        team_id,
        team_name: params.team_name,
    }))
}

async fn deactivate_team_users(
    State(state): State<Arc<AllocationState>>,
    Json(req): Json<BulkDeactivateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.team_name.is_empty() {
        return Err(ApiError::invalid_request("team_name is required"));
    }
    let report = state.engine.bulk_deactivate_team(&req.team_name)?;
    Ok(Json(report))
}

async fn set_user_active(
    State(state): State<Arc<AllocationState>>,
    Json(req): Json<SetUserActiveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.user_id.is_empty() {
        return Err(ApiError::invalid_request("user_id is required"));
    }
    let user = state.engine.set_user_active(&req.user_id, req.is_active)?;
    Ok(Json(UserEnvelope { user }))
}

async fn get_user(
    State(state): State<Arc<AllocationState>>,
    Query(params): Query<UserIdParams>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.engine.get_user(&params.user_id)?;
    Ok(Json(UserEnvelope { user }))
}

async fn get_authored_prs(
    State(state): State<Arc<AllocationState>>,
    Query(params): Query<UserIdParams>,
) -> Result<impl IntoResponse, ApiError> {
    let pull_requests = state.engine.prs_by_author(&params.user_id)?;
    Ok(Json(PullRequestListResponse { pull_requests }))
}

async fn get_review_prs(
    State(state): State<Arc<AllocationState>>,
    Query(params): Query<UserIdParams>,
) -> Result<impl IntoResponse, ApiError> {
    let pull_requests = state.engine.prs_by_reviewer(&params.user_id)?;
    Ok(Json(PullRequestListResponse { pull_requests }))
}

async fn create_pr(
    State(state): State<Arc<AllocationState>>,
    Json(req): Json<CreatePrRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.pull_request_id.is_empty() || req.pull_request_name.is_empty() || req.author_id.is_empty()
    {
        return Err(ApiError::invalid_request(
            "pull_request_id, pull_request_name, and author_id are required",
        ));
    }

    let pr = state
        .engine
        .create_pr(&req.pull_request_id, &req.pull_request_name, &req.author_id)?;
    Ok((StatusCode::CREATED, Json(PrEnvelope { pr })))
}

async fn approve_pr(
    State(state): State<Arc<AllocationState>>,
    Json(req): Json<ApprovePrRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (pr, all_approved) = state
        .engine
        .approve_pr(&req.pull_request_id, &req.reviewer_id)?;
    Ok(Json(ApprovePrResponse { pr, all_approved }))
}

async fn reject_pr(
    State(state): State<Arc<AllocationState>>,
    Json(req): Json<RejectPrRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let pr = state
        .engine
        .reject_pr(&req.pull_request_id, &req.reviewer_id, req.reason.as_deref())?;
    Ok(Json(PrEnvelope { pr }))
}

async fn merge_pr(
    State(state): State<Arc<AllocationState>>,
    Json(req): Json<MergePrRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let pr = state.engine.merge_pr(&req.pull_request_id)?;
    Ok(Json(PrEnvelope { pr }))
}

async fn reassign_reviewer(
    State(state): State<Arc<AllocationState>>,
    Json(req): Json<ReassignRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (new_reviewer_id, pr) = state
        .engine
        .reassign_reviewer(&req.pull_request_id, &req.old_user_id)?;
    Ok(Json(ReassignResponse { pr, new_reviewer_id }))
}

async fn statistics(
    State(state): State<Arc<AllocationState>>,
) -> Result<impl IntoResponse, ApiError> {
    let stats = state.engine.statistics()?;
    Ok(Json(stats))
}

pub fn allocation_router(state: Arc<AllocationState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/team/add", post(create_team))
        .route("/team/get", get(get_team))
        .route("/team/resolve", get(resolve_team))
        .route("/team/deactivateUsers", post(deactivate_team_users))
        .route("/users/setIsActive", post(set_user_active))
        .route("/users/get", get(get_user))
        .route("/users/getAuthored", get(get_authored_prs))
        .route("/users/getReview", get(get_review_prs))
        .route("/pullRequest/create", post(create_pr))
        .route("/pullRequest/approve", post(approve_pr))
        .route("/pullRequest/reject", post(reject_pr))
        .route("/pullRequest/merge", post(merge_pr))
        .route("/pullRequest/reassign", post(reassign_reviewer))
        .route("/statistics", get(statistics))
        .layer(middleware::from_fn(trace_request))
        .with_state(state)
}
