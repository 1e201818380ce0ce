use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{PullRequest, Team, TeamMember, User};

#[derive(Debug, Deserialize)]
pub struct CreateTeamRequest {
    pub team_name: String,
    pub members: Vec<TeamMember>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TeamEnvelope {
    pub team: Team,
}

#[derive(Debug, Deserialize)]
pub struct TeamNameParams {
    pub team_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TeamResolveResponse {
    pub team_id: Uuid,
    pub team_name: String,
}

#[derive(Debug, Deserialize)]
pub struct SetUserActiveRequest {
    pub user_id: String,
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
pub struct UserIdParams {
    pub user_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserEnvelope {
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct CreatePrRequest {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PrEnvelope {
    pub pr: PullRequest,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApprovePrResponse {
    pub pr: PullRequest,
    pub all_approved: bool,
}

#[derive(Debug, Deserialize)]
pub struct ApprovePrRequest {
    pub pull_request_id: String,
    pub reviewer_id: String,
}

#[derive(Debug, Deserialize)]
pub struct RejectPrRequest {
    pub pull_request_id: String,
    pub reviewer_id: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MergePrRequest {
    pub pull_request_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ReassignRequest {
    pub pull_request_id: String,
    pub old_user_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReassignResponse {
    pub pr: PullRequest,
    pub new_reviewer_id: String,
}

#[derive(Debug, Deserialize)]
pub struct BulkDeactivateRequest {
    pub team_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PullRequestListResponse {
    pub pull_requests: Vec<PullRequest>,
}
