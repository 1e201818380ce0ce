use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{Commit, PrStatus, PullRequest, Team, TeamMember, User};

use super::registry::PrMetadata;

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
pub struct ProfileResponse {
    pub user: User,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommitEnvelope {
    pub commit: Commit,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutParams {
    pub team_name: String,
    pub repo_name: String,
    pub commit_name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreatePrRequest {
    pub team_name: String,
    pub pr_name: String,
    pub repo_name: String,
    pub source_commit: String,
    pub target_commit: String,
}

#[derive(Debug, Deserialize)]
pub struct PrParams {
    pub team_name: String,
    pub pr_name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusFilterParams {
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RejectBody {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeactivateTeamRequest {
    pub team_name: String,
}

/// User-facing PR representation: allocation state enriched with the DAG
/// coordinates the gateway resolved at creation. The commit fields are
/// absent when this process never saw the PR's creation.
#[derive(Debug, Serialize, Deserialize)]
pub struct PullRequestView {
    pub pr_id: String,
    pub pr_name: String,
    pub author_id: String,
    pub status: PrStatus,
    pub assigned_reviewers: Vec<String>,
    pub approved_by: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_commit: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_commit: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_commit_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_commit: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_commit_name: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merged_at: Option<DateTime<Utc>>,
}

impl PullRequestView {
    pub fn new(pr: PullRequest, meta: Option<&PrMetadata>) -> Self {
        Self {
            pr_id: pr.pull_request_id,
            pr_name: pr.pull_request_name,
            author_id: pr.author_id,
            status: pr.status,
            assigned_reviewers: pr.assigned_reviewers,
            approved_by: pr.approved_by,
            repo_name: meta.map(|m| m.repo_name.clone()),
            root_commit: meta.map(|m| m.root_commit),
            source_commit: meta.map(|m| m.source_commit),
            source_commit_name: meta.map(|m| m.source_commit_name.clone()),
            target_commit: meta.map(|m| m.target_commit),
            target_commit_name: meta.map(|m| m.target_commit_name.clone()),
            created_at: pr.created_at,
            merged_at: pr.merged_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PullRequestEnvelope {
    pub pull_request: PullRequestView,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApproveResponse {
    pub pull_request: PullRequestView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_commit: Option<Commit>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PullRequestListResponse {
    pub pull_requests: Vec<PullRequestView>,
}
