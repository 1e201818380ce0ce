use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single commit in a repository DAG.
///
/// The `code` blob never travels inside commit JSON; checkout endpoints
/// return it as a raw body instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commit {
    pub commit_id: Uuid,
    pub team_id: Uuid,
    pub root_commit: Uuid,
    pub parent_commit_ids: Vec<Uuid>,
    #[serde(skip, default)]
    pub code: Vec<u8>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_name: Option<String>,
}

impl Commit {
    /// The root commit is its own root and has no parents.
    pub fn is_root(&self) -> bool {
        self.commit_id == self.root_commit && self.parent_commit_ids.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub team_id: Uuid,
    pub team_name: String,
    pub members: Vec<TeamMember>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMember {
    pub user_id: String,
    pub username: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_name: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrStatus {
    #[serde(rename = "OPEN")]
    Open,
    #[serde(rename = "MERGED")]
    Merged,
    #[serde(rename = "REJECTED")]
    Rejected,
}

impl PrStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrStatus::Open => "OPEN",
            PrStatus::Merged => "MERGED",
            PrStatus::Rejected => "REJECTED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "OPEN" => Some(PrStatus::Open),
            "MERGED" => Some(PrStatus::Merged),
            "REJECTED" => Some(PrStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
    pub status: PrStatus,
    pub assigned_reviewers: Vec<String>,
    pub approved_by: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merged_at: Option<DateTime<Utc>>,
}

impl PullRequest {
    /// The all-approved gate: every assigned reviewer is in `approved_by`.
    /// An empty reviewer list is trivially approved.
    pub fn all_approved(&self) -> bool {
        self.assigned_reviewers
            .iter()
            .all(|r| self.approved_by.contains(r))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrReassignment {
    pub pull_request_id: String,
    pub old_reviewers: Vec<String>,
    pub new_reviewers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkDeactivateReport {
    pub deactivated_count: usize,
    pub reassigned_prs: Vec<PrReassignment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAssignmentStats {
    pub user_id: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_name: Option<String>,
    pub assigned_prs_count: usize,
    pub open_prs_count: usize,
    pub merged_prs_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statistics {
    pub total_prs: usize,
    pub open_prs: usize,
    pub merged_prs: usize,
    pub total_teams: usize,
    pub total_users: usize,
    pub active_users: usize,
    pub prs_by_status: std::collections::HashMap<String, usize>,
    pub user_assignments: Vec<UserAssignmentStats>,
}
