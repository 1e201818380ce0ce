use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::Commit;

#[derive(Debug, Deserialize)]
pub struct RegisterTeamRequest {
    pub team_id: Uuid,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommitEnvelope {
    pub commit: Commit,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommitListResponse {
    pub commits: Vec<Commit>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MergeRequest {
    pub team_id: Uuid,
    pub root_commit: Uuid,
    pub commit_id1: Uuid,
    pub commit_id2: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutParams {
    pub team_id: Uuid,
    pub root_commit: Uuid,
    pub commit_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct CommitIdParams {
    pub team_id: Uuid,
    pub root_commit: Uuid,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ListCommitsParams {
    pub team_id: Uuid,
    pub root_commit: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct RootCommitParams {
    pub team_id: Uuid,
    pub repo_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommitNameResponse {
    pub commit_id: Uuid,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommitIdResponse {
    pub commit_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RootCommitResponse {
    pub root_commit: Uuid,
}
