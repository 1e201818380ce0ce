use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{BulkDeactivateReport, Commit, PullRequest, Team, TeamMember, User};

#[derive(Debug, Deserialize)]
struct WireErrorBody {
    error: WireErrorDetail,
}

#[derive(Debug, Deserialize)]
struct WireErrorDetail {
    code: String,
    message: String,
}

/// Decode a backend response, turning error bodies back into their original
/// error kinds.
async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    if status.is_success() {
        return resp
            .json()
            .await
            .map_err(|e| Error::Internal(format!("failed to decode response: {e}")));
    }
    Err(decode_error(status, resp).await)
}

async fn decode_error(status: StatusCode, resp: reqwest::Response) -> Error {
    match resp.json::<WireErrorBody>().await {
        Ok(body) => Error::from_wire(&body.error.code, &body.error.message),
        Err(e) => Error::Internal(format!("upstream returned {status}: {e}")),
    }
}

fn transport_error(e: reqwest::Error) -> Error {
    Error::Internal(format!("upstream request failed: {e}"))
}

fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Config(format!("failed to build http client: {e}")))
}

/// Client for the PR allocation service.
#[derive(Clone)]
pub struct AllocationClient {
    base_url: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TeamEnvelope {
    team: Team,
}

#[derive(Debug, Deserialize)]
struct TeamResolveBody {
    team_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct UserEnvelope {
    user: User,
}

#[derive(Debug, Deserialize)]
struct PrEnvelope {
    pr: PullRequest,
}

#[derive(Debug, Deserialize)]
struct ApproveBody {
    pr: PullRequest,
    all_approved: bool,
}

#[derive(Debug, Deserialize)]
struct PrListBody {
    pull_requests: Vec<PullRequest>,
}

impl AllocationClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: base_url.into(),
            http: build_client(timeout)?,
        })
    }

    pub async fn create_team(&self, team_name: &str, members: &[TeamMember]) -> Result<Team> {
        let resp = self
            .http
            .post(format!("{}/team/add", self.base_url))
            .json(&serde_json::json!({ "team_name": team_name, "members": members }))
            .send()
            .await
            .map_err(transport_error)?;
        decode::<TeamEnvelope>(resp).await.map(|b| b.team)
    }

    pub async fn get_team(&self, team_name: &str) -> Result<Team> {
        let resp = self
            .http
            .get(format!("{}/team/get", self.base_url))
            .query(&[("team_name", team_name)])
            .send()
            .await
            .map_err(transport_error)?;
        decode::<TeamEnvelope>(resp).await.map(|b| b.team)
    }

    pub async fn resolve_team_id(&self, team_name: &str) -> Result<Uuid> {
        let resp = self
            .http
            .get(format!("{}/team/resolve", self.base_url))
            .query(&[("team_name", team_name)])
            .send()
            .await
            .map_err(transport_error)?;
        decode::<TeamResolveBody>(resp).await.map(|b| b.team_id)
    }

    pub async fn deactivate_team_users(&self, team_name: &str) -> Result<BulkDeactivateReport> {
        let resp = self
            .http
            .post(format!("{}/team/deactivateUsers", self.base_url))
            .json(&serde_json::json!({ "team_name": team_name }))
            .send()
            .await
            .map_err(transport_error)?;
        decode(resp).await
    }

    pub async fn get_user(&self, user_id: &str) -> Result<User> {
        let resp = self
            .http
            .get(format!("{}/users/get", self.base_url))
            .query(&[("user_id", user_id)])
            .send()
            .await
            .map_err(transport_error)?;
        decode::<UserEnvelope>(resp).await.map(|b| b.user)
    }

    pub async fn prs_by_author(&self, user_id: &str) -> Result<Vec<PullRequest>> {
        let resp = self
            .http
            .get(format!("{}/users/getAuthored", self.base_url))
            .query(&[("user_id", user_id)])
            .send()
            .await
            .map_err(transport_error)?;
        decode::<PrListBody>(resp).await.map(|b| b.pull_requests)
    }

    pub async fn prs_by_reviewer(&self, user_id: &str) -> Result<Vec<PullRequest>> {
        let resp = self
            .http
            .get(format!("{}/users/getReview", self.base_url))
            .query(&[("user_id", user_id)])
            .send()
            .await
            .map_err(transport_error)?;
        decode::<PrListBody>(resp).await.map(|b| b.pull_requests)
    }

    pub async fn create_pr(
        &self,
        pr_id: &str,
        pr_name: &str,
        author_id: &str,
    ) -> Result<PullRequest> {
        let resp = self
            .http
            .post(format!("{}/pullRequest/create", self.base_url))
            .json(&serde_json::json!({
                "pull_request_id": pr_id,
                "pull_request_name": pr_name,
                "author_id": author_id,
            }))
            .send()
            .await
            .map_err(transport_error)?;
        decode::<PrEnvelope>(resp).await.map(|b| b.pr)
    }

    pub async fn approve_pr(&self, pr_id: &str, reviewer_id: &str) -> Result<(PullRequest, bool)> {
        let resp = self
            .http
            .post(format!("{}/pullRequest/approve", self.base_url))
            .json(&serde_json::json!({
                "pull_request_id": pr_id,
                "reviewer_id": reviewer_id,
            }))
            .send()
            .await
            .map_err(transport_error)?;
        decode::<ApproveBody>(resp)
            .await
            .map(|b| (b.pr, b.all_approved))
    }

    pub async fn reject_pr(
        &self,
        pr_id: &str,
        reviewer_id: &str,
        reason: Option<&str>,
    ) -> Result<PullRequest> {
        let resp = self
            .http
            .post(format!("{}/pullRequest/reject", self.base_url))
            .json(&serde_json::json!({
                "pull_request_id": pr_id,
                "reviewer_id": reviewer_id,
                "reason": reason,
            }))
            .send()
            .await
            .map_err(transport_error)?;
        decode::<PrEnvelope>(resp).await.map(|b| b.pr)
    }

    pub async fn merge_pr(&self, pr_id: &str) -> Result<PullRequest> {
        let resp = self
            .http
            .post(format!("{}/pullRequest/merge", self.base_url))
            .json(&serde_json::json!({ "pull_request_id": pr_id }))
            .send()
            .await
            .map_err(transport_error)?;
        decode::<PrEnvelope>(resp).await.map(|b| b.pr)
    }
}

/// Client for the commit DAG storage service. File-bearing calls use a
/// longer timeout than JSON calls.
#[derive(Clone)]
pub struct StorageClient {
    base_url: String,
    http: reqwest::Client,
    file_http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct CommitEnvelope {
    commit: Commit,
}

#[derive(Debug, Deserialize)]
struct CommitIdBody {
    commit_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct RootCommitBody {
    root_commit: Uuid,
}

impl StorageClient {
    pub fn new(
        base_url: impl Into<String>,
        json_timeout: Duration,
        file_timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            base_url: base_url.into(),
            http: build_client(json_timeout)?,
            file_http: build_client(file_timeout)?,
        })
    }

    pub async fn register_team(&self, team_id: Uuid, name: &str) -> Result<()> {
        let resp = self
            .http
            .post(format!("{}/storage/team/add", self.base_url))
            .json(&serde_json::json!({ "team_id": team_id, "name": name }))
            .send()
            .await
            .map_err(transport_error)?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        Err(decode_error(status, resp).await)
    }

    pub async fn init_repository(
        &self,
        team_id: Uuid,
        repo_name: &str,
        commit_name: Option<&str>,
        code: Vec<u8>,
    ) -> Result<Commit> {
        let mut form = reqwest::multipart::Form::new()
            .text("team_id", team_id.to_string())
            .text("repo_name", repo_name.to_string())
            .part(
                "code",
                reqwest::multipart::Part::bytes(code).file_name("code.zip"),
            );
        if let Some(name) = commit_name {
            form = form.text("commit_name", name.to_string());
        }

        let resp = self
            .file_http
            .post(format!("{}/storage/init", self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;
        decode::<CommitEnvelope>(resp).await.map(|b| b.commit)
    }

    pub async fn push(
        &self,
        team_id: Uuid,
        root_commit: Uuid,
        parent_commit: Uuid,
        commit_name: Option<&str>,
        code: Vec<u8>,
    ) -> Result<Commit> {
        let mut form = reqwest::multipart::Form::new()
            .text("team_id", team_id.to_string())
            .text("root_commit", root_commit.to_string())
            .text("commit_id", parent_commit.to_string())
            .part(
                "code",
                reqwest::multipart::Part::bytes(code).file_name("code.zip"),
            );
        if let Some(name) = commit_name {
            form = form.text("commit_name", name.to_string());
        }

        let resp = self
            .file_http
            .post(format!("{}/storage/push", self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;
        decode::<CommitEnvelope>(resp).await.map(|b| b.commit)
    }

    pub async fn checkout(
        &self,
        team_id: Uuid,
        root_commit: Uuid,
        commit_id: Uuid,
    ) -> Result<Vec<u8>> {
        let resp = self
            .file_http
            .get(format!("{}/storage/checkout", self.base_url))
            .query(&[
                ("team_id", team_id.to_string()),
                ("root_commit", root_commit.to_string()),
                ("commit_id", commit_id.to_string()),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(decode_error(status, resp).await);
        }
        let bytes = resp.bytes().await.map_err(transport_error)?;
        Ok(bytes.to_vec())
    }

    pub async fn merge(
        &self,
        team_id: Uuid,
        root_commit: Uuid,
        commit_id1: Uuid,
        commit_id2: Uuid,
    ) -> Result<Commit> {
        let resp = self
            .http
            .post(format!("{}/storage/merge", self.base_url))
            .json(&serde_json::json!({
                "team_id": team_id,
                "root_commit": root_commit,
                "commit_id1": commit_id1,
                "commit_id2": commit_id2,
            }))
            .send()
            .await
            .map_err(transport_error)?;
        decode::<CommitEnvelope>(resp).await.map(|b| b.commit)
    }

    pub async fn commit_id_by_name(
        &self,
        team_id: Uuid,
        root_commit: Uuid,
        name: &str,
    ) -> Result<Uuid> {
        let resp = self
            .http
            .get(format!("{}/storage/commitID", self.base_url))
            .query(&[
                ("team_id", team_id.to_string()),
                ("root_commit", root_commit.to_string()),
                ("name", name.to_string()),
            ])
            .send()
            .await
            .map_err(transport_error)?;
        decode::<CommitIdBody>(resp).await.map(|b| b.commit_id)
    }

    pub async fn root_by_repo_name(&self, team_id: Uuid, repo_name: &str) -> Result<Uuid> {
        let resp = self
            .http
            .get(format!("{}/storage/rootCommit", self.base_url))
            .query(&[
                ("team_id", team_id.to_string()),
                ("repo_name", repo_name.to_string()),
            ])
            .send()
            .await
            .map_err(transport_error)?;
        decode::<RootCommitBody>(resp).await.map(|b| b.root_commit)
    }
}
