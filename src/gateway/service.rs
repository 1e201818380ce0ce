use std::sync::Arc;

use uuid::Uuid;

use super::client::{AllocationClient, StorageClient};
use super::registry::{PrMetadata, PrRegistry, RepoRegistry};
use crate::error::{Error, Result};
use crate::types::{BulkDeactivateReport, Commit, PullRequest, Team, TeamMember, User};

/// Orchestration layer binding user-visible names to DAG identifiers and
/// sequencing calls across the two backend services.
#[derive(Clone)]
pub struct GatewayService {
    allocation: AllocationClient,
    storage: StorageClient,
    repos: Arc<RepoRegistry>,
    prs: Arc<PrRegistry>,
}

impl GatewayService {
    pub fn new(allocation: AllocationClient, storage: StorageClient) -> Self {
        Self {
            allocation,
            storage,
            repos: Arc::new(RepoRegistry::new()),
            prs: Arc::new(PrRegistry::new()),
        }
    }

    /// Loads the requesting user and enforces activity and, when the
    /// request is team-scoped, team membership.
    pub async fn authorize(&self, username: &str, team_name: Option<&str>) -> Result<User> {
        let user = self.allocation.get_user(username).await?;
        if !user.is_active {
            return Err(Error::UserInactive);
        }
        if let Some(team_name) = team_name {
            if user.team_name.as_deref() != Some(team_name) {
                return Err(Error::AccessDenied);
            }
        }
        Ok(user)
    }

    pub async fn user_profile(&self, username: &str) -> Result<User> {
        self.allocation.get_user(username).await
    }

    pub async fn create_team(&self, team_name: &str, members: Vec<TeamMember>) -> Result<Team> {
        let team = self.allocation.create_team(team_name, &members).await?;
        // The storage engine keeps its own team registry; register the fresh
        // id so DAG operations recognize the team.
        self.storage
            .register_team(team.team_id, &team.team_name)
            .await?;
        tracing::info!(team_name, team_id = %team.team_id, "team created");
        Ok(team)
    }

    pub async fn get_team(&self, team_name: &str) -> Result<Team> {
        self.allocation.get_team(team_name).await
    }

    pub async fn deactivate_team(&self, team_name: &str) -> Result<BulkDeactivateReport> {
        self.allocation.deactivate_team_users(team_name).await
    }

    async fn resolve_team_id(&self, team_name: &str) -> Result<Uuid> {
        self.allocation.resolve_team_id(team_name).await
    }

    /// Resolves a repository name to its root commit, reading through the
    /// process-local cache to the storage service.
    async fn resolve_root(&self, team_id: Uuid, repo_name: &str) -> Result<Uuid> {
        if let Some(root) = self.repos.get(team_id, repo_name) {
            return Ok(root);
        }
        let root = self.storage.root_by_repo_name(team_id, repo_name).await?;
        self.repos.insert(team_id, repo_name, root);
        Ok(root)
    }

    /// Resolves a commit name within a repository. The repository name
    /// always denotes the root commit; everything else is a name binding.
    async fn resolve_commit(
        &self,
        team_id: Uuid,
        repo_name: &str,
        root_commit: Uuid,
        commit_name: &str,
    ) -> Result<Uuid> {
        if commit_name == repo_name {
            return Ok(root_commit);
        }
        self.storage
            .commit_id_by_name(team_id, root_commit, commit_name)
            .await
    }

    pub async fn init_repository(
        &self,
        team_name: &str,
        repo_name: &str,
        commit_name: Option<&str>,
        code: Vec<u8>,
    ) -> Result<Commit> {
        let team_id = self.resolve_team_id(team_name).await?;
        let commit = self
            .storage
            .init_repository(team_id, repo_name, commit_name, code)
            .await?;
        self.repos.insert(team_id, repo_name, commit.root_commit);

        tracing::info!(
            team_name,
            repo_name,
            root_commit = %commit.root_commit,
            "repository initialized"
        );
        Ok(commit)
    }

    pub async fn push(
        &self,
        team_name: &str,
        repo_name: &str,
        parent_commit_name: &str,
        commit_name: Option<&str>,
        code: Vec<u8>,
    ) -> Result<Commit> {
        let team_id = self.resolve_team_id(team_name).await?;
        let root = self.resolve_root(team_id, repo_name).await?;
        let parent = self
            .resolve_commit(team_id, repo_name, root, parent_commit_name)
            .await?;

        let commit = self
            .storage
            .push(team_id, root, parent, commit_name, code)
            .await?;
        tracing::info!(repo_name, commit_id = %commit.commit_id, "commit pushed");
        Ok(commit)
    }

    pub async fn checkout(
        &self,
        team_name: &str,
        repo_name: &str,
        commit_name: &str,
    ) -> Result<Vec<u8>> {
        let team_id = self.resolve_team_id(team_name).await?;
        let root = self.resolve_root(team_id, repo_name).await?;
        let commit_id = self
            .resolve_commit(team_id, repo_name, root, commit_name)
            .await?;
        self.storage.checkout(team_id, root, commit_id).await
    }

    pub async fn create_pr(
        &self,
        author: &User,
        team_name: &str,
        pr_name: &str,
        repo_name: &str,
        source_commit_name: &str,
        target_commit_name: &str,
    ) -> Result<(PullRequest, PrMetadata)> {
        let team_id = self.resolve_team_id(team_name).await?;
        let root = self.resolve_root(team_id, repo_name).await?;
        let source = self
            .resolve_commit(team_id, repo_name, root, source_commit_name)
            .await?;
        let target = self
            .resolve_commit(team_id, repo_name, root, target_commit_name)
            .await?;

        let pr_id = synthesize_pr_id();
        let pr = self
            .allocation
            .create_pr(&pr_id, pr_name, &author.user_id)
            .await?;

        let meta = PrMetadata {
            pr_id: pr_id.clone(),
            team_id,
            team_name: team_name.to_string(),
            repo_name: repo_name.to_string(),
            root_commit: root,
            source_commit: source,
            source_commit_name: source_commit_name.to_string(),
            target_commit: target,
            target_commit_name: target_commit_name.to_string(),
        };
        self.prs.insert(pr_name, meta.clone());

        tracing::info!(
            pr_id = %pr_id,
            author_id = %author.user_id,
            reviewers = ?pr.assigned_reviewers,
            "PR created"
        );
        Ok((pr, meta))
    }

    pub fn pr_metadata(&self, team_name: &str, pr_name: &str) -> Result<PrMetadata> {
        self.prs
            .get_by_name(team_name, pr_name)
            .ok_or(Error::PrNotFound)
    }

    pub fn pr_metadata_by_id(&self, pr_id: &str) -> Option<PrMetadata> {
        self.prs.get_by_id(pr_id)
    }

    /// The approve-and-merge sequence:
    ///
    /// 1. record the approval with the allocation service;
    /// 2. if the gate is still open, return the PR unchanged;
    /// 3. otherwise merge source into target in the DAG;
    /// 4. record the PR as merged with the allocation service.
    ///
    /// Steps 3-4 run in a spawned task so a client disconnect cannot sever
    /// the pair; a step-3 result is remembered per PR so an approve retry
    /// after a step-4 failure does not mint a second merge commit.
    pub async fn approve_pr(
        &self,
        username: &str,
        meta: &PrMetadata,
    ) -> Result<(PullRequest, Option<Commit>)> {
        let (pr, all_approved) = self.allocation.approve_pr(&meta.pr_id, username).await?;
        if !all_approved {
            return Ok((pr, None));
        }

        let this = self.clone();
        let meta = meta.clone();
        tokio::spawn(async move { this.finish_merge(&meta).await })
            .await
            .map_err(|e| Error::Internal(format!("merge task failed: {e}")))?
    }

    async fn finish_merge(&self, meta: &PrMetadata) -> Result<(PullRequest, Option<Commit>)> {
        let merge_commit = match self.prs.merge_commit(&meta.pr_id) {
            Some(existing) => existing,
            None => {
                let commit = self
                    .storage
                    .merge(
                        meta.team_id,
                        meta.root_commit,
                        meta.source_commit,
                        meta.target_commit,
                    )
                    .await?;
                self.prs.record_merge(&meta.pr_id, commit.clone());
                commit
            }
        };

        let pr = self.allocation.merge_pr(&meta.pr_id).await?;
        tracing::info!(
            pr_id = %meta.pr_id,
            merge_commit = %merge_commit.commit_id,
            "PR approved and merged"
        );
        Ok((pr, Some(merge_commit)))
    }

    pub async fn reject_pr(
        &self,
        username: &str,
        meta: &PrMetadata,
        reason: Option<&str>,
    ) -> Result<PullRequest> {
        self.allocation
            .reject_pr(&meta.pr_id, username, reason)
            .await
    }

    /// Checkout of the PR's source commit.
    pub async fn pr_code(&self, meta: &PrMetadata) -> Result<Vec<u8>> {
        self.storage
            .checkout(meta.team_id, meta.root_commit, meta.source_commit)
            .await
    }

    pub async fn authored_prs(
        &self,
        user_id: &str,
        status: Option<&str>,
    ) -> Result<Vec<PullRequest>> {
        let prs = self.allocation.prs_by_author(user_id).await?;
        Ok(filter_by_status(prs, status))
    }

    pub async fn review_prs(
        &self,
        user_id: &str,
        status: Option<&str>,
    ) -> Result<Vec<PullRequest>> {
        let prs = self.allocation.prs_by_reviewer(user_id).await?;
        Ok(filter_by_status(prs, status))
    }
}

fn filter_by_status(prs: Vec<PullRequest>, status: Option<&str>) -> Vec<PullRequest> {
    match status {
        Some(status) if !status.is_empty() => prs
            .into_iter()
            .filter(|pr| pr.status.as_str() == status)
            .collect(),
        _ => prs,
    }
}

/// PR ids are synthesized by the gateway: "pr-" plus the first eight hex
/// digits of a fresh UUID.
fn synthesize_pr_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("pr-{}", &id[..8])
}
