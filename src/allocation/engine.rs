use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use uuid::Uuid;

use super::store::AllocationStore;
use crate::error::{Error, Result};
use crate::types::{
    BulkDeactivateReport, PrReassignment, PrStatus, PullRequest, Statistics, Team, TeamMember,
    User, UserAssignmentStats,
};

/// Reviewer capacity that bulk deactivation refills toward, independent of
/// the creation-time target.
const REFILL_CAPACITY: usize = 2;

/// Business logic of the PR allocation service.
///
/// `reviewer_target` is the number of reviewers assigned at PR creation
/// (capped by the candidate pool). The random source is injectable so tests
/// can seed selection.
pub struct AllocationEngine {
    store: Arc<dyn AllocationStore>,
    reviewer_target: usize,
    rng: Mutex<StdRng>,
}

impl AllocationEngine {
    pub fn new(store: Arc<dyn AllocationStore>, reviewer_target: usize) -> Self {
        Self::with_rng(store, reviewer_target, StdRng::from_entropy())
    }

    pub fn with_rng(store: Arc<dyn AllocationStore>, reviewer_target: usize, rng: StdRng) -> Self {
        Self {
            store,
            reviewer_target,
            rng: Mutex::new(rng),
        }
    }

    pub fn initialize(&self) -> Result<()> {
        self.store.initialize()
    }

    pub fn create_team(&self, team_name: &str, members: Vec<TeamMember>) -> Result<Team> {
        tracing::info!(team_name, "creating team");
        if self.store.team_exists(team_name)? {
            return Err(Error::TeamExists);
        }
        let team = Team {
            team_id: Uuid::new_v4(),
            team_name: team_name.to_string(),
            members,
        };
        self.store.create_team(&team)?;
        Ok(team)
    }

    pub fn get_team(&self, team_name: &str) -> Result<Team> {
        self.store.get_team(team_name)?.ok_or(Error::TeamNotFound)
    }

    pub fn team_id_by_name(&self, team_name: &str) -> Result<Uuid> {
        self.store
            .team_id_by_name(team_name)?
            .ok_or(Error::TeamNotFound)
    }

    pub fn get_user(&self, user_id: &str) -> Result<User> {
        self.store.get_user(user_id)?.ok_or(Error::UserNotFound)
    }

    pub fn set_user_active(&self, user_id: &str, is_active: bool) -> Result<User> {
        tracing::info!(user_id, is_active, "setting user active status");
        let mut user = self.get_user(user_id)?;
        user.is_active = is_active;
        self.store.update_user(&user)?;
        Ok(user)
    }

    /// Creates a PR and assigns up to `reviewer_target` reviewers, drawn
    /// uniformly from the author's active teammates.
    pub fn create_pr(&self, pr_id: &str, pr_name: &str, author_id: &str) -> Result<PullRequest> {
        tracing::info!(pr_id, author_id, "creating PR");
        if self.store.pr_exists(pr_id)? {
            return Err(Error::PrExists);
        }
        let author = self.get_user(author_id)?;
        let team_id = author.team_id.ok_or(Error::UserNotFound)?;
        let team_members = self.store.users_by_team(team_id)?;

        let reviewers = self.select_reviewers(&team_members, author_id, self.reviewer_target);

        let pr = PullRequest {
            pull_request_id: pr_id.to_string(),
            pull_request_name: pr_name.to_string(),
            author_id: author_id.to_string(),
            status: PrStatus::Open,
            assigned_reviewers: reviewers,
            approved_by: vec![],
            created_at: Utc::now(),
            merged_at: None,
        };
        self.store.create_pr(&pr)?;

        tracing::info!(
            pr_id,
            reviewers = ?pr.assigned_reviewers,
            "PR created with reviewers"
        );
        Ok(pr)
    }

    pub fn get_pr(&self, pr_id: &str) -> Result<PullRequest> {
        self.store.get_pr(pr_id)?.ok_or(Error::PrNotFound)
    }

    /// Records a reviewer's approval. Idempotent for a reviewer who already
    /// approved. Returns the PR and whether the all-approved gate now holds.
    pub fn approve_pr(&self, pr_id: &str, reviewer_id: &str) -> Result<(PullRequest, bool)> {
        tracing::info!(pr_id, reviewer_id, "approving PR");
        let mut pr = self.get_pr(pr_id)?;

        if pr.status != PrStatus::Open {
            return Err(Error::PrNotOpen);
        }
        if !pr.assigned_reviewers.iter().any(|r| r == reviewer_id) {
            return Err(Error::NotReviewer);
        }
        if pr.approved_by.iter().any(|a| a == reviewer_id) {
            let all = pr.all_approved();
            return Ok((pr, all));
        }

        pr.approved_by.push(reviewer_id.to_string());
        self.store.update_pr(&pr)?;

        let all_approved = pr.all_approved();
        tracing::info!(pr_id, reviewer_id, all_approved, "PR approved by reviewer");
        Ok((pr, all_approved))
    }

    /// Rejects an open PR. Rejecting an already-rejected PR is a no-op
    /// returning current state.
    pub fn reject_pr(&self, pr_id: &str, reviewer_id: &str, reason: Option<&str>) -> Result<PullRequest> {
        tracing::info!(pr_id, reviewer_id, reason = reason.unwrap_or(""), "rejecting PR");
        let mut pr = self.get_pr(pr_id)?;

        if pr.status == PrStatus::Rejected {
            return Ok(pr);
        }
        if pr.status != PrStatus::Open {
            return Err(Error::PrNotOpen);
        }
        if !pr.assigned_reviewers.iter().any(|r| r == reviewer_id) {
            return Err(Error::NotReviewer);
        }

        pr.status = PrStatus::Rejected;
        self.store.update_pr(&pr)?;
        Ok(pr)
    }

    /// Marks the PR as merged once every assigned reviewer has approved.
    /// Idempotent on an already-merged PR (same `merged_at`). This records
    /// the merge only; the DAG write is sequenced by the gateway.
    pub fn merge_pr(&self, pr_id: &str) -> Result<PullRequest> {
        tracing::info!(pr_id, "merging PR");
        let mut pr = self.get_pr(pr_id)?;

        if pr.status == PrStatus::Merged {
            tracing::info!(pr_id, "PR already merged");
            return Ok(pr);
        }
        if pr.status == PrStatus::Rejected {
            return Err(Error::PrRejected);
        }
        if !pr.all_approved() {
            return Err(Error::NotAllApproved);
        }

        pr.status = PrStatus::Merged;
        if pr.merged_at.is_none() {
            pr.merged_at = Some(Utc::now());
        }
        self.store.update_pr(&pr)?;
        Ok(pr)
    }

    /// Replaces one assigned reviewer with a random active teammate,
    /// preserving list position. Any approval by the outgoing reviewer is
    /// dropped.
    pub fn reassign_reviewer(
        &self,
        pr_id: &str,
        old_user_id: &str,
    ) -> Result<(String, PullRequest)> {
        tracing::info!(pr_id, old_user_id, "reassigning reviewer");
        let mut pr = self.get_pr(pr_id)?;

        if pr.status == PrStatus::Merged {
            return Err(Error::PrMerged);
        }
        let Some(old_index) = pr
            .assigned_reviewers
            .iter()
            .position(|r| r == old_user_id)
        else {
            return Err(Error::NotReviewer);
        };

        let old_reviewer = self.get_user(old_user_id)?;
        let team_id = old_reviewer.team_id.ok_or(Error::UserNotFound)?;
        let team_members = self.store.users_by_team(team_id)?;

        let mut exclude: HashSet<&str> = HashSet::new();
        exclude.insert(pr.author_id.as_str());
        for r in &pr.assigned_reviewers {
            exclude.insert(r.as_str());
        }

        let candidates: Vec<&User> = team_members
            .iter()
            .filter(|m| m.is_active && !exclude.contains(m.user_id.as_str()))
            .collect();
        if candidates.is_empty() {
            return Err(Error::NoCandidate);
        }

        let new_reviewer = {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            match candidates.choose(&mut *rng) {
                Some(user) => user.user_id.clone(),
                None => return Err(Error::NoCandidate),
            }
        };

        pr.assigned_reviewers[old_index] = new_reviewer.clone();
        pr.approved_by.retain(|a| a != old_user_id);
        self.store.update_pr(&pr)?;

        tracing::info!(pr_id, old = old_user_id, new = %new_reviewer, "reviewer reassigned");
        Ok((new_reviewer, pr))
    }

    pub fn prs_by_reviewer(&self, user_id: &str) -> Result<Vec<PullRequest>> {
        self.store.prs_by_reviewer(user_id)
    }

    pub fn prs_by_author(&self, user_id: &str) -> Result<Vec<PullRequest>> {
        self.store.prs_by_author(user_id)
    }

    /// Deactivates every active member of a team and reassigns their open
    /// PR review slots, refilling each PR toward two reviewers from the
    /// author's team.
    pub fn bulk_deactivate_team(&self, team_name: &str) -> Result<BulkDeactivateReport> {
        tracing::info!(team_name, "bulk deactivating team users");
        let team = self
            .store
            .get_team(team_name)?
            .ok_or(Error::TeamNotFound)?;

        let deactivating: Vec<String> = team
            .members
            .iter()
            .filter(|m| m.is_active)
            .map(|m| m.user_id.clone())
            .collect();
        if deactivating.is_empty() {
            tracing::info!(team_name, "no active users to deactivate");
            return Ok(BulkDeactivateReport {
                deactivated_count: 0,
                reassigned_prs: vec![],
            });
        }
        let deactivating_set: HashSet<&str> =
            deactivating.iter().map(String::as_str).collect();

        let open_prs = self.store.open_prs_by_reviewers(&deactivating)?;
        tracing::info!(
            count = open_prs.len(),
            users = ?deactivating,
            "found open PRs to reassign"
        );

        let mut reassignments = Vec::new();
        for mut pr in open_prs {
            let old_reviewers = pr.assigned_reviewers.clone();
            let mut new_reviewers: Vec<String> = pr
                .assigned_reviewers
                .iter()
                .filter(|r| !deactivating_set.contains(r.as_str()))
                .cloned()
                .collect();
            if new_reviewers.len() == old_reviewers.len() {
                continue;
            }

            // Refill from the author's team, skipping the author, everyone
            // still assigned, and everyone being deactivated.
            match self.refill_candidates(&pr, &new_reviewers, &deactivating_set) {
                Ok(mut candidates) => {
                    let needed = REFILL_CAPACITY.saturating_sub(new_reviewers.len());
                    if needed > 0 && !candidates.is_empty() {
                        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
                        candidates.shuffle(&mut *rng);
                        new_reviewers.extend(candidates.into_iter().take(needed));
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        pr_id = %pr.pull_request_id,
                        "failed to collect refill candidates: {e}"
                    );
                }
            }

            pr.assigned_reviewers = new_reviewers.clone();
            if let Err(e) = self.store.update_pr(&pr) {
                tracing::error!(pr_id = %pr.pull_request_id, "failed to update PR: {e}");
                continue;
            }

            tracing::info!(
                pr_id = %pr.pull_request_id,
                old_reviewers = ?old_reviewers,
                new_reviewers = ?new_reviewers,
                "PR reviewers reassigned"
            );
            reassignments.push(PrReassignment {
                pull_request_id: pr.pull_request_id.clone(),
                old_reviewers,
                new_reviewers,
            });
        }

        self.store.bulk_set_users_active(&deactivating, false)?;
        tracing::info!(
            deactivated_count = deactivating.len(),
            reassigned_prs = reassignments.len(),
            "bulk deactivation completed"
        );

        Ok(BulkDeactivateReport {
            deactivated_count: deactivating.len(),
            reassigned_prs: reassignments,
        })
    }

    fn refill_candidates(
        &self,
        pr: &PullRequest,
        kept_reviewers: &[String],
        deactivating: &HashSet<&str>,
    ) -> Result<Vec<String>> {
        let author = self.get_user(&pr.author_id)?;
        let team_id = author.team_id.ok_or(Error::UserNotFound)?;
        let team_members = self.store.users_by_team(team_id)?;

        Ok(team_members
            .into_iter()
            .filter(|m| {
                m.is_active
                    && m.user_id != pr.author_id
                    && !kept_reviewers.contains(&m.user_id)
                    && !deactivating.contains(m.user_id.as_str())
            })
            .map(|m| m.user_id)
            .collect())
    }

    pub fn statistics(&self) -> Result<Statistics> {
        tracing::info!("fetching statistics");
        let total_prs = self.store.count_prs()?;
        let open_prs = self.store.count_prs_by_status(PrStatus::Open)?;
        let merged_prs = self.store.count_prs_by_status(PrStatus::Merged)?;
        let rejected_prs = self.store.count_prs_by_status(PrStatus::Rejected)?;

        let mut prs_by_status = HashMap::new();
        prs_by_status.insert("OPEN".to_string(), open_prs);
        prs_by_status.insert("MERGED".to_string(), merged_prs);
        prs_by_status.insert("REJECTED".to_string(), rejected_prs);

        let users = self.store.all_users()?;
        let all_prs = self.store.all_prs()?;

        let mut assignments: HashMap<String, UserAssignmentStats> = users
            .iter()
            .map(|u| {
                (
                    u.user_id.clone(),
                    UserAssignmentStats {
                        user_id: u.user_id.clone(),
                        username: u.username.clone(),
                        team_name: u.team_name.clone(),
                        assigned_prs_count: 0,
                        open_prs_count: 0,
                        merged_prs_count: 0,
                    },
                )
            })
            .collect();

        for pr in &all_prs {
            for reviewer in &pr.assigned_reviewers {
                if let Some(stats) = assignments.get_mut(reviewer) {
                    stats.assigned_prs_count += 1;
                    match pr.status {
                        PrStatus::Open => stats.open_prs_count += 1,
                        PrStatus::Merged => stats.merged_prs_count += 1,
                        PrStatus::Rejected => {}
                    }
                }
            }
        }

        Ok(Statistics {
            total_prs,
            open_prs,
            merged_prs,
            total_teams: self.store.count_teams()?,
            total_users: self.store.count_users()?,
            active_users: self.store.count_active_users()?,
            prs_by_status,
            user_assignments: assignments.into_values().collect(),
        })
    }

    fn select_reviewers(
        &self,
        team_members: &[User],
        author_id: &str,
        max_count: usize,
    ) -> Vec<String> {
        let mut candidates: Vec<&User> = team_members
            .iter()
            .filter(|m| m.is_active && m.user_id != author_id)
            .collect();
        if candidates.is_empty() {
            return vec![];
        }
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        candidates.shuffle(&mut *rng);
        candidates
            .iter()
            .take(max_count.min(candidates.len()))
            .map(|u| u.user_id.clone())
            .collect()
    }
}
