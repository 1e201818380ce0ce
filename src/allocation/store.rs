use uuid::Uuid;

use crate::error::Result;
use crate::types::{PrStatus, PullRequest, Team, User};

/// AllocationStore defines the database interface of the PR allocation service.
pub trait AllocationStore: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // Team operations. Team creation (team row + member upserts) is atomic.
    fn create_team(&self, team: &Team) -> Result<()>;
    fn team_exists(&self, team_name: &str) -> Result<bool>;
    fn get_team(&self, team_name: &str) -> Result<Option<Team>>;
    fn team_id_by_name(&self, team_name: &str) -> Result<Option<Uuid>>;
    fn count_teams(&self) -> Result<usize>;

    // User operations
    fn get_user(&self, user_id: &str) -> Result<Option<User>>;
    fn update_user(&self, user: &User) -> Result<()>;
    fn users_by_team(&self, team_id: Uuid) -> Result<Vec<User>>;
    fn bulk_set_users_active(&self, user_ids: &[String], is_active: bool) -> Result<()>;
    fn all_users(&self) -> Result<Vec<User>>;
    fn count_users(&self) -> Result<usize>;
    fn count_active_users(&self) -> Result<usize>;

    // PR operations. update_pr persists status, reviewers, and approvals in
    // one transaction; callers do read-modify-write under the engine.
    fn create_pr(&self, pr: &PullRequest) -> Result<()>;
    fn pr_exists(&self, pr_id: &str) -> Result<bool>;
    fn get_pr(&self, pr_id: &str) -> Result<Option<PullRequest>>;
    fn update_pr(&self, pr: &PullRequest) -> Result<()>;
    fn prs_by_reviewer(&self, user_id: &str) -> Result<Vec<PullRequest>>;
    fn prs_by_author(&self, user_id: &str) -> Result<Vec<PullRequest>>;
    fn open_prs_by_reviewers(&self, user_ids: &[String]) -> Result<Vec<PullRequest>>;
    fn all_prs(&self) -> Result<Vec<PullRequest>>;
    fn count_prs(&self) -> Result<usize>;
    fn count_prs_by_status(&self, status: PrStatus) -> Result<usize>;
}
