use uuid::Uuid;

use crate::error::Result;
use crate::types::Commit;

/// DagStore defines the database interface of the commit DAG engine.
///
/// Every write that creates a commit is atomic with respect to its parent
/// edges and optional name binding: a successful return implies the name is
/// resolvable.
pub trait DagStore: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // Team registry
    fn register_team(&self, team_id: Uuid, name: &str) -> Result<()>;
    fn team_exists(&self, team_id: Uuid) -> Result<bool>;

    // Commit operations
    fn init_repository(
        &self,
        team_id: Uuid,
        repo_name: Option<&str>,
        commit_name: Option<&str>,
        code: &[u8],
    ) -> Result<Commit>;
    fn create_commit(
        &self,
        team_id: Uuid,
        root_commit: Uuid,
        parent_id: Uuid,
        commit_name: Option<&str>,
        code: &[u8],
    ) -> Result<Commit>;
    fn merge_commits(
        &self,
        team_id: Uuid,
        root_commit: Uuid,
        commit_id1: Uuid,
        commit_id2: Uuid,
    ) -> Result<Commit>;
    fn get_commit(
        &self,
        team_id: Uuid,
        root_commit: Uuid,
        commit_id: Uuid,
    ) -> Result<Option<Commit>>;
    fn get_commit_code(
        &self,
        team_id: Uuid,
        root_commit: Uuid,
        commit_id: Uuid,
    ) -> Result<Option<Vec<u8>>>;
    fn list_commits(&self, team_id: Uuid, root_commit: Uuid) -> Result<Vec<Commit>>;

    /// A commit is a leaf iff no commit in the same repository lists it as a parent.
    fn is_leaf_commit(&self, team_id: Uuid, root_commit: Uuid, commit_id: Uuid) -> Result<bool>;
    fn root_commit_exists(&self, team_id: Uuid, root_commit: Uuid) -> Result<bool>;

    // Name bindings
    fn get_commit_name(&self, commit_id: Uuid) -> Result<Option<String>>;
    fn get_commit_id_by_name(
        &self,
        team_id: Uuid,
        root_commit: Uuid,
        name: &str,
    ) -> Result<Option<Uuid>>;
    fn get_root_by_repo_name(&self, team_id: Uuid, repo_name: &str) -> Result<Option<Uuid>>;
}
