use std::sync::Arc;

use uuid::Uuid;

use super::store::DagStore;
use crate::error::{Error, Result};
use crate::types::Commit;

/// Business logic of the commit DAG engine: existence and structural checks
/// in front of the store writes.
pub struct DagService {
    store: Arc<dyn DagStore>,
}

impl DagService {
    pub fn new(store: Arc<dyn DagStore>) -> Self {
        Self { store }
    }

    pub fn register_team(&self, team_id: Uuid, name: &str) -> Result<()> {
        self.store.register_team(team_id, name)
    }

    fn require_team(&self, team_id: Uuid) -> Result<()> {
        if !self.store.team_exists(team_id)? {
            return Err(Error::TeamNotFound);
        }
        Ok(())
    }

    fn require_root(&self, team_id: Uuid, root_commit: Uuid) -> Result<()> {
        if !self.store.root_commit_exists(team_id, root_commit)? {
            return Err(Error::RootCommitNotFound);
        }
        Ok(())
    }

    pub fn init_repository(
        &self,
        team_id: Uuid,
        repo_name: Option<&str>,
        commit_name: Option<&str>,
        code: &[u8],
    ) -> Result<Commit> {
        self.require_team(team_id)?;

        let commit = self
            .store
            .init_repository(team_id, repo_name, commit_name, code)?;

        tracing::info!(
            team_id = %team_id,
            root_commit = %commit.commit_id,
            commit_name = commit_name.unwrap_or(""),
            "repository initialized"
        );
        Ok(commit)
    }

    pub fn push(
        &self,
        team_id: Uuid,
        root_commit: Uuid,
        parent_commit_id: Uuid,
        commit_name: Option<&str>,
        code: &[u8],
    ) -> Result<Commit> {
        self.require_team(team_id)?;
        self.require_root(team_id, root_commit)?;

        // The parent must live within the same (team, root) scope.
        if self
            .store
            .get_commit(team_id, root_commit, parent_commit_id)?
            .is_none()
        {
            return Err(Error::InvalidParent);
        }

        let commit =
            self.store
                .create_commit(team_id, root_commit, parent_commit_id, commit_name, code)?;

        tracing::info!(
            commit_id = %commit.commit_id,
            parent_id = %parent_commit_id,
            commit_name = commit_name.unwrap_or(""),
            "commit created"
        );
        Ok(commit)
    }

    pub fn checkout(&self, team_id: Uuid, root_commit: Uuid, commit_id: Uuid) -> Result<Vec<u8>> {
        self.require_team(team_id)?;
        self.require_root(team_id, root_commit)?;

        self.store
            .get_commit_code(team_id, root_commit, commit_id)?
            .ok_or(Error::CommitNotFound)
    }

    pub fn merge(
        &self,
        team_id: Uuid,
        root_commit: Uuid,
        commit_id1: Uuid,
        commit_id2: Uuid,
    ) -> Result<Commit> {
        self.require_team(team_id)?;
        self.require_root(team_id, root_commit)?;

        for id in [commit_id1, commit_id2] {
            if self.store.get_commit(team_id, root_commit, id)?.is_none() {
                return Err(Error::CommitNotFound);
            }
        }
        for id in [commit_id1, commit_id2] {
            if !self.store.is_leaf_commit(team_id, root_commit, id)? {
                return Err(Error::CommitNotLeaf);
            }
        }

        let commit = self
            .store
            .merge_commits(team_id, root_commit, commit_id1, commit_id2)?;

        tracing::info!(
            commit_id = %commit.commit_id,
            parent1 = %commit_id1,
            parent2 = %commit_id2,
            "merge commit created"
        );
        Ok(commit)
    }

    pub fn commit_name(&self, commit_id: Uuid) -> Result<String> {
        self.store
            .get_commit_name(commit_id)?
            .ok_or(Error::CommitNotFound)
    }

    pub fn commit_id_by_name(
        &self,
        team_id: Uuid,
        root_commit: Uuid,
        name: &str,
    ) -> Result<Uuid> {
        self.require_team(team_id)?;
        self.require_root(team_id, root_commit)?;

        self.store
            .get_commit_id_by_name(team_id, root_commit, name)?
            .ok_or(Error::CommitNotFound)
    }

    pub fn root_by_repo_name(&self, team_id: Uuid, repo_name: &str) -> Result<Uuid> {
        self.require_team(team_id)?;

        self.store
            .get_root_by_repo_name(team_id, repo_name)?
            .ok_or(Error::CommitNotFound)
    }

    pub fn list_commits(&self, team_id: Uuid, root_commit: Uuid) -> Result<Vec<Commit>> {
        self.require_team(team_id)?;
        self.store.list_commits(team_id, root_commit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::SqliteDagStore;

    fn test_service() -> (DagService, Uuid) {
        let store = SqliteDagStore::open_in_memory().unwrap();
        store.initialize().unwrap();
        let team_id = Uuid::new_v4();
        store.register_team(team_id, "alpha").unwrap();
        (DagService::new(Arc::new(store)), team_id)
    }

    #[test]
    fn unknown_team_fails_everywhere() {
        let (svc, _) = test_service();
        let ghost = Uuid::new_v4();
        assert!(matches!(
            svc.init_repository(ghost, None, None, b"Z"),
            Err(Error::TeamNotFound)
        ));
        assert!(matches!(
            svc.checkout(ghost, Uuid::new_v4(), Uuid::new_v4()),
            Err(Error::TeamNotFound)
        ));
    }

    #[test]
    fn push_rejects_missing_root_and_parent() {
        let (svc, team_id) = test_service();
        let root = svc.init_repository(team_id, None, None, b"Z0").unwrap();

        assert!(matches!(
            svc.push(team_id, Uuid::new_v4(), root.commit_id, None, b"Z1"),
            Err(Error::RootCommitNotFound)
        ));
        assert!(matches!(
            svc.push(team_id, root.root_commit, Uuid::new_v4(), None, b"Z1"),
            Err(Error::InvalidParent)
        ));
    }

    #[test]
    fn push_rejects_parent_from_another_repo() {
        let (svc, team_id) = test_service();
        let repo_a = svc.init_repository(team_id, None, None, b"A").unwrap();
        let repo_b = svc.init_repository(team_id, None, None, b"B").unwrap();

        assert!(matches!(
            svc.push(team_id, repo_a.root_commit, repo_b.commit_id, None, b"C"),
            Err(Error::InvalidParent)
        ));
    }

    #[test]
    fn merge_requires_two_leaves() {
        let (svc, team_id) = test_service();
        let root = svc.init_repository(team_id, None, None, b"Z0").unwrap();
        let feat = svc
            .push(team_id, root.root_commit, root.commit_id, None, b"Z1")
            .unwrap();
        let fix = svc
            .push(team_id, root.root_commit, root.commit_id, None, b"Z2")
            .unwrap();

        // Root has children, so it is not mergeable.
        assert!(matches!(
            svc.merge(team_id, root.root_commit, root.commit_id, feat.commit_id),
            Err(Error::CommitNotLeaf)
        ));

        let merge = svc
            .merge(team_id, root.root_commit, feat.commit_id, fix.commit_id)
            .unwrap();

        // Re-merging already-integrated history is rejected.
        assert!(matches!(
            svc.merge(team_id, root.root_commit, feat.commit_id, merge.commit_id),
            Err(Error::CommitNotLeaf)
        ));
    }

    #[test]
    fn merge_of_unknown_commit_is_not_found() {
        let (svc, team_id) = test_service();
        let root = svc.init_repository(team_id, None, None, b"Z0").unwrap();
        assert!(matches!(
            svc.merge(team_id, root.root_commit, root.commit_id, Uuid::new_v4()),
            Err(Error::CommitNotFound)
        ));
    }

    #[test]
    fn checkout_of_merge_returns_first_parent_code() {
        let (svc, team_id) = test_service();
        let root = svc.init_repository(team_id, None, None, b"Z0").unwrap();
        let feat = svc
            .push(team_id, root.root_commit, root.commit_id, None, b"Z1")
            .unwrap();
        let fix = svc
            .push(team_id, root.root_commit, root.commit_id, None, b"Z2")
            .unwrap();
        let merge = svc
            .merge(team_id, root.root_commit, feat.commit_id, fix.commit_id)
            .unwrap();

        assert_eq!(
            svc.checkout(team_id, root.root_commit, merge.commit_id).unwrap(),
            b"Z1"
        );
    }

    #[test]
    fn name_resolution_errors_are_commit_not_found() {
        let (svc, team_id) = test_service();
        let root = svc
            .init_repository(team_id, Some("svc"), Some("main"), b"Z0")
            .unwrap();

        assert_eq!(
            svc.commit_id_by_name(team_id, root.root_commit, "main").unwrap(),
            root.commit_id
        );
        assert!(matches!(
            svc.commit_id_by_name(team_id, root.root_commit, "ghost"),
            Err(Error::CommitNotFound)
        ));
        assert_eq!(svc.root_by_repo_name(team_id, "svc").unwrap(), root.commit_id);
        assert!(matches!(
            svc.root_by_repo_name(team_id, "ghost"),
            Err(Error::CommitNotFound)
        ));
    }
}
