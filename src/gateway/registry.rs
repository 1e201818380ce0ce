use std::collections::HashMap;
use std::sync::RwLock;

use uuid::Uuid;

use crate::types::Commit;

/// Everything the gateway must remember about a PR to drive its lifecycle:
/// the DAG coordinates behind the user-visible names. Written once at
/// creation; source and target are immutable inputs to the PR.
#[derive(Debug, Clone)]
pub struct PrMetadata {
    pub pr_id: String,
    pub team_id: Uuid,
    pub team_name: String,
    pub repo_name: String,
    pub root_commit: Uuid,
    pub source_commit: Uuid,
    pub source_commit_name: String,
    pub target_commit: Uuid,
    pub target_commit_name: String,
}

/// Process-local PR metadata, keyed both by pr_id and by
/// (team_name, pr_name). Lost on restart; open PRs created by a previous
/// process are then unreachable through the name-based endpoints.
#[derive(Default)]
pub struct PrRegistry {
    by_id: RwLock<HashMap<String, PrMetadata>>,
    by_name: RwLock<HashMap<(String, String), String>>,
    merge_commits: RwLock<HashMap<String, Commit>>,
}

impl PrRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, pr_name: &str, meta: PrMetadata) {
        let mut by_name = self.by_name.write().unwrap_or_else(|e| e.into_inner());
        by_name.insert(
            (meta.team_name.clone(), pr_name.to_string()),
            meta.pr_id.clone(),
        );
        drop(by_name);

        let mut by_id = self.by_id.write().unwrap_or_else(|e| e.into_inner());
        by_id.insert(meta.pr_id.clone(), meta);
    }

    pub fn get_by_id(&self, pr_id: &str) -> Option<PrMetadata> {
        self.by_id
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(pr_id)
            .cloned()
    }

    pub fn get_by_name(&self, team_name: &str, pr_name: &str) -> Option<PrMetadata> {
        let pr_id = {
            let by_name = self.by_name.read().unwrap_or_else(|e| e.into_inner());
            by_name
                .get(&(team_name.to_string(), pr_name.to_string()))
                .cloned()?
        };
        self.get_by_id(&pr_id)
    }

    /// Records the DAG merge commit for a PR, making the DAG write
    /// idempotent across approve retries within this process.
    pub fn record_merge(&self, pr_id: &str, commit: Commit) {
        self.merge_commits
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(pr_id.to_string(), commit);
    }

    pub fn merge_commit(&self, pr_id: &str) -> Option<Commit> {
        self.merge_commits
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(pr_id)
            .cloned()
    }
}

/// Read-through cache of `(team_id, repo_name) -> root_commit`. The binding
/// is persisted by the storage service; this cache only saves a hop.
#[derive(Default)]
pub struct RepoRegistry {
    roots: RwLock<HashMap<(Uuid, String), Uuid>>,
}

impl RepoRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, team_id: Uuid, repo_name: &str, root_commit: Uuid) {
        self.roots
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert((team_id, repo_name.to_string()), root_commit);
    }

    pub fn get(&self, team_id: Uuid, repo_name: &str) -> Option<Uuid> {
        self.roots
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&(team_id, repo_name.to_string()))
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn meta(pr_id: &str, team: &str) -> PrMetadata {
        PrMetadata {
            pr_id: pr_id.to_string(),
            team_id: Uuid::new_v4(),
            team_name: team.to_string(),
            repo_name: "svc".to_string(),
            root_commit: Uuid::new_v4(),
            source_commit: Uuid::new_v4(),
            source_commit_name: "feat".to_string(),
            target_commit: Uuid::new_v4(),
            target_commit_name: "main".to_string(),
        }
    }

    #[test]
    fn metadata_is_reachable_under_both_keys() {
        let registry = PrRegistry::new();
        registry.insert("my-pr", meta("pr-12345678", "alpha"));

        let by_id = registry.get_by_id("pr-12345678").unwrap();
        let by_name = registry.get_by_name("alpha", "my-pr").unwrap();
        assert_eq!(by_id.pr_id, by_name.pr_id);
        assert_eq!(by_id.root_commit, by_name.root_commit);

        assert!(registry.get_by_name("beta", "my-pr").is_none());
        assert!(registry.get_by_name("alpha", "other").is_none());
    }

    #[test]
    fn merge_commit_slot_starts_empty() {
        let registry = PrRegistry::new();
        registry.insert("my-pr", meta("pr-1", "alpha"));
        assert!(registry.merge_commit("pr-1").is_none());

        let commit = Commit {
            commit_id: Uuid::new_v4(),
            team_id: Uuid::new_v4(),
            root_commit: Uuid::new_v4(),
            parent_commit_ids: vec![Uuid::new_v4(), Uuid::new_v4()],
            code: vec![],
            created_at: Utc::now(),
            commit_name: None,
        };
        registry.record_merge("pr-1", commit.clone());
        assert_eq!(
            registry.merge_commit("pr-1").unwrap().commit_id,
            commit.commit_id
        );
    }

    #[test]
    fn repo_roots_are_scoped_by_team() {
        let registry = RepoRegistry::new();
        let team_a = Uuid::new_v4();
        let team_b = Uuid::new_v4();
        let root = Uuid::new_v4();

        registry.insert(team_a, "svc", root);
        assert_eq!(registry.get(team_a, "svc"), Some(root));
        assert_eq!(registry.get(team_b, "svc"), None);
        assert_eq!(registry.get(team_a, "other"), None);
    }
}
