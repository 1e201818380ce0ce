pub const SCHEMA: &str = r#"
-- Teams known to the storage engine; populated by the gateway at team creation
CREATE TABLE IF NOT EXISTS teams (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL
);

-- One row per commit; a repository is the set of rows sharing (team_id, root_commit)
CREATE TABLE IF NOT EXISTS commits (
    id TEXT PRIMARY KEY,
    team_id TEXT NOT NULL REFERENCES teams(id),
    root_commit TEXT NOT NULL,
    code BLOB NOT NULL,
    created_at TEXT NOT NULL
);

-- Parent edges; the root commit has no rows here. position 0 is the first
-- parent (whose code a merge commit inherits).
CREATE TABLE IF NOT EXISTS commit_parents (
    commit_id TEXT NOT NULL REFERENCES commits(id),
    parent_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    PRIMARY KEY (commit_id, parent_id)
);

-- Human names, unique within a repository; a commit carries at most one name
CREATE TABLE IF NOT EXISTS commit_names (
    team_id TEXT NOT NULL,
    root_commit TEXT NOT NULL,
    commit_id TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    PRIMARY KEY (team_id, root_commit, name)
);

-- Repository names, resolving to the root commit of the DAG they name
CREATE TABLE IF NOT EXISTS repo_names (
    team_id TEXT NOT NULL,
    name TEXT NOT NULL,
    root_commit TEXT NOT NULL,
    PRIMARY KEY (team_id, name)
);

CREATE INDEX IF NOT EXISTS idx_commits_repo ON commits(team_id, root_commit);
-- The leaf test is a single indexed probe on parent_id
CREATE INDEX IF NOT EXISTS idx_commit_parents_parent ON commit_parents(parent_id);
"#;
