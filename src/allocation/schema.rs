pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS teams (
    team_id TEXT PRIMARY KEY,
    team_name TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Users belong to at most one team; created as a side effect of team creation
CREATE TABLE IF NOT EXISTS users (
    user_id TEXT PRIMARY KEY,
    username TEXT NOT NULL,
    team_id TEXT REFERENCES teams(team_id),
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS pull_requests (
    pr_id TEXT PRIMARY KEY,
    pr_name TEXT NOT NULL,
    author_id TEXT NOT NULL REFERENCES users(user_id),
    status TEXT NOT NULL DEFAULT 'OPEN',
    created_at TEXT NOT NULL,
    merged_at TEXT,
    updated_at TEXT NOT NULL
);

-- Assigned reviewers; position preserves in-place substitution on reassign
CREATE TABLE IF NOT EXISTS pr_reviewers (
    pr_id TEXT NOT NULL REFERENCES pull_requests(pr_id),
    user_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    PRIMARY KEY (pr_id, user_id)
);

CREATE TABLE IF NOT EXISTS pr_approvals (
    pr_id TEXT NOT NULL REFERENCES pull_requests(pr_id),
    user_id TEXT NOT NULL,
    PRIMARY KEY (pr_id, user_id)
);

CREATE INDEX IF NOT EXISTS idx_users_team ON users(team_id);
CREATE INDEX IF NOT EXISTS idx_pull_requests_status ON pull_requests(status);
CREATE INDEX IF NOT EXISTS idx_pr_reviewers_user ON pr_reviewers(user_id);
"#;
