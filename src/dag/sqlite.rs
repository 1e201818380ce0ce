use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use uuid::Uuid;

use super::schema::SCHEMA;
use super::store::DagStore;
use crate::error::{Error, Result};
use crate::types::Commit;

pub struct SqliteDagStore {
    conn: Mutex<Connection>,
}

impl SqliteDagStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn parse_uuid(s: &str) -> Uuid {
    Uuid::parse_str(s).unwrap_or_else(|e| {
        tracing::error!("Invalid uuid in database: '{}' - {}", s, e);
        Uuid::nil()
    })
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn load_parents(tx_or_conn: &Connection, commit_id: Uuid) -> Result<Vec<Uuid>> {
    let mut stmt = tx_or_conn.prepare(
        "SELECT parent_id FROM commit_parents WHERE commit_id = ?1 ORDER BY position",
    )?;
    let rows = stmt.query_map(params![commit_id.to_string()], |row| {
        row.get::<_, String>(0)
    })?;
    let mut parents = Vec::new();
    for row in rows {
        parents.push(parse_uuid(&row?));
    }
    Ok(parents)
}

fn insert_commit_row(
    tx: &Transaction<'_>,
    team_id: Uuid,
    root_commit: Uuid,
    commit_id: Uuid,
    parents: &[Uuid],
    commit_name: Option<&str>,
    code: &[u8],
    created_at: &DateTime<Utc>,
) -> Result<()> {
    tx.execute(
        "INSERT INTO commits (id, team_id, root_commit, code, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            commit_id.to_string(),
            team_id.to_string(),
            root_commit.to_string(),
            code,
            format_datetime(created_at),
        ],
    )?;

    for (position, parent) in parents.iter().enumerate() {
        tx.execute(
            "INSERT INTO commit_parents (commit_id, parent_id, position) VALUES (?1, ?2, ?3)",
            params![commit_id.to_string(), parent.to_string(), position as i64],
        )?;
    }

    if let Some(name) = commit_name {
        let result = tx.execute(
            "INSERT INTO commit_names (team_id, root_commit, commit_id, name)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                team_id.to_string(),
                root_commit.to_string(),
                commit_id.to_string(),
                name,
            ],
        );
        if let Err(e) = result {
            if is_constraint_violation(&e) {
                return Err(Error::CommitNameExists);
            }
            return Err(Error::from(e));
        }
    }

    Ok(())
}

impl DagStore for SqliteDagStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    fn register_team(&self, team_id: Uuid, name: &str) -> Result<()> {
        self.conn().execute(
            "INSERT OR IGNORE INTO teams (id, name) VALUES (?1, ?2)",
            params![team_id.to_string(), name],
        )?;
        Ok(())
    }

    fn team_exists(&self, team_id: Uuid) -> Result<bool> {
        let conn = self.conn();
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM teams WHERE id = ?1)",
            params![team_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn init_repository(
        &self,
        team_id: Uuid,
        repo_name: Option<&str>,
        commit_name: Option<&str>,
        code: &[u8],
    ) -> Result<Commit> {
        let commit_id = Uuid::new_v4();
        let now = Utc::now();

        let mut conn = self.conn();
        let tx = conn.transaction()?;

        // Root commit: its own root, no parents.
        insert_commit_row(&tx, team_id, commit_id, commit_id, &[], commit_name, code, &now)?;

        if let Some(repo) = repo_name {
            let result = tx.execute(
                "INSERT INTO repo_names (team_id, name, root_commit) VALUES (?1, ?2, ?3)",
                params![team_id.to_string(), repo, commit_id.to_string()],
            );
            if let Err(e) = result {
                if is_constraint_violation(&e) {
                    return Err(Error::CommitNameExists);
                }
                return Err(Error::from(e));
            }
        }

        tx.commit()?;

        Ok(Commit {
            commit_id,
            team_id,
            root_commit: commit_id,
            parent_commit_ids: vec![],
            code: code.to_vec(),
            created_at: now,
            commit_name: commit_name.map(str::to_string),
        })
    }

    fn create_commit(
        &self,
        team_id: Uuid,
        root_commit: Uuid,
        parent_id: Uuid,
        commit_name: Option<&str>,
        code: &[u8],
    ) -> Result<Commit> {
        let commit_id = Uuid::new_v4();
        let now = Utc::now();

        let mut conn = self.conn();
        let tx = conn.transaction()?;
        insert_commit_row(
            &tx,
            team_id,
            root_commit,
            commit_id,
            &[parent_id],
            commit_name,
            code,
            &now,
        )?;
        tx.commit()?;

        Ok(Commit {
            commit_id,
            team_id,
            root_commit,
            parent_commit_ids: vec![parent_id],
            code: code.to_vec(),
            created_at: now,
            commit_name: commit_name.map(str::to_string),
        })
    }

    fn merge_commits(
        &self,
        team_id: Uuid,
        root_commit: Uuid,
        commit_id1: Uuid,
        commit_id2: Uuid,
    ) -> Result<Commit> {
        // The merge carries the first parent's code verbatim; no content merging.
        let code = self
            .get_commit_code(team_id, root_commit, commit_id1)?
            .ok_or(Error::CommitNotFound)?;

        let commit_id = Uuid::new_v4();
        let now = Utc::now();

        let mut conn = self.conn();
        let tx = conn.transaction()?;
        insert_commit_row(
            &tx,
            team_id,
            root_commit,
            commit_id,
            &[commit_id1, commit_id2],
            None,
            &code,
            &now,
        )?;
        tx.commit()?;

        Ok(Commit {
            commit_id,
            team_id,
            root_commit,
            parent_commit_ids: vec![commit_id1, commit_id2],
            code,
            created_at: now,
            commit_name: None,
        })
    }

    fn get_commit(
        &self,
        team_id: Uuid,
        root_commit: Uuid,
        commit_id: Uuid,
    ) -> Result<Option<Commit>> {
        let conn = self.conn();
        let row = conn
            .query_row(
                "SELECT c.id, c.team_id, c.root_commit, c.created_at, cn.name
                 FROM commits c
                 LEFT JOIN commit_names cn ON c.id = cn.commit_id
                 WHERE c.id = ?1 AND c.team_id = ?2 AND c.root_commit = ?3",
                params![
                    commit_id.to_string(),
                    team_id.to_string(),
                    root_commit.to_string()
                ],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Option<String>>(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, team, root, created_at, name)) = row else {
            return Ok(None);
        };
        let parents = load_parents(&conn, commit_id)?;

        Ok(Some(Commit {
            commit_id: parse_uuid(&id),
            team_id: parse_uuid(&team),
            root_commit: parse_uuid(&root),
            parent_commit_ids: parents,
            code: vec![],
            created_at: parse_datetime(&created_at),
            commit_name: name,
        }))
    }

    fn get_commit_code(
        &self,
        team_id: Uuid,
        root_commit: Uuid,
        commit_id: Uuid,
    ) -> Result<Option<Vec<u8>>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT code FROM commits WHERE id = ?1 AND team_id = ?2 AND root_commit = ?3",
            params![
                commit_id.to_string(),
                team_id.to_string(),
                root_commit.to_string()
            ],
            |row| row.get(0),
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_commits(&self, team_id: Uuid, root_commit: Uuid) -> Result<Vec<Commit>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT c.id, c.created_at, cn.name
             FROM commits c
             LEFT JOIN commit_names cn ON c.id = cn.commit_id
             WHERE c.team_id = ?1 AND c.root_commit = ?2",
        )?;

        let rows = stmt.query_map(
            params![team_id.to_string(), root_commit.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            },
        )?;

        let mut commits = Vec::new();
        for row in rows {
            let (id, created_at, name) = row?;
            let commit_id = parse_uuid(&id);
            commits.push(Commit {
                commit_id,
                team_id,
                root_commit,
                parent_commit_ids: vec![],
                code: vec![],
                created_at: parse_datetime(&created_at),
                commit_name: name,
            });
        }
        for commit in &mut commits {
            commit.parent_commit_ids = load_parents(&conn, commit.commit_id)?;
        }
        Ok(commits)
    }

    fn is_leaf_commit(&self, team_id: Uuid, root_commit: Uuid, commit_id: Uuid) -> Result<bool> {
        let conn = self.conn();
        let is_leaf: bool = conn.query_row(
            "SELECT NOT EXISTS(
                 SELECT 1 FROM commit_parents cp
                 JOIN commits c ON c.id = cp.commit_id
                 WHERE c.team_id = ?1 AND c.root_commit = ?2 AND cp.parent_id = ?3
             )",
            params![
                team_id.to_string(),
                root_commit.to_string(),
                commit_id.to_string()
            ],
            |row| row.get(0),
        )?;
        Ok(is_leaf)
    }

    fn root_commit_exists(&self, team_id: Uuid, root_commit: Uuid) -> Result<bool> {
        let conn = self.conn();
        let exists: bool = conn.query_row(
            "SELECT EXISTS(
                 SELECT 1 FROM commits WHERE team_id = ?1 AND id = ?2 AND root_commit = ?2
             )",
            params![team_id.to_string(), root_commit.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn get_commit_name(&self, commit_id: Uuid) -> Result<Option<String>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT name FROM commit_names WHERE commit_id = ?1",
            params![commit_id.to_string()],
            |row| row.get(0),
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_commit_id_by_name(
        &self,
        team_id: Uuid,
        root_commit: Uuid,
        name: &str,
    ) -> Result<Option<Uuid>> {
        let conn = self.conn();
        let id: Option<String> = conn
            .query_row(
                "SELECT commit_id FROM commit_names
                 WHERE team_id = ?1 AND root_commit = ?2 AND name = ?3",
                params![team_id.to_string(), root_commit.to_string(), name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id.map(|s| parse_uuid(&s)))
    }

    fn get_root_by_repo_name(&self, team_id: Uuid, repo_name: &str) -> Result<Option<Uuid>> {
        let conn = self.conn();
        let id: Option<String> = conn
            .query_row(
                "SELECT root_commit FROM repo_names WHERE team_id = ?1 AND name = ?2",
                params![team_id.to_string(), repo_name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id.map(|s| parse_uuid(&s)))
    }
}
