use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use uuid::Uuid;

use super::schema::SCHEMA;
use super::store::AllocationStore;
use crate::error::{Error, Result};
use crate::types::{PrStatus, PullRequest, Team, TeamMember, User};

pub struct SqliteAllocationStore {
    conn: Mutex<Connection>,
}

impl SqliteAllocationStore {
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

fn parse_status(s: &str) -> PrStatus {
    PrStatus::parse(s).unwrap_or_else(|| {
        tracing::error!("Invalid PR status in database: '{}'", s);
        PrStatus::Open
    })
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let team_id: Option<String> = row.get(2)?;
    Ok(User {
        user_id: row.get(0)?,
        username: row.get(1)?,
        team_id: team_id.and_then(|s| Uuid::parse_str(&s).ok()),
        team_name: row.get(3)?,
        is_active: row.get(4)?,
    })
}

const USER_SELECT: &str = "SELECT u.user_id, u.username, u.team_id, t.team_name, u.is_active
     FROM users u LEFT JOIN teams t ON u.team_id = t.team_id";

fn load_pr_lists(conn: &Connection, pr: &mut PullRequest) -> Result<()> {
    let mut stmt =
        conn.prepare("SELECT user_id FROM pr_reviewers WHERE pr_id = ?1 ORDER BY position")?;
    let reviewers = stmt
        .query_map(params![pr.pull_request_id], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    pr.assigned_reviewers = reviewers;

    let mut stmt = conn.prepare("SELECT user_id FROM pr_approvals WHERE pr_id = ?1")?;
    let approvals = stmt
        .query_map(params![pr.pull_request_id], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    pr.approved_by = approvals;

    Ok(())
}

fn pr_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PullRequest> {
    let status: String = row.get(3)?;
    let created_at: String = row.get(4)?;
    let merged_at: Option<String> = row.get(5)?;
    Ok(PullRequest {
        pull_request_id: row.get(0)?,
        pull_request_name: row.get(1)?,
        author_id: row.get(2)?,
        status: parse_status(&status),
        assigned_reviewers: vec![],
        approved_by: vec![],
        created_at: parse_datetime(&created_at),
        merged_at: merged_at.map(|s| parse_datetime(&s)),
    })
}

const PR_SELECT: &str =
    "SELECT pr_id, pr_name, author_id, status, created_at, merged_at FROM pull_requests";

impl AllocationStore for SqliteAllocationStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    fn create_team(&self, team: &Team) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let now = format_datetime(&Utc::now());

        let result = tx.execute(
            "INSERT INTO teams (team_id, team_name, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)",
            params![team.team_id.to_string(), team.team_name, now],
        );
        if let Err(e) = result {
            if is_constraint_violation(&e) {
                return Err(Error::TeamExists);
            }
            return Err(Error::from(e));
        }

        for member in &team.members {
            tx.execute(
                "INSERT INTO users (user_id, username, team_id, is_active, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                 ON CONFLICT (user_id) DO UPDATE SET
                    username = excluded.username,
                    team_id = excluded.team_id,
                    is_active = excluded.is_active,
                    updated_at = excluded.updated_at",
                params![
                    member.user_id,
                    member.username,
                    team.team_id.to_string(),
                    member.is_active,
                    now,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn team_exists(&self, team_name: &str) -> Result<bool> {
        let conn = self.conn();
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM teams WHERE team_name = ?1)",
            params![team_name],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn get_team(&self, team_name: &str) -> Result<Option<Team>> {
        let conn = self.conn();
        let team_id: Option<String> = conn
            .query_row(
                "SELECT team_id FROM teams WHERE team_name = ?1",
                params![team_name],
                |row| row.get(0),
            )
            .optional()?;
        let Some(team_id) = team_id else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            "SELECT user_id, username, is_active FROM users WHERE team_id = ?1 ORDER BY user_id",
        )?;
        let members = stmt
            .query_map(params![team_id], |row| {
                Ok(TeamMember {
                    user_id: row.get(0)?,
                    username: row.get(1)?,
                    is_active: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Some(Team {
            team_id: Uuid::parse_str(&team_id).unwrap_or_default(),
            team_name: team_name.to_string(),
            members,
        }))
    }

    fn team_id_by_name(&self, team_name: &str) -> Result<Option<Uuid>> {
        let conn = self.conn();
        let id: Option<String> = conn
            .query_row(
                "SELECT team_id FROM teams WHERE team_name = ?1",
                params![team_name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id.and_then(|s| Uuid::parse_str(&s).ok()))
    }

    fn count_teams(&self) -> Result<usize> {
        let conn = self.conn();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM teams", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("{USER_SELECT} WHERE u.user_id = ?1"),
            params![user_id],
            user_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn update_user(&self, user: &User) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE users SET username = ?1, team_id = ?2, is_active = ?3, updated_at = ?4
             WHERE user_id = ?5",
            params![
                user.username,
                user.team_id.map(|id| id.to_string()),
                user.is_active,
                format_datetime(&Utc::now()),
                user.user_id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::UserNotFound);
        }
        Ok(())
    }

    fn users_by_team(&self, team_id: Uuid) -> Result<Vec<User>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare(&format!("{USER_SELECT} WHERE u.team_id = ?1 ORDER BY u.user_id"))?;
        let users = stmt
            .query_map(params![team_id.to_string()], user_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(users)
    }

    fn bulk_set_users_active(&self, user_ids: &[String], is_active: bool) -> Result<()> {
        if user_ids.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let now = format_datetime(&Utc::now());
        for user_id in user_ids {
            tx.execute(
                "UPDATE users SET is_active = ?1, updated_at = ?2 WHERE user_id = ?3",
                params![is_active, now, user_id],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn all_users(&self) -> Result<Vec<User>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("{USER_SELECT} ORDER BY u.user_id"))?;
        let users = stmt
            .query_map([], user_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(users)
    }

    fn count_users(&self) -> Result<usize> {
        let conn = self.conn();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn count_active_users(&self) -> Result<usize> {
        let conn = self.conn();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE is_active = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn create_pr(&self, pr: &PullRequest) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let now = format_datetime(&pr.created_at);

        let result = tx.execute(
            "INSERT INTO pull_requests (pr_id, pr_name, author_id, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                pr.pull_request_id,
                pr.pull_request_name,
                pr.author_id,
                pr.status.as_str(),
                now,
            ],
        );
        if let Err(e) = result {
            if is_constraint_violation(&e) {
                return Err(Error::PrExists);
            }
            return Err(Error::from(e));
        }

        for (position, reviewer) in pr.assigned_reviewers.iter().enumerate() {
            tx.execute(
                "INSERT INTO pr_reviewers (pr_id, user_id, position) VALUES (?1, ?2, ?3)",
                params![pr.pull_request_id, reviewer, position as i64],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn pr_exists(&self, pr_id: &str) -> Result<bool> {
        let conn = self.conn();
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM pull_requests WHERE pr_id = ?1)",
            params![pr_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn get_pr(&self, pr_id: &str) -> Result<Option<PullRequest>> {
        let conn = self.conn();
        let pr = conn
            .query_row(
                &format!("{PR_SELECT} WHERE pr_id = ?1"),
                params![pr_id],
                pr_from_row,
            )
            .optional()?;

        let Some(mut pr) = pr else {
            return Ok(None);
        };
        load_pr_lists(&conn, &mut pr)?;
        Ok(Some(pr))
    }

    fn update_pr(&self, pr: &PullRequest) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let rows = tx.execute(
            "UPDATE pull_requests
             SET pr_name = ?1, status = ?2, merged_at = ?3, updated_at = ?4
             WHERE pr_id = ?5",
            params![
                pr.pull_request_name,
                pr.status.as_str(),
                pr.merged_at.as_ref().map(format_datetime),
                format_datetime(&Utc::now()),
                pr.pull_request_id,
            ],
        )?;
        if rows == 0 {
            return Err(Error::PrNotFound);
        }

        tx.execute(
            "DELETE FROM pr_reviewers WHERE pr_id = ?1",
            params![pr.pull_request_id],
        )?;
        for (position, reviewer) in pr.assigned_reviewers.iter().enumerate() {
            tx.execute(
                "INSERT INTO pr_reviewers (pr_id, user_id, position) VALUES (?1, ?2, ?3)",
                params![pr.pull_request_id, reviewer, position as i64],
            )?;
        }

        tx.execute(
            "DELETE FROM pr_approvals WHERE pr_id = ?1",
            params![pr.pull_request_id],
        )?;
        for approver in &pr.approved_by {
            tx.execute(
                "INSERT INTO pr_approvals (pr_id, user_id) VALUES (?1, ?2)",
                params![pr.pull_request_id, approver],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn prs_by_reviewer(&self, user_id: &str) -> Result<Vec<PullRequest>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "{PR_SELECT} WHERE pr_id IN (SELECT pr_id FROM pr_reviewers WHERE user_id = ?1)
             ORDER BY created_at"
        ))?;
        let mut prs = stmt
            .query_map(params![user_id], pr_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        for pr in &mut prs {
            load_pr_lists(&conn, pr)?;
        }
        Ok(prs)
    }

    fn prs_by_author(&self, user_id: &str) -> Result<Vec<PullRequest>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare(&format!("{PR_SELECT} WHERE author_id = ?1 ORDER BY created_at"))?;
        let mut prs = stmt
            .query_map(params![user_id], pr_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        for pr in &mut prs {
            load_pr_lists(&conn, pr)?;
        }
        Ok(prs)
    }

    fn open_prs_by_reviewers(&self, user_ids: &[String]) -> Result<Vec<PullRequest>> {
        if user_ids.is_empty() {
            return Ok(vec![]);
        }
        let conn = self.conn();
        let placeholders = vec!["?"; user_ids.len()].join(", ");
        let sql = format!(
            "{PR_SELECT} WHERE status = 'OPEN' AND pr_id IN
                 (SELECT DISTINCT pr_id FROM pr_reviewers WHERE user_id IN ({placeholders}))
             ORDER BY created_at"
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut prs = stmt
            .query_map(params_from_iter(user_ids.iter()), pr_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        for pr in &mut prs {
            load_pr_lists(&conn, pr)?;
        }
        Ok(prs)
    }

    fn all_prs(&self) -> Result<Vec<PullRequest>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("{PR_SELECT} ORDER BY created_at"))?;
        let mut prs = stmt
            .query_map([], pr_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        for pr in &mut prs {
            load_pr_lists(&conn, pr)?;
        }
        Ok(prs)
    }

    fn count_prs(&self) -> Result<usize> {
        let conn = self.conn();
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM pull_requests", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn count_prs_by_status(&self, status: PrStatus) -> Result<usize> {
        let conn = self.conn();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM pull_requests WHERE status = ?1",
            params![status.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
