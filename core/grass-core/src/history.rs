//! SQLite session history.
//!
//! Append-only table of completed sessions. Each insert computes `is_record`
//! against every earlier row for the same user and session type, inside the
//! same transaction, and the flag is never revisited afterwards.

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Result, TrackerError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Online,
    Offline,
}

impl SessionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionKind::Online => "online",
            SessionKind::Offline => "offline",
        }
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stored session row, as returned by stats queries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionRecord {
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KindStats {
    pub longest: Option<SessionRecord>,
    pub total: f64,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UsageStats {
    pub online: KindStats,
    pub offline: KindStats,
}

/// Durable history of completed sessions.
///
/// Only one recorder process writes per user; readers (the `stats` command)
/// may run at the same time.
pub trait SessionHistory: Send + Sync {
    /// Appends one session and returns whether it beats every earlier
    /// duration for this `(username, kind)`.
    fn record(
        &self,
        username: &str,
        kind: SessionKind,
        start: f64,
        end: f64,
        duration: f64,
    ) -> Result<bool>;

    fn stats(&self, username: &str) -> Result<UsageStats>;
}

pub struct SqliteHistory {
    path: PathBuf,
}

impl SqliteHistory {
    pub fn new(path: PathBuf) -> Result<Self> {
        let history = Self { path };
        history.init_schema()?;
        Ok(history)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn kind_stats(conn: &Connection, username: &str, kind: SessionKind) -> Result<KindStats> {
        let longest = conn
            .query_row(
                "SELECT start_time, end_time, duration FROM sessions \
                 WHERE username = ?1 AND type = ?2 AND is_record = 1 \
                 ORDER BY duration DESC LIMIT 1",
                params![username, kind.as_str()],
                |row| {
                    Ok(SessionRecord {
                        start_time: row.get(0)?,
                        end_time: row.get(1)?,
                        duration: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(|err| TrackerError::db(format!("Failed to query longest {} session", kind), err))?;

        let (total, count) = conn
            .query_row(
                "SELECT COALESCE(SUM(duration), 0.0), COUNT(*) FROM sessions \
                 WHERE username = ?1 AND type = ?2",
                params![username, kind.as_str()],
                |row| Ok((row.get::<_, f64>(0)?, row.get::<_, i64>(1)?)),
            )
            .map_err(|err| TrackerError::db(format!("Failed to total {} sessions", kind), err))?;

        Ok(KindStats {
            longest,
            total,
            count: count.max(0) as u64,
        })
    }

    fn init_schema(&self) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS sessions (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    username TEXT NOT NULL,
                    start_time REAL NOT NULL,
                    end_time REAL NOT NULL,
                    duration REAL NOT NULL,
                    type TEXT NOT NULL CHECK (type IN ('online', 'offline')),
                    is_record INTEGER DEFAULT 0,
                    timestamp DATETIME DEFAULT CURRENT_TIMESTAMP
                 );
                 CREATE INDEX IF NOT EXISTS idx_sessions_user_type
                    ON sessions (username, type, duration);",
            )
            .map_err(|err| TrackerError::db("Failed to initialize history schema", err))
        })
    }

    fn with_connection<T>(&self, op: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut conn = self.open()?;
        op(&mut conn)
    }

    fn open(&self) -> Result<Connection> {
        if let Some(parent) = self.path.parent() {
            fs_err::create_dir_all(parent)
                .map_err(|err| TrackerError::io("Failed to create history data dir", err))?;
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX;

        let conn = Connection::open_with_flags(&self.path, flags)
            .map_err(|err| TrackerError::db("Failed to open history db", err))?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|err| TrackerError::db("Failed to enable WAL", err))?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(|err| TrackerError::db("Failed to set synchronous", err))?;
        conn.pragma_update(None, "busy_timeout", 5000)
            .map_err(|err| TrackerError::db("Failed to set busy_timeout", err))?;

        Ok(conn)
    }
}

impl SessionHistory for SqliteHistory {
    fn record(
        &self,
        username: &str,
        kind: SessionKind,
        start: f64,
        end: f64,
        duration: f64,
    ) -> Result<bool> {
        self.with_connection(|conn| {
            let tx = conn
                .transaction()
                .map_err(|err| TrackerError::db("Failed to begin history transaction", err))?;

            let max_duration: Option<f64> = tx
                .query_row(
                    "SELECT MAX(duration) FROM sessions WHERE username = ?1 AND type = ?2",
                    params![username, kind.as_str()],
                    |row| row.get(0),
                )
                .map_err(|err| TrackerError::db("Failed to query max duration", err))?;

            let is_record = max_duration.map_or(true, |max| duration > max);

            tx.execute(
                "INSERT INTO sessions (username, start_time, end_time, duration, type, is_record) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![username, start, end, duration, kind.as_str(), is_record],
            )
            .map_err(|err| TrackerError::db("Failed to insert session", err))?;

            tx.commit()
                .map_err(|err| TrackerError::db("Failed to commit session", err))?;

            Ok(is_record)
        })
    }

    fn stats(&self, username: &str) -> Result<UsageStats> {
        self.with_connection(|conn| {
            Ok(UsageStats {
                online: Self::kind_stats(conn, username, SessionKind::Online)?,
                offline: Self::kind_stats(conn, username, SessionKind::Offline)?,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history() -> (tempfile::TempDir, SqliteHistory) {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let history = SqliteHistory::new(temp_dir.path().join("usage_stats.db")).expect("db init");
        (temp_dir, history)
    }

    #[test]
    fn first_session_is_a_record() {
        let (_dir, history) = history();
        assert!(history
            .record("alice", SessionKind::Online, 0.0, 10.0, 10.0)
            .unwrap());
    }

    #[test]
    fn record_requires_strictly_longer_duration() {
        let (_dir, history) = history();
        history
            .record("alice", SessionKind::Online, 0.0, 100.0, 100.0)
            .unwrap();

        assert!(!history
            .record("alice", SessionKind::Online, 200.0, 300.0, 100.0)
            .unwrap());
        assert!(!history
            .record("alice", SessionKind::Online, 400.0, 450.0, 50.0)
            .unwrap());
        assert!(history
            .record("alice", SessionKind::Online, 500.0, 600.5, 100.5)
            .unwrap());
    }

    #[test]
    fn records_are_scoped_by_user_and_kind() {
        let (_dir, history) = history();
        history
            .record("alice", SessionKind::Online, 0.0, 1000.0, 1000.0)
            .unwrap();

        assert!(history
            .record("alice", SessionKind::Offline, 1000.0, 1001.0, 1.0)
            .unwrap());
        assert!(history
            .record("bob", SessionKind::Online, 0.0, 5.0, 5.0)
            .unwrap());
    }

    #[test]
    fn stats_for_unknown_user_are_empty() {
        let (_dir, history) = history();
        let stats = history.stats("nobody").unwrap();

        assert_eq!(stats, UsageStats::default());
        assert!(stats.online.longest.is_none());
        assert_eq!(stats.offline.total, 0.0);
    }

    #[test]
    fn stats_report_longest_record_and_totals() {
        let (_dir, history) = history();
        history
            .record("alice", SessionKind::Online, 0.0, 60.0, 60.0)
            .unwrap();
        history
            .record("alice", SessionKind::Online, 100.0, 220.0, 120.0)
            .unwrap();
        history
            .record("alice", SessionKind::Online, 300.0, 330.0, 30.0)
            .unwrap();
        history
            .record("alice", SessionKind::Offline, 60.0, 100.0, 40.0)
            .unwrap();

        let stats = history.stats("alice").unwrap();

        assert_eq!(
            stats.online.longest,
            Some(SessionRecord {
                start_time: 100.0,
                end_time: 220.0,
                duration: 120.0,
            })
        );
        assert_eq!(stats.online.total, 210.0);
        assert_eq!(stats.online.count, 3);
        assert_eq!(stats.offline.total, 40.0);
        assert_eq!(stats.offline.count, 1);
    }

    #[test]
    fn history_survives_reopen() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("usage_stats.db");
        {
            let history = SqliteHistory::new(path.clone()).unwrap();
            history
                .record("alice", SessionKind::Offline, 0.0, 500.0, 500.0)
                .unwrap();
        }

        let reopened = SqliteHistory::new(path).unwrap();
        assert!(!reopened
            .record("alice", SessionKind::Offline, 600.0, 700.0, 100.0)
            .unwrap());
        assert_eq!(reopened.stats("alice").unwrap().offline.count, 2);
    }
}
