use crate::error::AppError;
use chrono::{Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Mutex;

const SCHEMA: &str = include_str!("schema.sql");

/// Ranked-set and key/value primitives the leaderboard core needs from its
/// backing store. Keys and sets with an elapsed expiry behave as absent.
pub trait RankedStore {
    fn zadd(&self, set: &str, member: &str, score: i64) -> Result<(), AppError>;
    /// Members ordered score-descending, ties in insertion order. `start` and
    /// `stop` are inclusive zero-based positions; `stop < 0` means the end of
    /// the set.
    fn zrevrange(&self, set: &str, start: i64, stop: i64) -> Result<Vec<String>, AppError>;
    fn zrevrank(&self, set: &str, member: &str) -> Result<Option<i64>, AppError>;
    fn zcard(&self, set: &str) -> Result<i64, AppError>;
    fn expire(&self, set: &str, ttl: Duration) -> Result<(), AppError>;
    /// Atomic set-if-absent. Returns false when the key is already present.
    fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, AppError>;
    fn exists(&self, key: &str) -> Result<bool, AppError>;
    fn del(&self, key: &str) -> Result<(), AppError>;
}

pub struct Db {
    conn: Mutex<Connection>,
}

impl Db {
    pub fn open(path: &str) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Db {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Db {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T, rusqlite::Error>
    where
        F: FnOnce(&Connection) -> Result<T, rusqlite::Error>,
    {
        let conn = self.conn.lock().unwrap();
        f(&conn)
    }
}

fn purge_expired(conn: &Connection, now: i64) -> Result<(), rusqlite::Error> {
    conn.execute(
        "DELETE FROM kv_entries WHERE expires_at IS NOT NULL AND expires_at <= ?1",
        params![now],
    )?;
    conn.execute(
        "DELETE FROM ranked_members WHERE set_key IN
         (SELECT set_key FROM ranked_sets WHERE expires_at IS NOT NULL AND expires_at <= ?1)",
        params![now],
    )?;
    conn.execute(
        "DELETE FROM ranked_sets WHERE expires_at IS NOT NULL AND expires_at <= ?1",
        params![now],
    )?;
    Ok(())
}

impl RankedStore for Db {
    fn zadd(&self, set: &str, member: &str, score: i64) -> Result<(), AppError> {
        let now = Utc::now().timestamp();
        Ok(self.with_conn(|conn| {
            purge_expired(conn, now)?;
            conn.execute(
                "INSERT OR IGNORE INTO ranked_sets (set_key, expires_at) VALUES (?1, NULL)",
                params![set],
            )?;
            conn.execute(
                "INSERT INTO ranked_members (set_key, member, score) VALUES (?1, ?2, ?3)
                 ON CONFLICT (set_key, member) DO UPDATE SET score = excluded.score",
                params![set, member, score],
            )?;
            Ok(())
        })?)
    }

    fn zrevrange(&self, set: &str, start: i64, stop: i64) -> Result<Vec<String>, AppError> {
        let now = Utc::now().timestamp();
        let limit = if stop < 0 { -1 } else { stop - start + 1 };
        Ok(self.with_conn(|conn| {
            purge_expired(conn, now)?;
            let mut stmt = conn.prepare(
                "SELECT member FROM ranked_members WHERE set_key = ?1
                 ORDER BY score DESC, seq ASC LIMIT ?2 OFFSET ?3",
            )?;
            let rows = stmt.query_map(params![set, limit, start], |row| row.get(0))?;
            let mut members = Vec::new();
            for row in rows {
                members.push(row?);
            }
            Ok(members)
        })?)
    }

    fn zrevrank(&self, set: &str, member: &str) -> Result<Option<i64>, AppError> {
        let now = Utc::now().timestamp();
        Ok(self.with_conn(|conn| {
            purge_expired(conn, now)?;
            let found: Option<(i64, i64)> = conn
                .query_row(
                    "SELECT score, seq FROM ranked_members WHERE set_key = ?1 AND member = ?2",
                    params![set, member],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            match found {
                Some((score, seq)) => {
                    let ahead: i64 = conn.query_row(
                        "SELECT COUNT(*) FROM ranked_members WHERE set_key = ?1
                         AND (score > ?2 OR (score = ?2 AND seq < ?3))",
                        params![set, score, seq],
                        |row| row.get(0),
                    )?;
                    Ok(Some(ahead))
                }
                None => Ok(None),
            }
        })?)
    }

    fn zcard(&self, set: &str) -> Result<i64, AppError> {
        let now = Utc::now().timestamp();
        Ok(self.with_conn(|conn| {
            purge_expired(conn, now)?;
            conn.query_row(
                "SELECT COUNT(*) FROM ranked_members WHERE set_key = ?1",
                params![set],
                |row| row.get(0),
            )
        })?)
    }

    fn expire(&self, set: &str, ttl: Duration) -> Result<(), AppError> {
        let now = Utc::now().timestamp();
        let expires_at = now + ttl.num_seconds();
        Ok(self.with_conn(|conn| {
            purge_expired(conn, now)?;
            conn.execute(
                "INSERT INTO ranked_sets (set_key, expires_at) VALUES (?1, ?2)
                 ON CONFLICT (set_key) DO UPDATE SET expires_at = excluded.expires_at",
                params![set, expires_at],
            )?;
            Ok(())
        })?)
    }

    fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, AppError> {
        let now = Utc::now().timestamp();
        let expires_at = now + ttl.num_seconds();
        Ok(self.with_conn(|conn| {
            purge_expired(conn, now)?;
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO kv_entries (key, value, expires_at) VALUES (?1, ?2, ?3)",
                params![key, value, expires_at],
            )?;
            Ok(inserted > 0)
        })?)
    }

    fn exists(&self, key: &str) -> Result<bool, AppError> {
        let now = Utc::now().timestamp();
        Ok(self.with_conn(|conn| {
            purge_expired(conn, now)?;
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM kv_entries WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })?)
    }

    fn del(&self, key: &str) -> Result<(), AppError> {
        Ok(self.with_conn(|conn| {
            conn.execute("DELETE FROM kv_entries WHERE key = ?1", params![key])?;
            Ok(())
        })?)
    }
}
