//! SQLite-backed session store.

use crate::error::{StoreError, StoreResult};
use crate::traits::{IncomingPart, PartOutcome, SessionStore, SessionSummary};
use async_trait::async_trait;
use bytes::Bytes;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use stash_core::{SessionId, SessionState, UploadSession};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use time::OffsetDateTime;

/// Schema for the session table and its parts.
///
/// Parts live in their own table keyed by (upload_id, part_index), so storing
/// a chunk is a single upsert and a lost update is structurally impossible.
const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS upload_sessions (
    upload_id     TEXT PRIMARY KEY,
    file_name     TEXT NOT NULL,
    file_type     TEXT NOT NULL,
    folder        TEXT NOT NULL,
    expected_total INTEGER NOT NULL DEFAULT 0,
    state         TEXT NOT NULL DEFAULT 'receiving',
    created_at    TEXT NOT NULL,
    last_touched  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS upload_parts (
    upload_id   TEXT NOT NULL REFERENCES upload_sessions(upload_id) ON DELETE CASCADE,
    part_index  INTEGER NOT NULL,
    payload     BLOB NOT NULL,
    PRIMARY KEY (upload_id, part_index)
);

CREATE INDEX IF NOT EXISTS idx_upload_sessions_last_touched
    ON upload_sessions(last_touched);
";

/// SQLite-backed session store for deployments that must survive restarts.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Create a new SQLite store, creating the database and schema on
    /// first use.
    pub async fn new(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // SQLite permits limited write concurrency; a single connection
            // avoids persistent "database is locked" failures under axum
            // concurrency and serializes per-session mutations for free.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> StoreResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn create(&self, session: UploadSession) -> StoreResult<()> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO upload_sessions \
             (upload_id, file_name, file_type, folder, expected_total, state, created_at, last_touched) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(session.id.to_string())
        .bind(&session.file_name)
        .bind(&session.file_type)
        .bind(&session.folder)
        .bind(session.expected_total as i64)
        .bind(session.state.as_str())
        .bind(session.created_at)
        .bind(session.last_touched)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::AlreadyExists(session.id.to_string()));
        }
        Ok(())
    }

    async fn get(&self, id: SessionId) -> StoreResult<Option<SessionSummary>> {
        let row: Option<(i64, OffsetDateTime)> = sqlx::query_as(
            "SELECT expected_total, last_touched FROM upload_sessions WHERE upload_id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        let Some((total, last_touched)) = row else {
            return Ok(None);
        };

        let received: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM upload_parts WHERE upload_id = ? AND part_index < ?",
        )
        .bind(id.to_string())
        .bind(total)
        .fetch_one(&self.pool)
        .await?;

        Ok(Some(SessionSummary {
            received: received as u32,
            total: total as u32,
            last_touched,
        }))
    }

    async fn store_part(&self, id: SessionId, part: IncomingPart) -> StoreResult<PartOutcome> {
        let key = id.to_string();
        let mut tx = self.pool.begin().await?;

        let row: Option<(i64, String)> = sqlx::query_as(
            "SELECT expected_total, state FROM upload_sessions WHERE upload_id = ?",
        )
        .bind(&key)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((expected_total, state)) = row else {
            return Err(StoreError::NotFound(key));
        };
        if state != SessionState::Receiving.as_str() {
            // Claimed by a racing final chunk; the session is as good as gone.
            return Err(StoreError::NotFound(key));
        }

        let new_total = expected_total.max(part.total as i64);
        sqlx::query(
            "UPDATE upload_sessions SET expected_total = ?, last_touched = ? WHERE upload_id = ?",
        )
        .bind(new_total)
        .bind(part.received_at)
        .bind(&key)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO upload_parts (upload_id, part_index, payload) VALUES (?, ?, ?) \
             ON CONFLICT(upload_id, part_index) DO UPDATE SET payload = excluded.payload",
        )
        .bind(&key)
        .bind(part.index as i64)
        .bind(part.payload.as_ref())
        .execute(&mut *tx)
        .await?;

        // Empty payloads are rejected upstream, so every stored row is a
        // filled slot and a plain count decides completeness.
        let received: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM upload_parts WHERE upload_id = ? AND part_index < ?",
        )
        .bind(&key)
        .bind(new_total)
        .fetch_one(&mut *tx)
        .await?;

        if received == new_total {
            // Atomic claim: only one transaction observes the receiving ->
            // finalizing transition.
            let claimed = sqlx::query(
                "UPDATE upload_sessions SET state = ? WHERE upload_id = ? AND state = ?",
            )
            .bind(SessionState::Finalizing.as_str())
            .bind(&key)
            .bind(SessionState::Receiving.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected()
                > 0;

            if claimed {
                let (file_name, file_type, folder, created_at): (
                    String,
                    String,
                    String,
                    OffsetDateTime,
                ) = sqlx::query_as(
                    "SELECT file_name, file_type, folder, created_at \
                     FROM upload_sessions WHERE upload_id = ?",
                )
                .bind(&key)
                .fetch_one(&mut *tx)
                .await?;

                let rows: Vec<(i64, Vec<u8>)> = sqlx::query_as(
                    "SELECT part_index, payload FROM upload_parts \
                     WHERE upload_id = ? AND part_index < ? ORDER BY part_index",
                )
                .bind(&key)
                .bind(new_total)
                .fetch_all(&mut *tx)
                .await?;

                tx.commit().await?;

                let mut parts = vec![Bytes::new(); new_total as usize];
                for (index, payload) in rows {
                    parts[index as usize] = Bytes::from(payload);
                }

                return Ok(PartOutcome::Complete(UploadSession {
                    id,
                    file_name,
                    file_type,
                    folder,
                    parts,
                    expected_total: new_total as u32,
                    state: SessionState::Finalizing,
                    created_at,
                    last_touched: part.received_at,
                }));
            }
        }

        tx.commit().await?;
        Ok(PartOutcome::Accepted {
            received: received as u32,
            total: new_total as u32,
        })
    }

    async fn delete(&self, id: SessionId) -> StoreResult<()> {
        // Parts cascade via the foreign key.
        sqlx::query("DELETE FROM upload_sessions WHERE upload_id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn reap_expired(&self, cutoff: OffsetDateTime) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM upload_sessions WHERE last_touched < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn live_count(&self) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM upload_sessions")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn new_store() -> (tempfile::TempDir, SqliteStore) {
        let temp = tempdir().unwrap();
        let store = SqliteStore::new(temp.path().join("sessions.db"))
            .await
            .unwrap();
        (temp, store)
    }

    fn new_session() -> UploadSession {
        UploadSession::new(
            "kit.zip".to_string(),
            "application/zip".to_string(),
            "packs".to_string(),
        )
    }

    fn part(index: u32, total: u32, payload: &'static [u8]) -> IncomingPart {
        IncomingPart {
            index,
            total,
            payload: Bytes::from_static(payload),
            received_at: OffsetDateTime::now_utc(),
        }
    }

    #[tokio::test]
    async fn survives_reopen() {
        let temp = tempdir().unwrap();
        let db_path = temp.path().join("sessions.db");

        let session = new_session();
        let id = session.id;
        {
            let store = SqliteStore::new(&db_path).await.unwrap();
            store.create(session).await.unwrap();
            store.store_part(id, part(0, 2, b"AAAA")).await.unwrap();
        }

        let store = SqliteStore::new(&db_path).await.unwrap();
        let summary = store.get(id).await.unwrap().unwrap();
        assert_eq!(summary.received, 1);
        assert_eq!(summary.total, 2);
    }

    #[tokio::test]
    async fn store_part_completes_and_reassembles() {
        let (_temp, store) = new_store().await;
        let session = new_session();
        let id = session.id;
        store.create(session).await.unwrap();

        match store.store_part(id, part(1, 2, b"BBBB")).await.unwrap() {
            PartOutcome::Accepted { received: 1, total: 2 } => {}
            other => panic!("unexpected: {other:?}"),
        }

        match store.store_part(id, part(0, 2, b"AAAA")).await.unwrap() {
            PartOutcome::Complete(session) => {
                assert_eq!(session.assemble().unwrap(), Bytes::from_static(b"AAAABBBB"));
            }
            other => panic!("unexpected: {other:?}"),
        }

        // Claimed sessions no longer accept parts.
        let err = store.store_part(id, part(0, 2, b"dup")).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn duplicate_part_overwrites() {
        let (_temp, store) = new_store().await;
        let session = new_session();
        let id = session.id;
        store.create(session).await.unwrap();

        store.store_part(id, part(0, 2, b"old!")).await.unwrap();
        store.store_part(id, part(0, 2, b"new!")).await.unwrap();
        let summary = store.get(id).await.unwrap().unwrap();
        assert_eq!(summary.received, 1);

        match store.store_part(id, part(1, 2, b"tail")).await.unwrap() {
            PartOutcome::Complete(session) => {
                assert_eq!(session.assemble().unwrap(), Bytes::from_static(b"new!tail"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn grows_when_larger_total_declared() {
        let (_temp, store) = new_store().await;
        let session = new_session();
        let id = session.id;
        store.create(session).await.unwrap();

        store.store_part(id, part(0, 2, b"a")).await.unwrap();
        match store.store_part(id, part(2, 3, b"c")).await.unwrap() {
            PartOutcome::Accepted { received: 2, total: 3 } => {}
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_id_is_not_found_and_creates_nothing() {
        let (_temp, store) = new_store().await;
        let err = store
            .store_part(SessionId::new(), part(0, 1, b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert_eq!(store.live_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delete_is_idempotent_and_drops_parts() {
        let (_temp, store) = new_store().await;
        let session = new_session();
        let id = session.id;
        store.create(session).await.unwrap();
        store.store_part(id, part(0, 2, b"AAAA")).await.unwrap();

        store.delete(id).await.unwrap();
        store.delete(id).await.unwrap();
        assert!(store.get(id).await.unwrap().is_none());

        let orphaned: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM upload_parts WHERE upload_id = ?")
                .bind(id.to_string())
                .fetch_one(store.pool())
                .await
                .unwrap();
        assert_eq!(orphaned, 0);
    }

    #[tokio::test]
    async fn reap_removes_idle_sessions() {
        let (_temp, store) = new_store().await;
        let stale = new_session();
        let stale_id = stale.id;
        store.create(stale).await.unwrap();
        store.store_part(stale_id, part(0, 2, b"AAAA")).await.unwrap();

        let cutoff = OffsetDateTime::now_utc() + time::Duration::minutes(1);
        assert_eq!(store.reap_expired(cutoff).await.unwrap(), 1);
        assert!(store.get(stale_id).await.unwrap().is_none());

        let err = store
            .store_part(stale_id, part(1, 2, b"BBBB"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
