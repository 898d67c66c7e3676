//! SQLite Store
//!
//! Implements TargetRepository and MessageStore on a single SQLite
//! database. Blocking rusqlite calls run on the blocking thread pool.

use crate::domain::entities::{SentMessage, Target};
use crate::domain::error::StorageError;
use crate::domain::ports::{MessageStore, TargetRepository};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::Arc;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS servers (
        id     INTEGER PRIMARY KEY AUTOINCREMENT,
        url    TEXT NOT NULL UNIQUE,
        weight REAL NOT NULL
    );
    CREATE TABLE IF NOT EXISTS sent_messages (
        id          TEXT PRIMARY KEY,
        provider_id TEXT,
        destination TEXT NOT NULL,
        status      TEXT NOT NULL,
        start_time  TEXT NOT NULL,
        end_time    TEXT,
        target_url  TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_sent_messages_provider_id
        ON sent_messages (provider_id);
    CREATE TABLE IF NOT EXISTS invalid_destinations (
        destination TEXT PRIMARY KEY
    );
";

/// SQLite-backed store for targets, sent messages and invalid destinations.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database file and ensure the schema exists.
    pub fn open(db_path: &str) -> anyhow::Result<Self> {
        let conn = Connection::open(db_path)?;
        Self::from_connection(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> anyhow::Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> anyhow::Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Insert targets whose url is not yet stored.
    ///
    /// Existing targets keep their weight. Returns how many were inserted.
    pub async fn seed_targets(&self, targets: Vec<Target>) -> Result<usize, StorageError> {
        self.run(move |conn| {
            let mut inserted = 0;
            for target in &targets {
                inserted += conn.execute(
                    "INSERT OR IGNORE INTO servers (url, weight) VALUES (?1, ?2)",
                    params![target.url, target.weight],
                )?;
            }
            Ok(inserted)
        })
        .await
    }

    /// Run a closure against the connection on the blocking pool.
    async fn run<F, T>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            f(&guard)
        })
        .await
        .map_err(|e| StorageError::Task(e.to_string()))?
        .map_err(|e| StorageError::Database(e.to_string()))
    }

    fn row_to_message(row: &Row) -> rusqlite::Result<SentMessage> {
        Ok(SentMessage {
            id: row.get(0)?,
            provider_id: row.get(1)?,
            destination: row.get(2)?,
            status: row.get(3)?,
            start_time: parse_time(4, row.get(4)?)?,
            end_time: row
                .get::<_, Option<String>>(5)?
                .map(|t| parse_time(5, t))
                .transpose()?,
            target_url: row.get(6)?,
        })
    }
}

fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_time(column: usize, value: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

#[async_trait]
impl TargetRepository for SqliteStore {
    async fn list_targets(&self) -> Result<Vec<Target>, StorageError> {
        self.run(|conn| {
            let mut stmt = conn.prepare("SELECT url, weight FROM servers ORDER BY id")?;
            let targets = stmt
                .query_map([], |row| {
                    Ok(Target {
                        url: row.get(0)?,
                        weight: row.get(1)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(targets)
        })
        .await
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn is_invalid_destination(&self, destination: &str) -> Result<bool, StorageError> {
        let destination = destination.to_string();
        self.run(move |conn| {
            conn.query_row(
                "SELECT 1 FROM invalid_destinations WHERE destination = ?1",
                params![destination],
                |_| Ok(()),
            )
            .optional()
            .map(|found| found.is_some())
        })
        .await
    }

    async fn mark_destination_invalid(&self, destination: &str) -> Result<(), StorageError> {
        let destination = destination.to_string();
        self.run(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO invalid_destinations (destination) VALUES (?1)",
                params![destination],
            )
            .map(|_| ())
        })
        .await
    }

    async fn save_message(&self, message: &SentMessage) -> Result<(), StorageError> {
        let message = message.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO sent_messages
                    (id, provider_id, destination, status, start_time, end_time, target_url)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    message.id,
                    message.provider_id,
                    message.destination,
                    message.status,
                    format_time(&message.start_time),
                    message.end_time.as_ref().map(format_time),
                    message.target_url,
                ],
            )
            .map(|_| ())
        })
        .await
    }

    async fn find_by_provider_id(
        &self,
        provider_id: &str,
    ) -> Result<Option<SentMessage>, StorageError> {
        let provider_id = provider_id.to_string();
        self.run(move |conn| {
            conn.query_row(
                "SELECT id, provider_id, destination, status, start_time, end_time, target_url
                 FROM sent_messages
                 WHERE provider_id = ?1
                 ORDER BY start_time
                 LIMIT 1",
                params![provider_id],
                Self::row_to_message,
            )
            .optional()
        })
        .await
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use chrono::Duration;

    fn store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    // ===== Target Tests =====

    #[tokio::test]
    async fn test_list_targets_empty() {
        assert!(store().list_targets().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_seed_targets_preserves_order() {
        let store = store();
        let inserted = store
            .seed_targets(vec![
                Target::new("server1", 0.3),
                Target::new("server2", 0.3),
                Target::new("server3", 0.4),
            ])
            .await
            .unwrap();

        assert_eq!(inserted, 3);
        let urls: Vec<String> = store
            .list_targets()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.url)
            .collect();
        assert_eq!(urls, vec!["server1", "server2", "server3"]);
    }

    #[tokio::test]
    async fn test_seed_targets_is_idempotent() {
        let store = store();
        store
            .seed_targets(vec![Target::new("server1", 0.3)])
            .await
            .unwrap();
        let inserted = store
            .seed_targets(vec![Target::new("server1", 0.9), Target::new("server2", 0.2)])
            .await
            .unwrap();

        assert_eq!(inserted, 1);
        let targets = store.list_targets().await.unwrap();
        assert_eq!(targets.len(), 2);
        // Existing target keeps its stored weight
        assert_eq!(targets[0], Target::new("server1", 0.3));
    }

    // ===== Invalid Destination Tests =====

    #[tokio::test]
    async fn test_invalid_destinations() {
        let store = store();
        assert!(!store.is_invalid_destination("2223334444").await.unwrap());

        store.mark_destination_invalid("2223334444").await.unwrap();
        store.mark_destination_invalid("2223334444").await.unwrap();

        assert!(store.is_invalid_destination("2223334444").await.unwrap());
        assert!(!store.is_invalid_destination("6667778888").await.unwrap());
    }

    // ===== Message Tests =====

    #[tokio::test]
    async fn test_save_and_find_message() {
        let store = store();
        let mut msg = SentMessage::pending("9994440101", Utc::now());
        msg.provider_id = Some("5678".to_string());
        msg.target_url = Some("server1".to_string());

        store.save_message(&msg).await.unwrap();

        let found = store.find_by_provider_id("5678").await.unwrap().unwrap();
        // Stored timestamps keep microsecond precision
        assert_eq!(found.id, msg.id);
        assert_eq!(found.destination, "9994440101");
        assert_eq!(found.status, "pending");
        assert_eq!(found.target_url.as_deref(), Some("server1"));
        assert_eq!(
            found.start_time.timestamp_micros(),
            msg.start_time.timestamp_micros()
        );
        assert!(found.end_time.is_none());
    }

    #[tokio::test]
    async fn test_save_message_replaces_existing() {
        let store = store();
        let start = Utc::now();
        let mut msg = SentMessage::pending("4347672121", start);
        msg.provider_id = Some("1234".to_string());
        store.save_message(&msg).await.unwrap();

        msg.status = "delivered".to_string();
        msg.end_time = Some(start + Duration::seconds(3));
        store.save_message(&msg).await.unwrap();

        let found = store.find_by_provider_id("1234").await.unwrap().unwrap();
        assert_eq!(found.status, "delivered");
        assert_eq!(
            found.end_time.map(|t| t.timestamp_micros()),
            Some((start + Duration::seconds(3)).timestamp_micros())
        );
    }

    #[tokio::test]
    async fn test_sqlite_failure_maps_to_database_error() {
        let store = SqliteStore::open_in_memory().unwrap();

        let result = store
            .run(|conn| conn.execute("INSERT INTO no_such_table VALUES (1)", []))
            .await;

        match result {
            Err(StorageError::Database(msg)) => assert!(msg.contains("no_such_table")),
            other => panic!("expected database error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_find_unknown_provider_id() {
        assert!(store().find_by_provider_id("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_open_file_persists_across_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("balancer.db");
        let path = path.to_str().unwrap();

        {
            let store = SqliteStore::open(path).unwrap();
            store
                .seed_targets(vec![Target::new("server1", 0.5)])
                .await
                .unwrap();
            store.mark_destination_invalid("2223334444").await.unwrap();
        }

        let reopened = SqliteStore::open(path).unwrap();
        assert_eq!(reopened.list_targets().await.unwrap().len(), 1);
        assert!(reopened.is_invalid_destination("2223334444").await.unwrap());
    }
}
