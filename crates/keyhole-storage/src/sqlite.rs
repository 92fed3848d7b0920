use crate::error::{is_unique_violation, map_sqlx_error, map_transaction_error};
use crate::row::{decode_record, RECORD_COLUMNS};
use async_trait::async_trait;
use keyhole_core::error::Result;
use keyhole_core::{
    CreateOrFind, Fingerprint, ReadRepository, Repository, RepositoryTransaction, ShortKey,
    UrlRecord,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// How long a connection waits for the write lock before giving up.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const DEFAULT_MAX_CONNECTIONS: u32 = 8;

/// SQLite implementation of the repository contract.
///
/// SQLite allows a single writer at a time. Transactions are opened with
/// `BEGIN IMMEDIATE`, so concurrent `shorten` calls queue on the write lock
/// (up to the busy timeout) instead of failing when a read lock cannot be
/// upgraded.
#[derive(Debug, Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Creates a repository from an existing SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens a pool for `database_url` (e.g. `sqlite://keyhole.db?mode=rwc`).
    pub async fn connect(database_url: &str) -> Result<Self> {
        Self::connect_with(database_url, DEFAULT_MAX_CONNECTIONS).await
    }

    /// Opens a pool of at most `max_connections` connections in WAL mode.
    pub async fn connect_with(database_url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(map_sqlx_error)?
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(DEFAULT_BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self::new(pool))
    }

    /// A private in-memory database with the schema already provisioned.
    ///
    /// Every connection to `sqlite::memory:` gets its own database, so the
    /// pool is pinned to one connection that is never recycled.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(map_sqlx_error)?;

        let repository = Self::new(pool);
        repository.provision_schema().await?;
        Ok(repository)
    }

    /// Creates the `shortened_urls` table if it does not exist yet.
    pub async fn provision_schema(&self) -> Result<()> {
        sqlx::query(include_str!("../ddl/sqlite/shortened_urls.sql"))
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    /// Number of committed records.
    pub async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query("SELECT COUNT(*) AS n FROM shortened_urls")
            .fetch_one(&self.pool)
            .await
            .and_then(|row| row.try_get("n"))
            .map_err(map_sqlx_error)?;
        Ok(count.max(0) as u64)
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

async fn select_by_fingerprint(
    conn: &mut SqliteConnection,
    fingerprint: &Fingerprint,
) -> Result<Option<UrlRecord>> {
    let row = sqlx::query(&format!(
        "SELECT {RECORD_COLUMNS} FROM shortened_urls WHERE fingerprint = ? LIMIT 1"
    ))
    .bind(fingerprint.as_str())
    .fetch_optional(conn)
    .await
    .map_err(map_sqlx_error)?;

    row.as_ref().map(decode_record).transpose()
}

#[async_trait]
impl ReadRepository for SqliteRepository {
    async fn get(&self, key: &ShortKey) -> Result<Option<UrlRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM shortened_urls WHERE short_key = ? LIMIT 1"
        ))
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(decode_record).transpose()
    }

    async fn find_by_fingerprint(&self, fingerprint: &Fingerprint) -> Result<Option<UrlRecord>> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx_error)?;
        select_by_fingerprint(&mut conn, fingerprint).await
    }
}

#[async_trait]
impl Repository for SqliteRepository {
    async fn begin(&self) -> Result<Box<dyn RepositoryTransaction>> {
        let tx = self
            .pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(map_transaction_error)?;
        Ok(Box::new(SqliteTransaction { tx }))
    }
}

struct SqliteTransaction {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl RepositoryTransaction for SqliteTransaction {
    async fn find_by_fingerprint(
        &mut self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<UrlRecord>> {
        select_by_fingerprint(&mut self.tx, fingerprint).await
    }

    async fn create_or_find(&mut self, record: UrlRecord) -> Result<CreateOrFind> {
        let result = sqlx::query(
            r#"
            INSERT INTO shortened_urls (original_url, fingerprint, short_key, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&record.original_url)
        .bind(record.fingerprint.as_str())
        .bind(record.key.as_str())
        .bind(record.created_at.as_second())
        .execute(&mut *self.tx)
        .await;

        match result {
            Ok(_) => Ok(CreateOrFind::Created(record)),
            Err(err) if is_unique_violation(&err) => {
                match select_by_fingerprint(&mut self.tx, &record.fingerprint).await? {
                    Some(existing) => {
                        debug!(key = %existing.key, "Fingerprint already taken");
                        Ok(CreateOrFind::Found(existing))
                    }
                    None => {
                        debug!(key = %record.key, "Key already taken");
                        Ok(CreateOrFind::KeyConflict)
                    }
                }
            }
            Err(err) => Err(map_sqlx_error(err)),
        }
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await.map_err(map_transaction_error)
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await.map_err(map_transaction_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::Timestamp;

    fn record(url: &str, fingerprint: &str, key: &str) -> UrlRecord {
        UrlRecord {
            original_url: url.to_string(),
            fingerprint: Fingerprint::new(fingerprint),
            key: ShortKey::new_unchecked(key),
            created_at: Timestamp::from_second(1_700_000_000).unwrap(),
        }
    }

    async fn insert(repo: &SqliteRepository, rec: UrlRecord) -> CreateOrFind {
        let mut tx = repo.begin().await.unwrap();
        let outcome = tx.create_or_find(rec).await.unwrap();
        tx.commit().await.unwrap();
        outcome
    }

    async fn find_or_insert(repo: &SqliteRepository, rec: UrlRecord) -> CreateOrFind {
        let mut tx = repo.begin().await.unwrap();
        let outcome = match tx.find_by_fingerprint(&rec.fingerprint).await.unwrap() {
            Some(existing) => CreateOrFind::Found(existing),
            None => tx.create_or_find(rec).await.unwrap(),
        };
        tx.commit().await.unwrap();
        outcome
    }

    #[tokio::test]
    async fn create_and_read_back() {
        let repo = SqliteRepository::in_memory().await.unwrap();
        let rec = record("https://example.com", "fp-1", "key1");

        assert_eq!(insert(&repo, rec.clone()).await, CreateOrFind::Created(rec.clone()));

        assert_eq!(repo.get(&rec.key).await.unwrap(), Some(rec.clone()));
        assert_eq!(
            repo.find_by_fingerprint(&rec.fingerprint).await.unwrap(),
            Some(rec)
        );
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn fingerprint_conflict_finds_the_existing_row() {
        let repo = SqliteRepository::in_memory().await.unwrap();
        let first = record("https://example.com", "fp-1", "key1");
        insert(&repo, first.clone()).await;

        let outcome = insert(&repo, record("https://example.com/", "fp-1", "key2")).await;

        assert_eq!(outcome, CreateOrFind::Found(first));
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn key_conflict_is_reported_and_keeps_the_transaction_usable() {
        let repo = SqliteRepository::in_memory().await.unwrap();
        insert(&repo, record("https://one.example", "fp-1", "key1")).await;

        let mut tx = repo.begin().await.unwrap();
        let clash = tx
            .create_or_find(record("https://two.example", "fp-2", "key1"))
            .await
            .unwrap();
        assert_eq!(clash, CreateOrFind::KeyConflict);

        let retry = record("https://two.example", "fp-2", "key2");
        let outcome = tx.create_or_find(retry.clone()).await.unwrap();
        assert_eq!(outcome, CreateOrFind::Created(retry));
        tx.commit().await.unwrap();

        assert_eq!(repo.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn rollback_discards_the_insert() {
        let repo = SqliteRepository::in_memory().await.unwrap();
        let rec = record("https://example.com", "fp-1", "key1");

        let mut tx = repo.begin().await.unwrap();
        tx.create_or_find(rec.clone()).await.unwrap();
        assert_eq!(
            tx.find_by_fingerprint(&rec.fingerprint).await.unwrap(),
            Some(rec.clone())
        );
        tx.rollback().await.unwrap();

        assert!(repo.get(&rec.key).await.unwrap().is_none());
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn dropped_transaction_rolls_back() {
        let repo = SqliteRepository::in_memory().await.unwrap();
        let rec = record("https://example.com", "fp-1", "key1");

        {
            let mut tx = repo.begin().await.unwrap();
            tx.create_or_find(rec.clone()).await.unwrap();
        }

        assert!(repo.find_by_fingerprint(&rec.fingerprint).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_transactions_on_a_file_share_one_row() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("keyhole.db").display());
        let repo = SqliteRepository::connect_with(&url, 4).await.unwrap();
        repo.provision_schema().await.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let repo = repo.clone();
                let rec = record("https://example.com", "fp-shared", &format!("key{i}"));
                tokio::spawn(async move { find_or_insert(&repo, rec).await })
            })
            .collect();

        let mut keys = vec![];
        for handle in handles {
            match handle.await.unwrap() {
                CreateOrFind::Created(rec) | CreateOrFind::Found(rec) => keys.push(rec.key),
                CreateOrFind::KeyConflict => panic!("keys are distinct"),
            }
        }

        keys.dedup();
        assert_eq!(keys.len(), 1);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn keys_are_case_sensitive() {
        let repo = SqliteRepository::in_memory().await.unwrap();
        let lower = record("https://one.example", "fp-1", "abc");
        let upper = record("https://two.example", "fp-2", "ABC");

        assert_eq!(insert(&repo, lower.clone()).await, CreateOrFind::Created(lower));
        assert_eq!(insert(&repo, upper.clone()).await, CreateOrFind::Created(upper));
    }
}
