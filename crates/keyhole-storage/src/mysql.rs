use crate::error::{is_unique_violation, map_sqlx_error, map_transaction_error};
use crate::row::{decode_record, RECORD_COLUMNS};
use async_trait::async_trait;
use keyhole_core::error::Result;
use keyhole_core::{
    CreateOrFind, Fingerprint, ReadRepository, Repository, RepositoryTransaction, ShortKey,
    UrlRecord,
};
use sqlx::{MySql, MySqlPool, Row, Transaction};
use tracing::debug;

/// Width of the `short_key` column; longer keys are rejected by the schema.
pub const MAX_KEY_LENGTH: usize = 20;

/// MySQL implementation of the repository contract.
///
/// Both uniqueness constraints live in the schema (`ddl/mysql`), so callers in
/// different processes deduplicate against each other without any
/// coordination beyond InnoDB's unique indexes.
#[derive(Debug, Clone)]
pub struct MySqlRepository {
    pool: MySqlPool,
}

impl MySqlRepository {
    /// Creates a repository from an existing MySQL connection pool.
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Creates a repository by opening a new MySQL connection pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = MySqlPool::connect(database_url)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self::new(pool))
    }

    /// Creates the `shortened_urls` table if it does not exist yet.
    pub async fn provision_schema(&self) -> Result<()> {
        sqlx::query(include_str!("../ddl/mysql/shortened_urls.sql"))
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
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

#[async_trait]
impl ReadRepository for MySqlRepository {
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
        let row = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM shortened_urls WHERE fingerprint = ? LIMIT 1"
        ))
        .bind(fingerprint.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(decode_record).transpose()
    }
}

#[async_trait]
impl Repository for MySqlRepository {
    async fn begin(&self) -> Result<Box<dyn RepositoryTransaction>> {
        let tx = self.pool.begin().await.map_err(map_transaction_error)?;
        Ok(Box::new(MySqlTransaction { tx }))
    }
}

struct MySqlTransaction {
    tx: Transaction<'static, MySql>,
}

impl MySqlTransaction {
    /// Reads the latest committed row for `fingerprint`.
    ///
    /// A plain `SELECT` would read from the snapshot taken by the first read
    /// of this transaction and miss a row committed by a concurrent winner.
    async fn find_latest_by_fingerprint(
        &mut self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<UrlRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM shortened_urls WHERE fingerprint = ? LIMIT 1 FOR SHARE"
        ))
        .bind(fingerprint.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(decode_record).transpose()
    }
}

#[async_trait]
impl RepositoryTransaction for MySqlTransaction {
    async fn find_by_fingerprint(
        &mut self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<UrlRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM shortened_urls WHERE fingerprint = ? LIMIT 1"
        ))
        .bind(fingerprint.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(decode_record).transpose()
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
                // InnoDB only rolls back the failed statement; the transaction
                // stays usable.
                match self.find_latest_by_fingerprint(&record.fingerprint).await? {
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
