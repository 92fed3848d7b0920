use async_trait::async_trait;
use dashmap::DashMap;
use keyhole_core::error::Result;
use keyhole_core::{
    CreateOrFind, Fingerprint, ReadRepository, Repository, RepositoryTransaction, ShortKey,
    UrlRecord,
};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default)]
struct Tables {
    by_key: DashMap<ShortKey, UrlRecord>,
    by_fingerprint: DashMap<Fingerprint, ShortKey>,
}

impl Tables {
    fn get(&self, key: &ShortKey) -> Option<UrlRecord> {
        self.by_key.get(key).map(|entry| entry.value().clone())
    }

    fn find_by_fingerprint(&self, fingerprint: &Fingerprint) -> Option<UrlRecord> {
        let key = self.by_fingerprint.get(fingerprint)?.value().clone();
        self.get(&key)
    }
}

/// In-memory implementation of the repository contract using DashMap.
///
/// Reads go straight to the sharded maps. Transactions are serialized through
/// a single writer lock and only touch the maps on commit, so readers never
/// observe a half-written record. Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    tables: Arc<Tables>,
    writer: Arc<Mutex<()>>,
}

impl InMemoryRepository {
    /// Creates a new, empty in-memory repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed records.
    pub fn len(&self) -> usize {
        self.tables.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.by_key.is_empty()
    }
}

#[async_trait]
impl ReadRepository for InMemoryRepository {
    async fn get(&self, key: &ShortKey) -> Result<Option<UrlRecord>> {
        Ok(self.tables.get(key))
    }

    async fn find_by_fingerprint(&self, fingerprint: &Fingerprint) -> Result<Option<UrlRecord>> {
        Ok(self.tables.find_by_fingerprint(fingerprint))
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn begin(&self) -> Result<Box<dyn RepositoryTransaction>> {
        let guard = Arc::clone(&self.writer).lock_owned().await;
        Ok(Box::new(InMemoryTransaction {
            tables: Arc::clone(&self.tables),
            staged: Vec::new(),
            _writer: guard,
        }))
    }
}

struct InMemoryTransaction {
    tables: Arc<Tables>,
    staged: Vec<UrlRecord>,
    _writer: OwnedMutexGuard<()>,
}

impl InMemoryTransaction {
    fn staged_by_fingerprint(&self, fingerprint: &Fingerprint) -> Option<&UrlRecord> {
        self.staged
            .iter()
            .find(|record| &record.fingerprint == fingerprint)
    }

    fn key_taken(&self, key: &ShortKey) -> bool {
        self.tables.by_key.contains_key(key) || self.staged.iter().any(|record| &record.key == key)
    }
}

#[async_trait]
impl RepositoryTransaction for InMemoryTransaction {
    async fn find_by_fingerprint(
        &mut self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<UrlRecord>> {
        if let Some(record) = self.staged_by_fingerprint(fingerprint) {
            return Ok(Some(record.clone()));
        }
        Ok(self.tables.find_by_fingerprint(fingerprint))
    }

    async fn create_or_find(&mut self, record: UrlRecord) -> Result<CreateOrFind> {
        if let Some(existing) = self.find_by_fingerprint(&record.fingerprint).await? {
            return Ok(CreateOrFind::Found(existing));
        }
        if self.key_taken(&record.key) {
            return Ok(CreateOrFind::KeyConflict);
        }

        self.staged.push(record.clone());
        Ok(CreateOrFind::Created(record))
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let InMemoryTransaction { tables, staged, .. } = *self;

        // Key first: a fingerprint entry must never point at a missing record.
        for record in staged {
            tables.by_key.insert(record.key.clone(), record.clone());
            tables.by_fingerprint.insert(record.fingerprint, record.key);
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
