//! # Record Stores
//!
//! Persistence capability used by the resource layer. A store only knows how
//! to read and write records of one [`Entity`] type by id; validation lives in
//! the resource layer.

use crate::entity::Entity;
use crate::error::Result;
use crate::schema::Fields;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use tokio::sync::RwLock;

/// CRUD-by-id access to records of one entity type
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    /// Record type held by this store
    type Record: Entity;

    /// All records, ordered by ascending id
    async fn find_all(&self) -> Result<Vec<Self::Record>>;

    /// The record with `id`, if any
    async fn find_by_id(&self, id: i64) -> Result<Option<Self::Record>>;

    /// Persist a new record built from complete cleaned fields and assign its id
    async fn insert(&self, fields: Fields) -> Result<Self::Record>;

    /// Overwrite an existing record
    ///
    /// Returns `false` if no record with that id exists any more.
    async fn update(&self, record: &Self::Record) -> Result<bool>;

    /// Remove a record
    ///
    /// Returns `false` if no record with that id existed.
    async fn delete(&self, id: i64) -> Result<bool>;

    /// The subset of `ids` with no matching record, in input order
    async fn missing_ids(&self, ids: &[i64]) -> Result<Vec<i64>>;
}

/// Existence check against another resource's store
///
/// Lets a resource validate reference fields without knowing the concrete
/// record type on the other end.
#[async_trait]
pub trait ReferenceLookup: Send + Sync {
    /// The subset of `ids` that do not resolve to a record
    async fn unresolved(&self, ids: &[i64]) -> Result<Vec<i64>>;
}

#[async_trait]
impl<S: RecordStore> ReferenceLookup for S {
    async fn unresolved(&self, ids: &[i64]) -> Result<Vec<i64>> {
        self.missing_ids(ids).await
    }
}

struct MemoryTable<E> {
    records: BTreeMap<i64, E>,
    last_id: i64,
}

/// In-process store backed by an ordered map
///
/// Ids start at 1 and are never reused. Deleting a record here does not
/// touch references held by other stores.
pub struct MemoryStore<E> {
    table: RwLock<MemoryTable<E>>,
    _record: PhantomData<fn() -> E>,
}

impl<E> Default for MemoryStore<E> {
    fn default() -> Self {
        Self {
            table: RwLock::new(MemoryTable {
                records: BTreeMap::new(),
                last_id: 0,
            }),
            _record: PhantomData,
        }
    }
}

impl<E> MemoryStore<E> {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.table.read().await.records.len()
    }

    /// Whether the store holds no records
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl<E: Entity> RecordStore for MemoryStore<E> {
    type Record = E;

    async fn find_all(&self) -> Result<Vec<E>> {
        Ok(self.table.read().await.records.values().cloned().collect())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<E>> {
        Ok(self.table.read().await.records.get(&id).cloned())
    }

    async fn insert(&self, fields: Fields) -> Result<E> {
        let mut table = self.table.write().await;
        let id = table.last_id + 1;
        let record = E::from_fields(id, fields)?;
        table.last_id = id;
        table.records.insert(id, record.clone());
        Ok(record)
    }

    async fn update(&self, record: &E) -> Result<bool> {
        let mut table = self.table.write().await;
        match table.records.get_mut(&record.id()) {
            Some(slot) => {
                *slot = record.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        Ok(self.table.write().await.records.remove(&id).is_some())
    }

    async fn missing_ids(&self, ids: &[i64]) -> Result<Vec<i64>> {
        let table = self.table.read().await;
        Ok(ids
            .iter()
            .copied()
            .filter(|id| !table.records.contains_key(id))
            .collect())
    }
}
