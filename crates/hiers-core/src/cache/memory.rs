use super::error::CacheError;
use super::{CacheRecord, PutOutcome, ScaffoldCache};
use std::collections::{BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct Inner {
    /// Records by id; id `n` lives at index `n - 1`.
    records: Vec<CacheRecord>,
    by_key: HashMap<String, u64>,
}

impl Inner {
    fn record(&self, id: u64) -> Option<&CacheRecord> {
        let index = usize::try_from(id).ok()?.checked_sub(1)?;
        self.records.get(index)
    }

    fn record_mut(&mut self, id: u64) -> Option<&mut CacheRecord> {
        let index = usize::try_from(id).ok()?.checked_sub(1)?;
        self.records.get_mut(index)
    }
}

/// A process-local cache, discarded when dropped.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    inner: RwLock<Inner>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, CacheError> {
        self.inner.read().map_err(|_| CacheError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, CacheError> {
        self.inner.write().map_err(|_| CacheError::Poisoned)
    }

    /// All records in id order.
    pub fn records(&self) -> Result<Vec<CacheRecord>, CacheError> {
        Ok(self.read()?.records.clone())
    }
}

impl ScaffoldCache for InMemoryCache {
    fn get(&self, key: &str) -> Result<Option<u64>, CacheError> {
        Ok(self.read()?.by_key.get(key).copied())
    }

    fn key_of(&self, id: u64) -> Result<Option<String>, CacheError> {
        Ok(self.read()?.record(id).map(|r| r.key.clone()))
    }

    fn get_children(&self, id: u64) -> Result<BTreeSet<u64>, CacheError> {
        self.read()?
            .record(id)
            .map(|r| r.children.clone())
            .ok_or(CacheError::MissingRecord(id))
    }

    fn put(&self, key: &str) -> Result<PutOutcome, CacheError> {
        let mut inner = self.write()?;
        if let Some(&id) = inner.by_key.get(key) {
            return Ok(PutOutcome::Existing(id));
        }
        let id = inner.records.len() as u64 + 1;
        inner.records.push(CacheRecord::new(id, key.to_string()));
        inner.by_key.insert(key.to_string(), id);
        Ok(PutOutcome::Inserted(id))
    }

    fn put_child_link(&self, parent: u64, child: u64) -> Result<bool, CacheError> {
        let mut inner = self.write()?;
        if inner.record(child).is_none() {
            return Err(CacheError::DanglingChild { parent, child });
        }
        let record = inner.record_mut(parent).ok_or(CacheError::MissingRecord(parent))?;
        Ok(record.children.insert(child))
    }

    fn len(&self) -> Result<usize, CacheError> {
        Ok(self.read()?.records.len())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
