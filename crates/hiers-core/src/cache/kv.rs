use super::error::CacheError;
use super::{CacheRecord, PutOutcome, ScaffoldCache};
use sled::Transactional;
use sled::transaction::ConflictableTransactionError;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::info;

const RECORDS_TREE: &str = "scaffold";
const KEYS_TREE: &str = "scafsmi";
const TREE_STRINGS_TREE: &str = "scaftree";
const META_TREE: &str = "meta";
const NEXT_ID: &[u8] = b"next_id";

/// A cache in an embedded `sled` database.
///
/// Records are stored by big-endian id in the `scaffold` tree with a
/// secondary index from canonical key to id in `scafsmi`. Ids come from a
/// counter that is updated in the same transaction as the record, so a crash
/// never leaves a gap or a reused id. Meant for one writing process.
#[derive(Debug, Clone)]
pub struct SledCache {
    db: sled::Db,
    records: sled::Tree,
    keys: sled::Tree,
    tree_strings: sled::Tree,
    meta: sled::Tree,
}

fn encode_id(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

fn decode_id(bytes: &[u8]) -> Result<u64, CacheError> {
    let array: [u8; 8] = bytes
        .try_into()
        .map_err(|_| CacheError::Corrupt(format!("id of {} bytes", bytes.len())))?;
    Ok(u64::from_be_bytes(array))
}

fn abort<E: Into<CacheError>>(err: E) -> ConflictableTransactionError<CacheError> {
    ConflictableTransactionError::Abort(err.into())
}

impl SledCache {
    /// Opens or creates the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref();
        let cache = Self::from_db(sled::open(path)?)?;
        info!(path = %path.display(), records = cache.records.len(), "Opened sled scaffold cache");
        Ok(cache)
    }

    /// A throwaway database that is removed when dropped.
    pub fn temporary() -> Result<Self, CacheError> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: sled::Db) -> Result<Self, CacheError> {
        Ok(Self {
            records: db.open_tree(RECORDS_TREE)?,
            keys: db.open_tree(KEYS_TREE)?,
            tree_strings: db.open_tree(TREE_STRINGS_TREE)?,
            meta: db.open_tree(META_TREE)?,
            db,
        })
    }

    fn read_record(&self, id: u64) -> Result<Option<CacheRecord>, CacheError> {
        match self.records.get(encode_id(id))? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// The stored tree string of a scaffold.
    pub fn tree_string(&self, id: u64) -> Result<Option<String>, CacheError> {
        match self.tree_strings.get(encode_id(id))? {
            Some(bytes) => String::from_utf8(bytes.to_vec())
                .map(Some)
                .map_err(|e| CacheError::Corrupt(e.to_string())),
            None => Ok(None),
        }
    }
}

impl ScaffoldCache for SledCache {
    fn get(&self, key: &str) -> Result<Option<u64>, CacheError> {
        self.keys.get(key.as_bytes())?.map(|bytes| decode_id(&bytes)).transpose()
    }

    fn key_of(&self, id: u64) -> Result<Option<String>, CacheError> {
        Ok(self.read_record(id)?.map(|r| r.key))
    }

    fn get_children(&self, id: u64) -> Result<BTreeSet<u64>, CacheError> {
        self.read_record(id)?
            .map(|r| r.children)
            .ok_or(CacheError::MissingRecord(id))
    }

    fn put(&self, key: &str) -> Result<PutOutcome, CacheError> {
        let outcome = (&self.records, &self.keys, &self.meta).transaction(|(records, keys, meta)| {
            if let Some(bytes) = keys.get(key.as_bytes())? {
                return Ok(PutOutcome::Existing(decode_id(&bytes).map_err(abort)?));
            }
            let id = match meta.get(NEXT_ID)? {
                Some(bytes) => decode_id(&bytes).map_err(abort)?,
                None => 1,
            };
            let record = CacheRecord::new(id, key.to_string());
            let encoded = bincode::serialize(&record).map_err(abort)?;
            records.insert(&encode_id(id)[..], encoded)?;
            keys.insert(key.as_bytes(), &encode_id(id)[..])?;
            meta.insert(NEXT_ID, &encode_id(id + 1)[..])?;
            Ok(PutOutcome::Inserted(id))
        })?;
        Ok(outcome)
    }

    fn put_child_link(&self, parent: u64, child: u64) -> Result<bool, CacheError> {
        let added = self.records.transaction(|records| {
            if records.get(encode_id(child))?.is_none() {
                return Err(abort(CacheError::DanglingChild { parent, child }));
            }
            let bytes = records
                .get(encode_id(parent))?
                .ok_or_else(|| abort(CacheError::MissingRecord(parent)))?;
            let mut record: CacheRecord = bincode::deserialize(&bytes).map_err(abort)?;
            if !record.children.insert(child) {
                return Ok(false);
            }
            let encoded = bincode::serialize(&record).map_err(abort)?;
            records.insert(&encode_id(parent)[..], encoded)?;
            Ok(true)
        })?;
        Ok(added)
    }

    fn len(&self) -> Result<usize, CacheError> {
        Ok(self.records.len())
    }

    fn put_tree_string(&self, id: u64, tree: &str) -> Result<(), CacheError> {
        self.tree_strings.insert(encode_id(id), tree.as_bytes())?;
        Ok(())
    }

    fn flush(&self) -> Result<(), CacheError> {
        self.db.flush()?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "sled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn ids_survive_reopening() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scaffolds.sled");
        {
            let cache = SledCache::open(&path).unwrap();
            assert_eq!(cache.put("c1ccncc1").unwrap(), PutOutcome::Inserted(1));
            assert_eq!(cache.put("C1CCCCC1").unwrap(), PutOutcome::Inserted(2));
            cache.put_child_link(1, 2).unwrap();
            cache.put_tree_string(1, "1:(2)").unwrap();
            cache.flush().unwrap();
        }
        let cache = SledCache::open(&path).unwrap();
        assert_eq!(cache.get("C1CCCCC1").unwrap(), Some(2));
        assert_eq!(cache.put("c1ccncc1").unwrap(), PutOutcome::Existing(1));
        assert_eq!(cache.put("C1CCNCC1").unwrap(), PutOutcome::Inserted(3));
        assert_eq!(cache.get_children(1).unwrap(), BTreeSet::from([2]));
        assert_eq!(cache.tree_string(1).unwrap().as_deref(), Some("1:(2)"));
    }

    #[test]
    fn links_to_unknown_records_are_rejected() {
        let cache = SledCache::temporary().unwrap();
        cache.put("A").unwrap();
        assert!(matches!(
            cache.put_child_link(1, 2),
            Err(CacheError::DanglingChild { parent: 1, child: 2 })
        ));
        assert!(matches!(cache.get_children(3), Err(CacheError::MissingRecord(3))));
        assert!(cache.get_record(3).unwrap().is_none());
    }
}
