//! # Cache Module
//!
//! Memoization of scaffolds across molecules. Every scaffold that has ever
//! been merged gets a dense, stable id (starting at 1), and the parent/child
//! links between scaffolds are stored alongside, so a molecule whose root
//! scaffold is already known can be answered without decomposing it again.
//!
//! ## Architecture
//!
//! - **Contract** ([`ScaffoldCache`]) - A handful of storage primitives each
//!   backend supplies, plus the merge and populate protocols implemented once
//!   on top of them.
//! - **Backends** - [`InMemoryCache`] for single runs, [`SledCache`] for
//!   large single-process runs that must survive restarts, and
//!   [`SqliteCache`] for several processes sharing one database.
//! - **Errors** ([`error`]) - Storage and consistency failures. Any of them
//!   during a merge leaves the cache in an unknown state for the run.

pub mod error;
pub mod kv;
pub mod memory;
pub mod sqlite;

pub use error::CacheError;
pub use kv::SledCache;
pub use memory::InMemoryCache;
pub use sqlite::SqliteCache;

use crate::core::models::ids::ScaffoldId;
use crate::engine::scaffold::ScaffoldForm;
use crate::engine::tree::ScaffoldTree;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// The persisted form of one scaffold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub id: u64,
    pub key: String,
    pub children: BTreeSet<u64>,
}

impl CacheRecord {
    pub fn new(id: u64, key: String) -> Self {
        Self {
            id,
            key,
            children: BTreeSet::new(),
        }
    }
}

/// Result of [`ScaffoldCache::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Inserted(u64),
    /// The key was already stored, possibly by another process.
    Existing(u64),
}

impl PutOutcome {
    pub fn id(self) -> u64 {
        match self {
            Self::Inserted(id) | Self::Existing(id) => id,
        }
    }
}

/// Storage for scaffold identities and their hierarchy.
///
/// Implementors provide the primitives; everything else is built on them.
/// All operations are synchronous and atomic as far as the backend allows.
pub trait ScaffoldCache: Send + Sync {
    /// Id of the scaffold with canonical key `key`.
    fn get(&self, key: &str) -> Result<Option<u64>, CacheError>;

    /// Canonical key of the scaffold with id `id`.
    fn key_of(&self, id: u64) -> Result<Option<String>, CacheError>;

    /// Child ids of a stored scaffold.
    ///
    /// # Errors
    ///
    /// [`CacheError::MissingRecord`] if `id` is not stored.
    fn get_children(&self, id: u64) -> Result<BTreeSet<u64>, CacheError>;

    /// Stores `key` under the next free id unless it is already present.
    /// An id is never handed out twice.
    fn put(&self, key: &str) -> Result<PutOutcome, CacheError>;

    /// Records `child` as a child of `parent`; both must already be stored.
    /// Returns `false` if the link existed.
    fn put_child_link(&self, parent: u64, child: u64) -> Result<bool, CacheError>;

    /// Number of stored scaffolds.
    fn len(&self) -> Result<usize, CacheError>;

    fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.len()? == 0)
    }

    /// Stores the tree string of a scaffold, for backends that keep one.
    fn put_tree_string(&self, _id: u64, _tree: &str) -> Result<(), CacheError> {
        Ok(())
    }

    /// Makes all previous writes durable.
    fn flush(&self) -> Result<(), CacheError> {
        Ok(())
    }

    /// Housekeeping after many inserts, such as rebuilding indexes.
    fn maintain(&self) -> Result<(), CacheError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str;

    fn contains(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.get(key)?.is_some())
    }

    fn get_id(&self, key: &str) -> Result<Option<u64>, CacheError> {
        self.get(key)
    }

    fn get_record(&self, id: u64) -> Result<Option<CacheRecord>, CacheError> {
        let Some(key) = self.key_of(id)? else {
            return Ok(None);
        };
        Ok(Some(CacheRecord {
            id,
            key,
            children: self.get_children(id)?,
        }))
    }

    fn insert_new(&self, key: &str) -> Result<u64, CacheError> {
        Ok(self.put(key)?.id())
    }

    /// Merges a decomposed tree into the cache.
    ///
    /// Every scaffold of the tree gets an id, either the stored one or a new
    /// one. Links are added where the cache lacks them, and children the cache
    /// knows about but the tree does not are pulled into the tree. All records
    /// are inserted before any link is written, so a stored link never points
    /// at a missing record. Backends shared between processes run the whole
    /// merge as one transaction, so other writers never see a new record
    /// without its links.
    ///
    /// # Return
    ///
    /// The number of newly inserted scaffolds.
    fn merge_tree(&self, tree: &mut ScaffoldTree) -> Result<usize, CacheError> {
        merge_records(self, tree)
    }

    /// Rebuilds the subtree below `node` from stored records. `node` must
    /// already carry its id. Missing children are added to the tree in
    /// compressed form.
    ///
    /// # Return
    ///
    /// The number of scaffolds added to the tree.
    fn populate_tree(&self, tree: &mut ScaffoldTree, node: ScaffoldId) -> Result<usize, CacheError> {
        let Some(scaffold) = tree.node(node) else { return Ok(0) };
        let id = scaffold.id.ok_or_else(|| CacheError::Unmerged {
            key: scaffold.key().to_string(),
        })?;
        let mut added = 0;
        for child in self.get_children(id)? {
            added += adopt_child(self, tree, node, id, child)?;
        }
        Ok(added)
    }

    /// The tree string of a stored scaffold, rebuilt from its links.
    fn subtree_string(&self, id: u64) -> Result<String, CacheError> {
        let children = self.get_children(id)?;
        if children.is_empty() {
            return Ok(id.to_string());
        }
        let inner = children
            .into_iter()
            .map(|child| self.subtree_string(child))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(format!("{id}:({})", inner.join(",")))
    }
}

/// The merge protocol behind [`ScaffoldCache::merge_tree`], for backends
/// that wrap it in their own transaction.
pub(crate) fn merge_records<C: ScaffoldCache + ?Sized>(
    cache: &C,
    tree: &mut ScaffoldTree,
) -> Result<usize, CacheError> {
    let order = tree.scaffolds();
    let mut inserted = 0;

    for &node in &order {
        let Some(scaffold) = tree.node(node) else { continue };
        if scaffold.id.is_some() {
            continue;
        }
        let key = scaffold.key().to_string();
        let id = match cache.put(&key)? {
            PutOutcome::Inserted(id) => {
                debug!(id, key = %key, "Inserted new scaffold");
                inserted += 1;
                id
            }
            PutOutcome::Existing(id) => id,
        };
        tree.assign_id(node, id);
    }

    for &node in &order {
        let (id, children) = node_links(tree, node)?;
        let cached = cache.get_children(id)?;
        for &child in &children {
            if !cached.contains(&child) {
                cache.put_child_link(id, child)?;
            }
        }
        for &missing in cached.difference(&children) {
            adopt_child(cache, tree, node, id, missing)?;
        }
    }

    for node in tree.scaffolds() {
        let Some(id) = tree.node(node).and_then(|s| s.id) else { continue };
        if let Some(text) = tree.tree_string(node) {
            cache.put_tree_string(id, &text)?;
        }
    }
    Ok(inserted)
}

fn node_links(tree: &ScaffoldTree, node: ScaffoldId) -> Result<(u64, BTreeSet<u64>), CacheError> {
    let scaffold = tree.node(node).ok_or_else(|| CacheError::Corrupt("tree node vanished".to_string()))?;
    let unmerged = |key: &str| CacheError::Unmerged { key: key.to_string() };
    let id = scaffold.id.ok_or_else(|| unmerged(scaffold.key()))?;
    let mut children = BTreeSet::new();
    for &child in scaffold.children() {
        let child = tree.node(child).ok_or_else(|| CacheError::Corrupt("tree child vanished".to_string()))?;
        children.insert(child.id.ok_or_else(|| unmerged(child.key()))?);
    }
    Ok((id, children))
}

/// Links the stored scaffold `child` under `node`, adding it to the tree and
/// populating its own subtree if the tree did not know it yet.
fn adopt_child<C: ScaffoldCache + ?Sized>(
    cache: &C,
    tree: &mut ScaffoldTree,
    node: ScaffoldId,
    parent: u64,
    child: u64,
) -> Result<usize, CacheError> {
    let key = cache
        .key_of(child)?
        .ok_or(CacheError::DanglingChild { parent, child })?;
    if let Some(existing) = tree.find(&key) {
        if tree.node(existing).is_some_and(|s| s.id.is_none()) {
            tree.assign_id(existing, child);
        }
        tree.add_child(node, existing);
        return Ok(0);
    }
    let fresh = tree.insert(key, ScaffoldForm::Compressed);
    tree.assign_id(fresh, child);
    tree.add_child(node, fresh);
    Ok(1 + cache.populate_tree(tree, fresh)?)
}

/// Which storage a cache lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Memory,
    Sled,
    Sqlite,
}

impl fmt::Display for CacheBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Memory => "memory",
            Self::Sled => "sled",
            Self::Sqlite => "sqlite",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseCacheBackendError(String);

impl fmt::Display for ParseCacheBackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown cache backend '{}' (expected memory, sled or sqlite)", self.0)
    }
}

impl std::error::Error for ParseCacheBackendError {}

impl FromStr for CacheBackend {
    type Err = ParseCacheBackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(Self::Memory),
            "sled" | "kv" => Ok(Self::Sled),
            "sqlite" | "sql" | "db" => Ok(Self::Sqlite),
            _ => Err(ParseCacheBackendError(s.to_string())),
        }
    }
}

/// Opens a cache of the given kind. Persistent backends need `path`.
pub fn open(backend: CacheBackend, path: Option<&Path>) -> Result<Box<dyn ScaffoldCache>, CacheError> {
    match backend {
        CacheBackend::Memory => Ok(Box::new(InMemoryCache::new())),
        CacheBackend::Sled => {
            let path = path.ok_or(CacheError::MissingPath("sled"))?;
            Ok(Box::new(SledCache::open(path)?))
        }
        CacheBackend::Sqlite => {
            let path = path.ok_or(CacheError::MissingPath("sqlite"))?;
            Ok(Box::new(SqliteCache::open(path)?))
        }
    }
}
