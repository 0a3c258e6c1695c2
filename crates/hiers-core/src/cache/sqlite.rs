use super::error::CacheError;
use super::{PutOutcome, ScaffoldCache, merge_records};
use crate::engine::tree::ScaffoldTree;
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS scaffold (
    id INTEGER PRIMARY KEY,
    scafsmi VARCHAR(512) NOT NULL,
    scaftree VARCHAR(2048)
);
CREATE TABLE IF NOT EXISTS scaf2scaf (
    parent_id INTEGER NOT NULL,
    child_id INTEGER NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS scaffold_scafsmi_idx ON scaffold (scafsmi);
CREATE UNIQUE INDEX IF NOT EXISTS scaf2scaf_pair_idx ON scaf2scaf (parent_id, child_id);
";

const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// A cache in an SQLite database that several processes may share.
///
/// Each merged tree is written in one `BEGIN IMMEDIATE` transaction, so a
/// reader in another process sees a scaffold only together with its links.
/// The unique index on `scafsmi` settles races between plain inserts: the
/// loser's insert fails with a constraint violation and it reads back the
/// winner's id instead.
pub struct SqliteCache {
    conn: Mutex<Connection>,
    /// Held for the duration of a merge transaction.
    merge: Mutex<()>,
}

impl SqliteCache {
    /// Opens or creates the database at `path` in WAL mode.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        let cache = Self::with_connection(conn)?;
        info!(path = %path.display(), records = cache.len()?, "Opened SQLite scaffold cache");
        Ok(cache)
    }

    pub fn open_in_memory() -> Result<Self, CacheError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, CacheError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            merge: Mutex::new(()),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, CacheError> {
        self.conn.lock().map_err(|_| CacheError::Poisoned)
    }

    /// The stored tree string of a scaffold.
    pub fn tree_string(&self, id: u64) -> Result<Option<String>, CacheError> {
        let tree = self
            .conn()?
            .query_row("SELECT scaftree FROM scaffold WHERE id = ?1", params![id as i64], |row| {
                row.get::<_, Option<String>>(0)
            })
            .optional()?;
        Ok(tree.flatten())
    }
}

fn to_id(raw: i64) -> Result<u64, CacheError> {
    u64::try_from(raw).map_err(|_| CacheError::Corrupt(format!("negative scaffold id {raw}")))
}

fn select_id(conn: &Connection, key: &str) -> Result<Option<u64>, CacheError> {
    let raw = conn
        .query_row("SELECT id FROM scaffold WHERE scafsmi = ?1", params![key], |row| {
            row.get::<_, i64>(0)
        })
        .optional()?;
    raw.map(to_id).transpose()
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation)
}

impl ScaffoldCache for SqliteCache {
    fn get(&self, key: &str) -> Result<Option<u64>, CacheError> {
        let conn = self.conn()?;
        select_id(&conn, key)
    }

    fn key_of(&self, id: u64) -> Result<Option<String>, CacheError> {
        let key = self
            .conn()?
            .query_row("SELECT scafsmi FROM scaffold WHERE id = ?1", params![id as i64], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(key)
    }

    fn get_children(&self, id: u64) -> Result<BTreeSet<u64>, CacheError> {
        let conn = self.conn()?;
        let exists = conn
            .query_row("SELECT 1 FROM scaffold WHERE id = ?1", params![id as i64], |_| Ok(()))
            .optional()?
            .is_some();
        if !exists {
            return Err(CacheError::MissingRecord(id));
        }
        let mut stmt = conn.prepare_cached("SELECT child_id FROM scaf2scaf WHERE parent_id = ?1")?;
        let rows = stmt.query_map(params![id as i64], |row| row.get::<_, i64>(0))?;
        let mut children = BTreeSet::new();
        for raw in rows {
            children.insert(to_id(raw?)?);
        }
        Ok(children)
    }

    fn put(&self, key: &str) -> Result<PutOutcome, CacheError> {
        let conn = self.conn()?;
        if let Some(id) = select_id(&conn, key)? {
            return Ok(PutOutcome::Existing(id));
        }
        match conn.execute("INSERT INTO scaffold (scafsmi) VALUES (?1)", params![key]) {
            Ok(_) => Ok(PutOutcome::Inserted(to_id(conn.last_insert_rowid())?)),
            Err(err) if is_unique_violation(&err) => {
                debug!(key, "Scaffold inserted concurrently by another writer");
                select_id(&conn, key)?
                    .map(PutOutcome::Existing)
                    .ok_or_else(|| CacheError::Sqlite(err))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn put_child_link(&self, parent: u64, child: u64) -> Result<bool, CacheError> {
        let conn = self.conn()?;
        for id in [parent, child] {
            let exists = conn
                .query_row("SELECT 1 FROM scaffold WHERE id = ?1", params![id as i64], |_| Ok(()))
                .optional()?
                .is_some();
            if !exists {
                return Err(if id == parent {
                    CacheError::MissingRecord(parent)
                } else {
                    CacheError::DanglingChild { parent, child }
                });
            }
        }
        let changed = conn.execute(
            "INSERT OR IGNORE INTO scaf2scaf (parent_id, child_id) VALUES (?1, ?2)",
            params![parent as i64, child as i64],
        )?;
        Ok(changed > 0)
    }

    fn merge_tree(&self, tree: &mut ScaffoldTree) -> Result<usize, CacheError> {
        let _merge = self.merge.lock().map_err(|_| CacheError::Poisoned)?;
        self.conn()?.execute_batch("BEGIN IMMEDIATE")?;
        match merge_records(self, tree) {
            Ok(inserted) => {
                self.conn()?.execute_batch("COMMIT")?;
                Ok(inserted)
            }
            Err(err) => {
                if let Err(rollback) = self.conn()?.execute_batch("ROLLBACK") {
                    warn!(error = %rollback, "Failed to roll back scaffold merge");
                }
                Err(err)
            }
        }
    }

    fn len(&self) -> Result<usize, CacheError> {
        let count = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM scaffold", [], |row| row.get::<_, i64>(0))?;
        Ok(count.max(0) as usize)
    }

    fn put_tree_string(&self, id: u64, tree: &str) -> Result<(), CacheError> {
        self.conn()?.execute(
            "UPDATE scaffold SET scaftree = ?1 WHERE id = ?2",
            params![tree, id as i64],
        )?;
        Ok(())
    }

    fn maintain(&self) -> Result<(), CacheError> {
        info!("Rebuilding scaffold cache indexes");
        self.conn()?.execute_batch("REINDEX; ANALYZE;")?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::ids::ScaffoldId;
    use crate::core::models::molecule::Molecule;
    use crate::engine::config::ScaffoldFlags;
    use crate::engine::scaffold::ScaffoldForm;
    use tempfile::tempdir;

    fn chain(keys: &[&str]) -> (ScaffoldTree, Vec<ScaffoldId>) {
        let mut tree = ScaffoldTree::new(Molecule::new(), ScaffoldFlags::default());
        let nodes: Vec<ScaffoldId> = keys
            .iter()
            .map(|k| tree.insert(k.to_string(), ScaffoldForm::Compressed))
            .collect();
        tree.set_root(nodes[0]);
        for pair in nodes.windows(2) {
            tree.add_child(pair[0], pair[1]);
        }
        (tree, nodes)
    }

    #[test]
    fn schema_matches_the_published_layout() {
        let cache = SqliteCache::open_in_memory().unwrap();
        let conn = cache.conn().unwrap();
        let columns: Vec<String> = conn
            .prepare("SELECT name FROM pragma_table_info('scaffold')")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(columns, vec!["id", "scafsmi", "scaftree"]);
    }

    #[test]
    fn put_recovers_from_a_concurrent_insert() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scaffolds.db");
        let first = SqliteCache::open(&path).unwrap();
        let second = SqliteCache::open(&path).unwrap();
        assert_eq!(first.put("c1ccncc1").unwrap(), PutOutcome::Inserted(1));
        assert_eq!(second.put("c1ccncc1").unwrap(), PutOutcome::Existing(1));
        assert_eq!(second.put("C1CCCCC1").unwrap(), PutOutcome::Inserted(2));
        assert_eq!(first.get("C1CCCCC1").unwrap(), Some(2));
    }

    #[test]
    fn unique_index_rejects_duplicate_keys() {
        let cache = SqliteCache::open_in_memory().unwrap();
        cache.put("A").unwrap();
        let conn = cache.conn().unwrap();
        let err = conn
            .execute("INSERT INTO scaffold (scafsmi) VALUES ('A')", [])
            .unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[test]
    fn links_and_tree_strings_round_trip() {
        let cache = SqliteCache::open_in_memory().unwrap();
        cache.put("A").unwrap();
        cache.put("B").unwrap();
        assert!(cache.put_child_link(1, 2).unwrap());
        assert!(!cache.put_child_link(1, 2).unwrap());
        assert!(matches!(
            cache.put_child_link(1, 9),
            Err(CacheError::DanglingChild { parent: 1, child: 9 })
        ));
        assert_eq!(cache.get_children(1).unwrap(), BTreeSet::from([2]));
        assert!(cache.get_children(2).unwrap().is_empty());
        assert!(matches!(cache.get_children(5), Err(CacheError::MissingRecord(5))));

        cache.put_tree_string(1, "1:(2)").unwrap();
        assert_eq!(cache.tree_string(1).unwrap().as_deref(), Some("1:(2)"));
        assert_eq!(cache.tree_string(2).unwrap(), None);
        cache.maintain().unwrap();
    }

    #[test]
    fn merge_is_invisible_to_other_handles_until_complete() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scaffolds.db");
        let writer = SqliteCache::open(&path).unwrap();
        let reader = SqliteCache::open(&path).unwrap();
        writer
            .conn()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER frozen BEFORE UPDATE ON scaffold \
                 BEGIN SELECT RAISE(ABORT, 'tree strings disabled'); END;",
            )
            .unwrap();

        let (mut failing, _) = chain(&["R", "A"]);
        assert!(writer.merge_tree(&mut failing).is_err());
        assert_eq!(reader.len().unwrap(), 0);
        assert_eq!(reader.get("R").unwrap(), None);
        let links: i64 = reader
            .conn()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM scaf2scaf", [], |row| row.get(0))
            .unwrap();
        assert_eq!(links, 0);

        writer.conn().unwrap().execute_batch("DROP TRIGGER frozen").unwrap();
        let (mut tree, nodes) = chain(&["R", "A"]);
        assert_eq!(writer.merge_tree(&mut tree).unwrap(), 2);
        assert_eq!(tree.node(nodes[0]).unwrap().id, Some(1));
        assert_eq!(reader.get("R").unwrap(), Some(1));
        assert_eq!(reader.get_children(1).unwrap(), BTreeSet::from([2]));
        assert_eq!(reader.tree_string(1).unwrap().as_deref(), Some("1:(2)"));
    }

    #[test]
    fn second_handle_reuses_a_merged_tree_with_its_links() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scaffolds.db");
        let first = SqliteCache::open(&path).unwrap();
        let second = SqliteCache::open(&path).unwrap();

        let (mut tree, _) = chain(&["R", "A", "B"]);
        assert_eq!(first.merge_tree(&mut tree).unwrap(), 3);

        let (mut partial, nodes) = chain(&["R"]);
        assert_eq!(second.merge_tree(&mut partial).unwrap(), 0);
        assert_eq!(partial.tree_string(nodes[0]).as_deref(), Some("1:(2:(3))"));
        assert_eq!(second.subtree_string(1).unwrap(), "1:(2:(3))");
    }
}
