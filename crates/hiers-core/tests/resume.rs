use hiers::cache::{self, CacheBackend, ScaffoldCache};
use hiers::core::chem::toolkit::SmilesToolkit;
use hiers::core::models::atom::MoleculeFormat;
use hiers::engine::config::{BatchConfig, BatchConfigBuilder};
use hiers::engine::progress::ProgressReporter;
use hiers::workflows::batch::{self, BatchContext, BatchResult};
use std::path::Path;

const FIRST_HALF: &[&str] = &[
    "c1ccccc1Cc1ccncc1 benzylpyridine",
    "O=C(Nc1ccccc1)c1ccc2ccccc2n1 anilide",
    "c1ccc2c(c1)ccnc2 quinoline",
];

const SECOND_HALF: &[&str] = &[
    "C1CCCCC1Cc1ccncc1 cyclohexylmethylpyridine",
    "c1ccncc1CCc1ccc(cc1)Cc1ccccn1 three-rings",
    "C1CCN(CC1)c1ccc(Oc2ccccc2)cc1 piperidine",
];

fn config() -> BatchConfig {
    BatchConfigBuilder::new()
        .stereo(false)
        .keep_nitro_attachments(false)
        .format(MoleculeFormat::SmilesLine)
        .reindex_every(Some(2))
        .build()
        .unwrap()
}

fn run_batch(backend: CacheBackend, path: &Path, records: &[&str]) -> (BatchResult, usize) {
    let toolkit = SmilesToolkit::new();
    let config = config();
    let cache = cache::open(backend, Some(path)).unwrap();
    let context = BatchContext {
        toolkit: &toolkit,
        cache: cache.as_ref(),
        config: &config,
    };
    let inputs: Vec<String> = records.iter().map(|s| s.to_string()).collect();
    let result = batch::run(&inputs, &context, &ProgressReporter::new()).unwrap();
    let len = cache.len().unwrap();
    (result, len)
}

fn summaries(result: &BatchResult) -> Vec<Option<String>> {
    result.reports.iter().map(|r| r.summary.clone()).collect()
}

fn resume_keeps_ids(backend: CacheBackend, file: &str) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(file);

    let (first, after_first) = run_batch(backend, &path, FIRST_HALF);
    assert_eq!(first.stats.new_scaffolds, after_first);

    let all: Vec<&str> = FIRST_HALF.iter().chain(SECOND_HALF).copied().collect();
    let (resumed, after_resume) = run_batch(backend, &path, &all);

    assert_eq!(
        summaries(&first),
        summaries(&resumed)[..FIRST_HALF.len()].to_vec(),
        "{backend}: ids of processed molecules changed"
    );
    assert_eq!(after_resume, after_first + resumed.stats.new_scaffolds);
    assert!(resumed.stats.new_scaffolds > 0);

    let new_ids: Vec<u64> = resumed.reports[FIRST_HALF.len()..]
        .iter()
        .flat_map(|r| {
            r.summary
                .as_deref()
                .and_then(|s| s.strip_prefix("S:"))
                .into_iter()
                .flat_map(|ids| ids.split(','))
                .map(|id| id.parse::<u64>().unwrap())
        })
        .filter(|&id| id > after_first as u64)
        .collect();
    assert!(!new_ids.is_empty());
    assert!(new_ids.iter().all(|&id| id <= after_resume as u64), "{backend}: id beyond record count");
}

#[test]
fn resume_on_sled_keeps_ids() {
    resume_keeps_ids(CacheBackend::Sled, "scaffolds.sled");
}

#[test]
fn resume_on_sqlite_keeps_ids() {
    resume_keeps_ids(CacheBackend::Sqlite, "scaffolds.db");
}

#[test]
fn sled_and_sqlite_assign_the_same_ids_for_the_same_input() {
    let dir = tempfile::tempdir().unwrap();
    let (sled, _) = run_batch(CacheBackend::Sled, &dir.path().join("a.sled"), FIRST_HALF);
    let (sqlite, _) = run_batch(CacheBackend::Sqlite, &dir.path().join("a.db"), FIRST_HALF);
    let (memory, _) = run_batch(CacheBackend::Memory, &dir.path().join("unused"), FIRST_HALF);
    assert_eq!(summaries(&sled), summaries(&sqlite));
    assert_eq!(summaries(&sled), summaries(&memory));
}

#[test]
fn persisted_tree_strings_match_reports() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trees.db");
    let (result, _) = run_batch(CacheBackend::Sqlite, &path, FIRST_HALF);

    let cache = hiers::cache::SqliteCache::open(&path).unwrap();
    for report in &result.reports {
        let Some(root) = report.root_id else { continue };
        assert_eq!(cache.tree_string(root).unwrap(), report.tree_string);
    }
    assert!(cache.len().unwrap() > 0);
}

#[test]
fn two_handles_on_one_database_share_complete_trees() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.db");
    let toolkit = SmilesToolkit::new();
    let config = config();
    let first = cache::open(CacheBackend::Sqlite, Some(path.as_path())).unwrap();
    let second = cache::open(CacheBackend::Sqlite, Some(path.as_path())).unwrap();
    let run = |cache: &dyn ScaffoldCache, line: &str| {
        let context = BatchContext {
            toolkit: &toolkit,
            cache,
            config: &config,
        };
        batch::run(&[line.to_string()], &context, &ProgressReporter::new()).unwrap()
    };

    let a = run(first.as_ref(), "c1ccccc1Cc1ccncc1 a");
    let b = run(second.as_ref(), "Oc1ccccc1Cc1ccncc1 b");

    assert_eq!(a.reports[0].tree_string.as_deref(), Some("1:(2)"));
    assert_eq!(b.reports[0].tree_string, a.reports[0].tree_string);
    assert_eq!(b.stats.new_scaffolds, 0);
    assert_eq!(second.get_children(1).unwrap().len(), 1);
}
