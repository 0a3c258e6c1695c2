use hiers::cache::{InMemoryCache, ScaffoldCache, SqliteCache};
use hiers::core::chem::toolkit::{ChemToolkit, SmilesToolkit};
use hiers::core::models::atom::MoleculeFormat;
use hiers::core::models::molecule::Molecule;
use hiers::engine::config::{DecompositionOptions, ScaffoldFlags};
use hiers::engine::decomposer::Decomposer;
use hiers::engine::tree::ScaffoldTree;
use regex::Regex;
use std::collections::{BTreeSet, HashSet};

const TOOLKIT: SmilesToolkit = SmilesToolkit;

const DATASET: &[&str] = &[
    "c1ccccc1Cc1ccncc1",
    "O=C(Nc1ccccc1)c1ccc2ccccc2n1",
    "c1ccncc1CCc1ccc(cc1)Cc1ccccn1",
    "C1CCN(CC1)c1ccc(Oc2ccccc2)cc1",
    "c1ccc2c(c1)ccnc2",
];

fn molecule(smiles: &str) -> Molecule {
    TOOLKIT
        .read_molecule(smiles, MoleculeFormat::Smiles)
        .unwrap()
        .molecule
}

fn options() -> DecompositionOptions {
    DecompositionOptions {
        flags: ScaffoldFlags {
            stereo: false,
            keep_nitro_attachments: false,
        },
        abort_on_branch_error: false,
    }
}

fn decompose_and_merge(cache: &dyn ScaffoldCache, smiles: &str) -> (ScaffoldTree, usize) {
    let decomposer = Decomposer::new(&TOOLKIT, options()).unwrap().with_cache(cache);
    let mut tree = decomposer.decompose(&molecule(smiles)).unwrap();
    let inserted = cache.merge_tree(&mut tree).unwrap();
    (tree, inserted)
}

fn root_id(tree: &ScaffoldTree) -> Option<u64> {
    tree.root_scaffold().and_then(|s| s.id)
}

fn tree_string_pattern() -> Regex {
    Regex::new(r"^\d+(:\(\d+(,\d+)*\))?$").unwrap()
}

#[test]
fn decomposing_twice_gives_the_same_ids_and_inserts_nothing() {
    let caches: Vec<Box<dyn ScaffoldCache>> = vec![
        Box::new(InMemoryCache::new()),
        Box::new(SqliteCache::open_in_memory().unwrap()),
    ];
    for cache in &caches {
        let first: Vec<(Option<String>, Option<String>)> = DATASET
            .iter()
            .map(|smiles| {
                let (tree, _) = decompose_and_merge(cache.as_ref(), smiles);
                (tree.summary(), tree.root().and_then(|r| tree.tree_string(r)))
            })
            .collect();
        let records = cache.len().unwrap();

        for (smiles, expected) in DATASET.iter().zip(&first) {
            let (tree, inserted) = decompose_and_merge(cache.as_ref(), smiles);
            assert_eq!(inserted, 0, "{smiles} on {}", cache.backend_name());
            let again = (tree.summary(), tree.root().and_then(|r| tree.tree_string(r)));
            assert_eq!(&again, expected, "{smiles} on {}", cache.backend_name());
        }
        assert_eq!(cache.len().unwrap(), records);
    }
}

#[test]
fn merged_tree_agrees_with_cache_records() {
    let cache = InMemoryCache::new();
    for smiles in DATASET {
        let (tree, _) = decompose_and_merge(&cache, smiles);
        for node in tree.scaffolds() {
            let scaffold = tree.node(node).unwrap();
            let id = scaffold.id.expect("merged scaffolds carry ids");
            let record = cache.get_record(id).unwrap().unwrap();
            assert_eq!(record.key, scaffold.key());
            let children: BTreeSet<u64> = scaffold
                .children()
                .iter()
                .map(|&c| tree.node(c).unwrap().id.unwrap())
                .collect();
            assert_eq!(record.children, children, "{smiles}: scaffold {id}");
        }
    }
}

#[test]
fn cache_ids_are_dense_and_keys_unique() {
    let cache = InMemoryCache::new();
    for smiles in DATASET {
        decompose_and_merge(&cache, smiles);
    }
    let count = cache.len().unwrap() as u64;
    let mut keys = HashSet::new();
    for id in 1..=count {
        let record = cache.get_record(id).unwrap().expect("ids have no gaps");
        assert!(keys.insert(record.key));
    }
    assert!(cache.get_record(count + 1).unwrap().is_none());
}

#[test]
fn deduplicated_scaffolds_never_repeat_a_key() {
    let cache = InMemoryCache::new();
    let (tree, _) = decompose_and_merge(&cache, "c1ccncc1CCc1ccc(cc1)Cc1ccccn1");
    let keys: Vec<&str> = tree
        .scaffolds()
        .into_iter()
        .map(|n| tree.node(n).unwrap().key())
        .collect();
    let unique: HashSet<&str> = keys.iter().copied().collect();
    assert_eq!(unique.len(), keys.len());
    assert!(tree.all_scaffolds().len() >= keys.len());
}

#[test]
fn benzene_has_no_scaffold() {
    let cache = InMemoryCache::new();
    for smiles in ["c1ccccc1", "C1=CC=CC=C1", "Cc1ccccc1"] {
        let (tree, inserted) = decompose_and_merge(&cache, smiles);
        assert!(tree.root().is_none(), "{smiles}");
        assert_eq!(inserted, 0);
    }
    assert!(cache.is_empty().unwrap());
}

#[test]
fn compressed_scaffolds_decompress_to_the_same_key() {
    let cache = InMemoryCache::new();
    let (mut tree, _) = decompose_and_merge(&cache, "O=C(Nc1ccccc1)c1ccc2ccccc2n1");
    let nodes = tree.scaffolds();
    let before: Vec<String> = nodes.iter().map(|&n| tree.node(n).unwrap().key().to_string()).collect();

    tree.compress_all();
    for &node in &nodes {
        assert!(tree.node(node).unwrap().is_compressed());
        tree.decompress(node, &TOOLKIT).unwrap();
    }

    for (&node, key) in nodes.iter().zip(&before) {
        let scaffold = tree.node(node).unwrap();
        assert_eq!(scaffold.key(), key);
        let molecule = scaffold.molecule().expect("decompressed scaffolds hold a molecule");
        assert_eq!(&TOOLKIT.canonical_key(molecule, false).unwrap(), key);
    }
}

#[test]
fn quinoline_yields_a_well_formed_tree_string() {
    let cache = InMemoryCache::new();
    let (tree, inserted) = decompose_and_merge(&cache, "c1ccc2c(c1)ccnc2");
    assert!(inserted >= 1);
    assert!(!tree.scaffolds().is_empty());
    let pattern = tree_string_pattern();
    let text = tree.tree_string(tree.root().unwrap()).unwrap();
    assert!(pattern.is_match(&text), "{text}");

    let (linked, _) = decompose_and_merge(&cache, "c1ccccc1Cc1ccncc1");
    let text = linked.tree_string(linked.root().unwrap()).unwrap();
    assert!(pattern.is_match(&text), "{text}");
    assert!(text.contains(":("), "{text}");
    assert!(!pattern.is_match("1:()"));
    assert!(!pattern.is_match("1:(2,)"));
}

#[test]
fn shared_framework_gets_the_same_root_id() {
    let cache = InMemoryCache::new();
    let (first, _) = decompose_and_merge(&cache, "Cc1ccc(Cc2ccccn2)cc1");
    let (second, inserted) = decompose_and_merge(&cache, "OCCc1ccc(Cc2ccccn2)cc1");
    assert!(root_id(&first).is_some());
    assert_eq!(root_id(&first), root_id(&second));
    assert_eq!(inserted, 0);
}

#[test]
fn known_child_scaffold_is_reused_by_a_new_framework() {
    let cache = InMemoryCache::new();
    let (first, _) = decompose_and_merge(&cache, "c1ccccc1Cc1ccncc1");
    let key = TOOLKIT.canonical_key(&molecule("[H]c1ccncc1"), false).unwrap();
    let pyridine = first.find(&key).and_then(|n| first.node(n)).and_then(|s| s.id);
    assert_eq!(pyridine, Some(2));

    let (second, inserted) = decompose_and_merge(&cache, "C1CCCCC1Cc1ccncc1");
    assert_eq!(root_id(&second), Some(3));
    assert_eq!(second.tree_string(second.root().unwrap()).as_deref(), Some("3:(2,4)"));
    assert_eq!(inserted, 2);
}
