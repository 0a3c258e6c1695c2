use super::builder::{BuildOutcome, BuiltScaffold, ScaffoldBuilder};
use super::config::DecompositionOptions;
use super::error::DecompositionError;
use super::junction::JunctionTagger;
use super::scaffold::ScaffoldForm;
use super::tree::ScaffoldTree;
use crate::cache::ScaffoldCache;
use crate::core::chem::toolkit::ChemToolkit;
use crate::core::models::atom::Atom;
use crate::core::models::ids::{AtomId, BondId, ScaffoldId};
use crate::core::models::molecule::Molecule;
use crate::core::models::topology::BondOrder;
use std::collections::HashSet;
use tracing::{debug, trace, warn};

/// Runs the HierS decomposition of single molecules.
///
/// The root of a tree is the molecule's Bemis-Murcko framework. Its children
/// are found by cutting each junction bond of the framework in turn, building
/// the scaffold of both halves, and recursing into every scaffold not seen
/// before. When a cache is attached, a scaffold already stored there is not
/// decomposed again; its subtree is read back from the cache instead.
pub struct Decomposer<'a> {
    toolkit: &'a dyn ChemToolkit,
    options: DecompositionOptions,
    tagger: JunctionTagger,
    builder: ScaffoldBuilder<'a>,
    cache: Option<&'a dyn ScaffoldCache>,
}

impl<'a> Decomposer<'a> {
    pub fn new(toolkit: &'a dyn ChemToolkit, options: DecompositionOptions) -> Result<Self, DecompositionError> {
        Ok(Self {
            toolkit,
            options,
            tagger: JunctionTagger::new(options.flags.keep_nitro_attachments),
            builder: ScaffoldBuilder::new(toolkit, options.flags)?,
            cache: None,
        })
    }

    pub fn with_cache(mut self, cache: &'a dyn ScaffoldCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn options(&self) -> DecompositionOptions {
        self.options
    }

    /// Decomposes `input` into its scaffold tree.
    ///
    /// Only the largest fragment of a multi-component input is decomposed.
    /// The returned tree has no ids unless scaffolds were found in the cache;
    /// merge it into a cache to assign them.
    ///
    /// # Errors
    ///
    /// Cache errors are always returned. Other errors inside a branch are
    /// returned only when `abort_on_branch_error` is set; otherwise the branch
    /// is skipped and counted in [`ScaffoldTree::failed_branches`].
    pub fn decompose(&self, input: &Molecule) -> Result<ScaffoldTree, DecompositionError> {
        let mut tree = ScaffoldTree::new(input.clone(), self.options.flags);

        let mut prepared = input.largest_fragment();
        prepared.suppress_hydrogens();
        let junctions = self.tagger.tag(self.toolkit, &mut prepared);
        trace!(junctions = junctions.len(), "Tagged input molecule");

        let built = match self.builder.build(&prepared)? {
            BuildOutcome::NoRings => {
                debug!("Input has no rings");
                return Ok(tree);
            }
            BuildOutcome::Built(built) if !built.legal => {
                debug!(key = %built.key, "Input framework is not a legal scaffold");
                return Ok(tree);
            }
            BuildOutcome::Built(built) => built,
        };

        self.collect_sidechains(&mut tree, &prepared, &built.stripped)?;

        let key = built.key.clone();
        let root = tree.insert(built.key, ScaffoldForm::Expanded(built.molecule));
        tree.set_root(root);

        let cached = match self.cache {
            Some(cache) => cache.get_id(&key)?.map(|id| (cache, id)),
            None => None,
        };
        let discovered = match cached {
            Some((cache, id)) => {
                debug!(id, key = %key, "Framework found in cache");
                tree.assign_id(root, id);
                cache.populate_tree(&mut tree, root)?
            }
            None => self.expand(&mut tree, root)?,
        };
        debug!(key = %key, discovered, "Decomposition finished");

        self.collect_linkers(&mut tree)?;
        Ok(tree)
    }

    /// Cuts every junction bond of `node` and resolves the resulting scaffolds.
    ///
    /// # Return
    ///
    /// The number of scaffolds found below `node`.
    fn expand(&self, tree: &mut ScaffoldTree, node: ScaffoldId) -> Result<usize, DecompositionError> {
        let Some(mol) = tree.node(node).and_then(|s| s.molecule()).cloned() else {
            return Ok(0);
        };

        let mut junctions: Vec<(u32, BondId)> = mol
            .bonds_iter()
            .filter_map(|(id, bond)| {
                let sequence = bond.junction?;
                let placeholder = |atom| mol.atom(atom).is_some_and(|a: &Atom| a.is_placeholder);
                (!placeholder(bond.atom1_id) && !placeholder(bond.atom2_id)).then_some((sequence, id))
            })
            .collect();
        junctions.sort_unstable_by_key(|&(sequence, _)| sequence);

        let mut discovered = 0;
        for (sequence, bond) in junctions {
            match self.branch(tree, node, &mol, bond, sequence) {
                Ok(found) => discovered += found,
                Err(err) if err.is_fatal() || self.options.abort_on_branch_error => return Err(err),
                Err(err) => {
                    warn!(sequence, error = %err, "Skipping failed decomposition branch");
                    tree.record_failed_branch();
                }
            }
        }
        Ok(discovered)
    }

    fn branch(
        &self,
        tree: &mut ScaffoldTree,
        parent: ScaffoldId,
        mol: &Molecule,
        bond: BondId,
        sequence: u32,
    ) -> Result<usize, DecompositionError> {
        let mut discovered = 0;
        for fragment in cut_junction(mol, bond, sequence)? {
            if let Some(built) = self.builder.build(&fragment)?.into_legal() {
                discovered += self.resolve(tree, parent, built)?;
            }
        }
        Ok(discovered)
    }

    /// Places a candidate child under `parent`: reuse a node of this tree,
    /// else reuse a cached scaffold with its stored subtree, else add it as
    /// new and decompose it.
    fn resolve(
        &self,
        tree: &mut ScaffoldTree,
        parent: ScaffoldId,
        built: BuiltScaffold,
    ) -> Result<usize, DecompositionError> {
        if let Some(existing) = tree.find(&built.key) {
            tree.add_child(parent, existing);
            return Ok(1 + tree.descendant_count(existing));
        }

        if let Some(cache) = self.cache {
            if let Some(id) = cache.get_id(&built.key)? {
                let child = tree.insert(built.key, ScaffoldForm::Expanded(built.molecule));
                tree.assign_id(child, id);
                tree.add_child(parent, child);
                return Ok(1 + cache.populate_tree(tree, child)?);
            }
        }

        trace!(key = %built.key, "New scaffold");
        let child = tree.insert(built.key, ScaffoldForm::Expanded(built.molecule));
        tree.add_child(parent, child);
        Ok(1 + self.expand(tree, child)?)
    }

    fn collect_sidechains(
        &self,
        tree: &mut ScaffoldTree,
        prepared: &Molecule,
        stripped: &[AtomId],
    ) -> Result<(), DecompositionError> {
        let selection: HashSet<AtomId> = stripped.iter().copied().collect();
        for component in prepared.components_within(&selection) {
            let only_hydrogens = component
                .iter()
                .all(|&id| prepared.atom(id).is_none_or(Atom::is_hydrogen));
            if only_hydrogens {
                continue;
            }
            let fragment = prepared.extract_capped(&component);
            let key = self.toolkit.canonical_key(&fragment, self.options.flags.stereo)?;
            tree.add_sidechain(key);
        }
        Ok(())
    }

    /// Linkers are the acyclic parts left inside each scaffold.
    fn collect_linkers(&self, tree: &mut ScaffoldTree) -> Result<(), DecompositionError> {
        for node in tree.scaffolds() {
            let Some(scaffold) = tree.node(node) else { continue };
            let mol = scaffold.materialize(self.toolkit)?;
            let core = self.builder.core_atoms(&mol);
            let selection: HashSet<AtomId> = mol
                .atoms_iter()
                .filter(|(id, atom)| !core.contains(id) && !atom.is_hydrogen() && !atom.is_dummy())
                .map(|(id, _)| id)
                .collect();
            for component in mol.components_within(&selection) {
                let fragment = mol.extract_capped(&component);
                let key = self.toolkit.canonical_key(&fragment, self.options.flags.stereo)?;
                tree.add_linker(key);
            }
        }
        Ok(())
    }
}

/// Breaks the junction bond `bond` of `mol`, capping both ends with hydrogen
/// placeholders that keep the bond's junction tag.
fn cut_junction(mol: &Molecule, bond: BondId, sequence: u32) -> Result<Vec<Molecule>, DecompositionError> {
    let mut work = mol.clone();
    let removed = work
        .remove_bond(bond)
        .ok_or_else(|| DecompositionError::Internal(format!("junction bond {sequence} is missing")))?;

    for (end, other) in [(removed.atom1_id, removed.atom2_id), (removed.atom2_id, removed.atom1_id)] {
        let stub = work.add_atom(Atom::placeholder());
        if let Some(stub_bond) = work.add_bond(end, stub, BondOrder::Single) {
            if let Some(b) = work.bond_mut(stub_bond) {
                b.junction = removed.junction;
            }
        }
        let atom = work
            .atom_mut(end)
            .ok_or_else(|| DecompositionError::Internal(format!("junction bond {sequence} has a missing end")))?;
        atom.hydrogen_count = atom
            .hydrogen_count
            .saturating_add(removed.order.valence_contribution() - 1);
        if let Some(stereo) = atom.stereo.as_mut() {
            stereo.replace(Some(other), Some(stub));
        }
    }

    let fragments = work.split_fragments();
    if fragments.len() != 2 {
        return Err(DecompositionError::MalformedCut {
            sequence,
            fragments: fragments.len(),
        });
    }
    Ok(fragments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use crate::core::chem::smiles::parse_smiles;
    use crate::core::chem::toolkit::SmilesToolkit;
    use crate::engine::config::ScaffoldFlags;

    const TOOLKIT: SmilesToolkit = SmilesToolkit;

    fn decomposer<'a>() -> Decomposer<'a> {
        Decomposer::new(&TOOLKIT, DecompositionOptions::default()).unwrap()
    }

    fn key(smiles: &str) -> String {
        TOOLKIT.canonical_key(&parse_smiles(smiles).unwrap(), false).unwrap()
    }

    fn keys_of(tree: &ScaffoldTree) -> Vec<String> {
        tree.scaffolds()
            .into_iter()
            .map(|n| tree.node(n).unwrap().key().to_string())
            .collect()
    }

    #[test]
    fn acyclic_and_benzene_inputs_have_no_root() {
        for smiles in ["CCCCO", "c1ccccc1", "Cc1ccccc1", "OCC1=CC=CC=C1"] {
            let tree = decomposer().decompose(&parse_smiles(smiles).unwrap()).unwrap();
            assert!(tree.root().is_none(), "{smiles}");
            assert!(tree.summary().is_none());
        }
    }

    #[test]
    fn two_ring_systems_give_framework_and_non_benzene_child() {
        let tree = decomposer().decompose(&parse_smiles("c1ccccc1Cc1ccncc1").unwrap()).unwrap();
        assert_eq!(keys_of(&tree), vec![key("c1ccc(Cc2ccncc2)cc1"), key("[H]c1ccncc1")]);
        let root = tree.root_scaffold().unwrap();
        assert_eq!(root.children().len(), 1);
        assert_eq!(tree.linkers().len(), 1);
        assert_eq!(tree.linkers()[0].key, "*C*");
        assert!(tree.sidechains().is_empty());
        assert_eq!(tree.failed_branches(), 0);
    }

    #[test]
    fn biphenyl_is_a_leaf() {
        let tree = decomposer().decompose(&parse_smiles("c1ccccc1-c1ccccc1").unwrap()).unwrap();
        assert_eq!(tree.len(), 1);
        assert!(tree.root_scaffold().unwrap().children().is_empty());
        assert!(tree.linkers().is_empty());
    }

    #[test]
    fn side_chains_are_recorded_with_attachment_points() {
        let tree = decomposer()
            .decompose(&parse_smiles("CCOc1ccc(Cc2ccncc2)cc1").unwrap())
            .unwrap();
        let sidechains: Vec<&str> = tree.sidechains().iter().map(|f| f.key.as_str()).collect();
        assert_eq!(sidechains, vec![key("*OCC").as_str()]);
        assert_eq!(tree.root_scaffold().unwrap().key(), key("c1ccc(Cc2ccncc2)cc1"));
    }

    #[test]
    fn three_ring_systems_share_child_scaffolds() {
        let tree = decomposer()
            .decompose(&parse_smiles("c1ccncc1CCc1ccc(cc1)Cc1ccccn1").unwrap())
            .unwrap();
        let keys = keys_of(&tree);
        let unique: HashSet<&String> = keys.iter().collect();
        assert_eq!(unique.len(), keys.len());
        assert!(keys.contains(&key("[H]c1ccncc1")));
        assert!(keys.contains(&key("[H]c1ccccn1")));
        assert!(tree.all_scaffolds().len() >= tree.scaffolds().len());
        assert_eq!(tree.linkers().len(), 2);
    }

    #[test]
    fn salts_are_reduced_to_the_largest_fragment() {
        let with_salt = decomposer()
            .decompose(&parse_smiles("c1ccccc1Cc1ccncc1.Cl").unwrap())
            .unwrap();
        let plain = decomposer().decompose(&parse_smiles("c1ccccc1Cc1ccncc1").unwrap()).unwrap();
        assert_eq!(keys_of(&with_salt), keys_of(&plain));
    }

    #[test]
    fn cut_junction_caps_both_ends() {
        let mut mol = parse_smiles("c1ccccc1-c1ccncc1").unwrap();
        let tagged = JunctionTagger::new(false).tag(&TOOLKIT, &mut mol);
        let fragments = cut_junction(&mol, tagged[0].bond, tagged[0].sequence).unwrap();
        let mut keys: Vec<String> = fragments
            .iter()
            .map(|f| TOOLKIT.canonical_key(f, false).unwrap())
            .collect();
        keys.sort();
        let mut expected = vec![key("[H]c1ccccc1"), key("[H]c1ccncc1")];
        expected.sort();
        assert_eq!(keys, expected);
        for fragment in &fragments {
            let junction = fragment.bonds_iter().find_map(|(_, b)| b.junction);
            assert_eq!(junction, Some(tagged[0].sequence));
        }
    }

    #[test]
    fn cached_framework_is_populated_instead_of_decomposed() {
        let cache = InMemoryCache::new();
        let first = decomposer().with_cache(&cache);
        let mut tree = first.decompose(&parse_smiles("c1ccccc1Cc1ccncc1").unwrap()).unwrap();
        assert_eq!(cache.merge_tree(&mut tree).unwrap(), 2);

        let again = decomposer()
            .with_cache(&cache)
            .decompose(&parse_smiles("Oc1ccccc1Cc1ccncc1").unwrap())
            .unwrap();
        let root = again.root_scaffold().unwrap();
        assert_eq!(root.id, Some(1));
        assert_eq!(again.tree_string(again.root().unwrap()).as_deref(), Some("1:(2)"));
    }

    #[test]
    fn every_junction_of_a_three_way_linker_is_cut() {
        let tree = decomposer()
            .decompose(&parse_smiles("c1ccncc1C(c1ccncc1)c1cccnc1").unwrap())
            .unwrap();
        let children_of = |key_: &str| -> Vec<String> {
            let node = tree.find(key_).unwrap();
            let mut keys: Vec<String> = tree
                .node(node)
                .unwrap()
                .children()
                .iter()
                .map(|&c| tree.node(c).unwrap().key().to_string())
                .collect();
            keys.sort();
            keys
        };
        let sorted = |smiles: &[&str]| -> Vec<String> {
            let mut keys: Vec<String> = smiles.iter().map(|s| key(s)).collect();
            keys.sort();
            keys
        };

        let root = key("c1ccncc1C(c1ccncc1)c1cccnc1");
        assert_eq!(tree.root_scaffold().unwrap().key(), root);
        assert_eq!(
            children_of(&root),
            sorted(&[
                "[H]C(c1ccncc1)c1cccnc1",
                "[H]C(c1cccnc1)c1cccnc1",
                "[H]c1ccncc1",
                "[H]c1cccnc1",
            ])
        );
        assert_eq!(
            children_of(&key("[H]C(c1ccncc1)c1cccnc1")),
            sorted(&["[H]c1ccncc1", "[H]c1cccnc1"])
        );
        assert_eq!(children_of(&key("[H]C(c1cccnc1)c1cccnc1")), sorted(&["[H]c1cccnc1"]));
        assert!(!keys_of(&tree).contains(&key("C(c1ccncc1)c1cccnc1")));
        assert_eq!(tree.scaffolds().len(), 5);
        assert_eq!(tree.failed_branches(), 0);
    }

    #[test]
    fn stereo_flag_changes_keys() {
        let options = DecompositionOptions {
            flags: ScaffoldFlags {
                stereo: true,
                keep_nitro_attachments: false,
            },
            abort_on_branch_error: true,
        };
        let stereo = Decomposer::new(&TOOLKIT, options).unwrap();
        let input = parse_smiles("c1ccncc1[C@H](c1ccccc1)C1CCCCC1").unwrap();
        let mirror = parse_smiles("c1ccncc1[C@@H](c1ccccc1)C1CCCCC1").unwrap();

        let with = stereo.decompose(&input).unwrap();
        let without = decomposer().decompose(&input).unwrap();
        let with_key = with.root_scaffold().unwrap().key().to_string();
        let without_key = without.root_scaffold().unwrap().key().to_string();

        assert_ne!(with_key, without_key);
        assert!(with_key.contains('@'));
        assert_eq!(without_key, key("c1ccncc1C(c1ccccc1)C1CCCCC1"));
        assert_ne!(stereo.decompose(&mirror).unwrap().root_scaffold().unwrap().key(), with_key);
        assert_eq!(
            decomposer().decompose(&mirror).unwrap().root_scaffold().unwrap().key(),
            without_key
        );
    }
}
