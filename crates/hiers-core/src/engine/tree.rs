use super::config::ScaffoldFlags;
use super::scaffold::{Fragment, FragmentKind, Scaffold, ScaffoldForm};
use crate::core::chem::error::ChemError;
use crate::core::chem::toolkit::ChemToolkit;
use crate::core::models::ids::ScaffoldId;
use crate::core::models::molecule::Molecule;
use slotmap::SlotMap;
use std::collections::{BTreeSet, HashMap, HashSet};

/// The scaffold hierarchy of one input molecule.
///
/// Scaffolds live in an arena and refer to each other by [`ScaffoldId`]. A
/// canonical key occurs at most once in the arena; a scaffold reached from
/// several parents is the same node listed in several child lists.
#[derive(Debug, Clone)]
pub struct ScaffoldTree {
    nodes: SlotMap<ScaffoldId, Scaffold>,
    by_key: HashMap<String, ScaffoldId>,
    root: Option<ScaffoldId>,
    input: Molecule,
    flags: ScaffoldFlags,
    linkers: Vec<Fragment>,
    sidechains: Vec<Fragment>,
    failed_branches: usize,
}

impl ScaffoldTree {
    pub fn new(input: Molecule, flags: ScaffoldFlags) -> Self {
        Self {
            nodes: SlotMap::with_key(),
            by_key: HashMap::new(),
            root: None,
            input,
            flags,
            linkers: Vec::new(),
            sidechains: Vec::new(),
            failed_branches: 0,
        }
    }

    /// The Bemis-Murcko framework of the input, or `None` when the input has
    /// no legal scaffold.
    pub fn root(&self) -> Option<ScaffoldId> {
        self.root
    }

    pub fn root_scaffold(&self) -> Option<&Scaffold> {
        self.root.and_then(|id| self.nodes.get(id))
    }

    pub fn input(&self) -> &Molecule {
        &self.input
    }

    pub fn flags(&self) -> ScaffoldFlags {
        self.flags
    }

    pub fn node(&self, id: ScaffoldId) -> Option<&Scaffold> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: ScaffoldId) -> Option<&mut Scaffold> {
        self.nodes.get_mut(id)
    }

    pub fn find(&self, key: &str) -> Option<ScaffoldId> {
        self.by_key.get(key).copied()
    }

    /// Number of distinct scaffolds in the tree.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn linkers(&self) -> &[Fragment] {
        &self.linkers
    }

    pub fn sidechains(&self) -> &[Fragment] {
        &self.sidechains
    }

    /// Branches that failed and were skipped during decomposition.
    pub fn failed_branches(&self) -> usize {
        self.failed_branches
    }

    /// Adds a scaffold, or returns the node already holding `key`.
    pub(crate) fn insert(&mut self, key: String, form: ScaffoldForm) -> ScaffoldId {
        if let Some(&existing) = self.by_key.get(&key) {
            return existing;
        }
        let id = self.nodes.insert(Scaffold::new(key.clone(), form, self.flags));
        self.by_key.insert(key, id);
        id
    }

    pub(crate) fn set_root(&mut self, root: ScaffoldId) {
        self.root = Some(root);
    }

    /// Links `child` under `parent`. The first parent a node is linked to is
    /// recorded as its parent.
    ///
    /// # Return
    ///
    /// `false` if the link already existed or either node is missing.
    pub(crate) fn add_child(&mut self, parent: ScaffoldId, child: ScaffoldId) -> bool {
        if parent == child || !self.nodes.contains_key(child) {
            return false;
        }
        let Some(node) = self.nodes.get_mut(parent) else {
            return false;
        };
        if node.children.contains(&child) {
            return false;
        }
        node.children.push(child);
        if let Some(child_node) = self.nodes.get_mut(child) {
            if child_node.parent.is_none() && Some(child) != self.root {
                child_node.parent = Some(parent);
            }
        }
        true
    }

    pub(crate) fn assign_id(&mut self, node: ScaffoldId, id: u64) {
        if let Some(scaffold) = self.nodes.get_mut(node) {
            scaffold.id = Some(id);
        }
    }

    pub(crate) fn record_failed_branch(&mut self) {
        self.failed_branches += 1;
    }

    pub(crate) fn add_linker(&mut self, key: String) -> u64 {
        Self::add_fragment(&mut self.linkers, key, FragmentKind::Linker)
    }

    pub(crate) fn add_sidechain(&mut self, key: String) -> u64 {
        Self::add_fragment(&mut self.sidechains, key, FragmentKind::Sidechain)
    }

    fn add_fragment(list: &mut Vec<Fragment>, key: String, kind: FragmentKind) -> u64 {
        if let Some(existing) = list.iter().find(|f| f.key == key) {
            return existing.id;
        }
        let id = list.len() as u64 + 1;
        list.push(Fragment { key, id, kind });
        id
    }

    /// Distinct scaffolds in preorder from the root, first occurrence wins.
    pub fn scaffolds(&self) -> Vec<ScaffoldId> {
        let mut seen = HashSet::new();
        let mut order = Vec::new();
        if let Some(root) = self.root {
            self.walk(root, &mut |id| {
                if seen.insert(id) {
                    order.push(id);
                    true
                } else {
                    false
                }
            });
        }
        order
    }

    /// Every scaffold position in preorder from the root. A scaffold shared by
    /// several parents is listed once per position.
    pub fn all_scaffolds(&self) -> Vec<ScaffoldId> {
        let mut order = Vec::new();
        if let Some(root) = self.root {
            self.walk(root, &mut |id| {
                order.push(id);
                true
            });
        }
        order
    }

    /// Preorder walk; `visit` returns whether to descend into the node.
    fn walk(&self, node: ScaffoldId, visit: &mut dyn FnMut(ScaffoldId) -> bool) {
        if !visit(node) {
            return;
        }
        if let Some(scaffold) = self.nodes.get(node) {
            for &child in &scaffold.children {
                self.walk(child, visit);
            }
        }
    }

    /// Number of distinct scaffolds below `node`.
    pub fn descendant_count(&self, node: ScaffoldId) -> usize {
        let mut seen = HashSet::new();
        self.walk(node, &mut |id| seen.insert(id));
        seen.len().saturating_sub(1)
    }

    /// The hierarchy below `node` as nested ids, e.g. `35:(38:(5,6),6)`.
    /// Children are listed in ascending id order.
    ///
    /// # Return
    ///
    /// `None` if any scaffold in the subtree has no id yet.
    pub fn tree_string(&self, node: ScaffoldId) -> Option<String> {
        let scaffold = self.nodes.get(node)?;
        let id = scaffold.id?;
        if scaffold.children.is_empty() {
            return Some(id.to_string());
        }
        let mut children = Vec::with_capacity(scaffold.children.len());
        for &child in &scaffold.children {
            let child_id = self.nodes.get(child)?.id?;
            children.push((child_id, self.tree_string(child)?));
        }
        children.sort_by_key(|(child_id, _)| *child_id);
        let inner: Vec<String> = children.into_iter().map(|(_, text)| text).collect();
        Some(format!("{id}:({})", inner.join(",")))
    }

    /// Ascending distinct scaffold ids of the tree.
    pub fn ids(&self) -> Vec<u64> {
        let ids: BTreeSet<u64> = self.scaffolds().into_iter().filter_map(|n| self.nodes.get(n)?.id).collect();
        ids.into_iter().collect()
    }

    /// The molecule's scaffolds as `S:` followed by their ascending ids, or
    /// `None` when the tree has no root.
    pub fn summary(&self) -> Option<String> {
        self.root?;
        let ids: Vec<String> = self.ids().iter().map(u64::to_string).collect();
        Some(format!("S:{}", ids.join(",")))
    }

    pub fn compress(&mut self, node: ScaffoldId) {
        if let Some(scaffold) = self.nodes.get_mut(node) {
            scaffold.compress();
        }
    }

    pub fn compress_all(&mut self) {
        for scaffold in self.nodes.values_mut() {
            scaffold.compress();
        }
    }

    pub fn decompress(&mut self, node: ScaffoldId, toolkit: &dyn ChemToolkit) -> Result<(), ChemError> {
        match self.nodes.get_mut(node) {
            Some(scaffold) => scaffold.decompress(toolkit),
            None => Ok(()),
        }
    }
}
