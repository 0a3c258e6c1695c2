use super::atom::Atom;
use super::ids::{AtomId, BondId};
use super::topology::{Bond, BondOrder};
use slotmap::{SecondaryMap, SlotMap};
use std::collections::{HashMap, HashSet, VecDeque};

/// A small-molecule graph of atoms and bonds.
///
/// Atoms and bonds live in slot maps, so their ids stay valid while other atoms
/// are removed and are preserved by [`Clone`]. The decomposition engine relies
/// on this: a scaffold derived from a clone of the input can be compared atom
/// by atom with the input itself.
#[derive(Debug, Clone, Default)]
pub struct Molecule {
    /// Primary storage for atoms.
    atoms: SlotMap<AtomId, Atom>,
    /// Primary storage for bonds.
    bonds: SlotMap<BondId, Bond>,
    /// Bonds incident to each atom, in insertion order.
    adjacency: SecondaryMap<AtomId, Vec<BondId>>,
}

impl Molecule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn atom(&self, id: AtomId) -> Option<&Atom> {
        self.atoms.get(id)
    }

    pub fn atom_mut(&mut self, id: AtomId) -> Option<&mut Atom> {
        self.atoms.get_mut(id)
    }

    pub fn bond(&self, id: BondId) -> Option<&Bond> {
        self.bonds.get(id)
    }

    pub fn bond_mut(&mut self, id: BondId) -> Option<&mut Bond> {
        self.bonds.get_mut(id)
    }

    pub fn atoms_iter(&self) -> impl Iterator<Item = (AtomId, &Atom)> {
        self.atoms.iter()
    }

    pub fn bonds_iter(&self) -> impl Iterator<Item = (BondId, &Bond)> {
        self.bonds.iter()
    }

    pub fn atom_ids(&self) -> Vec<AtomId> {
        self.atoms.keys().collect()
    }

    pub fn bond_ids(&self) -> Vec<BondId> {
        self.bonds.keys().collect()
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn bond_count(&self) -> usize {
        self.bonds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Number of atoms that are neither hydrogens nor attachment dummies.
    pub fn heavy_atom_count(&self) -> usize {
        self.atoms
            .values()
            .filter(|a| !a.is_hydrogen() && !a.is_dummy())
            .count()
    }

    pub fn add_atom(&mut self, atom: Atom) -> AtomId {
        let id = self.atoms.insert(atom);
        self.adjacency.insert(id, Vec::new());
        id
    }

    /// Adds a bond between two atoms.
    ///
    /// Adding a bond that already exists is a no-op and returns the id of the
    /// existing bond.
    ///
    /// # Return
    ///
    /// Returns `None` if either atom does not exist or both ids are the same atom.
    pub fn add_bond(&mut self, atom1_id: AtomId, atom2_id: AtomId, order: BondOrder) -> Option<BondId> {
        if atom1_id == atom2_id
            || !self.atoms.contains_key(atom1_id)
            || !self.atoms.contains_key(atom2_id)
        {
            return None;
        }
        if let Some(existing) = self.bond_between(atom1_id, atom2_id) {
            return Some(existing);
        }
        let id = self.bonds.insert(Bond::new(atom1_id, atom2_id, order));
        self.adjacency.get_mut(atom1_id)?.push(id);
        self.adjacency.get_mut(atom2_id)?.push(id);
        Some(id)
    }

    pub fn remove_bond(&mut self, id: BondId) -> Option<Bond> {
        let bond = self.bonds.remove(id)?;
        for end in [bond.atom1_id, bond.atom2_id] {
            if let Some(list) = self.adjacency.get_mut(end) {
                list.retain(|&b| b != id);
            }
        }
        Some(bond)
    }

    /// Removes an atom together with its bonds.
    ///
    /// Stereo references held by the former neighbours are turned into implicit
    /// hydrogen references, which is what they become when the caller folds the
    /// removed atom into a hydrogen count.
    pub fn remove_atom(&mut self, id: AtomId) -> Option<Atom> {
        let incident = self.adjacency.remove(id)?;
        for bond_id in incident {
            if let Some(bond) = self.bonds.remove(bond_id) {
                let Some(other) = bond.other(id) else { continue };
                if let Some(list) = self.adjacency.get_mut(other) {
                    list.retain(|&b| b != bond_id);
                }
                if let Some(stereo) = self.atoms.get_mut(other).and_then(|a| a.stereo.as_mut()) {
                    stereo.replace(Some(id), None);
                }
            }
        }
        self.atoms.remove(id)
    }

    pub fn bonds_of(&self, id: AtomId) -> &[BondId] {
        self.adjacency.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn neighbors(&self, id: AtomId) -> impl Iterator<Item = AtomId> + '_ {
        self.bonds_of(id)
            .iter()
            .filter_map(move |&b| self.bonds.get(b).and_then(|bond| bond.other(id)))
    }

    pub fn degree(&self, id: AtomId) -> usize {
        self.bonds_of(id).len()
    }

    pub fn bond_between(&self, a: AtomId, b: AtomId) -> Option<BondId> {
        self.bonds_of(a)
            .iter()
            .copied()
            .find(|&bond_id| self.bonds.get(bond_id).is_some_and(|bond| bond.contains(b)))
    }

    /// Sum of bond valence contributions around an atom (aromatic bonds count one).
    pub fn bond_order_sum(&self, id: AtomId) -> u8 {
        self.bonds_of(id)
            .iter()
            .filter_map(|&b| self.bonds.get(b))
            .map(|bond| bond.order.valence_contribution())
            .sum()
    }

    /// Groups atoms into connected components, each in breadth-first order from
    /// its lowest-slot atom.
    pub fn connected_components(&self) -> Vec<Vec<AtomId>> {
        let mut seen: HashSet<AtomId> = HashSet::with_capacity(self.atoms.len());
        let mut components = Vec::new();
        for start in self.atoms.keys() {
            if !seen.insert(start) {
                continue;
            }
            let mut component = Vec::new();
            let mut queue = VecDeque::from([start]);
            while let Some(current) = queue.pop_front() {
                component.push(current);
                for next in self.neighbors(current) {
                    if seen.insert(next) {
                        queue.push_back(next);
                    }
                }
            }
            components.push(component);
        }
        components
    }

    /// Connected components of the subgraph induced by `selection`, in atom
    /// storage order.
    pub fn components_within(&self, selection: &HashSet<AtomId>) -> Vec<Vec<AtomId>> {
        let mut seen: HashSet<AtomId> = HashSet::with_capacity(selection.len());
        let mut components = Vec::new();
        for start in self.atoms.keys().filter(|id| selection.contains(id)) {
            if !seen.insert(start) {
                continue;
            }
            let mut component = vec![start];
            let mut cursor = 0;
            while let Some(&current) = component.get(cursor) {
                cursor += 1;
                for next in self.neighbors(current) {
                    if selection.contains(&next) && seen.insert(next) {
                        component.push(next);
                    }
                }
            }
            components.push(component);
        }
        components
    }

    /// The largest connected component by heavy-atom count; the first one
    /// wins a tie. Returns a clone of the whole molecule if it is connected.
    pub fn largest_fragment(&self) -> Molecule {
        let components = self.connected_components();
        if components.len() <= 1 {
            return self.clone();
        }
        let heavy = |component: &Vec<AtomId>| {
            component
                .iter()
                .filter(|&&id| self.atoms.get(id).is_some_and(|a| !a.is_hydrogen() && !a.is_dummy()))
                .count()
        };
        let mut best: Option<(&Vec<AtomId>, usize)> = None;
        for component in &components {
            let size = heavy(component);
            if best.is_none_or(|(_, best_size)| size > best_size) {
                best = Some((component, size));
            }
        }
        match best {
            Some((component, _)) => self.extract(component).0,
            None => self.clone(),
        }
    }

    /// Copies the atoms in `selection` and the bonds among them into a new
    /// molecule. Junction tags and stereo references are carried over; stereo
    /// references to atoms outside the selection become implicit hydrogens.
    ///
    /// # Return
    ///
    /// The new molecule together with the mapping from old to new atom ids.
    pub fn extract(&self, selection: &[AtomId]) -> (Molecule, HashMap<AtomId, AtomId>) {
        let mut out = Molecule::new();
        let mut mapping = HashMap::with_capacity(selection.len());
        for &old in selection {
            if let Some(atom) = self.atoms.get(old) {
                let new = out.add_atom(atom.clone());
                mapping.insert(old, new);
            }
        }
        for (_, bond) in self.bonds.iter() {
            if let (Some(&a), Some(&b)) = (mapping.get(&bond.atom1_id), mapping.get(&bond.atom2_id)) {
                if let Some(new_bond) = out.add_bond(a, b, bond.order) {
                    if let Some(copy) = out.bonds.get_mut(new_bond) {
                        copy.junction = bond.junction;
                    }
                }
            }
        }
        for new in mapping.values().copied() {
            if let Some(stereo) = out.atoms.get_mut(new).and_then(|a| a.stereo.as_mut()) {
                for slot in stereo.neighbors.iter_mut() {
                    *slot = slot.and_then(|old| mapping.get(&old).copied());
                }
            }
        }
        (out, mapping)
    }

    /// Splits the molecule into one molecule per connected component.
    pub fn split_fragments(&self) -> Vec<Molecule> {
        self.connected_components()
            .into_iter()
            .map(|component| self.extract(&component).0)
            .collect()
    }

    /// Like [`Molecule::extract`], but every bond leaving the selection is kept
    /// and capped with a `*` attachment atom, so the fragment records where it
    /// was attached. Stereo references to the outside atom follow the cap.
    pub fn extract_capped(&self, selection: &[AtomId]) -> Molecule {
        let (mut out, mapping) = self.extract(selection);
        for &old in selection {
            let Some(&new) = mapping.get(&old) else { continue };
            for &bond_id in self.bonds_of(old) {
                let Some(bond) = self.bonds.get(bond_id) else { continue };
                let Some(outside) = bond.other(old) else { continue };
                if mapping.contains_key(&outside) {
                    continue;
                }
                let cap = out.add_atom(Atom::attachment_point());
                out.add_bond(new, cap, bond.order);
                let position = self
                    .atoms
                    .get(old)
                    .and_then(|a| a.stereo.as_ref())
                    .and_then(|s| s.neighbors.iter().position(|n| *n == Some(outside)));
                if let (Some(position), Some(stereo)) =
                    (position, out.atoms.get_mut(new).and_then(|a| a.stereo.as_mut()))
                {
                    if let Some(slot) = stereo.neighbors.get_mut(position) {
                        *slot = Some(cap);
                    }
                }
            }
        }
        out
    }

    /// Folds plain explicit hydrogens into the hydrogen count of their heavy-atom
    /// neighbour. Placeholders, isotopic or charged hydrogens, and hydrogens that
    /// are not bonded to exactly one heavy atom are kept.
    ///
    /// # Return
    ///
    /// The number of hydrogens removed.
    pub fn suppress_hydrogens(&mut self) -> usize {
        self.fold_hydrogens(false)
    }

    /// Folds explicit hydrogens, placeholders included when
    /// `include_placeholders` is set, into their neighbour's hydrogen count.
    pub fn fold_hydrogens(&mut self, include_placeholders: bool) -> usize {
        let candidates: Vec<(AtomId, AtomId)> = self
            .atoms
            .iter()
            .filter(|(_, a)| {
                a.is_hydrogen()
                    && (include_placeholders || !a.is_placeholder)
                    && a.isotope == 0
                    && a.formal_charge == 0
            })
            .filter_map(|(id, _)| {
                let mut neighbors = self.neighbors(id);
                let first = neighbors.next()?;
                if neighbors.next().is_some() {
                    return None;
                }
                let heavy = self.atoms.get(first).is_some_and(|a| !a.is_hydrogen());
                heavy.then_some((id, first))
            })
            .collect();
        for &(hydrogen, heavy) in &candidates {
            self.remove_atom(hydrogen);
            if let Some(atom) = self.atoms.get_mut(heavy) {
                atom.hydrogen_count = atom.hydrogen_count.saturating_add(1);
            }
        }
        candidates.len()
    }
}
