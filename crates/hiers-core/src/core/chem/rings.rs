use crate::core::models::ids::{AtomId, BondId};
use crate::core::models::molecule::Molecule;
use slotmap::SecondaryMap;
use std::collections::{HashSet, VecDeque};

/// Ring membership of atoms and bonds.
///
/// A bond is a ring bond exactly when it is not a bridge of the molecular
/// graph, i.e. when removing it keeps its endpoints connected. Ring systems are
/// the connected components formed by ring bonds, so fused and spiro rings end
/// up in the same system.
#[derive(Debug, Clone, Default)]
pub struct RingInfo {
    ring_bonds: HashSet<BondId>,
    ring_atoms: HashSet<AtomId>,
    systems: Vec<Vec<AtomId>>,
    ring_count: usize,
}

impl RingInfo {
    pub fn perceive(mol: &Molecule) -> Self {
        let bridges = find_bridges(mol);
        let ring_bonds: HashSet<BondId> = mol
            .bonds_iter()
            .map(|(id, _)| id)
            .filter(|id| !bridges.contains(id))
            .collect();

        let mut ring_atoms = HashSet::new();
        for &bond_id in &ring_bonds {
            if let Some(bond) = mol.bond(bond_id) {
                ring_atoms.insert(bond.atom1_id);
                ring_atoms.insert(bond.atom2_id);
            }
        }

        let mut systems = Vec::new();
        let mut seen: HashSet<AtomId> = HashSet::new();
        for start in mol.atom_ids() {
            if !ring_atoms.contains(&start) || !seen.insert(start) {
                continue;
            }
            let mut system = Vec::new();
            let mut queue = VecDeque::from([start]);
            while let Some(current) = queue.pop_front() {
                system.push(current);
                for &bond_id in mol.bonds_of(current) {
                    if !ring_bonds.contains(&bond_id) {
                        continue;
                    }
                    let Some(next) = mol.bond(bond_id).and_then(|b| b.other(current)) else {
                        continue;
                    };
                    if seen.insert(next) {
                        queue.push_back(next);
                    }
                }
            }
            systems.push(system);
        }

        // Cyclomatic number: independent cycles = E - V + C over the ring subgraph.
        let ring_count = (ring_bonds.len() + systems.len()).saturating_sub(ring_atoms.len());

        Self {
            ring_bonds,
            ring_atoms,
            systems,
            ring_count,
        }
    }

    pub fn is_ring_atom(&self, id: AtomId) -> bool {
        self.ring_atoms.contains(&id)
    }

    pub fn is_ring_bond(&self, id: BondId) -> bool {
        self.ring_bonds.contains(&id)
    }

    pub fn has_rings(&self) -> bool {
        !self.ring_bonds.is_empty()
    }

    pub fn ring_count(&self) -> usize {
        self.ring_count
    }

    pub fn ring_systems(&self) -> &[Vec<AtomId>] {
        &self.systems
    }

    pub fn ring_system_count(&self) -> usize {
        self.systems.len()
    }
}

/// Iterative Tarjan bridge search.
fn find_bridges(mol: &Molecule) -> HashSet<BondId> {
    let mut bridges = HashSet::new();
    let mut discovery: SecondaryMap<AtomId, usize> = SecondaryMap::new();
    let mut low: SecondaryMap<AtomId, usize> = SecondaryMap::new();
    let mut timer = 0usize;

    for root in mol.atom_ids() {
        if discovery.contains_key(root) {
            continue;
        }
        discovery.insert(root, timer);
        low.insert(root, timer);
        timer += 1;
        // (atom, bond used to reach it, index of the next incident bond to visit)
        let mut stack: Vec<(AtomId, Option<BondId>, usize)> = vec![(root, None, 0)];

        while let Some(frame) = stack.last_mut() {
            let (current, via, next) = *frame;
            let incident = mol.bonds_of(current);
            if next < incident.len() {
                frame.2 += 1;
                let bond_id = incident[next];
                if Some(bond_id) == via {
                    continue;
                }
                let Some(neighbor) = mol.bond(bond_id).and_then(|b| b.other(current)) else {
                    continue;
                };
                match discovery.get(neighbor).copied() {
                    Some(seen_at) => {
                        if seen_at < low[current] {
                            low[current] = seen_at;
                        }
                    }
                    None => {
                        discovery.insert(neighbor, timer);
                        low.insert(neighbor, timer);
                        timer += 1;
                        stack.push((neighbor, Some(bond_id), 0));
                    }
                }
            } else {
                stack.pop();
                let (Some(via), Some(parent)) = (via, stack.last().map(|f| f.0)) else {
                    continue;
                };
                if low[current] < low[parent] {
                    low[parent] = low[current];
                }
                if low[current] > discovery[parent] {
                    bridges.insert(via);
                }
            }
        }
    }
    bridges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::chem::smiles::parse_smiles;

    #[test]
    fn chain_has_no_rings() {
        let mol = parse_smiles("CCCO").unwrap();
        let rings = RingInfo::perceive(&mol);
        assert!(!rings.has_rings());
        assert_eq!(rings.ring_count(), 0);
        assert_eq!(rings.ring_system_count(), 0);
    }

    #[test]
    fn substituent_bond_is_not_a_ring_bond() {
        let mol = parse_smiles("Cc1ccccc1").unwrap();
        let rings = RingInfo::perceive(&mol);
        assert_eq!(rings.ring_count(), 1);
        let ring_atoms = mol.atom_ids().into_iter().filter(|&a| rings.is_ring_atom(a)).count();
        assert_eq!(ring_atoms, 6);
        let ring_bonds = mol.bond_ids().into_iter().filter(|&b| rings.is_ring_bond(b)).count();
        assert_eq!(ring_bonds, 6);
    }

    #[test]
    fn fused_rings_form_one_system() {
        let mol = parse_smiles("c1ccc2ccccc2c1").unwrap();
        let rings = RingInfo::perceive(&mol);
        assert_eq!(rings.ring_count(), 2);
        assert_eq!(rings.ring_system_count(), 1);
    }

    #[test]
    fn linked_rings_form_separate_systems() {
        let mol = parse_smiles("C1CC1CCC1CCCC1").unwrap();
        let rings = RingInfo::perceive(&mol);
        assert_eq!(rings.ring_count(), 2);
        assert_eq!(rings.ring_system_count(), 2);
    }

    #[test]
    fn spiro_rings_share_a_system() {
        let mol = parse_smiles("C1CCC2(C1)CCCC2").unwrap();
        let rings = RingInfo::perceive(&mol);
        assert_eq!(rings.ring_count(), 2);
        assert_eq!(rings.ring_system_count(), 1);
    }
}
