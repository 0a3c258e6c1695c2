use super::super::element;
use super::super::error::ChemError;
use crate::core::models::atom::Atom;
use crate::core::models::ids::{AtomId, BondId};
use crate::core::models::molecule::Molecule;
use crate::core::models::topology::BondOrder;
use slotmap::SecondaryMap;
use std::collections::{HashMap, HashSet};

const MAX_RING_LABEL: u16 = 99;

/// Writes a molecule as SMILES, visiting atoms in the order given by `ranks`.
///
/// Each connected component is written depth-first from its lowest-ranked
/// atom, always descending into the lowest-ranked unvisited neighbour first.
/// Components are sorted and joined with `.`. With canonical ranks the output
/// is a canonical SMILES string. Stereo marks are written only when `stereo`
/// is set.
///
/// # Errors
///
/// Fails when an atom has no element symbol or a component needs more ring
/// closure labels than SMILES can express.
pub fn write_smiles(
    mol: &Molecule,
    ranks: &SecondaryMap<AtomId, usize>,
    stereo: bool,
) -> Result<String, ChemError> {
    let mut components = Vec::new();
    for component in mol.connected_components() {
        let Some(&start) = component
            .iter()
            .min_by_key(|&&atom| ranks.get(atom).copied().unwrap_or(usize::MAX))
        else {
            continue;
        };
        let mut writer = FragmentWriter::new(mol, ranks, stereo);
        writer.plan(start, None);
        writer.emit(start, None)?;
        components.push(writer.out);
    }
    components.sort();
    Ok(components.join("."))
}

struct FragmentWriter<'a> {
    mol: &'a Molecule,
    ranks: &'a SecondaryMap<AtomId, usize>,
    stereo: bool,
    visited: HashSet<AtomId>,
    closure_bonds: HashSet<BondId>,
    children: HashMap<AtomId, Vec<(AtomId, BondId)>>,
    ring_opens: HashMap<AtomId, Vec<(AtomId, BondId)>>,
    ring_closes: HashMap<AtomId, Vec<(AtomId, BondId)>>,
    open_labels: HashMap<BondId, u16>,
    labels_in_use: [bool; MAX_RING_LABEL as usize + 1],
    out: String,
}

impl<'a> FragmentWriter<'a> {
    fn new(mol: &'a Molecule, ranks: &'a SecondaryMap<AtomId, usize>, stereo: bool) -> Self {
        Self {
            mol,
            ranks,
            stereo,
            visited: HashSet::new(),
            closure_bonds: HashSet::new(),
            children: HashMap::new(),
            ring_opens: HashMap::new(),
            ring_closes: HashMap::new(),
            open_labels: HashMap::new(),
            labels_in_use: [false; MAX_RING_LABEL as usize + 1],
            out: String::new(),
        }
    }

    fn rank(&self, atom: AtomId) -> usize {
        self.ranks.get(atom).copied().unwrap_or(usize::MAX)
    }

    fn sorted_neighbors(&self, atom: AtomId) -> Vec<(AtomId, BondId)> {
        let mut list: Vec<(AtomId, BondId)> = self
            .mol
            .bonds_of(atom)
            .iter()
            .filter_map(|&b| self.mol.bond(b).and_then(|bond| bond.other(atom)).map(|o| (o, b)))
            .collect();
        list.sort_by_key(|&(other, _)| self.rank(other));
        list
    }

    /// First pass: spanning tree and ring closures.
    fn plan(&mut self, atom: AtomId, via: Option<BondId>) {
        self.visited.insert(atom);
        for (neighbor, bond) in self.sorted_neighbors(atom) {
            if Some(bond) == via || self.closure_bonds.contains(&bond) {
                continue;
            }
            if self.visited.contains(&neighbor) {
                self.closure_bonds.insert(bond);
                self.ring_opens.entry(neighbor).or_default().push((atom, bond));
                self.ring_closes.entry(atom).or_default().push((neighbor, bond));
            } else {
                self.children.entry(atom).or_default().push((neighbor, bond));
                self.plan(neighbor, Some(bond));
            }
        }
    }

    /// Second pass: text.
    fn emit(&mut self, atom_id: AtomId, parent: Option<AtomId>) -> Result<(), ChemError> {
        let mol = self.mol;
        let Some(atom) = mol.atom(atom_id) else {
            return Ok(());
        };

        let mut order: Vec<Option<AtomId>> = Vec::with_capacity(4);
        order.extend(parent.map(Some));
        if atom.hydrogen_count == 1 {
            order.push(None);
        }

        let closes = self.ring_closes.get(&atom_id).cloned().unwrap_or_default();
        let opens = self.ring_opens.get(&atom_id).cloned().unwrap_or_default();
        let mut ring_text = String::new();
        let mut released = Vec::with_capacity(closes.len());
        for (partner, bond) in closes {
            let Some(label) = self.open_labels.remove(&bond) else { continue };
            if let Some(symbol) = self.bond_symbol(bond) {
                ring_text.push(symbol);
            }
            push_label(&mut ring_text, label);
            order.push(Some(partner));
            released.push(label);
        }
        for (partner, bond) in opens {
            let label = self.allocate_label()?;
            self.open_labels.insert(bond, label);
            push_label(&mut ring_text, label);
            order.push(Some(partner));
        }
        for label in released {
            self.labels_in_use[label as usize] = false;
        }

        let children = self.children.get(&atom_id).cloned().unwrap_or_default();
        order.extend(children.iter().map(|&(child, _)| Some(child)));

        let text = self.atom_text(atom_id, atom, &order)?;
        self.out.push_str(&text);
        self.out.push_str(&ring_text);

        let count = children.len();
        for (i, (child, bond)) in children.into_iter().enumerate() {
            let branch = i + 1 < count;
            if branch {
                self.out.push('(');
            }
            if let Some(symbol) = self.bond_symbol(bond) {
                self.out.push(symbol);
            }
            self.emit(child, Some(atom_id))?;
            if branch {
                self.out.push(')');
            }
        }
        Ok(())
    }

    fn allocate_label(&mut self) -> Result<u16, ChemError> {
        let label = (1..=MAX_RING_LABEL)
            .find(|&l| !self.labels_in_use[l as usize])
            .ok_or(ChemError::TooManyRingClosures)?;
        self.labels_in_use[label as usize] = true;
        Ok(label)
    }

    fn bond_symbol(&self, bond_id: BondId) -> Option<char> {
        let bond = self.mol.bond(bond_id)?;
        let aromatic = |id| self.mol.atom(id).is_some_and(|a| a.is_aromatic);
        let both_aromatic = aromatic(bond.atom1_id) && aromatic(bond.atom2_id);
        if bond.order == BondOrder::Aromatic && !both_aromatic {
            return Some(':');
        }
        bond.order.smiles_symbol(both_aromatic)
    }

    fn atom_text(&self, atom_id: AtomId, atom: &Atom, order: &[Option<AtomId>]) -> Result<String, ChemError> {
        let symbol = element::symbol(atom.atomic_num)
            .ok_or(ChemError::UnknownAtomicNumber(atom.atomic_num))?;
        let symbol = if atom.is_aromatic {
            symbol.to_lowercase()
        } else {
            symbol.to_string()
        };

        let chirality = if self.stereo {
            atom.stereo.as_ref().and_then(|s| s.clockwise_in(order))
        } else {
            None
        };

        if chirality.is_none() && self.can_write_bare(atom_id, atom) {
            return Ok(symbol);
        }

        let mut text = String::from("[");
        if atom.isotope > 0 {
            text.push_str(&atom.isotope.to_string());
        }
        text.push_str(&symbol);
        match chirality {
            Some(true) => text.push_str("@@"),
            Some(false) => text.push('@'),
            None => {}
        }
        match atom.hydrogen_count {
            0 => {}
            1 => text.push('H'),
            n => text.push_str(&format!("H{n}")),
        }
        match atom.formal_charge {
            0 => {}
            1 => text.push('+'),
            -1 => text.push('-'),
            c if c > 0 => text.push_str(&format!("+{c}")),
            c => text.push_str(&format!("-{}", -(c as i16))),
        }
        text.push(']');
        Ok(text)
    }

    fn can_write_bare(&self, atom_id: AtomId, atom: &Atom) -> bool {
        if atom.formal_charge != 0 || atom.isotope != 0 {
            return false;
        }
        if atom.is_dummy() {
            return atom.hydrogen_count == 0 && !atom.is_aromatic;
        }
        if !element::is_organic_subset(atom.atomic_num) {
            return false;
        }
        if atom.is_aromatic && !matches!(atom.atomic_num, 5 | 6 | 7 | 8 | 15 | 16) {
            return false;
        }
        let implicit = element::implicit_hydrogens(
            atom.atomic_num,
            self.mol.bond_order_sum(atom_id),
            atom.is_aromatic,
        );
        atom.hydrogen_count == implicit
    }
}

fn push_label(text: &mut String, label: u16) {
    if label < 10 {
        text.push_str(&label.to_string());
    } else {
        text.push_str(&format!("%{label:02}"));
    }
}

#[cfg(test)]
mod tests {
    use super::super::reader::parse_smiles;
    use super::*;

    fn in_input_order(mol: &Molecule) -> SecondaryMap<AtomId, usize> {
        let mut ranks = SecondaryMap::new();
        for (i, id) in mol.atom_ids().into_iter().enumerate() {
            ranks.insert(id, i);
        }
        ranks
    }

    fn rewrite(smiles: &str) -> String {
        let mol = parse_smiles(smiles).unwrap();
        write_smiles(&mol, &in_input_order(&mol), true).unwrap()
    }

    #[test]
    fn writes_chain_and_branches_in_input_order() {
        assert_eq!(rewrite("CC(=O)O"), "CC(=O)O");
        assert_eq!(rewrite("CC(C)(C)C"), "CC(C)(C)C");
    }

    #[test]
    fn writes_ring_closures() {
        assert_eq!(rewrite("C1CCCCC1"), "C1CCCCC1");
        assert_eq!(rewrite("c1ccccc1"), "c1ccccc1");
    }

    #[test]
    fn writes_bracket_atoms_when_needed() {
        assert_eq!(rewrite("[NH4+]"), "[NH4+]");
        assert_eq!(rewrite("[13CH4]"), "[13CH4]");
        assert_eq!(rewrite("c1cc[nH]c1"), "c1cc[nH]c1");
        assert_eq!(rewrite("[H]C"), "[H]C");
        assert_eq!(rewrite("[O-]C"), "[O-]C");
        assert_eq!(rewrite("[Fe+2]"), "[Fe+2]");
    }

    #[test]
    fn writes_single_bond_between_aromatic_atoms() {
        assert_eq!(rewrite("c1ccccc1-c1ccccc1"), "c1ccccc1-c1ccccc1");
    }

    #[test]
    fn writes_attachment_points_bare() {
        assert_eq!(rewrite("*CC*"), "*CC*");
    }

    #[test]
    fn keeps_stereo_marks_only_when_requested() {
        let mol = parse_smiles("F[C@H](Cl)Br").unwrap();
        let ranks = in_input_order(&mol);
        assert_eq!(write_smiles(&mol, &ranks, true).unwrap(), "F[C@H](Cl)Br");
        assert_eq!(write_smiles(&mol, &ranks, false).unwrap(), "FC(Cl)Br");
    }

    #[test]
    fn sorts_disconnected_components() {
        assert_eq!(rewrite("O.CC"), "CC.O");
    }
}
