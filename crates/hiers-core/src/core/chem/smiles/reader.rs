use super::super::element;
use super::super::error::ChemError;
use super::super::rings::RingInfo;
use crate::core::models::atom::{Atom, TetrahedralStereo};
use crate::core::models::ids::AtomId;
use crate::core::models::molecule::Molecule;
use crate::core::models::topology::BondOrder;
use slotmap::SecondaryMap;
use std::collections::HashMap;

/// Neighbour slot in the order a stereocentre sees its neighbours while parsing.
#[derive(Debug, Clone, Copy, PartialEq)]
enum NeighborRef {
    Atom(AtomId),
    Hydrogen,
    PendingRing,
}

#[derive(Debug, Clone, Copy)]
struct RingOpening {
    atom: AtomId,
    bond: Option<BondOrder>,
    slot: usize,
}

#[derive(Debug)]
struct ParsedAtom {
    atom: Atom,
    bracket: bool,
    clockwise: Option<bool>,
}

/// Parses a SMILES string into a [`Molecule`].
///
/// Bare organic-subset atoms receive implicit hydrogens from their standard
/// valences; bracket atoms keep exactly the hydrogens written. A bond left
/// implicit between two aromatic atoms is aromatic only when it lies in a
/// ring, otherwise it is single. Tetrahedral `@`/`@@` marks are kept as
/// [`TetrahedralStereo`] on the atom.
///
/// # Errors
///
/// Returns a [`ChemError`] describing the first syntax problem found.
pub fn parse_smiles(input: &str) -> Result<Molecule, ChemError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ChemError::Empty);
    }
    Parser::new(trimmed).run()
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    mol: Molecule,
    previous: Option<AtomId>,
    pending_bond: Option<(BondOrder, usize)>,
    /// Position of a '.' not yet followed by an atom.
    open_dot: Option<usize>,
    branches: Vec<(Option<AtomId>, usize)>,
    ring_openings: HashMap<u16, RingOpening>,
    neighbor_order: SecondaryMap<AtomId, Vec<NeighborRef>>,
    bracket_atoms: SecondaryMap<AtomId, ()>,
    chirality: SecondaryMap<AtomId, bool>,
}

impl Parser {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            mol: Molecule::new(),
            previous: None,
            pending_bond: None,
            open_dot: None,
            branches: Vec::new(),
            ring_openings: HashMap::new(),
            neighbor_order: SecondaryMap::new(),
            bracket_atoms: SecondaryMap::new(),
            chirality: SecondaryMap::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn run(mut self) -> Result<Molecule, ChemError> {
        while let Some(ch) = self.peek() {
            let start = self.pos;
            match ch {
                '[' => {
                    let parsed = self.bracket_atom()?;
                    self.attach_atom(parsed, start)?;
                }
                '(' => {
                    if self.previous.is_none() || self.pending_bond.is_some() {
                        return Err(ChemError::UnbalancedBranch { pos: start });
                    }
                    self.branches.push((self.previous, start));
                    self.pos += 1;
                }
                ')' => {
                    if let Some((_, pos)) = self.pending_bond {
                        return Err(ChemError::DanglingBond { pos });
                    }
                    if let Some(pos) = self.open_dot {
                        return Err(ChemError::EmptyComponent { pos });
                    }
                    let (atom, _) = self
                        .branches
                        .pop()
                        .ok_or(ChemError::UnbalancedBranch { pos: start })?;
                    self.previous = atom;
                    self.pos += 1;
                }
                '-' | '=' | '#' | ':' | '/' | '\\' => {
                    if self.pending_bond.is_some() || self.previous.is_none() {
                        return Err(ChemError::UnexpectedCharacter { ch, pos: start });
                    }
                    let order = match ch {
                        '=' => BondOrder::Double,
                        '#' => BondOrder::Triple,
                        ':' => BondOrder::Aromatic,
                        _ => BondOrder::Single,
                    };
                    self.pending_bond = Some((order, start));
                    self.pos += 1;
                }
                '.' => {
                    if let Some((_, pos)) = self.pending_bond {
                        return Err(ChemError::DanglingBond { pos });
                    }
                    if self.previous.is_none() {
                        return Err(ChemError::EmptyComponent { pos: start });
                    }
                    self.open_dot = Some(start);
                    self.previous = None;
                    self.pos += 1;
                }
                '%' => {
                    let tens = self.peek_at(1).and_then(|c| c.to_digit(10));
                    let units = self.peek_at(2).and_then(|c| c.to_digit(10));
                    let (Some(tens), Some(units)) = (tens, units) else {
                        return Err(ChemError::UnexpectedCharacter { ch, pos: start });
                    };
                    self.pos += 3;
                    self.ring_closure((tens * 10 + units) as u16, start)?;
                }
                c if c.is_ascii_digit() => {
                    self.pos += 1;
                    self.ring_closure(c.to_digit(10).unwrap_or_default() as u16, start)?;
                }
                _ => {
                    let parsed = self.organic_atom()?;
                    self.attach_atom(parsed, start)?;
                }
            }
        }

        if let Some((_, pos)) = self.pending_bond {
            return Err(ChemError::DanglingBond { pos });
        }
        if let Some(pos) = self.open_dot {
            return Err(ChemError::EmptyComponent { pos });
        }
        if let Some(&(_, pos)) = self.branches.last() {
            return Err(ChemError::UnbalancedBranch { pos });
        }
        if let Some(&label) = self.ring_openings.keys().min() {
            return Err(ChemError::UnclosedRing { label });
        }

        self.finish()
    }

    fn organic_atom(&mut self) -> Result<ParsedAtom, ChemError> {
        let start = self.pos;
        let ch = self.peek().ok_or(ChemError::Empty)?;
        let (atomic_num, aromatic, width) = match (ch, self.peek_at(1)) {
            ('C', Some('l')) => (17, false, 2),
            ('B', Some('r')) => (35, false, 2),
            ('*', _) => (0, false, 1),
            ('B' | 'C' | 'N' | 'O' | 'P' | 'S' | 'F' | 'I', _) => {
                let symbol = ch.to_string();
                let atomic_num = element::atomic_number(&symbol)
                    .ok_or(ChemError::UnknownElement { symbol, pos: start })?;
                (atomic_num, false, 1)
            }
            ('b' | 'c' | 'n' | 'o' | 'p' | 's', _) => {
                let symbol = ch.to_ascii_uppercase().to_string();
                let atomic_num = element::atomic_number(&symbol)
                    .ok_or(ChemError::UnknownElement { symbol, pos: start })?;
                (atomic_num, true, 1)
            }
            _ => return Err(ChemError::UnexpectedCharacter { ch, pos: start }),
        };
        self.pos += width;
        Ok(ParsedAtom {
            atom: Atom::new(atomic_num).aromatic(aromatic),
            bracket: false,
            clockwise: None,
        })
    }

    fn bracket_atom(&mut self) -> Result<ParsedAtom, ChemError> {
        let open = self.pos;
        self.pos += 1;

        let isotope = self.number();

        let first = self.peek().ok_or(ChemError::UnclosedBracket { pos: open })?;
        let (atomic_num, aromatic) = if first == '*' {
            self.pos += 1;
            (0, false)
        } else if first.is_ascii_lowercase() {
            let two: String = [first, self.peek_at(1).unwrap_or(' ')].iter().collect();
            let (symbol, width) = if matches!(two.as_str(), "se" | "as" | "te") {
                (two, 2)
            } else {
                (first.to_string(), 1)
            };
            let proper = capitalize(&symbol);
            let atomic_num = element::atomic_number(&proper)
                .ok_or(ChemError::UnknownElement { symbol: symbol.clone(), pos: self.pos })?;
            if !element::can_be_aromatic(atomic_num) {
                return Err(ChemError::InvalidAromaticElement { symbol });
            }
            self.pos += width;
            (atomic_num, true)
        } else if first.is_ascii_uppercase() {
            let two: String = match self.peek_at(1) {
                Some(second) if second.is_ascii_lowercase() => [first, second].iter().collect(),
                _ => String::new(),
            };
            if !two.is_empty() && element::atomic_number(&two).is_some() {
                self.pos += 2;
                (element::atomic_number(&two).unwrap_or_default(), false)
            } else {
                let one = first.to_string();
                let atomic_num = element::atomic_number(&one)
                    .ok_or(ChemError::UnknownElement { symbol: one, pos: self.pos })?;
                self.pos += 1;
                (atomic_num, false)
            }
        } else {
            return Err(ChemError::UnexpectedCharacter { ch: first, pos: self.pos });
        };

        let mut clockwise = None;
        if self.peek() == Some('@') {
            self.pos += 1;
            if self.peek() == Some('@') {
                self.pos += 1;
                clockwise = Some(true);
            } else {
                clockwise = Some(false);
            }
        }

        let mut hydrogens = 0;
        if self.peek() == Some('H') {
            self.pos += 1;
            hydrogens = self.number().unwrap_or(1);
        }

        let mut charge: i32 = 0;
        while let Some(sign @ ('+' | '-')) = self.peek() {
            self.pos += 1;
            let unit = if sign == '+' { 1 } else { -1 };
            match self.number() {
                Some(n) => charge += unit * n as i32,
                None => charge += unit,
            }
        }

        if self.peek() == Some(':') {
            self.pos += 1;
            self.number();
        }

        if self.peek() != Some(']') {
            return Err(ChemError::UnclosedBracket { pos: open });
        }
        self.pos += 1;

        let mut atom = Atom::new(atomic_num)
            .aromatic(aromatic)
            .with_hydrogens(u8::try_from(hydrogens).unwrap_or(u8::MAX));
        atom.isotope = u16::try_from(isotope.unwrap_or(0)).unwrap_or(u16::MAX);
        atom.formal_charge = i8::try_from(charge).unwrap_or(0);
        Ok(ParsedAtom {
            atom,
            bracket: true,
            clockwise,
        })
    }

    fn number(&mut self) -> Option<u32> {
        let start = self.pos;
        let mut value: u32 = 0;
        while let Some(d) = self.peek().and_then(|c| c.to_digit(10)) {
            value = value.saturating_mul(10).saturating_add(d);
            self.pos += 1;
        }
        (self.pos > start).then_some(value)
    }

    fn attach_atom(&mut self, parsed: ParsedAtom, start: usize) -> Result<(), ChemError> {
        let hydrogen_ref = parsed.bracket && parsed.atom.hydrogen_count > 0;
        let is_aromatic = parsed.atom.is_aromatic;
        let id = self.mol.add_atom(parsed.atom);
        self.open_dot = None;
        self.neighbor_order.insert(id, Vec::new());
        if parsed.bracket {
            self.bracket_atoms.insert(id, ());
        }
        if let Some(clockwise) = parsed.clockwise {
            self.chirality.insert(id, clockwise);
        }

        match self.previous {
            Some(prev) => {
                let order = match self.pending_bond.take() {
                    Some((order, _)) => order,
                    None => self.implicit_order(prev, is_aromatic),
                };
                self.mol
                    .add_bond(prev, id, order)
                    .ok_or(ChemError::UnexpectedCharacter { ch: '?', pos: start })?;
                self.push_ref(id, NeighborRef::Atom(prev));
                self.push_ref(prev, NeighborRef::Atom(id));
            }
            None => {
                if let Some((_, pos)) = self.pending_bond {
                    return Err(ChemError::DanglingBond { pos });
                }
            }
        }
        if hydrogen_ref {
            self.push_ref(id, NeighborRef::Hydrogen);
        }
        self.previous = Some(id);
        Ok(())
    }

    fn implicit_order(&self, other: AtomId, is_aromatic: bool) -> BondOrder {
        let other_aromatic = self.mol.atom(other).is_some_and(|a| a.is_aromatic);
        if is_aromatic && other_aromatic {
            BondOrder::Aromatic
        } else {
            BondOrder::Single
        }
    }

    fn push_ref(&mut self, atom: AtomId, neighbor: NeighborRef) {
        if let Some(list) = self.neighbor_order.get_mut(atom) {
            list.push(neighbor);
        }
    }

    fn ring_closure(&mut self, label: u16, start: usize) -> Result<(), ChemError> {
        let current = self
            .previous
            .ok_or(ChemError::UnexpectedCharacter { ch: '%', pos: start })?;
        let bond_here = self.pending_bond.take().map(|(order, _)| order);

        match self.ring_openings.remove(&label) {
            Some(opening) => {
                if opening.atom == current || self.mol.bond_between(opening.atom, current).is_some() {
                    return Err(ChemError::DuplicateRingBond { label });
                }
                let order = match (opening.bond, bond_here) {
                    (Some(a), Some(b)) if a != b => {
                        return Err(ChemError::ConflictingRingBond { label });
                    }
                    (Some(order), _) | (None, Some(order)) => order,
                    (None, None) => {
                        let aromatic = self.mol.atom(current).is_some_and(|a| a.is_aromatic);
                        self.implicit_order(opening.atom, aromatic)
                    }
                };
                self.mol
                    .add_bond(opening.atom, current, order)
                    .ok_or(ChemError::DuplicateRingBond { label })?;
                self.push_ref(current, NeighborRef::Atom(opening.atom));
                if let Some(slot) = self
                    .neighbor_order
                    .get_mut(opening.atom)
                    .and_then(|list| list.get_mut(opening.slot))
                {
                    *slot = NeighborRef::Atom(current);
                }
            }
            None => {
                let slot = self.neighbor_order.get(current).map_or(0, Vec::len);
                self.push_ref(current, NeighborRef::PendingRing);
                self.ring_openings.insert(
                    label,
                    RingOpening {
                        atom: current,
                        bond: bond_here,
                        slot,
                    },
                );
            }
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Molecule, ChemError> {
        let rings = RingInfo::perceive(&self.mol);
        for bond_id in self.mol.bond_ids() {
            if rings.is_ring_bond(bond_id) {
                continue;
            }
            if let Some(bond) = self.mol.bond_mut(bond_id) {
                if bond.order == BondOrder::Aromatic {
                    bond.order = BondOrder::Single;
                }
            }
        }

        for id in self.mol.atom_ids() {
            if self.bracket_atoms.contains_key(id) {
                continue;
            }
            let sum = self.mol.bond_order_sum(id);
            if let Some(atom) = self.mol.atom_mut(id) {
                atom.hydrogen_count = element::implicit_hydrogens(atom.atomic_num, sum, atom.is_aromatic);
            }
        }

        for (id, clockwise) in self.chirality.iter() {
            let Some(order) = self.neighbor_order.get(id) else { continue };
            if !(3..=4).contains(&order.len()) {
                continue;
            }
            let neighbors: Vec<Option<AtomId>> = order
                .iter()
                .filter_map(|r| match r {
                    NeighborRef::Atom(a) => Some(Some(*a)),
                    NeighborRef::Hydrogen => Some(None),
                    NeighborRef::PendingRing => None,
                })
                .collect();
            if neighbors.len() != order.len() {
                continue;
            }
            if let Some(atom) = self.mol.atom_mut(id) {
                atom.stereo = Some(TetrahedralStereo {
                    neighbors,
                    clockwise: *clockwise,
                });
            }
        }

        Ok(self.mol)
    }
}

fn capitalize(symbol: &str) -> String {
    let mut chars = symbol.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}
