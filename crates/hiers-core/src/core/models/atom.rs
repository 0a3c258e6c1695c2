use super::ids::AtomId;
use std::fmt;
use std::str::FromStr;

/// Tetrahedral configuration of a stereocentre.
///
/// `neighbors` is the reference order in which the neighbours were seen when
/// the centre was defined; `None` stands for the implicit hydrogen. Looking
/// from the first neighbour, the remaining ones run clockwise when
/// `clockwise` is set (SMILES `@@`) and anticlockwise otherwise (`@`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TetrahedralStereo {
    pub neighbors: Vec<Option<AtomId>>,
    pub clockwise: bool,
}

impl TetrahedralStereo {
    /// Replaces a neighbour reference, e.g. after the bonded atom was swapped for a
    /// hydrogen placeholder. Returns `true` if a reference was updated.
    pub fn replace(&mut self, from: Option<AtomId>, to: Option<AtomId>) -> bool {
        match self.neighbors.iter_mut().find(|n| **n == from) {
            Some(slot) => {
                *slot = to;
                true
            }
            None => false,
        }
    }

    /// Resolves the chirality symbol for the neighbours listed in `order`.
    ///
    /// # Return
    ///
    /// `Some(true)` for `@@`, `Some(false)` for `@`, or `None` when `order` is not
    /// a permutation of the reference neighbours.
    pub fn clockwise_in(&self, order: &[Option<AtomId>]) -> Option<bool> {
        if order.len() != self.neighbors.len() {
            return None;
        }
        let mut positions = Vec::with_capacity(order.len());
        let mut used = vec![false; self.neighbors.len()];
        for item in order {
            let position = self
                .neighbors
                .iter()
                .enumerate()
                .position(|(i, n)| !used[i] && n == item)?;
            used[position] = true;
            positions.push(position);
        }
        let mut swaps = 0;
        for i in 0..positions.len() {
            while positions[i] != i {
                let target = positions[i];
                positions.swap(i, target);
                swaps += 1;
            }
        }
        Some(if swaps % 2 == 0 {
            self.clockwise
        } else {
            !self.clockwise
        })
    }
}

/// An atom of a small-molecule graph.
///
/// Hydrogens are normally implicit and live in `hydrogen_count`. Explicit
/// hydrogen atoms only remain in a graph when they carry information, which
/// for scaffolds means the placeholder left behind at a cut point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Atom {
    /// Atomic number; `0` is the `*` attachment-point dummy.
    pub atomic_num: u8,
    /// Whether the atom was written in lowercase (aromatic) form.
    pub is_aromatic: bool,
    pub formal_charge: i8,
    /// Mass number, `0` when unspecified.
    pub isotope: u16,
    /// Number of implicit hydrogens attached to the atom.
    pub hydrogen_count: u8,
    /// Marks an explicit hydrogen standing in for a removed junction bond.
    pub is_placeholder: bool,
    pub stereo: Option<TetrahedralStereo>,
}

impl Atom {
    /// Creates a neutral, non-aromatic atom without hydrogens.
    ///
    /// # Arguments
    ///
    /// * `atomic_num` - The atomic number of the element (`0` for a dummy atom).
    pub fn new(atomic_num: u8) -> Self {
        Self {
            atomic_num,
            is_aromatic: false,
            formal_charge: 0,
            isotope: 0,
            hydrogen_count: 0,
            is_placeholder: false,
            stereo: None,
        }
    }

    /// An explicit hydrogen marking the position of a cut junction bond.
    pub fn placeholder() -> Self {
        Self {
            is_placeholder: true,
            ..Self::new(1)
        }
    }

    /// The `*` atom used to mark where a linker or side chain was attached.
    pub fn attachment_point() -> Self {
        Self::new(0)
    }

    pub fn aromatic(mut self, is_aromatic: bool) -> Self {
        self.is_aromatic = is_aromatic;
        self
    }

    pub fn with_hydrogens(mut self, hydrogen_count: u8) -> Self {
        self.hydrogen_count = hydrogen_count;
        self
    }

    pub fn is_hydrogen(&self) -> bool {
        self.atomic_num == 1
    }

    pub fn is_dummy(&self) -> bool {
        self.atomic_num == 0
    }
}

/// Chemical file formats understood by the toolkit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MoleculeFormat {
    /// A bare SMILES string.
    #[default]
    Smiles,
    /// A SMILES string optionally followed by whitespace and a molecule name,
    /// one molecule per line.
    SmilesLine,
}

impl FromStr for MoleculeFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "smi" | "smiles" => Ok(Self::Smiles),
            "smiles-line" | "smiles_line" | "can" => Ok(Self::SmilesLine),
            other => Err(format!("unsupported molecule format '{other}'")),
        }
    }
}

impl fmt::Display for MoleculeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Smiles => write!(f, "smiles"),
            Self::SmilesLine => write!(f, "smiles-line"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::KeyData;

    fn id(n: u64) -> AtomId {
        AtomId::from(KeyData::from_ffi(n))
    }

    #[test]
    fn placeholder_is_flagged_hydrogen() {
        let h = Atom::placeholder();
        assert!(h.is_hydrogen());
        assert!(h.is_placeholder);
        assert_eq!(h.hydrogen_count, 0);
    }

    #[test]
    fn attachment_point_is_dummy() {
        assert!(Atom::attachment_point().is_dummy());
    }

    #[test]
    fn clockwise_in_keeps_symbol_for_even_permutations() {
        let stereo = TetrahedralStereo {
            neighbors: vec![Some(id(1)), None, Some(id(2)), Some(id(3))],
            clockwise: false,
        };
        let rotated = [None, Some(id(2)), Some(id(1)), Some(id(3))];
        assert_eq!(stereo.clockwise_in(&rotated), Some(false));
    }

    #[test]
    fn clockwise_in_flips_symbol_for_odd_permutations() {
        let stereo = TetrahedralStereo {
            neighbors: vec![Some(id(1)), None, Some(id(2)), Some(id(3))],
            clockwise: false,
        };
        let swapped = [Some(id(2)), None, Some(id(1)), Some(id(3))];
        assert_eq!(stereo.clockwise_in(&swapped), Some(true));
    }

    #[test]
    fn clockwise_in_rejects_foreign_neighbours() {
        let stereo = TetrahedralStereo {
            neighbors: vec![Some(id(1)), Some(id(2)), Some(id(3))],
            clockwise: true,
        };
        assert_eq!(stereo.clockwise_in(&[Some(id(1)), Some(id(2))]), None);
        assert_eq!(
            stereo.clockwise_in(&[Some(id(1)), Some(id(2)), Some(id(4))]),
            None
        );
    }

    #[test]
    fn replace_updates_matching_reference() {
        let mut stereo = TetrahedralStereo {
            neighbors: vec![Some(id(1)), Some(id(2)), Some(id(3))],
            clockwise: true,
        };
        assert!(stereo.replace(Some(id(2)), Some(id(9))));
        assert_eq!(stereo.neighbors[1], Some(id(9)));
        assert!(!stereo.replace(Some(id(7)), None));
    }

    #[test]
    fn molecule_format_parses_known_names() {
        assert_eq!("smi".parse::<MoleculeFormat>(), Ok(MoleculeFormat::Smiles));
        assert_eq!(
            "smiles-line".parse::<MoleculeFormat>(),
            Ok(MoleculeFormat::SmilesLine)
        );
        assert!("sdf".parse::<MoleculeFormat>().is_err());
    }
}
