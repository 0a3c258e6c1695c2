use super::ids::AtomId;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(u8)]
pub enum BondOrder {
    #[default]
    Single,
    Double,
    Triple,
    Aromatic,
}

impl BondOrder {
    /// Number of valence electron pairs the bond consumes when hydrogens are
    /// computed for an atom. Aromatic bonds count as one, matching the way a
    /// lowercase SMILES atom is read back.
    pub fn valence_contribution(self) -> u8 {
        match self {
            Self::Single | Self::Aromatic => 1,
            Self::Double => 2,
            Self::Triple => 3,
        }
    }

    /// The SMILES bond symbol that must be written explicitly between two atoms,
    /// or `None` when the bond is implied by the atoms themselves.
    pub fn smiles_symbol(self, both_aromatic: bool) -> Option<char> {
        match self {
            Self::Single if both_aromatic => Some('-'),
            Self::Single | Self::Aromatic => None,
            Self::Double => Some('='),
            Self::Triple => Some('#'),
        }
    }
}

#[derive(Debug, Error)]
#[error("Invalid bond order string")]
pub struct ParseBondOrderError;

impl FromStr for BondOrder {
    type Err = ParseBondOrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "-" => Ok(Self::Single),
            "=" => Ok(Self::Double),
            "#" => Ok(Self::Triple),
            ":" => Ok(Self::Aromatic),
            _ => match s.to_lowercase().as_str() {
                "1" | "single" => Ok(Self::Single),
                "2" | "double" => Ok(Self::Double),
                "3" | "triple" => Ok(Self::Triple),
                "ar" | "aromatic" => Ok(Self::Aromatic),
                _ => Err(ParseBondOrderError),
            },
        }
    }
}

impl fmt::Display for BondOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Single => "Single",
                Self::Double => "Double",
                Self::Triple => "Triple",
                Self::Aromatic => "Aromatic",
            }
        )
    }
}

/// A bond between two atoms of a [`Molecule`](super::molecule::Molecule).
///
/// `junction` carries the sequence number assigned by the junction tagger. The
/// tag survives cloning and fragmenting, so a cut point can be traced back to
/// the bond of the input molecule it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bond {
    pub atom1_id: AtomId,
    pub atom2_id: AtomId,
    pub order: BondOrder,
    pub junction: Option<u32>,
}

impl Bond {
    pub fn new(atom1_id: AtomId, atom2_id: AtomId, order: BondOrder) -> Self {
        Self {
            atom1_id,
            atom2_id,
            order,
            junction: None,
        }
    }

    pub fn contains(&self, atom_id: AtomId) -> bool {
        self.atom1_id == atom_id || self.atom2_id == atom_id
    }

    /// Returns the partner of `atom_id` in this bond, or `None` if the atom is
    /// not one of its endpoints.
    pub fn other(&self, atom_id: AtomId) -> Option<AtomId> {
        if self.atom1_id == atom_id {
            Some(self.atom2_id)
        } else if self.atom2_id == atom_id {
            Some(self.atom1_id)
        } else {
            None
        }
    }

    pub fn is_junction(&self) -> bool {
        self.junction.is_some()
    }
}
