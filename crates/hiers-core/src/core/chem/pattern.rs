use super::rings::RingInfo;
use crate::core::models::ids::{AtomId, BondId};
use crate::core::models::molecule::Molecule;
use crate::core::models::topology::BondOrder;
use std::fmt;

/// A predicate over a single atom in the context of its molecule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtomQuery {
    Any,
    /// Member of at least one ring.
    Ring,
    /// Not a member of any ring.
    NonRing,
    Element(u8),
    /// Acyclic nitrogen bonded directly to a ring atom.
    RingAttachedNitrogen,
    Not(Box<AtomQuery>),
    And(Vec<AtomQuery>),
}

impl AtomQuery {
    pub fn matches(&self, mol: &Molecule, rings: &RingInfo, atom: AtomId) -> bool {
        match self {
            Self::Any => true,
            Self::Ring => rings.is_ring_atom(atom),
            Self::NonRing => !rings.is_ring_atom(atom),
            Self::Element(n) => mol.atom(atom).is_some_and(|a| a.atomic_num == *n),
            Self::RingAttachedNitrogen => {
                mol.atom(atom).is_some_and(|a| a.atomic_num == 7)
                    && !rings.is_ring_atom(atom)
                    && mol.neighbors(atom).any(|n| rings.is_ring_atom(n))
            }
            Self::Not(inner) => !inner.matches(mol, rings, atom),
            Self::And(all) => all.iter().all(|q| q.matches(mol, rings, atom)),
        }
    }

    pub fn not(self) -> Self {
        Self::Not(Box::new(self))
    }

    pub fn and(self, other: AtomQuery) -> Self {
        match self {
            Self::And(mut all) => {
                all.push(other);
                Self::And(all)
            }
            first => Self::And(vec![first, other]),
        }
    }
}

impl fmt::Display for AtomQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "*"),
            Self::Ring => write!(f, "R"),
            Self::NonRing => write!(f, "!R"),
            Self::Element(n) => write!(f, "#{n}"),
            Self::RingAttachedNitrogen => write!(f, "N(R)"),
            Self::Not(inner) => write!(f, "!{inner}"),
            Self::And(all) => {
                for (i, q) in all.iter().enumerate() {
                    if i > 0 {
                        write!(f, "&")?;
                    }
                    write!(f, "{q}")?;
                }
                Ok(())
            }
        }
    }
}

/// Whether a bond must, may, or must not lie in a ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RingConstraint {
    #[default]
    Either,
    InRing,
    NotInRing,
}

/// A two-atom pattern `left ~ right` matched against bonds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BondPattern {
    pub name: &'static str,
    pub left: AtomQuery,
    pub right: AtomQuery,
    pub ring: RingConstraint,
    pub order: Option<BondOrder>,
}

/// One bond matched by a [`BondPattern`]; `atoms` follows the pattern's
/// left/right orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BondMatch {
    pub bond: BondId,
    pub atoms: [AtomId; 2],
}

impl BondPattern {
    pub fn new(name: &'static str, left: AtomQuery, right: AtomQuery) -> Self {
        Self {
            name,
            left,
            right,
            ring: RingConstraint::Either,
            order: None,
        }
    }

    pub fn acyclic(mut self) -> Self {
        self.ring = RingConstraint::NotInRing;
        self
    }

    /// Lists all bonds matching the pattern, in bond storage order.
    pub fn find_matches(&self, mol: &Molecule, rings: &RingInfo) -> Vec<BondMatch> {
        let mut found = Vec::new();
        for (bond_id, bond) in mol.bonds_iter() {
            let ring_ok = match self.ring {
                RingConstraint::Either => true,
                RingConstraint::InRing => rings.is_ring_bond(bond_id),
                RingConstraint::NotInRing => !rings.is_ring_bond(bond_id),
            };
            if !ring_ok || self.order.is_some_and(|o| o != bond.order) {
                continue;
            }
            for (a, b) in [(bond.atom1_id, bond.atom2_id), (bond.atom2_id, bond.atom1_id)] {
                if self.left.matches(mol, rings, a) && self.right.matches(mol, rings, b) {
                    found.push(BondMatch {
                        bond: bond_id,
                        atoms: [a, b],
                    });
                    break;
                }
            }
        }
        found
    }
}

impl fmt::Display for BondPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bond = match self.ring {
            RingConstraint::Either => "~",
            RingConstraint::InRing => "@",
            RingConstraint::NotInRing => "!@",
        };
        write!(f, "[{}]{}[{}]", self.left, bond, self.right)
    }
}
