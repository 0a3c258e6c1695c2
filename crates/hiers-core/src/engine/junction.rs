use crate::core::chem::pattern::{AtomQuery, BondPattern};
use crate::core::chem::toolkit::ChemToolkit;
use crate::core::models::ids::BondId;
use crate::core::models::molecule::Molecule;
use tracing::trace;

/// A bond tagged as a junction, with the sequence number it received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JunctionBond {
    pub bond: BondId,
    pub sequence: u32,
    pub pattern: &'static str,
}

/// Marks the acyclic bonds where a ring system meets the rest of a molecule.
///
/// Patterns are applied in a fixed order and the first pattern to match a
/// bond wins, so a molecule is always tagged the same way.
#[derive(Debug, Clone)]
pub struct JunctionTagger {
    patterns: Vec<BondPattern>,
}

impl JunctionTagger {
    pub fn new(keep_nitro_attachments: bool) -> Self {
        let patterns = if keep_nitro_attachments {
            let attached_n = AtomQuery::RingAttachedNitrogen;
            let outside = AtomQuery::NonRing.and(AtomQuery::RingAttachedNitrogen.not());
            vec![
                BondPattern::new("scaffold-scaffold", AtomQuery::Ring, AtomQuery::Ring).acyclic(),
                BondPattern::new("nitrogen-nitrogen", attached_n.clone(), attached_n.clone()).acyclic(),
                BondPattern::new("scaffold-nonscaffold", AtomQuery::Ring, outside.clone()).acyclic(),
                BondPattern::new("nitrogen-nonscaffold", attached_n, outside).acyclic(),
            ]
        } else {
            vec![
                BondPattern::new("scaffold-scaffold", AtomQuery::Ring, AtomQuery::Ring).acyclic(),
                BondPattern::new("scaffold-nonscaffold", AtomQuery::Ring, AtomQuery::NonRing).acyclic(),
            ]
        };
        Self { patterns }
    }

    pub fn patterns(&self) -> &[BondPattern] {
        &self.patterns
    }

    /// Tags every junction bond of `mol` that is not tagged yet.
    ///
    /// Numbering continues after the highest tag already present, starting at
    /// 1 for an untagged molecule.
    ///
    /// # Return
    ///
    /// The newly tagged bonds in sequence order.
    pub fn tag(&self, toolkit: &dyn ChemToolkit, mol: &mut Molecule) -> Vec<JunctionBond> {
        let rings = toolkit.perceive_rings(mol);
        let mut next = mol
            .bonds_iter()
            .filter_map(|(_, b)| b.junction)
            .max()
            .unwrap_or(0)
            + 1;

        let mut tagged = Vec::new();
        for pattern in &self.patterns {
            for found in toolkit.match_bonds(mol, &rings, pattern) {
                let Some(bond) = mol.bond_mut(found.bond) else { continue };
                if bond.junction.is_some() {
                    continue;
                }
                bond.junction = Some(next);
                trace!(sequence = next, pattern = pattern.name, "Tagged junction bond");
                tagged.push(JunctionBond {
                    bond: found.bond,
                    sequence: next,
                    pattern: pattern.name,
                });
                next += 1;
            }
        }
        tagged
    }
}
