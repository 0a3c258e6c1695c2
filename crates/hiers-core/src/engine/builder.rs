use super::config::ScaffoldFlags;
use crate::core::chem::error::ChemError;
use crate::core::chem::pattern::AtomQuery;
use crate::core::chem::toolkit::ChemToolkit;
use crate::core::models::atom::{Atom, MoleculeFormat};
use crate::core::models::ids::AtomId;
use crate::core::models::molecule::Molecule;
use crate::core::models::topology::BondOrder;
use std::collections::{BTreeMap, HashSet, VecDeque};
use tracing::trace;

/// A scaffold produced from one fragment.
#[derive(Debug, Clone)]
pub struct BuiltScaffold {
    /// The stripped structure. Atom ids are those of the fragment it was built
    /// from, apart from newly added hydrogen placeholders.
    pub molecule: Molecule,
    pub key: String,
    /// Fragment atoms removed while stripping, in removal order.
    pub stripped: Vec<AtomId>,
    pub legal: bool,
}

#[derive(Debug, Clone)]
pub enum BuildOutcome {
    /// The fragment has no ring, so it has no scaffold at all.
    NoRings,
    Built(BuiltScaffold),
}

impl BuildOutcome {
    /// The scaffold, if it exists and may appear in a tree.
    pub fn into_legal(self) -> Option<BuiltScaffold> {
        match self {
            Self::Built(built) if built.legal => Some(built),
            _ => None,
        }
    }
}

/// Reduces fragments to their ring-containing core.
pub struct ScaffoldBuilder<'a> {
    toolkit: &'a dyn ChemToolkit,
    flags: ScaffoldFlags,
    benzene_keys: [String; 2],
}

impl<'a> ScaffoldBuilder<'a> {
    pub fn new(toolkit: &'a dyn ChemToolkit, flags: ScaffoldFlags) -> Result<Self, ChemError> {
        let benzene_key = |smiles: &str| -> Result<String, ChemError> {
            let mol = toolkit.read_molecule(smiles, MoleculeFormat::Smiles)?.molecule;
            toolkit.canonical_key(&mol, false)
        };
        Ok(Self {
            toolkit,
            flags,
            benzene_keys: [benzene_key("c1ccccc1")?, benzene_key("C1=CC=CC=C1")?],
        })
    }

    pub fn flags(&self) -> ScaffoldFlags {
        self.flags
    }

    /// Atoms that belong to the scaffold proper: ring atoms and, when
    /// nitrogen attachments are kept, acyclic nitrogens bonded to a ring.
    pub fn core_atoms(&self, mol: &Molecule) -> HashSet<AtomId> {
        let rings = self.toolkit.perceive_rings(mol);
        let attached_n = AtomQuery::RingAttachedNitrogen;
        mol.atom_ids()
            .into_iter()
            .filter(|&id| {
                rings.is_ring_atom(id)
                    || (self.flags.keep_nitro_attachments && attached_n.matches(mol, &rings, id))
            })
            .collect()
    }

    /// Builds the scaffold of `fragment`.
    ///
    /// Acyclic atoms are peeled off from the ends inwards. A path that started
    /// at a hydrogen placeholder (a previous cut) is not simply dropped: its
    /// cut mark moves along the path, and every surviving atom, ring atom or
    /// linker atom alike, gets one placeholder per removed neighbour that
    /// carried a mark. The scaffold thus keeps a record of the cut.
    ///
    /// # Errors
    ///
    /// Returns an error if the toolkit cannot canonicalize the result.
    pub fn build(&self, fragment: &Molecule) -> Result<BuildOutcome, ChemError> {
        if !self.toolkit.perceive_rings(fragment).has_rings() {
            return Ok(BuildOutcome::NoRings);
        }

        let core = self.core_atoms(fragment);
        let mut mol = fragment.clone();
        let mut pending: BTreeMap<AtomId, Vec<CutMark>> = BTreeMap::new();
        let mut stripped = Vec::new();
        let mut queue: VecDeque<AtomId> = mol.atom_ids().into_iter().collect();

        while let Some(id) = queue.pop_front() {
            let Some(atom) = mol.atom(id) else { continue };
            if core.contains(&id) || mol.degree(id) > 1 {
                continue;
            }
            let neighbor = mol.neighbors(id).next();
            if atom.is_placeholder && neighbor.is_some_and(|n| core.contains(&n)) {
                continue;
            }
            let carried = pending.remove(&id).is_some() || atom.is_placeholder;

            if let Some(neighbor) = neighbor {
                let bond = mol.bond_between(id, neighbor).and_then(|b| mol.bond(b)).cloned();
                let (order, junction) = bond
                    .map(|b| (b.order.valence_contribution(), b.junction))
                    .unwrap_or((1, None));
                if let Some(atom) = mol.atom_mut(neighbor) {
                    atom.hydrogen_count = atom.hydrogen_count.saturating_add(order);
                }
                if carried {
                    pending
                        .entry(neighbor)
                        .or_default()
                        .push(CutMark { junction, removed: id });
                }
                queue.push_back(neighbor);
            }

            mol.remove_atom(id);
            if fragment.atom(id).is_some() {
                stripped.push(id);
            }
        }

        for (bearer, marks) in pending {
            for mark in marks {
                reattach_placeholder(&mut mol, bearer, mark);
            }
        }

        let key = self.toolkit.canonical_key(&mol, self.flags.stereo)?;
        let legal = self.is_legal(&mol)?;
        Ok(BuildOutcome::Built(BuiltScaffold {
            molecule: mol,
            key,
            stripped,
            legal,
        }))
    }

    /// A scaffold is legal unless it is empty or plain benzene. Placeholders
    /// do not count, so a benzene ring left over from a cut is rejected too.
    pub fn is_legal(&self, scaffold: &Molecule) -> Result<bool, ChemError> {
        if scaffold.heavy_atom_count() == 0 {
            return Ok(false);
        }
        let mut bare = scaffold.clone();
        bare.fold_hydrogens(true);
        let key = self.toolkit.canonical_key(&bare, false)?;
        Ok(!self.benzene_keys.contains(&key))
    }
}

/// A cut carried along a stripped path: the junction tag of the last bond
/// crossed and the atom that bond led to.
#[derive(Debug, Clone, Copy)]
struct CutMark {
    junction: Option<u32>,
    removed: AtomId,
}

fn reattach_placeholder(mol: &mut Molecule, bearer: AtomId, mark: CutMark) {
    let Some(atom) = mol.atom_mut(bearer) else { return };
    atom.hydrogen_count = atom.hydrogen_count.saturating_sub(1);
    let placeholder = mol.add_atom(Atom::placeholder());
    if let Some(bond) = mol.add_bond(bearer, placeholder, BondOrder::Single) {
        if let Some(b) = mol.bond_mut(bond) {
            b.junction = mark.junction;
        }
    }
    if let Some(stereo) = mol.atom_mut(bearer).and_then(|a| a.stereo.as_mut()) {
        stereo.replace(Some(mark.removed), Some(placeholder));
    }
    trace!(?bearer, junction = ?mark.junction, "Re-attached placeholder");
}
