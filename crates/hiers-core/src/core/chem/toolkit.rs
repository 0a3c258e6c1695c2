use super::canonical::canonical_ranks;
use super::error::ChemError;
use super::pattern::{BondMatch, BondPattern};
use super::rings::RingInfo;
use super::smiles::{parse_smiles, write_smiles};
use crate::core::models::atom::MoleculeFormat;
use crate::core::models::molecule::Molecule;
use slotmap::SecondaryMap;

/// A molecule read from text, with the name that accompanied it if any.
#[derive(Debug, Clone)]
pub struct NamedMolecule {
    pub molecule: Molecule,
    pub name: Option<String>,
}

/// The chemistry operations the decomposition engine relies on.
///
/// The engine never touches SMILES text directly; everything goes through
/// this trait so that another toolkit can be substituted.
pub trait ChemToolkit: Send + Sync {
    /// Reads one molecule from `text`.
    fn read_molecule(&self, text: &str, format: MoleculeFormat) -> Result<NamedMolecule, ChemError>;

    /// Writes a molecule in the given format (atoms in storage order).
    fn write_molecule(&self, mol: &Molecule, format: MoleculeFormat) -> Result<String, ChemError>;

    /// Canonical text of a molecule; equal for isomorphic molecules and
    /// distinct otherwise. Placeholder hydrogens are written as `[H]` atoms.
    fn canonical_key(&self, mol: &Molecule, stereo: bool) -> Result<String, ChemError>;

    fn perceive_rings(&self, mol: &Molecule) -> RingInfo;

    fn match_bonds(&self, mol: &Molecule, rings: &RingInfo, pattern: &BondPattern) -> Vec<BondMatch> {
        pattern.find_matches(mol, rings)
    }
}

/// The built-in toolkit working on SMILES.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmilesToolkit;

impl SmilesToolkit {
    pub fn new() -> Self {
        Self
    }
}

impl ChemToolkit for SmilesToolkit {
    fn read_molecule(&self, text: &str, format: MoleculeFormat) -> Result<NamedMolecule, ChemError> {
        match format {
            MoleculeFormat::Smiles => Ok(NamedMolecule {
                molecule: parse_smiles(text)?,
                name: None,
            }),
            MoleculeFormat::SmilesLine => {
                let line = text.trim();
                let (smiles, name) = match line.split_once(char::is_whitespace) {
                    Some((smiles, rest)) => {
                        let name = rest.trim();
                        (smiles, (!name.is_empty()).then(|| name.to_string()))
                    }
                    None => (line, None),
                };
                Ok(NamedMolecule {
                    molecule: parse_smiles(smiles)?,
                    name,
                })
            }
        }
    }

    fn write_molecule(&self, mol: &Molecule, format: MoleculeFormat) -> Result<String, ChemError> {
        let mut ranks = SecondaryMap::with_capacity(mol.atom_count());
        for (i, id) in mol.atom_ids().into_iter().enumerate() {
            ranks.insert(id, i);
        }
        match format {
            MoleculeFormat::Smiles | MoleculeFormat::SmilesLine => write_smiles(mol, &ranks, true),
        }
    }

    fn canonical_key(&self, mol: &Molecule, stereo: bool) -> Result<String, ChemError> {
        let ranks = canonical_ranks(mol, stereo);
        write_smiles(mol, &ranks, stereo)
    }

    fn perceive_rings(&self, mol: &Molecule) -> RingInfo {
        RingInfo::perceive(mol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(smiles: &str) -> String {
        let toolkit = SmilesToolkit::new();
        let mol = toolkit.read_molecule(smiles, MoleculeFormat::Smiles).unwrap().molecule;
        toolkit.canonical_key(&mol, true).unwrap()
    }

    #[test]
    fn canonical_key_ignores_atom_order() {
        assert_eq!(key("OCC"), key("CCO"));
        assert_eq!(key("c1ccncc1"), key("n1ccccc1"));
        assert_eq!(key("c1ccc2ncccc2c1"), key("c1ccc2c(c1)cccn2"));
        assert_eq!(key("Cc1ccccc1"), key("c1ccccc1C"));
    }

    #[test]
    fn canonical_key_distinguishes_isomers() {
        assert_ne!(key("CCO"), key("COC"));
        assert_ne!(key("Cc1ccncc1"), key("Cc1cccnc1"));
    }

    #[test]
    fn canonical_key_is_a_fixed_point() {
        for smiles in ["c1ccc(Cc2ccncc2)cc1", "[H]c1ccncc1", "O=C1CCCN1c1ccccc1", "C1CC2CCC1C2"] {
            let first = key(smiles);
            assert_eq!(key(&first), first, "input {smiles}");
        }
    }

    #[test]
    fn benzene_keys_are_stable() {
        assert_eq!(key("c1ccccc1"), "c1ccccc1");
        assert_eq!(key("c1ccccc1[H]"), "[H]c1ccccc1");
    }

    #[test]
    fn stereo_keys_distinguish_enantiomers_only_when_requested() {
        let toolkit = SmilesToolkit::new();
        let read = |s: &str| toolkit.read_molecule(s, MoleculeFormat::Smiles).unwrap().molecule;
        let r = read("F[C@H](Cl)Br");
        let s = read("F[C@@H](Cl)Br");
        let r_again = read("Cl[C@@H](F)Br");
        assert_ne!(toolkit.canonical_key(&r, true).unwrap(), toolkit.canonical_key(&s, true).unwrap());
        assert_eq!(toolkit.canonical_key(&r, true).unwrap(), toolkit.canonical_key(&r_again, true).unwrap());
        assert_eq!(toolkit.canonical_key(&r, false).unwrap(), toolkit.canonical_key(&s, false).unwrap());
    }

    #[test]
    fn smiles_line_format_reads_the_name() {
        let toolkit = SmilesToolkit::new();
        let named = toolkit
            .read_molecule("c1ccccc1CC  toluene-like 1", MoleculeFormat::SmilesLine)
            .unwrap();
        assert_eq!(named.name.as_deref(), Some("toluene-like 1"));
        assert_eq!(named.molecule.atom_count(), 8);
        let bare = toolkit.read_molecule("CCO", MoleculeFormat::SmilesLine).unwrap();
        assert!(bare.name.is_none());
    }

    #[test]
    fn write_molecule_keeps_storage_order() {
        let toolkit = SmilesToolkit::new();
        let mol = toolkit.read_molecule("OCC", MoleculeFormat::Smiles).unwrap().molecule;
        assert_eq!(toolkit.write_molecule(&mol, MoleculeFormat::Smiles).unwrap(), "OCC");
    }
}
