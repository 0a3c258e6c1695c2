use super::config::ScaffoldFlags;
use crate::core::chem::error::ChemError;
use crate::core::chem::toolkit::ChemToolkit;
use crate::core::models::atom::MoleculeFormat;
use crate::core::models::ids::ScaffoldId;
use crate::core::models::molecule::Molecule;

/// Whether a scaffold currently holds its structure.
///
/// A compressed scaffold keeps only its canonical key; the structure can be
/// rebuilt from the key through the chemistry toolkit at any time.
#[derive(Debug, Clone)]
pub enum ScaffoldForm {
    Expanded(Molecule),
    Compressed,
}

/// A ring-containing subgraph of an input molecule, one node of a
/// [`ScaffoldTree`](super::tree::ScaffoldTree).
#[derive(Debug, Clone)]
pub struct Scaffold {
    key: String,
    /// Cache-assigned identifier, `None` until the tree is merged.
    pub id: Option<u64>,
    pub(crate) parent: Option<ScaffoldId>,
    pub(crate) children: Vec<ScaffoldId>,
    pub(crate) form: ScaffoldForm,
    flags: ScaffoldFlags,
}

impl Scaffold {
    pub(crate) fn new(key: String, form: ScaffoldForm, flags: ScaffoldFlags) -> Self {
        Self {
            key,
            id: None,
            parent: None,
            children: Vec::new(),
            form,
            flags,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn parent(&self) -> Option<ScaffoldId> {
        self.parent
    }

    /// Child nodes, unique by canonical key, in discovery order.
    pub fn children(&self) -> &[ScaffoldId] {
        &self.children
    }

    pub fn flags(&self) -> ScaffoldFlags {
        self.flags
    }

    pub fn form(&self) -> &ScaffoldForm {
        &self.form
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self.form, ScaffoldForm::Compressed)
    }

    /// The structure, if the scaffold is expanded.
    pub fn molecule(&self) -> Option<&Molecule> {
        match &self.form {
            ScaffoldForm::Expanded(mol) => Some(mol),
            ScaffoldForm::Compressed => None,
        }
    }

    /// Returns the structure, rebuilding it from the key when compressed.
    /// The scaffold itself is left as it is.
    pub fn materialize(&self, toolkit: &dyn ChemToolkit) -> Result<Molecule, ChemError> {
        match &self.form {
            ScaffoldForm::Expanded(mol) => Ok(mol.clone()),
            ScaffoldForm::Compressed => Ok(toolkit.read_molecule(&self.key, MoleculeFormat::Smiles)?.molecule),
        }
    }

    /// Drops the structure and keeps the key.
    pub fn compress(&mut self) {
        self.form = ScaffoldForm::Compressed;
    }

    /// Rebuilds the structure from the key if the scaffold is compressed.
    pub fn decompress(&mut self, toolkit: &dyn ChemToolkit) -> Result<(), ChemError> {
        if self.is_compressed() {
            let mol = self.materialize(toolkit)?;
            self.form = ScaffoldForm::Expanded(mol);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FragmentKind {
    Linker,
    Sidechain,
}

/// An acyclic piece of a molecule found during decomposition. Attachment
/// points are written as `*` in the key. Ids are ordinal within one tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub key: String,
    pub id: u64,
    pub kind: FragmentKind,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::chem::toolkit::SmilesToolkit;

    #[test]
    fn compress_then_decompress_restores_an_equivalent_structure() {
        let toolkit = SmilesToolkit;
        let mol = toolkit.read_molecule("[H]c1ccncc1", MoleculeFormat::Smiles).unwrap().molecule;
        let key = toolkit.canonical_key(&mol, false).unwrap();
        let mut scaffold = Scaffold::new(key.clone(), ScaffoldForm::Expanded(mol), ScaffoldFlags::default());

        scaffold.compress();
        assert!(scaffold.is_compressed());
        assert!(scaffold.molecule().is_none());

        scaffold.decompress(&toolkit).unwrap();
        let rebuilt = scaffold.molecule().unwrap();
        assert_eq!(toolkit.canonical_key(rebuilt, false).unwrap(), key);
        assert_eq!(scaffold.key(), key);
    }

    #[test]
    fn materialize_leaves_compressed_scaffold_untouched() {
        let toolkit = SmilesToolkit;
        let scaffold = Scaffold::new("C1CCCCC1".to_string(), ScaffoldForm::Compressed, ScaffoldFlags::default());
        let mol = scaffold.materialize(&toolkit).unwrap();
        assert_eq!(mol.atom_count(), 6);
        assert!(scaffold.is_compressed());
    }
}
