//! SMILES reading and writing.

mod reader;
mod writer;

pub use reader::parse_smiles;
pub use writer::write_smiles;
