use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChemError {
    #[error("Empty molecule string")]
    Empty,
    #[error("Unexpected character '{ch}' at position {pos}")]
    UnexpectedCharacter { ch: char, pos: usize },
    #[error("Unknown element '{symbol}' at position {pos}")]
    UnknownElement { symbol: String, pos: usize },
    #[error("Unterminated bracket atom starting at position {pos}")]
    UnclosedBracket { pos: usize },
    #[error("Unbalanced branch parenthesis at position {pos}")]
    UnbalancedBranch { pos: usize },
    #[error("Empty component at position {pos}")]
    EmptyComponent { pos: usize },
    #[error("Bond symbol at position {pos} is not followed by an atom")]
    DanglingBond { pos: usize },
    #[error("Ring closure {label} was opened but never closed")]
    UnclosedRing { label: u16 },
    #[error("Ring closure {label} has conflicting bond orders")]
    ConflictingRingBond { label: u16 },
    #[error("Ring closure {label} duplicates an existing bond")]
    DuplicateRingBond { label: u16 },
    #[error("Aromatic form is not allowed for element '{symbol}'")]
    InvalidAromaticElement { symbol: String },
    #[error("Cannot write a molecule needing more than 99 simultaneous ring closures")]
    TooManyRingClosures,
    #[error("Atom with atomic number {0} has no element symbol")]
    UnknownAtomicNumber(u8),
    #[error("Unsupported molecule format: {0}")]
    UnsupportedFormat(String),
}
