//! # Core Module
//!
//! The chemistry foundation of the library: the molecule graph and the
//! toolkit that reads, writes and canonicalizes it.
//!
//! ## Architecture
//!
//! - **Molecular Representation** ([`models`]) - Atoms, bonds and molecule graphs
//! - **Chemistry Toolkit** ([`chem`]) - SMILES I/O, canonical ordering, ring perception
//!   and bond-pattern matching behind the [`chem::toolkit::ChemToolkit`] trait
//!
//! Everything in this layer is stateless with respect to scaffolds; the
//! decomposition itself lives in [`crate::engine`].

pub mod chem;
pub mod models;
