//! # Core Models Module
//!
//! Data structures for representing small molecules as graphs.
//!
//! ## Key Components
//!
//! - [`atom`] - Atoms with element, charge, hydrogen count, aromaticity and stereo
//! - [`topology`] - Bonds, bond orders and junction tags
//! - [`molecule`] - The molecule graph with connectivity, fragmenting and hydrogen handling
//! - [`ids`] - Stable identifiers for atoms, bonds and scaffold tree nodes
//!
//! ## Usage
//!
//! ```ignore
//! use hiers::core::models::{atom::Atom, molecule::Molecule, topology::BondOrder};
//!
//! let mut mol = Molecule::new();
//! let c = mol.add_atom(Atom::new(6).with_hydrogens(3));
//! let o = mol.add_atom(Atom::new(8).with_hydrogens(1));
//! mol.add_bond(c, o, BondOrder::Single);
//! ```

pub mod atom;
pub mod ids;
pub mod molecule;
pub mod topology;
