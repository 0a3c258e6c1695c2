//! # Chemistry Toolkit
//!
//! Everything the scaffold engine needs to know about chemistry.
//!
//! - [`smiles`] - SMILES parser and writer
//! - [`canonical`] - Canonical atom ranking for order-independent keys
//! - [`rings`] - Ring membership and ring systems
//! - [`pattern`] - Two-atom bond patterns used to find junction bonds
//! - [`element`] - Element symbols and default valences
//! - [`toolkit`] - The [`toolkit::ChemToolkit`] seam and its SMILES implementation

pub mod canonical;
pub mod element;
pub mod error;
pub mod pattern;
pub mod rings;
pub mod smiles;
pub mod toolkit;
