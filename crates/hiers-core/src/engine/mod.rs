//! # Engine Module
//!
//! This module implements the HierS scaffold decomposition: it turns one
//! molecule into a hierarchy of ring-containing scaffolds, together with the
//! linkers and side chains found on the way.
//!
//! ## Overview
//!
//! Decomposition starts by tagging the junction bonds of the input, the
//! acyclic bonds where a ring system meets anything else. The root scaffold
//! is the molecule with every side chain stripped. Each junction bond of a
//! scaffold is then cut in turn; both halves are reduced to their own
//! scaffolds, and every scaffold not seen before is decomposed the same way.
//!
//! ## Architecture
//!
//! - **Junction Tagging** ([`junction`]) - Ordered bond patterns and stable sequence numbers
//! - **Scaffold Building** ([`builder`]) - Side-chain stripping, placeholder bookkeeping and legality
//! - **Decomposition** ([`decomposer`]) - The recursive cut-and-resolve driver, optionally backed by a cache
//! - **Data Model** ([`scaffold`], [`tree`]) - Scaffold nodes in an arena, tree strings and summaries
//! - **Configuration** ([`config`]) - Scaffold flags, size limits and the batch configuration builder
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress events
//! - **Error Handling** ([`error`]) - Decomposition errors and their fatality

pub mod builder;
pub mod config;
pub mod decomposer;
pub mod error;
pub mod junction;
pub mod progress;
pub mod scaffold;
pub mod tree;
