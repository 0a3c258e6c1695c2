//! # HierS Scaffold Library
//!
//! Hierarchical scaffold decomposition of small molecules, with a scaffold
//! cache that gives every distinct scaffold one stable id across a whole
//! dataset, a resumed run, or several cooperating processes.
//!
//! ## Architectural Philosophy
//!
//! The library is layered so that each layer depends only on the ones below it.
//!
//! - **[`core`]: The Foundation.** The molecule graph and a chemistry toolkit
//!   that reads and writes SMILES, perceives rings, matches bond patterns and
//!   produces canonical keys.
//!
//! - **[`engine`]: The Logic Core.** Junction tagging, scaffold building and
//!   the recursive decomposition that produces a [`engine::tree::ScaffoldTree`]
//!   for one molecule.
//!
//! - **[`cache`]: Memoization.** The [`cache::ScaffoldCache`] contract with
//!   in-memory, embedded key-value and SQLite backends. Merging a tree into a
//!   cache is what assigns scaffold ids.
//!
//! - **[`workflows`]: The Public API.** Batch processing of whole input files,
//!   tying the layers together with size limits, error counting, progress
//!   reporting and CSV reports.

pub mod cache;
pub mod core;
pub mod engine;
pub mod workflows;
