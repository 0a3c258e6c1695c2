//! # Workflows Module
//!
//! High-level entry points that run the scaffold engine over whole datasets.
//!
//! ## Overview
//!
//! A workflow owns the per-molecule loop: reading each record, applying the
//! size limits, decomposing against a shared cache, merging the resulting tree
//! and handing a compact report back to the caller. Molecules that cannot be
//! read or are too large are counted and skipped; only a cache failure stops
//! a run, since the cache can no longer be trusted after a failed merge.
//!
//! ## Architecture
//!
//! - **Batch Workflow** ([`batch`]) - Parse, size check, decompose, merge and report
//! - **Reports** ([`report`]) - One CSV row per input molecule

pub mod batch;
pub mod report;
