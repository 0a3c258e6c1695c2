use crate::cache::{CacheError, ScaffoldCache};
use crate::core::chem::toolkit::ChemToolkit;
use crate::engine::config::{BatchConfig, SizeViolation};
use crate::engine::decomposer::Decomposer;
use crate::engine::error::DecompositionError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::tree::ScaffoldTree;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Scaffold cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Decomposition error: {0}")]
    Decomposition(#[from] DecompositionError),
}

/// Everything a batch run works against.
#[derive(Clone, Copy)]
pub struct BatchContext<'a> {
    pub toolkit: &'a dyn ChemToolkit,
    pub cache: &'a dyn ScaffoldCache,
    pub config: &'a BatchConfig,
}

/// The outcome of one input molecule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoleculeReport {
    /// 1-based position of the record in the input.
    pub index: usize,
    pub name: Option<String>,
    /// Canonical SMILES of the input molecule.
    pub smiles: String,
    pub root_id: Option<u64>,
    pub tree_string: Option<String>,
    pub summary: Option<String>,
    pub scaffold_count: usize,
    pub linker_count: usize,
    pub sidechain_count: usize,
}

impl MoleculeReport {
    fn from_tree(index: usize, name: Option<String>, smiles: String, tree: &ScaffoldTree) -> Self {
        let root_id = tree.root_scaffold().and_then(|s| s.id);
        Self {
            index,
            name,
            smiles,
            root_id,
            tree_string: tree.root().and_then(|root| tree.tree_string(root)),
            summary: tree.summary(),
            scaffold_count: tree.scaffolds().len(),
            linker_count: tree.linkers().len(),
            sidechain_count: tree.sidechains().len(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    /// Molecules that were decomposed, with or without a legal scaffold.
    pub processed: usize,
    pub parse_errors: usize,
    pub size_skipped: usize,
    /// Decomposed molecules without a legal root scaffold.
    pub illegal: usize,
    /// Molecules whose decomposition failed outright.
    pub failed: usize,
    pub new_scaffolds: usize,
}

impl BatchStats {
    pub fn skipped(&self) -> usize {
        self.parse_errors + self.size_skipped + self.failed
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub reports: Vec<MoleculeReport>,
    pub stats: BatchStats,
}

/// Decomposes every record of `inputs` and merges the trees into the cache.
///
/// Blank lines are ignored and do not take up an index. A record that cannot
/// be read, exceeds the size limits or fails to decompose is counted and
/// skipped.
///
/// # Errors
///
/// Returns an error only for cache failures, which end the run.
#[instrument(skip_all, name = "batch_workflow")]
pub fn run(
    inputs: &[String],
    context: &BatchContext,
    reporter: &ProgressReporter,
) -> Result<BatchResult, BatchError> {
    // === Phase 0: Preparation ===
    let decomposer = reporter.phase("Preparation", || {
        info!(
            backend = context.cache.backend_name(),
            records = inputs.len(),
            "Preparing batch decomposition."
        );
        Decomposer::new(context.toolkit, context.config.options).map(|d| d.with_cache(context.cache))
    })?;

    // === Phase 1: Decomposition ===
    let mut result = BatchResult::default();
    reporter.report(Progress::PhaseStart {
        name: "Decomposition",
    });
    reporter.report(Progress::TaskStart {
        total_steps: inputs.len() as u64,
    });

    let outcome = decompose_all(inputs, context, &decomposer, reporter, &mut result);

    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);
    outcome?;

    // === Phase 2: Finalization ===
    reporter.phase("Finalization", || context.cache.flush())?;

    let stats = result.stats;
    info!(
        processed = stats.processed,
        parse_errors = stats.parse_errors,
        size_skipped = stats.size_skipped,
        illegal = stats.illegal,
        failed = stats.failed,
        new_scaffolds = stats.new_scaffolds,
        "Batch decomposition finished."
    );
    Ok(result)
}

fn decompose_all(
    inputs: &[String],
    context: &BatchContext,
    decomposer: &Decomposer,
    reporter: &ProgressReporter,
    result: &mut BatchResult,
) -> Result<(), BatchError> {
    let mut index = 0;
    for line in inputs {
        reporter.report(Progress::TaskIncrement);
        if line.trim().is_empty() {
            continue;
        }
        index += 1;

        if let Some(report) = process_record(index, line, context, decomposer, &mut result.stats)? {
            result.reports.push(report);
            let processed = result.stats.processed;
            if context.config.reindex_every.is_some_and(|every| processed % every.get() == 0) {
                context.cache.maintain()?;
            }
        }

        let stats = result.stats;
        reporter.report(Progress::Status {
            processed: stats.processed,
            skipped: stats.skipped(),
            new_scaffolds: stats.new_scaffolds,
        });
    }
    Ok(())
}

fn process_record(
    index: usize,
    line: &str,
    context: &BatchContext,
    decomposer: &Decomposer,
    stats: &mut BatchStats,
) -> Result<Option<MoleculeReport>, BatchError> {
    let toolkit = context.toolkit;
    let config = context.config;

    let named = match toolkit.read_molecule(line, config.format) {
        Ok(named) => named,
        Err(e) => {
            warn!(index, error = %e, "Skipping unreadable record.");
            stats.parse_errors += 1;
            return Ok(None);
        }
    };
    let molecule = named.molecule;

    let rings = toolkit.perceive_rings(&molecule);
    if let Err(violation) = config
        .limits
        .check(molecule.heavy_atom_count(), rings.ring_system_count())
    {
        match violation {
            SizeViolation::Atoms { found, limit } => {
                warn!(index, found, limit, "Skipping molecule with too many heavy atoms.");
            }
            SizeViolation::RingSystems { found, limit } => {
                warn!(index, found, limit, "Skipping molecule with too many ring systems.");
            }
        }
        stats.size_skipped += 1;
        return Ok(None);
    }

    let mut tree = match decomposer.decompose(&molecule) {
        Ok(tree) => tree,
        Err(DecompositionError::Cache { source }) => return Err(BatchError::Cache(source)),
        Err(e) => {
            warn!(index, error = %e, "Decomposition failed.");
            stats.failed += 1;
            return Ok(None);
        }
    };

    let inserted = context.cache.merge_tree(&mut tree)?;
    stats.processed += 1;
    stats.new_scaffolds += inserted;
    if tree.root().is_none() {
        stats.illegal += 1;
    }

    let smiles = toolkit
        .canonical_key(&molecule, config.options.flags.stereo)
        .unwrap_or_else(|_| record_smiles(line).to_string());
    let report = MoleculeReport::from_tree(index, named.name, smiles, &tree);
    debug!(
        index,
        root = ?report.root_id,
        scaffolds = report.scaffold_count,
        inserted,
        "Molecule decomposed."
    );
    Ok(Some(report))
}

fn record_smiles(line: &str) -> &str {
    line.split_whitespace().next().unwrap_or_default()
}
