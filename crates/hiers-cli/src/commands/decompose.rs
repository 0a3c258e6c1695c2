use crate::cli::DecomposeArgs;
use crate::config::PartialHiersConfig;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use hiers::cache::{self, ScaffoldCache};
use hiers::core::chem::toolkit::SmilesToolkit;
use hiers::engine::progress::ProgressReporter;
use hiers::workflows::batch::{self, BatchContext};
use hiers::workflows::report::ReportWriter;
use tracing::{info, warn};

pub fn run(args: DecomposeArgs, show_progress: bool) -> Result<()> {
    let partial_config = match &args.config {
        Some(path) => PartialHiersConfig::from_file(path)?,
        None => PartialHiersConfig::default(),
    };
    info!("Merging configuration from file and CLI arguments...");
    let config = partial_config.merge_with_cli(&args)?;

    info!("Reading molecules from {:?}", &config.input_path);
    let content = std::fs::read_to_string(&config.input_path).map_err(|e| CliError::FileParsing {
        path: config.input_path.clone(),
        source: e.into(),
    })?;
    let inputs: Vec<String> = content.lines().map(str::to_string).collect();

    info!(backend = %config.backend, "Opening scaffold cache...");
    let cache = cache::open(config.backend, config.cache_path.as_deref())?;
    let toolkit = SmilesToolkit::new();
    let context = BatchContext {
        toolkit: &toolkit,
        cache: cache.as_ref(),
        config: &config.batch,
    };

    let progress_handler = CliProgressHandler::new(show_progress);
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    eprintln!("Decomposing {} record(s)...", inputs.len());
    let result = batch::run(&inputs, &context, &reporter)?;

    let stats = result.stats;
    if stats.skipped() > 0 {
        warn!(
            "{} record(s) were skipped: {} unreadable, {} too large, {} failed.",
            stats.skipped(),
            stats.parse_errors,
            stats.size_skipped,
            stats.failed
        );
    }

    match &config.output_path {
        Some(path) => {
            let mut writer = ReportWriter::create(path)?;
            writer.write_all(&result.reports)?;
            writer.finish()?;
            eprintln!("✓ Report with {} row(s) written to: {}", result.reports.len(), path.display());
        }
        None => {
            let mut writer = ReportWriter::new(std::io::stdout().lock());
            writer.write_all(&result.reports)?;
            writer.finish()?;
        }
    }

    eprintln!(
        "{} molecule(s) decomposed, {} without a scaffold, {} new scaffold(s); cache holds {}.",
        stats.processed,
        stats.illegal,
        stats.new_scaffolds,
        cache.len()?
    );
    Ok(())
}
