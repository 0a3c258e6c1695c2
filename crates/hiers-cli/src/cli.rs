use clap::{Args, Parser, Subcommand};
use hiers::cache::CacheBackend;
use hiers::core::models::atom::MoleculeFormat;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "HierS CLI - Hierarchical scaffold decomposition of small molecules with a persistent scaffold cache.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Decompose every molecule of an input file into its scaffold hierarchy.
    Decompose(DecomposeArgs),
    /// Show stored scaffolds of a persistent cache by id.
    Lookup(LookupArgs),
}

/// Arguments for the `decompose` subcommand.
#[derive(Args, Debug)]
pub struct DecomposeArgs {
    // --- Core Arguments ---
    /// Input file with one molecule per line (SMILES, optionally followed by a name).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Path for the CSV report. Written to standard output when omitted.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Input format: 'smiles' or 'smiles-line'.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<MoleculeFormat>,

    // --- Decomposition Overrides ---
    /// Override `decomposition.stereo` from the config file.
    #[command(flatten)]
    pub stereo: StereoFlag,

    /// Treat acyclic nitrogens bonded to a ring as part of the scaffold.
    #[arg(long)]
    pub keep_nitro: bool,

    /// Give up on a molecule as soon as one of its branches fails.
    #[arg(long)]
    pub abort_on_branch_error: bool,

    // --- Limit Overrides ---
    /// Skip molecules with more heavy atoms than this.
    #[arg(long, value_name = "INT")]
    pub max_atoms: Option<usize>,

    /// Skip molecules with more ring systems than this.
    #[arg(long, value_name = "INT")]
    pub max_ring_systems: Option<usize>,

    // --- Cache Overrides ---
    /// Override the cache backend: 'memory', 'sled' or 'sqlite'.
    #[arg(short, long, value_name = "BACKEND")]
    pub backend: Option<CacheBackend>,

    /// Override the location of a persistent cache.
    #[arg(long, value_name = "PATH")]
    pub cache_path: Option<PathBuf>,

    /// Run cache maintenance after this many molecules.
    #[arg(long, value_name = "INT")]
    pub reindex_every: Option<usize>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S limits.max-atoms=80
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Mutually exclusive switches for stereo-aware scaffold keys.
#[derive(Args, Debug, Clone, Copy)]
#[group(required = false, multiple = false)]
pub struct StereoFlag {
    /// Keep tetrahedral stereo in scaffold keys.
    #[arg(long)]
    pub stereo: bool,
    /// Ignore stereo in scaffold keys.
    #[arg(long)]
    pub no_stereo: bool,
}

/// Arguments for the `lookup` subcommand.
#[derive(Args, Debug)]
pub struct LookupArgs {
    /// Cache backend holding the scaffolds.
    #[arg(short, long, value_name = "BACKEND", default_value_t = CacheBackend::Sqlite)]
    pub backend: CacheBackend,

    /// Location of the cache.
    #[arg(long, required = true, value_name = "PATH")]
    pub cache_path: PathBuf,

    /// Scaffold ids to show.
    #[arg(required = true, value_name = "ID")]
    pub ids: Vec<u64>,
}
