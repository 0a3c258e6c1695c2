use crate::cli::{DecomposeArgs, StereoFlag};
use crate::error::{CliError, Result};
use hiers::cache::CacheBackend;
use hiers::core::models::atom::MoleculeFormat;
use hiers::engine::config::{BatchConfig, BatchConfigBuilder};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Everything the `decompose` command needs after merging file and CLI.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub input_path: PathBuf,
    pub output_path: Option<PathBuf>,
    pub backend: CacheBackend,
    pub cache_path: Option<PathBuf>,
    pub batch: BatchConfig,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialDecompositionConfig {
    stereo: Option<bool>,
    keep_nitro_attachments: Option<bool>,
    abort_on_branch_error: Option<bool>,
    format: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialLimitsConfig {
    max_atoms: Option<usize>,
    max_ring_systems: Option<usize>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialCacheConfig {
    backend: Option<CacheBackend>,
    path: Option<PathBuf>,
    reindex_every: Option<usize>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialHiersConfig {
    decomposition: Option<PartialDecompositionConfig>,
    limits: Option<PartialLimitsConfig>,
    cache: Option<PartialCacheConfig>,
}

impl PartialHiersConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn merge_with_cli(mut self, args: &DecomposeArgs) -> Result<AppConfig> {
        self.apply_set_values(&args.set_values)?;

        let decomposition = self.decomposition.take().unwrap_or_default();
        let limits = self.limits.take().unwrap_or_default();
        let cache = self.cache.take().unwrap_or_default();

        let format = match (args.format, decomposition.format.as_deref()) {
            (Some(format), _) => format,
            (None, Some(name)) => MoleculeFormat::from_str(name).map_err(CliError::Config)?,
            (None, None) => MoleculeFormat::SmilesLine,
        };

        let batch = BatchConfigBuilder::new()
            .stereo(Self::merge_stereo(args.stereo, decomposition.stereo))
            .keep_nitro_attachments(
                args.keep_nitro || decomposition.keep_nitro_attachments.unwrap_or(false),
            )
            .abort_on_branch_error(
                args.abort_on_branch_error || decomposition.abort_on_branch_error.unwrap_or(false),
            )
            .max_atoms(args.max_atoms.or(limits.max_atoms))
            .max_ring_systems(args.max_ring_systems.or(limits.max_ring_systems))
            .format(format)
            .reindex_every(args.reindex_every.or(cache.reindex_every))
            .build()
            .map_err(|e| CliError::Config(e.to_string()))?;

        let backend = args.backend.or(cache.backend).unwrap_or_default();
        let cache_path = args.cache_path.clone().or(cache.path);
        if backend != CacheBackend::Memory && cache_path.is_none() {
            return Err(CliError::Config(format!(
                "The '{}' cache backend needs `cache.path` or --cache-path.",
                backend
            )));
        }

        Ok(AppConfig {
            input_path: args.input.clone(),
            output_path: args.output.clone(),
            backend,
            cache_path,
            batch,
        })
    }

    fn merge_stereo(cli_flags: StereoFlag, file_val: Option<bool>) -> bool {
        if cli_flags.stereo {
            true
        } else if cli_flags.no_stereo {
            false
        } else {
            file_val.unwrap_or(false)
        }
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let Some((key, value_str)) = kv_pair.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            };

            let parse_bool = || {
                value_str.parse::<bool>().map_err(|_| {
                    CliError::Config(format!("Invalid boolean value for {}: {}", key, value_str))
                })
            };
            let parse_int = || {
                value_str.parse::<usize>().map_err(|_| {
                    CliError::Config(format!("Invalid integer value for {}: {}", key, value_str))
                })
            };

            match key {
                "decomposition.stereo" => {
                    self.decomposition.get_or_insert_with(Default::default).stereo = Some(parse_bool()?);
                }
                "decomposition.keep-nitro-attachments" => {
                    self.decomposition
                        .get_or_insert_with(Default::default)
                        .keep_nitro_attachments = Some(parse_bool()?);
                }
                "decomposition.abort-on-branch-error" => {
                    self.decomposition
                        .get_or_insert_with(Default::default)
                        .abort_on_branch_error = Some(parse_bool()?);
                }
                "decomposition.format" => {
                    self.decomposition.get_or_insert_with(Default::default).format =
                        Some(value_str.to_string());
                }
                "limits.max-atoms" => {
                    self.limits.get_or_insert_with(Default::default).max_atoms = Some(parse_int()?);
                }
                "limits.max-ring-systems" => {
                    self.limits.get_or_insert_with(Default::default).max_ring_systems =
                        Some(parse_int()?);
                }
                "cache.backend" => {
                    self.cache.get_or_insert_with(Default::default).backend = Some(
                        value_str
                            .parse()
                            .map_err(|e| CliError::Config(format!("{}", e)))?,
                    );
                }
                "cache.path" => {
                    self.cache.get_or_insert_with(Default::default).path = Some(PathBuf::from(value_str));
                }
                "cache.reindex-every" => {
                    self.cache.get_or_insert_with(Default::default).reindex_every = Some(parse_int()?);
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}
