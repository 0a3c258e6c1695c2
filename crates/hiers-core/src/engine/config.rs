use crate::core::models::atom::MoleculeFormat;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{parameter}': {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },
}

/// Flags that change what a scaffold is. Every scaffold in a tree, and every
/// tree merged into one cache, must be produced with the same flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ScaffoldFlags {
    /// Keep tetrahedral stereo marks in canonical keys.
    pub stereo: bool,
    /// Treat acyclic nitrogens bonded to a ring as part of the scaffold.
    pub keep_nitro_attachments: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecompositionOptions {
    pub flags: ScaffoldFlags,
    /// Abort the whole molecule when one branch fails instead of counting the
    /// failure and continuing with the remaining junction bonds.
    pub abort_on_branch_error: bool,
}

/// Upper bounds checked before a molecule is decomposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SizeLimits {
    /// Maximum number of heavy atoms.
    pub max_atoms: Option<usize>,
    /// Maximum number of ring systems (fused rings count once).
    pub max_ring_systems: Option<usize>,
}

/// Which limit a molecule exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeViolation {
    Atoms { found: usize, limit: usize },
    RingSystems { found: usize, limit: usize },
}

impl SizeLimits {
    pub fn check(&self, heavy_atoms: usize, ring_systems: usize) -> Result<(), SizeViolation> {
        if let Some(limit) = self.max_atoms.filter(|&limit| heavy_atoms > limit) {
            return Err(SizeViolation::Atoms {
                found: heavy_atoms,
                limit,
            });
        }
        if let Some(limit) = self.max_ring_systems.filter(|&limit| ring_systems > limit) {
            return Err(SizeViolation::RingSystems {
                found: ring_systems,
                limit,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    pub options: DecompositionOptions,
    pub limits: SizeLimits,
    pub format: MoleculeFormat,
    /// Run backend maintenance after this many molecules.
    pub reindex_every: Option<NonZeroUsize>,
}

#[derive(Default)]
pub struct BatchConfigBuilder {
    stereo: Option<bool>,
    keep_nitro_attachments: Option<bool>,
    abort_on_branch_error: Option<bool>,
    max_atoms: Option<usize>,
    max_ring_systems: Option<usize>,
    format: Option<MoleculeFormat>,
    reindex_every: Option<usize>,
}

impl BatchConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stereo(mut self, stereo: bool) -> Self {
        self.stereo = Some(stereo);
        self
    }
    pub fn keep_nitro_attachments(mut self, keep: bool) -> Self {
        self.keep_nitro_attachments = Some(keep);
        self
    }
    pub fn abort_on_branch_error(mut self, abort: bool) -> Self {
        self.abort_on_branch_error = Some(abort);
        self
    }
    pub fn max_atoms(mut self, limit: Option<usize>) -> Self {
        self.max_atoms = limit;
        self
    }
    pub fn max_ring_systems(mut self, limit: Option<usize>) -> Self {
        self.max_ring_systems = limit;
        self
    }
    pub fn format(mut self, format: MoleculeFormat) -> Self {
        self.format = Some(format);
        self
    }
    pub fn reindex_every(mut self, every: Option<usize>) -> Self {
        self.reindex_every = every;
        self
    }

    /// Builds the configuration. The scaffold flags have no default because
    /// they must agree with whatever cache the batch runs against.
    pub fn build(self) -> Result<BatchConfig, ConfigError> {
        let flags = ScaffoldFlags {
            stereo: self.stereo.ok_or(ConfigError::MissingParameter("stereo"))?,
            keep_nitro_attachments: self
                .keep_nitro_attachments
                .ok_or(ConfigError::MissingParameter("keep_nitro_attachments"))?,
        };
        let reindex_every = match self.reindex_every {
            Some(every) => Some(NonZeroUsize::new(every).ok_or_else(|| ConfigError::InvalidValue {
                parameter: "reindex_every",
                reason: "must be greater than zero".to_string(),
            })?),
            None => None,
        };
        Ok(BatchConfig {
            options: DecompositionOptions {
                flags,
                abort_on_branch_error: self.abort_on_branch_error.unwrap_or(false),
            },
            limits: SizeLimits {
                max_atoms: self.max_atoms,
                max_ring_systems: self.max_ring_systems,
            },
            format: self.format.unwrap_or_default(),
            reindex_every,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_requires_scaffold_flags() {
        let err = BatchConfigBuilder::new().keep_nitro_attachments(false).build().unwrap_err();
        assert_eq!(err, ConfigError::MissingParameter("stereo"));
        let err = BatchConfigBuilder::new().stereo(true).build().unwrap_err();
        assert_eq!(err, ConfigError::MissingParameter("keep_nitro_attachments"));
    }

    #[test]
    fn builder_fills_defaults() {
        let config = BatchConfigBuilder::new()
            .stereo(false)
            .keep_nitro_attachments(true)
            .build()
            .unwrap();
        assert!(config.options.flags.keep_nitro_attachments);
        assert!(!config.options.abort_on_branch_error);
        assert_eq!(config.limits, SizeLimits::default());
        assert_eq!(config.format, MoleculeFormat::Smiles);
        assert_eq!(config.reindex_every, None);
    }

    #[test]
    fn builder_rejects_zero_reindex_interval() {
        let err = BatchConfigBuilder::new()
            .stereo(false)
            .keep_nitro_attachments(false)
            .reindex_every(Some(0))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { parameter: "reindex_every", .. }));

        let config = BatchConfigBuilder::new()
            .stereo(false)
            .keep_nitro_attachments(false)
            .reindex_every(Some(500))
            .build()
            .unwrap();
        assert_eq!(config.reindex_every, NonZeroUsize::new(500));
    }

    #[test]
    fn size_limits_report_first_violation() {
        let limits = SizeLimits {
            max_atoms: Some(10),
            max_ring_systems: Some(2),
        };
        assert_eq!(limits.check(10, 2), Ok(()));
        assert_eq!(limits.check(11, 5), Err(SizeViolation::Atoms { found: 11, limit: 10 }));
        assert_eq!(
            limits.check(8, 3),
            Err(SizeViolation::RingSystems { found: 3, limit: 2 })
        );
        assert_eq!(SizeLimits::default().check(10_000, 50), Ok(()));
    }
}
