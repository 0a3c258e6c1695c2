use thiserror::Error;

use crate::cache::CacheError;
use crate::core::chem::error::ChemError;

#[derive(Debug, Error)]
pub enum DecompositionError {
    #[error("Chemistry toolkit error: {source}")]
    Toolkit {
        #[from]
        source: ChemError,
    },

    #[error("Cutting junction bond {sequence} gave {fragments} fragments instead of 2")]
    MalformedCut { sequence: u32, fragments: usize },

    #[error("Scaffold cache error: {source}")]
    Cache {
        #[from]
        source: CacheError,
    },

    #[error("Internal logic error: {0}")]
    Internal(String),
}

impl DecompositionError {
    /// Whether the error must stop the whole run rather than one branch or
    /// one molecule. A cache that failed mid-merge can no longer be trusted.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Cache { .. })
    }
}
