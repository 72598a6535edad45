use thiserror::Error;

/// Comprehensive error handling for the provenance core
#[derive(Error, Debug)]
pub enum ProvenanceError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Invalid tile size: {tile_width}x{tile_height}")]
    InvalidTileSize { tile_width: u32, tile_height: u32 },

    #[error("Malformed encoding: {0}")]
    MalformedEncoding(String),

    #[error("Chain linkage mismatch: expected input root {expected}, got {actual}")]
    LinkageMismatch { expected: String, actual: String },

    #[error("Chain not found: {chain_id}")]
    ChainNotFound { chain_id: String },

    #[error("Chain is exported and read-only: {chain_id}")]
    ChainReadOnly { chain_id: String },

    #[error("Verification failed: {reason}")]
    VerificationFailed { reason: String },

    #[error("Unsupported format version {version} (supported: {supported})")]
    UnsupportedFormat { version: u32, supported: u32 },

    #[error("Batch item {index} failed: {reason}")]
    BatchItemFailed { index: usize, reason: String },

    #[error("Operation cancelled before it was scheduled")]
    Cancelled,

    #[error("Circuit evaluator error: {0}")]
    Evaluator(String),

    #[error("Circuit evaluator timed out after {timeout_ms}ms")]
    EvaluatorTimeout { timeout_ms: u64 },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Helper type alias for Results
pub type ProvenanceResult<T> = std::result::Result<T, ProvenanceError>;

impl ProvenanceError {
    /// Distinct process exit status per outcome category, used by the CLI
    pub fn exit_code(&self) -> i32 {
        match self {
            ProvenanceError::InvalidDimensions { .. } | ProvenanceError::InvalidTileSize { .. } => {
                10
            }
            ProvenanceError::MalformedEncoding(_) => 11,
            ProvenanceError::LinkageMismatch { .. } => 12,
            ProvenanceError::ChainNotFound { .. } | ProvenanceError::ChainReadOnly { .. } => 13,
            ProvenanceError::VerificationFailed { .. } => 14,
            ProvenanceError::UnsupportedFormat { .. } => 15,
            ProvenanceError::Evaluator(_) | ProvenanceError::EvaluatorTimeout { .. } => 16,
            ProvenanceError::BatchItemFailed { .. } => 17,
            ProvenanceError::Cancelled => 18,
            ProvenanceError::Io(_) | ProvenanceError::Serialization(_) => 1,
        }
    }
}

impl From<serde_json::Error> for ProvenanceError {
    fn from(err: serde_json::Error) -> Self {
        ProvenanceError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct_per_category() {
        let errors = [
            ProvenanceError::InvalidDimensions {
                width: 0,
                height: 0,
            },
            ProvenanceError::MalformedEncoding("x".into()),
            ProvenanceError::LinkageMismatch {
                expected: "aa".into(),
                actual: "bb".into(),
            },
            ProvenanceError::ChainNotFound {
                chain_id: "cc".into(),
            },
            ProvenanceError::VerificationFailed {
                reason: "dd".into(),
            },
            ProvenanceError::UnsupportedFormat {
                version: 9,
                supported: 1,
            },
            ProvenanceError::Evaluator("ee".into()),
        ];
        let mut codes: Vec<i32> = errors.iter().map(|e| e.exit_code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }
}
