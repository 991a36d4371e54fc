use std::path::PathBuf;

use crate::core::assigner::Subset;
use crate::metadata::ImageId;

/// Result type for split operations
pub type SplitResult<T> = Result<T, SplitError>;

/// Error types for a split run
#[derive(Debug)]
pub enum SplitError {
    /// Metadata file does not exist at the configured path
    MetadataNotFound(PathBuf),
    /// Metadata file exists but is not a valid per-image mapping
    MetadataParse(String),
    /// Configuration file is missing, unreadable, or fails validation
    Config(String),
    /// A similarity reference token is neither an integer nor an "A-B" range
    SimilarityParse { id: ImageId, token: String },
    /// Assigned image count does not match the metadata image count
    CountMismatch { assigned: usize, total: usize },
    /// Two subsets share one or more image identifiers
    Overlap {
        first: Subset,
        second: Subset,
        count: usize,
    },
    /// Source image or mask asset missing or unreadable during copy
    AssetCopy {
        id: ImageId,
        path: PathBuf,
        source: std::io::Error,
    },
    IoError(std::io::Error),
}

impl std::fmt::Display for SplitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SplitError::MetadataNotFound(path) => {
                write!(f, "Metadata file not found: {:?}", path)
            }
            SplitError::MetadataParse(msg) => write!(f, "Failed to parse metadata: {}", msg),
            SplitError::Config(msg) => write!(f, "Invalid configuration: {}", msg),
            SplitError::SimilarityParse { id, token } => write!(
                f,
                "Invalid similarity token {:?} in record for image {}",
                token, id
            ),
            SplitError::CountMismatch { assigned, total } => write!(
                f,
                "Mismatch in total assigned images: {} != {}",
                assigned, total
            ),
            SplitError::Overlap {
                first,
                second,
                count,
            } => write!(
                f,
                "Overlap detected between {} and {} subsets ({} shared images)",
                first.as_str(),
                second.as_str(),
                count
            ),
            SplitError::AssetCopy { id, path, source } => write!(
                f,
                "Failed to copy asset {:?} for image {}: {}",
                path, id, source
            ),
            SplitError::IoError(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for SplitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SplitError::AssetCopy { source, .. } => Some(source),
            SplitError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SplitError {
    fn from(error: std::io::Error) -> Self {
        SplitError::IoError(error)
    }
}
