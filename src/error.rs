use thiserror::Error;

/// Errors produced while reading or writing a FIFF file.
///
/// Absent *optional* structures (no covariance of a given kind, no
/// projections, no bad-channel block) are not errors; the extractors report
/// those as `Ok(None)` or an empty collection.
#[derive(Error, Debug)]
pub enum Error {
    /// Short read, failed seek, or any other I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The file violates the format where the format leaves no choice:
    /// missing file-id/directory-pointer prefix, or a required tag absent
    /// at a position the format guarantees it.
    #[error("structural error: {0}")]
    Structural(String),

    /// Decoded values disagree with redundant on-disk checks (dimension
    /// mismatches, name-list length mismatches, ambiguous channel lookups).
    #[error("inconsistent data: {0}")]
    Inconsistency(String),

    /// A tag carries a data type code with no known decoding.
    #[error("unsupported FIFF data type {0}")]
    UnsupportedType(i32),
}

pub type Result<T> = std::result::Result<T, Error>;
