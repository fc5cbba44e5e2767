//! Error types for configuration and cache-file IO.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EigenfluidError {
    /// Requested an anisotropy ratio with no analytic template table.
    /// Rejected when the basis is inserted, never during evaluation.
    #[error("unsupported anisotropy ratio {ratio} (templates cover 0..={max})")]
    UnsupportedAnisotropy { ratio: u32, max: u32 },

    /// A coefficient cache file contained a line that does not parse as a
    /// full record. Treated as data corruption, not silently skipped.
    #[error("malformed coefficient record at line {line} of {path}")]
    CacheFormat { path: String, line: usize },

    #[error("cache file IO: {0}")]
    Io(#[from] std::io::Error),
}
