//! Error types for FastTagParse
//!
//! Defines all error types used throughout the library.

use crate::core::format::Format;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for parsing alignment files
///
/// Records that are merely unusable (unmapped reads, comment lines,
/// ambiguous hits) are not errors; parsers report them as `None`.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Strand token is not one of the two tokens the format allows
    #[error("Strand information can not be recognized in this line: \"{line}\", strand: \"{strand}\"")]
    InvalidStrand { line: String, strand: String },

    /// Line carries fewer columns than the format requires
    #[error("Too few fields: expected at least {expected}, found {found} in line \"{line}\"")]
    TooFewFields {
        expected: usize,
        found: usize,
        line: String,
    },

    /// Numeric column could not be parsed
    #[error("Invalid number in field {field}: '{value}'")]
    InvalidNumber { field: &'static str, value: String },

    /// Fragment whose right end does not lie strictly after its left end
    #[error("Invalid fragment {chrom}:{left}-{right}: right position must be larger than left position")]
    InvalidFragment { chrom: String, left: i32, right: i32 },

    /// File claims to be BAM but its binary layout is broken
    #[error("Invalid BAM format: {0}")]
    InvalidBam(String),

    /// Binary record shorter than one of the fields it declares
    #[error("Truncated BAM record: need {needed} bytes, record holds {available}")]
    TruncatedRecord { needed: usize, available: usize },

    /// Alignment refers to a reference missing from the header
    #[error("Reference index {0} is not present in the BAM header")]
    UnknownReference(i32),

    /// Parser was already drained into a track and closed
    #[error("Parser has already been drained and closed")]
    Closed,

    /// Format cannot be opened through the requested interface
    #[error("Format {0} is not supported by this parser interface")]
    UnsupportedFormat(Format),

    /// No parser accepted the input during auto-detection
    #[error("Can't detect format of {}: no parser matched", .0.display())]
    UnknownFormat(PathBuf),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ParseError {
    /// Build a strand error from the raw line and token
    pub fn invalid_strand(line: &[u8], strand: &[u8]) -> Self {
        ParseError::InvalidStrand {
            line: String::from_utf8_lossy(line).into_owned(),
            strand: String::from_utf8_lossy(strand).into_owned(),
        }
    }

    /// Build a column-count error from the raw line
    pub fn too_few_fields(expected: usize, found: usize, line: &[u8]) -> Self {
        ParseError::TooFewFields {
            expected,
            found,
            line: String::from_utf8_lossy(line).into_owned(),
        }
    }

    /// Build a number error from the raw field bytes
    pub fn invalid_number(field: &'static str, value: &[u8]) -> Self {
        ParseError::InvalidNumber {
            field,
            value: String::from_utf8_lossy(value).into_owned(),
        }
    }

    /// Check if this error means "no parser matched"
    pub fn is_unknown_format(&self) -> bool {
        matches!(self, ParseError::UnknownFormat(_))
    }
}

/// Result type alias for parsing operations
pub type Result<T> = std::result::Result<T, ParseError>;
