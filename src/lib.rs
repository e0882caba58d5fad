//! FastTagParse - Streaming parsers for sequencing alignment files
//!
//! Reduces BED, BEDPE, ELAND, SAM, BAM and Bowtie alignments to 5' tag
//! positions or paired-end fragments, one record at a time.
//!
//! # Features
//!
//! - Format auto-detection by sniffing
//! - Raw BAM record decoding with flag filtering and CIGAR correction
//! - Transparent gzip (including BGZF) and bzip2 input
//! - Running fragment-length statistics for paired-end tracks
//!
//! # Example
//!
//! ```ignore
//! use fast_tagparse::{detect_format, ParserOptions, TagLocations, TagParser};
//!
//! let mut parser = detect_format("reads.bam", ParserOptions::default())?;
//! println!("tag size: {}", parser.estimate_tag_size()?);
//! let track: TagLocations = parser.build_single_end_track()?;
//! ```

pub mod core;
pub mod formats;

// Re-export commonly used types
pub use crate::core::{
    detect_format, open_fragment_parser, open_tag_parser, AlignmentParser, Format,
    FragmentLocations, FragmentParser, FragmentStats, FragmentTrack, ParseError, ParserOptions,
    Result, Strand, TagLocations, TagParser, TagTrack, WithBufferSize,
};
pub use crate::formats::{
    bam, bed, bowtie, eland, sam, BamParser, BamPeParser, BedParser, BedPeParser, BowtieParser,
    ElandExportParser, ElandMultiParser, ElandResultParser, SamParser,
};
