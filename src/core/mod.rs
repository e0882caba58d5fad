//! Format-independent parsing machinery
//!
//! This module contains the byte source, the parser contract, track
//! interfaces, alignment-flag helpers and format detection.

pub mod alignment;
pub mod detect;
pub mod error;
pub mod fields;
pub mod format;
pub mod io;
pub mod parser;
pub mod track;

pub use alignment::{passes_flag_filter, trim_fa_suffix, CigarOp};
pub use detect::{detect_format, open_fragment_parser, open_tag_parser, DETECTION_ORDER};
pub use error::{ParseError, Result};
pub use format::Format;
pub use io::{
    detect_compression, ByteSource, CompressionFormat, InputSource, RecordReader,
    LARGE_BUFFER_SIZE,
};
pub use parser::{
    AlignmentParser, FragmentFormat, FragmentParser, LineFormat, ParserOptions, TagFormat,
    TagParser, TextParser,
};
pub use track::{
    Fragment, FragmentLocations, FragmentStats, FragmentTrack, ReferenceLengths, Strand, Tag,
    TagLocations, TagTrack, WithBufferSize,
};
