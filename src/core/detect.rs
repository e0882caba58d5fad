//! Parser factories and format auto-detection

use crate::core::error::{ParseError, Result};
use crate::core::format::Format;
use crate::core::parser::{AlignmentParser, FragmentParser, ParserOptions, TagParser};
use crate::formats::bam::{BamParser, PairedEnd, SingleEnd};
use crate::formats::bed::{BedParser, BedPeParser};
use crate::formats::bowtie::BowtieParser;
use crate::formats::eland::{ElandExportParser, ElandMultiParser, ElandResultParser};
use crate::formats::sam::SamParser;
use log::{debug, info};
use std::path::Path;

/// Formats tried by [`detect_format`], in order
///
/// BAM goes first because its magic check cannot be fooled by text. Paired
/// formats look exactly like their single-end siblings and must be chosen
/// explicitly.
pub const DETECTION_ORDER: [Format; 7] = [
    Format::Bam,
    Format::Bed,
    Format::Eland,
    Format::ElandMulti,
    Format::ElandExport,
    Format::Sam,
    Format::Bowtie,
];

/// Open a single-end parser for a known format
pub fn open_tag_parser<P: AsRef<Path>>(
    format: Format,
    path: P,
    options: ParserOptions,
) -> Result<Box<dyn TagParser>> {
    let path = path.as_ref();
    let parser: Box<dyn TagParser> = match format {
        Format::Bed => Box::new(BedParser::open_with(path, options)?),
        Format::Eland => Box::new(ElandResultParser::open_with(path, options)?),
        Format::ElandMulti => Box::new(ElandMultiParser::open_with(path, options)?),
        Format::ElandExport => Box::new(ElandExportParser::open_with(path, options)?),
        Format::Sam => Box::new(SamParser::open_with(path, options)?),
        Format::Bam => Box::new(BamParser::<SingleEnd>::open_with(path, options)?),
        Format::Bowtie => Box::new(BowtieParser::open_with(path, options)?),
        Format::Bedpe | Format::Bampe => return Err(ParseError::UnsupportedFormat(format)),
    };
    Ok(parser)
}

/// Open a paired-end parser for BEDPE or BAMPE
pub fn open_fragment_parser<P: AsRef<Path>>(
    format: Format,
    path: P,
    options: ParserOptions,
) -> Result<Box<dyn FragmentParser>> {
    let path = path.as_ref();
    let parser: Box<dyn FragmentParser> = match format {
        Format::Bedpe => Box::new(BedPeParser::open_with(path, options)?),
        Format::Bampe => Box::new(BamParser::<PairedEnd>::open_with(path, options)?),
        _ => return Err(ParseError::UnsupportedFormat(format)),
    };
    Ok(parser)
}

/// Find the first single-end format whose parser accepts the file
///
/// The returned parser has been sniffed and sits at the start of data.
/// A sniff error (a BAM file whose header is broken after the magic, for
/// example) aborts detection instead of falling through to text formats.
pub fn detect_format<P: AsRef<Path>>(path: P, options: ParserOptions) -> Result<Box<dyn TagParser>> {
    let path = path.as_ref();
    for format in DETECTION_ORDER {
        debug!("Testing format {}", format);
        let mut parser = open_tag_parser(format, path, options)?;
        if parser.sniff()? {
            info!("Detected format is: {}", format);
            if parser.is_gzip_compressed() {
                info!("* Input file is gzip-compressed!");
            }
            return Ok(parser);
        }
        parser.close();
    }
    Err(ParseError::UnknownFormat(path.to_path_buf()))
}
