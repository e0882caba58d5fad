//! Bowtie default output
//!
//! Columns: read name, strand (`+`/`-`), reference, 0-based leftmost
//! offset, sequence. Reverse-strand reads are moved by the read length.

use crate::core::alignment::trim_fa_suffix;
use crate::core::error::{ParseError, Result};
use crate::core::fields::{field_len, offset_position, parse_int, Fields};
use crate::core::format::Format;
use crate::core::io::InputSource;
use crate::core::parser::{LineFormat, TagFormat, TextParser};
use crate::core::track::{Strand, Tag};

/// Bowtie alignments
#[derive(Debug, Clone, Copy, Default)]
pub struct Bowtie;

pub type BowtieParser<S = InputSource> = TextParser<Bowtie, S>;

impl LineFormat for Bowtie {
    const FORMAT: Format = Format::Bowtie;

    fn is_header(line: &[u8]) -> bool {
        line.starts_with(b"#")
    }

    fn record_length(line: &[u8]) -> Option<i32> {
        Fields::<5>::split(line).get(4).map(field_len)
    }
}

impl TagFormat for Bowtie {
    fn decode(line: &[u8]) -> Result<Option<Tag<'_>>> {
        let line = line.trim_ascii_end();
        if line.is_empty() || line.starts_with(b"#") {
            return Ok(None);
        }

        let fields = Fields::<5>::split(line);
        if fields.count() < 5 {
            return Err(ParseError::too_few_fields(5, fields.count(), line));
        }
        let chrom = trim_fa_suffix(fields.field(2));
        let offset = fields.field(3);
        let start = parse_int(offset, "offset")?;

        match fields.field(1) {
            b"+" => Ok(Some(Tag::new(chrom, start, Strand::Forward))),
            b"-" => {
                let end = offset_position(offset, "offset", start, field_len(fields.field(4)))?;
                Ok(Some(Tag::new(chrom, end, Strand::Reverse)))
            }
            strand => Err(ParseError::invalid_strand(line, strand)),
        }
    }
}
