//! BED and BEDPE formats
//!
//! BED lines give a read interval and an optional strand column (index 5).
//! The 5' end is the start coordinate on the forward strand and the end
//! coordinate on the reverse strand. BEDPE lines give an already-resolved
//! fragment in columns 1 and 2.

use crate::core::error::{ParseError, Result};
use crate::core::fields::{parse_int, Fields};
use crate::core::format::Format;
use crate::core::parser::{FragmentFormat, LineFormat, TagFormat, TextParser};
use crate::core::track::{Fragment, Strand, Tag};
use crate::core::io::InputSource;

/// Single-end BED
#[derive(Debug, Clone, Copy, Default)]
pub struct Bed;

/// Paired-end fragments in BED layout
#[derive(Debug, Clone, Copy, Default)]
pub struct BedPe;

pub type BedParser<S = InputSource> = TextParser<Bed, S>;
pub type BedPeParser<S = InputSource> = TextParser<BedPe, S>;

fn is_bed_header(line: &[u8]) -> bool {
    line.starts_with(b"track") || line.starts_with(b"browser") || line.starts_with(b"#")
}

fn interval_length(line: &[u8]) -> Option<i32> {
    let fields = Fields::<3>::split(line);
    if fields.count() < 3 {
        return None;
    }
    let start = parse_int(fields.field(1), "start").ok()?;
    let end = parse_int(fields.field(2), "end").ok()?;
    end.checked_sub(start)
}

impl LineFormat for Bed {
    const FORMAT: Format = Format::Bed;

    fn is_header(line: &[u8]) -> bool {
        is_bed_header(line)
    }

    fn record_length(line: &[u8]) -> Option<i32> {
        interval_length(line)
    }
}

impl TagFormat for Bed {
    fn decode(line: &[u8]) -> Result<Option<Tag<'_>>> {
        let line = line.trim_ascii_end();
        if line.is_empty() {
            return Ok(None);
        }

        let fields = Fields::<6>::split(line);
        if fields.count() < 3 {
            return Err(ParseError::too_few_fields(3, fields.count(), line));
        }
        let chrom = fields.field(0);

        match fields.get(5) {
            Some(b"+") | None => Ok(Some(Tag::new(
                chrom,
                parse_int(fields.field(1), "start")?,
                Strand::Forward,
            ))),
            Some(b"-") => Ok(Some(Tag::new(
                chrom,
                parse_int(fields.field(2), "end")?,
                Strand::Reverse,
            ))),
            Some(strand) => Err(ParseError::invalid_strand(line, strand)),
        }
    }
}

impl LineFormat for BedPe {
    const FORMAT: Format = Format::Bedpe;

    fn is_header(line: &[u8]) -> bool {
        is_bed_header(line)
    }

    fn record_length(line: &[u8]) -> Option<i32> {
        interval_length(line)
    }
}

impl FragmentFormat for BedPe {
    fn decode(line: &[u8]) -> Result<Option<Fragment<'_>>> {
        let line = line.trim_ascii_end();
        if line.is_empty() {
            return Ok(None);
        }

        let fields = Fields::<3>::split(line);
        if fields.count() < 3 {
            return Err(ParseError::too_few_fields(3, fields.count(), line));
        }
        let left = parse_int(fields.field(1), "left")?;
        let right = parse_int(fields.field(2), "right")?;
        Fragment::new(fields.field(0), left, right).map(Some)
    }
}
