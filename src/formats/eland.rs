//! ELAND result, multi-hit and export formats
//!
//! All three are 1-based on disk and use `F`/`R` strand codes. Forward reads
//! report `start - 1`; reverse reads report `start + tag_length - 1`, the
//! 0-based position of their 5' end. Reads that are not unique
//! alignments are skipped.

use crate::core::alignment::trim_fa_suffix;
use crate::core::error::{ParseError, Result};
use crate::core::fields::{field_len, offset_position, parse_int, Fields};
use crate::core::format::Format;
use crate::core::io::InputSource;
use crate::core::parser::{LineFormat, TagFormat, TextParser};
use crate::core::track::{Strand, Tag};
use memchr::memrchr;

/// ELAND result (`s_N_eland_result.txt`)
#[derive(Debug, Clone, Copy, Default)]
pub struct ElandResult;

/// ELAND multi-hit (`s_N_eland_multi.txt`)
#[derive(Debug, Clone, Copy, Default)]
pub struct ElandMulti;

/// ELAND export (`s_N_export.txt`)
#[derive(Debug, Clone, Copy, Default)]
pub struct ElandExport;

pub type ElandResultParser<S = InputSource> = TextParser<ElandResult, S>;
pub type ElandMultiParser<S = InputSource> = TextParser<ElandMulti, S>;
pub type ElandExportParser<S = InputSource> = TextParser<ElandExport, S>;

fn is_comment(line: &[u8]) -> bool {
    line.starts_with(b"#")
}

/// Turn a 1-based start field and `F`/`R` code into a 0-based 5' position
fn five_prime<'a>(
    line: &[u8],
    chrom: &'a [u8],
    position: &[u8],
    tag_length: i32,
    strand: &[u8],
) -> Result<Tag<'a>> {
    let start = parse_int(position, "position")?;
    match strand {
        b"F" => {
            let start = offset_position(position, "position", start, -1)?;
            Ok(Tag::new(chrom, start, Strand::Forward))
        }
        b"R" => {
            let end = offset_position(position, "position", start, tag_length - 1)?;
            Ok(Tag::new(chrom, end, Strand::Reverse))
        }
        _ => Err(ParseError::invalid_strand(line, strand)),
    }
}

impl LineFormat for ElandResult {
    const FORMAT: Format = Format::Eland;

    fn is_header(line: &[u8]) -> bool {
        is_comment(line)
    }

    fn record_length(line: &[u8]) -> Option<i32> {
        Fields::<2>::split(line).get(1).map(field_len)
    }
}

impl TagFormat for ElandResult {
    fn decode(line: &[u8]) -> Result<Option<Tag<'_>>> {
        let line = line.trim_ascii_end();
        if line.is_empty() {
            return Ok(None);
        }

        let fields = Fields::<9>::split(line);
        if fields.count() < 9 {
            return Ok(None);
        }
        // U0/U1/U2: unique match with up to two mismatches
        if !matches!(fields.field(2), b"U0" | b"U1" | b"U2") {
            return Ok(None);
        }

        let chrom = trim_fa_suffix(fields.field(6));
        five_prime(line, chrom, fields.field(7), field_len(fields.field(1)), fields.field(8)).map(Some)
    }
}

impl LineFormat for ElandMulti {
    const FORMAT: Format = Format::ElandMulti;

    fn is_header(line: &[u8]) -> bool {
        is_comment(line)
    }

    fn record_length(line: &[u8]) -> Option<i32> {
        Fields::<2>::split(line).get(1).map(field_len)
    }
}

/// Sum of the `n0:n1:n2` hit counts
fn total_hits(counts: &[u8]) -> Result<i32> {
    counts
        .split(|&b| b == b':')
        .try_fold(0i32, |total, count| Ok(total.saturating_add(parse_int(count, "hits")?)))
}

impl TagFormat for ElandMulti {
    fn decode(line: &[u8]) -> Result<Option<Tag<'_>>> {
        let line = line.trim_ascii_end();
        if line.is_empty() {
            return Ok(None);
        }

        let fields = Fields::<4>::split(line);
        if fields.count() < 4 {
            return Ok(None);
        }
        if total_hits(fields.field(2))? != 1 {
            return Ok(None);
        }

        // chr1.fa:12345F0 -> position, strand code, mismatch count
        let hit = fields.field(3);
        let Some(colon) = memrchr(b':', hit) else {
            return Ok(None);
        };
        let chrom = trim_fa_suffix(&hit[..colon]);
        let location = &hit[colon + 1..];
        if location.len() < 2 {
            return Ok(None);
        }
        let strand_at = location.len() - 2;
        let strand = &location[strand_at..strand_at + 1];
        five_prime(line, chrom, &location[..strand_at], field_len(fields.field(1)), strand)
            .map(Some)
    }
}

impl LineFormat for ElandExport {
    const FORMAT: Format = Format::ElandExport;

    fn is_header(line: &[u8]) -> bool {
        is_comment(line)
    }

    fn record_length(line: &[u8]) -> Option<i32> {
        let fields = Fields::<13>::split(line);
        // only aligned reads carry a position in column 12
        match fields.get(12) {
            Some(position) if fields.count() > 12 && !position.is_empty() => {
                Some(field_len(fields.field(8)))
            }
            _ => None,
        }
    }
}

impl TagFormat for ElandExport {
    fn decode(line: &[u8]) -> Result<Option<Tag<'_>>> {
        let line = line.trim_ascii_end();
        if line.is_empty() {
            return Ok(None);
        }

        let fields = Fields::<14>::split(line);
        if fields.count() < 14 || fields.field(12).is_empty() {
            return Ok(None);
        }

        let chrom = trim_fa_suffix(fields.field(10));
        five_prime(line, chrom, fields.field(12), field_len(fields.field(8)), fields.field(13))
            .map(Some)
    }
}
