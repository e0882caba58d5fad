//! SAM text format
//!
//! Only primary, mapped, QC-passing alignments are kept, and of a proper
//! pair only the first segment. Reverse-strand reads are moved to the
//! rightmost reference base covered by their CIGAR.

use crate::core::alignment::{cigar_reference_length, passes_flag_filter, trim_fa_suffix, FLAG_REVERSE};
use crate::core::error::{ParseError, Result};
use crate::core::fields::{field_len, offset_position, parse_int, Fields};
use crate::core::format::Format;
use crate::core::io::InputSource;
use crate::core::parser::{LineFormat, TagFormat, TextParser};
use crate::core::track::{Strand, Tag};

/// SAM alignments
#[derive(Debug, Clone, Copy, Default)]
pub struct Sam;

pub type SamParser<S = InputSource> = TextParser<Sam, S>;

const COL_FLAG: usize = 1;
const COL_RNAME: usize = 2;
const COL_POS: usize = 3;
const COL_CIGAR: usize = 5;
const COL_SEQ: usize = 9;

fn parse_flag(field: &[u8]) -> Result<u16> {
    let flag = parse_int(field, "flag")?;
    u16::try_from(flag).map_err(|_| ParseError::invalid_number("flag", field))
}

impl LineFormat for Sam {
    const FORMAT: Format = Format::Sam;

    fn is_header(line: &[u8]) -> bool {
        line.starts_with(b"@")
    }

    fn record_length(line: &[u8]) -> Option<i32> {
        let line = line.trim_ascii_end();
        if line.is_empty() || line.starts_with(b"@") {
            return None;
        }
        let fields = Fields::<10>::split(line);
        if fields.count() < 10 {
            return None;
        }
        let flag = parse_flag(fields.field(COL_FLAG)).ok()?;
        if !passes_flag_filter(flag) {
            return None;
        }
        Some(field_len(fields.field(COL_SEQ)))
    }
}

impl TagFormat for Sam {
    fn decode(line: &[u8]) -> Result<Option<Tag<'_>>> {
        let line = line.trim_ascii_end();
        if line.is_empty() || line.starts_with(b"@") {
            return Ok(None);
        }

        let fields = Fields::<6>::split(line);
        if fields.count() < 6 {
            return Err(ParseError::too_few_fields(6, fields.count(), line));
        }
        let flag = parse_flag(fields.field(COL_FLAG))?;
        if !passes_flag_filter(flag) {
            return Ok(None);
        }

        let chrom = trim_fa_suffix(fields.field(COL_RNAME));
        let pos = fields.field(COL_POS);
        let start = offset_position(pos, "position", parse_int(pos, "position")?, -1)?;
        let tag = if flag & FLAG_REVERSE != 0 {
            let span = cigar_reference_length(fields.field(COL_CIGAR));
            Tag::new(chrom, offset_position(pos, "position", start, span)?, Strand::Reverse)
        } else {
            Tag::new(chrom, start, Strand::Forward)
        };
        Ok(Some(tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sam_line(flag: u16, chrom: &str, pos: i32, cigar: &str) -> String {
        format!("read1\t{flag}\t{chrom}\t{pos}\t60\t{cigar}\t*\t0\t0\tACGTACGTAC\tIIIIIIIIII")
    }

    #[test]
    fn test_unmapped_is_skipped() {
        let line = sam_line(4, "chr1", 100, "10M");
        assert!(Sam::decode(line.as_bytes()).unwrap().is_none());
    }

    #[test]
    fn test_forward_position_is_zero_based() {
        let line = sam_line(0, "chr1", 100, "10M");
        let tag = Sam::decode(line.as_bytes()).unwrap().unwrap();
        assert_eq!(tag, Tag::new(b"chr1", 99, Strand::Forward));
    }

    #[test]
    fn test_reverse_position_walks_cigar() {
        let line = sam_line(16, "chr1", 100, "10M");
        let tag = Sam::decode(line.as_bytes()).unwrap().unwrap();
        assert_eq!(tag, Tag::new(b"chr1", 109, Strand::Reverse));

        let line = sam_line(16, "chr1", 100, "2S5M3D2I5M100N4M");
        let tag = Sam::decode(line.as_bytes()).unwrap().unwrap();
        assert_eq!(tag.position, 99 + 5 + 3 + 5 + 100 + 4);
    }

    #[test]
    fn test_reverse_end_past_i32_is_error() {
        let line = sam_line(16, "chr1", i32::MAX, "10M");
        assert!(matches!(
            Sam::decode(line.as_bytes()),
            Err(ParseError::InvalidNumber { field: "position", ref value }) if value == "2147483647"
        ));

        // the forward strand never adds the span
        let line = sam_line(0, "chr1", i32::MAX, "10M");
        let tag = Sam::decode(line.as_bytes()).unwrap().unwrap();
        assert_eq!(tag.position, i32::MAX - 1);

        let line = sam_line(16, "chr1", i32::MAX - 10, "10M");
        let tag = Sam::decode(line.as_bytes()).unwrap().unwrap();
        assert_eq!(tag.position, i32::MAX - 1);
    }

    #[test]
    fn test_pair_filtering() {
        let first = sam_line(99, "chr1", 100, "10M");
        assert!(Sam::decode(first.as_bytes()).unwrap().is_some());
        let second = sam_line(147, "chr1", 300, "10M");
        assert!(Sam::decode(second.as_bytes()).unwrap().is_none());
        let improper = sam_line(65, "chr1", 300, "10M");
        assert!(Sam::decode(improper.as_bytes()).unwrap().is_none());
    }

    #[test]
    fn test_fa_suffix_trimmed() {
        let line = sam_line(0, "chr5.fa", 10, "10M");
        let tag = Sam::decode(line.as_bytes()).unwrap().unwrap();
        assert_eq!(tag.chrom, b"chr5");
    }

    #[test]
    fn test_header_and_record_length() {
        assert!(Sam::is_header(b"@SQ\tSN:chr1\tLN:1000"));
        let line = sam_line(0, "chr1", 100, "10M");
        assert_eq!(Sam::record_length(line.as_bytes()), Some(10));
        let secondary = sam_line(256, "chr1", 100, "10M");
        assert_eq!(Sam::record_length(secondary.as_bytes()), None);
        assert_eq!(Sam::record_length(b"@HD\tVN:1.6"), None);
    }

    #[test]
    fn test_short_line_is_error() {
        assert!(matches!(
            Sam::decode(b"read1\t0\tchr1\t100"),
            Err(ParseError::TooFewFields { expected: 6, found: 4, .. })
        ));
    }
}
