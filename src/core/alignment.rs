//! Alignment flag and CIGAR helpers shared by the SAM and BAM parsers

use memchr::memmem;

/// Template has multiple segments (paired read)
pub const FLAG_PAIRED: u16 = 0x1;
/// Each segment properly aligned
pub const FLAG_PROPER_PAIR: u16 = 0x2;
/// Segment unmapped
pub const FLAG_UNMAPPED: u16 = 0x4;
/// Next segment unmapped
pub const FLAG_MATE_UNMAPPED: u16 = 0x8;
/// Sequence is reverse complemented
pub const FLAG_REVERSE: u16 = 0x10;
/// Last segment in the template
pub const FLAG_SECOND_IN_PAIR: u16 = 0x80;
/// Secondary alignment
pub const FLAG_SECONDARY: u16 = 0x100;
/// Not passing quality controls
pub const FLAG_QC_FAIL: u16 = 0x200;
/// Supplementary alignment
pub const FLAG_SUPPLEMENTARY: u16 = 0x800;

const FLAG_DISCARD: u16 = FLAG_UNMAPPED | FLAG_QC_FAIL | FLAG_SECONDARY | FLAG_SUPPLEMENTARY;

/// Whether an alignment with these flag bits is kept
///
/// Unpaired reads survive unless unmapped, QC-failed, secondary or
/// supplementary. Paired reads additionally need a proper pair with a
/// mapped mate, and only the first segment of the pair is kept.
#[inline]
pub fn passes_flag_filter(flag: u16) -> bool {
    if flag & FLAG_DISCARD != 0 {
        return false;
    }
    if flag & FLAG_PAIRED != 0 {
        if flag & FLAG_PROPER_PAIR == 0 {
            return false;
        }
        if flag & FLAG_MATE_UNMAPPED != 0 || flag & FLAG_SECOND_IN_PAIR != 0 {
            return false;
        }
    }
    true
}

/// CIGAR operation types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CigarOp {
    Match,
    Insertion,
    Deletion,
    Skip,
    SoftClip,
    HardClip,
    Padding,
    Equal,
    Diff,
}

impl CigarOp {
    /// Decode the 4-bit operation code used in BAM
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(CigarOp::Match),
            1 => Some(CigarOp::Insertion),
            2 => Some(CigarOp::Deletion),
            3 => Some(CigarOp::Skip),
            4 => Some(CigarOp::SoftClip),
            5 => Some(CigarOp::HardClip),
            6 => Some(CigarOp::Padding),
            7 => Some(CigarOp::Equal),
            8 => Some(CigarOp::Diff),
            _ => None,
        }
    }

    /// Decode the operation letter used in SAM
    pub fn from_char(c: u8) -> Option<Self> {
        match c {
            b'M' => Some(CigarOp::Match),
            b'I' => Some(CigarOp::Insertion),
            b'D' => Some(CigarOp::Deletion),
            b'N' => Some(CigarOp::Skip),
            b'S' => Some(CigarOp::SoftClip),
            b'H' => Some(CigarOp::HardClip),
            b'P' => Some(CigarOp::Padding),
            b'=' => Some(CigarOp::Equal),
            b'X' => Some(CigarOp::Diff),
            _ => None,
        }
    }

    pub fn consumes_reference(&self) -> bool {
        matches!(
            self,
            CigarOp::Match | CigarOp::Deletion | CigarOp::Skip | CigarOp::Equal | CigarOp::Diff
        )
    }
}

/// Reference bases covered by a textual CIGAR string
///
/// Sums the lengths of M/D/N/=/X operations; `*` and other operations
/// contribute nothing.
pub fn cigar_reference_length(cigar: &[u8]) -> i32 {
    let mut total: i32 = 0;
    let mut len: i32 = 0;
    for &c in cigar {
        if c.is_ascii_digit() {
            len = len.saturating_mul(10).saturating_add(i32::from(c - b'0'));
            continue;
        }
        if CigarOp::from_char(c).is_some_and(|op| op.consumes_reference()) {
            total = total.saturating_add(len);
        }
        len = 0;
    }
    total
}

/// Reference bases covered by packed BAM CIGAR operations
pub fn packed_cigar_reference_length<I: IntoIterator<Item = u32>>(ops: I) -> i32 {
    ops.into_iter()
        .filter(|op| CigarOp::from_code(op & 0xf).is_some_and(|op| op.consumes_reference()))
        .fold(0i32, |total, op| total.saturating_add((op >> 4) as i32))
}

/// Cut a chromosome name at the rightmost ".fa"
///
/// `chr1.fa` becomes `chr1`; names without ".fa" are returned unchanged.
pub fn trim_fa_suffix(name: &[u8]) -> &[u8] {
    match memmem::rfind(name, b".fa") {
        Some(pos) => &name[..pos],
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_filter_single_end() {
        assert!(passes_flag_filter(0));
        assert!(passes_flag_filter(FLAG_REVERSE));
        assert!(!passes_flag_filter(FLAG_UNMAPPED));
        assert!(!passes_flag_filter(FLAG_QC_FAIL));
        assert!(!passes_flag_filter(FLAG_SECONDARY));
        assert!(!passes_flag_filter(FLAG_SUPPLEMENTARY | FLAG_REVERSE));
    }

    #[test]
    fn test_flag_filter_paired() {
        // first mate of a proper pair
        assert!(passes_flag_filter(99));
        // second mate of the same pair
        assert!(!passes_flag_filter(147));
        // not a proper pair
        assert!(!passes_flag_filter(FLAG_PAIRED));
        // mate unmapped
        assert!(!passes_flag_filter(FLAG_PAIRED | FLAG_PROPER_PAIR | FLAG_MATE_UNMAPPED));
    }

    #[test]
    fn test_cigar_reference_length() {
        assert_eq!(cigar_reference_length(b"10M"), 10);
        assert_eq!(cigar_reference_length(b"5S10M2I3D100N4=2X7H"), 119);
        assert_eq!(cigar_reference_length(b"*"), 0);
    }

    #[test]
    fn test_packed_cigar_reference_length() {
        // 5S 10M 2I 3D
        let ops = [5 << 4 | 4, 10 << 4, 2 << 4 | 1, 3 << 4 | 2];
        assert_eq!(packed_cigar_reference_length(ops), 13);
    }

    #[test]
    fn test_trim_fa_suffix() {
        assert_eq!(trim_fa_suffix(b"chr1.fa"), b"chr1");
        assert_eq!(trim_fa_suffix(b"chr1.fa.gz"), b"chr1");
        assert_eq!(trim_fa_suffix(b"hs.fa.chr2.fa"), b"hs.fa.chr2");
        assert_eq!(trim_fa_suffix(b"chrX"), b"chrX");
    }
}
