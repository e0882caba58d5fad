//! Supported alignment formats

use std::fmt;
use std::str::FromStr;

/// Alignment file formats understood by the parsers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// Plain interval list with optional strand column
    Bed,
    /// Plain interval list of already-resolved fragments
    Bedpe,
    /// ELAND result format
    Eland,
    /// ELAND multi-hit format
    ElandMulti,
    /// ELAND export format
    ElandExport,
    /// SAM text
    Sam,
    /// BAM binary, single-end
    Bam,
    /// BAM binary, paired-end fragments
    Bampe,
    /// Bowtie default output
    Bowtie,
}

impl Format {
    /// Every format, in declaration order
    pub const ALL: [Format; 9] = [
        Format::Bed,
        Format::Bedpe,
        Format::Eland,
        Format::ElandMulti,
        Format::ElandExport,
        Format::Sam,
        Format::Bam,
        Format::Bampe,
        Format::Bowtie,
    ];

    /// Canonical upper-case name
    pub fn name(&self) -> &'static str {
        match self {
            Format::Bed => "BED",
            Format::Bedpe => "BEDPE",
            Format::Eland => "ELAND",
            Format::ElandMulti => "ELANDMULTI",
            Format::ElandExport => "ELANDEXPORT",
            Format::Sam => "SAM",
            Format::Bam => "BAM",
            Format::Bampe => "BAMPE",
            Format::Bowtie => "BOWTIE",
        }
    }

    /// Whether records of this format are fragments rather than single tags
    pub fn is_paired(&self) -> bool {
        matches!(self, Format::Bedpe | Format::Bampe)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Format::ALL
            .iter()
            .copied()
            .find(|format| format.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown format: {}", s))
    }
}
