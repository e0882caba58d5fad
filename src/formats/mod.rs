//! Alignment file format decoders
//!
//! One module per format family: BED/BEDPE, the three ELAND variants, SAM,
//! BAM/BAMPE and Bowtie.

pub mod bam;
pub mod bed;
pub mod bowtie;
pub mod eland;
pub mod sam;

pub use bam::{BamParser, BamPeParser, ReferenceTable};
pub use bed::{BedParser, BedPeParser};
pub use bowtie::BowtieParser;
pub use eland::{ElandExportParser, ElandMultiParser, ElandResultParser};
pub use sam::SamParser;
