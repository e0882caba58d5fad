//! Parsed records and the track interfaces they are fed into
//!
//! Parsers hand every accepted record to a [`TagTrack`] (single-end reads)
//! or a [`FragmentTrack`] (paired-end fragments). How a track stores,
//! sorts or finalises locations is up to the implementation; the
//! in-memory [`TagLocations`] and [`FragmentLocations`] cover the simple
//! case.

use crate::core::error::{ParseError, Result};
use std::collections::HashMap;

/// Chromosome name to reference length
pub type ReferenceLengths = HashMap<Vec<u8>, i32>;

/// Chromosome name used when a format carries no reference lengths
pub const PLACEHOLDER_CHROM: &[u8] = b"DUMMYCHROM";

/// Reference lengths for formats without chromosome-size metadata
pub fn placeholder_reference_lengths() -> ReferenceLengths {
    let mut lengths = ReferenceLengths::with_capacity(1);
    lengths.insert(PLACEHOLDER_CHROM.to_vec(), 0);
    lengths
}

/// Read strand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Strand {
    #[default]
    Forward = 0,
    Reverse = 1,
}

impl From<Strand> for i32 {
    fn from(strand: Strand) -> Self {
        strand as i32
    }
}

/// A single-end read reduced to its 5' position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag<'a> {
    pub chrom: &'a [u8],
    pub position: i32,
    pub strand: Strand,
}

impl<'a> Tag<'a> {
    pub fn new(chrom: &'a [u8], position: i32, strand: Strand) -> Self {
        Self {
            chrom,
            position,
            strand,
        }
    }

    /// Whether the tag lands on a named chromosome at a non-negative position
    pub fn is_placed(&self) -> bool {
        self.position >= 0 && !self.chrom.is_empty()
    }
}

/// A paired-end fragment interval, `right > left`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment<'a> {
    pub chrom: &'a [u8],
    pub left: i32,
    pub right: i32,
}

impl<'a> Fragment<'a> {
    /// Build a fragment, rejecting empty or inverted intervals
    pub fn new(chrom: &'a [u8], left: i32, right: i32) -> Result<Self> {
        if right <= left {
            return Err(ParseError::InvalidFragment {
                chrom: String::from_utf8_lossy(chrom).into_owned(),
                left,
                right,
            });
        }
        Ok(Self { chrom, left, right })
    }

    /// Interval length, always positive
    pub fn length(&self) -> i64 {
        i64::from(self.right) - i64::from(self.left)
    }

    /// Whether the fragment starts on a named chromosome at a non-negative position
    pub fn is_placed(&self) -> bool {
        self.left >= 0 && !self.chrom.is_empty()
    }
}

/// Receiver of single-end locations
pub trait TagTrack {
    fn add_location(&mut self, chrom: &[u8], position: i32, strand: Strand);

    fn set_reference_lengths(&mut self, lengths: ReferenceLengths);
}

/// Receiver of paired-end fragments
pub trait FragmentTrack {
    fn add_location(&mut self, chrom: &[u8], left: i32, right: i32);

    fn set_reference_lengths(&mut self, lengths: ReferenceLengths);
}

/// Tracks that can be created from a buffer-size hint
pub trait WithBufferSize {
    fn with_buffer_size(buffer_size: usize) -> Self;
}

/// Count and mean length of the fragments added to a paired track
///
/// Adding fragments in one batch or across several gives the same result
/// up to floating-point rounding.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FragmentStats {
    pub count: i64,
    pub mean_length: f64,
}

impl FragmentStats {
    /// Fold in `count` new fragments whose lengths sum to `total_length`
    pub fn add_batch(&mut self, count: i64, total_length: i64) {
        if count == 0 {
            return;
        }
        let combined = self.count + count;
        self.mean_length =
            (self.mean_length * self.count as f64 + total_length as f64) / combined as f64;
        self.count = combined;
    }

    /// Combine with statistics gathered elsewhere
    pub fn merge(&mut self, other: &FragmentStats) {
        if other.count == 0 {
            return;
        }
        let combined = self.count + other.count;
        self.mean_length = (self.mean_length * self.count as f64
            + other.mean_length * other.count as f64)
            / combined as f64;
        self.count = combined;
    }
}

/// Running fragment count and length sum for one streaming pass
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct FragmentBatch {
    pub count: i64,
    pub total_length: i64,
}

impl FragmentBatch {
    pub fn add(&mut self, fragment: &Fragment<'_>) {
        self.count += 1;
        self.total_length += fragment.length();
    }
}

/// Forward and reverse 5' positions of one chromosome
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StrandedPositions {
    pub forward: Vec<i32>,
    pub reverse: Vec<i32>,
}

/// In-memory single-end track
#[derive(Debug, Clone, Default)]
pub struct TagLocations {
    buffer_size: usize,
    chroms: HashMap<Vec<u8>, StrandedPositions>,
    reference_lengths: ReferenceLengths,
    total: u64,
}

impl TagLocations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of tags added
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Chromosome names in sorted order
    pub fn chromosomes(&self) -> Vec<&[u8]> {
        let mut names: Vec<&[u8]> = self.chroms.keys().map(Vec::as_slice).collect();
        names.sort_unstable();
        names
    }

    pub fn positions(&self, chrom: &[u8]) -> Option<&StrandedPositions> {
        self.chroms.get(chrom)
    }

    pub fn reference_lengths(&self) -> &ReferenceLengths {
        &self.reference_lengths
    }
}

impl WithBufferSize for TagLocations {
    fn with_buffer_size(buffer_size: usize) -> Self {
        Self {
            buffer_size,
            ..Self::default()
        }
    }
}

impl TagTrack for TagLocations {
    fn add_location(&mut self, chrom: &[u8], position: i32, strand: Strand) {
        if !self.chroms.contains_key(chrom) {
            let positions = StrandedPositions {
                forward: Vec::with_capacity(self.buffer_size),
                reverse: Vec::with_capacity(self.buffer_size),
            };
            self.chroms.insert(chrom.to_vec(), positions);
        }
        if let Some(positions) = self.chroms.get_mut(chrom) {
            match strand {
                Strand::Forward => positions.forward.push(position),
                Strand::Reverse => positions.reverse.push(position),
            }
            self.total += 1;
        }
    }

    fn set_reference_lengths(&mut self, lengths: ReferenceLengths) {
        self.reference_lengths = lengths;
    }
}

/// In-memory paired-end track
#[derive(Debug, Clone, Default)]
pub struct FragmentLocations {
    buffer_size: usize,
    chroms: HashMap<Vec<u8>, Vec<(i32, i32)>>,
    reference_lengths: ReferenceLengths,
    total: u64,
}

impl FragmentLocations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of fragments added
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Chromosome names in sorted order
    pub fn chromosomes(&self) -> Vec<&[u8]> {
        let mut names: Vec<&[u8]> = self.chroms.keys().map(Vec::as_slice).collect();
        names.sort_unstable();
        names
    }

    pub fn fragments(&self, chrom: &[u8]) -> Option<&[(i32, i32)]> {
        self.chroms.get(chrom).map(Vec::as_slice)
    }

    pub fn reference_lengths(&self) -> &ReferenceLengths {
        &self.reference_lengths
    }
}

impl WithBufferSize for FragmentLocations {
    fn with_buffer_size(buffer_size: usize) -> Self {
        Self {
            buffer_size,
            ..Self::default()
        }
    }
}

impl FragmentTrack for FragmentLocations {
    fn add_location(&mut self, chrom: &[u8], left: i32, right: i32) {
        match self.chroms.get_mut(chrom) {
            Some(fragments) => fragments.push((left, right)),
            None => {
                let mut fragments = Vec::with_capacity(self.buffer_size);
                fragments.push((left, right));
                self.chroms.insert(chrom.to_vec(), fragments);
            }
        }
        self.total += 1;
    }

    fn set_reference_lengths(&mut self, lengths: ReferenceLengths) {
        self.reference_lengths = lengths;
    }
}
