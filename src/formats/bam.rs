//! BAM binary format, single-end and paired-end
//!
//! Records are decoded straight from their little-endian binary layout;
//! only the fixed fields and, for reverse-strand reads, the packed CIGAR
//! are touched. The gzip/BGZF layer is handled by the byte source.
//!
//! ```text
//! offset  field           type
//! 0       refID           i32
//! 4       pos             i32
//! 8       l_read_name     u8
//! 9       mapq            u8
//! 10      bin             u16
//! 12      n_cigar_op      u16
//! 14      flag            u16
//! 16      l_seq           i32
//! 20      next_refID      i32
//! 24      next_pos        i32
//! 28      tlen            i32
//! 32      read_name, then n_cigar_op x u32 CIGAR
//! ```

use crate::core::alignment::{packed_cigar_reference_length, passes_flag_filter, FLAG_REVERSE};
use crate::core::error::{ParseError, Result};
use crate::core::format::Format;
use crate::core::io::{read_up_to, ByteSource, CompressionFormat, InputSource, RecordReader};
use crate::core::parser::{
    AlignmentParser, FragmentParser, ParserOptions, TagParser, TagSizeSampler, PROGRESS_INTERVAL,
};
use crate::core::track::{
    Fragment, FragmentBatch, FragmentStats, FragmentTrack, ReferenceLengths, Strand, Tag, TagTrack,
};
use log::{debug, info};
use std::io::{self, Read};
use std::marker::PhantomData;
use std::path::Path;

/// First three bytes of a decompressed BAM stream
pub const BAM_MAGIC: &[u8; 3] = b"BAM";

/// Bytes of fixed-width fields at the start of every alignment record
pub const FIXED_FIELDS_LEN: usize = 32;

fn read_i32<R: Read>(reader: &mut R, what: &str) -> Result<i32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => ParseError::InvalidBam(format!("header truncated in {}", what)),
        _ => ParseError::Io(e),
    })?;
    Ok(i32::from_le_bytes(buf))
}

fn non_negative(value: i32, what: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| ParseError::InvalidBam(format!("negative {}: {}", what, value)))
}

/// Reference sequences declared in the BAM header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceTable {
    names: Vec<Vec<u8>>,
    lengths: ReferenceLengths,
    records_offset: u64,
}

impl ReferenceTable {
    /// Parse the header from the start of a decompressed BAM stream,
    /// leaving the reader at the first alignment record
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => ParseError::InvalidBam("missing magic".to_string()),
            _ => ParseError::Io(e),
        })?;
        if &magic[..3] != BAM_MAGIC {
            return Err(ParseError::InvalidBam("missing magic".to_string()));
        }

        let l_text = non_negative(read_i32(reader, "header length")?, "header length")?;
        let skipped = io::copy(&mut Read::take(&mut *reader, l_text), &mut io::sink())?;
        if skipped != l_text {
            return Err(ParseError::InvalidBam(format!(
                "header text truncated: expected {} bytes, found {}",
                l_text, skipped
            )));
        }

        let n_ref = non_negative(read_i32(reader, "reference count")?, "reference count")?;
        let mut names = Vec::new();
        let mut lengths = ReferenceLengths::new();
        let mut records_offset = 12 + l_text;

        for _ in 0..n_ref {
            let l_name = non_negative(read_i32(reader, "reference name length")?, "name length")?;
            if l_name == 0 {
                return Err(ParseError::InvalidBam("empty reference name".to_string()));
            }
            let mut name = Vec::new();
            Read::take(&mut *reader, l_name).read_to_end(&mut name)?;
            if name.len() as u64 != l_name {
                return Err(ParseError::InvalidBam("reference name truncated".to_string()));
            }
            // drop the NUL terminator
            name.pop();
            let l_ref = read_i32(reader, "reference length")?;

            records_offset += 8 + l_name;
            lengths.insert(name.clone(), l_ref);
            names.push(name);
        }

        Ok(Self {
            names,
            lengths,
            records_offset,
        })
    }

    /// Reference names in header order
    pub fn names(&self) -> &[Vec<u8>] {
        &self.names
    }

    pub fn lengths(&self) -> &ReferenceLengths {
        &self.lengths
    }

    /// Name of the reference with index `ref_id`
    pub fn name(&self, ref_id: i32) -> Result<&[u8]> {
        usize::try_from(ref_id)
            .ok()
            .and_then(|index| self.names.get(index))
            .map(Vec::as_slice)
            .ok_or(ParseError::UnknownReference(ref_id))
    }

    /// Byte offset of the first alignment record in the decompressed stream
    pub fn records_offset(&self) -> u64 {
        self.records_offset
    }

}

/// Read the next length-prefixed record into `buf`
///
/// Returns false when fewer than four bytes remain for the length prefix,
/// which is how the stream ends.
pub fn read_record<R: Read>(reader: &mut R, buf: &mut Vec<u8>) -> Result<bool> {
    let mut prefix = [0u8; 4];
    if read_up_to(reader, &mut prefix)? < prefix.len() {
        return Ok(false);
    }
    let block_size = i32::from_le_bytes(prefix);
    let block_size = usize::try_from(block_size)
        .map_err(|_| ParseError::InvalidBam(format!("negative record length {}", block_size)))?;

    buf.clear();
    Read::take(&mut *reader, block_size as u64).read_to_end(buf)?;
    if buf.len() < block_size {
        return Err(ParseError::TruncatedRecord {
            needed: block_size,
            available: buf.len(),
        });
    }
    Ok(true)
}

/// Bounds-checked view of one alignment record (without its length prefix)
#[derive(Debug, Clone, Copy)]
pub struct BamRecord<'a> {
    data: &'a [u8],
}

impl<'a> BamRecord<'a> {
    pub fn new(data: &'a [u8]) -> Result<Self> {
        if data.len() < FIXED_FIELDS_LEN {
            return Err(ParseError::TruncatedRecord {
                needed: FIXED_FIELDS_LEN,
                available: data.len(),
            });
        }
        Ok(Self { data })
    }

    fn i32_at(&self, offset: usize) -> i32 {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&self.data[offset..offset + 4]);
        i32::from_le_bytes(buf)
    }

    fn u16_at(&self, offset: usize) -> u16 {
        u16::from_le_bytes([self.data[offset], self.data[offset + 1]])
    }

    pub fn reference_id(&self) -> i32 {
        self.i32_at(0)
    }

    /// 0-based leftmost position
    pub fn position(&self) -> i32 {
        self.i32_at(4)
    }

    pub fn read_name_len(&self) -> usize {
        usize::from(self.data[8])
    }

    pub fn cigar_op_count(&self) -> usize {
        usize::from(self.u16_at(12))
    }

    pub fn flag(&self) -> u16 {
        self.u16_at(14)
    }

    pub fn sequence_len(&self) -> i32 {
        self.i32_at(16)
    }

    pub fn next_position(&self) -> i32 {
        self.i32_at(24)
    }

    /// Signed observed template length
    pub fn template_len(&self) -> i32 {
        self.i32_at(28)
    }

    /// Packed CIGAR operations: length in the upper 28 bits, code in the low 4
    pub fn cigar(&self) -> Result<impl Iterator<Item = u32> + 'a> {
        let start = FIXED_FIELDS_LEN + self.read_name_len();
        let end = start + 4 * self.cigar_op_count();
        if end > self.data.len() {
            return Err(ParseError::TruncatedRecord {
                needed: end,
                available: self.data.len(),
            });
        }
        let data: &'a [u8] = self.data;
        Ok(data[start..end]
            .chunks_exact(4)
            .map(|op| u32::from_le_bytes([op[0], op[1], op[2], op[3]])))
    }

    /// Reference bases covered by the alignment
    pub fn reference_span(&self) -> Result<i32> {
        Ok(packed_cigar_reference_length(self.cigar()?))
    }
}

/// Accepted single-end alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BamTag {
    pub reference_id: i32,
    pub position: i32,
    pub strand: Strand,
}

/// Accepted paired-end alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BamFragment {
    pub reference_id: i32,
    pub left: i32,
    pub length: i32,
}

impl BamFragment {
    /// Right end of the fragment, `left + length`
    pub fn right(&self) -> Result<i32> {
        self.left.checked_add(self.length).ok_or_else(|| {
            ParseError::InvalidBam(format!(
                "fragment at {} with length {} ends past the coordinate range",
                self.left, self.length
            ))
        })
    }
}

/// Decode one record into a 5' position, `None` if it is filtered out
pub fn decode_tag(data: &[u8]) -> Result<Option<BamTag>> {
    let record = BamRecord::new(data)?;
    let flag = record.flag();
    if !passes_flag_filter(flag) || record.reference_id() < 0 {
        return Ok(None);
    }

    let tag = if flag & FLAG_REVERSE != 0 {
        let span = record.reference_span()?;
        let position = record.position().checked_add(span).ok_or_else(|| {
            ParseError::InvalidBam(format!(
                "alignment at {} spanning {} bases ends past the coordinate range",
                record.position(),
                span
            ))
        })?;
        BamTag {
            reference_id: record.reference_id(),
            position,
            strand: Strand::Reverse,
        }
    } else {
        BamTag {
            reference_id: record.reference_id(),
            position: record.position(),
            strand: Strand::Forward,
        }
    };
    Ok(Some(tag))
}

/// Decode one record into a fragment start and length, `None` if filtered out
pub fn decode_fragment(data: &[u8]) -> Result<Option<BamFragment>> {
    let record = BamRecord::new(data)?;
    if !passes_flag_filter(record.flag()) || record.reference_id() < 0 {
        return Ok(None);
    }

    let template_len = record.template_len();
    let length = template_len
        .checked_abs()
        .ok_or_else(|| ParseError::InvalidBam(format!("template length {}", template_len)))?;
    Ok(Some(BamFragment {
        reference_id: record.reference_id(),
        left: record.position().min(record.next_position()),
        length,
    }))
}

/// Single-end decoding mode
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleEnd;

/// Paired-end decoding mode
#[derive(Debug, Clone, Copy, Default)]
pub struct PairedEnd;

pub trait BamMode {
    const FORMAT: Format;
}

impl BamMode for SingleEnd {
    const FORMAT: Format = Format::Bam;
}

impl BamMode for PairedEnd {
    const FORMAT: Format = Format::Bampe;
}

/// Streaming BAM parser
///
/// The header is parsed once; later passes skip straight over it.
pub struct BamParser<M = SingleEnd, S = InputSource> {
    reader: Option<RecordReader<S>>,
    compression: CompressionFormat,
    references: Option<ReferenceTable>,
    tag_size: Option<i32>,
    buffer_size: usize,
    record: Vec<u8>,
    _mode: PhantomData<M>,
}

pub type BamPeParser<S = InputSource> = BamParser<PairedEnd, S>;

impl<M: BamMode> BamParser<M, InputSource> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, ParserOptions::default())
    }

    pub fn open_with<P: AsRef<Path>>(path: P, options: ParserOptions) -> Result<Self> {
        let source = InputSource::with_capacity(path, options.read_buffer_size)?;
        Ok(Self::from_source(source, options))
    }
}

impl<M: BamMode, S: ByteSource> BamParser<M, S> {
    pub fn from_source(source: S, options: ParserOptions) -> Self {
        let reader = RecordReader::new(source);
        Self {
            compression: reader.compression(),
            reader: Some(reader),
            references: None,
            tag_size: None,
            buffer_size: options.buffer_size,
            record: Vec::with_capacity(1024),
            _mode: PhantomData,
        }
    }

    fn reader_mut(&mut self) -> Result<&mut RecordReader<S>> {
        self.reader.as_mut().ok_or(ParseError::Closed)
    }

    /// Rewind and position the stream at the first alignment record
    fn seek_to_records(&mut self) -> Result<()> {
        let records_offset = self.references.as_ref().map(ReferenceTable::records_offset);
        let reader = self.reader.as_mut().ok_or(ParseError::Closed)?;
        reader.rewind()?;
        match records_offset {
            Some(offset) => {
                if reader.skip_bytes(offset)? != offset {
                    return Err(ParseError::InvalidBam("header shorter than on first read".to_string()));
                }
            }
            None => {
                let table = ReferenceTable::read(reader)?;
                debug!("{}: {} references in header", M::FORMAT, table.names().len());
                self.references = Some(table);
            }
        }
        Ok(())
    }

    /// Reference table from the header, parsed on first use
    ///
    /// Leaves the stream at its start.
    pub fn references(&mut self) -> Result<&ReferenceTable> {
        if self.references.is_none() {
            self.seek_to_records()?;
            self.reader_mut()?.rewind()?;
        }
        self.references
            .as_ref()
            .ok_or_else(|| ParseError::InvalidBam("reference table missing".to_string()))
    }
}

impl<M: BamMode, S: ByteSource> AlignmentParser for BamParser<M, S> {
    fn format(&self) -> Format {
        M::FORMAT
    }

    fn is_gzip_compressed(&self) -> bool {
        self.compression == CompressionFormat::Gzip
    }

    fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Mean sequence length of the first ten records, without flag filtering
    fn estimate_tag_size(&mut self) -> Result<i32> {
        if let Some(tag_size) = self.tag_size {
            return Ok(tag_size);
        }

        self.seek_to_records()?;
        let reader = self.reader.as_mut().ok_or(ParseError::Closed)?;
        let mut sampler = TagSizeSampler::default();
        while !sampler.is_full() && read_record(reader, &mut self.record)? {
            sampler.push(BamRecord::new(&self.record)?.sequence_len());
        }
        reader.rewind()?;

        let tag_size = sampler.mean();
        debug!("{}: tag size {}", M::FORMAT, tag_size);
        self.tag_size = Some(tag_size);
        Ok(tag_size)
    }

    /// Check the magic bytes, then require a positive tag size
    ///
    /// Once the magic matches, a broken header or a non-positive tag size is
    /// an error rather than a rejection.
    fn sniff(&mut self) -> Result<bool> {
        let reader = self.reader_mut()?;
        reader.rewind()?;
        let mut magic = [0u8; 3];
        let is_bam = read_up_to(reader, &mut magic)? == magic.len() && &magic == BAM_MAGIC;
        reader.rewind()?;
        if !is_bam {
            return Ok(false);
        }

        let tag_size = self.estimate_tag_size()?;
        self.reader_mut()?.rewind()?;
        if tag_size > 0 {
            Ok(true)
        } else {
            Err(ParseError::InvalidBam(format!(
                "magic matched but tag size is {}",
                tag_size
            )))
        }
    }

    fn close(&mut self) {
        self.reader = None;
    }
}

impl<S: ByteSource> TagParser for BamParser<SingleEnd, S> {
    fn append_to_track(&mut self, track: &mut dyn TagTrack) -> Result<()> {
        self.seek_to_records()?;
        let Self {
            reader,
            references,
            record,
            ..
        } = self;
        let reader = reader.as_mut().ok_or(ParseError::Closed)?;
        let table = references
            .as_ref()
            .ok_or_else(|| ParseError::InvalidBam("reference table missing".to_string()))?;

        let mut added: u64 = 0;
        while read_record(reader, record)? {
            let Some(decoded) = decode_tag(record)? else {
                continue;
            };
            let tag = Tag::new(table.name(decoded.reference_id)?, decoded.position, decoded.strand);
            if tag.is_placed() {
                track.add_location(tag.chrom, tag.position, tag.strand);
                added += 1;
                if added % PROGRESS_INTERVAL == 0 {
                    debug!(" {}", added);
                }
            }
        }
        track.set_reference_lengths(table.lengths().clone());
        info!("{}: {} tags read", Format::Bam, added);
        self.close();
        Ok(())
    }
}

fn read_fragments<S: ByteSource>(
    reader: &mut RecordReader<S>,
    table: &ReferenceTable,
    record: &mut Vec<u8>,
    track: &mut dyn FragmentTrack,
    batch: &mut FragmentBatch,
) -> Result<()> {
    while read_record(reader, record)? {
        let Some(decoded) = decode_fragment(record)? else {
            continue;
        };
        let chrom = table.name(decoded.reference_id)?;
        let fragment = Fragment::new(chrom, decoded.left, decoded.right()?)?;
        if !fragment.is_placed() {
            continue;
        }
        batch.add(&fragment);
        track.add_location(fragment.chrom, fragment.left, fragment.right);
        if batch.count as u64 % PROGRESS_INTERVAL == 0 {
            debug!(" {}", batch.count);
        }
    }
    Ok(())
}

impl<S: ByteSource> FragmentParser for BamParser<PairedEnd, S> {
    fn append_to_fragment_track(
        &mut self,
        track: &mut dyn FragmentTrack,
        stats: &mut FragmentStats,
    ) -> Result<()> {
        self.seek_to_records()?;
        let Self {
            reader,
            references,
            record,
            ..
        } = self;
        let reader = reader.as_mut().ok_or(ParseError::Closed)?;
        let table = references
            .as_ref()
            .ok_or_else(|| ParseError::InvalidBam("reference table missing".to_string()))?;

        let mut batch = FragmentBatch::default();
        let streamed = read_fragments(reader, table, record, track, &mut batch);
        // fragments added before a failure still count
        stats.add_batch(batch.count, batch.total_length);
        streamed?;

        track.set_reference_lengths(table.lengths().clone());
        info!(
            "{}: {} fragments read, mean fragment length {:.1}",
            Format::Bampe,
            batch.count,
            stats.mean_length
        );
        self.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::track::{FragmentLocations, TagLocations};
    use std::io::Cursor;

    fn header(refs: &[(&str, i32)]) -> Vec<u8> {
        let text = b"@HD\tVN:1.6\n";
        let mut out = b"BAM\x01".to_vec();
        out.extend_from_slice(&(text.len() as i32).to_le_bytes());
        out.extend_from_slice(text);
        out.extend_from_slice(&(refs.len() as i32).to_le_bytes());
        for (name, len) in refs {
            out.extend_from_slice(&(name.len() as i32 + 1).to_le_bytes());
            out.extend_from_slice(name.as_bytes());
            out.push(0);
            out.extend_from_slice(&len.to_le_bytes());
        }
        out
    }

    struct Rec {
        ref_id: i32,
        pos: i32,
        flag: u16,
        cigar: Vec<u32>,
        l_seq: i32,
        next_pos: i32,
        tlen: i32,
    }

    impl Rec {
        fn new(ref_id: i32, pos: i32, flag: u16, cigar: &[(u32, u32)]) -> Self {
            Self {
                ref_id,
                pos,
                flag,
                cigar: cigar.iter().map(|&(len, op)| len << 4 | op).collect(),
                l_seq: 36,
                next_pos: -1,
                tlen: 0,
            }
        }

        fn payload(&self) -> Vec<u8> {
            let name = b"read\0";
            let mut out = Vec::new();
            out.extend_from_slice(&self.ref_id.to_le_bytes());
            out.extend_from_slice(&self.pos.to_le_bytes());
            out.push(name.len() as u8);
            out.push(60);
            out.extend_from_slice(&0u16.to_le_bytes());
            out.extend_from_slice(&(self.cigar.len() as u16).to_le_bytes());
            out.extend_from_slice(&self.flag.to_le_bytes());
            out.extend_from_slice(&self.l_seq.to_le_bytes());
            out.extend_from_slice(&self.ref_id.to_le_bytes());
            out.extend_from_slice(&self.next_pos.to_le_bytes());
            out.extend_from_slice(&self.tlen.to_le_bytes());
            out.extend_from_slice(name);
            for op in &self.cigar {
                out.extend_from_slice(&op.to_le_bytes());
            }
            out
        }
    }

    fn bam(refs: &[(&str, i32)], records: &[Rec]) -> Vec<u8> {
        let mut out = header(refs);
        for record in records {
            let payload = record.payload();
            out.extend_from_slice(&(payload.len() as i32).to_le_bytes());
            out.extend_from_slice(&payload);
        }
        out
    }

    #[test]
    fn test_reference_table() -> Result<()> {
        let data = header(&[("chr1", 1000), ("chr2", 500)]);
        let table = ReferenceTable::read(&mut Cursor::new(&data))?;
        assert_eq!(table.names(), &[b"chr1".to_vec(), b"chr2".to_vec()]);
        assert_eq!(table.lengths().get(&b"chr2"[..]), Some(&500));
        assert_eq!(table.records_offset(), data.len() as u64);
        assert_eq!(table.name(1)?, b"chr2");
        assert!(matches!(table.name(2), Err(ParseError::UnknownReference(2))));
        Ok(())
    }

    #[test]
    fn test_decode_forward_and_reverse() -> Result<()> {
        let forward = Rec::new(0, 99, 0, &[(10, 0)]).payload();
        assert_eq!(
            decode_tag(&forward)?,
            Some(BamTag { reference_id: 0, position: 99, strand: Strand::Forward })
        );

        // 2S 5M 3D 2I 5M 100N 4M
        let cigar = [(2, 4), (5, 0), (3, 2), (2, 1), (5, 0), (100, 3), (4, 0)];
        let reverse = Rec::new(0, 99, FLAG_REVERSE, &cigar).payload();
        assert_eq!(decode_tag(&reverse)?.map(|tag| tag.position), Some(99 + 117));
        Ok(())
    }

    #[test]
    fn test_reverse_end_past_i32_is_error() -> Result<()> {
        let reverse = Rec::new(0, i32::MAX - 5, FLAG_REVERSE, &[(10, 0)]).payload();
        assert!(matches!(decode_tag(&reverse), Err(ParseError::InvalidBam(_))));

        let reverse = Rec::new(0, i32::MAX - 10, FLAG_REVERSE, &[(10, 0)]).payload();
        assert_eq!(decode_tag(&reverse)?.map(|tag| tag.position), Some(i32::MAX));

        let forward = Rec::new(0, i32::MAX - 5, 0, &[(10, 0)]).payload();
        assert_eq!(decode_tag(&forward)?.map(|tag| tag.position), Some(i32::MAX - 5));
        Ok(())
    }

    #[test]
    fn test_decode_filters_flags() -> Result<()> {
        for flag in [0x4, 0x100, 0x200, 0x800, 0x1, 0x1 | 0x2 | 0x80, 0x1 | 0x2 | 0x8] {
            let payload = Rec::new(0, 10, flag, &[(10, 0)]).payload();
            assert_eq!(decode_tag(&payload)?, None, "flag {}", flag);
        }
        let unplaced = Rec::new(-1, 10, 0, &[(10, 0)]).payload();
        assert_eq!(decode_tag(&unplaced)?, None);
        Ok(())
    }

    #[test]
    fn test_truncated_record() {
        assert!(matches!(
            decode_tag(&[0u8; 20]),
            Err(ParseError::TruncatedRecord { needed: 32, available: 20 })
        ));

        let mut payload = Rec::new(0, 10, FLAG_REVERSE, &[(10, 0), (5, 0)]).payload();
        payload.truncate(payload.len() - 2);
        assert!(matches!(decode_tag(&payload), Err(ParseError::TruncatedRecord { .. })));
    }

    #[test]
    fn test_decode_fragment_uses_leftmost_mate() -> Result<()> {
        let mut record = Rec::new(0, 500, 0x1 | 0x2 | 0x10 | 0x40, &[(36, 0)]);
        record.next_pos = 300;
        record.tlen = -236;
        let fragment = decode_fragment(&record.payload())?.unwrap();
        assert_eq!(fragment, BamFragment { reference_id: 0, left: 300, length: 236 });
        Ok(())
    }

    #[test]
    fn test_sniff_and_build_single_end() -> Result<()> {
        let records = vec![
            Rec::new(0, 100, 0, &[(36, 0)]),
            Rec::new(1, 200, FLAG_REVERSE, &[(36, 0)]),
            Rec::new(0, 300, 0x4, &[]),
        ];
        let data = bam(&[("chr1", 1000), ("chr2", 2000)], &records);
        let mut parser = BamParser::<SingleEnd, _>::from_source(Cursor::new(data), ParserOptions::default());

        assert!(parser.sniff()?);
        assert_eq!(parser.estimate_tag_size()?, 36);
        assert_eq!(parser.references()?.names().len(), 2);

        let track: TagLocations = parser.build_single_end_track()?;
        assert_eq!(track.total(), 2);
        assert_eq!(track.positions(b"chr1").unwrap().forward, vec![100]);
        assert_eq!(track.positions(b"chr2").unwrap().reverse, vec![236]);
        assert_eq!(track.reference_lengths().get(&b"chr2"[..]), Some(&2000));
        assert!(matches!(parser.estimate_tag_size(), Ok(36)));
        assert!(matches!(parser.sniff(), Err(ParseError::Closed)));
        Ok(())
    }

    #[test]
    fn test_tags_before_chromosome_start_are_skipped() -> Result<()> {
        let records = vec![
            Rec::new(0, -1, 0, &[(36, 0)]),
            Rec::new(0, -20, FLAG_REVERSE, &[(10, 0)]),
            Rec::new(0, -20, FLAG_REVERSE, &[(36, 0)]),
            Rec::new(1, 50, 0, &[(36, 0)]),
            Rec::new(0, 0, 0, &[(36, 0)]),
        ];
        let data = bam(&[("chr1", 1000), ("", 1000)], &records);
        let mut parser = BamParser::<SingleEnd, _>::from_source(Cursor::new(data), ParserOptions::default());
        let track: TagLocations = parser.build_single_end_track()?;

        assert_eq!(track.total(), 2);
        assert_eq!(track.chromosomes(), vec![&b"chr1"[..]]);
        let chr1 = track.positions(b"chr1").unwrap();
        assert_eq!(chr1.forward, vec![0]);
        assert_eq!(chr1.reverse, vec![16]);
        Ok(())
    }

    #[test]
    fn test_sniff_rejects_text() -> Result<()> {
        let mut parser =
            BamParser::<SingleEnd, _>::from_source(Cursor::new(b"chr1\t1\t2\n".to_vec()), ParserOptions::default());
        assert!(!parser.sniff()?);
        Ok(())
    }

    #[test]
    fn test_sniff_magic_without_records_is_error() {
        let data = bam(&[("chr1", 1000)], &[]);
        let mut parser = BamParser::<SingleEnd, _>::from_source(Cursor::new(data), ParserOptions::default());
        assert!(matches!(parser.sniff(), Err(ParseError::InvalidBam(_))));
    }

    #[test]
    fn test_sniff_magic_with_corrupt_header_is_error() {
        let mut data = b"BAM\x01".to_vec();
        data.extend_from_slice(&1_000_000i32.to_le_bytes());
        data.extend_from_slice(b"short");
        let mut parser = BamParser::<SingleEnd, _>::from_source(Cursor::new(data), ParserOptions::default());
        assert!(matches!(parser.sniff(), Err(ParseError::InvalidBam(_))));
    }

    #[test]
    fn test_partial_length_prefix_ends_stream() -> Result<()> {
        let mut data = bam(&[("chr1", 1000)], &[Rec::new(0, 5, 0, &[(20, 0)])]);
        data.extend_from_slice(&[7, 0]);
        let mut parser = BamParser::<SingleEnd, _>::from_source(Cursor::new(data), ParserOptions::default());
        let track: TagLocations = parser.build_single_end_track()?;
        assert_eq!(track.total(), 1);
        Ok(())
    }

    #[test]
    fn test_build_paired_end_track() -> Result<()> {
        let mut first = Rec::new(0, 100, 0x1 | 0x2 | 0x40, &[(36, 0)]);
        first.next_pos = 250;
        first.tlen = 186;
        let mut second = Rec::new(0, 250, 0x1 | 0x2 | 0x10 | 0x80, &[(36, 0)]);
        second.next_pos = 100;
        second.tlen = -186;
        let mut other = Rec::new(0, 1000, 0x1 | 0x2 | 0x40, &[(36, 0)]);
        other.next_pos = 1100;
        other.tlen = 314;

        let data = bam(&[("chr1", 5000)], &[first, second, other]);
        let mut parser = BamParser::<PairedEnd, _>::from_source(Cursor::new(data), ParserOptions::default());
        let (track, stats): (FragmentLocations, FragmentStats) = parser.build_paired_end_track()?;

        assert_eq!(track.fragments(b"chr1").unwrap(), &[(100, 286), (1000, 1314)]);
        assert_eq!(stats.count, 2);
        assert!((stats.mean_length - 250.0).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn test_fragments_before_chromosome_start_are_skipped() -> Result<()> {
        let mut early = Rec::new(0, 40, 0x1 | 0x2 | 0x40, &[(36, 0)]);
        early.next_pos = -10;
        early.tlen = 86;
        let mut kept = Rec::new(0, 0, 0x1 | 0x2 | 0x40, &[(36, 0)]);
        kept.next_pos = 100;
        kept.tlen = 136;

        let data = bam(&[("chr1", 5000)], &[early, kept]);
        let mut parser = BamParser::<PairedEnd, _>::from_source(Cursor::new(data), ParserOptions::default());
        let (track, stats): (FragmentLocations, FragmentStats) = parser.build_paired_end_track()?;

        assert_eq!(track.fragments(b"chr1").unwrap(), &[(0, 136)]);
        assert_eq!(stats.count, 1);
        assert!((stats.mean_length - 136.0).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn test_fragment_end_past_i32_is_error() {
        let mut record = Rec::new(0, i32::MAX - 10, 0x1 | 0x2 | 0x40, &[(10, 0)]);
        record.next_pos = i32::MAX - 10;
        record.tlen = 100;
        let data = bam(&[("chr1", 5000)], &[record]);
        let mut parser = BamParser::<PairedEnd, _>::from_source(Cursor::new(data), ParserOptions::default());
        let mut track = FragmentLocations::new();
        let mut stats = FragmentStats::default();
        assert!(matches!(
            parser.append_to_fragment_track(&mut track, &mut stats),
            Err(ParseError::InvalidBam(_))
        ));
        assert_eq!(track.total(), 0);
    }

    #[test]
    fn test_stats_cover_fragments_added_before_failure() {
        let mut first = Rec::new(0, 100, 0x1 | 0x2 | 0x40, &[(36, 0)]);
        first.next_pos = 250;
        first.tlen = 186;
        let mut broken = Rec::new(0, 400, 0x1 | 0x2 | 0x40, &[(36, 0)]);
        broken.next_pos = 400;
        broken.tlen = 0;

        let data = bam(&[("chr1", 5000)], &[first, broken]);
        let mut parser = BamParser::<PairedEnd, _>::from_source(Cursor::new(data), ParserOptions::default());
        let mut track = FragmentLocations::new();
        let mut stats = FragmentStats::default();
        assert!(parser.append_to_fragment_track(&mut track, &mut stats).is_err());
        assert_eq!(track.total(), 1);
        assert_eq!(stats.count, 1);
        assert!((stats.mean_length - 186.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_template_length_is_error() {
        let mut record = Rec::new(0, 100, 0x1 | 0x2 | 0x40, &[(36, 0)]);
        record.next_pos = 100;
        record.tlen = 0;
        let data = bam(&[("chr1", 5000)], &[record]);
        let mut parser = BamParser::<PairedEnd, _>::from_source(Cursor::new(data), ParserOptions::default());
        let mut track = FragmentLocations::new();
        let mut stats = FragmentStats::default();
        assert!(matches!(
            parser.append_to_fragment_track(&mut track, &mut stats),
            Err(ParseError::InvalidFragment { .. })
        ));
    }
}
