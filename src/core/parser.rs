//! The streaming parser contract shared by all alignment formats
//!
//! Every parser owns one byte source for its whole life. It may be sniffed
//! and asked for a tag size any number of times (both leave the stream at
//! the start of data), then drained exactly once into a track, after which
//! it is closed and further draining fails with [`ParseError::Closed`].
//!
//! Text formats only describe how to recognise header lines, how long a
//! record's tag is and how to decode one line ([`LineFormat`],
//! [`TagFormat`], [`FragmentFormat`]); [`TextParser`] supplies the shared
//! header skipping, tag-size estimation, sniffing and streaming loops.
//!
//! Decoded records that fall before the start of their chromosome, or that
//! name no chromosome, never reach a track.

use crate::core::error::{ParseError, Result};
use crate::core::format::Format;
use crate::core::io::{ByteSource, CompressionFormat, InputSource, RecordReader, LARGE_BUFFER_SIZE};
use crate::core::track::{
    placeholder_reference_lengths, Fragment, FragmentBatch, FragmentStats, FragmentTrack, Tag,
    TagTrack, WithBufferSize,
};
use log::{debug, info};
use std::marker::PhantomData;
use std::path::Path;

/// Default track buffer-size hint
pub const DEFAULT_TRACK_BUFFER_SIZE: usize = 100_000;

/// Successful tag-length samples needed for an estimate
pub const TAG_SIZE_SAMPLES: usize = 10;

/// Records examined at most while estimating the tag size
pub const TAG_SIZE_MAX_RECORDS: usize = 10_000;

/// A sniffed tag size must lie strictly between these bounds
pub const SNIFF_MIN_TAG_SIZE: i32 = 10;
pub const SNIFF_MAX_TAG_SIZE: i32 = 10_000;

/// Records between progress messages
pub(crate) const PROGRESS_INTERVAL: u64 = 1_000_000;

/// Parser configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserOptions {
    /// Size hint handed to newly built tracks
    pub buffer_size: usize,
    /// Buffer size of the byte source
    pub read_buffer_size: usize,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_TRACK_BUFFER_SIZE,
            read_buffer_size: LARGE_BUFFER_SIZE,
        }
    }
}

/// Capabilities common to every parser
pub trait AlignmentParser {
    fn format(&self) -> Format;

    fn is_gzip_compressed(&self) -> bool;

    /// Buffer-size hint for tracks built by this parser
    fn buffer_size(&self) -> usize;

    /// Mean tag length over the first records, or -1 if none could be measured
    ///
    /// Computed once and cached. A fresh computation leaves the stream at the
    /// start of data.
    fn estimate_tag_size(&mut self) -> Result<i32>;

    /// Whether the input looks like this parser's format
    fn sniff(&mut self) -> Result<bool>;

    /// Release the byte source
    fn close(&mut self);
}

/// Parser producing single-end tags
pub trait TagParser: AlignmentParser {
    /// Stream every record into an existing track, then close
    fn append_to_track(&mut self, track: &mut dyn TagTrack) -> Result<()>;

    /// Stream every record into a fresh track, then close
    fn build_single_end_track<T>(&mut self) -> Result<T>
    where
        T: TagTrack + WithBufferSize,
        Self: Sized,
    {
        let mut track = T::with_buffer_size(self.buffer_size());
        self.append_to_track(&mut track)?;
        Ok(track)
    }
}

/// Parser producing paired-end fragments
pub trait FragmentParser: AlignmentParser {
    /// Stream every fragment into an existing track, folding their lengths
    /// into `stats`, then close
    fn append_to_fragment_track(
        &mut self,
        track: &mut dyn FragmentTrack,
        stats: &mut FragmentStats,
    ) -> Result<()>;

    /// Stream every fragment into a fresh track, then close
    fn build_paired_end_track<T>(&mut self) -> Result<(T, FragmentStats)>
    where
        T: FragmentTrack + WithBufferSize,
        Self: Sized,
    {
        let mut track = T::with_buffer_size(self.buffer_size());
        let mut stats = FragmentStats::default();
        self.append_to_fragment_track(&mut track, &mut stats)?;
        Ok((track, stats))
    }
}

impl<P: AlignmentParser + ?Sized> AlignmentParser for Box<P> {
    fn format(&self) -> Format {
        (**self).format()
    }

    fn is_gzip_compressed(&self) -> bool {
        (**self).is_gzip_compressed()
    }

    fn buffer_size(&self) -> usize {
        (**self).buffer_size()
    }

    fn estimate_tag_size(&mut self) -> Result<i32> {
        (**self).estimate_tag_size()
    }

    fn sniff(&mut self) -> Result<bool> {
        (**self).sniff()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

impl<P: TagParser + ?Sized> TagParser for Box<P> {
    fn append_to_track(&mut self, track: &mut dyn TagTrack) -> Result<()> {
        (**self).append_to_track(track)
    }
}

impl<P: FragmentParser + ?Sized> FragmentParser for Box<P> {
    fn append_to_fragment_track(
        &mut self,
        track: &mut dyn FragmentTrack,
        stats: &mut FragmentStats,
    ) -> Result<()> {
        (**self).append_to_fragment_track(track, stats)
    }
}

/// Mean of up to [`TAG_SIZE_SAMPLES`] tag lengths
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TagSizeSampler {
    sum: i64,
    samples: usize,
}

impl TagSizeSampler {
    pub fn push(&mut self, length: i32) {
        self.sum += i64::from(length);
        self.samples += 1;
    }

    pub fn is_full(&self) -> bool {
        self.samples >= TAG_SIZE_SAMPLES
    }

    /// Integer-truncated mean, -1 without samples
    pub fn mean(&self) -> i32 {
        if self.samples == 0 {
            return -1;
        }
        (self.sum / self.samples as i64) as i32
    }
}

/// Whether a tag size is plausible for sequencing reads
pub fn tag_size_in_range(tag_size: i32) -> bool {
    tag_size > SNIFF_MIN_TAG_SIZE && tag_size < SNIFF_MAX_TAG_SIZE
}

/// Line-oriented format description
pub trait LineFormat {
    const FORMAT: Format;

    /// Whether a leading line is a header/comment rather than data
    fn is_header(_line: &[u8]) -> bool {
        false
    }

    /// Tag length of one line, `None` when it cannot be measured
    fn record_length(line: &[u8]) -> Option<i32>;
}

/// Line format yielding single-end tags
pub trait TagFormat: LineFormat {
    /// Decode one line; `None` means the line carries no usable alignment
    fn decode(line: &[u8]) -> Result<Option<Tag<'_>>>;
}

/// Line format yielding paired-end fragments
pub trait FragmentFormat: LineFormat {
    /// Decode one line; `None` means the line carries no fragment
    fn decode(line: &[u8]) -> Result<Option<Fragment<'_>>>;
}

/// Streaming parser for a tab-delimited text format
pub struct TextParser<F, S = InputSource> {
    reader: Option<RecordReader<S>>,
    compression: CompressionFormat,
    tag_size: Option<i32>,
    buffer_size: usize,
    _format: PhantomData<F>,
}

impl<F: LineFormat> TextParser<F, InputSource> {
    /// Open a file with default options
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, ParserOptions::default())
    }

    /// Open a file, detecting compression
    pub fn open_with<P: AsRef<Path>>(path: P, options: ParserOptions) -> Result<Self> {
        let source = InputSource::with_capacity(path, options.read_buffer_size)?;
        Self::from_source(source, options)
    }
}

impl<F: LineFormat, S: ByteSource> TextParser<F, S> {
    /// Wrap an already opened byte source and skip its header lines
    pub fn from_source(source: S, options: ParserOptions) -> Result<Self> {
        let mut reader = RecordReader::new(source);
        let compression = reader.compression();
        skip_header_lines::<F, S>(&mut reader)?;
        Ok(Self {
            reader: Some(reader),
            compression,
            tag_size: None,
            buffer_size: options.buffer_size,
            _format: PhantomData,
        })
    }

    fn reader_mut(&mut self) -> Result<&mut RecordReader<S>> {
        self.reader.as_mut().ok_or(ParseError::Closed)
    }
}

/// Consume leading header lines, leaving the stream at the first data line
fn skip_header_lines<F: LineFormat, S: ByteSource>(reader: &mut RecordReader<S>) -> Result<()> {
    while let Some(line) = reader.next_line()? {
        if !F::is_header(line) {
            reader.unread_line();
            break;
        }
    }
    Ok(())
}

impl<F: LineFormat, S: ByteSource> AlignmentParser for TextParser<F, S> {
    fn format(&self) -> Format {
        F::FORMAT
    }

    fn is_gzip_compressed(&self) -> bool {
        self.compression == CompressionFormat::Gzip
    }

    fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    fn estimate_tag_size(&mut self) -> Result<i32> {
        if let Some(tag_size) = self.tag_size {
            return Ok(tag_size);
        }

        let reader = self.reader_mut()?;
        let mut sampler = TagSizeSampler::default();
        let mut examined = 0;
        while !sampler.is_full() && examined < TAG_SIZE_MAX_RECORDS {
            let Some(line) = reader.next_line()? else {
                break;
            };
            examined += 1;
            if let Some(length) = F::record_length(line).filter(|&length| length > 0) {
                sampler.push(length);
            }
        }
        reader.rewind()?;
        skip_header_lines::<F, S>(reader)?;

        let tag_size = sampler.mean();
        debug!("{}: tag size {} from {} records", F::FORMAT, tag_size, examined);
        self.tag_size = Some(tag_size);
        Ok(tag_size)
    }

    fn sniff(&mut self) -> Result<bool> {
        let tag_size = self.estimate_tag_size()?;
        let reader = self.reader_mut()?;
        reader.rewind()?;
        skip_header_lines::<F, S>(reader)?;
        Ok(tag_size_in_range(tag_size))
    }

    fn close(&mut self) {
        self.reader = None;
    }
}

impl<F: TagFormat, S: ByteSource> TagParser for TextParser<F, S> {
    fn append_to_track(&mut self, track: &mut dyn TagTrack) -> Result<()> {
        let reader = self.reader_mut()?;
        let mut added: u64 = 0;
        while let Some(line) = reader.next_line()? {
            if let Some(tag) = F::decode(line)?.filter(Tag::is_placed) {
                track.add_location(tag.chrom, tag.position, tag.strand);
                added += 1;
                if added % PROGRESS_INTERVAL == 0 {
                    debug!(" {}", added);
                }
            }
        }
        info!("{}: {} tags read", F::FORMAT, added);
        self.close();
        Ok(())
    }
}

fn drain_fragments<F: FragmentFormat, S: ByteSource>(
    reader: &mut RecordReader<S>,
    track: &mut dyn FragmentTrack,
    batch: &mut FragmentBatch,
) -> Result<()> {
    while let Some(line) = reader.next_line()? {
        if let Some(fragment) = F::decode(line)?.filter(Fragment::is_placed) {
            batch.add(&fragment);
            track.add_location(fragment.chrom, fragment.left, fragment.right);
            if batch.count as u64 % PROGRESS_INTERVAL == 0 {
                debug!(" {}", batch.count);
            }
        }
    }
    Ok(())
}

impl<F: FragmentFormat, S: ByteSource> FragmentParser for TextParser<F, S> {
    fn append_to_fragment_track(
        &mut self,
        track: &mut dyn FragmentTrack,
        stats: &mut FragmentStats,
    ) -> Result<()> {
        let mut batch = FragmentBatch::default();
        let streamed = drain_fragments::<F, S>(self.reader_mut()?, track, &mut batch);
        // fragments added before a failure still count
        stats.add_batch(batch.count, batch.total_length);
        streamed?;

        info!(
            "{}: {} fragments read, mean fragment length {:.1}",
            F::FORMAT,
            batch.count,
            stats.mean_length
        );
        track.set_reference_lengths(placeholder_reference_lengths());
        self.close();
        Ok(())
    }
}
