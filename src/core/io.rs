//! Byte sources for alignment files
//!
//! Provides compression-transparent buffered reading with the ability to
//! go back to the start of the logical (decompressed) stream, plus a
//! line reader that can push one line back for header skipping.

use bzip2::read::BzDecoder;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Large buffer size for multi-gigabyte inputs (1MB)
pub const LARGE_BUFFER_SIZE: usize = 1024 * 1024;

/// Number of decompressed bytes read to confirm gzip framing
const GZIP_PROBE_LEN: usize = 10;

/// Compression format of an input file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    /// Plain (uncompressed)
    Plain,
    /// Gzip compressed, including BGZF
    Gzip,
    /// Bzip2 compressed
    Bzip2,
}

/// A buffered byte stream that can be restarted from logical offset 0
pub trait ByteSource: BufRead {
    /// Reposition at the first byte of the (decompressed) stream
    fn rewind_to_start(&mut self) -> io::Result<()>;

    /// Compression of the underlying file
    fn compression(&self) -> CompressionFormat {
        CompressionFormat::Plain
    }
}

impl<T: AsRef<[u8]>> ByteSource for Cursor<T> {
    fn rewind_to_start(&mut self) -> io::Result<()> {
        self.set_position(0);
        Ok(())
    }
}

/// Read as many bytes as are available into `buf`, stopping early at EOF
pub fn read_up_to<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Detect compression from file content
///
/// A file is gzip when it starts with the gzip magic bytes (1f 8b) and the
/// first bytes decode; bzip2 when it starts with "BZh"; plain otherwise.
pub fn detect_compression(path: &Path) -> io::Result<CompressionFormat> {
    let mut file = File::open(path)?;
    let mut magic = [0u8; 3];
    let bytes_read = read_up_to(&mut file, &mut magic)?;

    if bytes_read >= 2 && magic[0] == 0x1f && magic[1] == 0x8b {
        let mut probe = [0u8; GZIP_PROBE_LEN];
        let mut decoder = MultiGzDecoder::new(File::open(path)?);
        return Ok(match read_up_to(&mut decoder, &mut probe) {
            Ok(_) => CompressionFormat::Gzip,
            Err(_) => CompressionFormat::Plain,
        });
    }
    if bytes_read == 3 && &magic == b"BZh" {
        return Ok(CompressionFormat::Bzip2);
    }
    Ok(CompressionFormat::Plain)
}

enum SourceReader {
    Plain(BufReader<File>),
    Gzip(BufReader<MultiGzDecoder<File>>),
    Bzip2(BufReader<BzDecoder<File>>),
}

/// File-backed byte source with transparent decompression
pub struct InputSource {
    path: PathBuf,
    compression: CompressionFormat,
    capacity: usize,
    reader: SourceReader,
}

impl InputSource {
    /// Open a file with the large default buffer
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Self::with_capacity(path, LARGE_BUFFER_SIZE)
    }

    /// Open a file with a specific buffer size
    pub fn with_capacity<P: AsRef<Path>>(path: P, capacity: usize) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let compression = detect_compression(&path)?;
        let reader = Self::open_reader(&path, compression, capacity)?;
        Ok(Self {
            path,
            compression,
            capacity,
            reader,
        })
    }

    fn open_reader(
        path: &Path,
        compression: CompressionFormat,
        capacity: usize,
    ) -> io::Result<SourceReader> {
        let file = File::open(path)?;
        Ok(match compression {
            CompressionFormat::Plain => SourceReader::Plain(BufReader::with_capacity(capacity, file)),
            CompressionFormat::Gzip => {
                SourceReader::Gzip(BufReader::with_capacity(capacity, MultiGzDecoder::new(file)))
            }
            CompressionFormat::Bzip2 => {
                SourceReader::Bzip2(BufReader::with_capacity(capacity, BzDecoder::new(file)))
            }
        })
    }
}

impl Read for InputSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.reader {
            SourceReader::Plain(reader) => reader.read(buf),
            SourceReader::Gzip(reader) => reader.read(buf),
            SourceReader::Bzip2(reader) => reader.read(buf),
        }
    }
}

impl BufRead for InputSource {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match &mut self.reader {
            SourceReader::Plain(reader) => reader.fill_buf(),
            SourceReader::Gzip(reader) => reader.fill_buf(),
            SourceReader::Bzip2(reader) => reader.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match &mut self.reader {
            SourceReader::Plain(reader) => reader.consume(amt),
            SourceReader::Gzip(reader) => reader.consume(amt),
            SourceReader::Bzip2(reader) => reader.consume(amt),
        }
    }
}

impl ByteSource for InputSource {
    fn rewind_to_start(&mut self) -> io::Result<()> {
        match &mut self.reader {
            SourceReader::Plain(reader) => reader.seek(SeekFrom::Start(0)).map(|_| ()),
            // compressed streams restart by decoding again from the first byte
            _ => {
                self.reader = Self::open_reader(&self.path, self.compression, self.capacity)?;
                Ok(())
            }
        }
    }

    fn compression(&self) -> CompressionFormat {
        self.compression
    }
}

/// Line and record reader with single-line push-back
///
/// `unread_line` returns the most recent line to the front of the stream,
/// so the next read (line-wise or byte-wise) starts with it again.
pub struct RecordReader<S> {
    source: S,
    pending: Vec<u8>,
    pending_pos: usize,
    line: Vec<u8>,
}

impl<S: ByteSource> RecordReader<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            pending: Vec::new(),
            pending_pos: 0,
            line: Vec::with_capacity(1024),
        }
    }

    /// Read the next line without its line terminator
    /// Returns Ok(None) at EOF
    pub fn next_line(&mut self) -> io::Result<Option<&[u8]>> {
        let mut line = std::mem::take(&mut self.line);
        line.clear();
        let read = self.read_until(b'\n', &mut line);
        self.line = line;
        if read? == 0 {
            return Ok(None);
        }
        Ok(Some(trim_line_end(&self.line)))
    }

    /// Push the line returned by the last `next_line` back onto the stream
    pub fn unread_line(&mut self) {
        let mut pending = std::mem::take(&mut self.line);
        pending.extend_from_slice(&self.pending[self.pending_pos..]);
        self.pending = pending;
        self.pending_pos = 0;
    }

    /// Go back to the first byte of the stream, dropping any pushed-back line
    pub fn rewind(&mut self) -> io::Result<()> {
        self.pending.clear();
        self.pending_pos = 0;
        self.source.rewind_to_start()
    }

    /// Skip `n` bytes, returning how many were actually available
    pub fn skip_bytes(&mut self, n: u64) -> io::Result<u64> {
        io::copy(&mut Read::take(&mut *self, n), &mut io::sink())
    }

    /// Compression of the underlying source
    pub fn compression(&self) -> CompressionFormat {
        self.source.compression()
    }
}

impl<S: ByteSource> Read for RecordReader<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = {
            let available = self.fill_buf()?;
            let n = available.len().min(buf.len());
            buf[..n].copy_from_slice(&available[..n]);
            n
        };
        self.consume(n);
        Ok(n)
    }
}

impl<S: ByteSource> BufRead for RecordReader<S> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.pending_pos < self.pending.len() {
            return Ok(&self.pending[self.pending_pos..]);
        }
        self.source.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        if self.pending_pos < self.pending.len() {
            self.pending_pos = (self.pending_pos + amt).min(self.pending.len());
            if self.pending_pos == self.pending.len() {
                self.pending.clear();
                self.pending_pos = 0;
            }
        } else {
            self.source.consume(amt);
        }
    }
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
