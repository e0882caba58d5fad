//! Shared fixtures for integration tests: raw BAM byte builders and
//! temporary files

#![allow(dead_code)]

use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use tempfile::NamedTempFile;

/// CIGAR operation letters indexed by their BAM code
pub const CIGAR_LETTERS: &[u8; 9] = b"MIDNSHP=X";

/// One alignment record, described field by field
#[derive(Debug, Clone)]
pub struct BamFixture {
    pub reference_id: i32,
    pub position: i32,
    pub flag: u16,
    /// (length, code) pairs
    pub cigar: Vec<(u32, u32)>,
    pub sequence_len: i32,
    pub next_position: i32,
    pub template_len: i32,
}

impl BamFixture {
    pub fn single(reference_id: i32, position: i32, flag: u16, cigar: &[(u32, u32)]) -> Self {
        Self {
            reference_id,
            position,
            flag,
            cigar: cigar.to_vec(),
            sequence_len: 36,
            next_position: -1,
            template_len: 0,
        }
    }

    /// First mate of a proper pair spanning `[left, left + length)`
    pub fn first_mate(reference_id: i32, left: i32, length: i32) -> Self {
        Self {
            reference_id,
            position: left,
            flag: 0x1 | 0x2 | 0x20 | 0x40,
            cigar: vec![(36, 0)],
            sequence_len: 36,
            next_position: left + length.max(1) - 1,
            template_len: length,
        }
    }

    /// CIGAR in SAM text notation, `*` when empty
    pub fn cigar_string(&self) -> String {
        if self.cigar.is_empty() {
            return "*".to_string();
        }
        self.cigar
            .iter()
            .map(|&(len, code)| format!("{}{}", len, CIGAR_LETTERS[code as usize] as char))
            .collect()
    }

    /// Record payload without its length prefix
    pub fn payload(&self) -> Vec<u8> {
        let name = b"read\0";
        let mut out = Vec::with_capacity(64);
        out.extend_from_slice(&self.reference_id.to_le_bytes());
        out.extend_from_slice(&self.position.to_le_bytes());
        out.push(name.len() as u8);
        out.push(60);
        out.extend_from_slice(&4680u16.to_le_bytes());
        out.extend_from_slice(&(self.cigar.len() as u16).to_le_bytes());
        out.extend_from_slice(&self.flag.to_le_bytes());
        out.extend_from_slice(&self.sequence_len.to_le_bytes());
        out.extend_from_slice(&self.reference_id.to_le_bytes());
        out.extend_from_slice(&self.next_position.to_le_bytes());
        out.extend_from_slice(&self.template_len.to_le_bytes());
        out.extend_from_slice(name);
        for &(len, code) in &self.cigar {
            out.extend_from_slice(&(len << 4 | code).to_le_bytes());
        }
        out
    }
}

/// Decompressed BAM header with the given references
pub fn bam_header(references: &[(&str, i32)]) -> Vec<u8> {
    let text = b"@HD\tVN:1.6\tSO:unsorted\n";
    let mut out = b"BAM\x01".to_vec();
    out.extend_from_slice(&(text.len() as i32).to_le_bytes());
    out.extend_from_slice(text);
    out.extend_from_slice(&(references.len() as i32).to_le_bytes());
    for (name, length) in references {
        out.extend_from_slice(&(name.len() as i32 + 1).to_le_bytes());
        out.extend_from_slice(name.as_bytes());
        out.push(0);
        out.extend_from_slice(&length.to_le_bytes());
    }
    out
}

/// Complete decompressed BAM stream
pub fn bam_bytes(references: &[(&str, i32)], records: &[BamFixture]) -> Vec<u8> {
    let mut out = bam_header(references);
    for record in records {
        let payload = record.payload();
        out.extend_from_slice(&(payload.len() as i32).to_le_bytes());
        out.extend_from_slice(&payload);
    }
    out
}

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub fn write_temp(data: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(data).unwrap();
    file.flush().unwrap();
    file
}

/// BED6 lines with uniform read length
pub fn uniform_bed(count: usize, length: i32) -> String {
    (0..count)
        .map(|i| {
            let start = i as i32 * 100;
            let strand = if i % 2 == 0 { '+' } else { '-' };
            format!("chr1\t{}\t{}\tr{}\t0\t{}\n", start, start + length, i, strand)
        })
        .collect()
}
