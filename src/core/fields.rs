//! Tab-separated field access for text alignment formats

use crate::core::error::{ParseError, Result};
use memchr::memchr_iter;

/// The first `N` tab-separated fields of a line, plus the total field count
///
/// Fields beyond `N` are counted but not stored. Missing fields read as
/// empty slices, so callers check `count()` before relying on them.
#[derive(Debug, Clone, Copy)]
pub struct Fields<'a, const N: usize> {
    fields: [&'a [u8]; N],
    count: usize,
}

impl<'a, const N: usize> Fields<'a, N> {
    /// Split a line on tab characters
    pub fn split(line: &'a [u8]) -> Self {
        let mut fields: [&'a [u8]; N] = [&line[..0]; N];
        let mut count = 0;
        let mut start = 0;

        for tab in memchr_iter(b'\t', line) {
            if count < N {
                fields[count] = &line[start..tab];
            }
            count += 1;
            start = tab + 1;
        }
        if count < N {
            fields[count] = &line[start..];
        }
        count += 1;

        Self { fields, count }
    }

    /// Total number of fields in the line, at least one
    pub fn count(&self) -> usize {
        self.count
    }

    /// Field `index`, or an empty slice when the line is shorter
    ///
    /// Panics if `index >= N`.
    pub fn field(&self, index: usize) -> &'a [u8] {
        self.fields[index]
    }

    /// Field `index` if the line has it
    pub fn get(&self, index: usize) -> Option<&'a [u8]> {
        if index < self.count && index < N {
            Some(self.fields[index])
        } else {
            None
        }
    }
}

/// Parse a decimal integer field
pub fn parse_int(field: &[u8], name: &'static str) -> Result<i32> {
    std::str::from_utf8(field)
        .ok()
        .and_then(|s| s.trim().parse::<i32>().ok())
        .ok_or_else(|| ParseError::invalid_number(name, field))
}

/// Shift a coordinate parsed from `field`, rejecting results outside `i32`
pub fn offset_position(field: &[u8], name: &'static str, position: i32, delta: i32) -> Result<i32> {
    position
        .checked_add(delta)
        .ok_or_else(|| ParseError::invalid_number(name, field))
}

/// Length of a field as a tag length
pub fn field_len(field: &[u8]) -> i32 {
    i32::try_from(field.len()).unwrap_or(i32::MAX)
}
