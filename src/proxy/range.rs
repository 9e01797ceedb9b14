//! Byte range parsing and resolution
//!
//! Only single `bytes=` ranges are accepted. Multipart range responses are
//! not produced, so any list of ranges is rejected as unsatisfiable.

use crate::proxy::types::{ProxyError, ProxyResult};
use std::fmt;

/// Range unit understood by the proxy
pub const BYTES_UNIT: &str = "bytes";

/// One byte range as requested by a client
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ByteRange {
    /// `bytes=start-end`, end inclusive, `start <= end`
    Bounded { start: u64, end: u64 },
    /// `bytes=start-`, through the last byte
    From { start: u64 },
    /// `bytes=-length`, the final `length` bytes, `length > 0`
    Suffix { length: u64 },
}

impl ByteRange {
    /// Parse the value of a `Range` header
    pub fn parse(header: &str) -> ProxyResult<Self> {
        let (unit, ranges) = header
            .trim()
            .split_once('=')
            .ok_or_else(|| invalid(header, "missing range unit"))?;

        if !unit.trim().eq_ignore_ascii_case(BYTES_UNIT) {
            return Err(invalid(header, "only the bytes unit is supported"));
        }
        if ranges.contains(',') {
            return Err(invalid(header, "multiple ranges are not supported"));
        }

        let (first, last) = ranges
            .trim()
            .split_once('-')
            .ok_or_else(|| invalid(header, "expected first-last"))?;

        match (first.trim(), last.trim()) {
            ("", "") => Err(invalid(header, "empty range")),
            ("", suffix) => match parse_offset(header, suffix)? {
                0 => Err(invalid(header, "zero-length suffix")),
                length => Ok(Self::Suffix { length }),
            },
            (start, "") => Ok(Self::From {
                start: parse_offset(header, start)?,
            }),
            (start, end) => {
                let start = parse_offset(header, start)?;
                let end = parse_offset(header, end)?;
                if start > end {
                    return Err(invalid(header, "first byte is after last byte"));
                }
                Ok(Self::Bounded { start, end })
            }
        }
    }

    /// Clamp this range to an object of `total` bytes
    ///
    /// Returns `None` when no byte of the object falls inside the range.
    pub fn resolve(&self, total: u64) -> Option<ContentRange> {
        if total == 0 {
            return None;
        }
        let last = total - 1;
        let (start, end) = match *self {
            Self::Bounded { start, end } => (start, end.min(last)),
            Self::From { start } => (start, last),
            Self::Suffix { length } => (total.saturating_sub(length), last),
        };
        (start <= last).then_some(ContentRange { start, end, total })
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bounded { start, end } => write!(f, "{BYTES_UNIT}={start}-{end}"),
            Self::From { start } => write!(f, "{BYTES_UNIT}={start}-"),
            Self::Suffix { length } => write!(f, "{BYTES_UNIT}=-{length}"),
        }
    }
}

/// Span of an object actually served, as carried by `Content-Range`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContentRange {
    pub start: u64,
    pub end: u64,
    pub total: u64,
}

impl ContentRange {
    /// Number of bytes in the span
    pub fn length(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Parse `bytes start-end/total` as sent by an object store
    pub fn parse(value: &str) -> Option<Self> {
        let rest = value.trim().strip_prefix(BYTES_UNIT)?.trim_start();
        let (span, total) = rest.split_once('/')?;
        let (start, end) = span.split_once('-')?;
        let range = Self {
            start: start.trim().parse().ok()?,
            end: end.trim().parse().ok()?,
            total: total.trim().parse().ok()?,
        };
        (range.start <= range.end && range.end < range.total).then_some(range)
    }
}

impl fmt::Display for ContentRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{BYTES_UNIT} {}-{}/{}", self.start, self.end, self.total)
    }
}

fn parse_offset(header: &str, digits: &str) -> ProxyResult<u64> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid(header, "offsets must be decimal integers"));
    }
    digits
        .parse()
        .map_err(|_| invalid(header, "offset out of range"))
}

fn invalid(header: &str, reason: &str) -> ProxyError {
    ProxyError::InvalidRange(format!("{reason} in '{header}'"))
}
