//! HTTP `Range` header resolution against a known file length.
//!
//! Only the `bytes` unit is understood. Anything that does not parse falls back
//! to a full response; a header that parses but names no byte inside the file
//! is unsatisfiable.

/// Inclusive byte range inside a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Creates a range; callers guarantee `start <= end`.
    pub fn new(start: u64, end: u64) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    /// Whole file. `None` for an empty file.
    pub fn full(length: u64) -> Option<Self> {
        length.checked_sub(1).map(|end| Self::new(0, end))
    }

    /// Number of bytes covered.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// A range always covers at least one byte.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// `Content-Range` value for a partial response.
    pub fn content_range(&self, total: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, total)
    }
}

/// Outcome of resolving a `Range` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeRequest {
    /// No usable header; serve the whole file with 200
    Full,
    /// Serve exactly these bytes with 206
    Partial(ByteRange),
    /// Well-formed header naming no byte of the file; 416
    Unsatisfiable,
}

impl RangeRequest {
    /// Byte range a reader should be opened over, `None` when nothing is read.
    pub fn byte_range(&self, length: u64) -> Option<ByteRange> {
        match self {
            RangeRequest::Full => ByteRange::full(length),
            RangeRequest::Partial(range) => Some(*range),
            RangeRequest::Unsatisfiable => None,
        }
    }
}

/// Content-Range value for a 416 response.
pub fn unsatisfied_content_range(length: u64) -> String {
    format!("bytes */{length}")
}

enum RangeSpec {
    Bounded(u64, u64),
    From(u64),
    Suffix(u64),
}

impl RangeSpec {
    fn parse(raw: &str) -> Option<Self> {
        let (start, end) = raw.trim().split_once('-')?;
        let (start, end) = (start.trim(), end.trim());
        match (start.is_empty(), end.is_empty()) {
            (true, true) => None,
            (true, false) => end.parse().ok().map(RangeSpec::Suffix),
            (false, true) => start.parse().ok().map(RangeSpec::From),
            (false, false) => {
                let start: u64 = start.parse().ok()?;
                let end: u64 = end.parse().ok()?;
                (start <= end).then_some(RangeSpec::Bounded(start, end))
            }
        }
    }

    fn resolve(&self, length: u64) -> Option<ByteRange> {
        let last = length.checked_sub(1)?;
        match *self {
            RangeSpec::Bounded(start, end) if start <= last => {
                Some(ByteRange::new(start, end.min(last)))
            }
            RangeSpec::From(start) if start <= last => Some(ByteRange::new(start, last)),
            RangeSpec::Suffix(count) if count > 0 => {
                Some(ByteRange::new(length.saturating_sub(count), last))
            }
            _ => None,
        }
    }
}

/// Resolves an optional `Range` header value for a file of `length` bytes.
///
/// Multi-range requests are answered with the first satisfiable range.
pub fn resolve_range(header: Option<&str>, length: u64) -> RangeRequest {
    let Some(header) = header else {
        return RangeRequest::Full;
    };
    let Some((unit, specs)) = header.split_once('=') else {
        return RangeRequest::Full;
    };
    if !unit.trim().eq_ignore_ascii_case("bytes") {
        return RangeRequest::Full;
    }

    let parsed: Option<Vec<RangeSpec>> = specs.split(',').map(RangeSpec::parse).collect();
    let Some(parsed) = parsed else {
        return RangeRequest::Full;
    };

    parsed
        .iter()
        .find_map(|spec| spec.resolve(length))
        .map_or(RangeRequest::Unsatisfiable, RangeRequest::Partial)
}
