/// Spliced alignment results
///
/// An alignment result is an ordered chain of path sections over one
/// shared operation trace. Results are produced by the aligner and are
/// read-only to the translator.

use crate::segments::SegmentId;
use crate::trace::OpTrace;

/// One contiguous aligned span between a reference segment and a query
/// segment.
#[derive(Debug, Clone, Copy)]
pub struct PathSection {
    pub ref_id: SegmentId,
    pub query_id: SegmentId,
    /// Start offset within the reference segment.
    pub ref_pos: u32,
    /// Start offset within the query segment, in the coordinates of the
    /// segment's own orientation.
    pub query_pos: u32,
    /// Reference-side aligned length.
    pub ref_span: u32,
    /// Query-side aligned length.
    pub query_span: u32,
    /// Length of this section's trace sub-range, in bits.
    pub trace_len: u32,
    /// Start of this section's trace sub-range, in bits relative to the
    /// trace offset.
    pub trace_pos: u32,
}

/// One full spliced alignment: a chain of sections (length >= 1) over a
/// shared trace, possibly spanning multiple segments.
///
/// Sections are ordered consistently with the trace: section `i`'s
/// sub-range immediately follows section `i - 1`'s.
#[derive(Debug, Clone)]
pub struct AlignmentResult {
    pub sections: Vec<PathSection>,
    pub trace: OpTrace,
    pub score: i64,
    pub qual: u32,
}

impl AlignmentResult {
    /// Number of records this result will emit.
    pub fn section_count(&self) -> usize {
        self.sections.len()
    }
}
