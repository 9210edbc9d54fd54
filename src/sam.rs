/// SAM rendering of alignment results
///
/// One record line per path section. Consecutive sections of one result
/// point at each other through RNEXT/PNEXT, the way mate pairs do; the
/// last section of a chain carries the `*`/`0` sentinel pair instead.

use std::io::Write;

use anyhow::Result;

use crate::alignment::{AlignmentResult, PathSection};
use crate::segments::{decode_base, Orientation, SegmentId, SegmentIndex};
use crate::trace::OpTrace;
use crate::writer::{ClipStyle, RecordFormat, WriterConfig};

const SAM_VERSION: &str = "1.0";
const DEFAULT_READ_GROUP: u32 = 1;

/// FLAG bit for a reverse-strand record.
const FLAG_REVERSE: u32 = 0x10;

/// SAM record format, selected by the `.sam` destination suffix.
pub(crate) struct SamFormat;

impl RecordFormat for SamFormat {
    fn header(
        &self,
        out: &mut dyn Write,
        config: &WriterConfig,
        reference: &SegmentIndex,
    ) -> Result<()> {
        writeln!(out, "@HD\tVN:{SAM_VERSION}\tSO:unsorted")?;

        for rank in 0..reference.count() {
            let id = SegmentId::forward(rank as u32);
            writeln!(out, "@SQ\tSN:{}\tLN:{}", reference.name(id), reference.len(id))?;
        }

        writeln!(out, "@RG\tID:{DEFAULT_READ_GROUP}")?;

        // the program line only appears when something was configured;
        // the id rides with the program name
        if config.program_name.is_some() || config.command.is_some() {
            write!(out, "@PG")?;
            if let Some(name) = &config.program_name {
                write!(out, "\tID:{}\tPN:{}", config.program_id, name)?;
            }
            if let Some(command) = &config.command {
                write!(out, "\tCL:{command}")?;
            }
            writeln!(out)?;
        }
        Ok(())
    }

    fn result(
        &self,
        out: &mut dyn Write,
        config: &WriterConfig,
        reference: &SegmentIndex,
        query: &SegmentIndex,
        result: &AlignmentResult,
    ) -> Result<()> {
        log::debug!("emit result: {} sections, score {}", result.sections.len(), result.score);

        for pair in result.sections.windows(2) {
            write_section(out, config, reference, query, &result.trace, &pair[0], Some(&pair[1]))?;
        }
        if let Some(last) = result.sections.last() {
            write_section(out, config, reference, query, &result.trace, last, None)?;
        }
        Ok(())
    }

    fn footer(&self, _out: &mut dyn Write, _config: &WriterConfig) -> Result<()> {
        Ok(())
    }
}

/// Record FLAG: the reverse bit is set iff the reference and query
/// handles disagree on orientation. All other bits stay clear.
fn section_flags(section: &PathSection) -> u32 {
    if section.ref_id.is_reverse() != section.query_id.is_reverse() {
        FLAG_REVERSE
    } else {
        0
    }
}

/// Unaligned query margins around a section, in output order.
///
/// The head margin is the query offset for forward handles and the
/// distance from the aligned end to the segment end for reverse
/// handles, so head and tail swap under reversal. The identity
/// `head + query_span + tail == segment_len` always holds.
fn clip_margins(query: &SegmentIndex, section: &PathSection) -> (u32, u32) {
    let len = query.len(section.query_id);
    let head = match section.query_id.orientation() {
        Orientation::Forward => section.query_pos,
        Orientation::Reverse => len - (section.query_pos + section.query_span),
    };
    (head, len - head - section.query_span)
}

/// Run-length CIGAR string: head clip, trace runs, tail clip.
fn render_cigar(
    clip: ClipStyle,
    head: u32,
    tail: u32,
    trace: &OpTrace,
    section: &PathSection,
) -> String {
    let mut cigar = String::new();
    if head > 0 {
        cigar.push_str(&format!("{}{}", head, clip.symbol()));
    }
    for (op, run) in trace.view(section.trace_pos, section.trace_len).runs() {
        cigar.push_str(&format!("{}{}", run, op.symbol()));
    }
    if tail > 0 {
        cigar.push_str(&format!("{}{}", tail, clip.symbol()));
    }
    cigar
}

/// Decoded sequence field. Soft clipping keeps the whole segment, hard
/// clipping keeps only the aligned span.
fn render_seq(
    clip: ClipStyle,
    query: &SegmentIndex,
    section: &PathSection,
    head: u32,
    tail: u32,
) -> String {
    let view = query.seq(section.query_id);
    let mut seq = String::with_capacity(view.len() as usize);

    if clip == ClipStyle::Soft {
        for pos in 0..head {
            seq.push(decode_base(view.code(pos)));
        }
    }
    for pos in 0..section.query_span {
        seq.push(decode_base(view.code(head + pos)));
    }
    if clip == ClipStyle::Soft {
        for pos in 0..tail {
            seq.push(decode_base(view.code(head + section.query_span + pos)));
        }
    }
    seq
}

/// Emit one record line for `section`, linked to its successor when one
/// exists. MAPQ is the fixed 255 placeholder, TLEN is always 0 and QUAL
/// is unavailable; positions are written 0-based, exactly as stored.
fn write_section(
    out: &mut dyn Write,
    config: &WriterConfig,
    reference: &SegmentIndex,
    query: &SegmentIndex,
    trace: &OpTrace,
    section: &PathSection,
    next: Option<&PathSection>,
) -> Result<()> {
    let (head, tail) = clip_margins(query, section);
    log::debug!(
        "section {} -> {}: margins {}/{}/{}",
        section.query_id,
        section.ref_id,
        head,
        section.query_span,
        tail
    );

    let cigar = render_cigar(config.clip, head, tail, trace, section);
    let seq = render_seq(config.clip, query, section, head, tail);
    let (rnext, pnext) = match next {
        Some(next) => (reference.name(next.ref_id), next.ref_pos),
        None => ("*", 0),
    };

    writeln!(
        out,
        "{}\t{}\t{}\t{}\t255\t{}\t{}\t{}\t0\t{}\t*\tRG:Z:{}",
        query.name(section.query_id),
        section_flags(section),
        reference.name(section.ref_id),
        section.ref_pos,
        cigar,
        rnext,
        pnext,
        seq,
        DEFAULT_READ_GROUP,
    )?;
    Ok(())
}
