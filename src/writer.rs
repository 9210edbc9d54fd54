/// Alignment writer lifecycle and output dispatch
///
/// A writer owns one output destination: it resolves the record format
/// and compression from the path suffix, opens the sink, emits the
/// format header once, appends result sets, and finishes exactly once.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use flate2::write::GzEncoder;
use noodles::bgzf;

use crate::alignment::AlignmentResult;
use crate::sam::SamFormat;
use crate::segments::SegmentIndex;

/// How clipped query bases are represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipStyle {
    /// `S` operations; clipped bases stay in the sequence field.
    Soft,
    /// `H` operations; clipped bases are omitted.
    Hard,
}

impl ClipStyle {
    /// Marker character selection. Anything other than the two
    /// supported markers silently falls back to soft clipping.
    pub fn from_char(marker: char) -> ClipStyle {
        match marker {
            'H' => ClipStyle::Hard,
            _ => ClipStyle::Soft,
        }
    }

    /// CIGAR symbol of this clip style.
    pub fn symbol(self) -> char {
        match self {
            ClipStyle::Soft => 'S',
            ClipStyle::Hard => 'H',
        }
    }
}

/// Supported record formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Sam,
}

/// Compression applied to the sink, keyed by the path suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compression {
    Plain,
    Gzip,
    Bgzf,
}

/// Writer construction parameters. All fields are optional in spirit:
/// the default is an auto-detected format, soft clipping, and no
/// program line.
#[derive(Debug, Clone)]
pub struct WriterParams {
    /// Record format; `None` detects it from the destination suffix.
    pub format: Option<OutputFormat>,
    /// Clip marker, `'S'` or `'H'`; other values fall back to `'S'`.
    pub clip: char,
    /// `@PG` program id, written next to the program name.
    pub program_id: u32,
    /// `@PG` program name; the line is omitted entirely when neither
    /// this nor `command` is set.
    pub program_name: Option<String>,
    /// `@PG` command line; tabs are replaced by spaces on intake.
    pub command: Option<String>,
}

impl Default for WriterParams {
    fn default() -> Self {
        WriterParams {
            format: None,
            clip: 'S',
            program_id: 0,
            program_name: None,
            command: None,
        }
    }
}

/// Owned, sanitized configuration held by the writer.
pub(crate) struct WriterConfig {
    pub(crate) clip: ClipStyle,
    pub(crate) program_id: u32,
    pub(crate) program_name: Option<String>,
    pub(crate) command: Option<String>,
}

impl WriterConfig {
    pub(crate) fn from_params(params: &WriterParams) -> Self {
        WriterConfig {
            clip: ClipStyle::from_char(params.clip),
            program_id: params.program_id,
            program_name: params.program_name.as_deref().map(sanitize_tabs),
            command: params.command.as_deref().map(sanitize_tabs),
        }
    }
}

/// Header/body/footer hooks of one record format. The original design
/// kept these in a function-pointer table indexed by format; here each
/// format is one implementation, picked at construction time.
pub(crate) trait RecordFormat {
    fn header(
        &self,
        out: &mut dyn Write,
        config: &WriterConfig,
        reference: &SegmentIndex,
    ) -> Result<()>;

    fn result(
        &self,
        out: &mut dyn Write,
        config: &WriterConfig,
        reference: &SegmentIndex,
        query: &SegmentIndex,
        result: &AlignmentResult,
    ) -> Result<()>;

    fn footer(&self, out: &mut dyn Write, config: &WriterConfig) -> Result<()>;
}

/// Tab characters would split header tag values; flatten them to
/// spaces.
fn sanitize_tabs(value: &str) -> String {
    value.replace('\t', " ")
}

/// Resolve record format and compression from the destination name.
/// An explicit format in the params wins over the suffix.
fn resolve_format(
    path: &Path,
    requested: Option<OutputFormat>,
) -> Option<(OutputFormat, Compression)> {
    let name = path.file_name()?.to_str()?;
    let (stem, compression) = if let Some(stem) = name.strip_suffix(".gz") {
        (stem, Compression::Gzip)
    } else if let Some(stem) = name.strip_suffix(".bgz") {
        (stem, Compression::Bgzf)
    } else {
        (name, Compression::Plain)
    };

    if let Some(format) = requested {
        return Some((format, compression));
    }
    if stem.ends_with(".sam") {
        Some((OutputFormat::Sam, compression))
    } else {
        None
    }
}

/// Writer for one output destination.
///
/// Construction opens the sink and emits the header; `append` writes
/// one record per path section; `finish` writes the footer and flushes.
/// A writer exclusively owns its destination and is not thread-safe —
/// callers wanting parallelism run one writer per destination and
/// merge externally.
pub struct AlignmentWriter {
    sink: Option<Box<dyn Write>>,
    format: Box<dyn RecordFormat>,
    config: WriterConfig,
}

impl AlignmentWriter {
    /// Open `path` for writing and emit the header block.
    ///
    /// Fails without leaving a usable instance when the format cannot
    /// be resolved or the destination cannot be opened; anything opened
    /// up to that point is released on the way out.
    pub fn create<P: AsRef<Path>>(
        path: P,
        reference: &SegmentIndex,
        params: &WriterParams,
    ) -> Result<AlignmentWriter> {
        let path = path.as_ref();
        let Some((format, compression)) = resolve_format(path, params.format) else {
            bail!("unrecognized output format: {}", path.display());
        };
        log::debug!("output format {:?}, compression {:?}", format, compression);

        let file = File::create(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        let mut sink: Box<dyn Write> = match compression {
            Compression::Plain => Box::new(BufWriter::new(file)),
            Compression::Gzip => Box::new(GzEncoder::new(
                BufWriter::new(file),
                flate2::Compression::default(),
            )),
            Compression::Bgzf => Box::new(bgzf::io::Writer::new(file)),
        };

        let format: Box<dyn RecordFormat> = match format {
            OutputFormat::Sam => Box::new(SamFormat),
        };
        let config = WriterConfig::from_params(params);

        format.header(sink.as_mut(), &config, reference)?;

        Ok(AlignmentWriter {
            sink: Some(sink),
            format,
            config,
        })
    }

    /// Append a set of alignment results, one record per section.
    ///
    /// Sink errors are fatal to the run: nothing is retried and the
    /// output may end mid-record, exactly as the sink left it.
    pub fn append(
        &mut self,
        reference: &SegmentIndex,
        query: &SegmentIndex,
        results: &[AlignmentResult],
    ) -> Result<()> {
        let Some(sink) = self.sink.as_mut() else {
            bail!("writer is already closed");
        };
        for result in results {
            self.format
                .result(sink.as_mut(), &self.config, reference, query, result)?;
        }
        Ok(())
    }

    /// Write the format footer, flush, and close the sink.
    ///
    /// Consuming `self` makes a second close unrepresentable; dropping
    /// the writer without calling this still flushes on a best-effort
    /// basis.
    pub fn finish(mut self) -> Result<()> {
        if let Some(mut sink) = self.sink.take() {
            self.format.footer(sink.as_mut(), &self.config)?;
            sink.flush().context("failed to flush output")?;
        }
        Ok(())
    }
}

impl Drop for AlignmentWriter {
    fn drop(&mut self) {
        if let Some(sink) = self.sink.as_mut() {
            if let Err(err) = sink.flush() {
                log::debug!("flush on drop failed: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_suffix() {
        let resolve = |name: &str| resolve_format(Path::new(name), None);
        assert_eq!(resolve("out.sam"), Some((OutputFormat::Sam, Compression::Plain)));
        assert_eq!(resolve("out.sam.gz"), Some((OutputFormat::Sam, Compression::Gzip)));
        assert_eq!(resolve("out.sam.bgz"), Some((OutputFormat::Sam, Compression::Bgzf)));
        assert_eq!(resolve("out.paf"), None);
        assert_eq!(resolve("out"), None);
    }

    #[test]
    fn explicit_format_overrides_suffix() {
        assert_eq!(
            resolve_format(Path::new("out.txt"), Some(OutputFormat::Sam)),
            Some((OutputFormat::Sam, Compression::Plain))
        );
        assert_eq!(
            resolve_format(Path::new("out.txt.gz"), Some(OutputFormat::Sam)),
            Some((OutputFormat::Sam, Compression::Gzip))
        );
    }

    #[test]
    fn clip_marker_fallback() {
        assert_eq!(ClipStyle::from_char('S'), ClipStyle::Soft);
        assert_eq!(ClipStyle::from_char('H'), ClipStyle::Hard);
        assert_eq!(ClipStyle::from_char('X'), ClipStyle::Soft);
        assert_eq!(ClipStyle::from_char('\0'), ClipStyle::Soft);
    }

    #[test]
    fn command_tabs_become_spaces() {
        let params = WriterParams {
            command: Some("--a=1\t--b=2".to_string()),
            ..WriterParams::default()
        };
        let config = WriterConfig::from_params(&params);
        assert_eq!(config.command.as_deref(), Some("--a=1 --b=2"));
        assert_eq!(config.program_name, None);
    }
}
