//! Part arguments and the stream they describe

use anyhow::{bail, Context, Result};
use spanio_core::PositionedSource;
use spanio_pipeline::{open_source, ConcatenatedStream, SourceConfig};
use std::path::PathBuf;
use std::str::FromStr;

/// One `PART` argument: `PATH[:START[:LENGTH]]` or `hole:LENGTH`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartArg {
    File {
        path: PathBuf,
        start: u64,
        /// `None` reads to the end of the file
        length: Option<u64>,
    },
    Hole {
        length: u64,
    },
}

fn parse_number(text: &str) -> Option<u64> {
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

impl FromStr for PartArg {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if let Some(length) = s.strip_prefix("hole:") {
            let length =
                parse_number(length).ok_or_else(|| format!("invalid hole length: {}", length))?;
            return Ok(PartArg::Hole { length });
        }

        // Numbers are taken from the right so paths may contain ':'
        let fields: Vec<&str> = s.rsplitn(3, ':').collect();
        let (path, start, length) = match fields.as_slice() {
            [length, start, path] => match (parse_number(start), parse_number(length)) {
                (Some(start), Some(length)) => (*path, start, Some(length)),
                _ => match parse_number(length) {
                    Some(start) => (&s[..s.len() - fields[0].len() - 1], start, None),
                    None => (s, 0, None),
                },
            },
            [start, path] => match parse_number(start) {
                Some(start) => (*path, start, None),
                None => (s, 0, None),
            },
            _ => (s, 0, None),
        };

        if path.is_empty() {
            return Err(format!("missing path in part: {}", s));
        }

        Ok(PartArg::File {
            path: PathBuf::from(path),
            start,
            length,
        })
    }
}

fn signed(value: u64, what: &str) -> Result<i64> {
    i64::try_from(value).with_context(|| format!("{} {} is too large", what, value))
}

/// Open every part and join them, behind `lead_hole` zero bytes
pub fn build_stream(
    parts: &[PartArg],
    lead_hole: u64,
    config: &SourceConfig,
) -> Result<ConcatenatedStream> {
    let mut stream: Option<ConcatenatedStream> = None;

    for part in parts {
        match part {
            PartArg::Hole { length } => {
                let length = signed(*length, "hole length")?;
                match stream.as_mut() {
                    Some(stream) => stream.add_hole(length)?,
                    None => {
                        let total = signed(lead_hole, "lead hole")?
                            .checked_add(length)
                            .context("hole length overflows")?;
                        stream = Some(ConcatenatedStream::with_hole(total)?);
                    }
                }
            }
            PartArg::File {
                path,
                start,
                length,
            } => {
                let mut source = open_source(path, config)
                    .with_context(|| format!("Failed to open {}", path.display()))?;
                let file_length = source.length()?;
                if *start > file_length {
                    bail!(
                        "{}: start {} is past the end ({} bytes)",
                        path.display(),
                        start,
                        file_length
                    );
                }
                let length = length.unwrap_or(file_length - start);
                tracing::debug!("Part {} at {} ({} bytes)", path.display(), start, length);

                let (start, length) = (signed(*start, "start")?, signed(length, "length")?);
                match stream.as_mut() {
                    Some(stream) => stream.add_part(source, start, length)?,
                    None if start == 0 => {
                        // Leading hole through a negative start offset
                        let lead = signed(lead_hole, "lead hole")?;
                        let total = length.checked_add(lead).context("part length overflows")?;
                        stream = Some(ConcatenatedStream::new(source, -lead, total)?);
                    }
                    None => {
                        let mut first =
                            ConcatenatedStream::with_hole(signed(lead_hole, "lead hole")?)?;
                        first.add_part(source, start, length)?;
                        stream = Some(first);
                    }
                }
            }
        }
    }

    stream.context("at least one part is required")
}
