//! Concatenated pipeline - several byte ranges presented as one stream

use serde::Serialize;
use spanio_core::limits::{checked_add_u64, clamp_to_buffer, non_negative};
use spanio_core::{Error, PositionedSource, Result, SourceHandle};

/// One contiguous range of the virtual address space
struct Part {
    /// `None` marks a hole that reads as zeros
    source: Option<SourceHandle>,
    start: u64,
    length: u64,
}

/// What backs a part, as reported by [`ConcatenatedStream::parts`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PartKind {
    /// Bytes come from a source
    Data,
    /// Synthetic zero-filled gap
    Hole,
}

/// Layout of one part, for inspection tools
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartInfo {
    /// Index of this part
    pub index: usize,
    /// Data or hole
    pub kind: PartKind,
    /// Offset of the first byte inside the backing source
    pub source_start: u64,
    /// Length of the part in bytes
    pub length: u64,
    /// Offset of the first byte in the virtual stream
    pub virtual_start: u64,
}

/// Several byte ranges, from different sources or none at all, read as one
/// contiguous stream with a single virtual file pointer.
///
/// The stream owns each part's source and closes them on
/// [`close`](PositionedSource::close). To reference a resource the stream must
/// not close, pass a [`Substream`](crate::Substream) as the part: closing it only
/// drops one reference.
///
/// # Example
///
/// ```rust
/// use spanio_core::{IoSource, PositionedSource};
/// use spanio_pipeline::ConcatenatedStream;
/// use std::io::Cursor;
///
/// // 2 zero bytes, then "abcd"
/// let first = IoSource::new(Cursor::new(b"abcd".to_vec()));
/// let mut stream = ConcatenatedStream::new(first, -2, 6).unwrap();
/// stream.add_part(IoSource::new(Cursor::new(b"xyz".to_vec())), 1, 2).unwrap();
///
/// let mut buf = vec![0u8; 8];
/// stream.read_fully(&mut buf).unwrap();
/// assert_eq!(&buf, b"\0\0abcdyz");
/// ```
pub struct ConcatenatedStream {
    parts: Vec<Part>,
    virtual_position: u64,
    closed: bool,
}

impl ConcatenatedStream {
    /// Create a stream from its first part.
    ///
    /// A negative `start_offset` asks for a hole of `-start_offset` bytes before
    /// the first real byte: the source is then read from offset 0 and the real
    /// part shrinks by the size of the hole, so the total length stays `length`.
    ///
    /// # Errors
    ///
    /// A contract violation if `length` (or the shrunken real length) is negative.
    pub fn new(
        first: impl PositionedSource + 'static,
        start_offset: i64,
        length: i64,
    ) -> Result<Self> {
        tracing::trace!("ConcatenatedStream::new(start={}, length={})", start_offset, length);
        non_negative(length, "first part length")?;

        let mut parts = Vec::with_capacity(2);
        let (start, length) = if start_offset < 0 {
            let hole = start_offset.unsigned_abs();
            parts.push(Part {
                source: None,
                start: 0,
                length: hole,
            });
            let real_length = length.checked_add(start_offset).unwrap_or(i64::MIN);
            (0, non_negative(real_length, "first part length after leading hole")?)
        } else {
            (start_offset as u64, length as u64)
        };
        checked_add_u64(start, length, "first part end")?;

        parts.push(Part {
            source: Some(Box::new(first)),
            start,
            length,
        });

        Ok(Self {
            parts,
            virtual_position: 0,
            closed: false,
        })
    }

    /// Create a stream that starts with a hole of `length` bytes
    pub fn with_hole(length: i64) -> Result<Self> {
        let length = non_negative(length, "hole length")?;
        Ok(Self {
            parts: vec![Part {
                source: None,
                start: 0,
                length,
            }],
            virtual_position: 0,
            closed: false,
        })
    }

    /// Append `length` bytes of `source`, starting at `start`, to the end of the
    /// virtual address space
    pub fn add_part(
        &mut self,
        source: impl PositionedSource + 'static,
        start: i64,
        length: i64,
    ) -> Result<()> {
        tracing::trace!("add_part(start={}, length={})", start, length);
        self.ensure_open()?;
        let start = non_negative(start, "part start offset")?;
        let length = non_negative(length, "part length")?;
        checked_add_u64(start, length, "part end")?;

        self.parts.push(Part {
            source: Some(Box::new(source)),
            start,
            length,
        });
        Ok(())
    }

    /// Append a hole of `length` zero bytes
    pub fn add_hole(&mut self, length: i64) -> Result<()> {
        tracing::trace!("add_hole(length={})", length);
        self.ensure_open()?;
        let length = non_negative(length, "hole length")?;

        self.parts.push(Part {
            source: None,
            start: 0,
            length,
        });
        Ok(())
    }

    /// Number of parts, holes included
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// Layout of every part in order
    pub fn parts(&self) -> Vec<PartInfo> {
        let mut virtual_start = 0u64;
        self.parts
            .iter()
            .enumerate()
            .map(|(index, part)| {
                let info = PartInfo {
                    index,
                    kind: if part.source.is_some() {
                        PartKind::Data
                    } else {
                        PartKind::Hole
                    },
                    source_start: part.start,
                    length: part.length,
                    virtual_start,
                };
                virtual_start = virtual_start.saturating_add(part.length);
                info
            })
            .collect()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::stream_closed("concatenated stream is closed"));
        }
        Ok(())
    }

    /// Index of the part holding `pos` and the offset inside it
    fn locate(&self, pos: u64) -> Option<(usize, u64)> {
        let mut to_skip = pos;
        for (index, part) in self.parts.iter().enumerate() {
            if to_skip < part.length {
                return Some((index, to_skip));
            }
            to_skip -= part.length;
        }
        None
    }
}

impl std::fmt::Debug for ConcatenatedStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcatenatedStream")
            .field("parts", &self.parts())
            .field("virtual_position", &self.virtual_position)
            .field("closed", &self.closed)
            .finish()
    }
}

impl PositionedSource for ConcatenatedStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.ensure_open()?;
        tracing::trace!("read({} bytes) at virtual position {}", buf.len(), self.virtual_position);

        if buf.is_empty() {
            return Ok(0);
        }

        let Some((first_index, mut offset_in_part)) = self.locate(self.virtual_position) else {
            return Ok(0);
        };

        let mut bytes_read = 0usize;
        for part in &mut self.parts[first_index..] {
            let remaining_in_part = part.length - offset_in_part;
            let to_read = clamp_to_buffer(remaining_in_part, buf.len() - bytes_read);
            if to_read == 0 {
                // Zero-length part
                continue;
            }
            let window = &mut buf[bytes_read..bytes_read + to_read];

            let res = match part.source.as_mut() {
                None => {
                    window.fill(0);
                    to_read
                }
                Some(source) => {
                    let res = checked_add_u64(part.start, offset_in_part, "part offset")
                        .and_then(|source_pos| {
                            tracing::debug!("part seek to {}, reading {}", source_pos, to_read);
                            source.seek(source_pos)?;
                            source.read(window)
                        });
                    match res {
                        Ok(n) => n,
                        // Bytes already copied are reported; the next call hits the error
                        Err(e) if bytes_read > 0 => {
                            tracing::debug!("part read failed after {} bytes: {}", bytes_read, e);
                            return Ok(bytes_read);
                        }
                        Err(e) => return Err(e),
                    }
                }
            };
            offset_in_part = 0;

            if res == 0 {
                if bytes_read > 0 {
                    return Ok(bytes_read);
                }
                return Err(Error::unexpected_eof(format!(
                    "part source ended before its declared length at virtual position {}",
                    self.virtual_position
                )));
            }

            self.virtual_position += res as u64;
            bytes_read += res;

            if bytes_read == buf.len() || res < to_read {
                // Either done, or the source came up short inside its part
                return Ok(bytes_read);
            }
        }

        Ok(bytes_read)
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        self.ensure_open()?;
        self.virtual_position = pos;
        Ok(())
    }

    fn position(&mut self) -> Result<u64> {
        self.ensure_open()?;
        Ok(self.virtual_position)
    }

    fn length(&mut self) -> Result<u64> {
        self.ensure_open()?;
        self.parts.iter().try_fold(0u64, |total, part| {
            checked_add_u64(total, part.length, "concatenated length")
        })
    }

    /// Closes every part's source once, in order. Holes are skipped and the
    /// first failure is reported after all parts were attempted.
    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::contract_violation("concatenated stream closed twice"));
        }
        self.closed = true;

        let mut first_error = None;
        for (index, part) in self.parts.iter_mut().enumerate() {
            if let Some(source) = part.source.as_mut() {
                if let Err(e) = source.close() {
                    tracing::warn!("Closing part {} failed: {}", index, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
