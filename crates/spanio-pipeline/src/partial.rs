//! Partial reader - a bounded window into a shared stream

use crate::shared::SharedStream;
use spanio_core::limits::{checked_add_u64, clamp_to_buffer};
use spanio_core::{Error, Result};
use std::io::{self, Read};
use std::sync::Arc;

/// Exposes `[offset, offset + length)` of a [`SharedStream`] as a
/// [`std::io::Read`], without moving the shared cursor.
///
/// This is useful for handing a partition or other region to code that
/// expects a plain reader. The reader does not register a reference of its
/// own; the caller keeps the stream alive for as long as it reads.
///
/// # Example
///
/// ```rust
/// use spanio_core::IoSource;
/// use spanio_pipeline::{PartialReader, SharedStream};
/// use std::io::{Cursor, Read};
/// use std::sync::Arc;
///
/// let data: Vec<u8> = (0..100).collect();
/// let shared = Arc::new(SharedStream::new(IoSource::new(Cursor::new(data))));
///
/// // View of bytes 20-29
/// let mut partial = PartialReader::new(Arc::clone(&shared), 20, 10).unwrap();
/// let mut buf = Vec::new();
/// partial.read_to_end(&mut buf).unwrap();
/// assert_eq!(buf, (20..30).collect::<Vec<u8>>());
/// shared.close().unwrap();
/// ```
#[derive(Debug)]
pub struct PartialReader {
    shared: Arc<SharedStream>,
    start: u64,
    length: u64,
    position: u64,
}

impl PartialReader {
    /// Create a new partial reader
    ///
    /// # Arguments
    ///
    /// * `shared` - The underlying stream
    /// * `start` - Offset from the beginning of the stream
    /// * `length` - Length of the window
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfBounds`] if the window extends past the end of
    /// the stream
    pub fn new(shared: Arc<SharedStream>, start: u64, length: u64) -> Result<Self> {
        let end = checked_add_u64(start, length, "partial window")?;
        let stream_length = shared.length()?;
        if end > stream_length {
            return Err(Error::out_of_bounds(format!(
                "window {}..{} exceeds stream length {}",
                start, end, stream_length
            )));
        }

        Ok(Self {
            shared,
            start,
            length,
            position: 0,
        })
    }

    /// Get the start offset of this window
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Get the length of this window
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Get the current position within this window
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Bytes left before the end of the window
    pub fn available(&self) -> u64 {
        self.length.saturating_sub(self.position)
    }

    /// Skip up to `n` bytes, returning how many were skipped
    pub fn skip(&mut self, n: u64) -> Result<u64> {
        let wanted = n.min(self.available());
        let skipped = self.shared.skip_from(self.start + self.position, wanted)?;
        self.position += skipped;
        Ok(skipped)
    }
}

impl Read for PartialReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let to_read = clamp_to_buffer(self.available(), buf.len());
        if to_read == 0 {
            return Ok(0);
        }

        let bytes_read = self
            .shared
            .read_from(self.start + self.position, &mut buf[..to_read])?;
        self.position += bytes_read as u64;
        Ok(bytes_read)
    }
}
