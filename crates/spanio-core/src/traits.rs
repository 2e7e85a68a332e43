//! Core traits for spanio

use crate::error::{Error, Result};
use std::io::{Read, Seek};

/// A random-access byte source with a single cursor.
///
/// This is the capability every stream layer consumes and exposes. A `read`
/// returning `Ok(0)` for a non-empty buffer means no data is available at the
/// current position (end of stream).
pub trait PositionedSource: Send {
    /// Read up to `buf.len()` bytes at the current position, advancing it
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Move the cursor to an absolute position
    fn seek(&mut self, pos: u64) -> Result<()>;

    /// Current cursor position
    fn position(&mut self) -> Result<u64>;

    /// Total length of the source in bytes
    fn length(&mut self) -> Result<u64>;

    /// Release the source
    fn close(&mut self) -> Result<()>;

    /// Fill `buf` completely, looping over short reads.
    ///
    /// # Errors
    ///
    /// Returns an `UnexpectedEof` I/O error if the source runs dry first.
    fn read_fully(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read(&mut buf[filled..])?;
            if n == 0 {
                return Err(Error::unexpected_eof(format!(
                    "read_fully: got {} of {} bytes",
                    filled,
                    buf.len()
                )));
            }
            filled += n;
        }
        Ok(())
    }

    /// Bytes between the cursor and the end of the source
    fn remaining(&mut self) -> Result<u64> {
        let length = self.length()?;
        Ok(length.saturating_sub(self.position()?))
    }
}

impl<S: PositionedSource + ?Sized> PositionedSource for Box<S> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        (**self).seek(pos)
    }

    fn position(&mut self) -> Result<u64> {
        (**self).position()
    }

    fn length(&mut self) -> Result<u64> {
        (**self).length()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

/// Owned handle to a part's backing source
pub type SourceHandle = Box<dyn PositionedSource>;

/// Combined trait for Read + Seek
pub trait ReadSeek: Read + Seek + Send {}

/// Blanket implementation for any type that implements Read + Seek
impl<T: Read + Seek + Send> ReadSeek for T {}
