//! Bridges between `std::io` streams and [`PositionedSource`]

use crate::error::{Error, Result};
use crate::traits::{PositionedSource, ReadSeek};
use std::io::{self, Read, Seek, SeekFrom};

/// Read once from `reader`, retrying reads interrupted by a signal
pub fn read_retrying<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    loop {
        match reader.read(buf) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            res => return Ok(res?),
        }
    }
}

/// Any `Read + Seek` stream exposed as a [`PositionedSource`].
///
/// Works with trait objects too: `IoSource<Box<dyn ReadSeek>>`.
///
/// Closing drops the wrapped stream; every later call fails with
/// [`Error::StreamClosed`].
///
/// # Example
///
/// ```rust
/// use spanio_core::{IoSource, PositionedSource};
/// use std::io::Cursor;
///
/// let mut source = IoSource::new(Cursor::new(vec![1u8, 2, 3, 4]));
/// source.seek(2).unwrap();
/// let mut buf = [0u8; 2];
/// assert_eq!(source.read(&mut buf).unwrap(), 2);
/// assert_eq!(buf, [3, 4]);
/// ```
#[derive(Debug)]
pub struct IoSource<R> {
    inner: Option<R>,
}

impl<R: ReadSeek> IoSource<R> {
    /// Wrap an open stream
    pub fn new(inner: R) -> Self {
        Self { inner: Some(inner) }
    }

    /// Unwrap the stream, `None` once closed
    pub fn into_inner(self) -> Option<R> {
        self.inner
    }

    fn inner(&mut self) -> Result<&mut R> {
        self.inner
            .as_mut()
            .ok_or_else(|| Error::stream_closed("IoSource already closed"))
    }
}

impl<R: ReadSeek> PositionedSource for IoSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        read_retrying(self.inner()?, buf)
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        self.inner()?.seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    fn position(&mut self) -> Result<u64> {
        Ok(self.inner()?.stream_position()?)
    }

    fn length(&mut self) -> Result<u64> {
        let inner = self.inner()?;
        let current = inner.stream_position()?;
        let end = inner.seek(SeekFrom::End(0))?;
        if current != end {
            inner.seek(SeekFrom::Start(current))?;
        }
        Ok(end)
    }

    fn close(&mut self) -> Result<()> {
        match self.inner.take() {
            Some(_) => Ok(()),
            None => Err(Error::contract_violation("IoSource closed twice")),
        }
    }
}

/// A [`PositionedSource`] exposed as `std::io::Read + Seek`.
///
/// Lets parsers written against the standard traits consume virtual streams.
/// Seeking past the end is allowed; the next read returns 0.
pub struct IoStream<S> {
    source: S,
}

impl<S: PositionedSource> IoStream<S> {
    /// Wrap a positioned source
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Borrow the wrapped source
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Unwrap the source
    pub fn into_inner(self) -> S {
        self.source
    }
}

impl<S: PositionedSource> Read for IoStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.source.read(buf)?)
    }
}

impl<S: PositionedSource> Seek for IoStream<S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new_pos = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(offset) => self.source.length()?.checked_add_signed(offset),
            SeekFrom::Current(offset) => self.source.position()?.checked_add_signed(offset),
        };

        let new_pos = new_pos.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "Seek before beginning of stream")
        })?;

        self.source.seek(new_pos)?;
        Ok(new_pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_io_source_read_seek() {
        let mut source = IoSource::new(Cursor::new(pattern(100)));

        assert_eq!(source.length().unwrap(), 100);
        assert_eq!(source.position().unwrap(), 0);

        source.seek(40).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(source.read(&mut buf).unwrap(), 4);
        assert_eq!(buf, [40, 41, 42, 43]);
        assert_eq!(source.position().unwrap(), 44);
        assert_eq!(source.remaining().unwrap(), 56);
    }

    #[test]
    fn test_io_source_length_keeps_position() {
        let mut source = IoSource::new(Cursor::new(pattern(64)));
        source.seek(10).unwrap();
        assert_eq!(source.length().unwrap(), 64);
        assert_eq!(source.position().unwrap(), 10);
    }

    /// Fails with `Interrupted` a few times before every successful read
    struct Flaky {
        inner: Cursor<Vec<u8>>,
        interrupts: usize,
    }

    impl Read for Flaky {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.interrupts > 0 {
                self.interrupts -= 1;
                return Err(io::Error::new(io::ErrorKind::Interrupted, "signal"));
            }
            self.inner.read(buf)
        }
    }

    #[test]
    fn test_read_retrying_interrupted() {
        let mut flaky = Flaky { inner: Cursor::new(pattern(8)), interrupts: 3 };
        let mut buf = [0u8; 4];
        assert_eq!(read_retrying(&mut flaky, &mut buf).unwrap(), 4);
        assert_eq!(buf, [0, 1, 2, 3]);
        assert_eq!(flaky.interrupts, 0);
    }

    #[test]
    fn test_read_retrying_passes_other_errors() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
            }
        }

        let mut buf = [0u8; 4];
        assert!(read_retrying(&mut Broken, &mut buf).unwrap_err().is_io());
    }

    #[test]
    fn test_io_source_boxed_stream() {
        let inner: Box<dyn ReadSeek> = Box::new(Cursor::new(pattern(32)));
        let mut source = IoSource::new(inner);
        source.seek(30).unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(source.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], &[30, 31]);
    }

    #[test]
    fn test_io_source_close() {
        let mut source = IoSource::new(Cursor::new(pattern(8)));
        source.close().unwrap();

        let mut buf = [0u8; 1];
        assert!(source.read(&mut buf).unwrap_err().is_closed());
        assert!(source.close().unwrap_err().is_contract_violation());
        assert!(source.into_inner().is_none());
    }

    #[test]
    fn test_read_fully_short_source() {
        let mut source = IoSource::new(Cursor::new(pattern(10)));
        source.seek(6).unwrap();

        let mut buf = [0u8; 8];
        let err = source.read_fully(&mut buf).unwrap_err();
        match err {
            Error::Io(e) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("expected I/O error, got {other:?}"),
        }

        source.seek(2).unwrap();
        source.read_fully(&mut buf).unwrap();
        assert_eq!(buf, [2, 3, 4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn test_io_stream_seek_variants() {
        let source = IoSource::new(Cursor::new(pattern(50)));
        let mut stream = IoStream::new(source);

        assert_eq!(stream.seek(SeekFrom::End(-5)).unwrap(), 45);
        let mut buf = [0u8; 2];
        stream.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [45, 46]);

        assert_eq!(stream.seek(SeekFrom::Current(-7)).unwrap(), 40);
        assert!(stream.seek(SeekFrom::Current(-100)).is_err());

        // Past the end is accepted and reads as EOF
        assert_eq!(stream.seek(SeekFrom::Start(80)).unwrap(), 80);
        assert_eq!(stream.read(&mut buf).unwrap(), 0);
    }
}
