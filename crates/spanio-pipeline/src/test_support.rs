//! In-memory sources for unit tests

use spanio_core::{Error, PositionedSource, Result};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Deterministic byte pattern; position `i` holds `i % 251`
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Bytes all equal to `value`
pub fn filled(len: usize, value: u8) -> Vec<u8> {
    vec![value; len]
}

/// Shared view of how often a [`CountingSource`] was closed
#[derive(Clone, Default)]
pub struct CloseCounter(Arc<AtomicUsize>);

impl CloseCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Source over a byte vector that counts `close` calls
pub struct CountingSource {
    data: Vec<u8>,
    position: u64,
    closes: CloseCounter,
    max_read: Option<usize>,
    fail_reads: bool,
}

impl CountingSource {
    pub fn new(data: Vec<u8>) -> (Self, CloseCounter) {
        let closes = CloseCounter::default();
        let source = Self {
            data,
            position: 0,
            closes: closes.clone(),
            max_read: None,
            fail_reads: false,
        };
        (source, closes)
    }

    /// Every read returns at most `max_read` bytes
    pub fn short_reads(data: Vec<u8>, max_read: usize) -> (Self, CloseCounter) {
        let (mut source, closes) = Self::new(data);
        source.max_read = Some(max_read);
        (source, closes)
    }

    /// Every read fails with an I/O error
    pub fn failing_reads(data: Vec<u8>) -> (Self, CloseCounter) {
        let (mut source, closes) = Self::new(data);
        source.fail_reads = true;
        (source, closes)
    }
}

impl PositionedSource for CountingSource {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.closes.get() > 0 {
            return Err(Error::stream_closed("CountingSource closed"));
        }
        if self.fail_reads {
            return Err(io::Error::new(io::ErrorKind::Other, "injected read failure").into());
        }

        let start = (self.position as usize).min(self.data.len());
        let mut n = buf.len().min(self.data.len() - start);
        if let Some(max) = self.max_read {
            n = n.min(max);
        }
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        self.position += n as u64;
        Ok(n)
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        self.position = pos;
        Ok(())
    }

    fn position(&mut self) -> Result<u64> {
        Ok(self.position)
    }

    fn length(&mut self) -> Result<u64> {
        Ok(self.data.len() as u64)
    }

    fn close(&mut self) -> Result<()> {
        self.closes.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
