//! Independent cursors over a shared stream

use crate::shared::{ReferrerId, SharedStream};
use spanio_core::{Error, PositionedSource, Result};
use std::sync::Arc;

/// A reader with its own file pointer into a [`SharedStream`].
///
/// Creating a substream registers one reference; [`close`](PositionedSource::close)
/// releases it. Reads go through [`SharedStream::read_from`], so any number of
/// substreams can share one open resource without disturbing each other.
///
/// # Example
///
/// ```rust
/// use spanio_core::{IoSource, PositionedSource};
/// use spanio_pipeline::{SharedStream, Substream};
/// use std::io::Cursor;
/// use std::sync::Arc;
///
/// let shared = Arc::new(SharedStream::new(IoSource::new(Cursor::new(vec![7u8; 16]))));
/// let mut sub = Substream::new(Arc::clone(&shared)).unwrap();
/// sub.seek(12).unwrap();
/// let mut buf = [0u8; 8];
/// assert_eq!(sub.read(&mut buf).unwrap(), 4);
/// sub.close().unwrap();
/// shared.close().unwrap();
/// ```
#[derive(Debug)]
pub struct Substream {
    shared: Arc<SharedStream>,
    id: ReferrerId,
    position: u64,
    closed: bool,
}

impl Substream {
    /// Attach a new cursor at position 0
    #[track_caller]
    pub fn new(shared: Arc<SharedStream>) -> Result<Self> {
        let id = ReferrerId::next();
        shared.add_reference(id)?;
        Ok(Self {
            shared,
            id,
            position: 0,
            closed: false,
        })
    }

    /// Attach another cursor to the same shared stream, at this one's position
    #[track_caller]
    pub fn fork(&self) -> Result<Self> {
        self.ensure_open()?;
        let mut forked = Self::new(Arc::clone(&self.shared))?;
        forked.position = self.position;
        Ok(forked)
    }

    /// The shared stream this cursor reads through
    pub fn shared(&self) -> &Arc<SharedStream> {
        &self.shared
    }

    /// This cursor's referrer id
    pub fn referrer(&self) -> ReferrerId {
        self.id
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::stream_closed(format!("substream {} is closed", self.id)));
        }
        Ok(())
    }
}

impl PositionedSource for Substream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.ensure_open()?;
        let n = self.shared.read_from(self.position, buf)?;
        self.position += n as u64;
        Ok(n)
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        self.ensure_open()?;
        self.position = pos;
        Ok(())
    }

    fn position(&mut self) -> Result<u64> {
        self.ensure_open()?;
        Ok(self.position)
    }

    fn length(&mut self) -> Result<u64> {
        self.ensure_open()?;
        self.shared.length()
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::contract_violation(format!(
                "substream {} closed twice",
                self.id
            )));
        }
        self.closed = true;
        self.shared.remove_reference(self.id)
    }
}

impl Drop for Substream {
    fn drop(&mut self) {
        if !self.closed {
            tracing::warn!("Substream {} dropped without close, releasing its reference", self.id);
            self.closed = true;
            if let Err(e) = self.shared.remove_reference(self.id) {
                tracing::warn!("Releasing {} failed: {}", self.id, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::SharedConfig;
    use crate::test_support::{pattern, CountingSource};

    fn shared_over(len: usize) -> (Arc<SharedStream>, crate::test_support::CloseCounter) {
        let (source, closes) = CountingSource::new(pattern(len));
        (Arc::new(SharedStream::new(source)), closes)
    }

    #[test]
    fn test_substream_registers_reference() {
        let (shared, closes) = shared_over(64);
        let mut a = Substream::new(Arc::clone(&shared)).unwrap();
        let mut b = Substream::new(Arc::clone(&shared)).unwrap();
        assert_eq!(shared.ref_count().unwrap(), 3);

        shared.close().unwrap();
        a.close().unwrap();
        assert_eq!(closes.get(), 0);
        b.close().unwrap();
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn test_substream_read_advances_own_position() {
        let (shared, _closes) = shared_over(64);
        let mut sub = Substream::new(Arc::clone(&shared)).unwrap();
        shared.seek(30).unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(sub.read(&mut buf).unwrap(), 4);
        assert_eq!(buf, [0, 1, 2, 3]);
        assert_eq!(sub.read(&mut buf).unwrap(), 4);
        assert_eq!(buf, [4, 5, 6, 7]);
        assert_eq!(sub.position().unwrap(), 8);
        assert_eq!(shared.position().unwrap(), 30);

        sub.seek(62).unwrap();
        assert_eq!(sub.read(&mut buf).unwrap(), 2);
        assert_eq!(sub.read(&mut buf).unwrap(), 0);
        assert_eq!(sub.position().unwrap(), 64);
        sub.close().unwrap();
    }

    #[test]
    fn test_substream_double_close() {
        let (shared, closes) = shared_over(8);
        let mut sub = Substream::new(Arc::clone(&shared)).unwrap();
        sub.close().unwrap();

        assert!(sub.close().unwrap_err().is_contract_violation());
        let mut buf = [0u8; 1];
        assert!(sub.read(&mut buf).unwrap_err().is_closed());
        assert_eq!(shared.ref_count().unwrap(), 1);

        shared.close().unwrap();
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn test_substream_after_owner_closed_is_rejected() {
        let (shared, closes) = shared_over(8);
        shared.close().unwrap();
        assert!(Substream::new(Arc::clone(&shared)).unwrap_err().is_closed());
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn test_dropped_substream_releases_reference() {
        let (shared, closes) = shared_over(8);
        {
            let _sub = Substream::new(Arc::clone(&shared)).unwrap();
            assert_eq!(shared.ref_count().unwrap(), 2);
        }
        assert_eq!(shared.ref_count().unwrap(), 1);
        shared.close().unwrap();
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn test_fork_copies_position() {
        let (shared, _closes) = shared_over(32);
        let mut sub = Substream::new(Arc::clone(&shared)).unwrap();
        sub.seek(20).unwrap();

        let mut forked = sub.fork().unwrap();
        assert_eq!(forked.position().unwrap(), 20);
        assert_eq!(shared.ref_count().unwrap(), 3);

        forked.seek(0).unwrap();
        assert_eq!(sub.position().unwrap(), 20);

        forked.close().unwrap();
        sub.close().unwrap();
    }

    #[test]
    fn test_concurrent_substreams_are_independent() {
        let data = pattern(8192);
        let (source, closes) = CountingSource::new(data.clone());
        let shared = Arc::new(SharedStream::with_config(
            source,
            SharedConfig { track_referrers: true },
        ));

        std::thread::scope(|scope| {
            for t in 0..4u64 {
                let mut sub = Substream::new(Arc::clone(&shared)).unwrap();
                let data = &data;
                scope.spawn(move || {
                    let start = t * 2000;
                    sub.seek(start).unwrap();
                    assert_eq!(sub.length().unwrap(), 8192);

                    let mut out = vec![0u8; 1500];
                    sub.read_fully(&mut out).unwrap();
                    assert_eq!(&out[..], &data[start as usize..start as usize + 1500]);
                    assert_eq!(sub.position().unwrap(), start + 1500);
                    sub.close().unwrap();
                });
            }
        });

        assert_eq!(shared.ref_count().unwrap(), 1);
        shared.close().unwrap();
        assert_eq!(closes.get(), 1);
    }
}
