//! Reference-counted shared stream with atomic positioned reads

use spanio_core::{Error, PositionedSource, Result, SourceHandle};
use std::collections::HashMap;
use std::fmt;
use std::panic::Location;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Environment variable that turns on referrer tracking in [`SharedConfig::from_env`]
pub const TRACK_REFERENCES_ENV: &str = "SPANIO_TRACK_REFERENCES";

/// Identity of one holder of a [`SharedStream`] reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReferrerId(u64);

impl ReferrerId {
    /// Allocate a process-unique referrer id
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ReferrerId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ReferrerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "referrer#{}", self.0)
    }
}

/// Configuration for a shared stream
#[derive(Debug, Clone, Default)]
pub struct SharedConfig {
    /// Record who holds each reference, and where it was taken.
    ///
    /// Enables duplicate/unknown referrer detection and lists leaked holders
    /// when the stream is dropped with references outstanding.
    pub track_referrers: bool,
}

impl SharedConfig {
    /// Build a configuration from `SPANIO_TRACK_REFERENCES` (`1`/`true`/`yes`)
    pub fn from_env() -> Self {
        let track_referrers = std::env::var(TRACK_REFERENCES_ENV)
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        Self { track_referrers }
    }
}

struct SharedState {
    source: SourceHandle,
    ref_count: u64,
    /// The creator has released its own reference
    closed: bool,
    /// The source has been physically closed
    released: bool,
    referrers: Option<HashMap<ReferrerId, &'static Location<'static>>>,
}

impl SharedState {
    fn ensure_live(&self) -> Result<()> {
        if self.released {
            return Err(Error::stream_closed(
                "shared stream source has been released",
            ));
        }
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        self.ensure_live()?;
        if self.closed {
            return Err(Error::stream_closed("shared stream closed by its creator"));
        }
        Ok(())
    }

    /// The creator's reference can be released once, by either path
    fn release_owner(&mut self, owner: ReferrerId) -> Result<()> {
        if self.closed {
            return Err(Error::contract_violation(format!(
                "creator reference {} already released",
                owner
            )));
        }
        self.closed = true;
        self.decrement(owner)
    }

    fn decrement(&mut self, referrer: ReferrerId) -> Result<()> {
        if self.ref_count == 0 {
            return Err(Error::contract_violation(format!(
                "{} removed a reference but none are outstanding",
                referrer
            )));
        }

        if let Some(referrers) = self.referrers.as_mut() {
            if referrers.remove(&referrer).is_none() {
                return Err(Error::contract_violation(format!(
                    "{} does not hold a reference",
                    referrer
                )));
            }
        }

        tracing::debug!(
            "Reference removed ({} -> {}) by {}",
            self.ref_count,
            self.ref_count - 1,
            referrer
        );
        self.ref_count -= 1;

        if self.ref_count == 0 {
            // Marked first so a failing close is still never retried
            self.released = true;
            tracing::debug!("Last reference gone, closing source");
            self.source.close()?;
        }
        Ok(())
    }
}

/// One opened source shared by many independent readers.
///
/// The creator holds reference #1 (under [`owner`](Self::owner)). Every other
/// holder registers with [`add_reference`](Self::add_reference) and releases
/// with [`remove_reference`](Self::remove_reference); the source is closed
/// exactly once, when the count reaches zero.
///
/// All operations run under one lock, so [`read_from`](Self::read_from)'s
/// seek-read-restore sequence is indivisible with respect to every other call.
///
/// # Example
///
/// ```rust
/// use spanio_core::IoSource;
/// use spanio_pipeline::SharedStream;
/// use std::io::Cursor;
///
/// let shared = SharedStream::new(IoSource::new(Cursor::new((0u8..64).collect::<Vec<_>>())));
/// let mut buf = [0u8; 4];
/// assert_eq!(shared.read_from(10, &mut buf).unwrap(), 4);
/// assert_eq!(buf, [10, 11, 12, 13]);
/// assert_eq!(shared.position().unwrap(), 0);
/// shared.close().unwrap();
/// ```
pub struct SharedStream {
    state: Mutex<SharedState>,
    owner: ReferrerId,
}

impl SharedStream {
    /// Wrap an open source with the default configuration
    #[track_caller]
    pub fn new(source: impl PositionedSource + 'static) -> Self {
        Self::with_config(source, SharedConfig::default())
    }

    /// Wrap an open source
    #[track_caller]
    pub fn with_config(source: impl PositionedSource + 'static, config: SharedConfig) -> Self {
        let owner = ReferrerId::next();
        let caller = Location::caller();
        let referrers = config.track_referrers.then(|| {
            let mut map = HashMap::new();
            map.insert(owner, caller);
            map
        });

        Self {
            state: Mutex::new(SharedState {
                source: Box::new(source),
                ref_count: 1,
                closed: false,
                released: false,
                referrers,
            }),
            owner,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, SharedState>> {
        Ok(self.state.lock()?)
    }

    /// The referrer id of the creator's implicit reference
    pub fn owner(&self) -> ReferrerId {
        self.owner
    }

    /// Register one more holder.
    ///
    /// # Errors
    ///
    /// [`Error::StreamClosed`] once the creator closed or the source is gone;
    /// a contract violation if tracking is on and `referrer` already holds one.
    #[track_caller]
    pub fn add_reference(&self, referrer: ReferrerId) -> Result<()> {
        let caller = Location::caller();
        let mut state = self.lock()?;
        state.ensure_open()?;

        if let Some(referrers) = state.referrers.as_mut() {
            if referrers.contains_key(&referrer) {
                return Err(Error::contract_violation(format!(
                    "{} already holds a reference",
                    referrer
                )));
            }
            referrers.insert(referrer, caller);
        }

        tracing::debug!(
            "Reference added ({} -> {}) by {}",
            state.ref_count,
            state.ref_count + 1,
            referrer
        );
        state.ref_count += 1;
        Ok(())
    }

    /// Release one holder's reference, closing the source at zero.
    ///
    /// # Errors
    ///
    /// A contract violation when no references are outstanding (double
    /// release) or, with tracking on, when `referrer` holds none. Passing
    /// [`owner`](Self::owner) is the same as [`close`](Self::close).
    pub fn remove_reference(&self, referrer: ReferrerId) -> Result<()> {
        let mut state = self.lock()?;
        if referrer == self.owner {
            return state.release_owner(referrer);
        }
        state.decrement(referrer)
    }

    /// Atomically read at `pos` without disturbing the shared cursor.
    ///
    /// Records the source position, seeks to `pos`, reads, and seeks back even
    /// when the read failed. Returns the number of bytes read (0 = EOF).
    pub fn read_from(&self, pos: u64, buf: &mut [u8]) -> Result<usize> {
        let mut state = self.lock()?;
        state.ensure_live()?;

        let old_pos = state.source.position()?;
        tracing::trace!("read_from({}, {} bytes), cursor at {}", pos, buf.len(), old_pos);

        if old_pos != pos {
            state.source.seek(pos)?;
        }

        let res = state.source.read(buf);
        let restored = state.source.seek(old_pos);

        let n = res?;
        restored?;
        tracing::trace!("read_from({}) returned {} bytes", pos, n);
        Ok(n)
    }

    /// How many of `length` bytes can be skipped from `pos`, without moving
    /// any cursor
    pub fn skip_from(&self, pos: u64, length: u64) -> Result<u64> {
        let mut state = self.lock()?;
        state.ensure_live()?;

        let stream_length = state.source.length()?;
        Ok(length.min(stream_length.saturating_sub(pos)))
    }

    /// Bytes between the creator's cursor and the end
    pub fn remaining_length(&self) -> Result<u64> {
        let mut state = self.lock()?;
        state.ensure_open()?;
        state.source.remaining()
    }

    /// Length of the underlying source
    pub fn length(&self) -> Result<u64> {
        let mut state = self.lock()?;
        state.ensure_live()?;
        state.source.length()
    }

    /// The creator's cursor
    pub fn position(&self) -> Result<u64> {
        let mut state = self.lock()?;
        state.ensure_open()?;
        state.source.position()
    }

    /// Read at the creator's cursor
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let mut state = self.lock()?;
        state.ensure_open()?;
        state.source.read(buf)
    }

    /// Move the creator's cursor
    pub fn seek(&self, pos: u64) -> Result<()> {
        let mut state = self.lock()?;
        state.ensure_open()?;
        state.source.seek(pos)
    }

    /// Release the creator's own reference.
    ///
    /// After this no references can be added; existing holders keep reading
    /// until the last one lets go.
    pub fn close(&self) -> Result<()> {
        self.lock()?.release_owner(self.owner)
    }

    /// Outstanding references
    pub fn ref_count(&self) -> Result<u64> {
        Ok(self.lock()?.ref_count)
    }

    /// Whether the creator has closed its reference
    pub fn is_closed(&self) -> Result<bool> {
        Ok(self.lock()?.closed)
    }

    /// Whether the source has been physically closed
    pub fn is_released(&self) -> Result<bool> {
        Ok(self.lock()?.released)
    }
}

impl fmt::Debug for SharedStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("SharedStream");
        s.field("owner", &self.owner);
        if let Ok(state) = self.state.try_lock() {
            s.field("ref_count", &state.ref_count)
                .field("closed", &state.closed)
                .field("released", &state.released);
        }
        s.finish()
    }
}

impl Drop for SharedStream {
    fn drop(&mut self) {
        let state = match self.state.get_mut() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };

        if state.ref_count != 0 {
            tracing::warn!(
                "SharedStream dropped with {} remaining references",
                state.ref_count
            );
            if let Some(referrers) = state.referrers.as_ref() {
                for (referrer, location) in referrers {
                    tracing::warn!("  {} taken at {}", referrer, location);
                }
            }
        }
    }
}
