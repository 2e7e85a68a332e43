//! Memory-mapped source for high-throughput reads

use memmap2::Mmap;
use spanio_core::limits::{u64_to_usize, MAX_MMAP_SIZE};
use spanio_core::{Error, PositionedSource, Result};
use std::fs::File;
use std::path::Path;

/// A read-only memory-mapped file as a [`PositionedSource`].
///
/// Reads are plain copies out of the mapping, with no system call per read.
///
/// # Example
///
/// ```rust,no_run
/// use spanio_pipeline::MmapSource;
/// use std::path::Path;
///
/// let source = MmapSource::open(Path::new("disk.img")).unwrap();
/// ```
pub struct MmapSource {
    mmap: Option<Mmap>,
    position: u64,
}

impl MmapSource {
    /// Open a file with memory mapping
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or mapped
    ///
    /// # Safety
    ///
    /// Uses `unsafe` for memory mapping because:
    /// - The OS guarantees memory safety for valid file descriptors
    /// - We validate the file is a regular file before mapping
    /// - The mapping is read-only
    /// - File must not be truncated during access (caller responsibility)
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_file(&file)
    }

    /// Create a memory-mapped source from an existing file
    ///
    /// # Safety
    ///
    /// See `open()` for safety documentation
    pub fn from_file(file: &File) -> Result<Self> {
        let metadata = file.metadata()?;

        // Validate file is a regular file (not device, pipe, directory, etc.)
        if !metadata.is_file() {
            return Err(Error::out_of_bounds("Only regular files can be memory-mapped"));
        }

        if metadata.len() > MAX_MMAP_SIZE {
            return Err(Error::out_of_bounds(format!(
                "File size {} exceeds memory mapping limit {} (16 GB)",
                metadata.len(),
                MAX_MMAP_SIZE
            )));
        }

        // SAFETY: regular file, bounded size, valid descriptor, read-only map
        let mmap = unsafe { Mmap::map(file)? };

        Ok(Self {
            mmap: Some(mmap),
            position: 0,
        })
    }

    fn mapping(&self) -> Result<&Mmap> {
        self.mmap
            .as_ref()
            .ok_or_else(|| Error::stream_closed("memory mapping already closed"))
    }

    /// The mapped bytes from the current position on
    pub fn as_slice(&self) -> Result<&[u8]> {
        let mmap = self.mapping()?;
        let start = u64_to_usize(self.position, "mmap position")
            .unwrap_or(mmap.len())
            .min(mmap.len());
        Ok(&mmap[start..])
    }
}

impl PositionedSource for MmapSource {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = {
            let available = self.as_slice()?;
            let n = buf.len().min(available.len());
            buf[..n].copy_from_slice(&available[..n]);
            n
        };
        self.position += n as u64;
        Ok(n)
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        self.mapping()?;
        // Seeking past the end is allowed; reads there return 0
        self.position = pos;
        Ok(())
    }

    fn position(&mut self) -> Result<u64> {
        self.mapping()?;
        Ok(self.position)
    }

    fn length(&mut self) -> Result<u64> {
        Ok(self.mapping()?.len() as u64)
    }

    fn close(&mut self) -> Result<()> {
        match self.mmap.take() {
            Some(_) => Ok(()),
            None => Err(Error::contract_violation("memory mapping closed twice")),
        }
    }
}
