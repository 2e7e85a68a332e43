//! File-backed positioned sources

use crate::mmap::MmapSource;
use spanio_core::limits::validate_file_path;
use spanio_core::{read_retrying, Error, PositionedSource, Result, SourceHandle};
use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Configuration for opening a source from a path
#[derive(Debug, Clone, Default)]
pub struct SourceConfig {
    /// Use memory mapping instead of plain file reads
    pub use_mmap: bool,
}

/// Open `path` as a boxed source, memory-mapped or not per `config`
///
/// Only regular files are accepted, whichever backend is chosen.
///
/// # Example
///
/// ```rust,no_run
/// use spanio_pipeline::{open_source, SourceConfig};
/// use std::path::Path;
///
/// let source = open_source(Path::new("disk.E01"), &SourceConfig::default()).unwrap();
/// ```
pub fn open_source(path: &Path, config: &SourceConfig) -> Result<SourceHandle> {
    let canonical = validate_file_path(path)?;
    tracing::debug!("Opening {} (mmap: {})", canonical.display(), config.use_mmap);
    let source: SourceHandle = if config.use_mmap {
        Box::new(MmapSource::open(path)?)
    } else {
        Box::new(FileSource::open(path)?)
    };
    Ok(source)
}

/// A read-only file as a [`PositionedSource`], remembering the path it was
/// opened from
#[derive(Debug)]
pub struct FileSource {
    file: Option<File>,
    open_path: PathBuf,
}

impl FileSource {
    /// Open a file for reading
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::from_file(file, path))
    }

    /// Wrap an already open file
    pub fn from_file(file: File, open_path: impl Into<PathBuf>) -> Self {
        Self {
            file: Some(file),
            open_path: open_path.into(),
        }
    }

    /// The path this source was opened from
    pub fn open_path(&self) -> &Path {
        &self.open_path
    }

    fn file(&mut self) -> Result<&mut File> {
        let path = &self.open_path;
        self.file
            .as_mut()
            .ok_or_else(|| Error::stream_closed(format!("{} already closed", path.display())))
    }
}

impl PositionedSource for FileSource {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        read_retrying(self.file()?, buf)
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        self.file()?.seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    fn position(&mut self) -> Result<u64> {
        Ok(self.file()?.stream_position()?)
    }

    fn length(&mut self) -> Result<u64> {
        Ok(self.file()?.metadata()?.len())
    }

    fn close(&mut self) -> Result<()> {
        match self.file.take() {
            Some(file) => {
                tracing::trace!("Closing {}", self.open_path.display());
                drop(file);
                Ok(())
            }
            None => Err(Error::contract_violation(format!(
                "{} closed twice",
                self.open_path.display()
            ))),
        }
    }
}
