//! # spanio pipeline
//!
//! Layered random-access byte streams.
//!
//! This crate provides the stream layers built on [`PositionedSource`]:
//! - **ConcatenatedStream**: many sources and zero-filled holes as one address space
//! - **SharedStream**: one source, reference counted, positioned reads for many readers
//! - **Substream**: an independent cursor into a shared stream
//! - **PartialReader**: a bounded `std::io::Read` window into a shared stream
//! - **FileSource / MmapSource**: file-backed sources
//!
//! ## Example
//!
//! ```rust,no_run
//! use spanio_core::PositionedSource;
//! use spanio_pipeline::{ConcatenatedStream, FileSource, SharedStream, Substream};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! // Two segment files back to back
//! let first = FileSource::open(Path::new("disk.001")).unwrap();
//! let mut image = ConcatenatedStream::new(first, 0, 1 << 20).unwrap();
//! let second = FileSource::open(Path::new("disk.002")).unwrap();
//! image.add_part(second, 0, 1 << 20).unwrap();
//!
//! // Shared between readers, each with its own cursor
//! let shared = Arc::new(SharedStream::new(image));
//! let mut reader = Substream::new(Arc::clone(&shared)).unwrap();
//! reader.seek(0x8000).unwrap();
//! let mut buf = [0u8; 512];
//! reader.read_fully(&mut buf).unwrap();
//! reader.close().unwrap();
//! shared.close().unwrap();
//! ```
//!
//! [`PositionedSource`]: spanio_core::PositionedSource

pub mod concat;
pub mod file;
pub mod mmap;
pub mod partial;
pub mod shared;
pub mod substream;

#[cfg(test)]
mod test_support;

pub use concat::{ConcatenatedStream, PartInfo, PartKind};
pub use file::{open_source, FileSource, SourceConfig};
pub use mmap::MmapSource;
pub use partial::PartialReader;
pub use shared::{ReferrerId, SharedConfig, SharedStream};
pub use substream::Substream;
