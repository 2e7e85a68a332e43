//! # spanio core
//!
//! Core traits, error handling and binary helpers shared by the spanio
//! stream layers.
//!
//! - **PositionedSource**: the random-access capability every layer reads through
//! - **IoSource / IoStream**: bridges to and from `std::io::{Read, Seek}`
//! - **FlagBit**: bit accessors for flag fields inside owned byte buffers
//! - **units**: human-readable sizes
//!
//! ## Example
//!
//! ```rust
//! use spanio_core::{IoSource, PositionedSource, Result};
//! use std::io::Cursor;
//!
//! fn header(source: &mut dyn PositionedSource) -> Result<[u8; 4]> {
//!     let mut magic = [0u8; 4];
//!     source.seek(0)?;
//!     source.read_fully(&mut magic)?;
//!     Ok(magic)
//! }
//!
//! let mut source = IoSource::new(Cursor::new(b"EVF\x09rest".to_vec()));
//! assert_eq!(&header(&mut source).unwrap(), b"EVF\x09");
//! ```

pub mod adapt;
pub mod bits;
pub mod error;
pub mod limits;
pub mod traits;
pub mod units;

// Re-export commonly used items
pub use adapt::{read_retrying, IoSource, IoStream};
pub use bits::{byte_swap, byte_swapped, hex_dump, FlagBit};
pub use error::{Error, Result};
pub use traits::{PositionedSource, ReadSeek, SourceHandle};
pub use units::{bytes_to_binary_unit, bytes_to_decimal_bit_unit, round_to_decimals};
