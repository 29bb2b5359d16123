//! # iidfile - IID-Addressed Segmentation Storage
//!
//! `iidfile` is a binary container for image-segmentation data addressed
//! by Individual IDentifiers (IIDs). A file pairs each IID with one
//! segment (a binary mask stored as rectangular regions) and is laid out
//! so a consumer can memory-map it and materialize only what it needs:
//! headers and the lookup table, IIDs alone, segments alone, the members
//! of a named group, or single keys.
//!
//! ## Architecture
//!
//! - **Codec**: little-endian integers, length-prefixed byte strings,
//!   and `(offset, length)` buffer locations
//! - **Mask / Segment / Region**: the segmentation data model and its
//!   packed bitmap form
//! - **IID**: opaque `(domain, address)` byte pairs with byte-exact
//!   identity
//! - **File**: the header, lookup table, and block codecs, plus the
//!   memory-mapped [`IidFile`] handle with lazy fetch and queries
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use iidfile::{Fetch, Iid, IidFile, Mask, Segment};
//!
//! # fn main() -> Result<(), iidfile::Error> {
//! // Build a file in memory.
//! let mut file = IidFile::new();
//! let mask = Mask::from_rows(&[&[true, false, true], &[true, true, false]]);
//! let seg = Segment::from_mask(&mask, (0, 0))?;
//! file.add(Iid::new(b"ex", b"tree"), seg, Some("trees"))?;
//! file.save("segments.iid")?;
//!
//! // Reopen it and materialize everything.
//! let mut file = IidFile::open("segments.iid")?;
//! for entry in file.fetch(&Fetch::everything())? {
//!     println!("key {} covers {} pixels", entry.key(), entry.seg().unwrap().area());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Thread Safety
//!
//! An [`IidFile`] is single-threaded: queries may materialize data on
//! demand and therefore mutate the handle. Concurrent readers of the
//! same path are safe; one handle shared across threads is not, unless
//! externally serialized.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// Module declarations
pub mod codec;
pub mod config;
pub mod error;
pub mod file;
pub mod iid;
pub mod mask;
pub mod segment;

// Re-exports
pub use codec::Bufloc;
pub use config::{Fetch, Filter, OpenOptions, RegionTest};
pub use error::{Error, Result};
pub use file::{Entry, IidFile, Metadata};
pub use iid::Iid;
pub use mask::Mask;
pub use segment::{BBox, Region, Segment};
