//! # ziparchive: ZIP archives over any byte stream
//!
//! `ziparchive` reads, creates and updates ZIP archives directly against a
//! backing stream. Sizes and offsets beyond 4 GiB are handled with Zip64
//! records, and archives can be written to streams that cannot seek.
//!
//! ## Features
//!
//! - **Read**: list entries and stream their content, CRC-checked
//! - **Create**: compress entries on-the-fly straight into the stream
//! - **Non-seekable output**: data descriptors instead of header patching
//! - **Update**: modify, add and delete entries, then rewrite the archive
//! - **Lossless**: unknown extra fields and comments survive a rewrite
//!
//! ## Quick Start
//!
//! ### Reading a ZIP file
//!
//! ```no_run
//! use ziparchive::ZipArchive;
//!
//! let mut archive = ZipArchive::open("archive.zip")?;
//!
//! for entry in archive.entries() {
//!     println!("{}: {} bytes", entry.name(), entry.length()?);
//! }
//!
//! let data = archive.read_entry_by_name("file.txt")?;
//! # Ok::<(), ziparchive::ZipError>(())
//! ```
//!
//! ### Writing a ZIP file
//!
//! ```no_run
//! use ziparchive::ZipArchive;
//!
//! let mut archive = ZipArchive::create_file("output.zip")?;
//!
//! let mut writer = archive.start_entry("file1.txt")?;
//! writer.write_data(b"Hello, World!")?;
//! writer.finish()?;
//!
//! archive.start_entry("file2.txt")?.write_data(b"Another file")?;
//!
//! archive.finish()?;
//! # Ok::<(), ziparchive::ZipError>(())
//! ```
//!
//! ### Updating in memory
//!
//! ```no_run
//! use std::io::{Cursor, Write};
//! use ziparchive::ZipArchive;
//!
//! # let zip_bytes: Vec<u8> = Vec::new();
//! let mut archive = ZipArchive::update(Cursor::new(zip_bytes))?;
//!
//! if let Some(id) = archive.find_entry("notes.txt") {
//!     let mut stream = archive.open_for_update(id)?;
//!     stream.set_len(0)?;
//!     stream.write_all(b"rewritten")?;
//! }
//! if let Some(id) = archive.find_entry("obsolete.bin") {
//!     archive.delete_entry(id)?;
//! }
//!
//! let zip_bytes = archive.finish()?.into_inner();
//! # Ok::<(), ziparchive::ZipError>(())
//! ```

pub mod archive;
mod binary;
mod cp437;
pub mod datetime;
pub mod entry;
pub mod error;
pub mod extra;
mod headers;
pub mod reader;
pub mod stream;
pub mod update;
pub mod writer;

pub use archive::{ZipArchive, ZipArchiveOptions};
pub use datetime::DateTime;
pub use entry::{ArchiveMode, EntryId, ZipEntry};
pub use error::{ErrorKind, Result, ZipError};
pub use extra::{ExtraField, Zip64ExtraField};
pub use headers::{CentralDirectoryHeader, FLAG_DATA_DESCRIPTOR, FLAG_UNICODE_FILE_NAME};
pub use reader::EntryReader;
pub use stream::{ArchiveStream, ForwardOnly};
pub use update::EntryUpdateStream;
pub use writer::{CompressionMethod, EntryWriter};
