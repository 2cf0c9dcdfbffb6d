//! Entry writer that compresses data on-the-fly straight into the archive
//! stream.
//!
//! The local header goes out with the first byte of content. When the
//! entry is closed, CRC and sizes are patched into that header if the
//! stream can seek, or appended as a data descriptor if it cannot.

use crate::archive::ZipArchive;
use crate::entry::EntryState;
use crate::error::{Result, ZipError};
use crate::stream::ArchiveStream;
use crc32fast::Hasher as Crc32;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use log::trace;
use std::io::{self, Write};

/// Compression method of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    /// No compression (stored)
    Stored,
    /// DEFLATE compression (most common)
    Deflate,
    /// Any other method code found in an existing archive. Such entries can
    /// be carried through an update untouched but not read or written.
    Unknown(u16),
}

impl CompressionMethod {
    pub(crate) fn to_zip_method(self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(code) => code,
        }
    }

    pub(crate) fn from_zip_method(code: u16) -> Self {
        match code {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            other => CompressionMethod::Unknown(other),
        }
    }
}

trait CompressorWrite: Write {
    fn finish_compression(self: Box<Self>) -> Result<CompressedBuffer>;
    fn get_buffer_mut(&mut self) -> &mut CompressedBuffer;
}

struct StoredCompressor {
    buffer: CompressedBuffer,
}

impl Write for StoredCompressor {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl CompressorWrite for StoredCompressor {
    fn finish_compression(self: Box<Self>) -> Result<CompressedBuffer> {
        Ok(self.buffer)
    }

    fn get_buffer_mut(&mut self) -> &mut CompressedBuffer {
        &mut self.buffer
    }
}

struct DeflateCompressor {
    encoder: DeflateEncoder<CompressedBuffer>,
}

impl Write for DeflateCompressor {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.encoder.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.encoder.flush()
    }
}

impl CompressorWrite for DeflateCompressor {
    fn finish_compression(self: Box<Self>) -> Result<CompressedBuffer> {
        Ok(self.encoder.finish()?)
    }

    fn get_buffer_mut(&mut self) -> &mut CompressedBuffer {
        self.encoder.get_mut()
    }
}

/// Metadata tracker for CRC and byte counts
struct CrcCounter {
    crc: Crc32,
    uncompressed_count: u64,
    compressed_count: u64,
}

impl CrcCounter {
    fn new() -> Self {
        Self {
            crc: Crc32::new(),
            uncompressed_count: 0,
            compressed_count: 0,
        }
    }

    fn update_uncompressed(&mut self, data: &[u8]) {
        self.crc.update(data);
        self.uncompressed_count += data.len() as u64;
    }

    fn add_compressed(&mut self, count: u64) {
        self.compressed_count += count;
    }

    fn finalize(&self) -> u32 {
        self.crc.clone().finalize()
    }
}

/// Buffered writer for compressed data.
///
/// Initial capacity and flush threshold scale with the expected entry size
/// so small entries do not allocate megabytes up front.
struct CompressedBuffer {
    buffer: Vec<u8>,
    flush_threshold: usize,
}

impl CompressedBuffer {
    /// - Tiny (<10KB): 8KB initial, 256KB threshold
    /// - Small (<100KB): 32KB initial, 512KB threshold
    /// - Medium (<1MB): 128KB initial, 2MB threshold
    /// - Large (<10MB): 256KB initial, 4MB threshold
    /// - Unknown or larger: 512KB initial, 8MB threshold
    fn with_size_hint(size_hint: Option<u64>) -> Self {
        let (initial_capacity, flush_threshold) = match size_hint {
            Some(size) if size < 10_000 => (8 * 1024, 256 * 1024),
            Some(size) if size < 100_000 => (32 * 1024, 512 * 1024),
            Some(size) if size < 1_000_000 => (128 * 1024, 2 * 1024 * 1024),
            Some(size) if size < 10_000_000 => (256 * 1024, 4 * 1024 * 1024),
            _ => (512 * 1024, 8 * 1024 * 1024),
        };

        Self {
            buffer: Vec::with_capacity(initial_capacity),
            flush_threshold,
        }
    }

    fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buffer)
    }

    fn should_flush(&self) -> bool {
        self.buffer.len() >= self.flush_threshold
    }
}

impl Write for CompressedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Write stream for one entry of an archive in Create mode.
///
/// Holds the archive mutably, so no other entry can be created or written
/// while it is alive. Call [`finish`](Self::finish) to observe errors;
/// dropping the writer finishes it and discards them.
pub struct EntryWriter<'a, S: ArchiveStream> {
    archive: &'a mut ZipArchive<S>,
    index: usize,
    encoder: Option<Box<dyn CompressorWrite>>,
    counter: CrcCounter,
    ever_written: bool,
    used_zip64_in_local_header: bool,
    finished: bool,
}

impl<'a, S: ArchiveStream> EntryWriter<'a, S> {
    pub(crate) fn new(
        archive: &'a mut ZipArchive<S>,
        index: usize,
        size_hint: Option<u64>,
    ) -> Result<Self> {
        let level = Compression::new(archive.options.compression_level());
        let buffer = CompressedBuffer::with_size_hint(size_hint);
        let encoder: Box<dyn CompressorWrite> =
            match archive.entries[index].compression_method() {
                CompressionMethod::Stored => Box::new(StoredCompressor { buffer }),
                CompressionMethod::Deflate => Box::new(DeflateCompressor {
                    encoder: DeflateEncoder::new(buffer, level),
                }),
                CompressionMethod::Unknown(code) => {
                    return Err(ZipError::UnsupportedCompression(code))
                }
            };

        Ok(EntryWriter {
            archive,
            index,
            encoder: Some(encoder),
            counter: CrcCounter::new(),
            ever_written: false,
            used_zip64_in_local_header: false,
            finished: false,
        })
    }

    /// Compress `data` into the entry
    pub fn write_data(&mut self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        if self.finished {
            return Err(ZipError::state("entry writer is already finished"));
        }

        let entry = &self.archive.entries[self.index];
        if entry.is_directory() {
            return Err(ZipError::DirectoryWithData(entry.name().to_string()));
        }

        if !self.ever_written {
            self.ever_written = true;
            let can_seek = self.archive.stream.can_seek();
            let (entry, stream) = self.archive.entry_and_stream(self.index);
            self.used_zip64_in_local_header =
                entry.write_local_file_header(stream, false, can_seek)?;
        }

        self.counter.update_uncompressed(data);

        let encoder = self
            .encoder
            .as_mut()
            .ok_or_else(|| ZipError::state("entry writer is already finished"))?;
        encoder.write_all(data)?;

        // Keep memory bounded by moving compressed output to the archive
        let buffer = encoder.get_buffer_mut();
        if buffer.should_flush() {
            let compressed_data = buffer.take();
            self.archive.stream.write_all(&compressed_data)?;
            self.counter.add_compressed(compressed_data.len() as u64);
        }

        Ok(())
    }

    /// Flush the compressor, record CRC and sizes, and release the archive
    /// stream for the next entry
    pub fn finish(mut self) -> Result<()> {
        self.close()
    }

    fn close(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        let encoder = self.encoder.take();
        let can_seek = self.archive.stream.can_seek();
        let archive = &mut *self.archive;
        let (entry, stream) = archive.entry_and_stream(self.index);

        if self.ever_written {
            if let Some(encoder) = encoder {
                let mut buffer = encoder.finish_compression()?;
                let remaining_data = buffer.take();
                if !remaining_data.is_empty() {
                    stream.write_all(&remaining_data)?;
                    self.counter.add_compressed(remaining_data.len() as u64);
                }
            }

            entry.crc32 = self.counter.finalize();
            entry.compressed_size = self.counter.compressed_count;
            entry.uncompressed_size = self.counter.uncompressed_count;

            if can_seek {
                entry.write_crc_and_sizes_in_local_header(stream, self.used_zip64_in_local_header)?;
            } else {
                entry.write_data_descriptor(stream)?;
            }
        } else {
            entry.write_local_file_header(stream, true, can_seek)?;
        }

        trace!(
            "finished {}: {} -> {} bytes",
            entry.name(),
            entry.uncompressed_size,
            entry.compressed_size
        );
        entry.state = EntryState::Written;
        let id = entry.id();
        archive.release_stream(id);
        Ok(())
    }
}

impl<S: ArchiveStream> Write for EntryWriter<'_, S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_data(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.archive.stream.flush()
    }
}

impl<S: ArchiveStream> Drop for EntryWriter<'_, S> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
