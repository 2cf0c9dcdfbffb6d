//! Streaming entry reader: a bounded view of the archive stream, inflated
//! on-the-fly when the entry is DEFLATE compressed.

use crate::error::ZipError;
use crc32fast::Hasher as Crc32;
use flate2::read::DeflateDecoder;
use std::io::{self, Cursor, Read, Take};

enum Source<'a, S: Read> {
    Stored(Take<&'a mut S>),
    Deflate(DeflateDecoder<Take<&'a mut S>>),
    Buffered(Cursor<&'a [u8]>),
}

/// Reader over one entry's uncompressed content.
///
/// Entries read from the archive stream are checked against their stored
/// CRC-32 and length when the end is reached. Content buffered for update
/// is returned as is.
pub struct EntryReader<'a, S: Read> {
    source: Source<'a, S>,
    hasher: Crc32,
    bytes_read: u64,
    expected: Option<(u32, u64)>,
}

impl<'a, S: Read> EntryReader<'a, S> {
    pub(crate) fn stored(stream: &'a mut S, compressed_size: u64, crc32: u32, length: u64) -> Self {
        Self::with_source(
            Source::Stored(stream.take(compressed_size)),
            Some((crc32, length)),
        )
    }

    pub(crate) fn deflate(
        stream: &'a mut S,
        compressed_size: u64,
        crc32: u32,
        length: u64,
    ) -> Self {
        Self::with_source(
            Source::Deflate(DeflateDecoder::new(stream.take(compressed_size))),
            Some((crc32, length)),
        )
    }

    pub(crate) fn buffered(data: &'a [u8]) -> Self {
        Self::with_source(Source::Buffered(Cursor::new(data)), None)
    }

    fn with_source(source: Source<'a, S>, expected: Option<(u32, u64)>) -> Self {
        EntryReader {
            source,
            hasher: Crc32::new(),
            bytes_read: 0,
            expected,
        }
    }

    fn verify(&self) -> io::Result<()> {
        let Some((crc32, length)) = self.expected else {
            return Ok(());
        };
        if self.bytes_read != length {
            return Err(ZipError::format(format!(
                "entry holds {} bytes, its header declares {}",
                self.bytes_read, length
            ))
            .into());
        }
        let computed = self.hasher.clone().finalize();
        if computed != crc32 {
            return Err(ZipError::CrcMismatch {
                expected: crc32,
                computed,
            }
            .into());
        }
        Ok(())
    }
}

impl<S: Read> Read for EntryReader<'_, S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = match &mut self.source {
            Source::Stored(r) => r.read(buf)?,
            Source::Deflate(r) => r.read(buf)?,
            Source::Buffered(r) => r.read(buf)?,
        };
        if n == 0 && !buf.is_empty() {
            self.verify()?;
        } else {
            self.hasher.update(&buf[..n]);
            self.bytes_read += n as u64;
        }
        Ok(n)
    }
}
