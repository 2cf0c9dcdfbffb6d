//! Backing streams for archives that are written.
//!
//! Create and Update modes need a stream they can write to; Update mode
//! also reads it back and truncates it before re-emitting the archive.
//! [`ForwardOnly`] adapts any plain [`Write`] (a socket, a pipe, stdout) by
//! reporting itself as non-seekable, which switches entry writing to the
//! data descriptor path.

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

/// A stream an archive can be created or updated on
pub trait ArchiveStream: Read + Write + Seek {
    /// Whether the stream supports seeking backwards. Entry headers of
    /// non-seekable streams are never patched in place.
    fn can_seek(&self) -> bool {
        true
    }

    /// Truncate or extend the stream to `len` bytes
    fn set_len(&mut self, len: u64) -> io::Result<()>;
}

impl ArchiveStream for File {
    fn set_len(&mut self, len: u64) -> io::Result<()> {
        File::set_len(self, len)
    }
}

impl ArchiveStream for Cursor<Vec<u8>> {
    fn set_len(&mut self, len: u64) -> io::Result<()> {
        resize_buffer(self.get_mut(), len)
    }
}

impl ArchiveStream for Cursor<&mut Vec<u8>> {
    fn set_len(&mut self, len: u64) -> io::Result<()> {
        resize_buffer(self.get_mut(), len)
    }
}

/// Truncate or zero-extend an in-memory buffer. Lengths the process cannot
/// hold are reported as errors and leave the buffer untouched.
pub(crate) fn resize_buffer(buffer: &mut Vec<u8>, len: u64) -> io::Result<()> {
    let len = usize::try_from(len).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("length {len} exceeds the address space"),
        )
    })?;
    if len > buffer.len() {
        buffer
            .try_reserve(len - buffer.len())
            .map_err(|e| io::Error::new(io::ErrorKind::OutOfMemory, e))?;
    }
    buffer.resize(len, 0);
    Ok(())
}

impl<T: ArchiveStream + ?Sized> ArchiveStream for &mut T {
    fn can_seek(&self) -> bool {
        (**self).can_seek()
    }

    fn set_len(&mut self, len: u64) -> io::Result<()> {
        (**self).set_len(len)
    }
}

/// Write-only, non-seekable adapter.
///
/// Tracks how many bytes went through so the archive can record offsets.
/// Seeking is limited to asking for the current position.
#[derive(Debug)]
pub struct ForwardOnly<W: Write> {
    inner: W,
    position: u64,
}

impl<W: Write> ForwardOnly<W> {
    pub fn new(inner: W) -> Self {
        ForwardOnly { inner, position: 0 }
    }

    /// Bytes written so far
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for ForwardOnly<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.position += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write> Read for ForwardOnly<W> {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "stream is write-only",
        ))
    }
}

impl<W: Write> Seek for ForwardOnly<W> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match pos {
            SeekFrom::Current(0) => Ok(self.position),
            SeekFrom::Start(p) if p == self.position => Ok(self.position),
            _ => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "stream does not support seeking",
            )),
        }
    }
}

impl<W: Write> ArchiveStream for ForwardOnly<W> {
    fn can_seek(&self) -> bool {
        false
    }

    fn set_len(&mut self, _len: u64) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "stream cannot be truncated",
        ))
    }
}
