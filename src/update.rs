//! Read/write/seek view over an entry's in-memory content in Update mode

use crate::error::ZipError;
use crate::stream::resize_buffer;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

/// Seekable stream over the uncompressed content of an entry opened for
/// update. Changes are written back when the archive is finished.
pub struct EntryUpdateStream<'a> {
    cursor: Cursor<&'a mut Vec<u8>>,
    open: &'a mut bool,
    directory_name: Option<String>,
}

impl<'a> EntryUpdateStream<'a> {
    pub(crate) fn new(data: &'a mut Vec<u8>, open: &'a mut bool, directory_name: Option<String>) -> Self {
        *open = true;
        EntryUpdateStream {
            cursor: Cursor::new(data),
            open,
            directory_name,
        }
    }

    /// Current content length
    pub fn len(&self) -> u64 {
        self.cursor.get_ref().len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.cursor.get_ref().is_empty()
    }

    /// Truncate or zero-extend the content
    pub fn set_len(&mut self, len: u64) -> io::Result<()> {
        if len > 0 {
            self.check_writable()?;
        }
        resize_buffer(self.cursor.get_mut(), len)
    }

    fn check_writable(&self) -> io::Result<()> {
        match &self.directory_name {
            Some(name) => Err(ZipError::DirectoryWithData(name.clone()).into()),
            None => Ok(()),
        }
    }
}

impl Read for EntryUpdateStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl Write for EntryUpdateStream<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !buf.is_empty() {
            self.check_writable()?;
        }
        self.cursor.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for EntryUpdateStream<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.cursor.seek(pos)
    }
}

impl Drop for EntryUpdateStream<'_> {
    fn drop(&mut self) {
        *self.open = false;
    }
}
