//! Little-endian field helpers, record signatures and the backward signature
//! search used to locate the end of central directory record.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{self, Read, Seek, SeekFrom};

/// ZIP local file header signature
pub(crate) const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x04034b50;

/// ZIP central directory signature
pub(crate) const CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x02014b50;

/// ZIP end of central directory signature
pub(crate) const END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x06054b50;

/// ZIP64 end of central directory record signature
pub(crate) const ZIP64_END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x06064b50;

/// ZIP64 end of central directory locator signature
pub(crate) const ZIP64_END_OF_CENTRAL_DIRECTORY_LOCATOR_SIGNATURE: u32 = 0x07064b50;

/// Data descriptor signature
pub(crate) const DATA_DESCRIPTOR_SIGNATURE: u32 = 0x08074b50;

/// 32-bit size/offset sentinel meaning "see the Zip64 extra field"
pub(crate) const MASK_32: u32 = 0xFFFF_FFFF;

/// 16-bit disk number / entry count sentinel
pub(crate) const MASK_16: u16 = 0xFFFF;

/// Read exactly `len` bytes into a fresh vector
pub(crate) fn read_vec<R: Read + ?Sized>(reader: &mut R, len: usize) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

/// Discard exactly `len` bytes from a reader that may not be seekable
pub(crate) fn skip<R: Read + ?Sized>(reader: &mut R, len: u64) -> io::Result<()> {
    let skipped = io::copy(&mut reader.take(len), &mut io::sink())?;
    if skipped != len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "stream ended inside a record",
        ));
    }
    Ok(())
}

/// Read a little-endian u32, returning `None` on a clean end of stream
pub(crate) fn try_read_u32<R: Read + ?Sized>(reader: &mut R) -> io::Result<Option<u32>> {
    match reader.read_u32::<LittleEndian>() {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e),
    }
}

/// Search backwards for `signature`, which must lie entirely inside
/// `[end - max_bytes, end)`. On success the stream is left positioned at
/// the first byte of the signature and that position is returned.
pub(crate) fn seek_backwards_to_signature<R: Read + Seek + ?Sized>(
    reader: &mut R,
    end: u64,
    signature: u32,
    max_bytes: u64,
) -> io::Result<Option<u64>> {
    let start = end.saturating_sub(max_bytes);
    reader.seek(SeekFrom::Start(start))?;

    let mut buffer = vec![0u8; (end - start) as usize];
    reader.read_exact(&mut buffer)?;

    let needle = signature.to_le_bytes();
    let found = (0..buffer.len().saturating_sub(3))
        .rev()
        .find(|&i| buffer[i..i + 4] == needle);

    match found {
        Some(i) => {
            let pos = start + i as u64;
            reader.seek(SeekFrom::Start(pos))?;
            Ok(Some(pos))
        }
        None => Ok(None),
    }
}
