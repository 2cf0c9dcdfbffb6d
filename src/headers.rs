//! Fixed-layout ZIP records: central directory file header, local file
//! header, data descriptor and the end of central directory family.

use crate::binary::{
    read_vec, skip, try_read_u32, CENTRAL_DIRECTORY_SIGNATURE, DATA_DESCRIPTOR_SIGNATURE,
    END_OF_CENTRAL_DIRECTORY_SIGNATURE, LOCAL_FILE_HEADER_SIGNATURE, MASK_16, MASK_32,
    ZIP64_END_OF_CENTRAL_DIRECTORY_LOCATOR_SIGNATURE, ZIP64_END_OF_CENTRAL_DIRECTORY_SIGNATURE,
};
use crate::error::{Result, ZipError};
use crate::extra::{ExtraField, Zip64ExtraField, Zip64Request};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Seek, SeekFrom, Write};

/// Version needed to extract
pub(crate) const VERSION_DEFAULT: u16 = 10;
pub(crate) const VERSION_EXPLICIT_DIRECTORY: u16 = 20;
pub(crate) const VERSION_DEFLATE: u16 = 20;
pub(crate) const VERSION_ZIP64: u16 = 45;

/// General purpose flag: sizes follow in a data descriptor
pub const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;

/// General purpose flag: name and comment are UTF-8
pub const FLAG_UNICODE_FILE_NAME: u16 = 0x0800;

fn truncated(what: &str) -> impl FnOnce(io::Error) -> ZipError + '_ {
    move |e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            ZipError::format(format!("truncated {}", what))
        } else {
            ZipError::Io(e)
        }
    }
}

/// One record of the central directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralDirectoryHeader {
    pub version_made_by_specification: u8,
    pub version_made_by_compatibility: u8,
    pub version_needed_to_extract: u16,
    pub general_purpose_bit_flag: u16,
    pub compression_method: u16,
    pub last_modified: u32,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub disk_number_start: u32,
    pub internal_file_attributes: u16,
    pub external_file_attributes: u32,
    pub relative_offset_of_local_header: u64,
    pub file_name: Vec<u8>,
    /// Unknown extra fields, `None` when they were skipped
    pub extra_fields: Option<Vec<ExtraField>>,
    /// Raw comment, `None` when it was skipped
    pub file_comment: Option<Vec<u8>>,
}

impl CentralDirectoryHeader {
    pub const SIGNATURE: u32 = CENTRAL_DIRECTORY_SIGNATURE;
    pub const FIXED_SIZE: usize = 46;

    /// Read one record at the current position.
    ///
    /// Returns `Ok(None)` when the next four bytes are not the central
    /// directory signature; nothing past them is consumed. With
    /// `preserve_extras == false` only the Zip64 field is decoded and the
    /// comment is skipped.
    pub fn try_read<R: Read + ?Sized>(
        reader: &mut R,
        preserve_extras: bool,
    ) -> Result<Option<Self>> {
        match try_read_u32(reader)? {
            Some(Self::SIGNATURE) => {}
            _ => return Ok(None),
        }
        Self::read_body(reader, preserve_extras)
            .map(Some)
            .map_err(truncated("central directory header"))
    }

    fn read_body<R: Read + ?Sized>(reader: &mut R, preserve_extras: bool) -> io::Result<Self> {
        let version_made_by_specification = reader.read_u8()?;
        let version_made_by_compatibility = reader.read_u8()?;
        let version_needed_to_extract = reader.read_u16::<LittleEndian>()?;
        let general_purpose_bit_flag = reader.read_u16::<LittleEndian>()?;
        let compression_method = reader.read_u16::<LittleEndian>()?;
        let last_modified = reader.read_u32::<LittleEndian>()?;
        let crc32 = reader.read_u32::<LittleEndian>()?;
        let compressed_size_small = reader.read_u32::<LittleEndian>()?;
        let uncompressed_size_small = reader.read_u32::<LittleEndian>()?;
        let file_name_length = reader.read_u16::<LittleEndian>()? as usize;
        let extra_field_length = reader.read_u16::<LittleEndian>()? as usize;
        let file_comment_length = reader.read_u16::<LittleEndian>()? as usize;
        let disk_number_start_small = reader.read_u16::<LittleEndian>()?;
        let internal_file_attributes = reader.read_u16::<LittleEndian>()?;
        let external_file_attributes = reader.read_u32::<LittleEndian>()?;
        let relative_offset_small = reader.read_u32::<LittleEndian>()?;

        let file_name = read_vec(reader, file_name_length)?;

        let request = Zip64Request {
            uncompressed_size: uncompressed_size_small == MASK_32,
            compressed_size: compressed_size_small == MASK_32,
            local_header_offset: relative_offset_small == MASK_32,
            start_disk_number: disk_number_start_small == MASK_16,
        };

        let (extra_fields, zip64) = if preserve_extras {
            let mut fields = ExtraField::parse_all(&read_vec(reader, extra_field_length)?);
            let zip64 = Zip64ExtraField::get_and_remove_zip64_block(&mut fields, request);
            (Some(fields), zip64)
        } else if request.any() {
            let block = read_vec(reader, extra_field_length)?;
            (None, Zip64ExtraField::get_just_zip64_block(&block, request))
        } else {
            skip(reader, extra_field_length as u64)?;
            (None, Zip64ExtraField::default())
        };

        let file_comment = if preserve_extras {
            Some(read_vec(reader, file_comment_length)?)
        } else {
            skip(reader, file_comment_length as u64)?;
            None
        };

        Ok(CentralDirectoryHeader {
            version_made_by_specification,
            version_made_by_compatibility,
            version_needed_to_extract,
            general_purpose_bit_flag,
            compression_method,
            last_modified,
            crc32,
            compressed_size: zip64
                .compressed_size
                .unwrap_or(compressed_size_small as u64),
            uncompressed_size: zip64
                .uncompressed_size
                .unwrap_or(uncompressed_size_small as u64),
            disk_number_start: zip64
                .start_disk_number
                .unwrap_or(disk_number_start_small as u32),
            internal_file_attributes,
            external_file_attributes,
            relative_offset_of_local_header: zip64
                .local_header_offset
                .unwrap_or(relative_offset_small as u64),
            file_name,
            extra_fields,
            file_comment,
        })
    }
}

/// Field values of a central directory record as they go on the wire.
/// Sizes and offset are already truncated to 32 bits (or sentinels).
pub(crate) struct CentralHeaderRecord<'a> {
    pub version_made_by_specification: u8,
    pub version_made_by_compatibility: u8,
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: u16,
    pub last_modified: u32,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub external_attributes: u32,
    pub local_header_offset: u32,
    pub file_name: &'a [u8],
    pub zip64: Option<Zip64ExtraField>,
    pub extra_fields: &'a [ExtraField],
    pub comment: &'a [u8],
}

impl CentralHeaderRecord<'_> {
    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        let extra_length = self.zip64.map_or(0, |z| z.total_size() as usize)
            + ExtraField::total_size_of(self.extra_fields);

        writer.write_u32::<LittleEndian>(CENTRAL_DIRECTORY_SIGNATURE)?;
        writer.write_u8(self.version_made_by_specification)?;
        writer.write_u8(self.version_made_by_compatibility)?;
        writer.write_u16::<LittleEndian>(self.version_needed)?;
        writer.write_u16::<LittleEndian>(self.flags)?;
        writer.write_u16::<LittleEndian>(self.compression_method)?;
        writer.write_u32::<LittleEndian>(self.last_modified)?;
        writer.write_u32::<LittleEndian>(self.crc32)?;
        writer.write_u32::<LittleEndian>(self.compressed_size)?;
        writer.write_u32::<LittleEndian>(self.uncompressed_size)?;
        writer.write_u16::<LittleEndian>(self.file_name.len() as u16)?;
        writer.write_u16::<LittleEndian>(extra_length as u16)?;
        writer.write_u16::<LittleEndian>(self.comment.len() as u16)?;
        writer.write_u16::<LittleEndian>(0)?; // disk number start
        writer.write_u16::<LittleEndian>(0)?; // internal attributes
        writer.write_u32::<LittleEndian>(self.external_attributes)?;
        writer.write_u32::<LittleEndian>(self.local_header_offset)?;
        writer.write_all(self.file_name)?;
        if let Some(zip64) = &self.zip64 {
            zip64.write_block(writer)?;
        }
        ExtraField::write_all_blocks(self.extra_fields, writer)?;
        writer.write_all(self.comment)
    }
}

/// Local file header layout helpers
pub(crate) struct LocalFileHeader;

impl LocalFileHeader {
    pub const SIGNATURE: u32 = LOCAL_FILE_HEADER_SIGNATURE;
    pub const FIXED_SIZE: u64 = 30;
    pub const OFFSET_TO_VERSION: u64 = 4;
    pub const OFFSET_TO_CRC: u64 = 14;
    pub const OFFSET_TO_NAME_LENGTH: u64 = 26;

    /// Skip the header at the current position. Returns `Ok(false)` when the
    /// signature is wrong or the header runs past `stream_len`.
    pub fn try_skip<R: Read + Seek + ?Sized>(reader: &mut R, stream_len: u64) -> io::Result<bool> {
        let start = reader.stream_position()?;
        if try_read_u32(reader)? != Some(Self::SIGNATURE) {
            return Ok(false);
        }
        if stream_len < start + Self::FIXED_SIZE {
            return Ok(false);
        }
        reader.seek(SeekFrom::Start(start + Self::OFFSET_TO_NAME_LENGTH))?;
        let name_length = reader.read_u16::<LittleEndian>()? as u64;
        let extra_length = reader.read_u16::<LittleEndian>()? as u64;
        let end = start + Self::FIXED_SIZE + name_length + extra_length;
        if stream_len < end {
            return Ok(false);
        }
        reader.seek(SeekFrom::Start(end))?;
        Ok(true)
    }

    /// Read the header at the current position and return its extra fields
    /// with any Zip64 field removed
    pub fn read_extra_fields<R: Read + ?Sized>(reader: &mut R) -> Result<Vec<ExtraField>> {
        if try_read_u32(reader)? != Some(Self::SIGNATURE) {
            return Err(ZipError::LocalHeaderCorrupt(
                "missing local file header signature".to_string(),
            ));
        }
        let read = |reader: &mut R| -> io::Result<Vec<u8>> {
            skip(reader, Self::OFFSET_TO_NAME_LENGTH - 4)?;
            let name_length = reader.read_u16::<LittleEndian>()? as u64;
            let extra_length = reader.read_u16::<LittleEndian>()? as usize;
            skip(reader, name_length)?;
            read_vec(reader, extra_length)
        };
        let block = read(reader).map_err(truncated("local file header"))?;

        let mut fields = ExtraField::parse_all(&block);
        Zip64ExtraField::get_and_remove_zip64_block(&mut fields, Zip64Request::default());
        Ok(fields)
    }
}

/// Field values of a local file header as they go on the wire
pub(crate) struct LocalHeaderRecord<'a> {
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: u16,
    pub last_modified: u32,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub file_name: &'a [u8],
    pub zip64: Option<Zip64ExtraField>,
    pub extra_fields: &'a [ExtraField],
}

impl LocalHeaderRecord<'_> {
    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        let extra_length = self.zip64.map_or(0, |z| z.total_size() as usize)
            + ExtraField::total_size_of(self.extra_fields);

        writer.write_u32::<LittleEndian>(LOCAL_FILE_HEADER_SIGNATURE)?;
        writer.write_u16::<LittleEndian>(self.version_needed)?;
        writer.write_u16::<LittleEndian>(self.flags)?;
        writer.write_u16::<LittleEndian>(self.compression_method)?;
        writer.write_u32::<LittleEndian>(self.last_modified)?;
        writer.write_u32::<LittleEndian>(self.crc32)?;
        writer.write_u32::<LittleEndian>(self.compressed_size)?;
        writer.write_u32::<LittleEndian>(self.uncompressed_size)?;
        writer.write_u16::<LittleEndian>(self.file_name.len() as u16)?;
        writer.write_u16::<LittleEndian>(extra_length as u16)?;
        writer.write_all(self.file_name)?;
        if let Some(zip64) = &self.zip64 {
            zip64.write_block(writer)?;
        }
        ExtraField::write_all_blocks(self.extra_fields, writer)
    }
}

/// Trailing record carrying CRC and sizes for entries written without seeking
pub(crate) struct DataDescriptor;

impl DataDescriptor {
    pub fn write<W: Write + ?Sized>(
        writer: &mut W,
        crc32: u32,
        compressed_size: u64,
        uncompressed_size: u64,
        wide: bool,
    ) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(DATA_DESCRIPTOR_SIGNATURE)?;
        writer.write_u32::<LittleEndian>(crc32)?;
        if wide {
            writer.write_u64::<LittleEndian>(compressed_size)?;
            writer.write_u64::<LittleEndian>(uncompressed_size)?;
        } else {
            writer.write_u32::<LittleEndian>(compressed_size as u32)?;
            writer.write_u32::<LittleEndian>(uncompressed_size as u32)?;
        }
        Ok(())
    }
}

/// End of central directory record
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EndOfCentralDirectory {
    pub number_of_this_disk: u16,
    pub disk_with_central_directory: u16,
    pub entries_on_this_disk: u16,
    pub entries_total: u16,
    pub central_directory_size: u32,
    pub central_directory_offset: u32,
    pub comment: Vec<u8>,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: u32 = END_OF_CENTRAL_DIRECTORY_SIGNATURE;
    pub const FIXED_SIZE: u64 = 22;
    pub const MAX_COMMENT_LENGTH: u64 = 65535;

    /// Read the record at the current position
    pub fn read<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let read = |reader: &mut R| -> io::Result<Option<Self>> {
            if try_read_u32(reader)? != Some(Self::SIGNATURE) {
                return Ok(None);
            }
            let number_of_this_disk = reader.read_u16::<LittleEndian>()?;
            let disk_with_central_directory = reader.read_u16::<LittleEndian>()?;
            let entries_on_this_disk = reader.read_u16::<LittleEndian>()?;
            let entries_total = reader.read_u16::<LittleEndian>()?;
            let central_directory_size = reader.read_u32::<LittleEndian>()?;
            let central_directory_offset = reader.read_u32::<LittleEndian>()?;
            let comment_length = reader.read_u16::<LittleEndian>()? as usize;
            let comment = read_vec(reader, comment_length)?;
            Ok(Some(EndOfCentralDirectory {
                number_of_this_disk,
                disk_with_central_directory,
                entries_on_this_disk,
                entries_total,
                central_directory_size,
                central_directory_offset,
                comment,
            }))
        };
        read(reader)
            .map_err(truncated("end of central directory record"))?
            .ok_or_else(|| ZipError::format("invalid end of central directory signature"))
    }

    /// Whether any field is a sentinel pointing at the Zip64 record
    pub fn needs_zip64(&self) -> bool {
        self.number_of_this_disk == MASK_16
            || self.disk_with_central_directory == MASK_16
            || self.entries_on_this_disk == MASK_16
            || self.entries_total == MASK_16
            || self.central_directory_size == MASK_32
            || self.central_directory_offset == MASK_32
    }

    pub fn write_block<W: Write + ?Sized>(
        writer: &mut W,
        entry_count: u64,
        central_directory_start: u64,
        central_directory_size: u64,
        comment: &[u8],
    ) -> io::Result<()> {
        let entries = if entry_count >= MASK_16 as u64 {
            MASK_16
        } else {
            entry_count as u16
        };
        let size = if central_directory_size >= MASK_32 as u64 {
            MASK_32
        } else {
            central_directory_size as u32
        };
        let start = if central_directory_start >= MASK_32 as u64 {
            MASK_32
        } else {
            central_directory_start as u32
        };

        writer.write_u32::<LittleEndian>(Self::SIGNATURE)?;
        writer.write_u16::<LittleEndian>(0)?; // disk number
        writer.write_u16::<LittleEndian>(0)?; // disk with central dir
        writer.write_u16::<LittleEndian>(entries)?;
        writer.write_u16::<LittleEndian>(entries)?;
        writer.write_u32::<LittleEndian>(size)?;
        writer.write_u32::<LittleEndian>(start)?;
        writer.write_u16::<LittleEndian>(comment.len() as u16)?;
        writer.write_all(comment)
    }
}

/// ZIP64 end of central directory locator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Zip64EndOfCentralDirectoryLocator {
    pub disk_with_zip64_record: u32,
    pub offset_of_zip64_record: u64,
    pub total_disks: u32,
}

impl Zip64EndOfCentralDirectoryLocator {
    pub const SIGNATURE: u32 = ZIP64_END_OF_CENTRAL_DIRECTORY_LOCATOR_SIGNATURE;
    pub const SIZE: u64 = 20;

    pub fn try_read<R: Read + ?Sized>(reader: &mut R) -> Result<Option<Self>> {
        let read = |reader: &mut R| -> io::Result<Option<Self>> {
            if try_read_u32(reader)? != Some(Self::SIGNATURE) {
                return Ok(None);
            }
            Ok(Some(Zip64EndOfCentralDirectoryLocator {
                disk_with_zip64_record: reader.read_u32::<LittleEndian>()?,
                offset_of_zip64_record: reader.read_u64::<LittleEndian>()?,
                total_disks: reader.read_u32::<LittleEndian>()?,
            }))
        };
        read(reader).map_err(truncated("Zip64 end of central directory locator"))
    }

    pub fn write_block<W: Write + ?Sized>(writer: &mut W, zip64_record_start: u64) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(Self::SIGNATURE)?;
        writer.write_u32::<LittleEndian>(0)?; // disk with zip64 record
        writer.write_u64::<LittleEndian>(zip64_record_start)?;
        writer.write_u32::<LittleEndian>(1)?; // total disks
        Ok(())
    }
}

/// ZIP64 end of central directory record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Zip64EndOfCentralDirectoryRecord {
    pub record_size: u64,
    pub version_made_by: u16,
    pub version_needed: u16,
    pub number_of_this_disk: u32,
    pub disk_with_central_directory: u32,
    pub entries_on_this_disk: u64,
    pub entries_total: u64,
    pub central_directory_size: u64,
    pub central_directory_offset: u64,
}

impl Zip64EndOfCentralDirectoryRecord {
    pub const SIGNATURE: u32 = ZIP64_END_OF_CENTRAL_DIRECTORY_SIGNATURE;
    /// Size of the record after the signature and size fields
    const SIZE_OF_REMAINING_FIELDS: u64 = 44;

    pub fn try_read<R: Read + ?Sized>(reader: &mut R) -> Result<Option<Self>> {
        let read = |reader: &mut R| -> io::Result<Option<Self>> {
            if try_read_u32(reader)? != Some(Self::SIGNATURE) {
                return Ok(None);
            }
            Ok(Some(Zip64EndOfCentralDirectoryRecord {
                record_size: reader.read_u64::<LittleEndian>()?,
                version_made_by: reader.read_u16::<LittleEndian>()?,
                version_needed: reader.read_u16::<LittleEndian>()?,
                number_of_this_disk: reader.read_u32::<LittleEndian>()?,
                disk_with_central_directory: reader.read_u32::<LittleEndian>()?,
                entries_on_this_disk: reader.read_u64::<LittleEndian>()?,
                entries_total: reader.read_u64::<LittleEndian>()?,
                central_directory_size: reader.read_u64::<LittleEndian>()?,
                central_directory_offset: reader.read_u64::<LittleEndian>()?,
            }))
        };
        read(reader).map_err(truncated("Zip64 end of central directory record"))
    }

    pub fn write_block<W: Write + ?Sized>(
        writer: &mut W,
        entry_count: u64,
        central_directory_start: u64,
        central_directory_size: u64,
    ) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(Self::SIGNATURE)?;
        writer.write_u64::<LittleEndian>(Self::SIZE_OF_REMAINING_FIELDS)?;
        writer.write_u16::<LittleEndian>(VERSION_ZIP64)?; // version made by
        writer.write_u16::<LittleEndian>(VERSION_ZIP64)?; // version needed
        writer.write_u32::<LittleEndian>(0)?; // disk number
        writer.write_u32::<LittleEndian>(0)?; // disk with central dir
        writer.write_u64::<LittleEndian>(entry_count)?;
        writer.write_u64::<LittleEndian>(entry_count)?;
        writer.write_u64::<LittleEndian>(central_directory_size)?;
        writer.write_u64::<LittleEndian>(central_directory_start)?;
        Ok(())
    }
}
