//! Archive entries: metadata, name encoding, and the local header, data
//! descriptor and central directory records an entry writes for itself.

use crate::binary::MASK_32;
use crate::cp437::decode_cp437;
use crate::datetime::DateTime;
use crate::error::{Result, ZipError};
use crate::extra::{ExtraField, Zip64ExtraField};
use crate::headers::{
    CentralDirectoryHeader, CentralHeaderRecord, DataDescriptor, LocalFileHeader,
    LocalHeaderRecord, FLAG_DATA_DESCRIPTOR, FLAG_UNICODE_FILE_NAME, VERSION_DEFAULT,
    VERSION_DEFLATE, VERSION_EXPLICIT_DIRECTORY, VERSION_ZIP64,
};
use crate::writer::CompressionMethod;
use byteorder::{LittleEndian, WriteBytesExt};
use encoding_rs::{Encoding, UTF_8};
use log::{trace, warn};
use std::io::{Seek, SeekFrom, Write};

/// Largest name, comment or extra block a header can describe
pub(crate) const MAX_FIELD_LENGTH: usize = 0xFFFF;

#[cfg(windows)]
const CURRENT_HOST: u8 = 0;
#[cfg(not(windows))]
const CURRENT_HOST: u8 = 3;

/// Host byte of archives written on Windows (FAT/NTFS semantics)
const HOST_WINDOWS: u8 = 0;

/// How an archive was opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveMode {
    /// Existing archive, entries can only be read
    Read,
    /// New archive, entries are written once, in creation order
    Create,
    /// Existing archive rewritten in full when finished
    Update,
}

/// Stable handle to an entry of one archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(pub(crate) u64);

/// Where an entry is in its write lifecycle
#[derive(Debug)]
pub(crate) enum EntryState {
    /// Never opened for write or update
    Virgin,
    /// A write stream owns the archive stream (Create mode)
    WritingExclusive,
    /// Written through a write stream (Create mode)
    Written,
    /// An empty record was emitted without the entry ever being opened
    EmptyWritten,
    /// Uncompressed content held in memory until the archive is finished
    Buffered { data: Vec<u8>, stream_open: bool },
}

/// One file or directory marker inside an archive
#[derive(Debug)]
pub struct ZipEntry {
    id: EntryId,
    mode: ArchiveMode,
    originally_in_archive: bool,
    pub(crate) state: EntryState,

    name: String,
    stored_name: Vec<u8>,
    version_made_by_specification: u8,
    version_made_by_compatibility: u8,
    version_to_extract: u16,
    flags: u16,
    compression_method: CompressionMethod,
    last_modified: DateTime,
    pub(crate) crc32: u32,
    pub(crate) compressed_size: u64,
    pub(crate) uncompressed_size: u64,
    pub(crate) disk_number_start: u32,
    external_attributes: u32,
    pub(crate) offset_of_local_header: u64,
    pub(crate) offset_of_compressed_data: Option<u64>,

    pub(crate) central_unknown_extra_fields: Option<Vec<ExtraField>>,
    pub(crate) local_unknown_extra_fields: Option<Vec<ExtraField>>,
    comment: Vec<u8>,

    /// Untouched compressed bytes carried across an Update rewrite
    pub(crate) compressed_bytes: Option<Vec<u8>>,
}

impl ZipEntry {
    /// New entry for Create or Update mode
    pub(crate) fn new(
        id: EntryId,
        name: &str,
        mode: ArchiveMode,
        encoding: Option<&'static Encoding>,
    ) -> Result<Self> {
        if name.is_empty() {
            return Err(ZipError::InvalidArgument(
                "entry name cannot be empty".to_string(),
            ));
        }
        let (stored_name, is_utf8) = encode_entry_name(name, encoding)?;
        if stored_name.len() > MAX_FIELD_LENGTH {
            return Err(ZipError::EntryNameTooLong(stored_name.len()));
        }

        let mut entry = ZipEntry {
            id,
            mode,
            originally_in_archive: false,
            state: EntryState::Virgin,
            name: name.to_string(),
            stored_name,
            version_made_by_specification: VERSION_DEFAULT as u8,
            version_made_by_compatibility: CURRENT_HOST,
            version_to_extract: VERSION_DEFAULT,
            flags: if is_utf8 { FLAG_UNICODE_FILE_NAME } else { 0 },
            compression_method: CompressionMethod::Deflate,
            last_modified: DateTime::now(),
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            disk_number_start: 0,
            external_attributes: 0,
            offset_of_local_header: 0,
            offset_of_compressed_data: None,
            central_unknown_extra_fields: None,
            local_unknown_extra_fields: None,
            comment: Vec::new(),
            compressed_bytes: None,
        };
        entry.version_to_extract_at_least(VERSION_DEFLATE);
        if entry.is_directory() {
            entry.version_to_extract_at_least(VERSION_EXPLICIT_DIRECTORY);
        }
        Ok(entry)
    }

    /// Entry described by a central directory record
    pub(crate) fn from_central_header(
        id: EntryId,
        header: CentralDirectoryHeader,
        mode: ArchiveMode,
        encoding: Option<&'static Encoding>,
    ) -> Self {
        let name = decode_entry_name(
            &header.file_name,
            header.general_purpose_bit_flag,
            encoding,
        );
        ZipEntry {
            id,
            mode,
            originally_in_archive: true,
            state: EntryState::Virgin,
            name,
            stored_name: header.file_name,
            version_made_by_specification: header.version_made_by_specification,
            version_made_by_compatibility: header.version_made_by_compatibility,
            version_to_extract: header.version_needed_to_extract,
            flags: header.general_purpose_bit_flag,
            compression_method: CompressionMethod::from_zip_method(header.compression_method),
            last_modified: DateTime::from_dos(header.last_modified).unwrap_or_default(),
            crc32: header.crc32,
            compressed_size: header.compressed_size,
            uncompressed_size: header.uncompressed_size,
            disk_number_start: header.disk_number_start,
            external_attributes: header.external_file_attributes,
            offset_of_local_header: header.relative_offset_of_local_header,
            offset_of_compressed_data: None,
            central_unknown_extra_fields: header.extra_fields,
            local_unknown_extra_fields: None,
            comment: header.file_comment.unwrap_or_default(),
            compressed_bytes: None,
        }
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    /// Full path of the entry inside the archive
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last path segment of [`name`](Self::name)
    pub fn file_name(&self) -> &str {
        let windows = self.version_made_by_compatibility == HOST_WINDOWS;
        let start = self
            .name
            .rfind(|c| c == '/' || (windows && c == '\\'))
            .map_or(0, |i| i + 1);
        &self.name[start..]
    }

    /// Name as stored in the headers
    pub fn raw_name(&self) -> &[u8] {
        &self.stored_name
    }

    /// Whether the name marks a directory
    pub fn is_directory(&self) -> bool {
        self.name.ends_with('/') || self.name.ends_with('\\')
    }

    /// Uncompressed size. Unavailable once the entry was opened for writing
    /// or update, because the content is in flux.
    pub fn length(&self) -> Result<u64> {
        if self.ever_opened_for_write() {
            return Err(ZipError::state(
                "length is not available for an entry opened for writing",
            ));
        }
        Ok(self.uncompressed_size)
    }

    /// Compressed size. Same availability as [`length`](Self::length).
    pub fn compressed_length(&self) -> Result<u64> {
        if self.ever_opened_for_write() {
            return Err(ZipError::state(
                "compressed length is not available for an entry opened for writing",
            ));
        }
        Ok(self.compressed_size)
    }

    pub fn crc32(&self) -> u32 {
        self.crc32
    }

    pub fn compression_method(&self) -> CompressionMethod {
        self.compression_method
    }

    /// Change the compression method of an entry that has not been written.
    ///
    /// Entries loaded from an Update-mode archive must be opened for update
    /// first, otherwise their untouched compressed bytes would be mislabeled.
    pub fn set_compression_method(&mut self, method: CompressionMethod) -> Result<()> {
        self.ensure_mutable()?;
        if let CompressionMethod::Unknown(code) = method {
            return Err(ZipError::InvalidArgument(format!(
                "compression method {} cannot be written",
                code
            )));
        }
        if self.originally_in_archive && !matches!(self.state, EntryState::Buffered { .. }) {
            return Err(ZipError::state(
                "open the entry for update before changing its compression method",
            ));
        }
        if method == CompressionMethod::Deflate {
            self.version_to_extract_at_least(VERSION_DEFLATE);
        }
        self.compression_method = method;
        Ok(())
    }

    pub fn last_modified(&self) -> DateTime {
        self.last_modified
    }

    pub fn set_last_modified(&mut self, value: DateTime) -> Result<()> {
        self.ensure_mutable()?;
        self.last_modified = value;
        Ok(())
    }

    /// Raw comment bytes
    pub fn comment(&self) -> &[u8] {
        &self.comment
    }

    pub fn set_comment(&mut self, comment: impl Into<Vec<u8>>) -> Result<()> {
        self.ensure_mutable()?;
        let comment = comment.into();
        if comment.len() > MAX_FIELD_LENGTH {
            return Err(ZipError::CommentTooLong(comment.len()));
        }
        self.comment = comment;
        Ok(())
    }

    /// Host-dependent attributes; on Unix hosts the upper 16 bits hold the mode
    pub fn external_attributes(&self) -> u32 {
        self.external_attributes
    }

    pub fn set_external_attributes(&mut self, value: u32) -> Result<()> {
        self.ensure_mutable()?;
        self.external_attributes = value;
        Ok(())
    }

    /// `(specification version, host system)`
    pub fn version_made_by(&self) -> (u8, u8) {
        (
            self.version_made_by_specification,
            self.version_made_by_compatibility,
        )
    }

    pub fn version_needed(&self) -> u16 {
        self.version_to_extract
    }

    /// General purpose bit flags
    pub fn flags(&self) -> u16 {
        self.flags
    }

    /// Whether the entry was read from the archive rather than added to it
    pub fn is_originally_in_archive(&self) -> bool {
        self.originally_in_archive
    }

    /// Content held in memory for update, if any
    pub(crate) fn buffered_data(&self) -> Option<&[u8]> {
        match &self.state {
            EntryState::Buffered { data, .. } => Some(data),
            _ => None,
        }
    }

    pub(crate) fn ever_opened_for_write(&self) -> bool {
        matches!(
            self.state,
            EntryState::WritingExclusive | EntryState::Written | EntryState::Buffered { .. }
        )
    }

    fn ensure_mutable(&self) -> Result<()> {
        match self.mode {
            ArchiveMode::Read => Err(ZipError::state(
                "entries of an archive opened for reading cannot be modified",
            )),
            ArchiveMode::Create
                if matches!(
                    self.state,
                    EntryState::WritingExclusive | EntryState::Written | EntryState::EmptyWritten
                ) =>
            {
                Err(ZipError::state(
                    "entry metadata cannot change after its content was written",
                ))
            }
            _ => Ok(()),
        }
    }

    fn version_to_extract_at_least(&mut self, version: u16) {
        if self.version_to_extract < version {
            self.version_to_extract = version;
        }
        if (self.version_made_by_specification as u16) < version {
            self.version_made_by_specification = version as u8;
        }
    }

    /// Either size needs the Zip64 representation
    pub(crate) fn sizes_too_large(&self) -> bool {
        self.compressed_size >= MASK_32 as u64 || self.uncompressed_size >= MASK_32 as u64
    }

    /// Write the local file header at the current position of `writer`.
    ///
    /// Sizes are whatever is known now: zero for a stream that has not been
    /// written yet, real values for an entry carried over from an existing
    /// archive. Returns whether a Zip64 extra field was allocated.
    pub(crate) fn write_local_file_header<W: Write + Seek + ?Sized>(
        &mut self,
        writer: &mut W,
        is_empty_file: bool,
        can_seek: bool,
    ) -> Result<bool> {
        self.offset_of_local_header = writer.stream_position()?;

        let mut zip64 = Zip64ExtraField::default();
        let (compressed_size, uncompressed_size) = if is_empty_file {
            self.compression_method = CompressionMethod::Stored;
            self.flags &= !FLAG_DATA_DESCRIPTOR;
            self.crc32 = 0;
            self.compressed_size = 0;
            self.uncompressed_size = 0;
            (0, 0)
        } else if !can_seek {
            // real values follow in the data descriptor
            self.flags |= FLAG_DATA_DESCRIPTOR;
            (0, 0)
        } else {
            self.flags &= !FLAG_DATA_DESCRIPTOR;
            if self.sizes_too_large() {
                zip64.uncompressed_size = Some(self.uncompressed_size);
                zip64.compressed_size = Some(self.compressed_size);
                (MASK_32, MASK_32)
            } else {
                (self.compressed_size as u32, self.uncompressed_size as u32)
            }
        };

        let use_zip64 = !zip64.is_empty();
        if use_zip64 {
            self.version_to_extract_at_least(VERSION_ZIP64);
        }

        let zip64_size = if use_zip64 { zip64.total_size() as usize } else { 0 };
        let unknown_size = self
            .local_unknown_extra_fields
            .as_deref()
            .map_or(0, ExtraField::total_size_of);
        if zip64_size + unknown_size > MAX_FIELD_LENGTH {
            warn!(
                "dropping local extra fields of {}: {} bytes exceed the header limit",
                self.name,
                zip64_size + unknown_size
            );
            self.local_unknown_extra_fields = None;
        }

        trace!(
            "local header for {} at offset {} (zip64: {})",
            self.name,
            self.offset_of_local_header,
            use_zip64
        );

        let record = LocalHeaderRecord {
            version_needed: self.version_to_extract,
            flags: self.flags,
            compression_method: self.compression_method.to_zip_method(),
            last_modified: self.last_modified.to_dos(),
            crc32: if is_empty_file || !can_seek { 0 } else { self.crc32 },
            compressed_size,
            uncompressed_size,
            file_name: &self.stored_name,
            zip64: use_zip64.then_some(zip64),
            extra_fields: self.local_unknown_extra_fields.as_deref().unwrap_or(&[]),
        };
        let mut buf = Vec::with_capacity(LocalFileHeader::FIXED_SIZE as usize + self.stored_name.len());
        record.write_to(&mut buf)?;
        writer.write_all(&buf)?;
        Ok(use_zip64)
    }

    /// Seek back and fill in CRC and sizes of a local header written before
    /// the content was known, then return to the end of the data.
    ///
    /// If the sizes turned out to need Zip64 but no Zip64 field was
    /// allocated, the header is switched to the data descriptor form and a
    /// descriptor with 64-bit sizes is appended instead.
    pub(crate) fn write_crc_and_sizes_in_local_header<W: Write + Seek + ?Sized>(
        &mut self,
        writer: &mut W,
        zip64_header_used: bool,
    ) -> Result<()> {
        let final_position = writer.stream_position()?;
        let zip64_needed = self.sizes_too_large();
        let pretend_stream_was_not_seekable = zip64_needed && !zip64_header_used;

        let (compressed_size, uncompressed_size) = if zip64_needed {
            (MASK_32, MASK_32)
        } else {
            (self.compressed_size as u32, self.uncompressed_size as u32)
        };

        if pretend_stream_was_not_seekable {
            self.flags |= FLAG_DATA_DESCRIPTOR;
            self.version_to_extract_at_least(VERSION_ZIP64);
            writer.seek(SeekFrom::Start(
                self.offset_of_local_header + LocalFileHeader::OFFSET_TO_VERSION,
            ))?;
            writer.write_u16::<LittleEndian>(self.version_to_extract)?;
            writer.write_u16::<LittleEndian>(self.flags)?;
        }

        writer.seek(SeekFrom::Start(
            self.offset_of_local_header + LocalFileHeader::OFFSET_TO_CRC,
        ))?;
        if pretend_stream_was_not_seekable {
            writer.write_u32::<LittleEndian>(0)?;
            writer.write_u32::<LittleEndian>(0)?;
            writer.write_u32::<LittleEndian>(0)?;
        } else {
            writer.write_u32::<LittleEndian>(self.crc32)?;
            writer.write_u32::<LittleEndian>(compressed_size)?;
            writer.write_u32::<LittleEndian>(uncompressed_size)?;
        }

        // the Zip64 field is always the first extra field
        if zip64_header_used {
            writer.seek(SeekFrom::Start(
                self.offset_of_local_header
                    + LocalFileHeader::FIXED_SIZE
                    + self.stored_name.len() as u64
                    + 4,
            ))?;
            writer.write_u64::<LittleEndian>(self.uncompressed_size)?;
            writer.write_u64::<LittleEndian>(self.compressed_size)?;
        }

        writer.seek(SeekFrom::Start(final_position))?;

        if pretend_stream_was_not_seekable {
            DataDescriptor::write(
                writer,
                self.crc32,
                self.compressed_size,
                self.uncompressed_size,
                true,
            )?;
        }
        Ok(())
    }

    /// Append the trailing descriptor of an entry written to a forward-only stream
    pub(crate) fn write_data_descriptor<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
        DataDescriptor::write(
            writer,
            self.crc32,
            self.compressed_size,
            self.uncompressed_size,
            self.sizes_too_large(),
        )?;
        Ok(())
    }

    /// Write this entry's central directory record. Zip64 is decided here,
    /// from the final sizes and offset.
    pub(crate) fn write_central_directory_file_header<W: Write + ?Sized>(
        &mut self,
        writer: &mut W,
    ) -> Result<()> {
        let mut zip64 = Zip64ExtraField::default();

        let (compressed_size, uncompressed_size) = if self.sizes_too_large() {
            zip64.uncompressed_size = Some(self.uncompressed_size);
            zip64.compressed_size = Some(self.compressed_size);
            (MASK_32, MASK_32)
        } else {
            (self.compressed_size as u32, self.uncompressed_size as u32)
        };

        let local_header_offset = if self.offset_of_local_header >= MASK_32 as u64 {
            zip64.local_header_offset = Some(self.offset_of_local_header);
            MASK_32
        } else {
            self.offset_of_local_header as u32
        };

        let use_zip64 = !zip64.is_empty();
        if use_zip64 {
            self.version_to_extract_at_least(VERSION_ZIP64);
        }

        let zip64_size = if use_zip64 { zip64.total_size() as usize } else { 0 };
        let unknown_size = self
            .central_unknown_extra_fields
            .as_deref()
            .map_or(0, ExtraField::total_size_of);
        if zip64_size + unknown_size > MAX_FIELD_LENGTH {
            warn!(
                "dropping central extra fields of {}: {} bytes exceed the header limit",
                self.name,
                zip64_size + unknown_size
            );
            self.central_unknown_extra_fields = None;
        }

        let record = CentralHeaderRecord {
            version_made_by_specification: self.version_made_by_specification,
            version_made_by_compatibility: self.version_made_by_compatibility,
            version_needed: self.version_to_extract,
            flags: self.flags,
            compression_method: self.compression_method.to_zip_method(),
            last_modified: self.last_modified.to_dos(),
            crc32: self.crc32,
            compressed_size,
            uncompressed_size,
            external_attributes: self.external_attributes,
            local_header_offset,
            file_name: &self.stored_name,
            zip64: use_zip64.then_some(zip64),
            extra_fields: self.central_unknown_extra_fields.as_deref().unwrap_or(&[]),
            comment: &self.comment,
        };
        record.write_to(writer)?;
        Ok(())
    }
}

/// Encode a name for storage. Returns the bytes and whether the UTF-8
/// flag must be set.
///
/// With no configured encoding, printable ASCII names are stored as is
/// without the flag and anything else is stored as flagged UTF-8. A
/// configured encoding must be able to represent every character.
pub(crate) fn encode_entry_name(
    name: &str,
    encoding: Option<&'static Encoding>,
) -> Result<(Vec<u8>, bool)> {
    match encoding {
        Some(encoding) => {
            let (bytes, _, had_errors) = encoding.encode(name);
            if had_errors {
                return Err(ZipError::InvalidArgument(format!(
                    "entry name {:?} cannot be represented in {}",
                    name,
                    encoding.name()
                )));
            }
            Ok((bytes.into_owned(), encoding == UTF_8))
        }
        None => {
            let is_printable_ascii = name.bytes().all(|b| (32..=126).contains(&b));
            Ok((name.as_bytes().to_vec(), !is_printable_ascii))
        }
    }
}

/// Decode a stored name. The UTF-8 flag wins over any configured encoding;
/// unflagged names fall back to code page 437.
pub(crate) fn decode_entry_name(
    bytes: &[u8],
    flags: u16,
    encoding: Option<&'static Encoding>,
) -> String {
    let encoding = if flags & FLAG_UNICODE_FILE_NAME != 0 {
        UTF_8
    } else {
        match encoding {
            Some(encoding) => encoding,
            None => return decode_cp437(bytes),
        }
    };
    encoding
        .decode_without_bom_handling(bytes)
        .0
        .into_owned()
}
