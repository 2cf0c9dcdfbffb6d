//! The archive container: owns the backing stream and the entry list,
//! locates and reads the central directory, gates the write stream in
//! Create mode and writes the central directory when finished.

use crate::binary::{
    read_vec, seek_backwards_to_signature, MASK_16, MASK_32, END_OF_CENTRAL_DIRECTORY_SIGNATURE,
    ZIP64_END_OF_CENTRAL_DIRECTORY_LOCATOR_SIGNATURE,
};
use crate::entry::{ArchiveMode, EntryId, EntryState, ZipEntry, MAX_FIELD_LENGTH};
use crate::error::{Result, ZipError};
use crate::headers::{
    CentralDirectoryHeader, EndOfCentralDirectory, LocalFileHeader,
    Zip64EndOfCentralDirectoryLocator, Zip64EndOfCentralDirectoryRecord,
};
use crate::reader::EntryReader;
use crate::stream::{ArchiveStream, ForwardOnly};
use crate::update::EntryUpdateStream;
use crate::writer::{CompressionMethod, EntryWriter};
use encoding_rs::Encoding;
use log::debug;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Entries at or above this size cannot be held in memory for update
const MAX_IN_MEMORY_SIZE: u64 = u32::MAX as u64;

/// Archive-wide settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZipArchiveOptions {
    entry_name_encoding: Option<&'static Encoding>,
    compression_level: u32,
    preserve_extra_fields: bool,
}

impl Default for ZipArchiveOptions {
    fn default() -> Self {
        ZipArchiveOptions {
            entry_name_encoding: None,
            compression_level: 6,
            preserve_extra_fields: false,
        }
    }
}

impl ZipArchiveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encoding for names that do not carry the UTF-8 flag, and for every
    /// name written. Without one, names are read as UTF-8 and written as
    /// ASCII or flagged UTF-8.
    pub fn with_entry_name_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.entry_name_encoding = Some(encoding);
        self
    }

    /// DEFLATE level, 0-9
    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level;
        self
    }

    /// Keep unknown extra fields and comments when reading. Update mode
    /// always keeps them.
    pub fn with_preserve_extra_fields(mut self, preserve: bool) -> Self {
        self.preserve_extra_fields = preserve;
        self
    }

    pub fn entry_name_encoding(&self) -> Option<&'static Encoding> {
        self.entry_name_encoding
    }

    pub fn compression_level(&self) -> u32 {
        self.compression_level
    }

    pub fn preserve_extra_fields(&self) -> bool {
        self.preserve_extra_fields
    }

    fn validate(&self) -> Result<()> {
        if let Some(encoding) = self.entry_name_encoding {
            if encoding.output_encoding() != encoding {
                return Err(ZipError::InvalidArgument(format!(
                    "{} cannot be used for entry names",
                    encoding.name()
                )));
            }
        }
        if self.compression_level > 9 {
            return Err(ZipError::InvalidArgument(format!(
                "compression level {} is outside 0-9",
                self.compression_level
            )));
        }
        Ok(())
    }
}

/// A ZIP archive over a backing stream
pub struct ZipArchive<S> {
    pub(crate) stream: S,
    mode: ArchiveMode,
    pub(crate) options: ZipArchiveOptions,
    pub(crate) entries: Vec<ZipEntry>,
    next_id: u64,
    number_of_this_disk: u32,
    archive_length: u64,
    comment: Vec<u8>,
    /// Entry that may currently append to the stream (Create mode)
    stream_owner: Option<EntryId>,
}

impl<S> ZipArchive<S> {
    fn with_mode(stream: S, mode: ArchiveMode, options: ZipArchiveOptions) -> Result<Self> {
        options.validate()?;
        Ok(ZipArchive {
            stream,
            mode,
            options,
            entries: Vec::new(),
            next_id: 0,
            number_of_this_disk: 0,
            archive_length: 0,
            comment: Vec::new(),
            stream_owner: None,
        })
    }

    pub fn mode(&self) -> ArchiveMode {
        self.mode
    }

    pub fn options(&self) -> &ZipArchiveOptions {
        &self.options
    }

    /// Get list of all entries in the archive
    pub fn entries(&self) -> &[ZipEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the first entry with this name
    pub fn find_entry(&self, name: &str) -> Option<EntryId> {
        self.entries.iter().find(|e| e.name() == name).map(ZipEntry::id)
    }

    pub fn entry(&self, id: EntryId) -> Result<&ZipEntry> {
        let idx = self.index_of(id)?;
        Ok(&self.entries[idx])
    }

    pub fn entry_mut(&mut self, id: EntryId) -> Result<&mut ZipEntry> {
        let idx = self.index_of(id)?;
        Ok(&mut self.entries[idx])
    }

    /// Raw archive comment
    pub fn comment(&self) -> &[u8] {
        &self.comment
    }

    pub fn set_comment(&mut self, comment: impl Into<Vec<u8>>) -> Result<()> {
        if self.mode == ArchiveMode::Read {
            return Err(ZipError::state(
                "the comment of an archive opened for reading cannot change",
            ));
        }
        let comment = comment.into();
        if comment.len() > MAX_FIELD_LENGTH {
            return Err(ZipError::CommentTooLong(comment.len()));
        }
        self.comment = comment;
        Ok(())
    }

    /// Give back the stream without writing anything
    pub fn into_inner(self) -> S {
        self.stream
    }

    pub(crate) fn entry_and_stream(&mut self, index: usize) -> (&mut ZipEntry, &mut S) {
        (&mut self.entries[index], &mut self.stream)
    }

    pub(crate) fn release_stream(&mut self, id: EntryId) {
        if self.stream_owner == Some(id) {
            self.stream_owner = None;
        }
    }

    fn index_of(&self, id: EntryId) -> Result<usize> {
        // ids are handed out in increasing order and entries never move
        self.entries
            .binary_search_by_key(&id, ZipEntry::id)
            .map_err(|_| ZipError::EntryDeleted)
    }

    fn next_entry_id(&mut self) -> EntryId {
        let id = EntryId(self.next_id);
        self.next_id += 1;
        id
    }
}

impl ZipArchive<BufReader<File>> {
    /// Open a ZIP file for reading
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(BufReader::new(File::open(path)?))
    }
}

impl<S: Read + Seek> ZipArchive<S> {
    /// Read an existing archive
    pub fn new(stream: S) -> Result<Self> {
        Self::new_with_options(stream, ZipArchiveOptions::default())
    }

    pub fn new_with_options(stream: S, options: ZipArchiveOptions) -> Result<Self> {
        let mut archive = Self::with_mode(stream, ArchiveMode::Read, options)?;
        archive.read_central_directory()?;
        Ok(archive)
    }

    /// Streaming reader over an entry's uncompressed content
    pub fn open_entry(&mut self, id: EntryId) -> Result<EntryReader<'_, S>> {
        let idx = self.index_of(id)?;
        self.open_entry_at(idx)
    }

    /// Read an entry's decompressed data into a vector
    pub fn read_entry(&mut self, id: EntryId) -> Result<Vec<u8>> {
        let idx = self.index_of(id)?;
        self.read_entry_at(idx)
    }

    /// Read an entry by name
    pub fn read_entry_by_name(&mut self, name: &str) -> Result<Vec<u8>> {
        let id = self
            .find_entry(name)
            .ok_or_else(|| ZipError::EntryNotFound(name.to_string()))?;
        self.read_entry(id)
    }

    fn read_entry_at(&mut self, idx: usize) -> Result<Vec<u8>> {
        let capacity = self.entries[idx].uncompressed_size.min(1 << 20) as usize;
        let mut data = Vec::with_capacity(capacity);
        self.open_entry_at(idx)?
            .read_to_end(&mut data)
            .map_err(ZipError::from_io)?;
        Ok(data)
    }

    fn open_entry_at(&mut self, idx: usize) -> Result<EntryReader<'_, S>> {
        if self.mode == ArchiveMode::Create {
            return Err(ZipError::state(
                "entries of an archive in create mode cannot be read",
            ));
        }

        let entry = &self.entries[idx];
        if entry.buffered_data().is_some() || !entry.is_originally_in_archive() {
            let data = self.entries[idx].buffered_data().unwrap_or_default();
            return Ok(EntryReader::buffered(data));
        }

        self.check_openable(idx, true, false)?;
        let data_start = self.offset_of_compressed_data(idx)?;
        let entry = &self.entries[idx];
        let (method, compressed_size, crc32, length) = (
            entry.compression_method(),
            entry.compressed_size,
            entry.crc32,
            entry.uncompressed_size,
        );

        self.stream.seek(SeekFrom::Start(data_start))?;
        match method {
            CompressionMethod::Stored => Ok(EntryReader::stored(
                &mut self.stream,
                compressed_size,
                crc32,
                length,
            )),
            CompressionMethod::Deflate => Ok(EntryReader::deflate(
                &mut self.stream,
                compressed_size,
                crc32,
                length,
            )),
            CompressionMethod::Unknown(code) => Err(ZipError::UnsupportedCompression(code)),
        }
    }

    /// Fail unless the entry's bytes can be located (and, if asked,
    /// decompressed or held in memory)
    fn check_openable(
        &mut self,
        idx: usize,
        need_to_uncompress: bool,
        need_to_load_into_memory: bool,
    ) -> Result<()> {
        let entry = &self.entries[idx];
        if need_to_uncompress {
            if let CompressionMethod::Unknown(code) = entry.compression_method() {
                return Err(ZipError::UnsupportedCompression(code));
            }
        }
        if entry.disk_number_start != self.number_of_this_disk {
            return Err(ZipError::SplitArchive);
        }
        if entry.offset_of_local_header > self.archive_length {
            return Err(ZipError::LocalHeaderCorrupt(format!(
                "local header of {} lies past the end of the archive",
                entry.name()
            )));
        }

        let data_start = self.offset_of_compressed_data(idx)?;
        let entry = &self.entries[idx];
        let fits = data_start
            .checked_add(entry.compressed_size)
            .is_some_and(|end| end <= self.archive_length);
        if !fits {
            return Err(ZipError::LocalHeaderCorrupt(format!(
                "data of {} runs past the end of the archive",
                entry.name()
            )));
        }

        if need_to_load_into_memory && entry.compressed_size > MAX_IN_MEMORY_SIZE {
            return Err(ZipError::EntryTooLarge {
                name: entry.name().to_string(),
                size: entry.compressed_size,
            });
        }
        Ok(())
    }

    /// Position right after the local header, computed once
    fn offset_of_compressed_data(&mut self, idx: usize) -> Result<u64> {
        if let Some(offset) = self.entries[idx].offset_of_compressed_data {
            return Ok(offset);
        }
        let entry = &self.entries[idx];
        self.stream
            .seek(SeekFrom::Start(entry.offset_of_local_header))?;
        if !LocalFileHeader::try_skip(&mut self.stream, self.archive_length)? {
            return Err(ZipError::LocalHeaderCorrupt(format!(
                "local header of {} is missing or truncated",
                entry.name()
            )));
        }
        let offset = self.stream.stream_position()?;
        self.entries[idx].offset_of_compressed_data = Some(offset);
        Ok(offset)
    }

    fn read_central_directory(&mut self) -> Result<()> {
        let (central_directory_start, expected_entries) = self.read_end_of_central_directory()?;
        let preserve = self.mode == ArchiveMode::Update || self.options.preserve_extra_fields;

        self.stream.seek(SeekFrom::Start(central_directory_start))?;
        let mut headers = Vec::new();
        {
            let mut reader = BufReader::new(&mut self.stream);
            while let Some(header) = CentralDirectoryHeader::try_read(&mut reader, preserve)? {
                headers.push(header);
            }
        }

        if headers.len() as u64 != expected_entries {
            return Err(ZipError::format(format!(
                "central directory holds {} records, the end record announces {}",
                headers.len(),
                expected_entries
            )));
        }

        let encoding = self.options.entry_name_encoding;
        for header in headers {
            let id = self.next_entry_id();
            self.entries
                .push(ZipEntry::from_central_header(id, header, self.mode, encoding));
        }

        debug!(
            "opened archive: {} entries, central directory at {}",
            self.entries.len(),
            central_directory_start
        );
        Ok(())
    }

    /// Locate the end records. Returns central directory offset and the
    /// expected number of entries.
    fn read_end_of_central_directory(&mut self) -> Result<(u64, u64)> {
        let length = self.stream.seek(SeekFrom::End(0))?;
        self.archive_length = length;
        if length < EndOfCentralDirectory::FIXED_SIZE {
            return Err(ZipError::format(
                "archive is too small to hold an end of central directory record",
            ));
        }

        // the signature starts at most 22 + 65535 bytes before the end
        let eocd_start = seek_backwards_to_signature(
            &mut self.stream,
            length - EndOfCentralDirectory::FIXED_SIZE + 4,
            END_OF_CENTRAL_DIRECTORY_SIGNATURE,
            EndOfCentralDirectory::MAX_COMMENT_LENGTH + 4,
        )?
        .ok_or_else(|| ZipError::format("end of central directory record not found"))?;

        let eocd = EndOfCentralDirectory::read(&mut self.stream)?;
        if eocd.number_of_this_disk != eocd.disk_with_central_directory
            || eocd.entries_on_this_disk != eocd.entries_total
        {
            return Err(ZipError::SplitArchive);
        }

        self.number_of_this_disk = eocd.number_of_this_disk as u32;
        let mut central_directory_start = eocd.central_directory_offset as u64;
        let mut expected_entries = eocd.entries_total as u64;

        if eocd.needs_zip64() {
            if eocd_start < Zip64EndOfCentralDirectoryLocator::SIZE {
                return Err(ZipError::format(
                    "Zip64 end of central directory locator not where expected",
                ));
            }
            // the locator sits immediately before the end record
            let locator_start = seek_backwards_to_signature(
                &mut self.stream,
                eocd_start - Zip64EndOfCentralDirectoryLocator::SIZE + 4,
                ZIP64_END_OF_CENTRAL_DIRECTORY_LOCATOR_SIGNATURE,
                4,
            )?;
            if locator_start.is_some() {
                let locator = Zip64EndOfCentralDirectoryLocator::try_read(&mut self.stream)?
                    .ok_or_else(|| ZipError::format("invalid Zip64 locator"))?;
                if locator.offset_of_zip64_record > length {
                    return Err(ZipError::format(
                        "Zip64 end of central directory record lies past the end of the archive",
                    ));
                }
                self.stream
                    .seek(SeekFrom::Start(locator.offset_of_zip64_record))?;
                let record = Zip64EndOfCentralDirectoryRecord::try_read(&mut self.stream)?
                    .ok_or_else(|| {
                        ZipError::format("Zip64 end of central directory record not where expected")
                    })?;
                if record.entries_on_this_disk != record.entries_total {
                    return Err(ZipError::SplitArchive);
                }
                self.number_of_this_disk = record.number_of_this_disk;
                central_directory_start = record.central_directory_offset;
                expected_entries = record.entries_total;
            }
        }

        if central_directory_start > length {
            return Err(ZipError::format(
                "central directory offset lies past the end of the archive",
            ));
        }

        self.comment = eocd.comment;
        Ok((central_directory_start, expected_entries))
    }
}

impl ZipArchive<File> {
    /// Create a new ZIP file
    pub fn create_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::create(File::create(path)?)
    }
}

impl<W: Write> ZipArchive<ForwardOnly<W>> {
    /// Create an archive on a writer that cannot seek. Every entry is
    /// followed by a data descriptor.
    pub fn create_forward_only(writer: W) -> Result<Self> {
        Self::create(ForwardOnly::new(writer))
    }
}

impl<S: ArchiveStream> ZipArchive<S> {
    /// Start a new archive on `stream`
    pub fn create(stream: S) -> Result<Self> {
        Self::create_with_options(stream, ZipArchiveOptions::default())
    }

    pub fn create_with_options(stream: S, options: ZipArchiveOptions) -> Result<Self> {
        Self::with_mode(stream, ArchiveMode::Create, options)
    }

    /// Open an existing archive for modification. An empty stream starts a
    /// new archive.
    pub fn update(stream: S) -> Result<Self> {
        Self::update_with_options(stream, ZipArchiveOptions::default())
    }

    pub fn update_with_options(stream: S, options: ZipArchiveOptions) -> Result<Self> {
        let mut archive = Self::with_mode(stream, ArchiveMode::Update, options)?;
        if archive.stream.seek(SeekFrom::End(0))? > 0 {
            archive.read_central_directory()?;
            for idx in 0..archive.entries.len() {
                archive.check_openable(idx, false, true)?;
            }
        }
        Ok(archive)
    }

    /// Add an empty entry. In Create mode the new entry takes over the
    /// archive stream; a previous entry that was never opened is written
    /// out empty.
    pub fn create_entry(&mut self, name: &str) -> Result<EntryId> {
        if self.mode == ArchiveMode::Read {
            return Err(ZipError::state(
                "entries cannot be added to an archive opened for reading",
            ));
        }
        let id = EntryId(self.next_id);
        let entry = ZipEntry::new(id, name, self.mode, self.options.entry_name_encoding)?;
        if self.mode == ArchiveMode::Create {
            self.acquire_stream(id)?;
        }
        self.next_id += 1;
        self.entries.push(entry);
        Ok(id)
    }

    /// Open the most recently created entry for writing (Create mode)
    pub fn open_entry_writer(&mut self, id: EntryId) -> Result<EntryWriter<'_, S>> {
        let idx = self.index_of(id)?;
        if self.mode != ArchiveMode::Create {
            return Err(ZipError::state(
                "entries are written only in create mode, use open_for_update instead",
            ));
        }
        if !matches!(self.entries[idx].state, EntryState::Virgin) {
            return Err(ZipError::state("an entry can be opened for writing only once"));
        }
        if self.stream_owner != Some(id) {
            return Err(ZipError::state(
                "only the most recently created entry can be written",
            ));
        }
        self.entries[idx].state = EntryState::WritingExclusive;
        EntryWriter::new(self, idx, None)
    }

    /// Create an entry and open it for writing
    pub fn start_entry(&mut self, name: &str) -> Result<EntryWriter<'_, S>> {
        let id = self.create_entry(name)?;
        self.open_entry_writer(id)
    }

    /// Open an entry for reading and writing (Update mode). The first open
    /// loads the whole uncompressed content into memory.
    pub fn open_for_update(&mut self, id: EntryId) -> Result<EntryUpdateStream<'_>> {
        let idx = self.index_of(id)?;
        if self.mode != ArchiveMode::Update {
            return Err(ZipError::state(
                "entries can be opened for update only in update mode",
            ));
        }

        match self.entries[idx].state {
            EntryState::Buffered {
                stream_open: true, ..
            } => return Err(ZipError::state("entry is already open for update")),
            EntryState::Buffered { .. } => {}
            _ => {
                let data = if self.entries[idx].is_originally_in_archive() {
                    self.check_openable(idx, true, true)?;
                    let entry = &self.entries[idx];
                    if entry.uncompressed_size > MAX_IN_MEMORY_SIZE {
                        return Err(ZipError::EntryTooLarge {
                            name: entry.name().to_string(),
                            size: entry.uncompressed_size,
                        });
                    }
                    self.read_entry_at(idx)?
                } else {
                    Vec::new()
                };
                self.entries[idx].state = EntryState::Buffered {
                    data,
                    stream_open: false,
                };
            }
        }

        let entry = &mut self.entries[idx];
        let directory_name = entry.is_directory().then(|| entry.name().to_string());
        match &mut entry.state {
            EntryState::Buffered { data, stream_open } => {
                Ok(EntryUpdateStream::new(data, stream_open, directory_name))
            }
            _ => Err(ZipError::state("entry content is not loaded")),
        }
    }

    /// Remove an entry (Update mode)
    pub fn delete_entry(&mut self, id: EntryId) -> Result<()> {
        let idx = self.index_of(id)?;
        if self.mode != ArchiveMode::Update {
            return Err(ZipError::state("entries can be deleted only in update mode"));
        }
        if let EntryState::Buffered {
            stream_open: true, ..
        } = self.entries[idx].state
        {
            return Err(ZipError::state("an entry cannot be deleted while it is open"));
        }
        self.entries.remove(idx);
        Ok(())
    }

    /// Write everything still pending and return the stream
    pub fn finish(mut self) -> Result<S> {
        match self.mode {
            ArchiveMode::Read => {}
            ArchiveMode::Create => {
                if self
                    .entries
                    .iter()
                    .any(|e| matches!(e.state, EntryState::WritingExclusive))
                {
                    return Err(ZipError::state(
                        "an entry write stream was never finished",
                    ));
                }
                for idx in 0..self.entries.len() {
                    if matches!(self.entries[idx].state, EntryState::Virgin) {
                        self.write_empty_record(idx)?;
                    }
                }
                self.write_central_directory()?;
            }
            ArchiveMode::Update => self.write_updated_archive()?,
        }
        self.stream.flush()?;
        debug!(
            "finished {:?} archive with {} entries",
            self.mode,
            self.entries.len()
        );
        Ok(self.stream)
    }

    fn acquire_stream(&mut self, new_owner: EntryId) -> Result<()> {
        if let Some(owner) = self.stream_owner {
            if let Ok(idx) = self.index_of(owner) {
                match self.entries[idx].state {
                    EntryState::Virgin => self.write_empty_record(idx)?,
                    EntryState::WritingExclusive => {
                        return Err(ZipError::state(
                            "an entry is still open for writing, finish it before creating another",
                        ))
                    }
                    _ => {}
                }
            }
        }
        self.stream_owner = Some(new_owner);
        Ok(())
    }

    /// Local header of an entry that was created but never written to
    fn write_empty_record(&mut self, idx: usize) -> Result<()> {
        let can_seek = self.stream.can_seek();
        let (entry, stream) = self.entry_and_stream(idx);
        entry.write_local_file_header(stream, true, can_seek)?;
        entry.state = EntryState::EmptyWritten;
        Ok(())
    }

    fn write_updated_archive(&mut self) -> Result<()> {
        for idx in 0..self.entries.len() {
            if !self.entries[idx].is_originally_in_archive() {
                continue;
            }
            let offset = self.entries[idx].offset_of_local_header;
            self.stream.seek(SeekFrom::Start(offset))?;
            let fields = LocalFileHeader::read_extra_fields(&mut BufReader::new(&mut self.stream))?;
            self.entries[idx].local_unknown_extra_fields = Some(fields);

            if matches!(self.entries[idx].state, EntryState::Virgin) {
                let data_start = self.offset_of_compressed_data(idx)?;
                let size = self.entries[idx].compressed_size as usize;
                self.stream.seek(SeekFrom::Start(data_start))?;
                let bytes = read_vec(&mut self.stream, size).map_err(|e| {
                    if e.kind() == io::ErrorKind::UnexpectedEof {
                        ZipError::format("entry data is truncated")
                    } else {
                        ZipError::Io(e)
                    }
                })?;
                self.entries[idx].compressed_bytes = Some(bytes);
            }
        }

        self.stream.seek(SeekFrom::Start(0))?;
        self.stream.set_len(0)?;

        for idx in 0..self.entries.len() {
            self.write_local_file_header_and_data(idx)?;
        }
        self.write_central_directory()
    }

    fn write_local_file_header_and_data(&mut self, idx: usize) -> Result<()> {
        let state = std::mem::replace(&mut self.entries[idx].state, EntryState::Virgin);
        if let EntryState::Buffered { data, .. } = state {
            let entry = &mut self.entries[idx];
            entry.uncompressed_size = data.len() as u64;
            entry.compressed_size = 0;
            entry.crc32 = 0;

            let mut writer = EntryWriter::new(self, idx, Some(data.len() as u64))?;
            writer.write_data(&data)?;
            return writer.finish();
        }

        let can_seek = self.stream.can_seek();
        let (entry, stream) = self.entry_and_stream(idx);
        match entry.compressed_bytes.take() {
            Some(bytes) if entry.uncompressed_size != 0 => {
                entry.write_local_file_header(stream, false, can_seek)?;
                stream.write_all(&bytes)?;
            }
            _ => {
                // zero-byte files carry no data
                entry.compressed_size = 0;
                entry.write_local_file_header(stream, true, can_seek)?;
            }
        }
        entry.state = EntryState::Written;
        Ok(())
    }

    fn write_central_directory(&mut self) -> Result<()> {
        let start = self.stream.stream_position()?;
        {
            let mut writer = BufWriter::new(&mut self.stream);
            for entry in &mut self.entries {
                entry.write_central_directory_file_header(&mut writer)?;
            }
            writer.flush()?;
        }
        let end = self.stream.stream_position()?;
        let size = end - start;
        let count = self.entries.len() as u64;

        let mut epilogue = Vec::new();
        if start >= MASK_32 as u64 || size >= MASK_32 as u64 || count >= MASK_16 as u64 {
            Zip64EndOfCentralDirectoryRecord::write_block(&mut epilogue, count, start, size)?;
            Zip64EndOfCentralDirectoryLocator::write_block(&mut epilogue, end)?;
        }
        EndOfCentralDirectory::write_block(&mut epilogue, count, start, size, &self.comment)?;
        self.stream.write_all(&epilogue)?;

        debug!(
            "central directory: {} entries, {} bytes at offset {}",
            count, size, start
        );
        Ok(())
    }
}
