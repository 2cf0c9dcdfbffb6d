use std::io::{Cursor, Read, Write};
use ziparchive::{
    ArchiveMode, CompressionMethod, DateTime, ErrorKind, ZipArchive, ZipArchiveOptions, ZipError,
};

fn build(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut archive = ZipArchive::create(Cursor::new(Vec::new())).unwrap();
    for (name, data) in entries {
        let mut writer = archive.start_entry(name).unwrap();
        writer.write_data(data).unwrap();
        writer.finish().unwrap();
    }
    archive.finish().unwrap().into_inner()
}

fn open(bytes: Vec<u8>) -> ZipArchive<Cursor<Vec<u8>>> {
    ZipArchive::new(Cursor::new(bytes)).unwrap()
}

#[test]
fn round_trip_preserves_names_content_and_order() {
    let text = b"The quick brown fox jumps over the lazy dog. ".repeat(200);
    let bytes = build(&[
        ("docs/readme.txt", &text),
        ("data.bin", &[0u8, 1, 2, 3, 255]),
        ("empty.txt", b""),
    ]);

    let mut archive = open(bytes);
    assert_eq!(archive.mode(), ArchiveMode::Read);
    let names: Vec<_> = archive.entries().iter().map(|e| e.name().to_string()).collect();
    assert_eq!(names, ["docs/readme.txt", "data.bin", "empty.txt"]);

    let readme = &archive.entries()[0];
    assert_eq!(readme.file_name(), "readme.txt");
    assert_eq!(readme.length().unwrap(), text.len() as u64);
    assert!(readme.compressed_length().unwrap() < text.len() as u64);
    assert_eq!(readme.crc32(), crc32fast::hash(&text));
    assert_eq!(readme.compression_method(), CompressionMethod::Deflate);

    let empty = &archive.entries()[2];
    assert_eq!(empty.length().unwrap(), 0);
    assert_eq!(empty.compression_method(), CompressionMethod::Stored);

    assert_eq!(archive.read_entry_by_name("docs/readme.txt").unwrap(), text);
    assert_eq!(archive.read_entry_by_name("data.bin").unwrap(), [0, 1, 2, 3, 255]);
    assert!(archive.read_entry_by_name("empty.txt").unwrap().is_empty());
}

#[test]
fn reading_twice_yields_identical_bytes() {
    let payload = b"same bytes every time".repeat(64);
    let mut archive = open(build(&[("a.txt", &payload)]));
    let id = archive.find_entry("a.txt").unwrap();

    let first = archive.read_entry(id).unwrap();
    let mut second = Vec::new();
    archive.open_entry(id).unwrap().read_to_end(&mut second).unwrap();
    assert_eq!(first, payload);
    assert_eq!(first, second);
    assert_eq!(archive.entry(id).unwrap().length().unwrap(), payload.len() as u64);
}

#[test]
fn corrupted_data_fails_crc_check() {
    let mut bytes = build(&[("a.txt", b"0123456789")]);
    // flip the CRC in the central record; the crc field sits 16 bytes in
    let central = bytes
        .windows(4)
        .position(|w| w == [0x50, 0x4b, 0x01, 0x02])
        .unwrap();
    bytes[central + 16] ^= 0xFF;

    let mut archive = open(bytes);
    let err = archive.read_entry_by_name("a.txt").unwrap_err();
    assert!(matches!(err, ZipError::CrcMismatch { .. }), "{err}");
    assert_eq!(err.kind(), ErrorKind::Format);
}

#[test]
fn timestamps_attributes_and_comments_round_trip() {
    let stamp = DateTime::from_date_and_time(2021, 7, 14, 9, 30, 42).unwrap();
    let mut archive = ZipArchive::create(Cursor::new(Vec::new())).unwrap();
    let id = archive.create_entry("script.sh").unwrap();
    {
        let entry = archive.entry_mut(id).unwrap();
        entry.set_last_modified(stamp).unwrap();
        entry.set_external_attributes(0o100755 << 16).unwrap();
        entry.set_comment(b"entry note".to_vec()).unwrap();
    }
    archive
        .open_entry_writer(id)
        .unwrap()
        .write_data(b"#!/bin/sh\necho hi\n")
        .unwrap();
    archive.set_comment(b"archive note".to_vec()).unwrap();
    let bytes = archive.finish().unwrap().into_inner();

    let options = ZipArchiveOptions::new().with_preserve_extra_fields(true);
    let archive = ZipArchive::new_with_options(Cursor::new(bytes.clone()), options).unwrap();
    assert_eq!(archive.comment(), b"archive note");
    let entry = &archive.entries()[0];
    assert_eq!(entry.last_modified(), stamp);
    assert_eq!(entry.external_attributes() >> 16, 0o100755);
    assert_eq!(entry.comment(), b"entry note");

    // without preservation only the archive comment is loaded
    let archive = open(bytes);
    assert_eq!(archive.comment(), b"archive note");
    assert!(archive.entries()[0].comment().is_empty());
}

#[test]
fn name_length_limit_is_65535_bytes() {
    let longest = "n".repeat(65535);
    let mut archive = ZipArchive::create(Cursor::new(Vec::new())).unwrap();
    archive.start_entry(&longest).unwrap().write_data(b"x").unwrap();
    let mut archive = open(archive.finish().unwrap().into_inner());
    assert_eq!(archive.entries()[0].name().len(), 65535);
    assert_eq!(archive.read_entry_by_name(&longest).unwrap(), b"x");

    let mut archive = ZipArchive::create(Cursor::new(Vec::new())).unwrap();
    let err = archive.create_entry(&"n".repeat(65536)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Capacity);
    assert!(archive.is_empty());
    // nothing reached the stream
    assert!(archive.into_inner().into_inner().is_empty());
}

#[test]
fn rejected_name_does_not_flush_pending_entry() {
    let mut archive = ZipArchive::create(Cursor::new(Vec::new())).unwrap();
    let first = archive.create_entry("pending.txt").unwrap();
    assert!(archive.create_entry("").is_err());

    // the pending entry still owns the stream and can be written
    archive
        .open_entry_writer(first)
        .unwrap()
        .write_data(b"late")
        .unwrap();
    let mut archive = open(archive.finish().unwrap().into_inner());
    assert_eq!(archive.read_entry_by_name("pending.txt").unwrap(), b"late");
}

#[test]
fn directories_never_hold_data() {
    let mut archive = ZipArchive::create(Cursor::new(Vec::new())).unwrap();
    {
        let mut writer = archive.start_entry("folder/").unwrap();
        let err = writer.write_data(b"x").unwrap_err();
        assert!(matches!(err, ZipError::DirectoryWithData(_)));
        assert_eq!(err.kind(), ErrorKind::State);
        assert!(writer.write(b"x").is_err());
        // empty writes are allowed
        writer.write_data(b"").unwrap();
        writer.finish().unwrap();
    }
    let bytes = archive.finish().unwrap().into_inner();

    let mut archive = ZipArchive::update(Cursor::new(bytes)).unwrap();
    let id = archive.find_entry("folder/").unwrap();
    assert!(archive.entry(id).unwrap().is_directory());
    let mut stream = archive.open_for_update(id).unwrap();
    assert!(stream.write_all(b"x").is_err());
    stream.write_all(b"").unwrap();
}

#[test]
fn only_the_latest_entry_may_write() {
    let mut archive = ZipArchive::create(Cursor::new(Vec::new())).unwrap();
    let a = archive.create_entry("a.txt").unwrap();
    let b = archive.create_entry("b.txt").unwrap();

    // a was flushed as an empty record when b was created
    let err = archive.open_entry_writer(a).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::State);

    archive.open_entry_writer(b).unwrap().write_data(b"bee").unwrap();
    let err = archive.open_entry_writer(b).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::State);

    let mut archive = open(archive.finish().unwrap().into_inner());
    assert_eq!(archive.len(), 2);
    assert_eq!(archive.entries()[0].length().unwrap(), 0);
    assert_eq!(archive.read_entry_by_name("b.txt").unwrap(), b"bee");
}

#[test]
fn leaked_writer_blocks_new_entries_and_finish() {
    let mut archive = ZipArchive::create(Cursor::new(Vec::new())).unwrap();
    let mut writer = archive.start_entry("open.txt").unwrap();
    writer.write_data(b"never finished").unwrap();
    std::mem::forget(writer);

    let err = archive.create_entry("next.txt").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);
    let err = archive.finish().err().unwrap();
    assert_eq!(err.kind(), ErrorKind::State);
}

#[test]
fn unopened_entry_becomes_empty_record_at_finish() {
    let mut archive = ZipArchive::create(Cursor::new(Vec::new())).unwrap();
    archive.create_entry("placeholder").unwrap();
    let mut archive = open(archive.finish().unwrap().into_inner());
    assert_eq!(archive.len(), 1);
    assert_eq!(archive.entries()[0].length().unwrap(), 0);
    assert!(archive.read_entry_by_name("placeholder").unwrap().is_empty());
}

#[test]
fn metadata_is_frozen_after_writing_and_in_read_mode() {
    let mut archive = ZipArchive::create(Cursor::new(Vec::new())).unwrap();
    let id = archive.create_entry("a.txt").unwrap();
    archive.open_entry_writer(id).unwrap().write_data(b"a").unwrap();
    let entry = archive.entry_mut(id).unwrap();
    assert_eq!(
        entry.set_last_modified(DateTime::default()).unwrap_err().kind(),
        ErrorKind::State
    );
    assert_eq!(entry.length().unwrap_err().kind(), ErrorKind::State);
    let bytes = archive.finish().unwrap().into_inner();

    let mut archive = open(bytes);
    let id = archive.find_entry("a.txt").unwrap();
    let entry = archive.entry_mut(id).unwrap();
    assert_eq!(entry.set_comment(b"no".to_vec()).unwrap_err().kind(), ErrorKind::State);
    assert_eq!(
        entry
            .set_compression_method(CompressionMethod::Stored)
            .unwrap_err()
            .kind(),
        ErrorKind::State
    );
    assert_eq!(archive.set_comment(b"no".to_vec()).unwrap_err().kind(), ErrorKind::State);
    assert_eq!(archive.create_entry("b.txt").unwrap_err().kind(), ErrorKind::State);
}

#[test]
fn stored_entries_keep_payload_verbatim() {
    let mut archive = ZipArchive::create(Cursor::new(Vec::new())).unwrap();
    let id = archive.create_entry("raw.txt").unwrap();
    archive
        .entry_mut(id)
        .unwrap()
        .set_compression_method(CompressionMethod::Stored)
        .unwrap();
    archive
        .open_entry_writer(id)
        .unwrap()
        .write_data(b"verbatim payload")
        .unwrap();
    let bytes = archive.finish().unwrap().into_inner();

    // 30 byte header plus the name, then the payload itself
    assert_eq!(&bytes[30 + 7..30 + 7 + 16], b"verbatim payload");
    let mut archive = open(bytes);
    assert_eq!(archive.entries()[0].compressed_length().unwrap(), 16);
    assert_eq!(archive.read_entry_by_name("raw.txt").unwrap(), b"verbatim payload");
}

#[test]
fn unknown_compression_method_is_rejected() {
    let mut archive = ZipArchive::create(Cursor::new(Vec::new())).unwrap();
    let id = archive.create_entry("x").unwrap();
    let err = archive
        .entry_mut(id)
        .unwrap()
        .set_compression_method(CompressionMethod::Unknown(93))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Argument);
}

#[test]
fn names_use_configured_encoding() {
    let options = ZipArchiveOptions::new().with_entry_name_encoding(encoding_rs::IBM866);
    let mut archive = ZipArchive::create_with_options(Cursor::new(Vec::new()), options).unwrap();
    archive.start_entry("отчёт.txt").unwrap().write_data(b"1").unwrap();
    let bytes = archive.finish().unwrap().into_inner();

    let archive = ZipArchive::new_with_options(Cursor::new(bytes.clone()), options).unwrap();
    let entry = &archive.entries()[0];
    assert_eq!(entry.name(), "отчёт.txt");
    assert_eq!(entry.raw_name().len(), 9);
    assert_eq!(entry.flags() & ziparchive::FLAG_UNICODE_FILE_NAME, 0);

    // read as code page 437, the single-byte names do not decode to the same text
    let archive = open(bytes);
    assert_ne!(archive.entries()[0].name(), "отчёт.txt");
}

#[test]
fn non_ascii_names_default_to_flagged_utf8() {
    let bytes = build(&[("naïve.txt", b"1"), ("plain.txt", b"2")]);
    let archive = open(bytes);
    let flagged = &archive.entries()[0];
    assert_eq!(flagged.name(), "naïve.txt");
    assert_ne!(flagged.flags() & ziparchive::FLAG_UNICODE_FILE_NAME, 0);
    assert_eq!(archive.entries()[1].flags() & ziparchive::FLAG_UNICODE_FILE_NAME, 0);
}

#[test]
fn unrepresentable_names_are_rejected_before_writing() {
    let options = ZipArchiveOptions::new().with_entry_name_encoding(encoding_rs::IBM866);
    let mut archive = ZipArchive::create_with_options(Cursor::new(Vec::new()), options).unwrap();
    let err = archive.start_entry("日本.txt").err().unwrap();
    assert!(matches!(err, ZipError::InvalidArgument(_)), "{err}");
    assert_eq!(err.kind(), ErrorKind::Argument);
    archive.start_entry("файл.txt").unwrap().write_data(b"ok").unwrap();
    let bytes = archive.finish().unwrap().into_inner();

    assert!(!bytes.windows(5).any(|w| w == b"&#260"));
    let archive = ZipArchive::new_with_options(Cursor::new(bytes), options).unwrap();
    assert_eq!(archive.len(), 1);
    assert_eq!(archive.entries()[0].name(), "файл.txt");
}

#[test]
fn legacy_names_decode_as_cp437() {
    let bytes = build(&[("ab.txt", b"1")]);
    let mut patched = bytes.clone();
    let mut replaced = 0;
    for at in 0..patched.len() - 6 {
        if &patched[at..at + 6] == b"ab.txt" {
            patched[at] = 0x80;
            patched[at + 1] = 0x81;
            replaced += 1;
        }
    }
    // local header and central directory
    assert_eq!(replaced, 2);

    let mut archive = open(patched);
    let entry = &archive.entries()[0];
    assert_eq!(entry.flags() & ziparchive::FLAG_UNICODE_FILE_NAME, 0);
    assert_eq!(entry.name(), "Çü.txt");
    assert_eq!(entry.raw_name(), &[0x80, 0x81, b'.', b't', b'x', b't']);
    assert_eq!(archive.read_entry_by_name("Çü.txt").unwrap(), b"1");
}

#[test]
fn compression_level_reaches_the_encoder() {
    let data = b"level sensitive payload ".repeat(400);
    let compressed_at = |level| {
        let options = ZipArchiveOptions::new().with_compression_level(level);
        let mut archive =
            ZipArchive::create_with_options(Cursor::new(Vec::new()), options).unwrap();
        archive.start_entry("data.txt").unwrap().write_data(&data).unwrap();
        let bytes = archive.finish().unwrap().into_inner();
        let mut archive = open(bytes);
        assert_eq!(archive.read_entry_by_name("data.txt").unwrap(), data);
        archive.entries()[0].compressed_length().unwrap()
    };
    let none = compressed_at(0);
    let best = compressed_at(9);
    // level 0 emits stored deflate blocks
    assert!(none > data.len() as u64);
    assert!(best < none);
}

#[test]
fn invalid_options_are_rejected() {
    let err = ZipArchive::create_with_options(
        Cursor::new(Vec::new()),
        ZipArchiveOptions::new().with_compression_level(12),
    )
    .err()
    .unwrap();
    assert_eq!(err.kind(), ErrorKind::Argument);

    let err = ZipArchive::create_with_options(
        Cursor::new(Vec::new()),
        ZipArchiveOptions::new().with_entry_name_encoding(encoding_rs::UTF_16LE),
    )
    .err()
    .unwrap();
    assert_eq!(err.kind(), ErrorKind::Argument);
}

#[test]
fn garbage_is_not_an_archive() {
    let err = ZipArchive::new(Cursor::new(vec![0u8; 10])).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Format);
    let err = ZipArchive::new(Cursor::new(vec![0x42u8; 4096])).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Format);
}

#[test]
fn empty_archive_is_just_an_end_record() {
    let archive = ZipArchive::create(Cursor::new(Vec::new())).unwrap();
    let bytes = archive.finish().unwrap().into_inner();
    assert_eq!(bytes.len(), 22);
    assert_eq!(&bytes[..4], &[0x50, 0x4b, 0x05, 0x06]);
    assert!(open(bytes).is_empty());
}

#[test]
fn archive_comment_survives_long_values_and_rejects_oversize() {
    let mut archive = ZipArchive::create(Cursor::new(Vec::new())).unwrap();
    let err = archive.set_comment(vec![b'c'; 65536]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Capacity);
    archive.set_comment(vec![b'c'; 65535]).unwrap();
    let archive = open(archive.finish().unwrap().into_inner());
    assert_eq!(archive.comment().len(), 65535);
}

#[test]
fn many_entries_switch_to_zip64_end_records() {
    let mut archive = ZipArchive::create(Cursor::new(Vec::new())).unwrap();
    for i in 0..0xFFFFu32 {
        archive.create_entry(&format!("{i}")).unwrap();
    }
    let bytes = archive.finish().unwrap().into_inner();
    assert!(bytes.windows(4).any(|w| w == [0x50, 0x4b, 0x06, 0x06]));
    assert!(bytes.windows(4).any(|w| w == [0x50, 0x4b, 0x06, 0x07]));

    let archive = open(bytes);
    assert_eq!(archive.len(), 0xFFFF);
    assert_eq!(archive.entries()[0xFFFE].name(), "65534");
}
