use std::io::Cursor;
use ziparchive::{ForwardOnly, ZipArchive, FLAG_DATA_DESCRIPTOR};

fn u16_at(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn u32_at(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

#[test]
fn data_descriptor_follows_payload() {
    let payload = b"streamed without seeking ".repeat(40);
    let mut archive = ZipArchive::create_forward_only(Vec::new()).unwrap();
    archive.start_entry("stream.txt").unwrap().write_data(&payload).unwrap();
    let bytes = archive.finish().unwrap().into_inner();

    // local header: bit 3 set, crc and sizes left zero
    assert_eq!(u32_at(&bytes, 0), 0x04034b50);
    assert_ne!(u16_at(&bytes, 6) & FLAG_DATA_DESCRIPTOR, 0);
    assert_eq!(&bytes[14..26], &[0u8; 12]);

    let archive = ZipArchive::new(Cursor::new(bytes.clone())).unwrap();
    let entry = &archive.entries()[0];
    assert_ne!(entry.flags() & FLAG_DATA_DESCRIPTOR, 0);
    let compressed = entry.compressed_length().unwrap() as usize;

    let descriptor = 30 + "stream.txt".len() + compressed;
    assert_eq!(u32_at(&bytes, descriptor), 0x08074b50);
    assert_eq!(u32_at(&bytes, descriptor + 4), crc32fast::hash(&payload));
    assert_eq!(u32_at(&bytes, descriptor + 8) as usize, compressed);
    assert_eq!(u32_at(&bytes, descriptor + 12) as usize, payload.len());
}

#[test]
fn streamed_archive_reads_back() {
    let mut archive = ZipArchive::create_forward_only(Vec::new()).unwrap();
    for i in 0..5 {
        let mut writer = archive.start_entry(&format!("part-{i}.log")).unwrap();
        for line in 0..100 {
            writer
                .write_data(format!("part {i} line {line}\n").as_bytes())
                .unwrap();
        }
        writer.finish().unwrap();
    }
    archive.set_comment(b"made on a pipe".to_vec()).unwrap();
    let bytes = archive.finish().unwrap().into_inner();

    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    assert_eq!(archive.len(), 5);
    assert_eq!(archive.comment(), b"made on a pipe");
    let text = archive.read_entry_by_name("part-3.log").unwrap();
    let text = String::from_utf8(text).unwrap();
    assert!(text.starts_with("part 3 line 0\n"));
    assert!(text.ends_with("part 3 line 99\n"));
}

#[test]
fn empty_entries_need_no_descriptor() {
    let mut archive = ZipArchive::create_forward_only(Vec::new()).unwrap();
    archive.create_entry("nothing.txt").unwrap();
    archive.start_entry("also-nothing.txt").unwrap().finish().unwrap();
    let bytes = archive.finish().unwrap().into_inner();

    assert_eq!(u16_at(&bytes, 6) & FLAG_DATA_DESCRIPTOR, 0);
    assert!(!bytes.windows(4).any(|w| w == [0x50, 0x4b, 0x07, 0x08]));

    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    assert_eq!(archive.len(), 2);
    assert!(archive.read_entry_by_name("also-nothing.txt").unwrap().is_empty());
}

#[test]
fn forward_only_tracks_position() {
    let mut stream = ForwardOnly::new(Vec::new());
    std::io::Write::write_all(&mut stream, b"abc").unwrap();
    assert_eq!(stream.position(), 3);
    assert_eq!(stream.get_ref().len(), 3);
}

#[test]
fn forward_only_cannot_be_updated() {
    // update needs to look at the end of the stream
    let err = ZipArchive::update(ForwardOnly::new(Vec::new())).err().unwrap();
    assert_eq!(err.kind(), ziparchive::ErrorKind::Io);
}
