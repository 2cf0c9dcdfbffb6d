//! Basic usage example for ziparchive: create, read, then update a file

use std::io::{Seek, SeekFrom, Write};
use ziparchive::{CompressionMethod, ZipArchive};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== ziparchive Basic Example ===\n");

    println!("Creating test.zip...");
    let mut archive = ZipArchive::create_file("test.zip")?;

    archive.start_entry("hello.txt")?.write_data(b"Hello, ziparchive!")?;
    archive
        .start_entry("folder/nested.txt")?
        .write_data(b"This is a nested file.")?;

    let id = archive.create_entry("data.txt")?;
    archive
        .entry_mut(id)?
        .set_compression_method(CompressionMethod::Stored)?;
    let mut writer = archive.open_entry_writer(id)?;
    writer.write_data(b"Line 1\nLine 2\nLine 3\n")?;
    writer.finish()?;

    archive.create_entry("folder/empty/")?;
    archive.finish()?;
    println!("✓ Created test.zip\n");

    println!("Reading test.zip...");
    let mut archive = ZipArchive::open("test.zip")?;
    println!("Entries in ZIP:");
    for entry in archive.entries() {
        println!(
            "  - {} ({} bytes, {:?}, {})",
            entry.name(),
            entry.length()?,
            entry.compression_method(),
            entry.last_modified()
        );
    }
    println!();

    let data = archive.read_entry_by_name("hello.txt")?;
    println!("hello.txt: {}", String::from_utf8_lossy(&data));
    drop(archive);

    println!("\nUpdating test.zip...");
    let file = std::fs::File::options().read(true).write(true).open("test.zip")?;
    let mut archive = ZipArchive::update(file)?;
    if let Some(id) = archive.find_entry("data.txt") {
        let mut stream = archive.open_for_update(id)?;
        stream.seek(SeekFrom::End(0))?;
        stream.write_all(b"Line 4\n")?;
    }
    if let Some(id) = archive.find_entry("folder/nested.txt") {
        archive.delete_entry(id)?;
    }
    archive.finish()?;

    let mut archive = ZipArchive::open("test.zip")?;
    let data = archive.read_entry_by_name("data.txt")?;
    println!("data.txt now:\n{}", String::from_utf8_lossy(&data));
    println!("{} entries left", archive.len());

    println!("✓ All done!");
    Ok(())
}
