//! Writing archives to streams other than files.
//!
//! A `Cursor<Vec<u8>>` seeks, so local headers are patched in place. Any
//! plain `Write` (a pipe, a socket, stdout) can be wrapped in
//! `ForwardOnly`; each entry then ends with a data descriptor.
//!
//! Everything written to a `Vec<u8>` stays in memory, so keep in-memory
//! archives small.

use std::io::{Cursor, Seek, SeekFrom};
use ziparchive::{Result, ZipArchive, ZipArchiveOptions};

fn main() -> Result<()> {
    println!("Example 1: Writing ZIP to in-memory buffer...");
    let mut zip = ZipArchive::create(Cursor::new(Vec::new()))?;
    zip.start_entry("hello.txt")?
        .write_data(b"Hello from in-memory ZIP!")?;
    zip.start_entry("data.txt")?
        .write_data(b"Some data in the second file.")?;
    let zip_bytes = zip.finish()?.into_inner();
    println!(
        "✓ Successfully created in-memory ZIP ({} bytes)",
        zip_bytes.len()
    );

    println!("\nExample 2: Writing with custom compression level...");
    let options = ZipArchiveOptions::new().with_compression_level(9);
    let mut zip = ZipArchive::create_with_options(Cursor::new(Vec::new()), options)?;
    zip.start_entry("compressed.txt")?
        .write_data("Hello World! ".repeat(1000).as_bytes())?;
    let zip_bytes = zip.finish()?.into_inner();
    println!(
        "✓ Successfully created highly compressed ZIP ({} bytes)",
        zip_bytes.len()
    );

    println!("\nExample 3: Archive appended after a prefix...");
    let mut cursor = Cursor::new(b"PREFIX_".to_vec());
    cursor.seek(SeekFrom::End(0))?;
    let mut zip = ZipArchive::create(cursor)?;
    zip.start_entry("after_prefix.txt")?
        .write_data(b"This ZIP starts after the prefix")?;
    let final_buffer = zip.finish()?.into_inner();

    // offsets are absolute, so the prefixed buffer still reads
    let mut reader = ZipArchive::new(Cursor::new(final_buffer))?;
    let data = reader.read_entry_by_name("after_prefix.txt")?;
    println!("✓ Read back: {}", String::from_utf8_lossy(&data));

    println!("\nExample 4: Streaming to a non-seekable writer...");
    let mut zip = ZipArchive::create_forward_only(Vec::new())?;
    let mut writer = zip.start_entry("stream.log")?;
    for i in 0..1000 {
        writer.write_data(format!("log line {i}\n").as_bytes())?;
    }
    writer.finish()?;
    let streamed = zip.finish()?.into_inner();
    std::fs::write("/tmp/example_output.zip", &streamed)?;
    println!(
        "✓ Saved streamed ZIP to /tmp/example_output.zip ({} bytes)",
        streamed.len()
    );

    println!("\n✓ All examples completed successfully!");
    Ok(())
}
