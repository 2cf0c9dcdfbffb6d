//! Extra-field codecs.
//!
//! Extra fields are `tag(u16) size(u16) payload[size]` records packed into
//! the extra block of local and central headers. Fields this crate does not
//! interpret are carried verbatim as [`ExtraField`] values so that re-saving
//! an archive keeps vendor extensions intact. The Zip64 field (tag `0x0001`)
//! is decoded into [`Zip64ExtraField`] and regenerated on write.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Write};

/// Size of the tag and length prefix of every extra field
pub const EXTRA_FIELD_HEADER_SIZE: usize = 4;

/// An extra field kept as opaque bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraField {
    pub tag: u16,
    pub data: Vec<u8>,
}

impl ExtraField {
    pub fn new(tag: u16, data: Vec<u8>) -> Self {
        ExtraField { tag, data }
    }

    /// Encoded size including the 4 byte prefix
    pub fn total_size(&self) -> usize {
        EXTRA_FIELD_HEADER_SIZE + self.data.len()
    }

    pub fn write_block<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        let size = u16::try_from(self.data.len()).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "extra field {:#06x} payload of {} bytes exceeds 65535",
                    self.tag,
                    self.data.len()
                ),
            )
        })?;
        writer.write_u16::<LittleEndian>(self.tag)?;
        writer.write_u16::<LittleEndian>(size)?;
        writer.write_all(&self.data)
    }

    /// Parse every well-formed field of an extra block. Parsing stops at the
    /// first record whose declared size runs past the end of the block.
    pub fn parse_all(block: &[u8]) -> Vec<ExtraField> {
        raw_fields(block)
            .map(|(tag, data)| ExtraField::new(tag, data.to_vec()))
            .collect()
    }

    /// Combined encoded size of a list of fields
    pub fn total_size_of(fields: &[ExtraField]) -> usize {
        fields.iter().map(ExtraField::total_size).sum()
    }

    pub fn write_all_blocks<W: Write + ?Sized>(
        fields: &[ExtraField],
        writer: &mut W,
    ) -> io::Result<()> {
        for field in fields {
            field.write_block(writer)?;
        }
        Ok(())
    }
}

/// Iterate `(tag, payload)` pairs of an extra block without allocating
fn raw_fields(block: &[u8]) -> impl Iterator<Item = (u16, &[u8])> {
    let mut rest = block;
    std::iter::from_fn(move || {
        if rest.len() < EXTRA_FIELD_HEADER_SIZE {
            return None;
        }
        let tag = u16::from_le_bytes([rest[0], rest[1]]);
        let size = u16::from_le_bytes([rest[2], rest[3]]) as usize;
        let body = &rest[EXTRA_FIELD_HEADER_SIZE..];
        if body.len() < size {
            return None;
        }
        let (data, tail) = body.split_at(size);
        rest = tail;
        Some((tag, data))
    })
}

/// Which Zip64 sub-fields a header announced by storing sentinel values.
///
/// The Zip64 payload has no count of its own: a reader must know from the
/// owning header which of the fixed-order values to expect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Zip64Request {
    pub uncompressed_size: bool,
    pub compressed_size: bool,
    pub local_header_offset: bool,
    pub start_disk_number: bool,
}

impl Zip64Request {
    pub fn any(&self) -> bool {
        self.count() > 0
    }

    fn count(&self) -> usize {
        [
            self.uncompressed_size,
            self.compressed_size,
            self.local_header_offset,
            self.start_disk_number,
        ]
        .into_iter()
        .filter(|wanted| *wanted)
        .count()
    }
}

/// Zip64 extended information extra field.
///
/// Values appear in the fixed order uncompressed size, compressed size,
/// local header offset, start disk number, and only those that are set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Zip64ExtraField {
    pub uncompressed_size: Option<u64>,
    pub compressed_size: Option<u64>,
    pub local_header_offset: Option<u64>,
    pub start_disk_number: Option<u32>,
}

impl Zip64ExtraField {
    pub const TAG: u16 = 0x0001;

    /// Payload size implied by the values that are set
    pub fn data_size(&self) -> u16 {
        let mut size = 0u16;
        if self.uncompressed_size.is_some() {
            size += 8;
        }
        if self.compressed_size.is_some() {
            size += 8;
        }
        if self.local_header_offset.is_some() {
            size += 8;
        }
        if self.start_disk_number.is_some() {
            size += 4;
        }
        size
    }

    /// Encoded size including the 4 byte prefix; always equals the number of
    /// bytes [`write_block`](Self::write_block) emits
    pub fn total_size(&self) -> u16 {
        self.data_size() + EXTRA_FIELD_HEADER_SIZE as u16
    }

    pub fn is_empty(&self) -> bool {
        self.data_size() == 0
    }

    pub fn write_block<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u16::<LittleEndian>(Self::TAG)?;
        writer.write_u16::<LittleEndian>(self.data_size())?;
        if let Some(v) = self.uncompressed_size {
            writer.write_u64::<LittleEndian>(v)?;
        }
        if let Some(v) = self.compressed_size {
            writer.write_u64::<LittleEndian>(v)?;
        }
        if let Some(v) = self.local_header_offset {
            writer.write_u64::<LittleEndian>(v)?;
        }
        if let Some(v) = self.start_disk_number {
            writer.write_u32::<LittleEndian>(v)?;
        }
        Ok(())
    }

    /// Decode the requested values from a Zip64 payload. Values the payload
    /// is too short to hold are left unset rather than treated as an error.
    fn parse_payload(mut data: &[u8], request: Zip64Request) -> Self {
        let mut field = Zip64ExtraField::default();
        // a short payload ends the parse, later values cannot be located
        let _ = field.read_requested(&mut data, request);

        if field.value_count() < request.count() {
            log::warn!(
                "Zip64 extra field holds {} of the {} values its header announced",
                field.value_count(),
                request.count()
            );
        }
        field
    }

    fn read_requested(&mut self, data: &mut &[u8], request: Zip64Request) -> io::Result<()> {
        if request.uncompressed_size {
            self.uncompressed_size = Some(data.read_u64::<LittleEndian>()?);
        }
        if request.compressed_size {
            self.compressed_size = Some(data.read_u64::<LittleEndian>()?);
        }
        if request.local_header_offset {
            self.local_header_offset = Some(data.read_u64::<LittleEndian>()?);
        }
        if request.start_disk_number {
            self.start_disk_number = Some(data.read_u32::<LittleEndian>()?);
        }
        Ok(())
    }

    fn value_count(&self) -> usize {
        [
            self.uncompressed_size.is_some(),
            self.compressed_size.is_some(),
            self.local_header_offset.is_some(),
            self.start_disk_number.is_some(),
        ]
        .into_iter()
        .filter(|set| *set)
        .count()
    }

    /// Find the Zip64 field in `fields`, decode the requested values from the
    /// first one, and remove every Zip64 field from the list so it is not
    /// re-emitted verbatim.
    pub fn get_and_remove_zip64_block(
        fields: &mut Vec<ExtraField>,
        request: Zip64Request,
    ) -> Self {
        let field = fields
            .iter()
            .find(|f| f.tag == Self::TAG)
            .map(|f| Self::parse_payload(&f.data, request))
            .unwrap_or_default();
        fields.retain(|f| f.tag != Self::TAG);
        field
    }

    /// Decode the requested values straight from a raw extra block, without
    /// materializing the other fields
    pub fn get_just_zip64_block(block: &[u8], request: Zip64Request) -> Self {
        raw_fields(block)
            .find(|(tag, _)| *tag == Self::TAG)
            .map(|(_, data)| Self::parse_payload(data, request))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(fields: &[ExtraField]) -> Vec<u8> {
        let mut out = Vec::new();
        ExtraField::write_all_blocks(fields, &mut out).unwrap();
        out
    }

    #[test]
    fn oversized_payload_is_not_written() {
        let field = ExtraField::new(0xcafe, vec![0; 0x1_0000]);
        let mut out = Vec::new();
        let err = field.write_block(&mut out).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(out.is_empty());

        let largest = ExtraField::new(0xcafe, vec![0; 0xFFFF]);
        assert_eq!(encode(&[largest]).len(), 4 + 0xFFFF);
    }

    #[test]
    fn parse_stops_at_truncated_record() {
        let mut block = encode(&[
            ExtraField::new(0x5455, vec![1, 2, 3, 4, 5]),
            ExtraField::new(0x7875, vec![9; 3]),
        ]);
        // third record claims 10 bytes but only has 2
        block.extend_from_slice(&[0xaa, 0xbb, 10, 0, 1, 2]);

        let fields = ExtraField::parse_all(&block);
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].tag, 0x5455);
        assert_eq!(fields[1].data, vec![9; 3]);
        assert_eq!(ExtraField::total_size_of(&fields), 9 + 7);
    }

    #[test]
    fn zip64_total_size_matches_written_bytes() {
        let variants = [
            Zip64ExtraField::default(),
            Zip64ExtraField {
                uncompressed_size: Some(1),
                ..Default::default()
            },
            Zip64ExtraField {
                compressed_size: Some(2),
                local_header_offset: Some(3),
                ..Default::default()
            },
            Zip64ExtraField {
                uncompressed_size: Some(1),
                compressed_size: Some(2),
                local_header_offset: Some(3),
                start_disk_number: Some(4),
            },
        ];
        for field in variants {
            let mut out = Vec::new();
            field.write_block(&mut out).unwrap();
            assert_eq!(out.len(), field.total_size() as usize);
        }
    }

    #[test]
    fn reads_only_requested_values_in_fixed_order() {
        let field = Zip64ExtraField {
            compressed_size: Some(0x1_0000_0000),
            local_header_offset: Some(0x2_0000_0000),
            ..Default::default()
        };
        let mut block = Vec::new();
        field.write_block(&mut block).unwrap();

        let request = Zip64Request {
            compressed_size: true,
            local_header_offset: true,
            ..Default::default()
        };
        let parsed = Zip64ExtraField::get_just_zip64_block(&block, request);
        assert_eq!(parsed, field);

        // same bytes read with a different announcement shift meaning
        let request = Zip64Request {
            uncompressed_size: true,
            ..Default::default()
        };
        let parsed = Zip64ExtraField::get_just_zip64_block(&block, request);
        assert_eq!(parsed.uncompressed_size, Some(0x1_0000_0000));
        assert_eq!(parsed.compressed_size, None);
    }

    #[test]
    fn tolerates_short_zip64_payload() {
        let mut block = Vec::new();
        block.extend_from_slice(&Zip64ExtraField::TAG.to_le_bytes());
        block.extend_from_slice(&8u16.to_le_bytes());
        block.extend_from_slice(&7u64.to_le_bytes());

        let request = Zip64Request {
            uncompressed_size: true,
            compressed_size: true,
            local_header_offset: true,
            start_disk_number: false,
        };
        let parsed = Zip64ExtraField::get_just_zip64_block(&block, request);
        assert_eq!(parsed.uncompressed_size, Some(7));
        assert_eq!(parsed.compressed_size, None);
        assert_eq!(parsed.local_header_offset, None);
    }

    #[test]
    fn get_and_remove_strips_every_zip64_block() {
        let zip64 = Zip64ExtraField {
            uncompressed_size: Some(42),
            ..Default::default()
        };
        let mut raw = Vec::new();
        zip64.write_block(&mut raw).unwrap();
        let mut fields = ExtraField::parse_all(&raw);
        fields.insert(0, ExtraField::new(0xcafe, vec![1]));
        fields.push(ExtraField::new(Zip64ExtraField::TAG, vec![0; 8]));

        let request = Zip64Request {
            uncompressed_size: true,
            ..Default::default()
        };
        let parsed = Zip64ExtraField::get_and_remove_zip64_block(&mut fields, request);
        assert_eq!(parsed.uncompressed_size, Some(42));
        assert_eq!(fields, vec![ExtraField::new(0xcafe, vec![1])]);
    }
}
