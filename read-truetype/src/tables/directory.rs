//! The sfnt table directory.

use std::ops::Range;

use font_units::Tag;

use crate::{FontData, ReadError};

/// The sfnt version for fonts with TrueType outlines.
pub const SFNT_VERSION_TRUETYPE: u32 = 0x00010000;

/// The sfnt version used by some Apple fonts (the tag `"true"`).
pub const SFNT_VERSION_APPLE: u32 = u32::from_be_bytes(*b"true");

/// The size of a single directory record: tag, checksum, offset, length.
const RECORD_LEN: usize = 16;

/// The parsed table directory: a list of table tags and their byte
/// ranges, each validated against the underlying buffer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TableDirectory {
    records: Vec<(Tag, Range<usize>)>,
}

impl TableDirectory {
    /// Parse and validate the directory at the front of `data`.
    pub fn read(data: FontData) -> Result<Self, ReadError> {
        let version = data.read_at::<u32>(0)?;
        if version != SFNT_VERSION_TRUETYPE && version != SFNT_VERSION_APPLE {
            return Err(ReadError::InvalidSfnt(version));
        }
        let num_tables = data.read_at::<u16>(4)? as usize;
        let mut records = Vec::with_capacity(num_tables);
        for i in 0..num_tables {
            let base = 12 + i * RECORD_LEN;
            let tag = data.read_at::<Tag>(base)?;
            let offset = data.read_at::<u32>(base + 8)? as usize;
            let length = data.read_at::<u32>(base + 12)? as usize;
            let end = offset
                .checked_add(length)
                .filter(|end| *end <= data.len())
                .ok_or(ReadError::OutOfBounds)?;
            records.push((tag, offset..end));
        }
        Ok(Self { records })
    }

    /// The byte range of the table with the given tag, if present.
    pub fn table_range(&self, tag: Tag) -> Option<Range<usize>> {
        self.records
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, range)| range.clone())
    }

    /// Like [`table_range`](Self::table_range), but a missing table is an
    /// error.
    pub fn expect_table(&self, tag: Tag) -> Result<Range<usize>, ReadError> {
        self.table_range(tag).ok_or(ReadError::TableIsMissing(tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::BeBuffer;

    fn directory_with(tag: &[u8; 4], offset: u32, length: u32, total: usize) -> Vec<u8> {
        let buf = BeBuffer::new()
            .push(SFNT_VERSION_TRUETYPE)
            .push(1u16) // numTables
            .extend([0u16; 3]) // binary search scaffolding
            .push(Tag::new(tag))
            .push(0u32) // checksum
            .push(offset)
            .push(length);
        let mut bytes = buf.to_vec();
        bytes.resize(total, 0);
        bytes
    }

    #[test]
    fn reads_record() {
        let bytes = directory_with(b"cmap", 28, 4, 32);
        let dir = TableDirectory::read(FontData::new(&bytes)).unwrap();
        assert_eq!(dir.table_range(Tag::new(b"cmap")), Some(28..32));
        assert_eq!(dir.table_range(Tag::new(b"glyf")), None);
        assert_eq!(
            dir.expect_table(Tag::new(b"glyf")),
            Err(ReadError::TableIsMissing(Tag::new(b"glyf")))
        );
    }

    #[test]
    fn rejects_bad_magic() {
        let bytes = directory_with(b"cmap", 28, 4, 32);
        let mut bad = bytes.clone();
        bad[0] = 0x4f;
        assert!(matches!(
            TableDirectory::read(FontData::new(&bad)),
            Err(ReadError::InvalidSfnt(_))
        ));
    }

    #[test]
    fn rejects_escaping_table() {
        // Table range runs past the end of the buffer.
        let bytes = directory_with(b"cmap", 28, 64, 32);
        assert_eq!(
            TableDirectory::read(FontData::new(&bytes)),
            Err(ReadError::OutOfBounds)
        );
    }
}
