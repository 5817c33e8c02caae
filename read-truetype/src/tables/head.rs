//! The [head (Font Header)][head] table.
//!
//! [head]: https://docs.microsoft.com/en-us/typography/opentype/spec/head

use font_units::{BBox, Tag};

use crate::{FontData, ReadError};

/// 'head'
pub const TAG: Tag = Tag::new(b"head");

/// The value of the `magicNumber` field.
const MAGIC: u32 = 0x5F0F3CF5;

/// The fixed length of the table.
const LENGTH: usize = 54;

/// The format of the entries in the `loca` table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LocaFormat {
    /// Two-byte entries holding half the actual offset.
    #[default]
    Short,
    /// Four-byte entries holding the actual offset.
    Long,
}

/// The scalars this pipeline needs from the font header.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Head {
    /// Font design units per em square.
    pub units_per_em: u16,
    /// The union of all glyph bounding boxes, in font units.
    pub bounds: BBox<i16>,
    /// How `loca` entries are encoded.
    pub loca_format: LocaFormat,
}

impl Head {
    /// Parse the font header.
    pub fn read(data: FontData) -> Result<Self, ReadError> {
        if data.len() != LENGTH {
            return Err(ReadError::MalformedData("bad head length"));
        }
        if data.read_at::<u32>(12)? != MAGIC {
            return Err(ReadError::MalformedData("bad head magic number"));
        }
        let units_per_em = data.read_at::<u16>(18)?;
        if units_per_em == 0 {
            return Err(ReadError::MalformedData("zero units per em"));
        }
        let bounds = BBox::new(
            data.read_at::<i16>(36)?,
            data.read_at::<i16>(38)?,
            data.read_at::<i16>(40)?,
            data.read_at::<i16>(42)?,
        );
        let loca_format = match data.read_at::<u16>(50)? {
            0 => LocaFormat::Short,
            1 => LocaFormat::Long,
            _ => return Err(ReadError::MalformedData("bad loca offset format")),
        };
        Ok(Self {
            units_per_em,
            bounds,
            loca_format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::BeBuffer;

    fn sample_head() -> Vec<u8> {
        BeBuffer::new()
            .push(0x00010000u32) // version
            .push(0u32) // fontRevision
            .push(0u32) // checkSumAdjustment
            .push(MAGIC)
            .push(0u16) // flags
            .push(2048u16) // unitsPerEm
            .extend([0u64; 2]) // created, modified
            .extend([-20i16, -500, 1900, 1800]) // bounds
            .extend([0u16; 3]) // macStyle, lowestRecPPEM, fontDirectionHint
            .push(1u16) // indexToLocFormat
            .push(0u16) // glyphDataFormat
            .to_vec()
    }

    #[test]
    fn reads_scalars() {
        let head = Head::read(FontData::new(&sample_head())).unwrap();
        assert_eq!(head.units_per_em, 2048);
        assert_eq!(head.bounds, BBox::new(-20, -500, 1900, 1800));
        assert_eq!(head.loca_format, LocaFormat::Long);
    }

    #[test]
    fn rejects_bad_length_and_magic() {
        let bytes = sample_head();
        assert!(Head::read(FontData::new(&bytes[..50])).is_err());
        let mut bad = bytes.clone();
        bad[12] = 0;
        assert_eq!(
            Head::read(FontData::new(&bad)),
            Err(ReadError::MalformedData("bad head magic number"))
        );
    }
}
