//! The [kern (Kerning)][kern] table.
//!
//! Only the original version 0 table with a single format 0 horizontal
//! subtable is supported; that covers the TrueType fonts this pipeline
//! targets. The AAT version 1 layout is rejected as unsupported.
//!
//! [kern]: https://docs.microsoft.com/en-us/typography/opentype/spec/kern

use font_units::Tag;

use crate::{FontData, ReadError};

/// 'kern'
pub const TAG: Tag = Tag::new(b"kern");

/// The offset of the first kerning pair: the 4-byte table header, the
/// 6-byte subtable header, and the 8 bytes of binary search scaffolding.
pub const PAIRS_OFFSET: usize = 18;

/// The byte length of one kerning pair record.
pub const PAIR_LEN: usize = 6;

/// Validates the kern table and returns the number of kerning pairs.
///
/// Pairs must be sorted by the combined `(left << 16) | right` key so
/// that lookups can binary search; a table violating that is malformed.
pub fn read_num_pairs(data: FontData) -> Result<usize, ReadError> {
    if data.read_at::<u16>(0)? != 0 {
        return Err(ReadError::Unsupported("kern table version (only 0)"));
    }
    if data.read_at::<u16>(2)? != 1 {
        return Err(ReadError::Unsupported("number of kern subtables (only 1)"));
    }
    let length = data.read_at::<u16>(6)? as usize;
    if data.read_at::<u16>(8)? != 0x0001 {
        return Err(ReadError::Unsupported(
            "kern subtable coverage (only horizontal format 0)",
        ));
    }
    let num_pairs = data.read_at::<u16>(10)? as usize;
    if length != 14 + PAIR_LEN * num_pairs || data.len() < 4 + length {
        return Err(ReadError::MalformedData("bad kern subtable length"));
    }
    let mut prev = None;
    for i in 0..num_pairs {
        let key = data.read_at::<u32>(PAIRS_OFFSET + i * PAIR_LEN)?;
        if prev.is_some_and(|prev| prev >= key) {
            return Err(ReadError::MalformedData("unsorted kern pairs"));
        }
        prev = Some(key);
    }
    Ok(num_pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::BeBuffer;

    fn sample_kern(pairs: &[(u16, u16, i16)]) -> Vec<u8> {
        let mut buf = BeBuffer::new()
            .push(0u16) // version
            .push(1u16) // nTables
            .push(0u16) // subtable version
            .push(14 + PAIR_LEN as u16 * pairs.len() as u16) // length
            .push(0x0001u16) // coverage
            .push(pairs.len() as u16)
            .extend([0u16; 3]); // search scaffolding
        for &(left, right, value) in pairs {
            buf = buf.push(left).push(right).push(value);
        }
        buf.to_vec()
    }

    #[test]
    fn accepts_sorted_pairs() {
        let bytes = sample_kern(&[(36, 57, -144), (36, 58, -100), (40, 36, 30)]);
        assert_eq!(read_num_pairs(FontData::new(&bytes)), Ok(3));
    }

    #[test]
    fn rejects_unsorted_pairs() {
        let bytes = sample_kern(&[(36, 58, -100), (36, 57, -144)]);
        assert_eq!(
            read_num_pairs(FontData::new(&bytes)),
            Err(ReadError::MalformedData("unsorted kern pairs"))
        );
    }

    #[test]
    fn rejects_vertical_coverage() {
        let mut bytes = sample_kern(&[(36, 57, -144)]);
        bytes[9] = 0x00;
        assert!(matches!(
            read_num_pairs(FontData::new(&bytes)),
            Err(ReadError::Unsupported(_))
        ));
    }

    #[test]
    fn rejects_bad_length() {
        let mut bytes = sample_kern(&[(36, 57, -144)]);
        bytes[7] = 0xff;
        assert!(matches!(
            read_num_pairs(FontData::new(&bytes)),
            Err(ReadError::MalformedData(_))
        ));
    }
}
