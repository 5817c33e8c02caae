//! The [loca (Index to Location)][loca] table.
//!
//! [loca]: https://docs.microsoft.com/en-us/typography/opentype/spec/loca

use std::ops::Range;

use font_units::{GlyphId, Tag};

use crate::{tables::head::LocaFormat, FontData, ReadError};

/// 'loca'
pub const TAG: Tag = Tag::new(b"loca");

/// Looks up the byte range of a glyph within the `glyf` table.
///
/// Returns `None` for a valid empty glyph (equal consecutive offsets).
/// Descending offsets or offsets past `glyf_len` are malformed.
pub fn glyph_range(
    data: FontData,
    format: LocaFormat,
    glyph_id: GlyphId,
    glyf_len: usize,
) -> Result<Option<Range<usize>>, ReadError> {
    let index = glyph_id.to_u16() as usize;
    let (start, end) = match format {
        LocaFormat::Short => (
            data.read_at::<u16>(index * 2)? as usize * 2,
            data.read_at::<u16>(index * 2 + 2)? as usize * 2,
        ),
        LocaFormat::Long => (
            data.read_at::<u32>(index * 4)? as usize,
            data.read_at::<u32>(index * 4 + 4)? as usize,
        ),
    };
    if start > end || end > glyf_len {
        return Err(ReadError::MalformedData("descending loca offsets"));
    }
    Ok((start != end).then_some(start..end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::BeBuffer;

    #[test]
    fn short_entries_are_doubled() {
        let bytes = BeBuffer::new().extend([0u16, 5, 5, 9]).to_vec();
        let data = FontData::new(&bytes);
        assert_eq!(
            glyph_range(data, LocaFormat::Short, GlyphId::new(0), 18),
            Ok(Some(0..10))
        );
        // Equal offsets mean an empty glyph.
        assert_eq!(
            glyph_range(data, LocaFormat::Short, GlyphId::new(1), 18),
            Ok(None)
        );
        assert_eq!(
            glyph_range(data, LocaFormat::Short, GlyphId::new(2), 18),
            Ok(Some(10..18))
        );
        // One past the last entry pair is out of bounds.
        assert_eq!(
            glyph_range(data, LocaFormat::Short, GlyphId::new(3), 18),
            Err(ReadError::OutOfBounds)
        );
    }

    #[test]
    fn long_entries() {
        let bytes = BeBuffer::new().extend([0u32, 12, 40]).to_vec();
        let data = FontData::new(&bytes);
        assert_eq!(
            glyph_range(data, LocaFormat::Long, GlyphId::new(1), 40),
            Ok(Some(12..40))
        );
        assert_eq!(
            glyph_range(data, LocaFormat::Long, GlyphId::new(1), 30),
            Err(ReadError::MalformedData("descending loca offsets"))
        );
    }
}
