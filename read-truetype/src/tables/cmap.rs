//! The [cmap (Character to Glyph Mapping)][cmap] table, format 4.
//!
//! [cmap]: https://docs.microsoft.com/en-us/typography/opentype/spec/cmap

use font_units::{GlyphId, Tag};

use crate::{FontData, ReadError};

/// 'cmap'
pub const TAG: Tag = Tag::new(b"cmap");

/// One segment of a format 4 mapping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Segment {
    start: u16,
    end: u16,
    delta: u16,
    /// Index into the trailing glyph id array, in u16 units from the
    /// segment's own `idRangeOffset` slot; zero means the delta path.
    range_offset: u16,
}

/// A parsed character map.
///
/// Only the format 4 (segment mapping to delta values) subtable is
/// supported, selected from the platform 0 / specific 3 (Unicode 2.0)
/// encoding when present and platform 3 / specific 1 (Microsoft UCS-2)
/// otherwise.
#[derive(Clone, Debug, Default)]
pub struct Cmap {
    segments: Vec<Segment>,
    glyph_ids: Vec<u16>,
}

impl Cmap {
    /// Parse the cmap table, choosing the best supported encoding
    /// subtable.
    pub fn read(data: FontData) -> Result<Self, ReadError> {
        let num_subtables = data.read_at::<u16>(2)? as usize;
        let mut best: Option<(u32, usize)> = None;
        for i in 0..num_subtables {
            let base = 4 + i * 8;
            let platform = data.read_at::<u16>(base)?;
            let specific = data.read_at::<u16>(base + 2)?;
            let offset = data.read_at::<u32>(base + 4)? as usize;
            let rank = match (platform, specific) {
                // Unicode 2.0 beats Microsoft UCS-2.
                (0, 3) => 2,
                (3, 1) => 1,
                _ => 0,
            };
            if rank > 0 && best.map_or(true, |(r, _)| rank > r) {
                best = Some((rank, offset));
            }
        }
        let (_, offset) = best.ok_or(ReadError::Unsupported("no supported cmap encoding"))?;
        Self::read_format_4(data, offset)
    }

    fn read_format_4(data: FontData, offset: usize) -> Result<Self, ReadError> {
        let format = data.read_at::<u16>(offset)?;
        if format != 4 {
            return Err(ReadError::Unsupported("cmap format (only 4 is supported)"));
        }
        let length = data.read_at::<u16>(offset + 2)? as usize;
        let subtable = data.slice(offset..offset + length)?;
        let seg_count_x2 = subtable.read_at::<u16>(6)? as usize;
        if seg_count_x2 % 2 != 0 || seg_count_x2 == 0 {
            return Err(ReadError::MalformedData("bad cmap segment count"));
        }
        let seg_count = seg_count_x2 / 2;
        let end = subtable.read_array::<u16>(14, seg_count)?;
        let start = subtable.read_array::<u16>(14 + seg_count_x2 + 2, seg_count)?;
        let delta = subtable.read_array::<u16>(14 + 2 * seg_count_x2 + 2, seg_count)?;
        let range_offset = subtable.read_array::<u16>(14 + 3 * seg_count_x2 + 2, seg_count)?;
        let ids_base = 14 + 4 * seg_count_x2 + 2;
        let glyph_ids = subtable.read_array::<u16>(ids_base, (length - ids_base) / 2)?;
        let segments = (0..seg_count)
            .map(|i| Segment {
                start: start[i],
                end: end[i],
                delta: delta[i],
                range_offset: range_offset[i],
            })
            .collect();
        Ok(Self {
            segments,
            glyph_ids,
        })
    }

    /// Maps a codepoint to a glyph identifier, or `NOTDEF` when the
    /// character is unmapped.
    pub fn map_codepoint(&self, codepoint: impl Into<u32>) -> GlyphId {
        let codepoint = codepoint.into();
        if codepoint > u16::MAX as u32 {
            return GlyphId::NOTDEF;
        }
        let c = codepoint as u16;
        let seg_count = self.segments.len();
        // Segments are few; a linear scan is fine.
        for (i, seg) in self.segments.iter().enumerate() {
            if c < seg.start || c > seg.end {
                continue;
            }
            if seg.range_offset == 0 {
                return GlyphId::new(c.wrapping_add(seg.delta));
            }
            // The range offset counts u16s from the segment's own slot in
            // the idRangeOffset array; rebase it onto the glyph id array.
            let index = (seg.range_offset as usize / 2 + (c - seg.start) as usize)
                .wrapping_sub(seg_count - i);
            return match self.glyph_ids.get(index) {
                Some(&id) => GlyphId::new(id),
                None => GlyphId::NOTDEF,
            };
        }
        GlyphId::NOTDEF
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::BeBuffer;

    /// A two-segment format 4 subtable under a (0, 3) encoding record:
    /// 'A'..='Z' map to 36.. via delta, '0'..='9' map through the glyph
    /// id array.
    fn sample_cmap() -> Vec<u8> {
        let digits: Vec<u16> = (100..110).collect();
        let seg_count = 3u16; // two live segments plus the 0xffff terminator
        let length = 16 + 8 * seg_count + 2 * digits.len() as u16;
        BeBuffer::new()
            .push(0u16) // version
            .push(1u16) // numTables
            .push(0u16) // platform
            .push(3u16) // specific
            .push(12u32) // offset
            // format 4 subtable
            .push(4u16)
            .push(length)
            .push(0u16) // language
            .push(seg_count * 2)
            .extend([0u16; 3]) // searchRange scaffolding
            .extend([b'Z' as u16, b'9' as u16, 0xffff]) // endCode
            .push(0u16) // reservedPad
            .extend([b'A' as u16, b'0' as u16, 0xffff]) // startCode
            .extend([36u16.wrapping_sub(b'A' as u16), 0, 1]) // idDelta
            // '0' segment indexes the glyph id array: slot is 2 u16s from
            // the array, so offset = 2 * 2 = 4.
            .extend([0u16, 4, 0]) // idRangeOffset
            .extend(digits)
            .to_vec()
    }

    #[test]
    fn delta_segment() {
        let cmap = Cmap::read(FontData::new(&sample_cmap())).unwrap();
        assert_eq!(cmap.map_codepoint('A'), GlyphId::new(36));
        assert_eq!(cmap.map_codepoint('V'), GlyphId::new(57));
        assert_eq!(cmap.map_codepoint('Z'), GlyphId::new(61));
    }

    #[test]
    fn range_offset_segment() {
        let cmap = Cmap::read(FontData::new(&sample_cmap())).unwrap();
        assert_eq!(cmap.map_codepoint('0'), GlyphId::new(100));
        assert_eq!(cmap.map_codepoint('9'), GlyphId::new(109));
    }

    #[test]
    fn unmapped_is_notdef() {
        let cmap = Cmap::read(FontData::new(&sample_cmap())).unwrap();
        assert_eq!(cmap.map_codepoint('a'), GlyphId::NOTDEF);
        assert_eq!(cmap.map_codepoint('中'), GlyphId::NOTDEF);
        assert_eq!(cmap.map_codepoint(0x10FFFFu32), GlyphId::NOTDEF);
    }

    #[test]
    fn rejects_other_formats() {
        let mut bytes = sample_cmap();
        bytes[12] = 0;
        bytes[13] = 6; // format 6
        assert!(matches!(
            Cmap::read(FontData::new(&bytes)),
            Err(ReadError::Unsupported(_))
        ));
    }
}
