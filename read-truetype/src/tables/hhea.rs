//! The [hhea (Horizontal Header)][hhea] and [vhea (Vertical Header)][vhea]
//! tables, which share a layout.
//!
//! [hhea]: https://docs.microsoft.com/en-us/typography/opentype/spec/hhea
//! [vhea]: https://docs.microsoft.com/en-us/typography/opentype/spec/vhea

use font_units::Tag;

use crate::{FontData, ReadError};

/// 'hhea'
pub const HHEA_TAG: Tag = Tag::new(b"hhea");

/// 'vhea'
pub const VHEA_TAG: Tag = Tag::new(b"vhea");

/// The fixed length of the table.
const LENGTH: usize = 36;

/// The scalars this pipeline needs from a metrics header, horizontal or
/// vertical.
#[derive(Clone, Copy, Debug, Default)]
pub struct MetricsHeader {
    /// Distance from the baseline to the highest (or rightmost) extent,
    /// in font units.
    pub ascent: i16,
    /// Distance from the baseline to the lowest (or leftmost) extent, in
    /// font units. Negative below the baseline.
    pub descent: i16,
    /// The number of full entries in the matching metrics table.
    pub num_metrics: u16,
}

impl MetricsHeader {
    /// Parse a metrics header.
    pub fn read(data: FontData) -> Result<Self, ReadError> {
        if data.len() != LENGTH {
            return Err(ReadError::MalformedData("bad hhea/vhea length"));
        }
        Ok(Self {
            ascent: data.read_at::<i16>(4)?,
            descent: data.read_at::<i16>(6)?,
            num_metrics: data.read_at::<u16>(34)?,
        })
    }

    /// Check that a metrics table (`hmtx`/`vmtx`) has the length this
    /// header and the glyph count demand: one full advance/bearing entry
    /// per metric, one trailing bearing per remaining glyph.
    pub fn validate_metrics_len(&self, num_glyphs: u16, len: usize) -> Result<(), ReadError> {
        let num_metrics = self.num_metrics as usize;
        let num_glyphs = num_glyphs as usize;
        if num_metrics == 0 || num_metrics > num_glyphs {
            return Err(ReadError::MalformedData("bad number of metrics"));
        }
        if 4 * num_metrics + 2 * (num_glyphs - num_metrics) != len {
            return Err(ReadError::MalformedData("bad hmtx/vmtx length"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::BeBuffer;

    fn sample_hhea(num_metrics: u16) -> Vec<u8> {
        BeBuffer::new()
            .push(0x00010000u32) // version
            .push(1638i16) // ascent
            .push(-410i16) // descent
            .extend([0i16; 13]) // lineGap through metricDataFormat
            .push(num_metrics)
            .to_vec()
    }

    #[test]
    fn reads_and_validates() {
        let hhea = MetricsHeader::read(FontData::new(&sample_hhea(3))).unwrap();
        assert_eq!((hhea.ascent, hhea.descent, hhea.num_metrics), (1638, -410, 3));
        // 3 full metrics + 2 bare side bearings.
        assert!(hhea.validate_metrics_len(5, 16).is_ok());
        assert!(hhea.validate_metrics_len(5, 14).is_err());
        assert!(hhea.validate_metrics_len(2, 16).is_err());
    }
}
