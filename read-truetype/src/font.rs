//! The parsed font.

use std::ops::Range;

use font_units::{BBox, F26Dot6, GlyphId, Tag};

use crate::{
    tables::{
        cmap::{self, Cmap},
        directory::TableDirectory,
        head::{self, Head, LocaFormat},
        hhea::{self, MetricsHeader},
        kern, loca,
        maxp::{self, Maxp},
    },
    FontData, ReadError,
};

/// A glyph's horizontal metrics, in the unit of the lookup that
/// produced them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HMetric {
    /// The advance width.
    pub advance_width: i32,
    /// The left side bearing.
    pub left_side_bearing: i32,
}

/// A glyph's vertical metrics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VMetric {
    /// The advance height.
    pub advance_height: i32,
    /// The top side bearing.
    pub top_side_bearing: i32,
}

/// A parsed TrueType font.
///
/// The font owns its raw bytes and is immutable after [`parse`](Self::parse):
/// it can be shared by reference across threads, with each renderer
/// owning its own mutable scratch state.
#[derive(Clone, Debug)]
pub struct Font {
    data: Vec<u8>,
    cmap: Cmap,
    head: Head,
    maxp: Maxp,
    hhea: MetricsHeader,
    vhea: Option<MetricsHeader>,
    num_kern_pairs: usize,
    glyf: Range<usize>,
    loca: Range<usize>,
    hmtx: Range<usize>,
    vmtx: Option<Range<usize>>,
    kern: Option<Range<usize>>,
    fpgm: Range<usize>,
    prep: Range<usize>,
    cvt: Range<usize>,
}

impl Font {
    /// Parse a font from its raw bytes, validating every table this
    /// pipeline consumes.
    pub fn parse(data: Vec<u8>) -> Result<Self, ReadError> {
        let bytes = FontData::new(&data);
        let directory = TableDirectory::read(bytes)?;
        let table = |tag: Tag| -> Result<FontData, ReadError> {
            bytes.slice(directory.expect_table(tag)?)
        };

        let head = Head::read(table(head::TAG)?)?;
        let maxp = Maxp::read(table(maxp::TAG)?)?;
        let cmap = Cmap::read(table(cmap::TAG)?)?;

        let hmtx = directory.expect_table(Tag::new(b"hmtx"))?;
        let hhea = MetricsHeader::read(table(hhea::HHEA_TAG)?)?;
        hhea.validate_metrics_len(maxp.num_glyphs, hmtx.len())?;

        let vmtx = directory.table_range(Tag::new(b"vmtx"));
        let vhea = match (directory.table_range(hhea::VHEA_TAG), &vmtx) {
            (Some(range), Some(vmtx)) => {
                let vhea = MetricsHeader::read(bytes.slice(range)?)?;
                vhea.validate_metrics_len(maxp.num_glyphs, vmtx.len())?;
                Some(vhea)
            }
            _ => None,
        };

        let glyf = directory.expect_table(Tag::new(b"glyf"))?;
        let loca = directory.expect_table(loca::TAG)?;
        let entry_len = match head.loca_format {
            LocaFormat::Short => 2,
            LocaFormat::Long => 4,
        };
        if loca.len() < (maxp.num_glyphs as usize + 1) * entry_len {
            return Err(ReadError::MalformedData("bad loca length"));
        }

        let kern = directory.table_range(kern::TAG);
        let num_kern_pairs = match &kern {
            Some(range) => kern::read_num_pairs(bytes.slice(range.clone())?)?,
            None => 0,
        };

        let optional = |tag: &[u8; 4]| directory.table_range(Tag::new(tag)).unwrap_or(0..0);
        let fpgm = optional(b"fpgm");
        let prep = optional(b"prep");
        let cvt = optional(b"cvt ");

        Ok(Self {
            data,
            cmap,
            head,
            maxp,
            hhea,
            vhea,
            num_kern_pairs,
            glyf,
            loca,
            hmtx,
            vmtx,
            kern,
            fpgm,
            prep,
            cvt,
        })
    }

    fn table(&self, range: &Range<usize>) -> FontData {
        // Ranges were validated against the buffer at parse time.
        FontData::new(&self.data[range.clone()])
    }

    /// The number of font design units per em square.
    pub fn units_per_em(&self) -> u16 {
        self.head.units_per_em
    }

    /// The number of glyphs in the font.
    pub fn num_glyphs(&self) -> u16 {
        self.maxp.num_glyphs
    }

    /// Maximum points in the hinter's twilight zone.
    pub fn max_twilight_points(&self) -> u16 {
        self.maxp.max_twilight_points
    }

    /// Number of storage locations the hinter must provide.
    pub fn max_storage(&self) -> u16 {
        self.maxp.max_storage
    }

    /// Maximum depth of the hinter's value stack.
    pub fn max_stack_elements(&self) -> u16 {
        self.maxp.max_stack_elements
    }

    /// The font program, run once per font.
    pub fn fpgm(&self) -> &[u8] {
        &self.data[self.fpgm.clone()]
    }

    /// The control value program, run at every font/scale change.
    pub fn prep(&self) -> &[u8] {
        &self.data[self.prep.clone()]
    }

    /// The raw control value table: unscaled 16-bit font-unit entries.
    pub fn cvt(&self) -> FontData {
        self.table(&self.cvt)
    }

    /// Converts a value in font units to 26.6 pixels at the given scale
    /// (pixels per em, in 26.6), rounding to nearest.
    ///
    /// This is the single FUnit to pixel conversion point for the whole
    /// pipeline.
    pub fn scale(&self, scale: F26Dot6, units: i32) -> F26Dot6 {
        let upem = self.head.units_per_em as i64;
        let mut x = scale.to_bits() as i64 * units as i64;
        if x >= 0 {
            x += upem / 2;
        } else {
            x -= upem / 2;
        }
        F26Dot6::from_bits((x / upem) as i32)
    }

    /// The union of all glyph bounding boxes, scaled.
    pub fn bounds(&self, scale: F26Dot6) -> BBox<F26Dot6> {
        self.head.bounds.map(|v| self.scale(scale, v as i32))
    }

    /// Maps a character to its glyph identifier, `NOTDEF` when unmapped.
    pub fn glyph_index(&self, ch: char) -> GlyphId {
        self.cmap.map_codepoint(ch as u32)
    }

    /// The byte range of a glyph's description within `glyf`, or `None`
    /// for a valid empty glyph.
    pub fn glyph_data(&self, glyph_id: GlyphId) -> Result<Option<FontData>, ReadError> {
        if glyph_id.to_u16() >= self.maxp.num_glyphs {
            return Err(ReadError::OutOfBounds);
        }
        let glyf = self.table(&self.glyf);
        let range = loca::glyph_range(
            self.table(&self.loca),
            self.head.loca_format,
            glyph_id,
            glyf.len(),
        )?;
        range.map(|range| glyf.slice(range)).transpose()
    }

    /// A glyph's horizontal metrics in raw font units.
    ///
    /// Glyphs at or past the number of full metric entries take the last
    /// explicit advance plus their own entry from the trailing side
    /// bearing array.
    pub fn h_metric_unscaled(&self, glyph_id: GlyphId) -> HMetric {
        let index = glyph_id.to_u16();
        if index >= self.maxp.num_glyphs {
            return HMetric::default();
        }
        let hmtx = self.table(&self.hmtx);
        let num_metrics = self.hhea.num_metrics;
        let (advance_at, bearing_at) = if index < num_metrics {
            (4 * index as usize, 4 * index as usize + 2)
        } else {
            (
                4 * (num_metrics as usize - 1),
                4 * num_metrics as usize + 2 * (index - num_metrics) as usize,
            )
        };
        // Offsets are within the length validated at parse time.
        HMetric {
            advance_width: hmtx.read_at::<u16>(advance_at).unwrap_or(0) as i32,
            left_side_bearing: hmtx.read_at::<i16>(bearing_at).unwrap_or(0) as i32,
        }
    }

    /// A glyph's horizontal metrics, scaled.
    pub fn h_metric(&self, scale: F26Dot6, glyph_id: GlyphId) -> HMetric {
        let unscaled = self.h_metric_unscaled(glyph_id);
        HMetric {
            advance_width: self.scale(scale, unscaled.advance_width).to_bits(),
            left_side_bearing: self.scale(scale, unscaled.left_side_bearing).to_bits(),
        }
    }

    /// A glyph's vertical metrics in raw font units.
    ///
    /// Without a `vmtx` table the metrics are derived from the font's
    /// ascent and descent; `y_max` is the glyph's top extent in font
    /// units, needed to place the synthesized top side bearing.
    pub fn v_metric_unscaled(&self, glyph_id: GlyphId, y_max: i32) -> VMetric {
        let index = glyph_id.to_u16();
        if index >= self.maxp.num_glyphs {
            return VMetric::default();
        }
        if let (Some(vmtx), Some(vhea)) = (&self.vmtx, &self.vhea) {
            let vmtx = self.table(vmtx);
            let num_metrics = vhea.num_metrics;
            let (advance_at, bearing_at) = if index < num_metrics {
                (4 * index as usize, 4 * index as usize + 2)
            } else {
                (
                    4 * (num_metrics as usize - 1),
                    4 * num_metrics as usize + 2 * (index - num_metrics) as usize,
                )
            };
            return VMetric {
                advance_height: vmtx.read_at::<u16>(advance_at).unwrap_or(0) as i32,
                top_side_bearing: vmtx.read_at::<i16>(bearing_at).unwrap_or(0) as i32,
            };
        }
        VMetric {
            advance_height: (self.hhea.ascent as i32) - (self.hhea.descent as i32),
            top_side_bearing: (self.hhea.ascent as i32) - y_max,
        }
    }

    /// The kerning adjustment for a glyph pair, scaled. Zero when the
    /// font has no kern table or the pair is not in it.
    pub fn kern(&self, scale: F26Dot6, left: GlyphId, right: GlyphId) -> F26Dot6 {
        if self.num_kern_pairs == 0 {
            return F26Dot6::ZERO;
        }
        let Some(kern) = &self.kern else {
            return F26Dot6::ZERO;
        };
        let data = self.table(kern);
        let key = (left.to_u16() as u32) << 16 | right.to_u16() as u32;
        let (mut lo, mut hi) = (0usize, self.num_kern_pairs);
        while lo < hi {
            let mid = (lo + hi) / 2;
            let at = kern::PAIRS_OFFSET + mid * kern::PAIR_LEN;
            let Ok(pair) = data.read_at::<u32>(at) else {
                return F26Dot6::ZERO;
            };
            if pair < key {
                lo = mid + 1;
            } else if pair > key {
                hi = mid;
            } else {
                let Ok(value) = data.read_at::<i16>(at + 4) else {
                    return F26Dot6::ZERO;
                };
                return self.scale(scale, value as i32);
            }
        }
        F26Dot6::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use font_fixtures::sample;

    fn make_font() -> Font {
        Font::parse(sample::build()).unwrap()
    }

    /// A 26.6 scale equal to the em size, so scaled results stay in
    /// font units.
    fn fupe(font: &Font) -> F26Dot6 {
        F26Dot6::from_bits(font.units_per_em() as i32)
    }

    #[test]
    fn parses_scalars() {
        let font = make_font();
        assert_eq!(font.units_per_em(), sample::UNITS_PER_EM);
        assert_eq!(font.num_glyphs(), sample::NUM_GLYPHS);
        let scale = fupe(&font);
        let [x_min, y_min, x_max, y_max] = sample::BOUNDS.map(|v| F26Dot6::from_bits(v as i32));
        assert_eq!(font.bounds(scale), BBox::new(x_min, y_min, x_max, y_max));
    }

    #[test]
    fn index_mapping() {
        let font = make_font();
        assert_eq!(font.glyph_index('A'), GlyphId::new(sample::GID_A));
        assert_eq!(font.glyph_index('V'), GlyphId::new(sample::GID_V));
        assert_eq!(font.glyph_index('中'), GlyphId::NOTDEF);
    }

    #[test]
    fn metrics() {
        let font = make_font();
        let scale = fupe(&font);
        assert_eq!(
            font.h_metric(scale, GlyphId::new(sample::GID_A)),
            HMetric {
                advance_width: sample::ADVANCE_A as i32,
                left_side_bearing: sample::LSB_A as i32,
            }
        );
        // Ids past num_h_metrics reuse the last advance and take their
        // own trailing side bearing.
        let last = font.h_metric_unscaled(GlyphId::new(sample::NUM_GLYPHS - 1));
        assert_eq!(last.advance_width, sample::ADVANCE_LAST_EXPLICIT as i32);
        assert_eq!(last.left_side_bearing, sample::LSB_TRAILING as i32);
    }

    #[test]
    fn kerning() {
        let font = make_font();
        let scale = fupe(&font);
        assert_eq!(
            font.kern(
                scale,
                GlyphId::new(sample::GID_A),
                GlyphId::new(sample::GID_V)
            ),
            F26Dot6::from_bits(sample::KERN_AV as i32)
        );
        // Swapped order is not in the table.
        assert_eq!(
            font.kern(
                scale,
                GlyphId::new(sample::GID_V),
                GlyphId::new(sample::GID_A)
            ),
            F26Dot6::ZERO
        );
    }

    #[test]
    fn vertical_metrics() {
        let font = Font::parse(sample::build_with_vertical()).unwrap();
        assert_eq!(
            font.v_metric_unscaled(GlyphId::new(sample::GID_A), 1480),
            VMetric {
                advance_height: sample::ADVANCE_HEIGHT as i32,
                top_side_bearing: sample::TSB as i32,
            }
        );
        // Without vmtx the metrics derive from ascent and descent.
        let font = make_font();
        assert_eq!(
            font.v_metric_unscaled(GlyphId::new(sample::GID_A), 1480),
            VMetric {
                advance_height: (sample::ASCENT - sample::DESCENT) as i32,
                top_side_bearing: (sample::ASCENT as i32) - 1480,
            }
        );
    }

    #[test]
    fn scale_rounds_to_nearest() {
        let font = make_font();
        let upem = font.units_per_em() as i32;
        // At a scale of one pixel per em, half a unit rounds up.
        assert_eq!(font.scale(F26Dot6::ONE, upem / 2), F26Dot6::from_bits(32));
        assert_eq!(font.scale(F26Dot6::ONE, -upem / 2), F26Dot6::from_bits(-32));
        assert_eq!(font.scale(F26Dot6::ONE, upem), F26Dot6::ONE);
    }

    #[test]
    fn empty_glyph_is_none() {
        let font = make_font();
        assert!(font
            .glyph_data(GlyphId::new(sample::GID_EMPTY))
            .unwrap()
            .is_none());
        assert!(font.glyph_data(GlyphId::new(sample::NUM_GLYPHS)).is_err());
    }
}
