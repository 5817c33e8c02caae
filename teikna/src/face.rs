//! The rendering facade: one call from character to placed alpha mask.

use raw::{
    tables::glyf::PointFlags,
    units::{BBox, F26Dot6, Point},
    Font,
};
use scanline::{AlphaSrcPainter, Mask, Rasterizer};

use crate::{glyph::GlyphBuf, hint::Hinter, Hinting};

/// Configuration for a [`Face`].
#[derive(Copy, Clone, Debug)]
pub struct FaceOptions {
    /// The font size in points, as in "a 10 point font size".
    pub size: f64,
    /// The dots-per-inch resolution.
    pub dpi: f64,
    /// How to fit glyph outlines to the pixel grid.
    pub hinting: Hinting,
    /// The number of sub-pixel locations a glyph's dot is quantized to
    /// horizontally. Must be a power of two between 1 and 64; other
    /// values fall back to the default of 4. Finer quantization gives
    /// a more faithful image but reduces the effectiveness of any
    /// glyph cache layered above.
    pub sub_pixels_x: u32,
    /// Vertical sub-pixel quantization; the default of 1 snaps
    /// baselines to the pixel grid.
    pub sub_pixels_y: u32,
}

impl Default for FaceOptions {
    fn default() -> Self {
        Self {
            size: 12.0,
            dpi: 72.0,
            hinting: Hinting::None,
            sub_pixels_x: 4,
            sub_pixels_y: 1,
        }
    }
}

/// The bias and mask that quantize a 26.6 coordinate to `q` sub-pixel
/// locations per pixel.
fn sub_pixel_quantum(q: u32, default: u32) -> (i32, i32) {
    let q = match q {
        1 | 2 | 4 | 8 | 16 | 32 | 64 => q as i32,
        _ => default as i32,
    };
    (32 / q, -64 / q)
}

/// A rendered glyph: an alpha mask and where to composite it.
///
/// The mask is owned by the [`Face`] and reused across calls; only the
/// `width` by `height` region starting at its origin is meaningful.
pub struct RenderedGlyph<'a> {
    /// The dot advanced past this glyph.
    pub new_dot: Point<F26Dot6>,
    /// Destination left edge, in integer pixels.
    pub left: i32,
    /// Destination top edge, in integer pixels (raster y grows down).
    pub top: i32,
    pub width: usize,
    pub height: usize,
    pub mask: &'a Mask,
}

/// Renders single glyphs of one font at one size.
///
/// A face owns every mutable buffer in the pipeline (glyph buffer,
/// hinter, rasterizer cells, mask) and is therefore single-threaded;
/// share the [`Font`] and give each thread its own face.
pub struct Face<'a> {
    font: &'a Font,
    hinting: Hinting,
    scale: F26Dot6,
    sub_pixel_bias_x: i32,
    sub_pixel_mask_x: i32,
    sub_pixel_bias_y: i32,
    sub_pixel_mask_y: i32,
    mask: Mask,
    rasterizer: Rasterizer,
    glyph_buf: GlyphBuf,
    hinter: Hinter,
}

impl<'a> Face<'a> {
    pub fn new(font: &'a Font, options: FaceOptions) -> Self {
        let hinting = match options.hinting {
            Hinting::None => Hinting::None,
            // Vertical-only hinting is not implemented separately.
            Hinting::Vertical | Hinting::Full => Hinting::Full,
        };
        let size = if options.size > 0.0 { options.size } else { 12.0 };
        let dpi = if options.dpi > 0.0 { options.dpi } else { 72.0 };
        let scale = F26Dot6::from_bits((0.5 + size * dpi * 64.0 / 72.0) as i32);
        let (sub_pixel_bias_x, sub_pixel_mask_x) = sub_pixel_quantum(options.sub_pixels_x, 4);
        let (sub_pixel_bias_y, sub_pixel_mask_y) = sub_pixel_quantum(options.sub_pixels_y, 1);
        // Size the rasterizer and mask for the largest glyph in the
        // font.
        let b = font.bounds(scale);
        let x_min = b.x_min.to_bits() >> 6;
        let y_min = -b.y_max.to_bits() >> 6;
        let x_max = (b.x_max.to_bits() + 63) >> 6;
        let y_max = (-b.y_min.to_bits() + 63) >> 6;
        let max_w = (x_max - x_min).max(0) as usize;
        let max_h = (y_max - y_min).max(0) as usize;
        let mut rasterizer = Rasterizer::new();
        rasterizer.set_bounds(max_w, max_h);
        Self {
            font,
            hinting,
            scale,
            sub_pixel_bias_x,
            sub_pixel_mask_x,
            sub_pixel_bias_y,
            sub_pixel_mask_y,
            mask: Mask::new(max_w, max_h),
            rasterizer,
            glyph_buf: GlyphBuf::new(),
            hinter: Hinter::new(),
        }
    }

    /// The scale in 26.6 pixels per em this face renders at.
    pub fn scale(&self) -> F26Dot6 {
        self.scale
    }

    /// The kerning adjustment between two characters, grid-rounded
    /// when hinting is enabled.
    pub fn kern(&self, r0: char, r1: char) -> F26Dot6 {
        let kern = self.font.kern(
            self.scale,
            self.font.glyph_index(r0),
            self.font.glyph_index(r1),
        );
        if self.hinting.is_enabled() {
            return kern.round();
        }
        kern
    }

    /// A character's outline bounds in raster coordinates (y down) and
    /// its advance.
    pub fn glyph_bounds(&mut self, ch: char) -> Option<(BBox<F26Dot6>, F26Dot6)> {
        self.load(ch)?;
        let b = self.glyph_buf.bounds;
        let flipped = BBox::new(b.x_min, -b.y_max, b.x_max, -b.y_min);
        if flipped.x_min > flipped.x_max || flipped.y_min > flipped.y_max {
            return None;
        }
        Some((flipped, self.glyph_buf.advance_width))
    }

    /// A character's advance width.
    pub fn glyph_advance(&mut self, ch: char) -> Option<F26Dot6> {
        self.load(ch)?;
        Some(self.glyph_buf.advance_width)
    }

    /// Renders a character with its dot at `dot`, quantized to the
    /// configured sub-pixel grid.
    ///
    /// Returns the advanced dot, the mask and the integer-pixel
    /// placement of its top-left corner, or `None` when the glyph
    /// cannot be loaded.
    pub fn glyph(&mut self, dot: Point<F26Dot6>, ch: char) -> Option<RenderedGlyph<'_>> {
        // Quantize to the sub-pixel granularity.
        let dot_x = (dot.x.to_bits() + self.sub_pixel_bias_x) & self.sub_pixel_mask_x;
        let dot_y = (dot.y.to_bits() + self.sub_pixel_bias_y) & self.sub_pixel_mask_y;
        // Split the coordinates into their integer and fractional
        // parts.
        let (ix, mut fx) = (dot_x >> 6, dot_x & 0x3f);
        let (iy, mut fy) = (dot_y >> 6, dot_y & 0x3f);

        self.load(ch)?;
        let b = self.glyph_buf.bounds;
        // The integer-pixel bounds of the glyph. TrueType's y axis
        // points up, the rasterizer's points down.
        let x_min = (fx + b.x_min.to_bits()) >> 6;
        let y_min = (fy - b.y_max.to_bits()) >> 6;
        let x_max = (fx + b.x_max.to_bits() + 0x3f) >> 6;
        let y_max = (fy - b.y_min.to_bits() + 0x3f) >> 6;
        if x_min > x_max || y_min > y_max {
            return None;
        }
        // A glyph's points can have negative coordinates, but the
        // rasterizer clips anything left of x = 0 or above y = 0.
        // Shifting by the integer-pixel minima makes the glyph
        // non-negative in rasterizer space; the placement offset
        // restores it.
        fx -= x_min << 6;
        fy -= y_min << 6;
        self.rasterizer.clear();
        self.mask.clear();
        let mut start = 0;
        for i in 0..self.glyph_buf.ends.len() {
            let end = self.glyph_buf.ends[i];
            draw_contour(
                &mut self.rasterizer,
                &self.glyph_buf.points[start..end],
                &self.glyph_buf.flags[start..end],
                fx,
                fy,
            );
            start = end;
        }
        let mut painter = AlphaSrcPainter::new(&mut self.mask);
        self.rasterizer.rasterize(&mut painter);
        Some(RenderedGlyph {
            new_dot: Point::new(dot.x + self.glyph_buf.advance_width, dot.y),
            left: ix + x_min,
            top: iy + y_min,
            width: (x_max - x_min) as usize,
            height: (y_max - y_min) as usize,
            mask: &self.mask,
        })
    }

    /// Loads the glyph for a character into the glyph buffer, falling
    /// back to the unhinted outline when its program misbehaves.
    fn load(&mut self, ch: char) -> Option<()> {
        let glyph_id = self.font.glyph_index(ch);
        let hinter = self.hinting.is_enabled().then_some(&mut self.hinter);
        match self.glyph_buf.load(self.font, self.scale, glyph_id, hinter) {
            Ok(()) => Some(()),
            Err(crate::Error::Hinting(e)) => {
                log::warn!("glyph {glyph_id}: hinting failed ({e}), using unhinted outline");
                self.glyph_buf
                    .load(self.font, self.scale, glyph_id, None)
                    .ok()
            }
            Err(e) => {
                log::debug!("glyph {glyph_id}: load failed: {e}");
                None
            }
        }
    }
}

/// Draws one closed contour into the rasterizer, offset by `(dx, dy)`
/// and flipped into raster space (positive y going down).
///
/// The low flag bit of each point is whether it is on the curve.
/// TrueType fonts only have quadratic curves, so two consecutive
/// off-curve points imply an on-curve point halfway between them, and
/// the opening point of a contour may itself be implicit.
fn draw_contour(
    rasterizer: &mut Rasterizer,
    points: &[Point<F26Dot6>],
    flags: &[PointFlags],
    dx: i32,
    dy: i32,
) {
    if points.is_empty() {
        return;
    }
    let place = |p: Point<F26Dot6>| {
        Point::new(
            F26Dot6::from_bits(dx + p.x.to_bits()),
            F26Dot6::from_bits(dy - p.y.to_bits()),
        )
    };
    let midpoint = |a: Point<F26Dot6>, b: Point<F26Dot6>| {
        Point::new(
            F26Dot6::from_bits((a.x.to_bits() + b.x.to_bits()) / 2),
            F26Dot6::from_bits((a.y.to_bits() + b.y.to_bits()) / 2),
        )
    };
    let first = place(points[0]);
    let (start, others, others_flags) = if flags[0].is_on_curve() {
        (first, &points[1..], &flags[1..])
    } else {
        let last = place(points[points.len() - 1]);
        if flags[flags.len() - 1].is_on_curve() {
            (last, &points[..points.len() - 1], &flags[..flags.len() - 1])
        } else {
            // A contour of only off-curve points opens at the implied
            // midpoint of its first and last.
            (midpoint(first, last), points, flags)
        }
    };
    rasterizer.start(start);
    let (mut q0, mut on0) = (start, true);
    for (p, p_flags) in others.iter().zip(others_flags) {
        let q = place(*p);
        let on = p_flags.is_on_curve();
        if on {
            if on0 {
                rasterizer.add1(q);
            } else {
                rasterizer.add2(q0, q);
            }
        } else if !on0 {
            rasterizer.add2(q0, midpoint(q0, q));
        }
        (q0, on0) = (q, on);
    }
    // Close the curve.
    if on0 {
        rasterizer.add1(start);
    } else {
        rasterizer.add2(q0, start);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use font_fixtures::sample;

    fn sample_font() -> Font {
        Font::parse(sample::build()).unwrap()
    }

    fn dot(x: i32, y: i32) -> Point<F26Dot6> {
        Point::new(F26Dot6::from_bits(x), F26Dot6::from_bits(y))
    }

    #[test]
    fn default_options_give_twelve_pixels() {
        let font = sample_font();
        let face = Face::new(&font, FaceOptions::default());
        assert_eq!(face.scale().to_bits(), 12 << 6);
    }

    #[test]
    fn renders_a_mask() {
        let font = sample_font();
        let mut face = Face::new(&font, FaceOptions::default());
        let rendered = face.glyph(dot(0, 12 << 6), 'A').unwrap();
        assert!(rendered.width > 0 && rendered.height > 0);
        // The advance carries the dot forward.
        let advance = rendered.new_dot.x.to_bits();
        assert_eq!(advance, 512); // 1366 FUnits at 12 ppem over 2048
        let mask = rendered.mask;
        let covered: u32 = mask.as_bytes().iter().map(|&a| a as u32).sum();
        assert!(covered > 0, "the glyph must produce coverage");
    }

    #[test]
    fn unmapped_character_renders_empty_notdef() {
        let font = sample_font();
        let mut face = Face::new(&font, FaceOptions::default());
        let rendered = face.glyph(dot(0, 0), 'x').unwrap();
        // Glyph 0 in the fixture is empty: no coverage, but a real
        // advance.
        assert_eq!(rendered.new_dot.x.to_bits(), 225); // 600 FUnits
        assert!(rendered.mask.as_bytes().iter().all(|&a| a == 0));
    }

    #[test]
    fn sub_pixel_quantization_buckets() {
        let font = sample_font();
        let mut face = Face::new(&font, FaceOptions::default());
        // One quantum at four sub-pixels is 16/64ths; anything inside
        // the same bucket produces an identical mask.
        let first = face.glyph(dot(0, 0), 'A').unwrap().mask.as_bytes().to_vec();
        let same = face.glyph(dot(0x07, 0), 'A').unwrap().mask.as_bytes().to_vec();
        assert_eq!(first, same);
        let next = face.glyph(dot(0x10, 0), 'A').unwrap().mask.as_bytes().to_vec();
        assert_ne!(first, next, "next bucket must shift coverage");
    }

    #[test]
    fn kerning_rounds_under_hinting() {
        let font = sample_font();
        let face = Face::new(&font, FaceOptions::default());
        // -144 FUnits at 12 ppem over a 2048 em.
        assert_eq!(face.kern('A', 'V').to_bits(), -54);
        assert_eq!(face.kern('V', 'A').to_bits(), 0);
        let hinted = Face::new(
            &font,
            FaceOptions {
                hinting: crate::Hinting::Full,
                ..Default::default()
            },
        );
        assert_eq!(hinted.kern('A', 'V').to_bits(), -64);
    }

    #[test]
    fn bounds_and_advance() {
        let font = sample_font();
        let mut face = Face::new(&font, FaceOptions::default());
        let (bounds, advance) = face.glyph_bounds('A').unwrap();
        // Raster space: y_min is the flipped top of the glyph.
        assert!(bounds.y_min < F26Dot6::ZERO);
        assert_eq!(bounds.y_max, F26Dot6::ZERO);
        assert_eq!(advance, face.glyph_advance('A').unwrap());
    }

    #[test]
    fn invalid_sub_pixel_counts_fall_back() {
        let font = sample_font();
        let mut face = Face::new(
            &font,
            FaceOptions {
                sub_pixels_x: 5,
                sub_pixels_y: 3,
                ..Default::default()
            },
        );
        assert_eq!(face.sub_pixel_bias_x, 8);
        assert_eq!(face.sub_pixel_mask_x, -16);
        assert_eq!(face.sub_pixel_bias_y, 32);
        assert_eq!(face.sub_pixel_mask_y, -64);
        // And the face still renders.
        assert!(face.glyph(dot(0, 0), 'A').is_some());
    }

    #[test]
    fn hinted_rendering_matches_hinted_outline() {
        let font = sample_font();
        let mut face = Face::new(
            &font,
            FaceOptions {
                hinting: crate::Hinting::Full,
                ..Default::default()
            },
        );
        let rendered = face.glyph(dot(0, 12 << 6), 'V').unwrap();
        // The hinted advance is grid-rounded: 488 rounds to 512.
        assert_eq!(rendered.new_dot.x.to_bits(), 512);
        assert!(rendered.width > 0);
        // Vertical hinting maps to full hinting.
        let mut vertical = Face::new(
            &font,
            FaceOptions {
                hinting: crate::Hinting::Vertical,
                ..Default::default()
            },
        );
        assert_eq!(
            vertical.glyph(dot(0, 12 << 6), 'V').unwrap().new_dot.x.to_bits(),
            512
        );
    }
}
