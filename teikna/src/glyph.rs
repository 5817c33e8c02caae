//! Glyph outline loading.
//!
//! [`GlyphBuf`] materializes one glyph's contours from the `glyf`
//! table: simple glyphs are decoded and scaled, composite glyphs
//! compose their transformed children recursively, and the four
//! phantom points carrying the glyph's metrics are appended, exposed
//! to the hinter, then stripped again before the outline is handed to
//! the rasterizer.

use raw::{
    tables::glyf::{
        self, Component, CompositeGlyph, Glyph, PointFlags, PointMarker, SimpleGlyph,
    },
    units::{BBox, F26Dot6, GlyphId, Point},
    Font, ReadError,
};

use crate::{
    hint::{GlyphZoneData, Hinter},
    Error, COMPOSITE_RECURSION_LIMIT,
};

/// A reusable buffer holding one loaded glyph.
///
/// All vectors are cleared, never shrunk, on [`load`](Self::load), so a
/// buffer reused across glyphs settles at the size of the largest one.
#[derive(Default)]
pub struct GlyphBuf {
    /// The glyph's bounding box in scaled 26.6 pixels. Hinting may
    /// move points, in which case this is recomputed from the outline.
    pub bounds: BBox<F26Dot6>,
    /// The outline points, possibly hinted.
    pub points: Vec<Point<F26Dot6>>,
    /// Per-point on-curve and touch flags, parallel to `points`.
    pub flags: Vec<PointFlags>,
    /// Cumulative end indices: contour `i` is
    /// `points[ends[i-1]..ends[i]]`, with an implied leading zero.
    pub ends: Vec<usize>,
    /// The advance width, measured between the hinted phantom points.
    pub advance_width: F26Dot6,
    /// Scaled but unhinted coordinates; populated only when a hinter
    /// is active.
    pub unhinted: Vec<Point<F26Dot6>>,
    /// Raw font unit coordinates; populated only when a hinter is
    /// active.
    pub in_font_units: Vec<Point<i32>>,
    // Decode scratch, reused across glyphs and components.
    unscaled: Vec<Point<i32>>,
    rel_ends: Vec<usize>,
    composite_unhinted: Vec<Point<F26Dot6>>,
    composite_in_font_units: Vec<Point<i32>>,
}

impl GlyphBuf {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a glyph at the given scale (pixels per em in 26.6),
    /// running its hinting programs when a hinter is supplied.
    pub fn load(
        &mut self,
        font: &Font,
        scale: F26Dot6,
        glyph_id: GlyphId,
        mut hinter: Option<&mut Hinter>,
    ) -> Result<(), Error> {
        self.points.clear();
        self.flags.clear();
        self.ends.clear();
        self.unhinted.clear();
        self.in_font_units.clear();
        self.advance_width = F26Dot6::ZERO;
        self.bounds = BBox::default();
        if glyph_id.to_u16() >= font.num_glyphs() {
            return Err(Error::GlyphNotFound(glyph_id));
        }
        if let Some(h) = hinter.as_deref_mut() {
            h.init(font, scale)?;
        }
        let hinting = hinter.is_some();
        let phantom = self.load_glyph(font, scale, glyph_id, &mut hinter, 0)?;
        // Shift the outline so the left side bearing sits at the
        // origin.
        let shift = phantom[0].x;
        if shift != F26Dot6::ZERO {
            for p in &mut self.points {
                p.x -= shift;
            }
        }
        self.advance_width = phantom[1].x - phantom[0].x;
        if hinting {
            // Hinting may have moved points beyond the header box.
            self.bounds = outline_bounds(&self.points);
        } else {
            self.bounds.x_min -= shift;
            self.bounds.x_max -= shift;
        }
        Ok(())
    }

    fn load_glyph(
        &mut self,
        font: &Font,
        scale: F26Dot6,
        glyph_id: GlyphId,
        hinter: &mut Option<&mut Hinter>,
        depth: usize,
    ) -> Result<[Point<F26Dot6>; 4], Error> {
        if depth > COMPOSITE_RECURSION_LIMIT {
            return Err(Error::RecursionLimitExceeded(glyph_id));
        }
        let data = font.glyph_data(glyph_id)?;
        let glyph = data.map(Glyph::read).transpose()?;
        let raw_bounds = match &glyph {
            Some(glyph) => [
                glyph.x_min()? as i32,
                glyph.y_min()? as i32,
                glyph.x_max()? as i32,
                glyph.y_max()? as i32,
            ],
            None => [0; 4],
        };
        let phantom = self.phantom_in_font_units(font, glyph_id, &raw_bounds);
        if depth == 0 {
            self.bounds = BBox::new(
                font.scale(scale, raw_bounds[0]),
                font.scale(scale, raw_bounds[1]),
                font.scale(scale, raw_bounds[2]),
                font.scale(scale, raw_bounds[3]),
            );
        }
        match glyph {
            None => Ok(self.load_empty(font, scale, phantom, hinter.is_some())),
            Some(Glyph::Simple(simple)) => {
                self.load_simple(font, scale, &simple, phantom, hinter)
            }
            Some(Glyph::Composite(composite)) => {
                self.load_composite(font, scale, &composite, phantom, hinter, depth)
            }
        }
    }

    /// The four phantom points in font units: the horizontal metric
    /// anchors followed by the vertical ones.
    fn phantom_in_font_units(
        &self,
        font: &Font,
        glyph_id: GlyphId,
        bounds: &[i32; 4],
    ) -> [Point<i32>; 4] {
        let hm = font.h_metric_unscaled(glyph_id);
        let vm = font.v_metric_unscaled(glyph_id, bounds[3]);
        [
            Point::new(bounds[0] - hm.left_side_bearing, 0),
            Point::new(bounds[0] - hm.left_side_bearing + hm.advance_width, 0),
            Point::new(hm.advance_width / 2, bounds[3] + vm.top_side_bearing),
            Point::new(
                hm.advance_width / 2,
                bounds[3] + vm.top_side_bearing - vm.advance_height,
            ),
        ]
    }

    fn scale_phantom(
        &self,
        font: &Font,
        scale: F26Dot6,
        phantom: [Point<i32>; 4],
    ) -> [Point<F26Dot6>; 4] {
        phantom.map(|p| Point::new(font.scale(scale, p.x), font.scale(scale, p.y)))
    }

    /// An empty glyph still carries metrics: its phantom points are
    /// produced (and grid-fitted under hinting) without any outline.
    fn load_empty(
        &mut self,
        font: &Font,
        scale: F26Dot6,
        phantom: [Point<i32>; 4],
        hinting: bool,
    ) -> [Point<F26Dot6>; 4] {
        let mut phantom = self.scale_phantom(font, scale, phantom);
        if hinting {
            let dx = phantom[0].x.round() - phantom[0].x;
            if dx != F26Dot6::ZERO {
                for p in &mut phantom {
                    p.x += dx;
                }
            }
            phantom[1].x = phantom[1].x.round();
            phantom[3].y = phantom[3].y.round();
        }
        phantom
    }

    fn load_simple(
        &mut self,
        font: &Font,
        scale: F26Dot6,
        simple: &SimpleGlyph,
        phantom: [Point<i32>; 4],
        hinter: &mut Option<&mut Hinter>,
    ) -> Result<[Point<F26Dot6>; 4], Error> {
        let point_base = self.points.len();
        let contour_base = self.ends.len();
        let mut prev_end = 0usize;
        for end in simple.end_pts_of_contours()? {
            let end = end as usize + 1;
            if end <= prev_end {
                return Err(ReadError::MalformedData("descending contour ends").into());
            }
            prev_end = end;
            self.ends.push(point_base + end);
        }
        let num_points = simple.num_points()?;
        self.unscaled.clear();
        self.unscaled.resize(num_points, Point::default());
        self.flags
            .resize(point_base + num_points, PointFlags::default());
        simple.read_points(&mut self.unscaled, &mut self.flags[point_base..])?;
        let program = simple.instructions()?;
        for p in phantom {
            self.unscaled.push(p);
            self.flags.push(PointFlags::default());
        }
        let hinting = hinter.is_some();
        if hinting {
            // The interpreter measures original distances in font
            // units for this glyph's points, phantoms included.
            self.in_font_units.extend_from_slice(&self.unscaled);
        }
        self.points.extend(
            self.unscaled
                .iter()
                .map(|p| Point::new(font.scale(scale, p.x), font.scale(scale, p.y))),
        );
        if hinting {
            // Round the first phantom point to the grid and shift the
            // whole glyph equally, putting the left side bearing on a
            // pixel boundary.
            let pp1x = self.points[self.points.len() - 4].x;
            let dx = pp1x.round() - pp1x;
            if dx != F26Dot6::ZERO {
                for p in &mut self.points[point_base..] {
                    p.x += dx;
                }
            }
            self.unhinted.extend_from_slice(&self.points[point_base..]);
            let len = self.points.len();
            self.points[len - 3].x = self.points[len - 3].x.round();
            self.points[len - 1].y = self.points[len - 1].y.round();
            if !program.is_empty() {
                self.rel_ends.clear();
                self.rel_ends
                    .extend(self.ends[contour_base..].iter().map(|e| e - point_base));
                let unhinted_base = self.unhinted.len() - (len - point_base);
                let in_funits_base = self.in_font_units.len() - (len - point_base);
                let mut zone = GlyphZoneData {
                    current: &mut self.points[point_base..],
                    unhinted: &mut self.unhinted[unhinted_base..],
                    in_font_units: &mut self.in_font_units[in_funits_base..],
                    flags: &mut self.flags[point_base..],
                    ends: &self.rel_ends,
                };
                if let Some(h) = hinter.as_deref_mut() {
                    h.run_glyph(font, scale, program, &mut zone)?;
                }
            }
            self.unhinted.truncate(self.unhinted.len() - 4);
            self.in_font_units.truncate(self.in_font_units.len() - 4);
        }
        Ok(self.pop_phantom())
    }

    fn load_composite(
        &mut self,
        font: &Font,
        scale: F26Dot6,
        composite: &CompositeGlyph,
        phantom: [Point<i32>; 4],
        hinter: &mut Option<&mut Hinter>,
        depth: usize,
    ) -> Result<[Point<F26Dot6>; 4], Error> {
        let point_base = self.points.len();
        let contour_base = self.ends.len();
        let mut phantom = self.scale_phantom(font, scale, phantom);
        for component in composite.components() {
            let component = component?;
            let child_base = self.points.len();
            let child_phantom =
                self.load_glyph(font, scale, component.glyph, hinter, depth + 1)?;
            if component.flags & glyf::USE_MY_METRICS != 0 {
                phantom = child_phantom;
            }
            self.place_component(font, scale, &component, child_base);
        }
        let hinting = hinter.is_some();
        let program = if hinting {
            composite.instructions()?
        } else {
            &[]
        };
        if !program.is_empty() {
            // The composite program hints the already-hinted component
            // outlines: clear their touch markers and re-expose the
            // phantom points.
            for flags in &mut self.flags[point_base..] {
                flags.clear_marker(PointMarker::TOUCHED);
            }
            for p in phantom {
                self.points.push(p);
                self.flags.push(PointFlags::default());
            }
            self.composite_unhinted.clear();
            self.composite_unhinted
                .extend_from_slice(&self.points[point_base..]);
            self.composite_in_font_units.clear();
            self.composite_in_font_units.extend(
                self.points[point_base..]
                    .iter()
                    .map(|p| p.map(F26Dot6::to_bits)),
            );
            self.rel_ends.clear();
            self.rel_ends
                .extend(self.ends[contour_base..].iter().map(|e| e - point_base));
            let mut zone = GlyphZoneData {
                current: &mut self.points[point_base..],
                unhinted: &mut self.composite_unhinted,
                in_font_units: &mut self.composite_in_font_units,
                flags: &mut self.flags[point_base..],
                ends: &self.rel_ends,
            };
            if let Some(h) = hinter.as_deref_mut() {
                h.run_glyph(font, scale, program, &mut zone)?;
            }
            phantom = self.pop_phantom();
        }
        Ok(phantom)
    }

    /// Applies a component's transform and scaled offset to its
    /// freshly appended points.
    fn place_component(
        &mut self,
        font: &Font,
        scale: F26Dot6,
        component: &Component,
        child_base: usize,
    ) {
        if let Some(t) = component.transform {
            for p in &mut self.points[child_base..] {
                let x = p.x.to_bits() as i64;
                let y = p.y.to_bits() as i64;
                let nx = (x * t[0].to_bits() as i64 + y * t[2].to_bits() as i64) >> 14;
                let ny = (x * t[1].to_bits() as i64 + y * t[3].to_bits() as i64) >> 14;
                *p = Point::new(F26Dot6::from_bits(nx as i32), F26Dot6::from_bits(ny as i32));
            }
        }
        let mut dx = font.scale(scale, component.dx);
        let mut dy = font.scale(scale, component.dy);
        if component.flags & glyf::ROUND_XY_TO_GRID != 0 {
            dx = dx.round();
            dy = dy.round();
        }
        if dx != F26Dot6::ZERO || dy != F26Dot6::ZERO {
            let offset = Point::new(dx, dy);
            for p in &mut self.points[child_base..] {
                *p += offset;
            }
        }
    }

    /// Removes the trailing phantom points from the outline and
    /// returns them.
    fn pop_phantom(&mut self) -> [Point<F26Dot6>; 4] {
        let len = self.points.len();
        let phantom = [
            self.points[len - 4],
            self.points[len - 3],
            self.points[len - 2],
            self.points[len - 1],
        ];
        self.points.truncate(len - 4);
        self.flags.truncate(len - 4);
        phantom
    }
}

fn outline_bounds(points: &[Point<F26Dot6>]) -> BBox<F26Dot6> {
    let Some(first) = points.first() else {
        return BBox::default();
    };
    let mut bounds = BBox::new(first.x, first.y, first.x, first.y);
    for p in &points[1..] {
        bounds.x_min = bounds.x_min.min(p.x);
        bounds.y_min = bounds.y_min.min(p.y);
        bounds.x_max = bounds.x_max.max(p.x);
        bounds.y_max = bounds.y_max.max(p.y);
    }
    bounds
}
