//! Cell-based analytic area accumulation.

use font_units::{F26Dot6, Point};

use crate::paint::{Painter, Span};

/// How the sweep decides whether a winding count is inside the outline.
#[derive(Copy, Clone, PartialEq, Eq, Default, Debug)]
pub enum Winding {
    /// Any non-zero winding count is inside.
    #[default]
    NonZero,
    /// Odd winding counts are inside.
    EvenOdd,
}

/// One pixel's accumulators: the signed edge height crossing the cell
/// and twice the signed sub-pixel area between the cell's left border
/// and the edge.
#[derive(Copy, Clone, Default, PartialEq, Eq)]
struct Cell {
    cover: i32,
    area: i32,
}

/// Coverage is tracked per cell at 64 sub-pixels of height times 128
/// half-sub-pixels of width.
const FULL_COVERAGE: i32 = 64 * 128;

/// The number of spans buffered before a batch is flushed to the
/// painter.
const SPAN_BATCH: usize = 64;

/// An analytic-area scan converter.
///
/// Feed it a path with [`start`](Self::start), [`add1`](Self::add1) and
/// [`add2`](Self::add2), then call [`rasterize`](Self::rasterize) to
/// sweep the accumulated coverage into spans. The cell grid is sized by
/// [`set_bounds`](Self::set_bounds) and reset, without reallocating, by
/// [`clear`](Self::clear).
pub struct Rasterizer {
    width: usize,
    height: usize,
    winding: Winding,
    cells: Vec<Cell>,
    /// Per-row touched range, `(min, max)` inclusive; min > max means
    /// untouched.
    touched: Vec<(i32, i32)>,
    /// The current pen location in 26.6.
    pen: Point<i32>,
    spans: Vec<Span>,
}

impl Default for Rasterizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Rasterizer {
    pub fn new() -> Self {
        Self {
            width: 0,
            height: 0,
            winding: Winding::NonZero,
            cells: Vec::new(),
            touched: Vec::new(),
            pen: Point::new(0, 0),
            spans: Vec::with_capacity(SPAN_BATCH),
        }
    }

    /// Selects the fill rule used by the sweep.
    pub fn set_winding(&mut self, winding: Winding) {
        self.winding = winding;
    }

    /// Sizes the cell grid for a `width` by `height` pixel canvas and
    /// clears it.
    pub fn set_bounds(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.cells.clear();
        self.cells.resize(width * height, Cell::default());
        self.touched.clear();
        self.touched.resize(height, (i32::MAX, i32::MIN));
        self.pen = Point::new(0, 0);
    }

    /// Resets the accumulated coverage without reallocating.
    pub fn clear(&mut self) {
        for (y, range) in self.touched.iter_mut().enumerate() {
            let (min, max) = *range;
            if min <= max {
                let row = y * self.width;
                for cell in &mut self.cells[row + min as usize..=row + max as usize] {
                    *cell = Cell::default();
                }
            }
            *range = (i32::MAX, i32::MIN);
        }
        self.pen = Point::new(0, 0);
    }

    /// Starts a new contour at `p`.
    pub fn start(&mut self, p: Point<F26Dot6>) {
        self.pen = p.map(F26Dot6::to_bits);
    }

    /// Adds a linear segment from the pen to `b`.
    pub fn add1(&mut self, b: Point<F26Dot6>) {
        let b = b.map(F26Dot6::to_bits);
        self.render_line(self.pen, b);
        self.pen = b;
    }

    /// Adds a quadratic segment with control point `b` ending at `c`.
    pub fn add2(&mut self, b: Point<F26Dot6>, c: Point<F26Dot6>) {
        let b = b.map(F26Dot6::to_bits);
        let c = c.map(F26Dot6::to_bits);
        self.render_quad(self.pen, b, c, 0);
        self.pen = c;
    }

    /// Adds a cubic segment with control points `b` and `c` ending at
    /// `d`. TrueType outlines never produce cubics; this exists for
    /// callers tracing other outline sources through the same sink.
    pub fn add3(&mut self, b: Point<F26Dot6>, c: Point<F26Dot6>, d: Point<F26Dot6>) {
        let b = b.map(F26Dot6::to_bits);
        let c = c.map(F26Dot6::to_bits);
        let d = d.map(F26Dot6::to_bits);
        self.render_cubic(self.pen, b, c, d, 0);
        self.pen = d;
    }

    /// Sweeps the accumulated cells into spans, flushed to `painter` in
    /// y-monotonic batches. A trailing batch with `done == true` signals
    /// completion.
    pub fn rasterize<P: Painter>(&mut self, painter: &mut P) {
        for y in 0..self.height {
            let (min, max) = self.touched[y];
            if min > max {
                continue;
            }
            let row = y * self.width;
            let mut cover = 0i32;
            let mut run: Option<(i32, u32)> = None; // (start x, alpha)
            for x in min..=max {
                let cell = self.cells[row + x as usize];
                cover += cell.cover;
                let alpha = self.coverage_to_alpha(cover * 128 - cell.area);
                match run {
                    Some((_, a)) if a == alpha => {}
                    Some((x0, a)) => {
                        if a > 0 {
                            self.spans.push(Span {
                                y: y as i32,
                                x0,
                                x1: x,
                                alpha: a,
                            });
                        }
                        run = Some((x, alpha));
                    }
                    None => run = Some((x, alpha)),
                }
                if self.spans.len() >= SPAN_BATCH {
                    painter.paint(&self.spans, false);
                    self.spans.clear();
                }
            }
            if let Some((x0, a)) = run {
                if a > 0 {
                    self.spans.push(Span {
                        y: y as i32,
                        x0,
                        x1: max + 1,
                        alpha: a,
                    });
                }
            }
        }
        painter.paint(&self.spans, true);
        self.spans.clear();
    }

    fn coverage_to_alpha(&self, coverage: i32) -> u32 {
        let clamped = match self.winding {
            Winding::NonZero => coverage.abs().min(FULL_COVERAGE),
            Winding::EvenOdd => {
                let folded = coverage.rem_euclid(2 * FULL_COVERAGE);
                if folded > FULL_COVERAGE {
                    2 * FULL_COVERAGE - folded
                } else {
                    folded
                }
            }
        };
        let alpha16 = (clamped as u32 * 0xffff) / FULL_COVERAGE as u32;
        alpha16 << 16 | alpha16
    }

    fn cell_add(&mut self, ex: i32, ey: i32, cover: i32, area: i32) {
        debug_assert!(ex >= 0 && (ex as usize) < self.width);
        debug_assert!(ey >= 0 && (ey as usize) < self.height);
        let cell = &mut self.cells[ey as usize * self.width + ex as usize];
        cell.cover += cover;
        cell.area += area;
        let range = &mut self.touched[ey as usize];
        range.0 = range.0.min(ex);
        range.1 = range.1.max(ex);
    }

    /// Accumulates a line, clipping it to the canvas.
    fn render_line(&mut self, p0: Point<i32>, p1: Point<i32>) {
        let (mut x0, mut y0) = (p0.x, p0.y);
        let (mut x1, mut y1) = (p1.x, p1.y);
        if y0 == y1 {
            return;
        }
        let h64 = (self.height as i32) << 6;
        if y0.max(y1) <= 0 || y0.min(y1) >= h64 {
            return;
        }
        // Clip vertically, interpolating x at the crossing.
        if y0 < 0 {
            x0 += mul_div(x1 - x0, -y0, y1 - y0);
            y0 = 0;
        } else if y0 > h64 {
            x0 += mul_div(x1 - x0, h64 - y0, y1 - y0);
            y0 = h64;
        }
        if y1 < 0 {
            x1 += mul_div(x0 - x1, -y1, y0 - y1);
            y1 = 0;
        } else if y1 > h64 {
            x1 += mul_div(x0 - x1, h64 - y1, y0 - y1);
            y1 = h64;
        }
        if y0 == y1 {
            return;
        }
        // Walk the rows the segment crosses, splitting it at each
        // horizontal grid boundary.
        let (mut x, mut y) = (x0, y0);
        if y1 > y0 {
            let mut ey = y0 >> 6;
            while (ey + 1) << 6 < y1 {
                let yb = (ey + 1) << 6;
                let xb = x0 + mul_div(x1 - x0, yb - y0, y1 - y0);
                self.render_scanline(ey, x, y, xb, yb);
                x = xb;
                y = yb;
                ey += 1;
            }
            self.render_scanline((y1 - 1) >> 6, x, y, x1, y1);
        } else {
            let mut ey = (y0 - 1) >> 6;
            while ey << 6 > y1 {
                let yb = ey << 6;
                let xb = x0 + mul_div(x1 - x0, yb - y0, y1 - y0);
                self.render_scanline(ey, x, y, xb, yb);
                x = xb;
                y = yb;
                ey -= 1;
            }
            self.render_scanline(y1 >> 6, x, y, x1, y1);
        }
    }

    /// Accumulates a segment confined to row `ey`, splitting it at each
    /// vertical cell boundary and clamping x to the canvas.
    fn render_scanline(&mut self, ey: i32, x0: i32, y0: i32, x1: i32, y1: i32) {
        if y0 == y1 || ey < 0 || ey as usize >= self.height {
            return;
        }
        let w64 = (self.width as i32) << 6;
        let x0 = x0.clamp(0, w64);
        let x1 = x1.clamp(0, w64);
        let cell_of = |x: i32| (x >> 6).min(self.width as i32 - 1);
        let (ex0, ex1) = (cell_of(x0), cell_of(x1));
        if ex0 == ex1 {
            let fx = x0 + x1 - ex0 * 128;
            self.cell_add(ex0, ey, y1 - y0, (y1 - y0) * fx);
            return;
        }
        // Split at each vertical boundary, interpolating y.
        let (mut x, mut y) = (x0, y0);
        if x1 > x0 {
            let mut ex = ex0;
            while ex < ex1 {
                let xb = (ex + 1) << 6;
                let yb = y0 + mul_div(y1 - y0, xb - x0, x1 - x0);
                let fx = x + xb - ex * 128;
                self.cell_add(ex, ey, yb - y, (yb - y) * fx);
                x = xb;
                y = yb;
                ex += 1;
            }
        } else {
            let mut ex = ex0;
            while ex > ex1 {
                let xb = ex << 6;
                let yb = y0 + mul_div(y1 - y0, xb - x0, x1 - x0);
                let fx = x + xb - ex * 128;
                self.cell_add(ex, ey, yb - y, (yb - y) * fx);
                x = xb;
                y = yb;
                ex -= 1;
            }
        }
        let fx = x + x1 - ex1 * 128;
        self.cell_add(ex1, ey, y1 - y, (y1 - y) * fx);
    }

    fn render_quad(&mut self, a: Point<i32>, b: Point<i32>, c: Point<i32>, depth: u32) {
        // The second difference bounds the curve's deviation from the
        // chord; subdividing quarters it.
        let dev_x = (a.x - 2 * b.x + c.x).abs();
        let dev_y = (a.y - 2 * b.y + c.y).abs();
        if depth >= 16 || dev_x.max(dev_y) <= 4 {
            self.render_line(a, c);
            return;
        }
        let ab = midpoint(a, b);
        let bc = midpoint(b, c);
        let mid = midpoint(ab, bc);
        self.render_quad(a, ab, mid, depth + 1);
        self.render_quad(mid, bc, c, depth + 1);
    }

    fn render_cubic(&mut self, a: Point<i32>, b: Point<i32>, c: Point<i32>, d: Point<i32>, depth: u32) {
        let dev1 = ((a.x - 2 * b.x + c.x).abs()).max((a.y - 2 * b.y + c.y).abs());
        let dev2 = ((b.x - 2 * c.x + d.x).abs()).max((b.y - 2 * c.y + d.y).abs());
        if depth >= 16 || dev1.max(dev2) <= 4 {
            self.render_line(a, d);
            return;
        }
        let ab = midpoint(a, b);
        let bc = midpoint(b, c);
        let cd = midpoint(c, d);
        let abc = midpoint(ab, bc);
        let bcd = midpoint(bc, cd);
        let mid = midpoint(abc, bcd);
        self.render_cubic(a, ab, abc, mid, depth + 1);
        self.render_cubic(mid, bcd, cd, d, depth + 1);
    }
}

fn midpoint(a: Point<i32>, b: Point<i32>) -> Point<i32> {
    Point::new((a.x + b.x) / 2, (a.y + b.y) / 2)
}

/// `a * b / c` widened through 64 bits. `c` is never zero at the call
/// sites: it is the non-degenerate extent of a clipped segment.
fn mul_div(a: i32, b: i32, c: i32) -> i32 {
    ((a as i64 * b as i64) / c as i64) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paint::{AlphaSrcPainter, Mask};

    fn point(x: i32, y: i32) -> Point<F26Dot6> {
        Point::new(F26Dot6::from_bits(x), F26Dot6::from_bits(y))
    }

    fn rasterize_into(r: &mut Rasterizer, mask: &mut Mask) {
        mask.clear();
        let mut painter = AlphaSrcPainter::new(mask);
        r.rasterize(&mut painter);
    }

    /// A pixel-aligned square: every interior pixel fully opaque,
    /// everything outside untouched.
    #[test]
    fn aligned_square() {
        let mut r = Rasterizer::new();
        r.set_bounds(4, 4);
        r.start(point(64, 64));
        r.add1(point(192, 64));
        r.add1(point(192, 192));
        r.add1(point(64, 192));
        r.add1(point(64, 64));
        let mut mask = Mask::new(4, 4);
        rasterize_into(&mut r, &mut mask);
        for y in 0..4 {
            for x in 0..4 {
                let expected = if (1..3).contains(&x) && (1..3).contains(&y) {
                    255
                } else {
                    0
                };
                assert_eq!(mask.pixel(x, y), expected, "pixel ({x}, {y})");
            }
        }
    }

    /// A square shifted half a pixel right covers its boundary columns
    /// half each.
    #[test]
    fn half_pixel_offset() {
        let mut r = Rasterizer::new();
        r.set_bounds(4, 3);
        r.start(point(96, 64));
        r.add1(point(224, 64));
        r.add1(point(224, 128));
        r.add1(point(96, 128));
        r.add1(point(96, 64));
        let mut mask = Mask::new(4, 3);
        rasterize_into(&mut r, &mut mask);
        assert_eq!(mask.pixel(0, 1), 0);
        assert_eq!(mask.pixel(1, 1), 127);
        assert_eq!(mask.pixel(2, 1), 255);
        assert_eq!(mask.pixel(3, 1), 127);
    }

    /// Winding direction does not matter under the non-zero rule, and
    /// rasterizing twice after a clear is bit-identical.
    #[test]
    fn idempotent_after_clear() {
        let mut r = Rasterizer::new();
        r.set_bounds(8, 8);
        let trace = |r: &mut Rasterizer| {
            r.start(point(40, 30));
            r.add1(point(470, 30));
            r.add2(point(510, 250), point(470, 460));
            r.add1(point(40, 460));
            r.add1(point(40, 30));
        };
        trace(&mut r);
        let mut first = Mask::new(8, 8);
        rasterize_into(&mut r, &mut first);
        r.clear();
        trace(&mut r);
        let mut second = Mask::new(8, 8);
        rasterize_into(&mut r, &mut second);
        assert_eq!(first.as_bytes(), second.as_bytes());
        assert!(first.as_bytes().iter().any(|&a| a == 255));
    }

    /// An inner contour wound the opposite way produces a hole under
    /// the non-zero rule.
    #[test]
    fn inner_contour_is_hole() {
        let mut r = Rasterizer::new();
        r.set_bounds(10, 10);
        // Outer square, clockwise in raster space.
        r.start(point(64, 64));
        r.add1(point(576, 64));
        r.add1(point(576, 576));
        r.add1(point(64, 576));
        r.add1(point(64, 64));
        // Inner square, counter-clockwise.
        r.start(point(192, 192));
        r.add1(point(192, 448));
        r.add1(point(448, 448));
        r.add1(point(448, 192));
        r.add1(point(192, 192));
        let mut mask = Mask::new(10, 10);
        rasterize_into(&mut r, &mut mask);
        assert_eq!(mask.pixel(2, 2), 255);
        assert_eq!(mask.pixel(5, 5), 0, "hole interior must be empty");
        assert_eq!(mask.pixel(8, 8), 255);
    }

    /// Under even-odd the same-direction inner contour still becomes a
    /// hole; under non-zero it does not.
    #[test]
    fn even_odd_rule() {
        let trace = |r: &mut Rasterizer| {
            r.start(point(64, 64));
            r.add1(point(576, 64));
            r.add1(point(576, 576));
            r.add1(point(64, 576));
            r.add1(point(64, 64));
            r.start(point(192, 192));
            r.add1(point(448, 192));
            r.add1(point(448, 448));
            r.add1(point(192, 448));
            r.add1(point(192, 192));
        };
        let mut r = Rasterizer::new();
        r.set_bounds(10, 10);
        r.set_winding(Winding::EvenOdd);
        trace(&mut r);
        let mut mask = Mask::new(10, 10);
        rasterize_into(&mut r, &mut mask);
        assert_eq!(mask.pixel(5, 5), 0);
        let mut r = Rasterizer::new();
        r.set_bounds(10, 10);
        trace(&mut r);
        rasterize_into(&mut r, &mut mask);
        assert_eq!(mask.pixel(5, 5), 255);
    }

    /// Spans stay within the canvas even when the outline does not.
    #[test]
    fn clipped_outline() {
        struct BoundsCheck {
            w: i32,
            h: i32,
        }
        impl Painter for BoundsCheck {
            fn paint(&mut self, spans: &[Span], _done: bool) {
                for s in spans {
                    assert!(0 <= s.x0 && s.x0 < s.x1 && s.x1 <= self.w, "{s:?}");
                    assert!(0 <= s.y && s.y < self.h, "{s:?}");
                }
            }
        }
        let mut r = Rasterizer::new();
        r.set_bounds(4, 4);
        r.start(point(-300, -300));
        r.add1(point(500, -100));
        r.add1(point(500, 500));
        r.add1(point(-300, 500));
        r.add1(point(-300, -300));
        let mut check = BoundsCheck { w: 4, h: 4 };
        r.rasterize(&mut check);
    }

    /// Rasterizing through a gamma of one is the identity; a gamma of
    /// two darkens every partial-coverage pixel.
    #[test]
    fn gamma_correction_on_rounded_outline() {
        use crate::paint::GammaPainter;
        let trace = |r: &mut Rasterizer| {
            // A square with one rounded corner, for a spread of
            // partial coverage values.
            r.start(point(32, 96));
            r.add2(point(32, 32), point(96, 32));
            r.add1(point(224, 32));
            r.add1(point(224, 224));
            r.add1(point(32, 224));
            r.add1(point(32, 96));
        };
        let render = |gamma: f64| -> Vec<u8> {
            let mut r = Rasterizer::new();
            r.set_bounds(4, 4);
            trace(&mut r);
            let mut mask = Mask::new(4, 4);
            let mut painter = GammaPainter::new(AlphaSrcPainter::new(&mut mask), gamma);
            r.rasterize(&mut painter);
            drop(painter);
            mask.as_bytes().to_vec()
        };
        let plain = {
            let mut r = Rasterizer::new();
            r.set_bounds(4, 4);
            trace(&mut r);
            let mut mask = Mask::new(4, 4);
            let mut painter = AlphaSrcPainter::new(&mut mask);
            r.rasterize(&mut painter);
            mask.as_bytes().to_vec()
        };
        assert_eq!(render(1.0), plain);
        let darkened = render(2.0);
        assert!(darkened
            .iter()
            .zip(&plain)
            .all(|(&dark, &orig)| dark <= orig));
        assert!(darkened
            .iter()
            .zip(&plain)
            .any(|(&dark, &orig)| orig != 0 && orig != 255 && dark < orig));
    }

    /// A quadratic's coverage is bounded by its control polygon: the
    /// area under the curve sits between the chord's and the polygon's.
    #[test]
    fn quad_coverage_between_chord_and_polygon() {
        let area_of = |with_quad: bool| -> u32 {
            let mut r = Rasterizer::new();
            r.set_bounds(4, 4);
            r.start(point(0, 0));
            if with_quad {
                r.add2(point(256, 0), point(256, 256));
            } else {
                r.add1(point(256, 256));
            }
            r.add1(point(0, 256));
            r.add1(point(0, 0));
            let mut mask = Mask::new(4, 4);
            mask.clear();
            let mut painter = AlphaSrcPainter::new(&mut mask);
            r.rasterize(&mut painter);
            mask.as_bytes().iter().map(|&a| a as u32).sum()
        };
        let chord = area_of(false);
        let quad = area_of(true);
        assert!(quad > chord, "curve must bulge beyond the chord");
        assert!(quad < 16 * 255, "curve must not fill the full square");
    }
}
