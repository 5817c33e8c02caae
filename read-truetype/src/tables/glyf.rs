//! The [glyf (Glyph Data)][glyf] table.
//!
//! This module decodes the wire format of glyph descriptions: contour
//! end indices, run-length encoded point flags, delta-encoded
//! coordinates, and composite component records. Scaling, phantom
//! points and hinting live in the glyph loader built on top.
//!
//! [glyf]: https://docs.microsoft.com/en-us/typography/opentype/spec/glyf

use font_units::{F2Dot14, GlyphId, Point, Tag};

use crate::{FontData, ReadError};

/// 'glyf'
pub const TAG: Tag = Tag::new(b"glyf");

/// Marks a point as having been touched by an instruction along an
/// axis, which exempts it from untouched-point interpolation.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct PointMarker(u8);

impl PointMarker {
    /// Marks a point whose x coordinate was modified.
    pub const TOUCHED_X: Self = Self(0x08);

    /// Marks a point whose y coordinate was modified.
    pub const TOUCHED_Y: Self = Self(0x10);

    /// Marks a point modified along both axes.
    pub const TOUCHED: Self = Self(0x08 | 0x10);
}

/// Per-point flags: the on-curve bit from the font file plus the
/// markers the hinter maintains.
#[derive(Copy, Clone, PartialEq, Eq, Default, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PointFlags(u8);

impl PointFlags {
    const ON_CURVE: u8 = 0x01;

    /// Creates a new on-curve point flag.
    pub const fn on_curve() -> Self {
        Self(Self::ON_CURVE)
    }

    /// Creates a new off-curve point flag.
    pub const fn off_curve() -> Self {
        Self(0)
    }

    /// True if this is an on-curve point.
    pub fn is_on_curve(self) -> bool {
        self.0 & Self::ON_CURVE != 0
    }

    /// True if the given marker is set for this point.
    pub fn has_marker(self, marker: PointMarker) -> bool {
        self.0 & marker.0 != 0
    }

    /// Applies the given marker to this point.
    pub fn set_marker(&mut self, marker: PointMarker) {
        self.0 |= marker.0;
    }

    /// Clears the given marker for this point.
    pub fn clear_marker(&mut self, marker: PointMarker) {
        self.0 &= !marker.0;
    }
}

/// A decoded glyph description.
#[derive(Clone)]
pub enum Glyph<'a> {
    Simple(SimpleGlyph<'a>),
    Composite(CompositeGlyph<'a>),
}

impl<'a> Glyph<'a> {
    /// Read the glyph header and classify the description.
    ///
    /// A negative contour count other than -1 is not a valid TrueType
    /// glyph.
    pub fn read(data: FontData<'a>) -> Result<Self, ReadError> {
        let num_contours = data.read_at::<i16>(0)?;
        match num_contours {
            0.. => Ok(Self::Simple(SimpleGlyph {
                data,
                num_contours: num_contours as usize,
            })),
            -1 => Ok(Self::Composite(CompositeGlyph { data })),
            _ => Err(ReadError::Unsupported("negative contour count")),
        }
    }

    fn header(&self) -> FontData<'a> {
        match self {
            Self::Simple(simple) => simple.data,
            Self::Composite(composite) => composite.data,
        }
    }

    pub fn x_min(&self) -> Result<i16, ReadError> {
        self.header().read_at(2)
    }

    pub fn y_min(&self) -> Result<i16, ReadError> {
        self.header().read_at(4)
    }

    pub fn x_max(&self) -> Result<i16, ReadError> {
        self.header().read_at(6)
    }

    pub fn y_max(&self) -> Result<i16, ReadError> {
        self.header().read_at(8)
    }
}

/// A simple glyph: contours of flagged, delta-encoded points.
#[derive(Clone)]
pub struct SimpleGlyph<'a> {
    data: FontData<'a>,
    num_contours: usize,
}

// Simple glyph flags, per the wire format.
const ON_CURVE_POINT: u8 = 0x01;
const X_SHORT_VECTOR: u8 = 0x02;
const Y_SHORT_VECTOR: u8 = 0x04;
const REPEAT_FLAG: u8 = 0x08;
const X_IS_SAME_OR_POSITIVE: u8 = 0x10;
const Y_IS_SAME_OR_POSITIVE: u8 = 0x20;

impl<'a> SimpleGlyph<'a> {
    /// The number of contours.
    pub fn num_contours(&self) -> usize {
        self.num_contours
    }

    pub fn x_min(&self) -> Result<i16, ReadError> {
        self.data.read_at(2)
    }

    pub fn y_min(&self) -> Result<i16, ReadError> {
        self.data.read_at(4)
    }

    pub fn x_max(&self) -> Result<i16, ReadError> {
        self.data.read_at(6)
    }

    pub fn y_max(&self) -> Result<i16, ReadError> {
        self.data.read_at(8)
    }

    /// The end point index of each contour, cumulative and inclusive.
    pub fn end_pts_of_contours(&self) -> Result<Vec<u16>, ReadError> {
        self.data.read_array(10, self.num_contours)
    }

    /// The total number of points.
    pub fn num_points(&self) -> Result<usize, ReadError> {
        if self.num_contours == 0 {
            return Ok(0);
        }
        Ok(self
            .data
            .read_at::<u16>(10 + (self.num_contours - 1) * 2)? as usize
            + 1)
    }

    /// The glyph's bytecode program.
    pub fn instructions(&self) -> Result<&'a [u8], ReadError> {
        let offset = 10 + self.num_contours * 2;
        let len = self.data.read_at::<u16>(offset)? as usize;
        Ok(self
            .data
            .slice(offset + 2..offset + 2 + len)?
            .as_bytes())
    }

    /// Decode the flag and coordinate arrays into the given slices,
    /// which must hold exactly [`num_points`](Self::num_points) entries.
    pub fn read_points(
        &self,
        points: &mut [Point<i32>],
        flags: &mut [PointFlags],
    ) -> Result<(), ReadError> {
        let n_points = self.num_points()?;
        if points.len() != n_points || flags.len() != n_points {
            return Err(ReadError::MalformedData("bad point buffer length"));
        }
        let ins_offset = 10 + self.num_contours * 2;
        let ins_len = self.data.read_at::<u16>(ins_offset)? as usize;
        let mut pos = ins_offset + 2 + ins_len;
        // Flags, run-length encoded via the repeat bit.
        let mut i = 0;
        while i < n_points {
            let flag = self.data.read_at::<u8>(pos)?;
            pos += 1;
            let mut count = 1;
            if flag & REPEAT_FLAG != 0 {
                count += self.data.read_at::<u8>(pos)? as usize;
                pos += 1;
            }
            for f in flags
                .get_mut(i..(i + count).min(n_points))
                .ok_or(ReadError::OutOfBounds)?
            {
                *f = if flag & ON_CURVE_POINT != 0 {
                    PointFlags::on_curve()
                } else {
                    PointFlags::off_curve()
                };
                // Stash the coordinate encoding bits alongside; they are
                // replaced once the deltas below have been applied.
                f.0 |= flag & (X_SHORT_VECTOR | Y_SHORT_VECTOR | X_IS_SAME_OR_POSITIVE | Y_IS_SAME_OR_POSITIVE);
            }
            i += count;
        }
        // X deltas.
        let mut x = 0i32;
        for (flag, point) in flags.iter().zip(points.iter_mut()) {
            let mut delta = 0i32;
            if flag.0 & X_SHORT_VECTOR != 0 {
                delta = self.data.read_at::<u8>(pos)? as i32;
                pos += 1;
                if flag.0 & X_IS_SAME_OR_POSITIVE == 0 {
                    delta = -delta;
                }
            } else if flag.0 & X_IS_SAME_OR_POSITIVE == 0 {
                delta = self.data.read_at::<i16>(pos)? as i32;
                pos += 2;
            }
            x = x.wrapping_add(delta);
            point.x = x;
        }
        // Y deltas.
        let mut y = 0i32;
        for (flag, point) in flags.iter_mut().zip(points.iter_mut()) {
            let mut delta = 0i32;
            if flag.0 & Y_SHORT_VECTOR != 0 {
                delta = self.data.read_at::<u8>(pos)? as i32;
                pos += 1;
                if flag.0 & Y_IS_SAME_OR_POSITIVE == 0 {
                    delta = -delta;
                }
            } else if flag.0 & Y_IS_SAME_OR_POSITIVE == 0 {
                delta = self.data.read_at::<i16>(pos)? as i32;
                pos += 2;
            }
            y = y.wrapping_add(delta);
            point.y = y;
            // Drop the encoding bits, leaving only the on-curve state.
            flag.0 &= PointFlags::ON_CURVE;
        }
        Ok(())
    }
}

// Composite component flags.
pub const ARG_1_AND_2_ARE_WORDS: u16 = 0x0001;
pub const ARGS_ARE_XY_VALUES: u16 = 0x0002;
pub const ROUND_XY_TO_GRID: u16 = 0x0004;
pub const WE_HAVE_A_SCALE: u16 = 0x0008;
pub const MORE_COMPONENTS: u16 = 0x0020;
pub const WE_HAVE_AN_X_AND_Y_SCALE: u16 = 0x0040;
pub const WE_HAVE_A_TWO_BY_TWO: u16 = 0x0080;
pub const WE_HAVE_INSTRUCTIONS: u16 = 0x0100;
pub const USE_MY_METRICS: u16 = 0x0200;

/// One component of a composite glyph.
#[derive(Clone, Copy, Debug)]
pub struct Component {
    /// The component's flag word.
    pub flags: u16,
    /// The glyph to compose.
    pub glyph: GlyphId,
    /// The translation arguments, in font units.
    pub dx: i32,
    /// See [`dx`](Self::dx).
    pub dy: i32,
    /// The 2x2 transform in reading order: x-scale, scale01, scale10,
    /// y-scale. `None` means identity.
    pub transform: Option<[F2Dot14; 4]>,
}

/// A composite glyph: a list of transformed component records.
#[derive(Clone)]
pub struct CompositeGlyph<'a> {
    data: FontData<'a>,
}

impl<'a> CompositeGlyph<'a> {
    /// Iterate the component records.
    pub fn components(&self) -> ComponentIter<'a> {
        ComponentIter {
            data: self.data,
            pos: 10,
            done: false,
        }
    }

    /// The composite's own bytecode program, present only when the last
    /// component record carries `WE_HAVE_INSTRUCTIONS`.
    pub fn instructions(&self) -> Result<&'a [u8], ReadError> {
        let mut iter = self.components();
        let mut have_instructions = false;
        for component in &mut iter {
            have_instructions = component?.flags & WE_HAVE_INSTRUCTIONS != 0;
        }
        if !have_instructions {
            return Ok(&[]);
        }
        let len = self.data.read_at::<u16>(iter.pos)? as usize;
        Ok(self
            .data
            .slice(iter.pos + 2..iter.pos + 2 + len)?
            .as_bytes())
    }
}

/// Iterator over the components of a composite glyph.
pub struct ComponentIter<'a> {
    data: FontData<'a>,
    pos: usize,
    done: bool,
}

impl ComponentIter<'_> {
    fn read_component(&mut self) -> Result<Component, ReadError> {
        let flags = self.data.read_at::<u16>(self.pos)?;
        let glyph = self.data.read_at::<GlyphId>(self.pos + 2)?;
        self.pos += 4;
        if flags & ARGS_ARE_XY_VALUES == 0 {
            // Anchor-point matching is not implemented.
            return Err(ReadError::Unsupported("compound transform vectors"));
        }
        let (dx, dy) = if flags & ARG_1_AND_2_ARE_WORDS != 0 {
            let dx = self.data.read_at::<i16>(self.pos)? as i32;
            let dy = self.data.read_at::<i16>(self.pos + 2)? as i32;
            self.pos += 4;
            (dx, dy)
        } else {
            let dx = self.data.read_at::<i8>(self.pos)? as i32;
            let dy = self.data.read_at::<i8>(self.pos + 1)? as i32;
            self.pos += 2;
            (dx, dy)
        };
        let transform = if flags & WE_HAVE_A_SCALE != 0 {
            let s = self.data.read_at::<F2Dot14>(self.pos)?;
            self.pos += 2;
            Some([s, F2Dot14::ZERO, F2Dot14::ZERO, s])
        } else if flags & WE_HAVE_AN_X_AND_Y_SCALE != 0 {
            let sx = self.data.read_at::<F2Dot14>(self.pos)?;
            let sy = self.data.read_at::<F2Dot14>(self.pos + 2)?;
            self.pos += 4;
            Some([sx, F2Dot14::ZERO, F2Dot14::ZERO, sy])
        } else if flags & WE_HAVE_A_TWO_BY_TWO != 0 {
            let entries = [
                self.data.read_at::<F2Dot14>(self.pos)?,
                self.data.read_at::<F2Dot14>(self.pos + 2)?,
                self.data.read_at::<F2Dot14>(self.pos + 4)?,
                self.data.read_at::<F2Dot14>(self.pos + 6)?,
            ];
            self.pos += 8;
            Some(entries)
        } else {
            None
        };
        self.done = flags & MORE_COMPONENTS == 0;
        Ok(Component {
            flags,
            glyph,
            dx,
            dy,
            transform,
        })
    }
}

impl Iterator for ComponentIter<'_> {
    type Item = Result<Component, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let component = self.read_component();
        if component.is_err() {
            self.done = true;
        }
        Some(component)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use font_fixtures::sample;

    fn sample_font() -> crate::Font {
        crate::Font::parse(sample::build()).unwrap()
    }

    fn decode_simple(font: &crate::Font, gid: u16) -> (Vec<Point<i32>>, Vec<PointFlags>, Vec<u16>) {
        let data = font.glyph_data(GlyphId::new(gid)).unwrap().unwrap();
        let Glyph::Simple(simple) = Glyph::read(data).unwrap() else {
            panic!("expected a simple glyph");
        };
        let n = simple.num_points().unwrap();
        let mut points = vec![Point::default(); n];
        let mut flags = vec![PointFlags::default(); n];
        simple.read_points(&mut points, &mut flags).unwrap();
        (points, flags, simple.end_pts_of_contours().unwrap())
    }

    #[test]
    fn simple_glyph_points() {
        let font = sample_font();
        let (points, flags, ends) = decode_simple(&font, sample::GID_A);
        assert_eq!(points.len(), sample::A_POINTS.len());
        assert_eq!(ends, vec![7, 10]);
        for (i, &(x, y, on)) in sample::A_POINTS.iter().enumerate() {
            assert_eq!(points[i], Point::new(x as i32, y as i32), "point {i}");
            assert_eq!(flags[i].is_on_curve(), on, "flag {i}");
        }
    }

    #[test]
    fn simple_glyph_instructions() {
        let font = sample_font();
        let data = font.glyph_data(GlyphId::new(sample::GID_V)).unwrap().unwrap();
        let Glyph::Simple(simple) = Glyph::read(data).unwrap() else {
            panic!("expected a simple glyph");
        };
        assert_eq!(simple.instructions().unwrap(), sample::V_INSTRUCTIONS);
        assert_eq!(
            (simple.x_min().unwrap(), simple.y_max().unwrap()),
            (sample::V_BOUNDS[0], sample::V_BOUNDS[3])
        );
    }

    #[test]
    fn composite_components() {
        let font = sample_font();
        let data = font
            .glyph_data(GlyphId::new(sample::GID_COMPOSITE))
            .unwrap()
            .unwrap();
        let Glyph::Composite(composite) = Glyph::read(data).unwrap() else {
            panic!("expected a composite glyph");
        };
        let components: Vec<_> = composite
            .components()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(components.len(), 2);
        assert_eq!(components[0].glyph, GlyphId::new(sample::GID_A));
        assert!(components[0].flags & USE_MY_METRICS != 0);
        assert!(components[0].transform.is_none());
        assert_eq!(components[1].glyph, GlyphId::new(sample::GID_ACUTE));
        assert_eq!(
            (components[1].dx, components[1].dy),
            (sample::ACUTE_OFFSET.0 as i32, sample::ACUTE_OFFSET.1 as i32)
        );
        let scale = components[1].transform.unwrap()[0];
        assert_eq!(scale.to_bits(), sample::ACUTE_SCALE);
        assert!(composite.instructions().unwrap().is_empty());
    }

    #[test]
    fn bad_contour_count() {
        let mut data = vec![0u8; 10];
        data[0..2].copy_from_slice(&(-2i16).to_be_bytes());
        assert!(matches!(
            Glyph::read(FontData::new(&data)),
            Err(ReadError::Unsupported(_))
        ));
    }
}
