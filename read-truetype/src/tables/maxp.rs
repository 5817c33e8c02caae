//! The [maxp (Maximum Profile)][maxp] table.
//!
//! [maxp]: https://docs.microsoft.com/en-us/typography/opentype/spec/maxp

use font_units::Tag;

use crate::{FontData, ReadError};

/// 'maxp'
pub const TAG: Tag = Tag::new(b"maxp");

/// The fixed length of the version 1.0 table.
const LENGTH: usize = 32;

/// The limits this pipeline needs from the maximum profile.
#[derive(Clone, Copy, Debug, Default)]
pub struct Maxp {
    /// The number of glyphs in the font.
    pub num_glyphs: u16,
    /// Maximum points in the twilight zone.
    pub max_twilight_points: u16,
    /// Number of storage area locations the hinter must provide.
    pub max_storage: u16,
    /// Maximum depth of the interpreter's value stack.
    pub max_stack_elements: u16,
}

impl Maxp {
    /// Parse the maximum profile.
    ///
    /// TrueType outlines require the version 1.0 table; the 0.5 variant
    /// belongs to CFF fonts, which are out of scope.
    pub fn read(data: FontData) -> Result<Self, ReadError> {
        if data.len() != LENGTH {
            return Err(ReadError::MalformedData("bad maxp length"));
        }
        if data.read_at::<u32>(0)? != 0x00010000 {
            return Err(ReadError::Unsupported("maxp version (only 1.0)"));
        }
        Ok(Self {
            num_glyphs: data.read_at::<u16>(4)?,
            max_twilight_points: data.read_at::<u16>(16)?,
            max_storage: data.read_at::<u16>(18)?,
            max_stack_elements: data.read_at::<u16>(24)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::BeBuffer;

    #[test]
    fn reads_limits() {
        let bytes = BeBuffer::new()
            .push(0x00010000u32)
            .push(258u16) // numGlyphs
            .extend([80u16, 20, 120, 16, 2]) // points..zones
            .push(64u16) // maxTwilightPoints
            .push(48u16) // maxStorage
            .extend([40u16, 10]) // function and instruction defs
            .push(512u16) // maxStackElements
            .extend([0u16, 0, 0]) // remaining limits
            .to_vec();
        let maxp = Maxp::read(FontData::new(&bytes)).unwrap();
        assert_eq!(maxp.num_glyphs, 258);
        assert_eq!(maxp.max_twilight_points, 64);
        assert_eq!(maxp.max_storage, 48);
        assert_eq!(maxp.max_stack_elements, 512);
    }
}
