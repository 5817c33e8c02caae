use raw::{units::GlyphId, ReadError};

use crate::hint::HintError;

/// Errors that may occur when loading and rendering glyphs.
#[derive(Clone, Debug)]
pub enum Error {
    /// The requested glyph was not present in the font.
    GlyphNotFound(GlyphId),
    /// Exceeded the recursion limit when loading a composite glyph.
    RecursionLimitExceeded(GlyphId),
    /// A hinting program failed.
    Hinting(HintError),
    /// Error occurred when reading font data.
    Read(ReadError),
}

impl From<ReadError> for Error {
    fn from(e: ReadError) -> Self {
        Self::Read(e)
    }
}

impl From<HintError> for Error {
    fn from(e: HintError) -> Self {
        Self::Hinting(e)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GlyphNotFound(gid) => write!(f, "glyph {gid} was not found in the given font"),
            Self::RecursionLimitExceeded(gid) => write!(
                f,
                "recursion limit ({}) exceeded when loading composite component {gid}",
                crate::COMPOSITE_RECURSION_LIMIT,
            ),
            Self::Hinting(e) => write!(f, "{e}"),
            Self::Read(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for Error {}
