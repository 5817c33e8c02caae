//! TrueType glyph scaling: outline loading, bytecode hinting and
//! rasterization to alpha masks.
//!
//! The pipeline for one glyph: a parsed [`raw::Font`](raw::Font) and a
//! character give a glyph index; [`GlyphBuf::load`] materializes the
//! outline in 26.6 coordinates, running the font's hinting programs
//! through [`Hinter`] when requested; [`Face`] drives the rasterizer
//! over the outline and returns an 8-bit coverage mask together with
//! its placement.

#![deny(rustdoc::broken_intra_doc_links)]

/// Expose our underlying parser crate.
pub extern crate read_truetype as raw;

mod error;
mod face;
mod glyph;
mod hint;

pub use error::Error;
pub use face::{Face, FaceOptions, RenderedGlyph};
pub use glyph::GlyphBuf;
pub use hint::{HintError, HintErrorKind, Hinter};

/// Limit for recursion when loading composite glyphs.
const COMPOSITE_RECURSION_LIMIT: usize = 32;

/// How glyph outlines are fitted to the pixel grid.
#[derive(Copy, Clone, PartialEq, Eq, Default, Debug)]
pub enum Hinting {
    /// Glyphs are scaled but not fitted.
    #[default]
    None,
    /// Fit along the vertical axis only.
    ///
    /// Currently rendered identically to [`Hinting::Full`]; the mapping
    /// is kept so callers can express intent.
    Vertical,
    /// Run the font's bytecode to fit both axes.
    Full,
}

impl Hinting {
    /// Whether this mode runs the bytecode interpreter at all.
    pub fn is_enabled(self) -> bool {
        self != Hinting::None
    }
}
