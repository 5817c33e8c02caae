//! Analytic-area scan conversion of glyph outlines into alpha spans.
//!
//! The [`Rasterizer`] accepts a path of straight and quadratic (or
//! cubic) segments in 26.6 fixed point, accumulates signed sub-pixel
//! coverage per cell, and sweeps the cell grid into horizontal
//! [`Span`]s which it hands to a [`Painter`]. Painters write spans into
//! an 8-bit alpha [`Mask`], optionally quantizing to monochrome or
//! applying gamma correction on the way.

#![deny(rustdoc::broken_intra_doc_links)]

mod paint;
mod raster;

pub use paint::{
    AlphaOverPainter, AlphaSrcPainter, GammaPainter, Mask, MonochromePainter, Painter, Span,
};
pub use raster::{Rasterizer, Winding};
