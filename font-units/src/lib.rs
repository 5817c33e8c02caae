//! Fixed point and geometry primitives for TrueType font scaling.
//!
//! Everything in the glyph pipeline is measured in one of two signed
//! fixed point formats: [`F26Dot6`] for pixel-resolution coordinates and
//! [`F2Dot14`] for the unit vectors of the hinting graphics state. This
//! crate provides those types, the generic [`Point`] and [`BBox`]
//! containers, and the big-endian [`Scalar`] encoding used when reading
//! font binaries.

#![deny(rustdoc::broken_intra_doc_links)]

mod bbox;
mod fixed;
mod glyph_id;
mod point;
mod raw;
mod tag;

pub use bbox::BBox;
pub use fixed::{F26Dot6, F2Dot14};
pub use glyph_id::GlyphId;
pub use point::{dot14, Point};
pub use raw::Scalar;
pub use tag::Tag;
