//! Parsing for TrueType font containers and tables.
//!
//! This crate reads the sfnt container of a TrueType (`0x00010000` /
//! `"true"`) font: the table directory, the character map, the metric
//! and kerning tables, and the raw byte ranges of the tables the glyph
//! loader and hinter consume (`glyf`, `loca`, `fpgm`, `prep`, `cvt `).
//!
//! The central type is [`Font`], which owns the font bytes, validates
//! the tables it understands at parse time, and is immutable (and
//! freely shareable by reference) afterwards.

#![deny(rustdoc::broken_intra_doc_links)]

/// Expose our underlying primitives crate.
pub extern crate font_units as units;

mod error;
mod font;
mod font_data;
pub mod tables;

#[cfg(test)]
mod test_helpers;

pub use error::ReadError;
pub use font::{Font, HMetric, VMetric};
pub use font_data::FontData;
