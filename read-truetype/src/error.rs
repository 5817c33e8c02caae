use font_units::Tag;

/// Errors that may occur when parsing font data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    /// A read landed outside the bounds of its table.
    OutOfBounds,
    /// The container's magic number identified something other than a
    /// TrueType font.
    InvalidSfnt(u32),
    /// A table's contents contradicted itself or its length.
    MalformedData(&'static str),
    /// A required table was absent from the directory.
    TableIsMissing(Tag),
    /// The font is well formed but uses a feature this crate does not
    /// implement.
    Unsupported(&'static str),
}

impl std::fmt::Display for ReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfBounds => write!(f, "an offset was out of bounds"),
            Self::InvalidSfnt(version) => {
                write!(f, "not a TrueType font (sfnt version {version:#010x})")
            }
            Self::MalformedData(msg) => write!(f, "malformed data: '{msg}'"),
            Self::TableIsMissing(tag) => write!(f, "the {tag} table is missing"),
            Self::Unsupported(msg) => write!(f, "unsupported feature: '{msg}'"),
        }
    }
}

impl std::error::Error for ReadError {}
