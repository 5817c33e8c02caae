//! Big-endian scalar encoding.

/// A type with a fixed-size big-endian encoding in a font binary.
///
/// This is the bridge between raw table bytes and the native types used
/// in the rest of the API. Reads are by value; fonts are big-endian
/// throughout.
pub trait Scalar: Sized + Copy {
    /// The raw byte representation of this type.
    type Raw: AsRef<[u8]> + Copy;

    /// The size of the raw encoding in bytes.
    const RAW_BYTE_LEN: usize = std::mem::size_of::<Self::Raw>();

    /// Create an instance of this type from raw big-endian bytes.
    fn from_raw(raw: Self::Raw) -> Self;

    /// Encode this type as raw big-endian bytes.
    fn to_raw(self) -> Self::Raw;

    /// Read an instance of this type from the front of `bytes`, if there
    /// are enough of them.
    fn read(bytes: &[u8]) -> Option<Self>;
}

macro_rules! int_scalar {
    ($ty:ty, $raw:ty) => {
        impl Scalar for $ty {
            type Raw = $raw;

            fn to_raw(self) -> $raw {
                self.to_be_bytes()
            }

            fn from_raw(raw: $raw) -> $ty {
                Self::from_be_bytes(raw)
            }

            fn read(bytes: &[u8]) -> Option<Self> {
                bytes
                    .get(..std::mem::size_of::<$raw>())
                    .map(|b| Self::from_be_bytes(b.try_into().unwrap()))
            }
        }
    };
}

int_scalar!(u8, [u8; 1]);
int_scalar!(i8, [u8; 1]);
int_scalar!(u16, [u8; 2]);
int_scalar!(i16, [u8; 2]);
int_scalar!(u32, [u8; 4]);
int_scalar!(i32, [u8; 4]);
int_scalar!(u64, [u8; 8]);
int_scalar!(i64, [u8; 8]);

impl Scalar for crate::Tag {
    type Raw = [u8; 4];

    fn to_raw(self) -> [u8; 4] {
        self.into_bytes()
    }

    fn from_raw(raw: [u8; 4]) -> Self {
        Self::from_u32(u32::from_be_bytes(raw))
    }

    fn read(bytes: &[u8]) -> Option<Self> {
        u32::read(bytes).map(Self::from_u32)
    }
}

impl Scalar for crate::GlyphId {
    type Raw = [u8; 2];

    fn to_raw(self) -> [u8; 2] {
        self.to_u16().to_be_bytes()
    }

    fn from_raw(raw: [u8; 2]) -> Self {
        Self::new(u16::from_be_bytes(raw))
    }

    fn read(bytes: &[u8]) -> Option<Self> {
        u16::read(bytes).map(Self::new)
    }
}

impl Scalar for crate::F2Dot14 {
    type Raw = [u8; 2];

    fn to_raw(self) -> [u8; 2] {
        self.to_bits().to_be_bytes()
    }

    fn from_raw(raw: [u8; 2]) -> Self {
        Self::from_bits(i16::from_be_bytes(raw))
    }

    fn read(bytes: &[u8]) -> Option<Self> {
        i16::read(bytes).map(Self::from_bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_is_checked() {
        let bytes = [0x12u8, 0x34, 0x56];
        assert_eq!(u16::read(&bytes), Some(0x1234));
        assert_eq!(u32::read(&bytes), None);
        assert_eq!(i16::read(&bytes[2..]), None);
    }

    #[test]
    fn signed_reads() {
        assert_eq!(i16::read(&[0xff, 0x70]), Some(-144));
    }
}
