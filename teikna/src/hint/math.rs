//! Fixed point helpers specific to the bytecode interpreter, which
//! works on raw 26.6 and 2.14 bits throughout.

use raw::units::{F2Dot14, Point};


pub fn floor(x: i32) -> i32 {
    x & !63
}

pub fn round(x: i32) -> i32 {
    floor(x.wrapping_add(32))
}

pub fn ceil(x: i32) -> i32 {
    floor(x.wrapping_add(63))
}

/// 26.6 multiplication, widened through 64 bits.
pub fn mul(a: i32, b: i32) -> i32 {
    ((a as i64 * b as i64) >> 6) as i32
}

/// 26.6 division, widened through 64 bits. The caller checks for a zero
/// divisor.
pub fn div(a: i32, b: i32) -> i32 {
    (((a as i64) << 6) / b as i64) as i32
}

/// `a * b / c` widened through 64 bits.
pub fn mul_div(a: i32, b: i32, c: i32) -> i32 {
    (a as i64 * b as i64 / c as i64) as i32
}

/// The dot product of a 26.6 vector with a 2.14 unit vector, yielding
/// 26.6.
pub fn dot(x: i32, y: i32, v: Point<F2Dot14>) -> i32 {
    ((x as i64 * v.x.to_bits() as i64 + y as i64 * v.y.to_bits() as i64) >> 14) as i32
}

/// Normalizes `(x, y)` into a 2.14 unit vector.
///
/// The zero vector normalizes to the x axis, which keeps later
/// projections well defined.
pub fn normalize(x: i32, y: i32) -> Point<F2Dot14> {
    if x == 0 && y == 0 {
        return Point::new(F2Dot14::ONE, F2Dot14::ZERO);
    }
    let (fx, fy) = (x as f64, y as f64);
    let len = 0x4000 as f64 / (fx * fx + fy * fy).sqrt();
    Point::new(
        F2Dot14::from_bits((fx * len) as i16),
        F2Dot14::from_bits((fy * len) as i16),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_snapping() {
        assert_eq!(floor(95), 64);
        assert_eq!(round(95), 64);
        assert_eq!(round(96), 128);
        assert_eq!(ceil(65), 128);
        assert_eq!(floor(-1), -64);
        assert_eq!(ceil(-1), 0);
    }

    #[test]
    fn normalized_vectors_are_unit_length() {
        for (x, y) in [(1, 0), (0, -5), (300, 400), (-64, 64)] {
            let v = normalize(x, y);
            let len2 =
                v.x.to_bits() as i64 * v.x.to_bits() as i64 + v.y.to_bits() as i64 * v.y.to_bits() as i64;
            let err = (len2 - 0x4000 * 0x4000).abs();
            assert!(err < 0x4000 * 16, "({x}, {y}) -> {v:?}");
        }
    }
}
