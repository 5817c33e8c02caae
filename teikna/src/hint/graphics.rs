//! The interpreter's graphics state.

use raw::units::{F2Dot14, Point};

use super::math;

/// Rounding state: `period == 0` means rounding is off.
///
/// The four `ROUND` opcode flavors are aliased because engine
/// compensation for printer dot size is deliberately unimplemented.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct RoundState {
    pub period: i32,
    pub phase: i32,
    pub threshold: i32,
}

impl Default for RoundState {
    /// Round to grid.
    fn default() -> Self {
        Self {
            period: 64,
            phase: 0,
            threshold: 32,
        }
    }
}

impl RoundState {
    pub fn round(&self, x: i32) -> i32 {
        if self.period == 0 {
            return x;
        }
        if x >= 0 {
            let mut r = x - self.phase + self.threshold;
            r -= r % self.period;
            r += self.phase;
            if r < 0 {
                r = self.phase;
            }
            r
        } else {
            let mut r = -x - self.phase + self.threshold;
            r -= r % self.period;
            r += self.phase;
            if r < 0 {
                r = self.phase;
            }
            -r
        }
    }
}

/// The graphics state of the TrueType virtual machine.
///
/// A fresh copy is captured as the per-size default after the control
/// value program runs, and installed at the start of every glyph
/// program.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct GraphicsState {
    /// Projection vector: the axis distances are measured along.
    pub pv: Point<F2Dot14>,
    /// Freedom vector: the axis points move along.
    pub fv: Point<F2Dot14>,
    /// Dual projection vector: measures distances on the original
    /// outline.
    pub dv: Point<F2Dot14>,
    /// Reference points.
    pub rp: [i32; 3],
    /// Zone pointers; zone 0 is the twilight zone, 1 the glyph zone.
    pub zp: [u8; 3],
    pub control_value_cut_in: i32,
    pub single_width: i32,
    pub single_width_cut_in: i32,
    pub delta_base: i32,
    pub delta_shift: i32,
    pub min_dist: i32,
    pub loop_count: i32,
    pub round: RoundState,
    pub auto_flip: bool,
}

impl Default for GraphicsState {
    fn default() -> Self {
        let x_axis = Point::new(F2Dot14::ONE, F2Dot14::ZERO);
        Self {
            pv: x_axis,
            fv: x_axis,
            dv: x_axis,
            rp: [0; 3],
            zp: [1; 3],
            control_value_cut_in: (17 << 6) / 16,
            single_width: 0,
            single_width_cut_in: 0,
            delta_base: 9,
            delta_shift: 3,
            min_dist: 64,
            loop_count: 1,
            round: RoundState::default(),
            auto_flip: true,
        }
    }
}

impl GraphicsState {
    /// Resets the fields the Microsoft rasterizer forces back to their
    /// global defaults when capturing the per-size state after `prep`.
    pub fn reset_retained(&mut self) {
        let fresh = Self::default();
        self.pv = fresh.pv;
        self.fv = fresh.fv;
        self.dv = fresh.dv;
        self.rp = fresh.rp;
        self.zp = fresh.zp;
        self.loop_count = fresh.loop_count;
    }

    /// Projection of a 26.6 vector.
    pub fn project(&self, dx: i32, dy: i32) -> i32 {
        math::dot(dx, dy, self.pv)
    }

    /// Projection onto the dual vector, used for distances measured on
    /// the original outline.
    pub fn dual_project(&self, dx: i32, dy: i32) -> i32 {
        math::dot(dx, dy, self.dv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_to_grid_flavors() {
        // (period, phase, threshold) configurations of the fixed
        // rounding opcodes applied to 90 (1.40625 pixels).
        let cases = [
            ((64, 0, 32), 64),  // to grid
            ((64, 32, 32), 96), // to half grid
            ((64, 0, 0), 64),   // down to grid
            ((64, 0, 63), 128), // up to grid
            ((32, 0, 16), 96),  // to double grid
            ((0, 0, 0), 90),    // off
        ];
        for ((period, phase, threshold), expected) in cases {
            let state = RoundState {
                period,
                phase,
                threshold,
            };
            assert_eq!(state.round(90), expected, "period {period} phase {phase}");
        }
    }

    #[test]
    fn round_preserves_sign() {
        let grid = RoundState::default();
        assert_eq!(grid.round(-90), -64);
        assert_eq!(grid.round(-32), -64);
        // A small negative value must not round across zero.
        let phase = RoundState {
            period: 64,
            phase: 48,
            threshold: 0,
        };
        assert_eq!(phase.round(-8), -48);
    }
}
