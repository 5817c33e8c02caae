//! The TrueType bytecode interpreter ("hinter").
//!
//! A [`Hinter`] owns the interpreter's persistent state: the value
//! stack and storage area, the function table built by `fpgm`, the
//! scaled control value table, the twilight zone, and the default
//! graphics state captured after `prep` runs. It is reusable across
//! glyphs and re-initializes itself lazily when the font or scale
//! changes.

mod engine;
mod error;
mod graphics;
mod math;
mod opcodes;

use std::collections::HashMap;

use raw::{
    tables::glyf::PointFlags,
    units::{F26Dot6, Point},
    Font,
};

use engine::{Definition, Engine, ProgramKind, Zone};
use graphics::GraphicsState;

pub use error::{HintError, HintErrorKind};


/// TrueType bytecode interpreter, reusable across glyphs.
///
/// All buffers grow on font change and are otherwise reset in place.
pub struct Hinter {
    stack: Vec<i32>,
    store: Vec<i32>,
    functions: HashMap<i32, Definition>,
    fpgm: Vec<u8>,
    prep: Vec<u8>,
    scaled_cvt: Vec<i32>,
    default_gs: GraphicsState,
    twilight_current: Vec<Point<F26Dot6>>,
    twilight_unhinted: Vec<Point<F26Dot6>>,
    twilight_in_font_units: Vec<Point<i32>>,
    twilight_flags: Vec<PointFlags>,
    /// Identity of the font the persistent state was built for.
    font_id: Option<usize>,
    /// Pixels per em in 26.6, when initialized.
    scale: Option<i32>,
}

impl Default for Hinter {
    fn default() -> Self {
        Self::new()
    }
}

impl Hinter {
    pub fn new() -> Self {
        Self {
            stack: Vec::new(),
            store: Vec::new(),
            functions: HashMap::new(),
            fpgm: Vec::new(),
            prep: Vec::new(),
            scaled_cvt: Vec::new(),
            default_gs: GraphicsState::default(),
            twilight_current: Vec::new(),
            twilight_unhinted: Vec::new(),
            twilight_in_font_units: Vec::new(),
            twilight_flags: Vec::new(),
            font_id: None,
            scale: None,
        }
    }

    /// Prepares the interpreter for a font and scale: rebuilds the
    /// function table by running `fpgm` when the font changed, and
    /// reruns `prep` to capture the per-size default graphics state
    /// when the font or scale changed.
    pub(crate) fn init(&mut self, font: &Font, scale: F26Dot6) -> Result<(), HintError> {
        let font_id = font as *const Font as usize;
        let font_changed = self.font_id != Some(font_id);
        let rescale = font_changed || self.scale != Some(scale.to_bits());

        let twilight_len = font.max_twilight_points() as usize + 4;
        reset(&mut self.twilight_current, twilight_len);
        reset(&mut self.twilight_unhinted, twilight_len);
        reset(&mut self.twilight_in_font_units, twilight_len);
        reset(&mut self.twilight_flags, twilight_len);

        if font_changed {
            self.font_id = Some(font_id);
            self.functions.clear();
            self.fpgm = font.fpgm().to_vec();
            self.prep = font.prep().to_vec();
            let stack_len = round_up_16(font.max_stack_elements().max(800) as usize);
            reset(&mut self.stack, stack_len);
            let store_len = round_up_16(font.max_storage().max(32) as usize);
            reset(&mut self.store, store_len);
            if !self.fpgm.is_empty() {
                self.exec(
                    font,
                    scale.to_bits(),
                    GraphicsState::default(),
                    ProgramKind::Font,
                    &[],
                    &mut GlyphZoneData::default(),
                )?;
            }
        }
        if rescale {
            self.scale = Some(scale.to_bits());
            let cvt = font.cvt();
            self.scaled_cvt.clear();
            for i in 0..cvt.len() / 2 {
                // Entries are signed FUnits on disk.
                let value = cvt.read_at::<i16>(i * 2).unwrap_or(0) as i32;
                self.scaled_cvt.push(font.scale(scale, value).to_bits());
            }
            let mut gs = GraphicsState::default();
            if !self.prep.is_empty() {
                gs = self.exec(
                    font,
                    scale.to_bits(),
                    gs,
                    ProgramKind::ControlValue,
                    &[],
                    &mut GlyphZoneData::default(),
                )?;
            }
            // The Microsoft rasterizer forces these back to their
            // global defaults between prep and the glyph programs.
            gs.reset_retained();
            self.default_gs = gs;
        }
        Ok(())
    }

    /// Runs a glyph program over the given point data. The slices are
    /// local to one glyph; contour ends are relative to the slices.
    pub(crate) fn run_glyph(
        &mut self,
        font: &Font,
        scale: F26Dot6,
        program: &[u8],
        zone: &mut GlyphZoneData,
    ) -> Result<(), HintError> {
        debug_assert_eq!(self.scale, Some(scale.to_bits()), "init must run first");
        let gs = self.default_gs;
        self.exec(font, scale.to_bits(), gs, ProgramKind::Glyph, program, zone)?;
        Ok(())
    }

    /// Assembles an engine borrowing this interpreter's state, runs one
    /// program, and returns the final graphics state.
    fn exec(
        &mut self,
        font: &Font,
        scale: i32,
        gs: GraphicsState,
        kind: ProgramKind,
        glyph_program: &[u8],
        zone: &mut GlyphZoneData,
    ) -> Result<GraphicsState, HintError> {
        let mut engine = Engine {
            gs,
            stack: &mut self.stack,
            top: 0,
            store: &mut self.store,
            functions: &mut self.functions,
            fpgm: &self.fpgm,
            prep: &self.prep,
            glyph_program,
            cvt: &mut self.scaled_cvt,
            twilight: Zone {
                current: &mut self.twilight_current,
                unhinted: &mut self.twilight_unhinted,
                in_font_units: &mut self.twilight_in_font_units,
                flags: &mut self.twilight_flags,
                ends: &[],
            },
            glyph: Zone {
                current: &mut *zone.current,
                unhinted: &mut *zone.unhinted,
                in_font_units: &mut *zone.in_font_units,
                flags: &mut *zone.flags,
                ends: zone.ends,
            },
            font,
            scale,
        };
        engine.run(kind)?;
        Ok(engine.gs)
    }

}

/// One glyph's point arrays, borrowed for the duration of a program
/// run.
#[derive(Default)]
pub(crate) struct GlyphZoneData<'a> {
    pub current: &'a mut [Point<F26Dot6>],
    pub unhinted: &'a mut [Point<F26Dot6>],
    pub in_font_units: &'a mut [Point<i32>],
    pub flags: &'a mut [PointFlags],
    pub ends: &'a [usize],
}

fn reset<T: Clone + Default>(buffer: &mut Vec<T>, len: usize) {
    buffer.clear();
    buffer.resize(len, T::default());
}

fn round_up_16(n: usize) -> usize {
    (n + 15) & !15
}

#[cfg(test)]
mod tests {
    use super::{opcodes as op, *};
    use font_fixtures::sample;
    use raw::tables::glyf::PointMarker;

    fn sample_font() -> Font {
        Font::parse(sample::build()).unwrap()
    }

    /// 12 pixels per em.
    const SCALE: i32 = 12 << 6;

    /// Runs a program as a glyph program with no outline installed and
    /// returns the final stack contents.
    fn exec(program: &[u8]) -> Result<Vec<i32>, HintError> {
        let font = sample_font();
        let mut hinter = Hinter::new();
        let scale = F26Dot6::from_bits(SCALE);
        hinter.init(&font, scale).unwrap();
        let gs = hinter.default_gs;
        let mut zone = GlyphZoneData::default();
        let mut engine = Engine {
            gs,
            stack: &mut hinter.stack,
            top: 0,
            store: &mut hinter.store,
            functions: &mut hinter.functions,
            fpgm: &hinter.fpgm,
            prep: &hinter.prep,
            glyph_program: program,
            cvt: &mut hinter.scaled_cvt,
            twilight: Zone {
                current: &mut hinter.twilight_current,
                unhinted: &mut hinter.twilight_unhinted,
                in_font_units: &mut hinter.twilight_in_font_units,
                flags: &mut hinter.twilight_flags,
                ends: &[],
            },
            glyph: Zone {
                current: zone.current,
                unhinted: zone.unhinted,
                in_font_units: zone.in_font_units,
                flags: zone.flags,
                ends: zone.ends,
            },
            font: &font,
            scale: SCALE,
        };
        engine.run(ProgramKind::Glyph)?;
        let top = engine.top;
        Ok(hinter.stack[..top].to_vec())
    }

    fn kind_of(result: Result<Vec<i32>, HintError>) -> HintErrorKind {
        result.unwrap_err().kind
    }

    #[test]
    fn arithmetic() {
        let program = [
            op::PUSHB010,
            1 << 6,
            2 << 6,
            3 << 6,
            op::MUL,
            op::SUB,
            op::NEG,
            op::PUSHB000,
            2 << 6,
            op::DIV,
            op::PUSHB000,
            1,
            op::ADD,
            op::ABS,
        ];
        assert_eq!(exec(&program).unwrap(), vec![161]);
    }

    #[test]
    fn rounding_flavors() {
        // Round 90 under each fixed rounding state, results stacked in
        // execution order.
        let program = [
            op::ROFF,
            op::PUSHB000,
            90,
            op::ROUND00,
            op::RTG,
            op::PUSHB000,
            90,
            op::ROUND00,
            op::RTHG,
            op::PUSHB000,
            90,
            op::ROUND00,
            op::RDTG,
            op::PUSHB000,
            90,
            op::ROUND00,
            op::RUTG,
            op::PUSHB000,
            90,
            op::ROUND00,
            op::RTDG,
            op::PUSHB000,
            90,
            op::ROUND00,
        ];
        assert_eq!(exec(&program).unwrap(), vec![90, 64, 96, 64, 128, 96]);
    }

    #[test]
    fn super_rounding() {
        // Period 1, phase 1/2, threshold (6 - 4) / 8 of a period.
        let program = [op::PUSHB000, 0x66, op::SROUND, op::PUSHB000, 90, op::ROUND00];
        assert_eq!(exec(&program).unwrap(), vec![96]);
    }

    #[test]
    fn storage() {
        let program = [
            op::PUSHB011,
            1,
            22,
            3,
            44,
            op::WS,
            op::WS,
            op::PUSHB000,
            3,
            op::RS,
        ];
        assert_eq!(exec(&program).unwrap(), vec![44]);
    }

    #[test]
    fn control_value_table() {
        // Entry 1 holds 1366 FUnits; at 12 ppem over a 2048 em that is
        // 512 in 26.6.
        let program = [op::PUSHB000, 1, op::RCVT];
        assert_eq!(exec(&program).unwrap(), vec![512]);
        // WCVTP overwrites in pixel units.
        let program = [
            op::PUSHB001,
            1,
            99,
            op::WCVTP,
            op::PUSHB000,
            1,
            op::RCVT,
        ];
        assert_eq!(exec(&program).unwrap(), vec![99]);
    }

    #[test]
    fn stack_manipulation() {
        assert_eq!(
            exec(&[op::PUSHB010, 10, 20, 30, op::ROLL]).unwrap(),
            vec![20, 30, 10]
        );
        assert_eq!(
            exec(&[op::PUSHB011, 5, 10, 15, 2, op::CINDEX]).unwrap(),
            vec![5, 10, 15, 10]
        );
        assert_eq!(
            exec(&[op::PUSHB011, 5, 10, 15, 2, op::MINDEX]).unwrap(),
            vec![5, 15, 10]
        );
        assert_eq!(
            exec(&[op::PUSHB001, 1, 2, op::SWAP, op::DEPTH]).unwrap(),
            vec![2, 1, 2]
        );
    }

    #[test]
    fn if_else() {
        let taken = [
            op::PUSHB000,
            1,
            op::IF,
            op::PUSHB000,
            10,
            op::ELSE,
            op::PUSHB000,
            20,
            op::EIF,
        ];
        assert_eq!(exec(&taken).unwrap(), vec![10]);
        let mut untaken = taken;
        untaken[1] = 0;
        assert_eq!(exec(&untaken).unwrap(), vec![20]);
    }

    #[test]
    fn functions() {
        // Define function 7 (doubling) and call it.
        let program = [
            op::PUSHB000,
            7,
            op::FDEF,
            op::DUP,
            op::ADD,
            op::ENDF,
            op::PUSHB000,
            64,
            op::PUSHB000,
            7,
            op::CALL,
        ];
        assert_eq!(exec(&program).unwrap(), vec![128]);
        // LOOPCALL doubles three times.
        let program = [
            op::PUSHB000,
            7,
            op::FDEF,
            op::DUP,
            op::ADD,
            op::ENDF,
            op::PUSHB010,
            1,
            3,
            7,
            op::LOOPCALL,
        ];
        assert_eq!(exec(&program).unwrap(), vec![8]);
        // The font program in the fixture defines (empty) function 1.
        assert_eq!(exec(&[op::PUSHB000, 1, op::CALL]).unwrap(), vec![]);
    }

    #[test]
    fn measurements() {
        assert_eq!(exec(&[op::MPPEM]).unwrap(), vec![12]);
        assert_eq!(exec(&[op::PUSHB000, 1, op::GETINFO]).unwrap(), vec![35]);
        assert_eq!(
            exec(&[op::PUSHB000, 32, op::GETINFO]).unwrap(),
            vec![1 << 12]
        );
        assert_eq!(
            exec(&[op::PUSHB000, 33, op::GETINFO]).unwrap(),
            vec![35 | 1 << 12]
        );
    }

    #[test]
    fn prep_captures_default_state() {
        // The fixture's prep sets the control value cut-in to 70.
        let font = sample_font();
        let mut hinter = Hinter::new();
        hinter.init(&font, F26Dot6::from_bits(SCALE)).unwrap();
        assert_eq!(hinter.default_gs.control_value_cut_in, 70);
        // Forced-reset fields keep their global defaults.
        assert_eq!(hinter.default_gs.zp, [1, 1, 1]);
        assert_eq!(hinter.default_gs.loop_count, 1);
    }

    #[test]
    fn too_many_steps() {
        // A backwards jump that never terminates.
        let program = [op::PUSHW000, 0xff, 0xfd, op::JMPR];
        assert_eq!(kind_of(exec(&program)), HintErrorKind::TooManySteps);
    }

    #[test]
    fn unbalanced_if() {
        let program = [op::PUSHB000, 0, op::IF];
        assert_eq!(kind_of(exec(&program)), HintErrorKind::UnbalancedIfElse);
    }

    #[test]
    fn stack_underflow() {
        assert_eq!(kind_of(exec(&[op::DUP])), HintErrorKind::ValueStackUnderflow);
    }

    #[test]
    fn divide_by_zero() {
        let program = [op::PUSHB001, 64, 0, op::DIV];
        assert_eq!(kind_of(exec(&program)), HintErrorKind::DivideByZero);
    }

    #[test]
    fn unimplemented_opcode() {
        assert_eq!(
            kind_of(exec(&[op::IDEF])),
            HintErrorKind::UnhandledOpcode(op::IDEF)
        );
    }

    #[test]
    fn point_movement() {
        // One contour of three points on the x axis; the ends include
        // only the real points.
        let font = sample_font();
        let mut hinter = Hinter::new();
        let scale = F26Dot6::from_bits(SCALE);
        hinter.init(&font, scale).unwrap();
        let p = |x: i32, y: i32| Point::new(F26Dot6::from_bits(x), F26Dot6::from_bits(y));
        let mut current = [p(10, 0), p(100, 0), p(200, 0)];
        let mut unhinted = [p(0, 0), p(100, 0), p(200, 0)];
        let mut in_font_units = [Point::new(0, 0), Point::new(100, 0), Point::new(200, 0)];
        let mut flags = [PointFlags::on_curve(); 3];
        // Point 0 was already moved by +10 and marked touched; point 2
        // is touched in place. IUP[1] interpolates point 1 between
        // them.
        flags[0].set_marker(PointMarker::TOUCHED_X);
        flags[2].set_marker(PointMarker::TOUCHED_X);
        let ends = [3usize];
        let mut zone = GlyphZoneData {
            current: &mut current,
            unhinted: &mut unhinted,
            in_font_units: &mut in_font_units,
            flags: &mut flags,
            ends: &ends,
        };
        hinter
            .run_glyph(&font, scale, &[op::IUP1], &mut zone)
            .unwrap();
        assert_eq!(current[1].x.to_bits(), 105);
        assert_eq!(current[1].y.to_bits(), 0);

        // MDAP[1] grid-fits a point along the x axis and touches it.
        let mut current = [p(90, 0)];
        let mut unhinted = [p(90, 0)];
        let mut in_font_units = [Point::new(180, 0)];
        let mut flags = [PointFlags::on_curve(); 1];
        let ends = [1usize];
        let mut zone = GlyphZoneData {
            current: &mut current,
            unhinted: &mut unhinted,
            in_font_units: &mut in_font_units,
            flags: &mut flags,
            ends: &ends,
        };
        hinter
            .run_glyph(
                &font,
                scale,
                &[op::SVTCA1, op::PUSHB000, 0, op::MDAP1],
                &mut zone,
            )
            .unwrap();
        assert_eq!(current[0].x.to_bits(), 64);
        assert!(flags[0].has_marker(PointMarker::TOUCHED_X));
        assert!(!flags[0].has_marker(PointMarker::TOUCHED_Y));
    }

    #[test]
    fn shpix_moves_along_freedom_vector() {
        let font = sample_font();
        let mut hinter = Hinter::new();
        let scale = F26Dot6::from_bits(SCALE);
        hinter.init(&font, scale).unwrap();
        let p = |x: i32, y: i32| Point::new(F26Dot6::from_bits(x), F26Dot6::from_bits(y));
        let mut current = [p(100, 200)];
        let mut unhinted = [p(100, 200)];
        let mut in_font_units = [Point::new(200, 400)];
        let mut flags = [PointFlags::on_curve(); 1];
        let ends = [1usize];
        let mut zone = GlyphZoneData {
            current: &mut current,
            unhinted: &mut unhinted,
            in_font_units: &mut in_font_units,
            flags: &mut flags,
            ends: &ends,
        };
        // SVTCA[0] points the freedom vector along y; SHPIX then moves
        // the point up one pixel.
        hinter
            .run_glyph(
                &font,
                scale,
                &[op::SVTCA0, op::PUSHB001, 0, 64, op::SHPIX],
                &mut zone,
            )
            .unwrap();
        assert_eq!(current[0], p(100, 264));
        assert!(flags[0].has_marker(PointMarker::TOUCHED_Y));
        assert!(!flags[0].has_marker(PointMarker::TOUCHED_X));
    }
}
