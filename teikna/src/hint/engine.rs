//! The bytecode execution engine.
//!
//! One [`Engine`] is assembled per program run, borrowing the
//! interpreter's persistent storage (value stack, storage area,
//! function table, scaled control values, twilight zone) and the
//! current glyph's point arrays. Dispatch is a single match over the
//! opcode, in the order of the instruction set listing.

use std::collections::HashMap;
use std::ops::Range;

use raw::{
    tables::glyf::{PointFlags, PointMarker},
    units::{F26Dot6, F2Dot14, Point},
    Font,
};

use super::{
    error::{HintError, HintErrorKind},
    graphics::GraphicsState,
    math, opcodes as op,
};

/// Programs are bounded to defend against malformed fonts.
pub const MAX_PROGRAM_BYTES: usize = 50_000;

/// Executed instructions are bounded to defend against runaway loops.
pub const MAX_RUN_STEPS: u32 = 100_000;

/// The depth of the call stack.
const MAX_CALL_DEPTH: usize = 32;

/// Which program a piece of bytecode belongs to.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ProgramKind {
    /// `fpgm`: run once per font, defines functions.
    Font,
    /// `prep`: run at every font or scale change.
    ControlValue,
    /// A glyph's own instructions.
    Glyph,
}

/// A function body recorded by `FDEF`: a byte range inside its
/// defining program.
#[derive(Clone, Debug)]
pub struct Definition {
    pub kind: ProgramKind,
    pub range: Range<usize>,
}

/// Which of the three per-zone point arrays an operation reads.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum PointType {
    Current,
    Unhinted,
    InFontUnits,
}

/// Mutable views of one zone's point data for the duration of a run.
pub struct Zone<'a> {
    pub current: &'a mut [Point<F26Dot6>],
    pub unhinted: &'a mut [Point<F26Dot6>],
    pub in_font_units: &'a mut [Point<i32>],
    pub flags: &'a mut [PointFlags],
    pub ends: &'a [usize],
}

struct CallFrame {
    ret_kind: ProgramKind,
    ret_pc: usize,
    body_start: usize,
    remaining: i32,
}

/// The assembled interpreter.
pub struct Engine<'a> {
    pub gs: GraphicsState,
    pub stack: &'a mut [i32],
    pub top: usize,
    pub store: &'a mut [i32],
    pub functions: &'a mut HashMap<i32, Definition>,
    pub fpgm: &'a [u8],
    pub prep: &'a [u8],
    pub glyph_program: &'a [u8],
    /// The scaled control value table, in 26.6 pixels.
    pub cvt: &'a mut [i32],
    pub twilight: Zone<'a>,
    pub glyph: Zone<'a>,
    pub font: &'a Font,
    /// Pixels per em in 26.6.
    pub scale: i32,
}

struct RunCtx {
    kind: ProgramKind,
    pc: usize,
    steps: u32,
    call_stack: Vec<CallFrame>,
}

impl<'a> Engine<'a> {
    fn program(&self, kind: ProgramKind) -> &'a [u8] {
        match kind {
            ProgramKind::Font => self.fpgm,
            ProgramKind::ControlValue => self.prep,
            ProgramKind::Glyph => self.glyph_program,
        }
    }

    /// Executes a program to completion.
    pub fn run(&mut self, kind: ProgramKind) -> Result<(), HintError> {
        let err = |pc: usize, opcode: Option<u8>, kind_: HintErrorKind| HintError {
            program: kind,
            pc,
            opcode,
            kind: kind_,
        };
        if self.program(kind).len() > MAX_PROGRAM_BYTES {
            return Err(err(0, None, HintErrorKind::ProgramTooLarge));
        }
        let mut ctx = RunCtx {
            kind,
            pc: 0,
            steps: 0,
            call_stack: Vec::with_capacity(MAX_CALL_DEPTH),
        };
        loop {
            let program = self.program(ctx.kind);
            let op_pc = ctx.pc;
            if op_pc >= program.len() {
                break;
            }
            ctx.steps += 1;
            if ctx.steps > MAX_RUN_STEPS {
                return Err(err(op_pc, None, HintErrorKind::TooManySteps));
            }
            let opcode = program[op_pc];
            let pops = op::POP_COUNT[opcode as usize];
            if pops == op::UNIMPL {
                return Err(err(op_pc, Some(opcode), HintErrorKind::UnhandledOpcode(opcode)));
            }
            if pops as usize > self.top {
                return Err(err(op_pc, Some(opcode), HintErrorKind::ValueStackUnderflow));
            }
            let payload = payload_len(program, op_pc)
                .map_err(|kind_| err(op_pc, Some(opcode), kind_))?;
            ctx.pc = op_pc + 1 + payload;
            if ctx.pc > program.len() {
                return Err(err(op_pc, Some(opcode), HintErrorKind::UnexpectedEndOfBytecode));
            }
            self.dispatch(opcode, op_pc, &mut ctx)
                .map_err(|kind_| err(op_pc, Some(opcode), kind_))?;
        }
        Ok(())
    }

    fn dispatch(&mut self, opcode: u8, op_pc: usize, ctx: &mut RunCtx) -> Result<(), HintErrorKind> {
        use HintErrorKind::*;
        let x_axis = Point::new(F2Dot14::ONE, F2Dot14::ZERO);
        let y_axis = Point::new(F2Dot14::ZERO, F2Dot14::ONE);
        match opcode {
            // Vector setup.
            op::SVTCA0 | op::SVTCA1 | op::SPVTCA0 | op::SPVTCA1 | op::SFVTCA0 | op::SFVTCA1 => {
                let axis = if opcode & 1 != 0 { x_axis } else { y_axis };
                if opcode <= op::SPVTCA1 {
                    self.gs.pv = axis;
                    self.gs.dv = axis;
                }
                if opcode & !1 != op::SPVTCA0 {
                    self.gs.fv = axis;
                }
            }
            op::SPVTL0 | op::SPVTL1 | op::SFVTL0 | op::SFVTL1 => {
                let i1 = self.pop();
                let i2 = self.pop();
                let q = self.point(2, PointType::Current, i1)?;
                let p = self.point(1, PointType::Current, i2)?;
                let v = line_vector(p - q, opcode & 1 != 0);
                if opcode < op::SFVTL0 {
                    self.gs.pv = v;
                    self.gs.dv = v;
                } else {
                    self.gs.fv = v;
                }
            }
            op::SPVFS | op::SFVFS => {
                let y = self.pop() as i16 as i32;
                let x = self.pop() as i16 as i32;
                let v = math::normalize(x, y);
                if opcode == op::SPVFS {
                    self.gs.pv = v;
                    self.gs.dv = v;
                } else {
                    self.gs.fv = v;
                }
            }
            op::GPV | op::GFV => {
                let v = if opcode == op::GPV { self.gs.pv } else { self.gs.fv };
                self.push(v.x.to_bits() as i32)?;
                self.push(v.y.to_bits() as i32)?;
            }
            op::SFVTPV => self.gs.fv = self.gs.pv,
            op::ISECT => self.isect()?,

            // Reference and zone pointers.
            op::SRP0 | op::SRP1 | op::SRP2 => {
                let v = self.pop();
                self.gs.rp[(opcode - op::SRP0) as usize] = v;
            }
            op::SZP0 | op::SZP1 | op::SZP2 | op::SZPS => {
                let v = self.pop();
                if v != 0 && v != 1 {
                    return Err(InvalidZoneIndex(v));
                }
                if opcode == op::SZPS {
                    self.gs.zp = [v as u8; 3];
                } else {
                    self.gs.zp[(opcode - op::SZP0) as usize] = v as u8;
                }
            }
            op::SLOOP => {
                let v = self.pop();
                if v < 0 {
                    return Err(NegativeLoopCounter);
                }
                self.gs.loop_count = v;
            }

            // Rounding state.
            op::RTG => self.gs.round = super::graphics::RoundState::default(),
            op::RTHG => self.set_round(64, 32, 32),
            op::RTDG => self.set_round(32, 0, 16),
            op::RDTG => self.set_round(64, 0, 0),
            op::RUTG => self.set_round(64, 0, 63),
            op::ROFF => self.set_round(0, 0, 0),
            op::SROUND | op::S45ROUND => {
                let b = self.pop();
                let mut period = match (b >> 6) & 0x03 {
                    0 => 32,
                    2 => 128,
                    _ => 64,
                };
                if opcode == op::S45ROUND {
                    // The grid period becomes sqrt(2)/2 pixels.
                    period = period * 46341 / 65536;
                }
                let phase = match (b >> 4) & 0x03 {
                    0 => 0,
                    1 => period / 4,
                    2 => period / 2,
                    _ => period * 3 / 4,
                };
                let threshold = match b & 0x0f {
                    0 => period - 1,
                    x => (x - 4) * period / 8,
                };
                self.gs.round = super::graphics::RoundState {
                    period,
                    phase,
                    threshold,
                };
            }

            // Control flow.
            op::ELSE => ctx.pc = skip_branch(self.program(ctx.kind), op_pc, false)?,
            op::JMPR | op::JROT | op::JROF => {
                let taken = match opcode {
                    op::JROT => {
                        let e = self.pop();
                        e != 0
                    }
                    op::JROF => {
                        let e = self.pop();
                        e == 0
                    }
                    _ => true,
                };
                let offset = self.pop();
                if taken {
                    let target = op_pc as i64 + offset as i64;
                    if target < 0 {
                        return Err(InvalidJump);
                    }
                    ctx.pc = target as usize;
                }
            }
            op::IF => {
                let e = self.pop();
                if e == 0 {
                    ctx.pc = skip_branch(self.program(ctx.kind), op_pc, true)?;
                }
            }
            op::EIF => {}
            op::FDEF => {
                let id = self.pop();
                let body_start = ctx.pc;
                let end = scan_definition(self.program(ctx.kind), body_start)?;
                self.functions.insert(
                    id,
                    Definition {
                        kind: ctx.kind,
                        range: body_start..end,
                    },
                );
                ctx.pc = end + 1;
            }
            op::ENDF => {
                let frame = ctx.call_stack.last_mut().ok_or(CallStackUnderflow)?;
                if frame.remaining > 1 {
                    frame.remaining -= 1;
                    ctx.pc = frame.body_start;
                } else {
                    let frame = ctx.call_stack.pop().ok_or(CallStackUnderflow)?;
                    ctx.kind = frame.ret_kind;
                    ctx.pc = frame.ret_pc;
                }
            }
            op::CALL | op::LOOPCALL => {
                let id = self.pop();
                let count = if opcode == op::LOOPCALL { self.pop() } else { 1 };
                if count < 0 {
                    return Err(NegativeLoopCounter);
                }
                if count == 0 {
                    return Ok(());
                }
                let def = self
                    .functions
                    .get(&id)
                    .ok_or(InvalidDefinition(id))?
                    .clone();
                if ctx.call_stack.len() >= MAX_CALL_DEPTH {
                    return Err(CallStackOverflow);
                }
                ctx.call_stack.push(CallFrame {
                    ret_kind: ctx.kind,
                    ret_pc: ctx.pc,
                    body_start: def.range.start,
                    remaining: count,
                });
                ctx.kind = def.kind;
                ctx.pc = def.range.start;
            }

            // Stack manipulation.
            op::DUP => {
                let v = self.pop();
                self.push(v)?;
                self.push(v)?;
            }
            op::POP => {
                self.pop();
            }
            op::CLEAR => self.top = 0,
            op::SWAP => {
                let b = self.pop();
                let a = self.pop();
                self.push(b)?;
                self.push(a)?;
            }
            op::DEPTH => {
                let d = self.top as i32;
                self.push(d)?;
            }
            op::CINDEX | op::MINDEX => {
                let k = self.pop();
                if k <= 0 || k as usize > self.top {
                    return Err(InvalidStackValue(k));
                }
                let at = self.top - k as usize;
                let v = self.stack[at];
                if opcode == op::MINDEX {
                    self.stack.copy_within(at + 1..self.top, at);
                    self.top -= 1;
                }
                self.push(v)?;
            }
            op::ROLL => {
                let a = self.pop();
                let b = self.pop();
                let c = self.pop();
                self.push(b)?;
                self.push(a)?;
                self.push(c)?;
            }
            op::MAX => self.binary(i32::max)?,
            op::MIN => self.binary(i32::min)?,

            // Pushing data.
            op::NPUSHB | op::NPUSHW | op::PUSHB000..=op::PUSHB111 | op::PUSHW000..=op::PUSHW111 => {
                let program = self.program(ctx.kind);
                let (data_at, count, wide) = match opcode {
                    op::NPUSHB => (op_pc + 2, program[op_pc + 1] as usize, false),
                    op::NPUSHW => (op_pc + 2, program[op_pc + 1] as usize, true),
                    op::PUSHB000..=op::PUSHB111 => {
                        (op_pc + 1, (opcode - op::PUSHB000 + 1) as usize, false)
                    }
                    _ => (op_pc + 1, (opcode - op::PUSHW000 + 1) as usize, true),
                };
                for i in 0..count {
                    let v = if wide {
                        i16::from_be_bytes([program[data_at + 2 * i], program[data_at + 2 * i + 1]])
                            as i32
                    } else {
                        program[data_at + i] as i32
                    };
                    self.push(v)?;
                }
            }

            // Storage and control values.
            op::WS => {
                let v = self.pop();
                let i = self.pop();
                let slot = usize::try_from(i)
                    .ok()
                    .and_then(|i| self.store.get_mut(i))
                    .ok_or(InvalidStorageIndex(i))?;
                *slot = v;
            }
            op::RS => {
                let i = self.pop();
                let v = *usize::try_from(i)
                    .ok()
                    .and_then(|i| self.store.get(i))
                    .ok_or(InvalidStorageIndex(i))?;
                self.push(v)?;
            }
            op::WCVTP => {
                let v = self.pop();
                let i = self.pop();
                self.write_cvt(i, v)?;
            }
            op::WCVTF => {
                let v = self.pop();
                let i = self.pop();
                let scaled = self.font_scale(v);
                self.write_cvt(i, scaled)?;
            }
            op::RCVT => {
                let i = self.pop();
                let v = self.read_cvt(i)?;
                self.push(v)?;
            }

            // Graphics state setters.
            op::SCVTCI => self.gs.control_value_cut_in = self.pop(),
            op::SSWCI => self.gs.single_width_cut_in = self.pop(),
            op::SSW => {
                let v = self.pop();
                self.gs.single_width = self.font_scale(v);
            }
            op::SMD => self.gs.min_dist = self.pop(),
            op::SDB => self.gs.delta_base = self.pop(),
            op::SDS => self.gs.delta_shift = self.pop(),
            op::FLIPON => self.gs.auto_flip = true,
            op::FLIPOFF => self.gs.auto_flip = false,

            // Measurements.
            op::MPPEM | op::MPS => {
                // Point size would need the dpi; the ppem stands in for
                // both.
                let ppem = self.scale >> 6;
                self.push(ppem)?;
            }
            op::GC0 | op::GC1 => {
                let i = self.pop();
                let v = if opcode == op::GC0 {
                    let p = self.point(2, PointType::Current, i)?;
                    self.gs.project(p.x, p.y)
                } else {
                    let p = self.point(2, PointType::Unhinted, i)?;
                    self.gs.dual_project(p.x, p.y)
                };
                self.push(v)?;
            }
            op::MD0 | op::MD1 => {
                let i2 = self.pop();
                let i1 = self.pop();
                // The low opcode bit selects the grid-fitted outline;
                // otherwise the original outline is measured.
                let d = if opcode == op::MD0 {
                    let p1 = self.point(0, PointType::Current, i1)?;
                    let p2 = self.point(1, PointType::Current, i2)?;
                    self.gs.project(p1.x - p2.x, p1.y - p2.y)
                } else {
                    self.original_distance(i1, i2)?
                };
                self.push(d)?;
            }
            op::GETINFO => {
                let selector = self.pop();
                let mut result = 0;
                if selector & 1 != 0 {
                    // Engine version 35 is the Microsoft rasterizer
                    // v1.7.
                    result |= 35;
                }
                if selector & (1 << 5) != 0 {
                    // Grayscale rendering.
                    result |= 1 << 12;
                }
                self.push(result)?;
            }

            // Logic and arithmetic.
            op::LT => self.binary(|a, b| (a < b) as i32)?,
            op::LTEQ => self.binary(|a, b| (a <= b) as i32)?,
            op::GT => self.binary(|a, b| (a > b) as i32)?,
            op::GTEQ => self.binary(|a, b| (a >= b) as i32)?,
            op::EQ => self.binary(|a, b| (a == b) as i32)?,
            op::NEQ => self.binary(|a, b| (a != b) as i32)?,
            op::ODD | op::EVEN => {
                let v = self.pop();
                let rounded = self.gs.round.round(v);
                let odd = (rounded >> 6) & 1;
                self.push(if opcode == op::ODD { odd } else { 1 - odd })?;
            }
            op::AND => self.binary(|a, b| (a != 0 && b != 0) as i32)?,
            op::OR => self.binary(|a, b| (a != 0 || b != 0) as i32)?,
            op::NOT => {
                let v = self.pop();
                self.push((v == 0) as i32)?;
            }
            op::ADD => self.binary(|a, b| a.wrapping_add(b))?,
            op::SUB => self.binary(|a, b| a.wrapping_sub(b))?,
            op::DIV => {
                let b = self.pop();
                let a = self.pop();
                if b == 0 {
                    return Err(DivideByZero);
                }
                self.push(math::div(a, b))?;
            }
            op::MUL => self.binary(math::mul)?,
            op::ABS => {
                let v = self.pop();
                self.push(v.wrapping_abs())?;
            }
            op::NEG => {
                let v = self.pop();
                self.push(v.wrapping_neg())?;
            }
            op::FLOOR => {
                let v = self.pop();
                self.push(math::floor(v))?;
            }
            op::CEILING => {
                let v = self.pop();
                self.push(math::ceil(v))?;
            }
            op::ROUND00..=op::ROUND11 => {
                // The four flavors differ only in engine compensation,
                // which is unimplemented; they are aliases.
                let v = self.pop();
                let r = self.gs.round.round(v);
                self.push(r)?;
            }
            op::NROUND00..=op::NROUND11 => {}

            // Deltas.
            op::DELTAP1 | op::DELTAP2 | op::DELTAP3 => {
                let offset = match opcode {
                    op::DELTAP2 => 16,
                    op::DELTAP3 => 32,
                    _ => 0,
                };
                let n = self.pop();
                for _ in 0..n {
                    if self.top < 2 {
                        return Err(ValueStackUnderflow);
                    }
                    let i = self.pop();
                    let b = self.pop();
                    if let Some(delta) = self.delta_value(b, offset) {
                        self.move_point(0, i, delta, true)?;
                    }
                }
            }
            op::DELTAC1 | op::DELTAC2 | op::DELTAC3 => {
                let offset = match opcode {
                    op::DELTAC2 => 16,
                    op::DELTAC3 => 32,
                    _ => 0,
                };
                let n = self.pop();
                for _ in 0..n {
                    if self.top < 2 {
                        return Err(ValueStackUnderflow);
                    }
                    let i = self.pop();
                    let b = self.pop();
                    if let Some(delta) = self.delta_value(b, offset) {
                        let v = self.read_cvt(i)?;
                        self.write_cvt(i, v + delta)?;
                    }
                }
            }

            // Point movement.
            op::MDAP0 | op::MDAP1 => {
                let i = self.pop();
                let mut distance = 0;
                if opcode == op::MDAP1 {
                    let p = self.point(0, PointType::Current, i)?;
                    let proj = self.gs.project(p.x, p.y);
                    distance = self.gs.round.round(proj) - proj;
                }
                self.move_point(0, i, distance, true)?;
                self.gs.rp[0] = i;
                self.gs.rp[1] = i;
            }
            op::MIAP0 | op::MIAP1 => {
                let cvt_entry = self.pop();
                let i = self.pop();
                let mut distance = self.read_cvt(cvt_entry)?;
                if self.gs.zp[0] == 0 {
                    // Twilight points spring into being at the control
                    // value's position.
                    let pv = self.gs.pv;
                    let p = Point::new(mul14(distance, pv.x), mul14(distance, pv.y));
                    self.set_point(0, PointType::Unhinted, i, p)?;
                    self.set_point(0, PointType::Current, i, p)?;
                }
                let p = self.point(0, PointType::Current, i)?;
                let org_dist = self.gs.project(p.x, p.y);
                if opcode == op::MIAP1 {
                    if (distance - org_dist).abs() > self.gs.control_value_cut_in {
                        distance = org_dist;
                    }
                    distance = self.gs.round.round(distance);
                }
                self.move_point(0, i, distance - org_dist, true)?;
                self.gs.rp[0] = i;
                self.gs.rp[1] = i;
            }
            op::IUP0 | op::IUP1 => self.iup(opcode == op::IUP0)?,
            op::SHP0 | op::SHP1 => {
                if self.top < self.gs.loop_count as usize {
                    return Err(ValueStackUnderflow);
                }
                let (_, _, d) = self.displacement(opcode & 1 == 0)?;
                for _ in 0..self.gs.loop_count {
                    let i = self.pop();
                    self.move_point(2, i, d, true)?;
                }
                self.gs.loop_count = 1;
            }
            op::SHC0 | op::SHC1 => {
                let contour = self.pop();
                let (ref_zone, ref_point, d) = self.displacement(opcode & 1 == 0)?;
                let (start, end) = if self.gs.zp[2] == 0 {
                    (0, self.twilight.current.len())
                } else {
                    let c = usize::try_from(contour)
                        .ok()
                        .filter(|c| *c < self.glyph.ends.len())
                        .ok_or(InvalidContourIndex(contour))?;
                    let start = if c == 0 { 0 } else { self.glyph.ends[c - 1] };
                    (start, self.glyph.ends[c])
                };
                for i in start..end {
                    if self.gs.zp[2] == ref_zone && i as i32 == ref_point {
                        continue;
                    }
                    self.move_point(2, i as i32, d, false)?;
                }
            }
            op::SHZ0 | op::SHZ1 => {
                let e = self.pop();
                if e != 0 && e != 1 {
                    return Err(InvalidZoneIndex(e));
                }
                let (ref_zone, ref_point, d) = self.displacement(opcode & 1 == 0)?;
                let len = if e == 0 {
                    self.twilight.current.len()
                } else {
                    self.glyph.current.len()
                };
                for i in 0..len {
                    if e as u8 == ref_zone && i as i32 == ref_point {
                        continue;
                    }
                    self.move_zone_point(e as u8, i as i32, d)?;
                }
            }
            op::SHPIX => {
                let d = self.pop();
                if self.top < self.gs.loop_count as usize {
                    return Err(ValueStackUnderflow);
                }
                let fv = self.gs.fv;
                let (dx, dy) = (mul14(d, fv.x), mul14(d, fv.y));
                for _ in 0..self.gs.loop_count {
                    let i = self.pop();
                    self.shift_point(2, i, dx, dy)?;
                }
                self.gs.loop_count = 1;
            }
            op::IP => {
                if self.top < self.gs.loop_count as usize {
                    return Err(ValueStackUnderflow);
                }
                // When any zone pointer selects the twilight zone there
                // are no font unit coordinates to interpolate in.
                let in_funits =
                    self.gs.zp[0] != 0 && self.gs.zp[1] != 0 && self.gs.zp[2] != 0;
                let orig = if in_funits {
                    PointType::InFontUnits
                } else {
                    PointType::Unhinted
                };
                let rp1 = self.gs.rp[1];
                let rp2 = self.gs.rp[2];
                let orus_base = self.point(0, orig, rp1)?;
                let cur_base = self.point(0, PointType::Current, rp1)?;
                let q = self.point(1, orig, rp2)?;
                let old_range = self.gs.dual_project(q.x - orus_base.x, q.y - orus_base.y);
                let qc = self.point(1, PointType::Current, rp2)?;
                let cur_range = self.gs.project(qc.x - cur_base.x, qc.y - cur_base.y);
                for _ in 0..self.gs.loop_count {
                    let i = self.pop();
                    let p = self.point(2, orig, i)?;
                    let org_dist = self.gs.dual_project(p.x - orus_base.x, p.y - orus_base.y);
                    let pc = self.point(2, PointType::Current, i)?;
                    let cur_dist = self.gs.project(pc.x - cur_base.x, pc.y - cur_base.y);
                    let new_dist = if org_dist == 0 {
                        0
                    } else if old_range == 0 {
                        org_dist
                    } else {
                        math::mul_div(org_dist, cur_range, old_range)
                    };
                    self.move_point(2, i, new_dist - cur_dist, true)?;
                }
                self.gs.loop_count = 1;
            }
            op::MSIRP0 | op::MSIRP1 => {
                let d = self.pop();
                let i = self.pop();
                if self.gs.zp[1] == 0 {
                    let rp0 = self.gs.rp[0];
                    let base = self.point(0, PointType::Unhinted, rp0)?;
                    let fv = self.gs.fv;
                    let p = Point::new(base.x + mul14(d, fv.x), base.y + mul14(d, fv.y));
                    self.set_point(1, PointType::Unhinted, i, p)?;
                    self.set_point(1, PointType::Current, i, p)?;
                }
                let p = self.point(1, PointType::Current, i)?;
                let r = self.point(0, PointType::Current, self.gs.rp[0])?;
                let distance = self.gs.project(p.x - r.x, p.y - r.y);
                self.move_point(1, i, d - distance, true)?;
                self.gs.rp[1] = self.gs.rp[0];
                self.gs.rp[2] = i;
                if opcode == op::MSIRP1 {
                    self.gs.rp[0] = i;
                }
            }
            op::ALIGNRP => {
                if self.top < self.gs.loop_count as usize {
                    return Err(ValueStackUnderflow);
                }
                let r = self.point(0, PointType::Current, self.gs.rp[0])?;
                for _ in 0..self.gs.loop_count {
                    let i = self.pop();
                    let p = self.point(1, PointType::Current, i)?;
                    let d = self.gs.project(p.x - r.x, p.y - r.y);
                    self.move_point(1, i, -d, true)?;
                }
                self.gs.loop_count = 1;
            }
            op::ALIGNPTS => {
                let i2 = self.pop(); // through zp0
                let i1 = self.pop(); // through zp1
                let p1 = self.point(1, PointType::Current, i1)?;
                let p2 = self.point(0, PointType::Current, i2)?;
                let d = self.gs.project(p2.x - p1.x, p2.y - p1.y) / 2;
                self.move_point(1, i1, d, true)?;
                self.move_point(0, i2, -d, true)?;
            }
            op::SCFS => {
                let d = self.pop();
                let i = self.pop();
                let p = self.point(2, PointType::Current, i)?;
                let proj = self.gs.project(p.x, p.y);
                self.move_point(2, i, d - proj, true)?;
                if self.gs.zp[2] == 0 {
                    let moved = self.point(2, PointType::Current, i)?;
                    self.set_point(2, PointType::Unhinted, i, moved)?;
                }
            }
            op::UTP => {
                let i = self.pop();
                let fv = self.gs.fv;
                let index = self.point_index(i)?;
                let zone = self.zone_mut(self.gs.zp[0]);
                let flags = zone.flags.get_mut(index).ok_or(InvalidPointIndex(index))?;
                if fv.x != F2Dot14::ZERO {
                    flags.clear_marker(PointMarker::TOUCHED_X);
                }
                if fv.y != F2Dot14::ZERO {
                    flags.clear_marker(PointMarker::TOUCHED_Y);
                }
            }
            op::FLIPPT => {
                if self.top < self.gs.loop_count as usize {
                    return Err(ValueStackUnderflow);
                }
                for _ in 0..self.gs.loop_count {
                    let i = self.pop();
                    let index = usize::try_from(i)
                        .ok()
                        .filter(|i| *i < self.glyph.flags.len())
                        .ok_or(InvalidPointIndex(i.max(0) as usize))?;
                    let on = self.glyph.flags[index].is_on_curve();
                    self.glyph.flags[index] = if on {
                        PointFlags::off_curve()
                    } else {
                        PointFlags::on_curve()
                    };
                }
                self.gs.loop_count = 1;
            }
            op::FLIPRGON | op::FLIPRGOFF => {
                let high = self.pop();
                let low = self.pop();
                if low < 0 || high < low || high as usize >= self.glyph.flags.len() {
                    return Err(InvalidPointRange(low.max(0) as usize, high.max(0) as usize));
                }
                for flags in &mut self.glyph.flags[low as usize..=high as usize] {
                    *flags = if opcode == op::FLIPRGON {
                        PointFlags::on_curve()
                    } else {
                        PointFlags::off_curve()
                    };
                }
            }
            op::MDRP00000..=op::MDRP11111 => {
                let i = self.pop();
                let old_dist = self.original_distance(i, self.gs.rp[0])?;
                let distance = self.relative_distance(opcode, old_dist);
                let p = self.point(1, PointType::Current, i)?;
                let r = self.point(0, PointType::Current, self.gs.rp[0])?;
                let cur_dist = self.gs.project(p.x - r.x, p.y - r.y);
                self.move_point(1, i, distance - cur_dist, true)?;
                self.gs.rp[1] = self.gs.rp[0];
                self.gs.rp[2] = i;
                if opcode & 0x10 != 0 {
                    self.gs.rp[0] = i;
                }
            }
            op::MIRP00000..=op::MIRP11111 => {
                let cvt_entry = self.pop();
                let i = self.pop();
                let mut cvt_dist = self.read_cvt(cvt_entry)?;
                // Single width cut-in applies to the control value.
                if (cvt_dist - self.gs.single_width).abs() < self.gs.single_width_cut_in {
                    cvt_dist = if cvt_dist >= 0 {
                        self.gs.single_width
                    } else {
                        -self.gs.single_width
                    };
                }
                if self.gs.zp[1] == 0 {
                    let rp0 = self.gs.rp[0];
                    let base = self.point(0, PointType::Unhinted, rp0)?;
                    let fv = self.gs.fv;
                    let p = Point::new(base.x + mul14(cvt_dist, fv.x), base.y + mul14(cvt_dist, fv.y));
                    self.set_point(1, PointType::Unhinted, i, p)?;
                    self.set_point(1, PointType::Current, i, p)?;
                }
                let old_dist = self.original_distance(i, self.gs.rp[0])?;
                if self.gs.auto_flip && (old_dist ^ cvt_dist) < 0 {
                    cvt_dist = -cvt_dist;
                }
                let mut distance = cvt_dist;
                if opcode & 0x04 != 0 {
                    if self.gs.zp[0] == self.gs.zp[1]
                        && (cvt_dist - old_dist).abs() > self.gs.control_value_cut_in
                    {
                        distance = old_dist;
                    }
                    distance = self.gs.round.round(distance);
                }
                if opcode & 0x08 != 0 {
                    distance = apply_min_dist(distance, old_dist, self.gs.min_dist);
                }
                let p = self.point(1, PointType::Current, i)?;
                let r = self.point(0, PointType::Current, self.gs.rp[0])?;
                let cur_dist = self.gs.project(p.x - r.x, p.y - r.y);
                self.move_point(1, i, distance - cur_dist, true)?;
                self.gs.rp[1] = self.gs.rp[0];
                self.gs.rp[2] = i;
                if opcode & 0x10 != 0 {
                    self.gs.rp[0] = i;
                }
            }
            op::SDPVTL0 | op::SDPVTL1 => {
                let i1 = self.pop();
                let i2 = self.pop();
                let perp = opcode & 1 != 0;
                let q = self.point(2, PointType::Unhinted, i1)?;
                let p = self.point(1, PointType::Unhinted, i2)?;
                self.gs.dv = line_vector(p - q, perp);
                let qc = self.point(2, PointType::Current, i1)?;
                let pc = self.point(1, PointType::Current, i2)?;
                self.gs.pv = line_vector(pc - qc, perp);
            }

            // Silently ignored.
            op::SANGW | op::AA | op::SCANCTRL | op::SCANTYPE | op::DEBUG => {
                self.pop();
            }
            op::INSTCTRL => {
                self.pop();
                self.pop();
            }

            _ => return Err(HintErrorKind::UnhandledOpcode(opcode)),
        }
        Ok(())
    }

    // Stack primitives. Underflow for the fixed-arity opcodes is
    // checked against the pop-count table before dispatch.
    fn pop(&mut self) -> i32 {
        debug_assert!(self.top > 0);
        self.top -= 1;
        self.stack[self.top]
    }

    fn push(&mut self, v: i32) -> Result<(), HintErrorKind> {
        if self.top >= self.stack.len() {
            return Err(HintErrorKind::ValueStackOverflow);
        }
        self.stack[self.top] = v;
        self.top += 1;
        Ok(())
    }

    fn binary(&mut self, f: impl FnOnce(i32, i32) -> i32) -> Result<(), HintErrorKind> {
        let b = self.pop();
        let a = self.pop();
        self.push(f(a, b))
    }

    fn set_round(&mut self, period: i32, phase: i32, threshold: i32) {
        self.gs.round = super::graphics::RoundState {
            period,
            phase,
            threshold,
        };
    }

    fn zone(&self, zone: u8) -> &Zone<'a> {
        if zone == 0 {
            &self.twilight
        } else {
            &self.glyph
        }
    }

    fn zone_mut(&mut self, zone: u8) -> &mut Zone<'a> {
        if zone == 0 {
            &mut self.twilight
        } else {
            &mut self.glyph
        }
    }

    fn point_index(&self, i: i32) -> Result<usize, HintErrorKind> {
        usize::try_from(i).map_err(|_| HintErrorKind::InvalidPointIndex(0))
    }

    /// Reads a point from one of the three per-zone arrays, as raw
    /// 26.6 (or font unit) bits.
    fn point(&self, zp: usize, ty: PointType, i: i32) -> Result<Point<i32>, HintErrorKind> {
        let index = self.point_index(i)?;
        let zone = self.zone(self.gs.zp[zp]);
        match ty {
            PointType::Current => zone.current.get(index).map(|p| p.map(F26Dot6::to_bits)),
            PointType::Unhinted => zone.unhinted.get(index).map(|p| p.map(F26Dot6::to_bits)),
            PointType::InFontUnits => zone.in_font_units.get(index).copied(),
        }
        .ok_or(HintErrorKind::InvalidPointIndex(index))
    }

    fn set_point(
        &mut self,
        zp: usize,
        ty: PointType,
        i: i32,
        p: Point<i32>,
    ) -> Result<(), HintErrorKind> {
        let index = self.point_index(i)?;
        let zone = self.zone_mut(self.gs.zp[zp]);
        match ty {
            PointType::Current => {
                *zone
                    .current
                    .get_mut(index)
                    .ok_or(HintErrorKind::InvalidPointIndex(index))? =
                    p.map(F26Dot6::from_bits);
            }
            PointType::Unhinted => {
                *zone
                    .unhinted
                    .get_mut(index)
                    .ok_or(HintErrorKind::InvalidPointIndex(index))? =
                    p.map(F26Dot6::from_bits);
            }
            PointType::InFontUnits => {
                *zone
                    .in_font_units
                    .get_mut(index)
                    .ok_or(HintErrorKind::InvalidPointIndex(index))? = p;
            }
        }
        Ok(())
    }

    /// Moves a point along the freedom vector so its projection changes
    /// by `distance`.
    fn move_point(
        &mut self,
        zp: usize,
        i: i32,
        distance: i32,
        touch: bool,
    ) -> Result<(), HintErrorKind> {
        let fv = self.gs.fv;
        let pv = self.gs.pv;
        let index = self.point_index(i)?;
        let zone = self.zone_mut(self.gs.zp[zp]);
        let p = zone
            .current
            .get_mut(index)
            .ok_or(HintErrorKind::InvalidPointIndex(index))?;
        let flags = zone
            .flags
            .get_mut(index)
            .ok_or(HintErrorKind::InvalidPointIndex(index))?;
        if fv.x == F2Dot14::ONE && pv.x == F2Dot14::ONE {
            *p = Point::new(
                F26Dot6::from_bits(p.x.to_bits().wrapping_add(distance)),
                p.y,
            );
            if touch {
                flags.set_marker(PointMarker::TOUCHED_X);
            }
            return Ok(());
        }
        if fv.y == F2Dot14::ONE && pv.y == F2Dot14::ONE {
            *p = Point::new(
                p.x,
                F26Dot6::from_bits(p.y.to_bits().wrapping_add(distance)),
            );
            if touch {
                flags.set_marker(PointMarker::TOUCHED_Y);
            }
            return Ok(());
        }
        let fvx = fv.x.to_bits() as i64;
        let fvy = fv.y.to_bits() as i64;
        let pvx = pv.x.to_bits() as i64;
        let pvy = pv.y.to_bits() as i64;
        let mut fdotp = ((fvx * pvx + fvy * pvy) >> 14) as i32;
        if fdotp == 0 {
            fdotp = 0x4000;
        }
        let dx = if fvx != 0 {
            math::mul_div(distance, fvx as i32, fdotp)
        } else {
            0
        };
        let dy = if fvy != 0 {
            math::mul_div(distance, fvy as i32, fdotp)
        } else {
            0
        };
        *p = Point::new(
            F26Dot6::from_bits(p.x.to_bits().wrapping_add(dx)),
            F26Dot6::from_bits(p.y.to_bits().wrapping_add(dy)),
        );
        if touch {
            if fvx != 0 {
                flags.set_marker(PointMarker::TOUCHED_X);
            }
            if fvy != 0 {
                flags.set_marker(PointMarker::TOUCHED_Y);
            }
        }
        Ok(())
    }

    /// Shifts a point by a raw delta, touching the axes the freedom
    /// vector reaches.
    fn shift_point(&mut self, zp: usize, i: i32, dx: i32, dy: i32) -> Result<(), HintErrorKind> {
        let fv = self.gs.fv;
        let index = self.point_index(i)?;
        let zone = self.zone_mut(self.gs.zp[zp]);
        let p = zone
            .current
            .get_mut(index)
            .ok_or(HintErrorKind::InvalidPointIndex(index))?;
        *p = Point::new(
            F26Dot6::from_bits(p.x.to_bits().wrapping_add(dx)),
            F26Dot6::from_bits(p.y.to_bits().wrapping_add(dy)),
        );
        let flags = zone
            .flags
            .get_mut(index)
            .ok_or(HintErrorKind::InvalidPointIndex(index))?;
        if fv.x != F2Dot14::ZERO {
            flags.set_marker(PointMarker::TOUCHED_X);
        }
        if fv.y != F2Dot14::ZERO {
            flags.set_marker(PointMarker::TOUCHED_Y);
        }
        Ok(())
    }

    /// Moves a point of an explicit zone (not through a zone pointer)
    /// without touching it; used by `SHZ`.
    fn move_zone_point(&mut self, zone: u8, i: i32, distance: i32) -> Result<(), HintErrorKind> {
        let fv = self.gs.fv;
        let pv = self.gs.pv;
        let index = usize::try_from(i).map_err(|_| HintErrorKind::InvalidPointIndex(0))?;
        let zone = self.zone_mut(zone);
        let p = zone
            .current
            .get_mut(index)
            .ok_or(HintErrorKind::InvalidPointIndex(index))?;
        let fvx = fv.x.to_bits() as i64;
        let fvy = fv.y.to_bits() as i64;
        let mut fdotp =
            ((fvx * pv.x.to_bits() as i64 + fvy * pv.y.to_bits() as i64) >> 14) as i32;
        if fdotp == 0 {
            fdotp = 0x4000;
        }
        let dx = math::mul_div(distance, fvx as i32, fdotp);
        let dy = math::mul_div(distance, fvy as i32, fdotp);
        *p = Point::new(
            F26Dot6::from_bits(p.x.to_bits().wrapping_add(dx)),
            F26Dot6::from_bits(p.y.to_bits().wrapping_add(dy)),
        );
        Ok(())
    }

    /// How far a reference point has moved from its unhinted position,
    /// projected: the shared setup of `SHP`, `SHC` and `SHZ`.
    fn displacement(&self, use_rp2: bool) -> Result<(u8, i32, i32), HintErrorKind> {
        let (zp, i) = if use_rp2 {
            (1usize, self.gs.rp[2])
        } else {
            (0usize, self.gs.rp[1])
        };
        let p = self.point(zp, PointType::Current, i)?;
        let q = self.point(zp, PointType::Unhinted, i)?;
        let d = self.gs.project(p.x - q.x, p.y - q.y);
        Ok((self.gs.zp[zp], i, d))
    }

    /// The distance between a point (through `zp1`) and the reference
    /// point (through `zp0`) on the original outline, measured along
    /// the dual vector. When both zones are the glyph zone the font
    /// unit coordinates are used and the result scaled, which avoids
    /// accumulated rounding.
    fn original_distance(&self, i: i32, r: i32) -> Result<i32, HintErrorKind> {
        if self.gs.zp[0] == 0 || self.gs.zp[1] == 0 {
            let p = self.point(1, PointType::Unhinted, i)?;
            let q = self.point(0, PointType::Unhinted, r)?;
            Ok(self.gs.dual_project(p.x - q.x, p.y - q.y))
        } else {
            let p = self.point(1, PointType::InFontUnits, i)?;
            let q = self.point(0, PointType::InFontUnits, r)?;
            let d = self.gs.dual_project(p.x - q.x, p.y - q.y);
            Ok(self.font_scale(d))
        }
    }

    /// The single width cut-in, optional rounding and minimum distance
    /// treatment shared by the `MDRP` variants.
    fn relative_distance(&self, opcode: u8, old_dist: i32) -> i32 {
        let mut old_dist = old_dist;
        if (old_dist - self.gs.single_width).abs() < self.gs.single_width_cut_in {
            old_dist = if old_dist >= 0 {
                self.gs.single_width
            } else {
                -self.gs.single_width
            };
        }
        let mut distance = old_dist;
        if opcode & 0x04 != 0 {
            distance = self.gs.round.round(distance);
        }
        if opcode & 0x08 != 0 {
            distance = apply_min_dist(distance, old_dist, self.gs.min_dist);
        }
        distance
    }

    fn isect(&mut self) -> Result<(), HintErrorKind> {
        let b1 = self.pop();
        let b0 = self.pop();
        let a1 = self.pop();
        let a0 = self.pop();
        let point = self.pop();
        let pa0 = self.point(1, PointType::Current, a0)?;
        let pa1 = self.point(1, PointType::Current, a1)?;
        let pb0 = self.point(0, PointType::Current, b0)?;
        let pb1 = self.point(0, PointType::Current, b1)?;
        let dax = (pa1.x - pa0.x) as i64;
        let day = (pa1.y - pa0.y) as i64;
        let dbx = (pb1.x - pb0.x) as i64;
        let dby = (pb1.y - pb0.y) as i64;
        let discriminant = dax * dby - day * dbx;
        let target = if discriminant != 0 {
            let dx = (pb0.x - pa0.x) as i64;
            let dy = (pb0.y - pa0.y) as i64;
            let t = dx * dby - dy * dbx;
            Point::new(
                (pa0.x as i64 + t * dax / discriminant) as i32,
                (pa0.y as i64 + t * day / discriminant) as i32,
            )
        } else {
            // Parallel lines degenerate to the midpoint of all four
            // ends.
            Point::new(
                (pa0.x + pa1.x + pb0.x + pb1.x) / 4,
                (pa0.y + pa1.y + pb0.y + pb1.y) / 4,
            )
        };
        self.set_point(2, PointType::Current, point, target)?;
        let index = self.point_index(point)?;
        let zone = self.zone_mut(self.gs.zp[2]);
        zone.flags
            .get_mut(index)
            .ok_or(HintErrorKind::InvalidPointIndex(index))?
            .set_marker(PointMarker::TOUCHED);
        Ok(())
    }

    /// Interpolate untouched points, per contour of the glyph zone.
    fn iup(&mut self, iup_y: bool) -> Result<(), HintErrorKind> {
        let marker = if iup_y {
            PointMarker::TOUCHED_Y
        } else {
            PointMarker::TOUCHED_X
        };
        let mut start = 0usize;
        for c in 0..self.glyph.ends.len() {
            let end = self.glyph.ends[c];
            if end > self.glyph.current.len() {
                return Err(HintErrorKind::InvalidContourIndex(c as i32));
            }
            // Find the first touched point.
            let mut i = start;
            while i < end && !self.glyph.flags[i].has_marker(marker) {
                i += 1;
            }
            if i < end {
                let first_touched = i;
                let mut cur_touched = i;
                i += 1;
                while i < end {
                    if self.glyph.flags[i].has_marker(marker) {
                        self.iup_interpolate(iup_y, cur_touched + 1, i - 1, cur_touched, i);
                        cur_touched = i;
                    }
                    i += 1;
                }
                if cur_touched == first_touched {
                    // A single touched point shifts its whole contour.
                    self.iup_shift(iup_y, start, end, cur_touched);
                } else {
                    self.iup_interpolate(iup_y, cur_touched + 1, end - 1, cur_touched, first_touched);
                    if first_touched > start {
                        self.iup_interpolate(
                            iup_y,
                            start,
                            first_touched - 1,
                            cur_touched,
                            first_touched,
                        );
                    }
                }
            }
            start = end;
        }
        Ok(())
    }

    fn iup_coord(p: Point<i32>, y: bool) -> i32 {
        if y {
            p.y
        } else {
            p.x
        }
    }

    fn iup_shift(&mut self, iup_y: bool, p1: usize, p2: usize, touched: usize) {
        let cur = Self::iup_coord(self.glyph.current[touched].map(F26Dot6::to_bits), iup_y);
        let unh = Self::iup_coord(self.glyph.unhinted[touched].map(F26Dot6::to_bits), iup_y);
        let delta = cur - unh;
        if delta == 0 {
            return;
        }
        for i in p1..p2 {
            if i == touched {
                continue;
            }
            let p = &mut self.glyph.current[i];
            *p = if iup_y {
                Point::new(p.x, F26Dot6::from_bits(p.y.to_bits().wrapping_add(delta)))
            } else {
                Point::new(F26Dot6::from_bits(p.x.to_bits().wrapping_add(delta)), p.y)
            };
        }
    }

    fn iup_interpolate(&mut self, iup_y: bool, p1: usize, p2: usize, mut ref1: usize, mut ref2: usize) {
        if p1 > p2 {
            return;
        }
        let coord_ifu = |z: &Zone, i: usize| Self::iup_coord(z.in_font_units[i], iup_y);
        let mut ifu1 = coord_ifu(&self.glyph, ref1);
        let mut ifu2 = coord_ifu(&self.glyph, ref2);
        if ifu1 > ifu2 {
            std::mem::swap(&mut ifu1, &mut ifu2);
            std::mem::swap(&mut ref1, &mut ref2);
        }
        let unh1 = Self::iup_coord(self.glyph.unhinted[ref1].map(F26Dot6::to_bits), iup_y);
        let unh2 = Self::iup_coord(self.glyph.unhinted[ref2].map(F26Dot6::to_bits), iup_y);
        let cur1 = Self::iup_coord(self.glyph.current[ref1].map(F26Dot6::to_bits), iup_y);
        let cur2 = Self::iup_coord(self.glyph.current[ref2].map(F26Dot6::to_bits), iup_y);
        let d1 = cur1 - unh1;
        let d2 = cur2 - unh2;
        for i in p1..=p2 {
            let ifu = coord_ifu(&self.glyph, i);
            let unh = Self::iup_coord(self.glyph.unhinted[i].map(F26Dot6::to_bits), iup_y);
            let new = if ifu <= ifu1 {
                unh + d1
            } else if ifu >= ifu2 {
                unh + d2
            } else {
                cur1 + math::mul_div(ifu - ifu1, cur2 - cur1, ifu2 - ifu1)
            };
            let p = &mut self.glyph.current[i];
            *p = if iup_y {
                Point::new(p.x, F26Dot6::from_bits(new))
            } else {
                Point::new(F26Dot6::from_bits(new), p.y)
            };
        }
    }

    /// Decodes a delta exception argument into a movement, if its ppem
    /// selector matches the current size.
    fn delta_value(&self, b: i32, offset: i32) -> Option<i32> {
        let ppem = (b >> 4) & 0x0f;
        if self.gs.delta_base + offset + ppem != self.scale >> 6 {
            return None;
        }
        let mut magnitude = (b & 0x0f) - 8;
        if magnitude >= 0 {
            magnitude += 1;
        }
        Some(magnitude * 64 / (1 << self.gs.delta_shift))
    }

    fn read_cvt(&self, i: i32) -> Result<i32, HintErrorKind> {
        usize::try_from(i)
            .ok()
            .and_then(|i| self.cvt.get(i))
            .copied()
            .ok_or(HintErrorKind::InvalidCvtIndex(i))
    }

    fn write_cvt(&mut self, i: i32, v: i32) -> Result<(), HintErrorKind> {
        let slot = usize::try_from(i)
            .ok()
            .and_then(|i| self.cvt.get_mut(i))
            .ok_or(HintErrorKind::InvalidCvtIndex(i))?;
        *slot = v;
        Ok(())
    }

    /// FUnits to 26.6 pixels at the current scale.
    fn font_scale(&self, v: i32) -> i32 {
        self.font
            .scale(F26Dot6::from_bits(self.scale), v)
            .to_bits()
    }
}

/// 2.14 multiplication against a 26.6 value.
fn mul14(a: i32, b: F2Dot14) -> i32 {
    ((a as i64 * b.to_bits() as i64) >> 14) as i32
}

/// Builds a 2.14 unit vector along (or perpendicular to) a 26.6 line
/// delta.
fn line_vector(d: Point<i32>, perpendicular: bool) -> Point<F2Dot14> {
    let (dx, dy) = if d.x == 0 && d.y == 0 {
        (0x4000, 0)
    } else if perpendicular {
        (-d.y, d.x)
    } else {
        (d.x, d.y)
    };
    math::normalize(dx, dy)
}

fn apply_min_dist(distance: i32, old_dist: i32, min_dist: i32) -> i32 {
    if old_dist >= 0 {
        distance.max(min_dist)
    } else {
        distance.min(-min_dist)
    }
}

/// The number of inline payload bytes following the opcode at `pc`.
fn payload_len(program: &[u8], pc: usize) -> Result<usize, HintErrorKind> {
    let opcode = program[pc];
    Ok(match opcode {
        op::NPUSHB => {
            1 + *program
                .get(pc + 1)
                .ok_or(HintErrorKind::UnexpectedEndOfBytecode)? as usize
        }
        op::NPUSHW => {
            1 + 2 * *program
                .get(pc + 1)
                .ok_or(HintErrorKind::UnexpectedEndOfBytecode)? as usize
        }
        op::PUSHB000..=op::PUSHB111 => (opcode - op::PUSHB000) as usize + 1,
        op::PUSHW000..=op::PUSHW111 => 2 * ((opcode - op::PUSHW000) as usize + 1),
        _ => 0,
    })
}

/// Skips over an untaken `IF` (or a finished taken branch at `ELSE`)
/// to the instruction after the branch point, honoring nesting and
/// inline push payloads.
fn skip_branch(program: &[u8], mut pc: usize, stop_at_else: bool) -> Result<usize, HintErrorKind> {
    let mut depth = 0u32;
    loop {
        pc = pc
            .checked_add(1 + payload_len(program, pc)?)
            .ok_or(HintErrorKind::UnbalancedIfElse)?;
        let opcode = *program.get(pc).ok_or(HintErrorKind::UnbalancedIfElse)?;
        match opcode {
            op::IF => depth += 1,
            op::ELSE if depth == 0 && stop_at_else => return Ok(pc + 1),
            op::EIF if depth == 0 => return Ok(pc + 1),
            op::EIF => depth -= 1,
            _ => {}
        }
    }
}

/// Finds the `ENDF` terminating a function body that starts at `pc`.
fn scan_definition(program: &[u8], mut pc: usize) -> Result<usize, HintErrorKind> {
    loop {
        let opcode = *program.get(pc).ok_or(HintErrorKind::UnbalancedDefinition)?;
        match opcode {
            op::ENDF => return Ok(pc),
            op::FDEF | op::IDEF => return Err(HintErrorKind::NestedDefinition),
            _ => pc += 1 + payload_len(program, pc)?,
        }
    }
}
