//! Hinting error definitions.

use super::engine::ProgramKind;

/// Errors that may occur when interpreting TrueType bytecode.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum HintErrorKind {
    UnexpectedEndOfBytecode,
    UnhandledOpcode(u8),
    ProgramTooLarge,
    TooManySteps,
    UnbalancedIfElse,
    UnbalancedDefinition,
    NestedDefinition,
    InvalidDefinition(i32),
    ValueStackOverflow,
    ValueStackUnderflow,
    CallStackOverflow,
    CallStackUnderflow,
    InvalidStackValue(i32),
    InvalidPointIndex(usize),
    InvalidPointRange(usize, usize),
    InvalidContourIndex(i32),
    InvalidCvtIndex(i32),
    InvalidStorageIndex(i32),
    InvalidZoneIndex(i32),
    NegativeLoopCounter,
    InvalidJump,
    DivideByZero,
}

impl std::fmt::Display for HintErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnexpectedEndOfBytecode => write!(f, "insufficient data in bytecode stream"),
            Self::UnhandledOpcode(opcode) => write!(f, "unimplemented instruction {opcode:#04x}"),
            Self::ProgramTooLarge => write!(f, "too many instructions"),
            Self::TooManySteps => write!(f, "too many steps"),
            Self::UnbalancedIfElse => write!(f, "unbalanced if/else"),
            Self::UnbalancedDefinition => write!(f, "unbalanced function definition"),
            Self::NestedDefinition => write!(f, "nested function definition"),
            Self::InvalidDefinition(key) => write!(f, "function definition {key} not found"),
            Self::ValueStackOverflow => write!(f, "stack overflow"),
            Self::ValueStackUnderflow => write!(f, "stack underflow"),
            Self::CallStackOverflow => write!(f, "call stack overflow"),
            Self::CallStackUnderflow => write!(f, "call stack underflow"),
            Self::InvalidStackValue(value) => {
                write!(f, "stack value {value} was invalid for the current operation")
            }
            Self::InvalidPointIndex(index) => write!(f, "point {index} out of range"),
            Self::InvalidPointRange(start, end) => {
                write!(f, "point range {start}..{end} out of bounds")
            }
            Self::InvalidContourIndex(index) => write!(f, "contour index {index} out of range"),
            Self::InvalidCvtIndex(index) => write!(f, "cvt index {index} out of range"),
            Self::InvalidStorageIndex(index) => {
                write!(f, "storage index {index} out of range")
            }
            Self::InvalidZoneIndex(index) => write!(
                f,
                "zone index {index} was invalid (only 0 or 1 are permitted)"
            ),
            Self::NegativeLoopCounter => {
                write!(f, "attempt to set the loop counter to a negative value")
            }
            Self::InvalidJump => write!(f, "the target of a jump instruction was invalid"),
            Self::DivideByZero => write!(f, "division by zero"),
        }
    }
}

/// A hinting failure with the program location where it occurred.
#[derive(Clone, Debug)]
pub struct HintError {
    pub program: ProgramKind,
    pub pc: usize,
    pub opcode: Option<u8>,
    pub kind: HintErrorKind,
}

impl std::fmt::Display for HintError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.program {
            ProgramKind::ControlValue => write!(f, "prep")?,
            ProgramKind::Font => write!(f, "fpgm")?,
            ProgramKind::Glyph => write!(f, "glyf")?,
        }
        match self.opcode {
            Some(opcode) => write!(f, "@{}:{opcode:#04x}: {}", self.pc, self.kind),
            None => write!(f, "@{}: {}", self.pc, self.kind),
        }
    }
}

impl std::error::Error for HintError {}
