use std::{error::Error, fmt, str::FromStr};

use lazy_static::lazy_static;
use regex::Regex;

use crate::memory::{Memory, MemoryError};

lazy_static! {
    /// Optional single addressing marker, then a signed decimal integer.
    static ref OPERAND: Regex = Regex::new(r"^([#>])?(-?[0-9]+)$").unwrap();
}

/// How an operand value is interpreted.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ParamKind {
    /// Immediate value. No prefix.
    Constant,
    /// Memory address. Prefixed with `#`.
    Location,
    /// Address of a cell holding an address. Prefixed with `>`.
    Indirect,
}

/// Operand kinds an opcode accepts in a given position.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Constraint {
    Constant,
    /// Anything that is not a constant.
    Memory,
    ConstantOrMemory,
}

impl Constraint {
    pub fn accepts(self, param: &Param) -> bool {
        match self {
            Constraint::Constant => param.kind == ParamKind::Constant,
            Constraint::Memory => param.kind != ParamKind::Constant,
            Constraint::ConstantOrMemory => true,
        }
    }
}

/// Operand bound to an instruction.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Param {
    pub kind: ParamKind,
    pub value: i32,
}

/// Error tokenizing an operand.
#[derive(Debug, PartialEq, Eq)]
pub enum ParamError {
    Malformed { token: String },
}

impl Error for ParamError {}

impl fmt::Display for ParamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamError::Malformed { token } => write!(f, "Malformed operand `{}`", token),
        }
    }
}

impl Param {
    pub fn new(kind: ParamKind, value: i32) -> Self {
        Param { kind, value }
    }

    pub fn constant(value: i32) -> Self {
        Self::new(ParamKind::Constant, value)
    }

    pub fn location(value: i32) -> Self {
        Self::new(ParamKind::Location, value)
    }

    pub fn indirect(value: i32) -> Self {
        Self::new(ParamKind::Indirect, value)
    }

    /// Resolve the operand to a value.
    pub fn read(&self, memory: &Memory) -> Result<i32, MemoryError> {
        match self.kind {
            ParamKind::Constant => Ok(self.value),
            ParamKind::Location => memory.get(self.value),
            ParamKind::Indirect => memory.get_indirect(self.value),
        }
    }

    /// Store through the operand.
    ///
    /// A constant has nowhere to store to, so it takes the value itself.
    pub fn write(&mut self, memory: &mut Memory, value: i32) -> Result<(), MemoryError> {
        match self.kind {
            ParamKind::Constant => {
                self.value = value;
                Ok(())
            }
            ParamKind::Location => memory.set(self.value, value),
            ParamKind::Indirect => memory.set_indirect(self.value, value),
        }
    }
}

impl FromStr for Param {
    type Err = ParamError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let malformed = || ParamError::Malformed {
            token: token.to_string(),
        };
        let captures = OPERAND.captures(token).ok_or_else(malformed)?;
        let kind = match captures.get(1).map(|marker| marker.as_str()) {
            Some("#") => ParamKind::Location,
            Some(">") => ParamKind::Indirect,
            _ => ParamKind::Constant,
        };
        // Digits beyond `i32` are rejected like any other malformed literal
        let value = captures[2].parse::<i32>().map_err(|_| malformed())?;
        Ok(Param { kind, value })
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ParamKind::Constant => write!(f, "{}", self.value),
            ParamKind::Location => write!(f, "#{}", self.value),
            ParamKind::Indirect => write!(f, ">{}", self.value),
        }
    }
}
