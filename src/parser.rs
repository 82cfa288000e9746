use std::{error::Error, fmt, rc::Rc};

use crate::definition::{Definitions, Instruction};
use crate::param::Param;

/// Marker starting a comment, which runs to the end of the line.
pub const DEFAULT_COMMENTER: &str = "--";

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ParseComment {
    Ok,
    NoCode,
    /// Unknown opcode token.
    InvalidInstruction,
    /// Wrong number of operands.
    InvalidParameters,
    /// Malformed operand, or an operand kind the opcode does not accept.
    InvalidParameter,
}

impl fmt::Display for ParseComment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::NoCode => write!(f, "NO_CODE"),
            Self::InvalidInstruction => write!(f, "INVALID_INSTRUCTION"),
            Self::InvalidParameters => write!(f, "INVALID_PARAMETERS"),
            Self::InvalidParameter => write!(f, "INVALID_PARAMETER"),
        }
    }
}

/// Outcome of parsing a whole program.
///
/// On success `line` is the number of instructions parsed. On failure it is the 0-based index
/// of the offending source line, or 0 for [`ParseComment::NoCode`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ParseResult {
    pub success: bool,
    pub comment: ParseComment,
    pub line: usize,
}

/// Failed parse.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ParseError {
    pub comment: ParseComment,
    pub line: usize,
}

impl ParseResult {
    pub fn ok(count: usize) -> Self {
        ParseResult {
            success: true,
            comment: ParseComment::Ok,
            line: count,
        }
    }

    pub fn failure(comment: ParseComment, line: usize) -> Self {
        ParseResult {
            success: false,
            comment,
            line,
        }
    }

    /// Instruction count, or the error.
    pub fn into_result(self) -> Result<usize, ParseError> {
        if self.success {
            Ok(self.line)
        } else {
            Err(ParseError {
                comment: self.comment,
                line: self.line,
            })
        }
    }
}

impl From<Result<usize, ParseError>> for ParseResult {
    fn from(result: Result<usize, ParseError>) -> Self {
        match result {
            Ok(count) => ParseResult::ok(count),
            Err(error) => ParseResult::failure(error.comment, error.line),
        }
    }
}

impl Error for ParseError {}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.comment {
            ParseComment::Ok => write!(f, "No error"),
            ParseComment::NoCode => write!(f, "Program contains no instructions"),
            ParseComment::InvalidInstruction => {
                write!(f, "Unknown instruction on line {}", self.line)
            }
            ParseComment::InvalidParameters => {
                write!(f, "Wrong number of operands on line {}", self.line)
            }
            ParseComment::InvalidParameter => {
                write!(f, "Invalid operand on line {}", self.line)
            }
        }
    }
}

/// Turns source lines into instructions, resolving opcodes against a definition set.
pub struct LineParser<'a> {
    definitions: &'a Definitions,
    commenter: &'a str,
}

impl<'a> LineParser<'a> {
    pub fn new(definitions: &'a Definitions, commenter: &'a str) -> Self {
        LineParser {
            definitions,
            commenter,
        }
    }

    /// Parse every line, stopping at the first bad one.
    pub fn parse<S: AsRef<str>>(&self, lines: &[S]) -> Result<Vec<Instruction>, ParseError> {
        let mut program = Vec::new();
        for (line, text) in lines.iter().enumerate() {
            let instr = self
                .parse_line(text.as_ref(), line)
                .map_err(|comment| ParseError { comment, line })?;
            if let Some(instr) = instr {
                program.push(instr);
            }
        }
        if program.is_empty() {
            return Err(ParseError {
                comment: ParseComment::NoCode,
                line: 0,
            });
        }
        Ok(program)
    }

    /// `None` for a line with nothing but whitespace or comments.
    fn parse_line(&self, text: &str, line: usize) -> Result<Option<Instruction>, ParseComment> {
        let mut parts = self.strip_comment(text).split_whitespace();
        let Some(token) = parts.next() else {
            return Ok(None);
        };
        let definition = self
            .definitions
            .get(token)
            .ok_or(ParseComment::InvalidInstruction)?;

        let operands: Vec<&str> = parts.collect();
        let constraints = definition.constraints();
        if operands.len() != constraints.len() {
            return Err(ParseComment::InvalidParameters);
        }

        let params = operands
            .iter()
            .zip(constraints)
            .map(|(operand, constraint)| match operand.parse::<Param>() {
                Ok(param) if constraint.accepts(&param) => Ok(param),
                _ => Err(ParseComment::InvalidParameter),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(Instruction::new(Rc::clone(definition), params, line)))
    }

    fn strip_comment<'s>(&self, text: &'s str) -> &'s str {
        let end = match self.commenter {
            "" => None,
            commenter => text.find(commenter),
        };
        text[..end.unwrap_or(text.len())].trim()
    }
}
