// Machine
mod memory;
pub use memory::{Memory, MemoryError};
mod param;
pub use param::{Constraint, Param, ParamError, ParamKind};
mod definition;
pub use definition::{Context, Definition, Definitions, Fault, Instruction, RegistryError};
pub mod isa;

// Parsing and stepping
mod parser;
pub use parser::{LineParser, ParseComment, ParseError, ParseResult, DEFAULT_COMMENTER};
mod cpu;
pub use cpu::{Cpu, RunSummary, StepComment, StepError, StepResult};

// Host side
pub mod env;
pub mod error;
pub mod output;

/// Amount of lines to show as context, each side of focus line (line containing span).
pub const DIAGNOSTIC_CONTEXT_LINES: usize = 4;
