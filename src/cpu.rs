use std::{error::Error, fmt};

use crate::definition::{Context, Definitions, Fault, Instruction};
use crate::memory::Memory;
use crate::parser::{LineParser, ParseResult, DEFAULT_COMMENTER};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StepComment {
    Ok,
    /// Pointer is outside of the program.
    EndOfCode,
    /// The instruction at the pointer failed.
    NoInstruction,
}

impl fmt::Display for StepComment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::EndOfCode => write!(f, "END_OF_CODE"),
            Self::NoInstruction => write!(f, "NO_INSTRUCTION"),
        }
    }
}

/// Outcome of a single step. `line` is the pointer after the step.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct StepResult {
    pub success: bool,
    pub comment: StepComment,
    pub line: isize,
}

/// Failed step.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct StepError {
    pub comment: StepComment,
    pub line: isize,
}

impl StepResult {
    pub fn ok(line: isize) -> Self {
        StepResult {
            success: true,
            comment: StepComment::Ok,
            line,
        }
    }

    pub fn failure(comment: StepComment, line: isize) -> Self {
        StepResult {
            success: false,
            comment,
            line,
        }
    }

    /// New pointer, or the error.
    pub fn into_result(self) -> Result<isize, StepError> {
        if self.success {
            Ok(self.line)
        } else {
            Err(StepError {
                comment: self.comment,
                line: self.line,
            })
        }
    }
}

impl Error for StepError {}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.comment {
            StepComment::Ok => write!(f, "No error"),
            StepComment::EndOfCode => write!(f, "Reached end of code at {}", self.line),
            StepComment::NoInstruction => {
                write!(f, "Instruction {} failed to execute", self.line)
            }
        }
    }
}

/// Summary of [`Cpu::run`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RunSummary {
    /// Successful steps taken.
    pub steps: usize,
    /// Result of the final step, or `None` if the limit was zero.
    pub last: Option<StepResult>,
}

/// The virtual machine: a program, a pointer into it, and memory.
///
/// Register definitions, [`Cpu::parse`] a program, then [`Cpu::step`] it.
pub struct Cpu {
    pointer: isize,
    memory: Memory,
    program: Vec<Instruction>,
    definitions: Definitions,
    commenter: String,
    /// Cause of the last `NO_INSTRUCTION`, for post-mortem inspection.
    last_fault: Option<Fault>,
}

impl Cpu {
    pub fn new(memory: Memory) -> Self {
        Cpu {
            pointer: 0,
            memory,
            program: Vec::new(),
            definitions: Definitions::new(),
            commenter: DEFAULT_COMMENTER.to_string(),
            last_fault: None,
        }
    }

    pub fn with_commenter(mut self, commenter: impl Into<String>) -> Self {
        self.commenter = commenter.into();
        self
    }

    pub fn pointer(&self) -> isize {
        self.pointer
    }

    pub fn set_pointer(&mut self, value: isize) {
        self.pointer = value;
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.program
    }

    pub fn definitions(&self) -> &Definitions {
        &self.definitions
    }

    /// Registry to populate before parsing.
    pub fn definitions_mut(&mut self) -> &mut Definitions {
        &mut self.definitions
    }

    pub fn commenter(&self) -> &str {
        &self.commenter
    }

    pub fn last_fault(&self) -> Option<Fault> {
        self.last_fault
    }

    /// Replace the program with the parsed lines.
    ///
    /// The previous program is dropped even when parsing fails. Memory and pointer are untouched.
    pub fn parse<S: AsRef<str>>(&mut self, lines: &[S]) -> ParseResult {
        self.program.clear();
        let parser = LineParser::new(&self.definitions, &self.commenter);
        let result = parser.parse(lines).map(|program| {
            self.program = program;
            self.program.len()
        });
        ParseResult::from(result)
    }

    fn current(&self) -> Option<usize> {
        usize::try_from(self.pointer)
            .ok()
            .filter(|&index| index < self.program.len())
    }

    /// Execute the instruction at the pointer.
    ///
    /// On success the pointer advances by one, even after a jump. Since jumps land on a label,
    /// execution continues right after it.
    pub fn step(&mut self) -> StepResult {
        let Some(index) = self.current() else {
            return StepResult::failure(StepComment::EndOfCode, self.pointer);
        };

        let start = self.pointer;
        let instr = &self.program[index];
        let mut params = instr.params().to_vec();
        let mut ctx = Context {
            memory: &mut self.memory,
            pointer: &mut self.pointer,
            program: &self.program,
        };

        match instr.definition().execute(&mut ctx, &mut params) {
            Ok(()) => {
                self.last_fault = None;
                self.pointer += 1;
                StepResult::ok(self.pointer)
            }
            Err(fault) => {
                self.last_fault = Some(fault);
                self.pointer = start;
                StepResult::failure(StepComment::NoInstruction, start)
            }
        }
    }

    /// Step until a step fails or `limit` steps have been taken.
    pub fn run(&mut self, limit: usize) -> RunSummary {
        let mut summary = RunSummary {
            steps: 0,
            last: None,
        };
        while summary.steps < limit {
            let result = self.step();
            summary.last = Some(result);
            if !result.success {
                break;
            }
            summary.steps += 1;
        }
        summary
    }

    /// Pointer back to the start and memory zeroed. The program is kept.
    pub fn reset(&mut self) {
        self.pointer = 0;
        self.last_fault = None;
        self.memory.reset();
    }
}

impl fmt::Debug for Cpu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cpu")
            .field("pointer", &self.pointer)
            .field("memory", &self.memory)
            .field("program", &self.program)
            .field("definitions", &self.definitions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::definition::Definition;
    use crate::isa;
    use crate::memory::MemoryError;
    use crate::param::{Constraint, Param};
    use crate::parser::ParseComment;

    /// Machine with the named subset of the reference instruction set.
    fn machine(size: usize, tokens: &[&str]) -> Cpu {
        let mut cpu = Cpu::new(Memory::new(size));
        let definitions = isa::builtins()
            .into_iter()
            .filter(|definition| tokens.iter().any(|&token| token == definition.token()));
        cpu.definitions_mut().register_all(definitions).unwrap();
        cpu
    }

    fn basic() -> Cpu {
        machine(16, &["LBL", "ADD", "JMP"])
    }

    fn step_n(cpu: &mut Cpu, n: usize) {
        for i in 0..n {
            let result = cpu.step();
            assert!(result.success, "step {i}: {result:?}");
        }
    }

    #[test]
    fn loop_with_jump() {
        let mut cpu = basic();
        let result = cpu.parse(&["LBL 0", "ADD #1 1", "JMP 0"]);
        assert_eq!(result, ParseResult::ok(3));

        step_n(&mut cpu, 5);
        assert_eq!(cpu.memory().get(1), Ok(2));
        step_n(&mut cpu, 2);
        assert_eq!(cpu.memory().get(1), Ok(3));
    }

    #[test]
    fn jump_lands_after_label() {
        let mut cpu = basic();
        cpu.parse(&["LBL 0", "ADD #1 1", "JMP 0"]);
        assert_eq!(cpu.step(), StepResult::ok(1));
        assert_eq!(cpu.step(), StepResult::ok(2));
        assert_eq!(cpu.step(), StepResult::ok(1));
    }

    #[test]
    fn step_without_code() {
        let mut cpu = basic();
        assert_eq!(
            cpu.step(),
            StepResult::failure(StepComment::EndOfCode, 0)
        );
    }

    #[test]
    fn parse_without_code() {
        let mut cpu = basic();
        let result = cpu.parse::<&str>(&[]);
        assert_eq!(result, ParseResult::failure(ParseComment::NoCode, 0));
        assert!(cpu.instructions().is_empty());
    }

    #[test]
    fn end_of_code_is_stable() {
        let mut cpu = machine(16, &["LBL"]);
        assert!(cpu.parse(&["LBL 0"]).success);
        cpu.step();
        let before = cpu.memory().clone();
        for _ in 0..3 {
            assert_eq!(
                cpu.step(),
                StepResult::failure(StepComment::EndOfCode, 1)
            );
        }
        assert_eq!(cpu.memory(), &before);
        assert_eq!(cpu.pointer(), 1);

        cpu.set_pointer(-1);
        assert_eq!(
            cpu.step(),
            StepResult::failure(StepComment::EndOfCode, -1)
        );
    }

    #[test]
    fn direct_and_indirect() {
        let cases: [(&[&str], usize, i32); 4] = [
            (&["ADD #0 1", "ADD #0 #0", "ADD >0 101"], 2, 101),
            (&["ADD #0 1", "ADD #1 1", "ADD #3 #0", "ADD #3 #1"], 3, 2),
            (&["ADD #0 1", "ADD >0 2", "ADD #3 >0"], 3, 2),
            (&["ADD #2 0", "ADD #0 101", "ADD #1 >2"], 1, 101),
        ];
        for (lines, cell, expected) in cases {
            let mut cpu = basic();
            assert!(cpu.parse(lines).success);
            step_n(&mut cpu, lines.len());
            assert_eq!(cpu.memory().get(cell as i32), Ok(expected), "{lines:?}");
        }

        let mut cpu = basic();
        cpu.parse(&["ADD #0 1", "ADD #0 #0", "ADD >0 101"]);
        step_n(&mut cpu, 3);
        assert_eq!(cpu.memory().get(0), Ok(2));
    }

    #[test]
    fn split_source() {
        let mut cpu = basic();
        let source = "ADD #0 1\nADD #0 #0\nADD >0 101";
        let lines: Vec<&str> = source.split('\n').collect();
        assert!(cpu.parse(&lines).success);
        step_n(&mut cpu, 3);
        assert_eq!(cpu.memory().get(2), Ok(101));
    }

    #[test]
    fn missing_label() {
        let mut cpu = basic();
        cpu.parse(&["JMP 0"]);
        assert_eq!(
            cpu.step(),
            StepResult::failure(StepComment::NoInstruction, 0)
        );
        assert_eq!(cpu.last_fault(), Some(Fault::MissingLabel { label: 0 }));
        assert_eq!(cpu.pointer(), 0);

        for (jump, lines) in [
            ("JEZ", ["ADD #1 1", "JEZ #0 4"]),
            ("JLZ", ["SUB #0 1", "JLZ #0 4"]),
        ] {
            let mut cpu = machine(4, &["ADD", "SUB", "JEZ", "JLZ"]);
            cpu.parse(&lines);
            assert!(cpu.step().success);
            assert_eq!(
                cpu.step(),
                StepResult::failure(StepComment::NoInstruction, 1),
                "{jump}"
            );
        }
    }

    #[test]
    fn out_of_bounds_fails_in_place() {
        let mut cpu = basic();
        cpu.parse(&["ADD #0 1", "ADD #16 1", "ADD #0 1"]);
        assert!(cpu.step().success);
        let result = cpu.step();
        assert_eq!(result, StepResult::failure(StepComment::NoInstruction, 1));
        assert_eq!(
            cpu.last_fault(),
            Some(Fault::Memory(MemoryError::OutOfBounds {
                index: 16,
                size: 16
            }))
        );
        // Retrying fails the same way
        assert_eq!(cpu.step(), result);
        assert_eq!(cpu.memory().get(0), Ok(1));
    }

    #[test]
    fn conditional_jumps() {
        let mut cpu = machine(16, &["LBL", "ADD", "JEZ"]);
        cpu.parse(&["LBL 0", "ADD #1 1", "JEZ #0 0"]);
        step_n(&mut cpu, 5);
        assert_eq!(cpu.memory().get(1), Ok(2));

        let mut cpu = machine(16, &["LBL", "ADD", "JLZ"]);
        cpu.parse(&["ADD #0 -1", "LBL 0", "ADD #1 1", "JLZ #0 0"]);
        step_n(&mut cpu, 6);
        assert_eq!(cpu.memory().get(1), Ok(2));
    }

    #[test]
    fn failed_parse_clears_program() {
        let mut cpu = basic();
        assert!(cpu.parse(&["ADD #0 1"]).success);
        let result = cpu.parse(&["ADD #0 1", "ADD 0 1"]);
        assert_eq!(
            result,
            ParseResult::failure(ParseComment::InvalidParameter, 1)
        );
        assert!(cpu.instructions().is_empty());

        let result = cpu.parse(&["ADD #0 1 1"]);
        assert!(!result.success);
        assert!(cpu.instructions().is_empty());
    }

    #[test]
    fn parse_keeps_state() {
        let mut cpu = basic();
        cpu.parse(&["ADD #0 5", "ADD #0 5"]);
        step_n(&mut cpu, 1);
        assert_eq!(cpu.parse(&["ADD #1 1"]), ParseResult::ok(1));
        assert_eq!(cpu.pointer(), 1);
        assert_eq!(cpu.memory().get(0), Ok(5));
    }

    const FIBONACCI: [&str; 15] = [
        "--comment",
        "SET #0 24",
        "SET #2 5",
        "SET #4 1 --comment",
        "--comment",
        "LBL 0",
        "SET >2 #3",
        "ADD >2 #4",
        "SET #3 #4",
        "SET #4 >2",
        "ADD #2 1",
        "SUB #0 1",
        "JLZ #0 1",
        "JMP 0",
        "LBL 1",
    ];

    #[test]
    fn fibonacci() {
        let mut cpu = machine(32, &["LBL", "ADD", "SUB", "JMP", "SET", "JLZ"]);
        assert_eq!(cpu.parse(&FIBONACCI), ParseResult::ok(13));
        step_n(&mut cpu, 201);
        assert_eq!(cpu.memory().get(29), Ok(121393));
        assert_eq!(&cpu.memory().all()[5..12], &[1, 2, 3, 5, 8, 13, 21]);
    }

    #[test]
    fn run_and_reset() {
        let mut cpu = Cpu::new(Memory::new(32));
        cpu.definitions_mut().register_all(isa::builtins()).unwrap();
        cpu.parse(&FIBONACCI);

        let summary = cpu.run(10_000);
        assert_eq!(
            summary.last,
            Some(StepResult::failure(StepComment::EndOfCode, 13))
        );
        assert_eq!(cpu.memory().get(29), Ok(121393));

        cpu.reset();
        assert_eq!(cpu.pointer(), 0);
        assert!(cpu.memory().all().iter().all(|&cell| cell == 0));
        assert_eq!(cpu.run(summary.steps).steps, summary.steps);
        assert_eq!(cpu.memory().get(29), Ok(121393));

        assert_eq!(cpu.run(0).last, None);
    }

    #[test]
    fn commenter_override() {
        let mut cpu = Cpu::new(Memory::new(4)).with_commenter(";");
        cpu.definitions_mut().register_all(isa::builtins()).unwrap();
        assert_eq!(cpu.parse(&["; header", "ADD #0 2 ; two"]), ParseResult::ok(1));
        assert_eq!(cpu.commenter(), ";");
    }

    /// Writes to its constant operand, then stores it, to exercise scratch operands.
    struct Twice;

    impl Definition for Twice {
        fn token(&self) -> &str {
            "TWICE"
        }

        fn constraints(&self) -> &[Constraint] {
            &[Constraint::Memory, Constraint::Constant]
        }

        fn execute(&self, ctx: &mut Context<'_>, params: &mut [Param]) -> Result<(), Fault> {
            let value = ctx.read(&params[1])?;
            ctx.write(&mut params[1], value * 2)?;
            let doubled = ctx.read(&params[1])?;
            ctx.write(&mut params[0], doubled)
        }
    }

    #[test]
    fn constant_writes_do_not_persist() {
        let mut cpu = Cpu::new(Memory::new(4));
        cpu.definitions_mut().register(Rc::new(Twice)).unwrap();
        cpu.parse(&["TWICE #0 3", "TWICE #1 3"]);
        step_n(&mut cpu, 2);
        assert_eq!(cpu.memory().all(), &[6, 6, 0, 0]);
        assert_eq!(cpu.instructions()[0].to_string(), "TWICE #0 3");
    }
}
