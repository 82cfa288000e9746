use miette::{miette, LabeledSpan, NamedSource, Report, Severity, SourceSpan};

use crate::{Fault, Instruction, MemoryError, ParseComment, ParseError};

/// Span covering the given 0-based line, without its line ending.
fn line_span(src: &str, line: usize) -> SourceSpan {
    let mut offset = 0;
    for (index, text) in src.split_inclusive('\n').enumerate() {
        if index == line {
            let content = text.trim_end_matches(['\n', '\r']);
            return (offset, content.len()).into();
        }
        offset += text.len();
    }
    (src.len(), 0).into()
}

fn source(name: &str, src: &str) -> NamedSource<String> {
    NamedSource::new(name, src.to_string())
}

// Parse errors

pub fn parse_failure(error: ParseError, name: &str, src: &str) -> Report {
    let span = line_span(src, error.line);
    let report = match error.comment {
        ParseComment::NoCode => miette!(
            severity = Severity::Error,
            code = "parse::no_code",
            help = "a program needs at least one line that is not blank or a comment",
            "Program contains no instructions",
        ),
        ParseComment::InvalidInstruction => miette!(
            severity = Severity::Error,
            code = "parse::invalid_instruction",
            help = "available instructions are LBL, SET, ADD, SUB, JMP, JEZ and JLZ",
            labels = vec![LabeledSpan::at(span, "unknown instruction")],
            "Encountered an unknown instruction",
        ),
        ParseComment::InvalidParameters => miette!(
            severity = Severity::Error,
            code = "parse::invalid_parameters",
            help = "check the number of operands for this instruction",
            labels = vec![LabeledSpan::at(span, "wrong operand count")],
            "Wrong number of operands",
        ),
        ParseComment::InvalidParameter | ParseComment::Ok => miette!(
            severity = Severity::Error,
            code = "parse::invalid_parameter",
            help = "operands are integers, optionally prefixed with # (address) or > (indirect)",
            labels = vec![LabeledSpan::at(span, "invalid operand")],
            "Encountered an invalid operand",
        ),
    };
    report.with_source_code(source(name, src))
}

// Runtime errors

pub fn step_failure(instr: &Instruction, fault: Fault, name: &str, src: &str) -> Report {
    let span = line_span(src, instr.line());
    let help = match fault {
        Fault::MissingLabel { label } => format!("add `LBL {label}` to the program"),
        Fault::Memory(MemoryError::OutOfBounds { size, .. }) => {
            format!("valid addresses are 0 to {}, use --memory to change", size.saturating_sub(1))
        }
    };
    miette!(
        severity = Severity::Error,
        code = "runtime::no_instruction",
        help = help,
        labels = vec![LabeledSpan::at(span, instr.to_string())],
        "Instruction failed: {fault}",
    )
    .with_source_code(source(name, src))
}
