use std::cell::RefCell;
use std::fmt::Write as _;
use std::path::Path;

use colored::Colorize;

use crate::{Instruction, Memory};

thread_local! {
    static IS_MINIMAL: RefCell<bool> = const { RefCell::new(false) };
}

/// Minimal output drops status lines and color, for blackbox tests.
pub fn set_minimal(new_value: bool) -> bool {
    if new_value {
        colored::control::set_override(false);
    }
    IS_MINIMAL.with(|value| value.replace(new_value))
}

pub fn is_minimal() -> bool {
    IS_MINIMAL.with(|value| *value.borrow())
}

#[allow(unused)]
#[derive(Clone, Copy, Debug)]
pub enum MsgColor {
    Green,
    Cyan,
    Yellow,
    Red,
}

pub fn file_message(color: MsgColor, left: &str, right: &Path) {
    let right = format!("target {}", right.display());
    message(color, left, &right);
}

pub fn message(color: MsgColor, left: &str, right: &str) {
    if is_minimal() {
        return;
    }
    let left = match color {
        MsgColor::Green => left.green(),
        MsgColor::Cyan => left.cyan(),
        MsgColor::Yellow => left.yellow(),
        MsgColor::Red => left.red(),
    };
    println!("{left:>12} {right}");
}

/// One line per executed instruction, on stderr.
pub fn trace(pointer: isize, instr: &Instruction, next: isize) {
    eprintln!(
        "{} {} {} {}",
        format!("{pointer:>4}").dimmed(),
        format!("{:<20}", instr.to_string()).bold(),
        "->".dimmed(),
        next
    );
}

/// Every cell with its address. Runs of zero cells are folded into one line.
pub fn format_memory(memory: &Memory) -> String {
    let mut out = String::new();
    let mut zeros = 0..0;
    let flush = |out: &mut String, zeros: &std::ops::Range<usize>| match zeros.len() {
        0 => {}
        1 => writeln!(out, "{:>4}: 0", zeros.start).unwrap_or_default(),
        _ => writeln!(out, "{:>4}: 0 (to {})", zeros.start, zeros.end - 1).unwrap_or_default(),
    };
    for (index, &cell) in memory.all().iter().enumerate() {
        if cell == 0 {
            if zeros.is_empty() {
                zeros = index..index;
            }
            zeros.end = index + 1;
            continue;
        }
        flush(&mut out, &zeros);
        zeros = 0..0;
        writeln!(out, "{index:>4}: {cell}").unwrap_or_default();
    }
    flush(&mut out, &zeros);
    out
}

pub fn print_memory(memory: &Memory) {
    if is_minimal() {
        print!("{}", format_memory(memory));
        return;
    }
    println!("\n------ Memory ------");
    print!("{}", format_memory(memory));
    println!("--------------------");
}
