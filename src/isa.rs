//! Reference instruction set.
//!
//! | Token | Operands                    | Effect                                 |
//! |-------|-----------------------------|----------------------------------------|
//! | `LBL` | constant                    | Jump target, does nothing              |
//! | `SET` | memory, constant-or-memory  | `a = b`                                |
//! | `ADD` | memory, constant-or-memory  | `a = a + b`                            |
//! | `SUB` | memory, constant-or-memory  | `a = a - b`                            |
//! | `JMP` | constant                    | Jump to label `a`                      |
//! | `JEZ` | constant-or-memory, constant| Jump to label `b` if `a == 0`          |
//! | `JLZ` | constant-or-memory, constant| Jump to label `b` if `a < 0`           |
//!
//! Arithmetic wraps on overflow.

use std::rc::Rc;

use crate::definition::{Context, Definition, Fault, Instruction};
use crate::param::{Constraint, Param};

/// Token that marks an instruction as a jump target.
pub const LABEL_TOKEN: &str = "LBL";

const LABEL: &[Constraint] = &[Constraint::Constant];
const STORE: &[Constraint] = &[Constraint::Memory, Constraint::ConstantOrMemory];
const BRANCH: &[Constraint] = &[Constraint::ConstantOrMemory, Constraint::Constant];

/// Index of the first label instruction whose operand equals `label`.
pub fn find_label(program: &[Instruction], label: i32) -> Option<usize> {
    program.iter().position(|instr| {
        instr.token() == LABEL_TOKEN && instr.params().first().map(|p| p.value) == Some(label)
    })
}

/// Every definition in this module, ready for registration.
pub fn builtins() -> Vec<Rc<dyn Definition>> {
    let builtins: [Rc<dyn Definition>; 7] = [
        Rc::new(Lbl),
        Rc::new(Set),
        Rc::new(Add),
        Rc::new(Sub),
        Rc::new(Jmp),
        Rc::new(Jez),
        Rc::new(Jlz),
    ];
    Vec::from(builtins)
}

#[derive(Clone, Copy, Debug)]
pub struct Lbl;

impl Definition for Lbl {
    fn token(&self) -> &str {
        LABEL_TOKEN
    }

    fn constraints(&self) -> &[Constraint] {
        LABEL
    }

    fn execute(&self, _ctx: &mut Context<'_>, _params: &mut [Param]) -> Result<(), Fault> {
        Ok(())
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Set;

impl Definition for Set {
    fn token(&self) -> &str {
        "SET"
    }

    fn constraints(&self) -> &[Constraint] {
        STORE
    }

    fn execute(&self, ctx: &mut Context<'_>, params: &mut [Param]) -> Result<(), Fault> {
        let value = ctx.read(&params[1])?;
        ctx.write(&mut params[0], value)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Add;

impl Definition for Add {
    fn token(&self) -> &str {
        "ADD"
    }

    fn constraints(&self) -> &[Constraint] {
        STORE
    }

    fn execute(&self, ctx: &mut Context<'_>, params: &mut [Param]) -> Result<(), Fault> {
        let lhs = ctx.read(&params[0])?;
        let rhs = ctx.read(&params[1])?;
        ctx.write(&mut params[0], lhs.wrapping_add(rhs))
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Sub;

impl Definition for Sub {
    fn token(&self) -> &str {
        "SUB"
    }

    fn constraints(&self) -> &[Constraint] {
        STORE
    }

    fn execute(&self, ctx: &mut Context<'_>, params: &mut [Param]) -> Result<(), Fault> {
        let lhs = ctx.read(&params[0])?;
        let rhs = ctx.read(&params[1])?;
        ctx.write(&mut params[0], lhs.wrapping_sub(rhs))
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Jmp;

impl Definition for Jmp {
    fn token(&self) -> &str {
        "JMP"
    }

    fn constraints(&self) -> &[Constraint] {
        LABEL
    }

    fn execute(&self, ctx: &mut Context<'_>, params: &mut [Param]) -> Result<(), Fault> {
        let label = ctx.read(&params[0])?;
        ctx.jump(label)
    }
}

/// Shared by the conditional jumps.
fn branch_if(
    ctx: &mut Context<'_>,
    params: &[Param],
    cond: impl FnOnce(i32) -> bool,
) -> Result<(), Fault> {
    let value = ctx.read(&params[0])?;
    let label = ctx.read(&params[1])?;
    if cond(value) {
        ctx.jump(label)?;
    }
    Ok(())
}

#[derive(Clone, Copy, Debug)]
pub struct Jez;

impl Definition for Jez {
    fn token(&self) -> &str {
        "JEZ"
    }

    fn constraints(&self) -> &[Constraint] {
        BRANCH
    }

    fn execute(&self, ctx: &mut Context<'_>, params: &mut [Param]) -> Result<(), Fault> {
        branch_if(ctx, params, |value| value == 0)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Jlz;

impl Definition for Jlz {
    fn token(&self) -> &str {
        "JLZ"
    }

    fn constraints(&self) -> &[Constraint] {
        BRANCH
    }

    fn execute(&self, ctx: &mut Context<'_>, params: &mut [Param]) -> Result<(), Fault> {
        branch_if(ctx, params, |value| value < 0)
    }
}
