use std::{error::Error, fmt, rc::Rc};

use crate::isa;
use crate::memory::{Memory, MemoryError};
use crate::param::{Constraint, Param};

/// An opcode: its token, the operands it takes, and what it does.
///
/// Implemented by the host for every instruction it wants the machine to understand. See
/// [`crate::isa`] for the reference set.
pub trait Definition {
    /// Unique, case-sensitive mnemonic.
    fn token(&self) -> &str;

    /// One entry per operand. Defines arity as well as which operand kinds are legal.
    fn constraints(&self) -> &[Constraint];

    /// Run the instruction.
    ///
    /// `params` is a scratch copy of the instruction's operands, so writing to a constant
    /// operand only lasts for this call. On success the machine advances the pointer by one,
    /// after any jump made here. On failure the pointer is restored.
    fn execute(&self, ctx: &mut Context<'_>, params: &mut [Param]) -> Result<(), Fault>;
}

/// Reason an instruction failed to execute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
    Memory(MemoryError),
    MissingLabel { label: i32 },
}

impl From<MemoryError> for Fault {
    fn from(error: MemoryError) -> Self {
        Fault::Memory(error)
    }
}

impl Error for Fault {}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::Memory(error) => write!(f, "{}", error),
            Fault::MissingLabel { label } => write!(f, "No label `{}` in program", label),
        }
    }
}

/// Error registering a definition.
#[derive(Debug, PartialEq, Eq)]
pub enum RegistryError {
    Duplicate { token: String },
}

impl Error for RegistryError {}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::Duplicate { token } => {
                write!(f, "Instruction `{}` is already defined", token)
            }
        }
    }
}

/// Set of definitions the parser resolves tokens against.
#[derive(Default)]
pub struct Definitions(Vec<Rc<dyn Definition>>);

impl Definitions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a definition. Tokens must be unique.
    pub fn register(&mut self, definition: Rc<dyn Definition>) -> Result<(), RegistryError> {
        if self.contains(definition.token()) {
            return Err(RegistryError::Duplicate {
                token: definition.token().to_string(),
            });
        }
        self.0.push(definition);
        Ok(())
    }

    pub fn register_all(
        &mut self,
        definitions: impl IntoIterator<Item = Rc<dyn Definition>>,
    ) -> Result<(), RegistryError> {
        for definition in definitions {
            self.register(definition)?;
        }
        Ok(())
    }

    pub fn get(&self, token: &str) -> Option<&Rc<dyn Definition>> {
        self.0.iter().find(|definition| definition.token() == token)
    }

    pub fn contains(&self, token: &str) -> bool {
        self.get(token).is_some()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rc<dyn Definition>> {
        self.0.iter()
    }
}

impl fmt::Debug for Definitions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.0.iter().map(|definition| definition.token()))
            .finish()
    }
}

/// A parsed line: definition plus bound operands.
#[derive(Clone)]
pub struct Instruction {
    definition: Rc<dyn Definition>,
    params: Vec<Param>,
    /// Source line the instruction was parsed from.
    line: usize,
}

impl Instruction {
    /// Operand count must match the definition's constraint count.
    pub(crate) fn new(definition: Rc<dyn Definition>, params: Vec<Param>, line: usize) -> Self {
        debug_assert_eq!(definition.constraints().len(), params.len());
        Instruction {
            definition,
            params,
            line,
        }
    }

    pub fn definition(&self) -> &dyn Definition {
        self.definition.as_ref()
    }

    pub fn token(&self) -> &str {
        self.definition.token()
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn line(&self) -> usize {
        self.line
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token())?;
        for param in &self.params {
            write!(f, " {}", param)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instruction")
            .field("token", &self.token())
            .field("params", &self.params)
            .field("line", &self.line)
            .finish()
    }
}

/// View of the machine handed to a definition while it executes.
pub struct Context<'a> {
    pub(crate) memory: &'a mut Memory,
    pub(crate) pointer: &'a mut isize,
    pub(crate) program: &'a [Instruction],
}

impl Context<'_> {
    pub fn read(&self, param: &Param) -> Result<i32, Fault> {
        Ok(param.read(&*self.memory)?)
    }

    pub fn write(&mut self, param: &mut Param, value: i32) -> Result<(), Fault> {
        Ok(param.write(&mut *self.memory, value)?)
    }

    pub fn memory(&self) -> &Memory {
        &*self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut *self.memory
    }

    pub fn pointer(&self) -> isize {
        *self.pointer
    }

    pub fn set_pointer(&mut self, value: isize) {
        *self.pointer = value;
    }

    pub fn program(&self) -> &[Instruction] {
        self.program
    }

    /// Point at the first label with the given value.
    ///
    /// Execution resumes on the instruction after the label, once the machine advances.
    pub fn jump(&mut self, label: i32) -> Result<(), Fault> {
        let index = isa::find_label(self.program, label).ok_or(Fault::MissingLabel { label })?;
        *self.pointer = index as isize;
        Ok(())
    }
}
