/// A single simulated-machine instruction, as produced by the loader.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    Set(i64),
    Add(i64),
    Decrement(i64),
    Block,
    End,
    Fork(i64),
    Replace(String),
}

/// An ordered, owned sequence of instructions for one process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Program {
    instructions: Vec<Instruction>,
}

impl Program {
    pub fn new(instructions: Vec<Instruction>) -> Program {
        Program { instructions }
    }

    pub fn fetch(&self, program_counter: usize) -> Option<&Instruction> {
        self.instructions.get(program_counter)
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}
