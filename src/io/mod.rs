pub mod loader;
pub mod program;

pub use loader::LoadError;
pub use program::{Instruction, Program};
