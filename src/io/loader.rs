use std::fs::File;
use std::io::{BufRead, BufReader};

use thiserror::Error;

use super::{Instruction, Program};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("error opening program resource {name}")]
    Open {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("error reading program resource {name}")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{name}:{line} - invalid integer argument {arg:?} for {op} operation")]
    InvalidIntArg {
        name: String,
        line: usize,
        op: char,
        arg: String,
    },
    #[error("{name}:{line} - missing string argument for R operation")]
    MissingStringArg { name: String, line: usize },
    #[error("{name}:{line} - invalid operation {op:?}")]
    InvalidOperation { name: String, line: usize, op: char },
    #[error("program resource {name} contains no instructions")]
    Empty { name: String },
}

/// Reads a program resource into an instruction sequence, one instruction
/// per line. Leading/trailing whitespace is trimmed and blank lines are
/// skipped; opcode letters are case-insensitive.
pub fn load_program(name: &str) -> Result<Program, LoadError> {
    let file = File::open(name).map_err(|source| LoadError::Open {
        name: name.to_string(),
        source,
    })?;
    let reader = BufReader::new(file);

    let mut instructions = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| LoadError::Read {
            name: name.to_string(),
            source,
        })?;

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        instructions.push(parse_line(name, index + 1, line)?);
    }

    let program = Program::new(instructions);
    if program.is_empty() {
        return Err(LoadError::Empty {
            name: name.to_string(),
        });
    }

    Ok(program)
}

fn parse_line(name: &str, line_num: usize, line: &str) -> Result<Instruction, LoadError> {
    let mut chars = line.chars();
    let op = chars.next().expect("line is non-empty");
    let arg = chars.as_str().trim();

    let instruction = match op.to_ascii_uppercase() {
        'S' => Instruction::Set(parse_int_arg(name, line_num, 'S', arg)?),
        'A' => Instruction::Add(parse_int_arg(name, line_num, 'A', arg)?),
        'D' => Instruction::Decrement(parse_int_arg(name, line_num, 'D', arg)?),
        'F' => Instruction::Fork(parse_int_arg(name, line_num, 'F', arg)?),
        'B' => Instruction::Block,
        'E' => Instruction::End,
        'R' => {
            if arg.is_empty() {
                return Err(LoadError::MissingStringArg {
                    name: name.to_string(),
                    line: line_num,
                });
            }
            Instruction::Replace(arg.to_string())
        }
        op => {
            return Err(LoadError::InvalidOperation {
                name: name.to_string(),
                line: line_num,
                op,
            })
        }
    };

    Ok(instruction)
}

fn parse_int_arg(name: &str, line_num: usize, op: char, arg: &str) -> Result<i64, LoadError> {
    arg.parse().map_err(|_| LoadError::InvalidIntArg {
        name: name.to_string(),
        line: line_num,
        op,
        arg: arg.to_string(),
    })
}
