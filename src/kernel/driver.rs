use std::io::{self, BufRead, Write};
use std::thread;

use anyhow::{Context, Result};
use crossbeam::channel::{self, Receiver, Sender};
use log::warn;

use crate::io::loader;

use super::ProcessManager;

/// The command alphabet carried over the commander-to-engine channel, one
/// symbol per message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Quantum,
    Unblock,
    Print,
    Terminate,
}

impl Command {
    /// Parses the first character of an operator line, case-insensitively.
    pub fn parse(input: &str) -> Option<Command> {
        match input.trim().chars().next()?.to_ascii_uppercase() {
            'Q' => Some(Command::Quantum),
            'U' => Some(Command::Unblock),
            'P' => Some(Command::Print),
            'T' => Some(Command::Terminate),
            _ => None,
        }
    }
}

/// Wires the commander loop to the engine thread through a bounded FIFO
/// channel. The engine blocks on the channel and performs no background
/// work; commands are processed strictly in the order sent.
pub struct Driver {
    manager: ProcessManager,
}

impl Driver {
    /// Loads the initial program and stages the engine. A load failure here
    /// is the one fatal error in the simulator's lifetime.
    pub fn new(init_resource: &str) -> Result<Driver> {
        let program = loader::load_program(init_resource)
            .with_context(|| format!("failed to load the initial program {:?}", init_resource))?;

        Ok(Driver {
            manager: ProcessManager::new(program),
        })
    }

    pub fn start(self) -> Result<()> {
        let (sender, receiver) = channel::bounded::<Command>(1);

        let interrupt_sender = sender.clone();
        ctrlc::set_handler(move || {
            let _ = interrupt_sender.send(Command::Terminate);
        })
        .context("failed to install the interrupt handler")?;

        let manager = self.manager;
        let engine = thread::spawn(move || run_engine(manager, receiver));

        run_commander(&sender);

        engine
            .join()
            .map_err(|_| anyhow::anyhow!("the engine thread panicked"))?;
        Ok(())
    }
}

fn run_engine(mut manager: ProcessManager, commands: Receiver<Command>) {
    loop {
        // A closed channel means the commander is gone; treat it as an
        // implicit terminate.
        let command = commands.recv().unwrap_or(Command::Terminate);
        match command {
            Command::Quantum => manager.quantum(),
            Command::Unblock => manager.unblock(),
            Command::Print => println!("{}", manager.snapshot()),
            Command::Terminate => break,
        }
    }

    println!("{}", manager.snapshot());
    println!("Simulation terminated.");
    match manager.average_turnaround() {
        Some(average) => println!("Average turnaround time: {:.2}", average),
        None => println!("Average turnaround time: n/a (no process finished)"),
    }
}

fn run_commander(commands: &Sender<Command>) {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        println!("Enter Q, P, U or T");
        print!("$ ");
        let _ = io::stdout().flush();

        let line = match lines.next() {
            Some(Ok(line)) => line,
            // End of input is an implicit terminate.
            _ => {
                let _ = commands.send(Command::Terminate);
                return;
            }
        };

        let command = match Command::parse(&line) {
            Some(command) => command,
            None => {
                warn!("Invalid command {:?}; enter Q, U, P or T.", line.trim());
                continue;
            }
        };

        // A send failing because the engine already exited ends the
        // simulation; it is not an error.
        if commands.send(command).is_err() || command == Command::Terminate {
            return;
        }
    }
}
