mod cpu;
mod process_control_block;
mod process_manager;

use cpu::Cpu;
use process_control_block::{PcbEntry, ProcessState};
use process_manager::ProcessManager;

pub mod driver;

pub use driver::Driver;
