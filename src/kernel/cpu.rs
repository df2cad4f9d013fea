use super::PcbEntry;

/// The single live execution context. While a process is running, these
/// fields are authoritative and the PCB's saved copies are stale; they are
/// written back exactly when the process stops running.
///
/// The running process's program is reached by table lookup on its id, never
/// by a reference held here.
pub(crate) struct Cpu {
    pub program_counter: usize,
    pub value: i64,
}

impl Cpu {
    pub fn new() -> Cpu {
        Cpu {
            program_counter: 0,
            value: 0,
        }
    }

    pub fn load_context(&mut self, pcb: &PcbEntry) {
        self.program_counter = pcb.program_counter;
        self.value = pcb.value;
    }

    pub fn save_context(&self, pcb: &mut PcbEntry) {
        pcb.program_counter = self.program_counter;
        pcb.value = self.value;
    }
}
