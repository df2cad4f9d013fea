use crate::io::Program;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ProcessState {
    Ready,
    Running,
    Blocked,
    Finished,
}

/// Saved execution state and metadata for one simulated process. Entries are
/// created once and retained forever; a process id is its index in the PCB
/// table and is never reused.
pub(crate) struct PcbEntry {
    pub process_id: usize,
    pub parent_id: Option<usize>,
    pub program: Program,
    pub program_counter: usize,
    pub value: i64,
    pub state: ProcessState,
    pub start_time: u64,
    pub finish_time: Option<u64>,
}

impl PcbEntry {
    /// The initial process: id 0, no parent, running from the first
    /// instruction at time 0.
    pub fn root(program: Program) -> PcbEntry {
        PcbEntry {
            process_id: 0,
            parent_id: None,
            program,
            program_counter: 0,
            value: 0,
            state: ProcessState::Running,
            start_time: 0,
            finish_time: None,
        }
    }

    /// A forked child: it owns a copy of the parent's program and inherits
    /// the live execution context at the point of fork.
    pub fn forked(
        process_id: usize,
        parent: &PcbEntry,
        program_counter: usize,
        value: i64,
        start_time: u64,
    ) -> PcbEntry {
        PcbEntry {
            process_id,
            parent_id: Some(parent.process_id),
            program: parent.program.clone(),
            program_counter,
            value,
            state: ProcessState::Running,
            start_time,
            finish_time: None,
        }
    }

    /// Finish time minus start time, in logical clock units. None until the
    /// process has finished.
    pub fn turnaround_time(&self) -> Option<u64> {
        self.finish_time.map(|finish| finish - self.start_time)
    }
}
