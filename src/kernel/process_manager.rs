use std::collections::VecDeque;
use std::fmt;

use log::{debug, info, warn};

use crate::io::{loader, Instruction, Program};

use super::{Cpu, PcbEntry, ProcessState};

/// The process-manager engine: the PCB table, the ready/blocked queues, the
/// running slot, the live CPU context, and the logical clock.
///
/// Exactly zero or one process is running at any instant, and every process
/// id ever created sits in exactly one of the running slot, the ready queue,
/// the blocked queue, or the finished set.
pub(crate) struct ProcessManager {
    pcb_table: Vec<PcbEntry>,
    ready_queue: VecDeque<usize>,
    blocked_queue: VecDeque<usize>,
    running: Option<usize>,
    cpu: Cpu,
    clock: u64,
}

impl ProcessManager {
    /// Creates the engine with the initial process (id 0) already running.
    pub fn new(init_program: Program) -> ProcessManager {
        let root = PcbEntry::root(init_program);

        let mut cpu = Cpu::new();
        cpu.load_context(&root);

        ProcessManager {
            pcb_table: vec![root],
            ready_queue: VecDeque::new(),
            blocked_queue: VecDeque::new(),
            running: Some(0),
            cpu,
            clock: 0,
        }
    }

    /// Executes one quantum: fetch the instruction at the live program
    /// counter, advance the counter, dispatch, tick the clock, reschedule.
    /// The clock ticks even when no process is running.
    pub fn quantum(&mut self) {
        info!("Advancing one quantum at time {}.", self.clock);

        let process_id = match self.running {
            Some(process_id) => process_id,
            None => {
                info!("No process is running.");
                self.clock += 1;
                return;
            }
        };

        // Running off the end of the program counts as an explicit end.
        let program = &self.pcb_table[process_id].program;
        let instruction = match program.fetch(self.cpu.program_counter) {
            Some(instruction) => {
                let instruction = instruction.clone();
                self.cpu.program_counter += 1;
                instruction
            }
            None => {
                info!(
                    "Process {} reached the end of its {}-instruction program without an E operation.",
                    process_id,
                    program.len()
                );
                Instruction::End
            }
        };

        self.dispatch(process_id, instruction);
        self.clock += 1;
        self.schedule();
    }

    fn dispatch(&mut self, process_id: usize, instruction: Instruction) {
        match instruction {
            Instruction::Set(value) => {
                info!("Instruction S {}", value);
                self.cpu.value = value;
            }
            Instruction::Add(value) => {
                info!("Instruction A {}", value);
                self.cpu.value = self.cpu.value.wrapping_add(value);
            }
            Instruction::Decrement(value) => {
                info!("Instruction D {}", value);
                self.cpu.value = self.cpu.value.wrapping_sub(value);
            }
            Instruction::Block => {
                info!("Instruction B");
                self.block(process_id);
            }
            Instruction::End => {
                info!("Instruction E");
                self.end(process_id);
            }
            Instruction::Fork(displacement) => {
                info!("Instruction F {}", displacement);
                self.fork(process_id, displacement);
            }
            Instruction::Replace(resource) => {
                info!("Instruction R {}", resource);
                self.replace(process_id, &resource);
            }
        }
    }

    /// Picks the next process to run, oldest-ready-first. A no-op while a
    /// process is running: the discipline is non-preemptive, the CPU is only
    /// relinquished voluntarily through B, E, or F.
    pub fn schedule(&mut self) {
        if let Some(process_id) = self.running {
            debug!("Process {} is still running; nothing to schedule.", process_id);
            return;
        }

        match self.ready_queue.pop_front() {
            Some(process_id) => {
                let pcb = &mut self.pcb_table[process_id];
                pcb.state = ProcessState::Running;
                self.cpu.load_context(pcb);
                self.running = Some(process_id);
                info!("Process {} is now running.", process_id);
            }
            None => info!("There are no processes in the ready queue."),
        }
    }

    /// Moves the head of the blocked queue to the ready queue, then gives it
    /// a chance to run.
    pub fn unblock(&mut self) {
        match self.blocked_queue.pop_front() {
            Some(process_id) => {
                self.pcb_table[process_id].state = ProcessState::Ready;
                self.ready_queue.push_back(process_id);
                info!("Process {} has been unblocked.", process_id);
                self.schedule();
            }
            None => info!("There are no blocked processes to unblock."),
        }
    }

    fn block(&mut self, process_id: usize) {
        let pcb = &mut self.pcb_table[process_id];
        self.cpu.save_context(pcb);
        pcb.state = ProcessState::Blocked;
        self.blocked_queue.push_back(process_id);
        self.running = None;
        info!("Process {} has been blocked.", process_id);
    }

    fn end(&mut self, process_id: usize) {
        let pcb = &mut self.pcb_table[process_id];
        self.cpu.save_context(pcb);
        pcb.state = ProcessState::Finished;
        pcb.finish_time = Some(self.clock);
        self.running = None;
        info!("Process {} has been terminated.", process_id);
    }

    /// Creates a child that takes over the CPU at the current context; the
    /// parent is demoted to ready with its saved counter skipped ahead by
    /// the displacement.
    fn fork(&mut self, process_id: usize, displacement: i64) {
        if displacement <= 0 {
            warn!(
                "Ignoring fork with non-positive displacement {} in process {}.",
                displacement, process_id
            );
            return;
        }

        let child_id = self.pcb_table.len();
        let child = PcbEntry::forked(
            child_id,
            &self.pcb_table[process_id],
            self.cpu.program_counter,
            self.cpu.value,
            self.clock,
        );
        self.pcb_table.push(child);

        let parent = &mut self.pcb_table[process_id];
        self.cpu.save_context(parent);
        parent.program_counter += displacement as usize;
        parent.state = ProcessState::Ready;
        self.ready_queue.push_back(process_id);

        // The CPU context is left untouched for the child's benefit.
        self.running = Some(child_id);
        info!(
            "Process {} forked process {}; process {} will begin running.",
            process_id, child_id, child_id
        );
    }

    /// Swaps in a freshly loaded program and restarts the counter at 0. A
    /// load failure leaves the process entirely unchanged.
    fn replace(&mut self, process_id: usize, resource: &str) {
        match loader::load_program(resource) {
            Ok(program) => {
                self.pcb_table[process_id].program = program;
                self.cpu.program_counter = 0;
                info!("Process {} replaced its program with {}.", process_id, resource);
            }
            Err(err) => warn!("Process {} could not replace its program: {}.", process_id, err),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            time: self.clock,
            running: self.running,
            value: self.cpu.value,
            ready: self.ready_queue.iter().copied().collect(),
            blocked: self.blocked_queue.iter().copied().collect(),
            finished: self
                .pcb_table
                .iter()
                .filter(|pcb| pcb.state == ProcessState::Finished)
                .map(|pcb| pcb.process_id)
                .collect(),
        }
    }

    /// Mean turnaround time over the processes that have finished.
    pub fn average_turnaround(&self) -> Option<f64> {
        let turnarounds: Vec<u64> = self
            .pcb_table
            .iter()
            .filter_map(|pcb| pcb.turnaround_time())
            .collect();

        if turnarounds.is_empty() {
            return None;
        }

        Some(turnarounds.iter().sum::<u64>() as f64 / turnarounds.len() as f64)
    }
}

/// Read-only view of the scheduler state, rendered as the operator report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Snapshot {
    pub time: u64,
    pub running: Option<usize>,
    pub value: i64,
    pub ready: Vec<usize>,
    pub blocked: Vec<usize>,
    pub finished: Vec<usize>,
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids = |ids: &[usize]| {
            ids.iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(" ")
        };

        writeln!(f, "*************************************************************")?;
        writeln!(f, "The current time is: {}", self.time)?;
        writeln!(f, "The current value is: {}", self.value)?;
        match self.running {
            Some(process_id) => writeln!(f, "The current process is: {}", process_id)?,
            None => writeln!(f, "The current process is: none")?,
        }
        writeln!(f, "Processes in READY STATE: {}", ids(&self.ready))?;
        writeln!(f, "Processes in BLOCKED STATE: {}", ids(&self.blocked))?;
        writeln!(
            f,
            "Processes in RUNNING STATE: {}",
            ids(&self.running.map(|id| vec![id]).unwrap_or_default())
        )?;
        writeln!(f, "Processes in FINISHED STATE: {}", ids(&self.finished))?;
        write!(f, "*************************************************************")
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn manager(instructions: Vec<Instruction>) -> ProcessManager {
        ProcessManager::new(Program::new(instructions))
    }

    /// Every id ever created must sit in exactly one of the running slot,
    /// the ready queue, the blocked queue, or the finished set.
    fn assert_accounting(manager: &ProcessManager) {
        let mut seen = vec![0u32; manager.pcb_table.len()];

        if let Some(process_id) = manager.running {
            assert_eq!(manager.pcb_table[process_id].state, ProcessState::Running);
            seen[process_id] += 1;
        }
        for &process_id in &manager.ready_queue {
            assert_eq!(manager.pcb_table[process_id].state, ProcessState::Ready);
            seen[process_id] += 1;
        }
        for &process_id in &manager.blocked_queue {
            assert_eq!(manager.pcb_table[process_id].state, ProcessState::Blocked);
            seen[process_id] += 1;
        }
        for pcb in &manager.pcb_table {
            if pcb.state == ProcessState::Finished {
                seen[pcb.process_id] += 1;
            }
        }

        assert!(seen.iter().all(|&count| count == 1), "bad accounting: {seen:?}");
    }

    #[test]
    fn test_process_manager_accumulator_scenario() {
        let mut manager = manager(vec![
            Instruction::Set(5),
            Instruction::Add(3),
            Instruction::Decrement(1),
            Instruction::End,
        ]);

        manager.quantum();
        assert_eq!(manager.cpu.value, 5);
        manager.quantum();
        assert_eq!(manager.cpu.value, 8);
        manager.quantum();
        assert_eq!(manager.cpu.value, 7);

        manager.quantum();
        assert_eq!(manager.running, None);
        assert!(manager.ready_queue.is_empty());
        assert!(manager.blocked_queue.is_empty());
        assert_eq!(manager.pcb_table[0].state, ProcessState::Finished);
        assert_eq!(manager.pcb_table[0].finish_time, Some(3));
        assert_eq!(manager.clock, 4);

        // An idle quantum still advances the clock.
        manager.quantum();
        assert_eq!(manager.clock, 5);
        assert_eq!(manager.running, None);
    }

    #[test]
    fn test_process_manager_block_then_unblock_reschedules() {
        let mut manager = manager(vec![Instruction::Block]);

        manager.quantum();
        assert_eq!(manager.running, None);
        assert_eq!(manager.blocked_queue, VecDeque::from(vec![0]));
        assert_eq!(manager.pcb_table[0].state, ProcessState::Blocked);

        manager.unblock();
        assert_eq!(manager.running, Some(0));
        assert!(manager.ready_queue.is_empty());
        assert!(manager.blocked_queue.is_empty());
        assert_eq!(manager.pcb_table[0].state, ProcessState::Running);
    }

    #[test]
    fn test_process_manager_unblock_with_empty_queue_is_noop() {
        let mut manager = manager(vec![Instruction::End]);
        let before = manager.snapshot();

        manager.unblock();

        assert_eq!(manager.snapshot(), before);
    }

    #[test]
    fn test_process_manager_schedule_is_idempotent_while_running() {
        let mut manager = manager(vec![Instruction::Set(5), Instruction::End]);
        manager.quantum();
        let before = manager.snapshot();

        manager.schedule();
        manager.schedule();

        assert_eq!(manager.snapshot(), before);
    }

    #[test]
    fn test_process_manager_fork_scenario() {
        let mut manager = manager(vec![
            Instruction::Fork(1),
            Instruction::Set(9),
            Instruction::End,
        ]);

        // Fork quantum: the child takes over at the inherited context, the
        // parent is parked ready one instruction past the fork's natural
        // successor.
        manager.quantum();
        assert_eq!(manager.pcb_table.len(), 2);
        assert_eq!(manager.running, Some(1));
        assert_eq!(manager.cpu.value, 0);
        assert_eq!(manager.cpu.program_counter, 1);
        assert_eq!(manager.pcb_table[1].parent_id, Some(0));
        assert_eq!(manager.pcb_table[1].start_time, 0);
        assert_eq!(manager.pcb_table[0].state, ProcessState::Ready);
        assert_eq!(manager.pcb_table[0].program_counter, 2);
        assert_eq!(manager.ready_queue, VecDeque::from(vec![0]));
        assert_accounting(&manager);

        // Child runs S 9.
        manager.quantum();
        assert_eq!(manager.running, Some(1));
        assert_eq!(manager.cpu.value, 9);

        // Child ends; the parent is rescheduled at its saved context.
        manager.quantum();
        assert_eq!(manager.pcb_table[1].state, ProcessState::Finished);
        assert_eq!(manager.running, Some(0));
        assert_eq!(manager.cpu.program_counter, 2);
        assert_eq!(manager.cpu.value, 0);
        assert_accounting(&manager);

        // Parent ends.
        manager.quantum();
        assert_eq!(manager.pcb_table[0].state, ProcessState::Finished);
        assert_eq!(manager.running, None);
        assert_accounting(&manager);

        // Child: 2 - 0; parent: 3 - 0.
        assert_eq!(manager.average_turnaround(), Some(2.5));
    }

    #[test]
    fn test_process_manager_fork_non_positive_displacement_is_noop() {
        let mut manager = manager(vec![Instruction::Fork(0), Instruction::End]);

        manager.quantum();

        assert_eq!(manager.pcb_table.len(), 1);
        assert_eq!(manager.running, Some(0));
        assert_eq!(manager.cpu.program_counter, 1);
        assert_accounting(&manager);
    }

    #[test]
    fn test_process_manager_end_is_absorbing() {
        let mut manager = manager(vec![Instruction::End]);

        manager.quantum();
        assert_eq!(manager.pcb_table[0].state, ProcessState::Finished);

        manager.unblock();
        manager.quantum();
        manager.schedule();

        assert!(manager.ready_queue.is_empty());
        assert!(manager.blocked_queue.is_empty());
        assert_eq!(manager.running, None);
        assert_eq!(manager.pcb_table[0].state, ProcessState::Finished);
        assert_accounting(&manager);
    }

    #[test]
    fn test_process_manager_implicit_end_when_program_runs_out() {
        let mut manager = manager(vec![Instruction::Set(1)]);

        manager.quantum();
        assert_eq!(manager.cpu.value, 1);

        manager.quantum();
        assert_eq!(manager.pcb_table[0].state, ProcessState::Finished);
        assert_eq!(manager.pcb_table[0].finish_time, Some(1));
    }

    #[test]
    fn test_process_manager_replace_failure_leaves_process_unchanged() {
        let mut manager = manager(vec![
            Instruction::Replace("/nonexistent/resource".to_string()),
            Instruction::Set(1),
            Instruction::End,
        ]);

        manager.quantum();

        assert_eq!(manager.running, Some(0));
        assert_eq!(manager.pcb_table[0].state, ProcessState::Running);
        assert_eq!(manager.cpu.program_counter, 1);
        assert_eq!(manager.pcb_table[0].program.len(), 3);

        // The old program keeps executing from where it left off.
        manager.quantum();
        assert_eq!(manager.cpu.value, 1);
    }

    #[test]
    fn test_process_manager_replace_success_restarts_counter() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("child");
        fs::write(&path, "S 7\nE\n").unwrap();

        let mut manager = manager(vec![Instruction::Replace(
            path.to_str().unwrap().to_string(),
        )]);

        manager.quantum();
        assert_eq!(manager.running, Some(0));
        assert_eq!(manager.cpu.program_counter, 0);
        assert_eq!(manager.pcb_table[0].program.len(), 2);

        manager.quantum();
        assert_eq!(manager.cpu.value, 7);
    }

    #[test]
    fn test_process_manager_accounting_holds_across_mixed_workload() {
        let mut manager = manager(vec![
            Instruction::Fork(1),
            Instruction::Block,
            Instruction::Fork(2),
            Instruction::Set(4),
            Instruction::End,
        ]);

        for _ in 0..4 {
            manager.quantum();
            assert_accounting(&manager);
        }
        manager.unblock();
        assert_accounting(&manager);
        for _ in 0..8 {
            manager.quantum();
            assert_accounting(&manager);
        }
    }

    #[test]
    fn test_process_manager_average_turnaround_needs_a_finished_process() {
        let mut manager = manager(vec![Instruction::Set(1), Instruction::End]);

        assert_eq!(manager.average_turnaround(), None);

        manager.quantum();
        manager.quantum();

        assert_eq!(manager.average_turnaround(), Some(1.0));
    }

    #[test]
    fn test_process_manager_snapshot_reports_queues() {
        let mut manager = manager(vec![
            Instruction::Fork(1),
            Instruction::Block,
            Instruction::End,
        ]);

        manager.quantum(); // Fork: child 1 running, parent 0 ready.
        manager.quantum(); // Child blocks; parent is rescheduled.

        let snapshot = manager.snapshot();
        assert_eq!(snapshot.running, Some(0));
        assert_eq!(snapshot.ready, Vec::<usize>::new());
        assert_eq!(snapshot.blocked, vec![1]);
        assert_eq!(snapshot.finished, Vec::<usize>::new());
        assert_eq!(snapshot.time, 2);
    }
}
