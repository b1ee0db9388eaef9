//! Ready Queue

use alloc::collections::VecDeque;

use ember_abi::Priority;

use super::task::Pid;

/// Which policy decides where a task lands in the ready queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPolicy {
    /// Plain FIFO: every insertion goes to the tail.
    RoundRobin,
    /// Ordered by priority, then by arrival. The head is always the most
    /// urgent, earliest admitted ready task.
    PreemptivePriority,
}

/// A queued task together with the key it was ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyEntry {
    pub pid: Pid,
    pub priority: Priority,
    pub arrival: u32,
}

impl ReadyEntry {
    fn key(&self) -> (Priority, u32) {
        (self.priority, self.arrival)
    }
}

pub struct ReadyQueue {
    entries: VecDeque<ReadyEntry>,
    policy: SchedulerPolicy,
}

impl ReadyQueue {
    pub fn new(policy: SchedulerPolicy, capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            policy,
        }
    }

    pub fn insert(&mut self, entry: ReadyEntry) {
        match self.policy {
            SchedulerPolicy::RoundRobin => self.entries.push_back(entry),
            SchedulerPolicy::PreemptivePriority => {
                // Equal keys go behind the existing ones, which keeps the
                // insertion stable.
                let at = self.entries.partition_point(|e| e.key() <= entry.key());
                self.entries.insert(at, entry);
            }
        }
    }

    pub fn pop(&mut self) -> Option<ReadyEntry> {
        self.entries.pop_front()
    }

    /// Take `pid` out of the queue, wherever it is.
    pub fn remove(&mut self, pid: Pid) -> Option<ReadyEntry> {
        let idx = self.entries.iter().position(|e| e.pid == pid)?;
        self.entries.remove(idx)
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.entries.iter().any(|e| e.pid == pid)
    }

    pub fn pids(&self) -> impl Iterator<Item = Pid> + '_ {
        self.entries.iter().map(|e| e.pid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every adjacent pair is ordered by (priority, arrival).
    pub fn is_priority_ordered(&self) -> bool {
        self.entries
            .iter()
            .zip(self.entries.iter().skip(1))
            .all(|(a, b)| a.key() < b.key())
    }
}
