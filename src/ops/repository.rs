use std::sync::mpsc;

use tracing::debug;

use crate::model::task::TaskRecord;

/// Sent to subscribers whenever the record set changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Invalidated {
    pub revision: u64,
}

/// Handed out by [`TaskRepository::begin_scan`]; only the most recent
/// ticket may publish its results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ScanTicket(u64);

/// The authoritative in-memory task set.
///
/// Records are replaced wholesale by a scan and edited one at a time by
/// identity; nothing is ever inserted outside a full replacement.
#[derive(Debug, Default)]
pub struct TaskRepository {
    records: Vec<TaskRecord>,
    revision: u64,
    latest_scan: u64,
    subscribers: Vec<mpsc::Sender<Invalidated>>,
}

impl TaskRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all records, in the order of the last replacement.
    pub fn all(&self) -> &[TaskRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&TaskRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Incremented on every change.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Receive an [`Invalidated`] event for each change from now on.
    pub fn subscribe(&mut self) -> mpsc::Receiver<Invalidated> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    /// Swap in a complete new record set.
    pub fn replace_all(&mut self, records: Vec<TaskRecord>) {
        self.records = records;
        self.invalidate();
    }

    /// Replace the record with the same identity, keeping its position.
    /// Returns `false` (and changes nothing) when no record matches.
    pub fn upsert_by_identity(&mut self, record: TaskRecord) -> bool {
        match self.records.iter_mut().find(|r| r.id == record.id) {
            Some(slot) => {
                *slot = record;
                self.invalidate();
                true
            }
            None => {
                debug!(id = %record.id, "update for unknown task ignored");
                false
            }
        }
    }

    /// Start a scan. Tickets increase monotonically.
    pub fn begin_scan(&mut self) -> ScanTicket {
        self.latest_scan += 1;
        ScanTicket(self.latest_scan)
    }

    /// Publish a scan's records if no newer scan has started since.
    /// Returns whether the records were applied.
    pub fn complete_scan(&mut self, ticket: ScanTicket, records: Vec<TaskRecord>) -> bool {
        if ticket.0 != self.latest_scan {
            debug!(
                ticket = ticket.0,
                latest = self.latest_scan,
                "discarding results of superseded scan"
            );
            return false;
        }
        self.replace_all(records);
        true
    }

    fn invalidate(&mut self) {
        self.revision += 1;
        let event = Invalidated {
            revision: self.revision,
        };
        self.subscribers.retain(|tx| tx.send(event).is_ok());
    }
}
