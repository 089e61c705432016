//! Recording subscriber.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use flipbuf_diff::{Diff, DiffType};
use flipbuf_runtime::Subscriber;

/// One callback as seen by a [`Recorder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferEvent<T> {
    WillChange,
    Change(Diff<T>),
    DidChange,
}

impl<T> BufferEvent<T> {
    fn label(&self) -> &'static str {
        match self {
            Self::WillChange => "will_change",
            Self::Change(_) => "change",
            Self::DidChange => "did_change",
        }
    }
}

/// A violation of the will/change*/did protocol, located by event number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BracketError {
    /// `will_change` while a batch was already open.
    NestedWill { seq: usize },
    /// `on_change` outside any batch.
    ChangeOutsideBatch { seq: usize },
    /// `did_change` with no open batch.
    UnmatchedDid { seq: usize },
    /// A batch with no changes; empty scripts must not notify.
    EmptyBatch { seq: usize },
    /// The log ends inside a batch.
    Unterminated,
}

impl fmt::Display for BracketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NestedWill { seq } => write!(f, "event {seq}: will_change inside an open batch"),
            Self::ChangeOutsideBatch { seq } => write!(f, "event {seq}: on_change outside a batch"),
            Self::UnmatchedDid { seq } => write!(f, "event {seq}: did_change without will_change"),
            Self::EmptyBatch { seq } => write!(f, "event {seq}: batch closed without changes"),
            Self::Unterminated => f.write_str("log ends inside an open batch"),
        }
    }
}

impl std::error::Error for BracketError {}

struct Log<T> {
    events: Vec<BufferEvent<T>>,
    threads: Vec<ThreadId>,
}

/// Subscriber that records every callback in arrival order, along with the
/// thread that delivered it.
pub struct Recorder<T> {
    log: Mutex<Log<T>>,
}

impl<T> Default for Recorder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Recorder<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            log: Mutex::new(Log {
                events: Vec::new(),
                threads: Vec::new(),
            }),
        }
    }

    fn log(&self) -> MutexGuard<'_, Log<T>> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, event: BufferEvent<T>) {
        let mut log = self.log();
        let caller = thread::current().id();
        if !log.threads.contains(&caller) {
            log.threads.push(caller);
        }
        log.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.log().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Distinct threads that delivered callbacks, in first-seen order.
    pub fn callback_threads(&self) -> Vec<ThreadId> {
        self.log().threads.clone()
    }

    /// Validate the log and return the number of complete batches.
    pub fn check_bracketing(&self) -> Result<usize, BracketError> {
        let log = self.log();
        let mut open: Option<usize> = None;
        let mut batches = 0;
        for (seq, event) in log.events.iter().enumerate() {
            match (event, open) {
                (BufferEvent::WillChange, None) => open = Some(0),
                (BufferEvent::WillChange, Some(_)) => return Err(BracketError::NestedWill { seq }),
                (BufferEvent::Change(_), Some(n)) => open = Some(n + 1),
                (BufferEvent::Change(_), None) => {
                    return Err(BracketError::ChangeOutsideBatch { seq });
                }
                (BufferEvent::DidChange, Some(0)) => return Err(BracketError::EmptyBatch { seq }),
                (BufferEvent::DidChange, Some(_)) => {
                    open = None;
                    batches += 1;
                }
                (BufferEvent::DidChange, None) => return Err(BracketError::UnmatchedDid { seq }),
            }
        }
        match open {
            Some(_) => Err(BracketError::Unterminated),
            None => Ok(batches),
        }
    }
}

impl<T: Clone> Recorder<T> {
    pub fn events(&self) -> Vec<BufferEvent<T>> {
        self.log().events.clone()
    }

    /// Drain the log.
    pub fn take(&self) -> Vec<BufferEvent<T>> {
        std::mem::take(&mut self.log().events)
    }

    /// Diffs grouped by `will_change` / `did_change` batch. Changes outside
    /// a batch are ignored; use [`check_bracketing`](Self::check_bracketing)
    /// to reject them.
    pub fn batches(&self) -> Vec<Vec<Diff<T>>> {
        let log = self.log();
        let mut batches = Vec::new();
        let mut current: Option<Vec<Diff<T>>> = None;
        for event in &log.events {
            match event {
                BufferEvent::WillChange => current = Some(Vec::new()),
                BufferEvent::Change(diff) => {
                    if let Some(batch) = current.as_mut() {
                        batch.push(diff.clone());
                    }
                }
                BufferEvent::DidChange => batches.extend(current.take()),
            }
        }
        batches
    }
}

impl<T: fmt::Debug> Recorder<T> {
    /// Serialize the log as JSONL (one JSON object per event).
    pub fn to_jsonl(&self) -> String {
        let log = self.log();
        let mut out = String::new();
        for (seq, event) in log.events.iter().enumerate() {
            if !out.is_empty() {
                out.push('\n');
            }
            let line = match event {
                BufferEvent::Change(diff) => serde_json::json!({
                    "seq": seq,
                    "event": event.label(),
                    "type": diff.diff_type.to_string(),
                    "index": diff.index,
                    "value": format!("{:?}", diff.value),
                }),
                _ => serde_json::json!({ "seq": seq, "event": event.label() }),
            };
            out.push_str(&line.to_string());
        }
        out
    }
}

impl<T: Clone + Send + Sync> Subscriber<T> for Recorder<T> {
    fn will_change(&self) {
        self.push(BufferEvent::WillChange);
    }

    fn on_change(&self, diff_type: DiffType, index: usize, value: &T) {
        self.push(BufferEvent::Change(Diff {
            diff_type,
            index,
            value: value.clone(),
        }));
    }

    fn did_change(&self) {
        self.push(BufferEvent::DidChange);
    }
}

impl<T> fmt::Debug for Recorder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recorder")
            .field("events", &self.len())
            .finish()
    }
}
