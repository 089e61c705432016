use std::thread::ThreadId;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BufferError>;

#[derive(Debug, Error)]
pub enum BufferError {
    /// A mutating call arrived from a thread other than the one that built
    /// the buffer.
    #[error("publish from {caller:?}, but the buffer is owned by {home:?}")]
    WrongThread { home: ThreadId, caller: ThreadId },

    #[error("failed to spawn reconcile worker: {0}")]
    WorkerSpawn(#[from] std::io::Error),
}

impl BufferError {
    #[must_use]
    pub fn wrong_thread(home: ThreadId, caller: ThreadId) -> Self {
        Self::WrongThread { home, caller }
    }

    /// True for programming-contract violations, as opposed to resource
    /// failures.
    #[must_use]
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::WrongThread { .. })
    }
}
