//! Process-wide table of cancellable generations

use parking_lot::Mutex;
use uuid::Uuid;

use crate::llm::AbortHandle;

/// Maps in-flight generation handles to their abort capabilities.
///
/// Entries are held in insertion order so `cancel(None)` can target the
/// most recently started generation. The table never owns a generation:
/// the relay inserts an entry when streaming begins and removes it on any
/// terminal path, and both removal paths may race benignly.
#[derive(Debug, Default)]
pub struct CancellationRegistry {
    entries: Mutex<Vec<(Uuid, AbortHandle)>>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a generation visible to `cancel`. Immediate, non-blocking.
    pub fn register(&self, handle: Uuid, abort: AbortHandle) {
        self.entries.lock().push((handle, abort));
    }

    /// Remove a generation after it terminates. Idempotent.
    pub fn unregister(&self, handle: Uuid) {
        self.entries.lock().retain(|(id, _)| *id != handle);
    }

    /// Abort a generation and report whether one was found.
    ///
    /// `None` targets the most recently registered entry. The entry is
    /// removed before `abort` is invoked, so concurrent cancels of the same
    /// handle abort at most once. An unknown or already-finished handle is
    /// not an error; racing with natural completion is expected.
    pub fn cancel(&self, handle: Option<Uuid>) -> bool {
        let entry = {
            let mut entries = self.entries.lock();
            match handle {
                Some(id) => entries
                    .iter()
                    .position(|(entry_id, _)| *entry_id == id)
                    .map(|pos| entries.remove(pos)),
                None => entries.pop(),
            }
        };

        match entry {
            Some((id, abort)) => {
                tracing::info!(generation_id = %id, "Cancelling generation");
                abort.abort();
                true
            }
            None => false,
        }
    }

    /// Number of generations currently in flight
    pub fn active(&self) -> usize {
        self.entries.lock().len()
    }
}
