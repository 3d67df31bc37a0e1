use tracing::warn;

use crate::errors::EngineError;
use crate::messages::{self, Message};
use crate::store::Store;

/// Append-only sink for semantic events. Entries are msgpack-encoded and
/// batched; the room flushes on every state broadcast and before the
/// terminal snapshot.
#[derive(Debug, Default)]
pub struct Journal {
    entries: Vec<Vec<u8>>,
    recorded: u64,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, message: &Message) {
        match messages::to_bytes(message) {
            Ok(bytes) => {
                self.entries.push(bytes);
                self.recorded += 1;
            }
            Err(err) => warn!(%err, "journal entry encoding failed"),
        }
    }

    pub fn pending(&self) -> usize {
        self.entries.len()
    }

    pub fn recorded(&self) -> u64 {
        self.recorded
    }

    pub fn flush(&mut self, store: &dyn Store, id: &str) -> Result<(), EngineError> {
        if self.entries.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.entries);
        store
            .write_journal_entries(id, batch)
            .map_err(|err| EngineError::Persistence(err.to_string()))
    }
}
