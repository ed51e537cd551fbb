//! Debounced auto-save bookkeeping.
//!
//! The timer itself lives in the UI; this type decides which content a fired
//! timer may save. Every `schedule` supersedes earlier tickets, so only the
//! timer armed by the latest edit saves, and it saves the latest content.

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingSave {
    pub note_id: String,
    pub content: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SaveTicket(u64);

#[derive(Clone, Debug, Default)]
pub struct SaveScheduler {
    generation: u64,
    pending: Option<PendingSave>,
}

impl SaveScheduler {
    pub fn schedule(&mut self, note_id: &str, content: String) -> SaveTicket {
        self.generation += 1;
        self.pending = Some(PendingSave {
            note_id: note_id.to_string(),
            content,
        });
        SaveTicket(self.generation)
    }

    /// Content to save when the timer for `ticket` fires, if that timer was
    /// not superseded or flushed in the meantime.
    pub fn take_due(&mut self, ticket: SaveTicket) -> Option<PendingSave> {
        if ticket.0 != self.generation {
            return None;
        }
        self.pending.take()
    }

    /// Takes pending content right away, e.g. when leaving edit mode or
    /// switching notes. Outstanding timers become no-ops.
    pub fn flush(&mut self) -> Option<PendingSave> {
        self.generation += 1;
        self.pending.take()
    }

    pub fn is_dirty(&self) -> bool {
        self.pending.is_some()
    }
}
