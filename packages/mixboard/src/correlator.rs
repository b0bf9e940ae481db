use std::collections::VecDeque;
use tokio::sync::oneshot;

/// What to do with the response line of a sent command
#[derive(Debug)]
pub enum Continuation {
    /// Decode a `MBC_GETVIDEOINPUTLIST` response into the state store
    InputList,
    /// Decode a `MBC_GETMIXBOARDINFO` response into the state store
    MixState,
    /// Hand the raw line to an external caller
    Reply(oneshot::Sender<String>),
}

/// FIFO of continuations for commands awaiting their response.
///
/// The device answers commands in the order they were sent, so the oldest
/// continuation always owns the next response line.
#[derive(Debug, Default)]
pub struct Correlator {
    pending: VecDeque<Continuation>,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, continuation: Continuation) {
        self.pending.push_back(continuation);
    }

    /// Take the continuation owning the next response
    pub fn pop(&mut self) -> Option<Continuation> {
        self.pending.pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop every pending continuation. Waiting `Reply` callers observe a
    /// closed channel. Returns how many were dropped.
    pub fn abandon(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }
}
