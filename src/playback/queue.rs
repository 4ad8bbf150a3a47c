//! The play queue as two sequences.
//!
//! `upcoming` holds the current track at its back and the next track to play
//! just before it; enqueued tracks go to the front. `history` holds the most
//! recently finished track at its front. Every operation that changes the
//! current track returns it so the caller can start streaming.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::library::Track;

#[derive(Debug, Default)]
pub struct PlayQueue {
    upcoming: VecDeque<Arc<Track>>,
    history: VecDeque<Arc<Track>>,
}

/// Both sequences in storage order (`upcoming` ends with the current track,
/// `history` starts with the most recent one).
#[derive(Debug, Clone, Default)]
pub struct QueueSnapshot {
    pub upcoming: Vec<Arc<Track>>,
    pub history: Vec<Arc<Track>>,
}

impl PlayQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&Arc<Track>> {
        self.upcoming.back()
    }

    /// Make `track` current, moving the previous current track to history.
    pub fn push_current(&mut self, track: Arc<Track>) {
        if let Some(current) = self.upcoming.pop_back() {
            self.history.push_front(current);
        }
        self.upcoming.push_back(track);
    }

    /// Queue `track` to play after everything already queued. Returns `true`
    /// when the queue was empty, i.e. `track` is now current.
    pub fn enqueue(&mut self, track: Arc<Track>) -> bool {
        let was_empty = self.upcoming.is_empty();
        self.upcoming.push_front(track);
        was_empty
    }

    /// Finish the current track. When nothing else is queued the finished
    /// track comes straight back and replays.
    pub fn advance(&mut self) -> Option<Arc<Track>> {
        let finished = self.upcoming.pop_back()?;
        self.history.push_front(finished);
        if self.upcoming.is_empty() {
            if let Some(replay) = self.history.pop_front() {
                self.upcoming.push_back(replay);
            }
        }
        self.upcoming.back().cloned()
    }

    /// Swap the current track with the most recent history entry.
    ///
    /// Only one step back is exact: the current track overwrites the history
    /// front instead of being pushed, so repeating this toggles between two
    /// tracks.
    pub fn step_back(&mut self) -> Option<Arc<Track>> {
        let target = self.history.front()?.clone();
        match self.upcoming.pop_back() {
            Some(current) => self.history[0] = current,
            None => {
                self.history.pop_front();
            }
        }
        self.upcoming.push_back(target.clone());
        Some(target)
    }

    /// Drop everything except the current track.
    pub fn keep_only_current(&mut self) {
        let current = self.upcoming.pop_back();
        self.upcoming.clear();
        self.history.clear();
        if let Some(current) = current {
            self.upcoming.push_back(current);
        }
    }

    pub fn clear(&mut self) {
        self.upcoming.clear();
        self.history.clear();
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            upcoming: self.upcoming.iter().cloned().collect(),
            history: self.history.iter().cloned().collect(),
        }
    }
}
