//! Track queue
//!
//! Ordered list of tracks with unique ids. Queue order is playback order.
//! The current track lives outside the queue so that replacing the queue can
//! leave it detached; the cursor is derived from its id.

use mellow_core::TrackRef;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackQueue {
    tracks: Vec<TrackRef>,
}

impl TrackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a queue, rejecting duplicate ids
    ///
    /// Returns the first duplicated id on failure.
    pub fn from_tracks(tracks: Vec<TrackRef>) -> Result<Self, String> {
        let mut queue = Self::new();
        queue.replace(tracks)?;
        Ok(queue)
    }

    /// Replace every track
    ///
    /// Leaves the queue untouched and returns the duplicated id when two
    /// tracks share one.
    pub fn replace(&mut self, tracks: Vec<TrackRef>) -> Result<(), String> {
        let mut seen = std::collections::HashSet::with_capacity(tracks.len());
        for track in &tracks {
            if !seen.insert(track.id.as_str()) {
                return Err(track.id.clone());
            }
        }

        self.tracks = tracks;
        Ok(())
    }

    /// Append a track unless its id is already queued
    ///
    /// Returns the index of the track in the queue either way.
    pub fn push_unique(&mut self, track: TrackRef) -> usize {
        if let Some(index) = self.position(&track.id) {
            return index;
        }
        self.tracks.push(track);
        self.tracks.len() - 1
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.tracks.iter().position(|track| track.id == id)
    }

    pub fn get(&self, index: usize) -> Option<&TrackRef> {
        self.tracks.get(index)
    }

    pub fn find(&self, id: &str) -> Option<&TrackRef> {
        self.tracks.iter().find(|track| track.id == id)
    }

    /// Index of the track after `current`
    ///
    /// Clamps to the last track. A current track that is not queued (or no
    /// current track at all) moves to the head of the queue.
    pub fn next_index(&self, current: Option<&str>) -> Option<usize> {
        if self.tracks.is_empty() {
            return None;
        }

        match current.and_then(|id| self.position(id)) {
            Some(index) => Some((index + 1).min(self.tracks.len() - 1)),
            None => Some(0),
        }
    }

    /// Index of the track before `current`
    ///
    /// Clamps to the first track; detached or missing current moves to the head.
    pub fn previous_index(&self, current: Option<&str>) -> Option<usize> {
        if self.tracks.is_empty() {
            return None;
        }

        match current.and_then(|id| self.position(id)) {
            Some(index) => Some(index.saturating_sub(1)),
            None => Some(0),
        }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn to_vec(&self) -> Vec<TrackRef> {
        self.tracks.clone()
    }
}
