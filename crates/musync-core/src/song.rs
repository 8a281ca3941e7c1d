use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::disk::DiskIndex;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Ord, PartialOrd)]
pub struct SongId(pub String);

impl SongId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SongId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SongId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// One entry of a remote playlist snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSong {
    pub id: SongId,
    pub title: String,
    pub locator: String,
}

impl RemoteSong {
    pub fn new(id: impl Into<String>, title: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            id: SongId(id.into()),
            title: title.into(),
            locator: locator.into(),
        }
    }
}

/// Where a tracked song stands with respect to the remote playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Presence {
    #[default]
    Present,
    /// Missing from this many consecutive snapshots.
    CountingDown(u32),
}

/// Result of counting one more missed snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Countdown {
    Waiting(u32),
    Expired(u32),
}

impl Presence {
    pub fn missed_cycles(&self) -> u32 {
        match self {
            Presence::Present => 0,
            Presence::CountingDown(cycles) => *cycles,
        }
    }

    pub fn tick(&mut self, threshold: u32) -> Countdown {
        let cycles = self.missed_cycles().saturating_add(1);
        *self = Presence::CountingDown(cycles);
        if cycles < threshold {
            Countdown::Waiting(cycles)
        } else {
            Countdown::Expired(cycles)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
    id: SongId,
    pub locator: String,
    pub title: String,
    pub presence: Presence,
}

impl Song {
    pub fn new(id: SongId, locator: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id,
            locator: locator.into(),
            title: title.into(),
            presence: Presence::Present,
        }
    }

    pub fn id(&self) -> &SongId {
        &self.id
    }

    pub fn deletion_countdown(&self) -> u32 {
        self.presence.missed_cycles()
    }

    pub fn reset_deletion_countdown(&mut self) {
        self.presence = Presence::Present;
    }

    /// Takes the remote's title and locator and marks the song present again.
    pub fn refresh_from(&mut self, remote: &RemoteSong) {
        self.title.clone_from(&remote.title);
        self.locator.clone_from(&remote.locator);
        self.reset_deletion_countdown();
    }

    /// Counts one more absence and, once the grace threshold is reached,
    /// removes the song's file. Returns true when the song may be forgotten.
    pub async fn attempt_deletion(&mut self, disk: &dyn DiskIndex, threshold: u32) -> bool {
        match self.presence.tick(threshold) {
            Countdown::Waiting(cycles) => {
                debug!(id = %self.id, cycles, threshold, "song missing from remote, counting down");
                false
            }
            Countdown::Expired(_) => match disk.remove_by_id(&self.id).await {
                Ok(Some(path)) => {
                    debug!(id = %self.id, path = %path.display(), "deleted song file");
                    true
                }
                Ok(None) => {
                    debug!(id = %self.id, title = %self.title, "song scheduled for deletion not found on disk");
                    true
                }
                Err(err) => {
                    error!(id = %self.id, title = %self.title, %err, "failed to delete song");
                    false
                }
            },
        }
    }
}

impl From<RemoteSong> for Song {
    fn from(remote: RemoteSong) -> Self {
        Self::new(remote.id, remote.locator, remote.title)
    }
}
