use std::collections::VecDeque;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::disk::DiskListing;
use crate::fetch::{FetchRequest, Fetcher};
use crate::song::{RemoteSong, Song, SongId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub song: Song,
    pub failed_attempts: u32,
}

impl QueueEntry {
    pub fn new(song: Song) -> Self {
        Self {
            song,
            failed_attempts: 0,
        }
    }

    pub fn id(&self) -> &SongId {
        self.song.id()
    }

    /// `<title> [<id>]` with path separators in the title replaced.
    pub fn output_template(&self) -> String {
        let title = self.song.title.replace(['/', '\\'], "|");
        if title.is_empty() {
            format!("[{}]", self.id())
        } else {
            format!("{title} [{}]", self.id())
        }
    }

    pub fn fetch_request(&self, folder: &Path) -> FetchRequest {
        FetchRequest {
            locator: self.song.locator.clone(),
            folder: folder.to_path_buf(),
            output_template: self.output_template(),
        }
    }
}

/// What one call to [`DownloadQueue::process_one`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueStep {
    Idle,
    Downloaded(SongId),
    Failed { id: SongId, attempts: u32 },
    Abandoned(SongId),
}

impl QueueStep {
    pub fn downloaded(&self) -> bool {
        matches!(self, QueueStep::Downloaded(_))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadQueue {
    entries: VecDeque<QueueEntry>,
}

impl DownloadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(&mut self, song: Song) {
        self.entries.push_back(QueueEntry::new(song));
    }

    pub fn remove(&mut self, id: &SongId) -> Option<QueueEntry> {
        let position = self.entries.iter().position(|entry| entry.id() == id)?;
        self.entries.remove(position)
    }

    /// Keeps a queued snapshot in step with fresher remote metadata.
    pub fn refresh(&mut self, remote: &RemoteSong) {
        if let Some(entry) = self.entries.iter_mut().find(|entry| entry.id() == &remote.id) {
            entry.song.refresh_from(remote);
        }
    }

    pub fn head(&self) -> Option<&QueueEntry> {
        self.entries.front()
    }

    pub fn ids(&self) -> Vec<SongId> {
        self.entries.iter().map(|entry| entry.id().clone()).collect()
    }

    /// Drops entries that already have a file on disk. Returns how many went.
    pub fn prune(&mut self, listing: &DiskListing) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| !listing.contains_id(entry.id()));
        let removed = before - self.entries.len();
        debug!(removed, remaining = self.entries.len(), "pruned download queue");
        removed
    }

    /// Fetches the head entry. At most one song is downloaded per call.
    pub async fn process_one(
        &mut self,
        folder: &Path,
        fetcher: &dyn Fetcher,
        max_attempts: Option<u32>,
    ) -> QueueStep {
        let Some(head) = self.entries.front_mut() else {
            debug!("queue empty, skipping");
            return QueueStep::Idle;
        };

        let id = head.id().clone();
        info!(%id, title = %head.song.title, locator = %head.song.locator, "downloading song");
        match fetcher.fetch(&head.fetch_request(folder)).await {
            Ok(()) => {
                debug!(%id, "song downloaded");
                self.entries.pop_front();
                QueueStep::Downloaded(id)
            }
            Err(err) => {
                head.failed_attempts += 1;
                let attempts = head.failed_attempts;
                warn!(%id, attempts, %err, "failed to download song");
                if max_attempts.is_some_and(|max| attempts >= max) {
                    warn!(%id, attempts, "giving up on song");
                    self.entries.pop_front();
                    return QueueStep::Abandoned(id);
                }
                QueueStep::Failed { id, attempts }
            }
        }
    }
}
