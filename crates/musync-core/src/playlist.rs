use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, instrument};

use crate::config::{PlaylistEntry, SyncConfig, SyncPolicy};
use crate::disk::{DiskIndex, FolderIndex};
use crate::error::Result;
use crate::fetch::{Fetcher, MetadataQuery};
use crate::queue::{DownloadQueue, QueueStep};
use crate::reconcile::{ReconcileOutcome, Reconciler, TrackedSongs};
use crate::song::{Song, SongId};

/// Sync state for one remote playlist and the folder it mirrors into.
pub struct Playlist {
    name: String,
    url: String,
    folder: PathBuf,
    disk: Box<dyn DiskIndex>,
    songs: TrackedSongs,
    queue: DownloadQueue,
    last_synced: Option<DateTime<Utc>>,
    policy: SyncPolicy,
}

impl Playlist {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        folder: impl Into<PathBuf>,
        disk: Box<dyn DiskIndex>,
        policy: SyncPolicy,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            folder: folder.into(),
            disk,
            songs: TrackedSongs::new(),
            queue: DownloadQueue::new(),
            last_synced: None,
            policy,
        }
    }

    pub fn from_config(config: &SyncConfig, entry: &PlaylistEntry) -> Self {
        let folder = config.playlist_folder(entry);
        Self::new(
            entry.name.clone(),
            entry.url.clone(),
            folder.clone(),
            Box::new(FolderIndex::new(folder)),
            config.sync_policy(),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn songs(&self) -> &TrackedSongs {
        &self.songs
    }

    pub fn song(&self, id: &SongId) -> Option<&Song> {
        self.songs.get(id)
    }

    pub fn queue(&self) -> &DownloadQueue {
        &self.queue
    }

    pub fn last_synced(&self) -> Option<DateTime<Utc>> {
        self.last_synced
    }

    /// True when the playlist was never synced or the last sync is older than `interval`.
    pub fn needs_refresh(&self, now: DateTime<Utc>, interval: Duration) -> bool {
        match self.last_synced {
            None => true,
            Some(last) => match chrono::Duration::from_std(interval) {
                Ok(interval) => last + interval <= now,
                Err(_) => false,
            },
        }
    }

    /// Tracks files already in the folder that carry an id we do not know yet.
    #[instrument(skip_all, fields(playlist = %self.name))]
    pub async fn sync_from_disk(&mut self) -> Result<usize> {
        self.disk.ensure_folder().await?;
        let listing = self.disk.listing().await?;

        let mut adopted = 0;
        for (id, file_name) in listing.encoded_ids() {
            if self.songs.contains_key(&id) {
                continue;
            }
            debug!(%id, name = file_name, "found untracked file on disk, tracking it");
            self.songs.insert(id.clone(), Song::new(id, "", file_name));
            adopted += 1;
        }

        info!(adopted, tracked = self.songs.len(), "synced playlist from disk");
        Ok(adopted)
    }

    /// Pulls the remote song list and reconciles it. Query failures leave state untouched.
    #[instrument(skip_all, fields(playlist = %self.name))]
    pub async fn refresh(&mut self, query: &dyn MetadataQuery) -> ReconcileOutcome {
        debug!(url = %self.url, "updating playlist from remote");
        let snapshot = match query.query(&self.url).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                error!(%err, "failed to query playlist");
                return ReconcileOutcome::Skipped;
            }
        };

        let reconciler = Reconciler::new(&self.policy);
        let outcome = reconciler
            .reconcile(&mut self.songs, &mut self.queue, &snapshot, self.disk.as_ref())
            .await;
        if outcome.applied() {
            self.last_synced = Some(Utc::now());
        }
        outcome
    }

    /// Prunes songs already on disk from the queue, then downloads at most one.
    #[instrument(skip_all, fields(playlist = %self.name))]
    pub async fn advance_queue(&mut self, fetcher: &dyn Fetcher) -> Result<QueueStep> {
        if self.queue.is_empty() {
            debug!("queue empty, skipping");
            return Ok(QueueStep::Idle);
        }

        let listing = self.disk.listing().await?;
        self.queue.prune(&listing);

        Ok(self
            .queue
            .process_one(&self.folder, fetcher, self.policy.max_fetch_attempts)
            .await)
    }
}

impl std::fmt::Debug for Playlist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Playlist")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("folder", &self.folder)
            .field("songs", &self.songs.len())
            .field("queue", &self.queue.len())
            .field("last_synced", &self.last_synced)
            .finish()
    }
}
