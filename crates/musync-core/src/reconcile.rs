use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::config::{EmptySnapshotPolicy, SyncPolicy};
use crate::disk::DiskIndex;
use crate::queue::DownloadQueue;
use crate::song::{RemoteSong, Song, SongId};

pub type TrackedSongs = HashMap<SongId, Song>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub queued: Vec<SongId>,
    pub removed: Vec<SongId>,
    pub refreshed: usize,
    pub counting_down: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The snapshot was empty and nothing was touched.
    Skipped,
    Applied(ReconcileReport),
}

impl ReconcileOutcome {
    pub fn applied(&self) -> bool {
        matches!(self, ReconcileOutcome::Applied(_))
    }
}

/// Folds a remote snapshot into the tracked songs and the download queue.
#[derive(Debug, Clone, Copy)]
pub struct Reconciler {
    grace_period: u32,
    empty_snapshot: EmptySnapshotPolicy,
}

impl Reconciler {
    pub fn new(policy: &SyncPolicy) -> Self {
        Self {
            grace_period: policy.grace_period,
            empty_snapshot: policy.empty_snapshot,
        }
    }

    pub async fn reconcile(
        &self,
        tracked: &mut TrackedSongs,
        queue: &mut DownloadQueue,
        snapshot: &[RemoteSong],
        disk: &dyn DiskIndex,
    ) -> ReconcileOutcome {
        let snapshot: Vec<&RemoteSong> = snapshot
            .iter()
            .filter(|remote| {
                if remote.id.is_empty() {
                    warn!(title = %remote.title, "ignoring remote song without an id");
                }
                !remote.id.is_empty()
            })
            .collect();

        if snapshot.is_empty() && self.empty_snapshot == EmptySnapshotPolicy::Skip {
            info!("remote returned no songs, skipping reconciliation");
            return ReconcileOutcome::Skipped;
        }

        let mut report = ReconcileReport::default();
        let mut present = HashSet::with_capacity(snapshot.len());

        for remote in snapshot {
            present.insert(&remote.id);
            match tracked.get_mut(&remote.id) {
                Some(song) => {
                    song.refresh_from(remote);
                    queue.refresh(remote);
                    report.refreshed += 1;
                }
                None => {
                    let song = Song::from(remote.clone());
                    queue.push(song.clone());
                    tracked.insert(remote.id.clone(), song);
                    report.queued.push(remote.id.clone());
                }
            }
        }

        let absent: Vec<SongId> = tracked
            .keys()
            .filter(|id| !present.contains(id))
            .cloned()
            .collect();

        for id in absent {
            let Some(song) = tracked.get_mut(&id) else {
                continue;
            };
            if song.attempt_deletion(disk, self.grace_period).await {
                tracked.remove(&id);
                queue.remove(&id);
                report.removed.push(id);
            } else {
                report.counting_down += 1;
            }
        }

        debug!(
            new_songs = report.queued.len(),
            existing_songs = report.refreshed,
            counting_down = report.counting_down,
            deleted_songs = report.removed.len(),
            "playlist reconciled"
        );
        ReconcileOutcome::Applied(report)
    }
}
