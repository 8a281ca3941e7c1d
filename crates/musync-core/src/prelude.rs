pub use crate::config::{
    DownloaderConfig, EmptySnapshotPolicy, LogLevel, PlaylistEntry, SyncConfig, SyncPolicy,
};
pub use crate::disk::{DiskIndex, DiskListing, FolderIndex};
pub use crate::error::{MuSyncError, Result};
pub use crate::fetch::{FetchRequest, Fetcher, MetadataQuery};
pub use crate::playlist::Playlist;
pub use crate::queue::{DownloadQueue, QueueStep};
pub use crate::reconcile::{ReconcileOutcome, ReconcileReport};
pub use crate::song::{RemoteSong, Song, SongId};
pub use crate::ytdlp::YtDlp;
