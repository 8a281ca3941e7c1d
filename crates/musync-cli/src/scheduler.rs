use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use musync_core::prelude::*;

/// What a single polling cycle ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Refreshed(String),
    Downloaded { playlist: String, id: SongId },
    Idle,
}

/// Drives the playlists one at a time: either one refresh or one download per cycle.
///
/// A refresh that was skipped does not end the cycle, so a playlist whose
/// query keeps failing cannot starve the ones after it.
pub struct Scheduler<Q: MetadataQuery, F: Fetcher> {
    playlists: Vec<Playlist>,
    query: Arc<Q>,
    fetcher: Arc<F>,
    refresh_interval: Duration,
    poll_interval: Duration,
}

impl<Q: MetadataQuery, F: Fetcher> Scheduler<Q, F> {
    pub fn new(
        playlists: Vec<Playlist>,
        query: Arc<Q>,
        fetcher: Arc<F>,
        refresh_interval: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            playlists,
            query,
            fetcher,
            refresh_interval,
            poll_interval,
        }
    }

    pub fn playlists(&self) -> &[Playlist] {
        &self.playlists
    }

    /// Adopts files left over from earlier runs. A failing folder is logged and skipped.
    pub async fn sync_from_disk(&mut self) {
        for playlist in &mut self.playlists {
            if let Err(err) = playlist.sync_from_disk().await {
                error!(playlist = playlist.name(), %err, "failed to sync playlist from disk");
            }
        }
    }

    pub async fn run_cycle(&mut self, now: DateTime<Utc>) -> CycleOutcome {
        for playlist in &mut self.playlists {
            if playlist.needs_refresh(now, self.refresh_interval) {
                if playlist.refresh(self.query.as_ref()).await.applied() {
                    return CycleOutcome::Refreshed(playlist.name().to_owned());
                }
                debug!(playlist = playlist.name(), "refresh skipped, moving on");
            }

            match playlist.advance_queue(self.fetcher.as_ref()).await {
                Ok(QueueStep::Downloaded(id)) => {
                    return CycleOutcome::Downloaded {
                        playlist: playlist.name().to_owned(),
                        id,
                    };
                }
                Ok(_) => {}
                Err(err) => {
                    error!(playlist = playlist.name(), %err, "failed to process download queue");
                }
            }
        }
        debug!("nothing to do this cycle");
        CycleOutcome::Idle
    }

    /// Runs cycles until `shutdown` resolves. A cycle in progress is always finished.
    pub async fn run<S>(&mut self, shutdown: S)
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            self.run_cycle(Utc::now()).await;
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested, stopping scheduler");
                    break;
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use async_trait::async_trait;
    use mockall::{mock, predicate::always};
    use tempfile::tempdir;

    mock! {
        pub Query {}

        #[async_trait]
        impl MetadataQuery for Query {
            async fn query(&self, playlist_url: &str) -> Result<Vec<RemoteSong>>;
        }
    }

    mock! {
        pub Downloader {}

        #[async_trait]
        impl Fetcher for Downloader {
            async fn fetch(&self, request: &FetchRequest) -> Result<()>;
        }
    }

    const HOUR: Duration = Duration::from_secs(3600);

    fn playlist(name: &str, folder: &Path) -> Playlist {
        std::fs::create_dir_all(folder).unwrap();
        Playlist::new(
            name,
            format!("http://test.com/{name}"),
            folder,
            Box::new(FolderIndex::new(folder)),
            SyncPolicy::default(),
        )
    }

    fn scheduler(
        playlists: Vec<Playlist>,
        query: MockQuery,
        fetcher: MockDownloader,
    ) -> Scheduler<MockQuery, MockDownloader> {
        Scheduler::new(
            playlists,
            Arc::new(query),
            Arc::new(fetcher),
            HOUR,
            Duration::from_millis(10),
        )
    }

    fn songs_for(url: &str) -> Vec<RemoteSong> {
        let name = url.rsplit('/').next().unwrap_or_default();
        vec![RemoteSong::new(
            format!("{name}-1"),
            format!("{name} song"),
            format!("http://test.com/{name}/1"),
        )]
    }

    fn unavailable() -> MuSyncError {
        MuSyncError::Tool {
            tool: "yt-dlp".into(),
            status: 1,
            message: "Video unavailable".into(),
        }
    }

    #[tokio::test]
    async fn refreshes_one_stale_playlist_per_cycle() {
        let dir = tempdir().unwrap();
        let mut query = MockQuery::new();
        query
            .expect_query()
            .with(always())
            .times(2)
            .returning(|url| Ok(songs_for(url)));
        let mut fetcher = MockDownloader::new();
        fetcher.expect_fetch().returning(|_| Err(unavailable()));

        let mut scheduler = scheduler(
            vec![
                playlist("a", &dir.path().join("a")),
                playlist("b", &dir.path().join("b")),
            ],
            query,
            fetcher,
        );

        let now = Utc::now();
        assert_eq!(scheduler.run_cycle(now).await, CycleOutcome::Refreshed("a".into()));
        assert_eq!(scheduler.run_cycle(now).await, CycleOutcome::Refreshed("b".into()));
        assert!(scheduler.playlists().iter().all(|p| p.queue().len() == 1));
    }

    #[tokio::test]
    async fn downloads_one_song_per_cycle_once_fresh() {
        let dir = tempdir().unwrap();
        let mut query = MockQuery::new();
        query.expect_query().times(2).returning(|url| Ok(songs_for(url)));
        let mut fetcher = MockDownloader::new();
        fetcher
            .expect_fetch()
            .times(2)
            .returning(|request| {
                let file = request.folder.join(format!("{}.mp3", request.output_template));
                std::fs::write(file, b"audio")?;
                Ok(())
            });

        let mut scheduler = scheduler(
            vec![
                playlist("a", &dir.path().join("a")),
                playlist("b", &dir.path().join("b")),
            ],
            query,
            fetcher,
        );

        let now = Utc::now();
        assert_eq!(scheduler.run_cycle(now).await, CycleOutcome::Refreshed("a".into()));
        assert_eq!(
            scheduler.run_cycle(now).await,
            CycleOutcome::Downloaded {
                playlist: "a".into(),
                id: SongId::from("a-1"),
            }
        );
        assert_eq!(scheduler.run_cycle(now).await, CycleOutcome::Refreshed("b".into()));
        assert_eq!(
            scheduler.run_cycle(now).await,
            CycleOutcome::Downloaded {
                playlist: "b".into(),
                id: SongId::from("b-1"),
            }
        );
        assert_eq!(scheduler.run_cycle(now).await, CycleOutcome::Idle);
        assert!(dir.path().join("a").join("a song [a-1].mp3").exists());
    }

    #[tokio::test]
    async fn queue_error_in_one_playlist_does_not_stop_the_next() {
        let dir = tempdir().unwrap();
        let mut query = MockQuery::new();
        query.expect_query().returning(|url| Ok(songs_for(url)));
        let mut fetcher = MockDownloader::new();
        fetcher
            .expect_fetch()
            .withf(|request| request.locator == "http://test.com/b/1")
            .times(1)
            .returning(|_| Ok(()));

        let broken = dir.path().join("a");
        let mut scheduler = scheduler(
            vec![playlist("a", &broken), playlist("b", &dir.path().join("b"))],
            query,
            fetcher,
        );

        let now = Utc::now();
        assert_eq!(scheduler.run_cycle(now).await, CycleOutcome::Refreshed("a".into()));
        std::fs::remove_dir_all(&broken).unwrap();

        assert_eq!(scheduler.run_cycle(now).await, CycleOutcome::Refreshed("b".into()));
        assert_eq!(
            scheduler.run_cycle(now).await,
            CycleOutcome::Downloaded {
                playlist: "b".into(),
                id: SongId::from("b-1"),
            }
        );
        assert_eq!(scheduler.playlists()[0].queue().len(), 1);
    }

    #[tokio::test]
    async fn failing_query_does_not_starve_later_playlists() {
        let dir = tempdir().unwrap();
        let mut query = MockQuery::new();
        query
            .expect_query()
            .withf(|url| url.ends_with("/a"))
            .returning(|_| Err(unavailable()));
        query
            .expect_query()
            .withf(|url| url.ends_with("/b"))
            .times(1)
            .returning(|url| Ok(songs_for(url)));
        let mut fetcher = MockDownloader::new();
        fetcher
            .expect_fetch()
            .withf(|request| request.locator == "http://test.com/b/1")
            .times(1)
            .returning(|_| Ok(()));

        let mut scheduler = scheduler(
            vec![
                playlist("a", &dir.path().join("a")),
                playlist("b", &dir.path().join("b")),
            ],
            query,
            fetcher,
        );

        let now = Utc::now();
        assert_eq!(scheduler.run_cycle(now).await, CycleOutcome::Refreshed("b".into()));
        assert_eq!(
            scheduler.run_cycle(now).await,
            CycleOutcome::Downloaded {
                playlist: "b".into(),
                id: SongId::from("b-1"),
            }
        );
        assert_eq!(scheduler.run_cycle(now).await, CycleOutcome::Idle);
        assert!(scheduler.playlists()[0].last_synced().is_none());
        assert!(scheduler.playlists()[1].last_synced().is_some());
    }

    #[tokio::test]
    async fn empty_playlist_does_not_end_the_cycle() {
        let dir = tempdir().unwrap();
        let mut query = MockQuery::new();
        query
            .expect_query()
            .withf(|url| url.ends_with("/a"))
            .returning(|_| Ok(Vec::new()));
        query
            .expect_query()
            .withf(|url| url.ends_with("/b"))
            .times(1)
            .returning(|url| Ok(songs_for(url)));
        let mut fetcher = MockDownloader::new();
        fetcher.expect_fetch().returning(|_| Err(unavailable()));

        let mut scheduler = scheduler(
            vec![
                playlist("a", &dir.path().join("a")),
                playlist("b", &dir.path().join("b")),
            ],
            query,
            fetcher,
        );

        assert_eq!(scheduler.run_cycle(Utc::now()).await, CycleOutcome::Refreshed("b".into()));
        assert_eq!(scheduler.playlists()[1].queue().len(), 1);
    }

    #[tokio::test]
    async fn stale_playlist_is_refreshed_again_after_interval() {
        let dir = tempdir().unwrap();
        let mut query = MockQuery::new();
        query.expect_query().times(2).returning(|url| Ok(songs_for(url)));
        let mut fetcher = MockDownloader::new();
        fetcher.expect_fetch().returning(|_| Err(unavailable()));

        let mut scheduler = scheduler(vec![playlist("a", &dir.path().join("a"))], query, fetcher);

        let now = Utc::now();
        assert_eq!(scheduler.run_cycle(now).await, CycleOutcome::Refreshed("a".into()));
        assert_eq!(scheduler.run_cycle(now).await, CycleOutcome::Idle);
        assert_eq!(scheduler.playlists()[0].queue().len(), 1);

        let later = now + chrono::Duration::hours(2);
        assert_eq!(scheduler.run_cycle(later).await, CycleOutcome::Refreshed("a".into()));
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let dir = tempdir().unwrap();
        let mut query = MockQuery::new();
        query.expect_query().returning(|_| Ok(Vec::new()));
        let mut fetcher = MockDownloader::new();
        fetcher.expect_fetch().never();

        let mut scheduler = scheduler(vec![playlist("a", &dir.path().join("a"))], query, fetcher);
        scheduler.run(async {}).await;

        assert!(scheduler.playlists()[0].last_synced().is_none());
    }

    #[tokio::test]
    async fn sync_from_disk_adopts_existing_files() {
        let dir = tempdir().unwrap();
        let folder = dir.path().join("a");
        std::fs::create_dir_all(&folder).unwrap();
        std::fs::write(folder.join("Old [a-9].mp3"), b"audio").unwrap();

        let mut scheduler = scheduler(
            vec![playlist("a", &folder)],
            MockQuery::new(),
            MockDownloader::new(),
        );
        scheduler.sync_from_disk().await;

        assert!(scheduler.playlists()[0].song(&SongId::from("a-9")).is_some());
    }
}
