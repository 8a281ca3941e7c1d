use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tokio::fs;
use tracing::debug;

use crate::error::Result;
use crate::song::SongId;

/// Matches the `[<id>]` marker the fetcher writes right before the extension.
static BRACKETED_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\[\]]+)\]\.[^.\[\]]+$").unwrap());

/// Names of the files currently present in a playlist folder.
///
/// This is the only place that decides whether a file belongs to a song id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiskListing {
    names: Vec<String>,
}

impl DiskListing {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// First file whose name contains `id`. An empty id matches nothing.
    pub fn find(&self, id: &SongId) -> Option<&str> {
        if id.is_empty() {
            return None;
        }
        self.names
            .iter()
            .map(String::as_str)
            .find(|name| name.contains(id.as_str()))
    }

    pub fn contains_id(&self, id: &SongId) -> bool {
        self.find(id).is_some()
    }

    /// Ids encoded in file names, paired with the file name they came from.
    pub fn encoded_ids(&self) -> impl Iterator<Item = (SongId, &str)> {
        self.names.iter().filter_map(|name| {
            BRACKETED_ID
                .captures(name)
                .and_then(|caps| caps.get(1))
                .map(|id| (SongId(id.as_str().to_owned()), name.as_str()))
        })
    }
}

impl<S: Into<String>> FromIterator<S> for DiskListing {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self::new(iter.into_iter().map(Into::into).collect())
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DiskIndex: Send + Sync {
    /// Creates the folder if needed; an existing folder is not an error.
    async fn ensure_folder(&self) -> Result<()>;
    async fn listing(&self) -> Result<DiskListing>;
    /// Removes the first file belonging to `id`, returning its path.
    async fn remove_by_id(&self, id: &SongId) -> Result<Option<PathBuf>>;
}

#[derive(Debug, Clone)]
pub struct FolderIndex {
    root: PathBuf,
}

impl FolderIndex {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl DiskIndex for FolderIndex {
    async fn ensure_folder(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    async fn listing(&self) -> Result<DiskListing> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                continue;
            }
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(DiskListing::new(names))
    }

    async fn remove_by_id(&self, id: &SongId) -> Result<Option<PathBuf>> {
        let listing = self.listing().await?;
        let Some(name) = listing.find(id) else {
            return Ok(None);
        };
        let path = self.root.join(name);
        debug!(path = %path.display(), "removing song file");
        fs::remove_file(&path).await?;
        Ok(Some(path))
    }
}
