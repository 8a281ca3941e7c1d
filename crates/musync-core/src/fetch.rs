use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::Result;
use crate::song::RemoteSong;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub locator: String,
    pub folder: PathBuf,
    /// File name without extension; must keep the `[<id>]` marker.
    pub output_template: String,
}

/// Downloads and transcodes one song into the target folder.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<()>;
}

/// Lists the songs a remote playlist currently holds, without downloading.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetadataQuery: Send + Sync {
    async fn query(&self, playlist_url: &str) -> Result<Vec<RemoteSong>>;
}
