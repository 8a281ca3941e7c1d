//! `yt-dlp` as the metadata query and fetcher.
//!
//! The query runs `--simulate --dump-json` and reads one JSON object per
//! stdout line. The fetch extracts audio into the playlist folder and logs
//! the `[download]` progress lines it prints along the way.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::DownloaderConfig;
use crate::error::{MuSyncError, Result};
use crate::fetch::{FetchRequest, Fetcher, MetadataQuery};
use crate::song::RemoteSong;

static PROGRESS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[download\]\s+(\d+(?:\.\d+)?)%(?:.*ETA\s+(\S+))?").unwrap()
});

#[derive(Debug, Clone)]
pub struct YtDlp {
    binary: PathBuf,
    audio_format: String,
}

impl YtDlp {
    pub fn new(binary: impl Into<PathBuf>, audio_format: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            audio_format: audio_format.into(),
        }
    }

    pub fn from_config(config: &DownloaderConfig) -> Self {
        Self::new(config.binary.clone(), config.audio_format.clone())
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn query_args(url: &str) -> Vec<String> {
        ["--simulate", "--dump-json", "--no-warnings", "--", url]
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn fetch_args(&self, request: &FetchRequest) -> Vec<String> {
        // yt-dlp expands `%(...)s` in the template, so literal percents are doubled.
        let template = request.output_template.replace('%', "%%");
        let output = request.folder.join(format!("{template}.%(ext)s"));
        let mut args: Vec<String> = [
            "--extract-audio",
            "--audio-format",
            self.audio_format.as_str(),
            "--audio-quality",
            "0",
            "--embed-thumbnail",
            "--embed-metadata",
            "--abort-on-error",
            "--no-part",
            "--newline",
            "--output",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        args.push(output.to_string_lossy().into_owned());
        args.push("--".into());
        args.push(request.locator.clone());
        args
    }

    fn tool_error(&self, status: ExitStatus, message: Option<String>) -> MuSyncError {
        MuSyncError::Tool {
            tool: self.binary.display().to_string(),
            status: status.code().unwrap_or(-1),
            message: message.unwrap_or_else(|| "no error output".into()),
        }
    }
}

#[async_trait]
impl MetadataQuery for YtDlp {
    async fn query(&self, playlist_url: &str) -> Result<Vec<RemoteSong>> {
        let output = Command::new(&self.binary)
            .args(Self::query_args(playlist_url))
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.tool_error(output.status, last_line(&stderr)));
        }

        Ok(parse_snapshot(&String::from_utf8_lossy(&output.stdout)))
    }
}

#[async_trait]
impl Fetcher for YtDlp {
    async fn fetch(&self, request: &FetchRequest) -> Result<()> {
        let mut child = Command::new(&self.binary)
            .args(self.fetch_args(request))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let progress = async move {
            let Some(stdout) = stdout else { return };
            let mut lines = BufReader::new(stdout).lines();
            let mut last_decile = None;
            while let Ok(Some(line)) = lines.next_line().await {
                let Some(progress) = parse_progress(&line) else {
                    continue;
                };
                let decile = (progress.percent / 10.0) as u32;
                if last_decile != Some(decile) {
                    last_decile = Some(decile);
                    debug!(
                        percent = progress.percent,
                        eta = progress.eta.as_deref().unwrap_or("unknown"),
                        "downloading"
                    );
                }
            }
        };

        let errors = async move {
            let Some(stderr) = stderr else { return None };
            let mut lines = BufReader::new(stderr).lines();
            let mut last = None;
            while let Ok(Some(line)) = lines.next_line().await {
                if !line.trim().is_empty() {
                    last = Some(line);
                }
            }
            last
        };

        let ((), last_error) = tokio::join!(progress, errors);
        let status = child.wait().await?;
        if !status.success() {
            return Err(self.tool_error(status, last_error));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ExtractedInfo {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    requested_formats: Vec<ExtractedFormat>,
    #[serde(default)]
    webpage_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExtractedFormat {
    #[serde(default)]
    url: Option<String>,
}

impl ExtractedInfo {
    fn locator(&self) -> String {
        non_empty(self.url.as_deref())
            .or_else(|| {
                self.requested_formats
                    .iter()
                    .find_map(|format| non_empty(format.url.as_deref()))
            })
            .or_else(|| non_empty(self.webpage_url.as_deref()))
            .unwrap_or_default()
            .to_owned()
    }
}

impl From<ExtractedInfo> for RemoteSong {
    fn from(info: ExtractedInfo) -> Self {
        let locator = info.locator();
        RemoteSong::new(info.id, info.title.unwrap_or_default(), locator)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.is_empty())
}

fn last_line(text: &str) -> Option<String> {
    text.lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .map(str::to_owned)
}

/// Reads the `--dump-json` output. Lines that are not song objects are skipped.
pub fn parse_snapshot(stdout: &str) -> Vec<RemoteSong> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<ExtractedInfo>(line) {
            Ok(info) if info.id.is_empty() => {
                warn!(
                    title = info.title.as_deref().unwrap_or_default(),
                    "skipping playlist entry without an id"
                );
                None
            }
            Ok(info) => Some(RemoteSong::from(info)),
            Err(err) => {
                warn!(%err, "skipping unreadable playlist entry");
                None
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub percent: f64,
    pub eta: Option<String>,
}

pub fn parse_progress(line: &str) -> Option<Progress> {
    let caps = PROGRESS_LINE.captures(line.trim_start())?;
    let percent = caps.get(1)?.as_str().parse().ok()?;
    Some(Progress {
        percent,
        eta: caps.get(2).map(|eta| eta.as_str().to_owned()),
    })
}
