//! HTTP-backed resolver streaming audio and covers with reqwest.

use super::{ProgressFn, SongResolver};
use crate::config::RetryConfig;
use crate::error::{DownloadError, Error, Result};
use crate::retry::download_with_retry;
use crate::types::SongRef;
use async_trait::async_trait;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use url::Url;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const USER_AGENT: &str = concat!("song-dl/", env!("CARGO_PKG_VERSION"));

/// [`SongResolver`] that downloads `audio_url` and `cover_url` over HTTP and writes
/// the embedded lyric text to disk
///
/// Transient network failures (timeouts, refused connections, 5xx) are retried
/// according to the [`RetryConfig`].
#[derive(Debug, Clone)]
pub struct HttpResolver {
    client: reqwest::Client,
    retry: RetryConfig,
}

impl HttpResolver {
    /// Create a resolver with its own connection pool
    pub fn new(retry: RetryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self { client, retry })
    }

    /// Create a resolver sharing an existing client
    pub fn with_client(client: reqwest::Client, retry: RetryConfig) -> Self {
        Self { client, retry }
    }

    async fn stream_to_file(
        &self,
        url: &Url,
        dest: &Path,
        on_progress: ProgressFn<'_>,
    ) -> Result<u64> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await?
            .error_for_status()?;

        let total = response.content_length().unwrap_or(0);
        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut received: u64 = 0;

        on_progress(0, total);
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            received += chunk.len() as u64;
            on_progress(received, total);
        }
        file.flush().await?;

        Ok(received)
    }

    async fn fetch_bytes(&self, url: &Url) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await?
            .error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

fn parse_locator(song: &SongRef, raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| {
        DownloadError::FetchFailed {
            song_id: song.song_id.clone(),
            reason: format!("invalid locator '{raw}': {e}"),
        }
        .into()
    })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[async_trait]
impl SongResolver for HttpResolver {
    async fn fetch_audio(
        &self,
        song: &SongRef,
        dest: &Path,
        on_progress: ProgressFn<'_>,
    ) -> Result<u64> {
        let raw = non_empty(song.audio_url.as_deref()).ok_or_else(|| {
            Error::from(DownloadError::FetchFailed {
                song_id: song.song_id.clone(),
                reason: "no audio locator".to_string(),
            })
        })?;
        let url = parse_locator(song, raw)?;

        tracing::debug!(song_id = %song.song_id, %url, dest = %dest.display(), "Fetching audio");
        let bytes =
            download_with_retry(&self.retry, || self.stream_to_file(&url, dest, on_progress))
                .await?;
        tracing::debug!(song_id = %song.song_id, bytes, "Audio fetched");
        Ok(bytes)
    }

    async fn fetch_cover(&self, song: &SongRef, dest: &Path) -> Result<Option<PathBuf>> {
        let Some(raw) = non_empty(song.cover_url.as_deref()) else {
            return Ok(None);
        };
        let url = parse_locator(song, raw)?;

        let bytes = download_with_retry(&self.retry, || self.fetch_bytes(&url)).await?;
        tokio::fs::write(dest, &bytes).await?;
        Ok(Some(dest.to_path_buf()))
    }

    async fn fetch_lyric(&self, song: &SongRef, dest: &Path) -> Result<Option<PathBuf>> {
        let Some(text) = non_empty(song.lyric.as_deref()) else {
            return Ok(None);
        };

        tokio::fs::write(dest, text.as_bytes()).await?;
        Ok(Some(dest.to_path_buf()))
    }
}
