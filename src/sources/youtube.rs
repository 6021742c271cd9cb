use anyhow::{Context, Result};
use async_process::Command;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::{sync::LazyLock, time::Duration};
use tokio::sync::Semaphore;
use tracing::{debug, info};

use super::Service;
use crate::{
    audio::track::{Playlist, PlaylistInfo, Track},
    user::User,
};

static YOUTUBE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(https?://)?(www\.|m\.)?(youtube\.com/(watch\?v=|embed/|v/|shorts/|playlist\?list=)|youtu\.be/|music\.youtube\.com/)",
    )
    .expect("youtube url regex is valid")
});

/// Servicio de YouTube resuelto con yt-dlp.
pub struct YouTubeService {
    // Limitar invocaciones concurrentes de yt-dlp
    rate_limiter: Semaphore,
    max_playlist_size: usize,
}

/// Información extraída de yt-dlp (`--dump-single-json --flat-playlist`)
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    id: String,
    #[serde(rename = "_type")]
    kind: Option<String>,
    title: Option<String>,
    url: Option<String>,
    webpage_url: Option<String>,
    duration: Option<f64>,
    uploader: Option<String>,
    uploader_url: Option<String>,
    channel: Option<String>,
    channel_url: Option<String>,
    thumbnail: Option<String>,
    #[serde(default)]
    thumbnails: Vec<Thumbnail>,
    is_live: Option<bool>,
    // yt-dlp deja `null` para videos no disponibles
    #[serde(default)]
    entries: Vec<Option<YtDlpInfo>>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

impl YouTubeService {
    pub const NAME: &'static str = "YouTube";

    pub fn new(max_playlist_size: usize) -> Self {
        Self {
            rate_limiter: Semaphore::new(3),
            max_playlist_size,
        }
    }

    /// Verifica si una URL es válida para YouTube
    pub fn is_youtube_url(url: &str) -> bool {
        YOUTUBE_URL.is_match(url)
    }

    pub fn is_playlist_url(url: &str) -> bool {
        url.contains("/playlist?") || url.contains("&list=") || url.contains("?list=")
    }

    async fn dump_json(&self, url: &str) -> Result<String> {
        let _permit = self.rate_limiter.acquire().await?;

        let playlist_end = self.max_playlist_size.to_string();
        let mut args = vec![
            "--dump-single-json",
            "--flat-playlist",
            "--playlist-end",
            playlist_end.as_str(),
            "--no-warnings",
        ];
        if !Self::is_playlist_url(url) {
            args.push("--no-playlist");
        }
        args.push(url);

        debug!("📊 Obteniendo info de: {}", url);

        let output = Command::new("yt-dlp")
            .args(&args)
            .output()
            .await
            .context("Error al ejecutar yt-dlp")?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp error: {}", error.trim());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Convierte la salida JSON de yt-dlp en tracks, expandiendo playlists.
    fn parse_tracks(&self, json: &str, url: &str, requester: &User) -> Result<Vec<Track>> {
        let info: YtDlpInfo =
            serde_json::from_str(json).context("Error al parsear respuesta de yt-dlp")?;

        if info.kind.as_deref() != Some("playlist") {
            if info.is_live.unwrap_or(false) {
                anyhow::bail!("live streams are not supported");
            }
            return Ok(vec![info_to_track(info, &requester.name)]);
        }

        let playlist_info = PlaylistInfo {
            id: info.id.clone(),
            url: info.webpage_url.clone().unwrap_or_else(|| url.to_string()),
            title: info.title.clone().unwrap_or_else(|| "Untitled playlist".to_string()),
            submitter: requester.name.clone(),
            service: Self::NAME.to_string(),
        };

        let tracks: Vec<Track> = info
            .entries
            .into_iter()
            .flatten()
            .filter(|entry| !entry.is_live.unwrap_or(false))
            .take(self.max_playlist_size)
            .map(|entry| info_to_track(entry, &requester.name))
            .collect();

        if tracks.is_empty() {
            anyhow::bail!("the playlist has no playable videos");
        }

        info!("📋 Playlist \"{}\" con {} tracks", playlist_info.title, tracks.len());
        Ok(Playlist::new(playlist_info, tracks).into_tracks())
    }
}

/// Convierte YtDlpInfo a Track
fn info_to_track(info: YtDlpInfo, submitter: &str) -> Track {
    let url = info
        .webpage_url
        .or(info.url)
        .unwrap_or_else(|| format!("https://www.youtube.com/watch?v={}", info.id));
    let title = info.title.unwrap_or_else(|| "Unknown title".to_string());
    let thumbnail = info
        .thumbnail
        .or_else(|| info.thumbnails.into_iter().last().map(|t| t.url))
        .unwrap_or_default();

    Track::new(info.id, url, title, YouTubeService::NAME, submitter)
        .with_author(info.uploader.or(info.channel).unwrap_or_default())
        .with_author_url(info.uploader_url.or(info.channel_url).unwrap_or_default())
        .with_thumbnail_url(thumbnail)
        .with_duration(info.duration.map(Duration::from_secs_f64).unwrap_or_default())
}

#[async_trait]
impl Service for YouTubeService {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn matches(&self, url: &str) -> bool {
        Self::is_youtube_url(url)
    }

    async fn resolve(&self, url: &str, requester: &User) -> Result<Vec<Track>> {
        let json = self.dump_json(url).await?;
        self.parse_tracks(&json, url, requester)
    }
}
