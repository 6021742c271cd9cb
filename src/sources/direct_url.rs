use anyhow::{Context, Result};
use async_trait::async_trait;
use std::{io::Cursor, time::Duration};
use symphonia::core::{
    formats::FormatOptions, io::MediaSourceStream, meta::MetadataOptions, probe::Hint,
};
use tracing::{debug, warn};
use url::Url;

use super::Service;
use crate::{audio::track::Track, user::User};

const AUDIO_EXTENSIONS: [&str; 6] = ["mp3", "wav", "ogg", "flac", "m4a", "opus"];

/// Tamaño máximo que se descarga para medir la duración
const MAX_FETCH_BYTES: u64 = 64 * 1024 * 1024;

/// Archivos de audio servidos directamente por HTTP(S).
///
/// The title comes from the file name. The length is read with symphonia
/// from the downloaded body; when it cannot be determined the track keeps
/// a zero (unknown) duration.
#[derive(Debug, Default)]
pub struct DirectUrlService {
    http: reqwest::Client,
}

impl DirectUrlService {
    pub const NAME: &'static str = "Direct";

    pub fn new() -> Self {
        Self::default()
    }

    fn parse(url: &str) -> Option<Url> {
        let parsed = Url::parse(url).ok()?;
        matches!(parsed.scheme(), "http" | "https").then_some(parsed)
    }

    fn extension(parsed: &Url) -> Option<String> {
        let path = parsed.path().to_lowercase();
        let (_, ext) = path.rsplit_once('.')?;
        AUDIO_EXTENSIONS.contains(&ext).then(|| ext.to_string())
    }

    async fn fetch_duration(&self, url: &str, extension: String) -> Result<Duration> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .context("Error al descargar el archivo")?
            .error_for_status()?;

        if let Some(len) = response.content_length() {
            if len > MAX_FETCH_BYTES {
                anyhow::bail!("archivo demasiado grande para medir ({} bytes)", len);
            }
        }

        let body = response.bytes().await?.to_vec();
        debug!("🔍 Midiendo duración de {} ({} bytes)", url, body.len());

        tokio::task::spawn_blocking(move || read_duration(body, &extension)).await?
    }
}

/// Builds the track for a direct link without touching the network.
fn track_from_url(parsed: &Url, url: &str, requester: &User) -> Result<Track> {
    let file_name = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| anyhow::anyhow!("la URL no apunta a un archivo: {}", url))?;
    let title = urlencoding::decode(file_name)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| file_name.to_string());

    let host = parsed.host_str().unwrap_or_default().to_string();
    Ok(Track::new(url, url, title, DirectUrlService::NAME, &requester.name)
        .with_author(host.clone())
        .with_author_url(format!("{}://{}", parsed.scheme(), host)))
}

/// Lee la duración de un archivo de audio en memoria.
fn read_duration(data: Vec<u8>, extension: &str) -> Result<Duration> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(data)), Default::default());

    let mut hint = Hint::new();
    hint.with_extension(extension);

    let opened = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .context("Formato de audio no reconocido")?;

    let track = opened
        .format
        .default_track()
        .ok_or_else(|| anyhow::anyhow!("el archivo no tiene pista de audio"))?;
    let params = &track.codec_params;

    match (params.time_base, params.sample_rate, params.n_frames) {
        (Some(time_base), _, Some(n_frames)) => {
            let time = time_base.calc_time(n_frames);
            Ok(Duration::from_secs(time.seconds) + Duration::from_secs_f64(time.frac))
        }
        (None, Some(rate), Some(n_frames)) if rate > 0 => {
            Ok(Duration::from_secs_f64(n_frames as f64 / f64::from(rate)))
        }
        _ => anyhow::bail!("duración desconocida"),
    }
}

#[async_trait]
impl Service for DirectUrlService {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn matches(&self, url: &str) -> bool {
        Self::parse(url).as_ref().and_then(Self::extension).is_some()
    }

    async fn resolve(&self, url: &str, requester: &User) -> Result<Vec<Track>> {
        let parsed = Self::parse(url).ok_or_else(|| anyhow::anyhow!("URL mal formada: {}", url))?;
        let extension = Self::extension(&parsed)
            .ok_or_else(|| anyhow::anyhow!("extensión de audio no soportada: {}", url))?;

        let mut track = track_from_url(&parsed, url, requester)?;
        match self.fetch_duration(url, extension).await {
            Ok(duration) => track = track.with_duration(duration),
            Err(e) => warn!("⚠️ No se pudo medir la duración de {}: {:?}", url, e),
        }

        Ok(vec![track])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// WAV PCM mono de 16 bits a 8 kHz, en silencio.
    fn wav(seconds: u32) -> Vec<u8> {
        let rate = 8000u32;
        let data_len = rate * 2 * seconds;

        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVE");
        bytes.extend_from_slice(b"fmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&rate.to_le_bytes());
        bytes.extend_from_slice(&(rate * 2).to_le_bytes());
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        bytes.resize(bytes.len() + data_len as usize, 0);
        bytes
    }

    #[test]
    fn matches_audio_files_only() {
        let service = DirectUrlService::new();

        assert!(service.matches("https://cdn.test/music/song.MP3"));
        assert!(service.matches("http://cdn.test/a.ogg?token=1"));
        assert!(!service.matches("https://cdn.test/page.html"));
        assert!(!service.matches("https://cdn.test/noextension"));
        assert!(!service.matches("ftp://cdn.test/song.mp3"));
        assert!(!service.matches("not a url"));
    }

    #[test]
    fn builds_title_from_file_name() {
        let user = User::new(9, "bob");
        let url = "https://cdn.test/music/My%20Song.flac";
        let parsed = Url::parse(url).unwrap();

        let track = track_from_url(&parsed, url, &user).unwrap();

        assert_eq!(track.title(), "My Song.flac");
        assert_eq!(track.id(), url);
        assert_eq!(track.author(), "cdn.test");
        assert_eq!(track.service(), "Direct");
        assert_eq!(track.submitter(), "bob");
        assert_eq!(DirectUrlService::extension(&parsed).as_deref(), Some("flac"));
    }

    #[test]
    fn reads_length_of_wav_file() {
        assert_eq!(read_duration(wav(2), "wav").unwrap(), Duration::from_secs(2));
    }

    #[test]
    fn garbage_has_no_length() {
        assert!(read_duration(vec![0u8; 512], "mp3").is_err());
    }
}
