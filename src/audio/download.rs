use anyhow::{Context, Result};
use async_process::Command;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::track::Track;

/// Nombre de archivo estable para un track dentro del caché.
pub fn cache_path(directory: &Path, track: &Track) -> PathBuf {
    let stem: String = format!("{}-{}", track.service(), track.id())
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();

    directory.join(format!("{}.opus", stem.to_lowercase()))
}

/// Descarga el audio del track con yt-dlp, reutilizando el archivo si ya existe.
pub async fn download(directory: &Path, track: &Track) -> Result<PathBuf> {
    let path = cache_path(directory, track);

    if tokio::fs::try_exists(&path).await.unwrap_or(false) {
        debug!("💾 Usando archivo en caché: {}", path.display());
        return Ok(path);
    }

    info!("⬇️ Descargando: {}", track.title());

    let template = path.with_extension("%(ext)s");
    let output = Command::new("yt-dlp")
        .args([
            "--no-playlist",
            "--extract-audio",
            "--audio-format",
            "opus",
            "--quiet",
            "--no-warnings",
            "-o",
        ])
        .arg(&template)
        .arg(track.url())
        .output()
        .await
        .context("Error al ejecutar yt-dlp")?;

    if !output.status.success() {
        let error = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("yt-dlp error: {}", error.trim());
    }

    if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
        anyhow::bail!("yt-dlp no produjo {}", path.display());
    }

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_path_is_sanitized() {
        let track = Track::new("a/b?c", "https://x.test", "t", "YouTube", "me");
        let path = cache_path(Path::new("/cache"), &track);

        assert_eq!(path, PathBuf::from("/cache/youtube-a_b_c.opus"));
    }
}
