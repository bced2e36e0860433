use async_trait::async_trait;
use serde::Deserialize;
use std::{
    path::PathBuf,
    time::Duration,
};
use tokio::time::timeout;
use tracing::{debug, info, warn};
use url::Url;

use super::{MediaResolver, Track};
use crate::{config::Config, error::PlayerError};

/// Resolvedor baseado no executável `yt-dlp`: uma única invocação baixa o
/// áudio e imprime os metadados em JSON. Consultas que não são URLs viram
/// buscas (`ytsearch:`) e o primeiro resultado é usado.
pub struct YtDlpResolver {
    downloads_dir: PathBuf,
    min_duration: Duration,
    resolve_timeout: Duration,
}

impl YtDlpResolver {
    pub fn new(config: &Config) -> Self {
        Self {
            downloads_dir: config.downloads_dir.clone(),
            min_duration: Duration::from_secs(config.min_track_duration),
            resolve_timeout: Duration::from_secs(config.resolve_timeout),
        }
    }

    /// Verifica que o yt-dlp está disponível no PATH.
    pub async fn verify_dependencies() -> anyhow::Result<()> {
        let output = async_process::Command::new("yt-dlp")
            .arg("--version")
            .output()
            .await?;

        if output.status.success() {
            let version = String::from_utf8_lossy(&output.stdout);
            info!("✅ yt-dlp versão: {}", version.trim());
            Ok(())
        } else {
            anyhow::bail!("yt-dlp não disponível. Instale com: pip install yt-dlp")
        }
    }

    async fn extract(&self, target: &str) -> Result<Track, PlayerError> {
        let output_template = self.downloads_dir.join("%(title)s.%(ext)s");

        let output = tokio::process::Command::new("yt-dlp")
            .args([
                "--dump-single-json",
                "--no-simulate",
                "--format",
                "bestaudio[ext=m4a]/bestaudio/best",
                "--no-playlist",
                "--quiet",
                "--no-warnings",
                "--socket-timeout",
                "30",
                "--retries",
                "3",
            ])
            .arg("--output")
            .arg(&output_template)
            .arg(target)
            .output()
            .await
            .map_err(|e| PlayerError::Resolution(format!("falha ao executar yt-dlp: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PlayerError::Resolution(format!(
                "yt-dlp falhou: {}",
                stderr.trim()
            )));
        }

        let track = entry_track(parse_payload(&output.stdout)?)?;

        if let Err(err) = check_min_duration(&track, self.min_duration) {
            // O arquivo já foi baixado; não deixar o rejeitado para trás.
            if let Err(e) = tokio::fs::remove_file(&track.file_path).await {
                debug!(
                    "Não foi possível remover download rejeitado {}: {}",
                    track.file_path.display(),
                    e
                );
            }
            return Err(err);
        }

        info!(
            "⬇️ Baixado: {} ({}s) em {}",
            track.title,
            track.duration.as_secs(),
            track.file_path.display()
        );

        Ok(track)
    }
}

#[async_trait]
impl MediaResolver for YtDlpResolver {
    async fn resolve(&self, query: &str) -> Result<Track, PlayerError> {
        let target = normalize_query(query);
        debug!("🔍 Resolvendo: {}", target);

        match timeout(self.resolve_timeout, self.extract(&target)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("⏰ Resolução de '{}' excedeu o tempo limite", query);
                Err(PlayerError::Resolution(format!(
                    "tempo esgotado após {}",
                    humantime::format_duration(self.resolve_timeout)
                )))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct YtDlpEntry {
    title: String,
    webpage_url: String,
    duration: Option<f64>,
    #[serde(default)]
    requested_downloads: Vec<RequestedDownload>,
}

#[derive(Debug, Deserialize)]
struct RequestedDownload {
    filepath: PathBuf,
}

/// Consultas sem esquema http(s) viram buscas no provedor padrão.
fn normalize_query(query: &str) -> String {
    if is_http_url(query) {
        query.to_string()
    } else {
        format!("ytsearch:{query}")
    }
}

fn is_http_url(query: &str) -> bool {
    Url::parse(query)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Extrai a entrada relevante do JSON do yt-dlp. Payloads de busca e de
/// playlist trazem um vetor `entries`; o primeiro item é o usado.
fn parse_payload(bytes: &[u8]) -> Result<YtDlpEntry, PlayerError> {
    let value: serde_json::Value = serde_json::from_slice(bytes)
        .map_err(|e| PlayerError::Resolution(format!("metadados ilegíveis do yt-dlp: {e}")))?;

    let entry_value = match value.get("entries") {
        Some(serde_json::Value::Array(items)) => items
            .first()
            .cloned()
            .ok_or_else(|| PlayerError::Resolution("a busca não retornou resultados".to_string()))?,
        _ => value,
    };

    serde_json::from_value(entry_value)
        .map_err(|e| PlayerError::Resolution(format!("metadados incompletos do yt-dlp: {e}")))
}

fn entry_track(entry: YtDlpEntry) -> Result<Track, PlayerError> {
    let file_path = entry
        .requested_downloads
        .into_iter()
        .next()
        .map(|download| download.filepath)
        .ok_or_else(|| {
            PlayerError::Resolution("yt-dlp não informou o arquivo baixado".to_string())
        })?;

    // Duração ausente conta como zero e cai no piso mínimo.
    let secs = entry.duration.unwrap_or(0.0);
    let secs = if secs.is_finite() && secs > 0.0 { secs } else { 0.0 };

    Ok(Track {
        title: entry.title,
        source_url: entry.webpage_url,
        duration: Duration::from_secs_f64(secs),
        file_path,
    })
}

fn check_min_duration(track: &Track, min: Duration) -> Result<(), PlayerError> {
    if track.duration < min {
        return Err(PlayerError::TrackTooShort {
            actual: track.duration.as_secs(),
            min: min.as_secs(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SINGLE_VIDEO: &str = r#"{
        "title": "song A",
        "webpage_url": "https://www.youtube.com/watch?v=abc123",
        "duration": 200.0,
        "requested_downloads": [{"filepath": "downloads/song A.m4a"}]
    }"#;

    const SEARCH_RESULT: &str = r#"{
        "title": "song B",
        "entries": [
            {
                "title": "song B (oficial)",
                "webpage_url": "https://www.youtube.com/watch?v=def456",
                "duration": 187.3,
                "requested_downloads": [{"filepath": "downloads/song B (oficial).m4a"}]
            }
        ]
    }"#;

    #[test]
    fn normalize_keeps_urls_and_wraps_searches() {
        assert_eq!(
            normalize_query("https://www.youtube.com/watch?v=abc"),
            "https://www.youtube.com/watch?v=abc"
        );
        assert_eq!(normalize_query("never gonna give you up"), "ytsearch:never gonna give you up");
        // Esquemas que não são http(s) também viram busca
        assert_eq!(normalize_query("ftp://host/a.mp3"), "ytsearch:ftp://host/a.mp3");
    }

    #[test]
    fn parses_single_video_payload() {
        let entry = parse_payload(SINGLE_VIDEO.as_bytes()).unwrap();
        let track = entry_track(entry).unwrap();
        assert_eq!(track.title, "song A");
        assert_eq!(track.source_url, "https://www.youtube.com/watch?v=abc123");
        assert_eq!(track.duration.as_secs(), 200);
        assert_eq!(track.file_path, PathBuf::from("downloads/song A.m4a"));
    }

    #[test]
    fn search_payload_uses_first_entry() {
        let entry = parse_payload(SEARCH_RESULT.as_bytes()).unwrap();
        let track = entry_track(entry).unwrap();
        assert_eq!(track.title, "song B (oficial)");
        assert_eq!(track.file_path, PathBuf::from("downloads/song B (oficial).m4a"));
    }

    #[test]
    fn empty_search_is_a_resolution_error() {
        let payload = r#"{"title": "x", "entries": []}"#;
        let err = parse_payload(payload.as_bytes()).unwrap_err();
        assert!(matches!(err, PlayerError::Resolution(_)));
    }

    #[test]
    fn missing_download_path_is_a_resolution_error() {
        let payload = r#"{
            "title": "x",
            "webpage_url": "https://example.com",
            "duration": 120.0
        }"#;
        let entry = parse_payload(payload.as_bytes()).unwrap();
        let err = entry_track(entry).unwrap_err();
        assert!(matches!(err, PlayerError::Resolution(_)));
    }

    #[test]
    fn fifty_nine_seconds_is_too_short() {
        let track = Track {
            title: "curta".to_string(),
            source_url: "https://example.com".to_string(),
            duration: Duration::from_secs(59),
            file_path: PathBuf::from("downloads/curta.m4a"),
        };
        let err = check_min_duration(&track, Duration::from_secs(60)).unwrap_err();
        assert!(matches!(err, PlayerError::TrackTooShort { actual: 59, min: 60 }));
    }

    #[test]
    fn sixty_seconds_passes_the_floor() {
        let track = Track {
            title: "ok".to_string(),
            source_url: "https://example.com".to_string(),
            duration: Duration::from_secs(60),
            file_path: PathBuf::from("downloads/ok.m4a"),
        };
        assert!(check_min_duration(&track, Duration::from_secs(60)).is_ok());
    }

    #[test]
    fn missing_duration_counts_as_zero() {
        let payload = r#"{
            "title": "sem duração",
            "webpage_url": "https://example.com",
            "requested_downloads": [{"filepath": "downloads/x.m4a"}]
        }"#;
        let entry = parse_payload(payload.as_bytes()).unwrap();
        let track = entry_track(entry).unwrap();
        assert_eq!(track.duration, Duration::ZERO);
        assert!(check_min_duration(&track, Duration::from_secs(60)).is_err());
    }
}
