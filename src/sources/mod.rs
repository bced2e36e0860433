pub mod ytdlp;

use async_trait::async_trait;
use std::{path::PathBuf, time::Duration};

use crate::error::PlayerError;

pub use ytdlp::YtDlpResolver;

/// Faixa resolvida: metadados e o arquivo de áudio já baixado.
/// Imutável depois de construída; consumida (e o arquivo apagado) pelo
/// controlador de reprodução.
#[derive(Debug, Clone)]
pub struct Track {
    pub title: String,
    pub source_url: String,
    pub duration: Duration,
    pub file_path: PathBuf,
}

/// Resolve uma consulta (URL ou texto de busca) em uma faixa baixada.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaResolver: Send + Sync {
    async fn resolve(&self, query: &str) -> Result<Track, PlayerError>;
}
