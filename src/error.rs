use thiserror::Error;

/// Erros do pipeline de resolução e reprodução.
///
/// As mensagens são o texto exibido ao usuário, por isso ficam em
/// português. Falhas de resolução e de reprodução nunca são fatais: o
/// laço de avanço as converte em uma resposta no canal e segue para o
/// próximo item da fila.
#[derive(Debug, Error)]
pub enum PlayerError {
    /// O backend não conseguiu encontrar ou baixar a mídia.
    #[error("{0}")]
    Resolution(String),

    /// A duração resolvida ficou abaixo do piso configurado.
    #[error("Vídeo muito curto ou Short do YouTube detectado ({actual}s, mínimo {min}s)")]
    TrackTooShort { actual: u64, min: u64 },

    /// O transporte de áudio reportou uma falha.
    #[error("Falha na reprodução: {0}")]
    Playback(String),

    /// Comando invocado sem o estado necessário.
    #[error("{0}")]
    Precondition(String),
}
