use std::{sync::Arc, time::Duration};
use tracing::{debug, info};

use crate::{
    audio::player::{PlaybackState, PlayerService},
    config::Config,
};

/// Decide se a sessão de voz de uma guild deve ser derrubada: existe uma
/// sessão, nada está tocando e o tempo ocioso passou do limite.
pub(crate) fn should_disconnect(
    has_session: bool,
    state: PlaybackState,
    idle_for: Duration,
    threshold: Duration,
) -> bool {
    has_session && state != PlaybackState::Playing && idle_for > threshold
}

/// Tarefa periódica que desconecta sessões de voz ociosas. O agendamento
/// fica em `run`; `tick` é uma passada avulsa, chamável diretamente.
pub struct InactivityMonitor {
    player: Arc<PlayerService>,
    check_period: Duration,
    threshold: Duration,
}

impl InactivityMonitor {
    pub fn new(player: Arc<PlayerService>, config: &Config) -> Self {
        Self {
            player,
            check_period: Duration::from_secs(config.inactivity_check_period),
            threshold: Duration::from_secs(config.inactivity_timeout),
        }
    }

    /// Uma passada de verificação sobre todas as guilds.
    pub async fn tick(&self) {
        debug!("⏲️ Verificando sessões ociosas");
        self.player.disconnect_idle(self.threshold).await;
    }

    pub async fn run(self) {
        info!(
            "⏲️ Monitor de inatividade: limite {} (verificação a cada {})",
            humantime::format_duration(self.threshold),
            humantime::format_duration(self.check_period),
        );

        let mut interval = tokio::time::interval(self.check_period);
        loop {
            interval.tick().await;
            self.tick().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{logger::CommandLogger, sources::MockMediaResolver};
    use songbird::Songbird;

    const IDLE_LIMIT: Duration = Duration::from_secs(600);

    #[tokio::test]
    async fn tick_is_callable_directly() {
        let (player, _events) = PlayerService::new(
            Songbird::serenity(),
            Arc::new(MockMediaResolver::new()),
            Arc::new(CommandLogger::new(std::env::temp_dir())),
        );
        let monitor = InactivityMonitor::new(player, &Config::default());

        // Sem sessões ativas uma passada não tem efeito algum
        monitor.tick().await;
    }

    #[test]
    fn disconnects_after_limit_without_playback() {
        // 601s ociosa, nada tocando: cai
        assert!(should_disconnect(
            true,
            PlaybackState::Idle,
            Duration::from_secs(601),
            IDLE_LIMIT
        ));
    }

    #[test]
    fn exact_limit_is_not_yet_idle() {
        assert!(!should_disconnect(
            true,
            PlaybackState::Idle,
            Duration::from_secs(600),
            IDLE_LIMIT
        ));
    }

    #[test]
    fn playing_guilds_are_never_disconnected() {
        assert!(!should_disconnect(
            true,
            PlaybackState::Playing,
            Duration::from_secs(7200),
            IDLE_LIMIT
        ));
    }

    #[test]
    fn guilds_without_session_are_ignored() {
        assert!(!should_disconnect(
            false,
            PlaybackState::Idle,
            Duration::from_secs(7200),
            IDLE_LIMIT
        ));
    }

    #[test]
    fn advancing_counts_as_not_playing() {
        // Avanço travado há muito tempo também conta como ocioso
        assert!(should_disconnect(
            true,
            PlaybackState::Advancing,
            Duration::from_secs(601),
            IDLE_LIMIT
        ));
    }
}
