use dashmap::DashMap;
use parking_lot::Mutex;
use serenity::{
    http::Http,
    model::id::{ChannelId, GuildId},
};
use songbird::{
    tracks::TrackHandle, Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird,
    TrackEvent,
};
use std::{
    path::Path,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        inactivity::should_disconnect,
        queue::{QueuedRequest, RequestQueue},
    },
    error::PlayerError,
    logger::{CommandContext, CommandLogger},
    sources::{MediaResolver, Track},
};

/// Estado de reprodução de uma guild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Sem faixa tocando e sem avanço em andamento.
    Idle,
    /// Transitório: a faixa anterior acabou (ou um `play` chegou com a
    /// guild ociosa) e o próximo item está sendo resolvido.
    Advancing,
    /// Sessão de voz transmitindo uma faixa resolvida.
    Playing,
}

/// Eventos que dirigem a máquina de estados. Todos os avanços passam por
/// aqui, em uma única tarefa, em vez de reentrar por callbacks.
#[derive(Debug)]
pub enum PlayerEvent {
    /// Um `play` encontrou a guild ociosa e pediu o primeiro avanço.
    Advance(GuildId),
    /// A faixa corrente terminou (fim natural, skip ou erro do driver).
    TrackEnded(GuildId),
}

struct CurrentTrack {
    track: Track,
    handle: TrackHandle,
}

/// Estado por guild, protegido por um mutex próprio. Criado sob demanda no
/// primeiro comando e mantido pelo resto da vida do processo.
struct GuildState {
    queue: RequestQueue,
    call: Option<Arc<tokio::sync::Mutex<Call>>>,
    state: PlaybackState,
    current: Option<CurrentTrack>,
    last_activity: Instant,
    last_ctx: Option<CommandContext>,
}

impl GuildState {
    fn new() -> Self {
        Self {
            queue: RequestQueue::new(),
            call: None,
            state: PlaybackState::Idle,
            current: None,
            last_activity: Instant::now(),
            last_ctx: None,
        }
    }
}

/// Resultado de uma rodada de avanço: entradas consumidas por falha de
/// resolução e, se houver, o pedido que resolveu com sucesso.
pub(crate) struct AdvanceOutcome {
    pub(crate) failures: Vec<(QueuedRequest, PlayerError)>,
    pub(crate) next: Option<(QueuedRequest, Track)>,
    pub(crate) empty_ctx: Option<CommandContext>,
}

/// Serviço de reprodução: dono do registro por guild e da máquina de
/// estados de avanço. Injetado nos handlers de comando e no monitor de
/// inatividade — nada aqui é estado global de processo.
pub struct PlayerService {
    guilds: DashMap<GuildId, Arc<Mutex<GuildState>>>,
    songbird: Arc<Songbird>,
    resolver: Arc<dyn MediaResolver>,
    logger: Arc<CommandLogger>,
    events: mpsc::UnboundedSender<PlayerEvent>,
}

impl PlayerService {
    pub fn new(
        songbird: Arc<Songbird>,
        resolver: Arc<dyn MediaResolver>,
        logger: Arc<CommandLogger>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<PlayerEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let service = Arc::new(Self {
            guilds: DashMap::new(),
            songbird,
            resolver,
            logger,
            events,
        });
        (service, events_rx)
    }

    /// Laço de eventos: consome o canal e executa as transições, uma por
    /// vez, serializando toda mudança de estado de reprodução.
    pub async fn run(
        self: Arc<Self>,
        http: Arc<Http>,
        mut events: mpsc::UnboundedReceiver<PlayerEvent>,
    ) {
        info!("▶️ Laço de reprodução iniciado");
        while let Some(event) = events.recv().await {
            match event {
                PlayerEvent::Advance(guild_id) => self.advance(&http, guild_id).await,
                PlayerEvent::TrackEnded(guild_id) => self.on_track_ended(&http, guild_id).await,
            }
        }
    }

    /// Conecta ao canal de voz da guild, se ainda não conectado.
    pub async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<(), PlayerError> {
        if self.has_session(guild_id) {
            return Ok(());
        }

        match self.songbird.join(guild_id, channel_id).await {
            Ok(call) => {
                let state = self.guild_state(guild_id);
                state.lock().call = Some(call);
                info!("🔊 Conectado ao canal de voz na guild {}", guild_id);
                Ok(())
            }
            Err(e) => {
                error!("Erro ao conectar ao canal de voz: {:?}", e);
                Err(PlayerError::Playback(format!(
                    "não foi possível conectar ao canal de voz: {e}"
                )))
            }
        }
    }

    /// Enfileira um pedido. Se a guild estava ociosa, dispara o avanço e
    /// retorna `true` — a resposta ao usuário virá do próprio avanço.
    pub fn enqueue(&self, guild_id: GuildId, request: QueuedRequest) -> bool {
        let state = self.guild_state(guild_id);
        let mut st = state.lock();

        st.last_ctx = Some(request.ctx.clone());
        st.queue.push(request);

        if st.state == PlaybackState::Idle {
            st.state = PlaybackState::Advancing;
            let _ = self.events.send(PlayerEvent::Advance(guild_id));
            true
        } else {
            false
        }
    }

    pub fn is_playing(&self, guild_id: GuildId) -> bool {
        self.guild_state(guild_id).lock().state == PlaybackState::Playing
    }

    pub fn has_session(&self, guild_id: GuildId) -> bool {
        self.guild_state(guild_id).lock().call.is_some()
    }

    /// Consultas pendentes da guild, na ordem em que serão tocadas.
    pub fn queue_snapshot(&self, guild_id: GuildId) -> Vec<String> {
        self.guild_state(guild_id).lock().queue.queries()
    }

    /// Interrompe a faixa corrente. O evento de fim emitido pelo driver
    /// aciona o avanço normal para a próxima da fila.
    pub fn skip(&self, guild_id: GuildId) -> Result<(), PlayerError> {
        let handle = {
            let state = self.guild_state(guild_id);
            let st = state.lock();
            st.current.as_ref().map(|current| current.handle.clone())
        };

        match handle {
            Some(handle) => handle
                .stop()
                .map_err(|e| PlayerError::Playback(format!("não foi possível parar a faixa: {e}"))),
            None => Err(PlayerError::Precondition(
                "Nenhuma música tocando!".to_string(),
            )),
        }
    }

    /// Para tudo: limpa a fila, descarta a faixa corrente (apagando o
    /// arquivo) e derruba a sessão de voz. Idempotente quando já parado.
    pub async fn stop(&self, guild_id: GuildId) {
        let (finished, had_call) = {
            let state = self.guild_state(guild_id);
            let mut st = state.lock();
            st.queue.clear();
            st.state = PlaybackState::Idle;
            st.last_activity = Instant::now();
            (st.current.take(), st.call.take().is_some())
        };

        if let Some(current) = finished {
            // O evento de fim que este stop dispara encontrará `current`
            // vazio e será ignorado como obsoleto.
            let _ = current.handle.stop();
            cleanup_file(&current.track.file_path).await;
        }

        if had_call {
            if let Err(e) = self.songbird.remove(guild_id).await {
                warn!("Erro ao desconectar sessão de voz da guild {}: {:?}", guild_id, e);
            }
            info!("⏹️ Reprodução parada na guild {}", guild_id);
        }
    }

    /// Uma passada do monitor de inatividade: derruba sessões sem faixa
    /// tocando há mais tempo que o limite. A fila pendente NÃO é limpa —
    /// as entradas voltam a tocar no próximo `play`.
    pub async fn disconnect_idle(&self, threshold: Duration) {
        let now = Instant::now();
        let mut disconnected = Vec::new();

        for entry in self.guilds.iter() {
            let mut st = entry.value().lock();
            let idle_for = now.saturating_duration_since(st.last_activity);
            if should_disconnect(st.call.is_some(), st.state, idle_for, threshold) {
                st.call = None;
                disconnected.push((*entry.key(), idle_for));
            }
        }

        for (guild_id, idle_for) in disconnected {
            info!(
                "🔌 Desconectado da guild {} por inatividade ({} ocioso)",
                guild_id,
                humantime::format_duration(Duration::from_secs(idle_for.as_secs()))
            );
            if let Err(e) = self.songbird.remove(guild_id).await {
                warn!("Erro ao desconectar sessão de voz da guild {}: {:?}", guild_id, e);
            }
        }
    }

    /// Limpeza quando o bot é removido do canal de voz por terceiros: a
    /// sessão e a faixa corrente caem; a fila pendente permanece.
    pub async fn handle_forced_disconnect(&self, guild_id: GuildId) {
        let finished = {
            let state = self.guild_state(guild_id);
            let mut st = state.lock();
            st.call = None;
            st.state = PlaybackState::Idle;
            st.last_activity = Instant::now();
            st.current.take()
        };

        if let Some(current) = finished {
            let _ = current.handle.stop();
            cleanup_file(&current.track.file_path).await;
        }

        let _ = self.songbird.remove(guild_id).await;
    }

    async fn on_track_ended(&self, http: &Arc<Http>, guild_id: GuildId) {
        let finished = {
            let state = self.guild_state(guild_id);
            let mut st = state.lock();
            match st.current.take() {
                Some(current) => {
                    if st.state == PlaybackState::Playing {
                        st.state = PlaybackState::Advancing;
                    }
                    st.last_activity = Instant::now();
                    Some(current)
                }
                None => None,
            }
        };

        let Some(finished) = finished else {
            // stop/desconexão já tratou esta faixa; evento obsoleto
            debug!("Evento de fim obsoleto na guild {}", guild_id);
            return;
        };

        debug!("🏁 Faixa terminada: {}", finished.track.title);
        cleanup_file(&finished.track.file_path).await;
        self.advance(http, guild_id).await;
    }

    /// Consome a fila até resolver um pedido ou esvaziá-la. Cada entrada
    /// que falha é consumida, então uma fila só de falhas termina em no
    /// máximo `len` tentativas.
    pub(crate) async fn resolve_next(&self, guild_id: GuildId) -> AdvanceOutcome {
        let state = self.guild_state(guild_id);
        let mut failures = Vec::new();

        loop {
            let request = {
                let mut st = state.lock();
                st.last_activity = Instant::now();
                match st.queue.pop() {
                    Some(request) => {
                        st.state = PlaybackState::Advancing;
                        request
                    }
                    None => {
                        st.state = PlaybackState::Idle;
                        return AdvanceOutcome {
                            failures,
                            next: None,
                            empty_ctx: st.last_ctx.clone(),
                        };
                    }
                }
            };

            match self.resolver.resolve(&request.query).await {
                Ok(track) => {
                    return AdvanceOutcome {
                        failures,
                        next: Some((request, track)),
                        empty_ctx: None,
                    };
                }
                Err(err) => {
                    warn!("❌ Falha ao resolver '{}': {}", request.query, err);
                    failures.push((request, err));
                }
            }
        }
    }

    async fn advance(&self, http: &Arc<Http>, guild_id: GuildId) {
        let outcome = self.resolve_next(guild_id).await;

        for (request, err) in &outcome.failures {
            let response = format!("❌ Erro ao tocar música: {err}");
            self.announce(http, &request.ctx, &response).await;
        }

        let Some((request, track)) = outcome.next else {
            debug!("📭 Fila vazia na guild {}", guild_id);
            if let Some(ctx) = outcome.empty_ctx {
                self.logger.record(&ctx, "Fila vazia").await;
            }
            return;
        };

        let call = {
            let state = self.guild_state(guild_id);
            let call = state.lock().call.clone();
            call
        };

        let Some(call) = call else {
            // A sessão caiu durante a resolução; o download não toca.
            cleanup_file(&track.file_path).await;
            let state = self.guild_state(guild_id);
            state.lock().state = PlaybackState::Idle;
            return;
        };

        match self.start_playback(guild_id, &call, &track).await {
            Ok(handle) => {
                let response = format!("🎵 Tocando agora: {}", track.title);
                self.announce(http, &request.ctx, &response).await;

                let state = self.guild_state(guild_id);
                let mut st = state.lock();
                st.state = PlaybackState::Playing;
                st.last_activity = Instant::now();
                st.current = Some(CurrentTrack { track, handle });
            }
            Err(err) => {
                let response = format!("❌ Erro ao tocar música: {err}");
                self.announce(http, &request.ctx, &response).await;
                cleanup_file(&track.file_path).await;
                // Tenta a próxima da fila pela via normal de eventos
                let _ = self.events.send(PlayerEvent::Advance(guild_id));
            }
        }
    }

    async fn start_playback(
        &self,
        guild_id: GuildId,
        call: &Arc<tokio::sync::Mutex<Call>>,
        track: &Track,
    ) -> Result<TrackHandle, PlayerError> {
        let input = songbird::input::File::new(track.file_path.clone());
        let handle = {
            let mut call = call.lock().await;
            call.play_input(input.into())
        };

        // Fim natural e erro do driver disparam o mesmo avanço; eventos
        // duplicados são descartados como obsoletos.
        for event in [TrackEvent::End, TrackEvent::Error] {
            handle
                .add_event(
                    Event::Track(event),
                    TrackEndNotifier {
                        guild_id,
                        events: self.events.clone(),
                    },
                )
                .map_err(|e| {
                    PlayerError::Playback(format!("não foi possível acompanhar a faixa: {e}"))
                })?;
        }

        Ok(handle)
    }

    /// Envia a resposta ao canal do pedido e grava o registro no histórico
    /// de comandos. Falha de envio é registrada e não interrompe o avanço.
    async fn announce(&self, http: &Arc<Http>, ctx: &CommandContext, text: &str) {
        if let Err(e) = ctx.channel_id.say(http, text).await {
            warn!("⚠️ Falha ao enviar resposta no canal {}: {}", ctx.channel_id, e);
        }
        self.logger.record(ctx, text).await;
    }

    fn guild_state(&self, guild_id: GuildId) -> Arc<Mutex<GuildState>> {
        self.guilds
            .entry(guild_id)
            .or_insert_with(|| Arc::new(Mutex::new(GuildState::new())))
            .clone()
    }
}

async fn cleanup_file(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("🗑️ Arquivo removido: {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("⚠️ Erro ao remover arquivo {}: {}", path.display(), e),
    }
}

/// Notificador registrado em cada faixa iniciada: converte o callback do
/// driver em um evento no canal do laço de reprodução.
struct TrackEndNotifier {
    guild_id: GuildId,
    events: mpsc::UnboundedSender<PlayerEvent>,
}

#[async_trait::async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        let _ = self.events.send(PlayerEvent::TrackEnded(self.guild_id));
        None
    }
}
