use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use songbird::{
    input::{File as FileInput, HttpRequest, Input, YoutubeDl},
    tracks::TrackHandle,
    Call, Event, EventContext, EventHandler as VoiceEventHandler, TrackEvent,
};
use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
    time::Duration,
};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::{download, queue::Queue, track::Track};
use crate::sources::DirectUrlService;

/// Control de reproducción expuesto a los comandos.
///
/// Commands never touch the voice connection directly; they only ask the
/// playback subsystem to start, skip or stop.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlayerControl: Send + Sync {
    /// Starts streaming the head of the queue when nothing is playing.
    async fn start_if_idle(&self) -> Result<()>;

    /// Stops the current track; playback advances to the next one.
    async fn skip(&self) -> Result<()>;

    /// Stops the current track without advancing.
    async fn stop(&self) -> Result<()>;
}

/// Estado del reproductor. Cada arranque de track recibe una generación nueva.
enum Slot {
    Idle,
    /// Building the input for the next track (yt-dlp, download).
    Loading(u64),
    Playing(u64, TrackHandle),
}

/// Reproductor basado en songbird que consume la cola compartida.
///
/// The slot lock is only held for state transitions, never while an input is
/// being built, so `skip` and `stop` answer immediately during a download.
pub struct Player {
    queue: Arc<Queue>,
    call: RwLock<Option<Arc<Mutex<Call>>>>,
    current: parking_lot::Mutex<Slot>,
    generation: AtomicU64,
    http: reqwest::Client,
    cache_dir: Option<PathBuf>,
    volume: f32,
    me: Weak<Player>,
}

impl Player {
    pub fn new(queue: Arc<Queue>, cache_dir: Option<PathBuf>, volume: f32) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            queue,
            call: RwLock::new(None),
            current: parking_lot::Mutex::new(Slot::Idle),
            generation: AtomicU64::new(0),
            http: reqwest::Client::new(),
            cache_dir,
            volume,
            me: me.clone(),
        })
    }

    /// Asocia la llamada de voz donde se reproducirá el audio
    pub fn attach(&self, call: Arc<Mutex<Call>>) {
        *self.call.write() = Some(call);
        info!("🔊 Reproductor conectado a la llamada de voz");
    }

    pub fn detach(&self) {
        *self.call.write() = None;
        info!("👋 Reproductor desconectado de la llamada de voz");
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_loading(&self, generation: u64) -> bool {
        matches!(*self.current.lock(), Slot::Loading(g) if g == generation)
    }

    /// Vuelve a `Idle` si la generación sigue vigente.
    fn settle_idle(&self, generation: u64) {
        let mut slot = self.current.lock();
        if matches!(*slot, Slot::Loading(g) if g == generation) {
            *slot = Slot::Idle;
        }
    }

    /// Suelta la generación fallida, deteniendo el track si llegó a sonar.
    fn abandon(&self, generation: u64) {
        let mut slot = self.current.lock();
        let owned = match &*slot {
            Slot::Loading(g) | Slot::Playing(g, _) => *g == generation,
            Slot::Idle => false,
        };
        if !owned {
            return;
        }

        if let Slot::Playing(_, handle) = std::mem::replace(&mut *slot, Slot::Idle) {
            if let Err(e) = handle.stop() {
                warn!("⚠️ El track ya estaba detenido: {}", e);
            }
        }
    }

    /// Runs `advance` on its own task so callers never wait for a download.
    fn spawn_advance(&self, generation: u64) {
        let Some(player) = self.me.upgrade() else {
            return;
        };

        tokio::spawn(async move {
            if let Err(e) = player.advance(generation).await {
                error!("Error al reproducir siguiente track: {:?}", e);
                player.abandon(generation);
            }
        });
    }

    /// Saca tracks de la cola hasta que uno pueda reproducirse.
    ///
    /// Gives up as soon as `generation` is no longer the one loading, which
    /// happens when playback was stopped in the meantime.
    async fn advance(&self, generation: u64) -> Result<()> {
        let Some(call) = self.call.read().clone() else {
            debug!("Sin llamada de voz, no se inicia la reproducción");
            self.settle_idle(generation);
            return Ok(());
        };

        while self.is_loading(generation) {
            let Some(track) = self.queue.next() else {
                debug!("Cola vacía, reproductor inactivo");
                self.settle_idle(generation);
                return Ok(());
            };

            let input = match self.create_input(&track).await {
                Ok(input) => input,
                Err(e) => {
                    error!("❌ No se pudo crear input para {}: {:?}", track.title(), e);
                    continue;
                }
            };

            let mut call = call.lock().await;
            let handle = {
                let mut slot = self.current.lock();
                if !matches!(*slot, Slot::Loading(g) if g == generation) {
                    debug!("Reproducción cancelada mientras se cargaba {}", track.title());
                    return Ok(());
                }

                let handle = call.play_input(input);
                *slot = Slot::Playing(generation, handle.clone());
                handle
            };
            drop(call);

            if let Err(e) = handle.set_volume(self.volume) {
                warn!("⚠️ No se pudo ajustar el volumen: {}", e);
            }
            self.register_events(&handle, generation)?;

            info!("🎵 Reproduciendo: {} ({})", track.title(), track.service());
            return Ok(());
        }

        debug!("Generación {} reemplazada, se abandona la carga", generation);
        Ok(())
    }

    /// Obtiene el input de audio para songbird
    async fn create_input(&self, track: &Track) -> Result<Input> {
        if let Some(dir) = &self.cache_dir {
            let path = download::download(dir, track).await?;
            self.queue.set_current_filename(track.id(), path.clone());
            return Ok(FileInput::new(path).into());
        }

        let url = track.url().to_string();
        if track.service() == DirectUrlService::NAME {
            Ok(HttpRequest::new(self.http.clone(), url).into())
        } else {
            Ok(YoutubeDl::new(self.http.clone(), url).into())
        }
    }

    fn register_events(&self, handle: &TrackHandle, generation: u64) -> Result<()> {
        for event in [TrackEvent::End, TrackEvent::Error] {
            handle
                .add_event(
                    Event::Track(event),
                    TrackEndHandler {
                        player: self.me.clone(),
                        generation,
                    },
                )
                .map_err(|e| anyhow::anyhow!("Error al agregar event handler: {}", e))?;
        }

        handle
            .add_event(
                Event::Periodic(Duration::from_secs(1), None),
                PositionTracker {
                    queue: Arc::clone(&self.queue),
                },
            )
            .map_err(|e| anyhow::anyhow!("Error al agregar event handler: {}", e))?;

        Ok(())
    }

    fn on_track_end(&self, generation: u64) {
        let next = {
            let mut slot = self.current.lock();

            // End y Error pueden llegar juntos; solo avanza el primero
            if !matches!(*slot, Slot::Playing(g, _) if g == generation) {
                debug!("Evento de fin ignorado para generación {}", generation);
                return;
            }

            let next = self.next_generation();
            *slot = Slot::Loading(next);
            next
        };

        if let Some(finished) = self.queue.finish_current() {
            debug!("✔️ Track terminado: {}", finished.title());
        }

        self.spawn_advance(next);
    }
}

#[async_trait]
impl PlayerControl for Player {
    async fn start_if_idle(&self) -> Result<()> {
        let generation = {
            let mut slot = self.current.lock();
            if !matches!(*slot, Slot::Idle) {
                return Ok(());
            }

            let generation = self.next_generation();
            *slot = Slot::Loading(generation);
            generation
        };

        self.spawn_advance(generation);
        Ok(())
    }

    async fn skip(&self) -> Result<()> {
        let handle = match &*self.current.lock() {
            Slot::Playing(_, handle) => Some(handle.clone()),
            _ => None,
        };

        match handle {
            Some(handle) => {
                handle
                    .stop()
                    .map_err(|e| anyhow::anyhow!("Error al detener track: {}", e))?;
                info!("⏭️ Track saltado");
            }
            None => debug!("Nada que saltar todavía"),
        }
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let previous = std::mem::replace(&mut *self.current.lock(), Slot::Idle);
        if let Slot::Playing(_, handle) = previous {
            if let Err(e) = handle.stop() {
                warn!("⚠️ El track ya estaba detenido: {}", e);
            }
        }
        self.queue.finish_current();

        info!("⏹️ Reproducción detenida");
        Ok(())
    }
}

/// Handler para cuando termina una canción
struct TrackEndHandler {
    player: Weak<Player>,
    generation: u64,
}

#[async_trait]
impl VoiceEventHandler for TrackEndHandler {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        if let Some(player) = self.player.upgrade() {
            player.on_track_end(self.generation);
        }

        None
    }
}

/// Publica la posición de reproducción en la cola
struct PositionTracker {
    queue: Arc<Queue>,
}

#[async_trait]
impl VoiceEventHandler for PositionTracker {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(states) = ctx {
            if let Some((state, _)) = states.first() {
                self.queue.set_playback_offset(state.position);
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn player_with(titles: &[&str]) -> Arc<Player> {
        let queue = Arc::new(Queue::default());
        for title in titles {
            queue
                .append(Track::new(*title, *title, *title, "Test", "dj").with_duration(Duration::from_secs(30)))
                .unwrap();
        }
        Player::new(queue, None, 0.5)
    }

    fn state(player: &Player) -> &'static str {
        match *player.current.lock() {
            Slot::Idle => "idle",
            Slot::Loading(_) => "loading",
            Slot::Playing(..) => "playing",
        }
    }

    async fn wait_for_idle(player: &Player) {
        tokio::time::timeout(Duration::from_secs(1), async {
            while state(player) != "idle" {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("player never went idle");
    }

    #[tokio::test]
    async fn stop_does_not_wait_for_a_pending_load() {
        let player = player_with(&["a"]);
        *player.current.lock() = Slot::Loading(3);

        tokio::time::timeout(Duration::from_millis(100), player.stop())
            .await
            .expect("stop blocked on the load")
            .unwrap();

        assert_eq!(state(&player), "idle");
        assert!(!player.is_loading(3));
    }

    #[tokio::test]
    async fn skip_while_loading_is_a_no_op() {
        let player = player_with(&["a"]);
        *player.current.lock() = Slot::Loading(1);

        player.skip().await.unwrap();

        assert_eq!(state(&player), "loading");
    }

    #[tokio::test]
    async fn end_event_from_an_old_generation_is_ignored() {
        let player = player_with(&["a", "b"]);
        player.queue.next();
        *player.current.lock() = Slot::Loading(5);

        player.on_track_end(4);
        player.on_track_end(5);

        assert_eq!(player.queue.current().map(|t| t.title().to_string()), Some("a".into()));
        assert_eq!(player.queue.len(), 1);
        assert_eq!(state(&player), "loading");
    }

    #[tokio::test]
    async fn start_while_busy_keeps_the_running_generation() {
        let player = player_with(&["a"]);
        *player.current.lock() = Slot::Loading(7);

        player.start_if_idle().await.unwrap();

        assert!(player.is_loading(7));
        assert_eq!(player.generation.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn start_without_voice_call_leaves_queue_alone() {
        let player = player_with(&["a", "b"]);

        player.start_if_idle().await.unwrap();
        wait_for_idle(&player).await;

        assert!(player.queue.current().is_none());
        assert_eq!(player.queue.len(), 2);
    }

    #[tokio::test]
    async fn failed_load_only_releases_its_own_generation() {
        let player = player_with(&[]);
        *player.current.lock() = Slot::Loading(2);

        player.abandon(1);
        assert!(player.is_loading(2));

        player.abandon(2);
        assert_eq!(state(&player), "idle");
    }
}
