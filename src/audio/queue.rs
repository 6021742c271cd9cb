use parking_lot::Mutex;
use rand::seq::SliceRandom;
use std::{collections::VecDeque, path::PathBuf, time::Duration};
use thiserror::Error;
use tracing::{debug, info};

use super::{format_duration, track::Track};

/// Errores de las operaciones de cola.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("\"{title}\" is too long ({}), the maximum track duration is {}", fmt_len(.duration), fmt_len(.max))]
    TrackTooLong {
        title: String,
        duration: Duration,
        max: Duration,
    },

    #[error("position {position} is out of range, the queue has {len} track(s)")]
    PositionOutOfRange { position: usize, len: usize },

    #[error("the queue is full (maximum {max} tracks)")]
    QueueFull { max: usize },

    #[error("the length of \"{title}\" is unknown and tracks are limited to {}", fmt_len(.max))]
    UnknownDuration { title: String, max: Duration },
}

fn fmt_len(duration: &Duration) -> String {
    format_duration(*duration)
}

/// Configured limits. `None` means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueLimits {
    pub max_track_duration: Option<Duration>,
    pub max_tracks: Option<usize>,
}

/// Result of inserting several tracks at once. Rejections are counted, not listed.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub added: usize,
    pub rejected: usize,
    /// The track inserted last, which is the earliest to play for a play-next batch.
    pub last_added: Option<Track>,
}

#[derive(Debug, Default)]
struct QueueState {
    tracks: VecDeque<Track>,
    current: Option<Track>,
}

/// Cola de reproducción compartida por todo el proceso.
///
/// Todas las operaciones que mutan la cola se serializan detrás de un único
/// lock. El lock nunca se mantiene a través de un `.await`, así que la
/// resolución de URLs tiene que ocurrir antes de tocar la cola.
///
/// Positions are 1-based over the pending tracks: `1` is the next track to play.
/// The track being streamed lives in a separate `current` slot.
#[derive(Debug, Default)]
pub struct Queue {
    state: Mutex<QueueState>,
    limits: QueueLimits,
}

impl Queue {
    pub fn new(limits: QueueLimits) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            limits,
        }
    }

    /// Inserta un track en la posición indicada (`1` = siguiente).
    pub fn insert_track(&self, position: usize, track: Track) -> Result<(), QueueError> {
        self.check_duration(&track)?;

        let mut state = self.state.lock();
        self.insert_locked(&mut state, position, track)
    }

    /// Agrega un track al final de la cola
    pub fn append(&self, track: Track) -> Result<(), QueueError> {
        self.check_duration(&track)?;

        let mut state = self.state.lock();
        let tail = state.tracks.len() + 1;
        self.insert_locked(&mut state, tail, track)
    }

    /// Inserts a batch so that it plays next, in the batch's own order.
    ///
    /// Free slots go to the batch front to back, so when the queue fills up
    /// the earliest tracks are the ones kept. The accepted tracks are then
    /// walked backwards and every one goes to position 1, leaving the first
    /// track of the batch at the head. The lock is held for the whole batch.
    pub fn insert_next_batch(&self, tracks: Vec<Track>) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let mut state = self.state.lock();

        // (huecos libres, máximo)
        let mut free = self
            .limits
            .max_tracks
            .map(|max| (max.saturating_sub(state.tracks.len()), max));
        let mut accepted = Vec::with_capacity(tracks.len());

        for track in tracks {
            match self
                .check_duration(&track)
                .and_then(|_| reserve_slot(&mut free))
            {
                Ok(()) => accepted.push(track),
                Err(e) => outcome.reject(e),
            }
        }

        for track in accepted.into_iter().rev() {
            let result = self.insert_locked(&mut state, 1, track.clone());
            outcome.record(result, track);
        }

        info!(
            "⏭️ Lote insertado al frente: {} agregados, {} rechazados",
            outcome.added, outcome.rejected
        );
        outcome
    }

    /// Agrega múltiples tracks al final, en orden
    pub fn append_batch(&self, tracks: Vec<Track>) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let mut state = self.state.lock();

        for track in tracks {
            let tail = state.tracks.len() + 1;
            let result = self
                .check_duration(&track)
                .and_then(|_| self.insert_locked(&mut state, tail, track.clone()));
            outcome.record(result, track);
        }

        info!(
            "➕ Lote agregado a la cola: {} agregados, {} rechazados",
            outcome.added, outcome.rejected
        );
        outcome
    }

    /// Elimina el track en la posición indicada
    pub fn remove_at(&self, position: usize) -> Result<Track, QueueError> {
        let mut state = self.state.lock();
        let len = state.tracks.len();

        if position == 0 || position > len {
            return Err(QueueError::PositionOutOfRange { position, len });
        }

        let track = state
            .tracks
            .remove(position - 1)
            .ok_or(QueueError::PositionOutOfRange { position, len })?;
        debug!("❌ Track eliminado en posición {}: {}", position, track.title());
        Ok(track)
    }

    /// Pops the head of the queue and makes it the current track.
    ///
    /// This is the only extraction point used by the playback subsystem.
    /// The previously current track is dropped.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&self) -> Option<Track> {
        let mut state = self.state.lock();

        match state.tracks.pop_front() {
            Some(mut track) => {
                track.set_playback_offset(Duration::ZERO);
                info!("➡️ Siguiente en cola: {}", track.title());
                state.current = Some(track.clone());
                Some(track)
            }
            None => {
                state.current = None;
                info!("📭 Cola vacía, no hay siguiente track");
                None
            }
        }
    }

    /// Marks the current track as finished, returning it.
    pub fn finish_current(&self) -> Option<Track> {
        self.state.lock().current.take()
    }

    pub fn current(&self) -> Option<Track> {
        self.state.lock().current.clone()
    }

    pub fn peek_next(&self) -> Option<Track> {
        self.state.lock().tracks.front().cloned()
    }

    /// Copia de los primeros `limit` tracks pendientes
    pub fn snapshot(&self, limit: usize) -> Vec<Track> {
        self.state.lock().tracks.iter().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().tracks.is_empty()
    }

    /// Duration of every pending track plus what is left of the current one.
    pub fn total_duration(&self) -> Duration {
        let state = self.state.lock();
        let pending: Duration = state.tracks.iter().map(Track::duration).sum();
        let current = state
            .current
            .as_ref()
            .map(Track::remaining)
            .unwrap_or_default();

        pending + current
    }

    /// Limpia la cola. Devuelve cuántos tracks se eliminaron.
    pub fn clear(&self) -> usize {
        let mut state = self.state.lock();
        let cleared = state.tracks.len();
        state.tracks.clear();

        info!("🗑️ Cola limpiada: {} tracks removidos", cleared);
        cleared
    }

    /// Mezcla la cola
    pub fn shuffle(&self) {
        let mut state = self.state.lock();
        let mut rng = rand::thread_rng();
        state.tracks.make_contiguous().shuffle(&mut rng);
        info!("🔀 Cola mezclada");
    }

    /// Updates the elapsed position of the current track.
    pub fn set_playback_offset(&self, offset: Duration) {
        if let Some(current) = self.state.lock().current.as_mut() {
            current.set_playback_offset(offset);
        }
    }

    /// Records the local file of the current track, if it is still `track_id`.
    pub fn set_current_filename(&self, track_id: &str, filename: PathBuf) -> bool {
        let mut state = self.state.lock();
        match state.current.as_mut() {
            Some(current) if current.id() == track_id => {
                current.set_filename(filename);
                true
            }
            _ => false,
        }
    }

    // Funciones privadas

    /// A zero duration means the length is unknown; such tracks only pass
    /// when no maximum is configured.
    fn check_duration(&self, track: &Track) -> Result<(), QueueError> {
        match self.limits.max_track_duration {
            Some(max) if track.duration().is_zero() => Err(QueueError::UnknownDuration {
                title: track.title().to_string(),
                max,
            }),
            Some(max) if track.duration() > max => Err(QueueError::TrackTooLong {
                title: track.title().to_string(),
                duration: track.duration(),
                max,
            }),
            _ => Ok(()),
        }
    }

    fn insert_locked(
        &self,
        state: &mut QueueState,
        position: usize,
        mut track: Track,
    ) -> Result<(), QueueError> {
        let len = state.tracks.len();

        if let Some(max) = self.limits.max_tracks {
            if len >= max {
                return Err(QueueError::QueueFull { max });
            }
        }

        if position == 0 || position > len + 1 {
            return Err(QueueError::PositionOutOfRange { position, len });
        }

        track.set_playback_offset(Duration::ZERO);
        debug!("➕ Agregado a la cola en posición {}: {}", position, track.title());
        state.tracks.insert(position - 1, track);
        Ok(())
    }
}

fn reserve_slot(free: &mut Option<(usize, usize)>) -> Result<(), QueueError> {
    match free {
        Some((0, max)) => Err(QueueError::QueueFull { max: *max }),
        Some((left, _)) => {
            *left -= 1;
            Ok(())
        }
        None => Ok(()),
    }
}

impl BatchOutcome {
    fn record(&mut self, result: Result<(), QueueError>, track: Track) {
        match result {
            Ok(()) => {
                self.added += 1;
                self.last_added = Some(track);
            }
            Err(e) => self.reject(e),
        }
    }

    fn reject(&mut self, error: QueueError) {
        debug!("🚫 Track rechazado: {}", error);
        self.rejected += 1;
    }
}
