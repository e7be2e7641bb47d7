use std::{collections::VecDeque, time::Duration};
use tracing::{debug, info};

use super::track::Track;
use crate::error::{PlayerError, PlayerResult};

/// Cola de canciones pendientes de una sesión.
///
/// Las posiciones que ven los usuarios empiezan en 1: la posición 1 es la
/// próxima canción en sonar. La canción que suena ahora ya salió de la cola
/// (la guarda el controlador), así que `len()` cuenta solo lo pendiente.
#[derive(Debug, Default)]
pub struct Queue {
    items: VecDeque<Track>,
}

impl Queue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Agrega tracks al final respetando el orden recibido.
    pub fn enqueue(&mut self, tracks: impl IntoIterator<Item = Track>) -> usize {
        let before = self.items.len();
        self.items.extend(tracks);
        let added = self.items.len() - before;

        info!("➕ Agregadas {} canciones a la cola ({} en total)", added, self.items.len());
        added
    }

    /// Elimina la canción en `index` (1-indexado).
    pub fn remove_one(&mut self, index: usize) -> PlayerResult<Track> {
        let len = self.items.len();
        if index < 1 || index > len {
            return Err(PlayerError::IndexOutOfRange { index, len });
        }

        let removed = self
            .items
            .remove(index - 1)
            .ok_or(PlayerError::IndexOutOfRange { index, len })?;

        debug!("❌ Track eliminado en posición {}: {}", index, removed.title());
        Ok(removed)
    }

    /// Elimina el rango inclusivo `[from, to]` y devuelve lo eliminado en orden.
    pub fn remove_range(&mut self, from: usize, to: usize) -> PlayerResult<Vec<Track>> {
        let len = self.items.len();
        if from < 1 || to > len || from > to {
            return Err(PlayerError::RangeOutOfBounds { from, to, len });
        }

        let removed: Vec<Track> = self.items.drain(from - 1..to).collect();

        debug!("❌ Eliminadas {} canciones (posiciones {}-{})", removed.len(), from, to);
        Ok(removed)
    }

    /// Saca la próxima canción (FIFO).
    pub fn advance(&mut self) -> Option<Track> {
        let next = self.items.pop_front();
        match &next {
            Some(track) => info!("➡️ Siguiente en cola: {}", track.title()),
            None => info!("📭 Cola vacía, no hay siguiente track"),
        }
        next
    }

    pub fn peek_head(&self) -> Option<&Track> {
        self.items.front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.items.iter()
    }

    /// Suma de duraciones conocidas; los directos no cuentan.
    pub fn total_duration(&self) -> Duration {
        self.items.iter().filter_map(Track::duration).sum()
    }

    pub fn snapshot(&self) -> Vec<Track> {
        self.items.iter().cloned().collect()
    }
}
