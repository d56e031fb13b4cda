use std::collections::HashMap;

use note_markup::{NodeId, Remap};
use tracing::debug;

/// Identity of one external media element, allocated per bound audio widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlayerId(pub u64);

/// The external media element that actually owns playback. The editor only
/// mirrors its state.
pub trait MediaBackend {
    fn play(&mut self, player: PlayerId, src: &str);
    fn pause(&mut self, player: PlayerId);
    fn seek(&mut self, player: PlayerId, seconds: f64);
    fn set_rate(&mut self, player: PlayerId, rate: f64);
    fn release(&mut self, player: PlayerId);
}

/// Backend for hosts without audio output.
#[derive(Debug, Default)]
pub struct NullMedia;

impl MediaBackend for NullMedia {
    fn play(&mut self, _player: PlayerId, _src: &str) {}
    fn pause(&mut self, _player: PlayerId) {}
    fn seek(&mut self, _player: PlayerId, _seconds: f64) {}
    fn set_rate(&mut self, _player: PlayerId, _rate: f64) {}
    fn release(&mut self, _player: PlayerId) {}
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerState {
    pub id: PlayerId,
    pub playing: bool,
    pub position: f64,
    pub rate: f64,
}

/// Players keyed by the audio widget they belong to. Node ids die with a
/// wholesale re-render, so the whole table is released at that point.
#[derive(Debug, Default)]
pub struct Players {
    next: u64,
    by_widget: HashMap<NodeId, PlayerState>,
}

impl Players {
    pub fn get(&self, widget: NodeId) -> Option<&PlayerState> {
        self.by_widget.get(&widget)
    }

    pub fn get_mut(&mut self, widget: NodeId) -> Option<&mut PlayerState> {
        self.by_widget.get_mut(&widget)
    }

    pub fn len(&self) -> usize {
        self.by_widget.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_widget.is_empty()
    }

    pub fn any_playing(&self) -> bool {
        self.by_widget.values().any(|p| p.playing)
    }

    /// Returns the existing player or allocates one.
    pub fn ensure(&mut self, widget: NodeId, rate: f64) -> &mut PlayerState {
        let next = &mut self.next;
        self.by_widget.entry(widget).or_insert_with(|| {
            *next += 1;
            PlayerState {
                id: PlayerId(*next),
                playing: false,
                position: 0.0,
                rate,
            }
        })
    }

    /// Stops and releases the player of one widget, if it has one.
    pub fn release(&mut self, widget: NodeId, backend: &mut dyn MediaBackend) -> bool {
        let Some(state) = self.by_widget.remove(&widget) else {
            return false;
        };
        if state.playing {
            backend.pause(state.id);
        }
        backend.release(state.id);
        debug!(player = state.id.0, "media player released");
        true
    }

    /// Re-keys players after compaction. Players whose widget was freed
    /// are released.
    pub fn remap(&mut self, remap: &Remap, backend: &mut dyn MediaBackend) {
        let widgets: Vec<NodeId> = self.by_widget.keys().copied().collect();
        let mut moved = HashMap::with_capacity(widgets.len());
        for widget in widgets {
            match remap.get(widget) {
                Some(new) => {
                    if let Some(state) = self.by_widget.remove(&widget) {
                        moved.insert(new, state);
                    }
                }
                None => {
                    self.release(widget, backend);
                }
            }
        }
        self.by_widget = moved;
    }

    pub fn release_all(&mut self, backend: &mut dyn MediaBackend) -> usize {
        let widgets: Vec<NodeId> = self.by_widget.keys().copied().collect();
        let mut released = 0;
        for widget in widgets {
            if self.release(widget, backend) {
                released += 1;
            }
        }
        released
    }
}
