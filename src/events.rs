use std::collections::VecDeque;

use bevy::prelude::*;
use serde::Serialize;

const MAX_EVENTS: usize = 500;

#[derive(Serialize, Clone, Debug)]
pub struct SceneEvent {
    pub seq: u64,
    pub name: String,
    pub data: serde_json::Value,
}

#[derive(Resource, Default)]
pub struct SceneEventBus {
    pub recent: VecDeque<SceneEvent>,
    pub next_seq: u64,
    pub dropped_events: u64,
}

impl SceneEventBus {
    pub fn emit(&mut self, name: impl Into<String>, data: serde_json::Value) {
        self.next_seq = self.next_seq.saturating_add(1);
        self.recent.push_back(SceneEvent {
            seq: self.next_seq,
            name: name.into(),
            data,
        });
        if self.recent.len() > MAX_EVENTS {
            let excess = self.recent.len() - MAX_EVENTS;
            for _ in 0..excess {
                self.recent.pop_front();
            }
            self.dropped_events = self.dropped_events.saturating_add(excess as u64);
            if self.dropped_events == excess as u64 || self.dropped_events % 100 == 0 {
                warn!(
                    "[Sylvan events] Dropped {} buffered events (total dropped: {})",
                    excess, self.dropped_events
                );
            }
        }
    }

    pub fn since(&self, seq: u64) -> Vec<SceneEvent> {
        self.recent.iter().filter(|e| e.seq > seq).cloned().collect()
    }
}

/// Emits onto the bus when the world has one.
pub fn emit(world: &mut World, name: &str, data: serde_json::Value) {
    if let Some(mut bus) = world.get_resource_mut::<SceneEventBus>() {
        bus.emit(name, data);
    }
}

pub struct SceneEventsPlugin;

impl Plugin for SceneEventsPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(SceneEventBus::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_bus_tracks_dropped_events() {
        let mut bus = SceneEventBus::default();
        for i in 0..(MAX_EVENTS + 25) {
            bus.emit("test", serde_json::json!({ "i": i }));
        }
        assert_eq!(bus.recent.len(), MAX_EVENTS);
        assert_eq!(bus.dropped_events, 25);
        assert_eq!(bus.since(bus.next_seq - 3).len(), 3);
    }
}
