use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{execute_command, CommandParams};
use crate::events;

pub const DEFAULT_COMMAND_DELAY_MS: u64 = 500;

fn default_delay_ms() -> u64 {
    DEFAULT_COMMAND_DELAY_MS
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueuedCommand {
    pub name: String,
    #[serde(default)]
    pub params: CommandParams,
    /// Wait after this command before the next one runs.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

impl QueuedCommand {
    pub fn new(name: impl Into<String>, params: CommandParams) -> Self {
        Self {
            name: name.into(),
            params,
            delay_ms: DEFAULT_COMMAND_DELAY_MS,
        }
    }

    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }
}

pub type QueueListener = Box<dyn Fn() -> Result<(), String> + Send + Sync>;

/// Strict FIFO of pending commands. A drain is advanced by the frame
/// clock, so the delay between two commands is accumulated frame time.
#[derive(Resource, Default)]
pub struct CommandQueue {
    items: VecDeque<QueuedCommand>,
    draining: bool,
    wait_remaining: f32,
    listeners: Vec<QueueListener>,
}

impl CommandQueue {
    pub fn enqueue(&mut self, name: impl Into<String>, params: CommandParams, delay_ms: Option<u64>) {
        self.items.push_back(QueuedCommand {
            name: name.into(),
            params,
            delay_ms: delay_ms.unwrap_or(DEFAULT_COMMAND_DELAY_MS),
        });
    }

    pub fn enqueue_batch(&mut self, commands: impl IntoIterator<Item = QueuedCommand>) {
        self.items.extend(commands);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_draining(&self) -> bool {
        self.draining
    }

    pub fn pending(&self) -> impl Iterator<Item = &QueuedCommand> {
        self.items.iter()
    }

    /// Drops every pending command. Rejected while a drain is running.
    pub fn clear(&mut self) -> bool {
        if self.draining {
            warn!("[Sylvan queue] Cannot clear the queue while it is draining");
            return false;
        }
        self.items.clear();
        true
    }

    pub fn on_empty(&mut self, listener: impl Fn() -> Result<(), String> + Send + Sync + 'static) {
        self.listeners.push(Box::new(listener));
    }

    fn notify_empty(&self) {
        for (index, listener) in self.listeners.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(listener)) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!("[Sylvan queue] Empty listener {index} failed: {err}"),
                Err(_) => error!("[Sylvan queue] Empty listener {index} panicked"),
            }
        }
    }
}

fn fire_empty(world: &mut World) {
    if let Some(queue) = world.get_resource::<CommandQueue>() {
        queue.notify_empty();
    }
    events::emit(world, "queue_empty", json!({}));
}

/// Pops and dispatches the head of the queue.
pub fn drain_one(world: &mut World) -> bool {
    let (item, now_empty) = {
        let Some(mut queue) = world.get_resource_mut::<CommandQueue>() else {
            return false;
        };
        if queue.draining {
            warn!("[Sylvan queue] drain_one ignored while draining");
            return false;
        }
        let item = queue.items.pop_front();
        let now_empty = queue.items.is_empty();
        (item, now_empty)
    };
    let Some(item) = item else {
        return false;
    };
    let ok = execute_command(world, &item.name, &item.params);
    if now_empty {
        fire_empty(world);
    }
    ok
}

/// Starts draining the whole queue. The first command runs immediately;
/// later ones run from `tick_command_queue` once the previous command's
/// delay has elapsed. Fails if empty or already draining.
pub fn drain_all(world: &mut World) -> bool {
    {
        let Some(mut queue) = world.get_resource_mut::<CommandQueue>() else {
            return false;
        };
        if queue.draining {
            warn!("[Sylvan queue] Already draining");
            return false;
        }
        if queue.items.is_empty() {
            info!("[Sylvan queue] Nothing to drain");
            return false;
        }
        info!("[Sylvan queue] Draining {} commands", queue.items.len());
        queue.draining = true;
        queue.wait_remaining = 0.0;
    }
    advance_queue(world, 0.0);
    true
}

/// Advances an active drain by `dt` seconds, dispatching every command
/// whose wait has elapsed.
pub fn advance_queue(world: &mut World, dt: f32) {
    let mut budget = dt.max(0.0);
    loop {
        let item = {
            let Some(mut queue) = world.get_resource_mut::<CommandQueue>() else {
                return;
            };
            if !queue.draining {
                return;
            }
            if queue.wait_remaining > 0.0 {
                let spent = budget.min(queue.wait_remaining);
                queue.wait_remaining -= spent;
                budget -= spent;
                if queue.wait_remaining > 0.0 {
                    return;
                }
            }
            let next = queue.items.pop_front();
            match &next {
                Some(item) => queue.wait_remaining = item.delay_ms as f32 / 1000.0,
                None => queue.draining = false,
            }
            next
        };
        let Some(item) = item else {
            fire_empty(world);
            return;
        };

        execute_command(world, &item.name, &item.params);

        let finished = match world.get_resource_mut::<CommandQueue>() {
            Some(mut queue) if queue.items.is_empty() => {
                queue.draining = false;
                queue.wait_remaining = 0.0;
                true
            }
            Some(_) => false,
            None => return,
        };
        if finished {
            info!("[Sylvan queue] Drain complete");
            fire_empty(world);
            return;
        }
    }
}

pub(super) fn tick_command_queue(world: &mut World) {
    let draining = world
        .get_resource::<CommandQueue>()
        .is_some_and(CommandQueue::is_draining);
    if !draining {
        return;
    }
    let dt = world.resource::<Time>().delta_secs();
    advance_queue(world, dt);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{parameter, CommandDispatcher};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    struct Harness {
        world: World,
        log: Arc<Mutex<Vec<String>>>,
        empties: Arc<AtomicUsize>,
    }

    fn harness() -> Harness {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = CommandDispatcher::default();
        let sink = log.clone();
        dispatcher.register("record", move |_, params| {
            sink.lock().unwrap().push(parameter(params).unwrap_or("-").to_string());
            Ok(())
        });
        let empties = Arc::new(AtomicUsize::new(0));
        let mut queue = CommandQueue::default();
        let counter = empties.clone();
        queue.on_empty(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let mut world = World::new();
        world.insert_resource(dispatcher);
        world.insert_resource(queue);
        world.insert_resource(crate::events::SceneEventBus::default());
        Harness { world, log, empties }
    }

    fn fill(world: &mut World, n: usize, delay_ms: u64) {
        let mut queue = world.resource_mut::<CommandQueue>();
        queue.enqueue_batch((0..n).map(|i| {
            QueuedCommand::new(format!("record:{i}"), CommandParams::new()).with_delay_ms(delay_ms)
        }));
    }

    #[test]
    fn drain_all_is_fifo_with_delays_and_notifies_once() {
        let mut h = harness();
        fill(&mut h.world, 3, 100);

        assert!(drain_all(&mut h.world));
        assert_eq!(*h.log.lock().unwrap(), vec!["0"]);

        advance_queue(&mut h.world, 0.05);
        assert_eq!(h.log.lock().unwrap().len(), 1);
        advance_queue(&mut h.world, 0.06);
        assert_eq!(*h.log.lock().unwrap(), vec!["0", "1"]);
        assert_eq!(h.empties.load(Ordering::SeqCst), 0);

        advance_queue(&mut h.world, 0.5);
        assert_eq!(*h.log.lock().unwrap(), vec!["0", "1", "2"]);
        assert_eq!(h.empties.load(Ordering::SeqCst), 1);
        assert!(!h.world.resource::<CommandQueue>().is_draining());

        advance_queue(&mut h.world, 1.0);
        assert_eq!(h.empties.load(Ordering::SeqCst), 1);
        let names: Vec<String> = h
            .world
            .resource::<crate::events::SceneEventBus>()
            .since(0)
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["queue_empty"]);
    }

    #[test]
    fn zero_delay_commands_run_in_one_pass() {
        let mut h = harness();
        fill(&mut h.world, 4, 0);
        assert!(drain_all(&mut h.world));
        assert_eq!(h.log.lock().unwrap().len(), 4);
        assert_eq!(h.empties.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clear_and_reentrant_drains_are_rejected_while_draining() {
        let mut h = harness();
        fill(&mut h.world, 3, 200);
        assert!(drain_all(&mut h.world));

        let before = h.world.resource::<CommandQueue>().len();
        assert!(!h.world.resource_mut::<CommandQueue>().clear());
        assert_eq!(h.world.resource::<CommandQueue>().len(), before);
        assert!(!drain_all(&mut h.world));
        assert!(!drain_one(&mut h.world));

        advance_queue(&mut h.world, 1.0);
        assert!(h.world.resource_mut::<CommandQueue>().clear());
    }

    #[test]
    fn drain_all_on_empty_queue_fails() {
        let mut h = harness();
        assert!(!drain_all(&mut h.world));
        assert_eq!(h.empties.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn drain_one_notifies_when_it_empties_the_queue() {
        let mut h = harness();
        fill(&mut h.world, 2, 0);
        assert!(drain_one(&mut h.world));
        assert_eq!(h.empties.load(Ordering::SeqCst), 0);
        assert!(drain_one(&mut h.world));
        assert_eq!(h.empties.load(Ordering::SeqCst), 1);
        assert!(!drain_one(&mut h.world));
    }

    #[test]
    fn failing_listeners_do_not_stop_notification() {
        let mut h = harness();
        {
            let mut queue = h.world.resource_mut::<CommandQueue>();
            queue.on_empty(|| Err("listener broke".to_string()));
            queue.on_empty(|| panic!("listener exploded"));
        }
        let late = Arc::new(AtomicUsize::new(0));
        let counter = late.clone();
        h.world.resource_mut::<CommandQueue>().on_empty(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        fill(&mut h.world, 1, 0);
        assert!(drain_all(&mut h.world));
        assert_eq!(h.empties.load(Ordering::SeqCst), 1);
        assert_eq!(late.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unknown_commands_do_not_stall_the_drain() {
        let mut h = harness();
        {
            let mut queue = h.world.resource_mut::<CommandQueue>();
            queue.enqueue("record:a", CommandParams::new(), Some(0));
            queue.enqueue("nonexistent", CommandParams::new(), Some(0));
            queue.enqueue("record:b", CommandParams::new(), Some(0));
        }
        assert!(drain_all(&mut h.world));
        assert_eq!(*h.log.lock().unwrap(), vec!["a", "b"]);
    }
}
