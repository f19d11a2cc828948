use super::*;
use crate::commands::{drain_all, execute_command, CommandDispatcher, CommandQueue};
use crate::events::SceneEventBus;
use crate::environment::EnvironmentManager;
use crate::ground::GroundManager;
use crate::nl::SceneControl;
use crate::palette::color_to_hex;
use crate::player::PlayerManager;
use crate::sky::SkyManager;
use crate::weather::WeatherSystem;

pub enum SceneRequest {
    Execute {
        command: String,
        params: CommandParams,
        reply: oneshot::Sender<bool>,
    },
    Enqueue {
        commands: Vec<QueuedCommand>,
        drain: bool,
        reply: oneshot::Sender<QueueStatus>,
    },
    ClearQueue(oneshot::Sender<Result<QueueStatus, String>>),
    Snapshot(oneshot::Sender<SceneSnapshot>),
    Events {
        since: u64,
        reply: oneshot::Sender<Vec<SceneEvent>>,
    },
}

#[derive(Resource)]
pub struct ApiChannels {
    pub receiver: Receiver<SceneRequest>,
}

pub(super) fn process_scene_requests(world: &mut World) {
    let requests: Vec<SceneRequest> = match world.get_resource::<ApiChannels>() {
        Some(channels) => channels.receiver.try_iter().collect(),
        None => return,
    };
    for request in requests {
        handle_scene_request(world, request);
    }
}

fn queue_status(world: &World, drain_started: Option<bool>) -> QueueStatus {
    let (length, draining) = world
        .get_resource::<CommandQueue>()
        .map(|q| (q.len(), q.is_draining()))
        .unwrap_or_default();
    QueueStatus {
        length,
        draining,
        drain_started,
    }
}

pub(super) fn handle_scene_request(world: &mut World, request: SceneRequest) {
    // A dropped receiver means the HTTP client went away; nothing to report.
    match request {
        SceneRequest::Execute { command, params, reply } => {
            let executed = execute_command(world, &command, &params);
            let _ = reply.send(executed);
        }
        SceneRequest::Enqueue { commands, drain, reply } => {
            if let Some(mut queue) = world.get_resource_mut::<CommandQueue>() {
                queue.enqueue_batch(commands);
            }
            let started = drain.then(|| drain_all(world));
            let _ = reply.send(queue_status(world, started));
        }
        SceneRequest::ClearQueue(reply) => {
            let cleared = world
                .get_resource_mut::<CommandQueue>()
                .map(|mut queue| queue.clear())
                .unwrap_or(false);
            let result = if cleared {
                Ok(queue_status(world, None))
            } else {
                Err("Queue is draining; wait for it to finish".to_string())
            };
            let _ = reply.send(result);
        }
        SceneRequest::Snapshot(reply) => {
            let _ = reply.send(scene_snapshot(world));
        }
        SceneRequest::Events { since, reply } => {
            let events = world
                .get_resource::<SceneEventBus>()
                .map(|bus| bus.since(since))
                .unwrap_or_default();
            let _ = reply.send(events);
        }
    }
}

pub(super) fn scene_snapshot(world: &World) -> SceneSnapshot {
    let sky = world.get_resource::<SkyManager>();
    let queue = queue_status(world, None);
    SceneSnapshot {
        sky_color: sky.map(|s| color_to_hex(s.sky_color)),
        ambient_color: sky.map(|s| color_to_hex(s.ambient_color)),
        ground_color: world.get_resource::<GroundManager>().map(GroundManager::color_hex),
        player_color: world.get_resource::<PlayerManager>().map(|p| color_to_hex(p.color)),
        weather: world
            .get_resource::<WeatherSystem>()
            .map(|w| w.weather)
            .unwrap_or_default(),
        particles: world
            .get_resource::<WeatherSystem>()
            .map(|w| w.particles)
            .unwrap_or_default(),
        environment: world
            .get_resource::<EnvironmentManager>()
            .map(EnvironmentManager::snapshot)
            .unwrap_or_default(),
        queue_length: queue.length,
        queue_draining: queue.draining,
        commands: world
            .get_resource::<CommandDispatcher>()
            .map(CommandDispatcher::names)
            .unwrap_or_default(),
    }
}

/// `SceneControl` that runs commands on the world thread.
#[derive(Clone)]
pub struct ChannelSceneControl {
    sender: Sender<SceneRequest>,
}

impl ChannelSceneControl {
    pub fn new(sender: Sender<SceneRequest>) -> Self {
        Self { sender }
    }
}

impl SceneControl for ChannelSceneControl {
    async fn dispatch(&self, command: &str, params: CommandParams) -> Result<(), String> {
        let executed = ask(&self.sender, |reply| SceneRequest::Execute {
            command: command.to_string(),
            params,
            reply,
        })
        .await?;
        if executed {
            Ok(())
        } else {
            Err(format!("command '{command}' failed"))
        }
    }
}

#[cfg(test)]
pub(super) mod tests {
    use super::*;
    use crate::commands::register_scene_commands;

    pub(crate) fn scene_world() -> World {
        let mut dispatcher = CommandDispatcher::default();
        register_scene_commands(&mut dispatcher);
        let mut world = World::new();
        world.insert_resource(dispatcher);
        world.insert_resource(CommandQueue::default());
        world.insert_resource(SkyManager::default());
        world.insert_resource(GroundManager::default());
        world.insert_resource(PlayerManager::default());
        world.insert_resource(WeatherSystem::default());
        world.insert_resource(SceneEventBus::default());
        world.insert_resource(EnvironmentManager::with_seed(3));
        world
    }

    /// Serves scene requests on a plain thread until every sender is gone.
    pub(crate) fn spawn_world_thread(receiver: Receiver<SceneRequest>) -> std::thread::JoinHandle<()> {
        std::thread::spawn(move || {
            let mut world = scene_world();
            while let Ok(request) = receiver.recv() {
                handle_scene_request(&mut world, request);
            }
        })
    }

    #[tokio::test]
    async fn channel_control_round_trips_through_the_world() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut world = scene_world();
        world.insert_resource(ApiChannels { receiver: rx });

        let control = ChannelSceneControl::new(tx);
        let ok = tokio::spawn({
            let control = control.clone();
            async move { control.dispatch("set_sky_color:#000000", CommandParams::new()).await }
        });
        let bad = tokio::spawn(async move { control.dispatch("summon_dragon", CommandParams::new()).await });

        while world.resource::<ApiChannels>().receiver.len() < 2 {
            tokio::task::yield_now().await;
        }
        process_scene_requests(&mut world);

        assert_eq!(ok.await.unwrap(), Ok(()));
        assert!(bad.await.unwrap().unwrap_err().contains("summon_dragon"));
        assert_eq!(color_to_hex(world.resource::<SkyManager>().sky_color), "#000000");
    }

    #[test]
    fn enqueue_with_drain_runs_the_first_command_and_clear_is_refused() {
        let mut world = scene_world();
        let (tx, mut rx) = oneshot::channel();
        handle_scene_request(
            &mut world,
            SceneRequest::Enqueue {
                commands: vec![
                    QueuedCommand::new("set_weather:snow", CommandParams::new()),
                    QueuedCommand::new("set_particles:fireflies", CommandParams::new()),
                ],
                drain: true,
                reply: tx,
            },
        );
        let status = rx.try_recv().unwrap();
        assert_eq!(status.drain_started, Some(true));
        assert_eq!(status.length, 1);
        assert!(status.draining);

        let (tx, mut rx) = oneshot::channel();
        handle_scene_request(&mut world, SceneRequest::ClearQueue(tx));
        assert!(rx.try_recv().unwrap().is_err());

        let snapshot = scene_snapshot(&world);
        assert_eq!(snapshot.weather, crate::weather::WeatherEffect::Snow);
        assert_eq!(snapshot.queue_length, 1);
        assert!(snapshot.commands.iter().any(|c| c == "reset_scene"));
    }
}
