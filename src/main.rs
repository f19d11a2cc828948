mod api;
mod commands;
mod components;
mod config;
mod environment;
mod events;
mod ground;
mod nl;
mod palette;
mod params;
mod player;
mod render;
mod scene;
mod scripting;
mod sky;
mod tween;
mod weather;

use bevy::log::LogPlugin;
use bevy::prelude::*;
use components::HeadlessMode;
use config::StartupConfig;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let headless = args.iter().any(|a| a == "--headless");

    let startup_config = StartupConfig::load();
    let mut app = App::new();

    app.insert_resource(HeadlessMode(headless));

    if headless {
        // No window and no GPU: ECS, scene logic and the HTTP API only
        app.add_plugins((MinimalPlugins, LogPlugin::default()));
        info!("[Sylvan] Starting in HEADLESS mode");
    } else {
        let window_title = startup_config
            .window_title
            .clone()
            .unwrap_or_else(|| "Sylvan".to_string());
        let window_width = startup_config.window_width.unwrap_or(1280.0);
        let window_height = startup_config.window_height.unwrap_or(720.0);

        app.add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: window_title,
                resolution: (window_width, window_height).into(),
                present_mode: bevy::window::PresentMode::AutoVsync,
                ..default()
            }),
            ..default()
        }));
        app.add_plugins(render::RenderPlugin);
        info!("[Sylvan] Starting in WINDOWED mode");
    }

    let initial_trees = format!(
        "spawn_trees:{}",
        startup_config
            .initial_tree_type
            .as_deref()
            .unwrap_or(commands::registry::DEFAULT_TREE_TYPE)
    );
    let initial_count = startup_config
        .initial_tree_count
        .unwrap_or(environment::DEFAULT_TREE_COUNT);

    app.add_plugins(events::SceneEventsPlugin)
        .add_plugins(sky::SkyPlugin)
        .add_plugins(ground::GroundPlugin)
        .add_plugins(player::PlayerPlugin)
        .add_plugins(weather::WeatherPlugin)
        .add_plugins(environment::EnvironmentPlugin {
            seed: startup_config.seed,
        })
        .add_plugins(commands::CommandsPlugin)
        .add_plugins(api::ApiPlugin {
            addr: startup_config.api_addr(),
        })
        .add_systems(Startup, move |world: &mut World| {
            let mut params = commands::CommandParams::new();
            params.insert("count".to_string(), initial_count.into());
            if !commands::execute_command(world, &initial_trees, &params) {
                warn!("[Sylvan] Initial scene command '{initial_trees}' failed");
            }
        });

    app.run();
}
