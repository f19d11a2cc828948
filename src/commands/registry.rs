use bevy::prelude::*;
use serde_json::json;

use super::{parameter, CommandDispatcher, CommandParams};
use crate::components::EntityHandle;
use crate::environment::{
    BuildingTransformSpec, EnvironmentManager, Placement, TreeOptions, DEFAULT_TREE_COUNT,
};
use crate::events;
use crate::ground::{GroundManager, DEFAULT_GROUND_COLOR};
use crate::palette::parse_color;
use crate::params::{color_param, f32_param, object_param, str_param, usize_param};
use crate::player::PlayerManager;
use crate::sky::{SkyManager, DEFAULT_SKY_COLOR};

pub const DEFAULT_TREE_TYPE: &str = "oak";
pub const DEFAULT_BUILDING_TYPE: &str = "house";

/// A color from `name:color` or a `color` param, which may be a
/// packed `0xRRGGBB` integer.
fn color_arg(params: &CommandParams, what: &str) -> Result<String, String> {
    parameter(params)
        .map(str::to_string)
        .or_else(|| color_param(params, &["color", "value"]))
        .ok_or_else(|| format!("missing {what}"))
}

/// The `name:parameter` value, or the first matching named param.
fn parameter_or(params: &CommandParams, keys: &[&str]) -> Option<String> {
    parameter(params)
        .map(str::to_string)
        .or_else(|| str_param(params, keys))
}

fn manager<R: Resource>(world: &mut World) -> Result<Mut<'_, R>, String> {
    world
        .get_resource_mut::<R>()
        .ok_or_else(|| format!("{} is not available", std::any::type_name::<R>()))
}

fn with_environment<T>(
    world: &mut World,
    f: impl FnOnce(&mut World, &mut EnvironmentManager) -> T,
) -> Result<T, String> {
    if !world.contains_resource::<EnvironmentManager>() {
        return Err("environment manager is not available".to_string());
    }
    Ok(world.resource_scope(|world, mut env: Mut<EnvironmentManager>| f(world, &mut env)))
}

fn placement(params: &CommandParams) -> Placement {
    Placement {
        x: f32_param(params, &["x"]).unwrap_or(0.0),
        y: f32_param(params, &["y"]),
        z: f32_param(params, &["z"]).unwrap_or(0.0),
    }
}

fn size(params: &CommandParams) -> Option<f32> {
    f32_param(params, &["size"])
}

pub fn register_scene_commands(dispatcher: &mut CommandDispatcher) {
    dispatcher.register("set_sky_color", |world, params| {
        let color = color_arg(params, "sky color")?;
        manager::<SkyManager>(world)?.set_sky_color(&color)
    });
    dispatcher.register("set_ambient_light", |world, params| {
        let color = color_arg(params, "ambient light color")?;
        let intensity = f32_param(params, &["intensity"]);
        manager::<SkyManager>(world)?.set_ambient_light(&color, intensity)
    });
    dispatcher.register("set_ground_color", |world, params| {
        let color = color_arg(params, "ground color")?;
        manager::<GroundManager>(world)?.set_color(&color)
    });
    dispatcher.register("set_player_color", |world, params| {
        let color = color_arg(params, "player color")?;
        manager::<PlayerManager>(world)?.set_color(&color)
    });

    dispatcher.register("spawn_trees", |world, params| {
        let tree_type = parameter_or(params, &["type", "tree_type"]).unwrap_or_else(|| DEFAULT_TREE_TYPE.to_string());
        let count = usize_param(params, &["count", "tree_count"]).unwrap_or(DEFAULT_TREE_COUNT);
        with_environment(world, |world, env| {
            env.spawn_tree_type(world, &tree_type, count);
        })
    });
    dispatcher.register("spawn_building", |world, params| {
        let building_type =
            parameter_or(params, &["type", "building_type"]).unwrap_or_else(|| DEFAULT_BUILDING_TYPE.to_string());
        with_environment(world, |world, env| {
            env.spawn_building_type(world, &building_type);
        })
    });
    dispatcher.register("set_weather", |world, params| {
        let effect = parameter_or(params, &["effect", "weather"]).unwrap_or_default();
        with_environment(world, |world, env| {
            env.set_weather_effect(world, &effect);
        })
    });
    dispatcher.register("set_particles", |world, params| {
        let effect = parameter_or(params, &["effect", "particles"]).unwrap_or_default();
        with_environment(world, |world, env| {
            env.set_particle_effect(world, &effect);
        })
    });

    dispatcher.register("add_tree", |world, params| {
        let leaf_color = match str_param(params, &["color", "leaf_color"]) {
            Some(value) => Some(parse_color(&value).ok_or_else(|| format!("Invalid leaf color: {value}"))?),
            None => None,
        };
        let options = TreeOptions {
            tree_type: parameter_or(params, &["type", "tree_type"]),
            leaf_color,
            scale: f32_param(params, &["scale"]),
        };
        let at = placement(params);
        with_environment(world, |world, env| {
            env.add_tree(world, at, options);
        })
    });
    dispatcher.register("add_rock", |world, params| {
        let (at, size) = (placement(params), size(params));
        with_environment(world, |world, env| {
            env.add_rock(world, at, size);
        })
    });
    dispatcher.register("add_platform", |world, params| {
        let (at, size) = (placement(params), size(params));
        with_environment(world, |world, env| {
            env.add_platform(world, at, size);
        })
    });
    dispatcher.register("add_island", |world, params| {
        let (at, size) = (placement(params), size(params));
        with_environment(world, |world, env| {
            env.add_floating_island(world, at, size);
        })
    });
    dispatcher.register("add_cloud", |world, params| {
        let (at, size) = (placement(params), size(params));
        with_environment(world, |world, env| {
            env.add_cloud(world, at, size);
        })
    });
    dispatcher.register("remove_entity", |world, params| {
        let id = parameter_or(params, &["id"]).ok_or("missing entity id")?;
        let handle = EntityHandle::parse(&id).ok_or_else(|| format!("Invalid entity id: {id}"))?;
        if with_environment(world, |world, env| env.remove(world, handle))? {
            Ok(())
        } else {
            Err(format!("No entity with id {id}"))
        }
    });

    dispatcher.register("transform_trees_to_skyscrapers", |world, params| {
        let code = str_param(params, &["code", "code_snippet", "codeSnippet"])
            .or_else(|| parameter(params).map(str::to_string))
            .ok_or("missing code snippet")?;
        with_environment(world, |world, env| {
            env.transform_trees_to_skyscrapers(world, &code);
        })
    });
    dispatcher.register("transform_trees_to_buildings", |world, params| {
        let spec = match object_param(params, &["transform", "tree_transform"]) {
            Some(nested) => BuildingTransformSpec::from_params(nested),
            None => BuildingTransformSpec::from_params(params),
        };
        with_environment(world, |world, env| {
            env.transform_trees_to_buildings(world, &spec);
        })
    });

    dispatcher.register("clear_trees", |world, _| {
        with_environment(world, |world, env| {
            env.clear_trees(world);
        })
    });
    dispatcher.register("clear_buildings", |world, _| {
        with_environment(world, |world, env| {
            env.clear_buildings(world);
        })
    });
    dispatcher.register("clear_all", |world, _| {
        with_environment(world, |world, env| {
            env.clear_all(world);
        })
    });

    dispatcher.register("reset_scene", |world, _| {
        manager::<SkyManager>(world)?.set_sky_color(DEFAULT_SKY_COLOR)?;
        manager::<GroundManager>(world)?.set_color(DEFAULT_GROUND_COLOR)?;
        with_environment(world, |world, env| {
            env.clear_all(world);
            env.set_weather_effect(world, "clear");
            env.set_particle_effect(world, "none");
            env.spawn_tree_type(world, DEFAULT_TREE_TYPE, DEFAULT_TREE_COUNT);
        })?;
        events::emit(
            world,
            "scene_reset",
            json!({ "sky_color": DEFAULT_SKY_COLOR, "ground_color": DEFAULT_GROUND_COLOR }),
        );
        Ok(())
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::execute_command;
    use crate::events::SceneEventBus;
    use crate::palette::color_to_hex;
    use crate::weather::{WeatherEffect, WeatherSystem};

    fn scene_world() -> World {
        let mut world = World::new();
        let mut dispatcher = CommandDispatcher::default();
        register_scene_commands(&mut dispatcher);
        world.insert_resource(dispatcher);
        world.insert_resource(SkyManager::default());
        world.insert_resource(GroundManager::default());
        world.insert_resource(PlayerManager::default());
        world.insert_resource(WeatherSystem::default());
        world.insert_resource(SceneEventBus::default());
        world.insert_resource(EnvironmentManager::with_seed(11));
        world
    }

    fn run(world: &mut World, input: &str, extra: serde_json::Value) -> bool {
        let extra = extra.as_object().cloned().unwrap_or_default();
        execute_command(world, input, &extra)
    }

    #[test]
    fn color_commands_reach_their_managers() {
        let mut world = scene_world();
        assert!(run(&mut world, "set_sky_color:#000000", json!({})));
        assert!(run(&mut world, "set_ground_color: brown", json!({})));
        assert!(run(&mut world, "set_player_color:0xff0000", json!({})));
        assert!(run(&mut world, "set_ambient_light:#ffeecc", json!({ "intensity": 250 })));
        assert!(!run(&mut world, "set_sky_color:not-a-color", json!({})));
        assert!(!run(&mut world, "set_sky_color", json!({})));

        assert_eq!(color_to_hex(world.resource::<SkyManager>().sky_color), "#000000");
        assert_eq!(world.resource::<SkyManager>().ambient_intensity, 250.0);
        assert_eq!(world.resource::<GroundManager>().color_hex(), "#795548");
        assert_eq!(color_to_hex(world.resource::<PlayerManager>().color), "#ff0000");
    }

    #[test]
    fn color_commands_accept_packed_integers() {
        let mut world = scene_world();
        assert!(run(&mut world, "set_sky_color", json!({ "color": 16711680 })));
        assert!(run(&mut world, "set_ground_color", json!({ "color": "#123456" })));
        assert!(!run(&mut world, "set_player_color", json!({ "color": 0x1000000u32 })));

        assert_eq!(color_to_hex(world.resource::<SkyManager>().sky_color), "#ff0000");
        assert_eq!(world.resource::<GroundManager>().color_hex(), "#123456");
    }

    #[test]
    fn spawn_and_remove_by_id() {
        let mut world = scene_world();
        assert!(run(&mut world, "spawn_trees:pine", json!({ "count": 3 })));
        assert_eq!(world.resource::<EnvironmentManager>().trees().len(), 3);

        assert!(run(&mut world, "add_rock", json!({ "x": 4, "z": "-2", "size": 1.5 })));
        assert!(run(&mut world, "remove_entity:rock_1", json!({})));
        assert!(!run(&mut world, "remove_entity:rock_1", json!({})));
        assert!(!run(&mut world, "remove_entity:dragon_9", json!({})));
        assert!(world.resource::<EnvironmentManager>().rocks().is_empty());
    }

    #[test]
    fn transform_commands_accept_loose_params() {
        let mut world = scene_world();
        run(&mut world, "spawn_trees:oak", json!({ "count": 2 }));
        assert!(run(
            &mut world,
            "transform_trees_to_buildings",
            json!({ "transform": { "newObjectType": "tower", "colorScheme": "sunset" } })
        ));
        assert_eq!(world.resource::<EnvironmentManager>().buildings().len(), 2);
        assert!(!run(&mut world, "transform_trees_to_skyscrapers", json!({})));
    }

    #[test]
    fn reset_scene_restores_defaults() {
        let mut world = scene_world();
        run(&mut world, "set_sky_color:#000000", json!({}));
        run(&mut world, "set_weather:storm", json!({}));
        run(&mut world, "add_cloud", json!({}));
        assert!(run(&mut world, "reset_scene", json!({})));

        let env = world.resource::<EnvironmentManager>();
        assert_eq!(env.trees().len(), DEFAULT_TREE_COUNT);
        assert!(env.clouds().is_empty());
        assert_eq!(color_to_hex(world.resource::<SkyManager>().sky_color), "#87ceeb");
        assert_eq!(world.resource::<GroundManager>().color_hex(), "#4caf50");
        assert_eq!(world.resource::<WeatherSystem>().weather, WeatherEffect::Clear);
        assert!(world
            .resource::<SceneEventBus>()
            .since(0)
            .iter()
            .any(|e| e.name == "scene_reset"));
    }

    #[test]
    fn commands_fail_cleanly_without_managers() {
        let mut world = World::new();
        let mut dispatcher = CommandDispatcher::default();
        register_scene_commands(&mut dispatcher);
        world.insert_resource(dispatcher);
        assert!(!run(&mut world, "set_sky_color:#ffffff", json!({})));
        assert!(!run(&mut world, "clear_all", json!({})));
    }
}
