use bevy::prelude::*;
use serde_json::json;

use super::builders::SkyscraperEnvelope;
use super::transform::{fit_to_envelope, BUILDING_GROW_SECONDS, SKYSCRAPER_GROW_SECONDS, TREE_FADE_SECONDS};
use super::*;
use crate::components::{Particle, SceneNode};
use crate::events::SceneEventBus;
use crate::params::ParamMap;

fn setup() -> (World, EnvironmentManager) {
    let mut world = World::new();
    world.insert_resource(SceneEventBus::default());
    world.insert_resource(WeatherSystem::default());
    (world, EnvironmentManager::with_seed(7))
}

fn scene_nodes(world: &mut World) -> usize {
    world.query::<&SceneNode>().iter(world).count()
}

fn add_trees(env: &mut EnvironmentManager, world: &mut World, n: usize) {
    for i in 0..n {
        env.add_tree(world, Placement::at(i as f32 * 5.0, 0.0), TreeOptions::default());
    }
}

#[test]
fn ids_are_never_reused() {
    let (mut world, mut env) = setup();
    let first = env.add_tree(&mut world, Placement::at(1.0, 1.0), TreeOptions::default());
    assert_eq!(first.to_string(), "tree_1");
    assert!(env.remove(&mut world, first));
    let second = env.add_tree(&mut world, Placement::at(1.0, 1.0), TreeOptions::default());
    assert_eq!(second.to_string(), "tree_2");
    let rock = env.add_rock(&mut world, Placement::default(), None);
    assert_eq!(rock.to_string(), "rock_1");
    assert!(!env.remove(&mut world, first));
}

#[test]
fn missing_y_follows_terrain_and_bad_positions_fall_back_to_origin() {
    let (mut world, mut env) = setup();
    let on_ground = env.add_rock(&mut world, Placement::at(12.0, -7.0), Some(1.0));
    let position = env.get(on_ground).unwrap().position;
    assert!((position.y - height_at(12.0, -7.0)).abs() < 1e-5);

    let cloud = env.add_cloud(&mut world, Placement::at(3.0, 4.0), None);
    let position = env.get(cloud).unwrap().position;
    assert!((position.y - (height_at(3.0, 4.0) + CLOUD_ALTITUDE)).abs() < 1e-5);

    let explicit = env.add_platform(&mut world, Placement::at(0.0, 0.0).with_y(9.0), None);
    assert_eq!(env.get(explicit).unwrap().position.y, 9.0);

    let broken = Placement {
        x: f32::NAN,
        y: None,
        z: 4.0,
    };
    let island = env.add_floating_island(&mut world, broken, None);
    assert_eq!(env.get(island).unwrap().position, Vec3::ZERO);
}

#[test]
fn remove_detaches_the_scene_node() {
    let (mut world, mut env) = setup();
    let tree = env.add_tree(&mut world, Placement::default(), TreeOptions::default());
    let node = env.get(tree).unwrap().node;
    assert_eq!(scene_nodes(&mut world), 1);

    assert!(env.remove(&mut world, tree));
    assert!(!scene::is_attached(&world, node));
    assert_eq!(scene_nodes(&mut world), 0);
    assert!(env.trees().is_empty());

    let names: Vec<String> = world.resource::<SceneEventBus>().since(0).into_iter().map(|e| e.name).collect();
    assert_eq!(names, vec!["entity_spawned", "entity_removed"]);
}

#[test]
fn unknown_tree_type_clears_then_spawns_mixed_profile() {
    let (mut world, mut env) = setup();
    add_trees(&mut env, &mut world, 4);

    let handles = env.spawn_tree_type(&mut world, "nonexistent-type", 3);
    assert_eq!(handles.len(), 3);
    assert_eq!(env.trees().len(), 3);
    assert_eq!(scene_nodes(&mut world), 3);
    for tree in env.trees() {
        assert!(tree.position.x.abs() <= TREE_AREA_HALF_EXTENT);
        assert!(tree.position.z.abs() <= TREE_AREA_HALF_EXTENT);
        match &tree.meta {
            EntityMeta::Tree {
                tree_type,
                leaf_color,
                scale,
            } => {
                assert_eq!(tree_type, "mixed");
                assert!(leaf_color.starts_with('#') && leaf_color.len() == 7);
                assert!(*scale >= 0.8 && *scale <= 1.4);
            }
            other => panic!("unexpected meta {other:?}"),
        }
    }
}

#[test]
fn known_tree_type_uses_its_profile() {
    let (mut world, mut env) = setup();
    env.spawn_tree_type(&mut world, "Pine", 5);
    assert!(env
        .trees()
        .iter()
        .all(|t| matches!(&t.meta, EntityMeta::Tree { tree_type, .. } if tree_type == "pine")));
}

#[test]
fn spawn_building_type_replaces_buildings_and_defaults_to_gray_box() {
    let (mut world, mut env) = setup();
    env.spawn_building_type(&mut world, "castle");
    let handle = env.spawn_building_type(&mut world, "space elevator");
    assert_eq!(env.buildings().len(), 1);
    let entry = env.get(handle).unwrap();
    assert_eq!(
        entry.meta,
        EntityMeta::Building {
            building_type: "default".to_string(),
            height: 8.0
        }
    );
    assert_eq!(entry.position.z, -15.0);
    let mut colors = Vec::new();
    scene::for_each_part(&mut world, entry.node, |part| colors.push(color_to_hex(part.color)));
    assert_eq!(colors, vec!["#9e9e9e"]);
}

#[test]
fn throwing_snippet_yields_fallback_skyscrapers_then_trees_fade_away() {
    let (mut world, mut env) = setup();
    add_trees(&mut env, &mut world, 4);

    let report = env.transform_trees_to_skyscrapers(&mut world, "throw \"no geometry today\";");
    assert_eq!(report.replaced, 4);
    assert_eq!(report.fallbacks, 4);
    assert_eq!(env.buildings().len(), 4);
    assert!(env
        .buildings()
        .iter()
        .all(|b| matches!(b.meta, EntityMeta::Skyscraper { fallback: true, .. })));

    // Trees stay tracked while fading.
    assert_eq!(env.trees().len(), 4);
    env.advance_animations(&mut world, TREE_FADE_SECONDS * 0.5);
    assert_eq!(env.trees().len(), 4);
    assert!(env.trees().iter().all(|t| env.is_pending_removal(t.handle)));

    env.advance_animations(&mut world, TREE_FADE_SECONDS);
    assert!(env.trees().is_empty());
    assert_eq!(scene_nodes(&mut world), 4);
    assert!(env.snapshot().pending_removal.is_empty());
}

#[test]
fn generated_skyscrapers_grow_into_the_envelope() {
    let (mut world, mut env) = setup();
    add_trees(&mut env, &mut world, 2);
    let code = r##"
        let tower = group();
        tower.add(mesh(cuboid(2, 10, 2), "#445566").at(0, 5, 0));
        tower.add(mesh(cone(1, 3), "#ffd700", 0.4).at(0, 11.5, 0));
        tower
    "##;
    let report = env.transform_trees_to_skyscrapers(&mut world, code);
    assert_eq!(report.fallbacks, 0);

    env.advance_animations(&mut world, SKYSCRAPER_GROW_SECONDS + 0.1);
    for building in env.buildings() {
        let EntityMeta::Skyscraper { scale, fallback, .. } = building.meta else {
            panic!("expected skyscraper");
        };
        assert!(!fallback);
        assert!(scale.is_finite() && scale > 0.0);
        let final_scale = world.get::<Transform>(building.node).unwrap().scale.y;
        assert!((final_scale - scale).abs() < 1e-4);
        // Candidate is 13 tall; the fitted height stays inside the envelope.
        let height = 13.0 * scale;
        assert!(height <= 33.0 + 1e-3, "height {height}");
    }
}

#[test]
fn zero_size_candidates_are_rejected() {
    let envelope = SkyscraperEnvelope {
        width: 6.0,
        height: 25.0,
        depth: 6.0,
    };
    let flat = ObjectSpec::mesh(
        crate::components::Primitive::Cuboid {
            width: 0.0,
            height: 0.0,
            depth: 0.0,
        },
        Color::WHITE,
    );
    assert!(fit_to_envelope(flat, &envelope).is_err());

    // A zero-depth panel still scales by its measurable dimensions.
    let panel = ObjectSpec::mesh(
        crate::components::Primitive::Cuboid {
            width: 3.0,
            height: 10.0,
            depth: 0.0,
        },
        Color::WHITE,
    );
    let (fitted, scale) = fit_to_envelope(panel, &envelope).unwrap();
    assert!((scale - 2.0).abs() < 1e-5);
    assert!(fitted.bounds().unwrap().min.y.abs() < 1e-5);
}

#[test]
fn second_transform_during_fade_finds_no_trees() {
    let (mut world, mut env) = setup();
    add_trees(&mut env, &mut world, 3);
    env.transform_trees_to_skyscrapers(&mut world, "throw 1;");
    let again = env.transform_trees_to_buildings(&mut world, &BuildingTransformSpec::default());
    assert_eq!(again.replaced, 0);
    assert_eq!(env.buildings().len(), 3);
}

#[test]
fn building_transform_parses_loose_descriptor_and_defaults_unknown_values() {
    let params: ParamMap = json!({
        "newObjectType": "crystal tower",
        "scaleFactor": "1.5",
        "colorScheme": "no-such-palette",
        "transitionAnimation": "wiggle",
        "particleEffect": true,
    })
    .as_object()
    .cloned()
    .unwrap();
    let spec = BuildingTransformSpec::from_params(&params);
    assert_eq!(spec.scale_factor, Some(1.5));
    assert!(spec.particle_effect);
    assert_eq!(
        TransitionAnimation::from_name(spec.transition_animation.as_deref()),
        TransitionAnimation::Grow
    );

    let (mut world, mut env) = setup();
    add_trees(&mut env, &mut world, 2);
    let report = env.transform_trees_to_buildings(&mut world, &spec);
    assert_eq!(report.replaced, 2);
    assert!(env
        .buildings()
        .iter()
        .all(|b| matches!(&b.meta, EntityMeta::Building { building_type, .. } if building_type == "crystal_topped")));
    assert!(world.query::<&Particle>().iter(&world).count() > 0);

    env.advance_animations(&mut world, BUILDING_GROW_SECONDS + 1.0);
    for building in env.buildings() {
        let scale = world.get::<Transform>(building.node).unwrap().scale.x;
        assert!((scale - 1.5).abs() < 1e-4);
    }
    assert!(env.trees().is_empty());
    assert_eq!(world.query::<&Particle>().iter(&world).count(), 0);
}

#[test]
fn plural_particle_key_requests_an_accent() {
    let params: ParamMap = json!({
        "newObjectType": "tapered_tower",
        "scaleFactor": 1.2,
        "colorScheme": "futuristic",
        "transitionAnimation": "bounce",
        "particleEffects": true,
    })
    .as_object()
    .cloned()
    .unwrap();
    let spec = BuildingTransformSpec::from_params(&params);
    assert!(spec.particle_effect);

    let (mut world, mut env) = setup();
    add_trees(&mut env, &mut world, 1);
    env.transform_trees_to_buildings(&mut world, &spec);
    assert!(world.query::<&Particle>().iter(&world).count() > 0);
}

#[test]
fn spiral_transition_turns_and_rises() {
    let (mut world, mut env) = setup();
    add_trees(&mut env, &mut world, 1);
    let spec = BuildingTransformSpec {
        transition_animation: Some("spiral".to_string()),
        ..Default::default()
    };
    env.transform_trees_to_buildings(&mut world, &spec);
    let building = env.buildings()[0].clone();
    env.advance_animations(&mut world, BUILDING_GROW_SECONDS * 0.3);
    let midway = *world.get::<Transform>(building.node).unwrap();
    assert!(midway.translation.y < building.position.y);

    env.advance_animations(&mut world, BUILDING_GROW_SECONDS);
    let done = *world.get::<Transform>(building.node).unwrap();
    assert!((done.translation.y - building.position.y).abs() < 1e-4);
    assert!((done.scale.x - 1.0).abs() < 1e-4);
}

#[test]
fn clear_all_detaches_everything_and_stops_animations() {
    let (mut world, mut env) = setup();
    add_trees(&mut env, &mut world, 3);
    env.add_rock(&mut world, Placement::default(), None);
    env.add_cloud(&mut world, Placement::default(), None);
    env.transform_trees_to_buildings(
        &mut world,
        &BuildingTransformSpec {
            particle_effect: true,
            ..Default::default()
        },
    );
    assert!(!env.animations().is_empty());

    env.clear_all(&mut world);
    let snapshot = env.snapshot();
    assert!(snapshot.trees.is_empty() && snapshot.buildings.is_empty() && snapshot.rocks.is_empty());
    assert_eq!(snapshot.active_animations, 0);
    assert_eq!(scene_nodes(&mut world), 0);
    assert_eq!(world.query::<&Particle>().iter(&world).count(), 0);
    assert_eq!(world.query::<&crate::components::ShapePart>().iter(&world).count(), 0);

    // Late ticks after a clear are harmless.
    env.advance_animations(&mut world, 5.0);
}

#[test]
fn update_moves_props_around_their_anchor() {
    let (mut world, mut env) = setup();
    let island = env.add_floating_island(&mut world, Placement::at(0.0, 0.0), Some(4.0));
    let cloud = env.add_cloud(&mut world, Placement::at(10.0, 10.0), None);
    let platform = env.add_platform(&mut world, Placement::default(), Some(3.0));

    env.update(&mut world, 1.3);
    let island_entry = env.get(island).unwrap().clone();
    let bobbed = world.get::<Transform>(island_entry.node).unwrap().translation.y;
    assert!((bobbed - island_entry.position.y).abs() <= 0.6 + 1e-4);
    assert_ne!(bobbed, island_entry.position.y);

    let cloud_entry = env.get(cloud).unwrap().clone();
    let drifted = world.get::<Transform>(cloud_entry.node).unwrap().translation.x;
    assert!((drifted - cloud_entry.position.x).abs() <= 12.0 + 1e-4);

    let node = env.get(platform).unwrap().node;
    let mut glows = Vec::new();
    scene::for_each_part(&mut world, node, |part| glows.push(part.emissive));
    assert!(glows.iter().any(|g| *g >= 0.6));

    // Same elapsed time, same pose.
    env.update(&mut world, 1.3);
    assert_eq!(world.get::<Transform>(island_entry.node).unwrap().translation.y, bobbed);
}

#[test]
fn weather_and_particle_names_resolve_to_defaults() {
    let (mut world, mut env) = setup();
    assert_eq!(env.set_weather_effect(&mut world, "volcanic ash"), WeatherEffect::Clear);
    assert_eq!(env.set_particle_effect(&mut world, "fireflies"), ParticleEffect::Fireflies);
    let weather = world.resource::<WeatherSystem>();
    assert_eq!(weather.weather, WeatherEffect::Clear);
    assert_eq!(weather.particles, ParticleEffect::Fireflies);
}
