//! Tracked scene props: the six entity collections, their spawn/remove
//! lifecycle, per-frame ambient motion and the animation task list.

pub mod builders;
mod transform;

#[cfg(test)]
mod tests;

use std::collections::{HashMap, HashSet};

use bevy::prelude::*;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::components::{EntityHandle, EntityKind};
use crate::events;
use crate::ground::height_at;
use crate::palette::color_to_hex;
use crate::scene::{self, ObjectSpec};
use crate::scripting::CodeEvaluator;
use crate::tween::{AnimationEffect, Animator, OnFinish};
use crate::weather::{ParticleEffect, WeatherEffect, WeatherSystem};

use builders::TreeProfile;

pub use transform::{BuildingTransformSpec, TransitionAnimation, TransformReport};

/// Half extent of the square trees are scattered in.
pub const TREE_AREA_HALF_EXTENT: f32 = 40.0;
pub const DEFAULT_TREE_COUNT: usize = 5;
pub const MAX_TREE_COUNT: usize = 200;
pub const ISLAND_ALTITUDE: f32 = 18.0;
pub const CLOUD_ALTITUDE: f32 = 35.0;
const BUILDING_SITE: Vec2 = Vec2::new(0.0, -15.0);

pub struct EnvironmentPlugin {
    pub seed: Option<u64>,
}

impl Plugin for EnvironmentPlugin {
    fn build(&self, app: &mut App) {
        let manager = match self.seed {
            Some(seed) => EnvironmentManager::with_seed(seed),
            None => EnvironmentManager::default(),
        };
        app.insert_resource(manager)
            .add_systems(Update, tick_environment);
    }
}

/// Ambient motion first, then the animation task list.
pub fn tick_environment(world: &mut World) {
    let (elapsed, dt) = {
        let time = world.resource::<Time>();
        (time.elapsed_secs(), time.delta_secs())
    };
    world.resource_scope(|world, mut env: Mut<EnvironmentManager>| {
        env.update(world, elapsed);
        env.advance_animations(world, dt);
    });
}

/// Where to put a new entity. A missing `y` is resolved from the terrain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize)]
pub struct Placement {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: Option<f32>,
    #[serde(default)]
    pub z: f32,
}

impl Placement {
    pub fn at(x: f32, z: f32) -> Self {
        Self { x, y: None, z }
    }

    pub fn with_y(mut self, y: f32) -> Self {
        self.y = Some(y);
        self
    }

    /// Non-finite coordinates put the entity at the origin.
    fn resolve(&self, altitude: f32) -> Vec3 {
        let finite = self.x.is_finite() && self.z.is_finite() && self.y.map_or(true, f32::is_finite);
        if !finite {
            return Vec3::ZERO;
        }
        let y = self.y.unwrap_or_else(|| height_at(self.x, self.z) + altitude);
        Vec3::new(self.x, y, self.z)
    }
}

#[derive(Clone, Debug, Default)]
pub struct TreeOptions {
    pub tree_type: Option<String>,
    pub leaf_color: Option<Color>,
    pub scale: Option<f32>,
}

/// Kind-specific data recorded with each tracked entity.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityMeta {
    Tree {
        tree_type: String,
        leaf_color: String,
        scale: f32,
    },
    Rock {
        size: f32,
    },
    Platform {
        size: f32,
    },
    Island {
        size: f32,
    },
    Cloud {
        size: f32,
    },
    Building {
        building_type: String,
        height: f32,
    },
    Skyscraper {
        height: f32,
        scale: f32,
        fallback: bool,
    },
}

#[derive(Clone, Debug)]
pub struct TrackedEntity {
    pub handle: EntityHandle,
    pub node: Entity,
    /// Spawn position. Ambient motion is applied around it.
    pub position: Vec3,
    pub meta: EntityMeta,
}

#[derive(Serialize, Clone, Debug)]
pub struct EntityInfo {
    pub id: String,
    pub position: [f32; 3],
    #[serde(flatten)]
    pub meta: EntityMeta,
}

impl From<&TrackedEntity> for EntityInfo {
    fn from(entry: &TrackedEntity) -> Self {
        Self {
            id: entry.handle.to_string(),
            position: entry.position.to_array(),
            meta: entry.meta.clone(),
        }
    }
}

#[derive(Serialize, Clone, Debug, Default)]
pub struct EnvironmentSnapshot {
    pub trees: Vec<EntityInfo>,
    pub rocks: Vec<EntityInfo>,
    pub platforms: Vec<EntityInfo>,
    pub islands: Vec<EntityInfo>,
    pub clouds: Vec<EntityInfo>,
    pub buildings: Vec<EntityInfo>,
    pub active_animations: usize,
    pub pending_removal: Vec<String>,
}

#[derive(Resource)]
pub struct EnvironmentManager {
    trees: Vec<TrackedEntity>,
    rocks: Vec<TrackedEntity>,
    platforms: Vec<TrackedEntity>,
    islands: Vec<TrackedEntity>,
    clouds: Vec<TrackedEntity>,
    /// Placeholder buildings, transform buildings and skyscrapers.
    buildings: Vec<TrackedEntity>,
    counters: HashMap<EntityKind, u64>,
    /// Trees still fading out after a transform.
    pending_removal: HashSet<EntityHandle>,
    rng: SmallRng,
    evaluator: CodeEvaluator,
    animations: Animator,
}

impl Default for EnvironmentManager {
    fn default() -> Self {
        Self::from_rng(SmallRng::from_entropy())
    }
}

impl EnvironmentManager {
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(SmallRng::seed_from_u64(seed))
    }

    fn from_rng(rng: SmallRng) -> Self {
        Self {
            trees: Vec::new(),
            rocks: Vec::new(),
            platforms: Vec::new(),
            islands: Vec::new(),
            clouds: Vec::new(),
            buildings: Vec::new(),
            counters: HashMap::new(),
            pending_removal: HashSet::new(),
            rng,
            evaluator: CodeEvaluator::new(),
            animations: Animator::default(),
        }
    }

    pub fn trees(&self) -> &[TrackedEntity] {
        &self.trees
    }

    pub fn rocks(&self) -> &[TrackedEntity] {
        &self.rocks
    }

    pub fn platforms(&self) -> &[TrackedEntity] {
        &self.platforms
    }

    pub fn islands(&self) -> &[TrackedEntity] {
        &self.islands
    }

    pub fn clouds(&self) -> &[TrackedEntity] {
        &self.clouds
    }

    pub fn buildings(&self) -> &[TrackedEntity] {
        &self.buildings
    }

    pub fn animations(&self) -> &Animator {
        &self.animations
    }

    pub fn is_pending_removal(&self, handle: EntityHandle) -> bool {
        self.pending_removal.contains(&handle)
    }

    pub fn get(&self, handle: EntityHandle) -> Option<&TrackedEntity> {
        self.collection(handle.kind).iter().find(|e| e.handle == handle)
    }

    fn collection(&self, kind: EntityKind) -> &Vec<TrackedEntity> {
        match kind {
            EntityKind::Tree => &self.trees,
            EntityKind::Rock => &self.rocks,
            EntityKind::Platform => &self.platforms,
            EntityKind::Island => &self.islands,
            EntityKind::Cloud => &self.clouds,
            EntityKind::Building | EntityKind::Skyscraper => &self.buildings,
        }
    }

    fn collection_mut(&mut self, kind: EntityKind) -> &mut Vec<TrackedEntity> {
        match kind {
            EntityKind::Tree => &mut self.trees,
            EntityKind::Rock => &mut self.rocks,
            EntityKind::Platform => &mut self.platforms,
            EntityKind::Island => &mut self.islands,
            EntityKind::Cloud => &mut self.clouds,
            EntityKind::Building | EntityKind::Skyscraper => &mut self.buildings,
        }
    }

    fn next_handle(&mut self, kind: EntityKind) -> EntityHandle {
        let counter = self.counters.entry(kind).or_insert(0);
        *counter += 1;
        EntityHandle {
            kind,
            index: *counter,
        }
    }

    /// Attaches `object` and records it in one step.
    fn track(
        &mut self,
        world: &mut World,
        kind: EntityKind,
        object: &ObjectSpec,
        root: Transform,
        meta: EntityMeta,
    ) -> EntityHandle {
        let handle = self.next_handle(kind);
        let node = scene::attach(world, handle, object, root);
        let position = root.translation;
        self.collection_mut(kind).push(TrackedEntity {
            handle,
            node,
            position,
            meta,
        });
        events::emit(
            world,
            "entity_spawned",
            json!({ "id": handle.to_string(), "kind": kind.prefix(), "position": position.to_array() }),
        );
        handle
    }

    pub fn add_tree(&mut self, world: &mut World, placement: Placement, options: TreeOptions) -> EntityHandle {
        let profile: TreeProfile = match options.tree_type.as_deref().and_then(builders::tree_profile) {
            Some(profile) => *profile,
            None => builders::mixed_tree_profile(&mut self.rng),
        };
        let leaf = options
            .leaf_color
            .unwrap_or_else(|| builders::pick_leaf_color(&profile, &mut self.rng));
        let scale = options
            .scale
            .filter(|s| s.is_finite() && *s > 0.0)
            .unwrap_or_else(|| builders::pick_tree_scale(&profile, &mut self.rng));
        let position = placement.resolve(0.0);
        let root = Transform::from_translation(position)
            .with_rotation(Quat::from_rotation_y(self.rng.gen_range(0.0..std::f32::consts::TAU)))
            .with_scale(Vec3::splat(scale));
        let meta = EntityMeta::Tree {
            tree_type: profile.name.to_string(),
            leaf_color: color_to_hex(leaf),
            scale,
        };
        self.track(world, EntityKind::Tree, &builders::tree(&profile, leaf), root, meta)
    }

    pub fn add_rock(&mut self, world: &mut World, placement: Placement, size: Option<f32>) -> EntityHandle {
        let size = positive_or(size, || self.rng.gen_range(0.8..2.5));
        let object = builders::rock(size, &mut self.rng);
        let root = Transform::from_translation(placement.resolve(0.0));
        self.track(world, EntityKind::Rock, &object, root, EntityMeta::Rock { size })
    }

    pub fn add_platform(&mut self, world: &mut World, placement: Placement, size: Option<f32>) -> EntityHandle {
        let size = positive_or(size, || self.rng.gen_range(2.0..4.0));
        let root = Transform::from_translation(placement.resolve(0.0));
        self.track(
            world,
            EntityKind::Platform,
            &builders::platform(size),
            root,
            EntityMeta::Platform { size },
        )
    }

    pub fn add_floating_island(&mut self, world: &mut World, placement: Placement, size: Option<f32>) -> EntityHandle {
        let size = positive_or(size, || self.rng.gen_range(3.0..6.0));
        let object = builders::floating_island(size, &mut self.rng);
        let root = Transform::from_translation(placement.resolve(ISLAND_ALTITUDE));
        self.track(world, EntityKind::Island, &object, root, EntityMeta::Island { size })
    }

    pub fn add_cloud(&mut self, world: &mut World, placement: Placement, size: Option<f32>) -> EntityHandle {
        let size = positive_or(size, || self.rng.gen_range(3.0..7.0));
        let object = builders::cloud(size, &mut self.rng);
        let root = Transform::from_translation(placement.resolve(CLOUD_ALTITUDE));
        self.track(world, EntityKind::Cloud, &object, root, EntityMeta::Cloud { size })
    }

    /// Detaches and forgets one entity. Returns false for unknown handles.
    pub fn remove(&mut self, world: &mut World, handle: EntityHandle) -> bool {
        let collection = self.collection_mut(handle.kind);
        let Some(index) = collection.iter().position(|e| e.handle == handle) else {
            return false;
        };
        let entry = collection.remove(index);
        self.animations.cancel_for(handle);
        self.pending_removal.remove(&handle);
        scene::detach(world, entry.node);
        events::emit(world, "entity_removed", json!({ "id": handle.to_string() }));
        true
    }

    fn clear_collection(&mut self, world: &mut World, kind: EntityKind) -> usize {
        let handles: Vec<EntityHandle> = self.collection(kind).iter().map(|e| e.handle).collect();
        for handle in &handles {
            self.remove(world, *handle);
        }
        handles.len()
    }

    pub fn clear_trees(&mut self, world: &mut World) -> usize {
        self.clear_collection(world, EntityKind::Tree)
    }

    pub fn clear_buildings(&mut self, world: &mut World) -> usize {
        self.clear_collection(world, EntityKind::Building)
    }

    /// Empties every collection and stops every animation, accent
    /// particles included.
    pub fn clear_all(&mut self, world: &mut World) -> usize {
        let mut removed = 0;
        for kind in [
            EntityKind::Tree,
            EntityKind::Rock,
            EntityKind::Platform,
            EntityKind::Island,
            EntityKind::Cloud,
            EntityKind::Building,
        ] {
            removed += self.clear_collection(world, kind);
        }
        for task in self.animations.tasks() {
            if let (OnFinish::Despawn, AnimationEffect::Drift { target, .. }) = (task.on_finish, &task.effect) {
                scene::detach(world, *target);
            }
        }
        self.animations.clear();
        self.pending_removal.clear();
        info!("[Sylvan env] Cleared {removed} entities");
        removed
    }

    /// Replaces every tree with `count` trees of `tree_type` scattered in
    /// the tree square. Unknown types get a randomized mixed profile.
    pub fn spawn_tree_type(&mut self, world: &mut World, tree_type: &str, count: usize) -> Vec<EntityHandle> {
        self.clear_trees(world);
        let count = count.min(MAX_TREE_COUNT);
        if builders::tree_profile(tree_type).is_none() {
            info!("[Sylvan env] Unknown tree type '{tree_type}', using mixed profile");
        }
        let handles: Vec<EntityHandle> = (0..count)
            .map(|_| {
                let x = self.rng.gen_range(-TREE_AREA_HALF_EXTENT..TREE_AREA_HALF_EXTENT);
                let z = self.rng.gen_range(-TREE_AREA_HALF_EXTENT..TREE_AREA_HALF_EXTENT);
                let options = TreeOptions {
                    tree_type: Some(tree_type.to_string()),
                    ..Default::default()
                };
                self.add_tree(world, Placement::at(x, z), options)
            })
            .collect();
        info!("[Sylvan env] Spawned {} '{tree_type}' trees", handles.len());
        handles
    }

    /// Replaces the buildings with one placeholder of `building_type`.
    pub fn spawn_building_type(&mut self, world: &mut World, building_type: &str) -> EntityHandle {
        self.clear_buildings(world);
        let profile = builders::building_profile(building_type).unwrap_or(&builders::DEFAULT_BUILDING_PROFILE);
        let position = Placement::at(BUILDING_SITE.x, BUILDING_SITE.y).resolve(0.0);
        let meta = EntityMeta::Building {
            building_type: profile.name.to_string(),
            height: profile.height,
        };
        let handle = self.track(
            world,
            EntityKind::Building,
            &builders::placeholder_building(profile),
            Transform::from_translation(position),
            meta,
        );
        info!("[Sylvan env] Spawned '{}' building {handle}", profile.name);
        handle
    }

    pub fn set_weather_effect(&mut self, world: &mut World, name: &str) -> WeatherEffect {
        let effect = WeatherEffect::from_name(name);
        match world.get_resource_mut::<WeatherSystem>() {
            Some(mut weather) => weather.weather = effect,
            None => world.insert_resource(WeatherSystem {
                weather: effect,
                ..Default::default()
            }),
        }
        info!("[Sylvan env] Weather set to {effect:?}");
        effect
    }

    pub fn set_particle_effect(&mut self, world: &mut World, name: &str) -> ParticleEffect {
        let effect = ParticleEffect::from_name(name);
        match world.get_resource_mut::<WeatherSystem>() {
            Some(mut weather) => weather.particles = effect,
            None => world.insert_resource(WeatherSystem {
                particles: effect,
                ..Default::default()
            }),
        }
        info!("[Sylvan env] Particles set to {effect:?}");
        effect
    }

    /// Cloud drift, island bobbing and platform glow as pure functions of
    /// `elapsed` and each entity's index.
    pub fn update(&mut self, world: &mut World, elapsed: f32) {
        for (i, cloud) in self.clouds.iter().enumerate() {
            let phase = i as f32 * 1.7;
            let x = cloud.position.x + (elapsed * 0.05 + phase).sin() * 12.0;
            scene::with_root_transform(world, cloud.node, |transform| transform.translation.x = x);
        }
        for (i, island) in self.islands.iter().enumerate() {
            let phase = i as f32;
            let y = island.position.y + (elapsed * 0.8 + phase).sin() * 0.6;
            let angle = elapsed * 0.1 + phase * 0.5;
            scene::with_root_transform(world, island.node, |transform| {
                transform.translation.y = y;
                transform.rotation = Quat::from_rotation_y(angle);
            });
        }
        for (i, platform) in self.platforms.iter().enumerate() {
            let glow = 0.6 + 0.6 * (elapsed * 2.0 + i as f32).sin().abs();
            scene::for_each_part(world, platform.node, |part| {
                if part.emissive > 0.0 {
                    part.emissive = glow;
                }
            });
        }
    }

    /// Advances animations and performs the removals finished fades
    /// deferred.
    pub fn advance_animations(&mut self, world: &mut World, dt: f32) {
        for done in self.animations.advance(world, dt) {
            for handle in &done.remove {
                self.remove(world, *handle);
            }
            for entity in &done.despawn {
                scene::detach(world, *entity);
            }
            events::emit(
                world,
                "animation_complete",
                json!({
                    "animation": done.id,
                    "effect": done.label,
                    "owner": done.owner.map(|h| h.to_string()),
                    "removed": done.remove.iter().map(ToString::to_string).collect::<Vec<_>>(),
                }),
            );
        }
    }

    pub fn snapshot(&self) -> EnvironmentSnapshot {
        let infos = |entries: &[TrackedEntity]| entries.iter().map(EntityInfo::from).collect();
        let mut pending: Vec<String> = self.pending_removal.iter().map(ToString::to_string).collect();
        pending.sort();
        EnvironmentSnapshot {
            trees: infos(&self.trees),
            rocks: infos(&self.rocks),
            platforms: infos(&self.platforms),
            islands: infos(&self.islands),
            clouds: infos(&self.clouds),
            buildings: infos(&self.buildings),
            active_animations: self.animations.len(),
            pending_removal: pending,
        }
    }
}

fn positive_or(value: Option<f32>, fallback: impl FnOnce() -> f32) -> f32 {
    value
        .filter(|v| v.is_finite() && *v > 0.0)
        .unwrap_or_else(fallback)
}
