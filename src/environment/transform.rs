use std::f32::consts::TAU;

use bevy::prelude::*;
use rand::Rng;
use serde::Serialize;
use serde_json::json;

use crate::components::{EntityHandle, EntityKind, Particle, Primitive, ShapePart};
use crate::events;
use crate::palette::color_scheme;
use crate::params::{bool_param, f32_param, str_param, ParamMap};
use crate::scene::ObjectSpec;
use crate::scripting::Bindings;
use crate::tween::{AnimationEffect, EasingFunction, FadeTarget, OnFinish};

use super::builders::{self, BuildingArchetype, SkyscraperEnvelope};
use super::{EntityMeta, EnvironmentManager};

pub const SKYSCRAPER_GROW_SECONDS: f32 = 2.5;
pub const BUILDING_GROW_SECONDS: f32 = 1.5;
pub const TREE_FADE_SECONDS: f32 = 1.0;
const ACCENT_SECONDS: f32 = 2.0;
const ACCENT_PARTICLES: usize = 8;
const START_SCALE: f32 = 0.01;
/// Candidate dimensions at or below this are ignored when scaling.
const MIN_DIMENSION: f32 = 1e-3;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionAnimation {
    #[default]
    Grow,
    Bounce,
    Spiral,
}

impl TransitionAnimation {
    /// Unknown names resolve to a linear grow.
    pub fn from_name(name: Option<&str>) -> Self {
        match name.unwrap_or_default().trim().to_ascii_lowercase().as_str() {
            "bounce" | "bouncy" | "bounce_grow" | "elastic" => Self::Bounce,
            "spiral" | "spin" | "twist" | "rotate" => Self::Spiral,
            _ => Self::Grow,
        }
    }
}

/// How trees become buildings. Parsed leniently from JSON; both
/// `snake_case` and `camelCase` keys are accepted.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct BuildingTransformSpec {
    pub new_object_type: Option<String>,
    pub scale_factor: Option<f32>,
    pub color_scheme: Option<String>,
    pub transition_animation: Option<String>,
    pub particle_effect: bool,
}

impl BuildingTransformSpec {
    pub fn from_params(params: &ParamMap) -> Self {
        Self {
            new_object_type: str_param(params, &["new_object_type", "newObjectType", "type"]),
            scale_factor: f32_param(params, &["scale_factor", "scaleFactor", "scale"]),
            color_scheme: str_param(params, &["color_scheme", "colorScheme"]),
            transition_animation: str_param(params, &["transition_animation", "transitionAnimation", "animation"]),
            particle_effect: bool_param(
                params,
                &["particle_effect", "particleEffect", "particleEffects", "particles"],
            )
            .unwrap_or(false),
        }
    }

    fn resolved_scale(&self) -> f32 {
        self.scale_factor
            .filter(|s| s.is_finite() && *s > 0.0)
            .map(|s| s.clamp(0.1, 5.0))
            .unwrap_or(1.0)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TransformReport {
    pub replaced: usize,
    pub fallbacks: usize,
    pub created: Vec<String>,
}

struct TreeSite {
    handle: EntityHandle,
    node: Entity,
    position: Vec3,
    scale: Vec3,
}

/// Scales `object` uniformly so it fits `envelope` and moves its base
/// onto the origin. Degenerate dimensions are skipped; an object with no
/// measurable dimension is rejected.
pub(crate) fn fit_to_envelope(mut object: ObjectSpec, envelope: &SkyscraperEnvelope) -> Result<(ObjectSpec, f32), String> {
    let bounds = object.bounds().ok_or("candidate has no geometry")?;
    let size = bounds.size();
    let scale = [
        (size.x, envelope.width),
        (size.y, envelope.height),
        (size.z, envelope.depth),
    ]
    .into_iter()
    .filter(|(measured, _)| measured.is_finite() && *measured > MIN_DIMENSION)
    .map(|(measured, target)| target / measured)
    .fold(f32::INFINITY, f32::min);
    if !scale.is_finite() || scale <= 0.0 {
        return Err(format!("candidate has no measurable size ({size})"));
    }
    let center = (bounds.min + bounds.max) * 0.5;
    object.transform_mut().translation -= Vec3::new(center.x, bounds.min.y, center.z);
    Ok((object, scale))
}

impl EnvironmentManager {
    fn transformable_trees(&self, world: &World) -> Vec<TreeSite> {
        self.trees
            .iter()
            .filter(|tree| !self.pending_removal.contains(&tree.handle))
            .map(|tree| TreeSite {
                handle: tree.handle,
                node: tree.node,
                position: tree.position,
                scale: world.get::<Transform>(tree.node).map(|t| t.scale).unwrap_or(Vec3::ONE),
            })
            .collect()
    }

    /// Fades every listed tree out as one batch; the trees leave their
    /// collection when the fade completes.
    fn fade_out_trees(&mut self, sites: &[TreeSite]) {
        let targets: Vec<FadeTarget> = sites
            .iter()
            .map(|site| FadeTarget {
                handle: site.handle,
                entity: site.node,
                scale: site.scale,
            })
            .collect();
        self.pending_removal.extend(sites.iter().map(|site| site.handle));
        self.animations.start(
            None,
            AnimationEffect::FadeOut { targets },
            EasingFunction::EaseIn,
            TREE_FADE_SECONDS,
            OnFinish::RemoveTargets,
        );
    }

    /// Replaces every tree with a skyscraper built from `code`. A tree
    /// whose snippet fails gets a procedural fallback tower instead.
    pub fn transform_trees_to_skyscrapers(&mut self, world: &mut World, code: &str) -> TransformReport {
        let sites = self.transformable_trees(world);
        let mut report = TransformReport::default();
        if sites.is_empty() {
            info!("[Sylvan env] No trees to transform into skyscrapers");
            return report;
        }

        for (index, site) in sites.iter().enumerate() {
            let envelope = SkyscraperEnvelope::random(&mut self.rng);
            let bindings = Bindings::new()
                .number("tree_x", site.position.x)
                .number("tree_y", site.position.y)
                .number("tree_z", site.position.z)
                .number("target_height", envelope.height)
                .with("tree_index", index as rhai::INT);
            let candidate = self
                .evaluator
                .try_create_object(code, &bindings)
                .map_err(|err| err.to_string())
                .and_then(|object| fit_to_envelope(object, &envelope));
            let (object, scale, fallback) = match candidate {
                Ok((object, scale)) => (object, scale, false),
                Err(err) => {
                    warn!("[Sylvan env] Skyscraper for {} uses fallback: {err}", site.handle);
                    (builders::fallback_skyscraper(&envelope, &mut self.rng), 1.0, true)
                }
            };

            let root = Transform::from_translation(site.position)
                .with_rotation(Quat::from_rotation_y(self.rng.gen_range(0.0..TAU)))
                .with_scale(Vec3::splat(START_SCALE));
            let meta = EntityMeta::Skyscraper {
                height: envelope.height,
                scale,
                fallback,
            };
            let handle = self.track(world, EntityKind::Skyscraper, &object, root, meta);
            if let Some(node) = self.get(handle).map(|e| e.node) {
                self.animations.start(
                    Some(handle),
                    AnimationEffect::Grow {
                        target: node,
                        from: START_SCALE,
                        to: scale,
                    },
                    EasingFunction::Elastic,
                    SKYSCRAPER_GROW_SECONDS,
                    OnFinish::Keep,
                );
            }
            report.replaced += 1;
            report.fallbacks += usize::from(fallback);
            report.created.push(handle.to_string());
        }

        self.fade_out_trees(&sites);
        events::emit(
            world,
            "transform_started",
            json!({ "target": "skyscraper", "replaced": report.replaced, "fallbacks": report.fallbacks }),
        );
        info!(
            "[Sylvan env] Transforming {} trees into skyscrapers ({} fallbacks)",
            report.replaced, report.fallbacks
        );
        report
    }

    /// Replaces every tree with a procedural building archetype.
    pub fn transform_trees_to_buildings(&mut self, world: &mut World, spec: &BuildingTransformSpec) -> TransformReport {
        let sites = self.transformable_trees(world);
        let mut report = TransformReport::default();
        if sites.is_empty() {
            info!("[Sylvan env] No trees to transform into buildings");
            return report;
        }

        let kind = BuildingArchetype::from_name(spec.new_object_type.as_deref());
        let scheme = color_scheme(spec.color_scheme.as_deref());
        let animation = TransitionAnimation::from_name(spec.transition_animation.as_deref());
        let scale = spec.resolved_scale();

        for site in &sites {
            let object = builders::archetype(kind, &scheme, &mut self.rng);
            let height = object.bounds().map(|b| b.size().y * scale).unwrap_or_default();
            let base_rotation = Quat::from_rotation_y(self.rng.gen_range(0.0..TAU));
            let root = Transform::from_translation(site.position)
                .with_rotation(base_rotation)
                .with_scale(Vec3::splat(START_SCALE));
            let meta = EntityMeta::Building {
                building_type: kind.name().to_string(),
                height,
            };
            let handle = self.track(world, EntityKind::Building, &object, root, meta);
            let Some(node) = self.get(handle).map(|e| e.node) else {
                continue;
            };
            let (effect, easing) = match animation {
                TransitionAnimation::Grow => (
                    AnimationEffect::Grow {
                        target: node,
                        from: START_SCALE,
                        to: scale,
                    },
                    EasingFunction::Linear,
                ),
                TransitionAnimation::Bounce => (
                    AnimationEffect::Grow {
                        target: node,
                        from: START_SCALE,
                        to: scale,
                    },
                    EasingFunction::Bounce,
                ),
                TransitionAnimation::Spiral => (
                    AnimationEffect::Spiral {
                        target: node,
                        to: scale,
                        turns: 2.0,
                        rise: height.max(1.0) * 0.5,
                        base_y: site.position.y,
                        base_rotation,
                    },
                    EasingFunction::EaseOut,
                ),
            };
            self.animations
                .start(Some(handle), effect, easing, BUILDING_GROW_SECONDS, OnFinish::Keep);
            if spec.particle_effect {
                self.spawn_accent_particles(world, site.position + Vec3::Y * height, scheme.accent());
            }
            report.replaced += 1;
            report.created.push(handle.to_string());
        }

        self.fade_out_trees(&sites);
        events::emit(
            world,
            "transform_started",
            json!({
                "target": kind.name(),
                "replaced": report.replaced,
                "color_scheme": scheme.name,
                "animation": animation,
            }),
        );
        info!(
            "[Sylvan env] Transforming {} trees into {} buildings ({} palette)",
            report.replaced,
            kind.name(),
            scheme.name
        );
        report
    }

    /// Short-lived glowing motes drifting up from `origin`. They are not
    /// tracked; their drift animation despawns them.
    fn spawn_accent_particles(&mut self, world: &mut World, origin: Vec3, color: Color) {
        for _ in 0..ACCENT_PARTICLES {
            let angle = self.rng.gen_range(0.0..TAU);
            let velocity = Vec3::new(angle.cos() * 1.5, self.rng.gen_range(2.0..4.0), angle.sin() * 1.5);
            let entity = world
                .spawn((
                    Particle,
                    ShapePart {
                        primitive: Primitive::Sphere { radius: 0.2 },
                        color,
                        opacity: 1.0,
                        emissive: 2.0,
                    },
                    Transform::from_translation(origin),
                    Visibility::default(),
                ))
                .id();
            self.animations.start(
                None,
                AnimationEffect::Drift {
                    target: entity,
                    origin,
                    velocity,
                },
                EasingFunction::Linear,
                ACCENT_SECONDS,
                OnFinish::Despawn,
            );
        }
    }
}
