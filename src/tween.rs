use bevy::prelude::*;

use crate::components::EntityHandle;
use crate::scene;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EasingFunction {
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
    Bounce,
    Elastic,
}

impl EasingFunction {
    pub fn from_name(s: &str) -> Self {
        match s {
            "ease_in" | "easeIn" => Self::EaseIn,
            "ease_out" | "easeOut" => Self::EaseOut,
            "ease_in_out" | "easeInOut" => Self::EaseInOut,
            "bounce" => Self::Bounce,
            "elastic" => Self::Elastic,
            _ => Self::Linear,
        }
    }

    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::EaseIn => t * t,
            Self::EaseOut => 1.0 - (1.0 - t) * (1.0 - t),
            Self::EaseInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
                }
            }
            Self::Bounce => {
                if t < 1.0 / 2.75 {
                    7.5625 * t * t
                } else if t < 2.0 / 2.75 {
                    let t = t - 1.5 / 2.75;
                    7.5625 * t * t + 0.75
                } else if t < 2.5 / 2.75 {
                    let t = t - 2.25 / 2.75;
                    7.5625 * t * t + 0.9375
                } else {
                    let t = t - 2.625 / 2.75;
                    7.5625 * t * t + 0.984375
                }
            }
            Self::Elastic => {
                if t == 0.0 || t == 1.0 {
                    t
                } else {
                    let p = 0.3;
                    let s = p / 4.0;
                    (2.0f32).powf(-10.0 * t) * ((t - s) * std::f32::consts::TAU / p).sin() + 1.0
                }
            }
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct FadeTarget {
    pub handle: EntityHandle,
    pub entity: Entity,
    pub scale: Vec3,
}

#[derive(Clone, Debug)]
pub enum AnimationEffect {
    /// Uniform scale from `from` to `to`.
    Grow { target: Entity, from: f32, to: f32 },
    /// Grow while turning about Y and rising from below `base_y`.
    Spiral {
        target: Entity,
        to: f32,
        turns: f32,
        rise: f32,
        base_y: f32,
        base_rotation: Quat,
    },
    /// Opacity and scale eased to zero for a batch of entities.
    FadeOut { targets: Vec<FadeTarget> },
    /// Straight-line drift with fading opacity.
    Drift {
        target: Entity,
        origin: Vec3,
        velocity: Vec3,
    },
}

impl AnimationEffect {
    pub fn label(&self) -> &'static str {
        match self {
            AnimationEffect::Grow { .. } => "grow",
            AnimationEffect::Spiral { .. } => "spiral",
            AnimationEffect::FadeOut { .. } => "fade_out",
            AnimationEffect::Drift { .. } => "drift",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum OnFinish {
    Keep,
    /// Remove the fade targets from their collections.
    RemoveTargets,
    /// Despawn the animated entity (untracked particles).
    Despawn,
}

#[derive(Clone, Debug)]
pub struct AnimationTask {
    pub id: u64,
    pub owner: Option<EntityHandle>,
    pub effect: AnimationEffect,
    pub easing: EasingFunction,
    pub elapsed: f32,
    pub duration: f32,
    pub on_finish: OnFinish,
}

impl AnimationTask {
    fn touches(&self, handle: EntityHandle) -> bool {
        if self.owner == Some(handle) {
            return true;
        }
        match &self.effect {
            AnimationEffect::FadeOut { targets } => targets.iter().any(|t| t.handle == handle),
            _ => false,
        }
    }
}

#[derive(Debug, Default)]
pub struct FinishedAnimation {
    pub id: u64,
    pub label: &'static str,
    pub owner: Option<EntityHandle>,
    pub remove: Vec<EntityHandle>,
    pub despawn: Vec<Entity>,
}

/// Active animation tasks, advanced once per frame by a single call.
#[derive(Default)]
pub struct Animator {
    tasks: Vec<AnimationTask>,
    next_id: u64,
}

impl Animator {
    pub fn start(
        &mut self,
        owner: Option<EntityHandle>,
        effect: AnimationEffect,
        easing: EasingFunction,
        duration: f32,
        on_finish: OnFinish,
    ) -> u64 {
        self.next_id += 1;
        self.tasks.push(AnimationTask {
            id: self.next_id,
            owner,
            effect,
            easing,
            elapsed: 0.0,
            duration: duration.max(0.001),
            on_finish,
        });
        self.next_id
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn tasks(&self) -> &[AnimationTask] {
        &self.tasks
    }

    pub fn touches(&self, handle: EntityHandle) -> bool {
        self.tasks.iter().any(|task| task.touches(handle))
    }

    /// Drops every animation touching `handle`. Batch fades only lose the
    /// matching target. Returns how many tasks were affected.
    pub fn cancel_for(&mut self, handle: EntityHandle) -> usize {
        let mut affected = 0;
        self.tasks.retain_mut(|task| {
            if !task.touches(handle) {
                return true;
            }
            affected += 1;
            match &mut task.effect {
                AnimationEffect::FadeOut { targets } if task.owner != Some(handle) => {
                    targets.retain(|t| t.handle != handle);
                    !targets.is_empty()
                }
                _ => false,
            }
        });
        affected
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }

    /// Advances every task by `dt` seconds and returns the ones that ended.
    /// Targets that no longer exist are skipped.
    pub fn advance(&mut self, world: &mut World, dt: f32) -> Vec<FinishedAnimation> {
        let mut finished = Vec::new();
        for task in &mut self.tasks {
            task.elapsed += dt.max(0.0);
            let t = (task.elapsed / task.duration).clamp(0.0, 1.0);
            apply_effect(world, &task.effect, task.easing.apply(t), t, task.elapsed);
            if task.elapsed >= task.duration {
                finished.push(task.id);
            }
        }
        if finished.is_empty() {
            return Vec::new();
        }

        let mut done = Vec::with_capacity(finished.len());
        self.tasks.retain(|task| {
            if !finished.contains(&task.id) {
                return true;
            }
            let mut out = FinishedAnimation {
                id: task.id,
                label: task.effect.label(),
                owner: task.owner,
                ..Default::default()
            };
            match (task.on_finish, &task.effect) {
                (OnFinish::RemoveTargets, AnimationEffect::FadeOut { targets }) => {
                    out.remove = targets.iter().map(|t| t.handle).collect();
                }
                (OnFinish::RemoveTargets, _) => out.remove.extend(task.owner),
                (OnFinish::Despawn, AnimationEffect::FadeOut { targets }) => {
                    out.despawn = targets.iter().map(|t| t.entity).collect();
                }
                (OnFinish::Despawn, AnimationEffect::Grow { target, .. })
                | (OnFinish::Despawn, AnimationEffect::Spiral { target, .. })
                | (OnFinish::Despawn, AnimationEffect::Drift { target, .. }) => {
                    out.despawn.push(*target);
                }
                (OnFinish::Keep, _) => {}
            }
            done.push(out);
            false
        });
        done
    }
}

fn apply_effect(world: &mut World, effect: &AnimationEffect, eased: f32, t: f32, elapsed: f32) {
    match effect {
        AnimationEffect::Grow { target, from, to } => {
            let s = from + (to - from) * eased;
            scene::with_root_transform(world, *target, |transform| {
                transform.scale = Vec3::splat(s.max(0.0001));
            });
        }
        AnimationEffect::Spiral {
            target,
            to,
            turns,
            rise,
            base_y,
            base_rotation,
        } => {
            let s = to * eased;
            scene::with_root_transform(world, *target, |transform| {
                transform.scale = Vec3::splat(s.max(0.0001));
                transform.rotation =
                    *base_rotation * Quat::from_rotation_y(turns * std::f32::consts::TAU * t);
                transform.translation.y = base_y - rise * (1.0 - eased);
            });
        }
        AnimationEffect::FadeOut { targets } => {
            let remaining = 1.0 - eased;
            for target in targets {
                let exists = scene::with_root_transform(world, target.entity, |transform| {
                    transform.scale = target.scale * remaining.max(0.0001);
                });
                if exists {
                    scene::set_opacity(world, target.entity, remaining);
                }
            }
        }
        AnimationEffect::Drift {
            target,
            origin,
            velocity,
        } => {
            let exists = scene::with_root_transform(world, *target, |transform| {
                transform.translation = *origin + *velocity * elapsed;
            });
            if exists {
                scene::set_opacity(world, *target, 1.0 - t);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{EntityKind, Primitive};
    use crate::scene::ObjectSpec;

    fn spawn(world: &mut World, index: u64) -> (EntityHandle, Entity) {
        let handle = EntityHandle {
            kind: EntityKind::Tree,
            index,
        };
        let spec = ObjectSpec::mesh(Primitive::Sphere { radius: 1.0 }, Color::WHITE);
        (handle, scene::attach(world, handle, &spec, Transform::IDENTITY))
    }

    #[test]
    fn easing_endpoints_are_exact() {
        for easing in [
            EasingFunction::Linear,
            EasingFunction::EaseIn,
            EasingFunction::EaseOut,
            EasingFunction::EaseInOut,
            EasingFunction::Bounce,
            EasingFunction::Elastic,
        ] {
            assert!(easing.apply(0.0).abs() < 1e-4, "{easing:?} at 0");
            assert!((easing.apply(1.0) - 1.0).abs() < 1e-4, "{easing:?} at 1");
        }
        assert_eq!(EasingFunction::from_name("wobbly"), EasingFunction::Linear);
    }

    #[test]
    fn grow_reaches_target_scale_and_finishes_once() {
        let mut world = World::new();
        let (handle, entity) = spawn(&mut world, 1);
        let mut animator = Animator::default();
        animator.start(
            Some(handle),
            AnimationEffect::Grow {
                target: entity,
                from: 0.01,
                to: 3.0,
            },
            EasingFunction::Elastic,
            1.0,
            OnFinish::Keep,
        );

        assert!(animator.advance(&mut world, 0.5).is_empty());
        let done = animator.advance(&mut world, 0.6);
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].label, "grow");
        assert!(animator.is_empty());
        let scale = world.get::<Transform>(entity).unwrap().scale;
        assert!((scale.x - 3.0).abs() < 1e-4);
    }

    #[test]
    fn fade_batch_reports_targets_for_removal() {
        let mut world = World::new();
        let a = spawn(&mut world, 1);
        let b = spawn(&mut world, 2);
        let mut animator = Animator::default();
        animator.start(
            None,
            AnimationEffect::FadeOut {
                targets: vec![
                    FadeTarget {
                        handle: a.0,
                        entity: a.1,
                        scale: Vec3::ONE,
                    },
                    FadeTarget {
                        handle: b.0,
                        entity: b.1,
                        scale: Vec3::ONE,
                    },
                ],
            },
            EasingFunction::EaseIn,
            1.0,
            OnFinish::RemoveTargets,
        );

        // A target detached mid-animation is skipped, not an error.
        scene::detach(&mut world, b.1);
        let done = animator.advance(&mut world, 2.0);
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].remove, vec![a.0, b.0]);
    }

    #[test]
    fn cancel_for_trims_batch_targets() {
        let mut world = World::new();
        let a = spawn(&mut world, 1);
        let b = spawn(&mut world, 2);
        let mut animator = Animator::default();
        animator.start(
            None,
            AnimationEffect::FadeOut {
                targets: vec![
                    FadeTarget {
                        handle: a.0,
                        entity: a.1,
                        scale: Vec3::ONE,
                    },
                    FadeTarget {
                        handle: b.0,
                        entity: b.1,
                        scale: Vec3::ONE,
                    },
                ],
            },
            EasingFunction::Linear,
            1.0,
            OnFinish::RemoveTargets,
        );
        animator.start(
            Some(a.0),
            AnimationEffect::Grow {
                target: a.1,
                from: 0.0,
                to: 1.0,
            },
            EasingFunction::Linear,
            1.0,
            OnFinish::Keep,
        );

        assert_eq!(animator.cancel_for(a.0), 2);
        assert_eq!(animator.len(), 1);
        assert!(!animator.touches(a.0));
        assert!(animator.touches(b.0));
    }
}
