use std::fmt;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Set when the app runs without a window.
#[derive(Resource, Clone, Copy, Default)]
pub struct HeadlessMode(pub bool);

/// Kinds of tracked scene entities.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Tree,
    Rock,
    Platform,
    Island,
    Cloud,
    Building,
    Skyscraper,
}

impl EntityKind {
    pub const ALL: [EntityKind; 7] = [
        EntityKind::Tree,
        EntityKind::Rock,
        EntityKind::Platform,
        EntityKind::Island,
        EntityKind::Cloud,
        EntityKind::Building,
        EntityKind::Skyscraper,
    ];

    pub fn prefix(self) -> &'static str {
        match self {
            EntityKind::Tree => "tree",
            EntityKind::Rock => "rock",
            EntityKind::Platform => "platform",
            EntityKind::Island => "island",
            EntityKind::Cloud => "cloud",
            EntityKind::Building => "building",
            EntityKind::Skyscraper => "skyscraper",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.prefix() == prefix)
    }
}

/// Arena handle for a tracked entity: kind tag plus a per-kind monotonic
/// index. Displayed as `<kind>_<index>`; indices are never reused.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct EntityHandle {
    pub kind: EntityKind,
    pub index: u64,
}

impl EntityHandle {
    pub fn parse(id: &str) -> Option<Self> {
        let (prefix, index) = id.trim().rsplit_once('_')?;
        Some(Self {
            kind: EntityKind::from_prefix(prefix)?,
            index: index.parse().ok()?,
        })
    }
}

impl fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.kind.prefix(), self.index)
    }
}

impl Serialize for EntityHandle {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Container object of a tracked entity. Its descendants carry the parts.
#[derive(Component, Clone, Copy, Debug)]
pub struct SceneNode {
    pub handle: EntityHandle,
}

/// Geometry of a single renderable part, in local units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Primitive {
    Cuboid {
        width: f32,
        height: f32,
        depth: f32,
    },
    Cylinder {
        radius_top: f32,
        radius_bottom: f32,
        height: f32,
    },
    Cone {
        radius: f32,
        height: f32,
    },
    Sphere {
        radius: f32,
    },
}

impl Primitive {
    /// Half extents of the axis-aligned box enclosing the primitive.
    pub fn half_extents(&self) -> Vec3 {
        match *self {
            Primitive::Cuboid {
                width,
                height,
                depth,
            } => Vec3::new(width, height, depth) * 0.5,
            Primitive::Cylinder {
                radius_top,
                radius_bottom,
                height,
            } => {
                let r = radius_top.max(radius_bottom);
                Vec3::new(r, height * 0.5, r)
            }
            Primitive::Cone { radius, height } => Vec3::new(radius, height * 0.5, radius),
            Primitive::Sphere { radius } => Vec3::splat(radius),
        }
    }
}

/// One renderable part of a scene entity.
#[derive(Component, Clone, Debug)]
pub struct ShapePart {
    pub primitive: Primitive,
    pub color: Color,
    pub opacity: f32,
    pub emissive: f32,
}

/// Marks the player avatar.
#[derive(Component)]
pub struct PlayerAvatar;

/// Marks the terrain surface.
#[derive(Component)]
pub struct GroundSurface;

/// Marks a short-lived weather or accent particle.
#[derive(Component)]
pub struct Particle;
