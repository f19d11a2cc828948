//! Procedural object graphs for environment props and buildings. Every
//! builder returns an `ObjectSpec` whose base sits on the local origin.

use std::f32::consts::{PI, TAU};

use bevy::prelude::*;
use rand::Rng;

use crate::components::Primitive;
use crate::palette::{parse_color, ColorScheme};
use crate::scene::ObjectSpec;

fn hex(value: &str) -> Color {
    parse_color(value).unwrap_or(Color::WHITE)
}

fn cuboid(width: f32, height: f32, depth: f32) -> Primitive {
    Primitive::Cuboid {
        width,
        height,
        depth,
    }
}

fn cylinder(radius_top: f32, radius_bottom: f32, height: f32) -> Primitive {
    Primitive::Cylinder {
        radius_top,
        radius_bottom,
        height,
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Canopy {
    Round,
    Conical,
    Palm,
    Weeping,
    Slender,
}

/// Color and scale profile of a tree type.
#[derive(Clone, Copy, Debug)]
pub struct TreeProfile {
    pub name: &'static str,
    pub leaf_colors: &'static [&'static str],
    pub trunk_color: &'static str,
    pub scale: (f32, f32),
    pub canopy: Canopy,
    pub glow: f32,
}

pub const TREE_PROFILES: &[TreeProfile] = &[
    TreeProfile {
        name: "oak",
        leaf_colors: &["#2e7d32", "#388e3c", "#43a047"],
        trunk_color: "#6d4c41",
        scale: (1.0, 1.5),
        canopy: Canopy::Round,
        glow: 0.0,
    },
    TreeProfile {
        name: "pine",
        leaf_colors: &["#1b5e20", "#2e7d32", "#33691e"],
        trunk_color: "#5d4037",
        scale: (1.1, 1.8),
        canopy: Canopy::Conical,
        glow: 0.0,
    },
    TreeProfile {
        name: "cherry",
        leaf_colors: &["#f8bbd0", "#f48fb1", "#fce4ec"],
        trunk_color: "#4e342e",
        scale: (0.9, 1.3),
        canopy: Canopy::Round,
        glow: 0.0,
    },
    TreeProfile {
        name: "birch",
        leaf_colors: &["#9ccc65", "#aed581", "#c5e1a5"],
        trunk_color: "#eeeeee",
        scale: (1.0, 1.4),
        canopy: Canopy::Slender,
        glow: 0.0,
    },
    TreeProfile {
        name: "palm",
        leaf_colors: &["#66bb6a", "#4caf50"],
        trunk_color: "#a1887f",
        scale: (1.0, 1.6),
        canopy: Canopy::Palm,
        glow: 0.0,
    },
    TreeProfile {
        name: "willow",
        leaf_colors: &["#7cb342", "#8bc34a"],
        trunk_color: "#5d4037",
        scale: (1.1, 1.5),
        canopy: Canopy::Weeping,
        glow: 0.0,
    },
    TreeProfile {
        name: "magic",
        leaf_colors: &["#ba68c8", "#4dd0e1", "#f06292"],
        trunk_color: "#4a148c",
        scale: (1.0, 1.6),
        canopy: Canopy::Round,
        glow: 0.8,
    },
];

/// Leaf colors used when an unknown tree type is requested.
const MIXED_LEAF_COLORS: &[&str] = &[
    "#2e7d32", "#43a047", "#66bb6a", "#9ccc65", "#558b2f", "#1b5e20", "#689f38",
];

pub fn tree_profile(name: &str) -> Option<&'static TreeProfile> {
    let wanted = name.trim().to_ascii_lowercase();
    TREE_PROFILES.iter().find(|profile| {
        profile.name == wanted || wanted.strip_suffix(" tree").is_some_and(|n| n == profile.name)
    })
}

/// Randomized profile for tree types nothing is registered for.
pub fn mixed_tree_profile(rng: &mut impl Rng) -> TreeProfile {
    let canopies = [Canopy::Round, Canopy::Conical, Canopy::Slender];
    TreeProfile {
        name: "mixed",
        leaf_colors: MIXED_LEAF_COLORS,
        trunk_color: "#6d4c41",
        scale: (0.8, 1.4),
        canopy: canopies[rng.gen_range(0..canopies.len())],
        glow: 0.0,
    }
}

pub fn pick_leaf_color(profile: &TreeProfile, rng: &mut impl Rng) -> Color {
    if profile.leaf_colors.is_empty() {
        return hex("#43a047");
    }
    hex(profile.leaf_colors[rng.gen_range(0..profile.leaf_colors.len())])
}

pub fn pick_tree_scale(profile: &TreeProfile, rng: &mut impl Rng) -> f32 {
    let (lo, hi) = profile.scale;
    if hi > lo {
        rng.gen_range(lo..hi)
    } else {
        lo
    }
}

/// A tree at unit scale, roughly 5 units tall.
pub fn tree(profile: &TreeProfile, leaf: Color) -> ObjectSpec {
    let trunk_color = hex(profile.trunk_color);
    let leaves = |primitive: Primitive, at: Vec3| {
        ObjectSpec::mesh(primitive, leaf)
            .with_emissive(profile.glow)
            .at(at)
    };
    let mut parts = Vec::new();
    match profile.canopy {
        Canopy::Round => {
            parts.push(ObjectSpec::mesh(cylinder(0.25, 0.35, 2.0), trunk_color).at(Vec3::Y));
            parts.push(leaves(Primitive::Sphere { radius: 1.5 }, Vec3::new(0.0, 3.0, 0.0)));
            parts.push(leaves(Primitive::Sphere { radius: 1.0 }, Vec3::new(0.8, 3.6, 0.3)));
            parts.push(leaves(Primitive::Sphere { radius: 0.9 }, Vec3::new(-0.7, 3.5, -0.4)));
        }
        Canopy::Conical => {
            parts.push(ObjectSpec::mesh(cylinder(0.2, 0.3, 1.5), trunk_color).at(Vec3::new(0.0, 0.75, 0.0)));
            for (i, (radius, height)) in [(1.6, 2.2), (1.25, 1.9), (0.85, 1.6)].into_iter().enumerate() {
                let y = 2.2 + i as f32 * 1.0;
                parts.push(leaves(Primitive::Cone { radius, height }, Vec3::new(0.0, y, 0.0)));
            }
        }
        Canopy::Slender => {
            parts.push(ObjectSpec::mesh(cylinder(0.15, 0.2, 3.2), trunk_color).at(Vec3::new(0.0, 1.6, 0.0)));
            parts.push(
                leaves(Primitive::Sphere { radius: 1.0 }, Vec3::new(0.0, 3.8, 0.0))
                    .stretched(Vec3::new(1.0, 1.6, 1.0)),
            );
        }
        Canopy::Palm => {
            parts.push(ObjectSpec::mesh(cylinder(0.15, 0.25, 4.0), trunk_color).at(Vec3::new(0.0, 2.0, 0.0)));
            for i in 0..5 {
                let angle = i as f32 * TAU / 5.0;
                let frond = ObjectSpec::mesh(cuboid(2.4, 0.08, 0.6), leaf)
                    .at(Vec3::new(angle.cos() * 1.1, 4.0, angle.sin() * 1.1))
                    .rotated_y(-angle);
                parts.push(frond);
            }
        }
        Canopy::Weeping => {
            parts.push(ObjectSpec::mesh(cylinder(0.25, 0.4, 2.2), trunk_color).at(Vec3::new(0.0, 1.1, 0.0)));
            parts.push(
                leaves(Primitive::Sphere { radius: 1.8 }, Vec3::new(0.0, 3.0, 0.0))
                    .stretched(Vec3::new(1.2, 0.8, 1.2)),
            );
            for i in 0..6 {
                let angle = i as f32 * TAU / 6.0;
                parts.push(leaves(
                    cylinder(0.05, 0.25, 2.0),
                    Vec3::new(angle.cos() * 1.7, 2.0, angle.sin() * 1.7),
                ));
            }
        }
    }
    ObjectSpec::group(parts)
}

const ROCK_COLORS: &[&str] = &["#757575", "#8d8d8d", "#616161", "#795548"];

pub fn rock(size: f32, rng: &mut impl Rng) -> ObjectSpec {
    let color = hex(ROCK_COLORS[rng.gen_range(0..ROCK_COLORS.len())]);
    let main = ObjectSpec::mesh(Primitive::Sphere { radius: size * 0.5 }, color)
        .stretched(Vec3::new(1.0, 0.6, 0.9))
        .at(Vec3::new(0.0, size * 0.25, 0.0))
        .rotated_y(rng.gen_range(0.0..TAU));
    let chip = ObjectSpec::mesh(Primitive::Sphere { radius: size * 0.25 }, color)
        .at(Vec3::new(size * 0.45, size * 0.1, size * 0.2));
    ObjectSpec::group(vec![main, chip])
}

pub const PLATFORM_GLOW_COLOR: &str = "#80deea";

/// Stone disc with a glowing rim; `update` pulses the rim emissive.
pub fn platform(size: f32) -> ObjectSpec {
    let base = ObjectSpec::mesh(cylinder(size, size * 1.05, 0.6), hex("#90a4ae")).at(Vec3::new(0.0, 0.3, 0.0));
    let rim = ObjectSpec::mesh(cylinder(size * 1.08, size * 1.08, 0.12), hex(PLATFORM_GLOW_COLOR))
        .with_emissive(1.0)
        .with_opacity(0.85)
        .at(Vec3::new(0.0, 0.62, 0.0));
    ObjectSpec::group(vec![base, rim])
}

/// Grass-topped rock floating in the air, with an occasional tree on top.
pub fn floating_island(size: f32, rng: &mut impl Rng) -> ObjectSpec {
    let mut underside = ObjectSpec::mesh(
        Primitive::Cone {
            radius: size,
            height: size * 1.4,
        },
        hex("#6d4c41"),
    )
    .at(Vec3::new(0.0, -size * 0.7, 0.0));
    underside.transform_mut().rotate_x(PI);
    let top = ObjectSpec::mesh(cylinder(size, size, 0.5), hex("#66bb6a")).at(Vec3::new(0.0, 0.25, 0.0));
    let mut parts = vec![underside, top];
    if rng.gen_bool(0.5) {
        let profile = &TREE_PROFILES[0];
        let leaf = pick_leaf_color(profile, rng);
        parts.push(tree(profile, leaf).scaled(size * 0.25).at(Vec3::new(0.0, 0.5, 0.0)));
    }
    ObjectSpec::group(parts)
}

/// A puff of overlapping translucent spheres.
pub fn cloud(size: f32, rng: &mut impl Rng) -> ObjectSpec {
    let puffs = rng.gen_range(3..=5);
    let parts = (0..puffs)
        .map(|i| {
            let radius = size * rng.gen_range(0.35..0.6);
            let x = (i as f32 - (puffs - 1) as f32 / 2.0) * size * 0.45;
            let y = rng.gen_range(-0.15..0.2) * size;
            let z = rng.gen_range(-0.2..0.2) * size;
            ObjectSpec::mesh(Primitive::Sphere { radius }, Color::WHITE)
                .with_opacity(0.9)
                .at(Vec3::new(x, y, z))
        })
        .collect();
    ObjectSpec::group(parts)
}

/// Box dimensions and color of a placeholder building type.
#[derive(Clone, Copy, Debug)]
pub struct BuildingProfile {
    pub name: &'static str,
    pub width: f32,
    pub height: f32,
    pub depth: f32,
    pub color: &'static str,
}

pub const DEFAULT_BUILDING_PROFILE: BuildingProfile = BuildingProfile {
    name: "default",
    width: 8.0,
    height: 8.0,
    depth: 8.0,
    color: "#9e9e9e",
};

pub const BUILDING_PROFILES: &[BuildingProfile] = &[
    BuildingProfile {
        name: "house",
        width: 8.0,
        height: 6.0,
        depth: 8.0,
        color: "#d7ccc8",
    },
    BuildingProfile {
        name: "castle",
        width: 16.0,
        height: 14.0,
        depth: 16.0,
        color: "#8d8d8d",
    },
    BuildingProfile {
        name: "tower",
        width: 5.0,
        height: 20.0,
        depth: 5.0,
        color: "#b0bec5",
    },
    BuildingProfile {
        name: "skyscraper",
        width: 7.0,
        height: 30.0,
        depth: 7.0,
        color: "#78909c",
    },
    BuildingProfile {
        name: "temple",
        width: 12.0,
        height: 9.0,
        depth: 10.0,
        color: "#fff8e1",
    },
    BuildingProfile {
        name: "cottage",
        width: 6.0,
        height: 5.0,
        depth: 6.0,
        color: "#bcaaa4",
    },
];

pub fn building_profile(name: &str) -> Option<&'static BuildingProfile> {
    let wanted = name.trim().to_ascii_lowercase();
    BUILDING_PROFILES.iter().find(|profile| profile.name == wanted)
}

pub fn placeholder_building(profile: &BuildingProfile) -> ObjectSpec {
    ObjectSpec::group(vec![ObjectSpec::mesh(
        cuboid(profile.width, profile.height, profile.depth),
        hex(profile.color),
    )
    .at(Vec3::new(0.0, profile.height / 2.0, 0.0))])
}

/// Target footprint for a generated skyscraper.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SkyscraperEnvelope {
    pub width: f32,
    pub height: f32,
    pub depth: f32,
}

impl SkyscraperEnvelope {
    pub const HEIGHT: (f32, f32) = (20.0, 30.0);
    pub const WIDTH: (f32, f32) = (5.0, 8.0);
    pub const VARIANCE: f32 = 0.1;

    /// Height 20-30, width/depth 5-8, each with up to 10% extra variance.
    pub fn random(rng: &mut impl Rng) -> Self {
        let mut vary = |(lo, hi): (f32, f32)| {
            let base = rng.gen_range(lo..hi);
            base * (1.0 + rng.gen_range(-Self::VARIANCE..Self::VARIANCE))
        };
        Self {
            height: vary(Self::HEIGHT),
            width: vary(Self::WIDTH),
            depth: vary(Self::WIDTH),
        }
    }
}

const WINDOW_COLOR: &str = "#fff59d";
const MAX_WINDOW_ROWS: usize = 10;

/// Tapered box-on-box tower with lit window panels on its front and back
/// faces, sized to `envelope`.
pub fn fallback_skyscraper(envelope: &SkyscraperEnvelope, rng: &mut impl Rng) -> ObjectSpec {
    let shades = ["#607d8b", "#78909c", "#546e7a", "#90a4ae"];
    let body_color = hex(shades[rng.gen_range(0..shades.len())]);
    let base_height = envelope.height * 0.65;
    let top_height = envelope.height - base_height;

    let mut parts = vec![
        ObjectSpec::mesh(cuboid(envelope.width, base_height, envelope.depth), body_color)
            .at(Vec3::new(0.0, base_height / 2.0, 0.0)),
        ObjectSpec::mesh(
            cuboid(envelope.width * 0.7, top_height, envelope.depth * 0.7),
            body_color,
        )
        .at(Vec3::new(0.0, base_height + top_height / 2.0, 0.0)),
    ];

    let window = hex(WINDOW_COLOR);
    let rows = ((base_height / 3.0) as usize).clamp(1, MAX_WINDOW_ROWS);
    let columns = 3;
    let spacing_y = base_height / (rows as f32 + 1.0);
    let spacing_x = envelope.width / (columns as f32 + 1.0);
    for row in 0..rows {
        for column in 0..columns {
            if !rng.gen_bool(0.7) {
                continue;
            }
            let x = -envelope.width / 2.0 + spacing_x * (column as f32 + 1.0);
            let y = spacing_y * (row as f32 + 1.0);
            for side in [1.0, -1.0] {
                parts.push(
                    ObjectSpec::mesh(cuboid(spacing_x * 0.5, spacing_y * 0.45, 0.1), window)
                        .with_emissive(0.6)
                        .at(Vec3::new(x, y, side * (envelope.depth / 2.0 + 0.05))),
                );
            }
        }
    }
    ObjectSpec::group(parts)
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BuildingArchetype {
    SimpleBox,
    TaperedTower,
    CrystalTopped,
}

impl BuildingArchetype {
    /// Unknown names resolve to `SimpleBox`.
    pub fn from_name(name: Option<&str>) -> Self {
        let lowered = name.unwrap_or_default().trim().to_ascii_lowercase();
        if lowered.contains("crystal") || lowered.contains("spire") {
            Self::CrystalTopped
        } else if lowered.contains("tower") || lowered.contains("skyscraper") || lowered.contains("taper") {
            Self::TaperedTower
        } else {
            Self::SimpleBox
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::SimpleBox => "simple_box",
            Self::TaperedTower => "tapered_tower",
            Self::CrystalTopped => "crystal_topped",
        }
    }
}

pub fn archetype(kind: BuildingArchetype, scheme: &ColorScheme, rng: &mut impl Rng) -> ObjectSpec {
    let primary = scheme.primary();
    let secondary = scheme.secondary();
    let accent = scheme.accent();
    match kind {
        BuildingArchetype::SimpleBox => {
            let height = rng.gen_range(8.0..12.0);
            ObjectSpec::group(vec![
                ObjectSpec::mesh(cuboid(6.0, height, 6.0), primary).at(Vec3::new(0.0, height / 2.0, 0.0)),
                ObjectSpec::mesh(cuboid(6.6, 0.6, 6.6), secondary).at(Vec3::new(0.0, height + 0.3, 0.0)),
                ObjectSpec::mesh(cuboid(1.6, 2.4, 0.1), accent)
                    .with_emissive(0.3)
                    .at(Vec3::new(0.0, 1.2, 3.05)),
            ])
        }
        BuildingArchetype::TaperedTower => {
            let mut parts = Vec::new();
            let mut y = 0.0;
            for (i, (width, height)) in [(7.0, 8.0), (5.5, 7.0), (4.0, 6.0)].into_iter().enumerate() {
                let color = if i % 2 == 0 { primary } else { secondary };
                parts.push(ObjectSpec::mesh(cuboid(width, height, width), color).at(Vec3::new(0.0, y + height / 2.0, 0.0)));
                y += height;
            }
            parts.push(
                ObjectSpec::mesh(Primitive::Cone { radius: 1.2, height: 4.0 }, accent)
                    .with_emissive(0.5)
                    .at(Vec3::new(0.0, y + 2.0, 0.0)),
            );
            ObjectSpec::group(parts)
        }
        BuildingArchetype::CrystalTopped => {
            let mut parts = vec![
                ObjectSpec::mesh(cylinder(3.0, 3.5, 6.0), secondary).at(Vec3::new(0.0, 3.0, 0.0)),
                ObjectSpec::mesh(Primitive::Cone { radius: 2.2, height: 9.0 }, accent)
                    .with_emissive(0.9)
                    .with_opacity(0.85)
                    .at(Vec3::new(0.0, 10.5, 0.0)),
            ];
            let shards = rng.gen_range(3..=5);
            for i in 0..shards {
                let angle = i as f32 * TAU / shards as f32;
                parts.push(
                    ObjectSpec::mesh(Primitive::Cone { radius: 0.6, height: 3.0 }, primary)
                        .with_emissive(0.6)
                        .with_opacity(0.85)
                        .at(Vec3::new(angle.cos() * 2.4, 7.5, angle.sin() * 2.4)),
                );
            }
            ObjectSpec::group(parts)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::DEFAULT_SCHEME;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn fallback_skyscraper_fills_envelope() {
        let mut rng = SmallRng::seed_from_u64(3);
        let envelope = SkyscraperEnvelope {
            width: 6.0,
            height: 24.0,
            depth: 6.0,
        };
        let tower = fallback_skyscraper(&envelope, &mut rng);
        let bounds = tower.bounds().unwrap();
        assert!(bounds.min.y.abs() < 1e-4);
        assert!((bounds.max.y - 24.0).abs() < 1e-3);
        assert!(tower.mesh_count() > 2, "windows are placed");
    }

    #[test]
    fn envelope_stays_within_variance() {
        let mut rng = SmallRng::seed_from_u64(9);
        for _ in 0..200 {
            let e = SkyscraperEnvelope::random(&mut rng);
            assert!(e.height >= 18.0 && e.height <= 33.0);
            assert!(e.width >= 4.5 && e.width <= 8.8);
        }
    }

    #[test]
    fn archetypes_stand_on_origin() {
        let mut rng = SmallRng::seed_from_u64(1);
        for kind in [
            BuildingArchetype::SimpleBox,
            BuildingArchetype::TaperedTower,
            BuildingArchetype::CrystalTopped,
        ] {
            let bounds = archetype(kind, &DEFAULT_SCHEME, &mut rng).bounds().unwrap();
            assert!(bounds.min.y.abs() < 1e-3, "{kind:?}");
        }
        assert_eq!(BuildingArchetype::from_name(Some("Crystal Spire")), BuildingArchetype::CrystalTopped);
        assert_eq!(BuildingArchetype::from_name(Some("blimp")), BuildingArchetype::SimpleBox);
    }

    #[test]
    fn tree_profiles_resolve_by_name() {
        assert_eq!(tree_profile("Pine").map(|p| p.canopy), Some(Canopy::Conical));
        assert_eq!(tree_profile("cherry tree").map(|p| p.name), Some("cherry"));
        assert!(tree_profile("nonexistent-type").is_none());
    }
}
