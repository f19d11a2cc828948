use bevy::prelude::*;
use bevy::render::mesh::VertexAttributeValues;

use crate::components::*;
use crate::ground::{height_at, GroundManager};

const TERRAIN_SIZE: f32 = 140.0;
const TERRAIN_SUBDIVISIONS: u32 = 70;

/// Windowed-only: turns `ShapePart`s into PBR meshes and keeps their
/// materials in step with the component.
pub struct RenderPlugin;

impl Plugin for RenderPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, (spawn_camera_and_light, spawn_terrain))
            .add_systems(Update, (attach_part_meshes, sync_part_materials).chain());
    }
}

fn spawn_camera_and_light(mut commands: Commands) {
    commands.spawn((
        Camera3d::default(),
        Transform::from_xyz(0.0, 45.0, 85.0).looking_at(Vec3::new(0.0, 6.0, 0.0), Vec3::Y),
    ));
    commands.spawn((
        DirectionalLight {
            illuminance: 9_000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(30.0, 60.0, 20.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));
}

fn terrain_mesh() -> Mesh {
    let mut mesh = Plane3d::default()
        .mesh()
        .size(TERRAIN_SIZE, TERRAIN_SIZE)
        .subdivisions(TERRAIN_SUBDIVISIONS)
        .build();
    if let Some(VertexAttributeValues::Float32x3(positions)) = mesh.attribute_mut(Mesh::ATTRIBUTE_POSITION) {
        for p in positions.iter_mut() {
            p[1] = height_at(p[0], p[2]);
        }
    }
    mesh.compute_normals();
    mesh
}

fn spawn_terrain(
    mut commands: Commands,
    ground: Res<GroundManager>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    commands.spawn((
        GroundSurface,
        Mesh3d(meshes.add(terrain_mesh())),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: ground.color,
            perceptual_roughness: 0.95,
            ..default()
        })),
        Transform::default(),
    ));
}

fn mesh_for(primitive: &Primitive) -> Mesh {
    match *primitive {
        Primitive::Cuboid { width, height, depth } => Cuboid::new(width, height, depth).into(),
        Primitive::Cylinder {
            radius_top,
            radius_bottom,
            height,
        } if (radius_top - radius_bottom).abs() < f32::EPSILON => Cylinder::new(radius_top, height).into(),
        Primitive::Cylinder {
            radius_top,
            radius_bottom,
            height,
        } => ConicalFrustum {
            radius_top,
            radius_bottom,
            height,
        }
        .into(),
        Primitive::Cone { radius, height } => Cone { radius, height }.into(),
        Primitive::Sphere { radius } => Sphere::new(radius).mesh().uv(24, 16),
    }
}

fn apply_part(material: &mut StandardMaterial, part: &ShapePart) {
    let opacity = part.opacity.clamp(0.0, 1.0);
    material.base_color = part.color.with_alpha(opacity);
    material.alpha_mode = if opacity < 1.0 {
        AlphaMode::Blend
    } else {
        AlphaMode::Opaque
    };
    material.emissive = part.color.to_linear() * part.emissive.max(0.0);
}

fn attach_part_meshes(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    parts: Query<(Entity, &ShapePart), Added<ShapePart>>,
) {
    for (entity, part) in parts.iter() {
        let mut material = StandardMaterial::default();
        apply_part(&mut material, part);
        commands.entity(entity).insert((
            Mesh3d(meshes.add(mesh_for(&part.primitive))),
            MeshMaterial3d(materials.add(material)),
        ));
    }
}

fn sync_part_materials(
    parts: Query<(&ShapePart, &MeshMaterial3d<StandardMaterial>), Changed<ShapePart>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    for (part, handle) in parts.iter() {
        if let Some(material) = materials.get_mut(&handle.0) {
            apply_part(material, part);
        }
    }
}
