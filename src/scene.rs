use bevy::prelude::*;

use crate::components::{EntityHandle, Primitive, SceneNode, ShapePart};

/// Declarative description of a renderable object. Builders and the
/// snippet evaluator both produce these; `attach` turns one into a
/// container entity with child parts.
#[derive(Clone, Debug, PartialEq)]
pub enum ObjectSpec {
    Mesh(MeshSpec),
    Group(GroupSpec),
}

#[derive(Clone, Debug, PartialEq)]
pub struct MeshSpec {
    pub primitive: Primitive,
    pub color: Color,
    pub emissive: f32,
    pub opacity: f32,
    pub transform: Transform,
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct GroupSpec {
    pub children: Vec<ObjectSpec>,
    pub transform: Transform,
}

/// Axis-aligned bounds in the frame an object is attached in.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    fn include(bounds: &mut Option<Bounds>, point: Vec3) {
        match bounds {
            Some(b) => {
                b.min = b.min.min(point);
                b.max = b.max.max(point);
            }
            None => {
                *bounds = Some(Bounds {
                    min: point,
                    max: point,
                })
            }
        }
    }
}

impl ObjectSpec {
    pub fn mesh(primitive: Primitive, color: Color) -> Self {
        ObjectSpec::Mesh(MeshSpec {
            primitive,
            color,
            emissive: 0.0,
            opacity: 1.0,
            transform: Transform::IDENTITY,
        })
    }

    pub fn group(children: Vec<ObjectSpec>) -> Self {
        ObjectSpec::Group(GroupSpec {
            children,
            transform: Transform::IDENTITY,
        })
    }

    pub fn transform(&self) -> &Transform {
        match self {
            ObjectSpec::Mesh(mesh) => &mesh.transform,
            ObjectSpec::Group(group) => &group.transform,
        }
    }

    pub fn transform_mut(&mut self) -> &mut Transform {
        match self {
            ObjectSpec::Mesh(mesh) => &mut mesh.transform,
            ObjectSpec::Group(group) => &mut group.transform,
        }
    }

    pub fn at(mut self, translation: Vec3) -> Self {
        self.transform_mut().translation = translation;
        self
    }

    pub fn scaled(mut self, factor: f32) -> Self {
        self.transform_mut().scale *= factor;
        self
    }

    pub fn stretched(mut self, scale: Vec3) -> Self {
        self.transform_mut().scale *= scale;
        self
    }

    pub fn rotated_y(mut self, angle: f32) -> Self {
        self.transform_mut().rotate_y(angle);
        self
    }

    pub fn with_emissive(mut self, emissive: f32) -> Self {
        self.for_each_mesh(&mut |mesh| mesh.emissive = emissive);
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.for_each_mesh(&mut |mesh| mesh.opacity = opacity);
        self
    }

    /// Recolors every mesh in the object.
    pub fn tint(&mut self, color: Color) {
        self.for_each_mesh(&mut |mesh| mesh.color = color);
    }

    /// Appends a child. Only groups accept children.
    pub fn push(&mut self, child: ObjectSpec) -> bool {
        match self {
            ObjectSpec::Group(group) => {
                group.children.push(child);
                true
            }
            ObjectSpec::Mesh(_) => false,
        }
    }

    pub fn mesh_count(&self) -> usize {
        match self {
            ObjectSpec::Mesh(_) => 1,
            ObjectSpec::Group(group) => group.children.iter().map(ObjectSpec::mesh_count).sum(),
        }
    }

    /// A renderable object holds at least one mesh.
    pub fn is_renderable(&self) -> bool {
        self.mesh_count() > 0
    }

    /// Bounds of the object in its parent frame (own transform applied).
    pub fn bounds(&self) -> Option<Bounds> {
        let mut bounds = None;
        self.accumulate_bounds(&Transform::IDENTITY, &mut bounds);
        bounds
    }

    fn accumulate_bounds(&self, parent: &Transform, bounds: &mut Option<Bounds>) {
        let local = parent.mul_transform(*self.transform());
        match self {
            ObjectSpec::Mesh(mesh) => {
                let h = mesh.primitive.half_extents();
                for sx in [-1.0, 1.0] {
                    for sy in [-1.0, 1.0] {
                        for sz in [-1.0, 1.0] {
                            let corner = Vec3::new(h.x * sx, h.y * sy, h.z * sz);
                            Bounds::include(bounds, local.transform_point(corner));
                        }
                    }
                }
            }
            ObjectSpec::Group(group) => {
                for child in &group.children {
                    child.accumulate_bounds(&local, bounds);
                }
            }
        }
    }

    fn for_each_mesh(&mut self, f: &mut dyn FnMut(&mut MeshSpec)) {
        match self {
            ObjectSpec::Mesh(mesh) => f(mesh),
            ObjectSpec::Group(group) => {
                for child in &mut group.children {
                    child.for_each_mesh(f);
                }
            }
        }
    }
}

/// Spawns a container for `handle` at `root` with the object's parts as
/// descendants. Returns the container entity.
pub fn attach(world: &mut World, handle: EntityHandle, spec: &ObjectSpec, root: Transform) -> Entity {
    let mut container = world.spawn((SceneNode { handle }, root, Visibility::default()));
    container.with_children(|parent| spawn_spec(parent, spec));
    container.id()
}

fn spawn_spec(parent: &mut WorldChildBuilder, spec: &ObjectSpec) {
    match spec {
        ObjectSpec::Mesh(mesh) => {
            parent.spawn((
                ShapePart {
                    primitive: mesh.primitive,
                    color: mesh.color,
                    opacity: mesh.opacity,
                    emissive: mesh.emissive,
                },
                mesh.transform,
                Visibility::default(),
            ));
        }
        ObjectSpec::Group(group) => {
            parent
                .spawn((group.transform, Visibility::default()))
                .with_children(|nested| {
                    for child in &group.children {
                        spawn_spec(nested, child);
                    }
                });
        }
    }
}

/// Removes a container and its parts. Detaching a missing entity is a no-op.
pub fn detach(world: &mut World, entity: Entity) -> bool {
    if !world.entities().contains(entity) {
        return false;
    }
    world.entity_mut(entity).despawn_recursive();
    true
}

pub fn is_attached(world: &World, entity: Entity) -> bool {
    world.get::<SceneNode>(entity).is_some()
}

/// Applies `f` to the root transform if the entity still exists.
pub fn with_root_transform(world: &mut World, entity: Entity, f: impl FnOnce(&mut Transform)) -> bool {
    match world.get_mut::<Transform>(entity) {
        Some(mut transform) => {
            f(&mut transform);
            true
        }
        None => false,
    }
}

/// Applies `f` to every part below `root`.
pub fn for_each_part(world: &mut World, root: Entity, mut f: impl FnMut(&mut ShapePart)) {
    let mut stack = vec![root];
    while let Some(entity) = stack.pop() {
        if let Some(children) = world.get::<Children>(entity) {
            stack.extend(children.iter().copied());
        }
        if let Some(mut part) = world.get_mut::<ShapePart>(entity) {
            f(&mut part);
        }
    }
}

pub fn set_opacity(world: &mut World, root: Entity, opacity: f32) {
    let opacity = opacity.clamp(0.0, 1.0);
    for_each_part(world, root, |part| part.opacity = opacity);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::EntityKind;

    fn handle() -> EntityHandle {
        EntityHandle {
            kind: EntityKind::Tree,
            index: 1,
        }
    }

    #[test]
    fn bounds_follow_nested_transforms() {
        let tower = ObjectSpec::group(vec![
            ObjectSpec::mesh(
                Primitive::Cuboid {
                    width: 2.0,
                    height: 10.0,
                    depth: 2.0,
                },
                Color::WHITE,
            )
            .at(Vec3::new(0.0, 5.0, 0.0)),
        ])
        .scaled(2.0);
        let bounds = tower.bounds().expect("bounds");
        assert!((bounds.min.y - 0.0).abs() < 1e-4);
        assert!((bounds.max.y - 20.0).abs() < 1e-4);
        assert!((bounds.size().x - 4.0).abs() < 1e-4);
    }

    #[test]
    fn empty_group_is_not_renderable() {
        let empty = ObjectSpec::group(Vec::new());
        assert!(!empty.is_renderable());
        assert!(empty.bounds().is_none());
    }

    #[test]
    fn attach_then_detach_removes_all_parts() {
        let mut world = World::new();
        let spec = ObjectSpec::group(vec![
            ObjectSpec::mesh(Primitive::Sphere { radius: 1.0 }, Color::WHITE),
            ObjectSpec::group(vec![ObjectSpec::mesh(
                Primitive::Cone {
                    radius: 1.0,
                    height: 2.0,
                },
                Color::BLACK,
            )]),
        ]);
        let root = attach(&mut world, handle(), &spec, Transform::IDENTITY);
        let mut parts = 0;
        for_each_part(&mut world, root, |_| parts += 1);
        assert_eq!(parts, 2);

        set_opacity(&mut world, root, 0.25);
        let mut opacities = Vec::new();
        for_each_part(&mut world, root, |part| opacities.push(part.opacity));
        assert!(opacities.iter().all(|o| (*o - 0.25).abs() < 1e-6));

        assert!(detach(&mut world, root));
        assert!(!is_attached(&world, root));
        assert_eq!(world.query::<&ShapePart>().iter(&world).count(), 0);
        assert!(!detach(&mut world, root));
    }
}
