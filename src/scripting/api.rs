//! Geometry namespace exposed to snippets.
//!
//! ```text
//! let tower = group();
//! tower.add(mesh(cuboid(6, 24, 6), "#8899aa").at(0, 12, 0));
//! tower.add(mesh(cone(4, 6), 0xffd700, 0.5).at(0, 27, 0));
//! tower
//! ```

use bevy::prelude::*;
use rhai::{Dynamic, Engine, EvalAltResult};

use crate::components::Primitive;
use crate::palette::{color_from_rgb_u32, parse_color};
use crate::scene::ObjectSpec;

use super::MAX_SNIPPET_PARTS;

/// Geometry produced by `cuboid`/`cylinder`/`cone`/`sphere`; not renderable
/// until wrapped by `mesh`.
#[derive(Clone, Copy, Debug)]
pub struct Geometry(pub Primitive);

type FnResult<T> = Result<T, Box<EvalAltResult>>;

const MAX_DIMENSION: f32 = 1000.0;

fn number(value: &Dynamic, what: &str) -> FnResult<f32> {
    let n = if let Ok(f) = value.as_float() {
        f as f32
    } else if let Ok(i) = value.as_int() {
        i as f32
    } else {
        return Err(format!("{what} must be a number, got {}", value.type_name()).into());
    };
    if !n.is_finite() {
        return Err(format!("{what} must be finite").into());
    }
    Ok(n)
}

fn dimension(value: &Dynamic, what: &str) -> FnResult<f32> {
    let n = number(value, what)?;
    if !(0.0..=MAX_DIMENSION).contains(&n) {
        return Err(format!("{what} must be between 0 and {MAX_DIMENSION}, got {n}").into());
    }
    Ok(n)
}

fn color(value: &Dynamic) -> FnResult<Color> {
    if let Ok(rgb) = value.as_int() {
        if (0..=0xff_ffff).contains(&rgb) {
            return Ok(color_from_rgb_u32(rgb as u32));
        }
        return Err(format!("color {rgb:#x} is out of range").into());
    }
    if let Ok(text) = value.clone().into_string() {
        return parse_color(&text).ok_or_else(|| format!("unknown color '{text}'").into());
    }
    Err(format!("color must be a string or integer, got {}", value.type_name()).into())
}

fn cuboid(w: Dynamic, h: Dynamic, d: Dynamic) -> FnResult<Geometry> {
    Ok(Geometry(Primitive::Cuboid {
        width: dimension(&w, "width")?,
        height: dimension(&h, "height")?,
        depth: dimension(&d, "depth")?,
    }))
}

fn cylinder(top: Dynamic, bottom: Dynamic, h: Dynamic) -> FnResult<Geometry> {
    Ok(Geometry(Primitive::Cylinder {
        radius_top: dimension(&top, "top radius")?,
        radius_bottom: dimension(&bottom, "bottom radius")?,
        height: dimension(&h, "height")?,
    }))
}

fn cone(r: Dynamic, h: Dynamic) -> FnResult<Geometry> {
    Ok(Geometry(Primitive::Cone {
        radius: dimension(&r, "radius")?,
        height: dimension(&h, "height")?,
    }))
}

fn sphere(r: Dynamic) -> FnResult<Geometry> {
    Ok(Geometry(Primitive::Sphere {
        radius: dimension(&r, "radius")?,
    }))
}

fn mesh(geometry: Geometry, tint: Dynamic) -> FnResult<ObjectSpec> {
    Ok(ObjectSpec::mesh(geometry.0, color(&tint)?))
}

fn glowing_mesh(geometry: Geometry, tint: Dynamic, emissive: Dynamic) -> FnResult<ObjectSpec> {
    let emissive = number(&emissive, "emissive")?.clamp(0.0, 10.0);
    Ok(ObjectSpec::mesh(geometry.0, color(&tint)?).with_emissive(emissive))
}

fn add_child(target: &mut ObjectSpec, child: ObjectSpec) -> FnResult<()> {
    if target.mesh_count() + child.mesh_count() > MAX_SNIPPET_PARTS {
        return Err(format!("objects are limited to {MAX_SNIPPET_PARTS} meshes").into());
    }
    if target.push(child) {
        Ok(())
    } else {
        Err("add() needs a group; create one with group()".into())
    }
}

fn at(target: &mut ObjectSpec, x: Dynamic, y: Dynamic, z: Dynamic) -> FnResult<ObjectSpec> {
    let translation = Vec3::new(number(&x, "x")?, number(&y, "y")?, number(&z, "z")?);
    target.transform_mut().translation = translation;
    Ok(target.clone())
}

fn scaled(target: &mut ObjectSpec, factor: Dynamic) -> FnResult<ObjectSpec> {
    let factor = number(&factor, "scale")?;
    if factor <= 0.0 {
        return Err("scale must be positive".into());
    }
    target.transform_mut().scale *= factor;
    Ok(target.clone())
}

fn rotated_y(target: &mut ObjectSpec, angle: Dynamic) -> FnResult<ObjectSpec> {
    let angle = number(&angle, "angle")?;
    target.transform_mut().rotate_y(angle);
    Ok(target.clone())
}

fn tinted(target: &mut ObjectSpec, tint: Dynamic) -> FnResult<ObjectSpec> {
    target.tint(color(&tint)?);
    Ok(target.clone())
}

pub fn register_geometry_api(engine: &mut Engine) {
    engine.register_type_with_name::<Geometry>("Geometry");
    engine.register_type_with_name::<ObjectSpec>("Object");
    engine.register_fn("cuboid", cuboid);
    engine.register_fn("cylinder", cylinder);
    engine.register_fn("cone", cone);
    engine.register_fn("sphere", sphere);
    engine.register_fn("mesh", mesh);
    engine.register_fn("mesh", glowing_mesh);
    engine.register_fn("group", || ObjectSpec::group(Vec::new()));
    engine.register_fn("add", add_child);
    engine.register_fn("at", at);
    engine.register_fn("scaled", scaled);
    engine.register_fn("rotated_y", rotated_y);
    engine.register_fn("tinted", tinted);
    engine.register_fn("mesh_count", |target: &mut ObjectSpec| target.mesh_count() as rhai::INT);
}
