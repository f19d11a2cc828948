use bevy::prelude::*;

use crate::components::GroundSurface;
use crate::palette::{color_to_hex, parse_color};

pub const DEFAULT_GROUND_COLOR: &str = "#4CAF50";

pub struct GroundPlugin;

impl Plugin for GroundPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(GroundManager::default())
            .add_systems(Update, sync_ground_material);
    }
}

/// Terrain height at `(x, z)`. Pure and deterministic so spawned entities
/// land on the same surface the renderer draws.
pub fn height_at(x: f32, z: f32) -> f32 {
    let hills = (x * 0.05).sin() * (z * 0.05).cos() * 2.0;
    let ripples = (x * 0.13 + z * 0.07).sin() * 0.8;
    let valley = -((x * x + z * z).sqrt() * 0.02).min(1.0) * 0.5;
    hills + ripples + valley
}

#[derive(Resource, Clone)]
pub struct GroundManager {
    pub color: Color,
}

impl Default for GroundManager {
    fn default() -> Self {
        Self {
            color: parse_color(DEFAULT_GROUND_COLOR).unwrap_or(Color::srgb(0.3, 0.69, 0.31)),
        }
    }
}

impl GroundManager {
    pub fn set_color(&mut self, value: &str) -> Result<(), String> {
        let color = parse_color(value).ok_or_else(|| format!("Invalid ground color: {value}"))?;
        self.color = color;
        info!("[Sylvan ground] Ground color set to {}", color_to_hex(color));
        Ok(())
    }

    pub fn color_hex(&self) -> String {
        color_to_hex(self.color)
    }
}

fn sync_ground_material(
    ground: Res<GroundManager>,
    surfaces: Query<&MeshMaterial3d<StandardMaterial>, With<GroundSurface>>,
    materials: Option<ResMut<Assets<StandardMaterial>>>,
) {
    if !ground.is_changed() {
        return;
    }
    let Some(mut materials) = materials else {
        return;
    };
    for handle in surfaces.iter() {
        if let Some(material) = materials.get_mut(&handle.0) {
            material.base_color = ground.color;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn height_is_deterministic_and_bounded() {
        for (x, z) in [(0.0, 0.0), (12.5, -40.0), (-39.0, 39.0)] {
            let h = height_at(x, z);
            assert_eq!(h, height_at(x, z));
            assert!(h.abs() < 4.0);
        }
    }

    #[test]
    fn rejects_unparseable_color() {
        let mut ground = GroundManager::default();
        assert!(ground.set_color("mud-ish").is_err());
        assert_eq!(ground.color_hex(), "#4caf50");
        ground.set_color("#000000").unwrap();
        assert_eq!(ground.color_hex(), "#000000");
    }
}
