use bevy::prelude::*;

use crate::components::{PlayerAvatar, Primitive, ShapePart};
use crate::ground::height_at;
use crate::palette::{color_to_hex, parse_color};

pub struct PlayerPlugin;

impl Plugin for PlayerPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(PlayerManager::default())
            .add_systems(Startup, spawn_player)
            .add_systems(Update, sync_player_color);
    }
}

#[derive(Resource, Clone)]
pub struct PlayerManager {
    pub color: Color,
    pub position: Vec3,
}

impl Default for PlayerManager {
    fn default() -> Self {
        Self {
            color: Color::srgb(0.2, 0.4, 0.9),
            position: Vec3::new(0.0, height_at(0.0, 10.0), 10.0),
        }
    }
}

impl PlayerManager {
    pub fn set_color(&mut self, value: &str) -> Result<(), String> {
        let color = parse_color(value).ok_or_else(|| format!("Invalid player color: {value}"))?;
        self.color = color;
        info!("[Sylvan player] Player color set to {}", color_to_hex(color));
        Ok(())
    }
}

fn spawn_player(mut commands: Commands, player: Res<PlayerManager>) {
    commands
        .spawn((
            PlayerAvatar,
            Transform::from_translation(player.position),
            Visibility::default(),
        ))
        .with_children(|parent| {
            parent.spawn((
                ShapePart {
                    primitive: Primitive::Cylinder {
                        radius_top: 0.35,
                        radius_bottom: 0.45,
                        height: 1.2,
                    },
                    color: player.color,
                    opacity: 1.0,
                    emissive: 0.0,
                },
                Transform::from_xyz(0.0, 0.6, 0.0),
                Visibility::default(),
            ));
            parent.spawn((
                ShapePart {
                    primitive: Primitive::Sphere { radius: 0.35 },
                    color: Color::srgb(0.96, 0.84, 0.7),
                    opacity: 1.0,
                    emissive: 0.0,
                },
                Transform::from_xyz(0.0, 1.5, 0.0),
                Visibility::default(),
            ));
        });
}

/// The body part (a cylinder) follows the player color.
fn sync_player_color(
    player: Res<PlayerManager>,
    avatars: Query<&Children, With<PlayerAvatar>>,
    mut parts: Query<&mut ShapePart>,
) {
    if !player.is_changed() {
        return;
    }
    for children in avatars.iter() {
        for child in children.iter() {
            if let Ok(mut part) = parts.get_mut(*child) {
                if matches!(part.primitive, Primitive::Cylinder { .. }) {
                    part.color = player.color;
                }
            }
        }
    }
}
