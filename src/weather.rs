use bevy::prelude::*;
use serde::Serialize;

use crate::components::{HeadlessMode, Particle, Primitive, ShapePart};

const MAX_WEATHER_PARTICLES: usize = 600;
const SPAWN_HALF_EXTENT: f32 = 45.0;
const SPAWN_HEIGHT: f32 = 40.0;

pub struct WeatherPlugin;

impl Plugin for WeatherPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(WeatherSystem::default())
            .add_systems(Update, tick_weather);
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherEffect {
    #[default]
    Clear,
    Rain,
    Snow,
    Fog,
    Storm,
}

impl WeatherEffect {
    /// Unknown names resolve to `Clear`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "rain" | "rainy" | "drizzle" => Self::Rain,
            "snow" | "snowy" | "blizzard" => Self::Snow,
            "fog" | "foggy" | "mist" | "misty" => Self::Fog,
            "storm" | "stormy" | "thunderstorm" => Self::Storm,
            _ => Self::Clear,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticleEffect {
    #[default]
    None,
    Fireflies,
    Sparkles,
    Magic,
    Leaves,
}

impl ParticleEffect {
    /// `none`/`off` disable particles; other unknown names resolve to `Sparkles`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "none" | "off" | "" => Self::None,
            "fireflies" | "firefly" => Self::Fireflies,
            "magic" | "magical" | "glow" => Self::Magic,
            "leaves" | "falling_leaves" | "autumn" => Self::Leaves,
            _ => Self::Sparkles,
        }
    }
}

/// Active weather and ambient particle effect.
#[derive(Resource, Clone, Copy, Default, Serialize)]
pub struct WeatherSystem {
    pub weather: WeatherEffect,
    pub particles: ParticleEffect,
}

/// Motion state of a live weather particle.
#[derive(Component)]
pub struct WeatherParticle {
    pub velocity: Vec3,
    pub lifetime: f32,
    pub elapsed: f32,
}

struct ParticleStyle {
    color: Color,
    radius: f32,
    velocity: Vec3,
    lifetime: f32,
    emissive: f32,
    per_frame: usize,
}

fn weather_style(effect: WeatherEffect) -> Option<ParticleStyle> {
    match effect {
        WeatherEffect::Clear | WeatherEffect::Fog => None,
        WeatherEffect::Rain => Some(ParticleStyle {
            color: Color::srgba(0.6, 0.7, 0.95, 0.7),
            radius: 0.06,
            velocity: Vec3::new(0.0, -30.0, 0.0),
            lifetime: 1.6,
            emissive: 0.0,
            per_frame: 4,
        }),
        WeatherEffect::Storm => Some(ParticleStyle {
            color: Color::srgba(0.5, 0.55, 0.8, 0.8),
            radius: 0.07,
            velocity: Vec3::new(6.0, -40.0, 0.0),
            lifetime: 1.2,
            emissive: 0.0,
            per_frame: 6,
        }),
        WeatherEffect::Snow => Some(ParticleStyle {
            color: Color::srgba(0.95, 0.95, 1.0, 0.9),
            radius: 0.12,
            velocity: Vec3::new(0.0, -3.0, 0.0),
            lifetime: 12.0,
            emissive: 0.0,
            per_frame: 2,
        }),
    }
}

fn particle_style(effect: ParticleEffect) -> Option<ParticleStyle> {
    let (color, velocity, emissive) = match effect {
        ParticleEffect::None => return None,
        ParticleEffect::Fireflies => (Color::srgb(1.0, 0.95, 0.4), Vec3::new(0.0, 0.3, 0.0), 2.0),
        ParticleEffect::Sparkles => (Color::srgb(1.0, 1.0, 1.0), Vec3::new(0.0, 0.6, 0.0), 1.5),
        ParticleEffect::Magic => (Color::srgb(0.75, 0.45, 1.0), Vec3::new(0.0, 1.2, 0.0), 2.5),
        ParticleEffect::Leaves => (Color::srgb(0.85, 0.5, 0.15), Vec3::new(1.0, -1.5, 0.0), 0.0),
    };
    Some(ParticleStyle {
        color,
        radius: 0.1,
        velocity,
        lifetime: 6.0,
        emissive,
        per_frame: 1,
    })
}

fn tick_weather(
    mut commands: Commands,
    headless: Res<HeadlessMode>,
    time: Res<Time>,
    weather: Res<WeatherSystem>,
    mut particles: Query<(Entity, &mut WeatherParticle, &mut Transform), With<Particle>>,
) {
    if headless.0 {
        return;
    }
    let dt = time.delta_secs();

    let mut live = 0;
    for (entity, mut wp, mut transform) in particles.iter_mut() {
        wp.elapsed += dt;
        if wp.elapsed >= wp.lifetime {
            commands.entity(entity).despawn_recursive();
            continue;
        }
        live += 1;
        transform.translation += wp.velocity * dt;
    }

    let styles = [weather_style(weather.weather), particle_style(weather.particles)];
    for style in styles.into_iter().flatten() {
        for _ in 0..style.per_frame {
            if live >= MAX_WEATHER_PARTICLES {
                return;
            }
            live += 1;
            let x = (rand::random::<f32>() * 2.0 - 1.0) * SPAWN_HALF_EXTENT;
            let z = (rand::random::<f32>() * 2.0 - 1.0) * SPAWN_HALF_EXTENT;
            let ground = crate::ground::height_at(x, z);
            let y = if style.velocity.y >= 0.0 {
                ground + 0.5 + rand::random::<f32>() * 4.0
            } else if style.velocity.y > -5.0 {
                ground + 6.0 + rand::random::<f32>() * 6.0
            } else {
                SPAWN_HEIGHT + rand::random::<f32>() * 5.0
            };
            commands.spawn((
                Particle,
                WeatherParticle {
                    velocity: style.velocity,
                    lifetime: style.lifetime,
                    elapsed: 0.0,
                },
                ShapePart {
                    primitive: Primitive::Sphere {
                        radius: style.radius,
                    },
                    color: style.color,
                    opacity: style.color.alpha(),
                    emissive: style.emissive,
                },
                Transform::from_xyz(x, y, z),
                Visibility::default(),
            ));
        }
    }
}
