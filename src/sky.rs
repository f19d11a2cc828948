use bevy::prelude::*;

use crate::components::HeadlessMode;
use crate::palette::{color_to_hex, parse_color};

pub const DEFAULT_SKY_COLOR: &str = "#87CEEB";
pub const DEFAULT_AMBIENT_COLOR: &str = "#ffffff";

pub struct SkyPlugin;

impl Plugin for SkyPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(SkyManager::default())
            .add_systems(Update, sync_sky);
    }
}

#[derive(Resource, Clone)]
pub struct SkyManager {
    pub sky_color: Color,
    pub ambient_color: Color,
    pub ambient_intensity: f32,
}

impl Default for SkyManager {
    fn default() -> Self {
        Self {
            sky_color: parse_color(DEFAULT_SKY_COLOR).unwrap_or(Color::srgb(0.53, 0.81, 0.92)),
            ambient_color: Color::WHITE,
            ambient_intensity: 400.0,
        }
    }
}

impl SkyManager {
    pub fn set_sky_color(&mut self, value: &str) -> Result<(), String> {
        let color = parse_color(value).ok_or_else(|| format!("Invalid sky color: {value}"))?;
        self.sky_color = color;
        info!("[Sylvan sky] Sky color set to {}", color_to_hex(color));
        Ok(())
    }

    pub fn set_ambient_light(&mut self, value: &str, intensity: Option<f32>) -> Result<(), String> {
        let color =
            parse_color(value).ok_or_else(|| format!("Invalid ambient light color: {value}"))?;
        self.ambient_color = color;
        if let Some(intensity) = intensity.filter(|i| i.is_finite() && *i >= 0.0) {
            self.ambient_intensity = intensity;
        }
        info!("[Sylvan sky] Ambient light set to {}", color_to_hex(color));
        Ok(())
    }
}

fn sync_sky(
    headless: Res<HeadlessMode>,
    sky: Res<SkyManager>,
    clear_color: Option<ResMut<ClearColor>>,
    ambient: Option<ResMut<AmbientLight>>,
) {
    if headless.0 || !sky.is_changed() {
        return;
    }
    if let Some(mut clear_color) = clear_color {
        clear_color.0 = sky.sky_color;
    }
    if let Some(mut ambient) = ambient {
        ambient.color = sky.ambient_color;
        ambient.brightness = sky.ambient_intensity;
    }
}
