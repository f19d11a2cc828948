use bevy::prelude::*;

const NAMED_COLORS: &[(&str, &str)] = &[
    ("black", "#000000"),
    ("white", "#ffffff"),
    ("red", "#e53935"),
    ("green", "#4caf50"),
    ("blue", "#1e88e5"),
    ("yellow", "#fdd835"),
    ("orange", "#fb8c00"),
    ("purple", "#8e24aa"),
    ("pink", "#f48fb1"),
    ("brown", "#795548"),
    ("gray", "#9e9e9e"),
    ("grey", "#9e9e9e"),
    ("gold", "#ffd700"),
    ("silver", "#c0c0c0"),
    ("cyan", "#00bcd4"),
    ("teal", "#009688"),
    ("navy", "#0d1b4c"),
    ("skyblue", "#87ceeb"),
    ("lightblue", "#add8e6"),
    ("darkgreen", "#1b5e20"),
    ("lavender", "#e6e6fa"),
    ("crimson", "#dc143c"),
];

/// Parses `#rrggbb`, `#rgb`, `0xrrggbb` or a known color name.
pub fn parse_color(value: &str) -> Option<Color> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lowered = trimmed.to_ascii_lowercase().replace([' ', '_', '-'], "");
    if let Some((_, hex)) = NAMED_COLORS.iter().find(|(name, _)| *name == lowered) {
        return Srgba::hex(hex).ok().map(Color::from);
    }
    let hex = lowered.strip_prefix("0x").unwrap_or(&lowered);
    Srgba::hex(hex).ok().map(Color::from)
}

/// Packed `0xRRGGBB` integer form, as produced by script snippets.
pub fn color_from_rgb_u32(rgb: u32) -> Color {
    Color::srgb_u8(
        ((rgb >> 16) & 0xff) as u8,
        ((rgb >> 8) & 0xff) as u8,
        (rgb & 0xff) as u8,
    )
}

pub fn color_to_hex(color: Color) -> String {
    let c = color.to_srgba();
    let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    format!(
        "#{:02x}{:02x}{:02x}",
        channel(c.red),
        channel(c.green),
        channel(c.blue)
    )
}

/// Fixed-size palette chosen by scheme name.
#[derive(Clone, Copy, Debug)]
pub struct ColorScheme {
    pub name: &'static str,
    primary: &'static str,
    secondary: &'static str,
    accent: &'static str,
}

impl ColorScheme {
    pub fn primary(&self) -> Color {
        hex_or_white(self.primary)
    }

    pub fn secondary(&self) -> Color {
        hex_or_white(self.secondary)
    }

    pub fn accent(&self) -> Color {
        hex_or_white(self.accent)
    }
}

fn hex_or_white(hex: &str) -> Color {
    Srgba::hex(hex).map(Color::from).unwrap_or(Color::WHITE)
}

pub const DEFAULT_SCHEME: ColorScheme = ColorScheme {
    name: "modern",
    primary: "#9ea7b0",
    secondary: "#455a64",
    accent: "#81d4fa",
};

pub const COLOR_SCHEMES: &[ColorScheme] = &[
    DEFAULT_SCHEME,
    ColorScheme {
        name: "futuristic",
        primary: "#cfd8dc",
        secondary: "#263238",
        accent: "#00e5ff",
    },
    ColorScheme {
        name: "fantasy",
        primary: "#7e57c2",
        secondary: "#ffd54f",
        accent: "#f48fb1",
    },
    ColorScheme {
        name: "crystal",
        primary: "#b3e5fc",
        secondary: "#e1f5fe",
        accent: "#ea80fc",
    },
    ColorScheme {
        name: "sunset",
        primary: "#ff8a65",
        secondary: "#6d4c41",
        accent: "#ffd180",
    },
    ColorScheme {
        name: "forest",
        primary: "#558b2f",
        secondary: "#5d4037",
        accent: "#c5e1a5",
    },
];

/// Resolves a scheme by name; unknown names get the default scheme.
pub fn color_scheme(name: Option<&str>) -> ColorScheme {
    let Some(name) = name else {
        return DEFAULT_SCHEME;
    };
    let wanted = name.trim().to_ascii_lowercase();
    COLOR_SCHEMES
        .iter()
        .copied()
        .find(|scheme| scheme.name == wanted)
        .unwrap_or(DEFAULT_SCHEME)
}
