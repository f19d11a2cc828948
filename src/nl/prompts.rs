//! System prompts, one per routed request kind.

use super::router::{CodeSubtype, RequestKind};

pub const SIMPLE_PARAMETER_PROMPT: &str = r##"You control a 3D fantasy landscape. Read the user's request and answer with a single JSON object describing the scene changes. Use only these optional fields:

- "sky_color": hex color such as "#87CEEB"
- "ground_color": hex color
- "ambient_light": hex color of the ambient light
- "tree_type": one of "oak", "pine", "cherry", "birch", "palm", "willow", "magic"
- "tree_count": integer between 1 and 50
- "building_type": one of "house", "castle", "tower", "skyscraper", "temple", "cottage"
- "weather_effect": one of "clear", "rain", "snow", "fog", "storm"
- "particle_effect": one of "fireflies", "sparkles", "magic", "leaves", "none"
- "player_color": hex color
- "tree_transform": object with "newObjectType" ("simple_box", "tapered_tower", "crystal_topped"), "scaleFactor" (number), "colorScheme" ("modern", "futuristic", "fantasy", "crystal", "sunset", "forest"), "transitionAnimation" ("grow", "bounce", "spiral") and "particleEffects" (boolean)

Leave out every field the user did not ask for. Respond with JSON only."##;

pub const SKYSCRAPER_PROMPT: &str = r##"You write small Rhai scripts that build a single skyscraper for a 3D scene. The script's last expression must be the finished object.

Available functions:
- cuboid(width, height, depth), cylinder(radius_top, radius_bottom, height), cone(radius, height), sphere(radius)
- mesh(geometry, color) and mesh(geometry, color, emissive); colors are "#rrggbb" strings or 0xRRGGBB integers
- group() creates an empty group; group.add(child) appends a mesh or group
- object.at(x, y, z), object.scaled(s), object.rotated_y(radians), object.tinted(color)

These constants are defined: tree_x, tree_y, tree_z (position of the tree being replaced), target_height and tree_index. Build the skyscraper around the origin with its base at y = 0; it is moved and scaled for you.

Respond with a JSON object: {"codeSnippet": "<script>", "comments": "<one sentence describing the design>"}."##;

pub fn system_prompt(kind: RequestKind) -> &'static str {
    match kind {
        RequestKind::SimpleParameter => SIMPLE_PARAMETER_PROMPT,
        RequestKind::CodeGenerator(CodeSubtype::Skyscraper) => SKYSCRAPER_PROMPT,
    }
}
