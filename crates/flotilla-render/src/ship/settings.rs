use super::modes::RenderModes;

/// Initial modes and lighting for a new ship context.
#[derive(Debug, Clone, PartialEq)]
pub struct ShipRenderSettings {
    pub modes: RenderModes,

    /// `0.0` (night) to `1.0` (full daylight).
    pub ambient_light_intensity: f32,

    /// How strongly submerged points are tinted, `0.0..=1.0`.
    pub water_contrast: f32,

    /// `0.0..=1.0`; higher values show smaller amounts of water.
    pub water_level_of_detail: f32,
}

impl ShipRenderSettings {
    /// Maps the level of detail to the water amount at which tinting starts.
    ///
    /// `0.0 -> 2.0`, `1.0 -> 0.01`.
    pub fn water_level_threshold(water_level_of_detail: f32) -> f32 {
        2.0 + water_level_of_detail * (-2.0 + 0.01)
    }
}

impl Default for ShipRenderSettings {
    fn default() -> Self {
        Self {
            modes: RenderModes::default(),
            ambient_light_intensity: 1.0,
            water_contrast: 0.71875,
            water_level_of_detail: 0.6875,
        }
    }
}
