//! Shader programs and the parameters they carry.

use crate::paint::Color;
use crate::view::ProjectionMatrix;

/// Every program a ship draws with.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ProgramKind {
    ShipRopes,
    ShipTrianglesColor,
    ShipTrianglesTexture,
    ShipStressedSprings,
    ShipPointsColor,
    ShipGenericTextures,
    ShipVectors,
}

impl ProgramKind {
    pub const COUNT: usize = 7;

    pub const ALL: [ProgramKind; Self::COUNT] = [
        ProgramKind::ShipRopes,
        ProgramKind::ShipTrianglesColor,
        ProgramKind::ShipTrianglesTexture,
        ProgramKind::ShipStressedSprings,
        ProgramKind::ShipPointsColor,
        ProgramKind::ShipGenericTextures,
        ProgramKind::ShipVectors,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Texture slot the program samples from, if any.
    pub const fn texture_slot(self) -> Option<TextureSlot> {
        match self {
            ProgramKind::ShipTrianglesTexture | ProgramKind::ShipStressedSprings => {
                Some(TextureSlot::SharedTexture)
            }
            ProgramKind::ShipGenericTextures => Some(TextureSlot::TextureAtlas),
            _ => None,
        }
    }
}

/// Texture units programs sample from.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TextureSlot {
    SharedTexture,
    TextureAtlas,
}

impl TextureSlot {
    pub const COUNT: usize = 2;

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// A value set on the active program.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ProgramParameter {
    OrthoMatrix(ProjectionMatrix),
    AmbientLightIntensity(f32),
    WaterContrast(f32),
    WaterLevelThreshold(f32),
    MatteColor(Color),
}

/// Parameter values a program holds until they are set again.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ProgramParameters {
    pub ortho_matrix: ProjectionMatrix,
    pub ambient_light_intensity: f32,
    pub water_contrast: f32,
    pub water_level_threshold: f32,
    pub matte_color: Color,
}

impl ProgramParameters {
    pub const IDENTITY: ProjectionMatrix = [
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ];

    pub fn apply(&mut self, parameter: ProgramParameter) {
        match parameter {
            ProgramParameter::OrthoMatrix(m) => self.ortho_matrix = m,
            ProgramParameter::AmbientLightIntensity(v) => self.ambient_light_intensity = v,
            ProgramParameter::WaterContrast(v) => self.water_contrast = v,
            ProgramParameter::WaterLevelThreshold(v) => self.water_level_threshold = v,
            ProgramParameter::MatteColor(c) => self.matte_color = c,
        }
    }
}

impl Default for ProgramParameters {
    fn default() -> Self {
        Self {
            ortho_matrix: Self::IDENTITY,
            ambient_light_intensity: 1.0,
            water_contrast: 0.0,
            water_level_threshold: 2.0,
            matte_color: Color::white(),
        }
    }
}
