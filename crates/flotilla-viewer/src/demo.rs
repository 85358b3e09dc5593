//! Procedural ships for the viewer.
//!
//! Each hull is a grid of points braced by springs and split into triangles,
//! with a mast held by two ropes and a handful of foam particles trailing the
//! stern. Hulls bob on a travelling wave so springs strain and some of them
//! show as stressed.

use anyhow::{Context, Result};
use image::{Rgba, RgbaImage};

use flotilla_render::atlas::{AtlasFrameMetadata, TextureAtlas, TextureFrameId};
use flotilla_render::coords::Vec2;
use flotilla_render::paint::Color;
use flotilla_render::render::RenderDevice;
use flotilla_render::scene::ShipScene;
use flotilla_render::ship::{
    ElementIndex, GenericTexturePlacement, PlaneId, ShipId, VectorFieldRenderMode,
};

const COLUMNS: usize = 24;
const ROWS: usize = 6;
const SPACING: f32 = 1.0;
const MAST_HEIGHT: f32 = 8.0;
const FOAM_PARTICLES: usize = 12;
const STRESS_THRESHOLD: f32 = 0.015;

const HULL_PLANE: PlaneId = 0;
const MAST_PLANE: PlaneId = 1;

pub const FLAG_FRAME: TextureFrameId = TextureFrameId(0);

/// Index of grid point (column, row).
fn grid(column: usize, row: usize) -> ElementIndex {
    (row * COLUMNS + column) as ElementIndex
}

const MAST_POINT: usize = COLUMNS * ROWS;
const FOAM_START: usize = MAST_POINT + 1;
const POINT_COUNT: usize = FOAM_START + FOAM_PARTICLES;

/// Builds the atlas holding the single flag frame.
pub fn build_atlas<D: RenderDevice + ?Sized>(device: &mut D) -> Result<TextureAtlas> {
    let image = RgbaImage::from_fn(32, 32, |x, y| {
        if (x / 8 + y / 8) % 2 == 0 {
            Rgba([220, 30, 40, 255])
        } else {
            Rgba([250, 250, 245, 255])
        }
    });

    let frame = AtlasFrameMetadata {
        texture_coordinates_bottom_left: Vec2::new(0.0, 0.0),
        texture_coordinates_top_right: Vec2::new(1.0, 1.0),
        world_width: 3.0,
        world_height: 2.0,
        // Pole side of the flag.
        anchor_world: Vec2::new(0.0, 1.0),
    };
    TextureAtlas::upload(device, &image, [(FLAG_FRAME, frame)]).context("failed to build demo atlas")
}

fn hull_texture() -> RgbaImage {
    RgbaImage::from_fn(64, 16, |x, y| {
        let plank = if y % 4 == 0 { 0.7 } else { 1.0 };
        let grain = 0.9 + 0.1 * ((x as f32) * 0.4).sin();
        let v = 200.0 * plank * grain;
        Rgba([v as u8, (v * 0.62) as u8, (v * 0.35) as u8, 255])
    })
}

struct DemoShip {
    id: ShipId,
    origin: Vec2,
    phase: f32,
    rest: Vec<Vec2>,
    springs: Vec<(ElementIndex, ElementIndex)>,
    positions: Vec<Vec2>,
    previous: Vec<Vec2>,
    light: Vec<f32>,
    water: Vec<f32>,
}

impl DemoShip {
    fn launch<D: RenderDevice + ?Sized>(
        scene: &mut ShipScene,
        device: &mut D,
        origin: Vec2,
        phase: f32,
    ) -> Result<Self> {
        let id = scene.add_ship(device, POINT_COUNT, &hull_texture())?;

        let mut rest = Vec::with_capacity(POINT_COUNT);
        for row in 0..ROWS {
            for column in 0..COLUMNS {
                // Taper the keel rows towards bow and stern.
                let inset = (ROWS - 1 - row) as f32 * 0.6;
                let span = (COLUMNS - 1) as f32 * SPACING - 2.0 * inset;
                let x = -span / 2.0 + span * column as f32 / (COLUMNS - 1) as f32;
                rest.push(Vec2::new(x, row as f32 * SPACING));
            }
        }
        rest.push(Vec2::new(0.0, (ROWS - 1) as f32 * SPACING + MAST_HEIGHT));
        rest.extend(std::iter::repeat_n(Vec2::zero(), FOAM_PARTICLES));

        let mut springs = Vec::new();
        for row in 0..ROWS {
            for column in 0..COLUMNS {
                if column + 1 < COLUMNS {
                    springs.push((grid(column, row), grid(column + 1, row)));
                }
                if row + 1 < ROWS {
                    springs.push((grid(column, row), grid(column, row + 1)));
                    if column + 1 < COLUMNS {
                        springs.push((grid(column, row), grid(column + 1, row + 1)));
                        springs.push((grid(column + 1, row), grid(column, row + 1)));
                    }
                }
            }
        }
        let deck_mid = grid(COLUMNS / 2, ROWS - 1);
        springs.push((deck_mid, MAST_POINT as ElementIndex));

        let mut ship = Self {
            id,
            origin,
            phase,
            positions: rest.clone(),
            previous: rest.clone(),
            rest,
            springs,
            light: vec![0.0; POINT_COUNT],
            water: vec![0.0; POINT_COUNT],
        };
        ship.upload_structure(scene, device)?;
        Ok(ship)
    }

    fn upload_structure<D: RenderDevice + ?Sized>(&mut self, scene: &mut ShipScene, device: &mut D) -> Result<()> {
        let ctx = scene
            .ship_mut(self.id)
            .with_context(|| format!("ship {} missing from scene", self.id))?;

        let mut colors = Vec::with_capacity(POINT_COUNT);
        let mut texture_coordinates = Vec::with_capacity(POINT_COUNT);
        for (i, p) in self.rest.iter().enumerate() {
            let row = i / COLUMNS;
            colors.push(if i >= FOAM_START {
                Color::new(0.95, 0.97, 1.0, 0.8)
            } else if i == MAST_POINT {
                Color::from_u8(90, 60, 30, 255)
            } else if row == ROWS - 1 {
                Color::from_u8(180, 140, 90, 255)
            } else {
                Color::from_u8(120, 70, 40, 255)
            });
            texture_coordinates.push(Vec2::new(p.x / 8.0, p.y / 2.0));
        }
        ctx.upload_point_immutable_attributes(device, &colors, &texture_coordinates);

        let mut plane_ids = vec![HULL_PLANE; POINT_COUNT];
        plane_ids[MAST_POINT] = MAST_PLANE;
        ctx.upload_point_plane_ids(device, &plane_ids, MAST_PLANE);

        let mut e = ctx.begin_elements(device);
        for &(a, b) in &self.springs {
            e.add_spring(a, b);
        }
        e.add_rope(grid(0, ROWS - 1), MAST_POINT as ElementIndex);
        e.add_rope(grid(COLUMNS - 1, ROWS - 1), MAST_POINT as ElementIndex);
        e.add_point(MAST_POINT as ElementIndex);
        for row in 0..ROWS - 1 {
            for column in 0..COLUMNS - 1 {
                e.add_triangle(grid(column, row), grid(column + 1, row), grid(column, row + 1));
                e.add_triangle(grid(column + 1, row), grid(column + 1, row + 1), grid(column, row + 1));
            }
        }
        e.finish()
            .with_context(|| format!("ship {}: element upload failed", self.id))
    }

    fn simulate(&mut self, t: f32) {
        std::mem::swap(&mut self.previous, &mut self.positions);

        let roll = 0.06 * (0.7 * t + self.phase).sin();
        let heave = 0.6 * (0.9 * t + self.phase).sin();
        let lamp = Vec2::new(0.0, (ROWS - 1) as f32 * SPACING + 1.0);

        self.positions.clear();
        for (i, r) in self.rest.iter().enumerate().take(FOAM_START) {
            let wave = 0.25 * (1.6 * t + 0.35 * r.x + self.phase).sin() * (r.y + 1.0) / ROWS as f32;
            let local = Vec2::new(r.x, r.y + wave).rotate(roll);
            let p = self.origin + local + Vec2::new(0.0, heave);
            self.positions.push(p);

            self.water[i] = ((self.origin.y + 1.5 - p.y) / 2.0).clamp(0.0, 1.0);
            let d = (*r - lamp).length();
            self.light[i] = ((1.0 - d / 6.0) * (0.75 + 0.25 * (3.0 * t).sin())).max(0.0);
        }

        let stern = self.origin + Vec2::new(-(COLUMNS as f32) * SPACING / 2.0, 0.5 + heave);
        for k in 0..FOAM_PARTICLES {
            let age = (t * 0.8 + k as f32 / FOAM_PARTICLES as f32).fract();
            let drift = Vec2::new(-3.0 * age, 0.8 * (age * 9.0 + k as f32).sin() * age);
            self.positions.push(stern + drift);
            self.water[FOAM_START + k] = 1.0;
            self.light[FOAM_START + k] = 0.0;
        }
    }

    fn upload_frame<D: RenderDevice + ?Sized>(
        &self,
        scene: &mut ShipScene,
        device: &mut D,
        t: f32,
        dt: f32,
    ) -> Result<()> {
        let vector_field = scene.settings().modes.vector_field;
        let ctx = scene
            .ship_mut(self.id)
            .with_context(|| format!("ship {} missing from scene", self.id))?;

        ctx.upload_points(device, &self.positions, &self.light, &self.water);

        let mut stressed = ctx.begin_stressed_springs(device);
        for &(a, b) in &self.springs {
            let rest = (self.rest[a as usize] - self.rest[b as usize]).length();
            let now = (self.positions[a as usize] - self.positions[b as usize]).length();
            if rest > 0.0 && (now / rest - 1.0).abs() > STRESS_THRESHOLD {
                stressed.add_stressed_spring(a, b);
            }
        }
        stressed.finish()?;

        let mut foam = ctx.begin_ephemeral_points(device);
        let visible = ((t * 4.0) as usize % FOAM_PARTICLES) + 1;
        for k in 0..visible {
            foam.add_ephemeral_point((FOAM_START + k) as ElementIndex);
        }
        foam.finish()?;

        if vector_field != VectorFieldRenderMode::None {
            let inv_dt = if dt > 0.0 { 1.0 / dt } else { 0.0 };
            let samples = &self.positions[..FOAM_START];
            let velocities: Vec<Vec2> = samples
                .iter()
                .zip(&self.previous)
                .map(|(&p, &q)| (p - q) * inv_dt)
                .collect();
            ctx.upload_vectors(device, samples, &velocities, 0.5, Color::new(0.2, 0.9, 0.2, 1.0))?;
        }
        Ok(())
    }

    fn upload_generic_textures(&self, scene: &mut ShipScene, t: f32) -> Result<()> {
        let frame = *scene
            .atlas()
            .frame(FLAG_FRAME)
            .context("flag frame missing from atlas")?;
        let ctx = scene
            .ship_mut(self.id)
            .with_context(|| format!("ship {} missing from scene", self.id))?;

        ctx.upload_generic_texture(
            0,
            &frame,
            &GenericTexturePlacement {
                position: self.positions[MAST_POINT],
                scale: 1.0,
                angle: 0.1 * (2.0 * t + self.phase).sin(),
                alpha: 1.0,
                plane_id: MAST_PLANE,
            },
        );
        Ok(())
    }
}

/// The ships the viewer animates.
pub struct DemoFleet {
    ships: Vec<DemoShip>,
    last_t: f32,
}

impl DemoFleet {
    pub fn launch<D: RenderDevice + ?Sized>(scene: &mut ShipScene, device: &mut D, count: usize) -> Result<Self> {
        let mut ships = Vec::with_capacity(count);
        for i in 0..count {
            let x = (i as f32 - (count as f32 - 1.0) / 2.0) * (COLUMNS as f32 * SPACING + 6.0);
            let y = -4.0 - 3.0 * (i % 2) as f32;
            ships.push(DemoShip::launch(scene, device, Vec2::new(x, y), i as f32 * 1.3)?);
        }
        log::info!("demo: launched {count} ships of {POINT_COUNT} points");
        Ok(Self { ships, last_t: 0.0 })
    }

    /// Advances every ship to time `t` and uploads its per-frame data.
    pub fn update<D: RenderDevice + ?Sized>(&mut self, scene: &mut ShipScene, device: &mut D, t: f32) -> Result<()> {
        let dt = t - self.last_t;
        self.last_t = t;
        for ship in &mut self.ships {
            ship.simulate(t);
            ship.upload_frame(scene, device, t, dt)?;
        }
        Ok(())
    }

    /// Adds this frame's generic textures; call between scene frame begin and end.
    pub fn upload_generic_textures(&self, scene: &mut ShipScene, t: f32) -> Result<()> {
        for ship in &self.ships {
            ship.upload_generic_textures(scene, t)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flotilla_render::render::RecordingDevice;
    use flotilla_render::ship::ShipRenderSettings;
    use flotilla_render::view::ViewModel;

    fn scene(device: &mut RecordingDevice) -> ShipScene {
        let atlas = build_atlas(device).unwrap();
        ShipScene::new(ViewModel::default(), ShipRenderSettings::default(), atlas)
    }

    #[test]
    fn fleet_renders_through_a_recording_device() {
        let mut device = RecordingDevice::new();
        let mut scene = scene(&mut device);
        let mut fleet = DemoFleet::launch(&mut scene, &mut device, 2).unwrap();

        for frame in 1..=3 {
            let t = frame as f32 / 60.0;
            fleet.update(&mut scene, &mut device, t).unwrap();
            scene.begin_frame();
            fleet.upload_generic_textures(&mut scene, t).unwrap();
            scene.end_frame(&mut device).unwrap();
        }

        let stats = scene.statistics();
        let triangles = 2 * (COLUMNS - 1) * (ROWS - 1);
        assert_eq!(stats.last_rendered_ship_triangles, 2 * triangles as u64);
        assert_eq!(stats.last_rendered_ship_generic_textures, 2);
        assert_eq!(stats.last_rendered_ship_planes, 2 * (u64::from(MAST_PLANE) + 1));
    }

    #[test]
    fn every_spring_joins_distinct_points() {
        let mut device = RecordingDevice::new();
        let mut scene = scene(&mut device);
        let ship = DemoShip::launch(&mut scene, &mut device, Vec2::zero(), 0.0).unwrap();
        assert!(ship.springs.iter().all(|&(a, b)| a != b && (b as usize) < POINT_COUNT));
    }
}
