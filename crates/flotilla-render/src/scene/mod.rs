//! All ships of a world, drawn through one device.
//!
//! The scene owns every `ShipRenderContext`, the shared texture atlas and the
//! frame statistics. Ships are numbered in insertion order; adding one moves
//! every existing ship into a narrower depth slice.

use anyhow::{Context, Result};
use image::RgbaImage;

use crate::atlas::TextureAtlas;
use crate::render::RenderDevice;
use crate::ship::{RenderModes, ShipId, ShipRenderContext, ShipRenderSettings};
use crate::stats::RenderStatistics;
use crate::view::ViewModel;

pub struct ShipScene {
    view: ViewModel,
    settings: ShipRenderSettings,
    atlas: TextureAtlas,
    ships: Vec<ShipRenderContext>,
    stats: RenderStatistics,
}

impl ShipScene {
    pub fn new(view: ViewModel, settings: ShipRenderSettings, atlas: TextureAtlas) -> Self {
        Self {
            view,
            settings,
            atlas,
            ships: Vec::new(),
            stats: RenderStatistics::default(),
        }
    }

    /// Creates the next ship's context and widens every other ship's share.
    pub fn add_ship<D: RenderDevice + ?Sized>(
        &mut self,
        device: &mut D,
        point_count: usize,
        texture: &RgbaImage,
    ) -> Result<ShipId> {
        let ship_count = self.ships.len() + 1;
        let ship_id = ShipId::try_from(self.ships.len()).context("too many ships")?;

        let ctx = ShipRenderContext::new(
            device,
            &self.view,
            ship_id,
            ship_count,
            point_count,
            texture,
            &self.atlas,
            &self.settings,
        )
        .with_context(|| format!("failed to add ship {ship_id}"))?;

        for ship in &mut self.ships {
            ship.set_ship_count(ship_count);
        }
        self.ships.push(ctx);

        log::info!("scene: added ship {ship_id} ({point_count} points)");
        Ok(ship_id)
    }

    #[inline]
    pub fn ship_count(&self) -> usize {
        self.ships.len()
    }

    pub fn ship(&self, id: ShipId) -> Option<&ShipRenderContext> {
        self.ships.get(id as usize)
    }

    pub fn ship_mut(&mut self, id: ShipId) -> Option<&mut ShipRenderContext> {
        self.ships.get_mut(id as usize)
    }

    pub fn ships_mut(&mut self) -> impl Iterator<Item = &mut ShipRenderContext> {
        self.ships.iter_mut()
    }

    #[inline]
    pub fn atlas(&self) -> &TextureAtlas {
        &self.atlas
    }

    #[inline]
    pub fn view(&self) -> &ViewModel {
        &self.view
    }

    #[inline]
    pub fn settings(&self) -> &ShipRenderSettings {
        &self.settings
    }

    /// Totals of the last completed frame.
    #[inline]
    pub fn statistics(&self) -> &RenderStatistics {
        &self.stats
    }

    // ── broadcast settings ───────────────────────────────────────────────

    pub fn set_view(&mut self, view: ViewModel) {
        for ship in &mut self.ships {
            ship.on_view_model_updated(&view);
        }
        self.view = view;
    }

    pub fn set_render_modes(&mut self, modes: RenderModes) {
        self.settings.modes = modes;
        for ship in &mut self.ships {
            ship.set_ship_render_mode(modes.ship);
            ship.set_debug_ship_render_mode(modes.debug);
            ship.set_vector_field_render_mode(modes.vector_field);
            ship.set_show_stressed_springs(modes.show_stressed_springs);
        }
    }

    pub fn set_ambient_light_intensity<D: RenderDevice + ?Sized>(&mut self, device: &mut D, value: f32) {
        self.settings.ambient_light_intensity = value;
        for ship in &mut self.ships {
            ship.set_ambient_light_intensity(device, value);
        }
    }

    pub fn set_water_contrast<D: RenderDevice + ?Sized>(&mut self, device: &mut D, value: f32) {
        self.settings.water_contrast = value;
        for ship in &mut self.ships {
            ship.set_water_contrast(device, value);
        }
    }

    pub fn set_water_level_of_detail<D: RenderDevice + ?Sized>(&mut self, device: &mut D, value: f32) {
        self.settings.water_level_of_detail = value;
        for ship in &mut self.ships {
            ship.set_water_level_of_detail(device, value);
        }
    }

    // ── frame ────────────────────────────────────────────────────────────

    /// Clears statistics and every ship's per-frame generic textures.
    pub fn begin_frame(&mut self) {
        self.stats.reset();
        for ship in &mut self.ships {
            ship.render_start();
        }
    }

    /// Draws every ship in id order.
    ///
    /// Stops at the first ship that fails; earlier ships' draws stay issued.
    pub fn end_frame<D: RenderDevice + ?Sized>(&mut self, device: &mut D) -> Result<()> {
        for ship in &mut self.ships {
            let id = ship.ship_id();
            ship.render_end(device, &mut self.stats)
                .with_context(|| format!("failed to render ship {id}"))?;
        }
        Ok(())
    }

    /// Frees every ship and the atlas.
    pub fn release<D: RenderDevice + ?Sized>(self, device: &mut D) {
        let count = self.ships.len();
        for ship in self.ships {
            ship.release(device);
        }
        self.atlas.release(device);
        log::debug!("scene: released {count} ships");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::{AtlasFrameMetadata, TextureFrameId};
    use crate::coords::Vec2;
    use crate::render::RecordingDevice;
    use crate::ship::{DebugShipRenderMode, RenderLayer, ShipRenderMode, VectorFieldRenderMode};

    fn scene(dev: &mut RecordingDevice) -> ShipScene {
        let frame = AtlasFrameMetadata {
            texture_coordinates_bottom_left: Vec2::new(0.0, 0.0),
            texture_coordinates_top_right: Vec2::new(1.0, 1.0),
            world_width: 2.0,
            world_height: 1.0,
            anchor_world: Vec2::new(1.0, 0.5),
        };
        let atlas = TextureAtlas::upload(dev, &RgbaImage::new(4, 4), [(TextureFrameId(0), frame)]).unwrap();
        ShipScene::new(ViewModel::default(), ShipRenderSettings::default(), atlas)
    }

    fn add_triangle_ship(scene: &mut ShipScene, dev: &mut RecordingDevice) -> ShipId {
        let id = scene.add_ship(dev, 3, &RgbaImage::new(4, 4)).unwrap();
        let ship = scene.ship_mut(id).unwrap();
        ship.upload_points(dev, &[Vec2::zero(); 3], &[1.0; 3], &[0.0; 3]);
        ship.upload_point_plane_ids(dev, &[0; 3], 0);
        let mut e = ship.begin_elements(dev);
        e.add_spring(0, 1);
        e.add_triangle(0, 1, 2);
        e.finish().unwrap();
        id
    }

    // ── ships ────────────────────────────────────────────────────────────

    #[test]
    fn adding_a_ship_narrows_existing_slices() {
        let mut dev = RecordingDevice::new();
        let mut scene = scene(&mut dev);
        let a = scene.add_ship(&mut dev, 4, &RgbaImage::new(4, 4)).unwrap();
        let alone = *scene.ship(a).unwrap().layer_matrix(RenderLayer::SpringsAndTriangles);

        let b = scene.add_ship(&mut dev, 4, &RgbaImage::new(4, 4)).unwrap();
        assert_eq!((a, b), (0, 1));
        assert_eq!(scene.ship(a).unwrap().ship_count(), 2);
        assert_eq!(scene.ship(b).unwrap().ship_count(), 2);

        let shared = *scene.ship(a).unwrap().layer_matrix(RenderLayer::SpringsAndTriangles);
        assert!(shared[2][2].abs() < alone[2][2].abs());
    }

    #[test]
    fn unknown_ship_is_none() {
        let mut dev = RecordingDevice::new();
        let scene = scene(&mut dev);
        assert!(scene.ship(0).is_none());
    }

    // ── frame ────────────────────────────────────────────────────────────

    #[test]
    fn frame_totals_cover_every_ship() {
        let mut dev = RecordingDevice::new();
        let mut scene = scene(&mut dev);
        add_triangle_ship(&mut scene, &mut dev);
        add_triangle_ship(&mut scene, &mut dev);

        scene.begin_frame();
        scene.end_frame(&mut dev).unwrap();

        let stats = scene.statistics();
        assert_eq!(stats.last_rendered_ship_triangles, 2);
        assert_eq!(stats.last_rendered_ship_planes, 2);
    }

    #[test]
    fn statistics_reset_each_frame() {
        let mut dev = RecordingDevice::new();
        let mut scene = scene(&mut dev);
        add_triangle_ship(&mut scene, &mut dev);

        for _ in 0..3 {
            scene.begin_frame();
            scene.end_frame(&mut dev).unwrap();
        }
        assert_eq!(scene.statistics().last_rendered_ship_triangles, 1);
    }

    #[test]
    fn render_modes_reach_every_ship() {
        let mut dev = RecordingDevice::new();
        let mut scene = scene(&mut dev);
        add_triangle_ship(&mut scene, &mut dev);
        add_triangle_ship(&mut scene, &mut dev);

        let modes = RenderModes {
            ship: ShipRenderMode::Structure,
            debug: DebugShipRenderMode::Springs,
            vector_field: VectorFieldRenderMode::PointVelocity,
            show_stressed_springs: true,
        };
        scene.set_render_modes(modes);
        assert_eq!(scene.ship(0).unwrap().modes(), modes);
        assert_eq!(scene.ship(1).unwrap().modes(), modes);
        assert_eq!(scene.settings().modes, modes);
    }

    #[test]
    fn view_update_recomputes_projections() {
        let mut dev = RecordingDevice::new();
        let mut scene = scene(&mut dev);
        let id = add_triangle_ship(&mut scene, &mut dev);
        let before = scene.ship(id).unwrap().projection_recompute_count();

        let mut view = ViewModel::default();
        view.set_zoom(2.0);
        scene.set_view(view);

        assert_eq!(scene.ship(id).unwrap().projection_recompute_count(), before + 1);
        assert_eq!(scene.view().zoom(), 2.0);
    }

    #[test]
    fn release_frees_everything() {
        let mut dev = RecordingDevice::new();
        let mut scene = scene(&mut dev);
        add_triangle_ship(&mut scene, &mut dev);
        add_triangle_ship(&mut scene, &mut dev);

        scene.release(&mut dev);
        assert_eq!(dev.live_buffers(), 0);
        assert_eq!(dev.live_textures(), 0);
        assert_eq!(dev.live_attribute_sets(), 0);
    }
}
