use anyhow::{Context, Result};
use image::{Rgba, RgbaImage};

use crate::atlas::{AtlasFrameMetadata, TextureAtlas};
use crate::coords::Vec2;
use crate::paint::Color;
use crate::render::{
    ArrayDraw, BufferId, BufferUsage, ElementDraw, PolygonMode, Primitive, ProgramKind,
    ProgramParameter, RenderDevice, TextureFilter, TextureId, TextureSampling, TextureSlot,
    TextureWrap, VertexLayout, set_parameter_on,
};
use crate::stats::RenderStatistics;
use crate::view::{ProjectionMatrix, ViewModel};

use super::elements::{ElementStreams, ElementsUpload, EphemeralPointsUpload, StressedSpringsUpload};
use super::generic_textures::{
    GenericTextureBatch, GenericTexturePlacement, TextureRenderPolygonVertex, VERTICES_PER_QUAD,
    build_quad,
};
use super::layers::{LayerProjections, RenderLayer};
use super::modes::{DebugShipRenderMode, RenderModes, ShipRenderMode, VectorFieldRenderMode};
use super::plan::{DrawOp, DrawPlan};
use super::point_buffers::PointBuffers;
use super::settings::ShipRenderSettings;
use super::vectors::build_vector_arrows;
use super::{PlaneId, ShipId};

const AMBIENT_LIGHT_PROGRAMS: [ProgramKind; 6] = [
    ProgramKind::ShipRopes,
    ProgramKind::ShipTrianglesColor,
    ProgramKind::ShipTrianglesTexture,
    ProgramKind::ShipPointsColor,
    ProgramKind::ShipGenericTextures,
    ProgramKind::ShipVectors,
];

const WATER_PROGRAMS: [ProgramKind; 4] = [
    ProgramKind::ShipRopes,
    ProgramKind::ShipTrianglesColor,
    ProgramKind::ShipTrianglesTexture,
    ProgramKind::ShipPointsColor,
];

// Draw sizes, in world units unless noted.
const DEBUG_POINT_SIZE: f32 = 0.2 * 2.0;
const EPHEMERAL_POINT_SIZE: f32 = 0.3;
const SPRING_LINE_WIDTH: f32 = 0.1 * 2.0;
// Canvas pixels.
const WIREFRAME_LINE_WIDTH: f32 = 0.1;
const VECTOR_LINE_WIDTH: f32 = 0.5;

/// GPU-side state and draw logic for one ship.
///
/// Call order within a frame: point uploads, element brackets, vectors, then
/// `render_start`, generic textures, `render_end`.
#[derive(Debug)]
pub struct ShipRenderContext {
    ship_id: ShipId,
    ship_count: usize,
    max_max_plane_id: PlaneId,
    view: ViewModel,

    modes: RenderModes,
    ambient_light_intensity: f32,
    water_contrast: f32,
    water_level_of_detail: f32,

    points: PointBuffers,
    elements: ElementStreams,
    generic_textures: GenericTextureBatch,

    vector_arrows: Vec<Vec2>,
    vector_arrow_buffer: BufferId,
    vector_arrow_color: Color,

    ship_texture: TextureId,
    stressed_spring_texture: TextureId,
    texture_atlas: TextureId,

    projections: LayerProjections,

    /// First failure of a bracket closed by drop.
    deferred_error: Option<anyhow::Error>,
}

impl ShipRenderContext {
    /// Allocates every buffer and texture of a ship and pushes its initial parameters.
    #[allow(clippy::too_many_arguments)]
    pub fn new<D: RenderDevice + ?Sized>(
        device: &mut D,
        view: &ViewModel,
        ship_id: ShipId,
        ship_count: usize,
        point_count: usize,
        texture: &RgbaImage,
        atlas: &TextureAtlas,
        settings: &ShipRenderSettings,
    ) -> Result<Self> {
        assert!(
            (ship_id as usize) < ship_count,
            "ship id {ship_id} out of ship count {ship_count}"
        );

        let points = PointBuffers::new(device, point_count)
            .with_context(|| format!("ship {ship_id}: failed to create point buffers"))?;
        let elements = ElementStreams::new(device, point_count)
            .with_context(|| format!("ship {ship_id}: failed to create element buffers"))?;
        let generic_textures = GenericTextureBatch::new(device)?;

        let vector_arrow_buffer = device
            .create_buffer("vector arrows", 0, BufferUsage::Dynamic)
            .context("failed to create vector arrow buffer")?;

        let ship_texture = device
            .create_texture(
                "ship texture",
                texture,
                TextureSampling {
                    wrap: TextureWrap::Repeat,
                    filter: TextureFilter::Linear,
                    mipmaps: true,
                },
            )
            .with_context(|| format!("ship {ship_id}: failed to upload ship texture"))?;

        let stressed_spring_texture = device
            .create_texture(
                "stressed spring texture",
                &stressed_spring_image(),
                TextureSampling {
                    wrap: TextureWrap::Repeat,
                    filter: TextureFilter::Linear,
                    mipmaps: false,
                },
            )
            .context("failed to create stressed spring texture")?;

        let projections = LayerProjections::new(view, ship_id as usize, ship_count, 0);

        let ctx = Self {
            ship_id,
            ship_count,
            max_max_plane_id: 0,
            view: view.clone(),
            modes: settings.modes,
            ambient_light_intensity: settings.ambient_light_intensity,
            water_contrast: settings.water_contrast,
            water_level_of_detail: settings.water_level_of_detail,
            points,
            elements,
            generic_textures,
            vector_arrows: Vec::new(),
            vector_arrow_buffer,
            vector_arrow_color: Color::white(),
            ship_texture,
            stressed_spring_texture,
            texture_atlas: atlas.texture(),
            projections,
            deferred_error: None,
        };

        ctx.projections.push(device);
        ctx.push_ambient_light_intensity(device);
        ctx.push_water_contrast(device);
        ctx.push_water_level_threshold(device);

        log::debug!(
            "ship {ship_id}/{ship_count}: render context created ({point_count} points, texture {}x{})",
            texture.width(),
            texture.height()
        );

        Ok(ctx)
    }

    /// Frees every device resource this ship owns. The atlas is not owned.
    pub fn release<D: RenderDevice + ?Sized>(self, device: &mut D) {
        self.points.release(device);
        self.elements.release(device);
        self.generic_textures.release(device);
        device.release_buffer(self.vector_arrow_buffer);
        device.release_texture(self.ship_texture);
        device.release_texture(self.stressed_spring_texture);
        log::debug!("ship {}: render context released", self.ship_id);
    }

    // ── accessors ────────────────────────────────────────────────────────

    #[inline]
    pub fn ship_id(&self) -> ShipId {
        self.ship_id
    }

    #[inline]
    pub fn ship_count(&self) -> usize {
        self.ship_count
    }

    #[inline]
    pub fn point_count(&self) -> usize {
        self.points.point_count()
    }

    #[inline]
    pub fn max_max_plane_id(&self) -> PlaneId {
        self.max_max_plane_id
    }

    #[inline]
    pub fn modes(&self) -> RenderModes {
        self.modes
    }

    /// Number of times the layer matrices have been computed, construction included.
    #[inline]
    pub fn projection_recompute_count(&self) -> u64 {
        self.projections.recompute_count()
    }

    pub fn layer_matrix(&self, layer: RenderLayer) -> &ProjectionMatrix {
        self.projections.matrix(layer)
    }

    /// Vertex capacity of the generic-texture buffer.
    pub fn generic_texture_capacity(&self) -> usize {
        self.generic_textures.capacity()
    }

    /// Vertices added to generic-texture components since `render_start`.
    pub fn generic_texture_peak(&self) -> usize {
        self.generic_textures.peak_vertex_count()
    }

    pub fn vector_arrow_points(&self) -> &[Vec2] {
        &self.vector_arrows
    }

    // ── parameters ───────────────────────────────────────────────────────

    pub fn set_ship_render_mode(&mut self, mode: ShipRenderMode) {
        self.modes.ship = mode;
    }

    pub fn set_debug_ship_render_mode(&mut self, mode: DebugShipRenderMode) {
        self.modes.debug = mode;
    }

    pub fn set_vector_field_render_mode(&mut self, mode: VectorFieldRenderMode) {
        self.modes.vector_field = mode;
    }

    pub fn set_show_stressed_springs(&mut self, show: bool) {
        self.modes.show_stressed_springs = show;
    }

    pub fn set_ambient_light_intensity<D: RenderDevice + ?Sized>(&mut self, device: &mut D, value: f32) {
        if value != self.ambient_light_intensity {
            self.ambient_light_intensity = value;
            self.push_ambient_light_intensity(device);
        }
    }

    pub fn set_water_contrast<D: RenderDevice + ?Sized>(&mut self, device: &mut D, value: f32) {
        if value != self.water_contrast {
            self.water_contrast = value;
            self.push_water_contrast(device);
        }
    }

    pub fn set_water_level_of_detail<D: RenderDevice + ?Sized>(&mut self, device: &mut D, value: f32) {
        if value != self.water_level_of_detail {
            self.water_level_of_detail = value;
            self.push_water_level_threshold(device);
        }
    }

    /// Takes a new camera or canvas; the layer matrices follow.
    pub fn on_view_model_updated(&mut self, view: &ViewModel) {
        self.view = view.clone();
        self.recompute_projections();
    }

    pub fn set_ship_count(&mut self, ship_count: usize) {
        assert!(
            (self.ship_id as usize) < ship_count,
            "ship id {} out of ship count {ship_count}",
            self.ship_id
        );
        if ship_count != self.ship_count {
            self.ship_count = ship_count;
            self.recompute_projections();
        }
    }

    fn recompute_projections(&mut self) {
        self.projections.recompute(
            &self.view,
            self.ship_id as usize,
            self.ship_count,
            self.max_max_plane_id,
        );
    }

    fn push_ambient_light_intensity<D: RenderDevice + ?Sized>(&self, device: &mut D) {
        set_parameter_on(
            device,
            &AMBIENT_LIGHT_PROGRAMS,
            ProgramParameter::AmbientLightIntensity(self.ambient_light_intensity),
        );
    }

    fn push_water_contrast<D: RenderDevice + ?Sized>(&self, device: &mut D) {
        set_parameter_on(device, &WATER_PROGRAMS, ProgramParameter::WaterContrast(self.water_contrast));
    }

    fn push_water_level_threshold<D: RenderDevice + ?Sized>(&self, device: &mut D) {
        let threshold = ShipRenderSettings::water_level_threshold(self.water_level_of_detail);
        set_parameter_on(device, &WATER_PROGRAMS, ProgramParameter::WaterLevelThreshold(threshold));
    }

    // ── points ───────────────────────────────────────────────────────────

    /// Replaces colors and texture coordinates of every point.
    ///
    /// # Panics
    /// If either slice's length differs from the point count.
    pub fn upload_point_immutable_attributes<D: RenderDevice + ?Sized>(
        &mut self,
        device: &mut D,
        color: &[Color],
        texture_coordinates: &[Vec2],
    ) {
        self.points.upload_immutable_attributes(device, color, texture_coordinates);
    }

    /// Replaces position, light and water of every point.
    ///
    /// # Panics
    /// If any slice's length differs from the point count.
    pub fn upload_points<D: RenderDevice + ?Sized>(
        &mut self,
        device: &mut D,
        position: &[Vec2],
        light: &[f32],
        water: &[f32],
    ) {
        self.points.upload_points(device, position, light, water);
    }

    /// Replaces the colors of points `start..start + count` with `color`.
    ///
    /// # Panics
    /// If `start + count` exceeds the point count or `color.len() != count`.
    pub fn upload_point_color_range<D: RenderDevice + ?Sized>(
        &mut self,
        device: &mut D,
        color: &[Color],
        start: usize,
        count: usize,
    ) {
        assert_eq!(color.len(), count, "color range of {count} given {} colors", color.len());
        self.points.upload_color_range(device, color, start);
    }

    /// Replaces every point's plane id.
    ///
    /// A `max_max_plane_id` above the stored one raises it and recomputes the
    /// layer matrices; anything else is ignored.
    pub fn upload_point_plane_ids<D: RenderDevice + ?Sized>(
        &mut self,
        device: &mut D,
        plane_id: &[PlaneId],
        max_max_plane_id: PlaneId,
    ) {
        self.points.upload_plane_ids(device, plane_id);

        if max_max_plane_id > self.max_max_plane_id {
            self.max_max_plane_id = max_max_plane_id;
            self.recompute_projections();
        }
    }

    // ── elements ─────────────────────────────────────────────────────────

    /// Opens the bracket rebuilding points, springs, ropes and triangles.
    ///
    /// Also empties the stressed-spring stream.
    pub fn begin_elements<'a, D: RenderDevice + ?Sized>(
        &'a mut self,
        device: &'a mut D,
    ) -> ElementsUpload<'a, D> {
        let streams = &mut self.elements;
        streams.points.clear();
        streams.springs.clear();
        streams.ropes.clear();
        streams.triangles.clear();
        streams.stressed_springs.clear();

        ElementsUpload {
            streams,
            device,
            deferred: &mut self.deferred_error,
            finished: false,
        }
    }

    pub fn begin_stressed_springs<'a, D: RenderDevice + ?Sized>(
        &'a mut self,
        device: &'a mut D,
    ) -> StressedSpringsUpload<'a, D> {
        self.elements.stressed_springs.clear();
        StressedSpringsUpload {
            stream: &mut self.elements.stressed_springs,
            device,
            deferred: &mut self.deferred_error,
            finished: false,
        }
    }

    pub fn begin_ephemeral_points<'a, D: RenderDevice + ?Sized>(
        &'a mut self,
        device: &'a mut D,
    ) -> EphemeralPointsUpload<'a, D> {
        self.elements.ephemeral_points.clear();
        EphemeralPointsUpload {
            stream: &mut self.elements.ephemeral_points,
            device,
            deferred: &mut self.deferred_error,
            finished: false,
        }
    }

    // ── vectors ──────────────────────────────────────────────────────────

    /// Replaces the vector overlay with one arrow per sample.
    pub fn upload_vectors<D: RenderDevice + ?Sized>(
        &mut self,
        device: &mut D,
        positions: &[Vec2],
        vectors: &[Vec2],
        length_adjustment: f32,
        color: Color,
    ) -> Result<()> {
        build_vector_arrows(positions, vectors, length_adjustment, &mut self.vector_arrows);
        device
            .upload_buffer(
                self.vector_arrow_buffer,
                bytemuck::cast_slice(&self.vector_arrows),
                BufferUsage::Dynamic,
            )
            .with_context(|| format!("ship {}: failed to upload {} vector arrows", self.ship_id, positions.len()))?;
        self.vector_arrow_color = color;
        Ok(())
    }

    // ── frame ────────────────────────────────────────────────────────────

    pub fn render_start(&mut self) {
        self.generic_textures.reset();
    }

    /// Appends a connected component with the given quad vertices.
    pub fn add_generic_texture_component(&mut self, vertices: &[TextureRenderPolygonVertex]) {
        self.generic_textures.add_component(vertices);
    }

    /// Appends one atlas frame quad to connected component `component_id`.
    ///
    /// # Panics
    ///
    /// If `component_id` is not below [`MAX_GENERIC_TEXTURE_COMPONENTS`](super::MAX_GENERIC_TEXTURE_COMPONENTS).
    pub fn upload_generic_texture(
        &mut self,
        component_id: usize,
        frame: &AtlasFrameMetadata,
        placement: &GenericTexturePlacement,
    ) {
        self.generic_textures.append(component_id, &build_quad(frame, placement));
    }

    /// Issues this ship's draws for the current modes and adds to `stats`.
    ///
    /// Fails without drawing if a bracket closed by drop failed to transfer.
    pub fn render_end<D: RenderDevice + ?Sized>(
        &mut self,
        device: &mut D,
        stats: &mut RenderStatistics,
    ) -> Result<()> {
        if let Some(e) = self.deferred_error.take() {
            return Err(e.context(format!("ship {}: deferred element upload failed", self.ship_id)));
        }

        // Programs are shared by every ship; make them carry this ship's slot.
        self.projections.push(device);

        let ratio = self.view.canvas_to_visible_world_height_ratio();
        for op in DrawPlan::for_modes(self.modes).ops() {
            match op {
                DrawOp::PointElements => self.render_point_elements(device, ratio),
                DrawOp::Triangles { textured, wireframe } => {
                    self.render_triangles(device, stats, textured, wireframe)
                }
                DrawOp::Ropes => self.render_ropes(device, stats, ratio),
                DrawOp::Springs { textured } => self.render_springs(device, stats, textured, ratio),
                DrawOp::StressedSprings => self.render_stressed_springs(device, ratio),
                DrawOp::EphemeralPoints => self.render_ephemeral_points(device, stats, ratio),
                DrawOp::GenericTextures => self.render_generic_textures(device, stats)?,
                DrawOp::Vectors => self.render_vectors(device),
            }
        }

        stats.last_rendered_ship_planes += u64::from(self.max_max_plane_id) + 1;
        Ok(())
    }

    fn draw_elements<D: RenderDevice + ?Sized>(
        &self,
        device: &mut D,
        primitive: Primitive,
        elements: BufferId,
        count: usize,
    ) {
        device.draw_elements(ElementDraw {
            primitive,
            attributes: self.points.attribute_set(),
            elements,
            element_count: count as u32,
        });
    }

    fn render_point_elements<D: RenderDevice + ?Sized>(&self, device: &mut D, ratio: f32) {
        let stream = &self.elements.points;
        let count = stream.transferred_len();
        if count == 0 {
            return;
        }
        device.activate_program(ProgramKind::ShipPointsColor);
        device.set_point_size(DEBUG_POINT_SIZE * ratio);
        self.draw_elements(device, Primitive::Points, stream.buffer(), count);
    }

    fn activate_element_program<D: RenderDevice + ?Sized>(&self, device: &mut D, textured: bool) {
        if textured {
            device.activate_program(ProgramKind::ShipTrianglesTexture);
            device.activate_texture(TextureSlot::SharedTexture);
            device.bind_texture(self.ship_texture);
        } else {
            device.activate_program(ProgramKind::ShipTrianglesColor);
        }
    }

    fn render_triangles<D: RenderDevice + ?Sized>(
        &self,
        device: &mut D,
        stats: &mut RenderStatistics,
        textured: bool,
        wireframe: bool,
    ) {
        let stream = &self.elements.triangles;
        let count = stream.transferred_len();
        if count == 0 {
            return;
        }
        self.activate_element_program(device, textured);
        if wireframe {
            device.set_polygon_mode(PolygonMode::Line);
            device.set_line_width(WIREFRAME_LINE_WIDTH);
        } else {
            device.set_polygon_mode(PolygonMode::Fill);
        }
        self.draw_elements(device, Primitive::Triangles, stream.buffer(), count);
        stats.last_rendered_ship_triangles += count as u64;
    }

    fn render_ropes<D: RenderDevice + ?Sized>(&self, device: &mut D, stats: &mut RenderStatistics, ratio: f32) {
        let stream = &self.elements.ropes;
        let count = stream.transferred_len();
        if count == 0 {
            return;
        }
        device.activate_program(ProgramKind::ShipRopes);
        device.set_line_width(SPRING_LINE_WIDTH * ratio);
        self.draw_elements(device, Primitive::Lines, stream.buffer(), count);
        stats.last_rendered_ship_ropes += count as u64;
    }

    fn render_springs<D: RenderDevice + ?Sized>(
        &self,
        device: &mut D,
        stats: &mut RenderStatistics,
        textured: bool,
        ratio: f32,
    ) {
        let stream = &self.elements.springs;
        let count = stream.transferred_len();
        if count == 0 {
            return;
        }
        self.activate_element_program(device, textured);
        device.set_line_width(SPRING_LINE_WIDTH * ratio);
        self.draw_elements(device, Primitive::Lines, stream.buffer(), count);
        stats.last_rendered_ship_springs += count as u64;
    }

    fn render_stressed_springs<D: RenderDevice + ?Sized>(&self, device: &mut D, ratio: f32) {
        let stream = &self.elements.stressed_springs;
        let count = stream.transferred_len();
        if count == 0 {
            return;
        }
        device.activate_program(ProgramKind::ShipStressedSprings);
        device.set_line_width(SPRING_LINE_WIDTH * ratio);
        device.activate_texture(TextureSlot::SharedTexture);
        device.bind_texture(self.stressed_spring_texture);
        self.draw_elements(device, Primitive::Lines, stream.buffer(), count);
    }

    fn render_ephemeral_points<D: RenderDevice + ?Sized>(
        &self,
        device: &mut D,
        stats: &mut RenderStatistics,
        ratio: f32,
    ) {
        let stream = &self.elements.ephemeral_points;
        let count = stream.transferred_len();
        if count == 0 {
            return;
        }
        device.activate_program(ProgramKind::ShipPointsColor);
        device.set_point_size(EPHEMERAL_POINT_SIZE * ratio);
        self.draw_elements(device, Primitive::Points, stream.buffer(), count);
        stats.last_rendered_ship_ephemeral_points += count as u64;
    }

    fn render_generic_textures<D: RenderDevice + ?Sized>(
        &mut self,
        device: &mut D,
        stats: &mut RenderStatistics,
    ) -> Result<()> {
        let ranges = self
            .generic_textures
            .transfer(device)
            .with_context(|| format!("ship {}: failed to upload generic textures", self.ship_id))?;

        let wireframe = self.modes.debug == DebugShipRenderMode::Wireframe;
        for range in ranges {
            device.activate_program(ProgramKind::ShipGenericTextures);
            device.activate_texture(TextureSlot::TextureAtlas);
            device.bind_texture(self.texture_atlas);
            if wireframe {
                device.set_polygon_mode(PolygonMode::Line);
                device.set_line_width(WIREFRAME_LINE_WIDTH);
            } else {
                device.set_polygon_mode(PolygonMode::Fill);
            }
            device.draw_arrays(ArrayDraw {
                primitive: Primitive::Triangles,
                layout: VertexLayout::GenericTexture,
                vertices: self.generic_textures.buffer(),
                first_vertex: range.first_vertex,
                vertex_count: range.vertex_count,
            });
            stats.last_rendered_ship_generic_textures += (range.vertex_count as usize / VERTICES_PER_QUAD) as u64;
        }
        Ok(())
    }

    fn render_vectors<D: RenderDevice + ?Sized>(&self, device: &mut D) {
        if self.vector_arrows.is_empty() {
            return;
        }
        device.activate_program(ProgramKind::ShipVectors);
        device.set_line_width(VECTOR_LINE_WIDTH);
        device.set_program_parameter(ProgramParameter::MatteColor(self.vector_arrow_color));
        device.draw_arrays(ArrayDraw {
            primitive: Primitive::Lines,
            layout: VertexLayout::Position2,
            vertices: self.vector_arrow_buffer,
            first_vertex: 0,
            vertex_count: self.vector_arrows.len() as u32,
        });
    }
}

/// 3×3 red and cream checker sampled along stressed springs.
fn stressed_spring_image() -> RgbaImage {
    const RED: Rgba<u8> = Rgba([239, 16, 39, 255]);
    const CREAM: Rgba<u8> = Rgba([255, 253, 181, 255]);
    RgbaImage::from_fn(3, 3, |x, y| if (x + y) % 2 == 0 { RED } else { CREAM })
}
