//! Bind group layouts and the lazily built pipeline for each
//! (program, primitive, polygon mode) combination.

use std::collections::HashMap;

use crate::render::{PolygonMode, Primitive, ProgramKind};

use super::uniforms::draw_uniforms_binding_size;

fn premul_alpha_blend() -> wgpu::BlendState {
    wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
    }
}

// ── bind group layouts ────────────────────────────────────────────────────

pub(super) struct BindGroupLayouts {
    pub uniforms: wgpu::BindGroupLayout,
    pub points: wgpu::BindGroupLayout,
    pub texture: wgpu::BindGroupLayout,
}

impl BindGroupLayouts {
    pub(super) fn new(device: &wgpu::Device) -> Self {
        let uniforms = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("flotilla uniforms bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: Some(draw_uniforms_binding_size()),
                },
                count: None,
            }],
        });

        let storage_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: true },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let points = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("flotilla point attributes bgl"),
            entries: &[
                storage_entry(0),
                storage_entry(1),
                storage_entry(2),
                storage_entry(3),
                storage_entry(4),
                storage_entry(5),
            ],
        });

        let texture = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("flotilla texture bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        Self {
            uniforms,
            points,
            texture,
        }
    }
}

// ── vertex layouts ────────────────────────────────────────────────────────

const POINT_INSTANCE_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Uint32];
const LINE_INSTANCE_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Uint32x2];
const GENERIC_TEXTURE_ATTRS: [wgpu::VertexAttribute; 3] =
    wgpu::vertex_attr_array![0 => Float32x4, 1 => Float32x2, 2 => Float32x4];
const POSITION2_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];

fn point_instance_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: 4,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &POINT_INSTANCE_ATTRS,
    }
}

fn line_instance_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: 8,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &LINE_INSTANCE_ATTRS,
    }
}

fn generic_texture_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: 40,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &GENERIC_TEXTURE_ATTRS,
    }
}

fn position2_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: 8,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &POSITION2_ATTRS,
    }
}

// ── pipelines ─────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub(super) struct PipelineKey {
    pub program: ProgramKind,
    pub primitive: Primitive,
    pub polygon_mode: PolygonMode,
}

impl PipelineKey {
    /// Polygon mode only applies to filled primitives.
    pub(super) fn new(program: ProgramKind, primitive: Primitive, polygon_mode: PolygonMode) -> Self {
        let polygon_mode = match primitive {
            Primitive::Triangles => polygon_mode,
            Primitive::Points | Primitive::Lines => PolygonMode::Fill,
        };
        Self {
            program,
            primitive,
            polygon_mode,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum ShaderFamily {
    Elements,
    GenericTextures,
    Vectors,
}

fn family(program: ProgramKind) -> ShaderFamily {
    match program {
        ProgramKind::ShipGenericTextures => ShaderFamily::GenericTextures,
        ProgramKind::ShipVectors => ShaderFamily::Vectors,
        _ => ShaderFamily::Elements,
    }
}

fn fragment_entry(program: ProgramKind) -> &'static str {
    match program {
        ProgramKind::ShipTrianglesTexture => "fs_texture",
        ProgramKind::ShipStressedSprings => "fs_stressed",
        ProgramKind::ShipGenericTextures | ProgramKind::ShipVectors => "fs_main",
        ProgramKind::ShipRopes | ProgramKind::ShipTrianglesColor | ProgramKind::ShipPointsColor => {
            "fs_color"
        }
    }
}

/// Bind group slots a pipeline expects.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(super) struct BindSlots {
    pub points: Option<u32>,
    pub texture: Option<u32>,
}

pub(super) fn bind_slots(program: ProgramKind) -> BindSlots {
    match family(program) {
        ShaderFamily::Elements => BindSlots {
            points: Some(1),
            texture: Some(2),
        },
        ShaderFamily::GenericTextures => BindSlots {
            points: None,
            texture: Some(1),
        },
        ShaderFamily::Vectors => BindSlots {
            points: None,
            texture: None,
        },
    }
}

pub(super) struct PipelineCache {
    color_format: wgpu::TextureFormat,
    depth_format: wgpu::TextureFormat,
    polygon_line_supported: bool,
    warned_polygon_line: bool,

    elements_shader: Option<wgpu::ShaderModule>,
    generic_textures_shader: Option<wgpu::ShaderModule>,
    vectors_shader: Option<wgpu::ShaderModule>,

    elements_layout: Option<wgpu::PipelineLayout>,
    generic_textures_layout: Option<wgpu::PipelineLayout>,
    vectors_layout: Option<wgpu::PipelineLayout>,

    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl PipelineCache {
    pub(super) fn new(
        color_format: wgpu::TextureFormat,
        depth_format: wgpu::TextureFormat,
        polygon_line_supported: bool,
    ) -> Self {
        Self {
            color_format,
            depth_format,
            polygon_line_supported,
            warned_polygon_line: false,
            elements_shader: None,
            generic_textures_shader: None,
            vectors_shader: None,
            elements_layout: None,
            generic_textures_layout: None,
            vectors_layout: None,
            pipelines: HashMap::new(),
        }
    }

    /// Drops every pipeline built for a previous color format.
    pub(super) fn set_color_format(&mut self, format: wgpu::TextureFormat) {
        if self.color_format != format {
            log::debug!("pipelines: color format changed to {format:?}; rebuilding");
            self.color_format = format;
            self.pipelines.clear();
        }
    }

    pub(super) fn get(&self, key: &PipelineKey) -> Option<&wgpu::RenderPipeline> {
        self.pipelines.get(&self.resolve(*key))
    }

    fn resolve(&self, key: PipelineKey) -> PipelineKey {
        if key.polygon_mode == PolygonMode::Line && !self.polygon_line_supported {
            PipelineKey {
                polygon_mode: PolygonMode::Fill,
                ..key
            }
        } else {
            key
        }
    }

    pub(super) fn ensure(&mut self, device: &wgpu::Device, layouts: &BindGroupLayouts, key: PipelineKey) {
        if key.polygon_mode == PolygonMode::Line
            && !self.polygon_line_supported
            && !self.warned_polygon_line
        {
            log::warn!("pipelines: POLYGON_MODE_LINE unsupported; wireframe falls back to fill");
            self.warned_polygon_line = true;
        }

        let key = self.resolve(key);
        if self.pipelines.contains_key(&key) {
            return;
        }

        self.ensure_shaders(device, layouts);
        let pipeline = self.build(device, key);
        log::debug!("pipelines: built {key:?}");
        self.pipelines.insert(key, pipeline);
    }

    fn ensure_shaders(&mut self, device: &wgpu::Device, layouts: &BindGroupLayouts) {
        if self.elements_shader.is_some() {
            return;
        }

        let shader = |label: &'static str, source: &'static str| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
        };
        self.elements_shader = Some(shader(
            "flotilla ship elements shader",
            include_str!("shaders/ship_elements.wgsl"),
        ));
        self.generic_textures_shader = Some(shader(
            "flotilla generic textures shader",
            include_str!("shaders/generic_textures.wgsl"),
        ));
        self.vectors_shader = Some(shader(
            "flotilla vectors shader",
            include_str!("shaders/vectors.wgsl"),
        ));

        let layout = |label: &'static str, groups: &[&wgpu::BindGroupLayout]| {
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: groups,
                immediate_size: 0,
            })
        };
        self.elements_layout = Some(layout(
            "flotilla ship elements pipeline layout",
            &[&layouts.uniforms, &layouts.points, &layouts.texture],
        ));
        self.generic_textures_layout = Some(layout(
            "flotilla generic textures pipeline layout",
            &[&layouts.uniforms, &layouts.texture],
        ));
        self.vectors_layout = Some(layout("flotilla vectors pipeline layout", &[&layouts.uniforms]));
    }

    fn build(&self, device: &wgpu::Device, key: PipelineKey) -> wgpu::RenderPipeline {
        let fam = family(key.program);
        let (shader, layout) = match fam {
            ShaderFamily::Elements => (&self.elements_shader, &self.elements_layout),
            ShaderFamily::GenericTextures => {
                (&self.generic_textures_shader, &self.generic_textures_layout)
            }
            ShaderFamily::Vectors => (&self.vectors_shader, &self.vectors_layout),
        };

        let (vertex_entry, buffers, topology) = match (fam, key.primitive) {
            (ShaderFamily::Elements, Primitive::Points) => (
                "vs_points",
                vec![point_instance_layout()],
                wgpu::PrimitiveTopology::TriangleList,
            ),
            (ShaderFamily::Elements, Primitive::Lines) => (
                "vs_lines",
                vec![line_instance_layout()],
                wgpu::PrimitiveTopology::TriangleList,
            ),
            (ShaderFamily::Elements, Primitive::Triangles) => {
                ("vs_triangles", Vec::new(), wgpu::PrimitiveTopology::TriangleList)
            }
            (ShaderFamily::GenericTextures, _) => (
                "vs_main",
                vec![generic_texture_layout()],
                wgpu::PrimitiveTopology::TriangleList,
            ),
            (ShaderFamily::Vectors, _) => (
                "vs_main",
                vec![position2_layout()],
                wgpu::PrimitiveTopology::LineList,
            ),
        };

        let polygon_mode = match key.polygon_mode {
            PolygonMode::Fill => wgpu::PolygonMode::Fill,
            PolygonMode::Line => wgpu::PolygonMode::Line,
        };

        // Vectors overlay everything in the ship's slice.
        let (depth_write_enabled, depth_compare) = match fam {
            ShaderFamily::Vectors => (false, wgpu::CompareFunction::Always),
            _ => (true, wgpu::CompareFunction::LessEqual),
        };

        let label = format!("flotilla {:?} {:?} pipeline", key.program, key.primitive);
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label.as_str()),
            layout: layout.as_ref(),

            vertex: wgpu::VertexState {
                module: shader_ref(shader),
                entry_point: Some(vertex_entry),
                compilation_options: Default::default(),
                buffers: &buffers,
            },

            fragment: Some(wgpu::FragmentState {
                module: shader_ref(shader),
                entry_point: Some(fragment_entry(key.program)),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.color_format,
                    blend: Some(premul_alpha_blend()),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),

            primitive: wgpu::PrimitiveState {
                topology,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode,
                unclipped_depth: false,
                conservative: false,
            },

            depth_stencil: Some(wgpu::DepthStencilState {
                format: self.depth_format,
                depth_write_enabled,
                depth_compare,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),

            multiview_mask: None,
            cache: None,
        })
    }
}

fn shader_ref(shader: &Option<wgpu::ShaderModule>) -> &wgpu::ShaderModule {
    shader
        .as_ref()
        .expect("shaders are created by ensure_shaders before any build")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polygon_mode_is_ignored_off_triangles() {
        let k = PipelineKey::new(ProgramKind::ShipRopes, Primitive::Lines, PolygonMode::Line);
        assert_eq!(k.polygon_mode, PolygonMode::Fill);
        let k = PipelineKey::new(
            ProgramKind::ShipTrianglesColor,
            Primitive::Triangles,
            PolygonMode::Line,
        );
        assert_eq!(k.polygon_mode, PolygonMode::Line);
    }

    #[test]
    fn textured_programs_bind_a_texture_group() {
        for program in ProgramKind::ALL {
            let slots = bind_slots(program);
            if program.texture_slot().is_some() {
                assert!(slots.texture.is_some(), "{program:?}");
            }
        }
        assert_eq!(bind_slots(ProgramKind::ShipVectors).texture, None);
        assert_eq!(bind_slots(ProgramKind::ShipGenericTextures).points, None);
    }

    #[test]
    fn fragment_entries_follow_program() {
        assert_eq!(fragment_entry(ProgramKind::ShipTrianglesTexture), "fs_texture");
        assert_eq!(fragment_entry(ProgramKind::ShipStressedSprings), "fs_stressed");
        assert_eq!(fragment_entry(ProgramKind::ShipPointsColor), "fs_color");
    }
}
