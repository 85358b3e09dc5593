/// Initialization parameters for the GPU layer.
#[derive(Debug, Clone)]
pub struct GpuInit {
    /// Prefer an sRGB surface format when available.
    pub prefer_srgb: bool,

    pub present_mode: wgpu::PresentMode,

    /// Used when the surface supports it; otherwise the first supported mode.
    pub alpha_mode: Option<wgpu::CompositeAlphaMode>,

    /// Features the device must have.
    pub required_features: wgpu::Features,

    /// Features enabled when the adapter offers them.
    ///
    /// `POLYGON_MODE_LINE` drives the wireframe debug mode; without it
    /// wireframe draws fall back to filled triangles.
    pub optional_features: wgpu::Features,

    pub required_limits: wgpu::Limits,

    /// A hint; support depends on platform and backend.
    pub desired_maximum_frame_latency: u32,
}

impl Default for GpuInit {
    fn default() -> Self {
        Self {
            prefer_srgb: true,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: None,
            required_features: wgpu::Features::empty(),
            optional_features: wgpu::Features::POLYGON_MODE_LINE,
            required_limits: wgpu::Limits::default(),
            desired_maximum_frame_latency: 2,
        }
    }
}

impl GpuInit {
    /// Features to request from an adapter offering `available`.
    pub fn features_for(&self, available: wgpu::Features) -> wgpu::Features {
        self.required_features | (self.optional_features & available)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_features_follow_adapter() {
        let init = GpuInit::default();
        assert_eq!(init.features_for(wgpu::Features::empty()), wgpu::Features::empty());
        assert_eq!(
            init.features_for(wgpu::Features::POLYGON_MODE_LINE | wgpu::Features::DEPTH_CLIP_CONTROL),
            wgpu::Features::POLYGON_MODE_LINE
        );
    }
}
