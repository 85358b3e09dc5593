use winit::dpi::LogicalSize;

use flotilla_render::device::GpuInit;
use flotilla_render::logging::LoggingConfig;
use flotilla_render::ship::ShipRenderSettings;

/// Viewer startup configuration.
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
    pub ship_count: usize,
    /// World units spanned by the canvas height at startup.
    pub zoom: f32,
    pub clear_color: wgpu::Color,
    pub settings: ShipRenderSettings,
    pub gpu: GpuInit,
    pub logging: LoggingConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            title: "flotilla".to_string(),
            initial_size: LogicalSize::new(1280.0, 720.0),
            ship_count: 3,
            zoom: 2.5,
            clear_color: wgpu::Color {
                r: 0.53,
                g: 0.71,
                b: 0.86,
                a: 1.0,
            },
            settings: ShipRenderSettings::default(),
            gpu: GpuInit::default(),
            logging: LoggingConfig::default(),
        }
    }
}
