use std::time::Instant;

use anyhow::{Context, Result, bail};
use ouroboros::self_referencing;

use winit::application::ApplicationHandler;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use flotilla_render::coords::Vec2;
use flotilla_render::device::{Gpu, SurfaceErrorAction};
use flotilla_render::render::{RenderTarget, WgpuRenderDevice};
use flotilla_render::scene::ShipScene;
use flotilla_render::view::ViewModel;

use crate::config::ViewerConfig;
use crate::demo::{DemoFleet, build_atlas};

const PAN_STEP: f32 = 5.0;
const ZOOM_STEP: f32 = 1.25;
const STATS_INTERVAL_SECS: f32 = 5.0;

#[self_referencing]
struct WindowEntry {
    window: Window,

    #[borrows(window)]
    #[covariant]
    gpu: Gpu<'this>,
}

/// Everything that lives as long as the window.
struct Session {
    entry: WindowEntry,
    device: WgpuRenderDevice,
    scene: ShipScene,
    fleet: DemoFleet,
    started: Instant,
    last_stats: f32,
}

impl Session {
    fn new(event_loop: &ActiveEventLoop, config: &ViewerConfig) -> Result<Self> {
        let attrs = Window::default_attributes()
            .with_title(config.title.clone())
            .with_inner_size(config.initial_size);
        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;

        let gpu_init = config.gpu.clone();
        let entry = WindowEntryTryBuilder {
            window,
            gpu_builder: |w| pollster::block_on(Gpu::new(w, gpu_init)),
        }
        .try_build()
        .context("GPU initialization failed for window")?;

        let (mut device, viewport) = entry.with_gpu(|gpu| -> Result<_> {
            Ok((WgpuRenderDevice::new(&gpu.render_ctx())?, gpu.viewport()))
        })?;

        let view = ViewModel::new(config.zoom, Vec2::zero(), viewport);
        let atlas = build_atlas(&mut device)?;
        let mut scene = ShipScene::new(view, config.settings.clone(), atlas);
        let fleet = DemoFleet::launch(&mut scene, &mut device, config.ship_count)?;

        Ok(Self {
            entry,
            device,
            scene,
            fleet,
            started: Instant::now(),
            last_stats: 0.0,
        })
    }

    fn request_redraw(&self) {
        self.entry.with_window(|w| w.request_redraw());
    }

    fn resize(&mut self) {
        let viewport = self.entry.with_mut(|fields| {
            let size = fields.window.inner_size();
            fields.gpu.resize(size);
            fields.gpu.viewport()
        });
        if !viewport.is_valid() {
            return;
        }
        let mut view = self.scene.view().clone();
        view.set_canvas_size(viewport);
        self.scene.set_view(view);
    }

    fn on_key(&mut self, event: &KeyEvent) -> bool {
        if event.state != ElementState::Pressed {
            return true;
        }
        let PhysicalKey::Code(code) = event.physical_key else { return true };

        let mut modes = self.scene.settings().modes;
        let mut view = self.scene.view().clone();
        match code {
            KeyCode::Escape => return false,
            KeyCode::KeyM => modes.ship = modes.ship.next(),
            KeyCode::KeyD => modes.debug = modes.debug.next(),
            KeyCode::KeyV => modes.vector_field = modes.vector_field.next(),
            KeyCode::KeyS => modes.show_stressed_springs = !modes.show_stressed_springs,
            KeyCode::Equal => view.set_zoom(view.zoom() * ZOOM_STEP),
            KeyCode::Minus => view.set_zoom(view.zoom() / ZOOM_STEP),
            KeyCode::ArrowLeft => pan(&mut view, Vec2::new(-PAN_STEP, 0.0)),
            KeyCode::ArrowRight => pan(&mut view, Vec2::new(PAN_STEP, 0.0)),
            KeyCode::ArrowUp => pan(&mut view, Vec2::new(0.0, PAN_STEP)),
            KeyCode::ArrowDown => pan(&mut view, Vec2::new(0.0, -PAN_STEP)),
            KeyCode::BracketLeft | KeyCode::BracketRight => {
                let delta = if code == KeyCode::BracketLeft { -0.1 } else { 0.1 };
                let value = (self.scene.settings().ambient_light_intensity + delta).clamp(0.0, 1.0);
                self.scene.set_ambient_light_intensity(&mut self.device, value);
                return true;
            }
            _ => return true,
        }

        if modes != self.scene.settings().modes {
            log::info!("render modes: {modes:?}");
            self.scene.set_render_modes(modes);
        }
        if &view != self.scene.view() {
            self.scene.set_view(view);
        }
        true
    }

    /// Renders one frame. `Ok(false)` asks the viewer to exit.
    fn frame(&mut self, clear_color: wgpu::Color) -> Result<bool> {
        let t = self.started.elapsed().as_secs_f32();
        self.fleet.update(&mut self.scene, &mut self.device, t)?;

        let (viewport, format) = self.entry.with_gpu(|gpu| (gpu.viewport(), gpu.surface_format()));
        if !viewport.is_valid() {
            return Ok(true);
        }

        self.device.begin_frame(viewport, format);
        self.scene.begin_frame();
        self.fleet.upload_generic_textures(&mut self.scene, t)?;
        self.scene.end_frame(&mut self.device)?;

        if t - self.last_stats >= STATS_INTERVAL_SECS {
            self.last_stats = t;
            log::debug!(
                "frame stats: {:?} ({} draws)",
                self.scene.statistics(),
                self.device.recorded_draw_count()
            );
        }

        let device = &mut self.device;
        self.entry.with_gpu_mut(|gpu| -> Result<bool> {
            let mut frame = match gpu.begin_frame() {
                Ok(frame) => frame,
                Err(err) => {
                    return match gpu.handle_surface_error(err) {
                        SurfaceErrorAction::Fatal => bail!("surface is unusable"),
                        SurfaceErrorAction::Reconfigured | SurfaceErrorAction::SkipFrame => Ok(true),
                    };
                }
            };

            {
                let mut target = RenderTarget::new(&mut frame.encoder, &frame.view, gpu.depth_view());
                device.encode(&mut target, clear_color);
            }
            gpu.submit(frame);
            Ok(true)
        })
    }

    fn release(self) {
        let Session { mut device, scene, .. } = self;
        scene.release(&mut device);
    }
}

fn pan(view: &mut ViewModel, delta: Vec2) {
    let scaled = delta * (1.0 / view.zoom());
    view.set_camera_world_position(view.camera_world_position() + scaled);
}

pub struct ViewerApp {
    config: ViewerConfig,
    session: Option<Session>,
    exit_requested: bool,
}

impl ViewerApp {
    pub fn new(config: ViewerConfig) -> Self {
        Self {
            config,
            session: None,
            exit_requested: false,
        }
    }

    fn request_exit(&mut self, event_loop: &ActiveEventLoop) {
        self.exit_requested = true;
        if let Some(session) = self.session.take() {
            session.release();
        }
        event_loop.exit();
    }
}

impl ApplicationHandler for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.session.is_some() {
            return;
        }

        match Session::new(event_loop, &self.config) {
            Ok(session) => {
                session.request_redraw();
                self.session = Some(session);
            }
            Err(e) => {
                log::error!("failed to start viewer: {e:#}");
                self.request_exit(event_loop);
            }
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        event_loop.set_control_flow(ControlFlow::Wait);
        if let Some(session) = &self.session {
            session.request_redraw();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }
        let Some(session) = self.session.as_mut() else { return };

        match &event {
            WindowEvent::CloseRequested => self.request_exit(event_loop),

            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                session.resize();
                session.request_redraw();
            }

            WindowEvent::KeyboardInput { event, .. } => {
                if !session.on_key(event) {
                    self.request_exit(event_loop);
                }
            }

            WindowEvent::RedrawRequested => match session.frame(self.config.clear_color) {
                Ok(true) => {}
                Ok(false) => self.request_exit(event_loop),
                Err(e) => {
                    log::error!("{e:#}");
                    self.request_exit(event_loop);
                }
            },

            _ => {}
        }
    }
}
