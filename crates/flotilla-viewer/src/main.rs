//! Windowed viewer: a procedural fleet drawn through `flotilla-render`.
//!
//! Keys: M ship mode, D debug mode, V vector field, S stressed springs,
//! `=`/`-` zoom, arrows pan, `[`/`]` ambient light, Esc quits.

mod app;
mod config;
mod demo;

use anyhow::{Context, Result};
use winit::event_loop::EventLoop;

use flotilla_render::logging::init_logging;

use app::ViewerApp;
use config::ViewerConfig;

fn main() -> Result<()> {
    let config = ViewerConfig::default();
    init_logging(config.logging.clone());

    let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
    let mut app = ViewerApp::new(config);
    event_loop
        .run_app(&mut app)
        .context("winit event loop terminated with error")?;
    Ok(())
}
