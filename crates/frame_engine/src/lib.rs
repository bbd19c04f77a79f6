//! # Frame Engine
//!
//! A small Vulkan renderer built around a frames-in-flight render loop.
//!
//! - [`render::Renderer`] drives acquire, record, submit and present for up to
//!   [`render::MAX_FRAMES_IN_FLIGHT`] frames at a time, rebuilding the presentation
//!   surface when the window changes.
//! - [`render::api::GpuDevice`] is the seam between the engine and a backend: the Vulkan
//!   backend draws to a GLFW window, the headless backend records everything in host
//!   memory for tests.
//! - [`scene`], [`assets`] and [`config`] provide what a viewer needs around the loop.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use frame_engine::render::backends::headless::{HeadlessDevice, ScriptedWindow};
//! use frame_engine::render::api::Extent2D;
//! use frame_engine::render::{Renderer, RendererOptions};
//!
//! fn main() -> Result<(), frame_engine::render::RenderError> {
//!     let device = Arc::new(HeadlessDevice::new());
//!     let mut window = ScriptedWindow::new(Extent2D::new(800, 600));
//!     let mut renderer = Renderer::new(device, &mut window, RendererOptions::default())?;
//!
//!     if let Some(cmd) = renderer.begin_frame(&mut window)? {
//!         renderer.begin_render_pass(cmd)?;
//!         renderer.end_render_pass(cmd)?;
//!         renderer.end_frame(&mut window)?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod assets;
pub mod config;
pub mod foundation;
pub mod render;
pub mod scene;

/// Common imports for engine users
pub mod prelude {
    pub use crate::config::{AppConfig, Config};
    pub use crate::foundation::math::{Mat4, Vec3};
    pub use crate::foundation::time::FrameTimer;
    pub use crate::render::{
        Camera, FrameInfo, GlobalUbo, GlobalUniforms, Mesh, PointLightSystem, RenderError, RenderResult, Renderer,
        SimpleRenderSystem,
    };
    pub use crate::scene::{GameObjectStore, TransformComponent};
}
