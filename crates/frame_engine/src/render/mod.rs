//! # Rendering
//!
//! The frame lifecycle and everything it needs:
//!
//! - [`api`]: the [`GpuDevice`](api::GpuDevice) seam and backend-agnostic types
//! - [`backends`]: the Vulkan backend and a headless backend for tests
//! - [`resources`]: owning wrappers that release device objects on drop
//! - [`uploader`] and [`mesh`]: staging uploads into device-local buffers
//! - [`swapchain`]: the presentation surface and its rebuild
//! - [`frame_sync`]: the ring of frames in flight
//! - [`renderer`]: begin/end frame orchestration
//! - [`camera`], [`frame_info`] and [`systems`]: what gets recorded each frame
//!
//! Every component holds the device through an `Arc`, so the device outlives all of them.

pub mod api;
pub mod backends;
pub mod camera;
pub mod error;
pub mod frame_info;
pub mod frame_sync;
pub mod mesh;
pub mod renderer;
pub mod resources;
pub mod swapchain;
pub mod systems;
pub mod uploader;

#[cfg(test)]
mod tests;

pub use camera::Camera;
pub use error::{RenderError, RenderResult};
pub use frame_info::{FrameInfo, GlobalUbo, GlobalUniforms};
pub use frame_sync::{FrameSlot, FrameSynchronizer, MAX_FRAMES_IN_FLIGHT};
pub use mesh::{Mesh, MeshBuilder, Vertex};
pub use renderer::{Renderer, RendererOptions, DEFAULT_FENCE_TIMEOUT};
pub use swapchain::{ImageAcquisition, PresentModePreference, PresentStatus, PresentationSurface, SwapchainOptions};
pub use systems::{PointLightSystem, ShaderPaths, SimpleRenderSystem};
pub use uploader::StagedUploader;
