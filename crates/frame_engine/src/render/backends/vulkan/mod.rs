//! Vulkan backend
//!
//! [`VulkanDevice`] implements [`GpuDevice`](crate::render::api::GpuDevice) with ash and
//! presents to a [`GlfwWindow`].

mod context;
mod device;
mod window;

pub use device::VulkanDevice;
pub use window::{GlfwWindow, WindowError, WindowResult};
