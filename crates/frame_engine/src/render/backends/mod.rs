//! Backend implementations of the GPU device seam

/// Host-memory backend for tests and headless runs
pub mod headless;

/// Vulkan backend
pub mod vulkan;
