//! Backend-facing API of the renderer
//!
//! Types and traits shared by every backend. Engine code above this layer never touches
//! a native graphics handle.

pub mod device;
pub mod types;
pub mod window;

pub use device::{DeviceError, DeviceResult, GpuDevice, WAIT_FOREVER};
pub use types::*;
pub use window::WindowSurface;
