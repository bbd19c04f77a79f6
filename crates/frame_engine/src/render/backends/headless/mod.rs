//! Headless backend: a host-memory GPU and a scripted window
//!
//! Used by the test suites to drive the whole frame lifecycle
//! without a display or a Vulkan driver.

mod device;
mod window;

pub use device::{spirv_stub, DeviceEvent, HeadlessDevice, ObjectKind, RecordedCommand, SurfaceFault, SPIRV_MAGIC};
pub use window::ScriptedWindow;
