//! Owning wrappers around device objects
//!
//! Each wrapper holds the device through an `Arc` and releases its handle on drop.

pub mod buffer;
pub mod descriptors;
pub mod shader;
pub mod sync;

pub use buffer::{GpuBuffer, UniformBuffer};
pub use descriptors::{DescriptorPool, DescriptorSetLayout, DescriptorSetLayoutBuilder, DescriptorWriter};
pub use shader::{GraphicsPipeline, PipelineConfig, PipelineLayout, ShaderModule};
pub use sync::{Fence, Semaphore};
