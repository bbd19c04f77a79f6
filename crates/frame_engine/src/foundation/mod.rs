//! Foundation module
//!
//! Math aliases, frame timing and logging setup shared by the engine and the viewer.

pub mod logging;
pub mod math;
pub mod time;
